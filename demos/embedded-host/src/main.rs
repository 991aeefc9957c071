//! A host page and an embedded app talking over a real WebSocket.
//!
//! The host side waits for `IFRAME_READY` and answers with `AUTH_DATA`.
//! The guest side runs an embedded [`SessionStore`], waits for it to
//! resolve, and builds a tenant-scoped API request from the session.
//!
//! ```text
//! RUST_LOG=debug cargo run -p embedded-host
//! ```

use authsync::prelude::*;
use authsync::protocol::{AuthToken, Codec, HandshakeMessage, JsonCodec};
use authsync::transport::{Connection, Transport, WebSocketConnection, WebSocketTransport};

// ---------------------------------------------------------------------------
// Host side
// ---------------------------------------------------------------------------

/// Credentials the host hands to whichever app frame connects.
#[derive(Clone)]
struct HostGrant {
    token: String,
    tenant_name: String,
}

/// Serves one guest: answers its `IFRAME_READY`, then stays connected
/// until the guest leaves.
async fn serve_guest(mut transport: WebSocketTransport, grant: HostGrant) -> Result<(), AuthSyncError> {
    let conn = transport.accept().await?;
    tracing::info!(id = %conn.id(), origin = ?conn.origin(), "guest frame connected");

    loop {
        let bytes = match conn.recv().await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(error = %e, "guest link dropped");
                break;
            }
        };
        match JsonCodec.decode::<HandshakeMessage>(&bytes) {
            Ok(HandshakeMessage::IframeReady) => {
                let reply = HandshakeMessage::AuthData {
                    auth_token: AuthToken::new(grant.token.clone()),
                    tenant_name: grant.tenant_name.clone(),
                };
                conn.send(&JsonCodec.encode(&reply)?).await?;
                tracing::info!(tenant = %grant.tenant_name, "sent AUTH_DATA");
            }
            Ok(other) => tracing::debug!(?other, "ignoring guest message"),
            Err(e) => tracing::warn!(error = %e, "undecodable guest message"),
        }
    }

    tracing::info!("guest frame left");
    Ok(())
}

// ---------------------------------------------------------------------------
// Guest side
// ---------------------------------------------------------------------------

/// What the guest ended up with. No request is built unless the session
/// resolved to `Ready`.
struct GuestReport {
    session: Arc<AuthSession>,
    request: Option<authsync::RequestDescriptor>,
}

async fn run_guest(host_url: &str, config: AuthSyncConfig) -> Result<GuestReport, AuthSyncError> {
    let conn = WebSocketConnection::connect(host_url).await?;

    let mut handshake = config.handshake;
    if handshake.allowed_origins.is_empty() {
        if let Some(origin) = conn.origin() {
            handshake.allowed_origins.push(origin.to_string());
        }
    }

    let store = SessionStore::builder()
        .frame(FrameContext::Framed)
        .embedded(HandshakeChannel::new(Arc::new(conn), handshake))
        .build()?;
    let session = store.wait_resolved().await?;
    tracing::info!(mode = %session.mode(), status = %session.status(), "guest session resolved");

    let mut request = None;
    if session.is_ready() {
        let api = ApiClient::embedded(config.api, store.subscribe())?;
        let built = api.build("/tracks_limits", RequestOptions::new()).await?;
        tracing::info!(
            debug = %serde_json::to_string(built.debug()).unwrap_or_default(),
            "built request"
        );
        request = Some(built);
    } else {
        tracing::warn!(error = ?session.last_error(), "no credentials from host");
    }

    store.shutdown().await?;
    Ok(GuestReport { session, request })
}

// ---------------------------------------------------------------------------
// Bootstrap
// ---------------------------------------------------------------------------

async fn run(config: AuthSyncConfig, grant: HostGrant) -> Result<GuestReport, AuthSyncError> {
    let transport = WebSocketTransport::bind("127.0.0.1:0").await?;
    let addr = transport
        .local_addr()
        .map_err(authsync::transport::TransportError::ConnectFailed)?;
    let host = tokio::spawn(serve_guest(transport, grant));

    let report = run_guest(&format!("ws://{addr}"), config).await;
    match host.await {
        Ok(Err(e)) => tracing::warn!(error = %e, "host side ended with an error"),
        Err(e) => tracing::warn!(error = %e, "host task failed"),
        Ok(Ok(())) => {}
    }
    report
}

#[tokio::main]
async fn main() -> Result<(), AuthSyncError> {
    authsync::telemetry::init();
    let config = AuthSyncConfig::from_env()?;

    let grant = HostGrant {
        token: "demo-host-token".into(),
        tenant_name: "acme".into(),
    };
    let report = run(config, grant).await?;

    tracing::info!(
        status = %report.session.status(),
        tenant = ?report.session.tenant().map(|t| t.name.as_str()),
        url = ?report.request.as_ref().map(|r| r.url().to_string()),
        "demo finished"
    );
    Ok(())
}
