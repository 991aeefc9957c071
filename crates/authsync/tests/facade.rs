//! End-to-end tests through the `authsync` facade: configuration, store
//! wiring, and request building together.

use std::time::Duration;

use authsync::prelude::*;
use authsync::protocol::{AuthToken, Codec, HandshakeMessage, JsonCodec};
use authsync::session::MockIdentityProvider;
use authsync::transport::{Connection, MemoryBus, MemoryConnection};

const APP: &str = "https://app.example";
const HOST: &str = "https://host.example";

async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

fn acme_claims() -> Claims {
    Claims {
        tenant: Some(Tenant::new("t1", "acme")),
        user_id: Some("u1".into()),
        groups: vec![GroupRef::new("g1", "Admins")],
        permissions: vec!["read".into(), "write".into()],
    }
}

fn config(vars: &'static [(&'static str, &'static str)]) -> AuthSyncConfig {
    AuthSyncConfig::from_lookup(|var| {
        vars.iter()
            .find(|(name, _)| *name == var)
            .map(|(_, value)| value.to_string())
    })
    .unwrap()
}

/// Runs the standalone flow with `?` lifting every sub-crate error.
async fn standalone_request(
    provider: Arc<MockIdentityProvider>,
    config: AuthSyncConfig,
) -> Result<RequestDescriptorParts, AuthSyncError> {
    let store = SessionStore::builder()
        .standalone(SessionSource::new(Arc::clone(&provider)))
        .build()?;
    let session = store.wait_resolved().await?;
    let api = ApiClient::new(config.api, store.subscribe(), provider)?;
    let request = api.build("/tracks_limits", RequestOptions::new()).await?;
    Ok(RequestDescriptorParts {
        status: session.status(),
        url: request.url().to_string(),
        tenant: request.headers()["x-db-name"].to_str().unwrap_or_default().to_string(),
        authorization: request
            .headers()
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned),
    })
}

#[derive(Debug)]
struct RequestDescriptorParts {
    status: SessionStatus,
    url: String,
    tenant: String,
    authorization: Option<String>,
}

// =========================================================================
// Standalone
// =========================================================================

#[tokio::test]
async fn test_standalone_acme_request_is_tenant_scoped() {
    let provider = Arc::new(MockIdentityProvider::signed_in(PublicUser::new("alice"), acme_claims()));
    provider.set_token("tok-abc");

    let parts = standalone_request(provider, config(&[("AUTHSYNC_API_URL", "http://api.test")]))
        .await
        .unwrap();

    assert_eq!(parts.status, SessionStatus::Ready);
    assert_eq!(parts.url, "http://api.test/tracks_limits");
    assert_eq!(parts.tenant, "acme");
    assert_eq!(parts.authorization.as_deref(), Some("Bearer tok-abc"));
}

#[tokio::test]
async fn test_standalone_signed_out_lifts_configuration_error() {
    let provider = Arc::new(MockIdentityProvider::signed_out());

    let err = standalone_request(provider, config(&[])).await.unwrap_err();

    assert!(matches!(
        err,
        AuthSyncError::Request(authsync::request::RequestError::Configuration { .. })
    ));
}

#[tokio::test]
async fn test_standalone_api_key_env_switches_scheme() {
    let provider = Arc::new(MockIdentityProvider::signed_in(PublicUser::new("alice"), acme_claims()));

    let parts = standalone_request(
        Arc::clone(&provider),
        config(&[("AUTHSYNC_API_KEY", "deploy-key")]),
    )
    .await
    .unwrap();

    assert_eq!(parts.authorization, None);
    assert_eq!(provider.token_requests(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_broadcast_on_configured_channel_mirrors_sign_out() {
    let config = config(&[("AUTHSYNC_BROADCAST_CHANNEL", "tenant_auth")]);
    let bus = MemoryBus::new(&config.broadcast_channel, APP);
    let provider_a = Arc::new(MockIdentityProvider::new());
    let provider_b = Arc::new(MockIdentityProvider::new());
    let tab = |provider: &Arc<MockIdentityProvider>| {
        SessionStore::builder()
            .standalone(SessionSource::new(Arc::clone(provider)))
            .broadcast(CrossTabBroadcast::new(Arc::new(bus.join())))
            .build()
            .unwrap()
    };
    let tab_a = tab(&provider_a);
    let tab_b = tab(&provider_b);
    settle().await;

    provider_a.sign_in(PublicUser::new("alice"), acme_claims());
    settle().await;
    assert_eq!(tab_b.snapshot().status(), SessionStatus::Ready);

    provider_a.sign_out();
    settle().await;
    assert_eq!(tab_b.snapshot().status(), SessionStatus::Unauthenticated);
    assert_eq!(tab_a.snapshot().status(), SessionStatus::Unauthenticated);
}

// =========================================================================
// Embedded
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_embedded_config_allow_list_and_host_token() {
    let config = config(&[
        ("AUTHSYNC_ALLOWED_ORIGINS", "https://host.example"),
        ("AUTHSYNC_HANDSHAKE_TIMEOUT_MS", "0"),
        ("AUTHSYNC_API_URL", "http://api.test"),
    ]);
    let (host, guest) = MemoryConnection::pair(HOST, APP);
    let store = SessionStore::builder()
        .frame(FrameContext::Framed)
        .embedded(HandshakeChannel::new(Arc::new(guest), config.handshake.clone()))
        .build()
        .unwrap();

    let ready = host.recv().await.unwrap().unwrap();
    assert_eq!(
        JsonCodec.decode::<HandshakeMessage>(&ready).unwrap(),
        HandshakeMessage::IframeReady
    );
    let msg = HandshakeMessage::AuthData {
        auth_token: AuthToken::new("host-token"),
        tenant_name: "acme".into(),
    };
    host.send(&JsonCodec.encode(&msg).unwrap()).await.unwrap();
    let session = store.wait_resolved().await.unwrap();
    assert_eq!(session.mode(), SessionMode::Embedded);
    assert_eq!(session.status(), SessionStatus::Ready);

    let api = ApiClient::embedded(config.api, store.subscribe()).unwrap();
    let request = api.build("/tracks_limits", RequestOptions::new()).await.unwrap();
    assert_eq!(request.headers()["authorization"], "Bearer host-token");
    assert_eq!(request.headers()["x-db-name"], "acme");
}

#[tokio::test(start_paused = true)]
async fn test_embedded_timeout_from_config_resolves_unauthenticated() {
    let config = config(&[("AUTHSYNC_HANDSHAKE_TIMEOUT_MS", "200")]);
    let (_host, guest) = MemoryConnection::pair(HOST, APP);
    let store = SessionStore::builder()
        .frame(FrameContext::Framed)
        .embedded(HandshakeChannel::new(Arc::new(guest), config.handshake))
        .build()
        .unwrap();

    let session = store.wait_resolved().await.unwrap();

    assert_eq!(session.status(), SessionStatus::Unauthenticated);
    assert!(session.last_error().is_some());
}
