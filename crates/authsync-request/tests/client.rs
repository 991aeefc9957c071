//! Integration tests for the request builder against a local axum API.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use authsync_channel::{HandshakeChannel, HandshakeConfig};
use authsync_protocol::{AuthToken, Claims, Codec, GroupRef, HandshakeMessage, JsonCodec, PublicUser, Tenant};
use authsync_request::{
    ApiClient, ApiConfig, CredentialScheme, Method, REDACTED, RequestError, RequestOptions,
};
use authsync_session::{MockIdentityProvider, SessionError, SessionSource, TokenSource};
use authsync_store::{FrameContext, SessionStore};
use authsync_transport::{Connection, MemoryConnection};
use axum::Json;
use axum::Router;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use serde_json::{Value, json};

// =========================================================================
// Fixtures
// =========================================================================

async fn echo_headers(headers: HeaderMap) -> Json<Value> {
    let headers: BTreeMap<String, String> = headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                value.to_str().unwrap_or_default().to_string(),
            )
        })
        .collect();
    Json(json!({ "headers": headers }))
}

/// Starts the fixture API and returns its base URL.
async fn spawn_api() -> String {
    let app = Router::new()
        .route("/tracks_limits", get(echo_headers))
        .route("/echo", post(|Json(body): Json<Value>| async move { Json(body) }))
        .route("/unavailable", get(|| async { StatusCode::SERVICE_UNAVAILABLE }))
        .route("/not-json", get(|| async { "plain text" }))
        .route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Json(json!({}))
            }),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn acme_claims() -> Claims {
    Claims {
        tenant: Some(Tenant::new("t1", "acme")),
        user_id: Some("u1".into()),
        groups: vec![GroupRef::new("g1", "Admins")],
        permissions: vec!["read".into(), "write".into()],
    }
}

/// A resolved standalone store for `provider`.
async fn standalone(provider: &Arc<MockIdentityProvider>) -> SessionStore {
    let store = SessionStore::builder()
        .standalone(SessionSource::new(Arc::clone(provider)))
        .build()
        .unwrap();
    store.wait_resolved().await.unwrap();
    store
}

fn client(
    base_url: &str,
    scheme: CredentialScheme,
    store: &SessionStore,
    provider: &Arc<MockIdentityProvider>,
) -> ApiClient<MockIdentityProvider> {
    ApiClient::new(
        ApiConfig::new(base_url, scheme),
        store.subscribe(),
        Arc::clone(provider),
    )
    .unwrap()
}

/// A token source whose fetch never completes.
struct StalledTokens;

impl TokenSource for StalledTokens {
    async fn fresh_token(&self) -> Result<Option<String>, SessionError> {
        std::future::pending().await
    }
}

// =========================================================================
// build
// =========================================================================

#[tokio::test]
async fn test_build_standalone_acme_stamps_expected_headers() {
    let provider = Arc::new(MockIdentityProvider::signed_in(PublicUser::new("alice"), acme_claims()));
    provider.set_token("tok-abc");
    let store = standalone(&provider).await;
    let api = client("http://api.test", CredentialScheme::Bearer, &store, &provider);

    let request = api.build("/tracks_limits", RequestOptions::new()).await.unwrap();

    assert_eq!(request.url(), "http://api.test/tracks_limits");
    assert_eq!(request.method(), &Method::GET);
    let headers = request.headers();
    assert_eq!(headers["x-db-name"], "acme");
    assert_eq!(headers["user-id"], "u1");
    assert_eq!(headers["authorization"], "Bearer tok-abc");
    assert_eq!(headers["content-type"], "application/json");
    assert!(headers.get("x-api-key").is_none());
}

#[tokio::test]
async fn test_build_without_tenant_fails_before_token_fetch() {
    let provider = Arc::new(MockIdentityProvider::signed_out());
    provider.set_token("tok-abc");
    let store = standalone(&provider).await;
    let api = client("http://api.test", CredentialScheme::Bearer, &store, &provider);

    let err = api.build("/tracks_limits", RequestOptions::new()).await.unwrap_err();

    assert!(matches!(err, RequestError::Configuration { .. }));
    assert_eq!(err.debug().url, "http://api.test/tracks_limits");
    assert_eq!(provider.token_requests(), 0);
}

#[tokio::test]
async fn test_build_fetches_fresh_token_every_call() {
    let provider = Arc::new(MockIdentityProvider::signed_in(PublicUser::new("alice"), acme_claims()));
    provider.set_token("first");
    let store = standalone(&provider).await;
    let api = client("http://api.test", CredentialScheme::Bearer, &store, &provider);

    let one = api.build("/a", RequestOptions::new()).await.unwrap();
    provider.set_token("second");
    let two = api.build("/b", RequestOptions::new()).await.unwrap();

    assert_eq!(one.headers()["authorization"], "Bearer first");
    assert_eq!(two.headers()["authorization"], "Bearer second");
    assert_eq!(provider.token_requests(), 2);
}

#[tokio::test]
async fn test_build_without_token_is_credential_error() {
    let provider = Arc::new(MockIdentityProvider::signed_in(PublicUser::new("alice"), acme_claims()));
    let store = standalone(&provider).await;
    let api = client("http://api.test", CredentialScheme::Bearer, &store, &provider);

    let err = api.build("/a", RequestOptions::new()).await.unwrap_err();

    assert!(matches!(err, RequestError::Credential { .. }));
    assert_eq!(
        err.debug().error.as_deref(),
        Some("No authentication token available")
    );
}

#[tokio::test]
async fn test_build_token_failure_is_credential_error() {
    let provider = Arc::new(MockIdentityProvider::signed_in(PublicUser::new("alice"), acme_claims()));
    provider.fail_token(SessionError::TokenUnavailable("refresh revoked".into()));
    let store = standalone(&provider).await;
    let api = client("http://api.test", CredentialScheme::Bearer, &store, &provider);

    let err = api.build("/a", RequestOptions::new()).await.unwrap_err();

    assert!(matches!(err, RequestError::Credential { message, .. } if message.contains("refresh revoked")));
}

#[tokio::test]
async fn test_build_api_key_scheme_skips_token_fetch() {
    let provider = Arc::new(MockIdentityProvider::signed_in(PublicUser::new("alice"), acme_claims()));
    let store = standalone(&provider).await;
    let api = client(
        "http://api.test",
        CredentialScheme::ApiKey("deploy-key".into()),
        &store,
        &provider,
    );

    let request = api.build("/a", RequestOptions::new()).await.unwrap();

    assert_eq!(request.headers()["x-api-key"], "deploy-key");
    assert!(request.headers().get("authorization").is_none());
    assert_eq!(request.debug().headers["x-api-key"], REDACTED);
    assert_eq!(provider.token_requests(), 0);
}

#[tokio::test]
async fn test_build_caller_headers_kept_unless_overridden() {
    let provider = Arc::new(MockIdentityProvider::signed_in(PublicUser::new("alice"), acme_claims()));
    provider.set_token("real");
    let store = standalone(&provider).await;
    let api = client("http://api.test", CredentialScheme::Bearer, &store, &provider);

    let options = RequestOptions::new()
        .header("X-Trace", "t-1")
        .header("AUTHORIZATION", "Bearer forged")
        .header("X-DB-Name", "other-tenant")
        .header("X-Api-Key", "forged-key");
    let request = api.build("/a", options).await.unwrap();

    let headers = request.headers();
    assert_eq!(headers["x-trace"], "t-1");
    assert_eq!(headers["authorization"], "Bearer real");
    assert_eq!(headers["x-db-name"], "acme");
    assert!(headers.get("x-api-key").is_none());
}

#[tokio::test]
async fn test_build_invalid_caller_header_is_configuration_error() {
    let provider = Arc::new(MockIdentityProvider::signed_in(PublicUser::new("alice"), acme_claims()));
    provider.set_token("tok");
    let store = standalone(&provider).await;
    let api = client("http://api.test", CredentialScheme::Bearer, &store, &provider);

    let err = api
        .build("/a", RequestOptions::new().header("bad header", "v"))
        .await
        .unwrap_err();

    assert!(matches!(err, RequestError::Configuration { .. }));
    assert_eq!(provider.token_requests(), 0);
}

#[tokio::test]
async fn test_build_debug_never_contains_credential() {
    let provider = Arc::new(MockIdentityProvider::signed_in(PublicUser::new("alice"), acme_claims()));
    provider.set_token("super-secret-token");
    let store = standalone(&provider).await;
    let api = client("http://api.test", CredentialScheme::Bearer, &store, &provider);

    let request = api.build("/a", RequestOptions::new()).await.unwrap();

    let record = request.debug();
    assert_eq!(record.headers["authorization"], REDACTED);
    assert!(!format!("{record:?}").contains("super-secret-token"));
    assert!(!serde_json::to_string(record).unwrap().contains("super-secret-token"));
    assert!(!format!("{request:?}").contains("super-secret-token"));
}

#[tokio::test]
async fn test_build_embedded_uses_host_token() {
    let (host, guest) = MemoryConnection::pair("https://host.example", "https://app.example");
    let store = SessionStore::builder()
        .frame(FrameContext::Framed)
        .embedded(HandshakeChannel::new(
            Arc::new(guest),
            HandshakeConfig {
                timeout: None,
                ..HandshakeConfig::default()
            },
        ))
        .build()
        .unwrap();
    let msg = HandshakeMessage::AuthData {
        auth_token: AuthToken::new("host-token"),
        tenant_name: "acme".into(),
    };
    host.send(&JsonCodec.encode(&msg).unwrap()).await.unwrap();
    store.wait_resolved().await.unwrap();
    let api = ApiClient::embedded(ApiConfig::new("http://api.test", CredentialScheme::Bearer), store.subscribe()).unwrap();

    let request = api.build("/tracks_limits", RequestOptions::new()).await.unwrap();

    assert_eq!(request.headers()["authorization"], "Bearer host-token");
    assert_eq!(request.headers()["x-db-name"], "acme");
    assert_eq!(request.headers()["user-id"], "embedded-user");
}

// =========================================================================
// send / fetch
// =========================================================================

#[tokio::test]
async fn test_fetch_reaches_api_with_stamped_headers() {
    let base = spawn_api().await;
    let provider = Arc::new(MockIdentityProvider::signed_in(PublicUser::new("alice"), acme_claims()));
    provider.set_token("tok-abc");
    let store = standalone(&provider).await;
    let api = client(&base, CredentialScheme::Bearer, &store, &provider);

    let response = api.fetch("/tracks_limits", RequestOptions::new()).await.unwrap();

    let seen = &response.data["headers"];
    assert_eq!(seen["x-db-name"], "acme");
    assert_eq!(seen["user-id"], "u1");
    assert_eq!(seen["authorization"], "Bearer tok-abc");
    assert_eq!(response.debug.url, format!("{base}/tracks_limits"));
    assert!(response.debug.error.is_none());
}

#[tokio::test]
async fn test_fetch_post_body_with_base_url_override() {
    let base = spawn_api().await;
    let provider = Arc::new(MockIdentityProvider::signed_in(PublicUser::new("alice"), acme_claims()));
    provider.set_token("tok");
    let store = standalone(&provider).await;
    let api = client("http://unused.invalid", CredentialScheme::Bearer, &store, &provider);

    let options = RequestOptions::new()
        .method(Method::POST)
        .base_url(&base)
        .body(json!({ "limit": 5 }));
    let response = api.fetch("/echo", options).await.unwrap();

    assert_eq!(response.data, json!({ "limit": 5 }));
}

#[tokio::test]
async fn test_fetch_non_success_is_api_error() {
    let base = spawn_api().await;
    let provider = Arc::new(MockIdentityProvider::signed_in(PublicUser::new("alice"), acme_claims()));
    provider.set_token("tok-secret");
    let store = standalone(&provider).await;
    let api = client(&base, CredentialScheme::Bearer, &store, &provider);

    let err = api.fetch("/unavailable", RequestOptions::new()).await.unwrap_err();

    match &err {
        RequestError::Api { status, message, debug } => {
            assert_eq!(*status, 503);
            assert_eq!(message, "API call failed: 503 Service Unavailable");
            assert_eq!(debug.error.as_deref(), Some(message.as_str()));
            assert_eq!(debug.headers["authorization"], REDACTED);
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_fetch_non_json_body_is_decode_error() {
    let base = spawn_api().await;
    let provider = Arc::new(MockIdentityProvider::signed_in(PublicUser::new("alice"), acme_claims()));
    provider.set_token("tok");
    let store = standalone(&provider).await;
    let api = client(&base, CredentialScheme::Bearer, &store, &provider);

    let err = api.fetch("/not-json", RequestOptions::new()).await.unwrap_err();

    assert!(matches!(err, RequestError::Decode { .. }));
}

#[tokio::test]
async fn test_fetch_unreachable_api_is_network_error() {
    let provider = Arc::new(MockIdentityProvider::signed_in(PublicUser::new("alice"), acme_claims()));
    provider.set_token("tok");
    let store = standalone(&provider).await;
    let api = client("http://127.0.0.1:1", CredentialScheme::Bearer, &store, &provider);

    let err = api.fetch("/tracks_limits", RequestOptions::new()).await.unwrap_err();

    assert!(matches!(err, RequestError::Network { .. }));
    assert!(err.debug().error.is_some());
}

#[tokio::test]
async fn test_fetch_store_shutdown_cancels_in_flight_call() {
    let base = spawn_api().await;
    let provider = Arc::new(MockIdentityProvider::signed_in(PublicUser::new("alice"), acme_claims()));
    provider.set_token("tok");
    let store = standalone(&provider).await;
    let api = client(&base, CredentialScheme::Bearer, &store, &provider);

    let call = tokio::spawn(async move { api.fetch("/slow", RequestOptions::new()).await });
    tokio::time::sleep(Duration::from_millis(50)).await;
    store.shutdown().await.unwrap();

    let result = tokio::time::timeout(Duration::from_secs(5), call)
        .await
        .expect("cancellation did not arrive")
        .unwrap();
    assert!(matches!(result, Err(RequestError::Cancelled { .. })));
}

#[tokio::test]
async fn test_fetch_store_shutdown_cancels_pending_token_fetch() {
    let provider = Arc::new(MockIdentityProvider::signed_in(PublicUser::new("alice"), acme_claims()));
    let store = standalone(&provider).await;
    let api = ApiClient::new(
        ApiConfig::new("http://api.test", CredentialScheme::Bearer),
        store.subscribe(),
        Arc::new(StalledTokens),
    )
    .unwrap();

    let call = tokio::spawn(async move { api.fetch("/tracks_limits", RequestOptions::new()).await });
    tokio::time::sleep(Duration::from_millis(50)).await;
    store.shutdown().await.unwrap();

    let result = tokio::time::timeout(Duration::from_secs(5), call)
        .await
        .expect("cancellation did not arrive")
        .unwrap();
    match result {
        Err(RequestError::Cancelled { debug }) => {
            assert_eq!(debug.url, "http://api.test/tracks_limits");
            assert_eq!(debug.headers["x-db-name"], "acme");
            assert!(debug.error.is_some());
        }
        other => panic!("expected Cancelled, got {other:?}"),
    }
}
