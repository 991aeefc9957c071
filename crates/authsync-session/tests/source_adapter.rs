//! Integration tests for the provider adapter: ordered delivery and the
//! session values built from each event.

use std::sync::Arc;
use std::time::Duration;

use authsync_protocol::{Claims, GroupRef, PublicUser, Tenant};
use authsync_session::{
    MockIdentityProvider, SessionError, SessionSource, SessionStatus, SourceEvent,
};

fn claims_for(tenant: &str, group: &str) -> Claims {
    Claims {
        tenant: Some(Tenant::new(format!("id-{tenant}"), tenant)),
        user_id: Some(format!("user-{tenant}")),
        groups: vec![GroupRef::new(format!("g-{group}"), group)],
        permissions: vec!["read".into()],
    }
}

async fn next(sub: &mut authsync_session::SourceSubscription) -> SourceEvent {
    tokio::time::timeout(Duration::from_secs(1), sub.recv())
        .await
        .expect("timed out waiting for source event")
        .expect("source ended")
}

// =========================================================================
// Ordering
// =========================================================================

#[tokio::test]
async fn test_subscribe_replays_initial_sign_in() {
    let provider = Arc::new(MockIdentityProvider::signed_in(
        PublicUser::new("alice"),
        claims_for("acme", "Admins"),
    ));
    let mut sub = SessionSource::new(provider).subscribe();

    let session = next(&mut sub).await.into_session();

    assert_eq!(session.status(), SessionStatus::Ready);
    assert_eq!(session.tenant().map(|t| t.name.as_str()), Some("acme"));
}

#[tokio::test]
async fn test_subscribe_sign_in_then_out_preserves_order() {
    let provider = Arc::new(MockIdentityProvider::new());
    let mut sub = SessionSource::new(Arc::clone(&provider)).subscribe();

    provider.sign_in(PublicUser::new("alice"), claims_for("acme", "Admins"));
    provider.sign_out();
    provider.sign_in(PublicUser::new("bob"), claims_for("globex", "Staff"));

    assert!(matches!(next(&mut sub).await, SourceEvent::SignedIn { user, .. } if user.uid == "alice"));
    assert_eq!(next(&mut sub).await, SourceEvent::SignedOut);
    let last = next(&mut sub).await.into_session();
    assert_eq!(last.tenant().map(|t| t.name.as_str()), Some("globex"));
    assert_eq!(last.groups(), &[GroupRef::new("g-Staff", "Staff")]);
}

// =========================================================================
// Failures
// =========================================================================

#[tokio::test]
async fn test_subscribe_provider_failure_becomes_unauthenticated_with_error() {
    let provider = Arc::new(MockIdentityProvider::new());
    let mut sub = SessionSource::new(Arc::clone(&provider)).subscribe();

    provider.fail(SessionError::Provider("token expired".into()));

    let session = next(&mut sub).await.into_session();
    assert_eq!(session.status(), SessionStatus::Unauthenticated);
    assert_eq!(
        session.last_error(),
        Some("identity provider error: token expired")
    );
}

#[tokio::test]
async fn test_subscribe_recovers_after_failure() {
    let provider = Arc::new(MockIdentityProvider::new());
    let mut sub = SessionSource::new(Arc::clone(&provider)).subscribe();

    provider.fail(SessionError::Provider("blip".into()));
    provider.sign_in(PublicUser::new("alice"), claims_for("acme", "Admins"));

    assert!(matches!(next(&mut sub).await, SourceEvent::Failed(_)));
    assert!(next(&mut sub).await.into_session().is_ready());
}
