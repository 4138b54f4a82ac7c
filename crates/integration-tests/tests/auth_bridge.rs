//! Session mirroring from the identity provider into the user store.

#![allow(clippy::unwrap_used)]

use farmacia_core::RemoteUserId;
use farmacia_integration_tests::{TestContext, session_for};
use farmacia_storefront::models::session::{AuthEvent, LoginIdentifier, ProfileRecord, RemoteUser, keys};
use farmacia_storefront::models::user::{AddressDraft, FavoriteDraft, ProfileUpdate};
use farmacia_storefront::services::auth::{AuthOutcome, SessionState};
use farmacia_storefront::services::notifications::NotificationLevel;
use secrecy::SecretString;

fn identifier(input: &str) -> LoginIdentifier {
    LoginIdentifier::parse(input).unwrap()
}

fn profile_row(id: &str, first_name: &str) -> ProfileRecord {
    ProfileRecord {
        id: RemoteUserId::new(id),
        first_name: Some(first_name.to_string()),
        last_name: Some("Rodríguez".to_string()),
        email: None,
        phone: Some("04241234567".to_string()),
        document_type: None,
        document_number: Some("V12345678".to_string()),
        gender: Some("female".to_string()),
        avatar_url: None,
    }
}

#[tokio::test]
async fn test_sign_in_without_profile_row_uses_account_fallback() {
    let mut ctx = TestContext::new();
    ctx.provider
        .add_account("a@b.com", "secreto123", RemoteUser::new("u1", "a@b.com"));
    ctx.state.start().await;

    let outcome = ctx
        .state
        .auth()
        .sign_in(&identifier("a@b.com"), SecretString::from("secreto123"))
        .await;
    assert_eq!(outcome, AuthOutcome::Success);
    ctx.settle().await;

    let users = ctx.state.users();
    assert!(users.is_logged_in());
    let profile = users.profile().unwrap();
    assert_eq!(profile.id, "u1");
    assert_eq!(profile.email, "a@b.com");
    assert_eq!(profile.name, "");
    assert_eq!(profile.phone_country_code, "+58");

    assert_eq!(
        ctx.state.auth().session_state().await,
        SessionState::Authenticated {
            user_id: RemoteUserId::new("u1")
        }
    );
    // The provider's own SignedIn event arrives after the direct transition
    assert_eq!(ctx.provider.fetch_profile_calls(), 1);
    let signed_in: Vec<_> = ctx
        .take_notifications()
        .into_iter()
        .filter(|n| n.title == "Signed in")
        .collect();
    assert_eq!(signed_in.len(), 1);
}

#[tokio::test]
async fn test_sign_in_maps_profile_row() {
    let ctx = TestContext::new();
    ctx.provider
        .add_account("+584241234567", "secreto123", RemoteUser::new("u7", "m@r.com"));
    ctx.provider.add_profile(profile_row("u7", "María"));
    ctx.state.start().await;

    let outcome = ctx
        .state
        .auth()
        .sign_in(&identifier("0424 123 4567"), SecretString::from("secreto123"))
        .await;
    assert!(outcome.is_success());

    let profile = ctx.state.users().profile().unwrap();
    assert_eq!(profile.name, "María");
    assert_eq!(profile.surname, "Rodríguez");
    assert_eq!(profile.email, "m@r.com");
    assert_eq!(profile.phone_prefix, "0424");
    assert_eq!(profile.phone_number, "1234567");
    assert_eq!(profile.document_number, "V12345678");
}

#[tokio::test]
async fn test_failed_sign_in_reports_and_resets_loading() {
    let mut ctx = TestContext::new();
    ctx.provider
        .add_account("a@b.com", "secreto123", RemoteUser::new("u1", "a@b.com"));
    ctx.state.start().await;

    let outcome = ctx
        .state
        .auth()
        .sign_in(&identifier("a@b.com"), SecretString::from("wrong-password"))
        .await;

    assert_eq!(
        outcome,
        AuthOutcome::Failed {
            message: "Invalid credentials".to_string()
        }
    );
    assert!(!ctx.state.auth().is_loading());
    assert!(!ctx.state.users().is_logged_in());
    let notifications = ctx.take_notifications();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].level, NotificationLevel::Error);
    assert_eq!(notifications[0].title, "Could not sign in");
}

#[tokio::test]
async fn test_profile_fetch_error_falls_back_to_account() {
    let ctx = TestContext::new();
    ctx.provider
        .add_account("a@b.com", "secreto123", RemoteUser::new("u1", "a@b.com"));
    ctx.provider.add_profile(profile_row("u1", "Ana"));
    ctx.provider.set_profile_fails(true);
    ctx.state.start().await;

    let outcome = ctx
        .state
        .auth()
        .sign_in(&identifier("a@b.com"), SecretString::from("secreto123"))
        .await;
    assert!(outcome.is_success());

    let profile = ctx.state.users().profile().unwrap();
    assert_eq!(profile.email, "a@b.com");
    assert_eq!(profile.name, "");
}

#[tokio::test]
async fn test_sign_out_clears_account_data_but_keeps_cart() {
    let mut ctx = TestContext::new();
    ctx.provider
        .add_account("a@b.com", "secreto123", RemoteUser::new("u1", "a@b.com"));
    ctx.state.start().await;
    ctx.state
        .auth()
        .sign_in(&identifier("a@b.com"), SecretString::from("secreto123"))
        .await;
    ctx.settle().await;

    ctx.state.users().add_address(AddressDraft {
        label: "Casa".to_string(),
        ..AddressDraft::default()
    });
    let vitamins = ctx.product(2).unwrap();
    ctx.state.cart().add_to_cart(&vitamins, 1).unwrap();
    ctx.take_notifications();

    let outcome = ctx.state.sign_out().await;
    assert!(outcome.is_success());
    ctx.settle().await;

    let users = ctx.state.users();
    assert!(!users.is_logged_in());
    assert!(users.profile().is_none());
    assert!(users.addresses().is_empty());
    for key in keys::SESSION_DATA {
        assert!(!ctx.store.contains_key(key), "{key} should be removed");
    }
    assert!(!ctx.provider.has_session());
    assert_eq!(ctx.state.cart().item_count(), 1);
    assert_eq!(ctx.state.auth().session_state().await, SessionState::Anonymous);

    let signed_out: Vec<_> = ctx
        .take_notifications()
        .into_iter()
        .filter(|n| n.title == "Signed out")
        .collect();
    assert_eq!(signed_out.len(), 1);
}

#[tokio::test]
async fn test_failed_sign_out_keeps_session() {
    let ctx = TestContext::new();
    ctx.provider
        .add_account("a@b.com", "secreto123", RemoteUser::new("u1", "a@b.com"));
    ctx.state.start().await;
    ctx.state
        .auth()
        .sign_in(&identifier("a@b.com"), SecretString::from("secreto123"))
        .await;
    ctx.provider.set_sign_out_fails(true);

    let outcome = ctx.state.sign_out().await;
    assert!(!outcome.is_success());
    assert!(ctx.state.users().is_logged_in());
}

#[tokio::test]
async fn test_remote_sign_out_event_logs_out() {
    let ctx = TestContext::new();
    ctx.provider
        .add_account("a@b.com", "secreto123", RemoteUser::new("u1", "a@b.com"));
    ctx.state.start().await;
    ctx.state
        .auth()
        .sign_in(&identifier("a@b.com"), SecretString::from("secreto123"))
        .await;
    ctx.settle().await;

    assert_eq!(ctx.provider.emit(AuthEvent::SignedOut), 1);
    ctx.settle().await;

    assert!(!ctx.state.users().is_logged_in());
    assert!(ctx.state.users().profile().is_none());
}

#[tokio::test]
async fn test_probe_restores_existing_session_silently() {
    let mut ctx = TestContext::new();
    ctx.provider
        .set_session(Some(session_for(RemoteUser::new("u2", "c@d.com"))));
    ctx.provider.add_profile(profile_row("u2", "Carla"));

    ctx.state.start().await;

    assert!(ctx.state.auth().is_initialized());
    assert!(ctx.state.users().is_logged_in());
    assert_eq!(ctx.state.users().profile().unwrap().name, "Carla");
    assert!(ctx.take_notifications().is_empty());

    // A later SignedIn for the same user is not processed again
    ctx.provider.emit(AuthEvent::SignedIn {
        user: RemoteUser::new("u2", "c@d.com"),
    });
    ctx.settle().await;
    assert_eq!(ctx.provider.fetch_profile_calls(), 1);
    assert!(ctx.take_notifications().is_empty());
}

#[tokio::test]
async fn test_probe_without_remote_session_clears_stale_login() {
    let ctx = TestContext::new();
    ctx.state.users().login();
    ctx.state.users().update_user_profile(ProfileUpdate {
        name: Some("Ana".to_string()),
        ..ProfileUpdate::default()
    });

    let reloaded = ctx.reload();
    assert!(reloaded.state.users().is_logged_in());

    reloaded.state.start().await;
    assert!(reloaded.state.auth().is_initialized());
    assert!(!reloaded.state.users().is_logged_in());
    assert!(reloaded.state.users().profile().is_none());
}

#[tokio::test]
async fn test_probe_error_keeps_local_state() {
    let ctx = TestContext::new();
    ctx.state.users().login();
    ctx.provider.set_probe_fails(true);

    let reloaded = ctx.reload();
    reloaded.state.start().await;

    assert!(reloaded.state.auth().is_initialized());
    assert!(reloaded.state.users().is_logged_in());
}

#[tokio::test]
async fn test_start_twice_probes_once_and_stop_unsubscribes() {
    let ctx = TestContext::new();
    ctx.state.start().await;
    ctx.state.start().await;
    assert_eq!(ctx.provider.get_session_calls(), 1);
    assert!(ctx.state.auth().is_running());
    assert_eq!(ctx.provider.subscriber_count(), 1);

    ctx.state.stop();
    ctx.settle().await;
    assert!(!ctx.state.auth().is_running());
    assert_eq!(ctx.provider.subscriber_count(), 0);

    ctx.state.users().login();
    assert_eq!(ctx.provider.emit(AuthEvent::SignedOut), 0);
    assert!(ctx.state.users().is_logged_in());
}

#[tokio::test]
async fn test_restart_with_live_session_keeps_account_data() {
    let ctx = TestContext::new();
    ctx.provider
        .add_account("a@b.com", "secreto123", RemoteUser::new("u1", "a@b.com"));
    ctx.state.start().await;
    ctx.state
        .auth()
        .sign_in(&identifier("a@b.com"), SecretString::from("secreto123"))
        .await;
    ctx.settle().await;

    ctx.state.users().add_address(AddressDraft {
        label: "Casa".to_string(),
        ..AddressDraft::default()
    });
    let vitamins = ctx.product(2).unwrap();
    ctx.state
        .users()
        .add_to_favorites(FavoriteDraft::from(&vitamins));

    let reloaded = ctx.reload();
    reloaded.state.start().await;

    let users = reloaded.state.users();
    assert!(users.is_logged_in());
    assert_eq!(users.profile().unwrap().id, "u1");
    assert_eq!(users.addresses(), ctx.state.users().addresses());
    assert_eq!(users.favorites(), ctx.state.users().favorites());
    assert_eq!(users.addresses().len(), 1);
    assert_eq!(users.favorites().len(), 1);
}

#[tokio::test]
async fn test_restart_as_another_account_clears_previous_data() {
    let ctx = TestContext::new();
    ctx.provider
        .add_account("a@b.com", "secreto123", RemoteUser::new("u1", "a@b.com"));
    ctx.state.start().await;
    ctx.state
        .auth()
        .sign_in(&identifier("a@b.com"), SecretString::from("secreto123"))
        .await;
    ctx.settle().await;
    ctx.state.users().add_address(AddressDraft {
        label: "Casa".to_string(),
        ..AddressDraft::default()
    });

    ctx.provider
        .set_session(Some(session_for(RemoteUser::new("u9", "otra@b.com"))));
    let reloaded = ctx.reload();
    reloaded.state.start().await;

    let users = reloaded.state.users();
    assert!(users.is_logged_in());
    assert_eq!(users.profile().unwrap().id, "u9");
    assert!(users.addresses().is_empty());
}

#[tokio::test]
async fn test_start_after_stop_checks_session_again() {
    let ctx = TestContext::new();
    ctx.state.start().await;
    ctx.state.stop();
    ctx.settle().await;

    ctx.provider
        .set_session(Some(session_for(RemoteUser::new("u3", "e@f.com"))));
    ctx.state.start().await;

    assert_eq!(ctx.provider.get_session_calls(), 2);
    assert!(ctx.state.auth().is_running());
    assert_eq!(ctx.provider.subscriber_count(), 1);
    assert!(ctx.state.users().is_logged_in());
}
