//! Auth dialogs driven through the storefront state.

#![allow(clippy::unwrap_used)]

use farmacia_core::Gender;
use farmacia_integration_tests::TestContext;
use farmacia_storefront::models::session::RemoteUser;
use farmacia_storefront::services::auth::{AuthOutcome, RegistrationForm};
use farmacia_storefront::services::notifications::NotificationLevel;
use farmacia_storefront::ui::{DialogKind, LoginStep};
use secrecy::SecretString;

fn registration(email: &str) -> RegistrationForm {
    RegistrationForm {
        name: "Luis".to_string(),
        surname: "Pérez".to_string(),
        email: email.to_string(),
        password: SecretString::from("clave-segura"),
        document_number: "V20111222".to_string(),
        phone_prefix: "0414".to_string(),
        phone_number: "5550123".to_string(),
        gender: Gender::Male,
        accept_terms: true,
        ..RegistrationForm::default()
    }
}

#[tokio::test]
async fn test_login_dialog_signs_in_and_closes() {
    let ctx = TestContext::new();
    ctx.provider
        .add_account("a@b.com", "secreto123", RemoteUser::new("u1", "a@b.com"));
    ctx.state.start().await;

    ctx.state.open_dialog(DialogKind::Login);
    ctx.state
        .with_dialog(|dialog| dialog.submit_identifier("a@b.com"))
        .unwrap();
    assert!(matches!(
        ctx.state.dialog().login_step(),
        LoginStep::Password { .. }
    ));

    let outcome = ctx.state.sign_in(SecretString::from("secreto123")).await;
    assert!(outcome.is_success());
    assert!(!ctx.state.dialog().is_open());
    assert!(ctx.state.users().is_logged_in());
}

#[tokio::test]
async fn test_login_dialog_stays_open_on_failure() {
    let ctx = TestContext::new();
    ctx.state.start().await;

    ctx.state.open_dialog(DialogKind::Login);
    let outcome = ctx.state.sign_in(SecretString::from("secreto123")).await;
    assert!(!outcome.is_success());

    ctx.state
        .with_dialog(|dialog| dialog.submit_identifier("nadie@farmacia.com"))
        .unwrap();
    let outcome = ctx.state.sign_in(SecretString::from("secreto123")).await;
    assert_eq!(
        outcome,
        AuthOutcome::Failed {
            message: "Invalid credentials".to_string()
        }
    );
    let dialog = ctx.state.dialog();
    assert!(dialog.is_open());
    assert!(dialog.identifier().is_some());
}

#[tokio::test]
async fn test_register_dialog_creates_account_and_profile() {
    let mut ctx = TestContext::new();
    ctx.state.start().await;
    ctx.state.open_dialog(DialogKind::Register);

    let outcome = ctx.state.sign_up(registration("luis@farmacia.com")).await;
    assert!(outcome.is_success());
    assert!(!ctx.state.dialog().is_open());

    let profile = ctx.state.users().profile().unwrap();
    assert_eq!(profile.name, "Luis");
    assert_eq!(profile.surname, "Pérez");
    assert_eq!(profile.phone_prefix, "0414");
    assert_eq!(profile.phone_number, "5550123");
    assert_eq!(profile.gender, Gender::Male);

    let titles: Vec<String> = ctx
        .take_notifications()
        .into_iter()
        .map(|n| n.title)
        .collect();
    assert!(titles.contains(&"Account created".to_string()));
}

#[tokio::test]
async fn test_register_with_email_confirmation_stays_anonymous() {
    let mut ctx = TestContext::new();
    ctx.provider.set_confirm_email(true);
    ctx.state.start().await;
    ctx.state.open_dialog(DialogKind::Register);

    let outcome = ctx.state.sign_up(registration("luis@farmacia.com")).await;
    assert!(outcome.is_success());
    assert!(!ctx.state.users().is_logged_in());

    let notifications = ctx.take_notifications();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].level, NotificationLevel::Info);
}

#[tokio::test]
async fn test_register_rejects_duplicates_and_invalid_forms() {
    let ctx = TestContext::new();
    ctx.provider
        .add_account("luis@farmacia.com", "otra-clave", RemoteUser::new("u1", "luis@farmacia.com"));
    ctx.state.start().await;
    ctx.state.open_dialog(DialogKind::Register);

    let outcome = ctx.state.sign_up(registration("luis@farmacia.com")).await;
    assert_eq!(
        outcome,
        AuthOutcome::Failed {
            message: "An account with this email already exists".to_string()
        }
    );

    let mut form = registration("nuevo@farmacia.com");
    form.accept_terms = false;
    let outcome = ctx.state.sign_up(form).await;
    assert_eq!(
        outcome,
        AuthOutcome::Failed {
            message: "You must accept the terms and conditions".to_string()
        }
    );
    assert!(ctx.state.dialog().is_open());
    assert!(!ctx.state.users().is_logged_in());
}

#[tokio::test]
async fn test_recovery_dialog_requests_reset() {
    let ctx = TestContext::new();
    ctx.state.open_dialog(DialogKind::Recovery);

    let outcome = ctx.state.request_password_reset("no es un correo").await;
    assert!(!outcome.is_success());
    assert!(ctx.state.dialog().is_open());

    let outcome = ctx.state.request_password_reset("a@b.com").await;
    assert!(outcome.is_success());
    assert!(!ctx.state.dialog().is_open());
    assert_eq!(ctx.provider.reset_requests(), vec!["a@b.com".to_string()]);
}
