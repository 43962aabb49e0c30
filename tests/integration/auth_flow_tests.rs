//! End-to-end session lifecycle through the session manager
use backend_lib::auth::PASSWORD_POLICY_MESSAGE;
use backend_lib::error::AppError;
use backend_lib::storage::{NewCredential, RefreshTokenStore, UserStore};
use bookstore_common::{ChangePasswordRequest, Role, SignInRequest, SignUpRequest, BEARER};
use chrono::Utc;
use scrypt::password_hash::{rand_core::OsRng, PasswordHasher, SaltString};
use scrypt::Scrypt;

use crate::test_utils::*;

fn sign_in_alice() -> SignInRequest {
    SignInRequest {
        email: ALICE_EMAIL.to_string(),
        password: ALICE_PASSWORD.to_string(),
    }
}

#[tokio::test]
async fn test_alice_session_lifecycle() {
    let env = setup_test_env();
    let sessions = env.sessions();

    let alice = sessions.sign_up(alice()).await.unwrap();
    assert_eq!(alice.role, Role::User);

    let first = sessions.sign_in(sign_in_alice()).await.unwrap();
    assert_eq!(first.token_type, BEARER);
    assert!(first.expires_at > Utc::now());

    let claims = sessions.verify_access_token(&first.access_token).unwrap();
    assert_eq!(claims.sub, alice.id);
    assert_eq!(claims.email, ALICE_EMAIL);

    let second = sessions.refresh(&first.refresh_token).await.unwrap();
    assert_ne!(second.refresh_token, first.refresh_token);

    // The rotated token is single use
    let replay = sessions.refresh(&first.refresh_token).await.unwrap_err();
    assert!(matches!(replay, AppError::Auth(_)));

    sessions.logout(alice.id, &second.refresh_token).await.unwrap();

    let again = sessions.logout(alice.id, &second.refresh_token).await.unwrap_err();
    assert!(matches!(again, AppError::NotFound(_)));

    // Logged-out token can no longer be refreshed
    let after_logout = sessions.refresh(&second.refresh_token).await.unwrap_err();
    assert!(matches!(after_logout, AppError::Auth(_)));
}

#[tokio::test]
async fn test_duplicate_sign_up_conflicts() {
    let env = setup_test_env();
    let sessions = env.sessions();

    sessions.sign_up(alice()).await.unwrap();
    let err = sessions.sign_up(alice()).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    // Email matching is exact, so a differently cased address is a new identity
    let mut shouting = alice();
    shouting.email = "ALICE@example.com".to_string();
    assert!(sessions.sign_up(shouting).await.is_ok());
}

#[tokio::test]
async fn test_sign_up_validation() {
    let env = setup_test_env();
    let sessions = env.sessions();

    let mut weak = alice();
    weak.password = "password".to_string();
    match sessions.sign_up(weak).await.unwrap_err() {
        AppError::PolicyViolation(msg) => assert_eq!(msg, PASSWORD_POLICY_MESSAGE),
        other => panic!("unexpected error: {other:?}"),
    }

    let mut bad_email = alice();
    bad_email.email = "not-an-email".to_string();
    assert!(matches!(
        sessions.sign_up(bad_email).await.unwrap_err(),
        AppError::InvalidInput(_)
    ));

    let empty = SignUpRequest::default();
    assert!(matches!(
        sessions.sign_up(empty).await.unwrap_err(),
        AppError::InvalidInput(_)
    ));
}

#[tokio::test]
async fn test_sign_in_failures() {
    let env = setup_test_env();
    let sessions = env.sessions();
    sessions.sign_up(alice()).await.unwrap();

    let unknown = sessions
        .sign_in(SignInRequest {
            email: "bob@example.com".to_string(),
            password: ALICE_PASSWORD.to_string(),
        })
        .await
        .unwrap_err();
    assert!(matches!(unknown, AppError::Auth(_)));

    let wrong = sessions
        .sign_in(SignInRequest {
            email: ALICE_EMAIL.to_string(),
            password: "Wrong#2024".to_string(),
        })
        .await
        .unwrap_err();
    assert!(matches!(wrong, AppError::Auth(_)));

    let blank = sessions.sign_in(SignInRequest::default()).await.unwrap_err();
    assert!(matches!(blank, AppError::InvalidInput(_)));
}

#[tokio::test]
async fn test_sign_in_revokes_prior_lineage() {
    let env = setup_test_env();
    let sessions = env.sessions();
    let alice = sessions.sign_up(alice()).await.unwrap();

    let first = sessions.sign_in(sign_in_alice()).await.unwrap();
    let second = sessions.sign_in(sign_in_alice()).await.unwrap();

    let stale = env.refresh_tokens.find_by_value(&first.refresh_token).await.unwrap().unwrap();
    assert!(stale.revoked);
    assert!(sessions.refresh(&first.refresh_token).await.is_err());

    let active = env.refresh_tokens.list_active_for_user(alice.id).await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].token, second.refresh_token);
}

#[tokio::test]
async fn test_multiple_sessions_when_single_session_disabled() {
    let mut settings = test_settings();
    settings.auth.single_session = false;
    let env = setup_test_env_with(settings);
    let sessions = env.sessions();
    let alice = sessions.sign_up(alice()).await.unwrap();

    let first = sessions.sign_in(sign_in_alice()).await.unwrap();
    sessions.sign_in(sign_in_alice()).await.unwrap();

    let active = env.refresh_tokens.list_active_for_user(alice.id).await.unwrap();
    assert_eq!(active.len(), 2);
    assert!(sessions.refresh(&first.refresh_token).await.is_ok());
}

#[tokio::test]
async fn test_expired_refresh_token_rejected() {
    let mut settings = test_settings();
    settings.auth.refresh_token_ttl_secs = -1;
    let env = setup_test_env_with(settings);
    let sessions = env.sessions();
    sessions.sign_up(alice()).await.unwrap();

    let tokens = sessions.sign_in(sign_in_alice()).await.unwrap();

    let entry = env.refresh_tokens.find_by_value(&tokens.refresh_token).await.unwrap().unwrap();
    assert!(!entry.revoked);

    let err = sessions.refresh(&tokens.refresh_token).await.unwrap_err();
    assert!(matches!(err, AppError::Auth(_)));
}

#[tokio::test]
async fn test_refresh_rejections_are_uniform() {
    let env = setup_test_env();
    let sessions = env.sessions();
    sessions.sign_up(alice()).await.unwrap();
    let tokens = sessions.sign_in(sign_in_alice()).await.unwrap();
    sessions.refresh(&tokens.refresh_token).await.unwrap();

    let unknown = sessions.refresh("no-such-token").await.unwrap_err();
    let revoked = sessions.refresh(&tokens.refresh_token).await.unwrap_err();
    assert_eq!(unknown.to_string(), revoked.to_string());

    assert!(matches!(sessions.refresh("  ").await.unwrap_err(), AppError::InvalidInput(_)));
}

#[tokio::test]
async fn test_logout_unknown_or_foreign_token() {
    let env = setup_test_env();
    let sessions = env.sessions();
    let alice = sessions.sign_up(alice()).await.unwrap();
    let bob = sessions
        .sign_up(SignUpRequest {
            name: "Bob".to_string(),
            email: "bob@example.com".to_string(),
            password: "Bobby#2024".to_string(),
        })
        .await
        .unwrap();

    let unknown = sessions.logout(alice.id, "no-such-token").await.unwrap_err();
    assert!(matches!(unknown, AppError::NotFound(_)));

    let tokens = sessions.sign_in(sign_in_alice()).await.unwrap();
    let foreign = sessions.logout(bob.id, &tokens.refresh_token).await.unwrap_err();
    assert!(matches!(foreign, AppError::NotFound(_)));

    // Alice's token survived Bob's attempt
    assert!(sessions.refresh(&tokens.refresh_token).await.is_ok());
}

#[tokio::test]
async fn test_access_token_outlives_logout() {
    let env = setup_test_env();
    let sessions = env.sessions();
    let alice = sessions.sign_up(alice()).await.unwrap();
    let tokens = sessions.sign_in(sign_in_alice()).await.unwrap();

    sessions.logout(alice.id, &tokens.refresh_token).await.unwrap();

    assert!(sessions.verify_access_token(&tokens.access_token).is_ok());
}

#[tokio::test]
async fn test_sign_in_lockout() {
    let mut settings = test_settings();
    settings.rate_limit.max_failed_attempts = 3;
    let env = setup_test_env_with(settings);
    let sessions = env.sessions();
    sessions.sign_up(alice()).await.unwrap();

    for _ in 0..3 {
        let err = sessions
            .sign_in(SignInRequest {
                email: ALICE_EMAIL.to_string(),
                password: "Wrong#2024".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Auth(_)));
    }

    // Even the right password is refused while locked
    let locked = sessions.sign_in(sign_in_alice()).await.unwrap_err();
    assert!(matches!(locked, AppError::RateLimitExceeded));
}

#[tokio::test]
async fn test_change_password() {
    let env = setup_test_env();
    let sessions = env.sessions();
    let alice = sessions.sign_up(alice()).await.unwrap();
    let tokens = sessions.sign_in(sign_in_alice()).await.unwrap();

    let wrong = sessions
        .change_password(
            alice.id,
            ChangePasswordRequest {
                current_password: "Wrong#2024".to_string(),
                new_password: "Fresh#2025".to_string(),
                confirm_new_password: "Fresh#2025".to_string(),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(wrong, AppError::Auth(_)));

    let mismatch = sessions
        .change_password(
            alice.id,
            ChangePasswordRequest {
                current_password: ALICE_PASSWORD.to_string(),
                new_password: "Fresh#2025".to_string(),
                confirm_new_password: "Fresh#2026".to_string(),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(mismatch, AppError::InvalidInput(_)));

    sessions
        .change_password(
            alice.id,
            ChangePasswordRequest {
                current_password: ALICE_PASSWORD.to_string(),
                new_password: "Fresh#2025".to_string(),
                confirm_new_password: "Fresh#2025".to_string(),
            },
        )
        .await
        .unwrap();

    // Existing sessions end with the old password
    assert!(sessions.refresh(&tokens.refresh_token).await.is_err());
    assert!(sessions.sign_in(sign_in_alice()).await.is_err());
    assert!(sessions
        .sign_in(SignInRequest {
            email: ALICE_EMAIL.to_string(),
            password: "Fresh#2025".to_string(),
        })
        .await
        .is_ok());
}

#[tokio::test]
async fn test_purge_expired() {
    let mut settings = test_settings();
    settings.auth.refresh_token_ttl_secs = -1;
    let env = setup_test_env_with(settings);
    let sessions = env.sessions();
    sessions.sign_up(alice()).await.unwrap();
    sessions.sign_in(sign_in_alice()).await.unwrap();

    assert_eq!(env.refresh_tokens.len(), 1);
    assert_eq!(sessions.purge_expired().await.unwrap(), 1);
    assert!(env.refresh_tokens.is_empty());
}

#[tokio::test]
async fn test_change_password_unchanged_when_revocation_fails() {
    let env = setup_test_env();
    let sessions = env.sessions();
    let alice = sessions.sign_up(alice()).await.unwrap();

    env.refresh_tokens.fail_listing(true);
    let err = sessions
        .change_password(
            alice.id,
            ChangePasswordRequest {
                current_password: ALICE_PASSWORD.to_string(),
                new_password: "Fresh#2025".to_string(),
                confirm_new_password: "Fresh#2025".to_string(),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Storage(_)));

    env.refresh_tokens.fail_listing(false);
    assert!(sessions.sign_in(sign_in_alice()).await.is_ok());
}

#[tokio::test]
async fn test_legacy_digest_upgraded_on_sign_in() {
    let env = setup_test_env();
    let salt = SaltString::generate(&mut OsRng);
    let legacy = Scrypt
        .hash_password(ALICE_PASSWORD.as_bytes(), &salt)
        .unwrap()
        .to_string();
    let alice = env
        .users
        .create(NewCredential {
            name: "Alice".to_string(),
            email: ALICE_EMAIL.to_string(),
            password_hash: legacy.clone(),
            role: Role::User,
        })
        .await
        .unwrap();

    let sessions = env.sessions();
    sessions.sign_in(sign_in_alice()).await.unwrap();

    let stored = env.users.find_by_id(alice.id).await.unwrap().unwrap();
    assert_ne!(stored.password_hash, legacy);
    assert!(stored.password_hash.starts_with("$argon2id$"));

    assert!(sessions.sign_in(sign_in_alice()).await.is_ok());
}
