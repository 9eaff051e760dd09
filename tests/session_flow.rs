//! End-to-end session scenarios against in-memory storage and a manual clock

use chrono::Duration;
use secrecy::Secret;
use std::sync::Arc;

use chirpy::auth::{
    hash_password, verify_password, AuthService, InMemoryRefreshTokenRepository, ManualClock,
};
use chirpy::configuration::AuthSettings;
use chirpy::error::{AppError, RefreshTokenError, TokenError};
use chirpy::users::InMemoryUserRepository;

const EMAIL: &str = "walt@example.com";
const PASSWORD: &str = "04234";

async fn setup() -> (AuthService, ManualClock) {
    let clock = ManualClock::default();
    let settings = AuthSettings {
        jwt_secret: Secret::new("integration-test-secret-32-bytes-min".to_string()),
        access_token_ttl_secs: 3600,
        refresh_token_ttl_days: 60,
    };
    let service = AuthService::new(
        Arc::new(InMemoryUserRepository::new()),
        Arc::new(InMemoryRefreshTokenRepository::new()),
        Arc::new(clock.clone()),
        &settings,
    );
    service
        .register(EMAIL, PASSWORD)
        .await
        .expect("Failed to register user");
    (service, clock)
}

fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}

#[test]
fn password_hash_round_trip() {
    let first = hash_password(PASSWORD).expect("Failed to hash");
    let second = hash_password(PASSWORD).expect("Failed to hash");

    assert_ne!(first, second);
    assert!(verify_password(PASSWORD, &first).is_ok());
    assert!(verify_password(PASSWORD, &second).is_ok());
    assert!(verify_password("04235", &first).is_err());
}

#[tokio::test]
async fn access_token_expires_while_refresh_token_survives() {
    let (service, clock) = setup().await;

    let session = service
        .login(EMAIL, PASSWORD, None)
        .await
        .expect("Login failed");
    let access_header = bearer(&session.access_token);
    let refresh_header = bearer(&session.refresh_token);

    assert_eq!(
        service.authenticate(Some(&access_header)).unwrap(),
        session.user.id
    );

    clock.advance(Duration::hours(1) + Duration::seconds(1));

    assert!(matches!(
        service.authenticate(Some(&access_header)),
        Err(AppError::Token(TokenError::Expired))
    ));
    let record = service
        .refresh_tokens()
        .lookup(&session.refresh_token)
        .await
        .expect("Refresh token should still resolve");
    assert_eq!(record.user_id, session.user.id);

    let new_access = service
        .refresh(Some(&refresh_header))
        .await
        .expect("Refresh failed");
    assert_eq!(
        service.authenticate(Some(&bearer(&new_access))).unwrap(),
        session.user.id
    );
}

#[tokio::test]
async fn revoked_refresh_token_cannot_refresh() {
    let (service, _) = setup().await;
    let session = service.login(EMAIL, PASSWORD, None).await.unwrap();
    let refresh_header = bearer(&session.refresh_token);

    service.revoke(Some(&refresh_header)).await.expect("Revoke failed");

    let result = service.refresh(Some(&refresh_header)).await;
    assert!(matches!(
        result,
        Err(AppError::RefreshToken(RefreshTokenError::Revoked))
    ));
    assert!(result.unwrap_err().is_unauthenticated());

    // Revoking again is still a success.
    assert!(service.revoke(Some(&refresh_header)).await.is_ok());
}

#[tokio::test]
async fn refresh_token_expires_after_sixty_days() {
    let (service, clock) = setup().await;
    let session = service.login(EMAIL, PASSWORD, None).await.unwrap();
    let refresh_header = bearer(&session.refresh_token);

    clock.advance(Duration::days(59));
    assert!(service.refresh(Some(&refresh_header)).await.is_ok());

    clock.advance(Duration::days(1));
    assert!(matches!(
        service.refresh(Some(&refresh_header)).await,
        Err(AppError::RefreshToken(RefreshTokenError::Expired))
    ));
}

#[tokio::test]
async fn rotated_secret_invalidates_access_tokens() {
    let (service, clock) = setup().await;
    let session = service.login(EMAIL, PASSWORD, None).await.unwrap();

    let rotated = AuthService::new(
        Arc::new(InMemoryUserRepository::new()),
        Arc::new(InMemoryRefreshTokenRepository::new()),
        Arc::new(clock.clone()),
        &AuthSettings {
            jwt_secret: Secret::new("a-different-secret-of-at-least-32-b".to_string()),
            access_token_ttl_secs: 3600,
            refresh_token_ttl_days: 60,
        },
    );

    assert!(matches!(
        rotated.authenticate(Some(&bearer(&session.access_token))),
        Err(AppError::Token(TokenError::SignatureMismatch))
    ));
}
