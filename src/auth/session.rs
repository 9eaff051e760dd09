/// Session flows: register, login, refresh, revoke and request authentication
///
/// `AuthService` composes the password hasher, the access token codec, the
/// refresh token store and the bearer extractor. Every failure it returns is
/// an `AppError`; the HTTP layer collapses the authentication ones into a
/// single 401.

use chrono::Duration;
use secrecy::{ExposeSecret, Secret};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::bearer::extract_bearer;
use crate::auth::clock::Clock;
use crate::auth::jwt::{
    clamp_access_token_ttl, issue_access_token, validate_access_token, MAX_ACCESS_TOKEN_TTL_SECS,
};
use crate::auth::password::{hash_password_blocking, verify_password_blocking};
use crate::auth::refresh_token::{RefreshTokenRepository, RefreshTokenStore};
use crate::configuration::AuthSettings;
use crate::error::{AppError, CredentialError};
use crate::users::{User, UserRepository};
use crate::validators::{is_valid_email, is_valid_password};

/// Result of a successful login
#[derive(Debug, Clone)]
pub struct Session {
    pub user: User,
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserRepository>,
    refresh_tokens: RefreshTokenStore,
    clock: Arc<dyn Clock>,
    jwt_secret: Secret<String>,
    access_token_ttl: Duration,
    refresh_token_ttl: Duration,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        refresh_token_repository: Arc<dyn RefreshTokenRepository>,
        clock: Arc<dyn Clock>,
        settings: &AuthSettings,
    ) -> Self {
        Self {
            users,
            refresh_tokens: RefreshTokenStore::new(refresh_token_repository, clock.clone()),
            clock,
            jwt_secret: settings.jwt_secret.clone(),
            access_token_ttl: settings.access_token_ttl(),
            refresh_token_ttl: settings.refresh_token_ttl(),
        }
    }

    pub fn refresh_tokens(&self) -> &RefreshTokenStore {
        &self.refresh_tokens
    }

    fn secret(&self) -> &[u8] {
        self.jwt_secret.expose_secret().as_bytes()
    }

    /// Create a user, hashing the password off the async workers.
    pub async fn register(&self, email: &str, password: &str) -> Result<User, AppError> {
        let email = is_valid_email(email)?;
        is_valid_password(password)?;

        let password_hash = hash_password_blocking(password.to_string()).await?;
        let user = self.users.create_user(&email, &password_hash).await?;

        tracing::info!(user_id = %user.id, "User registered");
        Ok(user)
    }

    /// Verify credentials and mint an access token and a refresh token.
    ///
    /// `expires_in_seconds` is advisory: it is clamped to at most one hour
    /// and never exceeds the configured access token lifetime.
    ///
    /// Unknown email and wrong password are indistinguishable, in result and
    /// in the amount of hashing work done.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        expires_in_seconds: Option<i64>,
    ) -> Result<Session, AppError> {
        let email = email.trim().to_lowercase();
        let user = self.users.get_user_by_email(&email).await?;

        let stored_hash = user.as_ref().map(|u| u.password_hash.clone());
        verify_password_blocking(password.to_string(), stored_hash).await?;
        let user = user.ok_or(CredentialError::Mismatch)?;

        let ttl = clamp_access_token_ttl(expires_in_seconds).min(self.access_token_ttl);
        let access_token = issue_access_token(&user.id, self.secret(), ttl, self.clock.now())?;
        let refresh_token = self
            .refresh_tokens
            .issue(user.id, self.refresh_token_ttl)
            .await?;

        tracing::info!(user_id = %user.id, "User logged in");
        Ok(Session {
            user,
            access_token,
            refresh_token,
        })
    }

    /// Mint a one-hour access token from a `Bearer <refresh token>` header.
    ///
    /// The refresh token stays valid afterwards.
    pub async fn refresh(&self, authorization_header: Option<&str>) -> Result<String, AppError> {
        let token = extract_bearer(authorization_header)?;
        let record = self.refresh_tokens.lookup(token).await?;

        let access_token = issue_access_token(
            &record.user_id,
            self.secret(),
            Duration::seconds(MAX_ACCESS_TOKEN_TTL_SECS),
            self.clock.now(),
        )?;

        tracing::info!(user_id = %record.user_id, "Access token refreshed");
        Ok(access_token)
    }

    /// Revoke the refresh token in a `Bearer <refresh token>` header.
    pub async fn revoke(&self, authorization_header: Option<&str>) -> Result<(), AppError> {
        let token = extract_bearer(authorization_header)?;
        self.refresh_tokens.revoke(token).await?;
        Ok(())
    }

    /// Revoke every refresh token held by `user_id`.
    pub async fn revoke_all(&self, user_id: Uuid) -> Result<u64, AppError> {
        Ok(self.refresh_tokens.revoke_all_for_user(user_id).await?)
    }

    /// Resolve a `Bearer <access token>` header to the user it names.
    pub fn authenticate(&self, authorization_header: Option<&str>) -> Result<Uuid, AppError> {
        let token = extract_bearer(authorization_header)?;
        Ok(validate_access_token(token, self.secret(), self.clock.now())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::clock::ManualClock;
    use crate::auth::refresh_token::InMemoryRefreshTokenRepository;
    use crate::error::{BearerError, RefreshTokenError, TokenError};
    use crate::users::InMemoryUserRepository;

    fn service() -> (AuthService, ManualClock) {
        let clock = ManualClock::default();
        let settings = AuthSettings {
            jwt_secret: Secret::new("unit-test-secret-that-is-32-bytes!!".to_string()),
            access_token_ttl_secs: 3600,
            refresh_token_ttl_days: 60,
        };
        let service = AuthService::new(
            Arc::new(InMemoryUserRepository::new()),
            Arc::new(InMemoryRefreshTokenRepository::new()),
            Arc::new(clock.clone()),
            &settings,
        );
        (service, clock)
    }

    fn bearer(token: &str) -> String {
        format!("Bearer {}", token)
    }

    #[tokio::test]
    async fn test_register_rejects_bad_input() {
        let (service, _) = service();

        assert!(matches!(
            service.register("not-an-email", "pw").await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            service.register("a@b.co", "").await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_login_with_correct_password() {
        let (service, _) = service();
        let user = service.register("Walt@Example.com", "04234").await.unwrap();

        let session = service.login("walt@example.com", "04234", None).await.unwrap();

        assert_eq!(session.user.id, user.id);
        let subject = service
            .authenticate(Some(&bearer(&session.access_token)))
            .unwrap();
        assert_eq!(subject, user.id);
    }

    #[tokio::test]
    async fn test_wrong_password_and_unknown_email_look_the_same() {
        let (service, _) = service();
        service.register("walt@example.com", "04234").await.unwrap();

        let wrong_password = service.login("walt@example.com", "nope", None).await;
        let unknown_email = service.login("jesse@example.com", "04234", None).await;

        assert!(matches!(
            wrong_password,
            Err(AppError::Credential(CredentialError::Mismatch))
        ));
        assert!(matches!(
            unknown_email,
            Err(AppError::Credential(CredentialError::Mismatch))
        ));
    }

    #[tokio::test]
    async fn test_requested_ttl_is_clamped() {
        let (service, clock) = service();
        service.register("walt@example.com", "04234").await.unwrap();

        let short = service
            .login("walt@example.com", "04234", Some(60))
            .await
            .unwrap();
        let long = service
            .login("walt@example.com", "04234", Some(86_400))
            .await
            .unwrap();

        clock.advance(Duration::seconds(61));
        assert!(matches!(
            service.authenticate(Some(&bearer(&short.access_token))),
            Err(AppError::Token(TokenError::Expired))
        ));
        assert!(service.authenticate(Some(&bearer(&long.access_token))).is_ok());

        clock.advance(Duration::seconds(3600));
        assert!(matches!(
            service.authenticate(Some(&bearer(&long.access_token))),
            Err(AppError::Token(TokenError::Expired))
        ));
    }

    #[tokio::test]
    async fn test_login_refuses_suffix_past_bcrypt_limit() {
        let (service, _) = service();
        let password = "p".repeat(72);
        service.register("walt@example.com", &password).await.unwrap();

        assert!(service.login("walt@example.com", &password, None).await.is_ok());
        assert!(matches!(
            service
                .login("walt@example.com", &format!("{}EXTRA", password), None)
                .await,
            Err(AppError::Credential(CredentialError::Mismatch))
        ));
    }

    #[tokio::test]
    async fn test_refreshed_access_token_lives_one_hour() {
        let clock = ManualClock::default();
        let service = AuthService::new(
            Arc::new(InMemoryUserRepository::new()),
            Arc::new(InMemoryRefreshTokenRepository::new()),
            Arc::new(clock.clone()),
            &AuthSettings {
                jwt_secret: Secret::new("unit-test-secret-that-is-32-bytes!!".to_string()),
                access_token_ttl_secs: 60,
                refresh_token_ttl_days: 60,
            },
        );
        service.register("walt@example.com", "04234").await.unwrap();
        let session = service.login("walt@example.com", "04234", None).await.unwrap();

        let access = service
            .refresh(Some(&bearer(&session.refresh_token)))
            .await
            .unwrap();

        clock.advance(Duration::seconds(3599));
        assert!(service.authenticate(Some(&bearer(&access))).is_ok());
        assert!(matches!(
            service.authenticate(Some(&bearer(&session.access_token))),
            Err(AppError::Token(TokenError::Expired))
        ));

        clock.advance(Duration::seconds(1));
        assert!(matches!(
            service.authenticate(Some(&bearer(&access))),
            Err(AppError::Token(TokenError::Expired))
        ));
    }

    #[tokio::test]
    async fn test_refresh_does_not_rotate() {
        let (service, _) = service();
        service.register("walt@example.com", "04234").await.unwrap();
        let session = service.login("walt@example.com", "04234", None).await.unwrap();
        let header = bearer(&session.refresh_token);

        let first = service.refresh(Some(&header)).await.unwrap();
        let second = service.refresh(Some(&header)).await.unwrap();

        assert!(service.authenticate(Some(&bearer(&first))).is_ok());
        assert!(service.authenticate(Some(&bearer(&second))).is_ok());
    }

    #[tokio::test]
    async fn test_refresh_and_revoke_need_bearer_header() {
        let (service, _) = service();

        assert!(matches!(
            service.refresh(None).await,
            Err(AppError::Bearer(BearerError::MissingHeader))
        ));
        assert!(matches!(
            service.revoke(Some("Token abc")).await,
            Err(AppError::Bearer(BearerError::MalformedScheme))
        ));
        assert!(matches!(
            service.refresh(Some("Bearer unknown")).await,
            Err(AppError::RefreshToken(RefreshTokenError::NotFound))
        ));
    }

    #[tokio::test]
    async fn test_access_token_is_not_a_refresh_token() {
        let (service, _) = service();
        service.register("walt@example.com", "04234").await.unwrap();
        let session = service.login("walt@example.com", "04234", None).await.unwrap();

        assert!(service
            .refresh(Some(&bearer(&session.access_token)))
            .await
            .is_err());
        assert!(service
            .authenticate(Some(&bearer(&session.refresh_token)))
            .is_err());
    }

    #[tokio::test]
    async fn test_revoke_all_logs_out_every_session() {
        let (service, _) = service();
        let user = service.register("walt@example.com", "04234").await.unwrap();
        let phone = service.login("walt@example.com", "04234", None).await.unwrap();
        let laptop = service.login("walt@example.com", "04234", None).await.unwrap();

        assert_eq!(service.revoke_all(user.id).await.unwrap(), 2);

        for session in [phone, laptop] {
            assert!(matches!(
                service.refresh(Some(&bearer(&session.refresh_token))).await,
                Err(AppError::RefreshToken(RefreshTokenError::Revoked))
            ));
        }
    }
}
