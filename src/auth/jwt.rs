/// Access Token Issuance and Validation
///
/// Access tokens are HS256 JWTs checked purely by signature and embedded
/// timestamps. Nothing is stored, so they cannot be revoked before expiry;
/// the lifetime is capped at one hour to bound that window.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::auth::claims::Claims;
use crate::error::TokenError;

/// `iss` claim of every token this service issues
pub const ISSUER: &str = "chirpy";

/// Upper bound and default for access token lifetime
pub const MAX_ACCESS_TOKEN_TTL_SECS: i64 = 3600;

/// Clamp a client-requested lifetime to `(0, 1h]`, defaulting to 1h.
pub fn clamp_access_token_ttl(requested_secs: Option<i64>) -> Duration {
    match requested_secs {
        Some(secs) if secs > 0 && secs <= MAX_ACCESS_TOKEN_TTL_SECS => Duration::seconds(secs),
        _ => Duration::seconds(MAX_ACCESS_TOKEN_TTL_SECS),
    }
}

/// Issue a signed access token for `subject`
///
/// # Arguments
/// * `subject` - User's UUID
/// * `secret` - HMAC signing key
/// * `ttl` - Lifetime, already clamped by the caller
/// * `now` - Issue instant
///
/// # Errors
/// Returns `TokenError::Signing` if encoding fails
pub fn issue_access_token(
    subject: &Uuid,
    secret: &[u8],
    ttl: Duration,
    now: DateTime<Utc>,
) -> Result<String, TokenError> {
    let claims = Claims::new(*subject, ISSUER, now, ttl);

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret),
    )
    .map_err(|e| TokenError::Signing(e.to_string()))
}

/// Validate an access token and return its subject
///
/// Expiry is judged against `now`, not the library's own clock, with no
/// leeway.
///
/// # Errors
/// * `SignatureMismatch` - signed with another key or tampered with
/// * `Malformed` - undecodable, missing claims or foreign issuer
/// * `Expired` - `now` is at or past `exp`
/// * `MalformedSubject` - `sub` is not a UUID
pub fn validate_access_token(
    token: &str,
    secret: &[u8],
    now: DateTime<Utc>,
) -> Result<Uuid, TokenError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = false;
    validation.leeway = 0;
    validation.set_issuer(&[ISSUER]);
    validation.set_required_spec_claims(&["exp", "iss", "sub"]);

    let claims = decode::<Claims>(token, &DecodingKey::from_secret(secret), &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::InvalidSignature => TokenError::SignatureMismatch,
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Malformed(e.to_string()),
        })?;

    if claims.is_expired_at(now) {
        return Err(TokenError::Expired);
    }

    claims.user_id()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test-secret-key-at-least-32-characters-long";

    #[test]
    fn test_issue_and_validate_token() {
        let now = Utc::now();
        let user_id = Uuid::new_v4();

        let token = issue_access_token(&user_id, SECRET, Duration::hours(1), now)
            .expect("Failed to issue token");
        let subject = validate_access_token(&token, SECRET, now).expect("Failed to validate");

        assert_eq!(subject, user_id);
    }

    #[test]
    fn test_token_expires_after_ttl() {
        let now = Utc::now();
        let user_id = Uuid::new_v4();
        let token = issue_access_token(&user_id, SECRET, Duration::seconds(1), now).unwrap();

        assert_eq!(validate_access_token(&token, SECRET, now), Ok(user_id));
        assert_eq!(
            validate_access_token(&token, SECRET, now + Duration::seconds(1)),
            Err(TokenError::Expired)
        );
    }

    #[test]
    fn test_wrong_secret() {
        let now = Utc::now();
        let token = issue_access_token(&Uuid::new_v4(), SECRET, Duration::hours(1), now).unwrap();

        assert_eq!(
            validate_access_token(&token, b"a-completely-different-secret-value", now),
            Err(TokenError::SignatureMismatch)
        );
    }

    #[test]
    fn test_tampered_token() {
        let now = Utc::now();
        let token = issue_access_token(&Uuid::new_v4(), SECRET, Duration::hours(1), now).unwrap();

        let tampered = format!("{}X", token);
        assert!(validate_access_token(&tampered, SECRET, now).is_err());
    }

    #[test]
    fn test_garbage_token() {
        assert!(matches!(
            validate_access_token("invalid.token.here", SECRET, Utc::now()),
            Err(TokenError::Malformed(_))
        ));
        assert!(matches!(
            validate_access_token("", SECRET, Utc::now()),
            Err(TokenError::Malformed(_))
        ));
    }

    #[test]
    fn test_deterministic_for_same_inputs() {
        let now = Utc::now();
        let user_id = Uuid::new_v4();

        let first = issue_access_token(&user_id, SECRET, Duration::minutes(5), now).unwrap();
        let second = issue_access_token(&user_id, SECRET, Duration::minutes(5), now).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_malformed_subject() {
        let now = Utc::now();
        let mut claims = Claims::new(Uuid::new_v4(), ISSUER, now, Duration::hours(1));
        claims.sub = "not-a-uuid".to_string();
        let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET)).unwrap();

        assert_eq!(
            validate_access_token(&token, SECRET, now),
            Err(TokenError::MalformedSubject)
        );
    }

    #[test]
    fn test_foreign_issuer() {
        let now = Utc::now();
        let claims = Claims::new(Uuid::new_v4(), "someone-else", now, Duration::hours(1));
        let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET)).unwrap();

        assert!(matches!(
            validate_access_token(&token, SECRET, now),
            Err(TokenError::Malformed(_))
        ));
    }

    #[test]
    fn test_missing_claim_is_rejected() {
        let now = Utc::now();
        let partial = serde_json::json!({
            "iss": ISSUER,
            "sub": Uuid::new_v4().to_string(),
            "iat": now.timestamp(),
        });
        let token = encode(&Header::default(), &partial, &EncodingKey::from_secret(SECRET)).unwrap();

        assert!(matches!(
            validate_access_token(&token, SECRET, now),
            Err(TokenError::Malformed(_))
        ));
    }

    #[test]
    fn test_clamp_access_token_ttl() {
        assert_eq!(clamp_access_token_ttl(None), Duration::hours(1));
        assert_eq!(clamp_access_token_ttl(Some(0)), Duration::hours(1));
        assert_eq!(clamp_access_token_ttl(Some(-5)), Duration::hours(1));
        assert_eq!(clamp_access_token_ttl(Some(60)), Duration::seconds(60));
        assert_eq!(clamp_access_token_ttl(Some(3600)), Duration::hours(1));
        assert_eq!(clamp_access_token_ttl(Some(86_400)), Duration::hours(1));
    }
}
