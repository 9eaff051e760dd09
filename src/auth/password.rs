/// Password Hashing and Verification
///
/// Turns plaintext passwords into bcrypt hashes and checks plaintext against
/// a stored hash. Every hash carries its own random salt and cost factor.

use bcrypt::{hash, verify, DEFAULT_COST};
use tracing::Span;

use crate::error::CredentialError;

/// Valid bcrypt hash of a throwaway value, used to equalize login timing
/// when no user matches the supplied email.
const DUMMY_HASH: &str = "$2a$12$R9h/cIPz0gi.URNNX3kh2OPST9/PgBkqquzi.Ss7KIUgO2t0jWMUW";

/// bcrypt only reads the first 72 bytes of its input; longer passwords are
/// refused instead of silently truncated.
pub const MAX_PASSWORD_BYTES: usize = 72;

/// Hash a password using bcrypt at the default cost
///
/// # Errors
/// Returns `HashingFailure` if the password is longer than
/// `MAX_PASSWORD_BYTES` or bcrypt cannot produce a hash
pub fn hash_password(password: &str) -> Result<String, CredentialError> {
    if password.len() > MAX_PASSWORD_BYTES {
        return Err(CredentialError::HashingFailure(format!(
            "password exceeds {} bytes",
            MAX_PASSWORD_BYTES
        )));
    }
    hash(password, DEFAULT_COST).map_err(|e| CredentialError::HashingFailure(e.to_string()))
}

/// Verify a password against its hash
///
/// A wrong password, a password longer than `MAX_PASSWORD_BYTES` and an
/// unparseable hash all return `Mismatch`.
pub fn verify_password(password: &str, password_hash: &str) -> Result<(), CredentialError> {
    if password.len() > MAX_PASSWORD_BYTES {
        dummy_verify(password);
        return Err(CredentialError::Mismatch);
    }
    match verify(password, password_hash) {
        Ok(true) => Ok(()),
        Ok(false) => Err(CredentialError::Mismatch),
        Err(e) => {
            tracing::warn!(error = %e, "Stored password hash could not be verified");
            Err(CredentialError::Mismatch)
        }
    }
}

/// Spend one verification's worth of work without a real hash.
pub fn dummy_verify(password: &str) {
    // Only the time spent matters; the result is ignored.
    let _ = verify(password, DUMMY_HASH);
}

/// `hash_password` on the blocking thread pool
pub async fn hash_password_blocking(password: String) -> Result<String, CredentialError> {
    spawn_blocking_with_tracing(move || hash_password(&password))
        .await
        .map_err(|e| CredentialError::HashingFailure(e.to_string()))?
}

/// `verify_password` on the blocking thread pool.
///
/// Without a stored hash the dummy verification runs instead and the result
/// is always `Mismatch`.
pub async fn verify_password_blocking(
    password: String,
    password_hash: Option<String>,
) -> Result<(), CredentialError> {
    spawn_blocking_with_tracing(move || match password_hash {
        Some(password_hash) => verify_password(&password, &password_hash),
        None => {
            dummy_verify(&password);
            Err(CredentialError::Mismatch)
        }
    })
    .await
    .map_err(|e| CredentialError::HashingFailure(e.to_string()))?
}

fn spawn_blocking_with_tracing<F, R>(f: F) -> tokio::task::JoinHandle<R>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    let current_span = Span::current();
    tokio::task::spawn_blocking(move || current_span.in_scope(f))
}
