/// Error Handling Module
///
/// Every component of the credential core reports failures through its own
/// domain enum. `AppError` unifies them for the HTTP boundary, where all
/// authentication failures collapse into one uniform 401 response and the
/// specific cause is only written to the log.

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use std::error::Error as StdError;
use std::fmt;

/// ============================================================================
/// 1. DOMAIN-SPECIFIC ERROR TYPES
/// ============================================================================

/// Validation errors for request input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    EmptyField(String),
    TooLong(String, usize),
    InvalidFormat(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::EmptyField(field) => write!(f, "{} is empty", field),
            ValidationError::TooLong(field, max) => {
                write!(f, "{} is too long (maximum {} characters)", field, max)
            }
            ValidationError::InvalidFormat(field) => write!(f, "{} has invalid format", field),
        }
    }
}

impl StdError for ValidationError {}

/// Password hashing and verification errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    /// Wrong password or a stored hash that cannot be verified
    Mismatch,
    HashingFailure(String),
}

impl fmt::Display for CredentialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialError::Mismatch => write!(f, "Credential mismatch"),
            CredentialError::HashingFailure(msg) => write!(f, "Password hashing failed: {}", msg),
        }
    }
}

impl StdError for CredentialError {}

/// Access token errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    SignatureMismatch,
    Expired,
    /// Undecodable token, missing claim or unexpected issuer
    Malformed(String),
    MalformedSubject,
    /// Encoding failure while issuing a token
    Signing(String),
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenError::SignatureMismatch => write!(f, "Token signature is invalid"),
            TokenError::Expired => write!(f, "Token has expired"),
            TokenError::Malformed(msg) => write!(f, "Token is malformed: {}", msg),
            TokenError::MalformedSubject => write!(f, "Token subject is not a user id"),
            TokenError::Signing(msg) => write!(f, "Token signing failed: {}", msg),
        }
    }
}

impl StdError for TokenError {}

/// Refresh token store errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshTokenError {
    NotFound,
    Expired,
    Revoked,
    Storage(String),
}

impl fmt::Display for RefreshTokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefreshTokenError::NotFound => write!(f, "Refresh token not found"),
            RefreshTokenError::Expired => write!(f, "Refresh token has expired"),
            RefreshTokenError::Revoked => write!(f, "Refresh token has been revoked"),
            RefreshTokenError::Storage(msg) => write!(f, "Refresh token storage error: {}", msg),
        }
    }
}

impl StdError for RefreshTokenError {}

/// Authorization header parsing errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BearerError {
    MissingHeader,
    MalformedScheme,
}

impl fmt::Display for BearerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BearerError::MissingHeader => write!(f, "Missing authorization header"),
            BearerError::MalformedScheme => write!(f, "Malformed authorization header"),
        }
    }
}

impl StdError for BearerError {}

/// Persistence collaborator errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    /// Uniqueness constraint violated
    Conflict(String),
    Backend(String),
}

impl fmt::Display for RepositoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepositoryError::Conflict(msg) => write!(f, "Duplicate entry: {}", msg),
            RepositoryError::Backend(msg) => write!(f, "Database error: {}", msg),
        }
    }
}

impl StdError for RepositoryError {}

/// Postgres SQLSTATE for unique_violation
const UNIQUE_VIOLATION: &str = "23505";

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        if let Some(db_err) = err.as_database_error() {
            if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) {
                return RepositoryError::Conflict(db_err.message().to_string());
            }
        }
        RepositoryError::Backend(err.to_string())
    }
}

impl From<RepositoryError> for RefreshTokenError {
    fn from(err: RepositoryError) -> Self {
        RefreshTokenError::Storage(err.to_string())
    }
}

/// ============================================================================
/// 2. UNIFIED APPLICATION ERROR TYPE
/// ============================================================================

#[derive(Debug)]
pub enum AppError {
    Validation(ValidationError),
    Credential(CredentialError),
    Token(TokenError),
    RefreshToken(RefreshTokenError),
    Bearer(BearerError),
    Repository(RepositoryError),
}

impl AppError {
    /// True for every failure that must surface as "unauthenticated"
    pub fn is_unauthenticated(&self) -> bool {
        match self {
            AppError::Credential(CredentialError::Mismatch) => true,
            AppError::Token(TokenError::Signing(_)) => false,
            AppError::Token(_) => true,
            AppError::RefreshToken(RefreshTokenError::Storage(_)) => false,
            AppError::RefreshToken(_) => true,
            AppError::Bearer(_) => true,
            _ => false,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Validation(e) => write!(f, "{}", e),
            AppError::Credential(e) => write!(f, "{}", e),
            AppError::Token(e) => write!(f, "{}", e),
            AppError::RefreshToken(e) => write!(f, "{}", e),
            AppError::Bearer(e) => write!(f, "{}", e),
            AppError::Repository(e) => write!(f, "{}", e),
        }
    }
}

impl StdError for AppError {}

// ============================================================================
// FROM IMPLEMENTATIONS
// ============================================================================

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(err)
    }
}

impl From<CredentialError> for AppError {
    fn from(err: CredentialError) -> Self {
        AppError::Credential(err)
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        AppError::Token(err)
    }
}

impl From<RefreshTokenError> for AppError {
    fn from(err: RefreshTokenError) -> Self {
        AppError::RefreshToken(err)
    }
}

impl From<BearerError> for AppError {
    fn from(err: BearerError) -> Self {
        AppError::Bearer(err)
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        AppError::Repository(err)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Repository(err.into())
    }
}

// ============================================================================
// 3. HTTP RESPONSE MAPPING
// ============================================================================

/// Error response structure for HTTP responses
#[derive(Debug, serde::Serialize)]
pub struct ErrorResponse {
    /// Unique error ID, repeated in the log line
    pub error_id: String,
    pub message: String,
    pub code: String,
    pub status: u16,
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error_id: String, message: String, code: String, status: u16) -> Self {
        Self {
            error_id,
            message,
            code,
            status,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Trait for converting errors to HTTP responses with proper logging
pub trait ErrorHandler {
    fn error_response(&self, error_id: &str) -> (StatusCode, ErrorResponse);
    fn log_error(&self, error_id: &str);
}

impl ErrorHandler for AppError {
    fn error_response(&self, error_id: &str) -> (StatusCode, ErrorResponse) {
        let (status, code, message) = if self.is_unauthenticated() {
            (
                StatusCode::UNAUTHORIZED,
                "UNAUTHENTICATED",
                "Unauthorized".to_string(),
            )
        } else {
            match self {
                AppError::Validation(e) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", e.to_string())
                }
                AppError::Repository(RepositoryError::Conflict(_)) => (
                    StatusCode::CONFLICT,
                    "DUPLICATE_ENTRY",
                    "Resource already exists".to_string(),
                ),
                _ => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "Internal server error".to_string(),
                ),
            }
        };

        let response = ErrorResponse::new(
            error_id.to_string(),
            message,
            code.to_string(),
            status.as_u16(),
        );

        (status, response)
    }

    fn log_error(&self, error_id: &str) {
        if self.is_unauthenticated() {
            tracing::warn!(error_id = error_id, error = %self, "Authentication failed");
            return;
        }
        match self {
            AppError::Validation(e) => {
                tracing::warn!(error_id = error_id, error = %e, "Validation error");
            }
            AppError::Repository(RepositoryError::Conflict(_)) => {
                tracing::warn!(error_id = error_id, error = %self, "Duplicate entry attempt");
            }
            _ => {
                tracing::error!(error_id = error_id, error = %self, "Internal error");
            }
        }
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let error_id = uuid::Uuid::new_v4().to_string();
        self.log_error(&error_id);

        let (status, response) = <Self as ErrorHandler>::error_response(self, &error_id);

        HttpResponse::build(status).json(response)
    }

    fn status_code(&self) -> StatusCode {
        if self.is_unauthenticated() {
            return StatusCode::UNAUTHORIZED;
        }
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Repository(RepositoryError::Conflict(_)) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
