/// Authentication module
///
/// Password hashing, access token issuance/validation, refresh token
/// management, bearer header parsing, and the session flows built on them.

mod bearer;
mod claims;
mod clock;
mod jwt;
mod password;
mod refresh_token;
mod session;

pub use bearer::{authorization_header, bearer_from_headers, extract_bearer};
pub use claims::Claims;
pub use clock::{Clock, ManualClock, SystemClock};
pub use jwt::{
    clamp_access_token_ttl, issue_access_token, validate_access_token, ISSUER,
    MAX_ACCESS_TOKEN_TTL_SECS,
};
pub use password::{
    dummy_verify, hash_password, hash_password_blocking, verify_password,
    verify_password_blocking, MAX_PASSWORD_BYTES,
};
pub use refresh_token::{
    generate_refresh_token, hash_token, InMemoryRefreshTokenRepository,
    PgRefreshTokenRepository, RefreshTokenRecord, RefreshTokenRepository, RefreshTokenStore,
    DEFAULT_REFRESH_TOKEN_TTL_DAYS, MAX_REFRESH_TOKEN_TTL_DAYS,
};
pub use session::{AuthService, Session};
