/// Authentication Routes
///
/// Thin adapters from HTTP to `AuthService`. Every authentication failure
/// leaves here as the same 401 body; see `AppError`'s `ResponseError` impl.

use actix_web::{web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::auth::{authorization_header, AuthService};
use crate::error::AppError;
use crate::middleware::AuthenticatedUser;
use crate::users::UserResponse;

/// User registration request
#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

/// User login request
#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    /// Advisory access token lifetime, clamped to one hour
    pub expires_in_seconds: Option<i64>,
}

/// Login response: the user plus both tokens
#[derive(Serialize)]
pub struct LoginResponse {
    #[serde(flatten)]
    pub user: UserResponse,
    pub token: String,
    pub refresh_token: String,
}

#[derive(Serialize)]
pub struct RefreshResponse {
    pub token: String,
}

#[derive(Serialize)]
pub struct RevokeAllResponse {
    pub revoked: u64,
}

#[derive(Serialize)]
pub struct CurrentUserResponse {
    pub id: String,
}

/// POST /api/users
///
/// # Errors
/// - 400: invalid email or empty password
/// - 409: email already registered
pub async fn register(
    form: web::Json<RegisterRequest>,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let user = auth.register(&form.email, &form.password).await?;

    Ok(HttpResponse::Created().json(UserResponse::from(&user)))
}

/// POST /api/login
///
/// Unknown email and wrong password both answer 401.
pub async fn login(
    form: web::Json<LoginRequest>,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let session = auth
        .login(&form.email, &form.password, form.expires_in_seconds)
        .await?;

    Ok(HttpResponse::Ok().json(LoginResponse {
        user: UserResponse::from(&session.user),
        token: session.access_token,
        refresh_token: session.refresh_token,
    }))
}

/// POST /api/refresh
///
/// Requires `Authorization: Bearer <refresh_token>`. The refresh token is
/// not rotated.
pub async fn refresh(
    req: HttpRequest,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let header = authorization_header(req.headers())?;
    let token = auth.refresh(header).await?;

    Ok(HttpResponse::Ok().json(RefreshResponse { token }))
}

/// POST /api/revoke
///
/// Requires `Authorization: Bearer <refresh_token>`. Revoking a token twice
/// still answers 204.
pub async fn revoke(
    req: HttpRequest,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let header = authorization_header(req.headers())?;
    auth.revoke(header).await?;

    Ok(HttpResponse::NoContent().finish())
}

/// POST /api/revoke_all
///
/// Protected. Revokes every refresh token of the caller.
pub async fn revoke_all(
    user: web::ReqData<AuthenticatedUser>,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let revoked = auth.revoke_all(user.0).await?;

    Ok(HttpResponse::Ok().json(RevokeAllResponse { revoked }))
}

/// GET /api/me
///
/// Protected. Returns the id carried by the caller's access token.
pub async fn get_current_user(user: web::ReqData<AuthenticatedUser>) -> HttpResponse {
    HttpResponse::Ok().json(CurrentUserResponse {
        id: user.0.to_string(),
    })
}
