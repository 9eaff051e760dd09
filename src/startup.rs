use actix_web::dev::Server;
use actix_web::{web, App, HttpServer};
use secrecy::ExposeSecret;
use sqlx::postgres::PgPoolOptions;
use std::net::TcpListener;
use std::sync::Arc;

use crate::auth::{
    AuthService, Clock, InMemoryRefreshTokenRepository, PgRefreshTokenRepository,
    RefreshTokenRepository,
};
use crate::configuration::{Settings, StorageBackend};
use crate::logger::LoggerMiddleware;
use crate::middleware::JwtMiddleware;
use crate::routes::{get_current_user, health_check, login, refresh, register, revoke, revoke_all};
use crate::users::{InMemoryUserRepository, PgUserRepository, UserRepository};

/// Build the auth service on the configured storage backend.
///
/// For `postgres`, connects to the database and runs pending migrations.
pub async fn build_auth_service(
    settings: &Settings,
    clock: Arc<dyn Clock>,
) -> Result<AuthService, sqlx::Error> {
    let (users, refresh_tokens): (Arc<dyn UserRepository>, Arc<dyn RefreshTokenRepository>) =
        match settings.application.storage {
            StorageBackend::Postgres => {
                let pool = PgPoolOptions::new()
                    .max_connections(settings.database.max_connections)
                    .connect(settings.database.connection_string().expose_secret())
                    .await?;
                sqlx::migrate!("./migrations").run(&pool).await?;
                tracing::info!("Database connection pool created and migrated");

                let users: Arc<dyn UserRepository> = Arc::new(PgUserRepository::new(pool.clone()));
                let refresh_tokens: Arc<dyn RefreshTokenRepository> =
                    Arc::new(PgRefreshTokenRepository::new(pool));
                (users, refresh_tokens)
            }
            StorageBackend::Memory => {
                tracing::warn!("Using in-memory storage; users and sessions are lost on restart");
                let users: Arc<dyn UserRepository> = Arc::new(InMemoryUserRepository::new());
                let refresh_tokens: Arc<dyn RefreshTokenRepository> =
                    Arc::new(InMemoryRefreshTokenRepository::new());
                (users, refresh_tokens)
            }
        };

    Ok(AuthService::new(users, refresh_tokens, clock, &settings.auth))
}

pub fn run(listener: TcpListener, auth: AuthService) -> Result<Server, std::io::Error> {
    let auth_data = web::Data::new(auth.clone());

    let server = HttpServer::new(move || {
        App::new()
            .wrap(LoggerMiddleware)
            .app_data(auth_data.clone())
            .service(
                web::scope("/api")
                    // Public routes
                    .route("/healthz", web::get().to(health_check))
                    .route("/users", web::post().to(register))
                    .route("/login", web::post().to(login))
                    .route("/refresh", web::post().to(refresh))
                    .route("/revoke", web::post().to(revoke))
                    // Protected routes (require a valid access token)
                    .service(
                        web::resource("/me")
                            .wrap(JwtMiddleware::new(auth.clone()))
                            .route(web::get().to(get_current_user)),
                    )
                    .service(
                        web::resource("/revoke_all")
                            .wrap(JwtMiddleware::new(auth.clone()))
                            .route(web::post().to(revoke_all)),
                    ),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}
