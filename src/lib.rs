use std::path::PathBuf;

use actix_cors::Cors;
use actix_identity::IdentityMiddleware;
use actix_multipart::form::{MultipartFormConfig, tempfile::TempFileConfig};
use actix_session::{SessionMiddleware, storage::CookieSessionStore};
use actix_web::{App, HttpServer, cookie::Key, middleware::Logger, web};

use crate::domain::UploadRoot;
use crate::middleware::RedirectUnauthorized;
use crate::models::config::ServerConfig;
use crate::services::files::FileService;

pub mod domain;
pub mod dto;
pub mod forms;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

/// Role a user needs to upload files.
pub const SERVICE_ACCESS_ROLE: &str = "files";

/// Upper bound for a whole multipart upload body.
const UPLOAD_TOTAL_LIMIT: usize = 1024 * 1024 * 1024;

/// Build and run the HTTP server until it is stopped.
pub async fn run(server_config: ServerConfig) -> std::io::Result<()> {
    let secret_key = Key::try_from(server_config.secret.as_bytes()).map_err(|err| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("secret must be at least 64 bytes: {err}"),
        )
    })?;

    let upload_path = PathBuf::from(&server_config.upload_path);
    std::fs::create_dir_all(&upload_path)?;
    let file_service = FileService::new(UploadRoot::from(upload_path.clone()));

    let address = server_config.address.clone();
    let port = server_config.port;
    log::info!("Listening on {address}:{port}");

    HttpServer::new(move || {
        let domain = server_config.domain.clone();
        let cors = Cors::default()
            .allowed_origin_fn(move |origin, _| {
                origin
                    .to_str()
                    .map(|origin| origin.ends_with(&domain))
                    .unwrap_or(false)
            })
            .allow_any_method()
            .allow_any_header()
            .supports_credentials();

        App::new()
            .wrap(IdentityMiddleware::default())
            .wrap(
                SessionMiddleware::builder(CookieSessionStore::default(), secret_key.clone())
                    .cookie_secure(false)
                    .cookie_domain(Some(format!(".{}", server_config.domain)))
                    .build(),
            )
            .wrap(cors)
            .wrap(Logger::default())
            .app_data(web::Data::new(server_config.clone()))
            .app_data(web::Data::new(file_service.clone()))
            // Keep temp files on the upload volume so they can be moved into place.
            .app_data(TempFileConfig::default().directory(&upload_path))
            .app_data(MultipartFormConfig::default().total_limit(UPLOAD_TOTAL_LIMIT))
            .service(
                web::scope("")
                    .wrap(RedirectUnauthorized)
                    .service(routes::main::upload_files),
            )
    })
    .bind((address, port))?
    .run()
    .await
}
