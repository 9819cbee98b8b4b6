#[macro_use]
extern crate lazy_static;

mod audit;
mod auth;
mod config;
mod db;
mod errors;
mod mailer;
mod reports;
mod routes;
mod rules;
mod structs;
mod tenancy;
mod utils;

use std::sync::Arc;

use actix_web::{
    error::InternalError,
    http::Method,
    middleware,
    web::{self, Data},
    App, HttpResponse, HttpServer, Responder,
};
use log::info;
use serde_json::json;
use sqlx::SqlitePool;

use config::Config;
use errors::AppError;
use mailer::Mailer;
use tenancy::TenantRegistry;

#[derive(Clone)]
pub struct AppState {
    pub master: SqlitePool,
    pub tenants: Arc<TenantRegistry>,
    pub config: Arc<Config>,
    pub mailer: Mailer,
}

impl AppState {
    pub async fn init(config: Config) -> Result<Self, AppError> {
        let master = tenancy::open_master(&config.data_dir).await?;
        let tenants = Arc::new(TenantRegistry::new(master.clone(), config.data_dir.clone()));
        let mailer = Mailer::from_config(&config)?;
        let state = AppState {
            master,
            tenants,
            config: Arc::new(config),
            mailer,
        };
        state.bootstrap_admin().await?;
        Ok(state)
    }

    /// Seeds the first super admin from configuration on an empty master database.
    async fn bootstrap_admin(&self) -> Result<(), AppError> {
        if db::master::count_global_users(&self.master).await? > 0 {
            return Ok(());
        }
        match &self.config.bootstrap_admin {
            Some((email, password)) => {
                utils::check_password_strength(password)?;
                let pwd_hash = utils::hash_password(password)?;
                db::master::create_global_user(&self.master, email, "Super Admin", &pwd_hash).await?;
                info!("Bootstrapped super admin {}", email);
            }
            None => log::warn!(
                "No super admin exists; set BOOTSTRAP_ADMIN_EMAIL and BOOTSTRAP_ADMIN_PASSWORD"
            ),
        }
        Ok(())
    }
}

fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        let message = err.to_string();
        InternalError::from_response(
            err,
            HttpResponse::BadRequest().json(json!({ "error": message })),
        )
        .into()
    })
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = Config::from_env()?;
    let bind_addr = config.bind_addr.clone();
    let state = AppState::init(config).await?;
    let upload_limit = state.config.max_upload_bytes;

    info!("Starting HTTP server on http://{}/", bind_addr);

    HttpServer::new(move || {
        App::new()
            .wrap(middleware::Compress::default())
            .wrap(middleware::from_fn(audit::error_log_middleware))
            // always register the Logger middleware last
            .wrap(middleware::Logger::default())
            .app_data(Data::new(state.clone()))
            .app_data(web::PayloadConfig::new(upload_limit))
            .app_data(json_config())
            .configure(routes::configure)
            .default_service(web::to(default_handler))
    })
    .bind(bind_addr)?
    .run()
    .await
}

async fn default_handler(req_method: Method) -> impl Responder {
    match req_method {
        Method::GET => HttpResponse::NotFound().json(json!({ "error": "Not found" })),
        _ => HttpResponse::MethodNotAllowed().json(json!({ "error": "Method not allowed" })),
    }
}
