/*!
 * Server startup
 *
 * Logging, database and migrations, services, router, then bind and serve.
 */

use crate::auth::AuthService;
use crate::config::Config;
use crate::database::Database;
use crate::error::{AppError, AppResult};
use crate::handlers::AppState;
use crate::logging;
use crate::routes::create_router;
use crate::sms::AfricasTalkingClient;
use axum::serve;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::info;

pub struct Server {
    config: Config,
}

impl Server {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub async fn run(&self) -> AppResult<()> {
        logging::init_logging(&self.config.log_level)
            .map_err(|e| AppError::Config(format!("Failed to initialize logging: {}", e)))?;

        info!("Starting Bulk SMS Server v{}", env!("CARGO_PKG_VERSION"));
        info!("Log level: {}", self.config.log_level);

        info!("Opening database: {}", self.config.database_url);
        let db = Database::new(&self.config.database_url).await?;

        if self.config.auto_migrate {
            info!("Running database migrations (AUTO_MIGRATE=true)...");
            db.migrate().await?;
            info!("Database migrations completed");
        } else {
            info!("Skipping database migrations (AUTO_MIGRATE=false)");
        }

        let auth = AuthService::new(
            self.config.jwt_secret.clone(),
            db.clone(),
            Duration::from_secs(self.config.otp_ttl_seconds),
            self.config.user_token_ttl_hours,
            self.config.admin_token_ttl_hours,
        );
        info!("Authentication service initialized");

        let sms = AfricasTalkingClient::new(
            self.config.africastalking_username.clone(),
            self.config.africastalking_api_key.clone(),
            self.config.africastalking_base_url.clone(),
            self.config.default_country_code.clone(),
        )?;
        info!(
            "SMS gateway client initialized ({})",
            self.config.africastalking_base_url
        );

        let state = AppState {
            db,
            auth,
            sms: Arc::new(sms),
            config: Arc::new(self.config.clone()),
        };
        let app = create_router(state);

        let addr = format!("{}:{}", self.config.server_host, self.config.server_port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| AppError::Config(format!("Failed to bind to address {}: {}", addr, e)))?;

        info!("Server listening on http://{}", addr);
        info!("  POST /api/auth/register, /api/auth/verify-otp - phone login");
        info!("  POST /api/auth/send-sms - bulk send");
        info!("  /api/auth/contacts, /api/auth/contact-groups - address book");
        info!("  GET /api/auth/messages, /api/auth/statistics - history");
        info!("  /api/auth/admin/* - back office");
        info!("  GET /health - Health check");

        serve(listener, app)
            .await
            .map_err(|e| AppError::Internal(format!("Server error: {}", e)))?;

        Ok(())
    }
}
