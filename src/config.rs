use crate::error::{AppError, AppResult};
use std::env;
use std::str::FromStr;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_host: String,
    pub server_port: u16,
    pub log_level: String,
    pub auto_migrate: bool,
    pub africastalking_username: String,
    pub africastalking_api_key: String,
    pub africastalking_base_url: String,
    pub sms_unit_price: f64,
    pub currency: String,
    pub default_country_code: String,
    pub otp_ttl_seconds: u64,
    pub user_token_ttl_hours: i64,
    pub admin_token_ttl_hours: i64,
    pub starting_balance: f64,
    pub usd_exchange_rate: f64,
}

impl Config {
    pub fn from_env() -> AppResult<Self> {
        dotenvy::dotenv().ok();

        Ok(Config {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://bulk_sms.db".to_string()),
            jwt_secret: env::var("JWT_SECRET")
                .map_err(|_| AppError::Config("JWT_SECRET is required".to_string()))?,
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: parse_var("SERVER_PORT", 4000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            auto_migrate: parse_var("AUTO_MIGRATE", true)?,
            africastalking_username: env::var("AFRICASTALKING_USERNAME").map_err(|_| {
                AppError::Config("AFRICASTALKING_USERNAME is required".to_string())
            })?,
            africastalking_api_key: env::var("AFRICASTALKING_API_KEY").map_err(|_| {
                AppError::Config("AFRICASTALKING_API_KEY is required".to_string())
            })?,
            africastalking_base_url: env::var("AFRICASTALKING_BASE_URL")
                .unwrap_or_else(|_| "https://api.africastalking.com".to_string()),
            sms_unit_price: parse_var("SMS_UNIT_PRICE", 15.0)?,
            currency: env::var("CURRENCY").unwrap_or_else(|_| "RWF".to_string()),
            default_country_code: env::var("DEFAULT_COUNTRY_CODE")
                .unwrap_or_else(|_| "+250".to_string()),
            otp_ttl_seconds: parse_var("OTP_TTL_SECONDS", 600)?,
            user_token_ttl_hours: parse_var("USER_TOKEN_TTL_HOURS", 24 * 7)?,
            admin_token_ttl_hours: parse_var("ADMIN_TOKEN_TTL_HOURS", 24)?,
            starting_balance: parse_var("STARTING_BALANCE", 10_000.0)?,
            usd_exchange_rate: parse_var("USD_EXCHANGE_RATE", 1300.0)?,
        })
    }
}

fn parse_var<T: FromStr>(name: &str, default: T) -> AppResult<T> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Config(format!("Invalid {}", name))),
        Err(_) => Ok(default),
    }
}
