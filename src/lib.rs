pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod messaging;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod server;
pub mod sms;

pub use error::{AppError, AppResult};
