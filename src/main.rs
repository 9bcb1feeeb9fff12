/*!
 * Bulk SMS backend
 *
 * Loads configuration from the environment and runs the HTTP server.
 */

use bulk_sms::{config::Config, server::Server, AppResult};

#[tokio::main]
async fn main() -> AppResult<()> {
    let config = Config::from_env()?;
    Server::new(config).run().await
}
