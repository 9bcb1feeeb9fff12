use bulk_sms::database::Database;
use bulk_sms::models::{AppDownloads, AppSettings};
use std::env;
use std::process;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let database_url =
        env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://bulk_sms.db".to_string());

    println!("[init] Opening database: {}", database_url);
    let db = match Database::new_with_migrations(&database_url).await {
        Ok(db) => db,
        Err(err) => {
            eprintln!("[init] Database initialisation failed: {err}");
            process::exit(1);
        }
    };
    println!("[init] Schema is up to date.");

    match db.get_app_settings().await {
        Ok(Some(settings)) => {
            println!(
                "[init] App settings already present (android: {}, ios: {}); leaving them unchanged.",
                settings.android_url, settings.ios_url
            );
        }
        Ok(None) => {
            let defaults = AppDownloads::from(&AppSettings::defaults());
            if let Err(err) = db.save_app_settings(&defaults).await {
                eprintln!("[init] Failed to seed app settings: {err}");
                process::exit(1);
            }
            println!("[init] Seeded default app download settings.");
        }
        Err(err) => {
            eprintln!("[init] Failed to read app settings: {err}");
            process::exit(1);
        }
    }

    println!("[init] Done. Create a back-office account with `cargo run --bin create_admin`.");
}
