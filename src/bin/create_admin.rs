use bulk_sms::auth::AuthService;
use bulk_sms::database::Database;
use bulk_sms::models::Role;
use std::env;
use std::time::Duration;

#[derive(Debug)]
struct Options {
    email: String,
    name: String,
    password: String,
    role: Role,
}

fn parse_args() -> Result<Options, String> {
    let args = env::args().skip(1).collect::<Vec<_>>();
    if args.is_empty() {
        print_help();
        return Err("Missing arguments".to_string());
    }

    let mut email = None;
    let mut name = None;
    let mut password = None;
    let mut role = Role::Admin;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--email" | "-e" => {
                email = Some(value_after(&args, i, "--email")?);
                i += 2;
            }
            "--name" | "-n" => {
                name = Some(value_after(&args, i, "--name")?);
                i += 2;
            }
            "--password" | "-p" => {
                password = Some(value_after(&args, i, "--password")?);
                i += 2;
            }
            "--super-admin" => {
                role = Role::SuperAdmin;
                i += 1;
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            other => {
                return Err(format!("Unknown argument: {}", other));
            }
        }
    }

    let email = email.ok_or_else(|| "--email is required".to_string())?;
    let password = password.ok_or_else(|| "--password is required".to_string())?;
    let name = name.unwrap_or_else(|| "Administrator".to_string());

    Ok(Options {
        email,
        name,
        password,
        role,
    })
}

fn value_after(args: &[String], index: usize, flag: &str) -> Result<String, String> {
    args.get(index + 1)
        .cloned()
        .ok_or_else(|| format!("{} requires a value", flag))
}

fn print_help() {
    println!("Bulk SMS admin bootstrap");
    println!();
    println!("Create a back-office account for the admin API.");
    println!();
    println!("USAGE:");
    println!("    cargo run --bin create_admin -- --email admin@example.com --password secret123");
    println!();
    println!("OPTIONS:");
    println!("    -e, --email <EMAIL>           Login email");
    println!("    -n, --name <NAME>             Display name (default: Administrator)");
    println!("    -p, --password <PASSWORD>     Password, at least 8 characters");
    println!("        --super-admin             Grant the super_admin role");
    println!("    -h, --help                    Show this help message");
}

#[tokio::main]
async fn main() -> Result<(), String> {
    dotenvy::dotenv().ok();
    let options = parse_args()?;

    let database_url =
        env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://bulk_sms.db".to_string());
    let jwt_secret = env::var("JWT_SECRET").unwrap_or_default();

    let database = Database::new_with_migrations(&database_url)
        .await
        .map_err(|e| format!("Database connection failed: {}", e))?;
    // Only the password helpers are used here; token settings are irrelevant.
    let auth_service = AuthService::new(jwt_secret, database, Duration::from_secs(60), 1, 1);

    let admin = auth_service
        .create_admin(&options.email, &options.name, &options.password, options.role)
        .await
        .map_err(|e| format!("Failed to create admin: {}", e))?;

    println!("=== Admin Account Created ===");
    println!("Admin ID  : {}", admin.id);
    println!("Email     : {}", admin.email);
    println!("Name      : {}", admin.name);
    println!("Role      : {}", admin.role);
    println!("Created At: {}", admin.created_at);
    println!();
    println!("Sign in with POST /api/auth/admin/login.");

    Ok(())
}
