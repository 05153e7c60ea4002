use std::io::{self, Write};

use clap::Parser;
use sqlx::postgres::PgPoolOptions;

use todo_api::auth::{AuthError, CredentialStore, Credentials, PasswordService, PgCredentialStore};

#[derive(Parser, Debug)]
#[command(name = "create_user", about = "Create a todo API user account")]
struct Args {
    /// Username: 3-20 letters, digits or underscores.
    #[arg(long)]
    username: String,

    /// Plaintext password to hash and store for this user.
    #[arg(long)]
    password: String,

    /// Apply pending migrations before inserting.
    #[arg(long)]
    migrate: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    let args = Args::parse();
    let credentials = Credentials::new(args.username.trim(), args.password);

    if let Err(AuthError::Validation(errors)) = credentials.validate() {
        for error in errors {
            writeln!(io::stderr(), "error: {error}")?;
        }
        std::process::exit(1);
    }

    let database_url = std::env::var("DATABASE_URL")?;
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&database_url)
        .await?;

    if args.migrate {
        todo_api::db::run_migrations(&pool).await?;
    }

    let password_service = PasswordService::new()?;
    let password_hash = password_service.hash_password(&credentials.password)?;

    let store = PgCredentialStore::new(pool);
    match store
        .create_user(&credentials.username, &password_hash)
        .await
    {
        Ok(user) => {
            println!("Created user '{}' with id {}", user.username, user.id);
            Ok(())
        }
        Err(AuthError::UsernameTaken) => {
            writeln!(
                io::stderr(),
                "error: a user named '{}' already exists.",
                credentials.username
            )?;
            std::process::exit(1);
        }
        Err(err) => Err(err.into()),
    }
}
