use std::io::{self, Write};
use std::sync::Arc;

use clap::Parser;
use sqlx::postgres::PgPoolOptions;

use account_server::auth::passwords::PasswordService;
use account_server::auth::validation::{normalize, require_email, require_password_length};
use account_server::models::NewUser;
use account_server::store::{PgUserStore, StoreError, UserStore};

#[derive(Parser, Debug)]
#[command(name = "create_user", about = "Create a local account without going through the API")]
struct Args {
    /// Email address for the account (case insensitive).
    #[arg(long)]
    email: String,

    /// Unique handle, stored lowercase.
    #[arg(long)]
    username: String,

    /// Display name.
    #[arg(long)]
    full_name: String,

    /// Plaintext password to hash and store for this user.
    #[arg(long)]
    password: String,

    /// Media reference (URL) to use as the avatar.
    #[arg(long)]
    avatar: String,

    /// Optional media reference for the cover image.
    #[arg(long)]
    cover_image: Option<String>,

    /// Passwords must be longer than this many characters.
    #[arg(long, env = "PASSWORD_MIN_LENGTH", default_value_t = 10)]
    password_min_length: usize,
}

fn fail(message: impl std::fmt::Display) -> ! {
    let _ = writeln!(io::stderr(), "error: {message}");
    std::process::exit(1);
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    let args = Args::parse();

    let email = require_email(&args.email).unwrap_or_else(|err| fail(err));
    let username = normalize(&args.username);
    if username.is_empty() || args.full_name.trim().is_empty() || args.avatar.trim().is_empty() {
        fail("username, full name and avatar must not be empty");
    }
    if let Err(err) = require_password_length(&args.password, args.password_min_length) {
        fail(err);
    }

    let database_url = std::env::var("DATABASE_URL")?;
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&database_url)
        .await?;
    let users: Arc<dyn UserStore> = Arc::new(PgUserStore::new(pool));

    let password_service = PasswordService::new().map_err(|err| {
        io::Error::new(io::ErrorKind::Other, format!("argon2 init failed: {err}"))
    })?;
    let password_hash = password_service
        .hash_password(&args.password)
        .map_err(|err| {
            io::Error::new(io::ErrorKind::Other, format!("password hash failed: {err}"))
        })?;

    let created = users
        .insert_user(NewUser {
            username,
            email,
            full_name: args.full_name.trim().to_string(),
            avatar: args.avatar.trim().to_string(),
            cover_image: args.cover_image.filter(|cover| !cover.trim().is_empty()),
            password_hash,
        })
        .await;

    match created {
        Ok(user) => {
            println!("Created user '{}' <{}> with id {}", user.username, user.email, user.id);
            Ok(())
        }
        Err(StoreError::Duplicate(field)) => fail(format!("a user with this {field} already exists")),
        Err(err) => Err(err.into()),
    }
}
