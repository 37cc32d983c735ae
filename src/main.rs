// src/main.rs

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use staffboard::api::app_router;
use staffboard::auth::password::digest_password;
use staffboard::config::Config;
use staffboard::db;
use staffboard::state::AppState;

#[derive(Parser)]
#[command(name = "staffboard", about = "Employee data dashboard server", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Create the database schema and exit
    InitDb,
    /// Print the SHA-256 digest of a password for APP_PASSWORD_HASH
    HashPassword { password: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::InitDb => {
            let pool = db::create_pool(&config.database_url, config.db_max_connections).await?;
            db::init_schema(&pool).await?;
            info!("Schema initialized at {}", config.database_url);
            Ok(())
        }
        Command::HashPassword { password } => {
            println!("{}", digest_password(&password));
            Ok(())
        }
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    info!("Starting staffboard");
    info!("Database: {}", config.database_url);

    let pool = db::create_pool(&config.database_url, config.db_max_connections).await?;
    db::init_schema(&pool).await?;

    let bind_address = config.bind_address();
    let app_state = Arc::new(AppState::new(config, pool)?);
    let app = app_router(app_state);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    info!("Listening on http://{}", bind_address);

    axum::serve(listener, app).await?;
    Ok(())
}
