use std::fs;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use zettelkit::auth::{PasswordService, spawn_session_sweeper};
use zettelkit::config::ServerConfig;
use zettelkit::server::{AppState, bootstrap, create_router};
use zettelkit::store::{SqliteStore, Store};

#[derive(Parser)]
#[command(name = "zettelkit")]
#[command(about = "A collaborative workspace server", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the server
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(long, short, default_value = "8080")]
        port: u16,

        /// Data directory for the database
        #[arg(long, default_value = "./data")]
        data_dir: String,

        /// Days before browser sessions expire
        #[arg(long, default_value = "30")]
        session_ttl_days: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("zettelkit=info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            host,
            port,
            data_dir,
            session_ttl_days,
        } => {
            let config = ServerConfig {
                host,
                port,
                data_dir: data_dir.into(),
                session_ttl_days,
            };
            fs::create_dir_all(&config.data_dir)?;

            let store = SqliteStore::new(config.db_path())?;
            store.initialize()?;

            let store: Arc<dyn Store> = Arc::new(store);
            let passwords = PasswordService::new();
            // On an empty database this seeds the admin account and logs its
            // generated password.
            bootstrap(store.as_ref(), &passwords)?;
            spawn_session_sweeper(store.clone());

            let state = Arc::new(AppState {
                store,
                config: config.clone(),
                passwords,
            });

            let app = create_router(state);
            let addr = config.socket_addr()?;

            info!("Starting server on {}", addr);

            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}
