use std::net::SocketAddr;

use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chemequip::{build_state, config::Config, routes::create_router, seed};

#[derive(Parser, Debug)]
#[command(name = "chemequip")]
#[command(author, version, about = "Chemical equipment dataset service")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API (default)
    Serve,

    /// Create the demo user and sample dataset, then exit
    Seed,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chemequip=debug,tower_http=debug,axum=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    info!("Configuration loaded: {:?}", config.server);

    let state = build_state(config.clone()).await?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Seed => {
            let dataset = seed::seed_demo_data(&state.ingestor).await?;
            info!(dataset_id = %dataset.id, "Demo dataset ready");
            Ok(())
        }
        Command::Serve => {
            if config.ingest.seed_demo_data {
                seed::seed_demo_data(&state.ingestor).await?;
            }

            let app = create_router(state);

            let ip = config
                .server
                .host
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid HOST {:?}: {}", config.server.host, e))?;
            let addr = SocketAddr::new(ip, config.server.port);
            info!("Server listening on {}", addr);

            let listener = TcpListener::bind(addr).await?;
            axum::serve(listener, app)
                .await
                .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

            Ok(())
        }
    }
}
