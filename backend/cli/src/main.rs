mod config;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use happychan_channels::{ChannelAdapter, SlackAdapter, SlackWebClient};
use happychan_logging::{init_logger, EventSink, TracingSink};
use happychan_planner::providers::GeminiProvider;
use happychan_planner::ReplyPlanner;

use config::Config;

#[derive(Parser)]
#[command(name = "happychan")]
#[command(about = "happychan: Slack mentions answered by Gemini")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the webhook server
    Serve {
        /// Port to bind the HTTP server to
        #[arg(short, long)]
        port: Option<u16>,
        /// Address to bind the HTTP server to
        #[arg(short, long)]
        bind: Option<String>,
    },
    /// Query the liveness endpoint of a running server
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Local development reads secrets from `.env`; deployments set them directly.
    let _ = dotenvy::dotenv();
    let config = Config::from_env()?;

    let _log_guard = init_logger(config.log_dir.as_deref(), &config.log_level);

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { port, bind } => {
            let config = Config {
                port: port.unwrap_or(config.port),
                bind_address: bind.unwrap_or(config.bind_address),
                ..config
            };
            run_server(config).await?;
        }
        Commands::Status => {
            let url = format!(
                "http://localhost:{}{}",
                config.port, config.slack_events_path
            );
            match reqwest::get(&url).await {
                Ok(resp) => {
                    let body: serde_json::Value = resp.json().await?;
                    println!("{}", serde_json::to_string_pretty(&body)?);
                }
                Err(_) => {
                    println!("happychan is not running on port {}", config.port);
                }
            }
        }
    }

    Ok(())
}

async fn run_server(config: Config) -> Result<()> {
    info!(
        port = config.port,
        bind = %config.bind_address,
        events_path = %config.slack_events_path,
        model = %config.gemini_model,
        "Starting happychan"
    );
    for warning in config.warnings() {
        warn!("{}", warning);
    }

    let provider = GeminiProvider::new(config.gemini_api_key.clone().unwrap_or_default())
        .with_base_url(&config.gemini_base_url);
    let planner = Arc::new(ReplyPlanner::new(
        Arc::new(provider),
        config.persona.clone(),
        config.completion_settings(),
    ));

    let poster = SlackWebClient::new(config.slack_bot_token.clone().unwrap_or_default())
        .with_base_url(&config.slack_api_base_url);
    let sink: Arc<dyn EventSink> = Arc::new(TracingSink);

    let slack = SlackAdapter::new(config.slack_config(), planner, Arc::new(poster), sink);
    info!(adapter = slack.name(), "Registered channel adapter");

    let app = slack.build_router().layer(TraceLayer::new_for_http());
    let addr = format!("{}:{}", config.bind_address, config.port);

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(addr = %addr, "HTTP listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("happychan stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
