//! TaskPilot Server
//!
//! Runs the engine behind the HTTP command API and the live event stream.

use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use taskpilot_engine::EngineConfig;
use taskpilot_server::config::{self, ApiKeys, Config};
use taskpilot_server::{create_router, AppState};

/// TaskPilot instruction runner.
#[derive(Parser, Debug)]
#[command(name = "taskpilot", about = "Natural-language task runner with a live event stream")]
struct Args {
    /// HTTP server address
    #[arg(long, env = "TASKPILOT_HTTP_ADDR", default_value = "127.0.0.1:8000")]
    http_addr: String,

    /// Page backend: none or webdriver
    #[arg(long, env = "TASKPILOT_PAGE_PROVIDER", default_value = "none")]
    page_provider: String,

    /// WebDriver endpoint used by the webdriver backend
    #[arg(long, env = "TASKPILOT_WEBDRIVER_URL", default_value = "http://localhost:9515")]
    webdriver_url: String,

    /// Run the browser headless
    #[arg(long, env = "TASKPILOT_HEADLESS", default_value_t = true, action = clap::ArgAction::Set)]
    headless: bool,

    /// Extraction backend: heuristic, openai, anthropic or gemini
    #[arg(long, env = "TASKPILOT_EXTRACTION_PROVIDER", default_value = "heuristic")]
    extraction_provider: String,

    /// Model name for the extraction backend
    #[arg(long, env = "TASKPILOT_EXTRACTION_MODEL")]
    extraction_model: Option<String>,

    /// Base URL override for the extraction backend
    #[arg(long, env = "TASKPILOT_EXTRACTION_BASE_URL")]
    extraction_base_url: Option<String>,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: Option<String>,

    #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    anthropic_api_key: Option<String>,

    #[arg(long, env = "GOOGLE_API_KEY", hide_env_values = true)]
    google_api_key: Option<String>,

    /// Per-strategy locator timeout in milliseconds
    #[arg(long, env = "TASKPILOT_STRATEGY_TIMEOUT_MS", default_value = "3000")]
    strategy_timeout_ms: u64,

    /// Duration of one simulated step in milliseconds
    #[arg(long, env = "TASKPILOT_SIMULATION_STEP_MS", default_value = "1000")]
    simulation_step_ms: u64,

    /// Maximum number of actions per run
    #[arg(long, env = "TASKPILOT_MAX_ACTIONS", default_value = "50")]
    max_actions: usize,
}

impl Args {
    fn into_config(self) -> Result<Config, config::ConfigError> {
        let page_provider =
            config::page_provider(&self.page_provider, &self.webdriver_url, self.headless)?;
        let extraction_provider = config::extraction_provider(
            &self.extraction_provider,
            self.extraction_model,
            self.extraction_base_url,
            ApiKeys {
                openai: self.openai_api_key,
                anthropic: self.anthropic_api_key,
                google: self.google_api_key,
            },
        )?;

        Ok(Config {
            http_addr: self.http_addr,
            page_provider,
            extraction_provider,
            engine: EngineConfig {
                strategy_timeout_ms: self.strategy_timeout_ms,
                simulation_step_interval_ms: self.simulation_step_ms,
                max_actions: self.max_actions,
                ..EngineConfig::default()
            },
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("taskpilot=info")),
        )
        .with_target(true)
        .init();

    let config = args.into_config()?;
    let http_addr: SocketAddr = config.http_addr.parse()?;

    let state = AppState::new(&config);
    let app = create_router(state.clone());

    let listener = TcpListener::bind(http_addr).await?;
    info!(addr = %http_addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("HTTP server stopped, shutting down engine");
    state.shutdown(Duration::from_secs(10)).await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
