// src/main.rs
use chrono::Utc;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crypto_pulse::api::{self, AppState};
use crypto_pulse::config::AppConfig;

#[derive(Parser, Debug)]
#[command(name = "crypto_pulse")]
#[command(about = "Polls exchange market data and prepares prompts for manual analysis")]
struct Args {
    /// Listen port (overrides PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Report directory (overrides REPORT_DIR)
    #[arg(long)]
    report_dir: Option<String>,

    /// Enable debug logging when RUST_LOG is not set
    #[arg(short, long)]
    debug: bool,
}

fn init_logging(debug: bool) -> Result<(), Box<dyn std::error::Error>> {
    std::fs::create_dir_all("logs")?;
    let file_appender = tracing_appender::rolling::daily("logs", "crypto_pulse");
    let default_level = if debug { "debug" } else { "info" };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stdout)
                .with_target(false)
                .with_level(true)
                .compact(),
        )
        .with(
            fmt::layer()
                .with_writer(file_appender)
                .with_target(true)
                .with_level(true)
                .with_ansi(false),
        )
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .try_init()?;

    println!("📋 Logging initialized:");
    println!("   📄 Daily logs: logs/crypto_pulse.YYYY-MM-DD");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("❌ Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("🛑 Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = dotenv::dotenv() {
        println!("Warning: Could not load .env file: {}", e);
    }

    let args = Args::parse();

    if let Err(e) = init_logging(args.debug) {
        eprintln!("Failed to initialize logging: {}", e);
        let _ = tracing_subscriber::fmt()
            .with_target(false)
            .with_level(true)
            .try_init();
    }

    info!("🚀 Starting crypto_pulse at {}", Utc::now().to_rfc3339());

    let mut config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("❌ Failed to load config: {}", e);
            std::process::exit(1);
        }
    };
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(dir) = args.report_dir {
        config.report_dir = dir;
    }
    config.log_summary();

    let port = config.port;
    let state = match AppState::from_config(config) {
        Ok(state) => state,
        Err(e) => {
            error!("❌ Failed to initialize service: {}", e);
            std::process::exit(1);
        }
    };
    let registry = state.registry.clone();
    let app = api::router(state);

    info!("🌐 Listening on http://0.0.0.0:{}", port);
    info!("🔗 Available endpoints:");
    info!("   GET  /api/pairs?query=");
    info!("   POST /api/monitor");
    info!("   POST /api/monitor/stop");
    info!("   GET  /api/monitor/latest?monitor_id=");
    info!("   GET  /api/chart?symbol=");
    info!("   GET  /api/prompt?symbol=");
    info!("   GET  /api/pending_prompt?analysis_id=");
    info!("   POST /api/submit_response");
    info!("   GET  /api/report?report_id=");
    info!("   GET  /health");

    let listener = match tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("❌ Failed to start server: {}", e);
            std::process::exit(1);
        }
    };
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    registry.stop_all().await;
    info!("👋 crypto_pulse stopped");
    Ok(())
}
