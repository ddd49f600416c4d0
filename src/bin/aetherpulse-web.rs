// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! AetherPulse Web Dashboard
//!
//! Standalone web server for the four-panel dashboard.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use aetherpulse::config::AppConfig;
use aetherpulse::gateway::AiGateway;
use aetherpulse::gemini::GeminiClient;
use aetherpulse::panels::Dashboard;
use aetherpulse::Result;

#[derive(Parser, Debug)]
#[command(name = "aetherpulse-web")]
#[command(author = "Jonathan D. A. Jewell <hyperpolymath>")]
#[command(version)]
#[command(about = "AetherPulse Web Dashboard Server")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Host to bind to
    #[arg(short = 'H', long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Open browser automatically
    #[arg(long)]
    open: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let filter = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!("AetherPulse Web Dashboard v{}", env!("CARGO_PKG_VERSION"));

    // Load config
    let mut config = AppConfig::load(&args.config)?;

    // Apply CLI overrides
    if let Some(host) = args.host {
        config.web.host = host;
    }
    if let Some(port) = args.port {
        config.web.port = port;
    }

    // No key, no dashboard
    let client = GeminiClient::from_config(&config)?;
    let gateway = AiGateway::new(Arc::new(client), &config);
    let dashboard = Arc::new(Dashboard::new(gateway, &config));
    info!("Text model: {}, image model: {}", config.engine.models.text, config.engine.models.image);

    let addr = format!("{}:{}", config.web.host, config.web.port);
    info!("Starting web server at http://{}", addr);

    if args.open {
        let url = dashboard_url(&config.web.host, config.web.port);
        if let Err(e) = open_browser(&url) {
            error!("Failed to open browser: {}", e);
        }
    }

    aetherpulse::web::start_server(config, dashboard).await
}

/// Wildcard binds are opened through loopback
fn dashboard_url(host: &str, port: u16) -> String {
    let host = match host {
        "0.0.0.0" | "::" | "[::]" => "127.0.0.1",
        other => other,
    };
    format!("http://{}:{}/section/analytics", host, port)
}

/// Platform launcher for a URL
fn browser_command(url: &str) -> (&'static str, Vec<String>) {
    if cfg!(target_os = "windows") {
        ("cmd", vec!["/c".into(), "start".into(), url.into()])
    } else if cfg!(target_os = "macos") {
        ("open", vec![url.into()])
    } else {
        ("xdg-open", vec![url.into()])
    }
}

fn open_browser(url: &str) -> std::io::Result<()> {
    let (program, args) = browser_command(url);
    std::process::Command::new(program).args(args).spawn()?;
    Ok(())
}
