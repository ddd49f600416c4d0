// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! AetherPulse: AetherLabs Thermal Suite
//!
//! Command-line front end for the four dashboard panels. Every command that
//! talks to the model reads the API key first and stops if it is missing.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

use aetherpulse::config::AppConfig;
use aetherpulse::document::read_document;
use aetherpulse::gateway::AiGateway;
use aetherpulse::gemini::GeminiClient;
use aetherpulse::panels::analytics::{AnalyticsPanel, AnalyticsState, ViewMode};
use aetherpulse::panels::audit::{AuditPanel, AuditQueue};
use aetherpulse::panels::extraction::{ExtractionPanel, ExtractionRequest, ExtractionState};
use aetherpulse::panels::visuals::VisualsPanel;
use aetherpulse::{AiError, PulseError, Result};

/// AetherPulse CLI - thermal feedback analytics, visuals, extraction and audit
#[derive(Parser, Debug)]
#[command(name = "aetherpulse")]
#[command(author = "Jonathan D. A. Jewell <hyperpolymath>")]
#[command(version)]
#[command(about = "AetherLabs thermal suite backed by Gemini", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (JSON format)
    #[arg(short, long, default_value = "config.json", global = true)]
    config: PathBuf,

    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable trace logging (most verbose)
    #[arg(long, global = true)]
    trace: bool,

    /// Output format for results
    #[arg(long, global = true, default_value = "text", value_parser = ["text", "json"])]
    format: String,

    /// Suppress non-essential output (quiet mode)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Group customer reviews into topics and show mention trends
    Analytics {
        /// How to present the trends
        #[arg(long, default_value = "chart", value_parser = ["chart", "table"])]
        view: String,

        /// File with one review per line (defaults to the built-in sole reviews)
        #[arg(long)]
        reviews: Option<PathBuf>,
    },

    /// Generate a product visual for an environment description
    Visualize {
        /// Scene description
        prompt: String,

        /// Where to write the image (defaults to the export file name)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Extract a module hierarchy from product documentation
    Extract {
        /// Local documentation file (PDF or text)
        #[arg(short, long, required_unless_present = "url")]
        file: Option<PathBuf>,

        /// Reference to the documentation source
        #[arg(short, long)]
        url: Option<String>,
    },

    /// Run the R&D sensitivity audit over video files
    Audit {
        /// Files to audit
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },

    /// Show AI engine status
    Status,
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Generate default configuration file
    Generate {
        /// Output file path
        #[arg(short, long, default_value = "config.json")]
        output: PathBuf,
    },

    /// Validate configuration file
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if !cli.quiet {
        info!("AetherPulse v{}", env!("CARGO_PKG_VERSION"));
    }

    // Load configuration
    let config = AppConfig::load(&cli.config)?;

    let result = match cli.command {
        Some(Commands::Analytics { view, reviews }) => {
            run_analytics(&config, &view, reviews.as_deref(), &cli.format).await
        }
        Some(Commands::Visualize { prompt, output }) => {
            run_visualize(&config, &prompt, output, &cli.format).await
        }
        Some(Commands::Extract { file, url }) => {
            run_extract(&config, file.as_deref(), url, &cli.format).await
        }
        Some(Commands::Audit { files }) => run_audit(&config, &files, &cli.format).await,
        Some(Commands::Config { action }) => run_config_command(config, action, &cli.config),
        Some(Commands::Status) => run_status(&config).await,
        // The dashboard opens on thermal analytics
        None => run_analytics(&config, "chart", None, &cli.format).await,
    };

    if let Err(e) = &result {
        error!("{}", e);
    }
    result
}

/// Connect to the model, failing before any panel is built
fn connect(config: &AppConfig) -> Result<AiGateway> {
    let client = GeminiClient::from_config(config)?;
    Ok(AiGateway::new(Arc::new(client), config))
}

fn parse_view(view: &str) -> ViewMode {
    match view {
        "table" => ViewMode::Table,
        _ => ViewMode::Chart,
    }
}

fn read_reviews(path: &Path) -> Result<Vec<String>> {
    let reviews: Vec<String> = std::fs::read_to_string(path)?
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect();

    if reviews.is_empty() {
        return Err(PulseError::Config(format!("No reviews found in {}", path.display())));
    }
    Ok(reviews)
}

/// Run the feedback analysis and print the trends
async fn run_analytics(config: &AppConfig, view: &str, reviews: Option<&Path>, format: &str) -> Result<()> {
    let gateway = connect(config)?;

    let mut panel = AnalyticsPanel::new(gateway, config);
    if let Some(path) = reviews {
        panel = panel.with_reviews(read_reviews(path)?);
    }
    info!("Analyzing {} reviews", panel.reviews().len());

    panel.refresh().await;
    panel.select_view(parse_view(view)).await;
    let state = panel.snapshot().await;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&state)?);
    } else {
        print!("{}", format_trends(&state));
    }
    Ok(())
}

fn format_trends(state: &AnalyticsState) -> String {
    let rows = state.chart_rows();
    if rows.is_empty() {
        return "No topics could be derived from the reviews.\n".to_string();
    }

    let mut out = String::new();
    match state.view {
        ViewMode::Table => {
            let topics: Vec<&str> = rows[0].values.iter().map(|(t, _)| t.as_str()).collect();
            out.push_str(&format!("{:<8}", "Date"));
            for topic in &topics {
                out.push_str(&format!(" {:>20}", topic));
            }
            out.push('\n');
            for row in &rows {
                out.push_str(&format!("{:<8}", row.date));
                for (_, count) in &row.values {
                    out.push_str(&format!(" {:>20}", count));
                }
                out.push('\n');
            }
        }
        ViewMode::Chart => {
            for trend in state.trends() {
                out.push_str(&format!("{}\n", trend.topic));
                for day in &trend.counts {
                    out.push_str(&format!("  {:<8} {:>3} {}\n", day.date, day.count, "#".repeat(day.count as usize)));
                }
            }
        }
    }
    out
}

/// Generate an image and write it to disk
async fn run_visualize(config: &AppConfig, prompt: &str, output: Option<PathBuf>, format: &str) -> Result<()> {
    if prompt.trim().is_empty() {
        return Err(PulseError::Config("Prompt must not be empty".to_string()));
    }

    let panel = VisualsPanel::new(connect(config)?, config);
    let state = panel.generate(prompt).await;

    let Some(exported) = panel.export().await else {
        let notice = state.notice().unwrap_or("No image was generated").to_string();
        warn!("{}", notice);
        return Err(AiError::Generation(notice).into());
    };

    let path = output.unwrap_or_else(|| PathBuf::from(&exported.file_name));
    std::fs::write(&path, &exported.bytes)?;

    if format == "json" {
        let summary = serde_json::json!({
            "path": path.to_string_lossy(),
            "mime_type": exported.mime_type,
            "bytes": exported.bytes.len(),
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("Saved {} ({}, {} bytes)", path.display(), exported.mime_type, exported.bytes.len());
    }
    Ok(())
}

/// Extract a module hierarchy from a file and/or URL reference
async fn run_extract(config: &AppConfig, file: Option<&Path>, url: Option<String>, format: &str) -> Result<()> {
    let text = match file {
        Some(path) => {
            let document = read_document(path)?;
            if let Some(pages) = document.page_count {
                info!("Read {} PDF pages from {}", pages, path.display());
            }
            Some(document.text)
        }
        None => None,
    };

    let panel = ExtractionPanel::new(connect(config)?);
    let state = panel.extract(&ExtractionRequest { url, text }).await;

    match &state {
        ExtractionState::Failed { message } => Err(AiError::Generation(message.clone()).into()),
        _ if format == "json" => {
            println!("{}", state.pretty_json()?);
            Ok(())
        }
        _ => {
            for module in state.modules() {
                println!("{}: {}", module.module, module.description);
                for (name, description) in &module.submodules {
                    println!("  - {}: {}", name, description);
                }
            }
            Ok(())
        }
    }
}

/// Audit each file and print the queue once every audit has finished
async fn run_audit(config: &AppConfig, files: &[PathBuf], format: &str) -> Result<()> {
    let panel = AuditPanel::new(connect(config)?, config);

    let mut handles = Vec::new();
    for file in files {
        let size = std::fs::metadata(file)?.len();
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| file.display().to_string());
        handles.push(panel.upload(&name, size).await);
    }

    for handle in handles {
        if let Err(e) = handle.task.await {
            warn!("Audit task {} did not finish: {}", handle.id, e);
        }
    }

    let queue = panel.snapshot().await;
    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&queue)?);
    } else {
        print!("{}", format_queue(&queue));
    }
    Ok(())
}

fn format_queue(queue: &AuditQueue) -> String {
    queue
        .entries()
        .iter()
        .map(|video| {
            let score = video
                .sensitivity_score()
                .map(|s| format!("{:.0}%", s))
                .unwrap_or_else(|| "-".to_string());
            format!("{:<40} {:>10} {:>10} {:>5}\n", video.name, video.size, video.status().as_str(), score)
        })
        .collect()
}

/// Run config commands
fn run_config_command(config: AppConfig, action: ConfigCommands, config_path: &Path) -> Result<()> {
    match action {
        ConfigCommands::Show => {
            let json = serde_json::to_string_pretty(&config)?;
            println!("{}", json);
        }
        ConfigCommands::Generate { output } => {
            AppConfig::default().save(&output)?;
            println!("Generated config at {:?}", output);
        }
        ConfigCommands::Validate => {
            config.validate()?;
            println!("Configuration at {:?} is valid", config_path);
            println!("  Text model: {}", config.engine.models.text);
            println!("  Image model: {}", config.engine.models.image);
            println!("  API key variable: {}", config.engine.api_key_env);
        }
    }

    Ok(())
}

/// Run status check
async fn run_status(config: &AppConfig) -> Result<()> {
    let client = GeminiClient::from_config(config)?;

    println!("AetherPulse v{} Status", env!("CARGO_PKG_VERSION"));
    println!("======================");

    match client.list_models().await {
        Ok(models) => {
            println!("Gemini: Reachable at {}", config.engine.url);
            println!("\nConfigured models:");
            for model in [&config.engine.models.text, &config.engine.models.image] {
                let available = models.iter().any(|m| m.trim_start_matches("models/") == model.as_str());
                let marker = if available { "✓" } else { "✗" };
                println!("  {} {}", marker, model);
            }
        }
        Err(e) => println!("Gemini: Error - {}", e),
    }

    println!("\nConfiguration:");
    println!("  History days: {}", config.analytics.history_days);
    println!("  Aspect ratio: {}", config.visuals.aspect_ratio);
    println!("  Audit fallback: {:?}", config.audit.fallback);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use aetherpulse::panels::analytics::{AnalyticsPhase, DailyCount, TopicTrend};
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::try_parse_from(["aetherpulse"]).unwrap();
        assert!(!cli.verbose);
        assert!(cli.command.is_none());
        assert_eq!(cli.format, "text");
    }

    #[test]
    fn test_cli_analytics_command() {
        let cli = Cli::try_parse_from(["aetherpulse", "analytics", "--view", "table", "--reviews", "/tmp/r.txt"]).unwrap();

        match cli.command {
            Some(Commands::Analytics { view, reviews }) => {
                assert_eq!(view, "table");
                assert_eq!(reviews, Some(PathBuf::from("/tmp/r.txt")));
            }
            _ => panic!("Expected Analytics command"),
        }
    }

    #[test]
    fn test_cli_rejects_unknown_view() {
        assert!(Cli::try_parse_from(["aetherpulse", "analytics", "--view", "pie"]).is_err());
    }

    #[test]
    fn test_cli_extract_needs_a_source() {
        assert!(Cli::try_parse_from(["aetherpulse", "extract"]).is_err());

        let cli = Cli::try_parse_from(["aetherpulse", "extract", "--url", "docs.aetherlabs.tech"]).unwrap();
        match cli.command {
            Some(Commands::Extract { file, url }) => {
                assert!(file.is_none());
                assert_eq!(url.as_deref(), Some("docs.aetherlabs.tech"));
            }
            _ => panic!("Expected Extract command"),
        }
    }

    #[test]
    fn test_cli_audit_needs_files() {
        assert!(Cli::try_parse_from(["aetherpulse", "audit"]).is_err());

        let cli = Cli::try_parse_from(["aetherpulse", "--format", "json", "audit", "a.mp4", "b.mp4"]).unwrap();
        assert_eq!(cli.format, "json");
        match cli.command {
            Some(Commands::Audit { files }) => assert_eq!(files.len(), 2),
            _ => panic!("Expected Audit command"),
        }
    }

    #[test]
    fn test_read_reviews_skips_blank_lines() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "Feet stay cool\n\n  Fan is loud  ").unwrap();

        let reviews = read_reviews(file.path()).unwrap();
        assert_eq!(reviews, vec!["Feet stay cool", "Fan is loud"]);
    }

    #[test]
    fn test_format_trends_table() {
        let state = AnalyticsState {
            phase: AnalyticsPhase::Ready {
                trends: vec![TopicTrend {
                    topic: "Cooling".to_string(),
                    counts: vec![DailyCount { date: "Oct 19".to_string(), count: 20 }],
                }],
            },
            view: ViewMode::Table,
        };

        let out = format_trends(&state);
        assert!(out.lines().next().unwrap().contains("Cooling"));
        assert!(out.contains("Oct 19"));
        assert!(out.contains("20"));
    }
}
