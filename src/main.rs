// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Toolflow main entry point - CLI and commands.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use tokio::sync::watch;

use toolflow::config::Settings;
use toolflow::executor::{ping_servers, Executor, ExecutorConfig, RunReport};
use toolflow::llm::create_client;
use toolflow::mcp::{SessionManager, ToolRegistry, Transport};
use toolflow::telemetry::{init_telemetry, TelemetryConfig};

/// Toolflow version string.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Toolflow - LLM tool calling over MCP servers.
#[derive(Parser)]
#[command(name = "toolflow")]
#[command(author, version, about = "LLM tool calling over MCP servers", long_about = None)]
struct Cli {
    /// Task for the model to carry out
    task: Option<String>,

    /// MCP server endpoint URL (repeatable or comma-separated)
    #[arg(short, long = "server", env = "TOOLFLOW_SERVERS", value_delimiter = ',')]
    server: Vec<String>,

    /// Model to use
    #[arg(short, long, env = "TOOLFLOW_MODEL")]
    model: Option<String>,

    /// Path to a JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Cap on model rounds per run
    #[arg(long, env = "TOOLFLOW_MAX_ROUNDS")]
    max_rounds: Option<u32>,

    /// Output format
    #[arg(short = 'f', long, value_enum, default_value = "text")]
    output_format: OutputFormat,

    /// Only show warnings and errors
    #[arg(short, long)]
    quiet: bool,

    /// Show verbose output
    #[arg(short = 'v', long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Output format for run results.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Subcommands for toolflow.
#[derive(Subcommand)]
enum Commands {
    /// Probe the configured servers without handshaking
    Ping,

    /// Handshake the configured servers and list their tools
    Tools {
        /// Output format (text or json)
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Show resolved configuration
    Config,

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let telemetry_config = if cli.quiet {
        TelemetryConfig::quiet()
    } else if cli.verbose {
        TelemetryConfig::verbose()
    } else {
        TelemetryConfig::default()
    };
    let _guard = init_telemetry(&telemetry_config)?;

    let settings = resolve_settings(&cli)?;

    if let Some(command) = cli.command {
        return handle_command(command, &settings).await;
    }

    let Some(task) = cli.task else {
        eprintln!(
            "{}",
            "No task given. Usage: toolflow \"<task>\" --server <url>".red()
        );
        std::process::exit(2);
    };

    run_task(&settings, &task, cli.output_format).await
}

/// Layer CLI flags over file and environment settings.
fn resolve_settings(cli: &Cli) -> anyhow::Result<Settings> {
    let mut settings = Settings::resolve(cli.config.as_deref())?;

    if !cli.server.is_empty() {
        settings.servers = cli.server.clone();
    }
    if let Some(model) = &cli.model {
        settings.model = model.clone();
    }
    if let Some(max_rounds) = cli.max_rounds {
        settings.max_rounds = max_rounds;
    }

    Ok(settings)
}

async fn run_task(settings: &Settings, task: &str, format: OutputFormat) -> anyhow::Result<()> {
    let llm = match create_client(settings) {
        Ok(llm) => llm,
        Err(e) => {
            eprintln!("{}", format!("Failed to create LLM client: {e}").red());
            std::process::exit(1);
        }
    };

    let servers = settings.server_urls()?;
    if servers.is_empty() {
        println!(
            "{}",
            "No servers configured; the model will run without tools.".dimmed()
        );
    }

    let executor = Executor::new(
        llm,
        Transport::with_defaults(),
        ExecutorConfig {
            servers,
            max_rounds: settings.max_rounds,
            system_prompt: settings.system_prompt.clone(),
        },
    );

    // Ctrl-C flips the cancel flag; the run drops in-flight calls and
    // reports a cancellation error instead of dying mid-write.
    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = cancel_tx.send(true);
        }
    });

    let report = executor.run_with_cancel(task, cancel_rx).await;
    print_report(&report, format)?;

    if !report.completed {
        std::process::exit(1);
    }
    Ok(())
}

fn print_report(report: &RunReport, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(report)?);
        }
        OutputFormat::Text => {
            for line in &report.context {
                println!("{line}");
            }
            if report.completed {
                println!(
                    "{}",
                    format!("✓ Completed in {} round(s)", report.rounds).green()
                );
            } else {
                for record in &report.errors {
                    eprintln!("{}", format!("✗ {record}").red());
                }
                eprintln!(
                    "{}",
                    format!("✗ Failed after {} round(s)", report.rounds).red()
                );
            }
        }
    }
    Ok(())
}

async fn handle_command(command: Commands, settings: &Settings) -> anyhow::Result<()> {
    match command {
        Commands::Ping => {
            let servers = settings.server_urls()?;
            if servers.is_empty() {
                println!("{}", "No servers configured".yellow());
                return Ok(());
            }

            let transport = Transport::with_defaults();
            for health in ping_servers(&transport, &servers).await {
                if health.reachable {
                    println!("{} {}", "✓".green(), health.endpoint);
                } else {
                    println!(
                        "{} {} - {}",
                        "✗".red(),
                        health.endpoint,
                        health.detail.unwrap_or_default()
                    );
                }
            }
        }
        Commands::Tools { format } => {
            let servers = settings.server_urls()?;
            if servers.is_empty() {
                println!("{}", "No servers configured".yellow());
                return Ok(());
            }

            let transport = Transport::with_defaults();
            let mut sessions = SessionManager::new(transport.clone());
            for (endpoint, outcome) in sessions.handshake_all(&servers).await {
                if let Err(e) = outcome {
                    eprintln!("{}", format!("✗ {endpoint} - {e}").red());
                }
            }

            let discovery = ToolRegistry::discover(&transport, &sessions).await;
            for (endpoint, e) in &discovery.failures {
                eprintln!("{}", format!("✗ {endpoint} - {e}").red());
            }

            match format {
                OutputFormat::Json => {
                    let tools: Vec<_> = discovery
                        .registry
                        .descriptors()
                        .iter()
                        .map(|d| {
                            serde_json::json!({
                                "name": d.name,
                                "description": d.description,
                                "server": d.server.as_str(),
                                "inputSchema": d.schema,
                            })
                        })
                        .collect();
                    println!("{}", serde_json::to_string_pretty(&tools)?);
                }
                OutputFormat::Text => {
                    if discovery.registry.is_empty() {
                        println!("{}", "No tools advertised".yellow());
                    }
                    for d in discovery.registry.descriptors() {
                        println!(
                            "{} {} [{}] - {}",
                            "✓".green(),
                            d.name.bright_white(),
                            d.server,
                            d.description
                        );
                    }
                }
            }
        }
        Commands::Config => {
            // Never echo credentials back out
            let mut shown = settings.clone();
            shown.gemini_api_key = shown.gemini_api_key.map(|_| "<redacted>".to_string());
            println!("{}", serde_json::to_string_pretty(&shown)?);
        }
        Commands::Version => {
            println!("toolflow {VERSION}");
        }
    }
    Ok(())
}
