use anyhow::{Context, Result};
use bizdesk_core::adapters::google::{GmailAdapter, GoogleCalendarAdapter};
use bizdesk_core::adapters::memory::{RecordingCalendar, RecordingMail, StaticLedger};
use bizdesk_core::{AdapterSet, Domain, Instruction, Manager, Outcome, format_report};
use bizdesk_ledger::TallyLedger;
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;

use config::BizdeskConfig;

#[derive(Parser)]
#[command(name = "bizdesk")]
#[command(version)]
#[command(about = "bizdesk: routes business instructions to mail, calendar and ledger capabilities")]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize config directory and default config
    Init,

    /// Show current configuration (secrets masked)
    Config,

    /// List registered capabilities with their input schemas
    Capabilities {
        /// Only this domain
        #[arg(long)]
        domain: Option<Domain>,
    },

    /// Show how an instruction would be routed, without running it
    Route {
        text: String,

        /// Explicit argument, repeatable: --arg name=value
        #[arg(long = "arg", value_name = "NAME=VALUE")]
        args: Vec<String>,

        /// Skip domain classification
        #[arg(long)]
        domain: Option<Domain>,
    },

    /// Route and execute an instruction
    Ask {
        text: String,

        /// Explicit argument, repeatable: --arg name=value
        #[arg(long = "arg", value_name = "NAME=VALUE")]
        args: Vec<String>,

        /// Skip domain classification
        #[arg(long)]
        domain: Option<Domain>,

        /// Run this capability instead of ranking
        #[arg(long)]
        capability: Option<String>,

        /// Use in-memory adapters; nothing leaves the machine
        #[arg(long)]
        dry_run: bool,

        /// Print the step report as markdown instead of JSON
        #[arg(long)]
        markdown: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Init => cmd_init().await,
        Commands::Config => cmd_config(&cli.config),
        Commands::Capabilities { domain } => cmd_capabilities(domain),
        Commands::Route { text, args, domain } => cmd_route(&cli.config, &text, &args, domain),
        Commands::Ask {
            text,
            args,
            domain,
            capability,
            dry_run,
            markdown,
        } => {
            let instruction = build_instruction(&text, &args, domain, capability)?;
            cmd_ask(&cli.config, instruction, dry_run, markdown).await
        }
    }
}

async fn cmd_init() -> Result<()> {
    let config_dir = config::config_dir();
    tokio::fs::create_dir_all(&config_dir)
        .await
        .with_context(|| format!("Failed to create config dir: {}", config_dir.display()))?;

    let config_path = config_dir.join("config.toml");
    if config_path.exists() {
        warn!("Config already exists at {}", config_path.display());
    } else {
        let default_config = include_str!("../../../config/default.toml");
        tokio::fs::write(&config_path, default_config).await?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&config_path, std::fs::Permissions::from_mode(0o600))
                .await?;
        }
        info!("Created default config at {}", config_path.display());
    }

    println!("bizdesk initialized at {}", config_dir.display());
    println!(
        "Edit {} to configure Google access and the ledger path.",
        config_path.display()
    );
    Ok(())
}

fn cmd_config(config_path: &Option<PathBuf>) -> Result<()> {
    let cfg = BizdeskConfig::load(config_path)?;
    println!("{}", toml::to_string_pretty(&cfg.redacted())?);
    Ok(())
}

fn cmd_capabilities(domain: Option<Domain>) -> Result<()> {
    let registry = bizdesk_core::catalog::default_registry()?;
    print_json(&registry.definitions(domain))
}

fn cmd_route(
    config_path: &Option<PathBuf>,
    text: &str,
    args: &[String],
    domain: Option<Domain>,
) -> Result<()> {
    let cfg = BizdeskConfig::load_or_default(config_path)?;
    // Preview never invokes adapters
    let manager = Manager::with_defaults(Arc::new(AdapterSet::new()), cfg.manager_config())?;
    let instruction = build_instruction(text, args, domain, None)?;
    print_json(&manager.preview(&instruction)?)
}

async fn cmd_ask(
    config_path: &Option<PathBuf>,
    instruction: Instruction,
    dry_run: bool,
    markdown: bool,
) -> Result<()> {
    let cfg = if dry_run {
        BizdeskConfig::load_or_default(config_path)?
    } else {
        BizdeskConfig::load(config_path)?
    };
    let adapters = build_adapters(&cfg, dry_run)?;
    let manager = Manager::with_defaults(Arc::new(adapters), cfg.manager_config())?;

    // Ctrl-C stops scheduling further steps
    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling remaining steps");
            signal_cancel.cancel();
        }
    });

    let outcome = manager.handle_with_cancel(instruction, cancel).await?;
    match (&outcome, markdown) {
        (Outcome::Completed(response), true) => {
            print!("{}", format_report(&response.report));
            Ok(())
        }
        _ => print_json(&outcome),
    }
}

fn build_adapters(cfg: &BizdeskConfig, dry_run: bool) -> Result<AdapterSet> {
    if dry_run {
        info!("Dry run: using in-memory adapters");
        return Ok(AdapterSet::new()
            .with_mail(Arc::new(RecordingMail::new()))
            .with_calendar(Arc::new(RecordingCalendar::new()))
            .with_ledger(Arc::new(StaticLedger::new())));
    }

    let mut adapters = AdapterSet::new();
    let token = cfg.google.access_token.trim();
    if token.is_empty() {
        warn!("No Google access token configured; mail and calendar capabilities will fail");
    } else {
        let gmail = GmailAdapter::new(
            token.to_string(),
            cfg.google.user_id.clone(),
            cfg.google.from_name.clone(),
        )?;
        let calendar = GoogleCalendarAdapter::new(
            token.to_string(),
            cfg.google.calendar_id.clone(),
            cfg.google.timezone.clone(),
        )?;
        adapters = adapters
            .with_mail(Arc::new(gmail))
            .with_calendar(Arc::new(calendar));
    }

    match cfg.ledger.path.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
        Some(path) => {
            let ledger = TallyLedger::open(config::expand_home(path))?;
            adapters = adapters.with_ledger(Arc::new(ledger));
        }
        None => warn!("No ledger path configured; ledger capabilities will fail"),
    }
    Ok(adapters)
}

fn build_instruction(
    text: &str,
    args: &[String],
    domain: Option<Domain>,
    capability: Option<String>,
) -> Result<Instruction> {
    let mut instruction = Instruction::new(text);
    for raw in args {
        let (name, value) = parse_arg(raw)?;
        instruction = instruction.with_argument(name, value);
    }
    if let Some(domain) = domain {
        instruction = instruction.with_domain(domain);
    }
    if let Some(capability) = capability {
        instruction = instruction.with_capability(capability);
    }
    Ok(instruction)
}

/// `name=value`; the value is read as JSON when it parses, else as a string
fn parse_arg(raw: &str) -> Result<(String, Value)> {
    let (name, value) = raw
        .split_once('=')
        .with_context(|| format!("Argument '{}' is not of the form name=value", raw))?;
    let name = name.trim();
    if name.is_empty() {
        anyhow::bail!("Argument '{}' has an empty name", raw);
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((name.to_string(), value))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
