//! # Avatar Batch Configuration Validator
//!
//! Command-line tool for validating orchestrator configuration across
//! environments before a deployment picks it up.

use anyhow::{bail, Context, Result};
use avatar_batch::config::{ConfigManager, OrchestratorConfig};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::process;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "config-validator")]
#[command(about = "Validate avatar batch orchestrator configuration")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Environment to validate (development, test, production, ...)
    #[arg(short, long, default_value = "development")]
    environment: String,

    /// Configuration directory path (default: config)
    #[arg(short, long)]
    config_dir: Option<PathBuf>,

    /// Verbose output level (use multiple times for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Output format for the resolved configuration
    #[arg(long, value_enum, default_value_t = OutputFormat::Yaml)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum OutputFormat {
    Json,
    Yaml,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load, validate and print the resolved configuration
    Validate,

    /// List environments that have an override file
    Environments,

    /// Compare the resolved configuration of two environments
    Compare {
        /// Base environment for comparison
        #[arg(short, long, default_value = "development")]
        base: String,

        /// Target environment for comparison
        #[arg(short, long)]
        target: String,
    },
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let _subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .try_init();

    let result = match &cli.command {
        Some(Commands::Validate) | None => validate(&cli),
        Some(Commands::Environments) => list_environments(&cli),
        Some(Commands::Compare { base, target }) => compare(&cli, base, target),
    };

    match result {
        Ok(()) => {
            info!("Configuration validation completed successfully");
            process::exit(0);
        }
        Err(e) => {
            error!("Configuration validation failed: {e:#}");
            eprintln!("❌ {e:#}");
            process::exit(1);
        }
    }
}

fn load(cli: &Cli, environment: &str) -> Result<OrchestratorConfig> {
    let manager = ConfigManager::load_from_directory_with_env(cli.config_dir.clone(), environment)
        .with_context(|| format!("failed to load configuration for '{environment}'"))?;
    Ok(manager.config().clone())
}

fn render(config: &OrchestratorConfig, format: OutputFormat) -> Result<String> {
    Ok(match format {
        OutputFormat::Json => serde_json::to_string_pretty(config)?,
        OutputFormat::Yaml => serde_yaml::to_string(config)?,
    })
}

fn validate(cli: &Cli) -> Result<()> {
    println!("🔧 Validating avatar batch configuration");
    println!("Environment: {}", cli.environment);
    if let Some(dir) = &cli.config_dir {
        println!("Config Directory: {}", dir.display());
    }
    println!();

    let config = load(cli, &cli.environment)?;
    println!("✅ Configuration loaded and validated");
    println!();
    println!("{}", render(&config, cli.format)?);
    Ok(())
}

fn config_dir(cli: &Cli) -> PathBuf {
    cli.config_dir.clone().unwrap_or_else(|| PathBuf::from("config"))
}

fn environment_names(dir: &Path) -> Result<Vec<String>> {
    let mut environments = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("cannot read {}", dir.display()))? {
        let file_name = entry?.file_name();
        let name = file_name.to_string_lossy();
        if let Some(env) = name
            .strip_prefix("avatar-batch.")
            .and_then(|rest| rest.strip_suffix(".yaml"))
        {
            environments.push(env.to_string());
        }
    }
    environments.sort();
    Ok(environments)
}

fn list_environments(cli: &Cli) -> Result<()> {
    let dir = config_dir(cli);
    if !dir.is_dir() {
        bail!("configuration directory not found: {}", dir.display());
    }

    println!("📁 Environments with overrides in {}:", dir.display());
    for env in environment_names(&dir)? {
        println!("  - {env}");
    }
    Ok(())
}

fn compare(cli: &Cli, base: &str, target: &str) -> Result<()> {
    let base_config = serde_json::to_value(load(cli, base)?)?;
    let target_config = serde_json::to_value(load(cli, target)?)?;

    println!("🔍 Comparing {base} → {target}");
    let mut differences = 0;
    diff_values("", &base_config, &target_config, &mut differences);
    if differences == 0 {
        println!("  (no differences)");
    }
    Ok(())
}

fn diff_values(path: &str, base: &serde_json::Value, target: &serde_json::Value, count: &mut usize) {
    match (base, target) {
        (serde_json::Value::Object(left), serde_json::Value::Object(right)) => {
            for (key, left_value) in left {
                let child = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{path}.{key}")
                };
                let right_value = right.get(key).unwrap_or(&serde_json::Value::Null);
                diff_values(&child, left_value, right_value, count);
            }
        }
        (left, right) if left != right => {
            *count += 1;
            println!("  {path}: {left} → {right}");
        }
        _ => {}
    }
}
