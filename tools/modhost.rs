//! modhost - inspect a modules directory
//!
//! Loads every manifest in a directory and reports what a launch would do,
//! without invoking any entry point.
//!
//! Usage:
//!   modhost [--config <file>] [--log-filter <filter>] check [dir]
//!   modhost [--config <file>] [--log-filter <filter>] list [dir]

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

use modhost::utils::init_logging_from_config;
use modhost::{LoadReport, ModuleManager, RuntimeConfig, Services};

#[derive(Parser, Debug)]
#[command(name = "modhost", version, about = "Inspect and validate module directories")]
struct Args {
    /// Runtime configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log filter; RUST_LOG takes precedence
    #[arg(long, global = true)]
    log_filter: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load a directory, resolve dependencies and print the launch plan
    Check {
        /// Modules directory (defaults to `modules.modules_dir` from config)
        dir: Option<PathBuf>,
    },
    /// Print every discovered module and its load outcome
    List {
        /// Modules directory (defaults to `modules.modules_dir` from config)
        dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => match RuntimeConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("{e:#}");
                return ExitCode::FAILURE;
            }
        },
        None => RuntimeConfig::default(),
    };
    if let Some(filter) = &args.log_filter {
        config.logging.filter = Some(filter.clone());
    }
    init_logging_from_config(Some(&config.logging));

    match execute(args.command, &config).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Run a subcommand; `Ok(false)` means the directory has problems
async fn execute(command: Command, config: &RuntimeConfig) -> anyhow::Result<bool> {
    let (dir, check) = match command {
        Command::Check { dir } => (dir, true),
        Command::List { dir } => (dir, false),
    };
    let dir = dir.unwrap_or_else(|| PathBuf::from(&config.modules.modules_dir));

    let mut manager = ModuleManager::with_config(Services::new(), &config.modules);
    let report = manager
        .load_directory(&dir)
        .await
        .with_context(|| format!("Cannot load modules from {}", dir.display()))?;

    if !check {
        print_report(&manager, &report);
        return Ok(report.is_clean());
    }

    for (package, e) in &report.rejected {
        println!("skipped {}: {}", package.display(), e);
    }
    match manager.resolve() {
        Ok(plan) => {
            info!("Resolution succeeded for {} modules", plan.order.len());
            println!("launch order:");
            for (i, id) in plan.order.iter().enumerate() {
                println!("  {:>3}. {}", i + 1, id);
            }
            println!("main: {}", plan.main);
            Ok(report.is_clean())
        }
        Err(e) => {
            println!("resolution failed: {}", e);
            Ok(false)
        }
    }
}

fn print_report(manager: &ModuleManager, report: &LoadReport) {
    for record in manager.modules() {
        let source = record
            .source
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        let main = if record.is_main() { " [main]" } else { "" };
        println!("ok      {}{} ({})", record.id, main, source);
        for constraint in &record.constraints {
            println!("          requires {}", constraint);
        }
    }
    for (package, e) in &report.rejected {
        println!("error   {}: {}", package.display(), e);
    }
}
