//! `wiremap`: compiles service designs into transport models.
//!
//! Usage:
//!   wiremap -i <design.json> [-c <wiremap.toml>] [-s <service>]... [-o <out.json>] [--pretty]
//!
//! The config defaults to `wiremap.toml` next to the design. The output is a
//! JSON object mapping each compiled service name to its model.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use wiremap_compiler::{Compiler, CompilerConfig, ServiceModel};
use wiremap_ir::Design;

/// Transport mapping compiler.
#[derive(Parser, Debug)]
#[command(name = "wiremap", about = "Transport mapping compiler")]
struct Cli {
    /// Design document (JSON).
    #[arg(short = 'i', long = "input")]
    input: PathBuf,

    /// Compiler config file.
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Service to compile. Repeat for several; all services if omitted.
    #[arg(short = 's', long = "service")]
    services: Vec<String>,

    /// Output file (default: stdout).
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Pretty-print the output.
    #[arg(long)]
    pretty: bool,
}

fn main() -> anyhow::Result<()> {
    // Logs go to stderr, stdout carries the model.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output = run(&cli)?;
    match &cli.output {
        Some(path) => {
            std::fs::write(path, output)
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!("Wrote {}", path.display());
        }
        None => println!("{}", output),
    }
    Ok(())
}

fn run(cli: &Cli) -> anyhow::Result<String> {
    let content = std::fs::read_to_string(&cli.input)
        .with_context(|| format!("failed to read {}", cli.input.display()))?;
    let design = Design::from_json(&content)
        .with_context(|| format!("invalid design {}", cli.input.display()))?;

    let config_path = config_path(cli);
    info!("Loading configuration from {}", config_path.display());
    let config = CompilerConfig::load(&config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;

    let names: Vec<String> = if cli.services.is_empty() {
        design.service_names().into_iter().map(str::to_string).collect()
    } else {
        cli.services.clone()
    };

    let mut compiler = Compiler::with_config(&design, config);
    let mut models: BTreeMap<String, ServiceModel> = BTreeMap::new();
    for name in &names {
        let model = compiler
            .get(name)
            .with_context(|| format!("failed to compile service '{}'", name))?;
        match model {
            Some(model) => {
                models.insert(name.clone(), model.clone());
            }
            None => warn!("Service '{}' not found in {}", name, cli.input.display()),
        }
    }
    info!("Compiled {} of {} service(s)", models.len(), names.len());

    let output = if cli.pretty {
        serde_json::to_string_pretty(&models)?
    } else {
        serde_json::to_string(&models)?
    };
    Ok(output)
}

fn config_path(cli: &Cli) -> PathBuf {
    match &cli.config {
        Some(path) => path.clone(),
        None => cli
            .input
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join("wiremap.toml"),
    }
}
