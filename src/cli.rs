use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::classify::{BtcStateInputs, CycleInput, EtfFlowInputs, MarketStateEngine};
use crate::config::AppConfig;
use crate::domain::{BtcState, Regime, SnapshotVector};
use crate::error::{MarketStateError, Result};

#[derive(Parser, Debug)]
#[command(name = "market-state")]
#[command(version)]
#[command(
    about = "Classify market regime, BTC leverage state and ETF flow momentum from a snapshot",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Directory holding default.toml and per-environment overrides
    #[arg(short, long, default_value = "config", env = "MARKET_STATE_CONFIG_DIR")]
    pub config_dir: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Text,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Classify the macro regime from a snapshot vector (JSON object keyed by indicator)
    Regime {
        #[arg(short, long)]
        input: PathBuf,
        /// Previous cycle's regime (risk_on, risk_off, base)
        #[arg(long)]
        prior: Option<String>,
    },

    /// Classify the BTC leverage state from BTC inputs
    Btc {
        #[arg(short, long)]
        input: PathBuf,
        /// Previous cycle's state (S1..S4)
        #[arg(long)]
        prior: Option<String>,
    },

    /// Tag ETF flow momentum from dated daily flows
    Etf {
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Run a full cycle (regime, BTC state, ETF flow) from one input record
    Cycle {
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Print the effective configuration
    Config,
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)?;
    debug!(path = %path.display(), bytes = raw.len(), "read input");
    let value = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(value)
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

fn parse_prior<T>(raw: Option<&str>) -> Result<Option<T>>
where
    T: std::str::FromStr<Err = MarketStateError>,
{
    raw.map(|s| s.parse::<T>()).transpose()
}

/// Execute a command and return what should be printed
pub fn run(cli: &Cli, config: &AppConfig) -> Result<String> {
    let engine = MarketStateEngine::new(config);

    match &cli.command {
        Commands::Regime { input, prior } => {
            let snapshots: SnapshotVector = read_json(input)?;
            let prior = parse_prior::<Regime>(prior.as_deref())?;
            let verdict = engine.regime().classify(&snapshots, prior);
            match cli.format {
                OutputFormat::Json => to_json(&verdict),
                OutputFormat::Text => Ok(verdict.render()),
            }
        }
        Commands::Btc { input, prior } => {
            let inputs: BtcStateInputs = read_json(input)?;
            let prior = parse_prior::<BtcState>(prior.as_deref())?;
            let verdict = engine.btc().classify(&inputs, prior);
            match cli.format {
                OutputFormat::Json => to_json(&verdict),
                OutputFormat::Text => Ok(verdict.render()),
            }
        }
        Commands::Etf { input } => {
            let inputs: EtfFlowInputs = read_json(input)?;
            let report = engine.etf().evaluate(&inputs);
            match cli.format {
                OutputFormat::Json => to_json(&report),
                OutputFormat::Text => Ok(report.render()),
            }
        }
        Commands::Cycle { input } => {
            let input: CycleInput = read_json(input)?;
            input.validate()?;
            let report = engine.evaluate(&input);
            match cli.format {
                OutputFormat::Json => to_json(&report),
                OutputFormat::Text => Ok(report.render()),
            }
        }
        Commands::Config => to_json(config),
    }
}
