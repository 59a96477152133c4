use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{MarketStateError, Result};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub regime: RegimeThresholds,
    #[serde(default)]
    pub btc: BtcThresholds,
    #[serde(default)]
    pub etf: EtfThresholds,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Thresholds of the six macro regime rules. Percent units.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegimeThresholds {
    /// SPX 1d change below this counts as an equity sell-off
    #[serde(default = "default_equity_selloff")]
    pub equity_selloff_pct: f64,
    /// GOLD 1d change above this counts as a safe-haven bid
    #[serde(default = "default_safe_haven_bid")]
    pub safe_haven_bid_pct: f64,
    /// VIX 1d change above this (while above MA20) counts as a spike
    #[serde(default = "default_vix_spike")]
    pub vix_spike_pct: f64,
    /// NDX 1d change below this (while below MA20) counts as a breakdown
    #[serde(default = "default_tech_breakdown")]
    pub tech_breakdown_pct: f64,
    /// SPX and NDX 1d change above this counts as a broad rally
    #[serde(default = "default_equity_rally")]
    pub equity_rally_pct: f64,
    /// VIX 1d change below this (while below MA20) counts as compression
    #[serde(default = "default_vix_compression")]
    pub vix_compression_pct: f64,
    /// GOLD 1d change below this (while NDX above MA20) counts as a haven unwind
    #[serde(default = "default_safe_haven_unwind")]
    pub safe_haven_unwind_pct: f64,
}

fn default_equity_selloff() -> f64 {
    -2.0
}
fn default_safe_haven_bid() -> f64 {
    1.0
}
fn default_vix_spike() -> f64 {
    15.0
}
fn default_tech_breakdown() -> f64 {
    -2.0
}
fn default_equity_rally() -> f64 {
    1.0
}
fn default_vix_compression() -> f64 {
    -10.0
}
fn default_safe_haven_unwind() -> f64 {
    -0.5
}

impl Default for RegimeThresholds {
    fn default() -> Self {
        Self {
            equity_selloff_pct: default_equity_selloff(),
            safe_haven_bid_pct: default_safe_haven_bid(),
            vix_spike_pct: default_vix_spike(),
            tech_breakdown_pct: default_tech_breakdown(),
            equity_rally_pct: default_equity_rally(),
            vix_compression_pct: default_vix_compression(),
            safe_haven_unwind_pct: default_safe_haven_unwind(),
        }
    }
}

/// BTC leverage-state rule-set thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BtcThresholds {
    /// Trailing window (calendar days) for funding and liquidation aggregates
    #[serde(default = "default_window_days")]
    pub window_days: usize,
    /// OI 7d % change above this supports a build-up (S1)
    #[serde(default = "default_oi_build_up")]
    pub oi_build_up_pct: f64,
    /// Price 7d % change below this supports a flush (S2)
    #[serde(default = "default_price_flush")]
    pub price_flush_pct: f64,
    /// 24h liquidations above this multiple of the 7d average support a flush
    #[serde(default = "default_liquidation_spike")]
    pub liquidation_spike_multiple: f64,
    /// OI 7d % change at or below this supports a repair (S3)
    #[serde(default = "default_oi_repair_max")]
    pub oi_repair_max_pct: f64,
    /// |funding| below this counts as neutral funding
    #[serde(default = "default_funding_neutral_band")]
    pub funding_neutral_band: f64,
    /// Conditions a rule set needs before it qualifies
    #[serde(default = "default_min_conditions")]
    pub min_conditions: usize,
    /// Missing-field count that short-circuits to S4
    #[serde(default = "default_missing_field_limit")]
    pub missing_field_limit: usize,
}

fn default_window_days() -> usize {
    7
}
fn default_oi_build_up() -> f64 {
    5.0
}
fn default_price_flush() -> f64 {
    -5.0
}
fn default_liquidation_spike() -> f64 {
    1.5
}
fn default_oi_repair_max() -> f64 {
    2.0
}
fn default_funding_neutral_band() -> f64 {
    0.0005
}
fn default_min_conditions() -> usize {
    2
}
fn default_missing_field_limit() -> usize {
    2
}

impl Default for BtcThresholds {
    fn default() -> Self {
        Self {
            window_days: default_window_days(),
            oi_build_up_pct: default_oi_build_up(),
            price_flush_pct: default_price_flush(),
            liquidation_spike_multiple: default_liquidation_spike(),
            oi_repair_max_pct: default_oi_repair_max(),
            funding_neutral_band: default_funding_neutral_band(),
            min_conditions: default_min_conditions(),
            missing_field_limit: default_missing_field_limit(),
        }
    }
}

/// ETF flow momentum thresholds. Flows are in millions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EtfThresholds {
    /// Short rolling window (trading days)
    #[serde(default = "default_short_window")]
    pub short_window: usize,
    /// Long rolling window (trading days)
    #[serde(default = "default_long_window")]
    pub long_window: usize,
    /// A single day's net flow below this is a drag on its own
    #[serde(default = "default_single_day_drag")]
    pub single_day_drag: f64,
}

fn default_short_window() -> usize {
    5
}
fn default_long_window() -> usize {
    20
}
fn default_single_day_drag() -> f64 {
    -200.0
}

impl Default for EtfThresholds {
    fn default() -> Self {
        Self {
            short_window: default_short_window(),
            long_window: default_long_window(),
            single_day_drag: default_single_day_drag(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directives, e.g. `info,market_state=debug`
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
    /// Directory for daily-rotated log files; console only when unset
    #[serde(default)]
    pub dir: Option<String>,
}

const DEFAULT_LOG_FILTER: &str = "info,market_state=debug";

fn default_log_level() -> String {
    DEFAULT_LOG_FILTER.to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            dir: None,
        }
    }
}

/// Size of the smallest BTC rule sets (S1 build-up, S2 flush)
const MAX_MIN_CONDITIONS: usize = 3;

impl AppConfig {
    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> std::result::Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();
        let env = std::env::var("MARKET_STATE_ENV").unwrap_or_else(|_| "development".to_string());

        let builder = Config::builder()
            .set_default("logging.level", DEFAULT_LOG_FILTER)?
            .set_default("logging.json", false)?
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/production.toml)
            .add_source(File::from(config_dir.join(format!("{env}.toml"))).required(false))
            // Override with environment variables (MARKET_STATE_BTC__WINDOW_DAYS, etc.)
            .add_source(
                Environment::with_prefix("MARKET_STATE")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Load and validate in one step
    pub fn load_validated<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config = Self::load_from(config_dir)?;
        config.validate().map_err(MarketStateError::InvalidConfig)?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> std::result::Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.btc.window_days == 0 {
            errors.push("btc.window_days must be positive".to_string());
        }

        if self.btc.liquidation_spike_multiple <= 0.0 {
            errors.push("btc.liquidation_spike_multiple must be positive".to_string());
        }

        if self.btc.funding_neutral_band < 0.0 {
            errors.push("btc.funding_neutral_band must not be negative".to_string());
        }

        if self.btc.min_conditions == 0 {
            errors.push("btc.min_conditions must be positive".to_string());
        }

        if self.btc.min_conditions > MAX_MIN_CONDITIONS {
            errors.push(format!(
                "btc.min_conditions ({}) exceeds the {} conditions of the S1 and S2 rule sets",
                self.btc.min_conditions, MAX_MIN_CONDITIONS
            ));
        }

        if self.btc.missing_field_limit == 0 {
            errors.push(
                "btc.missing_field_limit must be positive or every cycle falls back to S4"
                    .to_string(),
            );
        }

        if self.etf.short_window == 0 || self.etf.long_window == 0 {
            errors.push("etf windows must be positive".to_string());
        }

        if self.etf.short_window >= self.etf.long_window {
            errors.push(format!(
                "etf.short_window ({}) must be shorter than etf.long_window ({})",
                self.etf.short_window, self.etf.long_window
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::{Mutex, MutexGuard};

    // Process environment is shared by every test thread
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn env_lock() -> MutexGuard<'static, ()> {
        ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_file(dir: &Path, name: &str, body: &str) {
        let mut file = std::fs::File::create(dir.join(name)).unwrap();
        writeln!(file, "{body}").unwrap();
    }

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.btc.window_days, 7);
        assert_eq!(config.etf.short_window, 5);
        assert_eq!(config.etf.long_window, 20);
        assert_eq!(config.regime.equity_selloff_pct, -2.0);
    }

    #[test]
    fn load_from_empty_dir_yields_defaults() {
        let _guard = env_lock();
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_from(dir.path()).unwrap();
        assert_eq!(config.btc.min_conditions, 2);
        assert_eq!(config.logging.level, "info,market_state=debug");
        assert!(config.logging.dir.is_none());
    }

    #[test]
    fn default_toml_overrides_individual_fields() {
        let _guard = env_lock();
        let dir = tempfile::tempdir().unwrap();
        write_file(
            dir.path(),
            "default.toml",
            "[etf]\nsingle_day_drag = -150.0\n\n[logging]\njson = true",
        );

        let config = AppConfig::load_from(dir.path()).unwrap();
        assert_eq!(config.etf.single_day_drag, -150.0);
        assert_eq!(config.etf.long_window, 20);
        assert!(config.logging.json);
    }

    #[test]
    fn environment_file_layers_over_default() {
        let _guard = env_lock();
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "default.toml", "[etf]\nsingle_day_drag = -150.0");
        write_file(dir.path(), "staging.toml", "[etf]\nsingle_day_drag = -400.0");

        std::env::set_var("MARKET_STATE_ENV", "staging");
        let loaded = AppConfig::load_from(dir.path());
        std::env::remove_var("MARKET_STATE_ENV");

        let config = loaded.unwrap();
        assert_eq!(config.etf.single_day_drag, -400.0);
        assert_eq!(config.etf.short_window, 5);
    }

    #[test]
    fn env_vars_override_files() {
        let _guard = env_lock();
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "default.toml", "[btc]\nwindow_days = 10");

        std::env::set_var("MARKET_STATE_BTC__WINDOW_DAYS", "5");
        let loaded = AppConfig::load_from(dir.path());
        std::env::remove_var("MARKET_STATE_BTC__WINDOW_DAYS");

        let config = loaded.unwrap();
        assert_eq!(config.btc.window_days, 5);
        assert_eq!(config.btc.min_conditions, 2);
    }

    #[test]
    fn default_log_filter_parses() {
        let config = AppConfig::default();
        assert!(tracing_subscriber::EnvFilter::try_new(&config.logging.level).is_ok());
    }

    #[test]
    fn validate_rejects_unreachable_btc_thresholds() {
        let mut config = AppConfig::default();
        config.btc.missing_field_limit = 0;
        config.btc.min_conditions = 4;

        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors[0].starts_with("btc.min_conditions (4) exceeds"));
        assert!(errors[1].starts_with("btc.missing_field_limit must be positive"));

        config.btc.min_conditions = 3;
        config.btc.missing_field_limit = 1;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_reports_every_problem() {
        let mut config = AppConfig::default();
        config.btc.window_days = 0;
        config.etf.short_window = 20;

        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors[1].contains("short_window"));
    }
}
