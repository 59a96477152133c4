//! Evidence chains: every literal and derived value a verdict was built from,
//! plus the ordered list of inputs that were not usable.
//!
//! The text renderers are deterministic and print the literal token
//! `missing` for every absent datum.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

use crate::domain::{IndicatorKey, SnapshotVector};

/// Token printed for every absent datum
pub const MISSING: &str = "missing";

/// Missing-field identifiers of the BTC evidence chain, in evaluation order
pub mod fields {
    pub const PRICE_7D: &str = "price_7d";
    pub const OI_7D: &str = "oi_7d";
    pub const FUNDING_LATEST: &str = "funding_latest";
    pub const FUNDING_7D_AVG: &str = "funding_7d_avg";
    pub const LIQUIDATION_24H: &str = "liquidation_24h";
    pub const LIQUIDATION_7D_AVG: &str = "liquidation_7d_avg";
    pub const STABLECOIN_7D: &str = "stablecoin_7d";
    pub const STABLECOIN_30D: &str = "stablecoin_30d";
    pub const EXCHANGE_NETFLOW: &str = "exchange_netflow";

    /// `<KEY>.change_1d`
    pub fn change_1d(key: super::IndicatorKey) -> String {
        format!("{}.change_1d", key.as_str())
    }

    /// `<KEY>.above_ma20`
    pub fn above_ma20(key: super::IndicatorKey) -> String {
        format!("{}.above_ma20", key.as_str())
    }
}

/// Ordered set of missing-field identifiers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MissingFields(Vec<String>);

impl MissingFields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a field; repeats keep their first position
    pub fn note(&mut self, field: impl Into<String>) {
        let field = field.into();
        if !self.0.contains(&field) {
            self.0.push(field);
        }
    }

    /// Pass a value through, recording `field` when it is absent
    pub fn track<T>(&mut self, field: &str, value: Option<T>) -> Option<T> {
        if value.is_none() {
            self.note(field);
        }
        value
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.iter().any(|f| f == field)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn joined(&self) -> String {
        if self.0.is_empty() {
            "none".to_string()
        } else {
            self.0.join(", ")
        }
    }
}

pub(crate) fn fmt_value(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{v}"),
        None => MISSING.to_string(),
    }
}

pub(crate) fn fmt_pct(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{v:+.2}%"),
        None => MISSING.to_string(),
    }
}

pub(crate) fn fmt_flag(value: Option<bool>, yes: &str, no: &str) -> String {
    match value {
        Some(true) => yes.to_string(),
        Some(false) => no.to_string(),
        None => MISSING.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceEvidence {
    pub latest: Option<f64>,
    pub seven_days_ago: Option<f64>,
    pub change_7d_pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenInterestEvidence {
    pub latest: Option<f64>,
    pub seven_days_ago: Option<f64>,
    pub change_7d_pct: Option<f64>,
    pub change_7d_abs: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundingEvidence {
    pub latest: Option<f64>,
    pub avg_7d: Option<f64>,
    /// Why the 7d average is missing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_7d_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquidationEvidence {
    pub last_24h: Option<f64>,
    pub total_7d: Option<f64>,
    pub avg_7d: Option<f64>,
    /// Days of the trailing window with no reading
    pub missing_days: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StablecoinEvidence {
    pub supply: Option<f64>,
    pub change_7d_pct: Option<f64>,
    pub change_30d_pct: Option<f64>,
}

/// A metric with no upstream source; always missing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnavailableMetric {
    pub value: Option<f64>,
    pub reason: String,
}

impl UnavailableMetric {
    pub fn exchange_netflow() -> Self {
        Self {
            value: None,
            reason: "not implemented: no exchange-netflow source is wired".to_string(),
        }
    }
}

/// Evidence behind a BTC leverage-state verdict
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BtcEvidence {
    pub as_of: NaiveDate,
    pub price: PriceEvidence,
    pub open_interest: OpenInterestEvidence,
    pub funding: FundingEvidence,
    pub liquidations: LiquidationEvidence,
    pub stablecoin: StablecoinEvidence,
    /// Reported for completeness; consulted by no rule and not counted
    /// in `missing_fields`
    pub exchange_netflow: UnavailableMetric,
    pub missing_fields: MissingFields,
}

impl BtcEvidence {
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "as_of: {}", self.as_of.format("%Y-%m-%d"));
        let _ = writeln!(
            out,
            "price: latest={} 7d_ago={} change_7d={}",
            fmt_value(self.price.latest),
            fmt_value(self.price.seven_days_ago),
            fmt_pct(self.price.change_7d_pct),
        );
        let _ = writeln!(
            out,
            "open_interest: latest={} 7d_ago={} change_7d={} change_7d_abs={}",
            fmt_value(self.open_interest.latest),
            fmt_value(self.open_interest.seven_days_ago),
            fmt_pct(self.open_interest.change_7d_pct),
            fmt_value(self.open_interest.change_7d_abs),
        );
        let _ = write!(
            out,
            "funding: latest={} avg_7d={}",
            fmt_value(self.funding.latest),
            fmt_value(self.funding.avg_7d),
        );
        if let Some(reason) = &self.funding.avg_7d_reason {
            let _ = write!(out, " ({reason})");
        }
        out.push('\n');
        let _ = write!(
            out,
            "liquidations: 24h={} total_7d={} avg_7d={} missing_days={}",
            fmt_value(self.liquidations.last_24h),
            fmt_value(self.liquidations.total_7d),
            fmt_value(self.liquidations.avg_7d),
            self.liquidations.missing_days,
        );
        if let Some(reason) = &self.liquidations.window_reason {
            let _ = write!(out, " ({reason})");
        }
        out.push('\n');
        let _ = writeln!(
            out,
            "stablecoin: supply={} change_7d={} change_30d={}",
            fmt_value(self.stablecoin.supply),
            fmt_pct(self.stablecoin.change_7d_pct),
            fmt_pct(self.stablecoin.change_30d_pct),
        );
        let _ = writeln!(
            out,
            "exchange_netflow: {} ({})",
            fmt_value(self.exchange_netflow.value),
            self.exchange_netflow.reason,
        );
        let _ = writeln!(out, "missing_fields: {}", self.missing_fields.joined());
        out
    }
}

/// One indicator as the regime rules saw it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorEvidence {
    pub key: IndicatorKey,
    pub display_name: Option<String>,
    pub latest: Option<f64>,
    pub change_1d: Option<f64>,
    pub above_ma20: Option<bool>,
}

impl IndicatorEvidence {
    pub fn collect(snapshots: &SnapshotVector, key: IndicatorKey) -> Self {
        let snapshot = snapshots.get(key);
        Self {
            key,
            display_name: snapshot.map(|s| s.display_name.clone()).filter(|n| !n.is_empty()),
            latest: snapshot.and_then(|s| s.latest_value),
            change_1d: snapshot.and_then(|s| s.change_1d),
            above_ma20: snapshot.and_then(|s| s.above_moving_average_20),
        }
    }

    fn render_line(&self, out: &mut String) {
        let _ = writeln!(
            out,
            "{}: latest={} change_1d={} ma20={}",
            self.key,
            fmt_value(self.latest),
            fmt_pct(self.change_1d),
            fmt_flag(self.above_ma20, "above", "below"),
        );
    }
}

/// High-beta crypto confirmation. Reported alongside the regime; no rule reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CryptoConfirmation {
    pub latest: Option<f64>,
    pub change_1d: Option<f64>,
    pub change_7d: Option<f64>,
    pub above_ma20: Option<bool>,
}

impl CryptoConfirmation {
    pub fn collect(snapshots: &SnapshotVector) -> Self {
        let snapshot = snapshots.get(IndicatorKey::Btc);
        Self {
            latest: snapshot.and_then(|s| s.latest_value),
            change_1d: snapshot.and_then(|s| s.change_1d),
            change_7d: snapshot.and_then(|s| s.change_7d),
            above_ma20: snapshot.and_then(|s| s.above_moving_average_20),
        }
    }
}

/// Evidence behind a regime verdict
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeEvidence {
    pub indicators: Vec<IndicatorEvidence>,
    pub crypto_confirmation: CryptoConfirmation,
    pub missing_fields: MissingFields,
}

impl RegimeEvidence {
    pub fn render(&self) -> String {
        let mut out = String::new();
        for indicator in &self.indicators {
            indicator.render_line(&mut out);
        }
        let _ = writeln!(
            out,
            "BTC (confirmation only): latest={} change_1d={} change_7d={} ma20={}",
            fmt_value(self.crypto_confirmation.latest),
            fmt_pct(self.crypto_confirmation.change_1d),
            fmt_pct(self.crypto_confirmation.change_7d),
            fmt_flag(self.crypto_confirmation.above_ma20, "above", "below"),
        );
        let _ = writeln!(out, "missing_fields: {}", self.missing_fields.joined());
        out
    }
}
