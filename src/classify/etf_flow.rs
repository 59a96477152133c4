//! Spot ETF net-flow momentum tag. Descriptive context only.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use tracing::info;

use crate::config::EtfThresholds;
use crate::domain::{DatedSeries, DatedValue, FlowMomentum};

use super::calendar::{latest_trading_day, trading_day_window};
use super::evidence::fmt_value;
use super::rolling::{rolling_mean, RollingWindowResult};

/// Daily net flows (millions), any order, weekends ignored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EtfFlowInputs {
    pub as_of: NaiveDate,
    #[serde(default)]
    pub flows: Vec<DatedValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EtfFlowTag {
    pub tag: FlowMomentum,
    pub reason: String,
}

/// Ordered rule, first match wins
pub fn tag_flow(
    today: Option<f64>,
    rolling_short: Option<f64>,
    rolling_long: Option<f64>,
    t: &EtfThresholds,
) -> EtfFlowTag {
    let (Some(today), Some(short), Some(long)) = (today, rolling_short, rolling_long) else {
        return EtfFlowTag {
            tag: FlowMomentum::Neutral,
            reason: "Insufficient data".to_string(),
        };
    };

    if short < 0.0 && short < long {
        return EtfFlowTag {
            tag: FlowMomentum::Drag,
            reason: format!(
                "Weak momentum: {}d average {} is negative and below the {}d average {}",
                t.short_window, short, t.long_window, long
            ),
        };
    }

    if today < t.single_day_drag {
        return EtfFlowTag {
            tag: FlowMomentum::Drag,
            reason: format!(
                "Single-day outflow {} below {} regardless of rolling averages",
                today, t.single_day_drag
            ),
        };
    }

    if short > 0.0 && long >= 0.0 {
        return EtfFlowTag {
            tag: FlowMomentum::Supportive,
            reason: format!(
                "{}d average {} is positive with a non-negative {}d average {}",
                t.short_window, short, t.long_window, long
            ),
        };
    }

    EtfFlowTag {
        tag: FlowMomentum::Neutral,
        reason: format!(
            "Mixed flows: today {}, {}d average {}, {}d average {}",
            today, t.short_window, short, t.long_window, long
        ),
    }
}

/// Tag plus the values it was computed from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EtfFlowReport {
    pub trading_day: NaiveDate,
    pub today: Option<f64>,
    pub rolling_short: RollingWindowResult,
    pub rolling_long: RollingWindowResult,
    #[serde(flatten)]
    pub tag: EtfFlowTag,
}

impl EtfFlowReport {
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "etf_flow: {} ({})", self.tag.tag, self.tag.reason);
        let _ = writeln!(
            out,
            "trading_day: {} today={}",
            self.trading_day.format("%Y-%m-%d"),
            fmt_value(self.today)
        );
        for (label, result) in [("short", &self.rolling_short), ("long", &self.rolling_long)] {
            let _ = write!(out, "rolling_{label}: {}", fmt_value(result.value));
            if let Some(reason) = &result.failure_reason {
                let _ = write!(out, " ({reason})");
            }
            out.push('\n');
        }
        out
    }
}

#[derive(Debug, Clone, Default)]
pub struct EtfFlowTagger {
    thresholds: EtfThresholds,
}

impl EtfFlowTagger {
    pub fn new(thresholds: EtfThresholds) -> Self {
        Self { thresholds }
    }

    pub fn evaluate(&self, inputs: &EtfFlowInputs) -> EtfFlowReport {
        let t = &self.thresholds;
        let series = DatedSeries::new(inputs.flows.iter().copied());
        let trading_day = latest_trading_day(inputs.as_of);

        let today = series.value_on(trading_day);
        let rolling_short = rolling_mean(
            &trading_day_window(&series, inputs.as_of, t.short_window),
            t.short_window,
        );
        let rolling_long = rolling_mean(
            &trading_day_window(&series, inputs.as_of, t.long_window),
            t.long_window,
        );

        let tag = tag_flow(today, rolling_short.value, rolling_long.value, t);
        info!(tag = %tag.tag, reason = %tag.reason, "etf flow tagged");

        EtfFlowReport {
            trading_day,
            today,
            rolling_short,
            rolling_long,
            tag,
        }
    }
}
