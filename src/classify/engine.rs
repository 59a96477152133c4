//! One classification cycle over an immutable input record

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::AppConfig;
use crate::domain::{BtcState, Regime, SnapshotVector};
use crate::error::{MarketStateError, Result};

use super::btc_state::{BtcStateClassifier, BtcStateInputs, BtcStateVerdict};
use super::etf_flow::{EtfFlowInputs, EtfFlowReport, EtfFlowTagger};
use super::regime::{RegimeClassifier, RegimeVerdict};

/// Labels persisted by the previous cycle, injected by the caller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorLabels {
    #[serde(default)]
    pub regime: Option<Regime>,
    #[serde(default)]
    pub btc_state: Option<BtcState>,
}

/// Everything one cycle reads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleInput {
    pub as_of: NaiveDate,
    #[serde(default)]
    pub indicators: SnapshotVector,
    pub btc: BtcStateInputs,
    pub etf: EtfFlowInputs,
    #[serde(default)]
    pub prior: PriorLabels,
}

impl CycleInput {
    /// Every section must describe the same cycle date
    pub fn validate(&self) -> Result<()> {
        for (section, date) in [("btc", self.btc.as_of), ("etf", self.etf.as_of)] {
            if date != self.as_of {
                return Err(MarketStateError::InvalidInput(format!(
                    "{section}.as_of {date} does not match cycle as_of {}",
                    self.as_of
                )));
            }
        }
        Ok(())
    }
}

/// Everything one cycle produces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleReport {
    pub as_of: NaiveDate,
    pub regime: RegimeVerdict,
    pub btc: BtcStateVerdict,
    pub etf: EtfFlowReport,
}

impl CycleReport {
    /// Labels to persist for the next cycle
    pub fn next_prior(&self) -> PriorLabels {
        PriorLabels {
            regime: Some(self.regime.regime),
            btc_state: Some(self.btc.state),
        }
    }

    pub fn render(&self) -> String {
        let mut out = format!("market state as of {}\n\n", self.as_of.format("%Y-%m-%d"));
        out.push_str(&self.regime.render());
        out.push('\n');
        out.push_str(&self.btc.render());
        out.push('\n');
        out.push_str(&self.etf.render());
        out
    }
}

/// Runs every classifier for a cycle. Holds thresholds only; no state
/// carries from one call to the next.
#[derive(Debug, Clone, Default)]
pub struct MarketStateEngine {
    regime: RegimeClassifier,
    btc: BtcStateClassifier,
    etf: EtfFlowTagger,
}

impl MarketStateEngine {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            regime: RegimeClassifier::new(config.regime.clone()),
            btc: BtcStateClassifier::new(config.btc.clone()),
            etf: EtfFlowTagger::new(config.etf.clone()),
        }
    }

    pub fn regime(&self) -> &RegimeClassifier {
        &self.regime
    }

    pub fn btc(&self) -> &BtcStateClassifier {
        &self.btc
    }

    pub fn etf(&self) -> &EtfFlowTagger {
        &self.etf
    }

    pub fn evaluate(&self, input: &CycleInput) -> CycleReport {
        let regime = self.regime.classify(&input.indicators, input.prior.regime);
        let btc = self.btc.classify(&input.btc, input.prior.btc_state);
        let etf = self.etf.evaluate(&input.etf);

        info!(
            as_of = %input.as_of,
            regime = %regime.regime,
            btc_state = %btc.state,
            etf = %etf.tag.tag,
            "cycle evaluated"
        );

        CycleReport {
            as_of: input.as_of,
            regime,
            btc,
            etf,
        }
    }
}
