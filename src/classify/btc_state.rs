//! BTC leverage-state classification (S1 build-up, S2 flush, S3 repair, S4 neutral)
//!
//! Three competing rule sets are scored against derived 7-day values. A set
//! qualifies when at least `min_conditions` of its conditions hold; sets are
//! checked in the fixed order of [`STATE_PRIORITY`] and the first qualifying
//! set wins. Anything unresolved lands in S4.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use tracing::{debug, info};

use crate::config::BtcThresholds;
use crate::domain::{BtcState, DatedSeries, DatedValue, LiquidityTag, Stability};

use super::evidence::{
    fields, fmt_pct, fmt_value, BtcEvidence, FundingEvidence, LiquidationEvidence, MissingFields,
    OpenInterestEvidence, PriceEvidence, StablecoinEvidence, UnavailableMetric,
};
use super::rolling::{rolling_mean, rolling_sum};
use super::stability::stability;

/// Rule-set priority. Earlier entries win when several qualify.
pub const STATE_PRIORITY: [BtcState; 3] = [BtcState::S1, BtcState::S2, BtcState::S3];

/// Raw BTC inputs for one cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BtcStateInputs {
    pub as_of: NaiveDate,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub price_7d_ago: Option<f64>,
    /// Latest funding rate (per 8h, as a fraction)
    #[serde(default)]
    pub funding_rate: Option<f64>,
    /// Daily funding readings; the trailing window ends at `as_of`
    #[serde(default)]
    pub funding_history: Vec<DatedValue>,
    #[serde(default)]
    pub open_interest: Option<f64>,
    #[serde(default)]
    pub open_interest_7d_ago: Option<f64>,
    #[serde(default)]
    pub liquidations_24h: Option<f64>,
    /// Daily liquidation totals; the trailing window ends at `as_of`
    #[serde(default)]
    pub liquidation_history: Vec<DatedValue>,
    #[serde(default)]
    pub stablecoin_supply: Option<f64>,
    #[serde(default)]
    pub stablecoin_change_7d_pct: Option<f64>,
    #[serde(default)]
    pub stablecoin_change_30d_pct: Option<f64>,
}

impl BtcStateInputs {
    /// Inputs with every field missing
    pub fn empty(as_of: NaiveDate) -> Self {
        Self {
            as_of,
            price: None,
            price_7d_ago: None,
            funding_rate: None,
            funding_history: Vec::new(),
            open_interest: None,
            open_interest_7d_ago: None,
            liquidations_24h: None,
            liquidation_history: Vec::new(),
            stablecoin_supply: None,
            stablecoin_change_7d_pct: None,
            stablecoin_change_30d_pct: None,
        }
    }
}

/// Percent change from `base` to `latest`; missing unless both endpoints are
/// present and the base is non-zero
pub fn pct_change(latest: Option<f64>, base: Option<f64>) -> Option<f64> {
    match (latest, base) {
        (Some(latest), Some(base)) if base != 0.0 => Some((latest - base) / base * 100.0),
        _ => None,
    }
}

/// Stablecoin-supply liquidity direction.
///
/// Unknown whenever either change is missing, and also when both are present
/// but neither contracting nor both positive (a flat print).
pub fn liquidity_tag(change_7d: Option<f64>, change_30d: Option<f64>) -> LiquidityTag {
    match (change_7d, change_30d) {
        (Some(a), Some(b)) if a < 0.0 || b < 0.0 => LiquidityTag::Contracting,
        (Some(a), Some(b)) if a > 0.0 && b > 0.0 => LiquidityTag::Expanding,
        _ => LiquidityTag::Unknown,
    }
}

/// Derive every intermediate value and the ordered missing-field list
pub fn build_evidence(inputs: &BtcStateInputs, window_days: usize) -> BtcEvidence {
    let mut missing = MissingFields::new();

    let price_change = pct_change(inputs.price, inputs.price_7d_ago);
    missing.track(fields::PRICE_7D, price_change);

    let oi_change_pct = pct_change(inputs.open_interest, inputs.open_interest_7d_ago);
    let oi_change_abs = inputs
        .open_interest
        .zip(inputs.open_interest_7d_ago)
        .map(|(latest, base)| latest - base);
    missing.track(fields::OI_7D, oi_change_pct);

    missing.track(fields::FUNDING_LATEST, inputs.funding_rate);
    let funding_window = DatedSeries::new(inputs.funding_history.iter().copied())
        .calendar_window(inputs.as_of, window_days);
    let funding_avg = rolling_mean(&funding_window, window_days);
    missing.track(fields::FUNDING_7D_AVG, funding_avg.value);

    missing.track(fields::LIQUIDATION_24H, inputs.liquidations_24h);
    let liquidation_window = DatedSeries::new(inputs.liquidation_history.iter().copied())
        .calendar_window(inputs.as_of, window_days);
    let liquidation_total = rolling_sum(&liquidation_window, window_days);
    let liquidation_avg = rolling_mean(&liquidation_window, window_days);
    let present_days = liquidation_window.iter().filter(|p| p.value.is_some()).count();
    missing.track(fields::LIQUIDATION_7D_AVG, liquidation_avg.value);

    missing.track(fields::STABLECOIN_7D, inputs.stablecoin_change_7d_pct);
    missing.track(fields::STABLECOIN_30D, inputs.stablecoin_change_30d_pct);

    BtcEvidence {
        as_of: inputs.as_of,
        price: PriceEvidence {
            latest: inputs.price,
            seven_days_ago: inputs.price_7d_ago,
            change_7d_pct: price_change,
        },
        open_interest: OpenInterestEvidence {
            latest: inputs.open_interest,
            seven_days_ago: inputs.open_interest_7d_ago,
            change_7d_pct: oi_change_pct,
            change_7d_abs: oi_change_abs,
        },
        funding: FundingEvidence {
            latest: inputs.funding_rate,
            avg_7d: funding_avg.value,
            avg_7d_reason: funding_avg.failure_reason,
        },
        liquidations: LiquidationEvidence {
            last_24h: inputs.liquidations_24h,
            total_7d: liquidation_total.value,
            avg_7d: liquidation_avg.value,
            missing_days: window_days.saturating_sub(present_days),
            window_reason: liquidation_avg.failure_reason,
        },
        stablecoin: StablecoinEvidence {
            supply: inputs.stablecoin_supply,
            change_7d_pct: inputs.stablecoin_change_7d_pct,
            change_30d_pct: inputs.stablecoin_change_30d_pct,
        },
        exchange_netflow: UnavailableMetric::exchange_netflow(),
        missing_fields: missing,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionStatus {
    Met,
    NotMet,
    /// An input was missing; counts as neither met nor failed
    Unavailable,
}

/// One literal condition of a rule set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionOutcome {
    pub text: String,
    /// Values the condition read, rendered literally
    pub observed: String,
    pub status: ConditionStatus,
}

impl ConditionOutcome {
    fn new(text: String, observed: String, holds: Option<bool>) -> Self {
        let status = match holds {
            Some(true) => ConditionStatus::Met,
            Some(false) => ConditionStatus::NotMet,
            None => ConditionStatus::Unavailable,
        };
        Self {
            text,
            observed,
            status,
        }
    }

    pub fn is_met(&self) -> bool {
        self.status == ConditionStatus::Met
    }
}

/// A rule set scored against this cycle's evidence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSetOutcome {
    pub state: BtcState,
    pub required: usize,
    pub conditions: Vec<ConditionOutcome>,
}

impl RuleSetOutcome {
    pub fn met_count(&self) -> usize {
        self.conditions.iter().filter(|c| c.is_met()).count()
    }

    pub fn qualifies(&self) -> bool {
        self.met_count() >= self.required
    }
}

/// Score the S1, S2 and S3 rule sets
pub fn evaluate_rule_sets(evidence: &BtcEvidence, t: &BtcThresholds) -> Vec<RuleSetOutcome> {
    let price_pct = evidence.price.change_7d_pct;
    let oi_pct = evidence.open_interest.change_7d_pct;
    let funding = evidence.funding.latest;
    let funding_avg = evidence.funding.avg_7d;
    let liq_24h = evidence.liquidations.last_24h;
    let liq_avg = evidence.liquidations.avg_7d;

    let price_obs = format!("price_7d={}", fmt_pct(price_pct));
    let oi_obs = format!("oi_7d={}", fmt_pct(oi_pct));
    let funding_obs = format!(
        "funding={} avg_7d={}",
        fmt_value(funding),
        fmt_value(funding_avg)
    );
    let liq_obs = format!(
        "liquidation_24h={} avg_7d={}",
        fmt_value(liq_24h),
        fmt_value(liq_avg)
    );

    let build_up = RuleSetOutcome {
        state: BtcState::S1,
        required: t.min_conditions,
        conditions: vec![
            ConditionOutcome::new(
                format!("OI 7d change > +{}%", t.oi_build_up_pct),
                oi_obs.clone(),
                oi_pct.map(|v| v > t.oi_build_up_pct),
            ),
            ConditionOutcome::new(
                "funding > 0 and above its 7d average (when available)".to_string(),
                funding_obs.clone(),
                // Absent 7d average does not block the condition
                funding.map(|f| f > 0.0 && funding_avg.map_or(true, |avg| f > avg)),
            ),
            ConditionOutcome::new(
                "price 7d change > 0%".to_string(),
                price_obs.clone(),
                price_pct.map(|v| v > 0.0),
            ),
        ],
    };

    let flush = RuleSetOutcome {
        state: BtcState::S2,
        required: t.min_conditions,
        conditions: vec![
            ConditionOutcome::new(
                format!("price 7d change < {}%", t.price_flush_pct),
                price_obs.clone(),
                price_pct.map(|v| v < t.price_flush_pct),
            ),
            ConditionOutcome::new(
                "OI 7d change < 0%".to_string(),
                oi_obs.clone(),
                oi_pct.map(|v| v < 0.0),
            ),
            ConditionOutcome::new(
                format!(
                    "24h liquidations > {} x 7d average",
                    t.liquidation_spike_multiple
                ),
                liq_obs.clone(),
                liq_24h
                    .zip(liq_avg)
                    .map(|(l, avg)| l > t.liquidation_spike_multiple * avg),
            ),
        ],
    };

    let repair = RuleSetOutcome {
        state: BtcState::S3,
        required: t.min_conditions,
        conditions: vec![
            ConditionOutcome::new(
                "price 7d change > 0%".to_string(),
                price_obs,
                price_pct.map(|v| v > 0.0),
            ),
            ConditionOutcome::new(
                format!("OI 7d change <= +{}%", t.oi_repair_max_pct),
                oi_obs,
                oi_pct.map(|v| v <= t.oi_repair_max_pct),
            ),
            ConditionOutcome::new(
                "24h liquidations < 7d average".to_string(),
                liq_obs,
                liq_24h.zip(liq_avg).map(|(l, avg)| l < avg),
            ),
            ConditionOutcome::new(
                format!("|funding| < {}", t.funding_neutral_band),
                funding_obs,
                funding.map(|f| f.abs() < t.funding_neutral_band),
            ),
        ],
    };

    vec![build_up, flush, repair]
}

/// First qualifying rule set in [`STATE_PRIORITY`] order
pub fn select_state(outcomes: &[RuleSetOutcome]) -> Option<BtcState> {
    STATE_PRIORITY.iter().copied().find(|state| {
        outcomes
            .iter()
            .any(|o| o.state == *state && o.qualifies())
    })
}

/// BTC leverage-state verdict for one cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BtcStateVerdict {
    pub state: BtcState,
    pub liquidity_tag: LiquidityTag,
    pub confidence: Stability,
    pub evidence: BtcEvidence,
    pub state_reasons: Vec<String>,
    /// Empty when too many fields were missing to score the rule sets
    pub rule_sets: Vec<RuleSetOutcome>,
}

impl BtcStateVerdict {
    /// Deterministic text block: verdict header, reasons, full evidence chain
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "btc_state: {} ({}) confidence={} liquidity={}",
            self.state,
            self.state.description(),
            self.confidence,
            self.liquidity_tag,
        );
        for reason in &self.state_reasons {
            let _ = writeln!(out, "- {reason}");
        }
        out.push_str(&self.evidence.render());
        out
    }
}

/// Stateless BTC leverage-state classifier
#[derive(Debug, Clone, Default)]
pub struct BtcStateClassifier {
    thresholds: BtcThresholds,
}

impl BtcStateClassifier {
    pub fn new(thresholds: BtcThresholds) -> Self {
        Self { thresholds }
    }

    /// Classify this cycle. `prior` is the previous cycle's state, if any.
    pub fn classify(&self, inputs: &BtcStateInputs, prior: Option<BtcState>) -> BtcStateVerdict {
        let t = &self.thresholds;
        let evidence = build_evidence(inputs, t.window_days);
        let liquidity_tag = liquidity_tag(
            evidence.stablecoin.change_7d_pct,
            evidence.stablecoin.change_30d_pct,
        );

        let short_circuit = evidence.missing_fields.len() >= t.missing_field_limit;
        let (state, state_reasons, rule_sets) = if short_circuit {
            debug!(
                missing = %evidence.missing_fields.joined(),
                "btc state short-circuited to S4"
            );
            (
                BtcState::S4,
                vec![format!(
                    "insufficient data: missing {}",
                    evidence.missing_fields.joined()
                )],
                Vec::new(),
            )
        } else {
            let rule_sets = evaluate_rule_sets(&evidence, t);
            for set in &rule_sets {
                debug!(
                    state = %set.state,
                    met = set.met_count(),
                    required = set.required,
                    "btc rule set scored"
                );
            }
            let (state, reasons) = match select_state(&rule_sets) {
                Some(state) => (state, qualifying_reasons(&rule_sets, state)),
                None => (BtcState::S4, partial_reasons(&rule_sets)),
            };
            (state, reasons, rule_sets)
        };

        let confidence = stability(state, prior, evidence.missing_fields.len());

        info!(
            state = %state,
            confidence = %confidence,
            liquidity = %liquidity_tag,
            missing = evidence.missing_fields.len(),
            "btc state classified"
        );

        BtcStateVerdict {
            state,
            liquidity_tag,
            confidence,
            evidence,
            state_reasons,
            rule_sets,
        }
    }
}

fn condition_line(state: BtcState, condition: &ConditionOutcome) -> String {
    format!("{}: {} ({})", state, condition.text, condition.observed)
}

fn qualifying_reasons(rule_sets: &[RuleSetOutcome], state: BtcState) -> Vec<String> {
    rule_sets
        .iter()
        .filter(|set| set.state == state)
        .flat_map(|set| {
            set.conditions
                .iter()
                .filter(|c| c.is_met())
                .map(move |c| condition_line(set.state, c))
        })
        .collect()
}

fn partial_reasons(rule_sets: &[RuleSetOutcome]) -> Vec<String> {
    let mut reasons = Vec::new();
    for state in STATE_PRIORITY {
        for set in rule_sets.iter().filter(|s| s.state == state) {
            let met = set.met_count();
            for condition in set.conditions.iter().filter(|c| c.is_met()) {
                reasons.push(format!(
                    "{} partial ({}/{}): {} ({})",
                    set.state, met, set.required, condition.text, condition.observed
                ));
            }
        }
    }

    if reasons.is_empty() {
        reasons.push("insufficient data: no rule-set condition satisfied".to_string());
    }
    reasons
}
