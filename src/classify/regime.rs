//! Macro regime classification
//!
//! Six fixed rules read the 1-day change and 20-day moving-average position of
//! four indicators:
//! - three risk-off rules: equity sell-off into a haven bid, volatility spike,
//!   tech breakdown
//! - three risk-on rules: broad equity rally, volatility compression,
//!   haven unwind under a tech uptrend
//!
//! A rule whose inputs are absent is recorded as untriggered with the missing
//! inputs named. It is never evaluated as false.

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use tracing::{debug, info};

use crate::config::RegimeThresholds;
use crate::domain::{IndicatorKey, Regime, SnapshotVector, Stability};

use super::evidence::{fields, CryptoConfirmation, IndicatorEvidence, MissingFields, RegimeEvidence};
use super::stability::stability;

/// Indicators the rules consult, in evidence order
pub const RULE_INDICATORS: [IndicatorKey; 4] = [
    IndicatorKey::Spx,
    IndicatorKey::Nasdaq,
    IndicatorKey::Gold,
    IndicatorKey::Vix,
];

/// Side a rule votes for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleSide {
    RiskOn,
    RiskOff,
}

/// The fixed regime rule set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegimeRuleId {
    EquitySelloffHavenBid,
    VolatilitySpike,
    TechBreakdown,
    BroadEquityRally,
    VolatilityCompression,
    HavenUnwind,
}

impl RegimeRuleId {
    /// Evaluation order; risk-off rules first
    pub const ALL: [RegimeRuleId; 6] = [
        RegimeRuleId::EquitySelloffHavenBid,
        RegimeRuleId::VolatilitySpike,
        RegimeRuleId::TechBreakdown,
        RegimeRuleId::BroadEquityRally,
        RegimeRuleId::VolatilityCompression,
        RegimeRuleId::HavenUnwind,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            RegimeRuleId::EquitySelloffHavenBid => "RO1",
            RegimeRuleId::VolatilitySpike => "RO2",
            RegimeRuleId::TechBreakdown => "RO3",
            RegimeRuleId::BroadEquityRally => "RN1",
            RegimeRuleId::VolatilityCompression => "RN2",
            RegimeRuleId::HavenUnwind => "RN3",
        }
    }

    pub fn side(&self) -> RuleSide {
        match self {
            RegimeRuleId::EquitySelloffHavenBid
            | RegimeRuleId::VolatilitySpike
            | RegimeRuleId::TechBreakdown => RuleSide::RiskOff,
            RegimeRuleId::BroadEquityRally
            | RegimeRuleId::VolatilityCompression
            | RegimeRuleId::HavenUnwind => RuleSide::RiskOn,
        }
    }

    pub fn text(&self, t: &RegimeThresholds) -> String {
        match self {
            RegimeRuleId::EquitySelloffHavenBid => format!(
                "SPX 1d change < {}% and GOLD 1d change > {}%",
                t.equity_selloff_pct, t.safe_haven_bid_pct
            ),
            RegimeRuleId::VolatilitySpike => format!(
                "VIX 1d change > {}% and VIX above its 20d MA",
                t.vix_spike_pct
            ),
            RegimeRuleId::TechBreakdown => format!(
                "NDX 1d change < {}% and NDX below its 20d MA",
                t.tech_breakdown_pct
            ),
            RegimeRuleId::BroadEquityRally => format!(
                "SPX and NDX 1d change both > {}%",
                t.equity_rally_pct
            ),
            RegimeRuleId::VolatilityCompression => format!(
                "VIX 1d change < {}% and VIX below its 20d MA",
                t.vix_compression_pct
            ),
            RegimeRuleId::HavenUnwind => format!(
                "GOLD 1d change < {}% and NDX above its 20d MA",
                t.safe_haven_unwind_pct
            ),
        }
    }

    /// `Some(fired)` when every input is present, `None` otherwise.
    /// Absent inputs are appended to `missing` either way.
    fn evaluate(
        &self,
        s: &SnapshotVector,
        t: &RegimeThresholds,
        missing: &mut Vec<String>,
    ) -> Option<bool> {
        use IndicatorKey::*;

        match self {
            RegimeRuleId::EquitySelloffHavenBid => {
                let spx = change_1d(s, Spx, missing);
                let gold = change_1d(s, Gold, missing);
                spx.zip(gold)
                    .map(|(spx, gold)| spx < t.equity_selloff_pct && gold > t.safe_haven_bid_pct)
            }
            RegimeRuleId::VolatilitySpike => {
                let vix = change_1d(s, Vix, missing);
                let above = above_ma20(s, Vix, missing);
                vix.zip(above).map(|(vix, above)| vix > t.vix_spike_pct && above)
            }
            RegimeRuleId::TechBreakdown => {
                let ndx = change_1d(s, Nasdaq, missing);
                let above = above_ma20(s, Nasdaq, missing);
                ndx.zip(above)
                    .map(|(ndx, above)| ndx < t.tech_breakdown_pct && !above)
            }
            RegimeRuleId::BroadEquityRally => {
                let spx = change_1d(s, Spx, missing);
                let ndx = change_1d(s, Nasdaq, missing);
                spx.zip(ndx)
                    .map(|(spx, ndx)| spx > t.equity_rally_pct && ndx > t.equity_rally_pct)
            }
            RegimeRuleId::VolatilityCompression => {
                let vix = change_1d(s, Vix, missing);
                let above = above_ma20(s, Vix, missing);
                vix.zip(above)
                    .map(|(vix, above)| vix < t.vix_compression_pct && !above)
            }
            RegimeRuleId::HavenUnwind => {
                let gold = change_1d(s, Gold, missing);
                let above = above_ma20(s, Nasdaq, missing);
                gold.zip(above)
                    .map(|(gold, above)| gold < t.safe_haven_unwind_pct && above)
            }
        }
    }
}

fn change_1d(s: &SnapshotVector, key: IndicatorKey, missing: &mut Vec<String>) -> Option<f64> {
    let value = s.change_1d(key);
    if value.is_none() {
        missing.push(fields::change_1d(key));
    }
    value
}

fn above_ma20(s: &SnapshotVector, key: IndicatorKey, missing: &mut Vec<String>) -> Option<bool> {
    let value = s.above_ma20(key);
    if value.is_none() {
        missing.push(fields::above_ma20(key));
    }
    value
}

/// How a rule came out this cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleStatus {
    Triggered,
    NotTriggered,
    MissingData,
}

/// One rule's outcome, with its literal text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleRecord {
    pub id: RegimeRuleId,
    pub code: String,
    pub side: RuleSide,
    pub text: String,
    pub status: RuleStatus,
    /// Inputs that were absent; non-empty iff status is `missing_data`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_inputs: Vec<String>,
}

impl RuleRecord {
    pub fn has_usable_data(&self) -> bool {
        self.status != RuleStatus::MissingData
    }

    pub fn describe(&self) -> String {
        match self.status {
            RuleStatus::MissingData => format!(
                "{} {} [missing: {}]",
                self.code,
                self.text,
                self.missing_inputs.join(", ")
            ),
            _ => format!("{} {}", self.code, self.text),
        }
    }
}

/// Regime verdict for one cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeVerdict {
    pub regime: Regime,
    pub status: Stability,
    /// Data completeness, not conviction
    pub confidence_percent: u8,
    pub triggered_rules: Vec<RuleRecord>,
    pub untriggered_rules: Vec<RuleRecord>,
    pub reasons: Vec<String>,
    pub evidence: RegimeEvidence,
}

impl RegimeVerdict {
    /// Deterministic text block: verdict header, reasons, full evidence chain
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "regime: {} status={} confidence={}%",
            self.regime, self.status, self.confidence_percent
        );
        for reason in &self.reasons {
            let _ = writeln!(out, "- {reason}");
        }
        out.push_str(&self.evidence.render());
        out
    }
}

/// Stateless regime classifier
#[derive(Debug, Clone, Default)]
pub struct RegimeClassifier {
    thresholds: RegimeThresholds,
}

impl RegimeClassifier {
    pub fn new(thresholds: RegimeThresholds) -> Self {
        Self { thresholds }
    }

    /// Evaluate every rule in fixed order
    pub fn evaluate_rules(&self, snapshots: &SnapshotVector) -> Vec<RuleRecord> {
        RegimeRuleId::ALL
            .iter()
            .map(|id| {
                let mut missing_inputs = Vec::new();
                let status = match id.evaluate(snapshots, &self.thresholds, &mut missing_inputs) {
                    Some(true) => RuleStatus::Triggered,
                    Some(false) => RuleStatus::NotTriggered,
                    None => RuleStatus::MissingData,
                };
                debug!(
                    rule = id.code(),
                    ?status,
                    missing = ?missing_inputs,
                    "regime rule evaluated"
                );
                RuleRecord {
                    id: *id,
                    code: id.code().to_string(),
                    side: id.side(),
                    text: id.text(&self.thresholds),
                    status,
                    missing_inputs,
                }
            })
            .collect()
    }

    /// Classify this cycle. `prior` is the previous cycle's regime, if any.
    pub fn classify(&self, snapshots: &SnapshotVector, prior: Option<Regime>) -> RegimeVerdict {
        let rules = self.evaluate_rules(snapshots);

        let fired = |side: RuleSide| {
            rules
                .iter()
                .any(|r| r.side == side && r.status == RuleStatus::Triggered)
        };
        let risk_off = fired(RuleSide::RiskOff);
        let risk_on = fired(RuleSide::RiskOn);

        let regime = combine(risk_off, risk_on);

        let usable = rules.iter().filter(|r| r.has_usable_data()).count();
        let confidence_percent = confidence_percent(usable, rules.len());

        let mut missing_fields = MissingFields::new();
        for rule in &rules {
            for field in &rule.missing_inputs {
                missing_fields.note(field.clone());
            }
        }

        let status = stability(regime, prior, missing_fields.len());

        let (triggered_rules, untriggered_rules): (Vec<_>, Vec<_>) = rules
            .into_iter()
            .partition(|r| r.status == RuleStatus::Triggered);

        let reasons = reasons(regime, risk_off, risk_on, usable, &triggered_rules);

        let evidence = RegimeEvidence {
            indicators: RULE_INDICATORS
                .iter()
                .map(|key| IndicatorEvidence::collect(snapshots, *key))
                .collect(),
            crypto_confirmation: CryptoConfirmation::collect(snapshots),
            missing_fields,
        };

        info!(
            regime = %regime,
            status = %status,
            confidence = confidence_percent,
            triggered = triggered_rules.len(),
            missing = evidence.missing_fields.len(),
            "regime classified"
        );

        RegimeVerdict {
            regime,
            status,
            confidence_percent,
            triggered_rules,
            untriggered_rules,
            reasons,
            evidence,
        }
    }
}

/// Combine the two sides. Both firing at once holds at base.
pub fn combine(risk_off_fired: bool, risk_on_fired: bool) -> Regime {
    match (risk_off_fired, risk_on_fired) {
        (true, false) => Regime::RiskOff,
        (false, true) => Regime::RiskOn,
        _ => Regime::Base,
    }
}

/// 60 + 40 x (rules with usable data / total rules), capped at 100
pub fn confidence_percent(usable: usize, total: usize) -> u8 {
    if total == 0 {
        return 60;
    }
    let pct = 60.0 + 40.0 * usable as f64 / total as f64;
    pct.round().min(100.0) as u8
}

fn reasons(
    regime: Regime,
    risk_off: bool,
    risk_on: bool,
    usable: usize,
    triggered: &[RuleRecord],
) -> Vec<String> {
    let mut reasons: Vec<String> = triggered.iter().map(|r| r.describe()).collect();

    if usable == 0 {
        reasons.push("no rule had usable data; holding base".to_string());
    } else if risk_off && risk_on {
        reasons.push("risk-on and risk-off rules fired together; holding base".to_string());
    } else if regime == Regime::Base {
        reasons.push("no rule fired".to_string());
    }

    reasons
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::IndicatorSnapshot;

    fn snap(name: &str, change: f64, above: bool) -> IndicatorSnapshot {
        IndicatorSnapshot::named(name)
            .with_change_1d(change)
            .with_above_ma20(above)
    }

    fn full_quiet_snapshot() -> SnapshotVector {
        SnapshotVector::new()
            .with(IndicatorKey::Spx, snap("S&P 500", 0.2, true))
            .with(IndicatorKey::Nasdaq, snap("Nasdaq 100", 0.3, false))
            .with(IndicatorKey::Gold, snap("Gold", 0.1, true))
            .with(IndicatorKey::Vix, snap("VIX", -1.0, false))
    }

    #[test]
    fn combine_holds_base_on_conflict() {
        assert_eq!(combine(true, false), Regime::RiskOff);
        assert_eq!(combine(false, true), Regime::RiskOn);
        assert_eq!(combine(true, true), Regime::Base);
        assert_eq!(combine(false, false), Regime::Base);
    }

    #[test]
    fn confidence_scales_with_usable_rules() {
        assert_eq!(confidence_percent(6, 6), 100);
        assert_eq!(confidence_percent(0, 6), 60);
        assert_eq!(confidence_percent(3, 6), 80);
        assert_eq!(confidence_percent(5, 6), 93);
    }

    #[test]
    fn quiet_full_snapshot_is_base_with_full_confidence() {
        let verdict =
            RegimeClassifier::default().classify(&full_quiet_snapshot(), Some(Regime::Base));
        assert_eq!(verdict.regime, Regime::Base);
        assert_eq!(verdict.confidence_percent, 100);
        assert_eq!(verdict.status, Stability::Confirmed);
        assert!(verdict.triggered_rules.is_empty());
        assert_eq!(verdict.untriggered_rules.len(), 6);
        assert_eq!(verdict.reasons, vec!["no rule fired".to_string()]);
    }

    #[test]
    fn empty_snapshot_is_base_with_every_rule_missing() {
        let verdict =
            RegimeClassifier::default().classify(&SnapshotVector::new(), Some(Regime::Base));
        assert_eq!(verdict.regime, Regime::Base);
        assert_eq!(verdict.confidence_percent, 60);
        assert_eq!(verdict.status, Stability::Watch);
        assert!(verdict
            .untriggered_rules
            .iter()
            .all(|r| r.status == RuleStatus::MissingData && !r.missing_inputs.is_empty()));
        assert!(verdict.reasons.iter().any(|r| r.contains("no rule had usable data")));
        assert!(verdict.evidence.missing_fields.contains("SPX.change_1d"));
    }

    #[test]
    fn volatility_spike_needs_ma_position() {
        let snapshots = full_quiet_snapshot().with(
            IndicatorKey::Vix,
            IndicatorSnapshot::named("VIX").with_change_1d(25.0),
        );
        let rules = RegimeClassifier::default().evaluate_rules(&snapshots);
        let spike = rules
            .iter()
            .find(|r| r.id == RegimeRuleId::VolatilitySpike)
            .unwrap();
        assert_eq!(spike.status, RuleStatus::MissingData);
        assert_eq!(spike.missing_inputs, vec!["VIX.above_ma20".to_string()]);
        assert!(spike.describe().contains("[missing: VIX.above_ma20]"));
    }

    #[test]
    fn opposing_rules_hold_base() {
        let snapshots = full_quiet_snapshot()
            .with(IndicatorKey::Spx, snap("S&P 500", 1.5, true))
            .with(IndicatorKey::Nasdaq, snap("Nasdaq 100", 1.8, true))
            .with(IndicatorKey::Vix, snap("VIX", 20.0, true));

        let verdict = RegimeClassifier::default().classify(&snapshots, None);
        assert_eq!(verdict.regime, Regime::Base);
        assert_eq!(verdict.triggered_rules.len(), 2);
        assert!(verdict.reasons.last().unwrap().contains("fired together"));

        let text = verdict.render();
        assert!(text.starts_with("regime: base status=watch confidence=100%\n"));
        assert!(text.contains("- risk-on and risk-off rules fired together; holding base\n"));
    }

    #[test]
    fn rule_text_reflects_thresholds() {
        let text = RegimeRuleId::EquitySelloffHavenBid.text(&RegimeThresholds::default());
        assert_eq!(text, "SPX 1d change < -2% and GOLD 1d change > 1%");
    }
}
