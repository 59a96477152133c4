//! End-to-end classification scenarios through the public API.

use chrono::{Duration, NaiveDate};
use market_state::classify::etf_flow::tag_flow;
use market_state::classify::evidence::fields;
use market_state::config::EtfThresholds;
use market_state::{
    BtcState, BtcStateClassifier, BtcStateInputs, DatedValue, FlowMomentum, IndicatorKey,
    IndicatorSnapshot, LiquidityTag, Regime, RegimeClassifier, SnapshotVector, Stability,
};

fn as_of() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 10).unwrap()
}

/// Daily readings ending at `as_of`, most recent first
fn daily(values: &[f64]) -> Vec<DatedValue> {
    values
        .iter()
        .enumerate()
        .map(|(i, v)| DatedValue::new(as_of() - Duration::days(i as i64), Some(*v)))
        .collect()
}

fn baseline_btc() -> BtcStateInputs {
    BtcStateInputs {
        price: Some(100.0),
        price_7d_ago: Some(100.0),
        funding_rate: Some(0.0001),
        funding_history: daily(&[0.0001; 7]),
        open_interest: Some(9.0e9),
        open_interest_7d_ago: Some(9.0e9),
        liquidations_24h: Some(300.0),
        liquidation_history: daily(&[300.0; 7]),
        stablecoin_supply: Some(160.0e9),
        stablecoin_change_7d_pct: Some(0.8),
        stablecoin_change_30d_pct: Some(2.1),
        ..BtcStateInputs::empty(as_of())
    }
}

#[test]
fn leverage_build_up_is_s1() {
    let inputs = BtcStateInputs {
        price: Some(108.0),
        open_interest: Some(10.0e9),
        funding_rate: Some(0.0005),
        funding_history: daily(&[0.0005, 0.0002, 0.0002, 0.0002, 0.0002, 0.0002, 0.0002]),
        ..baseline_btc()
    };

    let verdict = BtcStateClassifier::default().classify(&inputs, Some(BtcState::S1));

    assert_eq!(verdict.state, BtcState::S1);
    assert_eq!(verdict.confidence, Stability::Confirmed);
    assert_eq!(verdict.liquidity_tag, LiquidityTag::Expanding);
    let oi = verdict.evidence.open_interest.change_7d_pct.unwrap();
    assert!((oi - 11.11).abs() < 0.01, "oi 7d change was {oi}");
    assert_eq!(verdict.evidence.open_interest.change_7d_abs, Some(1.0e9));
    assert_eq!(verdict.state_reasons.len(), 3);
    assert!(verdict.state_reasons.iter().all(|r| r.starts_with("S1: ")));
}

#[test]
fn leverage_flush_is_s2() {
    let inputs = BtcStateInputs {
        price: Some(93.0),
        open_interest: Some(8.0e9),
        liquidations_24h: Some(500.0),
        liquidation_history: daily(&[500.0, 250.0, 250.0, 250.0, 250.0, 250.0, 350.0]),
        ..baseline_btc()
    };

    let verdict = BtcStateClassifier::default().classify(&inputs, Some(BtcState::S1));

    assert_eq!(verdict.state, BtcState::S2);
    // State changed since last cycle
    assert_eq!(verdict.confidence, Stability::Watch);
    let avg = verdict.evidence.liquidations.avg_7d.unwrap();
    assert!((avg - 300.0).abs() < 1e-9);
    let flush = verdict
        .rule_sets
        .iter()
        .find(|s| s.state == BtcState::S2)
        .unwrap();
    assert_eq!(flush.met_count(), 3);
}

#[test]
fn equity_selloff_into_haven_bid_is_risk_off() {
    let snapshots = SnapshotVector::new()
        .with(
            IndicatorKey::Spx,
            IndicatorSnapshot::named("S&P 500").with_change_1d(-2.5).with_above_ma20(false),
        )
        .with(
            IndicatorKey::Gold,
            IndicatorSnapshot::named("Gold").with_change_1d(1.5).with_above_ma20(true),
        )
        .with(
            IndicatorKey::Nasdaq,
            IndicatorSnapshot::named("Nasdaq 100").with_change_1d(-1.0).with_above_ma20(true),
        )
        .with(
            IndicatorKey::Vix,
            IndicatorSnapshot::named("VIX").with_change_1d(5.0).with_above_ma20(false),
        );

    let verdict = RegimeClassifier::default().classify(&snapshots, None);

    assert_eq!(verdict.regime, Regime::RiskOff);
    assert_eq!(verdict.status, Stability::Watch);
    assert_eq!(verdict.confidence_percent, 100);
    assert_eq!(verdict.triggered_rules.len(), 1);
    assert_eq!(verdict.triggered_rules[0].code, "RO1");
    assert_eq!(verdict.untriggered_rules.len(), 5);

    let again = RegimeClassifier::default().classify(&snapshots, Some(Regime::RiskOff));
    assert_eq!(again.status, Stability::Confirmed);
}

#[test]
fn large_single_day_outflow_is_drag() {
    let tag = tag_flow(Some(-300.0), Some(-10.0), Some(-5.0), &EtfThresholds::default());
    assert_eq!(tag.tag, FlowMomentum::Drag);
}

#[test]
fn missing_stablecoin_week_leaves_liquidity_unknown() {
    let inputs = BtcStateInputs {
        stablecoin_change_7d_pct: None,
        stablecoin_change_30d_pct: Some(5.0),
        ..baseline_btc()
    };

    let verdict = BtcStateClassifier::default().classify(&inputs, Some(BtcState::S3));

    assert_eq!(verdict.liquidity_tag, LiquidityTag::Unknown);
    assert!(verdict.evidence.missing_fields.contains(fields::STABLECOIN_7D));
    // One missing field: rules still scored, but confidence held at watch
    assert!(!verdict.rule_sets.is_empty());
    assert_eq!(verdict.confidence, Stability::Watch);
    assert!(verdict.render().contains("change_7d=missing change_30d=+5.00%"));
}

#[test]
fn exchange_netflow_is_reported_but_never_counted() {
    let verdict = BtcStateClassifier::default().classify(&baseline_btc(), Some(BtcState::S3));

    assert!(verdict.evidence.exchange_netflow.value.is_none());
    assert!(verdict.evidence.missing_fields.is_empty());
    assert_eq!(verdict.state, BtcState::S3);
    assert_eq!(verdict.confidence, Stability::Confirmed);
}
