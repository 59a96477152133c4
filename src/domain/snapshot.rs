use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Stable identifiers of the indicators the regime rules consult
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IndicatorKey {
    /// Broad equity index (risk-asset proxy A)
    #[serde(rename = "SPX")]
    Spx,
    /// Tech-heavy equity index (risk-asset proxy B)
    #[serde(rename = "NDX")]
    Nasdaq,
    /// Safe-haven proxy
    #[serde(rename = "GOLD")]
    Gold,
    /// Equity volatility index
    #[serde(rename = "VIX")]
    Vix,
    /// High-beta crypto proxy
    #[serde(rename = "BTC")]
    Btc,
}

impl IndicatorKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndicatorKey::Spx => "SPX",
            IndicatorKey::Nasdaq => "NDX",
            IndicatorKey::Gold => "GOLD",
            IndicatorKey::Vix => "VIX",
            IndicatorKey::Btc => "BTC",
        }
    }
}

impl fmt::Display for IndicatorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One indicator's state for a cycle. Produced upstream, read-only here.
///
/// Percent changes are expressed in percent units (`-2.5` means -2.5%).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub latest_value: Option<f64>,
    #[serde(default)]
    pub change_1d: Option<f64>,
    #[serde(default)]
    pub change_7d: Option<f64>,
    #[serde(default)]
    pub change_30d: Option<f64>,
    #[serde(default)]
    pub moving_average_20: Option<f64>,
    #[serde(default)]
    pub above_moving_average_20: Option<bool>,
    #[serde(default)]
    pub recent_series: Vec<f64>,
}

impl IndicatorSnapshot {
    pub fn named(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            ..Default::default()
        }
    }

    pub fn with_change_1d(mut self, change: f64) -> Self {
        self.change_1d = Some(change);
        self
    }

    pub fn with_above_ma20(mut self, above: bool) -> Self {
        self.above_moving_average_20 = Some(above);
        self
    }
}

/// Snapshot vector keyed by stable indicator identifiers.
///
/// Keys are kept as strings so upstream may ship indicators this engine
/// does not consult; lookups go through [`IndicatorKey`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotVector(BTreeMap<String, IndicatorSnapshot>);

impl SnapshotVector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: IndicatorKey, snapshot: IndicatorSnapshot) {
        self.0.insert(key.as_str().to_string(), snapshot);
    }

    pub fn with(mut self, key: IndicatorKey, snapshot: IndicatorSnapshot) -> Self {
        self.insert(key, snapshot);
        self
    }

    pub fn get(&self, key: IndicatorKey) -> Option<&IndicatorSnapshot> {
        self.0.get(key.as_str())
    }

    /// 1-day change of an indicator, missing when the indicator is absent
    pub fn change_1d(&self, key: IndicatorKey) -> Option<f64> {
        self.get(key).and_then(|s| s.change_1d)
    }

    /// Position relative to the 20-day moving average, missing when absent
    pub fn above_ma20(&self, key: IndicatorKey) -> Option<bool> {
        self.get(key).and_then(|s| s.above_moving_average_20)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A nullable observation on a calendar date
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DatedValue {
    pub date: NaiveDate,
    #[serde(default)]
    pub value: Option<f64>,
}

impl DatedValue {
    pub fn new(date: NaiveDate, value: Option<f64>) -> Self {
        Self { date, value }
    }
}

/// Dated series normalised to most-recent-first order, one entry per date.
///
/// When the input repeats a date the later entry wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatedSeries {
    points: Vec<DatedValue>,
}

impl DatedSeries {
    pub fn new(points: impl IntoIterator<Item = DatedValue>) -> Self {
        let by_date: BTreeMap<NaiveDate, Option<f64>> =
            points.into_iter().map(|p| (p.date, p.value)).collect();
        let points = by_date
            .into_iter()
            .rev()
            .map(|(date, value)| DatedValue { date, value })
            .collect();
        Self { points }
    }

    /// Points, most recent first
    pub fn points(&self) -> &[DatedValue] {
        &self.points
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn earliest(&self) -> Option<NaiveDate> {
        self.points.last().map(|p| p.date)
    }

    /// Value recorded on `date`; missing if the date is absent or null
    pub fn value_on(&self, date: NaiveDate) -> Option<f64> {
        self.points
            .iter()
            .find(|p| p.date == date)
            .and_then(|p| p.value)
    }

    /// Trailing window of `days` consecutive calendar days ending at `as_of`,
    /// most recent first.
    ///
    /// Dates with no observation come back as missing. Dates earlier than the
    /// first observation are not part of the series and are left out, so a
    /// short history yields a short window.
    pub fn calendar_window(&self, as_of: NaiveDate, days: usize) -> Vec<DatedValue> {
        let Some(earliest) = self.earliest() else {
            return Vec::new();
        };

        (0..days)
            .map(|offset| as_of - Duration::days(offset as i64))
            .take_while(|date| *date >= earliest)
            .map(|date| DatedValue::new(date, self.value_on(date)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    #[test]
    fn series_is_sorted_most_recent_first_and_deduplicated() {
        let series = DatedSeries::new(vec![
            DatedValue::new(d(1), Some(1.0)),
            DatedValue::new(d(3), Some(3.0)),
            DatedValue::new(d(2), Some(2.0)),
            DatedValue::new(d(3), None),
        ]);

        let dates: Vec<_> = series.points().iter().map(|p| p.date).collect();
        assert_eq!(dates, vec![d(3), d(2), d(1)]);
        // Later duplicate wins, even when it is null
        assert_eq!(series.value_on(d(3)), None);
        assert_eq!(series.value_on(d(2)), Some(2.0));
    }

    #[test]
    fn calendar_window_marks_gaps_and_stops_at_history_start() {
        let series = DatedSeries::new(vec![
            DatedValue::new(d(5), Some(5.0)),
            DatedValue::new(d(3), Some(3.0)),
        ]);

        let window = series.calendar_window(d(5), 7);
        assert_eq!(window.len(), 3);
        assert_eq!(window[0], DatedValue::new(d(5), Some(5.0)));
        assert_eq!(window[1], DatedValue::new(d(4), None));
        assert_eq!(window[2], DatedValue::new(d(3), Some(3.0)));
    }

    #[test]
    fn empty_series_has_empty_window() {
        assert!(DatedSeries::default().calendar_window(d(5), 7).is_empty());
    }

    #[test]
    fn snapshot_vector_lookups_propagate_absence() {
        let snapshots = SnapshotVector::new()
            .with(IndicatorKey::Spx, IndicatorSnapshot::named("S&P 500").with_change_1d(-1.2));

        assert_eq!(snapshots.change_1d(IndicatorKey::Spx), Some(-1.2));
        assert_eq!(snapshots.above_ma20(IndicatorKey::Spx), None);
        assert_eq!(snapshots.change_1d(IndicatorKey::Gold), None);
    }

    #[test]
    fn snapshot_vector_tolerates_unknown_keys() {
        let json = r#"{
            "SPX": {"display_name": "S&P 500", "change_1d": 0.4},
            "DXY": {"display_name": "Dollar index"}
        }"#;
        let snapshots: SnapshotVector = serde_json::from_str(json).unwrap();
        assert_eq!(snapshots.len(), 2);
        assert_eq!(snapshots.change_1d(IndicatorKey::Spx), Some(0.4));
    }
}
