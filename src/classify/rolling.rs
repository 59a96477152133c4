//! Null-safe trailing-window mean.
//!
//! The window fails closed: a single absent point in the window, or fewer
//! points than the window asks for, yields a missing result with a reason.
//! Nothing is interpolated or substituted.

use serde::{Deserialize, Serialize};

use crate::domain::DatedValue;

/// Outcome of a rolling aggregate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollingWindowResult {
    pub value: Option<f64>,
    /// Present only when `value` is missing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl RollingWindowResult {
    fn present(value: f64) -> Self {
        Self {
            value: Some(value),
            failure_reason: None,
        }
    }

    fn missing(reason: String) -> Self {
        Self {
            value: None,
            failure_reason: Some(reason),
        }
    }

    pub fn is_missing(&self) -> bool {
        self.value.is_none()
    }
}

/// Values of the `window` most recent entries, or the reason they are unusable
fn window_values(points: &[DatedValue], window: usize) -> Result<Vec<f64>, String> {
    if window == 0 {
        return Err("insufficient data: window size is zero".to_string());
    }

    if points.len() < window {
        return Err(format!(
            "insufficient data: only {} of {} available",
            points.len(),
            window
        ));
    }

    let slice = &points[..window];
    let gaps: Vec<String> = slice
        .iter()
        .filter(|p| p.value.is_none())
        .map(|p| p.date.format("%Y-%m-%d").to_string())
        .collect();

    if !gaps.is_empty() {
        return Err(format!("missing values on: {}", gaps.join(", ")));
    }

    Ok(slice.iter().filter_map(|p| p.value).collect())
}

/// Mean of the `window` most recent entries of a most-recent-first series.
pub fn rolling_mean(points: &[DatedValue], window: usize) -> RollingWindowResult {
    match window_values(points, window) {
        Ok(values) => RollingWindowResult::present(values.iter().sum::<f64>() / window as f64),
        Err(reason) => RollingWindowResult::missing(reason),
    }
}

/// Sum of the `window` most recent entries, failing closed like [`rolling_mean`].
pub fn rolling_sum(points: &[DatedValue], window: usize) -> RollingWindowResult {
    match window_values(points, window) {
        Ok(values) => RollingWindowResult::present(values.iter().sum()),
        Err(reason) => RollingWindowResult::missing(reason),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn series(values: &[Option<f64>]) -> Vec<DatedValue> {
        let start = NaiveDate::from_ymd_opt(2024, 5, 31).unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, v)| DatedValue::new(start - chrono::Duration::days(i as i64), *v))
            .collect()
    }

    #[test]
    fn mean_of_most_recent_entries_only() {
        let points = series(&[Some(1.0), Some(2.0), Some(6.0), None]);
        let result = rolling_mean(&points, 3);
        assert_relative_eq!(result.value.unwrap(), 3.0);
        assert!(result.failure_reason.is_none());
    }

    #[test]
    fn short_series_reports_available_count() {
        let points = series(&[Some(1.0), Some(2.0)]);
        let result = rolling_mean(&points, 5);
        assert!(result.is_missing());
        assert_eq!(
            result.failure_reason.as_deref(),
            Some("insufficient data: only 2 of 5 available")
        );
    }

    #[test]
    fn gap_inside_window_names_the_dates() {
        let points = series(&[Some(1.0), None, Some(3.0), None]);
        let result = rolling_mean(&points, 4);
        assert!(result.is_missing());
        assert_eq!(
            result.failure_reason.as_deref(),
            Some("missing values on: 2024-05-30, 2024-05-28")
        );
    }

    #[test]
    fn gap_outside_window_is_ignored() {
        let points = series(&[Some(4.0), Some(2.0), None]);
        assert_relative_eq!(rolling_mean(&points, 2).value.unwrap(), 3.0);
    }

    #[test]
    fn zero_window_is_missing() {
        let result = rolling_mean(&series(&[Some(1.0)]), 0);
        assert!(result.is_missing());
    }

    #[test]
    fn sum_fails_closed_too() {
        let points = series(&[Some(100.0), Some(200.0), Some(300.0)]);
        assert_relative_eq!(rolling_sum(&points, 3).value.unwrap(), 600.0);

        let gappy = series(&[Some(100.0), None, Some(300.0)]);
        assert!(rolling_sum(&gappy, 3).is_missing());
    }

    #[test]
    fn result_serializes_without_reason_when_present() {
        let json = serde_json::to_string(&rolling_mean(&series(&[Some(2.0)]), 1)).unwrap();
        assert_eq!(json, r#"{"value":2.0}"#);
    }
}
