//! Night row adapter
//!
//! Parses the rows returned by the night-fetch collaborator and maps them to
//! [`NightObservation`]s. Rows come from hand-edited logs and older app
//! versions, so the adapter accepts several key spellings and numeric strings,
//! and drops anything that is not a finite number instead of failing.

use crate::circular::{minutes_of_day, MINUTES_PER_DAY};
use crate::error::ComputeError;
use crate::types::NightObservation;
use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use tracing::debug;

/// A single night row as fetched, keyed by column name
pub type NightRow = Map<String, Value>;

/// Keys checked in order for each metric
pub const DURATION_KEYS: &[&str] = &["duration_min", "duration_minutes"];
pub const AWAKENING_KEYS: &[&str] = &["awakenings", "wakeups_count"];
pub const EFFICIENCY_KEYS: &[&str] = &["sleep_efficiency"];
pub const QUALITY_KEYS: &[&str] = &["quality_num", "quality"];
pub const START_KEYS: &[&str] = &["sleep_start", "start_time", "started_at"];
pub const START_CLOCK_KEYS: &[&str] = &["sleep_start_time_of_day"];
pub const ID_KEYS: &[&str] = &["id", "night_id"];

/// Adapter for converting fetched night rows into observations
pub struct NightAdapter;

impl NightAdapter {
    /// Parse either a JSON array of rows or NDJSON, one row per line
    pub fn parse(input: &str) -> Result<Vec<NightRow>, ComputeError> {
        if input.trim_start().starts_with('[') {
            Self::parse_array(input)
        } else {
            Self::parse_ndjson(input)
        }
    }

    /// Parse a JSON array of row objects
    pub fn parse_array(json: &str) -> Result<Vec<NightRow>, ComputeError> {
        let values: Vec<Value> = serde_json::from_str(json)?;
        values
            .into_iter()
            .enumerate()
            .map(|(idx, value)| into_row(value, idx + 1))
            .collect()
    }

    /// Parse NDJSON (newline-delimited JSON) row objects
    pub fn parse_ndjson(ndjson: &str) -> Result<Vec<NightRow>, ComputeError> {
        let mut rows = Vec::new();
        for (line_num, line) in ndjson.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let value = serde_json::from_str::<Value>(trimmed).map_err(|e| {
                ComputeError::ParseError(format!("Failed to parse line {}: {}", line_num + 1, e))
            })?;
            rows.push(into_row(value, line_num + 1)?);
        }
        Ok(rows)
    }

    /// Map one row to an observation
    ///
    /// The start clock time is taken from `sleep_start_time_of_day` when
    /// present, wrapped into `[0, 1440)`, otherwise derived from the start
    /// timestamp.
    pub fn to_observation(row: &NightRow, offset: Option<FixedOffset>) -> NightObservation {
        let sleep_start = lookup(row, START_KEYS).and_then(timestamp_value);
        let sleep_start_time_of_day = lookup(row, START_CLOCK_KEYS)
            .and_then(numeric_value)
            .map(|m| m.rem_euclid(MINUTES_PER_DAY))
            .or_else(|| sleep_start.as_ref().map(|ts| minutes_of_day(ts, offset)));

        NightObservation {
            sleep_start,
            duration_min: lookup(row, DURATION_KEYS).and_then(numeric_value),
            awakenings: lookup(row, AWAKENING_KEYS).and_then(numeric_value),
            sleep_efficiency: lookup(row, EFFICIENCY_KEYS)
                .and_then(numeric_value)
                .and_then(efficiency_fraction),
            sleep_start_time_of_day,
            quality: lookup(row, QUALITY_KEYS).and_then(numeric_value),
        }
    }

    /// Map rows to observations ordered newest-first
    ///
    /// Rows without a start timestamp follow the timestamped rows in their
    /// input order.
    pub fn to_observations(rows: &[NightRow], offset: Option<FixedOffset>) -> Vec<NightObservation> {
        let mut observations: Vec<NightObservation> = rows
            .iter()
            .map(|row| Self::to_observation(row, offset))
            .collect();
        observations.sort_by(|a, b| newest_first(a.sleep_start, b.sleep_start));
        observations
    }

    /// Report rows that contribute nothing or carry unreadable values
    pub fn validate_rows(rows: &[NightRow]) -> Vec<RowIssue> {
        rows.iter()
            .enumerate()
            .filter_map(|(idx, row)| {
                let problem = row_problem(row)?;
                Some(RowIssue {
                    index: idx,
                    row_id: lookup(row, ID_KEYS).map(|v| match v {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    }),
                    problem,
                })
            })
            .collect()
    }
}

/// A row flagged by [`NightAdapter::validate_rows`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowIssue {
    pub index: usize,
    pub row_id: Option<String>,
    pub problem: String,
}

fn into_row(value: Value, position: usize) -> Result<NightRow, ComputeError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(ComputeError::ParseError(format!(
            "Row {} is not an object: {}",
            position, other
        ))),
    }
}

/// First present, non-null value among `keys`
fn lookup<'a>(row: &'a NightRow, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| row.get(*k))
        .find(|v| !v.is_null())
}

/// Finite number from a JSON number or numeric string
fn numeric_value(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    let finite = parsed.filter(|v| v.is_finite());
    if finite.is_none() {
        debug!(%value, "dropping non-numeric metric");
    }
    finite
}

/// Efficiency as a 0-1 fraction; values in (1, 100] are read as percent
fn efficiency_fraction(value: f64) -> Option<f64> {
    if (0.0..=1.0).contains(&value) {
        Some(value)
    } else if value > 1.0 && value <= 100.0 {
        Some(value / 100.0)
    } else {
        debug!(value, "dropping out-of-range sleep efficiency");
        None
    }
}

/// RFC 3339 timestamp, or a naive `YYYY-MM-DDTHH:MM:SS` read as UTC
fn timestamp_value(value: &Value) -> Option<DateTime<FixedOffset>> {
    let raw = value.as_str()?.trim();

    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts);
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| Utc.from_utc_datetime(&naive).fixed_offset())
        .or_else(|| {
            debug!(raw, "dropping unreadable start timestamp");
            None
        })
}

fn newest_first(a: Option<DateTime<FixedOffset>>, b: Option<DateTime<FixedOffset>>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn row_problem(row: &NightRow) -> Option<String> {
    if let Some(raw) = lookup(row, START_KEYS) {
        if timestamp_value(raw).is_none() {
            return Some(format!("unreadable start timestamp: {raw}"));
        }
    }

    if let Some(raw) = lookup(row, EFFICIENCY_KEYS) {
        if numeric_value(raw).and_then(efficiency_fraction).is_none() {
            return Some(format!("sleep efficiency out of range: {raw}"));
        }
    }

    if !NightAdapter::to_observation(row, None).has_metrics() {
        return Some("no usable sleep metric".to_string());
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_rows_json() -> &'static str {
        r#"[
            {"id": "a", "sleep_start": "2024-01-14T23:10:00+01:00", "duration_min": 410, "awakenings": 2, "sleep_efficiency": 0.88, "quality_num": 4},
            {"id": "b", "sleep_start": "2024-01-16T00:20:00+01:00", "duration_min": "385", "wakeups_count": 4, "sleep_efficiency": 79, "quality_num": 3},
            {"id": "c", "start_time": "2024-01-15T22:45:00+01:00", "duration_min": null, "awakenings": "lots", "quality": 5}
        ]"#
    }

    #[test]
    fn test_parse_array_and_map_aliases() {
        let rows = NightAdapter::parse(sample_rows_json()).unwrap();
        assert_eq!(rows.len(), 3);

        let second = NightAdapter::to_observation(&rows[1], None);
        assert_eq!(second.duration_min, Some(385.0));
        assert_eq!(second.awakenings, Some(4.0));
        assert_eq!(second.sleep_efficiency, Some(0.79));
        assert_eq!(second.quality, Some(3.0));
        assert_eq!(second.sleep_start_time_of_day, Some(20.0));
    }

    #[test]
    fn test_non_numeric_values_are_missing() {
        let rows = NightAdapter::parse(sample_rows_json()).unwrap();
        let third = NightAdapter::to_observation(&rows[2], None);

        assert_eq!(third.duration_min, None);
        assert_eq!(third.awakenings, None);
        assert_eq!(third.quality, Some(5.0));
        assert_eq!(third.sleep_start_time_of_day, Some(1365.0));
    }

    #[test]
    fn test_observations_are_newest_first() {
        let rows = NightAdapter::parse(sample_rows_json()).unwrap();
        let observations = NightAdapter::to_observations(&rows, None);

        let durations: Vec<Option<f64>> = observations.iter().map(|o| o.duration_min).collect();
        assert_eq!(durations, vec![Some(385.0), None, Some(410.0)]);
    }

    #[test]
    fn test_rows_without_timestamp_go_last_in_input_order() {
        let ndjson = "{\"duration_min\": 1}\n{\"duration_min\": 2, \"sleep_start\": \"2024-01-01T23:00:00Z\"}\n\n{\"duration_min\": 3}";
        let rows = NightAdapter::parse(ndjson).unwrap();
        let observations = NightAdapter::to_observations(&rows, None);

        let durations: Vec<Option<f64>> = observations.iter().map(|o| o.duration_min).collect();
        assert_eq!(durations, vec![Some(2.0), Some(1.0), Some(3.0)]);
    }

    #[test]
    fn test_offset_override_shifts_clock_time() {
        let rows = NightAdapter::parse(r#"[{"sleep_start": "2024-01-15T22:30:00Z"}]"#).unwrap();
        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();

        let own = NightAdapter::to_observation(&rows[0], None);
        let shifted = NightAdapter::to_observation(&rows[0], Some(plus_two));
        assert_eq!(own.sleep_start_time_of_day, Some(1350.0));
        assert_eq!(shifted.sleep_start_time_of_day, Some(30.0));
    }

    #[test]
    fn test_explicit_clock_time_wins() {
        let rows = NightAdapter::parse(
            r#"[{"sleep_start": "2024-01-15T22:30:00Z", "sleep_start_time_of_day": 1400}]"#,
        )
        .unwrap();
        let observation = NightAdapter::to_observation(&rows[0], None);
        assert_eq!(observation.sleep_start_time_of_day, Some(1400.0));
    }

    #[test]
    fn test_explicit_clock_time_wraps_into_day() {
        let rows = NightAdapter::parse(
            r#"[{"sleep_start_time_of_day": -30}, {"sleep_start_time_of_day": "2000"}, {"sleep_start_time_of_day": 1440}]"#,
        )
        .unwrap();
        let clocks: Vec<Option<f64>> = rows
            .iter()
            .map(|row| NightAdapter::to_observation(row, None).sleep_start_time_of_day)
            .collect();

        assert_eq!(clocks, vec![Some(1410.0), Some(560.0), Some(0.0)]);
    }

    #[test]
    fn test_naive_timestamp_is_utc() {
        let rows = NightAdapter::parse(r#"[{"started_at": "2024-01-15 23:05:00"}]"#).unwrap();
        let observation = NightAdapter::to_observation(&rows[0], None);
        assert_eq!(observation.sleep_start_time_of_day, Some(1385.0));
    }

    #[test]
    fn test_efficiency_fraction() {
        assert_eq!(efficiency_fraction(0.9), Some(0.9));
        assert_eq!(efficiency_fraction(1.0), Some(1.0));
        assert_eq!(efficiency_fraction(85.0), Some(0.85));
        assert_eq!(efficiency_fraction(140.0), None);
        assert_eq!(efficiency_fraction(-0.2), None);
    }

    #[test]
    fn test_booleans_and_objects_are_not_numbers() {
        assert_eq!(numeric_value(&Value::Bool(true)), None);
        assert_eq!(numeric_value(&serde_json::json!({"v": 1})), None);
        assert_eq!(numeric_value(&serde_json::json!("NaN")), None);
        assert_eq!(numeric_value(&serde_json::json!(" 42.5 ")), Some(42.5));
    }

    #[test]
    fn test_non_object_row_is_parse_error() {
        assert!(matches!(
            NightAdapter::parse("[1, 2]"),
            Err(ComputeError::ParseError(_))
        ));
        assert!(matches!(
            NightAdapter::parse("{\"duration_min\": 400}\nnot json"),
            Err(ComputeError::ParseError(_))
        ));
        assert!(matches!(
            NightAdapter::parse("[not json"),
            Err(ComputeError::JsonError(_))
        ));
    }

    #[test]
    fn test_validate_rows() {
        let rows = NightAdapter::parse(
            r#"[
                {"id": 1, "duration_min": 420},
                {"id": 2, "duration_min": "n/a"},
                {"id": "x", "sleep_start": "yesterday", "duration_min": 400},
                {"sleep_efficiency": 250, "duration_min": 400}
            ]"#,
        )
        .unwrap();

        let issues = NightAdapter::validate_rows(&rows);
        assert_eq!(issues.len(), 3);
        assert_eq!(issues[0].index, 1);
        assert_eq!(issues[0].row_id.as_deref(), Some("2"));
        assert_eq!(issues[0].problem, "no usable sleep metric");
        assert_eq!(issues[1].row_id.as_deref(), Some("x"));
        assert!(issues[1].problem.contains("timestamp"));
        assert!(issues[2].problem.contains("efficiency"));
    }
}
