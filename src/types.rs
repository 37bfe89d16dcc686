//! Core types for the RRSM engine
//!
//! This module defines the value objects that flow through the engine: nightly
//! observations, context hints, and the insight, score and response payloads.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// One night's recorded metrics for one user
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NightObservation {
    /// When the sleep period started, with the offset it was recorded in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sleep_start: Option<DateTime<FixedOffset>>,
    /// Total sleep duration (minutes)
    #[serde(default)]
    pub duration_min: Option<f64>,
    /// Number of nighttime awakenings
    #[serde(default)]
    pub awakenings: Option<f64>,
    /// Fraction of time in bed spent asleep (0-1)
    #[serde(default)]
    pub sleep_efficiency: Option<f64>,
    /// Sleep start as clock minutes since local midnight (0-1440)
    #[serde(default)]
    pub sleep_start_time_of_day: Option<f64>,
    /// Subjective quality rating (1-5)
    #[serde(default)]
    pub quality: Option<f64>,
}

impl NightObservation {
    /// Check if this night carries at least one usable metric
    pub fn has_metrics(&self) -> bool {
        [
            self.duration_min,
            self.awakenings,
            self.sleep_efficiency,
            self.sleep_start_time_of_day,
            self.quality,
        ]
        .iter()
        .any(|v| v.is_some_and(f64::is_finite))
    }
}

/// Free-text hints attached to an insight request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ContextHints {
    #[serde(deserialize_with = "null_as_empty")]
    pub primary_driver: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub secondary_driver: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub notes: String,
}

impl ContextHints {
    pub fn fields(&self) -> [&str; 3] {
        [
            self.primary_driver.as_str(),
            self.secondary_driver.as_str(),
            self.notes.as_str(),
        ]
    }
}

/// Confidence attached to an insight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

/// Sleep pattern category selected by the classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pattern {
    InsufficientData,
    RhythmOverload,
    SleepDebt,
    Fragmentation,
    StableBaseline,
}

impl Pattern {
    /// Short code shown ahead of the label
    pub fn code(&self) -> &'static str {
        match self {
            Pattern::InsufficientData => "R0",
            Pattern::RhythmOverload => "R1",
            Pattern::SleepDebt => "R2",
            Pattern::Fragmentation => "R3",
            Pattern::StableBaseline => "R4",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Pattern::InsufficientData => "Not enough data",
            Pattern::RhythmOverload => "Rhythm overload / compressed pause",
            Pattern::SleepDebt => "Sleep debt / insufficient opportunity",
            Pattern::Fragmentation => "Sleep maintenance / fragmentation",
            Pattern::StableBaseline => "Stable baseline",
        }
    }

    /// Code and label, e.g. `R2 Sleep debt / insufficient opportunity`
    pub fn domain(&self) -> String {
        format!("{} {}", self.code(), self.label())
    }
}

/// Result of classifying a window of nights
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub pattern: Pattern,
    pub domain: String,
    pub title: String,
    /// Justifications, 1 to 3 entries
    pub why: Vec<String>,
    /// Recommended next steps, fixed per pattern
    pub actions: Vec<String>,
    pub confidence: Confidence,
}

/// Sub-scores that make up the composite score
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreComponents {
    /// Quality contribution (0-50)
    pub quality: f64,
    /// Duration contribution (0-25)
    pub duration: f64,
    /// Bedtime consistency contribution (0-15)
    pub consistency: f64,
}

impl ScoreComponents {
    pub fn total(&self) -> f64 {
        self.quality + self.duration + self.consistency
    }
}

/// Composite RRSM score and the averages it was built from
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreResult {
    pub average_quality: Option<f64>,
    pub average_duration_minutes: Option<f64>,
    pub bedtime_mean_minutes: Option<f64>,
    pub bedtime_std_minutes: Option<f64>,
    /// Composite score; 90 is the highest reachable value
    pub composite_score: Option<f64>,
    pub components: ScoreComponents,
}

/// Insight request accepted at the request boundary
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightRequest {
    /// Requested window in nights, clamped by the engine config
    #[serde(default, deserialize_with = "lenient_days")]
    pub days: Option<i64>,
    #[serde(flatten)]
    pub context: ContextHints,
}

/// Window actually used for a response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsightWindow {
    pub days: u32,
    pub count: usize,
}

/// Response returned for an insight request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightResponse {
    pub window: InsightWindow,
    /// Empty only when no nights fell in the window
    pub insights: Vec<Insight>,
}

/// Dashboard payload: rolling score over the most recent nights
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardResponse {
    pub window: InsightWindow,
    pub score: ScoreResult,
    /// Mean bedtime formatted as `HH:MM`
    pub bedtime_mean_clock: Option<String>,
}

/// Read an explicit `null` hint as an empty string
fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Accept `7`, `7.0` or `"7"` as a window; anything else falls back to the default
fn lenient_days<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let days = match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|v| v.is_finite()).map(|v| v.trunc() as i64)),
        Value::String(s) => {
            let trimmed = s.trim();
            trimmed.parse::<i64>().ok().or_else(|| {
                trimmed
                    .parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .map(|v| v.trunc() as i64)
            })
        }
        _ => None,
    };
    Ok(days)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn days_of(json: &str) -> Option<i64> {
        serde_json::from_str::<InsightRequest>(json).unwrap().days
    }

    #[test]
    fn test_null_hints_read_as_empty() {
        let request: InsightRequest = serde_json::from_str(
            r#"{"days": 7, "primaryDriver": "stress", "secondaryDriver": null, "notes": null}"#,
        )
        .unwrap();

        assert_eq!(
            request.context,
            ContextHints {
                primary_driver: "stress".to_string(),
                ..Default::default()
            }
        );
        assert_eq!(request.context.fields(), ["stress", "", ""]);
    }

    #[test]
    fn test_days_accepts_numbers_and_numeric_strings() {
        assert_eq!(days_of(r#"{"days": 7}"#), Some(7));
        assert_eq!(days_of(r#"{"days": 7.0}"#), Some(7));
        assert_eq!(days_of(r#"{"days": 9.8}"#), Some(9));
        assert_eq!(days_of(r#"{"days": "14"}"#), Some(14));
        assert_eq!(days_of(r#"{"days": " 10.5 "}"#), Some(10));
        assert_eq!(days_of(r#"{"days": -2}"#), Some(-2));
    }

    #[test]
    fn test_days_falls_back_when_unreadable() {
        assert_eq!(days_of(r#"{}"#), None);
        assert_eq!(days_of(r#"{"days": null}"#), None);
        assert_eq!(days_of(r#"{"days": "a week"}"#), None);
        assert_eq!(days_of(r#"{"days": true}"#), None);
        assert_eq!(days_of(r#"{"days": [7]}"#), None);
    }
}
