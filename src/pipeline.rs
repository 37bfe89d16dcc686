//! Pipeline orchestration
//!
//! This module provides the public API for the RRSM engine.
//! It takes fetched night rows through to insight and dashboard JSON.

use crate::adapter::NightAdapter;
use crate::circular::format_clock;
use crate::classifier::InsightClassifier;
use crate::config::EngineConfig;
use crate::error::ComputeError;
use crate::types::{
    DashboardResponse, InsightRequest, InsightResponse, InsightWindow, NightObservation,
    ScoreResult,
};
use serde::Serialize;
use tracing::debug;

/// Turn fetched night rows and an insight request into response JSON.
///
/// # Arguments
/// * `raw_json` - Night rows as a JSON array or NDJSON
/// * `request_json` - `InsightRequest` JSON; an empty string uses the defaults
///
/// # Returns
/// `InsightResponse` JSON with the window used and zero or one insight
///
/// # Example
/// ```ignore
/// let response = nights_to_insights(
///     nights_json,
///     r#"{"days": 7, "notes": "late coffee"}"#.to_string(),
/// )?;
/// ```
pub fn nights_to_insights(raw_json: String, request_json: String) -> Result<String, ComputeError> {
    InsightEngine::with_config(EngineConfig::from_env()).insights_json(&raw_json, &request_json)
}

/// Turn fetched night rows into dashboard score JSON.
///
/// # Arguments
/// * `raw_json` - Night rows as a JSON array or NDJSON
/// * `nights` - Number of most recent nights to score; `None` uses the
///   configured dashboard window
pub fn nights_to_dashboard(raw_json: String, nights: Option<usize>) -> Result<String, ComputeError> {
    InsightEngine::with_config(EngineConfig::from_env()).dashboard_json(&raw_json, nights)
}

/// Insight and score engine bound to one configuration
///
/// Stateless apart from its config; every call sees only the nights it is
/// given.
#[derive(Debug, Clone, Default)]
pub struct InsightEngine {
    config: EngineConfig,
}

impl InsightEngine {
    /// Create an engine with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an engine with a specific configuration
    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            config: config.normalized(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Parse night rows and order them newest-first
    pub fn load_nights(&self, raw: &str) -> Result<Vec<NightObservation>, ComputeError> {
        let rows = NightAdapter::parse(raw)?;
        Ok(NightAdapter::to_observations(&rows, self.config.utc_offset))
    }

    /// Classify the most recent nights of a newest-first series
    pub fn insights(
        &self,
        observations: &[NightObservation],
        request: &InsightRequest,
    ) -> InsightResponse {
        let days = self.config.window_days(request.days);
        let window = most_recent(observations, days as usize);

        debug!(requested = ?request.days, days, nights = window.len(), "classifying window");

        let insights = if window.is_empty() {
            Vec::new()
        } else {
            vec![InsightClassifier::classify(window, &request.context)]
        };

        InsightResponse {
            window: InsightWindow {
                days,
                count: window.len(),
            },
            insights,
        }
    }

    /// Score the most recent nights of a newest-first series
    pub fn dashboard(
        &self,
        observations: &[NightObservation],
        nights: Option<usize>,
    ) -> Result<DashboardResponse, ComputeError> {
        let nights = nights
            .filter(|n| *n > 0)
            .unwrap_or(self.config.dashboard_nights);
        let window = most_recent(observations, nights);

        let score = ScoreResult::from_observations(window)?;
        debug!(nights = window.len(), composite = ?score.composite_score, "scored window");

        Ok(DashboardResponse {
            window: InsightWindow {
                days: u32::try_from(nights).unwrap_or(u32::MAX),
                count: window.len(),
            },
            bedtime_mean_clock: score.bedtime_mean_minutes.map(format_clock),
            score,
        })
    }

    /// JSON in, JSON out version of [`InsightEngine::insights`]
    pub fn insights_json(&self, raw_json: &str, request_json: &str) -> Result<String, ComputeError> {
        let request = parse_request(request_json)?;
        let observations = self.load_nights(raw_json)?;
        encode(&self.insights(&observations, &request))
    }

    /// JSON in, JSON out version of [`InsightEngine::dashboard`]
    pub fn dashboard_json(&self, raw_json: &str, nights: Option<usize>) -> Result<String, ComputeError> {
        let observations = self.load_nights(raw_json)?;
        encode(&self.dashboard(&observations, nights)?)
    }
}

/// Parse an insight request; blank input means all defaults
pub fn parse_request(request_json: &str) -> Result<InsightRequest, ComputeError> {
    if request_json.trim().is_empty() {
        return Ok(InsightRequest::default());
    }
    Ok(serde_json::from_str(request_json)?)
}

fn most_recent(observations: &[NightObservation], n: usize) -> &[NightObservation] {
    &observations[..observations.len().min(n)]
}

fn encode<T: Serialize>(value: &T) -> Result<String, ComputeError> {
    serde_json::to_string(value).map_err(|e| ComputeError::EncodingError(e.to_string()))
}
