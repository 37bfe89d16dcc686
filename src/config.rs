//! Engine configuration
//!
//! Window bounds and display settings for the request boundary. Classifier
//! thresholds are fixed constants in [`crate::classifier`] and are not
//! configurable.

use crate::error::ComputeError;
use chrono::FixedOffset;
use std::env;
use tracing::warn;

/// Smallest window an insight request may ask for
pub const MIN_WINDOW_DAYS: u32 = 3;

/// Largest window an insight request may ask for
pub const MAX_WINDOW_DAYS: u32 = 30;

/// Window used when a request does not specify one
pub const DEFAULT_WINDOW_DAYS: u32 = 7;

/// Nights scored on the dashboard
pub const DEFAULT_DASHBOARD_NIGHTS: usize = 7;

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub min_window_days: u32,
    pub max_window_days: u32,
    pub default_window_days: u32,
    pub dashboard_nights: usize,
    /// Offset used to read clock times from start timestamps; when unset the
    /// offset recorded on each timestamp is used
    pub utc_offset: Option<FixedOffset>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_window_days: MIN_WINDOW_DAYS,
            max_window_days: MAX_WINDOW_DAYS,
            default_window_days: DEFAULT_WINDOW_DAYS,
            dashboard_nights: DEFAULT_DASHBOARD_NIGHTS,
            utc_offset: None,
        }
    }
}

impl EngineConfig {
    /// Load configuration from `RRSM_*` environment variables, falling back
    /// to defaults for anything missing or unparseable
    #[must_use]
    pub fn from_env() -> Self {
        let utc_offset = env::var("RRSM_UTC_OFFSET")
            .ok()
            .and_then(|raw| match parse_utc_offset(&raw) {
                Ok(offset) => Some(offset),
                Err(e) => {
                    warn!(error = %e, "ignoring RRSM_UTC_OFFSET");
                    None
                }
            });

        let config = Self {
            default_window_days: env::var("RRSM_DEFAULT_WINDOW_DAYS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_WINDOW_DAYS),
            dashboard_nights: env::var("RRSM_DASHBOARD_NIGHTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(DEFAULT_DASHBOARD_NIGHTS),
            utc_offset,
            ..Self::default()
        };

        config.normalized()
    }

    /// Use a fixed offset for clock times
    pub fn with_utc_offset(mut self, offset: FixedOffset) -> Self {
        self.utc_offset = Some(offset);
        self
    }

    /// Pull the default window back inside the allowed bounds
    pub fn normalized(mut self) -> Self {
        if self.min_window_days > self.max_window_days {
            std::mem::swap(&mut self.min_window_days, &mut self.max_window_days);
        }
        self.default_window_days = self
            .default_window_days
            .clamp(self.min_window_days, self.max_window_days);
        self
    }

    /// Window in nights for a requested day count
    pub fn window_days(&self, requested: Option<i64>) -> u32 {
        match requested {
            Some(days) => days.clamp(
                i64::from(self.min_window_days),
                i64::from(self.max_window_days),
            ) as u32,
            None => self.default_window_days,
        }
    }
}

/// Parse a UTC offset such as `+02:00`, `-0530`, `+9` or `Z`
pub fn parse_utc_offset(value: &str) -> Result<FixedOffset, ComputeError> {
    let invalid = || ComputeError::InvalidOffset(value.to_string());
    let trimmed = value.trim();

    if trimmed.eq_ignore_ascii_case("z") || trimmed.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0).ok_or_else(invalid);
    }

    let sign = match trimmed.chars().next() {
        Some('+') => 1,
        Some('-') => -1,
        _ => return Err(invalid()),
    };

    let digits: String = trimmed[1..].chars().filter(|c| *c != ':').collect();
    if digits.is_empty() || digits.len() > 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }

    let (hours, minutes) = if digits.len() <= 2 {
        (digits.parse::<i32>().map_err(|_| invalid())?, 0)
    } else {
        let (h, m) = digits.split_at(digits.len() - 2);
        (
            h.parse::<i32>().map_err(|_| invalid())?,
            m.parse::<i32>().map_err(|_| invalid())?,
        )
    };

    if minutes >= 60 {
        return Err(invalid());
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_days_clamps() {
        let config = EngineConfig::default();
        assert_eq!(config.window_days(None), 7);
        assert_eq!(config.window_days(Some(1)), 3);
        assert_eq!(config.window_days(Some(-4)), 3);
        assert_eq!(config.window_days(Some(14)), 14);
        assert_eq!(config.window_days(Some(365)), 30);
    }

    #[test]
    fn test_normalized_keeps_default_in_bounds() {
        let config = EngineConfig {
            default_window_days: 90,
            ..EngineConfig::default()
        }
        .normalized();
        assert_eq!(config.default_window_days, 30);

        let swapped = EngineConfig {
            min_window_days: 30,
            max_window_days: 3,
            ..EngineConfig::default()
        }
        .normalized();
        assert_eq!(swapped.min_window_days, 3);
        assert_eq!(swapped.max_window_days, 30);
    }

    #[test]
    fn test_parse_utc_offset() {
        assert_eq!(parse_utc_offset("+02:00").unwrap().local_minus_utc(), 7200);
        assert_eq!(parse_utc_offset("-0530").unwrap().local_minus_utc(), -19800);
        assert_eq!(parse_utc_offset("+9").unwrap().local_minus_utc(), 32400);
        assert_eq!(parse_utc_offset("Z").unwrap().local_minus_utc(), 0);
        assert_eq!(parse_utc_offset(" utc ").unwrap().local_minus_utc(), 0);
    }

    #[test]
    fn test_parse_utc_offset_rejects_garbage() {
        for raw in ["", "02:00", "+", "+2:75", "+12345", "+ab", "Europe/Paris", "+30"] {
            assert!(
                matches!(parse_utc_offset(raw), Err(ComputeError::InvalidOffset(_))),
                "expected {raw:?} to be rejected"
            );
        }
    }
}
