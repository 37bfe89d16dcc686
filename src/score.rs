//! Composite RRSM score
//!
//! Collapses a rolling window of nights into one bounded score built from
//! three independently capped sub-scores:
//! - quality (0-50) from the average 1-5 rating
//! - duration (0-25) peaking at 8h and reaching zero 3h either side
//! - consistency (0-15) from the circular spread of bedtimes
//!
//! The sub-score caps add up to 90, so 90 is the highest composite a window
//! can reach even though the product labels the score 0-100.

use crate::circular::{circular_mean, circular_std_dev};
use crate::error::ComputeError;
use crate::stats::{finite_values, mean, round1};
use crate::types::{NightObservation, ScoreComponents, ScoreResult};

pub const QUALITY_MAX_POINTS: f64 = 50.0;
pub const DURATION_MAX_POINTS: f64 = 25.0;
pub const CONSISTENCY_MAX_POINTS: f64 = 15.0;

/// Duration that earns full duration points (8h)
pub const TARGET_DURATION_MINUTES: f64 = 480.0;

/// Deviation from the target at which duration points reach zero
pub const DURATION_TOLERANCE_MINUTES: f64 = 180.0;

/// Bedtime spread at which consistency points reach zero
pub const BEDTIME_STD_CAP_MINUTES: f64 = 120.0;

/// Quality points for an average rating on the 1-5 scale
pub fn quality_points(average_quality: Option<f64>) -> f64 {
    average_quality
        .map(|q| (((q - 1.0) / 4.0) * QUALITY_MAX_POINTS).clamp(0.0, QUALITY_MAX_POINTS))
        .unwrap_or(0.0)
}

/// Duration points, linear in the distance from the 8h target
pub fn duration_points(average_duration: Option<f64>) -> f64 {
    average_duration
        .map(|d| {
            let deviation = (d - TARGET_DURATION_MINUTES).abs() / DURATION_TOLERANCE_MINUTES;
            (DURATION_MAX_POINTS * (1.0 - deviation)).clamp(0.0, DURATION_MAX_POINTS)
        })
        .unwrap_or(0.0)
}

/// Consistency points from the bedtime circular standard deviation
pub fn consistency_points(bedtime_std: Option<f64>) -> f64 {
    bedtime_std
        .map(|s| {
            let spread = s.min(BEDTIME_STD_CAP_MINUTES) / BEDTIME_STD_CAP_MINUTES;
            (CONSISTENCY_MAX_POINTS * (1.0 - spread)).clamp(0.0, CONSISTENCY_MAX_POINTS)
        })
        .unwrap_or(0.0)
}

/// Compute the composite score from raw per-night series.
///
/// Non-finite values are dropped from every series, and durations must also
/// be positive. A series with no usable values leaves its averages absent and
/// contributes zero points; the composite is absent only when all three are.
pub fn compute_score(
    qualities: &[f64],
    durations_min: &[f64],
    bedtimes_of_day: &[f64],
) -> Result<ScoreResult, ComputeError> {
    let qualities = finite_values(qualities.iter().copied().map(Some));
    let durations: Vec<f64> = finite_values(durations_min.iter().copied().map(Some))
        .into_iter()
        .filter(|d| *d > 0.0)
        .collect();
    let bedtimes = finite_values(bedtimes_of_day.iter().copied().map(Some));

    let average_quality = mean(&qualities).map(round1);
    let average_duration_minutes = mean(&durations).map(round1);

    let (bedtime_mean_minutes, bedtime_std_minutes) = if bedtimes.is_empty() {
        (None, None)
    } else {
        (
            Some(circular_mean(&bedtimes)?),
            Some(circular_std_dev(&bedtimes)?),
        )
    };

    let components = ScoreComponents {
        quality: quality_points(average_quality),
        duration: duration_points(average_duration_minutes),
        consistency: consistency_points(bedtime_std_minutes),
    };

    let any_input = average_quality.is_some()
        || average_duration_minutes.is_some()
        || bedtime_std_minutes.is_some();
    let composite_score = any_input.then(|| round1(components.total()));

    Ok(ScoreResult {
        average_quality,
        average_duration_minutes,
        bedtime_mean_minutes,
        bedtime_std_minutes,
        composite_score,
        components,
    })
}

impl ScoreResult {
    /// Score a window of nights using their quality, duration and start time
    pub fn from_observations(observations: &[NightObservation]) -> Result<Self, ComputeError> {
        let qualities = finite_values(observations.iter().map(|o| o.quality));
        let durations = finite_values(observations.iter().map(|o| o.duration_min));
        let bedtimes = finite_values(observations.iter().map(|o| o.sleep_start_time_of_day));

        compute_score(&qualities, &durations, &bedtimes)
    }
}
