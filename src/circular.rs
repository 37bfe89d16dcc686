//! Circular time-of-day statistics
//!
//! Clock times wrap at midnight, so a linear mean of 23:50 and 00:10 lands on
//! noon. Each time is mapped onto the unit circle instead and the mean
//! direction and spread are read back from the mean resultant vector.

use crate::error::ComputeError;
use chrono::{DateTime, FixedOffset, Timelike};
use std::f64::consts::TAU;

/// Minutes in a day
pub const MINUTES_PER_DAY: f64 = 1440.0;

/// Lower bound on the mean resultant length before taking its logarithm
const MIN_RESULTANT_LENGTH: f64 = 1e-9;

/// Mean of `cos θ` and `sin θ` over the sample
fn mean_resultant(values: &[f64]) -> Result<(f64, f64), ComputeError> {
    if values.is_empty() {
        return Err(ComputeError::InvalidArgument(
            "circular statistics need at least one clock time".to_string(),
        ));
    }

    let n = values.len() as f64;
    let (sum_cos, sum_sin) = values.iter().fold((0.0, 0.0), |(c, s), m| {
        let theta = (m / MINUTES_PER_DAY) * TAU;
        (c + theta.cos(), s + theta.sin())
    });

    Ok((sum_cos / n, sum_sin / n))
}

/// Circular mean of clock times, in minutes since midnight within `[0, 1440)`
pub fn circular_mean(values: &[f64]) -> Result<f64, ComputeError> {
    let (x, y) = mean_resultant(values)?;

    let mut alpha = y.atan2(x);
    if alpha < 0.0 {
        alpha += TAU;
    }

    // alpha can round up to exactly TAU for angles just below zero
    Ok(((alpha / TAU) * MINUTES_PER_DAY).rem_euclid(MINUTES_PER_DAY))
}

/// Circular standard deviation of clock times, in minutes
///
/// Identical times give `0`. Times spread evenly around the clock hit the
/// resultant-length floor and give a large finite value (about 1475 minutes).
pub fn circular_std_dev(values: &[f64]) -> Result<f64, ComputeError> {
    let (x, y) = mean_resultant(values)?;

    // R can overshoot 1.0 by an ulp for identical inputs
    let r = (x * x + y * y).sqrt().clamp(MIN_RESULTANT_LENGTH, 1.0);
    let sigma_rad = (-2.0 * r.ln()).sqrt();

    Ok((sigma_rad / TAU) * MINUTES_PER_DAY)
}

/// Clock minutes since local midnight for a timestamp
///
/// Uses `offset` when given, otherwise the offset the timestamp carries.
pub fn minutes_of_day(timestamp: &DateTime<FixedOffset>, offset: Option<FixedOffset>) -> f64 {
    let local = match offset {
        Some(offset) => timestamp.with_timezone(&offset),
        None => *timestamp,
    };
    let time = local.time();
    f64::from(time.hour() * 60 + time.minute()) + f64::from(time.second()) / 60.0
}

/// Format clock minutes as `HH:MM`, rounding to the nearest minute
pub fn format_clock(minutes: f64) -> String {
    let total = (minutes.round() as i64).rem_euclid(MINUTES_PER_DAY as i64);
    format!("{:02}:{:02}", total / 60, total % 60)
}
