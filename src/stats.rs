//! Numeric helpers shared by the analysis stages.
//!
//! Zero denominators resolve to 0.0. Empty series are errors, single-point
//! series are degenerate and yield 0.0 for spread and growth.

use crate::error::AnalysisError;

pub fn mean(series: &str, values: &[f64]) -> Result<f64, AnalysisError> {
    if values.is_empty() {
        return Err(AnalysisError::empty(series));
    }
    Ok(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation (divides by n).
pub fn population_stddev(series: &str, values: &[f64]) -> Result<f64, AnalysisError> {
    let avg = mean(series, values)?;
    if values.len() < 2 {
        return Ok(0.0);
    }
    let variance = values.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / values.len() as f64;
    Ok(variance.sqrt())
}

/// Percent change between the mean of the first half and the mean of the
/// second half. The split point is `len / 2`, so an odd middle element lands
/// in the second half.
pub fn growth_rate(series: &str, values: &[f64]) -> Result<f64, AnalysisError> {
    if values.is_empty() {
        return Err(AnalysisError::empty(series));
    }
    if values.len() < 2 {
        return Ok(0.0);
    }
    let (first, second) = values.split_at(values.len() / 2);
    let first_mean = mean(series, first)?;
    let second_mean = mean(series, second)?;
    if first_mean == 0.0 {
        return Ok(0.0);
    }
    Ok((second_mean - first_mean) / first_mean * 100.0)
}

/// Day-over-day percent change, 0.0 when the previous value is zero.
pub fn percent_change(previous: f64, current: f64) -> f64 {
    if previous == 0.0 {
        0.0
    } else {
        (current - previous) / previous * 100.0
    }
}

/// Population z-score of every value.
///
/// Needs at least two points and a non-zero spread.
pub fn z_scores(series: &str, values: &[f64]) -> Result<Vec<f64>, AnalysisError> {
    if values.len() < 2 {
        return Err(AnalysisError::insufficient(series, values.len(), 2));
    }
    let avg = mean(series, values)?;
    let stddev = population_stddev(series, values)?;
    if stddev <= f64::EPSILON {
        return Err(AnalysisError::insufficient(series, values.len(), 2));
    }
    Ok(values.iter().map(|v| (v - avg) / stddev).collect())
}

pub fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

pub fn round2(value: f64) -> f64 {
    round_to(value, 2)
}

pub fn min_max(values: &[f64]) -> Option<(f64, f64)> {
    let first = *values.first()?;
    Some(
        values
            .iter()
            .fold((first, first), |(lo, hi), v| (lo.min(*v), hi.max(*v))),
    )
}
