//! Period trends, weekly buckets and day-of-week patterns for one restaurant.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::comparative::{ComparativeReport, ComparedMetric};
use crate::error::AnalysisError;
use crate::models::{DailyMetric, WeeklyBucket};
use crate::stats::{self, round2, round_to};

const WEEK_LENGTH: usize = 7;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingTrends {
    pub total_bookings: u64,
    pub avg_daily_bookings: f64,
    pub min_daily_bookings: u32,
    pub max_daily_bookings: u32,
    pub booking_growth_rate: f64,
    pub booking_volatility: f64,
    pub weekly_breakdown: Vec<WeeklyBucket>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevenueTrends {
    pub total_revenue: f64,
    pub avg_daily_revenue: f64,
    pub min_daily_revenue: f64,
    pub max_daily_revenue: f64,
    pub revenue_growth_rate: f64,
    pub revenue_volatility: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingTrends {
    pub avg_rating: f64,
    pub min_rating: f64,
    pub max_rating: f64,
    pub rating_trend: f64,
    pub rating_stability: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationalMetrics {
    pub total_covers: u64,
    pub avg_daily_covers: f64,
    pub total_cancellations: u64,
    pub avg_cancellation_rate: f64,
    pub avg_spend_per_cover: f64,
    pub spend_per_cover_trend: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceTrends {
    pub booking_trends: BookingTrends,
    pub revenue_trends: RevenueTrends,
    pub rating_trends: RatingTrends,
    pub operational_metrics: OperationalMetrics,
}

/// Reduces a daily series into period trends.
///
/// The series is sorted by date first. Fewer than two days cannot carry a
/// growth rate or a spread, so that stage fails instead of reporting zeros.
/// Rating figures only use rated days and need at least one.
pub fn compute_trends(daily_metrics: &[DailyMetric]) -> Result<PerformanceTrends, AnalysisError> {
    if daily_metrics.is_empty() {
        return Err(AnalysisError::empty("daily_metrics"));
    }
    if daily_metrics.len() < 2 {
        return Err(AnalysisError::insufficient(
            "daily_metrics",
            daily_metrics.len(),
            2,
        ));
    }

    let sorted = sorted_by_date(daily_metrics);

    let bookings: Vec<f64> = sorted.iter().map(|m| m.bookings as f64).collect();
    let revenue: Vec<f64> = sorted.iter().map(|m| m.revenue).collect();
    let ratings = rated(&sorted);
    if ratings.is_empty() {
        return Err(AnalysisError::empty("rating"));
    }
    let covers: Vec<f64> = sorted.iter().map(|m| m.covers as f64).collect();
    let spend: Vec<f64> = sorted.iter().map(|m| m.avg_spend_per_cover).collect();

    let total_bookings: u64 = sorted.iter().map(|m| m.bookings as u64).sum();
    let total_cancellations: u64 = sorted.iter().map(|m| m.cancellations as u64).sum();
    let total_covers: u64 = sorted.iter().map(|m| m.covers as u64).sum();

    let (min_revenue, max_revenue) = stats::min_max(&revenue).unwrap_or_default();
    let (min_rating, max_rating) = stats::min_max(&ratings).unwrap_or_default();

    Ok(PerformanceTrends {
        booking_trends: BookingTrends {
            total_bookings,
            avg_daily_bookings: round2(stats::mean("bookings", &bookings)?),
            min_daily_bookings: sorted.iter().map(|m| m.bookings).min().unwrap_or(0),
            max_daily_bookings: sorted.iter().map(|m| m.bookings).max().unwrap_or(0),
            booking_growth_rate: round2(stats::growth_rate("bookings", &bookings)?),
            booking_volatility: round2(stats::population_stddev("bookings", &bookings)?),
            weekly_breakdown: weekly_buckets(&sorted),
        },
        revenue_trends: RevenueTrends {
            total_revenue: round2(revenue.iter().sum()),
            avg_daily_revenue: round2(stats::mean("revenue", &revenue)?),
            min_daily_revenue: round2(min_revenue),
            max_daily_revenue: round2(max_revenue),
            revenue_growth_rate: round2(stats::growth_rate("revenue", &revenue)?),
            revenue_volatility: round2(stats::population_stddev("revenue", &revenue)?),
        },
        rating_trends: RatingTrends {
            avg_rating: round2(stats::mean("rating", &ratings)?),
            min_rating,
            max_rating,
            rating_trend: round2(stats::growth_rate("rating", &ratings)?),
            rating_stability: round_to(stats::population_stddev("rating", &ratings)?, 3),
        },
        operational_metrics: OperationalMetrics {
            total_covers,
            avg_daily_covers: round2(stats::mean("covers", &covers)?),
            total_cancellations,
            avg_cancellation_rate: round2(
                stats::ratio(total_cancellations as f64, total_bookings as f64) * 100.0,
            ),
            avg_spend_per_cover: round2(stats::mean("avg_spend_per_cover", &spend)?),
            spend_per_cover_trend: round2(stats::growth_rate("avg_spend_per_cover", &spend)?),
        },
    })
}

/// Ratings of the days that have one, in input order.
fn rated<'a>(daily_metrics: impl IntoIterator<Item = &'a DailyMetric>) -> Vec<f64> {
    daily_metrics.into_iter().filter_map(|m| m.rating).collect()
}

fn sorted_by_date(daily_metrics: &[DailyMetric]) -> Vec<DailyMetric> {
    let mut sorted = daily_metrics.to_vec();
    sorted.sort_by_key(|m| m.date);
    sorted
}

/// Consecutive 7-day windows in input order; the last one keeps the remainder.
pub fn weekly_buckets(sorted: &[DailyMetric]) -> Vec<WeeklyBucket> {
    sorted
        .chunks(WEEK_LENGTH)
        .enumerate()
        .map(|(index, week)| {
            let ratings = rated(week);
            WeeklyBucket {
                week_number: index + 1,
                start_date: week[0].date,
                end_date: week[week.len() - 1].date,
                total_bookings: week.iter().map(|m| m.bookings as u64).sum(),
                total_revenue: round2(week.iter().map(|m| m.revenue).sum()),
                total_covers: week.iter().map(|m| m.covers as u64).sum(),
                total_cancellations: week.iter().map(|m| m.cancellations as u64).sum(),
                avg_rating: stats::mean("rating", &ratings).ok().map(round2),
                days_in_week: week.len(),
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayAverage {
    pub avg_bookings: f64,
    pub avg_revenue: f64,
    pub avg_rating: Option<f64>,
    pub sample_size: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingDayPick {
    pub day: String,
    pub avg_bookings: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevenueDayPick {
    pub day: String,
    pub avg_revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayPicks {
    pub bookings: BookingDayPick,
    pub revenue: RevenueDayPick,
}

impl DayPicks {
    fn new(
        (booking_day, avg_bookings): (String, f64),
        (revenue_day, avg_revenue): (String, f64),
    ) -> Self {
        Self {
            bookings: BookingDayPick {
                day: booking_day,
                avg_bookings,
            },
            revenue: RevenueDayPick {
                day: revenue_day,
                avg_revenue,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayOfWeekAnalysis {
    pub daily_averages: BTreeMap<String, DayAverage>,
    pub best_performing_days: DayPicks,
    pub worst_performing_days: DayPicks,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Deviation {
    High,
    Low,
}

/// A day whose bookings or revenue sit more than two deviations from the mean.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviatingDay {
    pub date: NaiveDate,
    pub bookings: u32,
    pub revenue: f64,
    pub booking_z_score: f64,
    pub revenue_z_score: f64,
    pub anomaly_type: Deviation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviatingDays {
    pub total_anomalies: usize,
    pub anomaly_details: Vec<DeviatingDay>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trajectory {
    Positive,
    Negative,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceInsights {
    pub consistent_performer: bool,
    pub growth_trajectory: Trajectory,
    pub revenue_efficiency: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternAnalysis {
    pub day_of_week_analysis: DayOfWeekAnalysis,
    pub anomalies: DeviatingDays,
    pub performance_insights: PerformanceInsights,
}

pub fn identify_patterns(
    daily_metrics: &[DailyMetric],
    trends: &PerformanceTrends,
) -> Result<PatternAnalysis, AnalysisError> {
    if daily_metrics.is_empty() {
        return Err(AnalysisError::empty("daily_metrics"));
    }
    let sorted = sorted_by_date(daily_metrics);

    let booking_trends = &trends.booking_trends;
    let revenue_trends = &trends.revenue_trends;

    Ok(PatternAnalysis {
        day_of_week_analysis: day_of_week_analysis(&sorted)?,
        anomalies: deviating_days(&sorted)?,
        performance_insights: PerformanceInsights {
            consistent_performer: trends.rating_trends.rating_stability < 0.2,
            growth_trajectory: if booking_trends.booking_growth_rate > 0.0 {
                Trajectory::Positive
            } else {
                Trajectory::Negative
            },
            revenue_efficiency: round2(stats::ratio(
                revenue_trends.avg_daily_revenue,
                booking_trends.avg_daily_bookings,
            )),
        },
    })
}

/// Groups days by weekday name. Best and worst picks scan the names in
/// alphabetical order and only replace on a strict improvement, so ties go to
/// the alphabetically first day.
pub fn day_of_week_analysis(
    daily_metrics: &[DailyMetric],
) -> Result<DayOfWeekAnalysis, AnalysisError> {
    let mut grouped: BTreeMap<String, Vec<&DailyMetric>> = BTreeMap::new();
    for metric in daily_metrics {
        grouped
            .entry(metric.date.format("%A").to_string())
            .or_default()
            .push(metric);
    }

    let mut daily_averages = BTreeMap::new();
    for (day, metrics) in grouped {
        let bookings: Vec<f64> = metrics.iter().map(|m| m.bookings as f64).collect();
        let revenue: Vec<f64> = metrics.iter().map(|m| m.revenue).collect();
        let ratings = rated(metrics.iter().copied());
        daily_averages.insert(
            day,
            DayAverage {
                avg_bookings: round2(stats::mean("bookings", &bookings)?),
                avg_revenue: round2(stats::mean("revenue", &revenue)?),
                avg_rating: stats::mean("rating", &ratings).ok().map(round2),
                sample_size: metrics.len(),
            },
        );
    }

    let pick = |value: fn(&DayAverage) -> f64, best: bool| -> Result<(String, f64), AnalysisError> {
        let mut chosen: Option<(&String, f64)> = None;
        for (day, average) in &daily_averages {
            let candidate = value(average);
            let better = match chosen {
                None => true,
                Some((_, current)) if best => candidate > current,
                Some((_, current)) => candidate < current,
            };
            if better {
                chosen = Some((day, candidate));
            }
        }
        chosen
            .map(|(day, average)| (day.clone(), average))
            .ok_or_else(|| AnalysisError::empty("daily_metrics"))
    };

    Ok(DayOfWeekAnalysis {
        best_performing_days: DayPicks::new(
            pick(|a| a.avg_bookings, true)?,
            pick(|a| a.avg_revenue, true)?,
        ),
        worst_performing_days: DayPicks::new(
            pick(|a| a.avg_bookings, false)?,
            pick(|a| a.avg_revenue, false)?,
        ),
        daily_averages,
    })
}

fn deviating_days(sorted: &[DailyMetric]) -> Result<DeviatingDays, AnalysisError> {
    let bookings: Vec<f64> = sorted.iter().map(|m| m.bookings as f64).collect();
    let revenue: Vec<f64> = sorted.iter().map(|m| m.revenue).collect();
    let booking_mean = stats::mean("bookings", &bookings)?;
    let revenue_mean = stats::mean("revenue", &revenue)?;

    // A flat series has no deviating days.
    let booking_z = stats::z_scores("bookings", &bookings).unwrap_or_else(|_| vec![0.0; sorted.len()]);
    let revenue_z = stats::z_scores("revenue", &revenue).unwrap_or_else(|_| vec![0.0; sorted.len()]);

    let anomaly_details: Vec<DeviatingDay> = sorted
        .iter()
        .zip(booking_z.iter().zip(revenue_z.iter()))
        .filter(|(_, (bz, rz))| bz.abs() > 2.0 || rz.abs() > 2.0)
        .map(|(metric, (bz, rz))| DeviatingDay {
            date: metric.date,
            bookings: metric.bookings,
            revenue: metric.revenue,
            booking_z_score: round2(bz.abs()),
            revenue_z_score: round2(rz.abs()),
            anomaly_type: if metric.bookings as f64 > booking_mean && metric.revenue > revenue_mean
            {
                Deviation::High
            } else {
                Deviation::Low
            },
        })
        .collect();

    Ok(DeviatingDays {
        total_anomalies: anomaly_details.len(),
        anomaly_details,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrowthSummary {
    pub booking_growth: String,
    pub revenue_growth: String,
    pub overall_trend: Trajectory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyInsights {
    pub top_strengths: Vec<String>,
    pub areas_for_improvement: Vec<String>,
    pub growth_trajectory: GrowthSummary,
}

/// Narrative lines for the agent. Each peer comparison lands in strengths or
/// improvements depending on its sign; a tie adds no line, and revenue is
/// skipped when the peer figure is zero.
pub fn key_insights(
    trends: &PerformanceTrends,
    patterns: &PatternAnalysis,
    comparisons: &ComparativeReport,
) -> KeyInsights {
    let mut top_strengths = Vec::new();
    let mut areas_for_improvement = Vec::new();

    if comparisons.benchmark_available {
        if let Some(roi) = comparisons.get(ComparedMetric::Roi) {
            if roi.ratio_or_delta > 0.0 {
                top_strengths.push(format!(
                    "Strong ROI performance: {:.1}x above peer average",
                    roi.ratio_or_delta
                ));
            } else if roi.ratio_or_delta < 0.0 {
                areas_for_improvement.push(format!(
                    "ROI trails peers by {:.1}x",
                    roi.ratio_or_delta.abs()
                ));
            }
        }

        if let Some(rating) = comparisons.get(ComparedMetric::Rating) {
            if rating.ratio_or_delta > 0.0 {
                top_strengths.push(format!(
                    "Superior rating: {:.1} points above peers",
                    rating.ratio_or_delta
                ));
            } else if rating.ratio_or_delta < 0.0 {
                areas_for_improvement.push(format!(
                    "Rating {:.1} points below peers",
                    rating.ratio_or_delta.abs()
                ));
            }
        }

        if let Some(revenue) = comparisons
            .get(ComparedMetric::Revenue)
            .filter(|revenue| revenue.peer_value != 0.0)
        {
            let gap = (revenue.ratio_or_delta - 1.0) * 100.0;
            if gap > 0.0 {
                top_strengths.push(format!("Revenue outperforming peers by {:.1}%", gap));
            } else if gap < 0.0 {
                areas_for_improvement.push(format!("Revenue trails peers by {:.1}%", gap.abs()));
            }
        }
    } else {
        areas_for_improvement.push("No peer benchmark available for comparison".to_string());
    }

    areas_for_improvement.push(format!(
        "Booking volatility is {:.1} bookings/day",
        trends.booking_trends.booking_volatility
    ));
    areas_for_improvement.push(format!(
        "Revenue volatility is ₹{:.0}/day",
        trends.revenue_trends.revenue_volatility
    ));
    areas_for_improvement.push(format!(
        "Cancellation rate at {:.1}%",
        trends.operational_metrics.avg_cancellation_rate
    ));

    KeyInsights {
        top_strengths,
        areas_for_improvement,
        growth_trajectory: GrowthSummary {
            booking_growth: format!("{:.1}%", trends.booking_trends.booking_growth_rate),
            revenue_growth: format!("{:.1}%", trends.revenue_trends.revenue_growth_rate),
            overall_trend: patterns.performance_insights.growth_trajectory,
        },
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisPeriod {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub total_days: usize,
}

impl AnalysisPeriod {
    pub fn of(daily_metrics: &[DailyMetric]) -> Self {
        Self {
            start_date: daily_metrics.iter().map(|m| m.date).min(),
            end_date: daily_metrics.iter().map(|m| m.date).max(),
            total_days: daily_metrics.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendsMetadata {
    pub restaurant_id: String,
    pub restaurant_name: String,
    pub analysis_period: AnalysisPeriod,
    pub generated_at: DateTime<Utc>,
    pub session_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendsReport {
    pub analysis_metadata: TrendsMetadata,
    pub performance_trends: PerformanceTrends,
    pub pattern_analysis: PatternAnalysis,
    pub competitive_analysis: ComparativeReport,
    pub key_insights: KeyInsights,
}
