//! Detection passes over one restaurant's daily series, trends, peer
//! benchmark and ad campaigns. Every pass runs on its own and the results are
//! concatenated; no pass filters another.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::{AdEvaluation, DailyMetric, MetricsSummary, PeerBenchmark};
use crate::stats::{self, percent_change};
use crate::trends::{AnalysisPeriod, PerformanceTrends};

const Z_SCORE_THRESHOLD: f64 = 2.5;
const Z_SCORE_HIGH: f64 = 3.0;

const REVENUE_CHANGE_THRESHOLD: f64 = 50.0;
const REVENUE_CHANGE_HIGH: f64 = 75.0;
const BOOKING_CHANGE_THRESHOLD: f64 = 60.0;
const BOOKING_CHANGE_HIGH: f64 = 80.0;

const SPEND_RANGE: (f64, f64) = (300.0, 800.0);
const SPEND_RANGE_HIGH: (f64, f64) = (250.0, 900.0);
const CANCELLATION_THRESHOLD: f64 = 15.0;
const CANCELLATION_HIGH: f64 = 25.0;
const RATING_THRESHOLD: f64 = 4.0;
const RATING_HIGH: f64 = 3.5;

const BOOKING_DECLINE: f64 = -10.0;
const BOOKING_DECLINE_HIGH: f64 = -20.0;
const REVENUE_DECLINE: f64 = -15.0;
const REVENUE_DECLINE_HIGH: f64 = -25.0;
const BOOKING_VOLATILITY_LIMIT: f64 = 5.0;
const REVENUE_VOLATILITY_LIMIT: f64 = 15000.0;

const PERIOD_DAYS: f64 = 30.0;
// Peer revenue above this is taken to be a monthly figure.
const MONTHLY_REVENUE_CUTOFF: f64 = 1000.0;
const PEER_REVENUE_RATIO: f64 = 3.0;
const PEER_RATING_GAP: f64 = 0.2;

const COST_PER_CONVERSION_LIMIT: f64 = 25.0;
const COST_PER_CONVERSION_HIGH: f64 = 30.0;
const ROI_FLOOR: f64 = 3.0;
const ROI_FLOOR_HIGH: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    StatisticalOutlier,
    SuddenChange,
    OperationalAnomaly,
    QualityAnomaly,
    NegativeTrend,
    HighVolatility,
    CompetitiveOutlier,
    CompetitiveUnderperformance,
    AdInefficiency,
    AdUnderperformance,
}

impl AnomalyKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AnomalyKind::StatisticalOutlier => "statistical_outlier",
            AnomalyKind::SuddenChange => "sudden_change",
            AnomalyKind::OperationalAnomaly => "operational_anomaly",
            AnomalyKind::QualityAnomaly => "quality_anomaly",
            AnomalyKind::NegativeTrend => "negative_trend",
            AnomalyKind::HighVolatility => "high_volatility",
            AnomalyKind::CompetitiveOutlier => "competitive_outlier",
            AnomalyKind::CompetitiveUnderperformance => "competitive_underperformance",
            AnomalyKind::AdInefficiency => "ad_inefficiency",
            AnomalyKind::AdUnderperformance => "ad_underperformance",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    fn pick(high: bool) -> Self {
        if high {
            Severity::High
        } else {
            Severity::Medium
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub campaign_id: Option<String>,
    pub metric: String,
    pub value: f64,
    #[serde(rename = "type")]
    pub kind: AnomalyKind,
    pub severity: Severity,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_percent: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peer_value: Option<f64>,
}

impl Anomaly {
    fn new(
        metric: &str,
        value: f64,
        kind: AnomalyKind,
        severity: Severity,
        description: String,
    ) -> Self {
        Self {
            date: None,
            campaign_id: None,
            metric: metric.to_string(),
            value,
            kind,
            severity,
            description,
            z_score: None,
            previous_value: None,
            change_percent: None,
            peer_value: None,
        }
    }

    fn on(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    fn for_campaign(mut self, campaign_id: &str) -> Self {
        self.campaign_id = Some(campaign_id.to_string());
        self
    }
}

/// Everything the passes read.
#[derive(Debug, Clone, Copy)]
pub struct DetectionInput<'a> {
    pub daily_metrics: &'a [DailyMetric],
    pub trends: &'a PerformanceTrends,
    pub metrics_summary: &'a MetricsSummary,
    pub peer: Option<&'a PeerBenchmark>,
    pub ad_evaluation: &'a AdEvaluation,
}

/// Runs every pass over a date-sorted copy of the daily series.
pub fn detect_all(input: &DetectionInput<'_>) -> Vec<Anomaly> {
    let mut daily = input.daily_metrics.to_vec();
    daily.sort_by_key(|m| m.date);
    let mut anomalies = Vec::new();

    anomalies.extend(statistical_outliers(&daily, "bookings", |m| m.bookings as f64));
    anomalies.extend(statistical_outliers(&daily, "revenue", |m| m.revenue));
    anomalies.extend(sudden_changes(&daily));
    anomalies.extend(operational_anomalies(&daily));
    anomalies.extend(trend_anomalies(input.trends));
    anomalies.extend(competitive_anomalies(input.metrics_summary, input.peer));
    anomalies.extend(ad_campaign_anomalies(input.ad_evaluation));

    debug!(count = anomalies.len(), "anomaly passes finished");
    anomalies
}

/// Days whose population z-score exceeds 2.5. A series that is too short or
/// flat is skipped without error.
pub fn statistical_outliers(
    daily_metrics: &[DailyMetric],
    metric: &str,
    value: impl Fn(&DailyMetric) -> f64,
) -> Vec<Anomaly> {
    let values: Vec<f64> = daily_metrics.iter().map(&value).collect();
    let scores = match stats::z_scores(metric, &values) {
        Ok(scores) => scores,
        Err(err) => {
            debug!(metric, error = %err, "skipping statistical outlier pass");
            return Vec::new();
        }
    };

    daily_metrics
        .iter()
        .zip(values.iter().zip(scores))
        .filter(|(_, (_, z))| z.abs() > Z_SCORE_THRESHOLD)
        .map(|(day, (value, z))| {
            let mut anomaly = Anomaly::new(
                metric,
                *value,
                AnomalyKind::StatisticalOutlier,
                Severity::pick(z.abs() > Z_SCORE_HIGH),
                format!("{metric} of {value:.2} is {:.1} standard deviations from the mean", z.abs()),
            )
            .on(day.date);
            anomaly.z_score = Some(z.abs());
            anomaly
        })
        .collect()
}

pub fn sudden_changes(daily_metrics: &[DailyMetric]) -> Vec<Anomaly> {
    let mut anomalies = Vec::new();

    for pair in daily_metrics.windows(2) {
        let (previous, current) = (&pair[0], &pair[1]);

        let revenue_change = percent_change(previous.revenue, current.revenue);
        if revenue_change.abs() > REVENUE_CHANGE_THRESHOLD {
            let mut anomaly = Anomaly::new(
                "revenue",
                current.revenue,
                AnomalyKind::SuddenChange,
                Severity::pick(revenue_change.abs() > REVENUE_CHANGE_HIGH),
                format!("Revenue changed {revenue_change:+.1}% from the previous day"),
            )
            .on(current.date);
            anomaly.previous_value = Some(previous.revenue);
            anomaly.change_percent = Some(revenue_change);
            anomalies.push(anomaly);
        }

        let booking_change = percent_change(previous.bookings as f64, current.bookings as f64);
        if booking_change.abs() > BOOKING_CHANGE_THRESHOLD {
            let mut anomaly = Anomaly::new(
                "bookings",
                current.bookings as f64,
                AnomalyKind::SuddenChange,
                Severity::pick(booking_change.abs() > BOOKING_CHANGE_HIGH),
                format!("Bookings changed {booking_change:+.1}% from the previous day"),
            )
            .on(current.date);
            anomaly.previous_value = Some(previous.bookings as f64);
            anomaly.change_percent = Some(booking_change);
            anomalies.push(anomaly);
        }
    }

    anomalies
}

pub fn operational_anomalies(daily_metrics: &[DailyMetric]) -> Vec<Anomaly> {
    let mut anomalies = Vec::new();

    for day in daily_metrics {
        let spend = day.avg_spend_per_cover;
        if spend < SPEND_RANGE.0 || spend > SPEND_RANGE.1 {
            anomalies.push(
                Anomaly::new(
                    "avg_spend_per_cover",
                    spend,
                    AnomalyKind::OperationalAnomaly,
                    Severity::pick(spend < SPEND_RANGE_HIGH.0 || spend > SPEND_RANGE_HIGH.1),
                    format!("Unusual spend per cover: ₹{spend:.2}"),
                )
                .on(day.date),
            );
        }

        if let Some(rate) = day.cancellation_rate() {
            if rate > CANCELLATION_THRESHOLD {
                anomalies.push(
                    Anomaly::new(
                        "cancellation_rate",
                        rate,
                        AnomalyKind::OperationalAnomaly,
                        Severity::pick(rate > CANCELLATION_HIGH),
                        format!("High cancellation rate: {rate:.1}%"),
                    )
                    .on(day.date),
                );
            }
        }

        if let Some(rating) = day.rating.filter(|r| *r < RATING_THRESHOLD) {
            anomalies.push(
                Anomaly::new(
                    "avg_rating",
                    rating,
                    AnomalyKind::QualityAnomaly,
                    Severity::pick(rating < RATING_HIGH),
                    format!("Low rating: {rating:.1}"),
                )
                .on(day.date),
            );
        }
    }

    anomalies
}

pub fn trend_anomalies(trends: &PerformanceTrends) -> Vec<Anomaly> {
    let mut anomalies = Vec::new();
    let booking_growth = trends.booking_trends.booking_growth_rate;
    let revenue_growth = trends.revenue_trends.revenue_growth_rate;
    let booking_volatility = trends.booking_trends.booking_volatility;
    let revenue_volatility = trends.revenue_trends.revenue_volatility;

    if booking_growth < BOOKING_DECLINE {
        anomalies.push(Anomaly::new(
            "booking_growth_rate",
            booking_growth,
            AnomalyKind::NegativeTrend,
            Severity::pick(booking_growth < BOOKING_DECLINE_HIGH),
            format!("Significant booking decline: {booking_growth:.1}%"),
        ));
    }

    if revenue_growth < REVENUE_DECLINE {
        anomalies.push(Anomaly::new(
            "revenue_growth_rate",
            revenue_growth,
            AnomalyKind::NegativeTrend,
            Severity::pick(revenue_growth < REVENUE_DECLINE_HIGH),
            format!("Significant revenue decline: {revenue_growth:.1}%"),
        ));
    }

    if booking_volatility > BOOKING_VOLATILITY_LIMIT {
        anomalies.push(Anomaly::new(
            "booking_volatility",
            booking_volatility,
            AnomalyKind::HighVolatility,
            Severity::Medium,
            format!("High booking volatility: {booking_volatility:.1} bookings/day"),
        ));
    }

    if revenue_volatility > REVENUE_VOLATILITY_LIMIT {
        anomalies.push(Anomaly::new(
            "revenue_volatility",
            revenue_volatility,
            AnomalyKind::HighVolatility,
            Severity::Medium,
            format!("High revenue volatility: ₹{revenue_volatility:.0}/day"),
        ));
    }

    anomalies
}

/// Peer revenue is normalized to a daily figure before the ratio. Values above
/// 1000 are assumed monthly and divided by 30.
pub fn peer_daily_revenue(avg_revenue: f64) -> f64 {
    if avg_revenue > MONTHLY_REVENUE_CUTOFF {
        avg_revenue / PERIOD_DAYS
    } else {
        avg_revenue
    }
}

pub fn competitive_anomalies(
    summary: &MetricsSummary,
    peer: Option<&PeerBenchmark>,
) -> Vec<Anomaly> {
    let Some(peer) = peer else {
        return Vec::new();
    };
    let mut anomalies = Vec::new();

    let restaurant_daily_revenue = summary.total_revenue_30d / PERIOD_DAYS;
    let revenue_ratio = stats::ratio(restaurant_daily_revenue, peer_daily_revenue(peer.avg_revenue));

    if revenue_ratio > PEER_REVENUE_RATIO {
        // A positive outlier, reported for context rather than as a problem.
        anomalies.push(Anomaly::new(
            "revenue_vs_peers",
            revenue_ratio,
            AnomalyKind::CompetitiveOutlier,
            Severity::Low,
            format!("Revenue {revenue_ratio:.1}x above peer average"),
        ));
    }

    if peer.avg_rating > 0.0 && summary.avg_rating < peer.avg_rating - PEER_RATING_GAP {
        let mut anomaly = Anomaly::new(
            "rating_vs_peers",
            summary.avg_rating,
            AnomalyKind::CompetitiveUnderperformance,
            Severity::Medium,
            format!(
                "Rating below peer average: {} vs {}",
                summary.avg_rating, peer.avg_rating
            ),
        );
        anomaly.peer_value = Some(peer.avg_rating);
        anomalies.push(anomaly);
    }

    anomalies
}

pub fn ad_campaign_anomalies(ad_evaluation: &AdEvaluation) -> Vec<Anomaly> {
    let mut anomalies = Vec::new();

    for campaign in &ad_evaluation.individual_campaign_analysis {
        let metrics = &campaign.performance_metrics;

        if metrics.cost_per_conversion > COST_PER_CONVERSION_LIMIT {
            anomalies.push(
                Anomaly::new(
                    "cost_per_conversion",
                    metrics.cost_per_conversion,
                    AnomalyKind::AdInefficiency,
                    Severity::pick(metrics.cost_per_conversion > COST_PER_CONVERSION_HIGH),
                    format!(
                        "High cost per conversion: ₹{:.2}",
                        metrics.cost_per_conversion
                    ),
                )
                .for_campaign(&campaign.campaign_id),
            );
        }

        if metrics.roi < ROI_FLOOR {
            anomalies.push(
                Anomaly::new(
                    "roi",
                    metrics.roi,
                    AnomalyKind::AdUnderperformance,
                    Severity::pick(metrics.roi < ROI_FLOOR_HIGH),
                    format!("Low ROI: {:.2}", metrics.roi),
                )
                .for_campaign(&campaign.campaign_id),
            );
        }
    }

    anomalies
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TypeCounts {
    pub statistical_outliers: usize,
    pub sudden_changes: usize,
    pub operational_anomalies: usize,
    pub quality_anomalies: usize,
    pub trend_anomalies: usize,
    pub competitive_anomalies: usize,
    pub ad_campaign_anomalies: usize,
}

impl TypeCounts {
    fn tally(anomalies: &[Anomaly]) -> Self {
        let mut counts = Self::default();
        for anomaly in anomalies {
            let slot = match anomaly.kind {
                AnomalyKind::StatisticalOutlier => &mut counts.statistical_outliers,
                AnomalyKind::SuddenChange => &mut counts.sudden_changes,
                AnomalyKind::OperationalAnomaly => &mut counts.operational_anomalies,
                AnomalyKind::QualityAnomaly => &mut counts.quality_anomalies,
                AnomalyKind::NegativeTrend | AnomalyKind::HighVolatility => {
                    &mut counts.trend_anomalies
                }
                AnomalyKind::CompetitiveOutlier | AnomalyKind::CompetitiveUnderperformance => {
                    &mut counts.competitive_anomalies
                }
                AnomalyKind::AdInefficiency | AnomalyKind::AdUnderperformance => {
                    &mut counts.ad_campaign_anomalies
                }
            };
            *slot += 1;
        }
        counts
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalySummary {
    pub total_anomalies: usize,
    pub by_severity: SeverityCounts,
    pub by_type: TypeCounts,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategorizedAnomalies {
    pub critical: Vec<Anomaly>,
    pub high: Vec<Anomaly>,
    pub medium: Vec<Anomaly>,
    pub low: Vec<Anomaly>,
}

impl CategorizedAnomalies {
    pub fn from_anomalies(anomalies: &[Anomaly]) -> Self {
        let mut categorized = Self::default();
        for anomaly in anomalies {
            let bucket = match anomaly.severity {
                Severity::Critical => &mut categorized.critical,
                Severity::High => &mut categorized.high,
                Severity::Medium => &mut categorized.medium,
                Severity::Low => &mut categorized.low,
            };
            bucket.push(anomaly.clone());
        }
        categorized
    }

    pub fn counts(&self) -> SeverityCounts {
        SeverityCounts {
            critical: self.critical.len(),
            high: self.high.len(),
            medium: self.medium.len(),
            low: self.low.len(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub overall_risk_level: RiskLevel,
    pub immediate_action_required: bool,
    pub monitoring_recommended: bool,
}

impl RiskAssessment {
    pub fn from_counts(counts: &SeverityCounts) -> Self {
        let overall_risk_level = if counts.critical > 0 || counts.high > 3 {
            RiskLevel::High
        } else if counts.high > 0 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        };

        Self {
            overall_risk_level,
            immediate_action_required: counts.critical > 0 || counts.high > 2,
            monitoring_recommended: counts.medium > 0,
        }
    }
}

pub fn insights_and_recommendations(anomalies: &[Anomaly]) -> (Vec<String>, Vec<String>) {
    let mut insights = Vec::new();
    let mut recommendations = Vec::new();

    let high = anomalies
        .iter()
        .filter(|a| a.severity == Severity::High)
        .count();
    let medium = anomalies
        .iter()
        .filter(|a| a.severity == Severity::Medium)
        .count();

    if high > 0 {
        insights.push(format!(
            "Found {high} high-severity anomalies requiring immediate attention"
        ));
        recommendations.push(
            "Investigate high-severity anomalies first - they may indicate operational issues"
                .to_string(),
        );
    }

    if medium > 0 {
        insights.push(format!(
            "Detected {medium} medium-severity anomalies for monitoring"
        ));
        recommendations.push("Monitor medium-severity anomalies for patterns over time".to_string());
    }

    let mut by_kind: BTreeMap<AnomalyKind, usize> = BTreeMap::new();
    for anomaly in anomalies {
        *by_kind.entry(anomaly.kind).or_default() += 1;
    }
    for (kind, count) in by_kind {
        if count > 1 {
            insights.push(format!(
                "Multiple {} anomalies detected ({count} instances)",
                kind.as_str()
            ));
        }
    }

    (insights, recommendations)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyMetadata {
    pub restaurant_id: String,
    pub session_id: String,
    pub analysis_date: DateTime<Utc>,
    pub total_anomalies_detected: usize,
    pub analysis_period: AnalysisPeriod,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyReport {
    pub analysis_metadata: AnomalyMetadata,
    pub anomaly_summary: AnomalySummary,
    pub categorized_anomalies: CategorizedAnomalies,
    pub all_anomalies: Vec<Anomaly>,
    pub insights: Vec<String>,
    pub recommendations: Vec<String>,
    pub risk_assessment: RiskAssessment,
}

impl AnomalyReport {
    pub fn build(
        restaurant_id: &str,
        session_id: &str,
        analysis_date: DateTime<Utc>,
        daily_metrics: &[DailyMetric],
        anomalies: Vec<Anomaly>,
    ) -> Self {
        let categorized_anomalies = CategorizedAnomalies::from_anomalies(&anomalies);
        let by_severity = categorized_anomalies.counts();
        let risk_assessment = RiskAssessment::from_counts(&by_severity);
        let (insights, recommendations) = insights_and_recommendations(&anomalies);

        Self {
            analysis_metadata: AnomalyMetadata {
                restaurant_id: restaurant_id.to_string(),
                session_id: session_id.to_string(),
                analysis_date,
                total_anomalies_detected: anomalies.len(),
                analysis_period: AnalysisPeriod::of(daily_metrics),
            },
            anomaly_summary: AnomalySummary {
                total_anomalies: anomalies.len(),
                by_severity,
                by_type: TypeCounts::tally(&anomalies),
            },
            categorized_anomalies,
            all_anomalies: anomalies,
            insights,
            recommendations,
            risk_assessment,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CampaignAnalysis, CampaignPerformance};
    use crate::trends::compute_trends;

    fn day(offset: i64, bookings: u32, revenue: f64) -> DailyMetric {
        DailyMetric {
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(offset),
            bookings,
            cancellations: 0,
            covers: bookings * 2,
            avg_spend_per_cover: 500.0,
            revenue,
            rating: Some(4.5),
        }
    }

    fn with_injected_outlier(base: &[f64]) -> (Vec<DailyMetric>, f64) {
        let mean = stats::mean("revenue", base).unwrap();
        let stddev = stats::population_stddev("revenue", base).unwrap();
        let outlier = mean + 10.0 * stddev;

        let mut series: Vec<DailyMetric> = base
            .iter()
            .enumerate()
            .map(|(i, revenue)| day(i as i64, 20, *revenue))
            .collect();
        series.push(day(base.len() as i64, 20, outlier));
        (series, outlier)
    }

    #[test]
    fn injected_outlier_is_the_only_flag() {
        let base = [
            10000.0, 10200.0, 9800.0, 10100.0, 9900.0, 10000.0, 10300.0, 9700.0, 10000.0,
        ];
        let (series, outlier) = with_injected_outlier(&base);
        assert_eq!(series.len(), 10);

        let flagged = statistical_outliers(&series, "revenue", |m| m.revenue);
        assert_eq!(flagged.len(), 1);
        assert_eq!(flagged[0].value, outlier);
        assert_eq!(flagged[0].date, Some(series[9].date));
        // Ten population z-scores are bounded by sqrt(9) = 3, so the flag
        // cannot pass the high cut-off at this length.
        assert_eq!(flagged[0].severity, Severity::Medium);

        // Bookings are flat: no spread, nothing flagged.
        assert!(statistical_outliers(&series, "bookings", |m| m.bookings as f64).is_empty());
    }

    #[test]
    fn injected_outlier_in_a_month_is_high() {
        let base: Vec<f64> = (0..29).map(|i| 10000.0 + (i % 5) as f64 * 100.0).collect();
        let (series, outlier) = with_injected_outlier(&base);

        let flagged = statistical_outliers(&series, "revenue", |m| m.revenue);
        assert_eq!(flagged.len(), 1);
        assert_eq!(flagged[0].value, outlier);
        assert_eq!(flagged[0].severity, Severity::High);
        assert!(flagged[0].z_score.unwrap() > 3.0);
    }

    #[test]
    fn single_point_skips_outlier_pass() {
        assert!(statistical_outliers(&[day(0, 10, 100.0)], "revenue", |m| m.revenue).is_empty());
    }

    #[test]
    fn booking_jump_is_a_high_sudden_change() {
        let series = vec![day(0, 10, 5000.0), day(1, 25, 5200.0)];
        let changes = sudden_changes(&series);

        assert_eq!(changes.len(), 1);
        let change = &changes[0];
        assert_eq!(change.metric, "bookings");
        assert_eq!(change.kind, AnomalyKind::SuddenChange);
        assert_eq!(change.severity, Severity::High);
        assert_eq!(change.change_percent, Some(150.0));
        assert_eq!(change.previous_value, Some(10.0));
    }

    #[test]
    fn revenue_drop_thresholds() {
        let series = vec![
            day(0, 20, 10000.0),
            day(1, 20, 4000.0),  // -60%: medium
            day(2, 20, 8000.0),  // +100%: high
            day(3, 20, 8000.0),
            day(4, 0, 0.0),      // -100% revenue, -100% bookings
            day(5, 20, 9000.0),  // previous zero: no change
        ];
        let changes = sudden_changes(&series);
        let revenue: Vec<(NaiveDate, Severity)> = changes
            .iter()
            .filter(|a| a.metric == "revenue")
            .map(|a| (a.date.unwrap(), a.severity))
            .collect();

        assert_eq!(
            revenue,
            vec![
                (series[1].date, Severity::Medium),
                (series[2].date, Severity::High),
                (series[4].date, Severity::High),
            ]
        );
        assert_eq!(changes.iter().filter(|a| a.metric == "bookings").count(), 1);
    }

    #[test]
    fn operational_checks() {
        let mut spend_medium = day(0, 10, 5000.0);
        spend_medium.avg_spend_per_cover = 850.0;
        let mut spend_high = day(1, 10, 5000.0);
        spend_high.avg_spend_per_cover = 240.0;
        let mut cancellations = day(2, 10, 5000.0);
        cancellations.cancellations = 3;
        let mut low_rating = day(3, 10, 5000.0);
        low_rating.rating = Some(3.8);
        let mut very_low_rating = day(4, 10, 5000.0);
        very_low_rating.rating = Some(3.2);
        let mut unrated = day(5, 0, 0.0);
        unrated.rating = None;
        unrated.cancellations = 2;

        let found = operational_anomalies(&[
            spend_medium,
            spend_high,
            cancellations,
            low_rating,
            very_low_rating,
            unrated,
        ]);
        let summary: Vec<(&str, AnomalyKind, Severity)> = found
            .iter()
            .map(|a| (a.metric.as_str(), a.kind, a.severity))
            .collect();

        assert_eq!(
            summary,
            vec![
                ("avg_spend_per_cover", AnomalyKind::OperationalAnomaly, Severity::Medium),
                ("avg_spend_per_cover", AnomalyKind::OperationalAnomaly, Severity::High),
                ("cancellation_rate", AnomalyKind::OperationalAnomaly, Severity::High),
                ("avg_rating", AnomalyKind::QualityAnomaly, Severity::Medium),
                ("avg_rating", AnomalyKind::QualityAnomaly, Severity::High),
            ]
        );
    }

    #[test]
    fn trend_thresholds() {
        let series: Vec<DailyMetric> = (0..10).map(|i| day(i, 20, 10000.0)).collect();
        let mut trends = compute_trends(&series).unwrap();
        assert!(trend_anomalies(&trends).is_empty());

        trends.booking_trends.booking_growth_rate = -25.0;
        trends.revenue_trends.revenue_growth_rate = -16.0;
        trends.booking_trends.booking_volatility = 6.0;
        trends.revenue_trends.revenue_volatility = 20000.0;

        let found = trend_anomalies(&trends);
        let summary: Vec<(&str, AnomalyKind, Severity)> = found
            .iter()
            .map(|a| (a.metric.as_str(), a.kind, a.severity))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("booking_growth_rate", AnomalyKind::NegativeTrend, Severity::High),
                ("revenue_growth_rate", AnomalyKind::NegativeTrend, Severity::Medium),
                ("booking_volatility", AnomalyKind::HighVolatility, Severity::Medium),
                ("revenue_volatility", AnomalyKind::HighVolatility, Severity::Medium),
            ]
        );
    }

    #[test]
    fn competitive_checks() {
        let summary = MetricsSummary {
            total_revenue_30d: 900000.0,
            avg_rating: 4.0,
            ..MetricsSummary::default()
        };
        let peer = PeerBenchmark {
            avg_revenue: 150000.0,
            avg_rating: 4.3,
            ..PeerBenchmark::default()
        };

        let found = competitive_anomalies(&summary, Some(&peer));
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].kind, AnomalyKind::CompetitiveOutlier);
        assert_eq!(found[0].severity, Severity::Low);
        assert_eq!(found[0].value, 6.0);
        assert_eq!(found[1].kind, AnomalyKind::CompetitiveUnderperformance);
        assert_eq!(found[1].severity, Severity::Medium);
        assert_eq!(found[1].peer_value, Some(4.3));

        assert!(competitive_anomalies(&summary, None).is_empty());
    }

    #[test]
    fn small_peer_revenue_is_treated_as_daily() {
        assert_eq!(peer_daily_revenue(800.0), 800.0);
        assert_eq!(peer_daily_revenue(1000.0), 1000.0);
        assert_eq!(peer_daily_revenue(24000.0), 800.0);
    }

    #[test]
    fn ad_campaign_checks() {
        let campaign = |id: &str, cost_per_conversion: f64, roi: f64| CampaignAnalysis {
            campaign_id: id.to_string(),
            performance_metrics: CampaignPerformance {
                cost_per_conversion,
                roi,
            },
        };
        let evaluation = AdEvaluation {
            individual_campaign_analysis: vec![
                campaign("C1", 28.0, 2.5),
                campaign("C2", 35.0, 1.5),
                campaign("C3", 12.0, 4.0),
            ],
        };

        let found = ad_campaign_anomalies(&evaluation);
        let summary: Vec<(&str, AnomalyKind, Severity)> = found
            .iter()
            .map(|a| (a.campaign_id.as_deref().unwrap(), a.kind, a.severity))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("C1", AnomalyKind::AdInefficiency, Severity::Medium),
                ("C1", AnomalyKind::AdUnderperformance, Severity::Medium),
                ("C2", AnomalyKind::AdInefficiency, Severity::High),
                ("C2", AnomalyKind::AdUnderperformance, Severity::High),
            ]
        );
        assert!(ad_campaign_anomalies(&AdEvaluation::default()).is_empty());
    }

    #[test]
    fn risk_levels() {
        let counts = |critical, high, medium| SeverityCounts {
            critical,
            high,
            medium,
            low: 0,
        };

        let low = RiskAssessment::from_counts(&counts(0, 0, 0));
        assert_eq!(low.overall_risk_level, RiskLevel::Low);
        assert!(!low.immediate_action_required);
        assert!(!low.monitoring_recommended);

        let medium = RiskAssessment::from_counts(&counts(0, 3, 1));
        assert_eq!(medium.overall_risk_level, RiskLevel::Medium);
        assert!(medium.immediate_action_required);
        assert!(medium.monitoring_recommended);

        let two_high = RiskAssessment::from_counts(&counts(0, 2, 0));
        assert!(!two_high.immediate_action_required);

        assert_eq!(
            RiskAssessment::from_counts(&counts(0, 4, 0)).overall_risk_level,
            RiskLevel::High
        );
        let critical = RiskAssessment::from_counts(&counts(1, 0, 0));
        assert_eq!(critical.overall_risk_level, RiskLevel::High);
        assert!(critical.immediate_action_required);
    }

    #[test]
    fn report_groups_and_counts() {
        let series = vec![
            day(0, 10, 5000.0),
            day(1, 25, 5200.0),
            day(2, 25, 5100.0),
        ];
        let trends = compute_trends(&series).unwrap();
        let summary = MetricsSummary::default();
        let evaluation = AdEvaluation {
            individual_campaign_analysis: vec![CampaignAnalysis {
                campaign_id: "C9".to_string(),
                performance_metrics: CampaignPerformance {
                    cost_per_conversion: 40.0,
                    roi: 1.0,
                },
            }],
        };
        let anomalies = detect_all(&DetectionInput {
            daily_metrics: &series,
            trends: &trends,
            metrics_summary: &summary,
            peer: None,
            ad_evaluation: &evaluation,
        });

        let report = AnomalyReport::build("R001", "abc12345", Utc::now(), &series, anomalies);

        assert_eq!(report.anomaly_summary.total_anomalies, 4);
        assert_eq!(report.anomaly_summary.by_type.sudden_changes, 1);
        assert_eq!(report.anomaly_summary.by_type.ad_campaign_anomalies, 2);
        assert_eq!(report.anomaly_summary.by_type.trend_anomalies, 1);
        assert_eq!(report.anomaly_summary.by_severity.high, 3);
        assert_eq!(report.categorized_anomalies.high.len(), 3);
        assert_eq!(report.categorized_anomalies.medium.len(), 1);
        assert!(report.risk_assessment.immediate_action_required);
        assert_eq!(report.risk_assessment.overall_risk_level, RiskLevel::Medium);
        assert_eq!(
            report.analysis_metadata.analysis_period.start_date,
            Some(series[0].date)
        );
        assert!(report
            .insights
            .iter()
            .any(|line| line == "Found 3 high-severity anomalies requiring immediate attention"));

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["all_anomalies"][0]["type"], "sudden_change");
        assert!(json["all_anomalies"][0].get("campaign_id").is_none());
    }
}
