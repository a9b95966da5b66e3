use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// One restaurant-day after ingestion normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyMetric {
    pub date: NaiveDate,
    pub bookings: u32,
    pub cancellations: u32,
    pub covers: u32,
    pub avg_spend_per_cover: f64,
    pub revenue: f64,
    /// `None` on a day nobody rated.
    pub rating: Option<f64>,
}

impl DailyMetric {
    /// Cancellations as a percentage of bookings, `None` on a day without bookings.
    pub fn cancellation_rate(&self) -> Option<f64> {
        if self.bookings == 0 {
            None
        } else {
            Some(self.cancellations as f64 / self.bookings as f64 * 100.0)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyBucket {
    pub week_number: usize,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_bookings: u64,
    pub total_revenue: f64,
    pub total_covers: u64,
    pub total_cancellations: u64,
    /// Mean over the rated days, `None` when the week has none.
    pub avg_rating: Option<f64>,
    pub days_in_week: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RestaurantInfo {
    pub restaurant_id: String,
    pub restaurant_name: String,
    pub locality: String,
    pub cuisine: String,
    pub onboarded_date: Option<String>,
}

/// Period summary computed by the data collector.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsSummary {
    pub total_bookings_30d: u64,
    pub avg_daily_bookings: f64,
    pub total_revenue_30d: f64,
    pub avg_rating: f64,
    pub cancellation_rate: f64,
    pub total_covers: u64,
    pub avg_covers_per_booking: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AdsSummary {
    pub total_spend: f64,
    pub total_impressions: u64,
    pub total_clicks: u64,
    pub total_conversions: u64,
    pub avg_ctr: f64,
    pub avg_conversion_rate: f64,
    pub avg_roi: f64,
}

/// Aggregate reference metrics for restaurants sharing locality and cuisine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeerBenchmark {
    pub locality: String,
    pub cuisine: String,
    pub avg_bookings: f64,
    pub avg_conversion_rate: f64,
    pub avg_ads_spend: f64,
    pub avg_roi: f64,
    pub avg_revenue: f64,
    pub avg_rating: f64,
}

/// The collector's restaurant document with daily rows already normalized.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RestaurantData {
    pub restaurant_info: RestaurantInfo,
    pub metrics_summary: MetricsSummary,
    pub daily_metrics: Vec<DailyMetric>,
    pub ads_summary: AdsSummary,
    pub ads_data: Vec<serde_json::Value>,
    pub peer_benchmarks: Vec<PeerBenchmark>,
    pub discount_history: Vec<serde_json::Value>,
    pub data_quality: serde_json::Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdEvaluation {
    #[serde(default)]
    pub individual_campaign_analysis: Vec<CampaignAnalysis>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignAnalysis {
    pub campaign_id: String,
    #[serde(default)]
    pub performance_metrics: CampaignPerformance,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CampaignPerformance {
    pub cost_per_conversion: f64,
    pub roi: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RubricDimension {
    pub score: f64,
    pub weight: f64,
}

/// One row of the append-only evaluation history. The rubric stays as the
/// stored JSON text until a breakdown is requested.
#[derive(Debug, Clone)]
pub struct EvaluationRecord {
    pub evaluation_id: i64,
    pub session_id: String,
    pub workflow_type: String,
    pub score: f64,
    pub rubric_json: String,
    /// The column has a default but no NOT NULL constraint.
    pub created_at: Option<NaiveDateTime>,
}
