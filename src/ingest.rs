use std::io::Read;
use std::path::Path;

use anyhow::Context;
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::models::{
    AdEvaluation, AdsSummary, DailyMetric, MetricsSummary, PeerBenchmark, RestaurantData,
    RestaurantInfo,
};

/// A daily row as the collector or a CSV export writes it. Older exports use
/// `avg_rating` instead of `rating` and may omit spend per cover.
#[derive(Debug, Deserialize)]
struct RawDailyMetric {
    date: NaiveDate,
    #[serde(default)]
    bookings: u32,
    #[serde(default)]
    cancellations: u32,
    #[serde(default)]
    covers: u32,
    #[serde(default)]
    avg_spend_per_cover: Option<f64>,
    #[serde(default)]
    revenue: f64,
    #[serde(default)]
    rating: Option<f64>,
    #[serde(default)]
    avg_rating: Option<f64>,
}

impl RawDailyMetric {
    fn normalize(self) -> DailyMetric {
        let avg_spend_per_cover = self.avg_spend_per_cover.unwrap_or(if self.covers > 0 {
            self.revenue / self.covers as f64
        } else {
            0.0
        });

        DailyMetric {
            date: self.date,
            bookings: self.bookings,
            cancellations: self.cancellations,
            covers: self.covers,
            avg_spend_per_cover,
            revenue: self.revenue,
            // The collector writes 0 for an unrated day.
            rating: self.rating.or(self.avg_rating).filter(|r| *r > 0.0),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawDataSection {
    #[serde(default)]
    daily_metrics: Vec<RawDailyMetric>,
}

#[derive(Debug, Deserialize)]
struct RawRestaurantData {
    #[serde(default)]
    restaurant_info: RestaurantInfo,
    #[serde(default)]
    metrics_summary: MetricsSummary,
    #[serde(default)]
    daily_metrics: Option<Vec<RawDailyMetric>>,
    #[serde(default)]
    raw_data: Option<RawDataSection>,
    #[serde(default)]
    ads_summary: AdsSummary,
    #[serde(default)]
    ads_data: Vec<serde_json::Value>,
    #[serde(default)]
    peer_benchmarks: Vec<PeerBenchmark>,
    #[serde(default)]
    discount_history: Vec<serde_json::Value>,
    #[serde(default)]
    data_quality: serde_json::Value,
}

fn normalize_rows(rows: Vec<RawDailyMetric>) -> Vec<DailyMetric> {
    let mut metrics: Vec<DailyMetric> = rows.into_iter().map(RawDailyMetric::normalize).collect();
    metrics.sort_by_key(|metric| metric.date);
    metrics
}

pub fn parse_restaurant_data(json: &str) -> anyhow::Result<RestaurantData> {
    let raw: RawRestaurantData =
        serde_json::from_str(json).context("restaurant data is not valid JSON")?;

    let rows = match raw.daily_metrics {
        Some(rows) => rows,
        None => raw.raw_data.unwrap_or_default().daily_metrics,
    };

    Ok(RestaurantData {
        restaurant_info: raw.restaurant_info,
        metrics_summary: raw.metrics_summary,
        daily_metrics: normalize_rows(rows),
        ads_summary: raw.ads_summary,
        ads_data: raw.ads_data,
        peer_benchmarks: raw.peer_benchmarks,
        discount_history: raw.discount_history,
        data_quality: raw.data_quality,
    })
}

pub fn load_restaurant_data(path: &Path) -> anyhow::Result<RestaurantData> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let data = parse_restaurant_data(&json)?;
    debug!(
        path = %path.display(),
        days = data.daily_metrics.len(),
        "loaded restaurant data"
    );
    Ok(data)
}

/// Ad evaluation is optional: a missing file means no campaigns to inspect.
pub fn load_ad_evaluation(path: &Path) -> anyhow::Result<AdEvaluation> {
    if !path.exists() {
        debug!(path = %path.display(), "no ad evaluation, skipping campaign checks");
        return Ok(AdEvaluation::default());
    }
    read_json(path)
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("failed to parse {}", path.display()))
}

pub fn read_daily_metrics_csv(csv_path: &Path) -> anyhow::Result<Vec<DailyMetric>> {
    let file = std::fs::File::open(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    read_daily_metrics(file)
}

/// Reads daily rows with a `date,bookings,cancellations,covers,...` header.
pub fn read_daily_metrics<R: Read>(source: R) -> anyhow::Result<Vec<DailyMetric>> {
    let mut reader = csv::Reader::from_reader(source);
    let mut rows = Vec::new();

    for result in reader.deserialize::<RawDailyMetric>() {
        rows.push(result.context("invalid daily metrics row")?);
    }

    Ok(normalize_rows(rows))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rating_falls_back_to_avg_rating() {
        let data = parse_restaurant_data(
            r#"{
                "restaurant_info": {"restaurant_id": "R001", "restaurant_name": "Spice Route"},
                "daily_metrics": [
                    {"date": "2024-01-02", "bookings": 20, "revenue": 9000.0, "covers": 18, "avg_rating": 4.3},
                    {"date": "2024-01-01", "bookings": 10, "revenue": 5000.0, "covers": 10, "rating": 4.6, "cancellations": 1}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(data.daily_metrics.len(), 2);
        let first = &data.daily_metrics[0];
        assert_eq!(first.date, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(first.rating, Some(4.6));
        assert_eq!(first.cancellations, 1);
        assert_eq!(data.daily_metrics[1].rating, Some(4.3));
    }

    #[test]
    fn spend_per_cover_derived_from_revenue() {
        let data = parse_restaurant_data(
            r#"{"daily_metrics": [
                {"date": "2024-01-01", "bookings": 5, "revenue": 4500.0, "covers": 9},
                {"date": "2024-01-02", "bookings": 0, "revenue": 0.0, "covers": 0},
                {"date": "2024-01-03", "bookings": 5, "revenue": 4500.0, "covers": 9, "avg_spend_per_cover": 610.0}
            ]}"#,
        )
        .unwrap();

        let spend: Vec<f64> = data
            .daily_metrics
            .iter()
            .map(|m| m.avg_spend_per_cover)
            .collect();
        assert_eq!(spend, vec![500.0, 0.0, 610.0]);
        assert_eq!(data.daily_metrics[1].rating, None);
    }

    #[test]
    fn daily_metrics_can_be_nested_under_raw_data() {
        let data = parse_restaurant_data(
            r#"{"raw_data": {"daily_metrics": [
                {"date": "2024-03-01", "bookings": 12, "revenue": 6000.0, "covers": 14, "rating": 4.4}
            ]}}"#,
        )
        .unwrap();
        assert_eq!(data.daily_metrics.len(), 1);
        assert_eq!(data.daily_metrics[0].bookings, 12);
    }

    #[test]
    fn csv_rows_are_normalized_and_sorted() {
        let csv = "date,bookings,cancellations,covers,avg_spend_per_cover,revenue,rating\n\
                   2024-02-02,14,1,20,,9000,4.5\n\
                   2024-02-01,10,0,15,520,7800,\n";
        let metrics = read_daily_metrics(csv.as_bytes()).unwrap();

        assert_eq!(metrics.len(), 2);
        assert_eq!(metrics[0].date, NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        assert_eq!(metrics[0].avg_spend_per_cover, 520.0);
        assert_eq!(metrics[0].rating, None);
        assert_eq!(metrics[1].avg_spend_per_cover, 450.0);
        assert_eq!(metrics[1].rating, Some(4.5));
    }

    #[test]
    fn missing_ad_evaluation_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let evaluation = load_ad_evaluation(&dir.path().join("ad_evaluation.json")).unwrap();
        assert!(evaluation.individual_campaign_analysis.is_empty());
    }
}
