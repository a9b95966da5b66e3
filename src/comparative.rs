use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;
use crate::models::{AdsSummary, MetricsSummary, PeerBenchmark};
use crate::stats::{ratio, round2};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparedMetric {
    Bookings,
    Revenue,
    Rating,
    Roi,
    Conversion,
}

impl ComparedMetric {
    /// Countable metrics compare as a ratio, the rest as a difference.
    pub fn uses_ratio(self) -> bool {
        matches!(self, ComparedMetric::Bookings | ComparedMetric::Revenue)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeerStatus {
    AboveAverage,
    BelowAverage,
}

impl PeerStatus {
    /// Strictly greater than the peer value; a tie is below average.
    pub fn classify(restaurant_value: f64, peer_value: f64) -> Self {
        if restaurant_value > peer_value {
            PeerStatus::AboveAverage
        } else {
            PeerStatus::BelowAverage
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub metric: ComparedMetric,
    pub restaurant_value: f64,
    pub peer_value: f64,
    pub ratio_or_delta: f64,
    pub status: PeerStatus,
}

impl Comparison {
    pub fn new(metric: ComparedMetric, restaurant_value: f64, peer_value: f64) -> Self {
        let ratio_or_delta = if metric.uses_ratio() {
            ratio(restaurant_value, peer_value)
        } else {
            restaurant_value - peer_value
        };

        Self {
            metric,
            restaurant_value,
            peer_value,
            ratio_or_delta: round2(ratio_or_delta),
            status: PeerStatus::classify(restaurant_value, peer_value),
        }
    }

    /// Placeholder used when no benchmark row exists for the peer group.
    pub fn without_peer(metric: ComparedMetric, restaurant_value: f64) -> Self {
        Self {
            metric,
            restaurant_value,
            peer_value: 0.0,
            ratio_or_delta: 0.0,
            status: PeerStatus::BelowAverage,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparativeReport {
    pub benchmark_available: bool,
    pub vs_peers: Vec<Comparison>,
    pub ads_effectiveness: Vec<Comparison>,
}

impl ComparativeReport {
    pub fn get(&self, metric: ComparedMetric) -> Option<&Comparison> {
        self.vs_peers
            .iter()
            .chain(self.ads_effectiveness.iter())
            .find(|comparison| comparison.metric == metric)
    }
}

pub fn find_benchmark<'a>(
    benchmarks: &'a [PeerBenchmark],
    locality: &str,
    cuisine: &str,
) -> Result<&'a PeerBenchmark, AnalysisError> {
    benchmarks
        .iter()
        .find(|row| row.locality == locality && row.cuisine == cuisine)
        .ok_or_else(|| AnalysisError::MissingReferenceData {
            locality: locality.to_string(),
            cuisine: cuisine.to_string(),
        })
}

pub fn compare(
    summary: &MetricsSummary,
    peer: Option<&PeerBenchmark>,
    ads: &AdsSummary,
) -> ComparativeReport {
    let restaurant = [
        (ComparedMetric::Bookings, summary.avg_daily_bookings),
        (ComparedMetric::Revenue, summary.total_revenue_30d),
        (ComparedMetric::Rating, summary.avg_rating),
        (ComparedMetric::Roi, ads.avg_roi),
        (ComparedMetric::Conversion, ads.avg_conversion_rate),
    ];

    let comparisons: Vec<Comparison> = restaurant
        .into_iter()
        .map(|(metric, value)| match peer {
            Some(benchmark) => Comparison::new(metric, value, peer_value(benchmark, metric)),
            None => Comparison::without_peer(metric, value),
        })
        .collect();

    let (vs_peers, ads_effectiveness): (Vec<Comparison>, Vec<Comparison>) = comparisons
        .into_iter()
        .partition(|c| !matches!(c.metric, ComparedMetric::Roi | ComparedMetric::Conversion));

    ComparativeReport {
        benchmark_available: peer.is_some(),
        vs_peers,
        ads_effectiveness,
    }
}

fn peer_value(benchmark: &PeerBenchmark, metric: ComparedMetric) -> f64 {
    match metric {
        ComparedMetric::Bookings => benchmark.avg_bookings,
        ComparedMetric::Revenue => benchmark.avg_revenue,
        ComparedMetric::Rating => benchmark.avg_rating,
        ComparedMetric::Roi => benchmark.avg_roi,
        ComparedMetric::Conversion => benchmark.avg_conversion_rate,
    }
}
