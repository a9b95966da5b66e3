use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::anomaly::{self, AnomalyReport, DetectionInput};
use crate::comparative::{self, find_benchmark};
use crate::error::AnalysisError;
use crate::events::{EventSink, WorkflowEvent};
use crate::models::{AdEvaluation, PeerBenchmark, RestaurantData};
use crate::report;
use crate::trends::{
    self, compute_trends, identify_patterns, AnalysisPeriod, PerformanceTrends, TrendsMetadata,
    TrendsReport,
};

pub const TRENDS_WORKFLOW: &str = "performance_trends";
pub const ANOMALY_WORKFLOW: &str = "anomaly_detection";
pub const SUMMARY_WORKFLOW: &str = "session_summary";

pub const TRENDS_ARTIFACT: &str = "performance_trends.json";
pub const ANOMALY_ARTIFACT: &str = "anomalies.json";
pub const SUMMARY_ARTIFACT: &str = "summary.md";
pub const AD_EVALUATION_ARTIFACT: &str = "ad_evaluation.json";

/// First 8 hex characters of a v4 uuid.
pub fn new_session_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}

/// Peer row for the restaurant's locality and cuisine, if the collector
/// supplied one.
pub fn peer_for(data: &RestaurantData) -> Option<&PeerBenchmark> {
    let info = &data.restaurant_info;
    match find_benchmark(&data.peer_benchmarks, &info.locality, &info.cuisine) {
        Ok(benchmark) => Some(benchmark),
        Err(err) => {
            warn!(restaurant_id = %info.restaurant_id, error = %err, "comparing against zero peer values");
            None
        }
    }
}

pub fn build_trends_report(
    data: &RestaurantData,
    session_id: &str,
    generated_at: DateTime<Utc>,
) -> Result<TrendsReport, AnalysisError> {
    let performance_trends = compute_trends(&data.daily_metrics)?;
    let pattern_analysis = identify_patterns(&data.daily_metrics, &performance_trends)?;
    let competitive_analysis =
        comparative::compare(&data.metrics_summary, peer_for(data), &data.ads_summary);
    let key_insights =
        trends::key_insights(&performance_trends, &pattern_analysis, &competitive_analysis);

    Ok(TrendsReport {
        analysis_metadata: TrendsMetadata {
            restaurant_id: data.restaurant_info.restaurant_id.clone(),
            restaurant_name: data.restaurant_info.restaurant_name.clone(),
            analysis_period: AnalysisPeriod::of(&data.daily_metrics),
            generated_at,
            session_id: session_id.to_string(),
        },
        performance_trends,
        pattern_analysis,
        competitive_analysis,
        key_insights,
    })
}

pub fn build_anomaly_report(
    data: &RestaurantData,
    trends: &PerformanceTrends,
    ad_evaluation: &AdEvaluation,
    session_id: &str,
    generated_at: DateTime<Utc>,
) -> AnomalyReport {
    let anomalies = anomaly::detect_all(&DetectionInput {
        daily_metrics: &data.daily_metrics,
        trends,
        metrics_summary: &data.metrics_summary,
        peer: peer_for(data),
        ad_evaluation,
    });

    AnomalyReport::build(
        &data.restaurant_info.restaurant_id,
        session_id,
        generated_at,
        &data.daily_metrics,
        anomalies,
    )
}

/// Only the part of a saved trends report the anomaly stage reads back.
#[derive(Debug, Deserialize)]
struct TrendsDocument {
    performance_trends: PerformanceTrends,
}

pub fn load_trends(path: &Path) -> anyhow::Result<PerformanceTrends> {
    let document: TrendsDocument = crate::ingest::read_json(path)?;
    Ok(document.performance_trends)
}

/// One analysis run with its own artifact directory.
pub struct Session<'a> {
    pub id: String,
    pub dir: PathBuf,
    pub generated_at: DateTime<Utc>,
    events: &'a dyn EventSink,
}

impl<'a> Session<'a> {
    pub fn new(
        id: String,
        artifacts_root: &Path,
        generated_at: DateTime<Utc>,
        events: &'a dyn EventSink,
    ) -> Self {
        let dir = artifacts_root.join(&id);
        Self {
            id,
            dir,
            generated_at,
            events,
        }
    }

    pub fn artifact(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    pub fn trends(&self, data: &RestaurantData) -> anyhow::Result<TrendsReport> {
        self.run_stage(TRENDS_WORKFLOW, TRENDS_ARTIFACT, || {
            let report = build_trends_report(data, &self.id, self.generated_at)?;
            self.write_json(TRENDS_ARTIFACT, &report)?;
            Ok(report)
        })
    }

    pub fn anomalies(
        &self,
        data: &RestaurantData,
        trends: &PerformanceTrends,
        ad_evaluation: &AdEvaluation,
    ) -> anyhow::Result<AnomalyReport> {
        self.run_stage(ANOMALY_WORKFLOW, ANOMALY_ARTIFACT, || {
            let report =
                build_anomaly_report(data, trends, ad_evaluation, &self.id, self.generated_at);
            self.write_json(ANOMALY_ARTIFACT, &report)?;
            Ok(report)
        })
    }

    pub fn summary(
        &self,
        trends_report: &TrendsReport,
        anomaly_report: &AnomalyReport,
    ) -> anyhow::Result<PathBuf> {
        self.run_stage(SUMMARY_WORKFLOW, SUMMARY_ARTIFACT, || {
            let markdown = report::build_report(trends_report, anomaly_report);
            let path = self.artifact(SUMMARY_ARTIFACT);
            std::fs::write(&path, markdown)
                .with_context(|| format!("failed to write {}", path.display()))?;
            Ok(path)
        })
    }

    fn write_json<T: Serialize>(&self, name: &str, value: &T) -> anyhow::Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create {}", self.dir.display()))?;
        let path = self.artifact(name);
        let json = serde_json::to_string_pretty(value)?;
        std::fs::write(&path, json)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(path)
    }

    fn run_stage<T>(
        &self,
        workflow: &str,
        artifact: &str,
        stage: impl FnOnce() -> anyhow::Result<T>,
    ) -> anyhow::Result<T> {
        self.notify(&WorkflowEvent::started(workflow, Utc::now()));
        info!(session_id = %self.id, workflow, "stage started");

        match stage() {
            Ok(value) => {
                self.notify(&WorkflowEvent::completed(
                    workflow,
                    Utc::now(),
                    vec![artifact.to_string()],
                ));
                info!(session_id = %self.id, workflow, artifact, "stage completed");
                Ok(value)
            }
            Err(err) => {
                self.notify(&WorkflowEvent::failed(workflow, Utc::now(), format!("{err:#}")));
                warn!(session_id = %self.id, workflow, error = %err, "stage failed");
                Err(err.context(format!("{workflow} stage failed")))
            }
        }
    }

    fn notify(&self, event: &WorkflowEvent) {
        if let Err(err) = self.events.record(event) {
            warn!(workflow = %event.workflow, error = %err, "failed to record workflow event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{MemorySink, SinkError, WorkflowStatus};
    use crate::ingest::parse_restaurant_data;

    fn restaurant() -> RestaurantData {
        let days: Vec<String> = (1..=14)
            .map(|d| {
                format!(
                    r#"{{"date": "2024-02-{d:02}", "bookings": {}, "cancellations": 1, "covers": 40, "revenue": {}, "rating": 4.4}}"#,
                    18 + d % 4,
                    20000 + d * 150
                )
            })
            .collect();
        parse_restaurant_data(&format!(
            r#"{{
                "restaurant_info": {{"restaurant_id": "R042", "restaurant_name": "Spice Route", "locality": "Koramangala", "cuisine": "North Indian"}},
                "metrics_summary": {{"avg_daily_bookings": 19.5, "total_revenue_30d": 630000.0, "avg_rating": 4.4}},
                "ads_summary": {{"avg_roi": 4.0, "avg_conversion_rate": 0.06}},
                "peer_benchmarks": [{{"locality": "Koramangala", "cuisine": "North Indian", "avg_bookings": 15.0, "avg_revenue": 450000.0, "avg_rating": 4.1, "avg_roi": 3.2, "avg_conversion_rate": 0.05}}],
                "daily_metrics": [{}]
            }}"#,
            days.join(",")
        ))
        .unwrap()
    }

    struct FailingSink;

    impl EventSink for FailingSink {
        fn record(&self, _event: &WorkflowEvent) -> Result<(), SinkError> {
            Err(SinkError::Poisoned)
        }
    }

    #[test]
    fn session_id_is_eight_hex_chars() {
        let id = new_session_id();
        assert_eq!(id.len(), 8);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn trends_report_uses_peer_benchmark() {
        let data = restaurant();
        let report = build_trends_report(&data, "abc12345", Utc::now()).unwrap();

        assert!(report.competitive_analysis.benchmark_available);
        assert_eq!(report.analysis_metadata.analysis_period.total_days, 14);
        assert_eq!(report.performance_trends.booking_trends.weekly_breakdown.len(), 2);
        assert!(report
            .key_insights
            .top_strengths
            .iter()
            .any(|line| line.starts_with("Revenue outperforming peers")));
    }

    #[test]
    fn unknown_peer_group_degrades() {
        let mut data = restaurant();
        data.restaurant_info.cuisine = "Italian".to_string();
        assert!(peer_for(&data).is_none());

        let report = build_trends_report(&data, "abc12345", Utc::now()).unwrap();
        assert!(!report.competitive_analysis.benchmark_available);
    }

    #[test]
    fn session_writes_artifacts_and_events() {
        let dir = tempfile::tempdir().unwrap();
        let sink = MemorySink::default();
        let session = Session::new("abc12345".to_string(), dir.path(), Utc::now(), &sink);
        let data = restaurant();

        let trends_report = session.trends(&data).unwrap();
        let trends = load_trends(&session.artifact(TRENDS_ARTIFACT)).unwrap();
        assert_eq!(trends, trends_report.performance_trends);

        let anomaly_report = session
            .anomalies(&data, &trends, &AdEvaluation::default())
            .unwrap();
        assert_eq!(anomaly_report.analysis_metadata.session_id, "abc12345");
        assert!(dir.path().join("abc12345").join("anomalies.json").exists());

        let summary = session.summary(&trends_report, &anomaly_report).unwrap();
        assert!(summary.ends_with(SUMMARY_ARTIFACT));

        let events = sink.events();
        assert_eq!(events.len(), 6);
        assert!(events
            .iter()
            .all(|e| e.status != WorkflowStatus::Failed));
        assert_eq!(events[1].artifacts_created, vec![TRENDS_ARTIFACT.to_string()]);
    }

    #[test]
    fn failed_stage_is_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let sink = MemorySink::default();
        let session = Session::new("deadbeef".to_string(), dir.path(), Utc::now(), &sink);
        let mut data = restaurant();
        data.daily_metrics.clear();

        let err = session.trends(&data).unwrap_err();
        assert!(format!("{err:#}").contains("daily_metrics series is empty"));

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].status, WorkflowStatus::Failed);
        assert!(events[1]
            .error_message
            .as_deref()
            .unwrap()
            .contains("empty"));
        assert!(!session.artifact(TRENDS_ARTIFACT).exists());
    }

    #[test]
    fn sink_failures_do_not_fail_stages() {
        let dir = tempfile::tempdir().unwrap();
        let session = Session::new("cafef00d".to_string(), dir.path(), Utc::now(), &FailingSink);
        assert!(session.trends(&restaurant()).is_ok());
    }
}
