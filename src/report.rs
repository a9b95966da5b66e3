use std::collections::HashMap;
use std::fmt::Write;

use crate::anomaly::{Anomaly, AnomalyKind, AnomalyReport, Severity};
use crate::comparative::Comparison;
use crate::trends::TrendsReport;

#[derive(Debug, Clone, PartialEq)]
pub struct KindSummary {
    pub kind: AnomalyKind,
    pub count: usize,
    pub worst_severity: Severity,
}

pub fn summarize_by_kind(anomalies: &[Anomaly]) -> Vec<KindSummary> {
    let mut map: HashMap<AnomalyKind, (usize, Severity)> = HashMap::new();

    for anomaly in anomalies {
        let entry = map.entry(anomaly.kind).or_insert((0, anomaly.severity));
        entry.0 += 1;
        entry.1 = entry.1.min(anomaly.severity);
    }

    let mut summaries: Vec<KindSummary> = map
        .into_iter()
        .map(|(kind, (count, worst_severity))| KindSummary {
            kind,
            count,
            worst_severity,
        })
        .collect();

    summaries.sort_by(|a, b| b.count.cmp(&a.count).then(a.kind.cmp(&b.kind)));
    summaries
}

fn severity_label(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical => "critical",
        Severity::High => "high",
        Severity::Medium => "medium",
        Severity::Low => "low",
    }
}

fn comparison_line(output: &mut String, comparison: &Comparison) {
    let _ = writeln!(
        output,
        "- {:?}: {:.2} vs peers {:.2} ({:+.2}, {:?})",
        comparison.metric,
        comparison.restaurant_value,
        comparison.peer_value,
        comparison.ratio_or_delta,
        comparison.status
    );
}

/// Markdown summary of one session.
pub fn build_report(trends: &TrendsReport, anomalies: &AnomalyReport) -> String {
    let meta = &trends.analysis_metadata;
    let period = &meta.analysis_period;
    let booking = &trends.performance_trends.booking_trends;
    let revenue = &trends.performance_trends.revenue_trends;
    let rating = &trends.performance_trends.rating_trends;
    let operations = &trends.performance_trends.operational_metrics;

    let mut output = String::new();

    let _ = writeln!(output, "# Restaurant Performance Report");
    let _ = writeln!(
        output,
        "Generated for {} ({}) in session {}",
        meta.restaurant_name, meta.restaurant_id, meta.session_id
    );
    match (period.start_date, period.end_date) {
        (Some(start), Some(end)) => {
            let _ = writeln!(output, "Period {start} to {end} ({} days)", period.total_days);
        }
        _ => {
            let _ = writeln!(output, "No daily metrics in this period.");
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Trends");
    let _ = writeln!(
        output,
        "- Bookings: {} total, {:.2}/day, growth {:.1}%, volatility {:.2}",
        booking.total_bookings,
        booking.avg_daily_bookings,
        booking.booking_growth_rate,
        booking.booking_volatility
    );
    let _ = writeln!(
        output,
        "- Revenue: ₹{:.0} total, ₹{:.0}/day, growth {:.1}%, volatility ₹{:.0}",
        revenue.total_revenue,
        revenue.avg_daily_revenue,
        revenue.revenue_growth_rate,
        revenue.revenue_volatility
    );
    let _ = writeln!(
        output,
        "- Rating: {:.2} average ({:.1} to {:.1})",
        rating.avg_rating, rating.min_rating, rating.max_rating
    );
    let _ = writeln!(
        output,
        "- Operations: {} covers, cancellation rate {:.1}%, ₹{:.0} per cover",
        operations.total_covers, operations.avg_cancellation_rate, operations.avg_spend_per_cover
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Peer Comparison");

    if trends.competitive_analysis.benchmark_available {
        for comparison in trends
            .competitive_analysis
            .vs_peers
            .iter()
            .chain(&trends.competitive_analysis.ads_effectiveness)
        {
            comparison_line(&mut output, comparison);
        }
    } else {
        let _ = writeln!(output, "No peer benchmark for this locality and cuisine.");
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Anomaly Mix");

    let summaries = summarize_by_kind(&anomalies.all_anomalies);
    if summaries.is_empty() {
        let _ = writeln!(output, "No anomalies detected.");
    } else {
        for summary in summaries.iter() {
            let _ = writeln!(
                output,
                "- {}: {} (worst {})",
                summary.kind.as_str(),
                summary.count,
                severity_label(summary.worst_severity)
            );
        }
    }

    let risk = &anomalies.risk_assessment;
    let _ = writeln!(output);
    let _ = writeln!(output, "## Risk");
    let _ = writeln!(
        output,
        "Overall risk {:?}; immediate action {}; monitoring {}",
        risk.overall_risk_level,
        if risk.immediate_action_required { "required" } else { "not required" },
        if risk.monitoring_recommended { "recommended" } else { "not needed" }
    );

    let urgent: Vec<&Anomaly> = anomalies
        .categorized_anomalies
        .critical
        .iter()
        .chain(&anomalies.categorized_anomalies.high)
        .collect();
    if !urgent.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Needs Attention");
        for anomaly in urgent.iter().take(10) {
            let scope = match (&anomaly.date, &anomaly.campaign_id) {
                (Some(date), _) => date.to_string(),
                (None, Some(campaign)) => format!("campaign {campaign}"),
                (None, None) => "period".to_string(),
            };
            let _ = writeln!(output, "- {}: {}", scope, anomaly.description);
        }
    }

    let insights = &trends.key_insights;
    let _ = writeln!(output);
    let _ = writeln!(output, "## Insights");
    for line in insights
        .top_strengths
        .iter()
        .map(|line| ("+", line))
        .chain(insights.areas_for_improvement.iter().map(|line| ("-", line)))
        .chain(anomalies.insights.iter().map(|line| ("!", line)))
    {
        let _ = writeln!(output, "{} {}", line.0, line.1);
    }

    if !anomalies.recommendations.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Recommendations");
        for recommendation in &anomalies.recommendations {
            let _ = writeln!(output, "- {recommendation}");
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::parse_restaurant_data;
    use crate::models::AdEvaluation;
    use crate::pipeline::{build_anomaly_report, build_trends_report};
    use chrono::Utc;

    fn anomaly(kind: AnomalyKind, severity: Severity) -> Anomaly {
        serde_json::from_value(serde_json::json!({
            "metric": "revenue",
            "value": 1.0,
            "type": kind,
            "severity": severity,
            "description": "test"
        }))
        .unwrap()
    }

    #[test]
    fn kinds_sorted_by_count_with_worst_severity() {
        let summaries = summarize_by_kind(&[
            anomaly(AnomalyKind::AdInefficiency, Severity::Medium),
            anomaly(AnomalyKind::SuddenChange, Severity::Medium),
            anomaly(AnomalyKind::SuddenChange, Severity::High),
        ]);

        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].kind, AnomalyKind::SuddenChange);
        assert_eq!(summaries[0].count, 2);
        assert_eq!(summaries[0].worst_severity, Severity::High);
        assert_eq!(summaries[1].worst_severity, Severity::Medium);
    }

    #[test]
    fn report_sections() {
        let data = parse_restaurant_data(
            r#"{
                "restaurant_info": {"restaurant_id": "R7", "restaurant_name": "Tandoor House"},
                "daily_metrics": [
                    {"date": "2024-01-01", "bookings": 10, "covers": 20, "revenue": 10000, "rating": 4.5},
                    {"date": "2024-01-02", "bookings": 25, "covers": 50, "revenue": 25000, "rating": 4.5}
                ]
            }"#,
        )
        .unwrap();
        let now = Utc::now();
        let trends = build_trends_report(&data, "abc12345", now).unwrap();
        let anomalies = build_anomaly_report(
            &data,
            &trends.performance_trends,
            &AdEvaluation::default(),
            "abc12345",
            now,
        );

        let markdown = build_report(&trends, &anomalies);
        assert!(markdown.starts_with("# Restaurant Performance Report"));
        assert!(markdown.contains("Tandoor House (R7) in session abc12345"));
        assert!(markdown.contains("Period 2024-01-01 to 2024-01-02 (2 days)"));
        assert!(markdown.contains("No peer benchmark for this locality and cuisine."));
        assert!(markdown.contains("- sudden_change: 2 (worst high)"));
        assert!(markdown.contains("## Needs Attention"));
        assert!(markdown.contains("- No peer benchmark available for comparison"));
    }
}
