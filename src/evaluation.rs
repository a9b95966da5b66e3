//! Rubric scoring for finished analysis sessions and the trend over the
//! evaluation history.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;
use crate::models::{EvaluationRecord, RubricDimension};
use crate::stats::round2;

pub const STANDARD_WEIGHTS: [(&str, f64); 4] = [
    ("data_accuracy", 0.35),
    ("insight_quality", 0.30),
    ("completeness", 0.20),
    ("confidence_calibration", 0.15),
];

pub type Rubric = BTreeMap<String, RubricDimension>;

/// Builds a rubric from the four standard dimension scores, in
/// `STANDARD_WEIGHTS` order.
pub fn standard_rubric(scores: [f64; 4]) -> Rubric {
    STANDARD_WEIGHTS
        .iter()
        .zip(scores)
        .map(|((name, weight), score)| {
            (
                name.to_string(),
                RubricDimension {
                    score,
                    weight: *weight,
                },
            )
        })
        .collect()
}

/// Weighted sum of dimension scores. Weights are used as given.
pub fn overall_score(rubric: &Rubric) -> f64 {
    rubric.values().map(|d| d.score * d.weight).sum()
}

pub fn weight_total(rubric: &Rubric) -> f64 {
    rubric.values().map(|d| d.weight).sum()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scorecard {
    pub overall_score: f64,
    pub weight_total: f64,
    pub rubric: Rubric,
}

impl Scorecard {
    pub fn from_rubric(rubric: Rubric) -> Self {
        Self {
            overall_score: round2(overall_score(&rubric)),
            weight_total: round2(weight_total(&rubric)),
            rubric,
        }
    }
}

/// Stored rubric entries come either as `{"score": x, "weight": w}` objects or
/// as bare numbers.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StoredDimension {
    Detailed { score: f64 },
    Bare(f64),
}

impl StoredDimension {
    fn score(&self) -> f64 {
        match self {
            StoredDimension::Detailed { score } => *score,
            StoredDimension::Bare(score) => *score,
        }
    }
}

pub fn parse_rubric_breakdown(json: &str) -> Result<BTreeMap<String, f64>, AnalysisError> {
    let stored: BTreeMap<String, StoredDimension> = serde_json::from_str(json)
        .map_err(|err| AnalysisError::MalformedRubric(err.to_string()))?;
    Ok(stored
        .into_iter()
        .map(|(name, dimension)| (name, dimension.score()))
        .collect())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreTrend {
    Improving,
    Declining,
    Stable,
}

/// Identity of the newest record in the window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatestEvaluation {
    pub evaluation_id: i64,
    pub session_id: String,
    pub workflow_type: String,
    pub created_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationTrend {
    pub total_evaluations: usize,
    pub latest_evaluation: LatestEvaluation,
    pub average_score: f64,
    pub highest_score: f64,
    pub lowest_score: f64,
    pub latest_score: f64,
    pub trend: ScoreTrend,
    pub score_range: f64,
    pub latest_rubric_breakdown: BTreeMap<String, f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rubric_error: Option<String>,
}

/// Summarizes a history ordered most recent first. A malformed rubric on the
/// latest record leaves the breakdown empty and sets `rubric_error`.
pub fn score_trend(history: &[EvaluationRecord]) -> Result<EvaluationTrend, AnalysisError> {
    let (Some(latest), Some(oldest)) = (history.first(), history.last()) else {
        return Err(AnalysisError::empty("evaluation_history"));
    };

    let scores: Vec<f64> = history.iter().map(|record| record.score).collect();
    let average_score = crate::stats::mean("evaluation_history", &scores)?;
    let (lowest_score, highest_score) = crate::stats::min_max(&scores)
        .ok_or_else(|| AnalysisError::empty("evaluation_history"))?;

    let trend = if latest.score > oldest.score {
        ScoreTrend::Improving
    } else if latest.score < oldest.score {
        ScoreTrend::Declining
    } else {
        ScoreTrend::Stable
    };

    let (latest_rubric_breakdown, rubric_error) = match parse_rubric_breakdown(&latest.rubric_json)
    {
        Ok(breakdown) => (breakdown, None),
        Err(err) => (BTreeMap::new(), Some(err.to_string())),
    };

    Ok(EvaluationTrend {
        total_evaluations: history.len(),
        latest_evaluation: LatestEvaluation {
            evaluation_id: latest.evaluation_id,
            session_id: latest.session_id.clone(),
            workflow_type: latest.workflow_type.clone(),
            created_at: latest.created_at,
        },
        average_score: round2(average_score),
        highest_score,
        lowest_score,
        latest_score: latest.score,
        trend,
        score_range: round2(highest_score - lowest_score),
        latest_rubric_breakdown,
        rubric_error,
    })
}
