use thiserror::Error;

/// Failures raised by the analysis stages.
///
/// Only `EmptyInput` and `InsufficientData` stop a stage. The other two are
/// reported so callers can degrade (zero-valued comparison, empty rubric
/// breakdown) and keep going.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    #[error("{series} series is empty")]
    EmptyInput { series: String },

    #[error("{series} series has {found} data point(s), at least {required} required")]
    InsufficientData {
        series: String,
        found: usize,
        required: usize,
    },

    #[error("no peer benchmark for locality {locality:?} and cuisine {cuisine:?}")]
    MissingReferenceData { locality: String, cuisine: String },

    #[error("malformed rubric: {0}")]
    MalformedRubric(String),
}

impl AnalysisError {
    pub fn empty(series: &str) -> Self {
        AnalysisError::EmptyInput {
            series: series.to_string(),
        }
    }

    pub fn insufficient(series: &str, found: usize, required: usize) -> Self {
        AnalysisError::InsufficientData {
            series: series.to_string(),
            found,
            required,
        }
    }
}
