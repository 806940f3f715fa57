//! Synthesis error types.
//!
//! Every failure the pipeline can end in has a named variant. All of them are
//! terminal for the current request.

use std::time::Duration;
use thiserror::Error;

/// A failure that moved a synthesis run into its `Failed` state.
#[derive(Debug, Error)]
pub enum SynthesisError {
    /// A data reference lies outside the allow-listed storage root.
    #[error("Invalid data path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    /// The remote object could not be fetched.
    #[error("Data unavailable at '{path}': {reason}")]
    DataUnavailable { path: String, reason: String },

    /// The remote object was fetched but could not be parsed.
    #[error("Malformed data at '{path}': {reason}")]
    DataFormat { path: String, reason: String },

    /// A requested field does not exist in the dataset.
    #[error("Analysis failed: {0}")]
    Analysis(String),

    /// Every value of the aggregated field was excluded.
    #[error("Nothing to aggregate: field '{field}' has no numeric values{}", group_suffix(.group))]
    EmptyAggregation {
        field: String,
        group: Option<String>,
    },

    /// The assembled document failed its own schema.
    #[error("Assembled layout violates the schema: {}", .0.join("; "))]
    SchemaViolation(Vec<String>),

    /// The request-level deadline elapsed.
    #[error("Synthesis timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// The decision capability kept calling tools past its budget.
    #[error("Decision budget of {0} tool rounds exceeded")]
    DecisionBudgetExceeded(usize),

    /// The decision capability itself could not be reached or understood.
    #[error("Decision engine error: {0}")]
    Decision(String),
}

fn group_suffix(group: &Option<String>) -> String {
    match group {
        Some(g) => format!(" in group '{}'", g),
        None => String::new(),
    }
}

impl SynthesisError {
    /// Stable machine-readable code for the calling boundary.
    pub fn kind(&self) -> &'static str {
        match self {
            SynthesisError::InvalidPath { .. } => "invalid_path",
            SynthesisError::DataUnavailable { .. } => "data_unavailable",
            SynthesisError::DataFormat { .. } => "data_format_error",
            SynthesisError::Analysis(_) => "analysis_error",
            SynthesisError::EmptyAggregation { .. } => "empty_aggregation",
            SynthesisError::SchemaViolation(_) => "schema_violation",
            SynthesisError::Timeout(_) => "timeout",
            SynthesisError::DecisionBudgetExceeded(_) => "decision_budget_exceeded",
            SynthesisError::Decision(_) => "decision_error",
        }
    }

    /// Process exit code used by the CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            SynthesisError::InvalidPath { .. } => 2,
            SynthesisError::DataUnavailable { .. }
            | SynthesisError::DataFormat { .. }
            | SynthesisError::Analysis(_)
            | SynthesisError::EmptyAggregation { .. } => 3,
            _ => 1,
        }
    }
}

/// Result type alias for synthesis operations.
pub type SynthesisResult<T> = Result<T, SynthesisError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_codes() {
        let err = SynthesisError::InvalidPath {
            path: "s3://other/x.csv".to_string(),
            reason: "bucket not allowed".to_string(),
        };
        assert_eq!(err.kind(), "invalid_path");
        assert_eq!(err.exit_code(), 2);

        let err = SynthesisError::DecisionBudgetExceeded(12);
        assert_eq!(err.kind(), "decision_budget_exceeded");
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_empty_aggregation_message() {
        let err = SynthesisError::EmptyAggregation {
            field: "sales".to_string(),
            group: Some("A".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "Nothing to aggregate: field 'sales' has no numeric values in group 'A'"
        );
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn test_schema_violation_joins_details() {
        let err = SynthesisError::SchemaViolation(vec!["a".to_string(), "b".to_string()]);
        assert!(err.to_string().ends_with("a; b"));
    }
}
