use crate::parsers::sexpr::Anomaly;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("expected root tag '{expected}', found '{actual}'")]
    Format { expected: String, actual: String },

    #[error("malformed S-expression: {}", describe(.0))]
    Malformed(Vec<Anomaly>),

    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn describe(anomalies: &[Anomaly]) -> String {
    anomalies
        .iter()
        .map(|a| a.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
