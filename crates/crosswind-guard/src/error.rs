//! Error types for the crosswind guard.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GuardError {
    #[error("Invalid wind data: {0}")]
    InvalidWind(String),

    #[error("Wind direction is variable; crosswind cannot be resolved")]
    VariableWind,

    #[error("Runway heading unresolvable from designator '{0}'; supply a heading explicitly")]
    UnresolvableRunway(String),

    #[error("No valid runways provided: none of the candidates has a resolvable heading")]
    NoResolvableRunway,

    #[error("Trace ordering violated: {0}")]
    TraceOrdering(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GuardError {
    /// Stable code for callers that branch on the failure class.
    pub fn code(&self) -> &'static str {
        match self {
            GuardError::InvalidWind(_) => "data.invalid_wind",
            GuardError::VariableWind => "data.variable_wind",
            GuardError::UnresolvableRunway(_) => "data.unresolvable_runway",
            GuardError::NoResolvableRunway => "data.no_resolvable_runway",
            GuardError::TraceOrdering(_) => "audit.trace_ordering",
            GuardError::Config(_) => "config.invalid",
            GuardError::Io(_) => "audit.io",
            GuardError::Json(_) => "audit.json",
        }
    }

    /// Data-resolution failures call for refetching input, not for reflection.
    pub fn is_data_resolution(&self) -> bool {
        matches!(
            self,
            GuardError::InvalidWind(_)
                | GuardError::VariableWind
                | GuardError::UnresolvableRunway(_)
                | GuardError::NoResolvableRunway
        )
    }
}
