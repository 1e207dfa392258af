//! Error types for Synheart Interaction

use thiserror::Error;

/// Errors that can occur at the engine's fallible boundaries.
///
/// Event capture and snapshot production never fail; these errors surface from
/// configuration, raw event parsing, export, and the host-provided capture and
/// scheduling surfaces.
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("Failed to parse raw events: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Capture surface unavailable: {0}")]
    CaptureUnavailable(String),

    #[error("Capture subscription failed: {0}")]
    Subscription(String),

    #[error("Scheduler error: {0}")]
    Scheduler(String),

    #[error("Export error: {0}")]
    ExportError(String),
}
