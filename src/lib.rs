//! Synheart Interaction - On-device interaction telemetry for study participants
//!
//! Captures UI interactions while a participant takes part in a study session
//! and turns them into periodic behavior snapshots: capture hooks →
//! normalization → bounded buffer → metrics, heatmaps and pattern detection.
//!
//! ## Modules
//!
//! - **Session**: lifecycle, capture subscriptions and the snapshot timer
//! - **Analysis**: metrics, spatial heatmaps and behavior patterns over a buffer snapshot
//! - **Schema**: raw interaction input format for hooks and recorded sessions

pub mod buffer;
pub mod capture;
pub mod clock;
pub mod config;
pub mod error;
pub mod export;
pub mod heatmap;
pub mod locator;
pub mod metrics;
pub mod normalizer;
pub mod patterns;
pub mod scheduler;
pub mod schema;
pub mod session;
pub mod types;

pub use capture::{CaptureKind, CaptureSource, InMemoryCaptureSource};
pub use config::TelemetryConfig;
pub use error::TelemetryError;
pub use export::{ExportDocument, SessionExporter};
pub use session::{create_session, SessionBuilder, SnapshotObserver, TelemetrySession};
pub use types::{
    AnalyticsMetrics, BehaviorPattern, HeatmapCell, InteractionEvent, InteractionKind,
    ParticipantBehavior, PatternKind, SessionState,
};

// Schema exports
pub use schema::{RawEvent, RawEventReader, SCHEMA_VERSION};

/// Engine version embedded in exports
pub const TELEMETRY_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for exports
pub const PRODUCER_NAME: &str = "synheart-interaction";
