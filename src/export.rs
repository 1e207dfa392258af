//! Session export
//!
//! Wraps a snapshot with wall-clock export time, session duration and producer
//! metadata for offline analysis.

use crate::error::TelemetryError;
use crate::types::ParticipantBehavior;
use crate::{PRODUCER_NAME, TELEMETRY_VERSION};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Producer metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// Serialized form of a session snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    #[serde(flatten)]
    pub behavior: ParticipantBehavior,
    /// RFC 3339 wall-clock time of export
    pub exported_at: String,
    pub session_duration_ms: u64,
    pub producer: ExportProducer,
}

/// Builds export documents for one engine instance
#[derive(Debug, Clone)]
pub struct SessionExporter {
    instance_id: String,
}

impl Default for SessionExporter {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionExporter {
    /// Create an exporter with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn with_instance_id(instance_id: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
        }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn export(&self, behavior: ParticipantBehavior, session_duration_ms: u64) -> ExportDocument {
        self.export_at(behavior, session_duration_ms, Utc::now())
    }

    pub fn export_at(
        &self,
        behavior: ParticipantBehavior,
        session_duration_ms: u64,
        exported_at: DateTime<Utc>,
    ) -> ExportDocument {
        ExportDocument {
            behavior,
            exported_at: exported_at.to_rfc3339(),
            session_duration_ms,
            producer: ExportProducer {
                name: PRODUCER_NAME.to_string(),
                version: TELEMETRY_VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
        }
    }
}

impl ExportDocument {
    pub fn to_json(&self) -> Result<String, TelemetryError> {
        serde_json::to_string_pretty(self).map_err(|e| TelemetryError::ExportError(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self, TelemetryError> {
        serde_json::from_str(json).map_err(|e| TelemetryError::ExportError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AnalyticsMetrics, Heatmaps, InteractionEvent, InteractionKind};
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    fn behavior() -> ParticipantBehavior {
        ParticipantBehavior {
            session_id: "session-7".to_string(),
            participant_id: "participant-3".to_string(),
            start_time: 1_000,
            events: vec![InteractionEvent {
                id: "evt-1".to_string(),
                kind: InteractionKind::Click,
                timestamp: 1_500,
                target: "button#next".to_string(),
                coordinates: None,
                value: None,
                duration_ms: None,
                metadata: BTreeMap::new(),
            }],
            metrics: AnalyticsMetrics {
                total_interactions: 1,
                ..Default::default()
            },
            heatmaps: Heatmaps::default(),
            patterns: vec![],
        }
    }

    #[test]
    fn test_export_document_shape() {
        let exporter = SessionExporter::with_instance_id("test-instance");
        let exported_at = Utc.with_ymd_and_hms(2026, 3, 2, 14, 30, 0).unwrap();
        let document = exporter.export_at(behavior(), 42_000, exported_at);

        let value: serde_json::Value = serde_json::from_str(&document.to_json().unwrap()).unwrap();
        assert_eq!(value["sessionId"], "session-7");
        assert_eq!(value["participantId"], "participant-3");
        assert_eq!(value["events"][0]["target"], "button#next");
        assert_eq!(value["metrics"]["totalInteractions"], 1);
        assert_eq!(value["exportedAt"], "2026-03-02T14:30:00+00:00");
        assert_eq!(value["sessionDurationMs"], 42_000);
        assert_eq!(value["producer"]["name"], PRODUCER_NAME);
        assert_eq!(value["producer"]["instanceId"], "test-instance");
    }

    #[test]
    fn test_export_document_reads_back() {
        let document = SessionExporter::new().export(behavior(), 10);
        let parsed = ExportDocument::from_json(&document.to_json().unwrap()).unwrap();
        assert_eq!(parsed, document);
    }

    #[test]
    fn test_malformed_export_rejected() {
        assert!(matches!(
            ExportDocument::from_json("{\"sessionId\": 3}"),
            Err(TelemetryError::ExportError(_))
        ));
    }
}
