//! Interaction telemetry data types
//!
//! These types are the engine's only externally observable representation and
//! double as the export format, so field names are serialized in camelCase.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Monotonic capture time in milliseconds
pub type MonotonicMs = u64;

/// Normalized interaction kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    Click,
    Scroll,
    HoverStart,
    HoverEnd,
    FocusStart,
    FocusEnd,
    KeyPress,
    PointerMove,
}

impl InteractionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionKind::Click => "click",
            InteractionKind::Scroll => "scroll",
            InteractionKind::HoverStart => "hover_start",
            InteractionKind::HoverEnd => "hover_end",
            InteractionKind::FocusStart => "focus_start",
            InteractionKind::FocusEnd => "focus_end",
            InteractionKind::KeyPress => "key_press",
            InteractionKind::PointerMove => "pointer_move",
        }
    }

    /// Whether events of this kind originate from the pointer and carry coordinates
    pub fn is_pointer_origin(&self) -> bool {
        matches!(
            self,
            InteractionKind::Click
                | InteractionKind::PointerMove
                | InteractionKind::HoverStart
                | InteractionKind::HoverEnd
        )
    }

    /// For end kinds, the start kind they close
    pub fn paired_start(&self) -> Option<InteractionKind> {
        match self {
            InteractionKind::HoverEnd => Some(InteractionKind::HoverStart),
            InteractionKind::FocusEnd => Some(InteractionKind::FocusStart),
            _ => None,
        }
    }

    /// For start kinds, the end kind that closes them
    pub fn paired_end(&self) -> Option<InteractionKind> {
        match self {
            InteractionKind::HoverStart => Some(InteractionKind::HoverEnd),
            InteractionKind::FocusStart => Some(InteractionKind::FocusEnd),
            _ => None,
        }
    }
}

/// Viewport-relative pointer position in logical pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub x: f64,
    pub y: f64,
}

impl Coordinates {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Coordinates) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// One captured, normalized interaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionEvent {
    /// Unique opaque identifier
    pub id: String,
    /// Interaction kind
    pub kind: InteractionKind,
    /// Monotonic capture time (ms)
    pub timestamp: MonotonicMs,
    /// Element path from the target locator (never empty)
    pub target: String,
    /// Pointer position, present for pointer-origin kinds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
    /// Kind-specific payload such as the key pressed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Backfilled on start events once the matching end event is recorded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    /// Open context bag (viewport size, scroll offsets, modifier keys).
    /// Never used for identity or aggregation keys.
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl InteractionEvent {
    /// Numeric metadata lookup
    pub fn metadata_f64(&self, key: &str) -> Option<f64> {
        self.metadata
            .get(key)
            .and_then(|v| v.as_f64())
            .filter(|v| v.is_finite())
    }
}

/// Session-level metrics derived from the buffer on demand
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsMetrics {
    pub total_interactions: u32,
    pub average_time_per_block_ms: f64,
    /// 0-1, supplied by the study signals provider
    pub completion_rate: f64,
    /// 0-100
    pub engagement_score: f64,
    pub attention_span_seconds: f64,
    /// 0-1, supplied by the study signals provider
    pub error_rate: f64,
    /// 0-100
    pub scroll_depth_percent: f64,
    /// 0-1, supplied by the study signals provider
    pub click_accuracy: f64,
}

/// One non-empty heatmap grid bucket
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeatmapCell {
    /// Left edge of the bucket
    pub x: i64,
    /// Top edge of the bucket
    pub y: i64,
    /// Raw event count in the bucket
    pub count: u32,
    /// Count normalized into [0, 1]
    pub intensity: f64,
}

/// Heatmaps keyed by interaction family
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Heatmaps {
    pub clicks: Vec<HeatmapCell>,
    pub hovers: Vec<HeatmapCell>,
}

/// Detected behavior pattern kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    RapidInteraction,
    IdleTimeout,
    ExcessiveScrolling,
    Confusion,
    Focused,
}

/// A heuristically detected behavior pattern
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BehaviorPattern {
    pub kind: PatternKind,
    /// Confidence in [0, 1]
    pub confidence: f64,
    /// Monotonic time of detection (ms)
    pub detected_at: MonotonicMs,
    pub description: String,
    pub suggestions: Vec<String>,
}

/// Point-in-time session snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantBehavior {
    pub session_id: String,
    pub participant_id: String,
    /// Monotonic session start time (ms)
    pub start_time: MonotonicMs,
    /// Copy of the capture buffer at snapshot time
    pub events: Vec<InteractionEvent>,
    pub metrics: AnalyticsMetrics,
    pub heatmaps: Heatmaps,
    pub patterns: Vec<BehaviorPattern>,
}

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Tracking,
    Stopped,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interaction_kind_serialization() {
        let json = serde_json::to_string(&InteractionKind::HoverStart).unwrap();
        assert_eq!(json, "\"hover_start\"");

        let parsed: InteractionKind = serde_json::from_str("\"pointer_move\"").unwrap();
        assert_eq!(parsed, InteractionKind::PointerMove);
    }

    #[test]
    fn test_pairing_kinds() {
        assert_eq!(
            InteractionKind::HoverEnd.paired_start(),
            Some(InteractionKind::HoverStart)
        );
        assert_eq!(
            InteractionKind::FocusStart.paired_end(),
            Some(InteractionKind::FocusEnd)
        );
        assert_eq!(InteractionKind::Click.paired_start(), None);
    }

    #[test]
    fn test_event_field_names() {
        let event = InteractionEvent {
            id: "evt-1".to_string(),
            kind: InteractionKind::FocusStart,
            timestamp: 42,
            target: "input#email".to_string(),
            coordinates: None,
            value: None,
            duration_ms: Some(1500),
            metadata: BTreeMap::new(),
        };

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["kind"], "focus_start");
        assert_eq!(value["durationMs"], 1500);
        assert!(value.get("coordinates").is_none());
    }

    #[test]
    fn test_behavior_field_names() {
        let behavior = ParticipantBehavior {
            session_id: "s-1".to_string(),
            participant_id: "p-1".to_string(),
            start_time: 0,
            events: vec![],
            metrics: AnalyticsMetrics::default(),
            heatmaps: Heatmaps::default(),
            patterns: vec![],
        };

        let value = serde_json::to_value(&behavior).unwrap();
        assert_eq!(value["sessionId"], "s-1");
        assert_eq!(value["participantId"], "p-1");
        assert!(value["heatmaps"]["clicks"].is_array());
        assert!(value["heatmaps"]["hovers"].is_array());
        assert_eq!(value["metrics"]["totalInteractions"], 0);
        assert_eq!(value["metrics"]["scrollDepthPercent"], 0.0);
    }
}
