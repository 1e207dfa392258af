//! ui.raw_interaction.v1 schema definition
//!
//! A platform-neutral description of one interaction notification as the host
//! surface reports it, before normalization:
//! - the platform event type name (`click`, `mousemove`, `focusin`, ...)
//! - pointer position, key, scroll and viewport state
//! - the interacted element's ancestor chain for target location

use crate::capture::CaptureKind;
use crate::types::InteractionKind;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Current schema version
pub const SCHEMA_VERSION: &str = "ui.raw_interaction.v1";

/// One node of the interacted element's ancestor chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementDescriptor {
    /// Lowercase tag name (`div`, `button`, ...)
    pub tag: String,
    /// Element id attribute, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Class list in document order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub classes: Vec<String>,
    /// 1-based position among the parent's children
    #[serde(default = "default_child_index")]
    pub child_index: u32,
    /// Whether any sibling shares this element's tag
    #[serde(default)]
    pub same_tag_siblings: bool,
}

fn default_child_index() -> u32 {
    1
}

impl ElementDescriptor {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            id: None,
            classes: Vec::new(),
            child_index: 1,
            same_tag_siblings: false,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_classes<I, S>(mut self, classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.classes = classes.into_iter().map(Into::into).collect();
        self
    }

    pub fn nth_of_shared(mut self, child_index: u32) -> Self {
        self.child_index = child_index;
        self.same_tag_siblings = true;
        self
    }
}

/// The interacted element, innermost node first
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTarget {
    /// Element is no longer attached to the document
    #[serde(default)]
    pub detached: bool,
    /// Ancestor chain from the element outward
    #[serde(default)]
    pub path: Vec<ElementDescriptor>,
}

impl RawTarget {
    pub fn new(path: Vec<ElementDescriptor>) -> Self {
        Self {
            detached: false,
            path,
        }
    }
}

/// Document scroll state at the time of the event
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScrollState {
    /// Horizontal scroll offset
    #[serde(default)]
    pub x: f64,
    /// Vertical scroll offset
    #[serde(default)]
    pub y: f64,
    /// Total scrollable document height
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scroll_height: Option<f64>,
}

/// Viewport size in logical pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

/// Modifier keys held during the event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modifiers {
    #[serde(default)]
    pub alt: bool,
    #[serde(default)]
    pub ctrl: bool,
    #[serde(default)]
    pub shift: bool,
    #[serde(default)]
    pub meta: bool,
}

impl Modifiers {
    pub fn any(&self) -> bool {
        self.alt || self.ctrl || self.shift || self.meta
    }
}

/// A raw interaction notification from the host surface
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    /// Platform event type name
    #[serde(default)]
    pub event_type: String,
    /// Offset from the start of a recording (replay input only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_y: Option<f64>,
    /// Key name for keyboard events
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<RawTarget>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scroll: Option<ScrollState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewport: Option<Viewport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modifiers: Option<Modifiers>,
}

impl RawEvent {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            ..Default::default()
        }
    }

    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.client_x = Some(x);
        self.client_y = Some(y);
        self
    }

    pub fn on(mut self, target: RawTarget) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_scroll(mut self, scroll: ScrollState) -> Self {
        self.scroll = Some(scroll);
        self
    }

    pub fn with_viewport(mut self, width: f64, height: f64) -> Self {
        self.viewport = Some(Viewport { width, height });
        self
    }

    /// Interpret an arbitrary JSON value, falling back to an unrecognized event
    /// when the shape does not match.
    pub fn from_value_lenient(value: serde_json::Value) -> Self {
        serde_json::from_value(value).unwrap_or_default()
    }

    /// Interaction kind for the platform event type, if recognized
    pub fn kind(&self) -> Option<InteractionKind> {
        CaptureKind::for_event_type(&self.event_type).map(CaptureKind::interaction_kind)
    }

    /// Pointer position when both axes are present and finite
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.client_x, self.client_y) {
            (Some(x), Some(y)) if x.is_finite() && y.is_finite() => Some((x, y)),
            _ => None,
        }
    }

    /// Validate the event against the schema
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.event_type.trim().is_empty() {
            return Err(ValidationError::MissingEventType);
        }

        if self.kind().is_none() {
            return Err(ValidationError::UnknownEventType(self.event_type.clone()));
        }

        let non_finite = |v: Option<f64>| v.map(|v| !v.is_finite()).unwrap_or(false);
        if non_finite(self.client_x) || non_finite(self.client_y) {
            return Err(ValidationError::NonFiniteCoordinates);
        }

        if let Some(target) = &self.target {
            if let Some(idx) = target.path.iter().position(|n| n.tag.trim().is_empty()) {
                return Err(ValidationError::EmptyTag { depth: idx });
            }
        }

        Ok(())
    }
}

/// Raw event validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Missing event type")]
    MissingEventType,

    #[error("Unknown event type: {0}")]
    UnknownEventType(String),

    #[error("Pointer coordinates must be finite")]
    NonFiniteCoordinates,

    #[error("Target path node at depth {depth} has an empty tag")]
    EmptyTag { depth: usize },

    #[error("Missing at_ms replay offset")]
    MissingOffset,

    #[error("Replay offset {at_ms} ms precedes previous offset {previous_ms} ms")]
    OutOfOrder { at_ms: u64, previous_ms: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_click_event() {
        let json = r#"{
            "event_type": "click",
            "at_ms": 1200,
            "client_x": 120.5,
            "client_y": 40.0,
            "target": {
                "path": [
                    { "tag": "button", "classes": ["primary"] },
                    { "tag": "div", "id": "question-3" }
                ]
            }
        }"#;

        let event: RawEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.kind(), Some(InteractionKind::Click));
        assert_eq!(event.at_ms, Some(1200));
        assert_eq!(event.coordinates(), Some((120.5, 40.0)));

        let target = event.target.unwrap();
        assert_eq!(target.path.len(), 2);
        assert_eq!(target.path[0].child_index, 1);
        assert_eq!(target.path[1].id.as_deref(), Some("question-3"));
    }

    #[test]
    fn test_platform_type_mapping() {
        assert_eq!(
            RawEvent::new("pointerenter").kind(),
            Some(InteractionKind::HoverStart)
        );
        assert_eq!(RawEvent::new("blur").kind(), Some(InteractionKind::FocusEnd));
        assert_eq!(
            RawEvent::new("KeyDown").kind(),
            Some(InteractionKind::KeyPress)
        );
        assert_eq!(RawEvent::new("resize").kind(), None);
    }

    #[test]
    fn test_lenient_parse_falls_back() {
        let event = RawEvent::from_value_lenient(serde_json::json!({ "event_type": 7 }));
        assert_eq!(event, RawEvent::default());
        assert_eq!(event.kind(), None);
    }

    #[test]
    fn test_validate() {
        assert!(RawEvent::new("click").at(1.0, 2.0).validate().is_ok());
        assert_eq!(
            RawEvent::new("").validate(),
            Err(ValidationError::MissingEventType)
        );
        assert_eq!(
            RawEvent::new("resize").validate(),
            Err(ValidationError::UnknownEventType("resize".to_string()))
        );
        assert_eq!(
            RawEvent::new("click").at(f64::NAN, 2.0).validate(),
            Err(ValidationError::NonFiniteCoordinates)
        );

        let bad_target = RawTarget::new(vec![ElementDescriptor::new("span"), ElementDescriptor::new(" ")]);
        assert_eq!(
            RawEvent::new("click").on(bad_target).validate(),
            Err(ValidationError::EmptyTag { depth: 1 })
        );
    }
}
