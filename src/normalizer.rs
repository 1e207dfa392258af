//! Raw interaction normalization
//!
//! Converts platform notifications into uniform `InteractionEvent` records.
//! Normalization is total: unrecognized shapes become pointer moves with empty
//! metadata instead of failing.

use crate::clock::Clock;
use crate::locator::TargetLocator;
use crate::schema::RawEvent;
use crate::types::{Coordinates, InteractionEvent, InteractionKind};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Normalizer for raw interaction events
pub struct EventNormalizer<'a> {
    clock: &'a dyn Clock,
    locator: &'a dyn TargetLocator,
}

impl<'a> EventNormalizer<'a> {
    pub fn new(clock: &'a dyn Clock, locator: &'a dyn TargetLocator) -> Self {
        Self { clock, locator }
    }

    /// Normalize a raw event, stamping it with the current monotonic time
    pub fn normalize(&self, raw: &RawEvent) -> InteractionEvent {
        let timestamp = self.clock.now_ms();
        let target = self.locator.locate(raw.target.as_ref());

        let Some(kind) = raw.kind() else {
            return InteractionEvent {
                id: Uuid::new_v4().to_string(),
                kind: InteractionKind::PointerMove,
                timestamp,
                target,
                coordinates: None,
                value: None,
                duration_ms: None,
                metadata: BTreeMap::new(),
            };
        };

        let coordinates = if kind.is_pointer_origin() {
            raw.coordinates().map(|(x, y)| Coordinates::new(x, y))
        } else {
            None
        };

        let value = match kind {
            InteractionKind::KeyPress => raw.key.clone(),
            _ => None,
        };

        InteractionEvent {
            id: Uuid::new_v4().to_string(),
            kind,
            timestamp,
            target,
            coordinates,
            value,
            duration_ms: None,
            metadata: build_metadata(kind, raw),
        }
    }

    /// Normalize an untyped JSON notification
    pub fn normalize_value(&self, value: Value) -> InteractionEvent {
        self.normalize(&RawEvent::from_value_lenient(value))
    }
}

/// Collect kind-specific context into the metadata bag
fn build_metadata(kind: InteractionKind, raw: &RawEvent) -> BTreeMap<String, Value> {
    let mut metadata = BTreeMap::new();

    if let Some(viewport) = raw.viewport {
        insert_number(&mut metadata, "viewportWidth", viewport.width);
        insert_number(&mut metadata, "viewportHeight", viewport.height);
    }

    if kind == InteractionKind::Scroll {
        if let Some(scroll) = raw.scroll {
            insert_number(&mut metadata, "scrollX", scroll.x);
            insert_number(&mut metadata, "scrollY", scroll.y);
            if let Some(height) = scroll.scroll_height {
                insert_number(&mut metadata, "scrollHeight", height);
            }
        }
    }

    if matches!(kind, InteractionKind::Click | InteractionKind::KeyPress) {
        if let Some(modifiers) = raw.modifiers.filter(|m| m.any()) {
            metadata.insert("altKey".to_string(), Value::Bool(modifiers.alt));
            metadata.insert("ctrlKey".to_string(), Value::Bool(modifiers.ctrl));
            metadata.insert("shiftKey".to_string(), Value::Bool(modifiers.shift));
            metadata.insert("metaKey".to_string(), Value::Bool(modifiers.meta));
        }
    }

    metadata.insert(
        "sourceType".to_string(),
        Value::String(raw.event_type.to_ascii_lowercase()),
    );

    metadata
}

fn insert_number(metadata: &mut BTreeMap<String, Value>, key: &str, value: f64) {
    if let Some(number) = serde_json::Number::from_f64(value) {
        metadata.insert(key.to_string(), Value::Number(number));
    }
}
