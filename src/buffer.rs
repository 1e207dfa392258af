//! Capture buffer
//!
//! Append-only, capacity-bounded store of normalized events. Owns the
//! pointer-move throttle and the start/end duration pairing policy.

use crate::config::BufferConfig;
use crate::types::{InteractionEvent, InteractionKind};
use std::collections::VecDeque;
use tracing::trace;

/// Result of an append
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// Event stored
    Stored {
        /// A paired start event received a duration
        paired: bool,
        /// Number of oldest events evicted to stay within capacity
        evicted: usize,
    },
    /// Pointer move coalesced into the previous one
    Throttled,
}

/// Bounded FIFO of interaction events in capture order.
///
/// Eviction is plain FIFO: a start event can be evicted before its end arrives,
/// in which case the end is recorded without a duration.
#[derive(Debug, Clone)]
pub struct CaptureBuffer {
    events: VecDeque<InteractionEvent>,
    capacity: usize,
    pointer_move_throttle_ms: u64,
}

impl Default for CaptureBuffer {
    fn default() -> Self {
        Self::new(BufferConfig::default())
    }
}

impl CaptureBuffer {
    pub fn new(config: BufferConfig) -> Self {
        let capacity = config.capacity.max(1);
        Self {
            events: VecDeque::with_capacity(capacity),
            capacity,
            pointer_move_throttle_ms: config.pointer_move_throttle_ms,
        }
    }

    /// Append an event, applying throttle, pairing and capacity policies
    pub fn append(&mut self, event: InteractionEvent) -> AppendOutcome {
        if self.should_throttle(&event) {
            trace!(timestamp = event.timestamp, "pointer move throttled");
            return AppendOutcome::Throttled;
        }

        let paired = match event.kind.paired_start() {
            Some(start_kind) => self.backfill_duration(start_kind, &event),
            None => false,
        };

        self.events.push_back(event);

        let mut evicted = 0;
        while self.events.len() > self.capacity {
            self.events.pop_front();
            evicted += 1;
        }
        if evicted > 0 {
            trace!(evicted, capacity = self.capacity, "capture buffer evicted oldest events");
        }

        AppendOutcome::Stored { paired, evicted }
    }

    fn should_throttle(&self, event: &InteractionEvent) -> bool {
        if event.kind != InteractionKind::PointerMove {
            return false;
        }
        match self.events.back() {
            Some(last) if last.kind == InteractionKind::PointerMove => {
                event.timestamp.saturating_sub(last.timestamp) < self.pointer_move_throttle_ms
            }
            _ => false,
        }
    }

    /// Search backward for the nearest unmatched start on the same target.
    /// A start is matched once it carries a duration.
    fn backfill_duration(&mut self, start_kind: InteractionKind, end: &InteractionEvent) -> bool {
        let start = self.events.iter_mut().rev().find(|candidate| {
            candidate.kind == start_kind
                && candidate.duration_ms.is_none()
                && candidate.target == end.target
        });

        match start {
            Some(start) => {
                start.duration_ms = Some(end.timestamp.saturating_sub(start.timestamp));
                true
            }
            None => false,
        }
    }

    /// Defensive copy of the resident events in capture order
    pub fn snapshot(&self) -> Vec<InteractionEvent> {
        self.events.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Most recently appended event
    pub fn last(&self) -> Option<&InteractionEvent> {
        self.events.back()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn event(id: usize, kind: InteractionKind, timestamp: u64, target: &str) -> InteractionEvent {
        InteractionEvent {
            id: format!("evt-{}", id),
            kind,
            timestamp,
            target: target.to_string(),
            coordinates: None,
            value: None,
            duration_ms: None,
            metadata: BTreeMap::new(),
        }
    }

    #[test]
    fn test_size_tracks_appends_up_to_capacity() {
        let mut buffer = CaptureBuffer::default();
        for i in 0..1_000 {
            buffer.append(event(i, InteractionKind::Click, i as u64, "a"));
        }
        assert_eq!(buffer.len(), 1_000);
    }

    #[test]
    fn test_overflow_keeps_most_recent_in_order() {
        let mut buffer = CaptureBuffer::default();
        let mut evicted_total = 0;
        for i in 0..1_250 {
            if let AppendOutcome::Stored { evicted, .. } =
                buffer.append(event(i, InteractionKind::KeyPress, i as u64, "a"))
            {
                evicted_total += evicted;
            }
        }

        assert_eq!(buffer.len(), 1_000);
        assert_eq!(evicted_total, 250);

        let ids: Vec<String> = buffer.snapshot().into_iter().map(|e| e.id).collect();
        let expected: Vec<String> = (250..1_250).map(|i| format!("evt-{}", i)).collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn test_pointer_move_throttle() {
        let mut buffer = CaptureBuffer::default();
        buffer.append(event(0, InteractionKind::PointerMove, 0, "a"));
        assert_eq!(
            buffer.append(event(1, InteractionKind::PointerMove, 50, "a")),
            AppendOutcome::Throttled
        );
        assert_eq!(buffer.len(), 1);

        let mut buffer = CaptureBuffer::default();
        buffer.append(event(0, InteractionKind::PointerMove, 0, "a"));
        buffer.append(event(1, InteractionKind::PointerMove, 150, "a"));
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn test_throttle_only_against_previous_pointer_move() {
        let mut buffer = CaptureBuffer::default();
        buffer.append(event(0, InteractionKind::PointerMove, 0, "a"));
        buffer.append(event(1, InteractionKind::Click, 10, "a"));
        buffer.append(event(2, InteractionKind::PointerMove, 20, "a"));
        assert_eq!(buffer.len(), 3);

        // Other kinds are never throttled
        buffer.append(event(3, InteractionKind::Click, 20, "a"));
        buffer.append(event(4, InteractionKind::Click, 20, "a"));
        assert_eq!(buffer.len(), 5);
    }

    #[test]
    fn test_hover_pairing_backfills_duration() {
        let mut buffer = CaptureBuffer::default();
        buffer.append(event(0, InteractionKind::HoverStart, 0, "X"));
        let outcome = buffer.append(event(1, InteractionKind::HoverEnd, 250, "X"));

        assert_eq!(outcome, AppendOutcome::Stored { paired: true, evicted: 0 });
        let events = buffer.snapshot();
        assert_eq!(events[0].duration_ms, Some(250));
        assert_eq!(events[1].duration_ms, None);
    }

    #[test]
    fn test_pairing_matches_same_target_only() {
        let mut buffer = CaptureBuffer::default();
        buffer.append(event(0, InteractionKind::FocusStart, 0, "input#a"));
        buffer.append(event(1, InteractionKind::FocusStart, 100, "input#b"));
        buffer.append(event(2, InteractionKind::FocusEnd, 400, "input#a"));

        let events = buffer.snapshot();
        assert_eq!(events[0].duration_ms, Some(400));
        assert_eq!(events[1].duration_ms, None);
    }

    #[test]
    fn test_pairing_uses_nearest_unmatched_start() {
        let mut buffer = CaptureBuffer::default();
        buffer.append(event(0, InteractionKind::HoverStart, 0, "X"));
        buffer.append(event(1, InteractionKind::HoverEnd, 100, "X"));
        buffer.append(event(2, InteractionKind::HoverStart, 300, "X"));
        buffer.append(event(3, InteractionKind::HoverEnd, 360, "X"));

        let events = buffer.snapshot();
        assert_eq!(events[0].duration_ms, Some(100));
        assert_eq!(events[2].duration_ms, Some(60));
    }

    #[test]
    fn test_end_without_start_is_recorded() {
        let mut buffer = CaptureBuffer::default();
        let outcome = buffer.append(event(0, InteractionKind::HoverEnd, 90, "X"));

        assert_eq!(outcome, AppendOutcome::Stored { paired: false, evicted: 0 });
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.snapshot()[0].duration_ms, None);
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let mut buffer = CaptureBuffer::default();
        buffer.append(event(0, InteractionKind::Click, 0, "a"));
        let snapshot = buffer.snapshot();

        buffer.append(event(1, InteractionKind::Click, 1, "a"));
        assert_eq!(snapshot.len(), 1);
        assert_eq!(buffer.len(), 2);
    }
}
