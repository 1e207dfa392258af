//! Behavior pattern detection
//!
//! Stateless heuristics evaluated against a buffer snapshot. Detectors are
//! independent and may co-fire; nothing is deduplicated across snapshots, so a
//! persisting condition is reported again on every snapshot.

use crate::config::PatternConfig;
use crate::types::{BehaviorPattern, InteractionEvent, InteractionKind, MonotonicMs, PatternKind};
use std::collections::HashMap;

/// A single behavior heuristic
pub trait PatternDetector {
    fn detect(&self, events: &[InteractionEvent], now: MonotonicMs) -> Vec<BehaviorPattern>;
}

fn count_in_window(
    events: &[InteractionEvent],
    kind: InteractionKind,
    now: MonotonicMs,
    window_ms: u64,
) -> u32 {
    let window_start = now.saturating_sub(window_ms);
    events
        .iter()
        .filter(|e| e.kind == kind && e.timestamp >= window_start && e.timestamp <= now)
        .count() as u32
}

fn suggestions(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Many clicks in a short trailing window
#[derive(Debug, Clone)]
pub struct RapidInteractionDetector {
    pub window_ms: u64,
    pub threshold: u32,
    pub saturation: u32,
}

impl RapidInteractionDetector {
    pub fn new(config: &PatternConfig) -> Self {
        Self {
            window_ms: config.rapid_click_window_ms,
            threshold: config.rapid_click_threshold,
            saturation: config.rapid_click_saturation.max(1),
        }
    }
}

impl PatternDetector for RapidInteractionDetector {
    fn detect(&self, events: &[InteractionEvent], now: MonotonicMs) -> Vec<BehaviorPattern> {
        let clicks = count_in_window(events, InteractionKind::Click, now, self.window_ms);
        if clicks <= self.threshold {
            return Vec::new();
        }

        vec![BehaviorPattern {
            kind: PatternKind::RapidInteraction,
            confidence: (clicks as f64 / self.saturation as f64).min(1.0),
            detected_at: now,
            description: format!(
                "{} clicks within the last {} seconds",
                clicks,
                self.window_ms / 1000
            ),
            suggestions: suggestions(&[
                "Check whether the participant is frustrated by an unresponsive control",
                "Consider adding visual feedback after each click",
            ]),
        }]
    }
}

/// No interaction for longer than the idle timeout
#[derive(Debug, Clone)]
pub struct IdleTimeoutDetector {
    pub timeout_ms: u64,
    pub confidence: f64,
}

impl IdleTimeoutDetector {
    pub fn new(config: &PatternConfig) -> Self {
        Self {
            timeout_ms: config.idle_timeout_ms,
            confidence: config.idle_confidence.clamp(0.0, 1.0),
        }
    }
}

impl PatternDetector for IdleTimeoutDetector {
    fn detect(&self, events: &[InteractionEvent], now: MonotonicMs) -> Vec<BehaviorPattern> {
        let Some(last) = events.last() else {
            return Vec::new();
        };
        let idle_ms = now.saturating_sub(last.timestamp);
        if idle_ms <= self.timeout_ms {
            return Vec::new();
        }

        vec![BehaviorPattern {
            kind: PatternKind::IdleTimeout,
            confidence: self.confidence,
            detected_at: now,
            description: format!("No interaction for {} seconds", idle_ms / 1000),
            suggestions: suggestions(&[
                "Check whether the participant left the study",
                "Consider a gentle prompt to resume the current task",
            ]),
        }]
    }
}

/// Sustained scrolling in a short trailing window
#[derive(Debug, Clone)]
pub struct ExcessiveScrollingDetector {
    pub window_ms: u64,
    pub threshold: u32,
    pub saturation: u32,
}

impl ExcessiveScrollingDetector {
    pub fn new(config: &PatternConfig) -> Self {
        Self {
            window_ms: config.scroll_window_ms,
            threshold: config.scroll_threshold,
            saturation: config.scroll_saturation.max(1),
        }
    }
}

impl PatternDetector for ExcessiveScrollingDetector {
    fn detect(&self, events: &[InteractionEvent], now: MonotonicMs) -> Vec<BehaviorPattern> {
        let scrolls = count_in_window(events, InteractionKind::Scroll, now, self.window_ms);
        if scrolls <= self.threshold {
            return Vec::new();
        }

        vec![BehaviorPattern {
            kind: PatternKind::ExcessiveScrolling,
            confidence: (scrolls as f64 / self.saturation as f64).min(1.0),
            detected_at: now,
            description: format!(
                "{} scroll events within the last {} seconds",
                scrolls,
                self.window_ms / 1000
            ),
            suggestions: suggestions(&[
                "The participant may be searching for content; review the page layout",
                "Consider splitting long content into shorter sections",
            ]),
        }]
    }
}

/// Repeated clicks on the same spot of one target ("rage clicks")
#[derive(Debug, Clone)]
pub struct ConfusionDetector {
    pub window_ms: u64,
    pub min_clicks: u32,
    pub radius_px: f64,
}

impl ConfusionDetector {
    pub fn new(config: &PatternConfig) -> Self {
        Self {
            window_ms: config.confusion_window_ms,
            min_clicks: config.confusion_min_clicks.max(2),
            radius_px: config.confusion_radius_px,
        }
    }

    /// Largest click burst on `clicks`, all within the window and radius of its first click
    fn largest_burst(&self, clicks: &[&InteractionEvent]) -> u32 {
        let mut best = 0;
        for (i, first) in clicks.iter().enumerate() {
            let burst = clicks[i..]
                .iter()
                .take_while(|c| c.timestamp.saturating_sub(first.timestamp) <= self.window_ms)
                .filter(|c| match (first.coordinates, c.coordinates) {
                    (Some(a), Some(b)) => a.distance_to(&b) <= self.radius_px,
                    (None, None) => true,
                    _ => false,
                })
                .count() as u32;
            best = best.max(burst);
        }
        best
    }
}

impl PatternDetector for ConfusionDetector {
    fn detect(&self, events: &[InteractionEvent], now: MonotonicMs) -> Vec<BehaviorPattern> {
        let mut by_target: HashMap<&str, Vec<&InteractionEvent>> = HashMap::new();
        for event in events.iter().filter(|e| e.kind == InteractionKind::Click) {
            by_target.entry(event.target.as_str()).or_default().push(event);
        }

        let worst = by_target
            .iter()
            .map(|(target, clicks)| (*target, self.largest_burst(clicks)))
            .filter(|(_, burst)| *burst >= self.min_clicks)
            .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(a.0)));

        let Some((target, burst)) = worst else {
            return Vec::new();
        };

        vec![BehaviorPattern {
            kind: PatternKind::Confusion,
            confidence: (burst as f64 / (self.min_clicks as f64 * 2.0)).min(1.0),
            detected_at: now,
            description: format!("{} repeated clicks on {}", burst, target),
            suggestions: suggestions(&[
                "The element may look interactive but not respond; verify its behavior",
                "Consider clarifying the instructions for this step",
            ]),
        }]
    }
}

/// A long, recently completed focus on a single element
#[derive(Debug, Clone)]
pub struct FocusedDetector {
    pub min_duration_ms: u64,
    pub lookback_ms: u64,
}

impl FocusedDetector {
    pub fn new(config: &PatternConfig) -> Self {
        Self {
            min_duration_ms: config.focused_min_duration_ms,
            lookback_ms: config.focused_lookback_ms,
        }
    }
}

impl PatternDetector for FocusedDetector {
    fn detect(&self, events: &[InteractionEvent], now: MonotonicMs) -> Vec<BehaviorPattern> {
        let window_start = now.saturating_sub(self.lookback_ms);

        let longest = events
            .iter()
            .filter(|e| e.kind == InteractionKind::FocusStart)
            .filter_map(|e| e.duration_ms.map(|d| (e, d)))
            .filter(|(e, d)| *d >= self.min_duration_ms && e.timestamp.saturating_add(*d) >= window_start)
            .max_by_key(|(_, d)| *d);

        let Some((event, duration)) = longest else {
            return Vec::new();
        };

        let confidence = (duration as f64 / (self.min_duration_ms.max(1) as f64 * 2.0)).min(1.0);
        vec![BehaviorPattern {
            kind: PatternKind::Focused,
            confidence,
            detected_at: now,
            description: format!(
                "Sustained focus on {} for {} seconds",
                event.target,
                duration / 1000
            ),
            suggestions: suggestions(&["Avoid interrupting the participant during focused work"]),
        }]
    }
}

/// Runs a set of detectors over one snapshot
pub struct PatternEngine {
    detectors: Vec<Box<dyn PatternDetector>>,
}

impl Default for PatternEngine {
    fn default() -> Self {
        Self::new(&PatternConfig::default())
    }
}

impl PatternEngine {
    /// All built-in detectors
    pub fn new(config: &PatternConfig) -> Self {
        Self {
            detectors: vec![
                Box::new(RapidInteractionDetector::new(config)),
                Box::new(IdleTimeoutDetector::new(config)),
                Box::new(ExcessiveScrollingDetector::new(config)),
                Box::new(ConfusionDetector::new(config)),
                Box::new(FocusedDetector::new(config)),
            ],
        }
    }

    /// Only the rapid interaction and idle timeout detectors
    pub fn core(config: &PatternConfig) -> Self {
        Self {
            detectors: vec![
                Box::new(RapidInteractionDetector::new(config)),
                Box::new(IdleTimeoutDetector::new(config)),
            ],
        }
    }

    pub fn with_detectors(detectors: Vec<Box<dyn PatternDetector>>) -> Self {
        Self { detectors }
    }

    pub fn push(&mut self, detector: Box<dyn PatternDetector>) {
        self.detectors.push(detector);
    }

    pub fn detect(&self, events: &[InteractionEvent], now: MonotonicMs) -> Vec<BehaviorPattern> {
        self.detectors
            .iter()
            .flat_map(|d| d.detect(events, now))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Coordinates;
    use std::collections::BTreeMap;

    fn event(kind: InteractionKind, timestamp: u64, target: &str) -> InteractionEvent {
        InteractionEvent {
            id: format!("evt-{}", timestamp),
            kind,
            timestamp,
            target: target.to_string(),
            coordinates: None,
            value: None,
            duration_ms: None,
            metadata: BTreeMap::new(),
        }
    }

    fn click_at(timestamp: u64, target: &str, x: f64, y: f64) -> InteractionEvent {
        let mut e = event(InteractionKind::Click, timestamp, target);
        e.coordinates = Some(Coordinates::new(x, y));
        e
    }

    fn clicks(count: u64, spacing_ms: u64) -> Vec<InteractionEvent> {
        (0..count)
            .map(|i| click_at(i * spacing_ms, &format!("button-{}", i), i as f64 * 100.0, 0.0))
            .collect()
    }

    #[test]
    fn test_rapid_interaction_threshold() {
        let detector = RapidInteractionDetector::new(&PatternConfig::default());

        // 11 clicks within 10 seconds fires
        let eleven = clicks(11, 900);
        let patterns = detector.detect(&eleven, 9_000);
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].kind, PatternKind::RapidInteraction);
        assert!((patterns[0].confidence - 0.55).abs() < 1e-9);

        // 10 clicks within 10 seconds does not
        let ten = clicks(10, 900);
        assert!(detector.detect(&ten, 8_100).is_empty());
    }

    #[test]
    fn test_rapid_interaction_uses_trailing_window() {
        let detector = RapidInteractionDetector::new(&PatternConfig::default());
        let eleven = clicks(11, 900);

        // At 20s the whole burst is older than the window
        assert!(detector.detect(&eleven, 20_000).is_empty());
    }

    #[test]
    fn test_rapid_interaction_confidence_saturates() {
        let detector = RapidInteractionDetector::new(&PatternConfig::default());
        let many = clicks(30, 100);
        assert_eq!(detector.detect(&many, 3_000)[0].confidence, 1.0);
    }

    #[test]
    fn test_idle_timeout_boundary() {
        let detector = IdleTimeoutDetector::new(&PatternConfig::default());
        let events = vec![event(InteractionKind::KeyPress, 1_000, "input")];

        assert!(detector.detect(&events, 31_000).is_empty());

        let patterns = detector.detect(&events, 31_001);
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].kind, PatternKind::IdleTimeout);
        assert_eq!(patterns[0].confidence, 0.8);
        assert_eq!(patterns[0].detected_at, 31_001);
    }

    #[test]
    fn test_idle_timeout_needs_events() {
        let detector = IdleTimeoutDetector::new(&PatternConfig::default());
        assert!(detector.detect(&[], 100_000).is_empty());
    }

    #[test]
    fn test_excessive_scrolling() {
        let detector = ExcessiveScrollingDetector::new(&PatternConfig::default());
        let scrolls: Vec<_> = (0..21)
            .map(|i| event(InteractionKind::Scroll, i * 200, "body"))
            .collect();

        let patterns = detector.detect(&scrolls, 4_000);
        assert_eq!(patterns.len(), 1);
        assert!((patterns[0].confidence - 21.0 / 40.0).abs() < 1e-9);

        assert!(detector.detect(&scrolls[..20], 4_000).is_empty());
    }

    #[test]
    fn test_confusion_rage_clicks() {
        let detector = ConfusionDetector::new(&PatternConfig::default());
        let events = vec![
            click_at(0, "button#submit", 100.0, 100.0),
            click_at(200, "button#submit", 104.0, 98.0),
            click_at(450, "button#submit", 101.0, 103.0),
        ];

        let patterns = detector.detect(&events, 500);
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].kind, PatternKind::Confusion);
        assert!((patterns[0].confidence - 0.5).abs() < 1e-9);
        assert!(patterns[0].description.contains("button#submit"));
    }

    #[test]
    fn test_confusion_ignores_spread_or_slow_clicks() {
        let detector = ConfusionDetector::new(&PatternConfig::default());

        let spread = vec![
            click_at(0, "canvas", 0.0, 0.0),
            click_at(100, "canvas", 200.0, 0.0),
            click_at(200, "canvas", 400.0, 0.0),
        ];
        assert!(detector.detect(&spread, 300).is_empty());

        let slow = vec![
            click_at(0, "button", 5.0, 5.0),
            click_at(800, "button", 5.0, 5.0),
            click_at(1_600, "button", 5.0, 5.0),
        ];
        assert!(detector.detect(&slow, 2_000).is_empty());
    }

    #[test]
    fn test_focused() {
        let detector = FocusedDetector::new(&PatternConfig::default());
        let mut focus = event(InteractionKind::FocusStart, 10_000, "textarea#answer");
        focus.duration_ms = Some(45_000);
        let events = vec![focus, event(InteractionKind::FocusEnd, 55_000, "textarea#answer")];

        let patterns = detector.detect(&events, 60_000);
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].kind, PatternKind::Focused);
        assert!((patterns[0].confidence - 0.75).abs() < 1e-9);

        // Ended more than the lookback ago
        assert!(detector.detect(&events, 200_000).is_empty());
    }

    #[test]
    fn test_engine_detectors_co_fire() {
        let engine = PatternEngine::core(&PatternConfig::default());
        let eleven = clicks(11, 100);

        // Rapid burst long ago plus idle now: only idle fires
        let patterns = engine.detect(&eleven, 40_000);
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].kind, PatternKind::IdleTimeout);

        // Widen the window so both conditions hold at once
        let config = PatternConfig {
            rapid_click_window_ms: 60_000,
            ..PatternConfig::default()
        };
        let kinds: Vec<_> = PatternEngine::core(&config)
            .detect(&eleven, 40_000)
            .into_iter()
            .map(|p| p.kind)
            .collect();
        assert_eq!(kinds, vec![PatternKind::RapidInteraction, PatternKind::IdleTimeout]);
    }

    #[test]
    fn test_engine_quiet_for_light_activity() {
        let engine = PatternEngine::default();
        let events = clicks(5, 1_000);
        assert!(engine.detect(&events, 5_000).is_empty());
    }
}
