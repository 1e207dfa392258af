//! Session metrics
//!
//! Derives `AnalyticsMetrics` from a buffer snapshot. Everything is recomputed
//! from scratch on each call and every output is finite.

use crate::config::MetricsConfig;
use crate::types::{AnalyticsMetrics, InteractionEvent, InteractionKind, MonotonicMs};
use std::collections::HashSet;

/// Study-specific rates the engine cannot derive from interactions alone.
///
/// Completion, error and click accuracy depend on the study's own notion of
/// progress, so hosts supply them. Values are clamped to [0, 1].
pub trait StudySignals {
    fn completion_rate(&self, events: &[InteractionEvent]) -> f64;
    fn error_rate(&self, events: &[InteractionEvent]) -> f64;
    fn click_accuracy(&self, events: &[InteractionEvent]) -> f64;
}

/// No study signals available; all rates report 0
#[derive(Debug, Clone, Copy, Default)]
pub struct NoStudySignals;

impl StudySignals for NoStudySignals {
    fn completion_rate(&self, _events: &[InteractionEvent]) -> f64 {
        0.0
    }

    fn error_rate(&self, _events: &[InteractionEvent]) -> f64 {
        0.0
    }

    fn click_accuracy(&self, _events: &[InteractionEvent]) -> f64 {
        0.0
    }
}

/// Caller-supplied constant rates
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FixedStudySignals {
    pub completion_rate: f64,
    pub error_rate: f64,
    pub click_accuracy: f64,
}

impl StudySignals for FixedStudySignals {
    fn completion_rate(&self, _events: &[InteractionEvent]) -> f64 {
        self.completion_rate
    }

    fn error_rate(&self, _events: &[InteractionEvent]) -> f64 {
        self.error_rate
    }

    fn click_accuracy(&self, _events: &[InteractionEvent]) -> f64 {
        self.click_accuracy
    }
}

/// Metrics calculator
pub struct MetricsCalculator<'a> {
    config: &'a MetricsConfig,
    signals: &'a dyn StudySignals,
}

impl<'a> MetricsCalculator<'a> {
    pub fn new(config: &'a MetricsConfig, signals: &'a dyn StudySignals) -> Self {
        Self { config, signals }
    }

    /// Compute metrics over `events` for a session started at `start_time`
    pub fn compute(
        &self,
        events: &[InteractionEvent],
        start_time: MonotonicMs,
        now: MonotonicMs,
    ) -> AnalyticsMetrics {
        let elapsed_ms = now.saturating_sub(start_time);

        AnalyticsMetrics {
            total_interactions: events.len() as u32,
            average_time_per_block_ms: self.average_time_per_block(events, elapsed_ms),
            completion_rate: unit_interval(self.signals.completion_rate(events)),
            engagement_score: compute_engagement_score(events.len(), elapsed_ms),
            attention_span_seconds: compute_attention_span_seconds(events),
            error_rate: unit_interval(self.signals.error_rate(events)),
            scroll_depth_percent: compute_scroll_depth_percent(events),
            click_accuracy: unit_interval(self.signals.click_accuracy(events)),
        }
    }

    /// Formula: `elapsed / max(1, distinct block targets)`
    fn average_time_per_block(&self, events: &[InteractionEvent], elapsed_ms: u64) -> f64 {
        let markers: Vec<String> = self
            .config
            .block_markers
            .iter()
            .map(|m| m.to_ascii_lowercase())
            .filter(|m| !m.is_empty())
            .collect();

        let distinct_blocks: HashSet<&str> = events
            .iter()
            .filter(|e| {
                let target = e.target.to_ascii_lowercase();
                markers.iter().any(|m| target.contains(m.as_str()))
            })
            .map(|e| e.target.as_str())
            .collect();

        elapsed_ms as f64 / distinct_blocks.len().max(1) as f64
    }
}

/// Interactions per second scaled by 10, saturating at 100.
///
/// Formula: `min(100, (count / (max(1, elapsed_ms) / 1000)) * 10)`
fn compute_engagement_score(count: usize, elapsed_ms: u64) -> f64 {
    let elapsed_sec = elapsed_ms.max(1) as f64 / 1000.0;
    ((count as f64 / elapsed_sec) * 10.0).clamp(0.0, 100.0)
}

/// Mean backfilled duration of paired start events, in seconds
fn compute_attention_span_seconds(events: &[InteractionEvent]) -> f64 {
    let durations: Vec<u64> = events.iter().filter_map(|e| e.duration_ms).collect();
    if durations.is_empty() {
        return 0.0;
    }
    let mean_ms = durations.iter().map(|&d| d as f64).sum::<f64>() / durations.len() as f64;
    mean_ms / 1000.0
}

/// Deepest observed scroll offset relative to the scrollable height.
///
/// The scrollable height is `scrollHeight - viewportHeight` from the most
/// recent scroll event that reports it. A page with no scrollable height is
/// fully seen (100); no scroll data at all means nothing was scrolled (0).
fn compute_scroll_depth_percent(events: &[InteractionEvent]) -> f64 {
    let scrolls: Vec<&InteractionEvent> = events
        .iter()
        .filter(|e| e.kind == InteractionKind::Scroll)
        .collect();

    let max_offset = scrolls
        .iter()
        .filter_map(|e| e.metadata_f64("scrollY"))
        .fold(None, |acc: Option<f64>, y| Some(acc.map_or(y, |a| a.max(y))));

    let scrollable_height = scrolls.iter().rev().find_map(|e| {
        let height = e.metadata_f64("scrollHeight")?;
        let viewport = e.metadata_f64("viewportHeight").unwrap_or(0.0);
        Some(height - viewport)
    });

    match (max_offset, scrollable_height) {
        (_, Some(height)) if height <= 0.0 => 100.0,
        (Some(offset), Some(height)) => (offset / height.max(1.0) * 100.0).clamp(0.0, 100.0),
        // Offsets without a known document height cannot be related to depth
        _ => 0.0,
    }
}

fn unit_interval(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}
