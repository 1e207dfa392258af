//! Spatial heatmap aggregation
//!
//! Buckets coordinate-bearing events into a fixed-size grid and produces
//! intensity-normalized cells. Aggregation depends only on the set of events,
//! never on their order.

use crate::config::HeatmapConfig;
use crate::types::{HeatmapCell, Heatmaps, InteractionEvent, InteractionKind};
use std::collections::BTreeMap;

/// Kinds contributing to the click heatmap
pub const CLICK_KINDS: &[InteractionKind] = &[InteractionKind::Click];

/// Kinds contributing to the hover heatmap
pub const HOVER_KINDS: &[InteractionKind] = &[InteractionKind::HoverStart, InteractionKind::PointerMove];

/// Heatmap aggregator
#[derive(Debug, Clone)]
pub struct HeatmapAggregator {
    grid_size: f64,
    saturation_count: u32,
}

impl Default for HeatmapAggregator {
    fn default() -> Self {
        Self::new(&HeatmapConfig::default())
    }
}

impl HeatmapAggregator {
    pub fn new(config: &HeatmapConfig) -> Self {
        let grid_size = if config.grid_size.is_finite() && config.grid_size > 0.0 {
            config.grid_size
        } else {
            HeatmapConfig::default().grid_size
        };
        Self {
            grid_size,
            saturation_count: config.saturation_count.max(1),
        }
    }

    /// Aggregate events of the given kinds into grid cells, sorted by row then column
    pub fn aggregate(&self, events: &[InteractionEvent], kinds: &[InteractionKind]) -> Vec<HeatmapCell> {
        let mut counts: BTreeMap<(i64, i64), u32> = BTreeMap::new();

        for event in events.iter().filter(|e| kinds.contains(&e.kind)) {
            let Some(coords) = event.coordinates else {
                continue;
            };
            if !(coords.x.is_finite() && coords.y.is_finite()) {
                continue;
            }
            // Keyed (y, x) so iteration yields row-major order
            *counts.entry((self.bucket(coords.y), self.bucket(coords.x))).or_insert(0) += 1;
        }

        counts
            .into_iter()
            .map(|((y, x), count)| HeatmapCell {
                x,
                y,
                count,
                intensity: self.intensity(count),
            })
            .collect()
    }

    /// Click and hover heatmaps for a snapshot
    pub fn heatmaps(&self, events: &[InteractionEvent]) -> Heatmaps {
        Heatmaps {
            clicks: self.aggregate(events, CLICK_KINDS),
            hovers: self.aggregate(events, HOVER_KINDS),
        }
    }

    /// Top-left corner of the bucket containing `value`
    fn bucket(&self, value: f64) -> i64 {
        ((value / self.grid_size).floor() * self.grid_size) as i64
    }

    /// Linear ramp saturating at the configured count
    fn intensity(&self, count: u32) -> f64 {
        (count as f64 / self.saturation_count as f64).min(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Coordinates;
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    fn event_at(kind: InteractionKind, x: f64, y: f64) -> InteractionEvent {
        InteractionEvent {
            id: format!("{}-{}", x, y),
            kind,
            timestamp: 0,
            target: "body".to_string(),
            coordinates: Some(Coordinates::new(x, y)),
            value: None,
            duration_ms: None,
            metadata: BTreeMap::new(),
        }
    }

    #[test]
    fn test_shared_bucket() {
        let events = vec![
            event_at(InteractionKind::Click, 5.0, 5.0),
            event_at(InteractionKind::Click, 15.0, 15.0),
        ];
        let cells = HeatmapAggregator::default().aggregate(&events, CLICK_KINDS);

        assert_eq!(cells.len(), 1);
        assert_eq!((cells[0].x, cells[0].y), (0, 0));
        assert_eq!(cells[0].count, 2);
        assert!((cells[0].intensity - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_bucket_boundaries_and_negative_coordinates() {
        let events = vec![
            event_at(InteractionKind::Click, 20.0, 39.9),
            event_at(InteractionKind::Click, -0.5, 0.0),
        ];
        let cells = HeatmapAggregator::default().aggregate(&events, CLICK_KINDS);

        assert_eq!(cells.len(), 2);
        assert_eq!((cells[0].x, cells[0].y), (-20, 0));
        assert_eq!((cells[1].x, cells[1].y), (20, 20));
    }

    #[test]
    fn test_intensity_saturates() {
        let events: Vec<_> = (0..14)
            .map(|_| event_at(InteractionKind::Click, 3.0, 3.0))
            .collect();
        let cells = HeatmapAggregator::default().aggregate(&events, CLICK_KINDS);
        assert_eq!(cells[0].count, 14);
        assert_eq!(cells[0].intensity, 1.0);
    }

    #[test]
    fn test_kind_filter_and_missing_coordinates() {
        let mut no_coords = event_at(InteractionKind::Click, 0.0, 0.0);
        no_coords.coordinates = None;
        let events = vec![
            no_coords,
            event_at(InteractionKind::HoverStart, 50.0, 50.0),
            event_at(InteractionKind::PointerMove, 55.0, 41.0),
            event_at(InteractionKind::Scroll, 1.0, 1.0),
        ];

        let heatmaps = HeatmapAggregator::default().heatmaps(&events);
        assert!(heatmaps.clicks.is_empty());
        assert_eq!(heatmaps.hovers.len(), 1);
        assert_eq!(heatmaps.hovers[0].count, 2);
    }

    proptest! {
        #[test]
        fn aggregation_is_order_independent(
            (events, shuffled) in prop::collection::vec((-500.0f64..2_000.0, -500.0f64..2_000.0), 0..60)
                .prop_flat_map(|points| {
                    let events: Vec<_> = points
                        .iter()
                        .map(|&(x, y)| event_at(InteractionKind::Click, x, y))
                        .collect();
                    (Just(events.clone()), Just(events).prop_shuffle())
                }),
        ) {
            let aggregator = HeatmapAggregator::default();
            let original = aggregator.aggregate(&events, CLICK_KINDS);
            let reordered = aggregator.aggregate(&shuffled, CLICK_KINDS);
            prop_assert_eq!(original, reordered);
        }

        #[test]
        fn counts_sum_to_matching_events(
            points in prop::collection::vec((0.0f64..1_000.0, 0.0f64..1_000.0), 0..60),
        ) {
            let events: Vec<_> = points
                .iter()
                .map(|&(x, y)| event_at(InteractionKind::Click, x, y))
                .collect();
            let cells = HeatmapAggregator::default().aggregate(&events, CLICK_KINDS);

            let total: u32 = cells.iter().map(|c| c.count).sum();
            prop_assert_eq!(total as usize, events.len());
            for cell in cells {
                prop_assert!(cell.intensity > 0.0 && cell.intensity <= 1.0);
                prop_assert_eq!(cell.x % 20, 0);
                prop_assert_eq!(cell.y % 20, 0);
            }
        }
    }
}
