//! Engine configuration
//!
//! Every threshold the engine uses lives here. Hosts override individual
//! fields through JSON; anything omitted keeps its default.

use crate::error::TelemetryError;
use serde::{Deserialize, Serialize};

/// Default snapshot cadence while tracking
pub const DEFAULT_SNAPSHOT_INTERVAL_MS: u64 = 5_000;

/// Capture buffer policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    /// Maximum number of resident events
    pub capacity: usize,
    /// Minimum spacing between consecutive stored pointer moves
    pub pointer_move_throttle_ms: u64,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            capacity: 1_000,
            pointer_move_throttle_ms: 100,
        }
    }
}

/// Heatmap grid configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeatmapConfig {
    /// Bucket edge length in logical pixels
    pub grid_size: f64,
    /// Count at which a bucket reaches full intensity
    pub saturation_count: u32,
}

impl Default for HeatmapConfig {
    fn default() -> Self {
        Self {
            grid_size: 20.0,
            saturation_count: 10,
        }
    }
}

/// Metrics configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Substrings marking a target as a study block (case-insensitive)
    pub block_markers: Vec<String>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            block_markers: vec![
                "block".to_string(),
                "question".to_string(),
                "task".to_string(),
            ],
        }
    }
}

/// Pattern detector thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternConfig {
    pub rapid_click_window_ms: u64,
    /// Fires when the window holds more clicks than this
    pub rapid_click_threshold: u32,
    /// Click count at which confidence reaches 1
    pub rapid_click_saturation: u32,

    pub idle_timeout_ms: u64,
    pub idle_confidence: f64,

    pub scroll_window_ms: u64,
    /// Fires when the window holds more scrolls than this
    pub scroll_threshold: u32,
    pub scroll_saturation: u32,

    pub confusion_window_ms: u64,
    pub confusion_min_clicks: u32,
    pub confusion_radius_px: f64,

    pub focused_min_duration_ms: u64,
    pub focused_lookback_ms: u64,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            rapid_click_window_ms: 10_000,
            rapid_click_threshold: 10,
            rapid_click_saturation: 20,
            idle_timeout_ms: 30_000,
            idle_confidence: 0.8,
            scroll_window_ms: 10_000,
            scroll_threshold: 20,
            scroll_saturation: 40,
            confusion_window_ms: 1_000,
            confusion_min_clicks: 3,
            confusion_radius_px: 20.0,
            focused_min_duration_ms: 30_000,
            focused_lookback_ms: 60_000,
        }
    }
}

/// Full telemetry engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub snapshot_interval_ms: u64,
    pub buffer: BufferConfig,
    pub heatmap: HeatmapConfig,
    pub metrics: MetricsConfig,
    pub patterns: PatternConfig,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            snapshot_interval_ms: DEFAULT_SNAPSHOT_INTERVAL_MS,
            buffer: BufferConfig::default(),
            heatmap: HeatmapConfig::default(),
            metrics: MetricsConfig::default(),
            patterns: PatternConfig::default(),
        }
    }
}

impl TelemetryConfig {
    /// Load and validate configuration from JSON; missing fields take defaults
    pub fn from_json(json: &str) -> Result<Self, TelemetryError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to pretty JSON
    pub fn to_json(&self) -> Result<String, TelemetryError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject values that would make the engine divide by zero or never tick
    pub fn validate(&self) -> Result<(), TelemetryError> {
        if self.snapshot_interval_ms == 0 {
            return Err(TelemetryError::InvalidConfig(
                "snapshot_interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.buffer.capacity == 0 {
            return Err(TelemetryError::InvalidConfig(
                "buffer.capacity must be greater than 0".to_string(),
            ));
        }
        if !(self.heatmap.grid_size.is_finite() && self.heatmap.grid_size > 0.0) {
            return Err(TelemetryError::InvalidConfig(
                "heatmap.grid_size must be a positive number".to_string(),
            ));
        }
        if self.heatmap.saturation_count == 0 {
            return Err(TelemetryError::InvalidConfig(
                "heatmap.saturation_count must be greater than 0".to_string(),
            ));
        }
        if self.patterns.rapid_click_saturation == 0 || self.patterns.scroll_saturation == 0 {
            return Err(TelemetryError::InvalidConfig(
                "pattern saturation counts must be greater than 0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.patterns.idle_confidence) {
            return Err(TelemetryError::InvalidConfig(
                "patterns.idle_confidence must be within [0, 1]".to_string(),
            ));
        }
        Ok(())
    }
}
