//! Readers for ui.raw_interaction.v1 recordings
//!
//! Recordings are either a JSON array of raw events or NDJSON with one raw
//! event per line. Each event carries an `at_ms` offset used for replay.

use crate::error::TelemetryError;
use crate::schema::raw_event::*;

/// Reader for raw interaction recordings
pub struct RawEventReader;

impl RawEventReader {
    /// Parse a JSON string containing an array of RawEvents
    pub fn parse_array(json: &str) -> Result<Vec<RawEvent>, TelemetryError> {
        let events: Vec<RawEvent> = serde_json::from_str(json)?;
        Ok(events)
    }

    /// Parse NDJSON (newline-delimited JSON) containing RawEvents
    pub fn parse_ndjson(ndjson: &str) -> Result<Vec<RawEvent>, TelemetryError> {
        let mut events = Vec::new();
        for (line_num, line) in ndjson.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<RawEvent>(trimmed) {
                Ok(event) => events.push(event),
                Err(e) => {
                    return Err(TelemetryError::ParseError(format!(
                        "Failed to parse line {}: {}",
                        line_num + 1,
                        e
                    )));
                }
            }
        }
        Ok(events)
    }

    /// Validate a batch of events, returning only the failures
    pub fn validate_events(events: &[RawEvent]) -> Vec<ValidationResult> {
        let mut results: Vec<ValidationResult> = events
            .iter()
            .enumerate()
            .filter_map(|(index, event)| {
                event.validate().err().map(|error| ValidationResult {
                    index,
                    event_type: event.event_type.clone(),
                    error,
                })
            })
            .collect();

        results.extend(Self::check_offsets(events));
        results.sort_by_key(|r| r.index);
        results
    }

    /// Replay offsets must be present and non-decreasing
    fn check_offsets(events: &[RawEvent]) -> Vec<ValidationResult> {
        let mut results = Vec::new();
        let mut previous: Option<u64> = None;

        for (index, event) in events.iter().enumerate() {
            match event.at_ms {
                None => results.push(ValidationResult {
                    index,
                    event_type: event.event_type.clone(),
                    error: ValidationError::MissingOffset,
                }),
                Some(at) => {
                    if let Some(prev) = previous {
                        if at < prev {
                            results.push(ValidationResult {
                                index,
                                event_type: event.event_type.clone(),
                                error: ValidationError::OutOfOrder { at_ms: at, previous_ms: prev },
                            });
                        }
                    }
                    previous = Some(previous.map_or(at, |p| p.max(at)));
                }
            }
        }

        results
    }
}

/// A single validation failure
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationResult {
    pub index: usize,
    pub event_type: String,
    pub error: ValidationError,
}
