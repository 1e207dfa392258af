//! ui.raw_interaction.v1 schema
//!
//! This module defines the platform-neutral input schema for raw interaction
//! notifications, as delivered by capture hooks or read from recordings.

mod adapter;
mod raw_event;

pub use adapter::*;
pub use raw_event::*;
