//! Target location
//!
//! Derives a stable, human-readable path for the interacted element. The path
//! is the grouping key for every per-target computation, so it must be
//! deterministic for a given position in the element tree.

use crate::schema::{ElementDescriptor, RawTarget};

/// Fallback target for null or detached elements
pub const UNKNOWN_TARGET: &str = "unknown";

/// Derives the grouping key for an interacted element
pub trait TargetLocator {
    /// Never returns an empty string
    fn locate(&self, target: Option<&RawTarget>) -> String;
}

/// CSS-selector style paths such as `main > div.card:nth-child(2) > button`
#[derive(Debug, Clone, Copy, Default)]
pub struct CssPathLocator;

impl CssPathLocator {
    fn is_document_root(node: &ElementDescriptor) -> bool {
        let tag = node.tag.trim();
        tag.eq_ignore_ascii_case("html") || tag == "#document"
    }

    fn segment(node: &ElementDescriptor) -> String {
        let tag = node.tag.trim().to_ascii_lowercase();

        if let Some(id) = node.id.as_deref().map(str::trim).filter(|id| !id.is_empty()) {
            return format!("{}#{}", tag, id);
        }

        let mut segment = tag;
        for class in node.classes.iter().map(|c| c.trim()).filter(|c| !c.is_empty()) {
            segment.push('.');
            segment.push_str(class);
        }
        if node.same_tag_siblings {
            segment.push_str(&format!(":nth-child({})", node.child_index));
        }
        segment
    }
}

impl TargetLocator for CssPathLocator {
    fn locate(&self, target: Option<&RawTarget>) -> String {
        let Some(target) = target else {
            return UNKNOWN_TARGET.to_string();
        };
        if target.detached {
            return UNKNOWN_TARGET.to_string();
        }

        let mut segments: Vec<String> = Vec::new();
        for node in &target.path {
            if Self::is_document_root(node) || node.tag.trim().is_empty() {
                break;
            }
            segments.push(Self::segment(node));
            // An id is unique in the document; nothing above it adds information
            if node.id.as_deref().is_some_and(|id| !id.trim().is_empty()) {
                break;
            }
        }

        if segments.is_empty() {
            return UNKNOWN_TARGET.to_string();
        }

        segments.reverse();
        segments.join(" > ")
    }
}
