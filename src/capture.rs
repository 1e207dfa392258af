//! Capture surfaces
//!
//! A `CaptureSource` is the host's event surface. Sessions subscribe one
//! handler per `CaptureKind` when tracking starts and release every token when
//! it stops.

use crate::error::TelemetryError;
use crate::schema::RawEvent;
use crate::types::InteractionKind;
use std::cell::RefCell;
use std::rc::Rc;

/// Platform notifications a session listens for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaptureKind {
    PointerMove,
    Click,
    Scroll,
    KeyDown,
    FocusIn,
    FocusOut,
    PointerEnter,
    PointerLeave,
}

impl CaptureKind {
    /// Every kind a tracking session subscribes to
    pub const ALL: [CaptureKind; 8] = [
        CaptureKind::PointerMove,
        CaptureKind::Click,
        CaptureKind::Scroll,
        CaptureKind::KeyDown,
        CaptureKind::FocusIn,
        CaptureKind::FocusOut,
        CaptureKind::PointerEnter,
        CaptureKind::PointerLeave,
    ];

    /// Canonical platform event name
    pub fn event_type(&self) -> &'static str {
        match self {
            CaptureKind::PointerMove => "mousemove",
            CaptureKind::Click => "click",
            CaptureKind::Scroll => "scroll",
            CaptureKind::KeyDown => "keydown",
            CaptureKind::FocusIn => "focusin",
            CaptureKind::FocusOut => "focusout",
            CaptureKind::PointerEnter => "mouseenter",
            CaptureKind::PointerLeave => "mouseleave",
        }
    }

    /// Interaction recorded for a notification of this kind
    pub fn interaction_kind(self) -> InteractionKind {
        match self {
            CaptureKind::PointerMove => InteractionKind::PointerMove,
            CaptureKind::Click => InteractionKind::Click,
            CaptureKind::Scroll => InteractionKind::Scroll,
            CaptureKind::KeyDown => InteractionKind::KeyPress,
            CaptureKind::FocusIn => InteractionKind::FocusStart,
            CaptureKind::FocusOut => InteractionKind::FocusEnd,
            CaptureKind::PointerEnter => InteractionKind::HoverStart,
            CaptureKind::PointerLeave => InteractionKind::HoverEnd,
        }
    }

    /// Capture kind that delivers a platform event type
    pub fn for_event_type(event_type: &str) -> Option<CaptureKind> {
        match event_type.to_ascii_lowercase().as_str() {
            "mousemove" | "pointermove" | "touchmove" => Some(CaptureKind::PointerMove),
            "click" | "dblclick" | "auxclick" => Some(CaptureKind::Click),
            "scroll" | "wheel" => Some(CaptureKind::Scroll),
            "keydown" | "keypress" => Some(CaptureKind::KeyDown),
            "focusin" | "focus" => Some(CaptureKind::FocusIn),
            "focusout" | "blur" => Some(CaptureKind::FocusOut),
            "mouseenter" | "pointerenter" | "mouseover" | "pointerover" => {
                Some(CaptureKind::PointerEnter)
            }
            "mouseleave" | "pointerleave" | "mouseout" | "pointerout" => {
                Some(CaptureKind::PointerLeave)
            }
            _ => None,
        }
    }
}

/// Callback invoked for each delivered notification
pub type CaptureHandler = Rc<dyn Fn(&RawEvent)>;

/// Opaque handle for one subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionToken(u64);

impl SubscriptionToken {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Host event surface
pub trait CaptureSource {
    fn subscribe(
        &self,
        kind: CaptureKind,
        handler: CaptureHandler,
    ) -> Result<SubscriptionToken, TelemetryError>;

    fn unsubscribe(&self, token: SubscriptionToken) -> Result<(), TelemetryError>;
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    handlers: Vec<(SubscriptionToken, CaptureKind, CaptureHandler)>,
    unavailable: Option<String>,
    reject: Vec<CaptureKind>,
}

/// In-process capture surface the host pushes notifications into.
///
/// Clones share one registry, so a host keeps a clone and emits while the
/// session owns another.
#[derive(Clone, Default)]
pub struct InMemoryCaptureSource {
    registry: Rc<RefCell<Registry>>,
}

impl InMemoryCaptureSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// A surface that refuses every subscription
    pub fn unavailable(reason: impl Into<String>) -> Self {
        let source = Self::new();
        source.registry.borrow_mut().unavailable = Some(reason.into());
        source
    }

    /// Refuse future subscriptions for `kind`
    pub fn reject_kind(&self, kind: CaptureKind) {
        self.registry.borrow_mut().reject.push(kind);
    }

    /// Deliver a notification to every handler subscribed for `kind`.
    /// Returns the number of handlers invoked.
    pub fn emit(&self, kind: CaptureKind, raw: &RawEvent) -> usize {
        // Handlers may subscribe or unsubscribe while running
        let handlers: Vec<CaptureHandler> = self
            .registry
            .borrow()
            .handlers
            .iter()
            .filter(|(_, k, _)| *k == kind)
            .map(|(_, _, handler)| Rc::clone(handler))
            .collect();

        for handler in &handlers {
            handler(raw);
        }
        handlers.len()
    }

    /// Route a notification by its event type; unknown types reach no handler
    pub fn dispatch(&self, raw: &RawEvent) -> usize {
        match CaptureKind::for_event_type(&raw.event_type) {
            Some(kind) => self.emit(kind, raw),
            None => 0,
        }
    }

    /// Number of live subscriptions
    pub fn subscription_count(&self) -> usize {
        self.registry.borrow().handlers.len()
    }
}

impl CaptureSource for InMemoryCaptureSource {
    fn subscribe(
        &self,
        kind: CaptureKind,
        handler: CaptureHandler,
    ) -> Result<SubscriptionToken, TelemetryError> {
        let mut registry = self.registry.borrow_mut();
        if let Some(reason) = &registry.unavailable {
            return Err(TelemetryError::CaptureUnavailable(reason.clone()));
        }
        if registry.reject.contains(&kind) {
            return Err(TelemetryError::Subscription(format!(
                "{} listener rejected",
                kind.event_type()
            )));
        }

        registry.next_id += 1;
        let token = SubscriptionToken::new(registry.next_id);
        registry.handlers.push((token, kind, handler));
        Ok(token)
    }

    fn unsubscribe(&self, token: SubscriptionToken) -> Result<(), TelemetryError> {
        let mut registry = self.registry.borrow_mut();
        let before = registry.handlers.len();
        registry.handlers.retain(|(t, _, _)| *t != token);
        if registry.handlers.len() == before {
            return Err(TelemetryError::Subscription(format!(
                "unknown subscription {}",
                token.id()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn counter() -> (Rc<Cell<u32>>, CaptureHandler) {
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        (count, Rc::new(move |_: &RawEvent| c.set(c.get() + 1)))
    }

    #[test]
    fn test_emit_reaches_matching_kind_only() {
        let source = InMemoryCaptureSource::new();
        let (clicks, on_click) = counter();
        let (scrolls, on_scroll) = counter();
        source.subscribe(CaptureKind::Click, on_click).unwrap();
        source.subscribe(CaptureKind::Scroll, on_scroll).unwrap();

        assert_eq!(source.emit(CaptureKind::Click, &RawEvent::new("click")), 1);
        assert_eq!(source.dispatch(&RawEvent::new("wheel")), 1);
        assert_eq!(source.dispatch(&RawEvent::new("resize")), 0);

        assert_eq!(clicks.get(), 1);
        assert_eq!(scrolls.get(), 1);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let source = InMemoryCaptureSource::new();
        let (count, handler) = counter();
        let token = source.subscribe(CaptureKind::KeyDown, handler).unwrap();

        source.unsubscribe(token).unwrap();
        source.emit(CaptureKind::KeyDown, &RawEvent::new("keydown"));

        assert_eq!(count.get(), 0);
        assert_eq!(source.subscription_count(), 0);
        assert!(source.unsubscribe(token).is_err());
    }

    #[test]
    fn test_refusals() {
        let source = InMemoryCaptureSource::unavailable("no document");
        let (_, handler) = counter();
        assert!(matches!(
            source.subscribe(CaptureKind::Click, handler),
            Err(TelemetryError::CaptureUnavailable(_))
        ));

        let source = InMemoryCaptureSource::new();
        source.reject_kind(CaptureKind::Scroll);
        let (_, handler) = counter();
        assert!(source.subscribe(CaptureKind::Click, Rc::clone(&handler)).is_ok());
        assert!(matches!(
            source.subscribe(CaptureKind::Scroll, handler),
            Err(TelemetryError::Subscription(_))
        ));
    }

    #[test]
    fn test_event_type_mapping_round_trips() {
        for kind in CaptureKind::ALL {
            assert_eq!(CaptureKind::for_event_type(kind.event_type()), Some(kind));
        }
        assert_eq!(CaptureKind::for_event_type("PointerMove"), Some(CaptureKind::PointerMove));
    }

    #[test]
    fn test_raw_event_kind_follows_capture_kind() {
        for kind in CaptureKind::ALL {
            let event = RawEvent::new(kind.event_type());
            assert_eq!(event.kind(), Some(kind.interaction_kind()));
        }
        assert_eq!(RawEvent::new("pointerover").kind(), Some(InteractionKind::HoverStart));
        assert_eq!(RawEvent::new("resize").kind(), None);
        assert_eq!(CaptureKind::for_event_type("resize"), None);
    }
}
