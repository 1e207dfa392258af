//! Telemetry session orchestration
//!
//! A session moves `idle -> tracking -> stopped`. While tracking it owns one
//! capture subscription per `CaptureKind` and a periodic snapshot timer; both
//! are released on `stop()` or when a tracking session is dropped.
//!
//! Hooks and the timer hold only weak references to the session core, so a
//! dropped session silently stops receiving.

use crate::buffer::{AppendOutcome, CaptureBuffer};
use crate::capture::{CaptureHandler, CaptureKind, CaptureSource, InMemoryCaptureSource, SubscriptionToken};
use crate::clock::{Clock, MonotonicClock};
use crate::config::TelemetryConfig;
use crate::error::TelemetryError;
use crate::export::{ExportDocument, SessionExporter};
use crate::heatmap::HeatmapAggregator;
use crate::locator::{CssPathLocator, TargetLocator};
use crate::metrics::{MetricsCalculator, NoStudySignals, StudySignals};
use crate::normalizer::EventNormalizer;
use crate::patterns::{PatternDetector, PatternEngine};
use crate::scheduler::{Scheduler, Task, TimerHandle, TokioScheduler};
use crate::schema::RawEvent;
use crate::types::{AnalyticsMetrics, Heatmaps, MonotonicMs, ParticipantBehavior, SessionState};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;
use tracing::{debug, warn};

/// Receives periodic and final snapshots
pub type SnapshotObserver = Box<dyn FnMut(ParticipantBehavior)>;

#[derive(Debug, Clone, Copy)]
enum Lifecycle {
    Idle,
    Tracking {
        started_at: MonotonicMs,
    },
    Stopped {
        started_at: MonotonicMs,
        stopped_at: MonotonicMs,
    },
}

impl Lifecycle {
    fn state(&self) -> SessionState {
        match self {
            Lifecycle::Idle => SessionState::Idle,
            Lifecycle::Tracking { .. } => SessionState::Tracking,
            Lifecycle::Stopped { .. } => SessionState::Stopped,
        }
    }
}

struct SessionRecord {
    lifecycle: Lifecycle,
    buffer: CaptureBuffer,
    degraded: bool,
}

/// State shared between the session handle, its capture hooks and its timer
struct SessionCore {
    session_id: String,
    participant_id: String,
    created_at: MonotonicMs,
    config: TelemetryConfig,
    clock: Box<dyn Clock>,
    locator: Box<dyn TargetLocator>,
    signals: Box<dyn StudySignals>,
    heatmaps: HeatmapAggregator,
    patterns: PatternEngine,
    record: RefCell<SessionRecord>,
    observer: RefCell<Option<SnapshotObserver>>,
    delivering: Cell<bool>,
    pending: RefCell<Option<ParticipantBehavior>>,
}

impl SessionCore {
    fn lifecycle(&self) -> Lifecycle {
        self.record.borrow().lifecycle
    }

    /// Normalize and buffer a notification; only tracking sessions record
    fn record(&self, raw: &RawEvent) -> bool {
        if !matches!(self.lifecycle(), Lifecycle::Tracking { .. }) {
            return false;
        }

        let event = EventNormalizer::new(self.clock.as_ref(), self.locator.as_ref()).normalize(raw);
        let outcome = self.record.borrow_mut().buffer.append(event);
        matches!(outcome, AppendOutcome::Stored { .. })
    }

    fn snapshot(&self) -> ParticipantBehavior {
        let (started_at, now) = match self.lifecycle() {
            Lifecycle::Idle => return self.empty_snapshot(),
            Lifecycle::Tracking { started_at } => (started_at, self.clock.now_ms()),
            Lifecycle::Stopped {
                started_at,
                stopped_at,
            } => (started_at, stopped_at),
        };

        let events = self.record.borrow().buffer.snapshot();
        let metrics = MetricsCalculator::new(&self.config.metrics, self.signals.as_ref())
            .compute(&events, started_at, now);
        let heatmaps = self.heatmaps.heatmaps(&events);
        let patterns = self.patterns.detect(&events, now);

        ParticipantBehavior {
            session_id: self.session_id.clone(),
            participant_id: self.participant_id.clone(),
            start_time: started_at,
            events,
            metrics,
            heatmaps,
            patterns,
        }
    }

    fn empty_snapshot(&self) -> ParticipantBehavior {
        ParticipantBehavior {
            session_id: self.session_id.clone(),
            participant_id: self.participant_id.clone(),
            start_time: self.created_at,
            events: Vec::new(),
            metrics: AnalyticsMetrics::default(),
            heatmaps: Heatmaps::default(),
            patterns: Vec::new(),
        }
    }

    fn duration_ms(&self) -> u64 {
        match self.lifecycle() {
            Lifecycle::Idle => 0,
            Lifecycle::Tracking { started_at } => self.clock.now_ms().saturating_sub(started_at),
            Lifecycle::Stopped {
                started_at,
                stopped_at,
            } => stopped_at.saturating_sub(started_at),
        }
    }

    fn has_observer(&self) -> bool {
        self.observer.borrow().is_some()
    }

    /// Hand a snapshot to the observer; the slot is vacated during the call.
    ///
    /// A snapshot produced by the observer itself, such as the final one when
    /// it stops the session, is queued and handed over once the call returns.
    fn deliver(&self, snapshot: ParticipantBehavior) {
        if self.delivering.get() {
            *self.pending.borrow_mut() = Some(snapshot);
            return;
        }

        let taken = self.observer.borrow_mut().take();
        let Some(mut observer) = taken else {
            return;
        };

        self.delivering.set(true);
        let mut next = Some(snapshot);
        while let Some(snapshot) = next {
            observer(snapshot);
            next = self.pending.borrow_mut().take();
        }
        self.delivering.set(false);

        let mut slot = self.observer.borrow_mut();
        if slot.is_none() {
            *slot = Some(observer);
        }
    }

    fn tick(&self) {
        if matches!(self.lifecycle(), Lifecycle::Tracking { .. }) && self.has_observer() {
            let snapshot = self.snapshot();
            self.deliver(snapshot);
        }
    }
}

/// One participant's telemetry session
pub struct TelemetrySession {
    core: Rc<SessionCore>,
    capture: Box<dyn CaptureSource>,
    scheduler: Box<dyn Scheduler>,
    exporter: SessionExporter,
    tokens: Vec<SubscriptionToken>,
    timer: Option<TimerHandle>,
}

/// Create an idle session with the default engine wiring.
///
/// The session captures through a private in-memory surface, so hosts feed it
/// with [`TelemetrySession::ingest`]. Periodic snapshots run on this thread's
/// shared `LocalSet`, driven with [`TokioScheduler::run_until`]; without a
/// tokio runtime `start()` logs the missing timer and tracks without them.
pub fn create_session(
    session_id: impl Into<String>,
    participant_id: impl Into<String>,
    observer: Option<SnapshotObserver>,
) -> TelemetrySession {
    let mut builder = TelemetrySession::builder(session_id, participant_id);
    builder.observer = observer;
    builder.assemble()
}

impl TelemetrySession {
    pub fn builder(session_id: impl Into<String>, participant_id: impl Into<String>) -> SessionBuilder {
        SessionBuilder::new(session_id.into(), participant_id.into())
    }

    pub fn session_id(&self) -> &str {
        &self.core.session_id
    }

    pub fn participant_id(&self) -> &str {
        &self.core.participant_id
    }

    pub fn state(&self) -> SessionState {
        self.core.lifecycle().state()
    }

    /// Tracking without capture hooks because the surface refused a subscription
    pub fn is_degraded(&self) -> bool {
        self.core.record.borrow().degraded
    }

    pub fn config(&self) -> &TelemetryConfig {
        &self.core.config
    }

    /// Replace the observer slot
    pub fn set_observer(&self, observer: impl FnMut(ParticipantBehavior) + 'static) {
        *self.core.observer.borrow_mut() = Some(Box::new(observer));
    }

    pub fn clear_observer(&self) {
        self.core.observer.borrow_mut().take();
    }

    /// Begin tracking. Ignored unless the session is idle.
    ///
    /// Capture and timer failures are logged and never surface here: a refused
    /// subscription leaves the session tracking in degraded mode, a refused
    /// timer leaves it tracking without periodic snapshots.
    pub fn start(&mut self) {
        let now = self.core.clock.now_ms();
        {
            let mut record = self.core.record.borrow_mut();
            if !matches!(record.lifecycle, Lifecycle::Idle) {
                debug!(
                    session_id = %self.core.session_id,
                    state = ?record.lifecycle.state(),
                    "start ignored"
                );
                return;
            }
            record.lifecycle = Lifecycle::Tracking { started_at: now };
        }

        match self.subscribe_all() {
            Ok(tokens) => self.tokens = tokens,
            Err(error) => {
                warn!(
                    session_id = %self.core.session_id,
                    %error,
                    "capture unavailable, tracking without capture hooks"
                );
                self.core.record.borrow_mut().degraded = true;
            }
        }

        let period = Duration::from_millis(self.core.config.snapshot_interval_ms);
        match self.scheduler.every(period, self.tick_task()) {
            Ok(handle) => self.timer = Some(handle),
            Err(error) => warn!(
                session_id = %self.core.session_id,
                %error,
                "snapshot timer unavailable, periodic snapshots disabled"
            ),
        }

        debug!(
            session_id = %self.core.session_id,
            participant_id = %self.core.participant_id,
            started_at = now,
            "tracking started"
        );
    }

    /// Stop tracking and deliver one final snapshot. Ignored unless tracking.
    pub fn stop(&mut self) {
        let Lifecycle::Tracking { started_at } = self.core.lifecycle() else {
            debug!(session_id = %self.core.session_id, state = ?self.state(), "stop ignored");
            return;
        };

        self.release_capture();
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }

        let stopped_at = self.core.clock.now_ms();
        self.core.record.borrow_mut().lifecycle = Lifecycle::Stopped {
            started_at,
            stopped_at,
        };

        let snapshot = self.core.snapshot();
        debug!(
            session_id = %self.core.session_id,
            events = snapshot.events.len(),
            duration_ms = stopped_at.saturating_sub(started_at),
            "tracking stopped"
        );
        self.core.deliver(snapshot);
    }

    /// Current snapshot. Idle sessions report zeroed metrics; stopped sessions
    /// are frozen at the stop instant.
    pub fn current_data(&self) -> ParticipantBehavior {
        self.core.snapshot()
    }

    /// Host push path, identical to a capture hook delivery.
    /// Returns whether the event was buffered.
    pub fn ingest(&self, raw: &RawEvent) -> bool {
        self.core.record(raw)
    }

    /// Elapsed tracking time, frozen once stopped
    pub fn session_duration_ms(&self) -> u64 {
        self.core.duration_ms()
    }

    pub fn export(&self) -> ExportDocument {
        self.exporter.export(self.current_data(), self.session_duration_ms())
    }

    /// Subscribe every capture kind, rolling back on the first refusal
    fn subscribe_all(&self) -> Result<Vec<SubscriptionToken>, TelemetryError> {
        let mut tokens = Vec::with_capacity(CaptureKind::ALL.len());
        for kind in CaptureKind::ALL {
            match self.capture.subscribe(kind, self.capture_handler()) {
                Ok(token) => tokens.push(token),
                Err(error) => {
                    for token in tokens {
                        if let Err(e) = self.capture.unsubscribe(token) {
                            warn!(session_id = %self.core.session_id, error = %e, "rollback unsubscribe failed");
                        }
                    }
                    return Err(error);
                }
            }
        }
        Ok(tokens)
    }

    fn release_capture(&mut self) {
        for token in self.tokens.drain(..) {
            if let Err(error) = self.capture.unsubscribe(token) {
                warn!(
                    session_id = %self.core.session_id,
                    %error,
                    "failed to release capture subscription"
                );
            }
        }
    }

    fn capture_handler(&self) -> CaptureHandler {
        let core = Rc::downgrade(&self.core);
        Rc::new(move |raw: &RawEvent| {
            if let Some(core) = core.upgrade() {
                core.record(raw);
            }
        })
    }

    fn tick_task(&self) -> Task {
        let core = Rc::downgrade(&self.core);
        Box::new(move || {
            if let Some(core) = core.upgrade() {
                core.tick();
            }
        })
    }
}

impl Drop for TelemetrySession {
    fn drop(&mut self) {
        if self.state() == SessionState::Tracking {
            self.release_capture();
            self.timer.take();
            debug!(session_id = %self.core.session_id, "tracking session dropped");
        }
    }
}

/// Session assembly with injectable host surfaces
pub struct SessionBuilder {
    session_id: String,
    participant_id: String,
    config: TelemetryConfig,
    observer: Option<SnapshotObserver>,
    capture: Option<Box<dyn CaptureSource>>,
    scheduler: Option<Box<dyn Scheduler>>,
    clock: Option<Box<dyn Clock>>,
    locator: Option<Box<dyn TargetLocator>>,
    signals: Option<Box<dyn StudySignals>>,
    patterns: Option<PatternEngine>,
    extra_detectors: Vec<Box<dyn PatternDetector>>,
    exporter: Option<SessionExporter>,
}

impl SessionBuilder {
    fn new(session_id: String, participant_id: String) -> Self {
        Self {
            session_id,
            participant_id,
            config: TelemetryConfig::default(),
            observer: None,
            capture: None,
            scheduler: None,
            clock: None,
            locator: None,
            signals: None,
            patterns: None,
            extra_detectors: Vec::new(),
            exporter: None,
        }
    }

    pub fn config(mut self, config: TelemetryConfig) -> Self {
        self.config = config;
        self
    }

    pub fn observer(mut self, observer: impl FnMut(ParticipantBehavior) + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn capture_source(mut self, capture: impl CaptureSource + 'static) -> Self {
        self.capture = Some(Box::new(capture));
        self
    }

    pub fn scheduler(mut self, scheduler: impl Scheduler + 'static) -> Self {
        self.scheduler = Some(Box::new(scheduler));
        self
    }

    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Some(Box::new(clock));
        self
    }

    pub fn locator(mut self, locator: impl TargetLocator + 'static) -> Self {
        self.locator = Some(Box::new(locator));
        self
    }

    pub fn study_signals(mut self, signals: impl StudySignals + 'static) -> Self {
        self.signals = Some(Box::new(signals));
        self
    }

    /// Replace the built-in detectors
    pub fn patterns(mut self, patterns: PatternEngine) -> Self {
        self.patterns = Some(patterns);
        self
    }

    /// Run an additional detector after the configured ones
    pub fn detector(mut self, detector: impl PatternDetector + 'static) -> Self {
        self.extra_detectors.push(Box::new(detector));
        self
    }

    pub fn exporter(mut self, exporter: SessionExporter) -> Self {
        self.exporter = Some(exporter);
        self
    }

    pub fn build(self) -> Result<TelemetrySession, TelemetryError> {
        self.config.validate()?;
        Ok(self.assemble())
    }

    fn assemble(self) -> TelemetrySession {
        let SessionBuilder {
            session_id,
            participant_id,
            config,
            observer,
            capture,
            scheduler,
            clock,
            locator,
            signals,
            patterns,
            extra_detectors,
            exporter,
        } = self;

        let clock = clock.unwrap_or_else(|| Box::new(MonotonicClock::new()));
        let mut patterns = patterns.unwrap_or_else(|| PatternEngine::new(&config.patterns));
        for detector in extra_detectors {
            patterns.push(detector);
        }

        let core = SessionCore {
            session_id,
            participant_id,
            created_at: clock.now_ms(),
            clock,
            locator: locator.unwrap_or_else(|| Box::new(CssPathLocator)),
            signals: signals.unwrap_or_else(|| Box::new(NoStudySignals)),
            heatmaps: HeatmapAggregator::new(&config.heatmap),
            patterns,
            record: RefCell::new(SessionRecord {
                lifecycle: Lifecycle::Idle,
                buffer: CaptureBuffer::new(config.buffer.clone()),
                degraded: false,
            }),
            observer: RefCell::new(observer),
            delivering: Cell::new(false),
            pending: RefCell::new(None),
            config,
        };

        TelemetrySession {
            core: Rc::new(core),
            capture: capture.unwrap_or_else(|| Box::new(InMemoryCaptureSource::new())),
            scheduler: scheduler.unwrap_or_else(|| Box::new(TokioScheduler::current())),
            exporter: exporter.unwrap_or_default(),
            tokens: Vec::new(),
            timer: None,
        }
    }
}
