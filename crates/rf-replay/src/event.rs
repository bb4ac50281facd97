//! Replay notifications
//!
//! Observers receive events synchronously, in emission order, on the
//! controller's thread.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use rf_outcome::{BoardShape, SymbolGrid};

use crate::timing::Millis;
use crate::RunId;

/// Sequencer notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReplayEvent {
    /// A step begins. Always the first event of its step.
    StepStarted { index: usize, total: usize },
    /// Win delta applied when a match step's removal starts
    WinIncremented { amount: f64 },
    /// Bonus step highlighted its trigger cells
    BonusTriggered { payload: serde_json::Value },
    /// Terminal event of a run
    SequenceCompleted { total_steps: usize },
}

impl ReplayEvent {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::StepStarted { .. } => "step_started",
            Self::WinIncremented { .. } => "win_incremented",
            Self::BonusTriggered { .. } => "bonus_triggered",
            Self::SequenceCompleted { .. } => "sequence_completed",
        }
    }
}

/// Emission context of an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMeta {
    pub run_id: RunId,
    pub at_ms: Millis,
}

/// Board contents after a submit or clear
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardSnapshot {
    pub shape: BoardShape,
    pub symbols: SymbolGrid,
    /// Run started by the change (None for clear)
    pub run_id: Option<RunId>,
    pub outcome_id: Option<String>,
}

/// Receiver of replay notifications
pub trait ReplayObserver {
    fn on_event(&mut self, event: &ReplayEvent, meta: EventMeta);

    /// Called once per submit/clear
    fn on_board_changed(&mut self, _snapshot: &BoardSnapshot) {}
}

/// Ordered set of observers
#[derive(Default)]
pub struct ObserverSet {
    observers: Vec<Box<dyn ReplayObserver>>,
}

impl ObserverSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, observer: Box<dyn ReplayObserver>) {
        self.observers.push(observer);
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    pub fn emit(&mut self, event: &ReplayEvent, meta: EventMeta) {
        log::debug!("[Replay] run {} @{}ms {}", meta.run_id, meta.at_ms, event.type_name());
        for observer in &mut self.observers {
            observer.on_event(event, meta);
        }
    }

    pub fn board_changed(&mut self, snapshot: &BoardSnapshot) {
        for observer in &mut self.observers {
            observer.on_board_changed(snapshot);
        }
    }
}

impl std::fmt::Debug for ObserverSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverSet").field("len", &self.observers.len()).finish()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TRACE RECORDING
// ═══════════════════════════════════════════════════════════════════════════════

/// Event with its emission context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TracedEvent {
    pub at_ms: Millis,
    pub run_id: RunId,
    pub event: ReplayEvent,
}

/// Everything observed over a recorder's lifetime
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayTrace {
    pub outcome_id: Option<String>,
    pub recorded_at: DateTime<Utc>,
    pub events: Vec<TracedEvent>,
    pub board_changes: Vec<BoardSnapshot>,
}

impl Default for ReplayTrace {
    fn default() -> Self {
        Self {
            outcome_id: None,
            recorded_at: Utc::now(),
            events: Vec::new(),
            board_changes: Vec::new(),
        }
    }
}

impl ReplayTrace {
    /// Bare event list, without timestamps or run ids
    pub fn event_list(&self) -> Vec<ReplayEvent> {
        self.events.iter().map(|e| e.event.clone()).collect()
    }

    /// Same events in the same order
    pub fn same_sequence(&self, other: &ReplayTrace) -> bool {
        self.events.len() == other.events.len()
            && self.events.iter().zip(&other.events).all(|(a, b)| a.event == b.event)
    }

    /// Same events at the same offsets from each trace's first event
    pub fn same_timeline(&self, other: &ReplayTrace) -> bool {
        self.same_sequence(other) && self.relative_times() == other.relative_times()
    }

    fn relative_times(&self) -> Vec<Millis> {
        let start = self.events.first().map(|e| e.at_ms).unwrap_or(0);
        self.events.iter().map(|e| e.at_ms - start).collect()
    }

    /// Events of one run
    pub fn events_of(&self, run_id: RunId) -> Vec<&TracedEvent> {
        self.events.iter().filter(|e| e.run_id == run_id).collect()
    }

    /// Sum of all `win_incremented` amounts
    pub fn win_total(&self) -> f64 {
        self.events
            .iter()
            .filter_map(|e| match e.event {
                ReplayEvent::WinIncremented { amount } => Some(amount),
                _ => None,
            })
            .sum()
    }

    pub fn completions(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e.event, ReplayEvent::SequenceCompleted { .. }))
            .count()
    }
}

/// Observer that records a [`ReplayTrace`]. Clones share the same trace.
#[derive(Debug, Clone, Default)]
pub struct EventRecorder {
    trace: Arc<Mutex<ReplayTrace>>,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the trace so far
    pub fn trace(&self) -> ReplayTrace {
        self.trace.lock().clone()
    }

    /// Take the trace, leaving an empty one
    pub fn take(&self) -> ReplayTrace {
        std::mem::take(&mut *self.trace.lock())
    }

    pub fn event_list(&self) -> Vec<ReplayEvent> {
        self.trace.lock().event_list()
    }

    pub fn len(&self) -> usize {
        self.trace.lock().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ReplayObserver for EventRecorder {
    fn on_event(&mut self, event: &ReplayEvent, meta: EventMeta) {
        self.trace.lock().events.push(TracedEvent {
            at_ms: meta.at_ms,
            run_id: meta.run_id,
            event: event.clone(),
        });
    }

    fn on_board_changed(&mut self, snapshot: &BoardSnapshot) {
        let mut trace = self.trace.lock();
        if snapshot.outcome_id.is_some() {
            trace.outcome_id = snapshot.outcome_id.clone();
        }
        trace.board_changes.push(snapshot.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn meta(run_id: RunId, at_ms: Millis) -> EventMeta {
        EventMeta { run_id, at_ms }
    }

    #[test]
    fn test_event_serialization_tags() {
        let event = ReplayEvent::StepStarted { index: 0, total: 2 };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value, json!({"type": "step_started", "index": 0, "total": 2}));

        let back: ReplayEvent = serde_json::from_value(json!({"type": "win_incremented", "amount": 1.5})).unwrap();
        assert_eq!(back, ReplayEvent::WinIncremented { amount: 1.5 });
    }

    #[test]
    fn test_recorder_clones_share_trace() {
        let recorder = EventRecorder::new();
        let mut observers = ObserverSet::new();
        observers.add(Box::new(recorder.clone()));

        observers.emit(&ReplayEvent::WinIncremented { amount: 2.0 }, meta(1, 10));
        observers.emit(&ReplayEvent::WinIncremented { amount: 3.0 }, meta(1, 20));
        observers.emit(&ReplayEvent::SequenceCompleted { total_steps: 2 }, meta(1, 30));

        let trace = recorder.trace();
        assert_eq!(trace.events.len(), 3);
        assert_eq!(trace.win_total(), 5.0);
        assert_eq!(trace.completions(), 1);
        assert_eq!(trace.events_of(1).len(), 3);
        assert!(trace.events_of(2).is_empty());
    }

    #[test]
    fn test_timeline_comparison_ignores_start_offset() {
        let a = EventRecorder::new();
        let b = EventRecorder::new();
        let (mut ra, mut rb) = (a.clone(), b.clone());

        ra.on_event(&ReplayEvent::StepStarted { index: 0, total: 1 }, meta(1, 100));
        ra.on_event(&ReplayEvent::SequenceCompleted { total_steps: 1 }, meta(1, 400));
        rb.on_event(&ReplayEvent::StepStarted { index: 0, total: 1 }, meta(7, 1100));
        rb.on_event(&ReplayEvent::SequenceCompleted { total_steps: 1 }, meta(7, 1400));

        assert!(a.trace().same_sequence(&b.trace()));
        assert!(a.trace().same_timeline(&b.trace()));

        rb.on_event(&ReplayEvent::SequenceCompleted { total_steps: 1 }, meta(7, 1500));
        assert!(!a.trace().same_sequence(&b.trace()));
    }

    #[test]
    fn test_board_change_sets_outcome_id() {
        let mut recorder = EventRecorder::new();
        recorder.on_board_changed(&BoardSnapshot {
            shape: BoardShape::new(1, 1),
            symbols: vec![vec!["A".into()]],
            run_id: Some(1),
            outcome_id: Some("spin-1".into()),
        });
        let trace = recorder.take();
        assert_eq!(trace.outcome_id.as_deref(), Some("spin-1"));
        assert_eq!(trace.board_changes.len(), 1);
        assert!(recorder.is_empty());
    }
}
