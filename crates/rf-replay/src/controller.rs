//! Lifecycle controller
//!
//! Owns the board, the clock and the sequencer. `submit` and `clear` always
//! win over an active run: the old run's timers are cancelled before the
//! board is touched, so nothing from it can reach the new board.

use std::sync::Arc;

use rtrb::{Consumer, Producer, RingBuffer};
use serde::Serialize;

use rf_outcome::{CellCoordinate, NormalizationReport, Outcome};

use crate::config::ReplayConfig;
use crate::event::{ObserverSet, ReplayObserver};
use crate::fill::{FillMode, FillStrategy, build_strategy};
use crate::grid::GridState;
use crate::layout::{ContainerSize, Metrics, resolve_metrics};
use crate::render::{CellRenderer, HeadlessRenderer};
use crate::scheduler::{CancelToken, Scheduler};
use crate::sequencer::{RunSummary, SequencePhase, SequencerEnv, SequencerTask, StepSequencer};
use crate::timing::Millis;
use crate::{MAX_IDLE_TASKS, ReplayError, ReplayResult, RunId};

/// Receiver of decoded outcomes from the transport layer
pub trait OutcomeSink {
    fn on_outcome_received(&mut self, outcome: Outcome) -> ReplayResult<()>;
}

/// Commands accepted from other threads
#[derive(Debug, Clone)]
pub enum ReplayCommand {
    Submit(Box<Outcome>),
    Clear,
    Resize(ContainerSize),
    SetFillMode(FillMode),
}

/// Sending half of the controller's command queue
pub struct ReplayCommandSender {
    tx: Producer<ReplayCommand>,
}

impl ReplayCommandSender {
    pub fn send(&mut self, command: ReplayCommand) -> ReplayResult<()> {
        self.tx.push(command).map_err(|_| ReplayError::CommandQueueFull)
    }

    pub fn submit(&mut self, outcome: Outcome) -> ReplayResult<()> {
        self.send(ReplayCommand::Submit(Box::new(outcome)))
    }

    pub fn clear(&mut self) -> ReplayResult<()> {
        self.send(ReplayCommand::Clear)
    }

    pub fn resize(&mut self, container: ContainerSize) -> ReplayResult<()> {
        self.send(ReplayCommand::Resize(container))
    }

    pub fn set_fill_mode(&mut self, mode: FillMode) -> ReplayResult<()> {
        self.send(ReplayCommand::SetFillMode(mode))
    }

    /// Free slots in the queue
    pub fn available(&self) -> usize {
        self.tx.slots()
    }

    /// The controller side was dropped
    pub fn is_abandoned(&self) -> bool {
        self.tx.is_abandoned()
    }
}

impl OutcomeSink for ReplayCommandSender {
    fn on_outcome_received(&mut self, outcome: Outcome) -> ReplayResult<()> {
        self.submit(outcome)
    }
}

/// Session bookkeeping
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionState {
    /// Outcome of the current (or last finished) run
    #[serde(skip)]
    pub current_outcome: Option<Arc<Outcome>>,
    pub current_run: Option<RunId>,
    pub runs_started: u64,
    pub runs_completed: u64,
    pub runs_cancelled: u64,
    pub last_summary: Option<RunSummary>,
    pub last_normalization: Option<NormalizationReport>,
}

/// Owner of one replay board
pub struct ReplayController<R: CellRenderer> {
    config: ReplayConfig,
    renderer: R,
    observers: ObserverSet,
    grid: GridState,
    metrics: Metrics,
    container: ContainerSize,
    scheduler: Scheduler<SequencerTask>,
    sequencer: StepSequencer,
    session: SessionState,
    fill_mode: FillMode,
    commands: Option<Consumer<ReplayCommand>>,
    next_run_id: RunId,
}

impl ReplayController<HeadlessRenderer> {
    /// Controller drawing into a [`HeadlessRenderer`]
    pub fn headless(config: ReplayConfig) -> ReplayResult<Self> {
        Self::new(config, HeadlessRenderer::new())
    }
}

impl<R: CellRenderer> ReplayController<R> {
    pub fn new(config: ReplayConfig, mut renderer: R) -> ReplayResult<Self> {
        config.validate()?;
        let container = config.container;
        let metrics = resolve_metrics(config.board, container, &config.layout);
        let mut grid = GridState::new(config.board);
        grid.rebuild(config.board, &config.board.blank_grid(), &mut renderer, &metrics);
        log::info!(
            "[Replay] Controller ready: {}x{} board, {} fill, {} timing",
            config.board.rows,
            config.board.cols,
            config.fill_mode,
            config.timing.profile.display_name()
        );

        Ok(Self {
            fill_mode: config.fill_mode,
            config,
            renderer,
            observers: ObserverSet::new(),
            grid,
            metrics,
            container,
            scheduler: Scheduler::new(),
            sequencer: StepSequencer::new(),
            session: SessionState::default(),
            commands: None,
            next_run_id: 1,
        })
    }

    pub fn add_observer(&mut self, observer: Box<dyn ReplayObserver>) {
        self.observers.add(observer);
    }

    pub fn config(&self) -> &ReplayConfig {
        &self.config
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    pub fn grid(&self) -> &GridState {
        &self.grid
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn container(&self) -> ContainerSize {
        self.container
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn phase(&self) -> SequencePhase {
        self.sequencer.phase()
    }

    pub fn is_active(&self) -> bool {
        self.sequencer.is_active()
    }

    pub fn fill_mode(&self) -> FillMode {
        self.fill_mode
    }

    /// Fill strategy of the current (or last finished) run
    pub fn strategy(&self) -> Option<&dyn FillStrategy> {
        self.sequencer.strategy()
    }

    /// Cells highlighted by the most recent bonus step of the current run
    pub fn highlighted_cells(&self) -> &[CellCoordinate] {
        self.sequencer.run().map(|r| r.highlighted.as_slice()).unwrap_or(&[])
    }

    /// Win accumulated by the current run so far
    pub fn accumulated_win(&self) -> f64 {
        self.sequencer.run().map(|r| r.accumulated_win).unwrap_or(0.0)
    }

    /// Virtual clock
    pub fn now_ms(&self) -> Millis {
        self.scheduler.now_ms()
    }

    /// Live timers still pending
    pub fn pending_timers(&self) -> usize {
        self.scheduler.live_len()
    }

    /// Takes effect on the next run
    pub fn set_fill_mode(&mut self, mode: FillMode) {
        if mode != self.fill_mode {
            log::debug!("[Replay] Fill mode {} -> {} (next run)", self.fill_mode, mode);
        }
        self.fill_mode = mode;
    }

    /// Start replaying `outcome`, cancelling any active run
    pub fn submit(&mut self, mut outcome: Outcome) -> RunId {
        let shape = self.config.board;
        let report = outcome.normalize(shape);
        log_normalization(&outcome.id, &report);

        self.cancel_active();
        self.grid.rebuild(shape, &outcome.initial_grid, &mut self.renderer, &self.metrics);

        let run_id = self.next_run_id;
        self.next_run_id += 1;
        let outcome = Arc::new(outcome);

        self.session.current_outcome = Some(Arc::clone(&outcome));
        self.session.current_run = Some(run_id);
        self.session.runs_started += 1;
        self.session.last_normalization = Some(report);

        let snapshot = self.grid.snapshot(Some(run_id), Some(outcome.id.clone()));
        self.observers.board_changed(&snapshot);

        let strategy = build_strategy(self.fill_mode, &self.config);
        let (sequencer, mut env, _) = self.split();
        sequencer.start(run_id, outcome, CancelToken::new(), strategy, &mut env);
        run_id
    }

    /// Cancel any active run and show a blank board
    pub fn clear(&mut self) {
        self.cancel_active();
        let shape = self.config.board;
        self.grid.rebuild(shape, &shape.blank_grid(), &mut self.renderer, &self.metrics);

        self.session.current_outcome = None;
        self.session.current_run = None;

        let snapshot = self.grid.snapshot(None, None);
        self.observers.board_changed(&snapshot);
        log::info!("[Replay] Board cleared");
    }

    /// Recompute layout and move every visual. Phase and timers are untouched.
    pub fn resize(&mut self, container: ContainerSize) {
        self.container = container;
        self.metrics = resolve_metrics(self.config.board, container, &self.config.layout);
        self.grid.reposition(&mut self.renderer, &self.metrics);
        log::debug!(
            "[Replay] Resized to {:.0}x{:.0}, cell {:.1}px",
            container.width,
            container.height,
            self.metrics.cell_size
        );
    }

    /// Advance the clock, firing every timer due on the way.
    /// Returns the number of timers fired.
    pub fn advance(&mut self, delta_ms: Millis) -> usize {
        let target = self.scheduler.now_ms().saturating_add(delta_ms);
        let mut fired = 0;
        while let Some(scheduled) = self.scheduler.pop_due(target) {
            if !scheduled.is_live() {
                log::trace!("[Replay] Skipping cancelled timer {:?}", scheduled.task);
                continue;
            }
            self.dispatch(scheduled.task);
            fired += 1;
        }
        self.scheduler.advance_clock_to(target);
        fired
    }

    /// Drive the clock until no live timer remains; returns elapsed ms
    pub fn run_until_idle(&mut self) -> Millis {
        let start = self.scheduler.now_ms();
        let mut fired = 0;
        while let Some(due) = self.scheduler.next_live_due() {
            if fired >= MAX_IDLE_TASKS {
                log::warn!("[Replay] run_until_idle stopped after {} timers", fired);
                break;
            }
            let delta = due.saturating_sub(self.scheduler.now_ms());
            fired += self.advance(delta);
        }
        self.scheduler.now_ms() - start
    }

    /// Open the cross-thread command queue, replacing any previous one
    pub fn command_channel(&mut self, capacity: usize) -> ReplayCommandSender {
        let (tx, rx) = RingBuffer::new(capacity.max(1));
        self.commands = Some(rx);
        ReplayCommandSender { tx }
    }

    /// Apply queued commands, then advance the clock
    pub fn pump(&mut self, delta_ms: Millis) -> usize {
        while let Some(command) = self.commands.as_mut().and_then(|rx| rx.pop().ok()) {
            self.apply(command);
        }
        self.advance(delta_ms)
    }

    pub fn apply(&mut self, command: ReplayCommand) {
        match command {
            ReplayCommand::Submit(outcome) => {
                self.submit(*outcome);
            }
            ReplayCommand::Clear => self.clear(),
            ReplayCommand::Resize(container) => self.resize(container),
            ReplayCommand::SetFillMode(mode) => self.set_fill_mode(mode),
        }
    }

    fn cancel_active(&mut self) {
        if let Some(run_id) = self.sequencer.cancel() {
            self.session.runs_cancelled += 1;
            log::info!("[Replay] Run {} superseded", run_id);
        }
        let purged = self.scheduler.purge_cancelled();
        if purged > 0 {
            log::trace!("[Replay] Purged {} cancelled timer(s)", purged);
        }
    }

    fn dispatch(&mut self, task: SequencerTask) {
        let (sequencer, mut env, session) = self.split();
        if let Some(summary) = sequencer.handle(task, &mut env) {
            session.runs_completed += 1;
            session.last_summary = Some(summary);
        }
    }

    fn split(&mut self) -> (&mut StepSequencer, SequencerEnv<'_>, &mut SessionState) {
        let env = SequencerEnv {
            grid: &mut self.grid,
            renderer: &mut self.renderer,
            metrics: &self.metrics,
            timing: &self.config.timing,
            scheduler: &mut self.scheduler,
            observers: &mut self.observers,
            trigger_symbol: &self.config.trigger_symbol,
        };
        (&mut self.sequencer, env, &mut self.session)
    }
}

impl<R: CellRenderer> OutcomeSink for ReplayController<R> {
    fn on_outcome_received(&mut self, outcome: Outcome) -> ReplayResult<()> {
        self.submit(outcome);
        Ok(())
    }
}

fn log_normalization(outcome_id: &str, report: &NormalizationReport) {
    let faults = [
        ("grid(s) reshaped", report.grids_reshaped),
        ("out-of-range coordinate(s) dropped", report.coordinates_dropped),
        ("drop-in column(s) dropped", report.drop_in_columns_dropped),
        ("trigger count(s) clamped", report.trigger_counts_clamped),
        ("win(s) clamped", report.wins_clamped),
    ];
    for (what, count) in faults.into_iter().filter(|(_, n)| *n > 0) {
        log::warn!("[Replay] Outcome '{}': {} {}", outcome_id, count, what);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventRecorder, ReplayEvent};
    use crate::timing::TimingConfig;
    use rf_outcome::{BoardShape, MatchStep, grid_from_rows};

    fn config() -> ReplayConfig {
        ReplayConfig::default()
            .with_board(BoardShape::new(2, 2))
            .with_fill_mode(FillMode::Replace)
            .with_timing(TimingConfig::turbo())
    }

    fn outcome() -> Outcome {
        Outcome::new("c1", grid_from_rows(&[&["A", "B"], &["C", "D"]]))
            .with_step(
                MatchStep::new([CellCoordinate::new(0, 0)], 1.0, grid_from_rows(&[&["E", "B"], &["C", "D"]])).into(),
            )
            .with_summed_total_win()
    }

    fn controller() -> (ReplayController<HeadlessRenderer>, EventRecorder) {
        let mut c = ReplayController::headless(config()).unwrap();
        let recorder = EventRecorder::new();
        c.add_observer(Box::new(recorder.clone()));
        (c, recorder)
    }

    #[test]
    fn test_new_shows_blank_board() {
        let (c, _) = controller();
        assert!(c.grid().is_consistent());
        assert!(c.grid().symbols().iter().flatten().all(|s| s.is_blank()));
        assert_eq!(c.phase(), SequencePhase::Idle);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let bad = ReplayConfig::default().with_board(BoardShape::new(0, 0));
        assert!(ReplayController::headless(bad).is_err());
    }

    #[test]
    fn test_submit_runs_to_completion() {
        let (mut c, recorder) = controller();
        let run = c.submit(outcome());
        assert_eq!(c.phase(), SequencePhase::Intro);

        let elapsed = c.run_until_idle();
        assert!(elapsed > 0);
        assert_eq!(c.phase(), SequencePhase::Done);
        assert_eq!(c.session().runs_completed, 1);
        assert_eq!(c.session().last_summary.as_ref().unwrap().run_id, run);
        assert_eq!(recorder.trace().completions(), 1);
        assert_eq!(c.grid().symbols(), &grid_from_rows(&[&["E", "B"], &["C", "D"]]));
        assert_eq!(c.pending_timers(), 0);
    }

    #[test]
    fn test_submit_during_run_cancels_previous() {
        let (mut c, recorder) = controller();
        let first = c.submit(outcome());
        c.advance(10);
        let second = c.submit(Outcome::new("c2", grid_from_rows(&[&["X", "Y"], &["Z", "W"]])));

        assert_eq!(c.session().runs_cancelled, 1);
        assert_eq!(c.grid().symbols(), &grid_from_rows(&[&["X", "Y"], &["Z", "W"]]));
        assert_eq!(c.renderer().live_count(), 4);

        c.run_until_idle();
        let trace = recorder.trace();
        assert!(trace.events_of(first).is_empty());
        assert_eq!(trace.events_of(second).len(), 1);
        assert_eq!(trace.board_changes.len(), 2);
    }

    #[test]
    fn test_clear_cancels_and_blanks() {
        let (mut c, recorder) = controller();
        c.submit(outcome());
        c.clear();
        c.run_until_idle();

        assert!(recorder.trace().events.is_empty());
        assert!(c.grid().symbols().iter().flatten().all(|s| s.is_blank()));
        assert_eq!(c.phase(), SequencePhase::Idle);
        assert!(c.session().current_outcome.is_none());
    }

    #[test]
    fn test_fill_mode_applies_to_next_run() {
        let (mut c, _) = controller();
        c.submit(outcome());
        c.set_fill_mode(FillMode::Cascade);
        assert_eq!(c.sequencer.run().unwrap().fill_mode(), FillMode::Replace);

        c.submit(outcome());
        assert_eq!(c.strategy().unwrap().mode(), FillMode::Cascade);
    }

    #[test]
    fn test_command_queue_is_drained_by_pump() {
        let (mut c, recorder) = controller();
        let mut sender = c.command_channel(2);
        sender.set_fill_mode(FillMode::ReelSpin).unwrap();
        sender.on_outcome_received(outcome()).unwrap();
        assert!(matches!(sender.clear(), Err(ReplayError::CommandQueueFull)));

        c.pump(0);
        assert_eq!(c.fill_mode(), FillMode::ReelSpin);
        assert_eq!(c.session().runs_started, 1);

        c.run_until_idle();
        assert_eq!(
            recorder.event_list().last(),
            Some(&ReplayEvent::SequenceCompleted { total_steps: 1 })
        );
    }

    #[test]
    fn test_sender_works_across_threads() {
        let (mut c, recorder) = controller();
        let mut sender = c.command_channel(8);
        std::thread::spawn(move || {
            sender.submit(outcome()).unwrap();
        })
        .join()
        .unwrap();

        c.pump(0);
        c.run_until_idle();
        assert_eq!(recorder.trace().completions(), 1);
    }
}
