//! Step sequencer
//!
//! Drives one outcome through its phases on the scheduler clock:
//!
//! ```text
//! Idle → Intro → (per step: Highlight | Remove → Refill) → Pause → … → Done
//! ```
//!
//! Every timer the sequencer schedules carries the run's [`CancelToken`];
//! the controller drops tasks whose token was cancelled before they reach
//! [`StepSequencer::handle`].

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;

use rf_outcome::{BonusStep, CascadeStep, CellCoordinate, MatchStep, Outcome, Symbol};

use crate::event::{EventMeta, ObserverSet, ReplayEvent};
use crate::fill::{FillContext, FillMode, FillStrategy, FillTask};
use crate::grid::GridState;
use crate::layout::Metrics;
use crate::render::{CellRenderer, Easing, EffectKind, Tween};
use crate::scheduler::{CancelToken, Scheduler};
use crate::timing::{Millis, TimingConfig};
use crate::RunId;

/// Wins closer than this count as equal
const WIN_EPSILON: f64 = 1e-9;

/// Highlight pulse peak scale
const HIGHLIGHT_SCALE: f64 = 1.15;

/// Sequencer timer payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencerTask {
    IntroComplete,
    BeginStep(usize),
    RemovalComplete(usize),
    RefillComplete(usize),
    HighlightComplete(usize),
    Fill(FillTask),
}

/// Current phase of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "phase", content = "step", rename_all = "snake_case")]
pub enum SequencePhase {
    #[default]
    Idle,
    Intro,
    Highlight(usize),
    Remove(usize),
    Refill(usize),
    /// Waiting before the given step
    Pause(usize),
    Done,
}

impl SequencePhase {
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Idle | Self::Done)
    }
}

/// Result of a finished run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub run_id: RunId,
    pub total_steps: usize,
    pub accumulated_win: f64,
    pub expected_win: f64,
    pub started_at_ms: Millis,
    pub completed_at_ms: Millis,
}

impl RunSummary {
    pub fn elapsed_ms(&self) -> Millis {
        self.completed_at_ms - self.started_at_ms
    }

    pub fn win_matches(&self) -> bool {
        (self.accumulated_win - self.expected_win).abs() <= WIN_EPSILON
    }
}

/// Collaborators borrowed for one sequencer call
pub struct SequencerEnv<'a> {
    pub grid: &'a mut GridState,
    pub renderer: &'a mut dyn CellRenderer,
    pub metrics: &'a Metrics,
    pub timing: &'a TimingConfig,
    pub scheduler: &'a mut Scheduler<SequencerTask>,
    pub observers: &'a mut ObserverSet,
    pub trigger_symbol: &'a Symbol,
}

impl SequencerEnv<'_> {
    fn fill_context(&mut self) -> FillContext<'_> {
        FillContext::new(self.grid, self.renderer, self.metrics, self.timing)
    }
}

/// State of the run being sequenced
#[derive(Debug)]
pub struct SequenceRun {
    pub id: RunId,
    pub outcome: Arc<Outcome>,
    pub phase: SequencePhase,
    pub accumulated_win: f64,
    pub started_at_ms: Millis,
    /// Cells highlighted by the most recent bonus step
    pub highlighted: Vec<CellCoordinate>,
    token: CancelToken,
    strategy: Box<dyn FillStrategy>,
}

impl SequenceRun {
    pub fn token(&self) -> &CancelToken {
        &self.token
    }

    pub fn fill_mode(&self) -> FillMode {
        self.strategy.mode()
    }
}

/// Phase machine for one run at a time
#[derive(Debug, Default)]
pub struct StepSequencer {
    run: Option<SequenceRun>,
}

impl StepSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn run(&self) -> Option<&SequenceRun> {
        self.run.as_ref()
    }

    pub fn phase(&self) -> SequencePhase {
        self.run.as_ref().map(|r| r.phase).unwrap_or_default()
    }

    pub fn is_active(&self) -> bool {
        self.phase().is_active()
    }

    /// Strategy of the current (or last finished) run
    pub fn strategy(&self) -> Option<&dyn FillStrategy> {
        self.run.as_ref().map(|r| r.strategy.as_ref())
    }

    /// Begin a run. The grid must already hold the outcome's initial board.
    pub fn start(
        &mut self,
        id: RunId,
        outcome: Arc<Outcome>,
        token: CancelToken,
        strategy: Box<dyn FillStrategy>,
        env: &mut SequencerEnv<'_>,
    ) {
        log::info!(
            "[Sequencer] Run {} started: outcome '{}', {} step(s), {} fill",
            id,
            outcome.id,
            outcome.step_count(),
            strategy.mode()
        );
        let mut run = SequenceRun {
            id,
            outcome,
            phase: SequencePhase::Intro,
            accumulated_win: 0.0,
            started_at_ms: env.scheduler.now_ms(),
            highlighted: Vec::new(),
            token,
            strategy,
        };

        let mut ctx = env.fill_context();
        let duration = run.strategy.intro(&mut ctx);
        let deferred = ctx.take_deferred();
        Self::schedule_fill(env, &run.token, deferred);
        env.scheduler.schedule_in(duration, run.token.clone(), SequencerTask::IntroComplete);

        self.run = Some(run);
    }

    /// Cancel the current run, returning its id if it was still active
    pub fn cancel(&mut self) -> Option<RunId> {
        let run = self.run.take()?;
        run.token.cancel();
        if run.phase.is_active() {
            log::info!("[Sequencer] Run {} cancelled in {:?}", run.id, run.phase);
            Some(run.id)
        } else {
            None
        }
    }

    /// Process one due task. Returns the summary when the run completes.
    pub fn handle(&mut self, task: SequencerTask, env: &mut SequencerEnv<'_>) -> Option<RunSummary> {
        let run = self.run.as_mut()?;
        if run.token.is_cancelled() {
            return None;
        }

        match task {
            SequencerTask::IntroComplete => {
                run.strategy.finish(&mut env.fill_context());
                Self::next_step(run, env, 0)
            }
            SequencerTask::BeginStep(index) => {
                Self::begin_step(run, env, index);
                None
            }
            SequencerTask::RemovalComplete(index) => {
                Self::begin_refill(run, env, index);
                None
            }
            SequencerTask::RefillComplete(index) => {
                Self::complete_refill(run, env, index);
                Self::next_step(run, env, index + 1)
            }
            SequencerTask::HighlightComplete(index) => Self::next_step(run, env, index + 1),
            SequencerTask::Fill(fill_task) => {
                let mut ctx = env.fill_context();
                run.strategy.on_task(&mut ctx, fill_task);
                let deferred = ctx.take_deferred();
                Self::schedule_fill(env, &run.token, deferred);
                None
            }
        }
    }

    fn schedule_fill(env: &mut SequencerEnv<'_>, token: &CancelToken, deferred: Vec<(Millis, FillTask)>) {
        for (delay, task) in deferred {
            env.scheduler.schedule_in(delay, token.clone(), SequencerTask::Fill(task));
        }
    }

    fn emit(run: &SequenceRun, env: &mut SequencerEnv<'_>, event: ReplayEvent) {
        let meta = EventMeta {
            run_id: run.id,
            at_ms: env.scheduler.now_ms(),
        };
        env.observers.emit(&event, meta);
    }

    /// Move to step `index`, pausing first unless it is the first step
    fn next_step(run: &mut SequenceRun, env: &mut SequencerEnv<'_>, index: usize) -> Option<RunSummary> {
        let total = run.outcome.steps.len();
        if index >= total {
            return Some(Self::complete(run, env));
        }
        if index == 0 {
            Self::begin_step(run, env, 0);
        } else {
            run.phase = SequencePhase::Pause(index);
            env.scheduler.schedule_in(
                env.timing.inter_step_pause_ms,
                run.token.clone(),
                SequencerTask::BeginStep(index),
            );
        }
        None
    }

    fn begin_step(run: &mut SequenceRun, env: &mut SequencerEnv<'_>, index: usize) {
        let outcome = Arc::clone(&run.outcome);
        let Some(step) = outcome.steps.get(index) else {
            return;
        };
        let total = outcome.steps.len();
        log::debug!("[Sequencer] Run {} step {}/{} ({})", run.id, index + 1, total, step.type_name());
        Self::emit(run, env, ReplayEvent::StepStarted { index, total });

        match step {
            CascadeStep::Bonus(bonus) => Self::begin_highlight(run, env, index, bonus),
            CascadeStep::Match(matched) => Self::begin_removal(run, env, index, matched),
        }
    }

    fn begin_highlight(run: &mut SequenceRun, env: &mut SequencerEnv<'_>, index: usize, bonus: &BonusStep) {
        run.phase = SequencePhase::Highlight(index);
        let cells = resolve_trigger_cells(env.grid, bonus, env.trigger_symbol);
        if cells.len() < bonus.trigger_count as usize {
            log::warn!(
                "[Sequencer] Bonus step {} wants {} trigger cell(s), found {}",
                index,
                bonus.trigger_count,
                cells.len()
            );
        }

        let highlight_ms = env.timing.highlight_ms;
        for &coord in &cells {
            let (x, y) = env.metrics.cell_center(coord);
            let seed = env.grid.symbol(coord).map(Symbol::color_seed).unwrap_or_default();
            env.renderer.play_effect(EffectKind::Highlight, x, y, seed);
            if let Some(handle) = env.grid.handle(coord) {
                env.renderer.animate(
                    handle,
                    &[Tween::scale(HIGHLIGHT_SCALE, 1.0)],
                    highlight_ms,
                    Easing::EaseOutBack,
                );
            }
        }
        run.highlighted = cells;

        Self::emit(
            run,
            env,
            ReplayEvent::BonusTriggered {
                payload: bonus.bonus_payload.clone(),
            },
        );
        env.scheduler.schedule_in(highlight_ms, run.token.clone(), SequencerTask::HighlightComplete(index));
    }

    fn begin_removal(run: &mut SequenceRun, env: &mut SequencerEnv<'_>, index: usize, matched: &MatchStep) {
        run.phase = SequencePhase::Remove(index);
        let remove_ms = env.timing.remove_ms;
        let shape = env.grid.shape();

        for &coord in matched.remove_cells.iter().filter(|c| shape.contains(**c)) {
            let (x, y) = env.metrics.cell_center(coord);
            let seed = env.grid.symbol(coord).map(Symbol::color_seed).unwrap_or_default();
            env.renderer.play_effect(EffectKind::Burst, x, y, seed);
            if let Some(handle) = env.grid.handle(coord) {
                env.renderer.animate(
                    handle,
                    &[Tween::scale(1.0, 0.0), Tween::alpha(1.0, 0.0)],
                    remove_ms,
                    Easing::EaseInQuad,
                );
            }
        }

        if matched.win_for_step > 0.0 {
            run.accumulated_win += matched.win_for_step;
            Self::emit(
                run,
                env,
                ReplayEvent::WinIncremented {
                    amount: matched.win_for_step,
                },
            );
        }
        env.scheduler.schedule_in(remove_ms, run.token.clone(), SequencerTask::RemovalComplete(index));
    }

    fn begin_refill(run: &mut SequenceRun, env: &mut SequencerEnv<'_>, index: usize) {
        let outcome = Arc::clone(&run.outcome);
        let Some(CascadeStep::Match(matched)) = outcome.steps.get(index) else {
            return;
        };
        run.phase = SequencePhase::Refill(index);

        let mut ctx = env.fill_context();
        let duration =
            run.strategy
                .apply_refill(&mut ctx, &matched.remove_cells, &matched.drop_in, &matched.grid_after);
        let deferred = ctx.take_deferred();
        Self::schedule_fill(env, &run.token, deferred);
        env.scheduler.schedule_in(duration, run.token.clone(), SequencerTask::RefillComplete(index));
    }

    fn complete_refill(run: &mut SequenceRun, env: &mut SequencerEnv<'_>, index: usize) {
        run.strategy.finish(&mut env.fill_context());

        let outcome = Arc::clone(&run.outcome);
        let Some(CascadeStep::Match(matched)) = outcome.steps.get(index) else {
            return;
        };
        let corrections = env.grid.reconcile(&matched.grid_after, env.renderer, env.metrics);
        if corrections > 0 {
            log::warn!(
                "[Sequencer] Step {} refill disagreed with grid_after in {} cell(s), corrected",
                index,
                corrections
            );
        }
    }

    fn complete(run: &mut SequenceRun, env: &mut SequencerEnv<'_>) -> RunSummary {
        run.phase = SequencePhase::Done;
        let total_steps = run.outcome.steps.len();
        Self::emit(run, env, ReplayEvent::SequenceCompleted { total_steps });

        let summary = RunSummary {
            run_id: run.id,
            total_steps,
            accumulated_win: run.accumulated_win,
            expected_win: run.outcome.total_win,
            started_at_ms: run.started_at_ms,
            completed_at_ms: env.scheduler.now_ms(),
        };
        if !summary.win_matches() {
            log::warn!(
                "[Sequencer] Run {} accumulated win {} differs from total_win {}",
                run.id,
                summary.accumulated_win,
                summary.expected_win
            );
        }
        log::info!("[Sequencer] Run {} completed in {}ms", run.id, summary.elapsed_ms());
        summary
    }
}

/// Cells to highlight for a bonus step.
///
/// Explicit `trigger_cells` are used when every listed cell currently holds
/// the trigger symbol; otherwise the board is scanned row-major and the first
/// `trigger_count` matches are taken. Repeated cells count once.
pub fn resolve_trigger_cells(grid: &GridState, bonus: &BonusStep, trigger: &Symbol) -> Vec<CellCoordinate> {
    let count = bonus.trigger_count as usize;
    if let Some(cells) = bonus.trigger_cells.as_ref().filter(|c| !c.is_empty()) {
        if cells.iter().all(|&c| grid.symbol(c) == Some(trigger)) {
            let mut seen = BTreeSet::new();
            return cells.iter().copied().filter(|c| seen.insert(*c)).take(count).collect();
        }
        log::debug!("[Sequencer] trigger_cells do not hold '{}', scanning board", trigger);
    }
    grid.find_symbol(trigger, count)
}
