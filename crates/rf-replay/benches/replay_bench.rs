//! Full replay benchmarks

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use rf_outcome::{BoardShape, CellCoordinate, MatchStep, Outcome, Symbol, SymbolGrid};
use rf_replay::{ContainerSize, FillMode, LayoutConfig, ReplayConfig, ReplayController, TimingConfig, resolve_metrics};

fn board(shape: BoardShape, salt: usize) -> SymbolGrid {
    const NAMES: [&str; 6] = ["A", "K", "Q", "J", "10", "9"];
    (0..shape.rows)
        .map(|row| {
            (0..shape.cols)
                .map(|col| Symbol::new(NAMES[(row * 7 + col * 3 + salt) % NAMES.len()]))
                .collect()
        })
        .collect()
}

/// Ten cascades, each removing one diagonal
fn cascade_outcome(shape: BoardShape) -> Outcome {
    let mut outcome = Outcome::new("bench", board(shape, 0));
    for step in 0..10 {
        let cells = (0..shape.rows.min(shape.cols)).map(|i| CellCoordinate::new(i, (i + step) % shape.cols));
        outcome = outcome.with_step(MatchStep::new(cells, 1.5, board(shape, step + 1)).into());
    }
    outcome.with_summed_total_win()
}

fn bench_full_replay(c: &mut Criterion) {
    let shape = BoardShape::tumble_5x6();
    let outcome = cascade_outcome(shape);
    let mut group = c.benchmark_group("full_replay_5x6");

    for mode in FillMode::ALL {
        let config = ReplayConfig::default()
            .with_board(shape)
            .with_fill_mode(mode)
            .with_timing(TimingConfig::turbo());
        let mut controller = ReplayController::headless(config).unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(mode), &outcome, |b, outcome| {
            b.iter(|| {
                controller.submit(black_box(outcome.clone()));
                black_box(controller.run_until_idle())
            })
        });
    }
    group.finish();
}

fn bench_resolve_metrics(c: &mut Criterion) {
    let layout = LayoutConfig::default();
    c.bench_function("resolve_metrics", |b| {
        b.iter(|| {
            resolve_metrics(
                black_box(BoardShape::tumble_5x6()),
                black_box(ContainerSize::new(1280.0, 720.0)),
                &layout,
            )
        })
    });
}

criterion_group!(benches, bench_full_replay, bench_resolve_metrics);
criterion_main!(benches);
