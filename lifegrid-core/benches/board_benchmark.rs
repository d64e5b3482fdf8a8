use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;
use lifegrid_core::{pack_rows, BoardSnapshot, Rgb};

/// 1000×1000 board with roughly 2% of cells alive.
fn sparse_board() -> BoardSnapshot {
    let cells = pack_rows(1000, 1000, |x, y| {
        ((x * 31 + y * 17) % 50 == 0).then_some((Rgb::new(200, 40, 90), 127))
    });
    BoardSnapshot::new(1000, 1000, 1, false, cells)
}

fn bench_alive_cells(c: &mut Criterion) {
    let board = sparse_board();

    c.bench_function("alive_cells_1000x1000_sparse", |b| {
        b.iter(|| black_box(board.alive_cells().count()))
    });
}

fn bench_change_token(c: &mut Criterion) {
    let board = sparse_board();

    c.bench_function("change_token_1000x1000_sparse", |b| {
        b.iter(|| {
            black_box(lifegrid_core::ChangeToken::digest(
                black_box(board.width()),
                black_box(board.height()),
                black_box(board.cells()),
            ))
        })
    });
}

fn bench_dense_expand(c: &mut Criterion) {
    let board = sparse_board();

    c.bench_function("dense_expand_1000x1000", |b| {
        b.iter(|| black_box(board.to_dense()))
    });
}

criterion_group!(benches, bench_alive_cells, bench_change_token, bench_dense_expand);
criterion_main!(benches);
