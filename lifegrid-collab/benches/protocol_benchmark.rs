use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use lifegrid_collab::protocol::{Envelope, Inbound, WireMessage, WorldData};
use lifegrid_core::{pack_rows, Player, Rgb};

fn sample_world(size: u64) -> WorldData {
    let cells = pack_rows(size, size, |x, y| {
        ((x * 7 + y * 13) % 11 == 0).then_some((Rgb::new(0x20, 0x80, 0xF0), 100))
    });
    WorldData {
        width: size as i64,
        height: size as i64,
        cells,
        tick: 1,
        paused: false,
    }
}

fn bench_world_encode(c: &mut Criterion) {
    let world = sample_world(500);
    c.bench_function("world_encode_500x500", |b| {
        b.iter(|| black_box(black_box(&world).encode()))
    });
}

fn bench_world_decode(c: &mut Criterion) {
    let frame = Inbound::World(sample_world(500)).encode();
    c.bench_function("world_decode_500x500", |b| {
        b.iter(|| {
            let envelope = Envelope::decode(black_box(frame.clone())).unwrap();
            black_box(Inbound::decode(&envelope).unwrap());
        })
    });
}

fn bench_roster_decode(c: &mut Criterion) {
    let players = (0..1000)
        .map(|i| Player::new(format!("player-{i}"), i << 8))
        .collect();
    let frame = Inbound::Roster(players).encode();
    c.bench_function("roster_decode_1000", |b| {
        b.iter(|| {
            let envelope = Envelope::decode(black_box(frame.clone())).unwrap();
            black_box(Inbound::decode(&envelope).unwrap());
        })
    });
}

criterion_group!(benches, bench_world_encode, bench_world_decode, bench_roster_decode);
criterion_main!(benches);
