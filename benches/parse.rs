use criterion::{criterion_group, criterion_main, BatchSize, Criterion, Throughput};

use one_brc::parse::parse_line;
use one_brc::worker::Partial;

const STATIONS: &[&str] = &[
    "Abha", "Accra", "Bergen", "Bulawayo", "Cracow", "Hamburg", "Palembang", "St. John's",
    "Tokyo", "Zürich",
];

fn sample(lines: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(lines * 16);
    for i in 0..lines {
        let tenths = (i as i64 * 7919) % 1999 - 999;
        let sign = if tenths < 0 { "-" } else { "" };
        let abs = tenths.abs();
        out.extend_from_slice(
            format!("{};{sign}{}.{}\n", STATIONS[i % STATIONS.len()], abs / 10, abs % 10)
                .as_bytes(),
        );
    }
    out
}

fn parse(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("parse");
    group.bench_function("line", |b| {
        b.iter(|| parse_line(std::hint::black_box(b"St. John's;-12.3")))
    });

    let chunk = sample(100_000);
    group.throughput(Throughput::Bytes(chunk.len() as u64));
    group.bench_function("fold_chunk", |b| {
        b.iter_batched(
            Partial::new,
            |mut partial| {
                partial.fold_chunk(&chunk);
                partial
            },
            BatchSize::SmallInput,
        )
    });
    group.finish();
}

criterion_group!(benches, parse);
criterion_main!(benches);
