use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use sunhotels_sync::engine::reconcile;
use sunhotels_sync::model::StaticLookup;

fn lookup_rows(count: usize, renamed_every: usize) -> (Vec<StaticLookup>, Vec<StaticLookup>) {
    let now = Utc::now();
    let existing: Vec<StaticLookup> = (0..count)
        .map(|i| StaticLookup {
            id: i as i64 + 1,
            external_id: i as i32,
            language: "en".to_string(),
            name: format!("Lookup {i}"),
            created_at: now,
            last_synced_at: now,
        })
        .collect();
    let fetched: Vec<StaticLookup> = (0..count)
        .map(|i| StaticLookup {
            id: 0,
            external_id: i as i32,
            language: "en".to_string(),
            name: if i % renamed_every == 0 {
                format!("Lookup {i} renamed")
            } else {
                format!("Lookup {i}")
            },
            created_at: now,
            last_synced_at: now,
        })
        .collect();
    (existing, fetched)
}

pub fn reconcile_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconcile_lookups");

    for size in [1_000usize, 10_000, 50_000].iter() {
        let (existing, fetched) = lookup_rows(*size, 20);
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                let set = reconcile(black_box(existing.clone()), black_box(fetched.clone()));
                black_box(set.updates.len() + set.unchanged)
            })
        });
    }
    group.finish();
}

criterion_group!(benches, reconcile_benchmark);
criterion_main!(benches);
