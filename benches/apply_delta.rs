//! Performance benchmarks for a3s-state
//!
//! Run with: cargo bench

use a3s_state::reading_list::{add_item, list_items};
use a3s_state::{MemorySessionService, SessionService, StateAccess, StateDelta, StateEvent, StateStore};
use criterion::{criterion_group, criterion_main, Criterion};

fn bench_apply_delta(c: &mut Criterion) {
    let store = StateStore::new();

    c.bench_function("apply_delta (3 keys)", |b| {
        b.iter(|| {
            store
                .apply_delta(
                    StateDelta::new()
                        .set("task_status", "active")
                        .set("user:login_count", 1)
                        .set("temp:validation_needed", true),
                )
                .unwrap()
        });
    });

    let mut group = c.benchmark_group("snapshot");
    for count in [10, 100, 1000] {
        let store = StateStore::new();
        let mut delta = StateDelta::new();
        for i in 0..count {
            delta.insert(format!("key_{}", i), serde_json::json!({"i": i}));
        }
        store.apply_delta(delta).unwrap();

        group.bench_function(format!("{} keys", count), |b| {
            b.iter(|| store.snapshot());
        });
    }
    group.finish();
}

fn bench_reading_list(c: &mut Criterion) {
    let store = StateStore::new();
    for i in 0..200 {
        let status = if i % 3 == 0 { "done" } else { "queued" };
        add_item(&store, &format!("Book {}", i), "", ["bench"], Some(status), "").unwrap();
    }

    c.bench_function("list_items (200, status filter)", |b| {
        b.iter(|| list_items(&store, Some("done"), None).unwrap());
    });
}

fn bench_append_event(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("MemorySessionService append_event", |b| {
        b.to_async(&rt).iter(|| async {
            let service = MemorySessionService::new();
            let mut session = service.create_session("bench", "u", None, None).await.unwrap();
            service
                .append_event(
                    &mut session,
                    StateEvent::new("system", StateDelta::new().set("k", "v")),
                )
                .await
                .unwrap()
        });
    });
}

criterion_group!(
    benches,
    bench_apply_delta,
    bench_reading_list,
    bench_append_event,
);
criterion_main!(benches);
