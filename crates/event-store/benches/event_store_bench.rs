use common::AggregateId;
use criterion::{Criterion, criterion_group, criterion_main};
use event_store::{
    AppendOptions, Commit, EventEnvelope, EventStore, InMemoryEventStore, StreamAppend, UniqueKey,
    Version,
};

fn event(aggregate_id: AggregateId, version: i64) -> EventEnvelope {
    EventEnvelope::new(
        aggregate_id,
        "Product",
        "StockReserved",
        Version::new(version),
        serde_json::json!({"type": "StockReserved", "data": {"quantity": 1}}),
    )
}

fn bench_single_stream_append(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("event_store/append_single_stream", |b| {
        b.iter(|| {
            rt.block_on(async {
                let store = InMemoryEventStore::new();
                let id = AggregateId::new();
                store
                    .append(vec![event(id, 1)], AppendOptions::expect_new())
                    .await
                    .unwrap();
            });
        });
    });
}

/// Shape of an order placement: order, cart, payment, notifications and
/// a handful of product streams, plus key claims.
fn bench_order_shaped_commit(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("event_store/commit_order_shaped", |b| {
        b.iter(|| {
            rt.block_on(async {
                let store = InMemoryEventStore::new();
                let mut commit = Commit::new();
                for _ in 0..8 {
                    let id = AggregateId::new();
                    commit = commit.with_stream(StreamAppend {
                        aggregate_id: id,
                        expected_version: Some(Version::initial()),
                        events: vec![event(id, 1)],
                    });
                }
                let owner = AggregateId::new();
                commit = commit
                    .claim(UniqueKey::new("cart_order", owner), owner)
                    .claim(UniqueKey::new("order_number", owner), owner);
                store.commit(commit).await.unwrap();
            });
        });
    });
}

fn bench_replay_hot_stream(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryEventStore::new();
    let id = AggregateId::new();
    rt.block_on(async {
        let events: Vec<_> = (1..=200).map(|v| event(id, v)).collect();
        store.append(events, AppendOptions::expect_new()).await.unwrap();
    });

    c.bench_function("event_store/read_200_event_stream", |b| {
        b.iter(|| {
            rt.block_on(async {
                store.get_events_for_aggregate(id).await.unwrap();
            });
        });
    });
}

criterion_group!(
    benches,
    bench_single_stream_append,
    bench_order_shaped_commit,
    bench_replay_hot_stream
);
criterion_main!(benches);
