//! Benchmarks for enqueue throughput and drain latency.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use operation_queue::core::{
    Operation, OperationQueue, Outcome, QueuedObject, RecordFailures, TolerateFailures,
};
use operation_queue::runtime::TokioSpawner;
use tokio::runtime::Runtime;

#[derive(Debug, Clone)]
struct Payload;

impl QueuedObject for Payload {}

struct NoopOperation;

#[async_trait]
impl Operation for NoopOperation {
    async fn run(&self) -> Outcome {
        Outcome::Success
    }

    fn request_cancel(&self) {}
}

fn enqueue_throughput(c: &mut Criterion) {
    let rt = Runtime::new().expect("runtime");
    let mut group = c.benchmark_group("enqueue");
    for size in [100_u64, 1_000, 10_000] {
        group.throughput(Throughput::Elements(size));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.to_async(&rt).iter(|| async move {
                let queue: OperationQueue<Payload, TokioSpawner> =
                    OperationQueue::new(Arc::new(RecordFailures), TokioSpawner::current());
                queue.queue_objects((0..size).map(|_| Payload));
                queue.total_count()
            });
        });
    }
    group.finish();
}

fn drain_latency(c: &mut Criterion) {
    let rt = Runtime::new().expect("runtime");
    let mut group = c.benchmark_group("drain");
    group.measurement_time(Duration::from_secs(10));
    for ceiling in [1_u32, 4, 16] {
        group.bench_with_input(
            BenchmarkId::new("noop_256", ceiling),
            &ceiling,
            |b, &ceiling| {
                b.to_async(&rt).iter(|| async move {
                    let queue: OperationQueue<Payload, TokioSpawner> =
                        OperationQueue::new(Arc::new(TolerateFailures), TokioSpawner::current());
                    queue.set_max_concurrent_operations(ceiling);
                    for _ in 0..256 {
                        queue.queue_operation(Arc::new(NoopOperation));
                    }
                    queue.start_processing();
                    queue.wait_until_finished().await
                });
            },
        );
    }
    group.finish();
}

criterion_group!(benches, enqueue_throughput, drain_latency);
criterion_main!(benches);
