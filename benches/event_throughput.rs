//! Event throughput benchmark suite.
//!
//! Measures the event hot path at different batch sizes:
//! - Buffer appends and drains
//! - Emit through a page emitter into a logger, flushed as JSONL
//!
//! Run with: cargo bench --bench event_throughput
//! Results saved to: target/criterion/

use std::hint::black_box;
use std::sync::Arc;

use browserve::{
    BrowserLogger, Event, EventBase, LogBuffer, LoggingConfig, Page,
    events::{InteractionAction, InteractionEvent},
};
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use tokio::runtime::Runtime;

// ============================================================================
// Benchmark Parameters
// ============================================================================

const BATCH_SIZES: &[usize] = &[100, 1_000, 5_000];

// ============================================================================
// Fixtures
// ============================================================================

fn click_event(index: usize) -> Event {
    let base = EventBase::new("https://example.com", "bench-session")
        .unwrap()
        .with_metadata("index", index);
    InteractionEvent::new(base, InteractionAction::Click, "#submit")
        .unwrap()
        .into()
}

// ============================================================================
// Benchmark: Buffer
// ============================================================================

fn bench_buffer(c: &mut Criterion) {
    let mut group = c.benchmark_group("log_buffer");
    let events: Vec<Arc<Event>> = (0..BATCH_SIZES[BATCH_SIZES.len() - 1])
        .map(|i| Arc::new(click_event(i)))
        .collect();

    for &size in BATCH_SIZES {
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("add_then_drain", size), &size, |b, &size| {
            let buffer = LogBuffer::new(size);
            b.iter(|| {
                for event in &events[..size] {
                    black_box(buffer.add_event(Arc::clone(event)));
                }
                black_box(buffer.flush_all());
            });
        });
    }

    group.finish();
}

// ============================================================================
// Benchmark: Emit to Logger
// ============================================================================

fn bench_emit_to_logger(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let dir = tempfile::tempdir().unwrap();

    let page = Page::new("https://example.com", "bench-session").unwrap();
    let logger = BrowserLogger::new(
        LoggingConfig::default()
            .with_output_path(dir.path().join("bench.jsonl"))
            .with_buffer_size(10_000)
            .with_auto_flush(false)
            .with_rotation(false),
    )
    .unwrap();
    rt.block_on(logger.start_logging(&page)).unwrap();

    let mut group = c.benchmark_group("emit_to_logger");
    group.sample_size(20);

    for &size in BATCH_SIZES {
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("jsonl", size), &size, |b, &size| {
            b.to_async(&rt).iter(|| async {
                for i in 0..size {
                    black_box(page.emitter().emit(click_event(i)).await);
                }
                logger.flush().await.unwrap();
            });
        });
    }

    group.finish();
    rt.block_on(logger.stop_logging(&page)).unwrap();
}

criterion_group!(benches, bench_buffer, bench_emit_to_logger);
criterion_main!(benches);
