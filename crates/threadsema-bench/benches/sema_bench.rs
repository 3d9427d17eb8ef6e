//! Semaphore hot-path microbenchmarks.
//!
//! Benchmarks cover:
//! - release with no waiter
//! - try_acquire hit and miss
//! - release + acquire, uncontended
//! - acquire(0) on an empty semaphore (immediate timeout)
//! - cross-thread ping-pong per backend

use std::cell::RefCell;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use threadsema_bench::{BenchStats, default_backend_label, meta_line};
use threadsema_core::{AcquireOutcome, ParkFacility, ThreadFacility, ThreadSema};

fn print_env_metadata_once() {
    static ONCE: std::sync::Once = std::sync::Once::new();
    ONCE.call_once(|| println!("{}", meta_line()));
}

/// Run one criterion bench over `body`, mirroring every sample into
/// [`BenchStats`]. `setup` runs once per measured batch.
fn bench_hot<S>(c: &mut Criterion, name: &str, setup: impl Fn() -> S, body: impl Fn(&S)) {
    print_env_metadata_once();
    let backend = default_backend_label();

    let stats = RefCell::new(BenchStats::default());
    let mut group = c.benchmark_group("sema_hotpath");
    group.throughput(Throughput::Elements(1));
    group.bench_function(BenchmarkId::new(name, backend), |b| {
        b.iter_custom(|iters| {
            let state = setup();
            let start = Instant::now();
            for _ in 0..iters {
                body(&state);
            }
            let dur = start.elapsed().max(Duration::from_nanos(1));
            stats.borrow_mut().record(iters, dur);
            dur
        });
    });
    group.finish();
    stats.borrow().report(backend, name);
}

fn bench_release_no_waiter(c: &mut Criterion) {
    // The counter only grows; a fresh semaphore per batch keeps it far from u32::MAX.
    bench_hot(c, "release_no_waiter", ThreadSema::new, |s| {
        s.release();
        black_box(s.count());
    });
}

fn bench_try_acquire_hit(c: &mut Criterion) {
    bench_hot(c, "try_acquire_hit", ThreadSema::new, |s| {
        s.release();
        black_box(s.try_acquire());
    });
}

fn bench_try_acquire_miss(c: &mut Criterion) {
    bench_hot(c, "try_acquire_miss", ThreadSema::new, |s| {
        black_box(s.try_acquire());
    });
}

fn bench_release_acquire_uncontended(c: &mut Criterion) {
    bench_hot(c, "release_acquire", ThreadSema::new, |s| {
        s.release();
        black_box(s.acquire(-1));
    });
}

/// Empty semaphore with a zero timeout: the deadline check must return
/// before any park.
fn bench_acquire_zero_timeout(c: &mut Criterion) {
    bench_hot(c, "acquire_zero_timeout", ThreadSema::new, |s| {
        black_box(s.acquire(0));
    });
}

fn pingpong_rounds<F, G>(backend: &str, make: impl Fn() -> (ThreadSema<F>, ThreadSema<G>))
where
    F: ParkFacility + 'static,
    G: ParkFacility + 'static,
{
    let rounds = 20;
    let iters_per_round: u32 = 500;
    let mut stats = BenchStats::default();

    for _ in 0..rounds {
        let (ping, pong) = make();
        let ping = Arc::new(ping);
        let pong = Arc::new(pong);
        let (p2, q2) = (ping.clone(), pong.clone());

        let responder = thread::spawn(move || {
            for _ in 0..iters_per_round {
                let _ = p2.acquire(-1);
                q2.release();
            }
        });

        let start = Instant::now();
        for _ in 0..iters_per_round {
            ping.release();
            let outcome = pong.acquire(-1);
            debug_assert_eq!(outcome, AcquireOutcome::Acquired);
        }
        let dur = start.elapsed().max(Duration::from_nanos(1));
        responder.join().expect("responder thread panicked");
        stats.record(u64::from(iters_per_round), dur);
    }
    stats.report(backend, "pingpong_roundtrip");
}

/// Manual threaded benchmark: criterion warmup does not suit two threads
/// handing a token back and forth, so this runs fixed rounds and only emits
/// the summary line.
fn bench_pingpong(_c: &mut Criterion) {
    print_env_metadata_once();

    pingpong_rounds("thread", || {
        (
            ThreadSema::with_facility(ThreadFacility::new()),
            ThreadSema::with_facility(ThreadFacility::with_owner(thread::current())),
        )
    });

    #[cfg(target_os = "linux")]
    pingpong_rounds("futex", || {
        use threadsema_core::FutexFacility;
        (
            ThreadSema::with_facility(FutexFacility::new()),
            ThreadSema::with_facility(FutexFacility::new()),
        )
    });
}

criterion_group!(
    name = benches;
    config = Criterion::default()
        .warm_up_time(Duration::from_millis(500))
        .measurement_time(Duration::from_secs(3))
        .sample_size(50);
    targets =
        bench_release_no_waiter,
        bench_try_acquire_hit,
        bench_try_acquire_miss,
        bench_release_acquire_uncontended,
        bench_acquire_zero_timeout,
        bench_pingpong
);
criterion_main!(benches);
