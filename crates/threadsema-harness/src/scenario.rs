//! Scenario runners.
//!
//! Every runner bounds its waits with a generous timeout so a lost wakeup
//! shows up as a failed scenario instead of a hung harness.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use threadsema_core::{AcquireOutcome, ParkFacility, ThreadFacility, ThreadSema};

use crate::report::{Backend, LatencySummary, ScenarioReport};

/// N releasers racing N acquirers on one semaphore, repeated `rounds` times.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StressPlan {
    pub threads: u32,
    pub rounds: u32,
    /// Upper bound on any single acquire.
    pub watchdog: Duration,
}

impl Default for StressPlan {
    fn default() -> Self {
        Self {
            threads: 8,
            rounds: 100,
            watchdog: Duration::from_secs(10),
        }
    }
}

/// Two owners handing a token back and forth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingPongPlan {
    pub backend: Backend,
    pub rounds: u32,
    pub watchdog: Duration,
}

impl Default for PingPongPlan {
    fn default() -> Self {
        Self {
            backend: Backend::Futex,
            rounds: 10_000,
            watchdog: Duration::from_secs(10),
        }
    }
}

/// Repeated timed acquires on an empty semaphore.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutPlan {
    pub backend: Backend,
    pub timeout: Duration,
    pub samples: u32,
}

impl Default for TimeoutPlan {
    fn default() -> Self {
        Self {
            backend: Backend::Futex,
            timeout: Duration::from_millis(1),
            samples: 50,
        }
    }
}

fn nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

fn watchdog_ns(d: Duration) -> i64 {
    i64::try_from(d.as_nanos()).unwrap_or(i64::MAX)
}

#[cfg(not(target_os = "linux"))]
fn unsupported(scenario: &str, backend: Backend, why: &str) -> ScenarioReport {
    ScenarioReport {
        scenario: scenario.to_string(),
        backend,
        passed: false,
        iterations: 0,
        elapsed_ns: 0,
        latency: None,
        notes: vec![why.to_string()],
    }
}

// ---------------------------------------------------------------------------
// stress
// ---------------------------------------------------------------------------

/// Run the N-releasers / N-acquirers scenario on the futex backend.
///
/// Several threads acquire the same semaphore here, which only the futex
/// backend supports; std-thread parking keys on a single owner.
#[must_use]
pub fn run_stress(plan: StressPlan) -> ScenarioReport {
    #[cfg(target_os = "linux")]
    {
        run_stress_with(plan, threadsema_core::FutexFacility::new)
    }
    #[cfg(not(target_os = "linux"))]
    {
        unsupported("stress", Backend::Futex, "futex backend requires Linux")
    }
}

fn run_stress_with<F, M>(plan: StressPlan, make: M) -> ScenarioReport
where
    F: ParkFacility + 'static,
    M: Fn() -> F,
{
    let mut notes = Vec::new();
    let mut iterations = 0u64;
    let start = Instant::now();

    for round in 0..plan.rounds {
        let sema = Arc::new(ThreadSema::with_facility(make()));
        let acquired = Arc::new(AtomicU32::new(0));
        let timed_out = Arc::new(AtomicU32::new(0));
        let go = Arc::new(AtomicBool::new(false));
        let mut handles = Vec::with_capacity(plan.threads as usize * 2);

        for _ in 0..plan.threads {
            let (sema, acquired, timed_out, go) =
                (sema.clone(), acquired.clone(), timed_out.clone(), go.clone());
            let limit = watchdog_ns(plan.watchdog);
            handles.push(thread::spawn(move || {
                while !go.load(Ordering::Acquire) {
                    std::hint::spin_loop();
                }
                match sema.acquire(limit) {
                    AcquireOutcome::Acquired => acquired.fetch_add(1, Ordering::AcqRel),
                    AcquireOutcome::TimedOut => timed_out.fetch_add(1, Ordering::AcqRel),
                };
            }));
        }
        for _ in 0..plan.threads {
            let (sema, go) = (sema.clone(), go.clone());
            handles.push(thread::spawn(move || {
                while !go.load(Ordering::Acquire) {
                    std::hint::spin_loop();
                }
                sema.release();
            }));
        }

        go.store(true, Ordering::Release);
        for h in handles {
            if h.join().is_err() {
                notes.push(format!("round {round}: worker panicked"));
            }
        }

        let got = acquired.load(Ordering::Acquire);
        let lost = timed_out.load(Ordering::Acquire);
        iterations += u64::from(got);
        if got != plan.threads || lost != 0 {
            notes.push(format!(
                "round {round}: acquired={got} timed_out={lost} expected={}",
                plan.threads
            ));
        }
        if sema.count() != 0 {
            notes.push(format!("round {round}: {} units left over", sema.count()));
        }
    }

    ScenarioReport {
        scenario: String::from("stress"),
        backend: Backend::Futex,
        passed: notes.is_empty(),
        iterations,
        elapsed_ns: nanos(start.elapsed()),
        latency: None,
        notes,
    }
}

// ---------------------------------------------------------------------------
// pingpong
// ---------------------------------------------------------------------------

/// Hand a token between two owners and record round-trip latency.
#[must_use]
pub fn run_pingpong(plan: PingPongPlan) -> ScenarioReport {
    match plan.backend {
        #[cfg(target_os = "linux")]
        Backend::Futex => run_pingpong_on(
            plan,
            ThreadSema::with_facility(threadsema_core::FutexFacility::new()),
            ThreadSema::with_facility(threadsema_core::FutexFacility::new()),
        ),
        #[cfg(not(target_os = "linux"))]
        Backend::Futex => unsupported("pingpong", plan.backend, "futex backend requires Linux"),
        Backend::Thread => run_pingpong_on(
            plan,
            ThreadSema::with_facility(ThreadFacility::new()),
            // The caller waits on pong, so it owns it from the start.
            ThreadSema::with_facility(ThreadFacility::with_owner(thread::current())),
        ),
    }
}

fn run_pingpong_on<F, G>(plan: PingPongPlan, ping: ThreadSema<F>, pong: ThreadSema<G>) -> ScenarioReport
where
    F: ParkFacility + 'static,
    G: ParkFacility + 'static,
{
    let ping = Arc::new(ping);
    let pong = Arc::new(pong);
    let limit = watchdog_ns(plan.watchdog);
    let rounds = plan.rounds;

    let responder = {
        let (ping, pong) = (ping.clone(), pong.clone());
        thread::spawn(move || {
            let mut served = 0u32;
            while served < rounds {
                if ping.acquire(limit) == AcquireOutcome::TimedOut {
                    break;
                }
                pong.release();
                served += 1;
            }
            served
        })
    };

    let mut notes = Vec::new();
    let mut samples = Vec::with_capacity(rounds as usize);
    let start = Instant::now();
    for round in 0..rounds {
        let t0 = Instant::now();
        ping.release();
        if pong.acquire(limit) == AcquireOutcome::TimedOut {
            notes.push(format!("round {round}: reply timed out"));
            break;
        }
        samples.push(nanos(t0.elapsed()));
    }
    let elapsed = start.elapsed();

    match responder.join() {
        Ok(served) if served == rounds => {}
        Ok(served) => notes.push(format!("responder served {served} of {rounds}")),
        Err(_) => notes.push(String::from("responder panicked")),
    }

    ScenarioReport {
        scenario: String::from("pingpong"),
        backend: plan.backend,
        passed: notes.is_empty(),
        iterations: samples.len() as u64,
        elapsed_ns: nanos(elapsed),
        latency: LatencySummary::from_samples(&samples),
        notes,
    }
}

// ---------------------------------------------------------------------------
// timeout
// ---------------------------------------------------------------------------

/// Time repeated acquires on an empty semaphore. Latency is the overshoot
/// past the requested timeout.
#[must_use]
pub fn run_timeout_probe(plan: TimeoutPlan) -> ScenarioReport {
    match plan.backend {
        #[cfg(target_os = "linux")]
        Backend::Futex => run_timeout_on(
            plan,
            &ThreadSema::with_facility(threadsema_core::FutexFacility::new()),
        ),
        #[cfg(not(target_os = "linux"))]
        Backend::Futex => unsupported("timeout", plan.backend, "futex backend requires Linux"),
        Backend::Thread => run_timeout_on(plan, &ThreadSema::with_facility(ThreadFacility::new())),
    }
}

fn run_timeout_on<F: ParkFacility>(plan: TimeoutPlan, sema: &ThreadSema<F>) -> ScenarioReport {
    let timeout_ns = watchdog_ns(plan.timeout);
    let mut notes = Vec::new();
    let mut overshoot = Vec::with_capacity(plan.samples as usize);
    let start = Instant::now();

    for sample in 0..plan.samples {
        let t0 = Instant::now();
        let outcome = sema.acquire(timeout_ns);
        let waited = t0.elapsed();
        if outcome != AcquireOutcome::TimedOut {
            notes.push(format!("sample {sample}: acquired with no release"));
            continue;
        }
        if waited < plan.timeout {
            notes.push(format!(
                "sample {sample}: returned after {waited:?}, before {:?}",
                plan.timeout
            ));
        }
        overshoot.push(nanos(waited.saturating_sub(plan.timeout)));
    }

    ScenarioReport {
        scenario: String::from("timeout"),
        backend: plan.backend,
        passed: notes.is_empty(),
        iterations: u64::from(plan.samples),
        elapsed_ns: nanos(start.elapsed()),
        latency: LatencySummary::from_samples(&overshoot),
        notes,
    }
}
