//! Shared helpers for the threadsema benches.
//!
//! Criterion keeps its own statistics; [`BenchStats`] additionally prints one
//! greppable `SEMA_BENCH` line per bench so runs can be diffed without
//! parsing criterion's output.

use std::time::Duration;

/// Per-sample ns/op accumulator.
#[derive(Debug, Default)]
pub struct BenchStats {
    samples_ns_per_op: Vec<f64>,
    total_iters: u64,
    total_ns: u128,
}

impl BenchStats {
    pub fn record(&mut self, iters: u64, dur: Duration) {
        let ns = dur.as_nanos();
        self.total_iters = self.total_iters.saturating_add(iters);
        self.total_ns = self.total_ns.saturating_add(ns);
        self.samples_ns_per_op.push(ns as f64 / iters.max(1) as f64);
    }

    #[must_use]
    pub fn samples(&self) -> usize {
        self.samples_ns_per_op.len()
    }

    /// Render the summary line, or `None` before any sample was recorded.
    #[must_use]
    pub fn summary_line(&self, backend: &str, bench: &str) -> Option<String> {
        if self.samples_ns_per_op.is_empty() {
            return None;
        }
        let mut samples = self.samples_ns_per_op.clone();
        samples.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let mean = samples.iter().sum::<f64>() / samples.len() as f64;
        let throughput_ops_s = if self.total_ns == 0 {
            0.0
        } else {
            self.total_iters as f64 / (self.total_ns as f64 / 1e9)
        };
        Some(format!(
            "SEMA_BENCH backend={backend} bench={bench} samples={} p50_ns_op={:.3} p95_ns_op={:.3} p99_ns_op={:.3} mean_ns_op={mean:.3} throughput_ops_s={throughput_ops_s:.3}",
            samples.len(),
            percentile_sorted(&samples, 0.50),
            percentile_sorted(&samples, 0.95),
            percentile_sorted(&samples, 0.99),
        ))
    }

    pub fn report(&self, backend: &str, bench: &str) {
        if let Some(line) = self.summary_line(backend, bench) {
            println!("{line}");
        }
    }
}

fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    debug_assert!((0.0..=1.0).contains(&p));
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = ((sorted.len() - 1) as f64 * p).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

/// Label of the backend `ThreadSema::new()` uses on this target.
#[must_use]
pub const fn default_backend_label() -> &'static str {
    if cfg!(target_os = "linux") {
        "futex"
    } else {
        "thread"
    }
}

/// One-line environment header, printed once per bench binary.
#[must_use]
pub fn meta_line() -> String {
    format!(
        "SEMA_BENCH_META diag_mode={:?} default_backend={}",
        threadsema_core::diag_mode(),
        default_backend_label()
    )
}
