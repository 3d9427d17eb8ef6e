//! Report generation for harness runs.

use serde::{Deserialize, Serialize};

/// Parking backend a scenario ran on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Futex on the counter word (Linux only).
    Futex,
    /// `std::thread::park` keyed on the owner's handle.
    Thread,
}

impl Backend {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Futex => "futex",
            Self::Thread => "thread",
        }
    }
}

/// Percentile summary over nanosecond samples.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatencySummary {
    pub samples: usize,
    pub p50_ns: u64,
    pub p95_ns: u64,
    pub p99_ns: u64,
    pub max_ns: u64,
    pub mean_ns: f64,
}

impl LatencySummary {
    /// Summarize raw samples. `None` when there are none.
    #[must_use]
    pub fn from_samples(samples: &[u64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let mut sorted = samples.to_vec();
        sorted.sort_unstable();
        let sum: u128 = sorted.iter().map(|&s| u128::from(s)).sum();
        Some(Self {
            samples: sorted.len(),
            p50_ns: percentile_sorted(&sorted, 0.50),
            p95_ns: percentile_sorted(&sorted, 0.95),
            p99_ns: percentile_sorted(&sorted, 0.99),
            max_ns: sorted[sorted.len() - 1],
            mean_ns: sum as f64 / sorted.len() as f64,
        })
    }
}

fn percentile_sorted(sorted: &[u64], p: f64) -> u64 {
    debug_assert!((0.0..=1.0).contains(&p));
    if sorted.is_empty() {
        return 0;
    }
    let idx = ((sorted.len() - 1) as f64 * p).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

/// Outcome of one scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioReport {
    /// Scenario name (`stress`, `pingpong`, `timeout`).
    pub scenario: String,
    pub backend: Backend,
    pub passed: bool,
    /// Acquire/release pairs exercised.
    pub iterations: u64,
    pub elapsed_ns: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency: Option<LatencySummary>,
    /// Failure explanations; empty when passed.
    #[serde(default)]
    pub notes: Vec<String>,
}

/// One drained unpark failure, flattened for serialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRow {
    pub seq: u64,
    pub token_addr: String,
    pub count: u32,
    pub errno: i32,
}

impl From<threadsema_core::UnparkFailure> for FailureRow {
    fn from(f: threadsema_core::UnparkFailure) -> Self {
        Self {
            seq: f.seq,
            token_addr: format!("{:#x}", f.token_addr),
            count: f.count,
            errno: f.errno,
        }
    }
}

/// Diagnostic state collected after a run.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DiagSummary {
    pub mode: String,
    pub reported: u64,
    pub dropped: u64,
    pub echoed: u32,
    pub failures: Vec<FailureRow>,
}

impl DiagSummary {
    /// Drain the diagnostic ring into a summary.
    #[must_use]
    pub fn collect() -> Self {
        let counters = threadsema_core::diag_counters();
        Self {
            mode: format!("{:?}", threadsema_core::diag_mode()).to_ascii_lowercase(),
            reported: counters.reported,
            dropped: counters.dropped,
            echoed: counters.echoed,
            failures: threadsema_core::drain_unpark_failures()
                .into_iter()
                .map(FailureRow::from)
                .collect(),
        }
    }
}

/// Seconds since the Unix epoch, millisecond precision.
fn unix_timestamp(at: std::time::SystemTime) -> String {
    let since = at
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    format!("{}.{:03}", since.as_secs(), since.subsec_millis())
}

/// A full harness report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarnessReport {
    pub title: String,
    pub timestamp: String,
    pub scenarios: Vec<ScenarioReport>,
    pub diag: DiagSummary,
}

impl HarnessReport {
    #[must_use]
    pub fn new(title: impl Into<String>, scenarios: Vec<ScenarioReport>, diag: DiagSummary) -> Self {
        Self {
            title: title.into(),
            timestamp: unix_timestamp(std::time::SystemTime::now()),
            scenarios,
            diag,
        }
    }

    /// True when every scenario passed.
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.scenarios.iter().all(|s| s.passed)
    }

    /// Render the report as markdown.
    #[must_use]
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("# {}\n\n", self.title));
        out.push_str(&format!("- Timestamp (unix s): {}\n", self.timestamp));
        out.push_str(&format!("- Diag mode: {}\n", self.diag.mode));
        out.push_str(&format!(
            "- Unpark failures: reported={} dropped={} echoed={}\n\n",
            self.diag.reported, self.diag.dropped, self.diag.echoed
        ));

        out.push_str("| Scenario | Backend | Iterations | Elapsed (ms) | p50 (ns) | p99 (ns) | Status |\n");
        out.push_str("|----------|---------|------------|--------------|----------|----------|--------|\n");
        for s in &self.scenarios {
            let (p50, p99) = s
                .latency
                .map_or((String::from("-"), String::from("-")), |l| {
                    (l.p50_ns.to_string(), l.p99_ns.to_string())
                });
            out.push_str(&format!(
                "| {} | {} | {} | {:.3} | {} | {} | {} |\n",
                s.scenario,
                s.backend.as_str(),
                s.iterations,
                s.elapsed_ns as f64 / 1e6,
                p50,
                p99,
                if s.passed { "PASS" } else { "FAIL" }
            ));
        }

        for s in self.scenarios.iter().filter(|s| !s.notes.is_empty()) {
            out.push_str(&format!("\n## {} ({})\n\n", s.scenario, s.backend.as_str()));
            for note in &s.notes {
                out.push_str(&format!("- {note}\n"));
            }
        }
        out
    }

    /// Render the report as JSON.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"))
    }
}
