//! CLI entrypoint for the threadsema harness.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use threadsema_harness::{
    Backend, DiagSummary, HarnessReport, PingPongPlan, ScenarioReport, StressPlan, TimeoutPlan,
};

/// Stress and latency tooling for threadsema.
#[derive(Debug, Parser)]
#[command(name = "threadsema-harness")]
#[command(about = "Exercise the per-thread semaphore on real threads")]
struct Cli {
    /// Diagnostic mode for unpark failures (quiet, record, echo).
    /// Overrides THREADSEMA_DIAG.
    #[arg(long, global = true)]
    diag: Option<String>,
    /// Output report path (markdown). A `.json` sibling is written too.
    #[arg(long, global = true)]
    report: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// N releasers racing N acquirers on one futex-backed semaphore.
    Stress {
        #[arg(long, default_value_t = 8)]
        threads: u32,
        #[arg(long, default_value_t = 100)]
        rounds: u32,
        /// Per-acquire watchdog in milliseconds.
        #[arg(long, default_value_t = 10_000)]
        watchdog_ms: u64,
    },
    /// Two threads handing a token back and forth.
    Pingpong {
        #[arg(long, value_enum, default_value = "futex")]
        backend: Backend,
        #[arg(long, default_value_t = 10_000)]
        rounds: u32,
    },
    /// Timed acquires on an empty semaphore.
    Timeout {
        #[arg(long, value_enum, default_value = "futex")]
        backend: Backend,
        /// Requested timeout in microseconds.
        #[arg(long, default_value_t = 1_000)]
        timeout_us: u64,
        #[arg(long, default_value_t = 50)]
        samples: u32,
    },
    /// Every scenario with default plans on every available backend.
    All,
}

fn backends() -> &'static [Backend] {
    if cfg!(target_os = "linux") {
        &[Backend::Futex, Backend::Thread]
    } else {
        &[Backend::Thread]
    }
}

fn run(command: Command) -> Vec<ScenarioReport> {
    match command {
        Command::Stress {
            threads,
            rounds,
            watchdog_ms,
        } => {
            eprintln!("Running stress: threads={threads} rounds={rounds}");
            vec![threadsema_harness::run_stress(StressPlan {
                threads,
                rounds,
                watchdog: Duration::from_millis(watchdog_ms),
            })]
        }
        Command::Pingpong { backend, rounds } => {
            eprintln!("Running pingpong on {}: rounds={rounds}", backend.as_str());
            vec![threadsema_harness::run_pingpong(PingPongPlan {
                backend,
                rounds,
                ..PingPongPlan::default()
            })]
        }
        Command::Timeout {
            backend,
            timeout_us,
            samples,
        } => {
            eprintln!(
                "Running timeout probe on {}: timeout={timeout_us}us samples={samples}",
                backend.as_str()
            );
            vec![threadsema_harness::run_timeout_probe(TimeoutPlan {
                backend,
                timeout: Duration::from_micros(timeout_us),
                samples,
            })]
        }
        Command::All => {
            let mut out = Vec::new();
            if cfg!(target_os = "linux") {
                eprintln!("Running stress");
                out.push(threadsema_harness::run_stress(StressPlan::default()));
            }
            for &backend in backends() {
                eprintln!("Running pingpong on {}", backend.as_str());
                out.push(threadsema_harness::run_pingpong(PingPongPlan {
                    backend,
                    ..PingPongPlan::default()
                }));
                eprintln!("Running timeout probe on {}", backend.as_str());
                out.push(threadsema_harness::run_timeout_probe(TimeoutPlan {
                    backend,
                    ..TimeoutPlan::default()
                }));
            }
            out
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if let Some(raw) = cli.diag.as_deref() {
        let mode = threadsema_core::config::parse_diag_mode(raw.as_bytes());
        eprintln!("Diagnostic mode: {mode:?}");
        threadsema_core::set_diag_mode(mode);
    }

    let scenarios = run(cli.command);
    let report = HarnessReport::new("threadsema harness report", scenarios, DiagSummary::collect());

    for s in &report.scenarios {
        eprintln!(
            "[{}] {} on {}: iterations={} elapsed={:.3}ms",
            if s.passed { "PASS" } else { "FAIL" },
            s.scenario,
            s.backend.as_str(),
            s.iterations,
            s.elapsed_ns as f64 / 1e6
        );
        for note in &s.notes {
            eprintln!("    {note}");
        }
    }
    if report.diag.reported > 0 {
        eprintln!(
            "Unpark failures: reported={} dropped={}",
            report.diag.reported, report.diag.dropped
        );
    }

    if let Some(report_path) = cli.report {
        eprintln!("Writing report to {}", report_path.display());
        std::fs::write(&report_path, report.to_markdown())?;
        let json_path = report_path.with_extension("json");
        std::fs::write(&json_path, report.to_json())?;
    }

    if !report.all_passed() {
        return Err("threadsema harness: one or more scenarios failed".into());
    }
    Ok(())
}
