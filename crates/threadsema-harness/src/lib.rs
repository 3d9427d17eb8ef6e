//! # threadsema-harness
//!
//! Drives `threadsema-core` under real threads: concurrent stress, ping-pong
//! latency and timeout accuracy. Results render as markdown or JSON.

pub mod report;
pub mod scenario;

pub use report::{Backend, DiagSummary, FailureRow, HarnessReport, LatencySummary, ScenarioReport};
pub use scenario::{
    PingPongPlan, StressPlan, TimeoutPlan, run_pingpong, run_stress, run_timeout_probe,
};
