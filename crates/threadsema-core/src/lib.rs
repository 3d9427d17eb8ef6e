//! # threadsema-core
//!
//! Per-thread counting semaphore for parking and waking runtime worker
//! threads. Each worker owns one [`ThreadSema`]; the worker itself waits on
//! it with [`ThreadSema::acquire`], anyone holding a reference wakes it with
//! [`ThreadSema::release`].
//!
//! The blocking primitive underneath is an injected [`ParkFacility`]: a
//! Linux futex on the counter word by default, `std::thread::park` as a
//! portable fallback, or a scripted fake in tests.
//!
//! Modules:
//! - `sema`: the semaphore and its single-threaded contract model
//! - `park`: parking backends
//! - `time`: monotonic clock and relative timeouts
//! - `diag`: restricted-context failure reporting
//! - `config`: diagnostic mode resolution
//! - `syscall`, `errno`: raw kernel plumbing

#![deny(unsafe_code)]

#[allow(unsafe_code)]
pub mod config;
pub mod diag;
pub mod errno;
pub mod park;
pub mod sema;
#[allow(unsafe_code)]
pub mod syscall;
#[allow(unsafe_code)]
pub mod time;

pub use config::{DiagMode, diag_mode, set_diag_mode};
pub use diag::{DiagCounters, UnparkFailure, diag_counters, drain_unpark_failures};
pub use park::{DefaultFacility, ParkFacility, ParkOutcome, ThreadFacility, UnparkOutcome};
#[cfg(target_os = "linux")]
pub use park::FutexFacility;
pub use sema::{
    AcquireOutcome, SemaContractOp, SemaContractOutcome, ThreadSema, sema_contract_transition,
    spurious_wakeup_policy,
};
pub use time::{Timespec, monotonic_nanos};
