//! Thread parking facilities.
//!
//! A [`ParkFacility`] is the opaque OS capability beneath [`ThreadSema`]:
//! a monotonic clock, a way to block the calling thread on a token, and a way
//! to wake whoever is blocked on that token. The token is always the
//! semaphore's counter word, so backends that key on addresses (futex) and
//! backends that key on thread handles (std parking) share one interface.
//!
//! [`ThreadSema`]: crate::sema::ThreadSema

use core::sync::atomic::AtomicU32;

use crate::time::Timespec;

#[cfg(target_os = "linux")]
#[allow(unsafe_code)]
pub mod futex;
pub mod thread;

#[cfg(target_os = "linux")]
pub use futex::FutexFacility;
pub use thread::ThreadFacility;

/// Backend used by `ThreadSema::new()`.
#[cfg(target_os = "linux")]
pub type DefaultFacility = FutexFacility;
/// Backend used by `ThreadSema::new()`.
#[cfg(not(target_os = "linux"))]
pub type DefaultFacility = ThreadFacility;

/// Result of a single park call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParkOutcome {
    /// Returned before the timeout: a wake, a stale token, an interrupted
    /// wait, or a plain spurious return. Callers re-check their condition.
    Woken,
    /// The relative timeout elapsed.
    TimedOut,
}

/// Result of a single unpark call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnparkOutcome {
    /// A parked thread was woken (or a wake token was handed over).
    Woken,
    /// Nobody was parked on the token. Expected when the wake races ahead of
    /// the park.
    NotParked,
    /// Any other failure, carrying the backend's errno.
    Failed(i32),
}

impl UnparkOutcome {
    /// `Woken` and `NotParked` need no follow-up.
    #[must_use]
    pub const fn is_benign(self) -> bool {
        !matches!(self, Self::Failed(_))
    }
}

/// OS capability used by the semaphore to block and wake threads.
///
/// `unpark` runs on the release path and must therefore be lock-free,
/// allocation-free and must never block.
pub trait ParkFacility: Send + Sync {
    /// Monotonic clock reading in nanoseconds.
    fn now_nanos(&self) -> i64;

    /// Hook run by the owning thread at the start of every acquire, before
    /// the counter is first inspected.
    fn prepare_park(&self) {}

    /// Block the calling thread on `token` for at most `timeout`
    /// (`None` waits indefinitely). The caller has just observed the token
    /// at zero; a backend may return immediately if it no longer is.
    fn park(&self, token: &AtomicU32, timeout: Option<Timespec>) -> ParkOutcome;

    /// Wake one thread parked on `token`.
    fn unpark(&self, token: &AtomicU32) -> UnparkOutcome;
}

impl<F: ParkFacility + ?Sized> ParkFacility for &F {
    fn now_nanos(&self) -> i64 {
        (**self).now_nanos()
    }

    fn prepare_park(&self) {
        (**self).prepare_park();
    }

    fn park(&self, token: &AtomicU32, timeout: Option<Timespec>) -> ParkOutcome {
        (**self).park(token, timeout)
    }

    fn unpark(&self, token: &AtomicU32) -> UnparkOutcome {
        (**self).unpark(token)
    }
}
