//! Per-thread counting semaphore.
//!
//! The counter banks wakeups. `release` increments it first and only then
//! asks the facility to wake the owner, so a wake that arrives before the
//! owner parks is never lost: the owner finds the banked unit on its next
//! check and does not park at all. `acquire` treats every return from `park`
//! other than a timeout as a hint and re-checks the counter.

use core::fmt;
use core::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use crate::diag;
use crate::park::{DefaultFacility, ParkFacility, ParkOutcome, UnparkOutcome};
use crate::time::{self, Timespec};

/// Result of [`ThreadSema::acquire`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum AcquireOutcome {
    /// One unit was taken off the counter.
    Acquired,
    /// The deadline passed first. The counter was not touched.
    TimedOut,
}

impl AcquireOutcome {
    #[must_use]
    pub const fn is_acquired(self) -> bool {
        matches!(self, Self::Acquired)
    }
}

/// Counting semaphore owned by one worker thread.
///
/// The address of the counter is the park token, so a semaphore must stay in
/// place while shared; in practice it lives in a `static`, a `Box` or an
/// `Arc`'d control block.
pub struct ThreadSema<F: ParkFacility = DefaultFacility> {
    count: AtomicU32,
    facility: F,
}

impl ThreadSema<DefaultFacility> {
    /// Zero-count semaphore on the platform's default parking backend.
    #[must_use]
    pub const fn new() -> Self {
        Self::with_facility(DefaultFacility::new())
    }
}

impl Default for ThreadSema<DefaultFacility> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: ParkFacility> fmt::Debug for ThreadSema<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadSema")
            .field("count", &self.count())
            .field("token", &format_args!("{:#x}", self.token_addr()))
            .finish()
    }
}

impl<F: ParkFacility> ThreadSema<F> {
    /// Zero-count semaphore on an explicit backend.
    #[must_use]
    pub const fn with_facility(facility: F) -> Self {
        Self {
            count: AtomicU32::new(0),
            facility,
        }
    }

    #[must_use]
    pub fn facility(&self) -> &F {
        &self.facility
    }

    /// Banked wakeups right now. Racy by nature; for diagnostics and tests.
    #[must_use]
    pub fn count(&self) -> u32 {
        self.count.load(Ordering::Relaxed)
    }

    /// Address of the park token.
    #[must_use]
    pub fn token_addr(&self) -> usize {
        &self.count as *const AtomicU32 as usize
    }

    /// Take one banked unit if there is one. Never parks.
    pub fn try_acquire(&self) -> bool {
        let mut current = self.count.load(Ordering::Acquire);
        while current > 0 {
            match self.count.compare_exchange_weak(
                current,
                current - 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(observed) => current = observed,
            }
        }
        false
    }

    /// Wait for one unit. Negative `timeout_ns` waits indefinitely.
    ///
    /// The deadline is fixed once at entry; retries after spurious returns
    /// only shrink the remaining wait. A remaining wait of zero or less
    /// returns `TimedOut` without parking.
    pub fn acquire(&self, timeout_ns: i64) -> AcquireOutcome {
        self.facility.prepare_park();
        let deadline = if timeout_ns < 0 {
            None
        } else {
            time::deadline_after(self.facility.now_nanos(), timeout_ns)
        };

        loop {
            if self.try_acquire() {
                return AcquireOutcome::Acquired;
            }

            let timeout = match deadline {
                None => None,
                Some(deadline) => {
                    let remaining = deadline.saturating_sub(self.facility.now_nanos());
                    if remaining <= 0 {
                        return AcquireOutcome::TimedOut;
                    }
                    Some(Timespec::from_nanos(remaining))
                }
            };

            if self.facility.park(&self.count, timeout) == ParkOutcome::TimedOut {
                return AcquireOutcome::TimedOut;
            }
        }
    }

    /// `Duration` flavoured [`acquire`](Self::acquire); `None` waits forever.
    pub fn acquire_timeout(&self, timeout: Option<Duration>) -> AcquireOutcome {
        let timeout_ns = match timeout {
            None => -1,
            Some(d) => i64::try_from(d.as_nanos()).unwrap_or(i64::MAX),
        };
        self.acquire(timeout_ns)
    }

    /// Bank one wakeup and wake the owner if it is parked.
    ///
    /// Lock-free, allocation-free and non-blocking; safe from signal
    /// handlers. A failed wake is reported through [`diag`] and otherwise
    /// ignored: the banked unit is already visible to the next acquire.
    pub fn release(&self) {
        let previous = self.count.fetch_add(1, Ordering::Release);
        debug_assert!(previous < u32::MAX, "ThreadSema counter overflow");

        match self.facility.unpark(&self.count) {
            UnparkOutcome::Woken | UnparkOutcome::NotParked => {}
            UnparkOutcome::Failed(errno) => {
                diag::report_unpark_failure(self.token_addr(), self.count(), errno);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Single-threaded contract model
// ---------------------------------------------------------------------------

/// Operation applied to the abstract semaphore.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SemaContractOp {
    Acquire { timeout_ns: i64 },
    TryAcquire,
    Release,
}

/// Deterministic outcome of one operation when no other thread intervenes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SemaContractOutcome {
    /// Counter after the operation.
    pub next_count: u32,
    /// Whether a unit was taken.
    pub acquired: bool,
    /// Whether the operation reaches the park call. With no other thread
    /// around, an infinite acquire on an empty counter never returns.
    pub may_park: bool,
}

/// Model of one operation on a semaphore holding `count` units.
#[must_use]
pub const fn sema_contract_transition(count: u32, op: SemaContractOp) -> SemaContractOutcome {
    match op {
        SemaContractOp::Release => SemaContractOutcome {
            next_count: count.saturating_add(1),
            acquired: false,
            may_park: false,
        },
        SemaContractOp::TryAcquire | SemaContractOp::Acquire { .. } if count > 0 => {
            SemaContractOutcome {
                next_count: count - 1,
                acquired: true,
                may_park: false,
            }
        }
        SemaContractOp::TryAcquire => SemaContractOutcome {
            next_count: count,
            acquired: false,
            may_park: false,
        },
        SemaContractOp::Acquire { timeout_ns } => SemaContractOutcome {
            next_count: count,
            acquired: false,
            may_park: timeout_ns != 0,
        },
    }
}

/// Spurious wakeup policy documentation.
#[must_use]
pub const fn spurious_wakeup_policy() -> &'static str {
    "A return from park is only a hint. acquire re-checks the counter after \
every wakeup, interrupted wait or stale-token return, and reports TimedOut \
only when the park itself timed out or the fixed deadline has passed."
}
