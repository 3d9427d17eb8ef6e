//! Portable parking backend over `std::thread::park`.
//!
//! std parking keys on thread handles rather than addresses, so the facility
//! remembers the owning thread the first time it acquires. A wake issued
//! before the owner ever acquired finds no handle and reports `NotParked`;
//! the banked count covers it. std parking also keeps a wake token, so an
//! unpark that lands just before the park makes the park return at once.

use core::sync::atomic::{AtomicU32, Ordering, fence};
use std::sync::OnceLock;
use std::thread::{self, Thread};
use std::time::Instant;

use crate::park::{ParkFacility, ParkOutcome, UnparkOutcome};
use crate::time::{self, Timespec};

/// Parks the single owning thread of a semaphore.
#[derive(Debug, Default)]
pub struct ThreadFacility {
    owner: OnceLock<Thread>,
}

impl ThreadFacility {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            owner: OnceLock::new(),
        }
    }

    /// Bind `owner` up front, so wakes issued before its first acquire
    /// already target it.
    #[must_use]
    pub fn with_owner(owner: Thread) -> Self {
        let facility = Self::new();
        let _ = facility.owner.set(owner);
        facility
    }

    /// The bound owner, if any.
    #[must_use]
    pub fn owner(&self) -> Option<&Thread> {
        self.owner.get()
    }
}

impl ParkFacility for ThreadFacility {
    #[inline]
    fn now_nanos(&self) -> i64 {
        time::monotonic_nanos()
    }

    fn prepare_park(&self) {
        let owner = self.owner.get_or_init(thread::current);
        // Pairs with the fence in `unpark`: either the owner sees the banked
        // count or the releaser sees the owner.
        fence(Ordering::SeqCst);
        debug_assert_eq!(
            owner.id(),
            thread::current().id(),
            "ThreadFacility semaphores are acquired by their owner only"
        );
    }

    fn park(&self, _token: &AtomicU32, timeout: Option<Timespec>) -> ParkOutcome {
        match timeout {
            None => {
                thread::park();
                ParkOutcome::Woken
            }
            Some(ts) => {
                let wait = ts.to_duration();
                let start = Instant::now();
                thread::park_timeout(wait);
                if start.elapsed() >= wait {
                    ParkOutcome::TimedOut
                } else {
                    ParkOutcome::Woken
                }
            }
        }
    }

    fn unpark(&self, _token: &AtomicU32) -> UnparkOutcome {
        fence(Ordering::SeqCst);
        match self.owner.get() {
            Some(owner) => {
                owner.unpark();
                UnparkOutcome::Woken
            }
            None => UnparkOutcome::NotParked,
        }
    }
}
