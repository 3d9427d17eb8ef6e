//! Futex parking backend (Linux).
//!
//! The counter word itself is the futex. A waiter only parks after seeing the
//! word at zero and asks the kernel to sleep while it is still zero, so an
//! increment landing between the check and the syscall turns the park into an
//! immediate `EAGAIN` return instead of a lost wakeup.

use core::sync::atomic::AtomicU32;

use crate::errno;
use crate::park::{ParkFacility, ParkOutcome, UnparkOutcome};
use crate::syscall;
use crate::time::{self, Timespec};

/// Stateless futex backend. Process-private futex ops only.
#[derive(Debug, Default, Clone, Copy)]
pub struct FutexFacility;

impl FutexFacility {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[inline]
fn word_ptr(token: &AtomicU32) -> *const u32 {
    token as *const AtomicU32 as *const u32
}

impl ParkFacility for FutexFacility {
    #[inline]
    fn now_nanos(&self) -> i64 {
        time::monotonic_nanos()
    }

    fn park(&self, token: &AtomicU32, timeout: Option<Timespec>) -> ParkOutcome {
        // SAFETY: token is a live, aligned AtomicU32 borrowed for the call.
        let result = unsafe { syscall::futex_wait_private(word_ptr(token), 0, timeout.as_ref()) };
        match result {
            Err(e) if e == errno::ETIMEDOUT => ParkOutcome::TimedOut,
            // Ok: woken. EAGAIN: word already non-zero. EINTR: signal.
            // Anything else: let the caller re-check rather than spin here.
            Ok(_) | Err(_) => ParkOutcome::Woken,
        }
    }

    fn unpark(&self, token: &AtomicU32) -> UnparkOutcome {
        // SAFETY: token is a live, aligned AtomicU32 borrowed for the call.
        match unsafe { syscall::futex_wake_private(word_ptr(token), 1) } {
            Ok(0) => UnparkOutcome::NotParked,
            Ok(_) => UnparkOutcome::Woken,
            Err(e) => UnparkOutcome::Failed(e),
        }
    }
}
