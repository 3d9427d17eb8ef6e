//! Monotonic time and relative timeouts.
//!
//! Parking takes relative timeouts as a kernel `timespec`; the semaphore
//! tracks its deadline as absolute monotonic nanoseconds. This module holds
//! the conversion between the two and the clock read itself.

/// Nanoseconds in one second.
pub const NANOS_PER_SEC: i64 = 1_000_000_000;

/// Represents a timespec value (seconds + nanoseconds).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(C)]
pub struct Timespec {
    /// Seconds.
    pub tv_sec: i64,
    /// Nanoseconds (0 to 999_999_999).
    pub tv_nsec: i64,
}

impl Timespec {
    /// Split a relative nanosecond count into seconds and nanoseconds.
    ///
    /// Negative input clamps to zero; callers short-circuit non-positive
    /// waits before they ever reach a park call.
    #[must_use]
    pub const fn from_nanos(ns: i64) -> Self {
        if ns <= 0 {
            return Self {
                tv_sec: 0,
                tv_nsec: 0,
            };
        }
        Self {
            tv_sec: ns / NANOS_PER_SEC,
            tv_nsec: ns % NANOS_PER_SEC,
        }
    }

    /// Total nanoseconds, saturating at `i64::MAX`.
    #[must_use]
    pub const fn as_nanos(self) -> i64 {
        self.tv_sec
            .saturating_mul(NANOS_PER_SEC)
            .saturating_add(self.tv_nsec)
    }

    /// Convert to a `std::time::Duration` (negative components clamp to zero).
    #[must_use]
    pub fn to_duration(self) -> std::time::Duration {
        std::time::Duration::from_nanos(self.as_nanos().max(0) as u64)
    }
}

/// Returns `true` if `nsec` is a valid nanosecond field.
#[inline]
#[must_use]
pub const fn valid_timespec_nsec(nsec: i64) -> bool {
    nsec >= 0 && nsec < NANOS_PER_SEC
}

/// Absolute deadline for a relative timeout taken at `now`.
///
/// Negative `timeout_ns` means "no deadline".
#[inline]
#[must_use]
pub const fn deadline_after(now: i64, timeout_ns: i64) -> Option<i64> {
    if timeout_ns < 0 {
        None
    } else {
        Some(now.saturating_add(timeout_ns))
    }
}

/// Read `CLOCK_MONOTONIC` in nanoseconds.
///
/// Falls back to 0 if the clock read fails, which keeps a pending deadline
/// in the future instead of expiring it early.
#[must_use]
pub fn monotonic_nanos() -> i64 {
    let mut ts = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    // SAFETY: `ts` is a valid, writable timespec for the duration of the call.
    let rc = unsafe { libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts) };
    if rc != 0 {
        return 0;
    }
    Timespec {
        tv_sec: ts.tv_sec as i64,
        tv_nsec: ts.tv_nsec as i64,
    }
    .as_nanos()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_nanos_splits_seconds() {
        let ts = Timespec::from_nanos(2_500_000_001);
        assert_eq!(ts.tv_sec, 2);
        assert_eq!(ts.tv_nsec, 500_000_001);
        assert!(valid_timespec_nsec(ts.tv_nsec));
    }

    #[test]
    fn from_nanos_clamps_non_positive() {
        assert_eq!(Timespec::from_nanos(0), Timespec::default());
        assert_eq!(Timespec::from_nanos(-5), Timespec::default());
    }

    #[test]
    fn as_nanos_saturates() {
        let ts = Timespec {
            tv_sec: i64::MAX,
            tv_nsec: 999_999_999,
        };
        assert_eq!(ts.as_nanos(), i64::MAX);
        assert_eq!(Timespec::from_nanos(1_000_000).as_nanos(), 1_000_000);
    }

    #[test]
    fn deadline_after_handles_infinite_and_overflow() {
        assert_eq!(deadline_after(100, -1), None);
        assert_eq!(deadline_after(100, 0), Some(100));
        assert_eq!(deadline_after(i64::MAX - 1, 10), Some(i64::MAX));
    }

    #[test]
    fn timespec_nsec_bounds() {
        assert!(valid_timespec_nsec(0));
        assert!(valid_timespec_nsec(999_999_999));
        assert!(!valid_timespec_nsec(-1));
        assert!(!valid_timespec_nsec(NANOS_PER_SEC));
    }

    #[test]
    fn monotonic_clock_never_goes_backwards() {
        let a = monotonic_nanos();
        let b = monotonic_nanos();
        assert!(a > 0);
        assert!(b >= a);
    }
}
