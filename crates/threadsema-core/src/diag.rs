//! Restricted-context diagnostics.
//!
//! `release()` may run on a signal stack, so an unexpected unpark failure
//! cannot be logged the usual way. Reports go into a fixed, statically
//! allocated ring written with atomics only; a normal-context caller drains
//! it later. In echo mode a single line is also written straight to stderr
//! with `write(2)`, formatted on the stack, and capped per process.
//!
//! A full ring drops the new record and counts the drop; it never blocks and
//! never overwrites an undrained record.

use core::sync::atomic::{AtomicI32, AtomicU8, AtomicU32, AtomicU64, AtomicUsize, Ordering};

use crate::config;
use crate::errno;
use crate::syscall;

/// Number of undrained failure records kept.
pub const DIAG_RING_CAPACITY: usize = 64;
/// Maximum number of lines echoed to stderr per process.
pub const ECHO_LINE_LIMIT: u32 = 64;

const SLOT_EMPTY: u8 = 0;
const SLOT_BUSY: u8 = 1;
const SLOT_READY: u8 = 2;

const ECHO_IDLE: u8 = 0;
const ECHO_ACTIVE: u8 = 1;

const STDERR_FD: i32 = 2;

/// One unexpected unpark failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnparkFailure {
    /// Process-wide report sequence number.
    pub seq: u64,
    /// Address of the semaphore's park token.
    pub token_addr: usize,
    /// Counter value observed right after the failed wake.
    pub count: u32,
    /// Backend errno.
    pub errno: i32,
}

/// Snapshot of the diagnostic counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DiagCounters {
    /// Every failure reported, whatever the mode.
    pub reported: u64,
    /// Records that found the ring full.
    pub dropped: u64,
    /// Lines echoed to stderr, never more than `ECHO_LINE_LIMIT`.
    pub echoed: u32,
}

struct Slot {
    state: AtomicU8,
    seq: AtomicU64,
    token_addr: AtomicUsize,
    count: AtomicU32,
    errno: AtomicI32,
}

impl Slot {
    const fn new() -> Self {
        Self {
            state: AtomicU8::new(SLOT_EMPTY),
            seq: AtomicU64::new(0),
            token_addr: AtomicUsize::new(0),
            count: AtomicU32::new(0),
            errno: AtomicI32::new(0),
        }
    }
}

static RING: [Slot; DIAG_RING_CAPACITY] = [const { Slot::new() }; DIAG_RING_CAPACITY];
static NEXT_SEQ: AtomicU64 = AtomicU64::new(0);
static REPORTED: AtomicU64 = AtomicU64::new(0);
static DROPPED: AtomicU64 = AtomicU64::new(0);
static ECHOED: AtomicU32 = AtomicU32::new(0);
static ECHO_STATE: AtomicU8 = AtomicU8::new(ECHO_IDLE);

/// Report a wake failure. Lock-free and allocation-free.
pub fn report_unpark_failure(token_addr: usize, count: u32, errno: i32) {
    REPORTED.fetch_add(1, Ordering::Relaxed);
    let mode = config::diag_mode();
    let record = UnparkFailure {
        seq: NEXT_SEQ.fetch_add(1, Ordering::Relaxed),
        token_addr,
        count,
        errno,
    };

    if mode.records() && !push(&record) {
        DROPPED.fetch_add(1, Ordering::Relaxed);
    }
    if mode.echoes() {
        echo(&record);
    }
}

fn push(record: &UnparkFailure) -> bool {
    let start = (record.seq as usize) % DIAG_RING_CAPACITY;
    for offset in 0..DIAG_RING_CAPACITY {
        let slot = &RING[(start + offset) % DIAG_RING_CAPACITY];
        if slot
            .state
            .compare_exchange(SLOT_EMPTY, SLOT_BUSY, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
        {
            slot.seq.store(record.seq, Ordering::Relaxed);
            slot.token_addr.store(record.token_addr, Ordering::Relaxed);
            slot.count.store(record.count, Ordering::Relaxed);
            slot.errno.store(record.errno, Ordering::Relaxed);
            slot.state.store(SLOT_READY, Ordering::Release);
            return true;
        }
    }
    false
}

/// Take every pending record, oldest first. Normal context only.
#[must_use]
pub fn drain_unpark_failures() -> Vec<UnparkFailure> {
    let mut out = Vec::new();
    for slot in &RING {
        if slot
            .state
            .compare_exchange(SLOT_READY, SLOT_BUSY, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            continue;
        }
        out.push(UnparkFailure {
            seq: slot.seq.load(Ordering::Relaxed),
            token_addr: slot.token_addr.load(Ordering::Relaxed),
            count: slot.count.load(Ordering::Relaxed),
            errno: slot.errno.load(Ordering::Relaxed),
        });
        slot.state.store(SLOT_EMPTY, Ordering::Release);
    }
    out.sort_unstable_by_key(|r| r.seq);
    out
}

#[must_use]
pub fn diag_counters() -> DiagCounters {
    DiagCounters {
        reported: REPORTED.load(Ordering::Relaxed),
        dropped: DROPPED.load(Ordering::Relaxed),
        echoed: ECHOED.load(Ordering::Relaxed),
    }
}

/// Clear the ring and all counters. Intended for tests and harness runs.
pub fn reset_diagnostics() {
    let _ = drain_unpark_failures();
    NEXT_SEQ.store(0, Ordering::Relaxed);
    REPORTED.store(0, Ordering::Relaxed);
    DROPPED.store(0, Ordering::Relaxed);
    ECHOED.store(0, Ordering::Relaxed);
}

fn echo(record: &UnparkFailure) {
    if ECHOED.load(Ordering::Relaxed) >= ECHO_LINE_LIMIT {
        return;
    }
    if ECHO_STATE
        .compare_exchange(ECHO_IDLE, ECHO_ACTIVE, Ordering::AcqRel, Ordering::Relaxed)
        .is_err()
    {
        return;
    }
    // Only the ECHO_STATE holder bumps ECHOED, so this check is exact.
    if ECHOED.load(Ordering::Relaxed) < ECHO_LINE_LIMIT {
        let mut line = LineBuf::new();
        render_unpark_failure(record, &mut line);
        #[allow(unsafe_code)]
        // SAFETY: the buffer is a live stack array of `len` initialized bytes.
        let _ = unsafe { syscall::sys_write(STDERR_FD, line.as_bytes().as_ptr(), line.len) };
        ECHOED.fetch_add(1, Ordering::Relaxed);
    }
    ECHO_STATE.store(ECHO_IDLE, Ordering::Release);
}

/// Fixed-size stack line buffer; excess bytes are silently cut.
pub(crate) struct LineBuf {
    buf: [u8; 128],
    len: usize,
}

impl LineBuf {
    pub(crate) const fn new() -> Self {
        Self {
            buf: [0; 128],
            len: 0,
        }
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    fn push(&mut self, bytes: &[u8]) {
        for &b in bytes {
            if self.len == self.buf.len() {
                return;
            }
            self.buf[self.len] = b;
            self.len += 1;
        }
    }

    fn push_dec(&mut self, mut value: u64) {
        let mut digits = [0u8; 20];
        let mut idx = digits.len();
        loop {
            idx -= 1;
            digits[idx] = b'0' + (value % 10) as u8;
            value /= 10;
            if value == 0 {
                break;
            }
        }
        self.push(&digits[idx..]);
    }

    fn push_signed(&mut self, value: i64) {
        if value < 0 {
            self.push(b"-");
        }
        self.push_dec(value.unsigned_abs());
    }

    fn push_hex(&mut self, mut value: usize) {
        const HEX: &[u8; 16] = b"0123456789abcdef";
        let mut digits = [0u8; 16];
        let mut idx = digits.len();
        loop {
            idx -= 1;
            digits[idx] = HEX[value & 0xf];
            value >>= 4;
            if value == 0 {
                break;
            }
        }
        self.push(b"0x");
        self.push(&digits[idx..]);
    }
}

pub(crate) fn render_unpark_failure(record: &UnparkFailure, line: &mut LineBuf) {
    line.push(b"threadsema: unpark failed addr=");
    line.push_hex(record.token_addr);
    line.push(b" count=");
    line.push_dec(u64::from(record.count));
    line.push(b" errno=");
    line.push_signed(i64::from(record.errno));
    line.push(b" (");
    line.push(errno::errno_name(record.errno).as_bytes());
    line.push(b")\n");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DiagMode, set_diag_mode};
    use crate::test_support::global_lock;

    fn rendered(record: &UnparkFailure) -> String {
        let mut line = LineBuf::new();
        render_unpark_failure(record, &mut line);
        String::from_utf8(line.as_bytes().to_vec()).unwrap()
    }

    #[test]
    fn render_formats_all_fields() {
        let text = rendered(&UnparkFailure {
            seq: 0,
            token_addr: 0xdead_beef,
            count: 3,
            errno: errno::EFAULT,
        });
        assert_eq!(
            text,
            "threadsema: unpark failed addr=0xdeadbeef count=3 errno=14 (EFAULT)\n"
        );
    }

    #[test]
    fn render_handles_zero_and_negative() {
        let text = rendered(&UnparkFailure {
            seq: 0,
            token_addr: 0,
            count: 0,
            errno: -1,
        });
        assert!(text.contains("addr=0x0 count=0 errno=-1 (EUNKNOWN)"));
    }

    #[test]
    fn line_buffer_truncates_instead_of_overflowing() {
        let mut line = LineBuf::new();
        for _ in 0..40 {
            line.push(b"abcd");
        }
        assert_eq!(line.as_bytes().len(), 128);
    }

    #[test]
    fn record_mode_keeps_reports_in_order() {
        let _lock = global_lock();
        set_diag_mode(DiagMode::Record);
        reset_diagnostics();

        report_unpark_failure(0x1000, 1, errno::EFAULT);
        report_unpark_failure(0x2000, 2, errno::EINVAL);

        let drained = drain_unpark_failures();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].token_addr, 0x1000);
        assert_eq!(drained[1].errno, errno::EINVAL);
        assert!(drained[0].seq < drained[1].seq);
        assert!(drain_unpark_failures().is_empty());
        assert_eq!(diag_counters().reported, 2);
    }

    #[test]
    fn quiet_mode_counts_without_recording() {
        let _lock = global_lock();
        set_diag_mode(DiagMode::Quiet);
        reset_diagnostics();

        report_unpark_failure(0x1000, 0, errno::EFAULT);

        assert!(drain_unpark_failures().is_empty());
        assert_eq!(diag_counters().reported, 1);
        assert_eq!(diag_counters().dropped, 0);
        set_diag_mode(DiagMode::Record);
    }

    #[test]
    fn full_ring_drops_new_records() {
        let _lock = global_lock();
        set_diag_mode(DiagMode::Record);
        reset_diagnostics();

        for i in 0..(DIAG_RING_CAPACITY + 5) {
            report_unpark_failure(i, 0, errno::EFAULT);
        }

        let counters = diag_counters();
        assert_eq!(counters.reported, (DIAG_RING_CAPACITY + 5) as u64);
        assert_eq!(counters.dropped, 5);
        let drained = drain_unpark_failures();
        assert_eq!(drained.len(), DIAG_RING_CAPACITY);
        assert_eq!(drained[0].token_addr, 0);
    }

    #[test]
    fn echo_mode_is_capped() {
        let _lock = global_lock();
        set_diag_mode(DiagMode::Echo);
        reset_diagnostics();

        for _ in 0..(ECHO_LINE_LIMIT + 3) {
            report_unpark_failure(0x10, 0, errno::EFAULT);
        }

        assert_eq!(diag_counters().echoed, ECHO_LINE_LIMIT);
        set_diag_mode(DiagMode::Record);
        reset_diagnostics();
    }

    #[test]
    fn contended_echo_never_counts_past_cap() {
        use std::sync::Arc;
        use std::sync::atomic::AtomicBool;
        use std::thread;

        let _lock = global_lock();
        set_diag_mode(DiagMode::Echo);

        for _ in 0..5 {
            reset_diagnostics();
            let go = Arc::new(AtomicBool::new(false));
            let handles: Vec<_> = (0..16)
                .map(|t| {
                    let go = go.clone();
                    thread::spawn(move || {
                        while !go.load(Ordering::Acquire) {
                            core::hint::spin_loop();
                        }
                        for i in 0..20 {
                            report_unpark_failure(t * 100 + i, 0, errno::EFAULT);
                        }
                    })
                })
                .collect();
            go.store(true, Ordering::Release);
            for h in handles {
                h.join().unwrap();
            }

            let counters = diag_counters();
            assert_eq!(counters.reported, 320);
            assert!(
                counters.echoed <= ECHO_LINE_LIMIT,
                "echoed {} lines, cap is {ECHO_LINE_LIMIT}",
                counters.echoed
            );
        }

        set_diag_mode(DiagMode::Record);
        reset_diagnostics();
    }

    #[test]
    fn concurrent_reports_are_all_accounted_for() {
        use std::sync::Arc;
        use std::sync::atomic::AtomicBool;
        use std::thread;

        let _lock = global_lock();
        set_diag_mode(DiagMode::Record);
        reset_diagnostics();

        let go = Arc::new(AtomicBool::new(false));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let go = go.clone();
                thread::spawn(move || {
                    while !go.load(Ordering::Acquire) {
                        core::hint::spin_loop();
                    }
                    for i in 0..16 {
                        report_unpark_failure(t * 100 + i, 0, errno::EFAULT);
                    }
                })
            })
            .collect();
        go.store(true, Ordering::Release);
        for h in handles {
            h.join().unwrap();
        }

        let counters = diag_counters();
        let drained = drain_unpark_failures();
        assert_eq!(counters.reported, 128);
        assert_eq!(drained.len() as u64 + counters.dropped, 128);
        assert_eq!(drained.len(), DIAG_RING_CAPACITY);
    }
}
