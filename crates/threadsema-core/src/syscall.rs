//! Raw syscall wrappers used by the parking backends and the diagnostic
//! writer. The futex wrappers are Linux-only.
//!
//! Each wrapper issues exactly one syscall and maps the kernel result to
//! `Ok(ret)` or `Err(errno)`. Nothing here allocates or takes a lock, so the
//! wake path stays usable from signal handlers.

#[cfg(target_os = "linux")]
use crate::time::Timespec;

#[cfg(target_os = "linux")]
pub const FUTEX_WAIT: i32 = 0;
#[cfg(target_os = "linux")]
pub const FUTEX_WAKE: i32 = 1;
#[cfg(target_os = "linux")]
pub const FUTEX_PRIVATE_FLAG: i32 = 128;

#[inline]
fn last_errno() -> i32 {
    std::io::Error::last_os_error().raw_os_error().unwrap_or(0)
}

#[cfg(target_os = "linux")]
/// `futex(2)` with the full argument list.
///
/// # Safety
///
/// `uaddr` must point to a valid, aligned `u32` that stays mapped for the
/// duration of the call. `timeout`, when non-null, must point to a valid
/// `libc::timespec`.
#[inline]
pub unsafe fn sys_futex(
    uaddr: *const u32,
    op: i32,
    val: u32,
    timeout: *const libc::timespec,
    uaddr2: *const u32,
    val3: u32,
) -> Result<usize, i32> {
    // SAFETY: caller upholds pointer validity.
    let ret = unsafe { libc::syscall(libc::SYS_futex, uaddr, op, val, timeout, uaddr2, val3) };
    if ret < 0 {
        Err(last_errno())
    } else {
        Ok(ret as usize)
    }
}

/// Narrow a `Timespec` to the platform's `timespec`. Its fields are 32-bit
/// on 32-bit targets; seconds saturate there.
#[cfg(target_os = "linux")]
#[inline]
fn kernel_timespec(ts: &Timespec) -> libc::timespec {
    // SAFETY: timespec is plain old data; some targets carry padding fields.
    let mut out: libc::timespec = unsafe { core::mem::zeroed() };
    out.tv_sec = libc::time_t::try_from(ts.tv_sec).unwrap_or(libc::time_t::MAX);
    // Always below one second, so it fits any c_long.
    out.tv_nsec = ts.tv_nsec as libc::c_long;
    out
}

#[cfg(target_os = "linux")]
/// Block while `*uaddr == expected`, for at most `timeout` (relative,
/// `CLOCK_MONOTONIC`). `None` waits without a timeout.
///
/// # Safety
///
/// `uaddr` must point to a valid, aligned `u32`.
#[inline]
pub unsafe fn futex_wait_private(
    uaddr: *const u32,
    expected: u32,
    timeout: Option<&Timespec>,
) -> Result<usize, i32> {
    let kernel_ts = timeout.map(kernel_timespec);
    let ts_ptr = kernel_ts
        .as_ref()
        .map_or(core::ptr::null(), |ts| ts as *const libc::timespec);
    // SAFETY: forwarded caller contract; ts_ptr is null or borrowed.
    unsafe {
        sys_futex(
            uaddr,
            FUTEX_WAIT | FUTEX_PRIVATE_FLAG,
            expected,
            ts_ptr,
            core::ptr::null(),
            0,
        )
    }
}

#[cfg(target_os = "linux")]
/// Wake up to `count` threads blocked on `uaddr`. Returns how many woke.
///
/// # Safety
///
/// `uaddr` must point to a valid, aligned `u32`.
#[inline]
pub unsafe fn futex_wake_private(uaddr: *const u32, count: u32) -> Result<usize, i32> {
    // SAFETY: forwarded caller contract.
    unsafe {
        sys_futex(
            uaddr,
            FUTEX_WAKE | FUTEX_PRIVATE_FLAG,
            count,
            core::ptr::null(),
            core::ptr::null(),
            0,
        )
    }
}

/// `write(2)` to a raw file descriptor. Async-signal-safe.
///
/// # Safety
///
/// `buf` must be valid for reads of `len` bytes.
#[inline]
pub unsafe fn sys_write(fd: i32, buf: *const u8, len: usize) -> Result<usize, i32> {
    // SAFETY: caller guarantees buffer validity.
    let ret = unsafe { libc::write(fd, buf.cast(), len) };
    if ret < 0 {
        Err(last_errno())
    } else {
        Ok(ret as usize)
    }
}
