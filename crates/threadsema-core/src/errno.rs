//! Error number definitions.
//!
//! The subset of `<errno.h>` values the parking backends can observe. Codes
//! travel as plain `i32` inside outcome enums; nothing in this crate raises
//! them as a Rust error type.

pub const EPERM: i32 = 1;
pub const ESRCH: i32 = 3;
pub const EINTR: i32 = 4;
pub const EAGAIN: i32 = 11;
pub const EFAULT: i32 = 14;
pub const EINVAL: i32 = 22;
pub const ENOSYS: i32 = 38;
pub const ETIMEDOUT: i32 = 110;

/// Short symbolic name for an errno value, for diagnostics.
#[must_use]
pub const fn errno_name(code: i32) -> &'static str {
    match code {
        EPERM => "EPERM",
        ESRCH => "ESRCH",
        EINTR => "EINTR",
        EAGAIN => "EAGAIN",
        EFAULT => "EFAULT",
        EINVAL => "EINVAL",
        ENOSYS => "ENOSYS",
        ETIMEDOUT => "ETIMEDOUT",
        _ => "EUNKNOWN",
    }
}
