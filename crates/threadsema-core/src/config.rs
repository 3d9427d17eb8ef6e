//! Diagnostic configuration.
//!
//! The only knob is how loudly unexpected unpark failures are reported. It is
//! read from `THREADSEMA_DIAG` once and cached in an atomic, because the
//! reader sits on the release path and may run inside a signal handler: no
//! allocation, no lock, no waiting on another thread's initialisation.

#[cfg(unix)]
use core::ffi::c_char;
use core::sync::atomic::{AtomicU8, Ordering};

/// Environment variable consulted for the diagnostic mode.
pub const DIAG_ENV_KEY: &str = "THREADSEMA_DIAG";

const MODE_UNRESOLVED: u8 = 0;
const MODE_QUIET: u8 = 1;
const MODE_RECORD: u8 = 2;
const MODE_ECHO: u8 = 3;
const MODE_RESOLVING: u8 = 255;

static MODE_STATE: AtomicU8 = AtomicU8::new(MODE_UNRESOLVED);

/// How unexpected unpark failures are surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DiagMode {
    /// Count only.
    Quiet,
    /// Count and keep a record in the diagnostic ring.
    #[default]
    Record,
    /// Record, and also write one line to stderr.
    Echo,
}

impl DiagMode {
    #[must_use]
    pub const fn records(self) -> bool {
        matches!(self, Self::Record | Self::Echo)
    }

    #[must_use]
    pub const fn echoes(self) -> bool {
        matches!(self, Self::Echo)
    }

    const fn to_u8(self) -> u8 {
        match self {
            Self::Quiet => MODE_QUIET,
            Self::Record => MODE_RECORD,
            Self::Echo => MODE_ECHO,
        }
    }

    const fn from_u8(v: u8) -> Self {
        match v {
            MODE_QUIET => Self::Quiet,
            MODE_ECHO => Self::Echo,
            _ => Self::Record,
        }
    }
}

/// Parse a mode value. Unknown values fall back to `Record`.
#[must_use]
pub fn parse_diag_mode(raw: &[u8]) -> DiagMode {
    const QUIET: [&[u8]; 3] = [b"quiet", b"off", b"none"];
    const ECHO: [&[u8]; 3] = [b"echo", b"stderr", b"verbose"];
    if QUIET.iter().any(|alias| raw.eq_ignore_ascii_case(alias)) {
        DiagMode::Quiet
    } else if ECHO.iter().any(|alias| raw.eq_ignore_ascii_case(alias)) {
        DiagMode::Echo
    } else {
        DiagMode::Record
    }
}

#[cfg(unix)]
unsafe extern "C" {
    static mut environ: *mut *mut c_char;
}

/// Scan `environ` for `THREADSEMA_DIAG=` without allocating.
#[cfg(unix)]
fn parse_mode_from_environ() -> Option<DiagMode> {
    const KEY_EQ: &[u8] = b"THREADSEMA_DIAG=";
    const MAX_SCAN: usize = 4096;
    const MAX_VALUE: usize = 32;

    // SAFETY: process-owned env pointer table, NUL-terminated.
    let mut envp = unsafe { environ };
    if envp.is_null() {
        return None;
    }

    for _ in 0..MAX_SCAN {
        // SAFETY: envp points to a readable slot of the env vector.
        let entry = unsafe { *envp };
        if entry.is_null() {
            return None;
        }

        let matched = KEY_EQ.iter().enumerate().all(|(idx, want)| {
            // SAFETY: entry is NUL-terminated; a mismatch stops before the end.
            unsafe { *entry.add(idx) as u8 == *want }
        });

        if matched {
            let mut buf = [0u8; MAX_VALUE];
            let mut len = 0;
            while len < MAX_VALUE {
                // SAFETY: bounded read of the NUL-terminated value tail.
                let byte = unsafe { *entry.add(KEY_EQ.len() + len) as u8 };
                if byte == 0 {
                    break;
                }
                buf[len] = byte;
                len += 1;
            }
            return Some(parse_diag_mode(&buf[..len]));
        }

        // SAFETY: advance to the next env vector slot.
        envp = unsafe { envp.add(1) };
    }

    None
}

#[cfg(not(unix))]
fn parse_mode_from_environ() -> Option<DiagMode> {
    std::env::var(DIAG_ENV_KEY)
        .ok()
        .map(|v| parse_diag_mode(v.as_bytes()))
}

/// Current diagnostic mode, resolving it from the environment on first use.
///
/// A caller that races an in-flight resolution gets the default instead of
/// waiting for it.
#[must_use]
pub fn diag_mode() -> DiagMode {
    let cached = MODE_STATE.load(Ordering::Acquire);
    match cached {
        MODE_RESOLVING => return DiagMode::default(),
        MODE_UNRESOLVED => {}
        v => return DiagMode::from_u8(v),
    }

    if MODE_STATE
        .compare_exchange(
            MODE_UNRESOLVED,
            MODE_RESOLVING,
            Ordering::AcqRel,
            Ordering::Acquire,
        )
        .is_err()
    {
        let v = MODE_STATE.load(Ordering::Acquire);
        return if v == MODE_UNRESOLVED || v == MODE_RESOLVING {
            DiagMode::default()
        } else {
            DiagMode::from_u8(v)
        };
    }

    let resolved = parse_mode_from_environ().unwrap_or_default();
    MODE_STATE.store(resolved.to_u8(), Ordering::Release);
    resolved
}

/// Override the mode for the rest of the process (or until the next reset).
pub fn set_diag_mode(mode: DiagMode) {
    MODE_STATE.store(mode.to_u8(), Ordering::Release);
}

/// Forget the cached mode so the next read re-parses the environment.
pub fn reset_diag_mode_cache() {
    MODE_STATE.store(MODE_UNRESOLVED, Ordering::Release);
}
