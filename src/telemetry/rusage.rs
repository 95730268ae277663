//! Process resource usage via `getrusage(RUSAGE_SELF)`.
//!
//! `ru_maxrss` is a high-water mark: it only stays flat or grows over the
//! process lifetime. Linux and the BSDs report it in KiB, macOS in bytes.
//! Non-Unix targets report zeros.

use std::time::Duration;

/// Process resource usage snapshot. Zero when `getrusage` fails.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProcUsage {
    pub user_time: Duration,
    pub sys_time: Duration,
    /// Peak resident set size in bytes since process start.
    pub max_rss_bytes: u64,
}

impl ProcUsage {
    #[cfg(unix)]
    pub fn current() -> Self {
        // SAFETY: a zeroed rusage is a valid out-parameter and the return
        // code is checked before any field is read.
        unsafe {
            let mut ru: libc::rusage = std::mem::zeroed();
            if libc::getrusage(libc::RUSAGE_SELF, &mut ru) != 0 {
                return ProcUsage::default();
            }
            ProcUsage {
                user_time: timeval_to_duration(ru.ru_utime),
                sys_time: timeval_to_duration(ru.ru_stime),
                max_rss_bytes: maxrss_to_bytes(ru.ru_maxrss),
            }
        }
    }

    #[cfg(not(unix))]
    pub fn current() -> Self {
        ProcUsage::default()
    }

    #[inline]
    pub fn total_cpu_time(&self) -> Duration {
        self.user_time.saturating_add(self.sys_time)
    }
}

#[cfg(unix)]
fn timeval_to_duration(tv: libc::timeval) -> Duration {
    let secs = if tv.tv_sec < 0 { 0 } else { tv.tv_sec as u64 };
    let usec = tv.tv_usec.clamp(0, 999_999) as u64;
    Duration::from_secs(secs) + Duration::from_micros(usec)
}

#[cfg(unix)]
fn maxrss_to_bytes(ru_maxrss: libc::c_long) -> u64 {
    let rss = if ru_maxrss <= 0 { 0 } else { ru_maxrss as u64 };

    #[cfg(target_os = "macos")]
    {
        rss
    }

    #[cfg(not(target_os = "macos"))]
    {
        rss.saturating_mul(1024)
    }
}
