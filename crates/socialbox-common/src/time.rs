// ============================================
// File: crates/socialbox-common/src/time.rs
// ============================================
//! # Time Utilities
//!
//! ## Creation Reason
//! Several protocol rules are time based: the captcha answer window, the
//! discovery record cache TTL, key expiry in discovery records, the session
//! idle timeout and the clock-skew check on session initiation. They all read
//! time through this module so tests can drive the clock by hand.
//!
//! ## Main Functionality
//! - `Timestamp`: Unix seconds, the unit persisted and sent on the wire
//! - `Clock`: injectable wall clock (`SystemClock`, `ManualClock`)
//! - `AtomicInstant`: lock-free monotonic "last activity" marker
//!
//! ## ⚠️ Important Note for Next Developer
//! - Anything that decides expiry must take a `Clock`, never call
//!   `SystemTime::now()` directly, or the expiry tests become sleeps
//! - `AtomicInstant` is monotonic and process-local; never persist it
//!
//! ## Last Modified
//! v0.1.0 - Initial time utilities

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

// ============================================
// Constants
// ============================================

/// Maximum acceptable clock skew for signed handshake timestamps (30 seconds).
pub const MAX_CLOCK_SKEW_SECS: u64 = 30;

// ============================================
// Timestamp
// ============================================

/// Unix timestamp in seconds.
///
/// # Example
/// ```
/// use socialbox_common::time::Timestamp;
///
/// let created = Timestamp::from_secs(1_700_000_000);
/// let later = created.plus_secs(300);
/// assert_eq!(later.secs_since(created), 300);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// The zero timestamp (Unix epoch).
    pub const EPOCH: Self = Self(0);

    /// Creates a new timestamp from Unix seconds.
    #[must_use]
    pub const fn from_secs(secs: i64) -> Self {
        Self(secs)
    }

    /// Creates a timestamp for the current system time.
    ///
    /// A system clock set before 1970 is reported as the epoch.
    #[must_use]
    pub fn now() -> Self {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX));
        Self(secs)
    }

    /// Returns the Unix timestamp in seconds.
    #[must_use]
    pub const fn as_secs(&self) -> i64 {
        self.0
    }

    /// Returns the big-endian byte form used in signed payloads.
    #[must_use]
    pub const fn to_be_bytes(&self) -> [u8; 8] {
        self.0.to_be_bytes()
    }

    /// Returns this timestamp moved forward by `secs`.
    #[must_use]
    pub const fn plus_secs(&self, secs: i64) -> Self {
        Self(self.0.saturating_add(secs))
    }

    /// Seconds elapsed from `earlier` to `self` (negative if `earlier` is later).
    #[must_use]
    pub const fn secs_since(&self, earlier: Self) -> i64 {
        self.0.saturating_sub(earlier.0)
    }

    /// Checks whether `self` lies within `max_skew_secs` of `now`.
    #[must_use]
    pub const fn is_within(&self, now: Self, max_skew_secs: u64) -> bool {
        self.0.abs_diff(now.0) <= max_skew_secs
    }
}

impl From<i64> for Timestamp {
    fn from(secs: i64) -> Self {
        Self(secs)
    }
}

impl From<Timestamp> for i64 {
    fn from(ts: Timestamp) -> Self {
        ts.0
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================
// Clock
// ============================================

/// Source of wall-clock time.
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Returns the current time.
    fn now(&self) -> Timestamp;
}

/// Clock backed by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// Manually driven clock for tests and simulations.
///
/// # Example
/// ```
/// use socialbox_common::time::{Clock, ManualClock};
///
/// let clock = ManualClock::new(1_000);
/// clock.advance(60);
/// assert_eq!(clock.now().as_secs(), 1_060);
/// ```
#[derive(Debug, Default)]
pub struct ManualClock {
    secs: AtomicI64,
}

impl ManualClock {
    /// Creates a clock frozen at `secs`.
    #[must_use]
    pub const fn new(secs: i64) -> Self {
        Self {
            secs: AtomicI64::new(secs),
        }
    }

    /// Moves the clock forward by `secs`.
    pub fn advance(&self, secs: i64) {
        self.secs.fetch_add(secs, Ordering::SeqCst);
    }

    /// Sets the clock to an absolute value.
    pub fn set(&self, secs: i64) {
        self.secs.store(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp(self.secs.load(Ordering::SeqCst))
    }
}

// ============================================
// AtomicInstant
// ============================================

/// Thread-safe wrapper around [`Instant`] for last-activity tracking.
///
/// Stores nanoseconds since a process-wide reference instant in an
/// `AtomicU64`, so request handlers can touch it without taking the
/// session lock.
#[derive(Debug)]
pub struct AtomicInstant {
    nanos: AtomicU64,
}

impl AtomicInstant {
    fn reference() -> Instant {
        static REFERENCE: OnceLock<Instant> = OnceLock::new();
        *REFERENCE.get_or_init(Instant::now)
    }

    fn to_nanos(instant: Instant) -> u64 {
        instant
            .checked_duration_since(Self::reference())
            .map_or(0, |d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
    }

    /// Creates a new `AtomicInstant` set to the current time.
    #[must_use]
    pub fn now() -> Self {
        Self {
            nanos: AtomicU64::new(Self::to_nanos(Instant::now())),
        }
    }

    /// Loads the stored instant.
    #[must_use]
    pub fn load(&self) -> Instant {
        Self::reference() + Duration::from_nanos(self.nanos.load(Ordering::Relaxed))
    }

    /// Stores a new instant.
    pub fn store(&self, instant: Instant) {
        self.nanos.store(Self::to_nanos(instant), Ordering::Relaxed);
    }

    /// Updates to the current time.
    pub fn touch(&self) {
        self.store(Instant::now());
    }

    /// Returns the elapsed time since the stored instant.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.load().elapsed()
    }

    /// Checks if more than `duration` has elapsed since the stored instant.
    #[must_use]
    pub fn has_elapsed(&self, duration: Duration) -> bool {
        self.elapsed() > duration
    }
}

impl Default for AtomicInstant {
    fn default() -> Self {
        Self::now()
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_timestamp_arithmetic() {
        let t = Timestamp::from_secs(1_000);
        assert_eq!(t.plus_secs(299).secs_since(t), 299);
        assert!(t.is_within(Timestamp::from_secs(1_030), 30));
        assert!(!t.is_within(Timestamp::from_secs(1_031), 30));
    }

    #[test]
    fn test_timestamp_now_is_recent() {
        let a = Timestamp::now();
        let b = SystemClock.now();
        assert!(a.is_within(b, 1));
    }

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new(50);
        assert_eq!(clock.now(), Timestamp::from_secs(50));
        clock.advance(10);
        assert_eq!(clock.now().as_secs(), 60);
        clock.set(5);
        assert_eq!(clock.now().as_secs(), 5);
    }

    #[test]
    fn test_atomic_instant_touch() {
        let atomic = AtomicInstant::now();
        thread::sleep(Duration::from_millis(10));
        assert!(atomic.has_elapsed(Duration::from_millis(5)));

        atomic.touch();
        assert!(atomic.elapsed() < Duration::from_millis(100));
    }
}
