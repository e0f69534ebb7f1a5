//! Millisecond time base shared by the controller, the menu and the log store.
//!
//! The firmware truncates the 64-bit monotonic to a `u32` millisecond counter, which wraps after
//! ~49.7 days. All elapsed-time arithmetic goes through [`elapsed`], which subtracts modulo 2^32.

/// Tick rate of [`Instant`] and [`Duration`].
pub const TICK_HZ: u32 = 1_000;

/// Point on the wrapping millisecond counter.
pub type Instant = fugit::TimerInstantU32<TICK_HZ>;

/// Millisecond duration.
pub type Duration = fugit::TimerDurationU32<TICK_HZ>;

pub const ZERO: Duration = Duration::from_ticks(0);

/// Time passed from `since` to `now`, correct across one wrap of the counter.
#[inline]
#[must_use]
pub const fn elapsed(now: Instant, since: Instant) -> Duration {
    Duration::from_ticks(now.ticks().wrapping_sub(since.ticks()))
}

/// `a - b`, clamped at zero.
#[inline]
#[must_use]
pub const fn saturating_sub(a: Duration, b: Duration) -> Duration {
    Duration::from_ticks(a.ticks().saturating_sub(b.ticks()))
}
