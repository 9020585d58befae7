// Defines a trait for time-like objects and the tick counters the controller can be driven by
// Copyright © 2025 Hs293Go
//
// Permission is hereby granted, free of charge, to any person obtaining
// a copy of this software and associated documentation files (the "Software"),
// to deal in the Software without restriction, including without limitation
// the rights to use, copy, modify, merge, publish, distribute, sublicense,
// and/or sell copies of the Software, and to permit persons to whom the
// Software is furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included
// in all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND,
// EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES
// OF MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT.
// IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM,
// DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION OF CONTRACT,
// TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE
// OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

use core::ops::Add;
use core::time::Duration;

use core::any::Any;
use core::fmt::Debug;

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// A trait for time-like objects that can be used to measure elapsed time.
///
/// The controller uses this trait to turn two consecutive timestamps into the tick interval `dt`
/// when it is driven with [`update_at`](crate::pid::PidController::update_at) instead of an
/// explicit interval.
pub trait InstantLike:
    Sized
    + Add<Duration, Output = Self>
    + Clone
    + Copy
    + Debug
    + PartialEq<Self>
    + Send
    + Sync
    + Unpin
    + Any
{
    /// Returns the amount of time elapsed from another instant to this one
    #[must_use]
    fn duration_since(&self, earlier: Self) -> Duration;
}

/// Converts a raw tick count at `rate_hz` ticks per second to a [`Duration`] without going
/// through floating point, so 1 kHz and 1 MHz counters produce exact intervals.
fn ticks_to_duration(ticks: u32, rate_hz: u32) -> Duration {
    if rate_hz == 0 {
        return Duration::ZERO;
    }
    let ticks = u64::from(ticks);
    let rate = u64::from(rate_hz);
    let secs = ticks / rate;
    let nanos = (ticks % rate) * NANOS_PER_SEC / rate;
    Duration::new(secs, nanos as u32)
}

/// Inverse of `ticks_to_duration`, truncating to whole ticks and wrapping on overflow the same
/// way a hardware counter would.
fn duration_to_ticks(duration: Duration, rate_hz: u32) -> u32 {
    let rate = u128::from(rate_hz);
    (duration.as_nanos() * rate / u128::from(NANOS_PER_SEC)) as u32
}

/// A free-running 32-bit hardware tick counter incrementing at `RATE_HZ`.
///
/// Intervals are computed with wrapping subtraction, so a counter that overflowed between two
/// samples still yields the physical elapsed time as long as less than one full counter period
/// separates them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Ticks<const RATE_HZ: u32>(pub u32);

impl<const RATE_HZ: u32> InstantLike for Ticks<RATE_HZ> {
    fn duration_since(&self, earlier: Self) -> Duration {
        ticks_to_duration(self.0.wrapping_sub(earlier.0), RATE_HZ)
    }
}

impl<const RATE_HZ: u32> Add<Duration> for Ticks<RATE_HZ> {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self::Output {
        Ticks(self.0.wrapping_add(duration_to_ticks(rhs, RATE_HZ)))
    }
}

/// A wrapping 32-bit millisecond counter, the usual RTOS system tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Millis(pub u32);

impl InstantLike for Millis {
    fn duration_since(&self, earlier: Self) -> Duration {
        Duration::from_millis(u64::from(self.0.wrapping_sub(earlier.0)))
    }
}

impl Add<Duration> for Millis {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self::Output {
        Millis(self.0.wrapping_add(rhs.as_millis() as u32))
    }
}

/// A wrapping 32-bit microsecond counter, e.g. a free-running timer peripheral.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Micros(pub u32);

impl InstantLike for Micros {
    fn duration_since(&self, earlier: Self) -> Duration {
        Duration::from_micros(u64::from(self.0.wrapping_sub(earlier.0)))
    }
}

impl Add<Duration> for Micros {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self::Output {
        Micros(self.0.wrapping_add(rhs.as_micros() as u32))
    }
}

/// Floating-point seconds, e.g. from a simulation clock. Backwards or non-finite steps yield a
/// zero interval.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct TimeF64(pub f64); // seconds since an arbitrary epoch

impl InstantLike for TimeF64 {
    fn duration_since(&self, earlier: Self) -> Duration {
        let secs = self.0 - earlier.0;
        // Going backwards, or garbage in, resolves to a zero interval which the controller
        // treats as a no-op tick
        if secs.is_finite() && secs > 0.0 {
            Duration::from_secs_f64(secs)
        } else {
            Duration::ZERO
        }
    }
}

impl Add<Duration> for TimeF64 {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self::Output {
        TimeF64(self.0 + rhs.as_secs_f64())
    }
}

impl TimeF64 {
    /// Constructs a new TimeF64 from raw seconds.
    pub fn from_secs(secs: f64) -> Self {
        TimeF64(secs)
    }

    /// Returns the underlying seconds.
    pub fn as_secs_f64(&self) -> f64 {
        self.0
    }
}

/// A convenient wrapper around `std::time::Instant` satisfying the `InstantLike` trait.
#[cfg(feature = "std")]
mod std_instant {

    use super::{Add, Duration, InstantLike};

    /// Monotonic host clock.
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct StdInstant(pub std::time::Instant);

    impl StdInstant {
        /// Reads the current time.
        pub fn now() -> Self {
            StdInstant(std::time::Instant::now())
        }
    }

    impl InstantLike for StdInstant {
        fn duration_since(&self, other: Self) -> Duration {
            self.0.saturating_duration_since(other.0)
        }
    }

    impl Add<Duration> for StdInstant {
        type Output = Self;

        fn add(self, rhs: Duration) -> Self::Output {
            StdInstant(self.0 + rhs)
        }
    }

    /// Tests that StdInstant is just one constructor call away from std::time::Instant
    /// and calling duration_since is equivalent to calling the same method on the underlying Instant.
    #[cfg(test)]
    #[test]
    fn test_std_instant_wrapper() {
        let start = StdInstant::now();
        let end = StdInstant(std::time::Instant::now());
        let result = end.duration_since(start);
        let expected = end.0.duration_since(start.0);
        assert_eq!(result, expected);
    }
}

#[cfg(feature = "std")]
pub use std_instant::StdInstant;
