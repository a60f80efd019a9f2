/// A Duration type to represent a span of time.
pub use std::time::Duration;

use super::SimTime;
use std::ops::{Add, AddAssign};

impl Add<Duration> for SimTime {
    type Output = SimTime;

    fn add(self, rhs: Duration) -> Self::Output {
        self.checked_add(rhs)
            .expect("Overflow when adding Duration to SimTime")
    }
}

impl AddAssign<Duration> for SimTime {
    fn add_assign(&mut self, rhs: Duration) {
        *self = *self + rhs;
    }
}

// f64

impl Add<f64> for SimTime {
    type Output = SimTime;

    fn add(self, rhs: f64) -> Self::Output {
        self + Duration::from_secs_f64(rhs)
    }
}

impl AddAssign<f64> for SimTime {
    fn add_assign(&mut self, rhs: f64) {
        *self = *self + rhs;
    }
}

///
/// Multiplies a duration with a power of two, saturating at [`Duration::MAX`].
///
#[must_use]
pub fn scale_pow2(base: Duration, exp: u32) -> Duration {
    match 1u32.checked_shl(exp) {
        Some(factor) => base.checked_mul(factor).unwrap_or(Duration::MAX),
        None => Duration::MAX,
    }
}

///
/// The time needed to put `bits` onto a medium with the given bitrate (bit/s).
///
/// Computed in integer nanoseconds, rounding up, so equal inputs always
/// yield bit-identical durations.
///
#[must_use]
pub fn transmission_time(bits: u64, bitrate: u64) -> Duration {
    if bitrate == 0 {
        return Duration::ZERO;
    }
    let nanos = (u128::from(bits) * 1_000_000_000).div_ceil(u128::from(bitrate));
    Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
}
