//!
//! Backoff arithmetic.
//!
//! Two flavours are in use: the binary exponential delay of the
//! backoff-on-generation policies (`2^n` units) and the random contention
//! window of the reservation policy (`[0, 2^(2+n) - 1]` slots).
//!

use crate::time::{scale_pow2, Duration};
use rand::Rng;

///
/// Increments an attempt counter, capped at `max`.
///
/// Returns `false` if the counter already sat at the ceiling. The counter
/// is never reset here, only a successful transmission does that.
///
pub fn bump_attempts(attempts: &mut u32, max: u32) -> bool {
    if *attempts < max {
        *attempts += 1;
        true
    } else {
        false
    }
}

///
/// The delay before a retry after `attempts` failed attempts.
///
/// Without randomization this is `2^attempts * unit`, otherwise the
/// multiplier is drawn uniformly from `[1, 2^attempts]`.
///
pub fn exponential<R: Rng + ?Sized>(
    unit: Duration,
    attempts: u32,
    randomize: bool,
    rng: &mut R,
) -> Duration {
    if !randomize {
        return scale_pow2(unit, attempts);
    }

    let ceiling = 1u32.checked_shl(attempts).unwrap_or(u32::MAX);
    let factor = rng.gen_range(1..=ceiling);
    unit.checked_mul(factor).unwrap_or(Duration::MAX)
}

///
/// The largest slot count of the contention window, `2^(2+attempts) - 1`.
///
#[must_use]
pub fn contention_window(attempts: u32) -> u32 {
    attempts
        .checked_add(2)
        .and_then(|exp| 1u32.checked_shl(exp))
        .map_or(u32::MAX, |w| w - 1)
}

///
/// Draws a slot count uniformly from `[0, contention_window(attempts)]`.
///
pub fn contention_slots<R: Rng + ?Sized>(attempts: u32, rng: &mut R) -> u32 {
    rng.gen_range(0..=contention_window(attempts))
}

///
/// Draws a contention backoff in time units of `slot`.
///
pub fn contention<R: Rng + ?Sized>(slot: Duration, attempts: u32, rng: &mut R) -> Duration {
    let slots = contention_slots(attempts, rng);
    slot.checked_mul(slots).unwrap_or(Duration::MAX)
}
