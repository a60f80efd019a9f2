use crate::station::StationId;
use crate::time::{transmission_time, Duration, SimTime};
use serde::Serialize;

///
/// A data frame as put on the medium by a station.
///
/// The send time and the duration define the frame's occupancy interval
/// at the sender, receivers see the same interval shifted by their
/// propagation delay.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Frame {
    /// The sending station.
    pub sender: StationId,
    /// Length in bits.
    pub bits: u64,
    /// The time the first bit left the sender.
    pub sent: SimTime,
    /// `bits / bit_rate`.
    pub duration: Duration,
}

impl Frame {
    /// Creates a frame, computing its air time from the bitrate.
    #[must_use]
    pub fn new(sender: StationId, bits: u64, bit_rate: u64, sent: SimTime) -> Self {
        Self {
            sender,
            bits,
            sent,
            duration: transmission_time(bits, bit_rate),
        }
    }

    /// Converts a drawn length into a bit count, at least one bit.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn bits_from_sample(sample: f64) -> u64 {
        if sample.is_finite() && sample > 1.0 {
            sample.ceil() as u64
        } else {
            1
        }
    }

    /// The time the last bit leaves the sender.
    #[must_use]
    pub fn end(&self) -> SimTime {
        self.sent + self.duration
    }

    ///
    /// The ring this frame draws around its sender at `now`.
    ///
    /// The front edge travels outwards since `sent`, the back edge since
    /// `sent + duration`. Returns `None` before the frame was sent and once
    /// the back edge left the visible radius.
    ///
    #[must_use]
    pub fn ring(&self, now: SimTime, speed: f64, max_radius: f64) -> Option<Ring> {
        if now < self.sent {
            return None;
        }

        let front_travel = (now - self.sent).as_secs_f64();
        let back_travel = front_travel - self.duration.as_secs_f64();

        let front_radius = (front_travel * speed).min(max_radius);
        let back_radius = back_travel * speed;
        if back_radius > max_radius {
            return None;
        }

        Some(Ring {
            front_radius,
            back_radius: back_radius.clamp(0.0, max_radius),
        })
    }
}

///
/// The annulus occupied by a propagating frame, in meters around the sender.
///
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Ring {
    /// Distance the first bit travelled.
    pub front_radius: f64,
    /// Distance the last bit travelled, 0 while the frame is still being sent.
    pub back_radius: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn air_time() {
        let frame = Frame::new(StationId(0), 1000, 1000, SimTime::from(2.0));
        assert_eq!(frame.duration, Duration::from_secs(1));
        assert_eq!(frame.end(), SimTime::from(3.0));

        assert_eq!(Frame::bits_from_sample(999.2), 1000);
        assert_eq!(Frame::bits_from_sample(0.0), 1);
        assert_eq!(Frame::bits_from_sample(f64::NAN), 1);
    }

    #[test]
    fn ring_geometry() {
        let frame = Frame::new(StationId(0), 1000, 1000, SimTime::ZERO);

        assert_eq!(
            frame.ring(SimTime::from(0.5), 100.0, 1000.0),
            Some(Ring {
                front_radius: 50.0,
                back_radius: 0.0
            })
        );
        assert_eq!(
            frame.ring(SimTime::from(3.0), 100.0, 1000.0),
            Some(Ring {
                front_radius: 300.0,
                back_radius: 200.0
            })
        );
        assert_eq!(
            frame.ring(SimTime::from(10.5), 100.0, 1000.0),
            Some(Ring {
                front_radius: 1000.0,
                back_radius: 950.0
            })
        );
        assert_eq!(frame.ring(SimTime::from(11.5), 100.0, 1000.0), None);
    }
}
