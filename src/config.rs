//!
//! The immutable per-run configuration record.
//!
//! A [`SimConfig`] is parsed from YAML, validated once and then handed to
//! [`MacSim::new`](crate::sim::MacSim::new). The simulation never reads
//! configuration mid-run.
//!
//! ```yaml
//! policy: aloha
//! bit_rate: 1000
//! backoff_unit: 0.5
//! max_backoffs: 8
//! inter_arrival: { kind: exponential, mean: 2.0 }
//! frame_bits: { kind: constant, value: 1000 }
//! station_count: 2
//! stations:
//!   - { x: 0.0, y: 0.0 }
//!   - { x: 300.0, y: 400.0 }
//! ```

use crate::error::ConfigError;
use crate::propagation::Position;
use crate::station::backoff::contention_window;
use crate::time::{scale_pow2, Duration, SimTime};
use rand::Rng;
use rand_distr::Exp1;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// The speed of light in m/s, the default propagation speed.
pub const SPEED_OF_LIGHT: f64 = 299_792_458.0;

/// Upper bound for `max_backoffs`, keeps `2^(2+n)` slot counts representable.
pub const MAX_BACKOFF_LIMIT: u32 = 29;

/// The longest single delay a run may schedule: a time constant, a
/// distribution parameter or the largest backoff.
pub const MAX_DELAY: Duration = Duration::from_secs(1 << 32);

///
/// The medium access discipline all stations follow.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MacPolicy {
    /// Backoff-on-generation, unslotted.
    Aloha,
    /// Backoff-on-generation, with every transmission aligned to the slot grid.
    Slotted,
    /// Carrier sense with an RTS/CTS reservation handshake.
    Reservation,
}

///
/// How the arbiter resolves a reservation request that arrives while
/// another one is still waiting for its grant.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReservationConflict {
    /// Both requests are dropped, no grant is sent.
    #[default]
    DropAll,
    /// The pending request keeps its grant, the newcomer is ignored.
    FirstWins,
    /// The grant is re-targeted to the newcomer and its timer restarted.
    LastWins,
}

///
/// A random variable in seconds (or bits, for frame lengths).
///
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Distribution {
    /// Always the same value.
    Constant {
        /// The value.
        value: f64,
    },
    /// Exponentially distributed with the given mean.
    Exponential {
        /// The mean.
        mean: f64,
    },
    /// Uniformly distributed in `[min, max]`.
    Uniform {
        /// Lower bound.
        min: f64,
        /// Upper bound.
        max: f64,
    },
}

impl Distribution {
    /// Draws a value.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match *self {
            Self::Constant { value } => value,
            Self::Exponential { mean } => {
                let unit: f64 = rng.sample(Exp1);
                unit * mean
            }
            Self::Uniform { min, max } => {
                if min < max {
                    rng.gen_range(min..=max)
                } else {
                    min
                }
            }
        }
    }

    /// Draws a value interpreted as seconds.
    pub fn sample_duration<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        secs(self.sample(rng))
    }

    fn validate(&self, field: &'static str, ceiling: Option<f64>) -> Result<(), ConfigError> {
        let largest = match *self {
            Self::Constant { value } => value,
            Self::Exponential { mean } => mean,
            Self::Uniform { max, .. } => max,
        };
        if let Some(ceiling) = ceiling {
            if largest > ceiling {
                return Err(ConfigError::out_of_range(
                    field,
                    format!("{largest} exceeds the longest delay of {ceiling}s"),
                ));
            }
        }

        match *self {
            Self::Constant { value } if !value.is_finite() || value < 0.0 => Err(
                ConfigError::out_of_range(field, format!("constant {value} must be non-negative")),
            ),
            Self::Exponential { mean } if !mean.is_finite() || mean <= 0.0 => Err(
                ConfigError::out_of_range(field, format!("mean {mean} must be positive")),
            ),
            Self::Uniform { min, max }
                if !min.is_finite() || !max.is_finite() || min < 0.0 || min > max =>
            {
                Err(ConfigError::out_of_range(
                    field,
                    format!("[{min}, {max}] is not a non-negative interval"),
                ))
            }
            _ => Ok(()),
        }
    }
}

///
/// Timing constants of the reservation handshake, in seconds.
///
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReservationTiming {
    /// Idle time a station observes before contending.
    pub difs: f64,
    /// Short gap between the frames of one exchange.
    pub sifs: f64,
    /// Air time of a reservation request.
    pub rts: f64,
    /// Air time of a grant.
    pub cts: f64,
    /// Resolution of overlapping requests at the arbiter.
    #[serde(default)]
    pub conflict: ReservationConflict,
}

///
/// Optional bounds on the length of a run.
///
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Limits {
    /// Stop once no event before this time is left.
    #[serde(default)]
    pub time: Option<SimTime>,
    /// Stop after this many events.
    #[serde(default)]
    pub events: Option<usize>,
}

///
/// The configuration of one simulation run.
///
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimConfig {
    /// Seed of the run's random number generator, entropy if absent.
    #[serde(default)]
    pub seed: Option<u64>,
    /// The access discipline.
    pub policy: MacPolicy,
    /// Bits per second put on the medium by every station.
    pub bit_rate: u64,
    /// Signal speed in m/s.
    #[serde(default = "default_propagation_speed")]
    pub propagation_speed: f64,
    /// Slot duration in seconds, 0 disables slotting.
    #[serde(default)]
    pub slot_time: f64,
    /// Unit of the exponential backoff in seconds.
    pub backoff_unit: f64,
    /// Ceiling of the attempt counter.
    pub max_backoffs: u32,
    /// Draw the backoff multiplier uniformly from `[1, 2^n]` instead of using `2^n`.
    #[serde(default)]
    pub randomize_backoff: bool,
    /// Time between the end of one frame and the generation of the next.
    pub inter_arrival: Distribution,
    /// Time until the very first frame, defaults to `inter_arrival`.
    #[serde(default)]
    pub first_arrival: Option<Distribution>,
    /// Frame length in bits.
    pub frame_bits: Distribution,
    /// Number of stations.
    pub station_count: usize,
    /// Station positions in meters.
    pub stations: Vec<Position>,
    /// Arbiter position in meters.
    #[serde(default)]
    pub arbiter: Position,
    /// Handshake constants, required by [`MacPolicy::Reservation`].
    #[serde(default)]
    pub reservation: Option<ReservationTiming>,
    /// Run bounds.
    #[serde(default)]
    pub limit: Limits,
    /// Maximum radius of the transmission rings in render snapshots, in meters.
    #[serde(default = "default_ring_radius")]
    pub ring_radius: f64,
}

fn default_propagation_speed() -> f64 {
    SPEED_OF_LIGHT
}

fn default_ring_radius() -> f64 {
    2_000.0
}

impl SimConfig {
    ///
    /// Parses and validates a YAML configuration.
    ///
    /// # Errors
    ///
    /// Fails on malformed YAML or on a configuration rejected by
    /// [`SimConfig::validate`].
    ///
    pub fn from_yaml(s: &str) -> Result<Self, ConfigError> {
        let config: SimConfig = serde_yml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    ///
    /// Reads, parses and validates a YAML configuration file.
    ///
    /// # Errors
    ///
    /// See [`SimConfig::from_yaml`], plus I/O errors.
    ///
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&raw)
    }

    ///
    /// Checks every parameter against its valid range.
    ///
    /// # Errors
    ///
    /// Returns the first violation found.
    ///
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bit_rate == 0 {
            return Err(ConfigError::out_of_range("bit_rate", "must be positive"));
        }
        if !self.propagation_speed.is_finite() || self.propagation_speed <= 0.0 {
            return Err(ConfigError::out_of_range(
                "propagation_speed",
                format!("{} must be positive", self.propagation_speed),
            ));
        }
        let slot = delay("slot_time", self.slot_time)?;
        let unit = delay("backoff_unit", self.backoff_unit)?;
        if self.max_backoffs > MAX_BACKOFF_LIMIT {
            return Err(ConfigError::out_of_range(
                "max_backoffs",
                format!("{} exceeds {MAX_BACKOFF_LIMIT}", self.max_backoffs),
            ));
        }
        if scale_pow2(unit, self.max_backoffs) > MAX_DELAY {
            return Err(ConfigError::out_of_range(
                "backoff_unit",
                format!(
                    "{unit:?} * 2^{} exceeds the longest delay of {MAX_DELAY:?}",
                    self.max_backoffs
                ),
            ));
        }
        if !self.ring_radius.is_finite() || self.ring_radius <= 0.0 {
            return Err(ConfigError::out_of_range("ring_radius", "must be positive"));
        }

        let longest = Some(MAX_DELAY.as_secs_f64());
        self.inter_arrival.validate("inter_arrival", longest)?;
        if let Some(first) = &self.first_arrival {
            first.validate("first_arrival", longest)?;
        }
        self.frame_bits.validate("frame_bits", None)?;

        if self.station_count == 0 {
            return Err(ConfigError::NoStations);
        }
        if self.station_count != self.stations.len() {
            return Err(ConfigError::StationCountMismatch {
                declared: self.station_count,
                provided: self.stations.len(),
            });
        }
        for pos in self.stations.iter().chain(std::iter::once(&self.arbiter)) {
            if !pos.x.is_finite() || !pos.y.is_finite() {
                return Err(ConfigError::out_of_range(
                    "stations",
                    format!("position {pos} is not finite"),
                ));
            }
        }

        match self.policy {
            MacPolicy::Slotted if self.slot_time <= 0.0 => Err(ConfigError::MissingSlotTime),
            MacPolicy::Reservation => {
                let timing = self
                    .reservation
                    .as_ref()
                    .ok_or(ConfigError::MissingReservationTiming)?;
                delay("reservation.difs", timing.difs)?;
                delay("reservation.sifs", timing.sifs)?;
                delay("reservation.rts", timing.rts)?;
                delay("reservation.cts", timing.cts)?;

                let (field, slot) = if slot.is_zero() {
                    ("backoff_unit", unit)
                } else {
                    ("slot_time", slot)
                };
                let window = contention_window(self.max_backoffs);
                if slot.checked_mul(window).map_or(true, |d| d > MAX_DELAY) {
                    return Err(ConfigError::out_of_range(
                        field,
                        format!(
                            "{slot:?} * {window} contention slots exceeds the longest delay of {MAX_DELAY:?}"
                        ),
                    ));
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    ///
    /// Checks that a run stops on its own.
    ///
    /// Stations generate frames forever, so a run without `limit.time` or
    /// `limit.events` never drains its event queue.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Unbounded`] if neither limit is set.
    ///
    pub fn ensure_bounded(&self) -> Result<(), ConfigError> {
        if self.limit.time.is_none() && self.limit.events.is_none() {
            Err(ConfigError::Unbounded)
        } else {
            Ok(())
        }
    }

    ///
    /// The time constants as [`Duration`]s.
    ///
    #[must_use]
    pub fn timing(&self) -> Timing {
        let reservation = self.reservation.unwrap_or(ReservationTiming {
            difs: 0.0,
            sifs: 0.0,
            rts: 0.0,
            cts: 0.0,
            conflict: ReservationConflict::default(),
        });
        Timing {
            slot: secs(self.slot_time),
            backoff_unit: secs(self.backoff_unit),
            difs: secs(reservation.difs),
            sifs: secs(reservation.sifs),
            rts: secs(reservation.rts),
            cts: secs(reservation.cts),
            conflict: reservation.conflict,
        }
    }
}

///
/// The validated time constants of a run.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// Slot duration, zero if unslotted.
    pub slot: Duration,
    /// Exponential backoff unit.
    pub backoff_unit: Duration,
    /// Inter-frame gap before contention.
    pub difs: Duration,
    /// Short inter-frame gap.
    pub sifs: Duration,
    /// Request air time.
    pub rts: Duration,
    /// Grant air time.
    pub cts: Duration,
    /// Arbiter conflict resolution.
    pub conflict: ReservationConflict,
}

/// Converts a time constant, rejecting anything above [`MAX_DELAY`].
fn delay(field: &'static str, value: f64) -> Result<Duration, ConfigError> {
    match Duration::try_from_secs_f64(value) {
        Ok(duration) if duration <= MAX_DELAY => Ok(duration),
        Ok(_) => Err(ConfigError::out_of_range(
            field,
            format!("{value}s exceeds the longest delay of {MAX_DELAY:?}"),
        )),
        Err(_) => Err(ConfigError::out_of_range(
            field,
            format!("{value} must be a non-negative number of seconds"),
        )),
    }
}

/// Seconds to a duration, for values [`SimConfig::validate`] accepted.
pub(crate) fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).map_or(MAX_DELAY, |d| d.min(MAX_DELAY))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    const ALOHA: &str = r"
policy: aloha
bit_rate: 1000
backoff_unit: 0.5
max_backoffs: 4
inter_arrival: { kind: exponential, mean: 2.0 }
frame_bits: { kind: constant, value: 1000 }
station_count: 2
stations:
  - { x: 0.0, y: 0.0 }
  - { x: 300.0, y: 400.0 }
limit: { time: 100.0 }
";

    #[test]
    fn parses_with_defaults() {
        let config = SimConfig::from_yaml(ALOHA).unwrap();
        assert_eq!(config.policy, MacPolicy::Aloha);
        assert_eq!(config.propagation_speed, SPEED_OF_LIGHT);
        assert_eq!(config.slot_time, 0.0);
        assert_eq!(config.arbiter, Position::default());
        assert_eq!(config.limit.time, Some(SimTime::from(100.0)));
        assert_eq!(config.limit.events, None);
        assert!(config.reservation.is_none());

        let timing = config.timing();
        assert_eq!(timing.backoff_unit, Duration::from_millis(500));
        assert_eq!(timing.slot, Duration::ZERO);
    }

    #[test]
    fn rejects_station_count_mismatch() {
        let raw = ALOHA.replace("station_count: 2", "station_count: 3");
        assert!(matches!(
            SimConfig::from_yaml(&raw),
            Err(ConfigError::StationCountMismatch {
                declared: 3,
                provided: 2
            })
        ));
    }

    #[test]
    fn rejects_out_of_range_values() {
        let raw = ALOHA.replace("backoff_unit: 0.5", "backoff_unit: -0.5");
        assert!(matches!(
            SimConfig::from_yaml(&raw),
            Err(ConfigError::OutOfRange {
                field: "backoff_unit",
                ..
            })
        ));

        let raw = ALOHA.replace("bit_rate: 1000", "bit_rate: 0");
        assert!(matches!(
            SimConfig::from_yaml(&raw),
            Err(ConfigError::OutOfRange {
                field: "bit_rate",
                ..
            })
        ));

        let raw = ALOHA.replace("mean: 2.0", "mean: 0.0");
        assert!(matches!(
            SimConfig::from_yaml(&raw),
            Err(ConfigError::OutOfRange {
                field: "inter_arrival",
                ..
            })
        ));

        let raw = ALOHA.replace("max_backoffs: 4", "max_backoffs: 40");
        assert!(SimConfig::from_yaml(&raw).is_err());
    }

    #[test]
    fn rejects_unrepresentable_delays() {
        let raw = ALOHA.replace("backoff_unit: 0.5", "backoff_unit: 1.0e30");
        assert!(matches!(
            SimConfig::from_yaml(&raw),
            Err(ConfigError::OutOfRange {
                field: "backoff_unit",
                ..
            })
        ));

        let raw = ALOHA.replace("mean: 2.0", "mean: 1.0e20");
        assert!(matches!(
            SimConfig::from_yaml(&raw),
            Err(ConfigError::OutOfRange {
                field: "inter_arrival",
                ..
            })
        ));

        let raw = ALOHA.replace("limit: { time: 100.0 }", "limit: { time: 1.0e30 }");
        assert!(matches!(
            SimConfig::from_yaml(&raw),
            Err(ConfigError::Yaml(_))
        ));
    }

    #[test]
    fn rejects_backoffs_past_the_longest_delay() {
        // 1e6 s is fine on its own, 2^29 of it is not.
        let raw = ALOHA
            .replace("backoff_unit: 0.5", "backoff_unit: 1.0e6")
            .replace("max_backoffs: 4", "max_backoffs: 29");
        assert!(matches!(
            SimConfig::from_yaml(&raw),
            Err(ConfigError::OutOfRange {
                field: "backoff_unit",
                ..
            })
        ));

        let raw = ALOHA.replace("max_backoffs: 4", "max_backoffs: 29");
        let config = SimConfig::from_yaml(&raw).unwrap();
        assert!(scale_pow2(config.timing().backoff_unit, 29) <= MAX_DELAY);

        // 2^31 - 1 contention slots of 4 s overflow, the exponential
        // backoff of 4 * 2^29 s does not.
        let raw = format!(
            "{}reservation: {{ difs: 0.0, sifs: 0.0, rts: 0.0, cts: 0.0 }}\n",
            ALOHA
                .replace("policy: aloha", "policy: reservation")
                .replace("backoff_unit: 0.5", "backoff_unit: 4.0")
                .replace("max_backoffs: 4", "max_backoffs: 29")
        );
        assert!(matches!(
            SimConfig::from_yaml(&raw),
            Err(ConfigError::OutOfRange {
                field: "backoff_unit",
                ..
            })
        ));
    }

    #[test]
    fn runs_must_be_bounded() {
        let config = SimConfig::from_yaml(ALOHA).unwrap();
        assert!(config.ensure_bounded().is_ok());

        let mut config = config;
        config.limit = Limits::default();
        assert!(matches!(config.ensure_bounded(), Err(ConfigError::Unbounded)));

        config.limit.events = Some(1_000);
        assert!(config.ensure_bounded().is_ok());
    }

    #[test]
    fn policy_requirements() {
        let raw = ALOHA.replace("policy: aloha", "policy: slotted");
        assert!(matches!(
            SimConfig::from_yaml(&raw),
            Err(ConfigError::MissingSlotTime)
        ));

        let raw = ALOHA.replace("policy: aloha", "policy: reservation");
        assert!(matches!(
            SimConfig::from_yaml(&raw),
            Err(ConfigError::MissingReservationTiming)
        ));

        let raw = format!(
            "{}reservation: {{ difs: 0.01, sifs: 0.005, rts: 0.002, cts: 0.002, conflict: last-wins }}\n",
            ALOHA.replace("policy: aloha", "policy: reservation")
        );
        let config = SimConfig::from_yaml(&raw).unwrap();
        let timing = config.timing();
        assert_eq!(timing.sifs, Duration::from_millis(5));
        assert_eq!(timing.conflict, ReservationConflict::LastWins);
    }

    #[test]
    fn malformed_yaml() {
        assert!(matches!(
            SimConfig::from_yaml("policy: [unterminated"),
            Err(ConfigError::Yaml(_))
        ));
        assert!(matches!(
            SimConfig::from_yaml(&ALOHA.replace("policy: aloha", "policy: token-ring")),
            Err(ConfigError::Yaml(_))
        ));
    }

    #[test]
    fn distributions() {
        let mut rng = StdRng::seed_from_u64(7);

        let constant = Distribution::Constant { value: 3.0 };
        assert_eq!(constant.sample(&mut rng), 3.0);
        assert_eq!(constant.sample_duration(&mut rng), Duration::from_secs(3));

        let uniform = Distribution::Uniform { min: 1.0, max: 2.0 };
        for _ in 0..100 {
            let v = uniform.sample(&mut rng);
            assert!((1.0..=2.0).contains(&v));
        }

        let exp = Distribution::Exponential { mean: 5.0 };
        let n = 10_000;
        let mean = (0..n).map(|_| exp.sample(&mut rng)).sum::<f64>() / f64::from(n);
        assert!((mean - 5.0).abs() < 0.5, "sample mean {mean}");
    }
}
