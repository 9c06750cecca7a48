//! Waveform evaluators that turn elapsed run time into an instantaneous
//! load target.
//!
//! CPU waves produce a busy percentage clamped to [0, 100]; rate shapes
//! produce a requests-per-second target for the paced generators. All
//! evaluators work on monotonic elapsed time so that a suspended clock
//! never bends the curve.

use std::f64::consts::TAU;
use std::time::Duration;

use rand::Rng;

use crate::config::{CpuPatternKind, RatePatternKind};

/// Every periodic wave in the system shares one 30 s period.
pub const WAVE_PERIOD: Duration = Duration::from_secs(30);

/// How often the random CPU wave picks a new blend target.
const RANDOM_REFRESH: Duration = Duration::from_secs(5);

/// First-order blend factor for the random CPU wave.
const RANDOM_BLEND: f64 = 0.1;

/// CPU waveform. The random variant carries low-pass filter state, so a
/// wave belongs to exactly one worker.
#[derive(Debug)]
pub enum CpuWave {
    Sine,
    Square,
    Sawtooth,
    Random {
        value: f64,
        last_refresh: Option<Duration>,
    },
}

impl CpuWave {
    #[must_use]
    pub fn new(kind: CpuPatternKind) -> Self {
        match kind {
            CpuPatternKind::Sine => Self::Sine,
            CpuPatternKind::Square => Self::Square,
            CpuPatternKind::Sawtooth => Self::Sawtooth,
            CpuPatternKind::Random => Self::Random {
                value: 0.0,
                last_refresh: None,
            },
        }
    }

    /// Instantaneous load for elapsed time `t`, base `base` and amplitude
    /// `amplitude`, clamped to [0, 100].
    pub fn load_at(&mut self, t: Duration, base: f64, amplitude: f64, rng: &mut impl Rng) -> f64 {
        let period = WAVE_PERIOD.as_secs_f64();
        let raw = match self {
            Self::Sine => base + amplitude * (TAU * t.as_secs_f64() / period).sin(),
            Self::Square => {
                let into_period = t.as_secs_f64() % period;
                if into_period < period / 2.0 {
                    base + amplitude
                } else {
                    base - amplitude
                }
            }
            Self::Sawtooth => {
                let position = (t.as_secs_f64() % period) / period;
                base + (position * 2.0 - 1.0) * amplitude
            }
            Self::Random {
                value,
                last_refresh,
            } => {
                match last_refresh {
                    None => {
                        *value = base;
                        *last_refresh = Some(t);
                    }
                    Some(last) if t.saturating_sub(*last) >= RANDOM_REFRESH => {
                        let target = base + rng.gen_range(-1.0..=1.0) * amplitude;
                        *value += (target - *value) * RANDOM_BLEND;
                        *last_refresh = Some(t);
                    }
                    Some(_) => {}
                }
                *value
            }
        };
        raw.clamp(0.0, 100.0)
    }
}

/// Rate shape for the paced generators. Stateless; spike and random draw
/// fresh randomness on every sample.
#[derive(Debug, Clone, Copy)]
pub struct RateShape {
    kind: RatePatternKind,
}

impl RateShape {
    #[must_use]
    pub fn new(kind: RatePatternKind) -> Self {
        Self { kind }
    }

    /// Target rate for elapsed time `t` against the configured `target`.
    pub fn rate_at(&self, t: Duration, target: u64, rng: &mut impl Rng) -> u64 {
        match self.kind {
            RatePatternKind::Constant => target,
            RatePatternKind::Spike => {
                if rng.gen_bool(0.1) {
                    target * 3
                } else {
                    target
                }
            }
            RatePatternKind::Cycle => {
                let phase = (t.as_secs() / WAVE_PERIOD.as_secs()) % 4;
                match phase {
                    0 => target / 4,
                    1 => target,
                    2 => target / 2,
                    _ => target / 8,
                }
            }
            RatePatternKind::Ramp => {
                // The multiplier starts at 0.2 at t=0 and saturates after
                // five minutes; the floor is part of the contract.
                let minutes = t.as_secs() / 60;
                let multiplier = ((minutes + 1) as f64 * 0.2).min(1.0);
                (target as f64 * multiplier) as u64
            }
            RatePatternKind::Random => {
                let variation = rng.gen_range(0.10..=1.50);
                (target as f64 * variation) as u64
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn rng() -> SmallRng {
        SmallRng::seed_from_u64(7)
    }

    #[test]
    fn sine_peaks_a_quarter_period_in() {
        let mut wave = CpuWave::new(CpuPatternKind::Sine);
        let mut r = rng();

        let at_zero = wave.load_at(Duration::ZERO, 50.0, 20.0, &mut r);
        assert!((at_zero - 50.0).abs() < 1e-9);

        let at_peak = wave.load_at(Duration::from_secs_f64(7.5), 50.0, 20.0, &mut r);
        assert!((at_peak - 70.0).abs() < 1e-6);

        let at_trough = wave.load_at(Duration::from_secs_f64(22.5), 50.0, 20.0, &mut r);
        assert!((at_trough - 30.0).abs() < 1e-6);
    }

    #[test]
    fn square_flips_at_half_period() {
        let mut wave = CpuWave::new(CpuPatternKind::Square);
        let mut r = rng();

        assert_eq!(wave.load_at(Duration::from_secs(5), 50.0, 30.0, &mut r), 80.0);
        assert_eq!(wave.load_at(Duration::from_secs(20), 50.0, 30.0, &mut r), 20.0);
        // next period
        assert_eq!(wave.load_at(Duration::from_secs(35), 50.0, 30.0, &mut r), 80.0);
    }

    #[test]
    fn sawtooth_sweeps_from_low_to_high() {
        let mut wave = CpuWave::new(CpuPatternKind::Sawtooth);
        let mut r = rng();

        let start = wave.load_at(Duration::ZERO, 50.0, 20.0, &mut r);
        assert!((start - 30.0).abs() < 1e-9);

        let near_end = wave.load_at(Duration::from_secs_f64(29.999), 50.0, 20.0, &mut r);
        assert!(near_end > 69.0);
    }

    #[test]
    fn wave_output_is_clamped() {
        let mut wave = CpuWave::new(CpuPatternKind::Square);
        let mut r = rng();

        assert_eq!(wave.load_at(Duration::from_secs(1), 90.0, 50.0, &mut r), 100.0);
        assert_eq!(wave.load_at(Duration::from_secs(20), 10.0, 50.0, &mut r), 0.0);
    }

    #[test]
    fn random_wave_starts_at_base_and_drifts_slowly() {
        let mut wave = CpuWave::new(CpuPatternKind::Random);
        let mut r = rng();

        let first = wave.load_at(Duration::ZERO, 40.0, 20.0, &mut r);
        assert!((first - 40.0).abs() < 1e-9);

        // Within the refresh window the value holds steady.
        let held = wave.load_at(Duration::from_secs(2), 40.0, 20.0, &mut r);
        assert!((held - 40.0).abs() < 1e-9);

        // One refresh moves at most blend * amplitude away from base.
        let refreshed = wave.load_at(Duration::from_secs(6), 40.0, 20.0, &mut r);
        assert!((refreshed - 40.0).abs() <= 20.0 * RANDOM_BLEND + 1e-9);
    }

    #[test]
    fn cycle_shape_quarters_the_period() {
        let shape = RateShape::new(RatePatternKind::Cycle);
        let mut r = rng();

        assert_eq!(shape.rate_at(Duration::from_secs(0), 400, &mut r), 100);
        assert_eq!(shape.rate_at(Duration::from_secs(31), 400, &mut r), 400);
        assert_eq!(shape.rate_at(Duration::from_secs(61), 400, &mut r), 200);
        assert_eq!(shape.rate_at(Duration::from_secs(91), 400, &mut r), 50);
        assert_eq!(shape.rate_at(Duration::from_secs(121), 400, &mut r), 100);
    }

    #[test]
    fn ramp_starts_at_a_fifth_and_saturates() {
        let shape = RateShape::new(RatePatternKind::Ramp);
        let mut r = rng();

        assert_eq!(shape.rate_at(Duration::from_secs(0), 1000, &mut r), 200);
        assert_eq!(shape.rate_at(Duration::from_secs(60), 1000, &mut r), 400);
        assert_eq!(shape.rate_at(Duration::from_secs(240), 1000, &mut r), 1000);
        assert_eq!(shape.rate_at(Duration::from_secs(3600), 1000, &mut r), 1000);
    }

    #[test]
    fn random_shape_stays_inside_its_band() {
        let shape = RateShape::new(RatePatternKind::Random);
        let mut r = rng();

        for _ in 0..200 {
            let rate = shape.rate_at(Duration::from_secs(1), 1000, &mut r);
            assert!((100..=1500).contains(&rate), "rate {rate} out of band");
        }
    }

    #[test]
    fn spike_shape_is_target_or_triple() {
        let shape = RateShape::new(RatePatternKind::Spike);
        let mut r = rng();

        let mut saw_spike = false;
        for _ in 0..500 {
            let rate = shape.rate_at(Duration::from_secs(1), 100, &mut r);
            assert!(rate == 100 || rate == 300);
            saw_spike |= rate == 300;
        }
        assert!(saw_spike);
    }
}
