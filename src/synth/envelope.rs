//! ADSR envelope controller
//!
//! Attack-Decay-Sustain-Release amplitude shaping, expressed as ramps on a
//! gain parameter so the shape is fixed at the moment a note starts or ends.

use super::AudioParam;

/// Envelope stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeStage {
    Idle,
    Attack,
    Decay,
    Sustain,
    Release,
}

/// Envelope timing shared by every voice
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnvelopeTimes {
    /// Seconds from silence to the attack level
    pub attack: f64,
    /// Seconds from the attack level down to the sustain level
    pub decay: f64,
    /// Sustain level as a fraction of the attack level (0.0-1.0)
    pub sustain: f64,
    /// Seconds from note-off to silence
    pub release: f64,
}

impl EnvelopeTimes {
    pub fn new(attack: f64, decay: f64, sustain: f64, release: f64) -> Self {
        Self {
            attack: attack.max(0.0),
            decay: decay.max(0.0),
            sustain: sustain.clamp(0.0, 1.0),
            release: release.max(0.0),
        }
    }
}

impl Default for EnvelopeTimes {
    fn default() -> Self {
        Self {
            attack: 0.02,
            decay: 0.1,
            sustain: 0.5,
            release: 0.25,
        }
    }
}

/// Time-varying gain applied to one voice
#[derive(Debug, Clone)]
pub struct EnvelopeController {
    gain: AudioParam,
    times: EnvelopeTimes,
    started_at: Option<f64>,
    released_at: Option<f64>,
}

impl EnvelopeController {
    /// Create a controller at zero amplitude
    pub fn new(times: EnvelopeTimes) -> Self {
        Self {
            gain: AudioParam::new(0.0),
            times,
            started_at: None,
            released_at: None,
        }
    }

    /// Schedule attack and decay starting at `now`
    pub fn trigger(&mut self, attack_level: f64, now: f64) {
        let attack_end = now + self.times.attack;
        let decay_end = attack_end + self.times.decay;

        self.gain.set_value_at_time(0.0, now);
        self.gain.linear_ramp_to_value_at_time(attack_level, attack_end);
        self.gain
            .linear_ramp_to_value_at_time(attack_level * self.times.sustain, decay_end);

        self.started_at = Some(now);
        self.released_at = None;
    }

    /// Ramp from the current level to silence over the release time
    pub fn release(&mut self, now: f64) {
        self.gain.ramp_from_now(0.0, now, self.times.release);
        self.released_at = Some(now);
    }

    /// Gain at audio-clock time `time`
    pub fn value_at(&self, time: f64) -> f64 {
        self.gain.value_at(time)
    }

    pub fn times(&self) -> EnvelopeTimes {
        self.times
    }

    /// Whether a release has been scheduled
    pub fn is_released(&self) -> bool {
        self.released_at.is_some()
    }

    /// Stage the envelope is in at `time`
    pub fn stage_at(&self, time: f64) -> EnvelopeStage {
        if let Some(released) = self.released_at {
            return if time >= released + self.times.release {
                EnvelopeStage::Idle
            } else {
                EnvelopeStage::Release
            };
        }

        match self.started_at {
            None => EnvelopeStage::Idle,
            Some(start) if time < start + self.times.attack => EnvelopeStage::Attack,
            Some(start) if time < start + self.times.attack + self.times.decay => {
                EnvelopeStage::Decay
            }
            Some(_) => EnvelopeStage::Sustain,
        }
    }

    /// Forget automation history older than `now`
    pub fn prune(&mut self, now: f64) {
        self.gain.prune(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_envelope_creation() {
        let env = EnvelopeController::new(EnvelopeTimes::default());
        assert_eq!(env.stage_at(0.0), EnvelopeStage::Idle);
        assert_eq!(env.value_at(0.0), 0.0);
        assert!(!env.is_released());
    }

    #[test]
    fn test_envelope_attack_and_decay() {
        let times = EnvelopeTimes::new(0.02, 0.1, 0.5, 0.25);
        let mut env = EnvelopeController::new(times);
        env.trigger(0.8, 1.0);

        assert!(approx(env.value_at(1.0), 0.0));
        assert!(approx(env.value_at(1.01), 0.4));
        assert!(approx(env.value_at(1.02), 0.8));
        assert!(approx(env.value_at(1.12), 0.4));
        assert!(approx(env.value_at(5.0), 0.4));
    }

    #[test]
    fn test_envelope_stages() {
        let times = EnvelopeTimes::new(0.02, 0.1, 0.5, 0.25);
        let mut env = EnvelopeController::new(times);
        env.trigger(1.0, 0.0);

        assert_eq!(env.stage_at(0.01), EnvelopeStage::Attack);
        assert_eq!(env.stage_at(0.05), EnvelopeStage::Decay);
        assert_eq!(env.stage_at(0.5), EnvelopeStage::Sustain);

        env.release(1.0);
        assert_eq!(env.stage_at(1.1), EnvelopeStage::Release);
        assert_eq!(env.stage_at(1.25), EnvelopeStage::Idle);
    }

    #[test]
    fn test_envelope_release_from_sustain() {
        let times = EnvelopeTimes::new(0.02, 0.1, 0.5, 0.25);
        let mut env = EnvelopeController::new(times);
        env.trigger(1.0, 0.0);
        env.release(1.0);

        assert!(approx(env.value_at(1.0), 0.5));
        assert!(approx(env.value_at(1.125), 0.25));
        assert!(approx(env.value_at(1.25), 0.0));
        assert!(env.is_released());
    }

    #[test]
    fn test_envelope_release_during_attack() {
        let times = EnvelopeTimes::new(0.1, 0.1, 0.5, 0.2);
        let mut env = EnvelopeController::new(times);
        env.trigger(1.0, 0.0);
        env.release(0.05);

        // Held at the half-way attack level, then down to zero
        assert!(approx(env.value_at(0.05), 0.5));
        assert!(approx(env.value_at(0.15), 0.25));
        assert!(approx(env.value_at(0.25), 0.0));
    }

    #[test]
    fn test_times_clamped() {
        let times = EnvelopeTimes::new(-1.0, 0.1, 1.5, -0.5);
        assert_eq!(times.attack, 0.0);
        assert_eq!(times.sustain, 1.0);
        assert_eq!(times.release, 0.0);
    }
}
