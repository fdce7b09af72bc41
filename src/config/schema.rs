//! Configuration schema definitions

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::synth::{EnvelopeTimes, RetriggerPolicy, Waveform, DEFAULT_CLEANUP_MARGIN};

/// Main configuration for midiecho
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EchoConfig {
    /// Audio output settings
    #[serde(default)]
    pub audio: AudioConfig,

    /// MIDI input settings
    #[serde(default)]
    pub midi: MidiConfig,

    /// Envelope applied to every voice
    #[serde(default)]
    pub envelope: EnvelopeConfig,

    /// Voice creation settings
    #[serde(default)]
    pub voice: VoiceConfig,

    /// Shared gain/delay/volume chain
    #[serde(default)]
    pub chain: ChainConfig,
}

impl EchoConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        // Validate audio settings
        if self.audio.sample_rate < 8000 || self.audio.sample_rate > 192000 {
            bail!("Sample rate must be between 8000 and 192000");
        }
        if self.audio.buffer_size < 64 || self.audio.buffer_size > 8192 {
            bail!("Buffer size must be between 64 and 8192");
        }

        if let Some(channel) = self.midi.channel {
            if channel > 15 {
                bail!("MIDI channel must be between 0 and 15");
            }
        }

        let env = &self.envelope;
        for (name, value) in [
            ("attack", env.attack),
            ("decay", env.decay),
            ("release", env.release),
            ("cleanup_margin", env.cleanup_margin),
        ] {
            if !(value >= 0.0 && value.is_finite()) {
                bail!("Envelope {} must be a non-negative number of seconds", name);
            }
        }
        if !(0.0..=1.0).contains(&env.sustain) {
            bail!("Envelope sustain must be between 0.0 and 1.0");
        }

        let chain = &self.chain;
        if !(chain.max_delay > 0.0 && chain.max_delay <= 30.0) {
            bail!("Maximum delay must be greater than 0 and at most 30 seconds");
        }
        if !(0.0..=chain.max_delay).contains(&chain.delay_time) {
            bail!("Delay time must be between 0 and {} seconds", chain.max_delay);
        }
        if !(0.0..1.0).contains(&chain.feedback) {
            bail!("Feedback must be at least 0.0 and below 1.0");
        }
        if !(MIN_DBFS..=0.0).contains(&chain.input_gain_db) {
            bail!("Input gain must be between {} and 0 dBFS", MIN_DBFS);
        }
        if !(MIN_DBFS..=0.0).contains(&chain.volume_db) {
            bail!("Volume must be between {} and 0 dBFS", MIN_DBFS);
        }

        Ok(())
    }
}

/// Lowest gain setting accepted, in dBFS
pub const MIN_DBFS: f64 = -60.0;

/// Audio output configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Sample rate in Hz for offline rendering (default: 44100)
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Buffer size in samples (default: 512)
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    /// Output device name (None = default device)
    #[serde(default)]
    pub device: Option<String>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            buffer_size: default_buffer_size(),
            device: None,
        }
    }
}

fn default_sample_rate() -> u32 { 44100 }
fn default_buffer_size() -> usize { 512 }

/// MIDI input configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MidiConfig {
    /// Input port name substring (None = first available port)
    #[serde(default)]
    pub port: Option<String>,

    /// Only accept this channel, 0-15 (None = omni)
    #[serde(default)]
    pub channel: Option<u8>,
}

/// Envelope configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeConfig {
    /// Attack time in seconds (default: 0.02)
    #[serde(default = "default_attack")]
    pub attack: f64,

    /// Decay time in seconds (default: 0.1)
    #[serde(default = "default_decay")]
    pub decay: f64,

    /// Sustain level 0.0-1.0 (default: 0.5)
    #[serde(default = "default_sustain")]
    pub sustain: f64,

    /// Release time in seconds (default: 0.25)
    #[serde(default = "default_release")]
    pub release: f64,

    /// Seconds between the end of a release and voice teardown (default: 1.0)
    #[serde(default = "default_cleanup_margin")]
    pub cleanup_margin: f64,
}

impl EnvelopeConfig {
    pub fn times(&self) -> EnvelopeTimes {
        EnvelopeTimes::new(self.attack, self.decay, self.sustain, self.release)
    }
}

impl Default for EnvelopeConfig {
    fn default() -> Self {
        Self {
            attack: default_attack(),
            decay: default_decay(),
            sustain: default_sustain(),
            release: default_release(),
            cleanup_margin: default_cleanup_margin(),
        }
    }
}

fn default_attack() -> f64 { 0.02 }
fn default_decay() -> f64 { 0.1 }
fn default_sustain() -> f64 { 0.5 }
fn default_release() -> f64 { 0.25 }
fn default_cleanup_margin() -> f64 { DEFAULT_CLEANUP_MARGIN }

/// Voice creation settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VoiceConfig {
    /// Initial waveform (default: sine)
    #[serde(default)]
    pub waveform: Waveform,

    /// Behaviour for a note-on while the note still sounds (default: retrigger)
    #[serde(default)]
    pub retrigger: RetriggerPolicy,
}

/// Shared processing chain settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Input gain in dBFS (default: 0)
    #[serde(default)]
    pub input_gain_db: f64,

    /// Delay time in seconds (default: 0.25)
    #[serde(default = "default_delay_time")]
    pub delay_time: f64,

    /// Fraction of the delayed signal fed back (default: 0.25)
    #[serde(default = "default_feedback")]
    pub feedback: f64,

    /// Output volume in dBFS (default: 0)
    #[serde(default)]
    pub volume_db: f64,

    /// Longest delay time the buffer can hold, in seconds (default: 5.0)
    #[serde(default = "default_max_delay")]
    pub max_delay: f64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            input_gain_db: 0.0,
            delay_time: default_delay_time(),
            feedback: default_feedback(),
            volume_db: 0.0,
            max_delay: default_max_delay(),
        }
    }
}

fn default_delay_time() -> f64 { 0.25 }
fn default_feedback() -> f64 { 0.25 }
fn default_max_delay() -> f64 { 5.0 }
