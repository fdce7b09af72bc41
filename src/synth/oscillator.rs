//! Tone generator node

use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Waveform shapes a tone generator can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Waveform {
    #[default]
    Sine,
    Sawtooth,
    Square,
    Triangle,
}

impl Waveform {
    /// Every selectable waveform, in UI order
    pub const ALL: [Waveform; 4] = [
        Waveform::Sine,
        Waveform::Sawtooth,
        Waveform::Square,
        Waveform::Triangle,
    ];

    /// Lowercase name, matching the config spelling
    pub fn name(&self) -> &'static str {
        match self {
            Waveform::Sine => "sine",
            Waveform::Sawtooth => "sawtooth",
            Waveform::Square => "square",
            Waveform::Triangle => "triangle",
        }
    }

    /// Evaluate one cycle of the shape at `phase` in [0, 1)
    pub fn sample(&self, phase: f64) -> f64 {
        match self {
            Waveform::Sine => (phase * 2.0 * PI).sin(),
            Waveform::Sawtooth => 2.0 * phase - 1.0,
            Waveform::Square => {
                if phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            Waveform::Triangle => {
                if phase < 0.25 {
                    4.0 * phase
                } else if phase < 0.75 {
                    2.0 - 4.0 * phase
                } else {
                    4.0 * phase - 4.0
                }
            }
        }
    }
}

impl fmt::Display for Waveform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error for an unrecognised waveform name
#[derive(Debug, Error, PartialEq)]
#[error("unknown waveform '{0}' (expected sine, sawtooth, square or triangle)")]
pub struct ParseWaveformError(String);

impl FromStr for Waveform {
    type Err = ParseWaveformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sine" => Ok(Waveform::Sine),
            "sawtooth" | "saw" => Ok(Waveform::Sawtooth),
            "square" => Ok(Waveform::Square),
            "triangle" => Ok(Waveform::Triangle),
            _ => Err(ParseWaveformError(s.to_string())),
        }
    }
}

/// Misuse of a node's one-shot lifecycle
#[derive(Debug, Error, PartialEq)]
pub enum NodeError {
    #[error("tone generator was already started")]
    AlreadyStarted,
    #[error("tone generator was never started")]
    NotStarted,
}

/// Lifecycle of a tone generator. Once stopped it can never run again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Created,
    Running,
    Stopped,
}

/// A continuous periodic source at a fixed frequency
#[derive(Debug, Clone)]
pub struct ToneGenerator {
    waveform: Waveform,
    frequency: f64,
    phase: f64,
    state: NodeState,
    connected: bool,
}

impl ToneGenerator {
    /// Create an idle generator; it is silent until started and connected
    pub fn new(waveform: Waveform, frequency: f64) -> Self {
        Self {
            waveform,
            frequency,
            phase: 0.0,
            state: NodeState::Created,
            connected: false,
        }
    }

    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    pub fn waveform(&self) -> Waveform {
        self.waveform
    }

    pub fn state(&self) -> NodeState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Route this generator's output downstream
    pub fn connect(&mut self) {
        self.connected = true;
    }

    /// Detach this generator from everything downstream
    pub fn disconnect(&mut self) {
        self.connected = false;
    }

    /// Begin producing signal
    pub fn start(&mut self) -> Result<(), NodeError> {
        match self.state {
            NodeState::Created => {
                self.state = NodeState::Running;
                Ok(())
            }
            NodeState::Running | NodeState::Stopped => Err(NodeError::AlreadyStarted),
        }
    }

    /// Stop permanently. Stopping twice is harmless.
    pub fn stop(&mut self) -> Result<(), NodeError> {
        match self.state {
            NodeState::Created => Err(NodeError::NotStarted),
            NodeState::Running | NodeState::Stopped => {
                self.state = NodeState::Stopped;
                Ok(())
            }
        }
    }

    /// Whether the generator contributes signal downstream
    pub fn is_audible(&self) -> bool {
        self.state == NodeState::Running && self.connected
    }

    /// Produce the next sample and advance the phase
    pub fn generate(&mut self, sample_rate: f64) -> f64 {
        if !self.is_audible() {
            return 0.0;
        }

        let sample = self.waveform.sample(self.phase);

        self.phase += self.frequency / sample_rate;
        self.phase -= self.phase.floor();

        sample
    }
}
