//! Synthesis: tone generators, envelopes and the voice lifecycle
//!
//! Contains the nodes a voice is built from and the manager that maps MIDI
//! note numbers to live voices.

mod envelope;
mod manager;
mod oscillator;
mod param;
mod tuning;
mod voice;

pub use envelope::{EnvelopeController, EnvelopeStage, EnvelopeTimes};
pub use manager::{RetriggerPolicy, VoiceManager, DEFAULT_CLEANUP_MARGIN};
pub use oscillator::{NodeError, NodeState, ParseWaveformError, ToneGenerator, Waveform};
pub use param::AudioParam;
pub use tuning::{dbfs_to_linear_amplitude, linear_amplitude_to_dbfs, midi_pitch_to_frequency, A4_FREQUENCY};
pub use voice::{CleanupTimer, Voice, VoiceId};
