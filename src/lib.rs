//! midiecho - Polyphonic MIDI synth with a feedback delay
//!
//! Every MIDI note gets its own oscillator and ADSR envelope. All voices feed
//! one shared chain: input gain, a delay line with feedback, output volume.

pub mod config;
pub mod engine;
pub mod synth;
pub mod ui;

pub use config::EchoConfig;
pub use engine::Engine;
