//! CLI interface for midiecho

use clap::{Parser, Subcommand};
use midiecho::engine::{ControlEvent, ScheduledEvent};
use midiecho::synth::Waveform;
use std::path::PathBuf;

/// Polyphonic MIDI synth with a feedback delay
#[derive(Parser)]
#[command(name = "midiecho")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Play notes from a MIDI input through the delay
    Play {
        /// Configuration file path
        #[arg(short, long, default_value = "midiecho.yaml")]
        config: PathBuf,

        /// MIDI input port (substring of the port name)
        #[arg(short, long)]
        port: Option<String>,

        /// Starting waveform (sine, sawtooth, square, triangle)
        #[arg(short, long)]
        waveform: Option<Waveform>,

        /// Log to the terminal instead of showing the control surface
        #[arg(long)]
        no_ui: bool,
    },

    /// Render a note sequence through the delay to a WAV file
    Render {
        /// Configuration file path
        #[arg(short, long, default_value = "midiecho.yaml")]
        config: PathBuf,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// MIDI note numbers, played one after another
        #[arg(short, long, value_delimiter = ',', default_value = "60,64,67",
              value_parser = clap::value_parser!(u8).range(0..=127))]
        notes: Vec<u8>,

        /// Seconds each note is held
        #[arg(long, default_value = "0.5")]
        hold: f64,

        /// Seconds rendered after the last note-off
        #[arg(long, default_value = "3.0")]
        tail: f64,

        /// Note-on velocity (1-127)
        #[arg(long, default_value = "100",
              value_parser = clap::value_parser!(u8).range(1..=127))]
        velocity: u8,

        /// Output channels (1 = mono, 2 = stereo)
        #[arg(long, default_value = "1",
              value_parser = clap::value_parser!(u16).range(1..=2))]
        channels: u16,
    },

    /// List MIDI inputs and audio outputs
    Devices,

    /// Validate a configuration file
    Check {
        /// Configuration file path
        #[arg(short, long, default_value = "midiecho.yaml")]
        config: PathBuf,
    },

    /// Generate an example configuration file
    Init,
}

/// Notes played back to back for `render`
#[derive(Debug, Clone, PartialEq)]
pub struct NoteSequence {
    pub notes: Vec<u8>,
    /// Seconds each note is held
    pub hold: f64,
    /// Seconds after the last note-off
    pub tail: f64,
    pub velocity: u8,
}

impl NoteSequence {
    /// Note-on/note-off pairs, sorted by time
    pub fn schedule(&self) -> Vec<ScheduledEvent> {
        let attack = self.velocity as f64 / 127.0;

        self.notes
            .iter()
            .enumerate()
            .flat_map(|(i, &note)| {
                let start = i as f64 * self.hold;
                [
                    ScheduledEvent::new(start, ControlEvent::NoteOn { note, attack }),
                    ScheduledEvent::new(start + self.hold, ControlEvent::NoteOff { note }),
                ]
            })
            .collect()
    }

    /// Seconds needed to play the sequence and let the echoes ring out
    pub fn length(&self) -> f64 {
        self.notes.len() as f64 * self.hold + self.tail
    }
}
