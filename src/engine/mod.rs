//! Audio engine for midiecho
//!
//! Owns the audio clock, the voice table and the shared processing chain,
//! and turns control events into sound.

mod chain;
pub mod midi;
mod player;
mod recorder;
pub mod session;

pub use chain::{DelayLine, ProcessingChain, DELAY_RAMP, GAIN_RAMP};
pub use player::{default_device_name, list_output_devices, Player};
pub use recorder::{Recorder, RenderStats};

use anyhow::Result;
use log::{debug, info};

use crate::config::{EchoConfig, MIN_DBFS};
use crate::synth::{VoiceManager, Waveform};

/// How often (in frames) offline rendering runs voice maintenance
const MAINTENANCE_FRAMES: u64 = 128;

/// Everything that can change the engine's state
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlEvent {
    /// Start a note; `attack` is the peak level (velocity / 127)
    NoteOn { note: u8, attack: f64 },
    /// Release a note
    NoteOff { note: u8 },
    /// Release every sounding note
    AllNotesOff,
    /// Input gain in dBFS
    SetInputGain(f64),
    /// Delay time in seconds
    SetDelayTime(f64),
    /// Feedback amount 0.0-1.0
    SetFeedback(f64),
    /// Output volume in dBFS
    SetVolume(f64),
    /// Waveform for notes started from now on
    SetWaveform(Waveform),
    /// End the session
    Quit,
}

/// Current control values, as shown to the user
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChainSettings {
    pub input_gain_db: f64,
    pub delay_time: f64,
    pub feedback: f64,
    pub volume_db: f64,
    pub waveform: Waveform,
}

impl ChainSettings {
    pub fn input_gain_display(&self) -> String {
        format!("{} dBFS", self.input_gain_db)
    }

    pub fn delay_time_display(&self) -> String {
        format!("{:.2} sec", self.delay_time)
    }

    pub fn feedback_display(&self) -> String {
        format!("{}%", (self.feedback * 100.0).round() as i64)
    }

    pub fn volume_display(&self) -> String {
        format!("{} dBFS", self.volume_db)
    }
}

/// A control event at a point on the audio clock
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledEvent {
    pub time: f64,
    pub event: ControlEvent,
}

impl ScheduledEvent {
    pub fn new(time: f64, event: ControlEvent) -> Self {
        Self { time, event }
    }
}

/// The main audio engine
pub struct Engine {
    sample_rate: f64,
    frames: u64,
    voices: VoiceManager,
    chain: ProcessingChain,
    settings: ChainSettings,
}

impl Engine {
    /// Create a new engine rendering at `sample_rate`
    pub fn new(config: &EchoConfig, sample_rate: f64) -> Self {
        let voices = VoiceManager::new(config.envelope.times(), config.voice.retrigger)
            .with_cleanup_margin(config.envelope.cleanup_margin);

        let chain = ProcessingChain::new(
            sample_rate,
            config.chain.max_delay,
            config.chain.input_gain_db,
            config.chain.delay_time,
            config.chain.feedback,
            config.chain.volume_db,
        );

        let settings = ChainSettings {
            input_gain_db: config.chain.input_gain_db,
            delay_time: config.chain.delay_time.clamp(0.0, chain.max_delay()),
            feedback: config.chain.feedback,
            volume_db: config.chain.volume_db,
            waveform: config.voice.waveform,
        };

        Self {
            sample_rate,
            frames: 0,
            voices,
            chain,
            settings,
        }
    }

    /// Get the sample rate
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Seconds of audio rendered so far
    pub fn current_time(&self) -> f64 {
        self.frames as f64 / self.sample_rate
    }

    pub fn voices(&self) -> &VoiceManager {
        &self.voices
    }

    pub fn chain(&self) -> &ProcessingChain {
        &self.chain
    }

    pub fn settings(&self) -> ChainSettings {
        self.settings
    }

    /// Note numbers with a live voice, ascending
    pub fn active_notes(&self) -> Vec<u8> {
        self.voices.notes()
    }

    /// Apply a control event at the current audio time
    pub fn handle(&mut self, event: ControlEvent) {
        match event {
            ControlEvent::NoteOn { note, attack } => self.note_on(note, attack),
            ControlEvent::NoteOff { note } => self.note_off(note),
            ControlEvent::AllNotesOff => self.voices.release_all(self.current_time()),
            ControlEvent::SetInputGain(db) => self.set_input_gain_db(db),
            ControlEvent::SetDelayTime(seconds) => self.set_delay_time(seconds),
            ControlEvent::SetFeedback(amount) => self.set_feedback(amount),
            ControlEvent::SetVolume(db) => self.set_volume_db(db),
            ControlEvent::SetWaveform(waveform) => self.set_waveform(waveform),
            ControlEvent::Quit => {}
        }
    }

    /// Start a voice with the current waveform
    pub fn note_on(&mut self, note: u8, attack: f64) {
        let now = self.current_time();
        self.voices.note_on(note, attack, self.settings.waveform, now);
    }

    pub fn note_off(&mut self, note: u8) {
        let now = self.current_time();
        self.voices.note_off(note, now);
    }

    pub fn set_input_gain_db(&mut self, db: f64) {
        let db = db.clamp(MIN_DBFS, 0.0);
        self.chain.set_input_gain_db(db, self.current_time());
        self.settings.input_gain_db = db;
        debug!("input gain {} dBFS", db);
    }

    pub fn set_delay_time(&mut self, seconds: f64) {
        let seconds = seconds.clamp(0.0, self.chain.max_delay());
        self.chain.set_delay_time(seconds, self.current_time());
        self.settings.delay_time = seconds;
        debug!("delay time {:.2} sec", seconds);
    }

    pub fn set_feedback(&mut self, amount: f64) {
        let amount = amount.clamp(0.0, 1.0);
        self.chain.set_feedback(amount, self.current_time());
        self.settings.feedback = amount;
        debug!("feedback {:.2}", amount);
    }

    pub fn set_volume_db(&mut self, db: f64) {
        let db = db.clamp(MIN_DBFS, 0.0);
        self.chain.set_volume_db(db, self.current_time());
        self.settings.volume_db = db;
        debug!("volume {} dBFS", db);
    }

    /// Select the waveform for notes started after this call
    pub fn set_waveform(&mut self, waveform: Waveform) {
        self.settings.waveform = waveform;
        info!("waveform {}", waveform);
    }

    /// Reap finished voices and drop stale automation; returns voices reclaimed
    pub fn maintain(&mut self) -> usize {
        let now = self.current_time();
        let reaped = self.voices.reap(now);
        self.voices.prune(now);
        self.chain.prune(now);
        reaped
    }

    /// Tear down every voice and empty the delay line
    pub fn silence(&mut self) {
        self.voices.silence_all();
        self.chain.clear();
    }

    /// Generate the next sample
    pub fn process(&mut self) -> f64 {
        let now = self.current_time();
        let dry = self.voices.render(now, self.sample_rate);
        let out = self.chain.process(dry, now);
        self.frames += 1;
        out
    }

    /// Fill a buffer with samples
    pub fn fill_buffer(&mut self, buffer: &mut [f32]) {
        for sample in buffer.iter_mut() {
            *sample = self.process() as f32;
        }
    }

    /// Render `seconds` of audio offline, applying `events` at their times.
    ///
    /// Events must be sorted by time. Each rendered sample is handed to `sink`.
    pub fn render_schedule<F>(&mut self, events: &[ScheduledEvent], seconds: f64, mut sink: F) -> Result<()>
    where
        F: FnMut(f32) -> Result<()>,
    {
        let total = (seconds.max(0.0) * self.sample_rate).round() as u64;
        let mut pending = events.iter().peekable();

        for i in 0..total {
            let now = self.current_time();
            while let Some(scheduled) = pending.next_if(|e| e.time <= now) {
                self.handle(scheduled.event);
            }
            if i % MAINTENANCE_FRAMES == 0 {
                self.maintain();
            }
            sink(self.process() as f32)?;
        }
        self.maintain();

        Ok(())
    }
}
