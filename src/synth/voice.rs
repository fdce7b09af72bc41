//! A single sounding note

use super::{midi_pitch_to_frequency, EnvelopeController, EnvelopeStage, EnvelopeTimes, ToneGenerator, Waveform};

/// Identity of a voice instance, never reused within a manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VoiceId(pub u64);

/// Pending teardown of a releasing voice, owned by that voice.
///
/// Dropping the handle together with its voice is what cancels it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CleanupTimer {
    deadline: f64,
}

impl CleanupTimer {
    /// Audio-clock time at which the voice may be torn down
    pub fn deadline(&self) -> f64 {
        self.deadline
    }

    pub fn is_due(&self, now: f64) -> bool {
        now >= self.deadline
    }
}

/// One note: a tone generator feeding its own envelope controller
#[derive(Debug, Clone)]
pub struct Voice {
    id: VoiceId,
    note: u8,
    tone: ToneGenerator,
    envelope: EnvelopeController,
    cleanup: Option<CleanupTimer>,
}

impl Voice {
    /// Build the nodes for `note`, connected but not yet started
    pub(crate) fn new(id: VoiceId, note: u8, waveform: Waveform, times: EnvelopeTimes) -> Self {
        let mut tone = ToneGenerator::new(waveform, midi_pitch_to_frequency(note));
        tone.connect();

        Self {
            id,
            note,
            tone,
            envelope: EnvelopeController::new(times),
            cleanup: None,
        }
    }

    pub fn id(&self) -> VoiceId {
        self.id
    }

    pub fn note(&self) -> u8 {
        self.note
    }

    pub fn tone(&self) -> &ToneGenerator {
        &self.tone
    }

    pub fn envelope(&self) -> &EnvelopeController {
        &self.envelope
    }

    pub fn cleanup(&self) -> Option<&CleanupTimer> {
        self.cleanup.as_ref()
    }

    /// Whether note-off has been received for this voice
    pub fn is_releasing(&self) -> bool {
        self.envelope.is_released()
    }

    pub fn stage_at(&self, time: f64) -> EnvelopeStage {
        self.envelope.stage_at(time)
    }

    pub(crate) fn tone_mut(&mut self) -> &mut ToneGenerator {
        &mut self.tone
    }

    pub(crate) fn envelope_mut(&mut self) -> &mut EnvelopeController {
        &mut self.envelope
    }

    pub(crate) fn arm_cleanup(&mut self, deadline: f64) {
        self.cleanup = Some(CleanupTimer { deadline });
    }

    pub(crate) fn cancel_cleanup(&mut self) -> Option<CleanupTimer> {
        self.cleanup.take()
    }

    /// Next output sample at audio-clock time `now`
    pub fn process(&mut self, now: f64, sample_rate: f64) -> f64 {
        if !self.tone.is_audible() {
            return 0.0;
        }
        self.tone.generate(sample_rate) * self.envelope.value_at(now)
    }
}
