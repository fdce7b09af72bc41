//! Voice lifecycle: note number to live voice
//!
//! Every note-on builds a fresh voice and every note-off schedules its
//! release plus a teardown deadline. Teardown happens in [`VoiceManager::reap`],
//! which the owner calls periodically with the audio clock.

use std::collections::HashMap;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::{EnvelopeTimes, Voice, VoiceId, Waveform};

/// Extra time after a release ramp before a voice is torn down
pub const DEFAULT_CLEANUP_MARGIN: f64 = 1.0;

/// What a note-on does when the note already has a voice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetriggerPolicy {
    /// Tear down the existing voice immediately and start a new one
    #[default]
    Retrigger,
    /// Keep a still-held voice and drop the new note-on
    Ignore,
}

/// Owns every active voice, keyed by MIDI note number
#[derive(Debug)]
pub struct VoiceManager {
    voices: HashMap<u8, Voice>,
    times: EnvelopeTimes,
    cleanup_margin: f64,
    policy: RetriggerPolicy,
    next_id: u64,
    /// Voices removed by teardown, kept for inspection
    #[cfg(test)]
    retired: Vec<Voice>,
}

impl VoiceManager {
    pub fn new(times: EnvelopeTimes, policy: RetriggerPolicy) -> Self {
        Self {
            voices: HashMap::new(),
            times,
            cleanup_margin: DEFAULT_CLEANUP_MARGIN,
            policy,
            next_id: 0,
            #[cfg(test)]
            retired: Vec::new(),
        }
    }

    /// Set the slack between the end of a release and teardown
    pub fn with_cleanup_margin(mut self, seconds: f64) -> Self {
        self.cleanup_margin = seconds.max(0.0);
        self
    }

    pub fn times(&self) -> EnvelopeTimes {
        self.times
    }

    pub fn policy(&self) -> RetriggerPolicy {
        self.policy
    }

    pub fn cleanup_margin(&self) -> f64 {
        self.cleanup_margin
    }

    /// Start a voice for `note`, ramping up to `attack_level`
    pub fn note_on(&mut self, note: u8, attack_level: f64, waveform: Waveform, now: f64) {
        if let Some(existing) = self.voices.get(&note) {
            if self.policy == RetriggerPolicy::Ignore && !existing.is_releasing() {
                debug!("note {} already sounding, ignoring note-on", note);
                return;
            }
            self.teardown(note);
        }

        let id = VoiceId(self.next_id);
        self.next_id += 1;

        let mut voice = Voice::new(id, note, waveform, self.times);
        if let Err(e) = voice.tone_mut().start() {
            warn!("voice {:?} for note {} failed to start: {}", id, note, e);
        }
        voice.envelope_mut().trigger(attack_level, now);

        debug!(
            "note on {} ({:.2} Hz, {}) level {:.2} as {:?}",
            note,
            voice.tone().frequency(),
            waveform,
            attack_level,
            id
        );
        self.voices.insert(note, voice);
    }

    /// Release the voice for `note`; absent or already-releasing notes are left alone
    pub fn note_off(&mut self, note: u8, now: f64) {
        let deadline = now + self.times.release + self.cleanup_margin;

        match self.voices.get_mut(&note) {
            Some(voice) if !voice.is_releasing() => {
                voice.envelope_mut().release(now);
                voice.arm_cleanup(deadline);
                debug!("note off {}, teardown at {:.3}s", note, deadline);
            }
            Some(_) => debug!("note {} already releasing", note),
            None => {}
        }
    }

    /// Release every held voice
    pub fn release_all(&mut self, now: f64) {
        let held: Vec<u8> = self
            .voices
            .values()
            .filter(|v| !v.is_releasing())
            .map(Voice::note)
            .collect();
        for note in held {
            self.note_off(note, now);
        }
    }

    /// Tear down voices whose cleanup deadline has passed
    pub fn reap(&mut self, now: f64) -> usize {
        let due: Vec<u8> = self
            .voices
            .values()
            .filter(|v| v.cleanup().is_some_and(|t| t.is_due(now)))
            .map(Voice::note)
            .collect();

        for &note in &due {
            self.teardown(note);
        }
        due.len()
    }

    /// Tear down every voice immediately
    pub fn silence_all(&mut self) {
        let notes: Vec<u8> = self.voices.keys().copied().collect();
        for note in notes {
            self.teardown(note);
        }
    }

    /// Mix one frame of every voice
    pub fn render(&mut self, now: f64, sample_rate: f64) -> f64 {
        self.voices
            .values_mut()
            .map(|voice| voice.process(now, sample_rate))
            .sum()
    }

    /// Drop automation history that no longer affects output
    pub fn prune(&mut self, now: f64) {
        for voice in self.voices.values_mut() {
            voice.envelope_mut().prune(now);
        }
    }

    pub fn voice(&self, note: u8) -> Option<&Voice> {
        self.voices.get(&note)
    }

    pub fn contains(&self, note: u8) -> bool {
        self.voices.contains_key(&note)
    }

    pub fn len(&self) -> usize {
        self.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    /// Active note numbers in ascending order
    pub fn notes(&self) -> Vec<u8> {
        let mut notes: Vec<u8> = self.voices.keys().copied().collect();
        notes.sort_unstable();
        notes
    }

    /// Stop, disconnect and forget the voice for `note`, cancelling its timer
    fn teardown(&mut self, note: u8) {
        let Some(mut voice) = self.voices.remove(&note) else {
            return;
        };
        voice.cancel_cleanup();

        let tone = voice.tone_mut();
        if let Err(e) = tone.stop() {
            warn!("stopping note {}: {}", note, e);
        }
        tone.disconnect();

        debug!("voice {:?} for note {} torn down", voice.id(), note);

        #[cfg(test)]
        self.retired.push(voice);
    }
}

impl Default for VoiceManager {
    fn default() -> Self {
        Self::new(EnvelopeTimes::default(), RetriggerPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::{midi_pitch_to_frequency, EnvelopeStage, NodeState};

    const SR: f64 = 44100.0;

    fn manager() -> VoiceManager {
        VoiceManager::new(
            EnvelopeTimes::new(0.02, 0.1, 0.5, 0.25),
            RetriggerPolicy::Retrigger,
        )
    }

    fn assert_torn_down(voice: &Voice) {
        assert_eq!(voice.tone().state(), NodeState::Stopped, "note {} still running", voice.note());
        assert!(!voice.tone().is_connected(), "note {} still connected", voice.note());
        assert!(voice.cleanup().is_none());
    }

    #[test]
    fn test_note_off_then_reap_clears_every_note() {
        let mut voices = manager();
        let release = voices.times().release;

        for note in 0..=127u8 {
            let now = note as f64 * 10.0;
            voices.note_on(note, 0.8, Waveform::Sine, now);
            voices.note_off(note, now);

            voices.reap(now + release + 0.999);
            assert!(voices.contains(note), "note {} removed too early", note);

            voices.reap(now + release + 1.0);
            assert!(!voices.contains(note), "note {} still present", note);
        }
        assert!(voices.is_empty());
    }

    #[test]
    fn test_note_off_without_voice_is_noop() {
        let mut voices = manager();
        voices.note_on(64, 0.5, Waveform::Sine, 0.0);

        voices.note_off(60, 0.1);

        assert_eq!(voices.notes(), vec![64]);
        assert!(!voices.voice(64).unwrap().is_releasing());
    }

    #[test]
    fn test_note_on_uses_note_frequency() {
        let mut voices = manager();
        voices.note_on(60, 0.8, Waveform::Sine, 0.0);

        assert_eq!(voices.len(), 1);
        let voice = voices.voice(60).unwrap();
        assert_eq!(voice.tone().frequency(), midi_pitch_to_frequency(60));
        assert!((voice.tone().frequency() - 261.6256).abs() < 1e-4);
        assert_eq!(voice.tone().waveform(), Waveform::Sine);
    }

    #[test]
    fn test_distinct_notes_are_independent() {
        let mut voices = manager();
        voices.note_on(60, 0.8, Waveform::Sine, 0.0);
        voices.note_on(64, 0.6, Waveform::Square, 0.0);

        voices.note_off(60, 1.0);

        let other = voices.voice(64).unwrap();
        assert!(!other.is_releasing());
        assert_eq!(other.stage_at(1.5), EnvelopeStage::Sustain);
        assert!((other.envelope().value_at(1.5) - 0.3).abs() < 1e-9);

        voices.reap(2.25);
        assert_eq!(voices.notes(), vec![64]);
    }

    #[test]
    fn test_double_note_on_keeps_one_voice() {
        let mut voices = manager();
        voices.note_on(60, 0.8, Waveform::Sine, 0.0);
        let first = voices.voice(60).unwrap().id();

        voices.note_on(60, 0.4, Waveform::Sine, 0.5);

        assert_eq!(voices.len(), 1);
        assert_ne!(voices.voice(60).unwrap().id(), first);
    }

    #[test]
    fn test_envelope_reaches_attack_then_sustain() {
        let mut voices = manager();
        let times = voices.times();
        let now = 3.0;
        voices.note_on(72, 0.8, Waveform::Triangle, now);

        let env = voices.voice(72).unwrap().envelope();
        assert!((env.value_at(now + times.attack) - 0.8).abs() < 1e-9);
        assert!(
            (env.value_at(now + times.attack + times.decay) - 0.8 * times.sustain).abs() < 1e-9
        );
    }

    #[test]
    fn test_stale_cleanup_does_not_remove_retriggered_voice() {
        let mut voices = manager();
        voices.note_on(60, 0.8, Waveform::Sine, 0.0);
        voices.note_off(60, 0.5);
        voices.note_on(60, 0.8, Waveform::Sine, 0.6);

        // First voice's deadline was 0.5 + 0.25 + 1.0
        voices.reap(1.75);
        voices.reap(10.0);

        let voice = voices.voice(60).expect("retriggered voice must survive");
        assert!(!voice.is_releasing());
    }

    #[test]
    fn test_retrigger_replaces_held_voice() {
        let mut voices = manager();
        voices.note_on(60, 0.8, Waveform::Sine, 0.0);
        voices.note_on(60, 0.8, Waveform::Sawtooth, 0.1);

        let voice = voices.voice(60).unwrap();
        assert_eq!(voice.tone().waveform(), Waveform::Sawtooth);
        assert!(voice.tone().is_audible());
        assert!(voice.cleanup().is_none());

        assert_eq!(voices.retired.len(), 1);
        let old = &voices.retired[0];
        assert_eq!(old.tone().waveform(), Waveform::Sine);
        assert_ne!(old.id(), voice.id());
        assert_torn_down(old);
    }

    #[test]
    fn test_reap_stops_and_disconnects() {
        let mut voices = manager();
        voices.note_on(60, 0.8, Waveform::Sine, 0.0);
        voices.note_off(60, 0.01);

        assert_eq!(voices.reap(1.259), 0);
        assert!(voices.retired.is_empty());

        assert_eq!(voices.reap(1.26), 1);
        assert_eq!(voices.retired.len(), 1);
        assert_torn_down(&voices.retired[0]);
    }

    #[test]
    fn test_ignore_policy_keeps_held_voice() {
        let mut voices = VoiceManager::new(EnvelopeTimes::default(), RetriggerPolicy::Ignore);
        voices.note_on(60, 0.8, Waveform::Sine, 0.0);
        let first = voices.voice(60).unwrap().id();

        voices.note_on(60, 0.2, Waveform::Square, 0.1);

        let voice = voices.voice(60).unwrap();
        assert_eq!(voice.id(), first);
        assert_eq!(voice.tone().waveform(), Waveform::Sine);
    }

    #[test]
    fn test_ignore_policy_replaces_releasing_voice() {
        let mut voices = VoiceManager::new(EnvelopeTimes::default(), RetriggerPolicy::Ignore);
        voices.note_on(60, 0.8, Waveform::Sine, 0.0);
        let first = voices.voice(60).unwrap().id();
        voices.note_off(60, 0.5);

        voices.note_on(60, 0.8, Waveform::Sine, 0.6);

        let voice = voices.voice(60).unwrap();
        assert_ne!(voice.id(), first);
        assert!(!voice.is_releasing());
    }

    #[test]
    fn test_repeated_note_off_keeps_first_deadline() {
        let mut voices = manager();
        voices.note_on(60, 0.8, Waveform::Sine, 0.0);
        voices.note_off(60, 1.0);
        voices.note_off(60, 2.0);

        let deadline = voices.voice(60).unwrap().cleanup().unwrap().deadline();
        assert!((deadline - 2.25).abs() < 1e-9);
    }

    #[test]
    fn test_release_all() {
        let mut voices = manager();
        for note in [60, 64, 67] {
            voices.note_on(note, 0.8, Waveform::Sine, 0.0);
        }

        voices.release_all(1.0);
        assert!(voices.notes().iter().all(|&n| voices.voice(n).unwrap().is_releasing()));

        assert_eq!(voices.reap(2.25), 3);
        assert!(voices.is_empty());
    }

    #[test]
    fn test_silence_all() {
        let mut voices = manager();
        voices.note_on(60, 0.8, Waveform::Sine, 0.0);
        voices.note_on(61, 0.8, Waveform::Sine, 0.0);

        voices.note_off(61, 0.1);

        voices.silence_all();
        assert!(voices.is_empty());
        assert_eq!(voices.render(0.5, SR), 0.0);

        let mut notes: Vec<u8> = voices.retired.iter().map(Voice::note).collect();
        notes.sort_unstable();
        assert_eq!(notes, vec![60, 61]);
        voices.retired.iter().for_each(assert_torn_down);
    }

    #[test]
    fn test_render_produces_signal() {
        let mut voices = manager();
        voices.note_on(69, 1.0, Waveform::Square, 0.0);

        let mut peak = 0.0f64;
        for i in 0..4410 {
            let t = i as f64 / SR;
            peak = peak.max(voices.render(t, SR).abs());
        }
        assert!(peak > 0.4, "expected audible output, peak {}", peak);
    }

    #[test]
    fn test_custom_cleanup_margin() {
        let mut voices = manager().with_cleanup_margin(0.0);
        voices.note_on(60, 0.8, Waveform::Sine, 0.0);
        voices.note_off(60, 1.0);

        assert_eq!(voices.reap(1.25), 1);
    }
}
