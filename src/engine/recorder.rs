//! Offline render target
//!
//! The engine is mono; each frame is copied to every channel of a 32-bit
//! float WAV file. Level statistics are kept so a render can report clipping.

use anyhow::{bail, Context, Result};
use hound::{SampleFormat, WavSpec, WavWriter};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Summary of a finished render
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderStats {
    pub frames: u64,
    pub seconds: f64,
    /// Largest absolute sample
    pub peak: f32,
    /// Frames whose magnitude exceeded full scale
    pub clipped_frames: u64,
}

/// WAV writer for engine output
pub struct Recorder {
    writer: WavWriter<BufWriter<File>>,
    sample_rate: u32,
    channels: u16,
    frames: u64,
    peak: f32,
    clipped_frames: u64,
}

impl Recorder {
    /// Create `path` for `channels` (1 or 2) at `sample_rate`
    pub fn new(path: &Path, sample_rate: u32, channels: u16) -> Result<Self> {
        if !(1..=2).contains(&channels) {
            bail!("Recorder supports mono or stereo, not {} channels", channels);
        }

        let spec = WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let writer = WavWriter::create(path, spec)
            .with_context(|| format!("failed to create {:?}", path))?;

        Ok(Self {
            writer,
            sample_rate,
            channels,
            frames: 0,
            peak: 0.0,
            clipped_frames: 0,
        })
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Append one mono frame to every channel
    pub fn write_frame(&mut self, sample: f32) -> Result<()> {
        for _ in 0..self.channels {
            self.writer
                .write_sample(sample)
                .context("failed to write frame")?;
        }

        let level = sample.abs();
        self.peak = self.peak.max(level);
        if level > 1.0 {
            self.clipped_frames += 1;
        }
        self.frames += 1;
        Ok(())
    }

    pub fn stats(&self) -> RenderStats {
        RenderStats {
            frames: self.frames,
            seconds: self.frames as f64 / self.sample_rate as f64,
            peak: self.peak,
            clipped_frames: self.clipped_frames,
        }
    }

    /// Write the header and close the file
    pub fn finish(self) -> Result<RenderStats> {
        let stats = self.stats();
        self.writer.finalize().context("failed to finalize WAV file")?;
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EchoConfig;
    use crate::engine::{ControlEvent, Engine, ScheduledEvent};
    use tempfile::NamedTempFile;

    #[test]
    fn test_rejects_unsupported_layout() {
        let file = NamedTempFile::new().unwrap();
        assert!(Recorder::new(file.path(), 44100, 0).is_err());
        assert!(Recorder::new(file.path(), 44100, 6).is_err());
    }

    #[test]
    fn test_stats_track_peak_and_clipping() {
        let file = NamedTempFile::new().unwrap();
        let mut recorder = Recorder::new(file.path(), 1000, 1).unwrap();

        for s in [0.5, -0.75, 1.5, -2.0, 1.0] {
            recorder.write_frame(s).unwrap();
        }

        let stats = recorder.finish().unwrap();
        assert_eq!(stats.frames, 5);
        assert_eq!(stats.peak, 2.0);
        assert_eq!(stats.clipped_frames, 2);
        assert!((stats.seconds - 0.005).abs() < 1e-12);
    }

    #[test]
    fn test_stereo_duplicates_frames() {
        let file = NamedTempFile::new().unwrap();
        let path = file.path().to_path_buf();

        let mut recorder = Recorder::new(&path, 8000, 2).unwrap();
        recorder.write_frame(0.25).unwrap();
        recorder.write_frame(-0.5).unwrap();
        assert_eq!(recorder.stats().frames, 2);
        recorder.finish().unwrap();

        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().channels, 2);
        let samples: Vec<f32> = reader.into_samples().map(|s| s.unwrap()).collect();
        assert_eq!(samples, vec![0.25, 0.25, -0.5, -0.5]);
    }

    #[test]
    fn test_engine_render_to_valid_wav() {
        let file = NamedTempFile::new().unwrap();
        let path = file.path().to_path_buf();

        let mut engine = Engine::new(&EchoConfig::default(), 8000.0);
        let events = [
            ScheduledEvent::new(0.0, ControlEvent::NoteOn { note: 60, attack: 0.8 }),
            ScheduledEvent::new(0.3, ControlEvent::NoteOff { note: 60 }),
        ];

        let mut recorder = Recorder::new(&path, 8000, 1).unwrap();
        engine
            .render_schedule(&events, 1.0, |s| recorder.write_frame(s))
            .unwrap();
        let stats = recorder.finish().unwrap();
        assert!(stats.peak > 0.0);
        assert_eq!(stats.clipped_frames, 0);

        let reader = hound::WavReader::open(&path).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, 8000);
        assert_eq!(spec.bits_per_sample, 32);
        assert_eq!(spec.sample_format, SampleFormat::Float);

        let samples: Vec<f32> = reader.into_samples().map(|s| s.unwrap()).collect();
        assert_eq!(samples.len(), 8000);
    }
}
