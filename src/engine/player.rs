//! Real-time audio playback using cpal

use anyhow::{anyhow, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, Device, SampleFormat, Stream, StreamConfig, SupportedBufferSize};
use log::{error, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use super::Engine;
use crate::ui::SampleBuffer;

/// Real-time audio player
pub struct Player {
    device: Device,
    config: StreamConfig,
    sample_format: SampleFormat,
    stream: Option<Stream>,
    running: Arc<AtomicBool>,
}

impl Player {
    /// Open the output device whose name contains `device_name`, or the default one.
    ///
    /// `buffer_size` frames per callback are requested when the device allows it.
    pub fn new(device_name: Option<&str>, buffer_size: Option<u32>) -> Result<Self> {
        let host = cpal::default_host();
        let device = match device_name {
            Some(name) => host
                .output_devices()?
                .find(|d| d.name().map(|n| n.contains(name)).unwrap_or(false))
                .ok_or_else(|| anyhow!("Output device '{}' not found", name))?,
            None => host
                .default_output_device()
                .ok_or_else(|| anyhow!("No output device available"))?,
        };

        let supported = device.default_output_config()?;
        let sample_format = supported.sample_format();
        let buffer_range = supported.buffer_size().clone();
        let mut config: StreamConfig = supported.into();

        if let Some(frames) = buffer_size {
            match buffer_range {
                SupportedBufferSize::Range { min, max } if (min..=max).contains(&frames) => {
                    config.buffer_size = BufferSize::Fixed(frames);
                }
                SupportedBufferSize::Range { min, max } => {
                    warn!("buffer size {} outside device range {}-{}, using default", frames, min, max);
                }
                SupportedBufferSize::Unknown => {
                    warn!("device does not report buffer sizes, using default");
                }
            }
        }

        info!(
            "Audio output: {} ({} Hz, {} ch)",
            device.name().unwrap_or_default(),
            config.sample_rate.0,
            config.channels
        );

        Ok(Self {
            device,
            config,
            sample_format,
            stream: None,
            running: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Sample rate the device will pull at; build the engine with this
    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    /// Start playing audio from the engine
    pub fn start(&mut self, engine: Arc<Mutex<Engine>>) -> Result<()> {
        self.start_with_scope(engine, None)
    }

    /// Start playing audio, copying output into `scope` for display
    pub fn start_with_scope(
        &mut self,
        engine: Arc<Mutex<Engine>>,
        scope: Option<Arc<Mutex<SampleBuffer>>>,
    ) -> Result<()> {
        self.running.store(true, Ordering::SeqCst);
        let running = self.running.clone();

        let stream = match self.sample_format {
            SampleFormat::F32 => self.build_stream::<f32>(engine, running, scope)?,
            SampleFormat::I16 => self.build_stream::<i16>(engine, running, scope)?,
            SampleFormat::U16 => self.build_stream::<u16>(engine, running, scope)?,
            _ => return Err(anyhow!("Unsupported sample format")),
        };

        stream.play()?;
        self.stream = Some(stream);

        Ok(())
    }

    /// Stop playback
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        self.stream = None;
    }

    fn build_stream<T: cpal::Sample + cpal::SizedSample + cpal::FromSample<f32>>(
        &self,
        engine: Arc<Mutex<Engine>>,
        running: Arc<AtomicBool>,
        scope: Option<Arc<Mutex<SampleBuffer>>>,
    ) -> Result<Stream> {
        let channels = self.config.channels as usize;

        let stream = self.device.build_output_stream(
            &self.config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                if !running.load(Ordering::SeqCst) {
                    // Fill with silence when stopped
                    for sample in data.iter_mut() {
                        *sample = T::from_sample(0.0f32);
                    }
                    return;
                }

                if let Ok(mut eng) = engine.try_lock() {
                    let mut scope_guard = scope.as_ref().and_then(|s| s.try_lock().ok());

                    for frame in data.chunks_mut(channels) {
                        let sample = eng.process() as f32;

                        if let Some(buf) = scope_guard.as_mut() {
                            buf.push(sample);
                        }

                        for channel_sample in frame.iter_mut() {
                            *channel_sample = T::from_sample(sample);
                        }
                    }
                } else {
                    // Engine busy with an event, fill with silence
                    for sample in data.iter_mut() {
                        *sample = T::from_sample(0.0f32);
                    }
                }
            },
            |err| {
                error!("Audio stream error: {}", err);
            },
            None,
        )?;

        Ok(stream)
    }
}

/// Get the default output device name
pub fn default_device_name() -> Option<String> {
    let host = cpal::default_host();
    host.default_output_device()
        .and_then(|d| d.name().ok())
}

/// List all available output devices
pub fn list_output_devices() -> Vec<(String, StreamConfig)> {
    let host = cpal::default_host();
    let mut devices = Vec::new();

    if let Ok(output_devices) = host.output_devices() {
        for device in output_devices {
            if let (Ok(name), Ok(config)) = (device.name(), device.default_output_config()) {
                devices.push((name, config.into()));
            }
        }
    }

    devices
}
