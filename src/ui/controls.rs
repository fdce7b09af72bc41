//! Adjustable controls and how key presses change them

use crate::config::MIN_DBFS;
use crate::engine::{ChainSettings, ControlEvent};
use crate::synth::Waveform;

/// Highest feedback reachable from the keyboard
pub const MAX_FEEDBACK: f64 = 0.99;

/// One row of the control panel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    InputGain,
    DelayTime,
    Feedback,
    Volume,
    Waveform,
}

impl Control {
    pub const ALL: [Control; 5] = [
        Control::InputGain,
        Control::DelayTime,
        Control::Feedback,
        Control::Volume,
        Control::Waveform,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Control::InputGain => "Input gain",
            Control::DelayTime => "Delay time",
            Control::Feedback => "Feedback",
            Control::Volume => "Volume",
            Control::Waveform => "Waveform",
        }
    }

    /// The value as displayed next to the label
    pub fn display(&self, settings: &ChainSettings) -> String {
        match self {
            Control::InputGain => settings.input_gain_display(),
            Control::DelayTime => settings.delay_time_display(),
            Control::Feedback => settings.feedback_display(),
            Control::Volume => settings.volume_display(),
            Control::Waveform => settings.waveform.to_string(),
        }
    }

    /// Position within the control's range, 0.0-1.0, for the gauge
    pub fn ratio(&self, settings: &ChainSettings, max_delay: f64) -> f64 {
        let ratio = match self {
            Control::InputGain => (settings.input_gain_db - MIN_DBFS) / -MIN_DBFS,
            Control::DelayTime => settings.delay_time / max_delay,
            Control::Feedback => settings.feedback / MAX_FEEDBACK,
            Control::Volume => (settings.volume_db - MIN_DBFS) / -MIN_DBFS,
            Control::Waveform => {
                let idx = Waveform::ALL
                    .iter()
                    .position(|w| *w == settings.waveform)
                    .unwrap_or(0);
                idx as f64 / (Waveform::ALL.len() - 1) as f64
            }
        };
        ratio.clamp(0.0, 1.0)
    }

    /// Event moving this control `steps` increments up (or down if negative)
    pub fn step(&self, settings: &ChainSettings, steps: i32, max_delay: f64) -> ControlEvent {
        let steps = steps as f64;
        match self {
            Control::InputGain => {
                ControlEvent::SetInputGain((settings.input_gain_db + steps).clamp(MIN_DBFS, 0.0))
            }
            Control::DelayTime => {
                let seconds = round_to(settings.delay_time + steps * 0.01, 100.0);
                ControlEvent::SetDelayTime(seconds.clamp(0.0, max_delay))
            }
            Control::Feedback => {
                let amount = round_to(settings.feedback + steps * 0.01, 100.0);
                ControlEvent::SetFeedback(amount.clamp(0.0, MAX_FEEDBACK))
            }
            Control::Volume => {
                ControlEvent::SetVolume((settings.volume_db + steps).clamp(MIN_DBFS, 0.0))
            }
            Control::Waveform => {
                let len = Waveform::ALL.len() as i64;
                let idx = Waveform::ALL
                    .iter()
                    .position(|w| *w == settings.waveform)
                    .unwrap_or(0) as i64;
                let next = (idx + steps as i64).rem_euclid(len) as usize;
                ControlEvent::SetWaveform(Waveform::ALL[next])
            }
        }
    }

    pub fn next(&self) -> Control {
        let idx = Control::ALL.iter().position(|c| c == self).unwrap_or(0);
        Control::ALL[(idx + 1) % Control::ALL.len()]
    }

    pub fn previous(&self) -> Control {
        let idx = Control::ALL.iter().position(|c| c == self).unwrap_or(0);
        Control::ALL[(idx + Control::ALL.len() - 1) % Control::ALL.len()]
    }
}

fn round_to(value: f64, scale: f64) -> f64 {
    (value * scale).round() / scale
}
