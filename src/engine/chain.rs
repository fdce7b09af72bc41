//! Shared processing chain every voice feeds into
//!
//! input gain -> delay (with feedback loop) -> volume -> output

use crate::synth::{dbfs_to_linear_amplitude, AudioParam};

/// Ramp length for gain and feedback changes
pub const GAIN_RAMP: f64 = 0.02;

/// Ramp length for delay time changes
pub const DELAY_RAMP: f64 = 0.2;

/// Fractional delay line over a circular buffer
#[derive(Debug, Clone)]
pub struct DelayLine {
    buffer: Vec<f64>,
    write_pos: usize,
    sample_rate: f64,
}

impl DelayLine {
    /// Allocate room for `max_delay` seconds at `sample_rate`
    pub fn new(max_delay: f64, sample_rate: f64) -> Self {
        let len = (max_delay.max(0.0) * sample_rate).ceil() as usize + 2;
        Self {
            buffer: vec![0.0; len],
            write_pos: 0,
            sample_rate,
        }
    }

    /// Longest delay the buffer can hold, in seconds
    pub fn max_delay(&self) -> f64 {
        (self.buffer.len() - 2) as f64 / self.sample_rate
    }

    /// Read the signal written `delay` seconds ago (at least one frame)
    pub fn read(&self, delay: f64) -> f64 {
        let len = self.buffer.len();
        let frames = (delay * self.sample_rate).clamp(1.0, (len - 1) as f64);

        let whole = frames.floor();
        let frac = frames - whole;
        let whole = whole as usize;

        let newer = self.buffer[(self.write_pos + len - whole) % len];
        let older = self.buffer[(self.write_pos + len - whole - 1) % len];
        newer + (older - newer) * frac
    }

    /// Push one frame and advance
    pub fn write(&mut self, sample: f64) {
        self.buffer[self.write_pos] = sample;
        self.write_pos = (self.write_pos + 1) % self.buffer.len();
    }

    /// Zero the buffer
    pub fn clear(&mut self) {
        self.buffer.iter_mut().for_each(|s| *s = 0.0);
    }
}

/// Input gain, feedback delay and output volume
#[derive(Debug, Clone)]
pub struct ProcessingChain {
    input_gain: AudioParam,
    delay: DelayLine,
    delay_time: AudioParam,
    feedback: AudioParam,
    volume: AudioParam,
}

impl ProcessingChain {
    /// Build the chain with initial settings taking effect immediately
    pub fn new(
        sample_rate: f64,
        max_delay: f64,
        input_gain_db: f64,
        delay_time: f64,
        feedback: f64,
        volume_db: f64,
    ) -> Self {
        let delay = DelayLine::new(max_delay, sample_rate);
        let delay_time = delay_time.clamp(0.0, delay.max_delay());

        Self {
            input_gain: AudioParam::new(dbfs_to_linear_amplitude(input_gain_db)),
            delay,
            delay_time: AudioParam::new(delay_time),
            feedback: AudioParam::new(feedback),
            volume: AudioParam::new(dbfs_to_linear_amplitude(volume_db)),
        }
    }

    /// Ramp the input gain to `dbfs`
    pub fn set_input_gain_db(&mut self, dbfs: f64, now: f64) {
        self.input_gain
            .ramp_from_now(dbfs_to_linear_amplitude(dbfs), now, GAIN_RAMP);
    }

    /// Ramp the delay time to `seconds`, clamped to the buffer length
    pub fn set_delay_time(&mut self, seconds: f64, now: f64) {
        let seconds = seconds.clamp(0.0, self.delay.max_delay());
        self.delay_time.ramp_from_now(seconds, now, DELAY_RAMP);
    }

    /// Ramp the feedback amount (fraction of the delayed signal fed back)
    pub fn set_feedback(&mut self, amount: f64, now: f64) {
        self.feedback.ramp_from_now(amount, now, GAIN_RAMP);
    }

    /// Ramp the output volume to `dbfs`
    pub fn set_volume_db(&mut self, dbfs: f64, now: f64) {
        self.volume
            .ramp_from_now(dbfs_to_linear_amplitude(dbfs), now, GAIN_RAMP);
    }

    pub fn input_gain(&self) -> &AudioParam {
        &self.input_gain
    }

    pub fn delay_time(&self) -> &AudioParam {
        &self.delay_time
    }

    pub fn feedback(&self) -> &AudioParam {
        &self.feedback
    }

    pub fn volume(&self) -> &AudioParam {
        &self.volume
    }

    pub fn max_delay(&self) -> f64 {
        self.delay.max_delay()
    }

    /// Run one frame of the summed voices through the chain.
    ///
    /// Only the delayed signal reaches the output.
    pub fn process(&mut self, input: f64, now: f64) -> f64 {
        let x = input * self.input_gain.value_at(now);
        let delayed = self.delay.read(self.delay_time.value_at(now));
        self.delay.write(x + self.feedback.value_at(now) * delayed);
        delayed * self.volume.value_at(now)
    }

    /// Drop finished automation
    pub fn prune(&mut self, now: f64) {
        self.input_gain.prune(now);
        self.delay_time.prune(now);
        self.feedback.prune(now);
        self.volume.prune(now);
    }

    /// Silence the feedback loop
    pub fn clear(&mut self) {
        self.delay.clear();
    }
}
