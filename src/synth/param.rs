//! Automation timeline for audio parameters
//!
//! Values are scheduled against the audio clock (seconds) and evaluated
//! lazily, so a ramp keeps running whether or not anyone is watching it.

/// A scheduled change to a parameter
#[derive(Debug, Clone, Copy, PartialEq)]
enum ParamEvent {
    /// Jump to `value` at `time`
    SetValue { time: f64, value: f64 },
    /// Arrive at `value` at `time`, interpolating from the previous event
    LinearRamp { time: f64, value: f64 },
}

impl ParamEvent {
    fn time(&self) -> f64 {
        match *self {
            ParamEvent::SetValue { time, .. } | ParamEvent::LinearRamp { time, .. } => time,
        }
    }

    fn value(&self) -> f64 {
        match *self {
            ParamEvent::SetValue { value, .. } | ParamEvent::LinearRamp { value, .. } => value,
        }
    }
}

/// A parameter whose value follows a list of timed events
#[derive(Debug, Clone)]
pub struct AudioParam {
    initial: f64,
    events: Vec<ParamEvent>,
}

impl AudioParam {
    /// Create a parameter holding `initial` until something is scheduled
    pub fn new(initial: f64) -> Self {
        Self {
            initial,
            events: Vec::new(),
        }
    }

    /// Jump to `value` at `time`
    pub fn set_value_at_time(&mut self, value: f64, time: f64) {
        self.insert(ParamEvent::SetValue { time, value });
    }

    /// Ramp linearly from the previous event so that `value` is reached at `end_time`
    pub fn linear_ramp_to_value_at_time(&mut self, value: f64, end_time: f64) {
        self.insert(ParamEvent::LinearRamp {
            time: end_time,
            value,
        });
    }

    /// Drop everything scheduled after `time` and freeze the value it would have had
    pub fn cancel_and_hold_at_time(&mut self, time: f64) {
        let held = self.value_at(time);
        self.events.retain(|e| e.time() <= time);
        self.insert(ParamEvent::SetValue { time, value: held });
    }

    /// Ramp from whatever the value is at `now` to `value` over `duration` seconds
    pub fn ramp_from_now(&mut self, value: f64, now: f64, duration: f64) {
        self.cancel_and_hold_at_time(now);
        self.linear_ramp_to_value_at_time(value, now + duration.max(0.0));
    }

    /// Evaluate the parameter at `time`
    pub fn value_at(&self, time: f64) -> f64 {
        // Index of the first event strictly after `time`
        let next = self.events.partition_point(|e| e.time() <= time);

        let (start_time, start_value) = match next.checked_sub(1) {
            Some(i) => (self.events[i].time(), self.events[i].value()),
            None => (0.0, self.initial),
        };

        match self.events.get(next) {
            Some(&ParamEvent::LinearRamp {
                time: end_time,
                value: end_value,
            }) => {
                let span = end_time - start_time;
                if span <= 0.0 {
                    end_value
                } else {
                    let progress = ((time - start_time) / span).clamp(0.0, 1.0);
                    start_value + (end_value - start_value) * progress
                }
            }
            _ => start_value,
        }
    }

    /// Collapse history that can no longer influence values at or after `now`
    pub fn prune(&mut self, now: f64) {
        let next = self.events.partition_point(|e| e.time() <= now);
        if next < 2 {
            return;
        }
        let anchor = self.events[next - 1];
        self.events.drain(..next);
        self.events.insert(
            0,
            ParamEvent::SetValue {
                time: anchor.time(),
                value: anchor.value(),
            },
        );
    }

    // Stable insert: events sharing a timestamp keep scheduling order
    fn insert(&mut self, event: ParamEvent) {
        let idx = self.events.partition_point(|e| e.time() <= event.time());
        self.events.insert(idx, event);
    }
}
