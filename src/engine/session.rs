//! Session loop
//!
//! The one place the engine is mutated from outside the audio callback.
//! MIDI callbacks and the terminal UI only send [`ControlEvent`]s; this loop
//! applies them in arrival order and runs voice cleanup on a fixed tick.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::{anyhow, Result};
use log::{debug, info};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::MissedTickBehavior;

use super::{ControlEvent, Engine};

/// Default period between cleanup passes
pub const DEFAULT_TICK: Duration = Duration::from_millis(10);

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// A `Quit` event was received
    Quit,
    /// Every event sender was dropped
    Disconnected,
    /// Ctrl-C
    Interrupted,
}

/// Create the channel control events travel on
pub fn channel() -> (UnboundedSender<ControlEvent>, UnboundedReceiver<ControlEvent>) {
    mpsc::unbounded_channel()
}

/// Lock the shared engine, treating a poisoned lock as an error
pub fn lock_engine(engine: &Mutex<Engine>) -> Result<MutexGuard<'_, Engine>> {
    engine.lock().map_err(|_| anyhow!("audio engine lock poisoned"))
}

/// Apply events and run cleanup until quit, disconnect or Ctrl-C.
///
/// Every voice is silenced before returning.
pub async fn run_session(
    engine: Arc<Mutex<Engine>>,
    mut events: UnboundedReceiver<ControlEvent>,
    tick: Duration,
) -> Result<SessionEnd> {
    let mut ticker = tokio::time::interval(tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let end = loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(ControlEvent::Quit) => break SessionEnd::Quit,
                Some(event) => {
                    lock_engine(&engine)?.handle(event);
                }
                None => break SessionEnd::Disconnected,
            },
            _ = ticker.tick() => {
                let reaped = lock_engine(&engine)?.maintain();
                if reaped > 0 {
                    debug!("reclaimed {} voice(s)", reaped);
                }
            }
            _ = &mut ctrl_c => break SessionEnd::Interrupted,
        }
    };

    lock_engine(&engine)?.silence();
    info!("session ended: {:?}", end);
    Ok(end)
}
