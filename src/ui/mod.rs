//! Terminal control surface
//!
//! Shows the chain controls, the sounding notes and a scope of the output.
//! Key presses become [`ControlEvent`]s sent to the session; the UI never
//! mutates the engine itself.

mod controls;
mod scope;

pub use controls::{Control, MAX_FEEDBACK};
pub use scope::Scope;

use std::sync::{Arc, Mutex, TryLockError};
use std::time::Duration;

use anyhow::{anyhow, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, List, ListItem, Paragraph},
    Frame, Terminal,
};
use tokio::sync::mpsc::UnboundedSender;

use crate::engine::{ChainSettings, ControlEvent, Engine};
use crate::synth::{linear_amplitude_to_dbfs, EnvelopeStage, Waveform};

/// Samples kept for the scope
pub const SCOPE_CAPACITY: usize = 2048;

const FRAME_INTERVAL: Duration = Duration::from_millis(33);

/// Ring of the most recent output samples
pub struct SampleBuffer {
    samples: Vec<f32>,
    write_pos: usize,
}

impl SampleBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: vec![0.0; capacity.max(1)],
            write_pos: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.samples.len()
    }

    pub fn push(&mut self, sample: f32) {
        self.samples[self.write_pos] = sample;
        self.write_pos = (self.write_pos + 1) % self.samples.len();
    }

    /// The newest `count` samples, oldest first
    pub fn recent(&self, count: usize) -> Vec<f32> {
        let capacity = self.samples.len();
        let count = count.min(capacity);
        (capacity - count..capacity)
            .map(|i| self.samples[(self.write_pos + i) % capacity])
            .collect()
    }

    /// Largest absolute value currently held
    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0f32, |p, s| p.max(s.abs()))
    }
}

/// What a key press asks for
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KeyAction {
    Select(Control),
    Send(ControlEvent),
    Quit,
    None,
}

/// Map a key press to an action given the current selection and values
pub fn handle_key(
    key: KeyEvent,
    selected: Control,
    settings: &ChainSettings,
    max_delay: f64,
) -> KeyAction {
    // Coarse steps with shift
    let steps = if key.modifiers.contains(KeyModifiers::SHIFT) { 10 } else { 1 };

    match (key.code, key.modifiers) {
        (KeyCode::Char('q'), _) | (KeyCode::Esc, _) => KeyAction::Quit,
        (KeyCode::Char('c'), m) if m.contains(KeyModifiers::CONTROL) => KeyAction::Quit,
        (KeyCode::Up, _) => KeyAction::Select(selected.previous()),
        (KeyCode::Down, _) => KeyAction::Select(selected.next()),
        (KeyCode::Left, _) => KeyAction::Send(selected.step(settings, -steps, max_delay)),
        (KeyCode::Right, _) => KeyAction::Send(selected.step(settings, steps, max_delay)),
        (KeyCode::Char(c @ '1'..='4'), _) => {
            let idx = c as usize - '1' as usize;
            KeyAction::Send(ControlEvent::SetWaveform(Waveform::ALL[idx]))
        }
        _ => KeyAction::None,
    }
}

/// Take `lock` only if it is free; `Ok(None)` when someone else holds it
fn try_with<T, R>(lock: &Mutex<T>, what: &str, f: impl FnOnce(&T) -> R) -> Result<Option<R>> {
    match lock.try_lock() {
        Ok(guard) => Ok(Some(f(&guard))),
        Err(TryLockError::WouldBlock) => Ok(None),
        Err(TryLockError::Poisoned(_)) => Err(anyhow!("{} lock poisoned", what)),
    }
}

/// Engine state copied out under the lock for one frame
#[derive(Debug, Clone, PartialEq)]
struct Snapshot {
    settings: ChainSettings,
    max_delay: f64,
    time: f64,
    notes: Vec<(u8, EnvelopeStage)>,
}

impl Snapshot {
    /// Copy the engine state without waiting on the audio callback
    fn try_take(engine: &Mutex<Engine>) -> Result<Option<Self>> {
        try_with(engine, "audio engine", Self::from_engine)
    }

    fn from_engine(engine: &Engine) -> Self {
        let time = engine.current_time();
        let notes = engine
            .active_notes()
            .into_iter()
            .filter_map(|n| engine.voices().voice(n).map(|v| (n, v.stage_at(time))))
            .collect();

        Self {
            settings: engine.settings(),
            max_delay: engine.chain().max_delay(),
            time,
            notes,
        }
    }
}

/// Run the terminal UI until the user quits or the session goes away
pub fn run_ui(
    engine: Arc<Mutex<Engine>>,
    scope: Arc<Mutex<SampleBuffer>>,
    sender: UnboundedSender<ControlEvent>,
) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;

    let result = ui_loop(&mut terminal, &engine, &scope, &sender);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn ui_loop(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    engine: &Mutex<Engine>,
    scope: &Mutex<SampleBuffer>,
    sender: &UnboundedSender<ControlEvent>,
) -> Result<()> {
    let mut selected = Control::InputGain;
    let mut snapshot: Option<Snapshot> = None;
    let mut samples = Vec::new();
    let mut peak = 0.0f32;

    while !sender.is_closed() {
        // Never block the audio callback; redraw stale state instead
        if let Some(fresh) = Snapshot::try_take(engine)? {
            snapshot = Some(fresh);
        }
        if let Some((recent, level)) =
            try_with(scope, "scope buffer", |b| (b.recent(SCOPE_CAPACITY), b.peak()))?
        {
            samples = recent;
            peak = level;
        }

        let Some(current) = snapshot.as_ref() else {
            std::thread::sleep(FRAME_INTERVAL);
            continue;
        };

        terminal.draw(|f| draw_ui(f, selected, current, &samples, peak))?;

        if !event::poll(FRAME_INTERVAL)? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        match handle_key(key, selected, &current.settings, current.max_delay) {
            KeyAction::Select(control) => selected = control,
            KeyAction::Send(event) => {
                if sender.send(event).is_err() {
                    break;
                }
            }
            KeyAction::Quit => {
                let _ = sender.send(ControlEvent::Quit);
                break;
            }
            KeyAction::None => {}
        }
    }

    Ok(())
}

fn draw_ui(f: &mut Frame, selected: Control, snapshot: &Snapshot, samples: &[f32], peak: f32) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(Control::ALL.len() as u16 + 2),
            Constraint::Min(5),
            Constraint::Length(3),
        ])
        .split(f.area());

    let top = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(70), Constraint::Percentage(30)])
        .split(rows[0]);

    draw_controls(f, top[0], selected, snapshot);
    draw_notes(f, top[1], snapshot);

    let scope = Scope::new(samples)
        .style(Style::default().fg(Color::Cyan))
        .block(Block::default().borders(Borders::ALL).title(" Output "));
    f.render_widget(scope, rows[1]);

    draw_help(f, rows[2], snapshot.time, peak);
}

fn draw_controls(f: &mut Frame, area: Rect, selected: Control, snapshot: &Snapshot) {
    let block = Block::default().borders(Borders::ALL).title(" Controls ");
    let inner = block.inner(area);
    f.render_widget(block, area);

    let lines = Layout::default()
        .direction(Direction::Vertical)
        .constraints(Control::ALL.iter().map(|_| Constraint::Length(1)))
        .split(inner);

    for (control, line) in Control::ALL.iter().zip(lines.iter()) {
        let cols = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(14), Constraint::Min(10)])
            .split(*line);

        let style = if *control == selected {
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };
        let marker = if *control == selected { "> " } else { "  " };
        f.render_widget(
            Paragraph::new(Span::styled(format!("{}{}", marker, control.label()), style)),
            cols[0],
        );

        let gauge = Gauge::default()
            .gauge_style(style.fg(Color::Green))
            .ratio(control.ratio(&snapshot.settings, snapshot.max_delay))
            .label(control.display(&snapshot.settings));
        f.render_widget(gauge, cols[1]);
    }
}

fn draw_notes(f: &mut Frame, area: Rect, snapshot: &Snapshot) {
    let items: Vec<ListItem> = snapshot
        .notes
        .iter()
        .map(|(note, stage)| {
            let color = if *stage == EnvelopeStage::Release {
                Color::DarkGray
            } else {
                Color::Green
            };
            ListItem::new(Line::from(vec![
                Span::raw(format!("{:<5}", note_name(*note))),
                Span::styled(format!("{:?}", stage).to_lowercase(), Style::default().fg(color)),
            ]))
        })
        .collect();

    let title = format!(" Notes ({}) ", snapshot.notes.len());
    f.render_widget(
        List::new(items).block(Block::default().borders(Borders::ALL).title(title)),
        area,
    );
}

fn draw_help(f: &mut Frame, area: Rect, time: f64, peak: f32) {
    let level = linear_amplitude_to_dbfs(peak as f64).max(-99.0);
    let level_color = if peak > 1.0 { Color::Red } else { Color::Cyan };
    let text = Line::from(vec![
        Span::styled(format!("  {:>8.1}s", time), Style::default().fg(Color::Cyan)),
        Span::styled(format!("  peak {:>5.1} dBFS", level), Style::default().fg(level_color)),
        Span::raw("  |  ↑↓ select  ←→ adjust (shift: x10)  1-4 waveform  q quit"),
    ]);
    f.render_widget(
        Paragraph::new(text).block(Block::default().borders(Borders::ALL)),
        area,
    );
}

/// Scientific pitch name, middle C (60) is C4
pub fn note_name(note: u8) -> String {
    const NAMES: [&str; 12] = ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];
    let octave = note as i32 / 12 - 1;
    format!("{}{}", NAMES[note as usize % 12], octave)
}
