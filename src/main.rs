//! midiecho - Polyphonic MIDI synth with a feedback delay

use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::Parser;
use log::warn;
use midiecho::config::{self, EchoConfig};
use midiecho::engine::midi::{list_input_ports, MidiListener};
use midiecho::engine::session::{self, run_session, SessionEnd, DEFAULT_TICK};
use midiecho::engine::{default_device_name, list_output_devices, ControlEvent, Engine, Player, Recorder};
use midiecho::synth::{linear_amplitude_to_dbfs, Waveform};
use midiecho::ui::{self, SampleBuffer, SCOPE_CAPACITY};

mod cli;

use cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // The control surface owns the screen, so only warnings get through
    let default_level = match cli.command {
        Commands::Play { no_ui: false, .. } => "warn",
        _ => "info",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    match cli.command {
        Commands::Play {
            config: config_path,
            port,
            waveform,
            no_ui,
        } => {
            let mut cfg = config::load_or_default(&config_path)?;
            if port.is_some() {
                cfg.midi.port = port;
            }
            if let Some(waveform) = waveform {
                cfg.voice.waveform = waveform;
            }
            play(&cfg, !no_ui)?;
        }

        Commands::Render {
            config: config_path,
            output,
            notes,
            hold,
            tail,
            velocity,
            channels,
        } => {
            let cfg = config::load_or_default(&config_path)?;
            let sequence = cli::NoteSequence { notes, hold, tail, velocity };
            render(&cfg, &output, &sequence, channels)?;
        }

        Commands::Devices => {
            println!("MIDI inputs:");
            match list_input_ports() {
                Ok(ports) if ports.is_empty() => println!("  (none)"),
                Ok(ports) => {
                    for (i, name) in ports.iter().enumerate() {
                        println!("  {}: {}", i, name);
                    }
                }
                Err(e) => println!("  Error listing ports: {}", e),
            }

            println!("\nAudio outputs:");
            let default = default_device_name();
            for (name, config) in list_output_devices() {
                let marker = if default.as_deref() == Some(name.as_str()) { " [default]" } else { "" };
                println!(
                    "  - {} ({} Hz, {} ch){}",
                    name, config.sample_rate.0, config.channels, marker
                );
            }
        }

        Commands::Check { config: config_path } => {
            println!("Checking configuration at {:?}...", config_path);

            match config::load_config(&config_path) {
                Ok(cfg) => {
                    println!("Configuration is valid!");
                    print_summary(&cfg);
                }
                Err(e) => {
                    println!("Configuration is invalid: {:#}", e);
                    std::process::exit(1);
                }
            }
        }

        Commands::Init => {
            let path = "midiecho.yaml";
            if Path::new(path).exists() {
                println!("midiecho.yaml already exists. Not overwriting.");
            } else {
                std::fs::write(path, config::EXAMPLE_CONFIG)?;
                println!("Created midiecho.yaml with example configuration.");
            }
        }
    }

    Ok(())
}

fn play(cfg: &EchoConfig, with_ui: bool) -> Result<()> {
    let mut player = Player::new(cfg.audio.device.as_deref(), Some(cfg.audio.buffer_size as u32))?;
    let engine = Arc::new(Mutex::new(Engine::new(cfg, player.sample_rate() as f64)));

    let (sender, receiver) = session::channel();
    let midi = MidiListener::connect(cfg.midi.port.as_deref(), cfg.midi.channel, sender.clone())
        .context("no MIDI input (run `midiecho devices` to list ports)")?;

    let rt = tokio::runtime::Runtime::new()?;
    let session = rt.spawn(run_session(engine.clone(), receiver, DEFAULT_TICK));

    let ui_result = if with_ui {
        let scope = Arc::new(Mutex::new(SampleBuffer::new(SCOPE_CAPACITY)));
        player.start_with_scope(engine.clone(), Some(scope.clone()))?;
        let result = ui::run_ui(engine, scope, sender.clone());
        let _ = sender.send(ControlEvent::Quit);
        result
    } else {
        player.start(engine)?;
        println!("Listening on {}. Press Ctrl-C to stop.", midi.port_name());
        Ok(())
    };
    drop(sender);

    let end = rt.block_on(session).context("session task failed")??;
    player.stop();
    drop(midi);

    if end == SessionEnd::Interrupted {
        println!("\nInterrupted.");
    }

    ui_result
}

fn render(cfg: &EchoConfig, output: &Path, sequence: &cli::NoteSequence, channels: u16) -> Result<()> {
    let sample_rate = cfg.audio.sample_rate;
    let seconds = sequence.length();

    println!(
        "Rendering {} note(s), {:.1}s to {:?} ({} waveform, {} ch)...",
        sequence.notes.len(),
        seconds,
        output,
        cfg.voice.waveform,
        channels
    );

    let mut engine = Engine::new(cfg, sample_rate as f64);
    let mut recorder = Recorder::new(output, sample_rate, channels)?;
    engine.render_schedule(&sequence.schedule(), seconds, |s| recorder.write_frame(s))?;
    let stats = recorder.finish()?;

    if stats.clipped_frames > 0 {
        warn!(
            "{} frame(s) clipped; lower the volume or feedback",
            stats.clipped_frames
        );
    }
    println!(
        "Recorded {:.1}s to {:?} (peak {:.1} dBFS)",
        stats.seconds,
        output,
        linear_amplitude_to_dbfs(stats.peak as f64)
    );

    Ok(())
}

fn print_summary(cfg: &EchoConfig) {
    let wave_names: Vec<&str> = Waveform::ALL.iter().map(|w| w.name()).collect();

    println!("  Sample rate: {} Hz", cfg.audio.sample_rate);
    println!("  Buffer size: {}", cfg.audio.buffer_size);
    println!("  Output device: {}", cfg.audio.device.as_deref().unwrap_or("(default)"));
    println!("  MIDI port: {}", cfg.midi.port.as_deref().unwrap_or("(first available)"));
    match cfg.midi.channel {
        Some(ch) => println!("  MIDI channel: {}", ch),
        None => println!("  MIDI channel: all"),
    }
    println!(
        "  Envelope: A {}s  D {}s  S {}  R {}s (freed {}s after release)",
        cfg.envelope.attack,
        cfg.envelope.decay,
        cfg.envelope.sustain,
        cfg.envelope.release,
        cfg.envelope.cleanup_margin
    );
    println!("  Waveform: {} (one of {})", cfg.voice.waveform, wave_names.join(", "));
    println!("  Retrigger: {:?}", cfg.voice.retrigger);
    println!("  Input gain: {} dBFS", cfg.chain.input_gain_db);
    println!("  Delay: {} sec (max {} sec)", cfg.chain.delay_time, cfg.chain.max_delay);
    println!("  Feedback: {:.0}%", cfg.chain.feedback * 100.0);
    println!("  Volume: {} dBFS", cfg.chain.volume_db);
}
