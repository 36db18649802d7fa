//! Track engine simulator
//!
//! Runs the engine headless against a built-in sound library and prints
//! what every track is doing. Useful for checking transitions, triggers,
//! ducking and save files without a host mixer.

mod cli;
mod library;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use nether_tracks::{
    EngineCommand, EngineConfig, RecordingSink, Scheduler, SoundId, StartOptions, TrackEngine,
    Trigger, VolumeGroup,
};
use tracing::info;

use cli::{Cli, Commands};

struct RunOptions {
    ticks: u64,
    hook: i32,
    voice_at: Option<u64>,
    trigger: Option<Trigger>,
    report_every: u64,
    save: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => EngineConfig::default(),
    };

    match cli.command {
        Commands::Run {
            ticks,
            hook,
            voice_at,
            trigger,
            trigger_delay,
            follow_up,
            report_every,
            save,
            realtime,
        } => {
            let trigger = trigger.map(|marker| Trigger {
                follow_up: follow_up.then_some(library::COMBAT),
                ..Trigger::new(marker, trigger_delay)
            });
            let options = RunOptions {
                ticks,
                hook,
                voice_at,
                trigger,
                report_every: report_every.max(1),
                save,
            };
            if realtime {
                run_realtime(config, options)
            } else {
                run_offline(config, options)
            }
        }
        Commands::Resume {
            file,
            ticks,
            report_every,
        } => resume(config, &file, ticks, report_every.max(1)),
    }
}

fn build_engine(config: EngineConfig) -> (TrackEngine, RecordingSink) {
    let store = library::build(SoundId(config.radio_chatter_sound));
    let sink = RecordingSink::new();
    let engine = TrackEngine::new(config, Arc::new(store), Box::new(sink.clone()));
    (engine, sink)
}

fn start_theme(engine: &mut TrackEngine, options: &RunOptions) -> Result<()> {
    let theme = engine
        .start_sound_with(StartOptions {
            hook: options.hook,
            priority: 10,
            ..StartOptions::new(library::THEME, VolumeGroup::Music)
        })
        .context("failed to start theme")?;
    info!(track = %theme, hook = options.hook, "theme started");
    if let Some(trigger) = options.trigger.clone() {
        engine.arm_trigger(trigger);
    }
    Ok(())
}

fn start_voice(engine: &mut TrackEngine) -> Result<()> {
    let id = SoundId(engine.config().radio_chatter_sound);
    engine.set_radio_chatter(true);
    let voice = engine
        .start_sound(id, VolumeGroup::Voice, 127, 20)
        .context("failed to start voice line")?;
    info!(track = %voice, "voice line started");
    Ok(())
}

fn run_offline(config: EngineConfig, options: RunOptions) -> Result<()> {
    let (mut engine, sink) = build_engine(config);
    start_theme(&mut engine, &options)?;

    for tick in 1..=options.ticks {
        if options.voice_at == Some(tick) {
            start_voice(&mut engine)?;
        }
        engine.tick();
        if tick % options.report_every == 0 {
            report(&engine);
        }
    }

    summarize(&engine, &sink);
    if let Some(path) = &options.save {
        save(&engine, path)?;
    }
    Ok(())
}

fn run_realtime(config: EngineConfig, options: RunOptions) -> Result<()> {
    let period = Duration::from_secs(1) / config.callback_fps.max(1);
    let (mut engine, sink) = build_engine(config);
    start_theme(&mut engine, &options)?;
    let handle = Scheduler::spawn(engine);

    let mut last_report = 0;
    let mut voice_started = false;
    loop {
        thread::sleep(period);
        let now = handle.music_timer();
        if !voice_started && options.voice_at.is_some_and(|at| now >= at) {
            start_voice(&mut handle.engine())?;
            voice_started = true;
        }
        if now / options.report_every > last_report {
            last_report = now / options.report_every;
            report(&handle.engine());
        }
        if now >= options.ticks {
            break;
        }
    }

    handle.send(EngineCommand::SetPaused(true));
    thread::sleep(period * 2);
    let engine = handle.engine();
    summarize(&engine, &sink);
    if let Some(path) = &options.save {
        save(&engine, path)?;
    }
    Ok(())
}

fn resume(config: EngineConfig, file: &Path, ticks: u64, report_every: u64) -> Result<()> {
    let (mut engine, sink) = build_engine(config);
    let restored = engine
        .restore_from_file(file)
        .with_context(|| format!("failed to restore {}", file.display()))?;
    info!(restored, music_timer = engine.music_timer(), "state restored");
    report(&engine);

    for tick in 1..=ticks {
        engine.tick();
        if tick % report_every == 0 {
            report(&engine);
        }
    }
    summarize(&engine, &sink);
    Ok(())
}

fn save(engine: &TrackEngine, path: &Path) -> Result<()> {
    engine
        .save_to_file(path)
        .with_context(|| format!("failed to save {}", path.display()))?;
    info!(path = %path.display(), "state saved");
    Ok(())
}

fn report(engine: &TrackEngine) {
    println!(
        "tick {:>6}  tracks {}  speech {}",
        engine.music_timer(),
        engine.active_count(),
        engine.is_speech_active()
    );
    println!("  slot  kind     sound   region  offset   vol  duck  fade");
    for (_, track) in engine.tracks() {
        let fade = if track.fade.active {
            format!("->{} ({}t)", track.fade.target / 1000, track.fade.ticks_remaining)
        } else {
            "-".to_string()
        };
        println!(
            "  {:>4}  {:<7}  {:<6}  {:>6}  {:>6}  {:>4}  {:>4}  {}",
            track.slot,
            track.kind,
            track.sound_id,
            track.current_region,
            track.region_offset,
            track.public_volume(),
            track.gain_reduction / 1000,
            fade
        );
    }
}

fn summarize(engine: &TrackEngine, sink: &RecordingSink) {
    let queues = sink.queues();
    let total: usize = queues.iter().map(|&q| sink.bytes_queued(q)).sum();
    println!(
        "done: {} ticks, {} queue(s) opened, {} still open, {} bytes fed",
        engine.music_timer(),
        queues.len(),
        sink.open_queues().len(),
        total
    );
}
