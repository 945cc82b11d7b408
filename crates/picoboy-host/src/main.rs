mod audio;
mod config;
mod console;
mod error;
mod pattern;
mod snapshot;

use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;
use log::{error, info, warn};
use picoboy_core::audio::{
    AUDIO_SAMPLES, AudioConfig, AudioFeed, AudioSink, MAX_ATTENUATION, NullSink, QueueSink,
    VERTICAL_SYNC,
};
use picoboy_core::audio_queue::audio_queue;
use picoboy_core::display::MemoryPanel;
use picoboy_core::PipelineError;
use picoboy_core::engine::{Cartridge, Emulator, LogFaults};
use picoboy_core::frame::{FrameDriver, FrameEvent};
use picoboy_core::input::{InputSource, NoInput};
use picoboy_core::line_cache::DetectorStats;
use picoboy_core::palette::PalettePreset;
use picoboy_core::pipeline::{self, PipelineConfig, RenderCore};
use picoboy_core::render::{RenderStats, TransferMode};

use crate::config::{HostConfig, TransferModeConfig};
use crate::error::HostError;
use crate::pattern::PatternEngine;

/// Audio ring depth in emulated frames.
const AUDIO_QUEUE_FRAMES: usize = 4;

#[derive(Parser)]
#[command(version, about = "Dual-core display pipeline for a handheld Game Boy")]
struct Args {
    /// Path to ROM file
    rom: PathBuf,

    /// Config file to read instead of the per-user one
    #[arg(long)]
    config: Option<PathBuf>,

    /// Stream lines through the transfer unit
    #[arg(long = "async", conflicts_with = "sync_transfer")]
    async_transfer: bool,

    /// Stream lines from the render core itself
    #[arg(long = "sync", conflicts_with = "async_transfer")]
    sync_transfer: bool,

    /// Stop after this many frames
    #[arg(long)]
    frames: Option<u64>,

    /// Run without audio output
    #[arg(long)]
    headless: bool,

    /// Write the screen to this PNG on exit
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Run as fast as possible instead of at 59.73 fps
    #[arg(long)]
    no_limit: bool,

    /// Write the effective configuration back to the config file
    #[arg(long)]
    save_config: bool,
}

impl Args {
    fn apply(&self, cfg: &mut HostConfig) {
        if self.async_transfer {
            cfg.transfer_mode = TransferModeConfig::Asynchronous;
        } else if self.sync_transfer {
            cfg.transfer_mode = TransferModeConfig::Synchronous;
        }
        if self.headless {
            cfg.audio = false;
        }
        if self.no_limit {
            cfg.limit_speed = false;
        }
        if let Some(path) = &self.snapshot {
            cfg.snapshot = Some(path.clone());
        }
    }
}

fn audio_sink(enabled: bool) -> (Box<dyn AudioSink>, Option<cpal::Stream>) {
    if !enabled {
        return (Box::new(NullSink), None);
    }
    let (producer, consumer) = audio_queue(AUDIO_SAMPLES * AUDIO_QUEUE_FRAMES);
    match audio::start_stream(consumer) {
        Ok(stream) => (Box::new(QueueSink::new(producer)), Some(stream)),
        Err(e) => {
            warn!("{e}; continuing without audio");
            (Box::new(NullSink), None)
        }
    }
}

struct RunSummary {
    frames: u64,
    detected: DetectorStats,
    rendered: RenderStats,
}

/// Run frames until the operator quits or `frame_limit` is reached, then stop
/// the render core. If the render core died, its panic is reported rather than
/// the closed channel it left behind.
fn drive<E: Emulator>(
    mut driver: FrameDriver<E>,
    render_core: RenderCore,
    frame_limit: Option<u64>,
    limit_speed: bool,
) -> Result<(E, RunSummary), PipelineError> {
    let frame_time = Duration::from_secs_f64(1.0 / VERTICAL_SYNC);
    let mut deadline = Instant::now();
    let outcome = loop {
        match driver.run_frame() {
            Ok(FrameEvent::Quit) => {
                info!("Quit requested");
                break Ok(());
            }
            Ok(_) => {}
            Err(e) => break Err(e),
        }
        if frame_limit.is_some_and(|n| driver.total_frames() >= n) {
            break Ok(());
        }
        if limit_speed {
            deadline += frame_time;
            let now = Instant::now();
            if deadline > now {
                thread::sleep(deadline - now);
            } else {
                // Running behind; don't try to catch up.
                deadline = now;
            }
        }
    };

    let frames = driver.total_frames();
    let detected = driver.detector_stats();
    let engine = driver.into_engine();
    let rendered = render_core.join()?;
    outcome?;
    Ok((
        engine,
        RunSummary {
            frames,
            detected,
            rendered,
        },
    ))
}

fn run(args: Args) -> Result<(), HostError> {
    let config_path = args.config.clone().unwrap_or_else(config::default_config_path);
    let mut cfg = config::load_from_file(&config_path);
    args.apply(&mut cfg);
    if args.save_config {
        config::save_to_file(&config_path, &cfg).map_err(|source| HostError::ConfigWrite {
            path: config_path.clone(),
            source,
        })?;
        info!("Saved config to {}", config_path.display());
    }

    let cart = Cartridge::from_file(&args.rom).map_err(|source| HostError::RomRead {
        path: args.rom.clone(),
        source,
    })?;
    info!("Loaded \"{}\" ({} bytes)", cart.title(), cart.rom_len());
    let engine = PatternEngine::new(cart, Box::new(LogFaults::default()));

    let panel = MemoryPanel::new();
    let screen = panel.handle();
    let mut pipeline_cfg = PipelineConfig {
        palette: cfg.palette.palette(),
        transfer_mode: TransferMode::from(cfg.transfer_mode),
        channel_depth: cfg.channel_depth,
    };
    let mut input: Box<dyn InputSource> = Box::new(NoInput);
    if let Some(preset) = PalettePreset::from_boot_buttons(input.sample()) {
        info!("Palette {preset:?} picked by buttons held at start-up");
        pipeline_cfg.palette = preset.palette();
    }
    let (detector, render_core) = pipeline::start(panel, &pipeline_cfg)?;
    info!(
        "Pipeline started ({:?} transfers, queue depth {})",
        pipeline_cfg.transfer_mode, pipeline_cfg.channel_depth
    );

    let feed = AudioFeed::new(AudioConfig {
        attenuation: cfg.volume.min(MAX_ATTENUATION),
        ..AudioConfig::default()
    })?;
    let (sink, _stream) = audio_sink(cfg.audio);
    let keys = console::spawn_stdin_reader().map_err(HostError::Console)?;

    let driver =
        FrameDriver::new(engine, detector, feed, sink, input).with_console(Box::new(keys));
    let (engine, summary) = drive(driver, render_core, args.frames, cfg.limit_speed)?;
    info!(
        "Stopped after {} frames: {} lines queued, {} unchanged, {} commands executed",
        summary.frames,
        summary.detected.enqueued,
        summary.detected.skipped,
        summary.rendered.commands
    );
    info!("Cartridge frame counter at {}", engine.frame());

    if let Some(path) = &cfg.snapshot {
        snapshot::write_png(&screen.snapshot(), path)?;
        info!("Wrote snapshot to {}", path.display());
    }
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if let Err(e) = run(args) {
        error!("{e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use picoboy_core::LCD_HEIGHT;
    use picoboy_core::display::{ColorMode, Panel};
    use picoboy_core::line_cache::ChangeDetector;

    /// Panel whose data bus fails on the first line written.
    struct DeadBus;

    impl Panel for DeadBus {
        fn panel_init(&mut self) {}
        fn set_window(&mut self, _y0: u16, _y1: u16, _x0: u16, _x1: u16) {}
        fn set_draw_row(&mut self, _y: u16) {}
        fn begin_transfer(&mut self) {}
        fn end_transfer(&mut self) {}
        fn write_samples(&mut self, _samples: &[u16]) {
            panic!("bus error");
        }
        fn write_repeated(&mut self, _sample: u16, _count: usize) {}
        fn write_pixel(&mut self, _y: u16, _x: u16, _sample: u16) {}
        fn set_display_mode(&mut self, _invert: bool, _mode: ColorMode) {}
    }

    fn driver(detector: ChangeDetector) -> FrameDriver<PatternEngine<Cartridge>> {
        let engine = PatternEngine::new(
            Cartridge::from_bytes(vec![0; 0x150]),
            Box::new(LogFaults::default()),
        );
        let feed = AudioFeed::new(AudioConfig::default()).unwrap();
        FrameDriver::new(engine, detector, feed, Box::new(NullSink), Box::new(NoInput))
    }

    #[test]
    fn frame_limit_stops_and_joins() {
        let (detector, core) = pipeline::start(MemoryPanel::new(), &PipelineConfig::default())
            .unwrap();
        let (engine, summary) = drive(driver(detector), core, Some(3), false).unwrap();
        assert_eq!(summary.frames, 3);
        assert_eq!(engine.frame(), 3);
        assert!(summary.detected.enqueued >= LCD_HEIGHT as u64);
        assert_eq!(summary.rendered.lines_drawn, summary.detected.enqueued);
    }

    #[test]
    fn dead_render_core_is_reported_as_panic() {
        let (detector, core) = pipeline::start(DeadBus, &PipelineConfig::default()).unwrap();
        assert!(matches!(
            drive(driver(detector), core, Some(10), false),
            Err(PipelineError::RenderCorePanicked)
        ));
    }
}
