mod common;

use std::thread;

use common::ScriptedEngine;
use crossbeam_channel as cb;
use picoboy_core::audio::{AudioConfig, AudioFeed, NullSink};
use picoboy_core::channel::command_channel;
use picoboy_core::command::CoreCommand;
use picoboy_core::display::{ColorMode, MemoryPanel, PanelHandle};
use picoboy_core::frame::{FrameDriver, FrameEvent};
use picoboy_core::input::NoInput;
use picoboy_core::palette::Palette;
use picoboy_core::pipeline::{self, PipelineConfig, RenderCore};
use picoboy_core::render::{RenderStats, TransferMode};
use picoboy_core::{LCD_HEIGHT, LCD_WIDTH};

const MODES: [TransferMode; 2] = [TransferMode::Synchronous, TransferMode::Asynchronous];

struct Running {
    driver: FrameDriver<ScriptedEngine>,
    core: RenderCore,
    panel: PanelHandle,
}

fn launch(engine: ScriptedEngine, transfer_mode: TransferMode, channel_depth: usize) -> Running {
    let panel = MemoryPanel::new();
    let handle = panel.handle();
    let config = PipelineConfig {
        transfer_mode,
        channel_depth,
        ..PipelineConfig::default()
    };
    let (detector, core) = pipeline::start(panel, &config).unwrap();
    let audio = AudioFeed::new(AudioConfig::default()).unwrap();
    let driver = FrameDriver::new(
        engine,
        detector,
        audio,
        Box::new(NullSink),
        Box::new(NoInput),
    );
    Running {
        driver,
        core,
        panel: handle,
    }
}

fn finish(run: Running) -> (ScriptedEngine, RenderStats, PanelHandle) {
    let engine = run.driver.into_engine();
    let stats = run.core.join().unwrap();
    (engine, stats, run.panel)
}

#[test]
fn first_frame_draws_every_line() {
    let palette = Palette::default();
    for mode in MODES {
        let mut run = launch(ScriptedEngine::striped(), mode, 2);
        assert_eq!(run.driver.run_frame().unwrap(), FrameEvent::Continue);
        assert_eq!(run.driver.detector_stats().enqueued, LCD_HEIGHT as u64);

        let (_, stats, panel) = finish(run);
        assert_eq!(stats.lines_drawn, LCD_HEIGHT as u64);

        let s = panel.lock();
        for y in 0..LCD_HEIGHT {
            let expected = palette.lookup(0x20 | (y as u8 & 3));
            assert_eq!(s.lcd_sample(y, 0), expected, "line {y} ({mode:?})");
            assert_eq!(s.lcd_sample(y, LCD_WIDTH - 1), expected, "line {y} ({mode:?})");
        }
    }
}

#[test]
fn repeated_frame_sends_no_commands() {
    let mut run = launch(ScriptedEngine::striped(), TransferMode::Synchronous, 2);
    run.driver.run_frame().unwrap();
    run.driver.run_frame().unwrap();

    let det = run.driver.detector_stats();
    assert_eq!(det.enqueued, LCD_HEIGHT as u64);
    assert_eq!(det.skipped, LCD_HEIGHT as u64);

    let (engine, stats, _) = finish(run);
    assert_eq!(engine.frames_run, 2);
    assert_eq!(stats.commands, LCD_HEIGHT as u64);
}

#[test]
fn single_changed_line_is_the_only_redraw() {
    let palette = Palette::default();
    for mode in MODES {
        let mut run = launch(ScriptedEngine::striped(), mode, 2);
        run.driver.run_frame().unwrap();

        run.driver.engine_mut().screen[77][5] = 0x13;
        run.driver.run_frame().unwrap();
        assert_eq!(run.driver.detector_stats().enqueued, LCD_HEIGHT as u64 + 1);

        let (_, stats, panel) = finish(run);
        assert_eq!(stats.lines_drawn, LCD_HEIGHT as u64 + 1);
        let s = panel.lock();
        assert_eq!(s.lcd_sample(77, 5), palette.lookup(0x13));
        assert_eq!(s.lcd_sample(77, 4), palette.lookup(0x21));
    }
}

#[test]
fn line_transfers_never_overlap() {
    for mode in MODES {
        for depth in [1, 8] {
            let mut run = launch(ScriptedEngine::new(), mode, depth);
            for frame in 0..6u8 {
                let engine = run.driver.engine_mut();
                for (y, line) in engine.screen.iter_mut().enumerate() {
                    line.fill((frame + y as u8) & 0x33);
                }
                run.driver.run_frame().unwrap();
            }

            let (_, stats, panel) = finish(run);
            let s = panel.lock();
            assert_eq!(s.stats().overlapping_transfers, 0, "{mode:?} depth {depth}");
            assert_eq!(s.stats().stray_writes, 0, "{mode:?} depth {depth}");
            // One clear burst, then one transfer per drawn line.
            assert_eq!(s.stats().transfers, 1 + stats.lines_drawn);
            assert!(!s.in_transfer());
        }
    }
}

#[test]
fn commands_arrive_in_push_order() {
    let (tx, rx) = command_channel(2);
    let script: Vec<CoreCommand> = (0..600u32)
        .map(|i| match i % 4 {
            0 => CoreCommand::DrawLine((i % LCD_HEIGHT as u32) as u8),
            1 => CoreCommand::SetDisplayMode {
                invert: i % 8 == 1,
                mode: ColorMode::from_u8((i / 4 % 2) as u8),
            },
            2 => CoreCommand::SetPixel {
                x: i as u8,
                y: (i / 2) as u8,
                value: (i / 3) as u8,
            },
            _ => CoreCommand::Nop,
        })
        .collect();

    let expected = script.clone();
    let producer = thread::spawn(move || {
        for cmd in script {
            tx.push(cmd).unwrap();
        }
    });

    let mut received = Vec::with_capacity(expected.len());
    while let Ok(cmd) = rx.pop() {
        received.push(cmd);
    }
    producer.join().unwrap();
    assert_eq!(received, expected);
}

#[test]
fn colour_mode_toggle_follows_queued_lines() {
    let (keys, console) = cb::unbounded();
    let mut run = launch(ScriptedEngine::striped(), TransferMode::Asynchronous, 2);
    run.driver = run.driver.with_console(Box::new(console));

    keys.send(b'c').unwrap();
    run.driver.run_frame().unwrap();
    assert_eq!(run.driver.color_mode(), ColorMode::Reduced);

    let (_, stats, panel) = finish(run);
    assert_eq!(stats.lines_drawn, LCD_HEIGHT as u64);
    assert_eq!(stats.mode_changes, 1);
    assert_eq!(stats.commands, LCD_HEIGHT as u64 + 1);
    assert_eq!(panel.lock().display_mode(), (false, ColorMode::Reduced));
}

#[test]
fn shutdown_powers_panel_down() {
    let mut run = launch(ScriptedEngine::new(), TransferMode::Synchronous, 2);
    run.driver.run_frame().unwrap();
    let (_, _, panel) = finish(run);
    let s = panel.lock();
    assert!(!s.powered());
    assert!(!s.in_transfer());
}
