use std::time::{Duration, Instant};

use crossbeam_channel as cb;
use log::{debug, info, warn};

use crate::PipelineError;
use crate::audio::{AudioFeed, AudioSink};
use crate::command::CoreCommand;
use crate::console::ConsoleCommand;
use crate::display::ColorMode;
use crate::engine::Emulator;
use crate::input::{Hotkey, InputSource, InputTracker, hotkeys};
use crate::line_cache::{ChangeDetector, DetectorStats};

/// Non-blocking source of operator keypresses.
pub trait Console {
    fn poll(&mut self) -> Option<u8>;
}

impl Console for cb::Receiver<u8> {
    fn poll(&mut self) -> Option<u8> {
        self.try_recv().ok()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameReport {
    pub frames: u64,
    pub elapsed: Duration,
    pub fps: u64,
}

/// Frames completed since the last report.
pub struct FrameStats {
    frames: u64,
    since: Instant,
}

impl FrameStats {
    pub fn new() -> Self {
        Self {
            frames: 0,
            since: Instant::now(),
        }
    }

    pub fn tick(&mut self) {
        self.frames += 1;
    }

    /// Summarise and start a new measurement window.
    pub fn report(&mut self) -> FrameReport {
        let now = Instant::now();
        let elapsed = now.duration_since(self.since);
        let micros = elapsed.as_micros().max(1);
        let fps = (self.frames as u128 * 1_000_000 / micros) as u64;
        let report = FrameReport {
            frames: self.frames,
            elapsed,
            fps,
        };
        self.frames = 0;
        self.since = now;
        report
    }
}

impl Default for FrameStats {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameEvent {
    Continue,
    /// The operator asked for a benchmark report.
    Report(FrameReport),
    /// The operator asked to stop.
    Quit,
}

/// Core A. Runs the engine one frame at a time, feeding scanlines to the
/// change detector, then services audio, input and the console.
pub struct FrameDriver<E: Emulator> {
    engine: E,
    detector: ChangeDetector,
    audio: AudioFeed,
    sink: Box<dyn AudioSink>,
    input: Box<dyn InputSource>,
    console: Option<Box<dyn Console>>,
    tracker: InputTracker,
    color_mode: ColorMode,
    stats: FrameStats,
    total_frames: u64,
}

impl<E: Emulator> FrameDriver<E> {
    pub fn new(
        engine: E,
        detector: ChangeDetector,
        audio: AudioFeed,
        sink: Box<dyn AudioSink>,
        mut input: Box<dyn InputSource>,
    ) -> Self {
        let initial = input.sample();
        Self {
            engine,
            detector,
            audio,
            sink,
            input,
            console: None,
            tracker: InputTracker::new(initial),
            color_mode: ColorMode::Full,
            stats: FrameStats::new(),
            total_frames: 0,
        }
    }

    pub fn with_console(mut self, console: Box<dyn Console>) -> Self {
        self.console = Some(console);
        self
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn audio(&self) -> &AudioFeed {
        &self.audio
    }

    pub fn color_mode(&self) -> ColorMode {
        self.color_mode
    }

    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }

    pub fn detector_stats(&self) -> DetectorStats {
        self.detector.stats()
    }

    /// Redraw every line on its next presentation.
    pub fn invalidate_display(&mut self) {
        self.detector.invalidate();
    }

    /// Emulate one frame and service everything that happens once per frame.
    ///
    /// Fails only if the render core has gone away.
    pub fn run_frame(&mut self) -> Result<FrameEvent, PipelineError> {
        self.emulate_frame()?;
        self.stats.tick();
        self.total_frames += 1;

        let engine = &mut self.engine;
        self.audio
            .service(|buf| engine.synthesize_audio(buf), self.sink.as_mut());

        let now = self.input.sample();
        let edges = self.tracker.update(now);
        for hotkey in hotkeys(now, edges) {
            self.apply_hotkey(hotkey)?;
        }

        let mut joypad = now;
        let mut event = FrameEvent::Continue;
        if let Some(key) = self.console.as_mut().and_then(|c| c.poll()) {
            match ConsoleCommand::from_key(key) {
                Some(ConsoleCommand::Press(mask)) => joypad = joypad.with_pressed(mask),
                Some(cmd) => event = self.apply_console(cmd)?,
                None => {}
            }
        }
        self.engine.set_joypad(joypad);

        Ok(event)
    }

    fn emulate_frame(&mut self) -> Result<(), PipelineError> {
        self.engine.clear_frame_complete();

        let detector = &mut self.detector;
        let mut failure = None;
        while !self.engine.frame_complete() {
            self.engine.step(&mut |line, pixels| {
                if failure.is_some() {
                    return;
                }
                match detector.detect_and_enqueue(line, pixels) {
                    Ok(_) => {}
                    Err(PipelineError::LineOutOfRange(line)) => {
                        warn!("engine produced out-of-range scanline {line}");
                    }
                    Err(e) => failure = Some(e),
                }
            });
            if let Some(e) = failure.take() {
                return Err(e);
            }
        }
        Ok(())
    }

    fn toggle_color_mode(&mut self) -> Result<(), PipelineError> {
        self.color_mode = self.color_mode.toggled();
        debug!("colour mode -> {:?}", self.color_mode);
        self.detector.send(CoreCommand::SetDisplayMode {
            invert: false,
            mode: self.color_mode,
        })
    }

    fn toggle_interlace(&mut self) {
        let enabled = !self.engine.interlace();
        self.engine.set_interlace(enabled);
        debug!("interlace -> {enabled}");
    }

    fn toggle_frame_skip(&mut self) {
        let enabled = !self.engine.frame_skip();
        self.engine.set_frame_skip(enabled);
        debug!("frame skip -> {enabled}");
    }

    fn apply_hotkey(&mut self, hotkey: Hotkey) -> Result<(), PipelineError> {
        debug!("hotkey {hotkey:?}");
        match hotkey {
            Hotkey::VolumeUp => self.audio.config_mut().increase_volume(),
            Hotkey::VolumeDown => self.audio.config_mut().decrease_volume(),
            Hotkey::ToggleColorMode => self.toggle_color_mode()?,
            Hotkey::ToggleInterlace => self.toggle_interlace(),
            Hotkey::ToggleFrameSkip => self.toggle_frame_skip(),
        }
        Ok(())
    }

    fn apply_console(&mut self, cmd: ConsoleCommand) -> Result<FrameEvent, PipelineError> {
        debug!("console {cmd:?}");
        let event = match cmd {
            ConsoleCommand::ToggleColorMode => {
                self.toggle_color_mode()?;
                FrameEvent::Continue
            }
            ConsoleCommand::ToggleInterlace => {
                self.toggle_interlace();
                FrameEvent::Continue
            }
            ConsoleCommand::ToggleFrameSkip => {
                self.toggle_frame_skip();
                FrameEvent::Continue
            }
            ConsoleCommand::Benchmark => {
                let report = self.stats.report();
                info!(
                    "Frames: {} Time: {} us FPS: {}",
                    report.frames,
                    report.elapsed.as_micros(),
                    report.fps
                );
                FrameEvent::Report(report)
            }
            ConsoleCommand::Quit => FrameEvent::Quit,
            ConsoleCommand::Press(_) => FrameEvent::Continue,
        };
        Ok(event)
    }

    /// Close the command channel and give the engine back. The render core
    /// drains what is queued and stops.
    pub fn into_engine(self) -> E {
        self.engine
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_resets_counter() {
        let mut stats = FrameStats::new();
        for _ in 0..3 {
            stats.tick();
        }
        std::thread::sleep(Duration::from_millis(5));
        let report = stats.report();
        assert_eq!(report.frames, 3);
        assert!(report.elapsed >= Duration::from_millis(5));
        assert!(report.fps <= 600);
        assert_eq!(stats.report().frames, 0);
    }

    #[test]
    fn channel_console_is_non_blocking() {
        let (tx, rx) = cb::unbounded::<u8>();
        let mut console: Box<dyn Console> = Box::new(rx);
        assert_eq!(console.poll(), None);
        tx.send(b'q').unwrap();
        assert_eq!(console.poll(), Some(b'q'));
        assert_eq!(console.poll(), None);
    }
}
