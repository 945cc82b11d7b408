#![allow(dead_code)]

use std::collections::VecDeque;

use picoboy_core::engine::Emulator;
use picoboy_core::input::{InputSource, Joypad};
use picoboy_core::{LCD_HEIGHT, LCD_WIDTH, Scanline};

/// Engine stand-in that presents a fixed screen, a few lines per step.
pub struct ScriptedEngine {
    pub screen: Vec<Scanline>,
    pub lines_per_step: usize,
    pub audio_level: i16,
    pub joypad: Joypad,
    pub interlace: bool,
    pub frame_skip: bool,
    pub frames_run: u64,
    next_line: usize,
    complete: bool,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self {
            screen: vec![[0; LCD_WIDTH]; LCD_HEIGHT],
            lines_per_step: 7,
            audio_level: 0,
            joypad: Joypad::RELEASED,
            interlace: false,
            frame_skip: false,
            frames_run: 0,
            next_line: 0,
            complete: false,
        }
    }

    /// Every line gets its own background shade, cycling through all four.
    pub fn striped() -> Self {
        let mut engine = Self::new();
        for (y, line) in engine.screen.iter_mut().enumerate() {
            line.fill(0x20 | (y as u8 & 3));
        }
        engine
    }
}

impl Emulator for ScriptedEngine {
    fn step(&mut self, on_line: &mut dyn FnMut(usize, &Scanline)) {
        for _ in 0..self.lines_per_step {
            on_line(self.next_line, &self.screen[self.next_line]);
            self.next_line += 1;
            if self.next_line == LCD_HEIGHT {
                self.next_line = 0;
                self.complete = true;
                self.frames_run += 1;
                return;
            }
        }
    }

    fn frame_complete(&self) -> bool {
        self.complete
    }

    fn clear_frame_complete(&mut self) {
        self.complete = false;
    }

    fn synthesize_audio(&mut self, buffer: &mut [i16]) {
        buffer.fill(self.audio_level);
    }

    fn set_joypad(&mut self, joypad: Joypad) {
        self.joypad = joypad;
    }

    fn interlace(&self) -> bool {
        self.interlace
    }

    fn set_interlace(&mut self, enabled: bool) {
        self.interlace = enabled;
    }

    fn frame_skip(&self) -> bool {
        self.frame_skip
    }

    fn set_frame_skip(&mut self, enabled: bool) {
        self.frame_skip = enabled;
    }
}

/// Replays a fixed sequence of samples, then reports nothing held.
pub struct ScriptedInput(pub VecDeque<Joypad>);

impl ScriptedInput {
    pub fn new(samples: impl IntoIterator<Item = Joypad>) -> Self {
        Self(samples.into_iter().collect())
    }
}

impl InputSource for ScriptedInput {
    fn sample(&mut self) -> Joypad {
        self.0.pop_front().unwrap_or(Joypad::RELEASED)
    }
}
