use picoboy_core::audio::AUDIO_SAMPLE_RATE;
use picoboy_core::engine::{CartridgeMemory, Emulator, EngineFault, FaultSink};
use picoboy_core::input::{JOYPAD_A, JOYPAD_B, JOYPAD_LEFT, JOYPAD_RIGHT, Joypad};
use picoboy_core::{LCD_HEIGHT, LCD_WIDTH, Scanline};

/// Lines per frame including vertical blank.
const TOTAL_LINES: usize = 154;
const BAR_WIDTH: usize = 20;
const HEADER_CHECKSUM: usize = 0x14D;
/// Cartridge RAM byte used to persist the frame counter.
const FRAME_COUNTER_ADDR: usize = 0;
const TONE_AMPLITUDE: i16 = 0x0800;

/// Bring-up engine: scrolling bars across all four palette banks and a
/// square-wave tone. Lets the pipeline run without a real emulator.
pub struct PatternEngine<C: CartridgeMemory> {
    cart: C,
    faults: Box<dyn FaultSink>,
    line: usize,
    frame: u64,
    scroll: usize,
    complete: bool,
    joypad: Joypad,
    interlace: bool,
    frame_skip: bool,
    tone_period: u32,
    tone_phase: u32,
    buf: Scanline,
}

impl<C: CartridgeMemory> PatternEngine<C> {
    pub fn new(cart: C, mut faults: Box<dyn FaultSink>) -> Self {
        let checksum = cart.rom_read(HEADER_CHECKSUM);
        if checksum == 0xFF {
            // Open bus: the image is too short to carry a header.
            faults.report(EngineFault::InvalidRead(HEADER_CHECKSUM as u16));
        }
        let tone_hz = 220 + checksum as u32;
        let frame = cart.cart_ram_read(FRAME_COUNTER_ADDR) as u64;
        Self {
            cart,
            faults,
            line: 0,
            frame,
            scroll: 0,
            complete: false,
            joypad: Joypad::RELEASED,
            interlace: false,
            frame_skip: false,
            tone_period: (AUDIO_SAMPLE_RATE / tone_hz).max(2),
            tone_phase: 0,
            buf: [0; LCD_WIDTH],
        }
    }

    #[cfg(test)]
    fn cartridge(&self) -> &C {
        &self.cart
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    fn render_line(&mut self, y: usize) {
        let shade = ((y / 36 + self.frame as usize / 30) & 3) as u8;
        for (x, px) in self.buf.iter_mut().enumerate() {
            let bank = (((x + self.scroll) / BAR_WIDTH) & 3) as u8;
            *px = (bank << 4) | shade;
        }
    }

    fn line_visible(&self, y: usize) -> bool {
        if self.frame_skip && self.frame & 1 == 1 {
            return false;
        }
        !self.interlace || (y & 1) as u64 == self.frame & 1
    }

    fn end_frame(&mut self) {
        self.complete = true;
        self.frame += 1;
        self.cart
            .cart_ram_write(FRAME_COUNTER_ADDR, self.frame as u8);
        if self.cart.cart_ram_read(FRAME_COUNTER_ADDR) != self.frame as u8 {
            self.faults
                .report(EngineFault::InvalidWrite(0xA000 + FRAME_COUNTER_ADDR as u16));
        }

        if self.joypad.is_held(JOYPAD_RIGHT) {
            self.scroll = (self.scroll + 1) % (BAR_WIDTH * 4);
        } else if self.joypad.is_held(JOYPAD_LEFT) {
            self.scroll = (self.scroll + BAR_WIDTH * 4 - 1) % (BAR_WIDTH * 4);
        }
    }
}

impl<C: CartridgeMemory> Emulator for PatternEngine<C> {
    fn step(&mut self, on_line: &mut dyn FnMut(usize, &Scanline)) {
        let y = self.line;
        if y < LCD_HEIGHT && self.line_visible(y) {
            self.render_line(y);
            on_line(y, &self.buf);
        }

        self.line += 1;
        if self.line == TOTAL_LINES {
            self.line = 0;
            self.end_frame();
        }
    }

    fn frame_complete(&self) -> bool {
        self.complete
    }

    fn clear_frame_complete(&mut self) {
        self.complete = false;
    }

    fn synthesize_audio(&mut self, buffer: &mut [i16]) {
        let muted = self.joypad.is_held(JOYPAD_B);
        let period = if self.joypad.is_held(JOYPAD_A) {
            (self.tone_period / 2).max(2)
        } else {
            self.tone_period
        };
        for frame in buffer.chunks_exact_mut(2) {
            let level = if muted {
                0
            } else if self.tone_phase < period / 2 {
                TONE_AMPLITUDE
            } else {
                -TONE_AMPLITUDE
            };
            frame[0] = level;
            frame[1] = level;
            self.tone_phase = (self.tone_phase + 1) % period;
        }
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
