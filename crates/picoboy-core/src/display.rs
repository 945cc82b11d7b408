use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::{LCD_HEIGHT, LCD_WIDTH};

/// Panel GRAM rows (ILI9225, landscape).
pub const PANEL_ROWS: usize = 176;
/// Panel GRAM columns.
pub const PANEL_COLS: usize = 220;

/// First panel row of the emulated area.
pub const WINDOW_ROW0: u16 = 16;
pub const WINDOW_ROW1: u16 = WINDOW_ROW0 + LCD_HEIGHT as u16 - 1;
/// First panel column of the emulated area.
pub const WINDOW_COL0: u16 = 31;
pub const WINDOW_COL1: u16 = WINDOW_COL0 + LCD_WIDTH as u16 - 1;

/// Length of the start-up blanking burst. Slightly more than the whole GRAM
/// so the address counter is guaranteed to have covered every cell.
pub const CLEAR_SAMPLES: usize = PANEL_ROWS * PANEL_COLS + 16;

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ColorMode {
    /// 65k colours.
    #[default]
    Full = 0,
    /// 8 colours, lower power.
    Reduced = 1,
}

impl ColorMode {
    pub const fn from_u8(value: u8) -> Self {
        if value == 0 { Self::Full } else { Self::Reduced }
    }

    pub const fn toggled(self) -> Self {
        match self {
            Self::Full => Self::Reduced,
            Self::Reduced => Self::Full,
        }
    }
}

/// Register-level operations the render core needs from a display.
///
/// Samples are RGB565. Coordinates are panel GRAM coordinates. Implementations
/// have no error path: a panel that stops accepting data simply never
/// returns, which is fatal for the render core.
pub trait Panel: Send + 'static {
    /// Power up and reset the controller. The window covers the whole GRAM
    /// afterwards.
    fn panel_init(&mut self);
    /// Restrict auto-increment to rows `y0..=y1`, columns `x0..=x1`, and move
    /// the address counter to `(y0, x0)`.
    fn set_window(&mut self, y0: u16, y1: u16, x0: u16, x1: u16);
    /// Move the address counter to the first column of row `y`.
    fn set_draw_row(&mut self, y: u16);
    fn begin_transfer(&mut self);
    fn end_transfer(&mut self);
    /// Stream samples at the address counter, auto-incrementing.
    fn write_samples(&mut self, samples: &[u16]);
    /// Stream one sample `count` times (non-incrementing source).
    fn write_repeated(&mut self, sample: u16, count: usize);
    /// Write a single sample as its own short transaction.
    fn write_pixel(&mut self, y: u16, x: u16, sample: u16);
    fn set_display_mode(&mut self, invert: bool, mode: ColorMode);
    /// Hold the controller in reset. Called once on shutdown.
    fn hold_reset(&mut self) {}
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PanelStats {
    /// Completed begin/end transfer pairs.
    pub transfers: u64,
    /// Samples streamed through `write_samples`/`write_repeated`.
    pub samples: u64,
    /// `begin_transfer` calls made while a transfer was already open.
    pub overlapping_transfers: u64,
    /// Streamed writes issued outside a begin/end pair.
    pub stray_writes: u64,
    pub pixel_pokes: u64,
    pub mode_changes: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Window {
    y0: u16,
    y1: u16,
    x0: u16,
    x1: u16,
}

impl Window {
    const FULL: Window = Window {
        y0: 0,
        y1: PANEL_ROWS as u16 - 1,
        x0: 0,
        x1: PANEL_COLS as u16 - 1,
    };
}

/// Controller state of a [`MemoryPanel`], shared with whoever holds a
/// [`PanelHandle`].
#[derive(Clone, Debug)]
pub struct PanelState {
    gram: Vec<u16>,
    window: Window,
    row: u16,
    col: u16,
    in_transfer: bool,
    powered: bool,
    invert: bool,
    mode: ColorMode,
    stats: PanelStats,
}

impl PanelState {
    fn new() -> Self {
        Self {
            gram: vec![0; PANEL_ROWS * PANEL_COLS],
            window: Window::FULL,
            row: 0,
            col: 0,
            in_transfer: false,
            powered: false,
            invert: false,
            mode: ColorMode::Full,
            stats: PanelStats::default(),
        }
    }

    /// Raw GRAM contents at a panel coordinate.
    pub fn sample(&self, row: usize, col: usize) -> u16 {
        self.gram[row * PANEL_COLS + col]
    }

    /// Colour as it would appear on the glass, after invert and colour depth.
    pub fn visible(&self, row: usize, col: usize) -> u16 {
        let mut s = self.sample(row, col);
        if self.invert {
            s = !s;
        }
        if self.mode == ColorMode::Reduced {
            let r = if s & 0x8000 != 0 { 0x1F << 11 } else { 0 };
            let g = if s & 0x0400 != 0 { 0x3F << 5 } else { 0 };
            let b = if s & 0x0010 != 0 { 0x1F } else { 0 };
            s = r | g | b;
        }
        s
    }

    /// Sample at an emulated-screen coordinate.
    pub fn lcd_sample(&self, line: usize, x: usize) -> u16 {
        self.sample(WINDOW_ROW0 as usize + line, WINDOW_COL0 as usize + x)
    }

    pub fn stats(&self) -> PanelStats {
        self.stats
    }

    pub fn powered(&self) -> bool {
        self.powered
    }

    pub fn in_transfer(&self) -> bool {
        self.in_transfer
    }

    pub fn display_mode(&self) -> (bool, ColorMode) {
        (self.invert, self.mode)
    }

    fn put(&mut self, sample: u16) {
        let idx = self.row as usize * PANEL_COLS + self.col as usize;
        self.gram[idx] = sample;
        if self.col >= self.window.x1 {
            self.col = self.window.x0;
            self.row = if self.row >= self.window.y1 {
                self.window.y0
            } else {
                self.row + 1
            };
        } else {
            self.col += 1;
        }
    }

    fn note_stream(&mut self, count: usize) {
        self.stats.samples += count as u64;
        if !self.in_transfer {
            self.stats.stray_writes += 1;
        }
    }
}

/// Cloneable view of a [`MemoryPanel`]'s controller state.
#[derive(Clone)]
pub struct PanelHandle(Arc<Mutex<PanelState>>);

impl PanelHandle {
    pub fn lock(&self) -> MutexGuard<'_, PanelState> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> PanelState {
        self.lock().clone()
    }
}

/// Host stand-in for the ILI9225: a 176x220 RGB565 GRAM with a windowed,
/// auto-incrementing address counter.
pub struct MemoryPanel {
    state: Arc<Mutex<PanelState>>,
}

impl MemoryPanel {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(PanelState::new())),
        }
    }

    pub fn handle(&self) -> PanelHandle {
        PanelHandle(Arc::clone(&self.state))
    }

    fn state(&self) -> MutexGuard<'_, PanelState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MemoryPanel {
    fn default() -> Self {
        Self::new()
    }
}

impl Panel for MemoryPanel {
    fn panel_init(&mut self) {
        let mut s = self.state();
        s.powered = true;
        s.window = Window::FULL;
        s.row = 0;
        s.col = 0;
        s.in_transfer = false;
        s.invert = false;
        s.mode = ColorMode::Full;
    }

    fn set_window(&mut self, y0: u16, y1: u16, x0: u16, x1: u16) {
        let mut s = self.state();
        let y1 = y1.min(PANEL_ROWS as u16 - 1);
        let x1 = x1.min(PANEL_COLS as u16 - 1);
        s.window = Window {
            y0: y0.min(y1),
            y1,
            x0: x0.min(x1),
            x1,
        };
        s.row = s.window.y0;
        s.col = s.window.x0;
    }

    fn set_draw_row(&mut self, y: u16) {
        let mut s = self.state();
        s.row = y.clamp(s.window.y0, s.window.y1);
        s.col = s.window.x0;
    }

    fn begin_transfer(&mut self) {
        let mut s = self.state();
        if s.in_transfer {
            s.stats.overlapping_transfers += 1;
        }
        s.in_transfer = true;
    }

    fn end_transfer(&mut self) {
        let mut s = self.state();
        if s.in_transfer {
            s.stats.transfers += 1;
        }
        s.in_transfer = false;
    }

    fn write_samples(&mut self, samples: &[u16]) {
        let mut s = self.state();
        s.note_stream(samples.len());
        for &sample in samples {
            s.put(sample);
        }
    }

    fn write_repeated(&mut self, sample: u16, count: usize) {
        let mut s = self.state();
        s.note_stream(count);
        for _ in 0..count {
            s.put(sample);
        }
    }

    fn write_pixel(&mut self, y: u16, x: u16, sample: u16) {
        let mut s = self.state();
        let (y, x) = (y as usize, x as usize);
        if y < PANEL_ROWS && x < PANEL_COLS {
            s.gram[y * PANEL_COLS + x] = sample;
        }
        s.stats.pixel_pokes += 1;
    }

    fn set_display_mode(&mut self, invert: bool, mode: ColorMode) {
        let mut s = self.state();
        s.invert = invert;
        s.mode = mode;
        s.stats.mode_changes += 1;
    }

    fn hold_reset(&mut self) {
        let mut s = self.state();
        s.powered = false;
        s.in_transfer = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_counter_wraps_inside_window() {
        let mut panel = MemoryPanel::new();
        let handle = panel.handle();
        panel.panel_init();
        panel.set_window(10, 11, 20, 22);

        panel.begin_transfer();
        panel.write_samples(&[1, 2, 3, 4, 5, 6, 7]);
        panel.end_transfer();

        let s = handle.lock();
        assert_eq!(s.sample(10, 20), 7);
        assert_eq!(s.sample(10, 22), 3);
        assert_eq!(s.sample(11, 20), 4);
        assert_eq!(s.sample(11, 22), 6);
        assert_eq!(s.sample(12, 20), 0);
        assert_eq!(s.stats().transfers, 1);
        assert_eq!(s.stats().stray_writes, 0);
    }

    #[test]
    fn clear_burst_covers_whole_gram() {
        let mut panel = MemoryPanel::new();
        let handle = panel.handle();
        panel.panel_init();
        panel.begin_transfer();
        panel.write_repeated(0xABCD, CLEAR_SAMPLES);
        panel.end_transfer();

        let s = handle.lock();
        assert!(s.gram.iter().all(|&v| v == 0xABCD));
        assert_eq!(s.stats().samples, CLEAR_SAMPLES as u64);
    }

    #[test]
    fn draw_row_starts_at_window_left_edge() {
        let mut panel = MemoryPanel::new();
        let handle = panel.handle();
        panel.panel_init();
        panel.set_window(WINDOW_ROW0, WINDOW_ROW1, WINDOW_COL0, WINDOW_COL1);
        panel.set_draw_row(WINDOW_ROW0 + 5);
        panel.begin_transfer();
        panel.write_samples(&[0x1234; LCD_WIDTH]);
        panel.end_transfer();

        let s = handle.lock();
        assert_eq!(s.lcd_sample(5, 0), 0x1234);
        assert_eq!(s.lcd_sample(5, LCD_WIDTH - 1), 0x1234);
        assert_eq!(s.lcd_sample(6, 0), 0);
        assert_eq!(s.sample(WINDOW_ROW0 as usize + 5, WINDOW_COL0 as usize - 1), 0);
    }

    #[test]
    fn reduced_mode_keeps_channel_msbs() {
        let mut panel = MemoryPanel::new();
        let handle = panel.handle();
        panel.panel_init();
        panel.write_pixel(0, 0, 0x8410);
        panel.write_pixel(0, 1, 0x7BEF);
        panel.set_display_mode(false, ColorMode::Reduced);

        let s = handle.lock();
        assert_eq!(s.visible(0, 0), 0xFFFF);
        assert_eq!(s.visible(0, 1), 0x0000);
        assert_eq!(s.stats().mode_changes, 1);
    }

    #[test]
    fn overlapping_and_stray_writes_are_counted() {
        let mut panel = MemoryPanel::new();
        let handle = panel.handle();
        panel.panel_init();
        panel.write_samples(&[1]);
        panel.begin_transfer();
        panel.begin_transfer();
        panel.end_transfer();

        let stats = handle.lock().stats();
        assert_eq!(stats.stray_writes, 1);
        assert_eq!(stats.overlapping_transfers, 1);
        assert_eq!(stats.transfers, 1);
    }
}
