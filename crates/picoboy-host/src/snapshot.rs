use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use picoboy_core::display::{PanelState, WINDOW_COL0, WINDOW_ROW0};
use picoboy_core::palette::rgb565_to_rgb888;
use picoboy_core::{LCD_HEIGHT, LCD_WIDTH};

use crate::error::HostError;

/// RGB888 pixels of the emulated area as it appears on the glass.
pub fn screen_rgb(state: &PanelState) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(LCD_WIDTH * LCD_HEIGHT * 3);
    for y in 0..LCD_HEIGHT {
        for x in 0..LCD_WIDTH {
            let (row, col) = panel_coords(y, x);
            rgb.extend_from_slice(&rgb565_to_rgb888(state.visible(row, col)));
        }
    }
    rgb
}

fn panel_coords(y: usize, x: usize) -> (usize, usize) {
    (WINDOW_ROW0 as usize + y, WINDOW_COL0 as usize + x)
}

pub fn write_png(state: &PanelState, path: &Path) -> Result<(), HostError> {
    let fail = |reason: String| HostError::Snapshot {
        path: path.to_path_buf(),
        reason,
    };

    let file = File::create(path).map_err(|e| fail(e.to_string()))?;
    let mut encoder = png::Encoder::new(BufWriter::new(file), LCD_WIDTH as u32, LCD_HEIGHT as u32);
    encoder.set_color(png::ColorType::Rgb);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header().map_err(|e| fail(e.to_string()))?;
    writer
        .write_image_data(&screen_rgb(state))
        .map_err(|e| fail(e.to_string()))?;
    writer.finish().map_err(|e| fail(e.to_string()))
}
