use crate::input::{JOYPAD_A, JOYPAD_B, JOYPAD_LEFT, Joypad};
use crate::{LCD_WIDTH, Scanline};

pub const PALETTE_BANKS: usize = 4;
pub const SHADES: usize = 4;

/// Bits of a scanline sample selecting the palette bank.
pub const BANK_MASK: u8 = 0x30;
/// Bits of a scanline sample selecting the shade within a bank.
pub const SHADE_MASK: u8 = 0x03;

pub const BANK_OBJ0: usize = 0;
pub const BANK_OBJ1: usize = 1;
pub const BANK_BG: usize = 2;

const DMG_GREEN: [u32; 4] = [0x9BBC0F, 0x8BAC0F, 0x306230, 0x0F380F];
const POCKET_GREY: [u32; 4] = [0xFFFFFF, 0xA5A5A5, 0x525252, 0x000000];

/// Four banks of four RGB565 samples, indexed by a scanline sample.
///
/// Bank 3 is never selected by a DMG engine but is kept populated (mirroring
/// the background bank) so every possible sample byte maps to a colour.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Palette {
    table: [[u16; SHADES]; PALETTE_BANKS],
}

impl Palette {
    /// Build a table from 0xRRGGBB colours for OBJ0, OBJ1 and BG.
    pub const fn from_rgb888(obj0: [u32; 4], obj1: [u32; 4], bg: [u32; 4]) -> Self {
        let mut table = [[0u16; SHADES]; PALETTE_BANKS];
        let mut shade = 0;
        while shade < SHADES {
            table[BANK_OBJ0][shade] = rgb888_to_rgb565(obj0[shade]);
            table[BANK_OBJ1][shade] = rgb888_to_rgb565(obj1[shade]);
            table[BANK_BG][shade] = rgb888_to_rgb565(bg[shade]);
            table[3][shade] = table[BANK_BG][shade];
            shade += 1;
        }
        Self { table }
    }

    #[inline]
    pub fn color(&self, bank: usize, shade: usize) -> u16 {
        self.table[bank & 3][shade & 3]
    }

    /// Native colour for one scanline sample.
    #[inline]
    pub fn lookup(&self, sample: u8) -> u16 {
        let bank = ((sample & BANK_MASK) >> 4) as usize;
        let shade = (sample & SHADE_MASK) as usize;
        self.table[bank][shade]
    }

    /// Colour used to blank the whole panel at start-up: the darkest BG shade.
    pub fn clear_color(&self) -> u16 {
        self.table[BANK_BG][3]
    }

    pub fn translate(&self, line: &Scanline, out: &mut [u16; LCD_WIDTH]) {
        for (dst, &src) in out.iter_mut().zip(line.iter()) {
            *dst = self.lookup(src);
        }
    }
}

impl Default for Palette {
    fn default() -> Self {
        PalettePreset::default().palette()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum PalettePreset {
    #[default]
    DmgGreen,
    Pocket,
}

/// Button combinations that pick a preset when held at power-on.
const BOOT_COMBOS: [(u8, PalettePreset); 2] = [
    (JOYPAD_B | JOYPAD_LEFT, PalettePreset::Pocket),
    (JOYPAD_A | JOYPAD_B, PalettePreset::DmgGreen),
];

impl PalettePreset {
    /// Preset requested by the buttons held at start-up, if any. The first
    /// combination that is fully held wins.
    pub fn from_boot_buttons(held: Joypad) -> Option<Self> {
        BOOT_COMBOS
            .into_iter()
            .find(|&(combo, _)| held.is_held(combo))
            .map(|(_, preset)| preset)
    }

    pub const fn palette(self) -> Palette {
        match self {
            Self::DmgGreen => Palette::from_rgb888(DMG_GREEN, DMG_GREEN, DMG_GREEN),
            Self::Pocket => Palette::from_rgb888(POCKET_GREY, POCKET_GREY, POCKET_GREY),
        }
    }
}

#[inline]
pub const fn rgb888_to_rgb565(rgb: u32) -> u16 {
    let r = ((rgb >> 16) & 0xFF) as u16;
    let g = ((rgb >> 8) & 0xFF) as u16;
    let b = (rgb & 0xFF) as u16;
    ((r >> 3) << 11) | ((g >> 2) << 5) | (b >> 3)
}

/// Widen a 3-3-2 debug colour to RGB565.
#[inline]
pub const fn rgb332_to_rgb565(value: u8) -> u16 {
    let r3 = (value >> 5) as u16;
    let g3 = ((value >> 2) & 0x07) as u16;
    let b2 = (value & 0x03) as u16;
    let r5 = (r3 << 2) | (r3 >> 1);
    let g6 = (g3 << 3) | g3;
    let b5 = (b2 << 3) | (b2 << 1) | (b2 >> 1);
    (r5 << 11) | (g6 << 5) | b5
}

#[inline]
pub const fn rgb565_to_rgb888(value: u16) -> [u8; 3] {
    let r5 = (value >> 11) & 0x1F;
    let g6 = (value >> 5) & 0x3F;
    let b5 = value & 0x1F;
    [
        ((r5 << 3) | (r5 >> 2)) as u8,
        ((g6 << 2) | (g6 >> 4)) as u8,
        ((b5 << 3) | (b5 >> 2)) as u8,
    ]
}
