use std::path::Path;

use log::warn;
use thiserror::Error;

use crate::Scanline;
use crate::input::Joypad;

pub const CART_RAM_SIZE: usize = 0x8000;

const TITLE_START: usize = 0x134;
const TITLE_END: usize = 0x144;

/// Memory callbacks the engine uses to reach the cartridge.
pub trait CartridgeMemory {
    fn rom_read(&self, addr: usize) -> u8;
    fn cart_ram_read(&self, addr: usize) -> u8;
    fn cart_ram_write(&mut self, addr: usize, value: u8);
}

/// Flat ROM image plus 32 KiB of cartridge RAM. Banking is the engine's job.
pub struct Cartridge {
    rom: Box<[u8]>,
    ram: Box<[u8; CART_RAM_SIZE]>,
}

impl Cartridge {
    pub fn from_bytes(rom: Vec<u8>) -> Self {
        Self {
            rom: rom.into_boxed_slice(),
            ram: Box::new([0; CART_RAM_SIZE]),
        }
    }

    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        std::fs::read(path).map(Self::from_bytes)
    }

    pub fn rom_len(&self) -> usize {
        self.rom.len()
    }

    /// Title from the cartridge header, up to the first NUL.
    pub fn title(&self) -> String {
        let end = TITLE_END.min(self.rom.len());
        let start = TITLE_START.min(end);
        self.rom[start..end]
            .iter()
            .take_while(|&&b| b != 0)
            .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '?' })
            .collect()
    }
}

impl CartridgeMemory for Cartridge {
    fn rom_read(&self, addr: usize) -> u8 {
        self.rom.get(addr).copied().unwrap_or(0xFF)
    }

    fn cart_ram_read(&self, addr: usize) -> u8 {
        self.ram[addr % CART_RAM_SIZE]
    }

    fn cart_ram_write(&mut self, addr: usize, value: u8) {
        self.ram[addr % CART_RAM_SIZE] = value;
    }
}

/// Faults the engine reports while executing. None of them stop emulation.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineFault {
    #[error("unknown fault at {0:04X}")]
    Unknown(u16),
    #[error("invalid opcode at {0:04X}")]
    InvalidOpcode(u16),
    #[error("invalid read at {0:04X}")]
    InvalidRead(u16),
    #[error("invalid write at {0:04X}")]
    InvalidWrite(u16),
}

pub trait FaultSink: Send {
    fn report(&mut self, fault: EngineFault);
}

/// Logs each fault and lets emulation continue.
#[derive(Default)]
pub struct LogFaults {
    count: u64,
}

impl LogFaults {
    pub fn count(&self) -> u64 {
        self.count
    }
}

impl FaultSink for LogFaults {
    fn report(&mut self, fault: EngineFault) {
        self.count += 1;
        warn!("engine fault: {fault}");
    }
}

/// The external instruction-level emulator, as seen by the frame driver.
///
/// Providers construct it from a [`CartridgeMemory`] and a [`FaultSink`].
pub trait Emulator {
    /// Advance the engine. Each scanline finished during the step is handed
    /// to `on_line` before `step` returns.
    fn step(&mut self, on_line: &mut dyn FnMut(usize, &Scanline));
    fn frame_complete(&self) -> bool;
    fn clear_frame_complete(&mut self);
    /// Fill an interleaved stereo buffer with the audio for the frame just run.
    fn synthesize_audio(&mut self, buffer: &mut [i16]);
    fn set_joypad(&mut self, joypad: Joypad);
    fn interlace(&self) -> bool;
    fn set_interlace(&mut self, enabled: bool);
    fn frame_skip(&self) -> bool;
    fn set_frame_skip(&mut self, enabled: bool);
}
