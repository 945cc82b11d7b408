use crate::display::ColorMode;

pub const CMD_NOP: u8 = 0;
pub const CMD_DRAW_LINE: u8 = 1;
pub const CMD_SET_DISPLAY_MODE: u8 = 2;
pub const CMD_SET_PIXEL: u8 = 3;

/// A request from core A to core B.
///
/// On the wire each command is one 32-bit FIFO word laid out as
/// `[opcode, b1, b2, data]` from the least significant byte up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CoreCommand {
    Nop,
    /// Draw the shared line slot at this scanline.
    DrawLine(u8),
    /// Reconfigure the panel; touches neither the line slot nor the busy flag.
    SetDisplayMode { invert: bool, mode: ColorMode },
    /// Diagnostic poke of one RGB332 sample, relative to the emulated area.
    SetPixel { x: u8, y: u8, value: u8 },
}

impl CoreCommand {
    pub const fn to_word(self) -> u32 {
        let (cmd, b1, b2, data) = match self {
            Self::Nop => (CMD_NOP, 0, 0, 0),
            Self::DrawLine(line) => (CMD_DRAW_LINE, 0, 0, line),
            Self::SetDisplayMode { invert, mode } => {
                (CMD_SET_DISPLAY_MODE, invert as u8, 0, mode as u8)
            }
            Self::SetPixel { x, y, value } => (CMD_SET_PIXEL, x, y, value),
        };
        u32::from_le_bytes([cmd, b1, b2, data])
    }

    /// Decode a FIFO word. Unknown opcodes decode to [`CoreCommand::Nop`].
    pub fn from_word(word: u32) -> Self {
        let [cmd, b1, b2, data] = word.to_le_bytes();
        match cmd {
            CMD_DRAW_LINE => Self::DrawLine(data),
            CMD_SET_DISPLAY_MODE => Self::SetDisplayMode {
                invert: b1 != 0,
                mode: ColorMode::from_u8(data),
            },
            CMD_SET_PIXEL => Self::SetPixel {
                x: b1,
                y: b2,
                value: data,
            },
            _ => Self::Nop,
        }
    }
}

impl From<CoreCommand> for u32 {
    fn from(cmd: CoreCommand) -> u32 {
        cmd.to_word()
    }
}

impl From<u32> for CoreCommand {
    fn from(word: u32) -> Self {
        Self::from_word(word)
    }
}
