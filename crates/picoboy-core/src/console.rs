use crate::input::{
    JOYPAD_A, JOYPAD_B, JOYPAD_DOWN, JOYPAD_LEFT, JOYPAD_RIGHT, JOYPAD_SELECT, JOYPAD_START,
    JOYPAD_UP,
};

/// One keypress from the operator's serial console.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConsoleCommand {
    ToggleColorMode,
    ToggleInterlace,
    ToggleFrameSkip,
    /// Print frames and FPS since the previous report, then reset the counters.
    Benchmark,
    /// Hold a joypad button (active-high mask) for the current frame.
    Press(u8),
    Quit,
}

impl ConsoleCommand {
    pub fn from_key(key: u8) -> Option<Self> {
        let cmd = match key {
            b'c' => Self::ToggleColorMode,
            b'i' => Self::ToggleInterlace,
            b'f' => Self::ToggleFrameSkip,
            b'b' => Self::Benchmark,
            b'\n' | b'\r' => Self::Press(JOYPAD_START),
            b'\x08' => Self::Press(JOYPAD_SELECT),
            b'8' => Self::Press(JOYPAD_UP),
            b'2' => Self::Press(JOYPAD_DOWN),
            b'4' => Self::Press(JOYPAD_LEFT),
            b'6' => Self::Press(JOYPAD_RIGHT),
            b'z' | b'w' => Self::Press(JOYPAD_A),
            b'x' => Self::Press(JOYPAD_B),
            b'q' => Self::Quit,
            _ => return None,
        };
        Some(cmd)
    }
}
