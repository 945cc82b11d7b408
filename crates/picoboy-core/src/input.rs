//! Joypad state is active-low, like the hardware register and the GPIO pins
//! it is sampled from: a clear bit means the button is held.

pub const JOYPAD_RIGHT: u8 = 0x01;
pub const JOYPAD_LEFT: u8 = 0x02;
pub const JOYPAD_UP: u8 = 0x04;
pub const JOYPAD_DOWN: u8 = 0x08;
pub const JOYPAD_A: u8 = 0x10;
pub const JOYPAD_B: u8 = 0x20;
pub const JOYPAD_SELECT: u8 = 0x40;
pub const JOYPAD_START: u8 = 0x80;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Joypad(u8);

impl Joypad {
    pub const RELEASED: Joypad = Joypad(0xFF);

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    #[inline]
    pub const fn is_held(self, mask: u8) -> bool {
        self.0 & mask == 0
    }

    /// This state with `mask` additionally held.
    pub const fn with_pressed(self, mask: u8) -> Self {
        Self(self.0 & !mask)
    }
}

impl Default for Joypad {
    fn default() -> Self {
        Self::RELEASED
    }
}

/// Buttons that changed between two samples, as active-high masks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Edges {
    pub pressed: u8,
    pub released: u8,
}

impl Edges {
    pub const fn between(prev: Joypad, now: Joypad) -> Self {
        let held_prev = !prev.0;
        let held_now = !now.0;
        Self {
            pressed: held_now & !held_prev,
            released: held_prev & !held_now,
        }
    }
}

/// Raw button sampling, done once per frame.
pub trait InputSource {
    fn sample(&mut self) -> Joypad;
}

/// A source with nothing attached.
pub struct NoInput;

impl InputSource for NoInput {
    fn sample(&mut self) -> Joypad {
        Joypad::RELEASED
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Hotkey {
    VolumeUp,
    VolumeDown,
    ToggleColorMode,
    ToggleInterlace,
    ToggleFrameSkip,
}

/// Select + button combinations.
const HOTKEY_MAP: [(u8, Hotkey); 5] = [
    (JOYPAD_UP, Hotkey::VolumeUp),
    (JOYPAD_DOWN, Hotkey::VolumeDown),
    (JOYPAD_A, Hotkey::ToggleColorMode),
    (JOYPAD_LEFT, Hotkey::ToggleInterlace),
    (JOYPAD_RIGHT, Hotkey::ToggleFrameSkip),
];

/// Hotkeys triggered this frame: Select held and the second button newly
/// pressed.
pub fn hotkeys(now: Joypad, edges: Edges) -> impl Iterator<Item = Hotkey> {
    let armed = now.is_held(JOYPAD_SELECT);
    HOTKEY_MAP
        .into_iter()
        .filter(move |&(mask, _)| armed && edges.pressed & mask != 0)
        .map(|(_, hotkey)| hotkey)
}

/// Remembers the previous frame's sample so edges can be computed.
pub struct InputTracker {
    prev: Joypad,
}

impl InputTracker {
    pub fn new(initial: Joypad) -> Self {
        Self { prev: initial }
    }

    pub fn update(&mut self, now: Joypad) -> Edges {
        let edges = Edges::between(self.prev, now);
        self.prev = now;
        edges
    }
}
