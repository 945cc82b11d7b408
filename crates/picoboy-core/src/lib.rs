//! Dual-core display/audio pipeline for a handheld Game Boy front end.
//!
//! One core runs the emulation engine and feeds completed scanlines through a
//! digest cache into a shallow command FIFO. The other core owns the panel and
//! turns each queued line into a palette-translated display transfer. Frontends
//! wire real hardware (or host stand-ins) in through the [`display::Panel`],
//! [`audio::AudioSink`], [`input::InputSource`] and [`engine::Emulator`] seams.

/// Lossy single-producer / single-consumer stereo ring for audio output.
pub mod audio_queue;

/// Per-frame audio hand-off and output configuration.
pub mod audio;

/// Shared "line transfer in flight" flag.
pub mod busy;

/// Blocking command FIFO between the two cores.
pub mod channel;

/// Inter-core command words.
pub mod command;

/// Single-keypress operator commands.
pub mod console;

/// Panel driver interface and a memory-backed ILI9225 model.
pub mod display;

/// Seam to the external emulation engine.
pub mod engine;

mod error;

/// Core A: per-frame orchestration.
pub mod frame;

/// Joypad sampling, edge detection and hotkeys.
pub mod input;

/// Scanline digest cache and change detector.
pub mod line_cache;

/// Indexed-colour to native-sample lookup table.
pub mod palette;

/// Startup and teardown of both cores.
pub mod pipeline;

/// Core B: render engine and line transfers.
pub mod render;

pub use error::PipelineError;

/// Width of an emulated scanline in pixels.
pub const LCD_WIDTH: usize = 160;

/// Number of visible scanlines per frame.
pub const LCD_HEIGHT: usize = 144;

/// One scanline as produced by the engine: shade in bits 0-1, bank in bits 4-5.
pub type Scanline = [u8; LCD_WIDTH];
