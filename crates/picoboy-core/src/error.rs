use thiserror::Error;

use crate::LCD_HEIGHT;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("failed to allocate {bytes} byte audio buffer")]
    AudioBufferAlloc { bytes: usize },
    #[error("command channel closed")]
    ChannelClosed,
    #[error("scanline {0} is outside the {h} line display", h = LCD_HEIGHT)]
    LineOutOfRange(usize),
    #[error("failed to spawn render core: {0}")]
    RenderCoreSpawn(#[source] std::io::Error),
    #[error("render core panicked")]
    RenderCorePanicked,
}
