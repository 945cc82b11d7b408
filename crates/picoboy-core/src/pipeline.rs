//! Wiring between the two cores: one command channel, one line slot and one
//! busy flag, created together so nothing else can get at them.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{debug, error};

use crate::PipelineError;
use crate::busy::LineBusy;
use crate::channel::{DEFAULT_DEPTH, command_channel};
use crate::display::Panel;
use crate::line_cache::{ChangeDetector, LineSlot};
use crate::palette::Palette;
use crate::render::{RenderEngine, RenderStats, TransferMode};

#[derive(Clone, Copy, Debug)]
pub struct PipelineConfig {
    pub palette: Palette,
    pub transfer_mode: TransferMode,
    pub channel_depth: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            palette: Palette::default(),
            transfer_mode: TransferMode::default(),
            channel_depth: DEFAULT_DEPTH,
        }
    }
}

/// Handle to the running render core.
pub struct RenderCore {
    handle: JoinHandle<RenderStats>,
}

impl RenderCore {
    /// Wait for the render core to drain its queue and stop.
    ///
    /// Only returns once every [`ChangeDetector`] for this pipeline has been
    /// dropped.
    pub fn join(self) -> Result<RenderStats, PipelineError> {
        self.handle.join().map_err(|_| {
            error!("render core panicked");
            PipelineError::RenderCorePanicked
        })
    }
}

/// Clears the busy flag when the render core exits, including by panic, so
/// core A never waits on a transfer nobody will finish. By then the command
/// receiver is gone and core A's next push fails with `ChannelClosed`.
struct IdleOnExit(Arc<LineBusy>);

impl Drop for IdleOnExit {
    fn drop(&mut self) {
        self.0.release();
    }
}

/// Start the render core on its own thread and return core A's end.
pub fn start<P: Panel>(
    panel: P,
    config: &PipelineConfig,
) -> Result<(ChangeDetector, RenderCore), PipelineError> {
    let (tx, rx) = command_channel(config.channel_depth);
    let slot = Arc::new(LineSlot::new());
    let busy = Arc::new(LineBusy::new());

    let engine = RenderEngine::new(
        panel,
        config.palette,
        Arc::clone(&slot),
        Arc::clone(&busy),
        rx,
        config.transfer_mode,
    )?;

    let idle = IdleOnExit(Arc::clone(&busy));
    let handle = thread::Builder::new()
        .name("core1".into())
        .spawn(move || {
            let _idle = idle;
            engine.run()
        })
        .map_err(PipelineError::RenderCoreSpawn)?;
    debug!(
        "render core spawned ({:?}, depth {})",
        config.transfer_mode, config.channel_depth
    );

    Ok((ChangeDetector::new(slot, busy, tx), RenderCore { handle }))
}
