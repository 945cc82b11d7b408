use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use crossbeam_channel as cb;
use log::{debug, info, warn};

use crate::busy::LineBusy;
use crate::channel::CommandReceiver;
use crate::command::CoreCommand;
use crate::display::{
    CLEAR_SAMPLES, ColorMode, Panel, WINDOW_COL0, WINDOW_COL1, WINDOW_ROW0, WINDOW_ROW1,
};
use crate::line_cache::LineSlot;
use crate::palette::{Palette, rgb332_to_rgb565};
use crate::{LCD_HEIGHT, LCD_WIDTH, PipelineError};

#[cfg(feature = "cmd-trace")]
macro_rules! cmd_trace {
    ($($arg:tt)*) => {
        log::trace!($($arg)*);
    };
}
#[cfg(not(feature = "cmd-trace"))]
macro_rules! cmd_trace {
    ($($arg:tt)*) => {};
}

type LineBuffer = Box<[u16; LCD_WIDTH]>;

/// How a translated line reaches the panel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TransferMode {
    /// The render core streams the samples itself and clears the busy flag
    /// when done.
    #[default]
    Synchronous,
    /// A transfer unit thread streams the samples; its completion handler
    /// clears the busy flag and wakes the render core.
    Asynchronous,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderState {
    Init,
    Ready,
    Busy,
    Stopped,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub commands: u64,
    pub lines_drawn: u64,
    pub mode_changes: u64,
    pub pixels_poked: u64,
}

enum DmaJob {
    Fill { sample: u16, count: usize },
    Line(LineBuffer),
}

/// Completion signal raised by the transfer unit. Hands the line buffer back.
struct DmaIrq {
    buffer: Option<LineBuffer>,
}

/// Host model of the DMA channel feeding the panel.
struct LineDma {
    jobs: Option<cb::Sender<DmaJob>>,
    irq: cb::Receiver<DmaIrq>,
    worker: Option<JoinHandle<()>>,
}

impl LineDma {
    fn spawn<P: Panel>(panel: Arc<Mutex<P>>, busy: Arc<LineBusy>) -> io::Result<Self> {
        let (jobs_tx, jobs_rx) = cb::bounded::<DmaJob>(1);
        let (irq_tx, irq_rx) = cb::bounded::<DmaIrq>(1);

        let worker = thread::Builder::new().name("dma".into()).spawn(move || {
            while let Ok(job) = jobs_rx.recv() {
                let mut p = panel.lock().unwrap_or_else(PoisonError::into_inner);
                let buffer = match job {
                    DmaJob::Fill { sample, count } => {
                        p.write_repeated(sample, count);
                        p.end_transfer();
                        None
                    }
                    DmaJob::Line(buf) => {
                        p.write_samples(&buf[..]);
                        p.end_transfer();
                        busy.release();
                        Some(buf)
                    }
                };
                drop(p);
                if irq_tx.send(DmaIrq { buffer }).is_err() {
                    break;
                }
            }
        })?;

        Ok(Self {
            jobs: Some(jobs_tx),
            irq: irq_rx,
            worker: Some(worker),
        })
    }

    /// Start a transfer and sleep until its completion interrupt.
    ///
    /// There is no timeout: a transfer that never completes stalls the render
    /// core for good. A dead transfer unit is unrecoverable.
    fn run(&self, job: DmaJob) -> DmaIrq {
        let started = self.jobs.as_ref().is_some_and(|jobs| jobs.send(job).is_ok());
        if !started {
            panic!("line transfer unit is gone");
        }
        match self.irq.recv() {
            Ok(irq) => irq,
            Err(_) => panic!("line transfer unit stopped before completing"),
        }
    }
}

impl Drop for LineDma {
    fn drop(&mut self) {
        self.jobs.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

enum Transfer {
    Blocking,
    Dma(LineDma),
}

/// Core B: owns the panel and executes commands from core A in order.
pub struct RenderEngine<P: Panel> {
    panel: Arc<Mutex<P>>,
    palette: Palette,
    slot: Arc<LineSlot>,
    busy: Arc<LineBusy>,
    rx: CommandReceiver,
    transfer: Transfer,
    line_buf: Option<LineBuffer>,
    state: RenderState,
    stats: RenderStats,
}

impl<P: Panel> RenderEngine<P> {
    pub fn new(
        panel: P,
        palette: Palette,
        slot: Arc<LineSlot>,
        busy: Arc<LineBusy>,
        rx: CommandReceiver,
        mode: TransferMode,
    ) -> Result<Self, PipelineError> {
        let panel = Arc::new(Mutex::new(panel));
        let transfer = match mode {
            TransferMode::Synchronous => Transfer::Blocking,
            TransferMode::Asynchronous => Transfer::Dma(
                LineDma::spawn(Arc::clone(&panel), Arc::clone(&busy))
                    .map_err(PipelineError::RenderCoreSpawn)?,
            ),
        };

        Ok(Self {
            panel,
            palette,
            slot,
            busy,
            rx,
            transfer,
            line_buf: Some(Box::new([0; LCD_WIDTH])),
            state: RenderState::Init,
            stats: RenderStats::default(),
        })
    }

    pub fn state(&self) -> RenderState {
        self.state
    }

    pub fn stats(&self) -> RenderStats {
        self.stats
    }

    fn panel(&self) -> MutexGuard<'_, P> {
        self.panel.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Bring up the panel, blank it and open the emulated-area window.
    pub fn init(&mut self) {
        let clear = self.palette.clear_color();
        {
            let mut p = self.panel();
            p.panel_init();
            p.begin_transfer();
        }
        match &self.transfer {
            Transfer::Blocking => {
                let mut p = self.panel();
                p.write_repeated(clear, CLEAR_SAMPLES);
                p.end_transfer();
            }
            Transfer::Dma(dma) => {
                dma.run(DmaJob::Fill {
                    sample: clear,
                    count: CLEAR_SAMPLES,
                });
            }
        }
        self.panel()
            .set_window(WINDOW_ROW0, WINDOW_ROW1, WINDOW_COL0, WINDOW_COL1);
        self.state = RenderState::Ready;
        debug!("render core ready");
    }

    /// Wait for and execute one command.
    ///
    /// Returns [`PipelineError::ChannelClosed`] once core A has hung up and
    /// every queued command has been executed.
    pub fn step(&mut self) -> Result<(), PipelineError> {
        let cmd = self.rx.pop()?;
        self.handle(cmd);
        Ok(())
    }

    pub fn handle(&mut self, cmd: CoreCommand) {
        cmd_trace!("core1: {cmd:?}");
        self.stats.commands += 1;
        match cmd {
            CoreCommand::Nop => {}
            CoreCommand::DrawLine(line) => self.draw_line(line as usize),
            CoreCommand::SetDisplayMode { invert, mode } => self.set_display_mode(invert, mode),
            CoreCommand::SetPixel { x, y, value } => self.set_pixel(x, y, value),
        }
    }

    fn draw_line(&mut self, line: usize) {
        if line >= LCD_HEIGHT {
            warn!("ignoring draw of line {line}");
            self.busy.release();
            return;
        }

        let mut fb = self
            .line_buf
            .take()
            .unwrap_or_else(|| Box::new([0; LCD_WIDTH]));
        self.palette.translate(&self.slot.lock(), &mut fb);

        let row = WINDOW_ROW0 + line as u16;
        self.state = RenderState::Busy;
        match &self.transfer {
            Transfer::Blocking => {
                let mut p = self.panel();
                p.set_draw_row(row);
                p.begin_transfer();
                p.write_samples(&fb[..]);
                p.end_transfer();
                drop(p);
                self.busy.release();
                self.line_buf = Some(fb);
            }
            Transfer::Dma(dma) => {
                {
                    let mut p = self.panel();
                    p.set_draw_row(row);
                    p.begin_transfer();
                }
                self.line_buf = dma.run(DmaJob::Line(fb)).buffer;
            }
        }
        self.state = RenderState::Ready;
        self.stats.lines_drawn += 1;
    }

    fn set_display_mode(&mut self, invert: bool, mode: ColorMode) {
        debug!("display mode: invert={invert} colour={mode:?}");
        self.panel().set_display_mode(invert, mode);
        self.stats.mode_changes += 1;
    }

    fn set_pixel(&mut self, x: u8, y: u8, value: u8) {
        let (x, y) = (x as usize, y as usize);
        if x >= LCD_WIDTH || y >= LCD_HEIGHT {
            warn!("ignoring pixel poke at ({x}, {y})");
            return;
        }
        self.panel().write_pixel(
            WINDOW_ROW0 + y as u16,
            WINDOW_COL0 + x as u16,
            rgb332_to_rgb565(value),
        );
        self.stats.pixels_poked += 1;
    }

    /// Run the render core until the command channel closes, then hold the
    /// panel in reset.
    pub fn run(mut self) -> RenderStats {
        self.init();
        info!("render core started");
        while self.step().is_ok() {}

        // Let the transfer unit finish and exit before touching the panel.
        self.transfer = Transfer::Blocking;
        self.panel().hold_reset();
        self.state = RenderState::Stopped;
        info!(
            "render core stopped after {} commands ({} lines)",
            self.stats.commands, self.stats.lines_drawn
        );
        self.stats
    }
}
