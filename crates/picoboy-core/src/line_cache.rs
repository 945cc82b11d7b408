use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::trace;

use crate::busy::LineBusy;
use crate::channel::CommandSender;
use crate::command::CoreCommand;
use crate::{LCD_HEIGHT, LCD_WIDTH, PipelineError, Scanline};

/// CRC-32 of a scanline's raw samples.
#[inline]
pub fn line_digest(line: &Scanline) -> u32 {
    crc32fast::hash(line)
}

/// One digest per scanline, for the lifetime of the pipeline.
///
/// Every row is permanently resident, so there is no eviction. A row is also
/// "stale" until it has been drawn once (and again after [`invalidate`]), which
/// forces a redraw even if the new digest happens to equal the stored one.
///
/// [`invalidate`]: LineDigestCache::invalidate
pub struct LineDigestCache {
    digests: [u32; LCD_HEIGHT],
    stale: [bool; LCD_HEIGHT],
}

impl LineDigestCache {
    pub fn new() -> Self {
        Self {
            digests: [0; LCD_HEIGHT],
            stale: [true; LCD_HEIGHT],
        }
    }

    pub fn digest(&self, line: usize) -> Option<u32> {
        self.digests.get(line).copied()
    }

    /// Record `digest` for `line`. Returns `true` if the row must be redrawn.
    ///
    /// Panics if `line >= LCD_HEIGHT`; callers validate first.
    pub fn update(&mut self, line: usize, digest: u32) -> bool {
        if !self.stale[line] && self.digests[line] == digest {
            return false;
        }
        self.digests[line] = digest;
        self.stale[line] = false;
        true
    }

    /// Force every row to be redrawn on its next presentation.
    pub fn invalidate(&mut self) {
        self.digests = [0; LCD_HEIGHT];
        self.stale = [true; LCD_HEIGHT];
    }
}

impl Default for LineDigestCache {
    fn default() -> Self {
        Self::new()
    }
}

/// The single-line transmission buffer shared by both cores.
///
/// Only the change detector writes it, and only while no line transfer is in
/// flight; only the render engine reads it, and only for a `DrawLine` it has
/// just popped. The busy flag keeps those windows disjoint, so the mutex is
/// never contended.
pub struct LineSlot {
    line: Mutex<Scanline>,
}

impl LineSlot {
    pub fn new() -> Self {
        Self {
            line: Mutex::new([0; LCD_WIDTH]),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Scanline> {
        self.line.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy out the line currently held. Only meaningful while the busy flag
    /// is set.
    pub fn copy_to(&self, out: &mut Scanline) {
        out.copy_from_slice(&self.lock()[..]);
    }
}

impl Default for LineSlot {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineOutcome {
    Skipped,
    Enqueued,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DetectorStats {
    pub enqueued: u64,
    pub skipped: u64,
}

/// Core A's end of the pipeline: drops unchanged scanlines and queues the
/// rest for drawing. Also the only producer on the command channel.
pub struct ChangeDetector {
    cache: LineDigestCache,
    slot: Arc<LineSlot>,
    busy: Arc<LineBusy>,
    tx: CommandSender,
    stats: DetectorStats,
}

impl ChangeDetector {
    pub fn new(slot: Arc<LineSlot>, busy: Arc<LineBusy>, tx: CommandSender) -> Self {
        Self {
            cache: LineDigestCache::new(),
            slot,
            busy,
            tx,
            stats: DetectorStats::default(),
        }
    }

    /// Route one finished scanline.
    ///
    /// An unchanged line returns immediately. A changed one waits for the
    /// previous transfer to finish, is copied into the shared slot and queued
    /// as `DrawLine(line)`.
    pub fn detect_and_enqueue(
        &mut self,
        line: usize,
        pixels: &Scanline,
    ) -> Result<LineOutcome, PipelineError> {
        if line >= LCD_HEIGHT {
            return Err(PipelineError::LineOutOfRange(line));
        }

        if !self.cache.update(line, line_digest(pixels)) {
            self.stats.skipped += 1;
            return Ok(LineOutcome::Skipped);
        }

        self.busy.wait_idle();
        self.slot.lock().copy_from_slice(pixels);
        let acquired = self.busy.acquire();
        debug_assert!(acquired, "line slot written while a transfer was in flight");

        if let Err(e) = self.tx.push(CoreCommand::DrawLine(line as u8)) {
            self.busy.release();
            return Err(e);
        }
        trace!("queued line {line}");
        self.stats.enqueued += 1;
        Ok(LineOutcome::Enqueued)
    }

    /// Queue a command that does not use the line slot.
    pub fn send(&self, cmd: CoreCommand) -> Result<(), PipelineError> {
        self.tx.push(cmd)
    }

    pub fn invalidate(&mut self) {
        self.cache.invalidate();
    }

    pub fn cache(&self) -> &LineDigestCache {
        &self.cache
    }

    pub fn stats(&self) -> DetectorStats {
        self.stats
    }
}
