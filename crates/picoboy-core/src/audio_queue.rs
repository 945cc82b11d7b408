use std::cell::UnsafeCell;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Single-producer / single-consumer ring of stereo i16 frames.
///
/// The frame driver pushes each frame's synthesized buffer; the host audio
/// callback pops. Neither end is `Clone`.
///
/// The ring is *lossy* when full: frames that do not fit are dropped and
/// counted, so a slow consumer never stalls the frame driver.
pub struct AudioProducer {
    ring: Arc<Ring>,
}

pub struct AudioConsumer {
    ring: Arc<Ring>,
}

/// `written` and `read` count frames since creation and wrap; a frame lives in
/// slot `count % slots.len()`.
struct Ring {
    slots: Box<[UnsafeCell<[i16; 2]>]>,
    written: AtomicUsize,
    read: AtomicUsize,
    dropped: AtomicU64,
}

// SAFETY: a slot is written only by the producer while it is outside
// `read..written`, and read only by the consumer while inside it. Each side
// publishes its counter with Release after touching the slot.
unsafe impl Sync for Ring {}

impl Ring {
    fn len(&self) -> usize {
        // `read` first: it can only catch up to `written`, never pass it.
        let read = self.read.load(Ordering::Acquire);
        let written = self.written.load(Ordering::Acquire);
        written.wrapping_sub(read).min(self.slots.len())
    }

    #[inline]
    fn slot(&self, count: usize) -> &UnsafeCell<[i16; 2]> {
        &self.slots[count % self.slots.len()]
    }
}

pub fn audio_queue(capacity_frames: usize) -> (AudioProducer, AudioConsumer) {
    let slots = (0..capacity_frames.max(1))
        .map(|_| UnsafeCell::new([0; 2]))
        .collect::<Vec<_>>()
        .into_boxed_slice();

    let ring = Arc::new(Ring {
        slots,
        written: AtomicUsize::new(0),
        read: AtomicUsize::new(0),
        dropped: AtomicU64::new(0),
    });

    (
        AudioProducer {
            ring: Arc::clone(&ring),
        },
        AudioConsumer { ring },
    )
}

impl AudioProducer {
    #[inline]
    pub fn push_stereo(&self, left: i16, right: i16) -> bool {
        let written = self.ring.written.load(Ordering::Relaxed);
        let read = self.ring.read.load(Ordering::Acquire);
        if written.wrapping_sub(read) == self.ring.slots.len() {
            self.ring.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        // SAFETY: the slot is outside `read..written`, so the consumer is not
        // looking at it.
        unsafe {
            *self.ring.slot(written).get() = [left, right];
        }
        self.ring
            .written
            .store(written.wrapping_add(1), Ordering::Release);
        true
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity_frames(&self) -> usize {
        self.ring.slots.len()
    }

    /// Frames dropped because the ring was full.
    pub fn dropped_frames(&self) -> u64 {
        self.ring.dropped.load(Ordering::Relaxed)
    }
}

impl AudioConsumer {
    #[inline]
    pub fn pop_stereo(&self) -> Option<(i16, i16)> {
        let read = self.ring.read.load(Ordering::Relaxed);
        let written = self.ring.written.load(Ordering::Acquire);
        if read == written {
            return None;
        }

        // SAFETY: the slot is inside `read..written`; the producer will not
        // reuse it until `read` moves past.
        let [left, right] = unsafe { *self.ring.slot(read).get() };
        self.ring.read.store(read.wrapping_add(1), Ordering::Release);
        Some((left, right))
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
