use std::sync::Arc;
use std::thread;

use picoboy_core::busy::LineBusy;
use picoboy_core::channel::{CommandReceiver, command_channel};
use picoboy_core::command::CoreCommand;
use picoboy_core::line_cache::{ChangeDetector, LineOutcome, LineSlot, line_digest};
use picoboy_core::palette::{PalettePreset, SHADES};
use picoboy_core::{LCD_HEIGHT, LCD_WIDTH, Scanline};

fn detector(depth: usize) -> (ChangeDetector, CommandReceiver, Arc<LineBusy>, Arc<LineSlot>) {
    let (tx, rx) = command_channel(depth);
    let busy = Arc::new(LineBusy::new());
    let slot = Arc::new(LineSlot::new());
    let det = ChangeDetector::new(Arc::clone(&slot), Arc::clone(&busy), tx);
    (det, rx, busy, slot)
}

/// Stands in for the render core: records every command and completes each
/// line transfer immediately.
fn drain(rx: CommandReceiver, busy: Arc<LineBusy>) -> thread::JoinHandle<Vec<CoreCommand>> {
    thread::spawn(move || {
        let mut seen = Vec::new();
        while let Ok(cmd) = rx.pop() {
            if let CoreCommand::DrawLine(_) = cmd {
                assert!(busy.is_busy(), "line queued without the busy flag set");
                busy.release();
            }
            seen.push(cmd);
        }
        seen
    })
}

#[test]
fn zero_line_presented_twice_is_drawn_once() {
    let (mut det, rx, busy, _slot) = detector(2);
    let consumer = drain(rx, Arc::clone(&busy));

    let line: Scanline = [0; LCD_WIDTH];
    assert_eq!(det.detect_and_enqueue(0, &line).unwrap(), LineOutcome::Enqueued);
    assert_eq!(det.detect_and_enqueue(0, &line).unwrap(), LineOutcome::Skipped);
    drop(det);

    assert_eq!(consumer.join().unwrap(), vec![CoreCommand::DrawLine(0)]);
}

#[test]
fn one_flipped_sample_sends_exactly_one_command() {
    let (mut det, rx, busy, _slot) = detector(2);
    let consumer = drain(rx, Arc::clone(&busy));

    let mut line: Scanline = [0; LCD_WIDTH];
    det.detect_and_enqueue(0, &line).unwrap();
    line[80] ^= 0x01;
    assert_eq!(det.detect_and_enqueue(0, &line).unwrap(), LineOutcome::Enqueued);
    assert_eq!(det.cache().digest(0), Some(line_digest(&line)));
    drop(det);

    let seen = consumer.join().unwrap();
    assert_eq!(seen, vec![CoreCommand::DrawLine(0), CoreCommand::DrawLine(0)]);
}

#[test]
fn every_changed_line_arrives_in_ascending_order() {
    for depth in [1, 2, 8] {
        let (mut det, rx, busy, _slot) = detector(depth);
        let consumer = drain(rx, Arc::clone(&busy));

        for y in 0..LCD_HEIGHT {
            let line: Scanline = [y as u8; LCD_WIDTH];
            assert_eq!(det.detect_and_enqueue(y, &line).unwrap(), LineOutcome::Enqueued);
        }
        drop(det);

        let expected: Vec<_> = (0..LCD_HEIGHT)
            .map(|y| CoreCommand::DrawLine(y as u8))
            .collect();
        assert_eq!(consumer.join().unwrap(), expected, "depth {depth}");
        assert!(!busy.is_busy());
    }
}

#[test]
fn slot_holds_the_line_that_was_queued() {
    let (mut det, rx, busy, slot) = detector(2);
    let consumer = thread::spawn(move || {
        let mut firsts = Vec::new();
        while let Ok(CoreCommand::DrawLine(y)) = rx.pop() {
            // The detector cannot overwrite the slot until this release.
            let pixels = line_of(&slot);
            firsts.push((y, pixels));
            busy.release();
        }
        firsts
    });

    for y in 0..16usize {
        det.detect_and_enqueue(y, &[0x30 | y as u8; LCD_WIDTH]).unwrap();
    }
    drop(det);

    for (y, pixels) in consumer.join().unwrap() {
        assert!(pixels.iter().all(|&p| p == 0x30 | y), "line {y}");
    }
}

fn line_of(slot: &LineSlot) -> Scanline {
    let mut copy = [0; LCD_WIDTH];
    slot.copy_to(&mut copy);
    copy
}

#[test]
fn every_sample_byte_has_a_colour() {
    for preset in [PalettePreset::DmgGreen, PalettePreset::Pocket] {
        let palette = preset.palette();
        for sample in 0..=u8::MAX {
            let bank = ((sample >> 4) & 3) as usize;
            let shade = (sample & 3) as usize;
            assert!(shade < SHADES);
            assert_eq!(palette.lookup(sample), palette.color(bank, shade));
        }
        for shade in 0..SHADES {
            assert_eq!(palette.color(3, shade), palette.color(2, shade));
        }
    }
}
