use crossbeam_channel as cb;

use crate::PipelineError;
use crate::command::CoreCommand;

/// Depth of the inter-core FIFO unless configured otherwise.
pub const DEFAULT_DEPTH: usize = 2;
pub const MAX_DEPTH: usize = 8;

/// Create the one and only command FIFO between core A and core B.
///
/// Neither end is `Clone`: there is exactly one producer and one consumer.
/// `depth` is clamped to `1..=MAX_DEPTH`.
pub fn command_channel(depth: usize) -> (CommandSender, CommandReceiver) {
    let (tx, rx) = cb::bounded(depth.clamp(1, MAX_DEPTH));
    (CommandSender { tx }, CommandReceiver { rx })
}

pub struct CommandSender {
    tx: cb::Sender<u32>,
}

impl CommandSender {
    /// Queue a command, blocking while the FIFO is full.
    pub fn push(&self, cmd: CoreCommand) -> Result<(), PipelineError> {
        self.tx
            .send(cmd.to_word())
            .map_err(|_| PipelineError::ChannelClosed)
    }

    pub fn is_full(&self) -> bool {
        self.tx.is_full()
    }

    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }
}

pub struct CommandReceiver {
    rx: cb::Receiver<u32>,
}

impl CommandReceiver {
    /// Take the next command, blocking while the FIFO is empty.
    ///
    /// Once the sender is gone, queued commands are still delivered before
    /// this reports [`PipelineError::ChannelClosed`].
    pub fn pop(&self) -> Result<CoreCommand, PipelineError> {
        self.rx
            .recv()
            .map(CoreCommand::from_word)
            .map_err(|_| PipelineError::ChannelClosed)
    }

    pub fn try_pop(&self) -> Option<CoreCommand> {
        self.rx.try_recv().ok().map(CoreCommand::from_word)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn preserves_order_across_threads() {
        let (tx, rx) = command_channel(DEFAULT_DEPTH);
        let producer = thread::spawn(move || {
            for line in 0..=255u8 {
                tx.push(CoreCommand::DrawLine(line)).unwrap();
            }
        });

        for line in 0..=255u8 {
            assert_eq!(rx.pop().unwrap(), CoreCommand::DrawLine(line));
        }
        producer.join().unwrap();
        assert!(matches!(rx.pop(), Err(PipelineError::ChannelClosed)));
    }

    #[test]
    fn depth_is_clamped() {
        let (tx, _rx) = command_channel(0);
        tx.push(CoreCommand::Nop).unwrap();
        assert!(tx.is_full());

        let (tx, _rx) = command_channel(100);
        for _ in 0..MAX_DEPTH {
            tx.push(CoreCommand::Nop).unwrap();
        }
        assert!(tx.is_full());
        assert_eq!(tx.len(), MAX_DEPTH);
    }

    #[test]
    fn queued_commands_survive_sender_drop() {
        let (tx, rx) = command_channel(2);
        tx.push(CoreCommand::DrawLine(3)).unwrap();
        tx.push(CoreCommand::Nop).unwrap();
        drop(tx);

        assert_eq!(rx.pop().unwrap(), CoreCommand::DrawLine(3));
        assert_eq!(rx.pop().unwrap(), CoreCommand::Nop);
        assert!(rx.pop().is_err());
    }

    #[test]
    fn push_after_receiver_drop_fails() {
        let (tx, rx) = command_channel(2);
        drop(rx);
        assert!(matches!(
            tx.push(CoreCommand::Nop),
            Err(PipelineError::ChannelClosed)
        ));
    }
}
