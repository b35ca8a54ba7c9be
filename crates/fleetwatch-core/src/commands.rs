//! Command queue into the map session.
//!
//! Producers on other threads (the position reload loop, scripted toggles)
//! never touch the map. They enqueue [`SessionCommand`]s; the owner of the
//! [`MapSessionManager`](crate::session::MapSessionManager) drains them in
//! arrival order once per frame.

use crate::error::{FleetwatchError, Result};
use crate::types::PositionBatch;
use async_channel::{unbounded, Receiver, Sender, TryRecvError};

/// Commands accepted by the map session.
#[derive(Debug, Clone)]
pub enum SessionCommand {
    /// Replace the position batch, cancelling any unfinished placement
    ReplaceBatch(PositionBatch),
    /// Show or hide an overlay
    SetOverlayVisible { id: String, visible: bool },
    /// Flip an overlay's visibility
    ToggleOverlay(String),
    /// Swap the tile source of the base layer
    SwitchBaseLayer(String),
    /// Release the map instance
    Unmount,
}

impl SessionCommand {
    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            SessionCommand::ReplaceBatch(_) => "replace-batch",
            SessionCommand::SetOverlayVisible { .. } => "set-overlay-visible",
            SessionCommand::ToggleOverlay(_) => "toggle-overlay",
            SessionCommand::SwitchBaseLayer(_) => "switch-base-layer",
            SessionCommand::Unmount => "unmount",
        }
    }
}

/// Cloneable producer handle.
#[derive(Debug, Clone)]
pub struct SessionSender {
    tx: Sender<SessionCommand>,
}

impl SessionSender {
    /// Enqueues a command. Fails only when the receiver is gone.
    pub fn send(&self, command: SessionCommand) -> Result<()> {
        self.tx
            .try_send(command)
            .map_err(|_| FleetwatchError::ChannelClosed)
    }

    pub fn replace_batch(&self, batch: PositionBatch) -> Result<()> {
        self.send(SessionCommand::ReplaceBatch(batch))
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer side, owned next to the session manager.
#[derive(Debug)]
pub struct SessionReceiver {
    rx: Receiver<SessionCommand>,
}

impl SessionReceiver {
    /// Takes the next queued command without blocking.
    pub fn try_recv(&self) -> Option<SessionCommand> {
        match self.rx.try_recv() {
            Ok(command) => Some(command),
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => None,
        }
    }

    /// Number of commands waiting.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

/// Creates an unbounded session command queue.
pub fn command_channel() -> (SessionSender, SessionReceiver) {
    let (tx, rx) = unbounded();
    (SessionSender { tx }, SessionReceiver { rx })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_order() {
        let (tx, rx) = command_channel();
        tx.send(SessionCommand::ToggleOverlay("a".into())).unwrap();
        tx.send(SessionCommand::SwitchBaseLayer("street".into())).unwrap();
        tx.send(SessionCommand::Unmount).unwrap();
        assert_eq!(rx.len(), 3);

        let names: Vec<&str> = std::iter::from_fn(|| rx.try_recv())
            .map(|command| command.name())
            .collect();
        assert_eq!(names, vec!["toggle-overlay", "switch-base-layer", "unmount"]);
        assert!(rx.is_empty());
    }

    #[test]
    fn test_send_after_receiver_dropped() {
        let (tx, rx) = command_channel();
        drop(rx);
        assert!(tx.is_closed());
        assert!(matches!(
            tx.replace_batch(PositionBatch::default()),
            Err(FleetwatchError::ChannelClosed)
        ));
    }

    #[test]
    fn test_senders_clone_across_threads() {
        let (tx, rx) = command_channel();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let tx = tx.clone();
                std::thread::spawn(move || tx.send(SessionCommand::Unmount).unwrap())
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(rx.len(), 4);
    }
}
