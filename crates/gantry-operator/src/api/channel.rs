//! Per-subscriber update channel with graceful close
//!
//! Each connected sidecar owns one bounded queue of component events. The
//! queue is closed by exactly one path, the idempotent [`UpdateChannel::close`];
//! senders check the closed state before sending, so no send can land on a
//! closed queue.

use std::sync::Mutex;

use gantry_resources::Component;
use tokio::sync::mpsc;

/// Error returned when sending on a closed channel
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChannelClosed;

impl std::fmt::Display for ChannelClosed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("update channel closed")
    }
}

impl std::error::Error for ChannelClosed {}

/// A bounded component-event queue that closes gracefully under concurrent
/// senders
pub struct UpdateChannel {
    // The sender lives behind the mutex so close() can drop it exactly once;
    // the lock is never held across an await
    tx: Mutex<Option<mpsc::Sender<Component>>>,
}

impl UpdateChannel {
    /// Create a channel of the given capacity, returning the shared sender
    /// side and the receiver for the stream worker
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Component>) {
        let (tx, rx) = mpsc::channel(capacity);
        (
            Self {
                tx: Mutex::new(Some(tx)),
            },
            rx,
        )
    }

    /// Enqueue one event; fails once the channel is closed on either side
    pub async fn send(&self, component: Component) -> Result<(), ChannelClosed> {
        let tx = self
            .tx
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        match tx {
            Some(tx) => tx.send(component).await.map_err(|_| ChannelClosed),
            None => Err(ChannelClosed),
        }
    }

    /// Close the queue. Idempotent; the sole queue-closing path.
    pub fn close(&self) {
        self.tx
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
    }

    /// Whether close() has run
    pub fn is_closed(&self) -> bool {
        self.tx
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn component(name: &str) -> Component {
        Component::new(name, Default::default())
    }

    #[tokio::test]
    async fn delivers_in_fifo_order() {
        let (chan, mut rx) = UpdateChannel::new(2);
        chan.send(component("a")).await.unwrap();
        chan.send(component("b")).await.unwrap();

        assert_eq!(rx.recv().await.unwrap().name(), "a");
        assert_eq!(rx.recv().await.unwrap().name(), "b");
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let (chan, mut rx) = UpdateChannel::new(1);
        chan.close();
        chan.close();
        assert!(chan.is_closed());
        // The queue ended exactly once: the receiver sees end-of-stream
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn send_after_close_fails() {
        let (chan, _rx) = UpdateChannel::new(1);
        chan.close();
        assert_eq!(chan.send(component("x")).await, Err(ChannelClosed));
    }

    #[tokio::test]
    async fn send_fails_when_receiver_is_gone() {
        let (chan, rx) = UpdateChannel::new(1);
        drop(rx);
        assert_eq!(chan.send(component("x")).await, Err(ChannelClosed));
    }

    #[tokio::test]
    async fn concurrent_closers_do_not_panic() {
        let (chan, _rx) = UpdateChannel::new(1);
        let chan = Arc::new(chan);
        let mut handles = Vec::new();
        for _ in 0..8 {
            let chan = chan.clone();
            handles.push(tokio::spawn(async move { chan.close() }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert!(chan.is_closed());
    }
}
