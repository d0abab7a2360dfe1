//! A single connected client's outgoing channel.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;

/// One subscriber's send side: a bounded channel plus a running count of
/// messages dropped because the channel was full. A client that falls
/// far enough behind gets disconnected rather than let the channel (or
/// an unbounded alternative) grow without limit.
pub struct Subscriber {
    pub id: String,
    pub agent_id: Option<String>,
    sender: mpsc::Sender<Arc<str>>,
    drops: AtomicU64,
}

impl Subscriber {
    #[must_use]
    pub fn new(id: impl Into<String>, agent_id: Option<String>, buffer_size: usize) -> (Self, mpsc::Receiver<Arc<str>>) {
        let (sender, receiver) = mpsc::channel(buffer_size.max(1));
        (
            Self {
                id: id.into(),
                agent_id,
                sender,
                drops: AtomicU64::new(0),
            },
            receiver,
        )
    }

    /// Attempt to enqueue a payload without blocking. Returns `false` (and
    /// records a drop) if the channel is full.
    pub fn send(&self, payload: Arc<str>) -> bool {
        match self.sender.try_send(payload) {
            Ok(()) => true,
            Err(_) => {
                self.drops.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    #[must_use]
    pub fn drop_count(&self) -> u64 {
        self.drops.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_succeeds_until_buffer_fills_then_drops() {
        let (sub, mut rx) = Subscriber::new("c1", Some("claude-1".into()), 1);
        assert!(sub.send(Arc::from("a")));
        assert!(!sub.send(Arc::from("b")), "buffer of 1 should already be full");
        assert_eq!(sub.drop_count(), 1);

        let received = rx.recv().await.unwrap();
        assert_eq!(&*received, "a");
    }
}
