//! Per-session outbound queues.
//!
//! Every message is serialized once and shared as `Arc<str>` across all
//! recipients. Queues are bounded and never awaited on: a slow viewer loses
//! frames instead of stalling the broadcaster or other viewers.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{trace, warn};

use crate::error::ServerError;
use crate::ws::ServerMessage;

/// Queue depth per session. Frames beyond this are dropped.
pub const OUTBOX_CAPACITY: usize = 32;

/// Sending half of one session's queue
#[derive(Debug, Clone)]
pub struct Outbox {
    tx: mpsc::Sender<Arc<str>>,
}

pub fn channel(capacity: usize) -> (Outbox, mpsc::Receiver<Arc<str>>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (Outbox { tx }, rx)
}

impl Outbox {
    /// Queue a frame, dropping it if the session is behind.
    pub fn send_frame(&self, payload: Arc<str>) -> bool {
        match self.tx.try_send(payload) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                trace!("Viewer queue full, dropping frame");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    /// Queue a control message (status, membership, chat).
    pub fn send(&self, payload: Arc<str>) -> bool {
        match self.tx.try_send(payload) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Viewer queue full, dropping control message");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }
}

pub fn encode(msg: &ServerMessage) -> Result<Arc<str>, ServerError> {
    Ok(serde_json::to_string(msg)?.into())
}

/// Serialize `msg` once and queue it on every outbox. Returns how many
/// queues accepted it.
pub fn fan_out<'a>(targets: impl IntoIterator<Item = &'a Outbox>, msg: &ServerMessage) -> usize {
    let payload = match encode(msg) {
        Ok(payload) => payload,
        Err(e) => {
            warn!("Dropping broadcast: {}", e);
            return 0;
        }
    };
    targets
        .into_iter()
        .filter(|outbox| outbox.send(Arc::clone(&payload)))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_queue_drops_frames() {
        let (outbox, mut rx) = channel(2);
        assert!(outbox.send_frame("a".into()));
        assert!(outbox.send_frame("b".into()));
        assert!(!outbox.send_frame("c".into()));

        assert_eq!(&*rx.try_recv().unwrap(), "a");
        assert_eq!(&*rx.try_recv().unwrap(), "b");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn closed_queue_rejects() {
        let (outbox, rx) = channel(4);
        drop(rx);
        assert!(!outbox.send("x".into()));
    }

    #[test]
    fn fan_out_shares_one_payload() {
        let (a, mut rx_a) = channel(4);
        let (b, mut rx_b) = channel(4);
        let delivered = fan_out([&a, &b], &ServerMessage::ProcessingStatus { enabled: true });
        assert_eq!(delivered, 2);

        let pa = rx_a.try_recv().unwrap();
        let pb = rx_b.try_recv().unwrap();
        assert!(Arc::ptr_eq(&pa, &pb));
        assert_eq!(&*pa, r#"{"type":"processing_status","enabled":true}"#);
    }
}
