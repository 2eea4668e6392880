use std::sync::atomic::{AtomicU64, Ordering};

use foldhash::fast::RandomState;
use tokio::sync::oneshot;

use crate::{msg::Message, receiver::Receiver};

/// Correlates in-flight requests with the responses that answer them.
///
/// Each pending call holds a message id and a oneshot channel; the
/// connection's read loop posts every received response to the waiter,
/// which routes it to the matching caller.
#[derive(Default)]
pub(crate) struct Waiter {
    index: AtomicU64,
    id_map: dashmap::DashMap<u64, oneshot::Sender<Message>, RandomState>,
}

/// Removes the waiter entry when a pending call is dropped or fails, so
/// abandoned calls do not leak map entries.
pub(crate) struct WaiterCleaner<'a> {
    waiter: &'a Waiter,
    msgid: u64,
}

impl Drop for WaiterCleaner<'_> {
    fn drop(&mut self) {
        self.waiter.remove(self.msgid);
    }
}

impl Waiter {
    /// Allocates a fresh message id and a receiver for its response. The
    /// receiver cleans up the entry when dropped.
    pub fn alloc(&self) -> (u64, Receiver<'_>) {
        let msgid = self.index.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.id_map.insert(msgid, tx);
        (
            msgid,
            Receiver::new(
                rx,
                WaiterCleaner {
                    waiter: self,
                    msgid,
                },
            ),
        )
    }

    /// Routes a response to the caller waiting on its message id.
    pub fn post(&self, msgid: u64, msg: Message) {
        if let Some((_, tx)) = self.id_map.remove(&msgid) {
            let _ = tx.send(msg);
        } else {
            tracing::warn!("no caller waiting for msgid {msgid}");
        }
    }

    fn remove(&self, msgid: u64) {
        self.id_map.remove(&msgid);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_waiter() {
        let waiter = Arc::new(Waiter::default());

        let (msgid, rx) = waiter.alloc();
        assert_eq!(msgid, 0);

        let handle = {
            let waiter = Arc::clone(&waiter);
            tokio::spawn(async move {
                tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
                let mut msg = Message::default();
                msg.meta.method = "dummy".into();
                waiter.post(msgid, msg);
            })
        };

        let msg = rx.recv().await.unwrap();
        assert_eq!(msg.meta.method, "dummy");
        handle.await.unwrap();

        // dropping the receiver removes the pending entry
        let (msgid, rx) = waiter.alloc();
        drop(rx);
        assert!(waiter.id_map.get(&msgid).is_none());
    }
}
