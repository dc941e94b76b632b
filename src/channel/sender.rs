//! Controlling-side command sender
//!
//! Serializes messages onto the transport and notifies dispatch observers
//! (one-shot reward triggers arm themselves through this hook). The sender
//! is cheaply cloneable so several command handlers can share one
//! connection.

use parking_lot::Mutex;
use std::sync::Arc;

use crate::channel::{CommandMessage, MessageKind, Transport};
use crate::core::error::Result;

/// Notified after every successful send with the message kind.
pub trait DispatchObserver: Send + Sync {
    fn on_dispatch(&self, kind: MessageKind);
}

struct SenderInner {
    transport: Box<dyn Transport>,
    observers: Mutex<Vec<Arc<dyn DispatchObserver>>>,
}

/// Shared handle for replicating commands to the authoritative side.
#[derive(Clone)]
pub struct CommandSender {
    inner: Arc<SenderInner>,
}

impl CommandSender {
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self {
            inner: Arc::new(SenderInner {
                transport: Box::new(transport),
                observers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Serialize and hand the message to the transport. May block on
    /// transport backpressure; callers must not hold any aggregator-wide
    /// lock across this call.
    pub fn send(&self, message: &CommandMessage) -> Result<()> {
        let frame = message.encode()?;
        self.inner.transport.send(frame)?;

        let observers: Vec<Arc<dyn DispatchObserver>> =
            self.inner.observers.lock().iter().cloned().collect();
        for observer in observers {
            observer.on_dispatch(message.kind);
        }
        Ok(())
    }

    /// Attach a dispatch observer (e.g. a one-shot reward trigger).
    pub fn add_observer(&self, observer: Arc<dyn DispatchObserver>) {
        self.inner.observers.lock().push(observer);
    }

    /// Detach a previously attached observer. Safe to call twice.
    pub fn remove_observer(&self, observer: &Arc<dyn DispatchObserver>) {
        self.inner
            .observers
            .lock()
            .retain(|existing| !Arc::ptr_eq(existing, observer));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::loopback;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct KindCounter {
        kind: MessageKind,
        hits: AtomicU32,
    }

    impl DispatchObserver for KindCounter {
        fn on_dispatch(&self, kind: MessageKind) {
            if kind == self.kind {
                self.hits.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    #[test]
    fn test_observers_see_sent_kinds() {
        let (transport, receiver) = loopback(8);
        let sender = CommandSender::new(transport);
        let counter = Arc::new(KindCounter {
            kind: MessageKind::Craft,
            hits: AtomicU32::new(0),
        });
        sender.add_observer(counter.clone());

        sender
            .send(&CommandMessage::new(MessageKind::Move, "move", "1"))
            .unwrap();
        sender
            .send(&CommandMessage::new(MessageKind::Craft, "craft", "planks"))
            .unwrap();

        assert_eq!(counter.hits.load(Ordering::SeqCst), 1);
        assert_eq!(receiver.len(), 2);
    }
}
