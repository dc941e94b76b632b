//! Listener registry: authoritative-side fan-out per message kind
//!
//! Registration is explicit and idempotent: registering the same listener
//! cell twice for one kind collapses to the original token, so a message is
//! never delivered to one listener twice. Dispatch snapshots the listener
//! list before invoking anyone, which makes deregistration safe to call
//! concurrently with an in-flight message.

use ahash::AHashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use uuid::Uuid;

use crate::channel::{CommandMessage, MessageKind};
use crate::core::error::Result;
use crate::core::types::BodyId;

/// Applies one replicated command to authoritative state.
pub trait CommandListener: Send {
    /// `actor` is the authoritative-side actor the message concerns.
    fn on_message(&mut self, message: &CommandMessage, actor: &BodyId) -> Result<()>;
}

pub type SharedListener = Arc<Mutex<dyn CommandListener>>;

/// Token returned on registration; required for deregistration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(Uuid);

impl ListenerId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Kind-keyed listener lists for one authoritative participant.
pub struct ListenerRegistry {
    listeners: Mutex<AHashMap<MessageKind, Vec<(ListenerId, SharedListener)>>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(AHashMap::new()),
        }
    }

    /// Register a listener for a kind. Re-registering the same cell
    /// returns the original token instead of duplicating delivery.
    pub fn register(&self, kind: MessageKind, listener: SharedListener) -> ListenerId {
        let mut listeners = self.listeners.lock();
        let entries = listeners.entry(kind).or_default();
        for (existing_id, existing) in entries.iter() {
            if Arc::ptr_eq(existing, &listener) {
                return *existing_id;
            }
        }
        let id = ListenerId::new();
        entries.push((id, listener));
        id
    }

    /// Remove a listener by token. Returns false if already gone.
    pub fn deregister(&self, kind: MessageKind, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let Some(entries) = listeners.get_mut(&kind) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        entries.len() != before
    }

    pub fn listener_count(&self, kind: MessageKind) -> usize {
        self.listeners.lock().get(&kind).map_or(0, Vec::len)
    }

    /// Deliver one message to every listener registered for its kind.
    ///
    /// A failing listener is logged and isolated; the rest still run.
    /// The registry lock is released before any listener executes.
    pub fn dispatch(&self, message: &CommandMessage, actor: &BodyId) {
        let snapshot: Vec<SharedListener> = {
            let listeners = self.listeners.lock();
            listeners
                .get(&message.kind)
                .map(|entries| entries.iter().map(|(_, l)| l.clone()).collect())
                .unwrap_or_default()
        };

        if snapshot.is_empty() {
            tracing::debug!(kind = ?message.kind, "no listener registered; message dropped");
            return;
        }

        for listener in snapshot {
            if let Err(error) = listener.lock().on_message(message, actor) {
                tracing::warn!(
                    kind = ?message.kind,
                    verb = %message.verb,
                    "listener failed: {error}"
                );
            }
        }
    }
}

impl Default for ListenerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::TetherError;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingListener {
        deliveries: Arc<AtomicU32>,
        fail: bool,
    }

    impl CommandListener for CountingListener {
        fn on_message(&mut self, _message: &CommandMessage, _actor: &BodyId) -> Result<()> {
            self.deliveries.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(TetherError::Protocol("listener rejected message".into()));
            }
            Ok(())
        }
    }

    fn counting(fail: bool) -> (SharedListener, Arc<AtomicU32>) {
        let deliveries = Arc::new(AtomicU32::new(0));
        let listener: SharedListener = Arc::new(Mutex::new(CountingListener {
            deliveries: deliveries.clone(),
            fail,
        }));
        (listener, deliveries)
    }

    #[test]
    fn test_double_registration_collapses() {
        let registry = ListenerRegistry::new();
        let (listener, deliveries) = counting(false);

        let first = registry.register(MessageKind::Move, listener.clone());
        let second = registry.register(MessageKind::Move, listener);
        assert_eq!(first, second);
        assert_eq!(registry.listener_count(MessageKind::Move), 1);

        let message = CommandMessage::new(MessageKind::Move, "move", "1");
        registry.dispatch(&message, &BodyId::new("actor"));
        assert_eq!(deliveries.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failing_listener_does_not_halt_others() {
        let registry = ListenerRegistry::new();
        let (bad, _) = counting(true);
        let (good, good_deliveries) = counting(false);
        registry.register(MessageKind::Craft, bad);
        registry.register(MessageKind::Craft, good);

        let message = CommandMessage::new(MessageKind::Craft, "craft", "planks");
        registry.dispatch(&message, &BodyId::new("actor"));
        assert_eq!(good_deliveries.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_deregistered_listener_stops_receiving() {
        let registry = ListenerRegistry::new();
        let (listener, deliveries) = counting(false);
        let id = registry.register(MessageKind::Move, listener);

        assert!(registry.deregister(MessageKind::Move, id));
        assert!(!registry.deregister(MessageKind::Move, id));

        let message = CommandMessage::new(MessageKind::Move, "move", "1");
        registry.dispatch(&message, &BodyId::new("actor"));
        assert_eq!(deliveries.load(Ordering::SeqCst), 0);
    }
}
