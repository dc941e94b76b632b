//! Transport and the authoritative-side dispatch pump
//!
//! The in-process loopback transport is a bounded crossbeam channel: one
//! ordered stream per connection, blocking the sender when the receiver
//! falls behind. The pump runs on its own delivery thread, decoding frames
//! and fanning them out through the listener registry; a malformed frame is
//! fatal only to that frame.

use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::channel::{CommandMessage, ListenerRegistry};
use crate::core::error::{Result, TetherError};
use crate::core::types::BodyId;

/// A one-way, ordered byte-frame stream to the authoritative side.
pub trait Transport: Send + Sync {
    /// Queue one frame. Blocks on backpressure.
    fn send(&self, frame: Vec<u8>) -> Result<()>;
}

/// In-process transport half backed by a bounded channel.
pub struct LoopbackTransport {
    tx: Sender<Vec<u8>>,
}

impl Transport for LoopbackTransport {
    fn send(&self, frame: Vec<u8>) -> Result<()> {
        self.tx
            .send(frame)
            .map_err(|_| TetherError::Transport("receiving side disconnected".into()))
    }
}

/// Build a connected in-process transport pair.
pub fn loopback(capacity: usize) -> (LoopbackTransport, Receiver<Vec<u8>>) {
    let (tx, rx) = bounded(capacity);
    (LoopbackTransport { tx }, rx)
}

/// Delivery thread: frames in, listener dispatch out.
pub struct DispatchPump {
    handle: Option<JoinHandle<()>>,
}

impl DispatchPump {
    /// Spawn the delivery thread. `default_actor` is the authoritative
    /// actor messages concern when they carry no origin of their own.
    pub fn spawn(
        receiver: Receiver<Vec<u8>>,
        registry: Arc<ListenerRegistry>,
        default_actor: BodyId,
    ) -> Self {
        let handle = thread::Builder::new()
            .name("tether-dispatch".into())
            .spawn(move || {
                while let Ok(frame) = receiver.recv() {
                    match CommandMessage::decode(&frame) {
                        Ok(message) => {
                            let actor = message
                                .origin
                                .clone()
                                .unwrap_or_else(|| default_actor.clone());
                            registry.dispatch(&message, &actor);
                        }
                        Err(error) => {
                            tracing::warn!("dropping malformed frame: {error}");
                        }
                    }
                }
                tracing::debug!("dispatch pump shutting down");
            })
            .expect("spawning the dispatch thread cannot fail");
        Self {
            handle: Some(handle),
        }
    }

    /// Wait for the pump to drain; returns once every sender is dropped.
    pub fn join(mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for DispatchPump {
    fn drop(&mut self) {
        // The thread exits on its own once the transport closes; detach.
        let _ = self.handle.take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{CommandListener, MessageKind};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::{Duration, Instant};

    struct Recorder {
        seen: Arc<AtomicU32>,
    }

    impl CommandListener for Recorder {
        fn on_message(&mut self, _message: &CommandMessage, _actor: &BodyId) -> Result<()> {
            self.seen.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_pump_survives_malformed_frames() {
        let registry = Arc::new(ListenerRegistry::new());
        let seen = Arc::new(AtomicU32::new(0));
        registry.register(
            MessageKind::Move,
            Arc::new(Mutex::new(Recorder { seen: seen.clone() })),
        );

        let (transport, receiver) = loopback(8);
        let pump = DispatchPump::spawn(receiver, registry, BodyId::new("actor"));

        transport.send(b"garbage".to_vec()).unwrap();
        let good = CommandMessage::new(MessageKind::Move, "move", "1");
        transport.send(good.encode().unwrap()).unwrap();

        drop(transport);
        pump.join();
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_frames_apply_in_send_order() {
        struct OrderRecorder {
            values: Arc<Mutex<Vec<String>>>,
        }
        impl CommandListener for OrderRecorder {
            fn on_message(&mut self, message: &CommandMessage, _actor: &BodyId) -> Result<()> {
                self.values.lock().push(message.value.clone());
                Ok(())
            }
        }

        let registry = Arc::new(ListenerRegistry::new());
        let values = Arc::new(Mutex::new(Vec::new()));
        registry.register(
            MessageKind::Move,
            Arc::new(Mutex::new(OrderRecorder {
                values: values.clone(),
            })),
        );

        let (transport, receiver) = loopback(8);
        let pump = DispatchPump::spawn(receiver, registry, BodyId::new("actor"));
        for value in ["1", "0.5", "-1"] {
            let message = CommandMessage::new(MessageKind::Move, "move", value);
            transport.send(message.encode().unwrap()).unwrap();
        }
        drop(transport);

        let deadline = Instant::now() + Duration::from_secs(2);
        while values.lock().len() < 3 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        pump.join();
        assert_eq!(*values.lock(), vec!["1", "0.5", "-1"]);
    }
}
