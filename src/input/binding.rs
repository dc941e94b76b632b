//! Override-controlled input binding
//!
//! One logical control (a key, button, or channel) that an external
//! controller can drive instead of the default input device. While owned,
//! queries answer from the override state; while disowned, they answer from
//! the mirrored default-device state. "Just activated" is edge-triggered:
//! at most one activation is reported per press, consumed on read.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

/// Receives every edge that originates from the default input device.
///
/// Used to mirror raw input into an observation stream. Edges driven by
/// the override path are never forwarded here; forwarding them would feed
/// controller-issued input back to the controller.
pub trait EdgeObserver: Send {
    fn on_edge(&mut self, down: bool);
}

/// A single overridable control channel.
///
/// The pending-edge counter saturates at 1 and is consumed with an atomic
/// read-and-decrement, so concurrent readers cannot double-report one
/// press.
pub struct OverrideBinding {
    overriding: AtomicBool,
    down: AtomicBool,
    pending: AtomicU8,
    default_down: AtomicBool,
    default_pending: AtomicU8,
    observer: Mutex<Option<Box<dyn EdgeObserver>>>,
}

impl OverrideBinding {
    pub fn new() -> Self {
        Self {
            overriding: AtomicBool::new(false),
            down: AtomicBool::new(false),
            pending: AtomicU8::new(0),
            default_down: AtomicBool::new(false),
            default_pending: AtomicU8::new(0),
            observer: Mutex::new(None),
        }
    }

    /// Attach the observer that mirrors default-device edges.
    pub fn set_observer(&self, observer: Box<dyn EdgeObserver>) {
        *self.observer.lock() = Some(observer);
    }

    /// Transfer or revoke external ownership of this control.
    ///
    /// Any transition into the disowned state resets the override state:
    /// the control reads as released on the next arbitration.
    pub fn set_overriding(&self, overriding: bool) {
        self.overriding.store(overriding, Ordering::SeqCst);
        if !overriding {
            self.down.store(false, Ordering::SeqCst);
            self.pending.store(0, Ordering::SeqCst);
        }
    }

    pub fn is_overriding(&self) -> bool {
        self.overriding.load(Ordering::SeqCst)
    }

    /// Override-path press. Repeated presses before a read saturate the
    /// pending edge at one activation.
    pub fn press(&self) {
        self.down.store(true, Ordering::SeqCst);
        self.pending.store(1, Ordering::SeqCst);
    }

    /// Override-path release.
    pub fn release(&self) {
        self.down.store(false, Ordering::SeqCst);
        self.pending.store(0, Ordering::SeqCst);
    }

    /// An edge arriving from the default input device.
    pub fn feed_default(&self, down: bool) {
        self.default_down.store(down, Ordering::SeqCst);
        if down {
            self.default_pending.store(1, Ordering::SeqCst);
        } else {
            self.default_pending.store(0, Ordering::SeqCst);
        }
        if let Some(observer) = self.observer.lock().as_mut() {
            observer.on_edge(down);
        }
    }

    /// Is the control held right now, per whichever side owns it.
    pub fn query_held(&self) -> bool {
        if self.is_overriding() {
            self.down.load(Ordering::SeqCst)
        } else {
            self.default_down.load(Ordering::SeqCst)
        }
    }

    /// Was the control activated since the last check. Consumes the edge.
    pub fn query_just_activated(&self) -> bool {
        let counter = if self.is_overriding() {
            &self.pending
        } else {
            &self.default_pending
        };
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |pending| {
                if pending > 0 {
                    Some(pending - 1)
                } else {
                    None
                }
            })
            .is_ok()
    }
}

impl Default for OverrideBinding {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::sync::Arc;

    struct CountingObserver {
        edges: Arc<AtomicU32>,
    }

    impl EdgeObserver for CountingObserver {
        fn on_edge(&mut self, _down: bool) {
            self.edges.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_press_saturates_at_one_activation() {
        let binding = OverrideBinding::new();
        binding.set_overriding(true);

        binding.press();
        binding.press();
        binding.press();

        assert!(binding.query_just_activated());
        assert!(!binding.query_just_activated());
    }

    #[test]
    fn test_disowning_resets_state() {
        let binding = OverrideBinding::new();
        binding.set_overriding(true);
        binding.press();
        assert!(binding.query_held());

        binding.set_overriding(false);
        binding.set_overriding(true);

        assert!(!binding.query_held());
        assert!(!binding.query_just_activated());
    }

    #[test]
    fn test_disowned_queries_delegate_to_default_source() {
        let binding = OverrideBinding::new();
        binding.feed_default(true);

        assert!(binding.query_held());
        assert!(binding.query_just_activated());
        assert!(!binding.query_just_activated());

        // Owned queries ignore the default device entirely.
        binding.set_overriding(true);
        assert!(!binding.query_held());
    }

    #[test]
    fn test_observer_sees_only_default_edges() {
        let edges = Arc::new(AtomicU32::new(0));
        let binding = OverrideBinding::new();
        binding.set_observer(Box::new(CountingObserver {
            edges: edges.clone(),
        }));

        binding.set_overriding(true);
        binding.press();
        binding.release();
        assert_eq!(edges.load(Ordering::SeqCst), 0);

        binding.feed_default(true);
        binding.feed_default(false);
        assert_eq!(edges.load(Ordering::SeqCst), 2);
    }
}
