//! Subscriber registrations and fan-out
//!
//! # Architecture
//!
//! ```text
//! Session task → on_frame → Envelope::from_frame → snapshot → Sub A (in order)
//!                                                        ├──→ Sub B
//!                                                        └──→ Sub C
//! ```
//!
//! Each registration carries its own liveness lock. Dispatch holds it while
//! calling into the subscriber and `unsubscribe` takes it before returning,
//! so once `unsubscribe` returns that subscriber sees no further callbacks.
//! The lock is re-entrant: a subscriber may unsubscribe itself from inside
//! its own callback.

use super::envelope::Envelope;
use crate::manager::ConnectionListener;
use crate::traits::{Frame, LiveSocketError};
use parking_lot::{ReentrantMutex, RwLock};
use std::cell::Cell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Token returned by `subscribe`, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Callback bindings of one consumer
///
/// All methods default to no-ops. Callbacks run on the session task, one at
/// a time, in transport arrival order.
pub trait Subscriber: Send + Sync + 'static {
    fn on_connect(&self) {}

    fn on_disconnect(&self, _reason: &str) {}

    fn on_error(&self, _error: &LiveSocketError) {}

    fn on_message(&self, _envelope: &Envelope) {}
}

struct Registration {
    id: SubscriptionId,
    subscriber: Arc<dyn Subscriber>,
    live: ReentrantMutex<Cell<bool>>,
}

/// Ordered collection of subscriber registrations
///
/// Registered with the connection manager as its listener; every event is
/// delivered to every live registration exactly once, in registration order.
pub struct SubscriberRegistry {
    next_id: AtomicU64,
    registrations: RwLock<Vec<Arc<Registration>>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            registrations: RwLock::new(Vec::new()),
        }
    }

    pub fn subscribe(&self, subscriber: Arc<dyn Subscriber>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.registrations.write().push(Arc::new(Registration {
            id,
            subscriber,
            live: ReentrantMutex::new(Cell::new(true)),
        }));
        debug!("Registered subscriber {}", id);
        id
    }

    /// Remove a registration
    ///
    /// Blocks until an in-flight callback on another thread for this
    /// registration has returned. Returns false for an unknown id.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = {
            let mut registrations = self.registrations.write();
            registrations
                .iter()
                .position(|r| r.id == id)
                .map(|index| registrations.remove(index))
        };

        match removed {
            Some(registration) => {
                registration.live.lock().set(false);
                debug!("Unregistered subscriber {}", id);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.registrations.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.read().is_empty()
    }

    fn dispatch(&self, deliver: impl Fn(&dyn Subscriber)) {
        let snapshot: Vec<Arc<Registration>> = self.registrations.read().clone();

        for registration in snapshot {
            let live = registration.live.lock();
            if live.get() {
                deliver(registration.subscriber.as_ref());
            }
        }
    }
}

impl Default for SubscriberRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionListener for SubscriberRegistry {
    fn on_connect(&self) {
        self.dispatch(|s| s.on_connect());
    }

    fn on_disconnect(&self, reason: &str) {
        self.dispatch(|s| s.on_disconnect(reason));
    }

    fn on_error(&self, error: &LiveSocketError) {
        self.dispatch(|s| s.on_error(error));
    }

    fn on_frame(&self, frame: Frame) {
        match Envelope::from_frame(&frame) {
            Ok(envelope) => {
                debug!("Dispatching '{}' to {} subscribers", envelope.kind(), self.len());
                self.dispatch(|s| s.on_message(&envelope));
            }
            Err(e) => {
                warn!("Dropping inbound frame ({} bytes): {}", frame.len(), e);
            }
        }
    }
}
