//! # Subscription Adapter
//!
//! Binds one consumer to the shared [`MessageChannel`] for the consumer's
//! lifetime. The adapter mirrors channel events into readable state
//! (`is_connected`, `last_message`, `error`), keeps a small ring of recent
//! envelopes, and forwards every event to an optional consumer inside the
//! same dispatch cycle.
//!
//! ```rust,ignore
//! let mut adapter = SubscriptionAdapter::new(channel.clone())
//!     .with_consumer(reconciler)
//!     .with_inbox_capacity(64);
//! adapter.connect("ws://localhost:4000/live")?;
//! // ...
//! adapter.close(); // unsubscribe, then release the session
//! ```

use crate::channel::{Envelope, MessageChannel, Subscriber, SubscriptionId};
use crate::traits::{LiveSocketError, Result};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Default number of recent envelopes kept per adapter
pub const DEFAULT_INBOX_CAPACITY: usize = 32;

/// Bounded ring of recent envelopes; the oldest is evicted when full
struct Inbox {
    tx: Sender<Envelope>,
    rx: Receiver<Envelope>,
}

impl Inbox {
    fn new(capacity: usize) -> Option<Self> {
        if capacity == 0 {
            return None;
        }
        let (tx, rx) = bounded(capacity);
        Some(Self { tx, rx })
    }

    fn push(&self, envelope: Envelope) {
        if let Err(TrySendError::Full(envelope)) = self.tx.try_send(envelope) {
            let _ = self.rx.try_recv();
            let _ = self.tx.try_send(envelope);
        }
    }
}

/// Adapter-side mirror of the channel, registered as the subscriber
struct AdapterState {
    connected: AtomicBool,
    last_message: RwLock<Option<Envelope>>,
    error: RwLock<Option<LiveSocketError>>,
    inbox: Option<Inbox>,
    consumer: Option<Arc<dyn Subscriber>>,
}

impl AdapterState {
    fn new(capacity: usize, consumer: Option<Arc<dyn Subscriber>>) -> Self {
        Self {
            connected: AtomicBool::new(false),
            last_message: RwLock::new(None),
            error: RwLock::new(None),
            inbox: Inbox::new(capacity),
            consumer,
        }
    }
}

impl Subscriber for AdapterState {
    fn on_connect(&self) {
        self.connected.store(true, Ordering::Release);
        *self.error.write() = None;
        if let Some(consumer) = &self.consumer {
            consumer.on_connect();
        }
    }

    fn on_disconnect(&self, reason: &str) {
        self.connected.store(false, Ordering::Release);
        if let Some(consumer) = &self.consumer {
            consumer.on_disconnect(reason);
        }
    }

    fn on_error(&self, error: &LiveSocketError) {
        self.connected.store(false, Ordering::Release);
        *self.error.write() = Some(error.clone());
        if let Some(consumer) = &self.consumer {
            consumer.on_error(error);
        }
    }

    fn on_message(&self, envelope: &Envelope) {
        *self.last_message.write() = Some(envelope.clone());
        if let Some(inbox) = &self.inbox {
            inbox.push(envelope.clone());
        }
        if let Some(consumer) = &self.consumer {
            consumer.on_message(envelope);
        }
    }
}

/// Per-consumer view of the shared channel
///
/// Every successful subscribe is matched by an unsubscribe: on `close`, on
/// a failed `connect`, and on drop. After unsubscribing, the adapter
/// releases the session, which closes it once no other subscriber remains.
pub struct SubscriptionAdapter {
    channel: MessageChannel,
    state: Arc<AdapterState>,
    inbox_capacity: usize,
    consumer: Option<Arc<dyn Subscriber>>,
    subscription: Option<SubscriptionId>,
}

impl SubscriptionAdapter {
    pub fn new(channel: MessageChannel) -> Self {
        Self {
            channel,
            state: Arc::new(AdapterState::new(DEFAULT_INBOX_CAPACITY, None)),
            inbox_capacity: DEFAULT_INBOX_CAPACITY,
            consumer: None,
            subscription: None,
        }
    }

    /// Forward every event to `consumer` after the adapter state is updated
    ///
    /// Takes effect on the next `connect`.
    pub fn with_consumer(mut self, consumer: Arc<dyn Subscriber>) -> Self {
        self.consumer = Some(consumer);
        self.rebuild_state();
        self
    }

    /// Ring size for [`drain_inbox`](Self::drain_inbox); 0 disables the ring
    pub fn with_inbox_capacity(mut self, capacity: usize) -> Self {
        self.inbox_capacity = capacity;
        self.rebuild_state();
        self
    }

    fn rebuild_state(&mut self) {
        if self.subscription.is_none() {
            self.state = Arc::new(AdapterState::new(self.inbox_capacity, self.consumer.clone()));
        }
    }

    /// Subscribe (once) and ask the channel to connect to `endpoint`
    pub fn connect(&mut self, endpoint: &str) -> Result<()> {
        if self.subscription.is_none() {
            let subscriber: Arc<dyn Subscriber> = self.state.clone();
            let id = self.channel.subscribe(subscriber);
            self.subscription = Some(id);
            self.state
                .connected
                .store(self.channel.is_connected(), Ordering::Release);
            debug!("Adapter subscribed as {}", id);
        }

        if let Err(e) = self.channel.connect(endpoint) {
            self.teardown();
            return Err(e);
        }

        Ok(())
    }

    pub fn send_message(&self, envelope: &Envelope) -> bool {
        self.channel.send(envelope)
    }

    #[inline]
    pub fn is_connected(&self) -> bool {
        self.state.connected.load(Ordering::Acquire)
    }

    /// Most recent inbound envelope
    pub fn last_message(&self) -> Option<Envelope> {
        self.state.last_message.read().clone()
    }

    /// Most recent error, cleared on reconnect
    pub fn error(&self) -> Option<LiveSocketError> {
        self.state.error.read().clone()
    }

    /// Take every envelope currently held in the ring, oldest first
    pub fn drain_inbox(&self) -> Vec<Envelope> {
        match &self.state.inbox {
            Some(inbox) => inbox.rx.try_iter().collect(),
            None => Vec::new(),
        }
    }

    pub fn subscription_id(&self) -> Option<SubscriptionId> {
        self.subscription
    }

    pub fn channel(&self) -> &MessageChannel {
        &self.channel
    }

    /// Unsubscribe and release the session
    pub fn close(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        if let Some(id) = self.subscription.take() {
            self.channel.unsubscribe(id);
            self.state.connected.store(false, Ordering::Release);
            if self.channel.release() {
                debug!("Adapter {} was the last subscriber, session closed", id);
            }
        }
    }
}

impl Drop for SubscriptionAdapter {
    fn drop(&mut self) {
        self.teardown();
    }
}
