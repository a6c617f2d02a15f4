use super::envelope::Envelope;
use super::registry::{Subscriber, SubscriberRegistry, SubscriptionId};
use crate::builder::ConnectionManagerBuilder;
use crate::connection_state::ConnectionState;
use crate::manager::{ConnectionListener, ConnectionManager, Metrics};
use crate::traits::{LiveSocketError, Result};
use std::sync::{Arc, Weak};
use tracing::{debug, warn};

struct ChannelInner {
    manager: ConnectionManager,
    registry: Arc<SubscriberRegistry>,
}

/// Typed send/receive contract over one shared connection
///
/// Construct once at startup and hand clones to every consumer: clones share
/// the same connection manager and the same registrations.
#[derive(Clone)]
pub struct MessageChannel {
    inner: Arc<ChannelInner>,
}

impl MessageChannel {
    /// Create a channel whose connection manager is configured by `builder`
    pub fn new(builder: ConnectionManagerBuilder) -> Result<Self> {
        let registry = Arc::new(SubscriberRegistry::new());
        let listener: Arc<dyn ConnectionListener> = registry.clone();
        let manager = builder.build(listener)?;

        Ok(Self {
            inner: Arc::new(ChannelInner { manager, registry }),
        })
    }

    /// Channel with the default reconnection policy and no heartbeat
    pub fn with_defaults() -> Result<Self> {
        Self::new(ConnectionManagerBuilder::new())
    }

    /// Start the shared session unless it is already up
    pub fn connect(&self, url: &str) -> Result<()> {
        self.inner.manager.connect(url)
    }

    pub fn disconnect(&self) {
        self.inner.manager.disconnect();
    }

    /// Disconnect only when no subscriber remains
    ///
    /// Returns true if the session was closed.
    pub fn release(&self) -> bool {
        if self.inner.registry.is_empty() {
            self.inner.manager.disconnect();
            true
        } else {
            debug!(
                "Keeping session open for {} remaining subscribers",
                self.inner.registry.len()
            );
            false
        }
    }

    /// Fire-and-forget send
    ///
    /// Transmits the envelope unchanged when connected. Otherwise the
    /// envelope is dropped with a warning; nothing is queued or retried.
    /// Returns whether the envelope was handed to the transport.
    pub fn send(&self, envelope: &Envelope) -> bool {
        let frame = match envelope.to_frame() {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Dropping '{}' envelope, encode failed: {}", envelope.kind(), e);
                return false;
            }
        };

        match self.inner.manager.send(frame) {
            Ok(()) => {
                debug!("Sent '{}' envelope", envelope.kind());
                true
            }
            Err(LiveSocketError::NotConnected) => {
                warn!("Not connected, dropping '{}' envelope", envelope.kind());
                false
            }
            Err(e) => {
                warn!("Dropping '{}' envelope: {}", envelope.kind(), e);
                false
            }
        }
    }

    pub fn subscribe(&self, subscriber: Arc<dyn Subscriber>) -> SubscriptionId {
        self.inner.registry.subscribe(subscriber)
    }

    /// After this returns, the registration receives no further callbacks
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.registry.unsubscribe(id)
    }

    #[inline]
    pub fn is_connected(&self) -> bool {
        self.inner.manager.is_connected()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.inner.manager.connection_state()
    }

    pub fn last_error(&self) -> Option<LiveSocketError> {
        self.inner.manager.last_error()
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.registry.len()
    }

    pub fn url(&self) -> Option<String> {
        self.inner.manager.url()
    }

    pub fn metrics(&self) -> Metrics {
        self.inner.manager.metrics()
    }

    /// True when both handles point at the same shared channel
    pub fn same_channel(&self, other: &MessageChannel) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn downgrade(&self) -> WeakMessageChannel {
        WeakMessageChannel {
            inner: Arc::downgrade(&self.inner),
        }
    }
}

/// Non-owning handle on a [`MessageChannel`]
///
/// Held by subscribers that send from their own callbacks, since the channel
/// owns its subscribers.
#[derive(Clone)]
pub struct WeakMessageChannel {
    inner: Weak<ChannelInner>,
}

impl WeakMessageChannel {
    /// `None` once every `MessageChannel` handle is gone
    pub fn upgrade(&self) -> Option<MessageChannel> {
        self.inner.upgrade().map(|inner| MessageChannel { inner })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    #[tokio::test]
    async fn test_send_while_disconnected_drops_without_error() {
        let channel = MessageChannel::with_defaults().unwrap();
        let envelope = Envelope::new("greeting", Map::new()).unwrap();

        assert!(!channel.send(&envelope));
        assert_eq!(channel.metrics().messages_sent, 0);
        assert_eq!(channel.metrics().dropped_sends, 1);
    }

    #[tokio::test]
    async fn test_clones_share_registrations() {
        struct Noop;
        impl Subscriber for Noop {}

        let channel = MessageChannel::with_defaults().unwrap();
        let other = channel.clone();
        let id = other.subscribe(Arc::new(Noop));

        assert!(channel.same_channel(&other));
        assert_eq!(channel.subscriber_count(), 1);
        assert!(!channel.release());
        assert!(channel.unsubscribe(id));
        assert!(channel.release());
    }

    #[tokio::test]
    async fn test_weak_handle_does_not_keep_channel_alive() {
        let channel = MessageChannel::with_defaults().unwrap();
        let weak = channel.downgrade();

        let upgraded = weak.upgrade().unwrap();
        assert!(upgraded.same_channel(&channel));
        drop(upgraded);

        drop(channel);
        assert!(weak.upgrade().is_none());
    }
}
