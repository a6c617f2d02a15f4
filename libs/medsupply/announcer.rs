//! Session announcements
//!
//! The dashboard introduces itself on every connect, and asks for the
//! authoritative order list when it holds a session token, so a reconnected
//! feed is re-hydrated even when the drop was brief.

use crate::messages::{GetOrders, Greeting, OutboundCommand};
use crate::model::Viewer;
use livesocket::{Envelope, MessageChannel, Subscriber, WeakMessageChannel};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

/// Commands sent at the start of every connection
#[derive(Debug, Clone, PartialEq)]
pub struct Announcement {
    pub greeting: Greeting,
    pub get_orders: Option<GetOrders>,
}

impl Announcement {
    pub fn new(viewer: &Viewer, session_token: Option<String>) -> Self {
        Self {
            greeting: Greeting::new(format!("live feed for {} {}", viewer.role, viewer.id)),
            get_orders: session_token.map(|token| GetOrders { token }),
        }
    }

    /// Envelopes in send order, each stamped now
    ///
    /// A command that fails to encode is logged and left out.
    pub fn envelopes(&self) -> Vec<Envelope> {
        let mut commands = vec![self.greeting.to_envelope()];
        if let Some(get_orders) = &self.get_orders {
            commands.push(get_orders.to_envelope());
        }

        commands
            .into_iter()
            .filter_map(|command| match command {
                Ok(envelope) => Some(envelope),
                Err(e) => {
                    warn!("[Announcer] Could not build command: {}", e);
                    None
                }
            })
            .collect()
    }
}

/// Subscriber that sends the [`Announcement`] from `on_connect`
pub struct SessionAnnouncer {
    channel: WeakMessageChannel,
    announcement: Announcement,
    connects: AtomicU64,
}

impl SessionAnnouncer {
    pub fn new(channel: &MessageChannel, announcement: Announcement) -> Self {
        Self {
            channel: channel.downgrade(),
            announcement,
            connects: AtomicU64::new(0),
        }
    }

    /// Connections announced so far
    pub fn connects(&self) -> u64 {
        self.connects.load(Ordering::Relaxed)
    }
}

impl Subscriber for SessionAnnouncer {
    fn on_connect(&self) {
        let Some(channel) = self.channel.upgrade() else {
            debug!("[Announcer] Channel already dropped, nothing to announce");
            return;
        };

        self.connects.fetch_add(1, Ordering::Relaxed);
        for envelope in self.announcement.envelopes() {
            if channel.send(&envelope) {
                info!("[Announcer] Sent '{}'", envelope.kind());
            }
        }
    }
}
