//! # Message Channel
//!
//! Typed envelope contract and subscriber fan-out layered over the
//! connection manager.

pub mod envelope;
pub mod message_channel;
pub mod registry;

pub use envelope::Envelope;
pub use message_channel::{MessageChannel, WeakMessageChannel};
pub use registry::{Subscriber, SubscriberRegistry, SubscriptionId};
