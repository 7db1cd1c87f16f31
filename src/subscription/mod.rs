//! Subscription fan-out and the consumer-side stream type.

pub mod hub;
pub mod stream;

pub use hub::{SubscriptionHandle, SubscriptionHub};
pub use stream::ResponseSubscription;
