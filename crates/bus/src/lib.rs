//! Synchronous publish/subscribe bus for cart surfaces.
//!
//! Surfaces never hold references to each other. They talk through an
//! [`EventBus`] handle that the composition root constructs and clones into
//! each surface on mount.
//!
//! Delivery is synchronous and in subscription order. The handler list is
//! snapshotted before delivery, so handlers may subscribe, unsubscribe or
//! publish while an event is being delivered.

/// The bus, subscriptions and subscription sets.
pub mod bus;
/// Event names and payloads.
pub mod event;

pub use bus::{EventBus, HandlerFault, Subscription, SubscriptionSet};
pub use event::{BusEvent, EventName, SurfaceId};
