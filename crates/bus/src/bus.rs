use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use rustc_hash::FxHashMap as HashMap;
use thiserror::Error;
use tracing::{trace, warn};

use crate::event::{BusEvent, EventName};

/// Failure reported by a handler. Aborts delivery to later handlers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{event} handler failed: {message}")]
pub struct HandlerFault {
	pub event: EventName,
	pub message: String,
}

impl HandlerFault {
	pub fn new(event: EventName, message: impl Into<String>) -> Self {
		Self {
			event,
			message: message.into(),
		}
	}
}

type Handler = Arc<dyn Fn(&BusEvent) -> Result<(), HandlerFault> + Send + Sync>;

#[derive(Default)]
struct Registry {
	next_id: u64,
	handlers: HashMap<EventName, Vec<(u64, Handler)>>,
}

/// Cloneable handle to one subscriber registry.
#[derive(Clone, Default)]
pub struct EventBus {
	inner: Arc<Mutex<Registry>>,
}

impl std::fmt::Debug for EventBus {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let registry = self.inner.lock();
		let total: usize = registry.handlers.values().map(Vec::len).sum();
		f.debug_struct("EventBus").field("handlers", &total).finish()
	}
}

impl EventBus {
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers `handler` for `name`, after any existing handlers.
	pub fn subscribe<F>(&self, name: EventName, handler: F) -> Subscription
	where
		F: Fn(&BusEvent) -> Result<(), HandlerFault> + Send + Sync + 'static,
	{
		let mut registry = self.inner.lock();
		registry.next_id += 1;
		let id = registry.next_id;
		registry
			.handlers
			.entry(name)
			.or_default()
			.push((id, Arc::new(handler)));
		trace!(event = %name, id, "bus.subscribe");
		Subscription {
			registry: Arc::downgrade(&self.inner),
			name,
			id,
		}
	}

	/// Delivers `event` to every handler subscribed at the time of the call.
	///
	/// Returns the number of handlers invoked. The first fault stops delivery
	/// and is returned to the publisher.
	pub fn publish(&self, event: &BusEvent) -> Result<usize, HandlerFault> {
		let name = event.name();
		let snapshot: Vec<Handler> = {
			let registry = self.inner.lock();
			registry
				.handlers
				.get(&name)
				.map(|hs| hs.iter().map(|(_, h)| Arc::clone(h)).collect())
				.unwrap_or_default()
		};

		for (delivered, handler) in snapshot.iter().enumerate() {
			if let Err(fault) = handler(event) {
				warn!(event = %name, delivered, error = %fault, "bus.publish.handler_fault");
				return Err(fault);
			}
		}
		trace!(event = %name, handlers = snapshot.len(), "bus.publish");
		Ok(snapshot.len())
	}

	pub fn subscriber_count(&self, name: EventName) -> usize {
		self.inner.lock().handlers.get(&name).map_or(0, Vec::len)
	}
}

/// Handle returned by [`EventBus::subscribe`].
///
/// Dropping the handle keeps the handler registered; call
/// [`Subscription::unsubscribe`] to remove it.
#[derive(Debug)]
pub struct Subscription {
	registry: Weak<Mutex<Registry>>,
	name: EventName,
	id: u64,
}

impl Subscription {
	pub fn event(&self) -> EventName {
		self.name
	}

	/// Removes the handler. Calling it again, or after the bus is gone, does
	/// nothing.
	pub fn unsubscribe(&self) {
		let Some(registry) = self.registry.upgrade() else {
			return;
		};
		let mut registry = registry.lock();
		if let Some(handlers) = registry.handlers.get_mut(&self.name) {
			let before = handlers.len();
			handlers.retain(|(id, _)| *id != self.id);
			if handlers.len() != before {
				trace!(event = %self.name, id = self.id, "bus.unsubscribe");
			}
		}
	}
}

/// Subscriptions owned by one surface, released together on unmount.
#[derive(Debug, Default)]
pub struct SubscriptionSet {
	subscriptions: Vec<Subscription>,
}

impl SubscriptionSet {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn push(&mut self, subscription: Subscription) {
		self.subscriptions.push(subscription);
	}

	pub fn len(&self) -> usize {
		self.subscriptions.len()
	}

	pub fn is_empty(&self) -> bool {
		self.subscriptions.is_empty()
	}

	pub fn release_all(&mut self) {
		for subscription in self.subscriptions.drain(..) {
			subscription.unsubscribe();
		}
	}
}
