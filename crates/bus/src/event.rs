use std::fmt;

/// Identity of a mounted surface, used to tag the origin of cart events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(pub u64);

impl fmt::Display for SurfaceId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "surface-{}", self.0)
	}
}

/// Key under which handlers subscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventName {
	CartUpdate,
	QuantityUpdate,
	VariantChange,
	CartRefresh,
}

impl EventName {
	pub const ALL: [EventName; 4] = [
		EventName::CartUpdate,
		EventName::QuantityUpdate,
		EventName::VariantChange,
		EventName::CartRefresh,
	];

	pub fn as_str(self) -> &'static str {
		match self {
			EventName::CartUpdate => "cart-update",
			EventName::QuantityUpdate => "quantity-update",
			EventName::VariantChange => "variant-change",
			EventName::CartRefresh => "cart-refresh",
		}
	}

	pub fn from_name(name: &str) -> Option<Self> {
		Self::ALL.into_iter().find(|e| e.as_str() == name)
	}
}

impl fmt::Display for EventName {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// An event and its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusEvent {
	/// Server cart state changed; `source` originated the mutation.
	CartUpdate { source: SurfaceId },
	/// Quantity bounds were recomputed somewhere. Broadcast only.
	QuantityUpdate,
	/// A picker resolved a new variant and fetched its section markup.
	VariantChange { section_id: String, html: String },
	/// A mutation settled; secondary surfaces should re-fetch themselves.
	CartRefresh { source: SurfaceId },
}

impl BusEvent {
	pub fn name(&self) -> EventName {
		match self {
			BusEvent::CartUpdate { .. } => EventName::CartUpdate,
			BusEvent::QuantityUpdate => EventName::QuantityUpdate,
			BusEvent::VariantChange { .. } => EventName::VariantChange,
			BusEvent::CartRefresh { .. } => EventName::CartRefresh,
		}
	}

	/// Originating surface, for events that carry one.
	pub fn source(&self) -> Option<SurfaceId> {
		match self {
			BusEvent::CartUpdate { source } | BusEvent::CartRefresh { source } => Some(*source),
			_ => None,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_event_names_round_trip() {
		for name in EventName::ALL {
			assert_eq!(EventName::from_name(name.as_str()), Some(name));
		}
		assert_eq!(EventName::from_name("cart-clear"), None);
	}

	#[test]
	fn test_source_only_on_cart_events() {
		let source = SurfaceId(7);
		assert_eq!(BusEvent::CartUpdate { source }.source(), Some(source));
		assert_eq!(BusEvent::QuantityUpdate.source(), None);
	}
}
