use std::collections::BTreeMap;

use cartsync_bus::{BusEvent, EventBus, EventName, HandlerFault, SubscriptionSet, SurfaceId};
use tokio::sync::mpsc;
use tracing::debug;

use super::{CartDrawer, CartList, CartSurface, SurfaceCommand, SurfaceKind};
use crate::bundle::BundlePicker;
use crate::product::ProductForm;
use crate::quantity::QuantityRules;
use crate::variant::VariantPicker;

/// A mounted component.
#[derive(Debug)]
pub enum Surface {
	CartList(CartList),
	CartDrawer(CartDrawer),
	ProductForm(ProductForm),
	VariantPicker(VariantPicker),
	QuantityRules(QuantityRules),
	BundlePicker(BundlePicker),
}

impl Surface {
	pub fn kind(&self) -> SurfaceKind {
		match self {
			Surface::CartList(_) => SurfaceKind::CartList,
			Surface::CartDrawer(_) => SurfaceKind::CartDrawer,
			Surface::ProductForm(_) => SurfaceKind::ProductForm,
			Surface::VariantPicker(_) => SurfaceKind::VariantPicker,
			Surface::QuantityRules(_) => SurfaceKind::QuantityRules,
			Surface::BundlePicker(_) => SurfaceKind::BundlePicker,
		}
	}

	pub fn as_cart(&self) -> Option<&dyn CartSurface> {
		match self {
			Surface::CartList(list) => Some(list),
			Surface::CartDrawer(drawer) => Some(drawer),
			_ => None,
		}
	}

	/// Whether the surface sends cart mutations through the coordinator.
	pub fn mutates_cart(&self) -> bool {
		matches!(self, Surface::CartList(_) | Surface::CartDrawer(_) | Surface::ProductForm(_))
	}
}

struct Mounted {
	surface: Surface,
	subscriptions: SubscriptionSet,
}

/// Mounted surfaces and their bus subscriptions.
///
/// Handlers only enqueue [`SurfaceCommand`]s; they never reach into another
/// surface or the document.
pub struct SurfaceRegistry {
	bus: EventBus,
	commands: mpsc::UnboundedSender<SurfaceCommand>,
	next_id: u64,
	mounted: BTreeMap<SurfaceId, Mounted>,
}

impl std::fmt::Debug for SurfaceRegistry {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SurfaceRegistry")
			.field("mounted", &self.mounted.len())
			.finish()
	}
}

fn enqueue(
	commands: &mpsc::UnboundedSender<SurfaceCommand>,
	event: EventName,
	command: SurfaceCommand,
) -> Result<(), HandlerFault> {
	commands
		.send(command)
		.map_err(|_| HandlerFault::new(event, "engine command queue closed"))
}

impl SurfaceRegistry {
	pub fn new(bus: EventBus, commands: mpsc::UnboundedSender<SurfaceCommand>) -> Self {
		Self {
			bus,
			commands,
			next_id: 0,
			mounted: BTreeMap::new(),
		}
	}

	/// Mounts `surface` and subscribes its handlers.
	pub fn mount(&mut self, surface: Surface) -> SurfaceId {
		self.next_id += 1;
		let id = SurfaceId(self.next_id);
		let subscriptions = self.subscribe(id, &surface);
		debug!(surface = %id, kind = %surface.kind(), handlers = subscriptions.len(), "surface.mount");
		self.mounted.insert(id, Mounted { surface, subscriptions });
		id
	}

	fn subscribe(&self, id: SurfaceId, surface: &Surface) -> SubscriptionSet {
		let mut set = SubscriptionSet::new();
		match surface {
			Surface::CartList(_) | Surface::CartDrawer(_) => {
				let Some(cart) = surface.as_cart() else {
					return set;
				};
				let trigger = cart.refresh_trigger();
				let tx = self.commands.clone();
				set.push(self.bus.subscribe(trigger, move |event| {
					if event.source() == Some(id) {
						return Ok(());
					}
					enqueue(&tx, trigger, SurfaceCommand::Refresh { surface: id })
				}));
			}
			Surface::QuantityRules(rules) => {
				if rules.follows_cart() {
					let tx = self.commands.clone();
					set.push(self.bus.subscribe(EventName::CartUpdate, move |_| {
						enqueue(&tx, EventName::CartUpdate, SurfaceCommand::RefreshQuantityRules { surface: id })
					}));
				}

				let tx = self.commands.clone();
				let section = rules.variant_section().to_string();
				set.push(self.bus.subscribe(EventName::VariantChange, move |event| {
					let BusEvent::VariantChange { section_id, html } = event else {
						return Ok(());
					};
					if *section_id != section {
						return Ok(());
					}
					enqueue(
						&tx,
						EventName::VariantChange,
						SurfaceCommand::ApplyQuantityRules {
							surface: id,
							html: html.clone(),
						},
					)
				}));

				let tx = self.commands.clone();
				set.push(self.bus.subscribe(EventName::QuantityUpdate, move |_| {
					enqueue(&tx, EventName::QuantityUpdate, SurfaceCommand::ValidateQuantity { surface: id })
				}));
			}
			Surface::ProductForm(_) | Surface::VariantPicker(_) | Surface::BundlePicker(_) => {}
		}
		set
	}

	/// Releases the surface's subscriptions and forgets it.
	pub fn unmount(&mut self, id: SurfaceId) -> Option<Surface> {
		let mut mounted = self.mounted.remove(&id)?;
		let released = mounted.subscriptions.len();
		mounted.subscriptions.release_all();
		debug!(surface = %id, kind = %mounted.surface.kind(), released, "surface.unmount");
		Some(mounted.surface)
	}

	pub fn get(&self, id: SurfaceId) -> Option<&Surface> {
		self.mounted.get(&id).map(|m| &m.surface)
	}

	pub fn get_mut(&mut self, id: SurfaceId) -> Option<&mut Surface> {
		self.mounted.get_mut(&id).map(|m| &mut m.surface)
	}

	pub fn cart(&self, id: SurfaceId) -> Option<&dyn CartSurface> {
		self.get(id).and_then(Surface::as_cart)
	}

	pub fn is_mounted(&self, id: SurfaceId) -> bool {
		self.mounted.contains_key(&id)
	}

	/// First mounted surface of `kind`, in mount order.
	pub fn find(&self, kind: SurfaceKind) -> Option<SurfaceId> {
		self.mounted
			.iter()
			.find(|(_, m)| m.surface.kind() == kind)
			.map(|(&id, _)| id)
	}

	pub fn len(&self) -> usize {
		self.mounted.len()
	}

	pub fn is_empty(&self) -> bool {
		self.mounted.is_empty()
	}

	pub fn ids(&self) -> impl Iterator<Item = SurfaceId> + '_ {
		self.mounted.keys().copied()
	}
}
