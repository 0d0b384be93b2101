//! The composition root.
//!
//! [`Engine`] owns the page, the bus, the mounted surfaces and the mutation
//! coordinator. User input is recorded synchronously; network work runs on
//! spawned tasks whose completions come back over a channel and are applied
//! on the next [`Engine::tick`]. All DOM writes happen inside the engine's
//! own methods, so the page is never touched concurrently.
//!
//! A tick runs in four steps:
//! 1. apply settled network completions,
//! 2. run commands enqueued by bus handlers,
//! 3. fire expired live-region timers,
//! 4. dispatch due mutations.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use cartsync_bus::{BusEvent, EventBus, HandlerFault, SurfaceId};
use cartsync_dom::Document;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use crate::backend::CommerceBackend;
use crate::bundle::BundlePicker;
use crate::config::EngineConfig;
use crate::coordinator::{Intent, MutationCoordinator, MutationKind, SyncPhase};
use crate::error::{ContractError, ProtocolError, TransportError};
use crate::host::Host;
use crate::product::ProductForm;
use crate::protocol::{AddRequest, AddResponse, CartResponse, CartSnapshot, ChangeRequest, ClearRequest};
use crate::quantity::QuantityRules;
use crate::reconcile::section_keys;
use crate::surface::{CartDrawer, CartList, Surface, SurfaceCommand, SurfaceKind, SurfaceRegistry};
use crate::variant::{PickerOutcome, PickerState, VariantPicker};

mod cart;
mod catalog;

/// Settled mutation response.
#[derive(Debug)]
enum MutationResponse {
	Cart(CartResponse),
	Add(AddResponse),
}

/// Settled refresh response of a cart surface.
#[derive(Debug)]
enum RefreshResponse {
	Section(String),
	Cart(CartResponse),
}

/// Result of a spawned backend call.
#[derive(Debug)]
enum Completion {
	Mutation {
		surface: SurfaceId,
		result: Result<MutationResponse, TransportError>,
	},
	Refresh {
		surface: SurfaceId,
		result: Result<RefreshResponse, TransportError>,
	},
	QuantityRules {
		surface: SurfaceId,
		result: Result<String, TransportError>,
	},
	VariantSection {
		section: String,
		result: Result<String, TransportError>,
	},
}

/// Hides a cart status live region once `at` has passed.
#[derive(Debug, Clone, Copy)]
struct LiveRegionTimer {
	at: Instant,
	region: &'static str,
}

/// How one mutation settled.
#[derive(Debug)]
pub struct MutationOutcome {
	pub surface: SurfaceId,
	pub intent: Intent,
	pub result: Result<(), ProtocolError>,
}

/// What a tick did.
#[derive(Debug, Default)]
pub struct TickReport {
	pub mutations: Vec<MutationOutcome>,
	/// Mutations sent to the backend.
	pub dispatched: usize,
	/// Cart surfaces re-rendered after a peer's change.
	pub refreshed: usize,
	pub timers_fired: usize,
	/// Completions for surfaces that were unmounted while in flight.
	pub dropped: usize,
	/// Bus handler failures raised while publishing.
	pub faults: Vec<HandlerFault>,
}

impl TickReport {
	pub fn is_idle(&self) -> bool {
		self.mutations.is_empty()
			&& self.dispatched == 0
			&& self.refreshed == 0
			&& self.timers_fired == 0
			&& self.dropped == 0
			&& self.faults.is_empty()
	}
}

pub struct Engine {
	config: EngineConfig,
	page: Document,
	bus: EventBus,
	registry: SurfaceRegistry,
	coordinator: MutationCoordinator,
	backend: Arc<dyn CommerceBackend>,
	host: Arc<dyn Host>,
	snapshot: Option<CartSnapshot>,
	commands: mpsc::UnboundedReceiver<SurfaceCommand>,
	completion_tx: mpsc::UnboundedSender<Completion>,
	completion_rx: mpsc::UnboundedReceiver<Completion>,
	/// Completions received by [`Engine::settle`], applied on the next tick.
	ready: VecDeque<Completion>,
	/// Spawned tasks whose completion has not been received yet.
	outstanding: usize,
	timers: Vec<LiveRegionTimer>,
	faults: Vec<HandlerFault>,
}

impl std::fmt::Debug for Engine {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Engine")
			.field("registry", &self.registry)
			.field("coordinator", &self.coordinator)
			.field("outstanding", &self.outstanding)
			.field("timers", &self.timers.len())
			.finish_non_exhaustive()
	}
}

impl Engine {
	pub fn new(
		config: EngineConfig,
		page: Document,
		backend: Arc<dyn CommerceBackend>,
		host: Arc<dyn Host>,
	) -> Self {
		let bus = EventBus::new();
		let (command_tx, commands) = mpsc::unbounded_channel();
		let (completion_tx, completion_rx) = mpsc::unbounded_channel();
		Self {
			config,
			page,
			registry: SurfaceRegistry::new(bus.clone(), command_tx),
			bus,
			coordinator: MutationCoordinator::new(),
			backend,
			host,
			snapshot: None,
			commands,
			completion_tx,
			completion_rx,
			ready: VecDeque::new(),
			outstanding: 0,
			timers: Vec::new(),
			faults: Vec::new(),
		}
	}

	pub fn config(&self) -> &EngineConfig {
		&self.config
	}

	pub fn page(&self) -> &Document {
		&self.page
	}

	/// Direct page access for host-side edits (typing, markup injected by
	/// other scripts).
	pub fn page_mut(&mut self) -> &mut Document {
		&mut self.page
	}

	pub fn bus(&self) -> &EventBus {
		&self.bus
	}

	/// Last cart state confirmed by the server.
	pub fn snapshot(&self) -> Option<&CartSnapshot> {
		self.snapshot.as_ref()
	}

	pub fn surface(&self, id: SurfaceId) -> Option<&Surface> {
		self.registry.get(id)
	}

	pub fn phase(&self, surface: SurfaceId) -> Option<SyncPhase> {
		self.coordinator.phase(surface)
	}

	pub fn in_flight_count(&self) -> usize {
		self.coordinator.in_flight_count()
	}

	/// Whether spawned backend calls have yet to be applied.
	pub fn has_outstanding(&self) -> bool {
		self.outstanding > 0 || !self.ready.is_empty()
	}

	/// Earliest instant at which [`Engine::tick`] has timed work to do.
	pub fn next_wakeup(&self) -> Option<Instant> {
		let timers = self.timers.iter().map(|t| t.at).min();
		match (self.coordinator.next_deadline(self.config.debounce()), timers) {
			(Some(a), Some(b)) => Some(a.min(b)),
			(a, b) => a.or(b),
		}
	}

	fn mount(&mut self, surface: Surface) -> SurfaceId {
		let tracked = surface.mutates_cart();
		let id = self.registry.mount(surface);
		if tracked {
			self.coordinator.track(id);
		}
		id
	}

	pub fn mount_cart_list(&mut self) -> Result<SurfaceId, ContractError> {
		let list = CartList::from_page(&self.page)?;
		Ok(self.mount(Surface::CartList(list)))
	}

	pub fn mount_cart_drawer(&mut self) -> Result<SurfaceId, ContractError> {
		let drawer = CartDrawer::from_page(&self.page)?;
		Ok(self.mount(Surface::CartDrawer(drawer)))
	}

	pub fn mount_product_form(&mut self, section: &str) -> Result<SurfaceId, ContractError> {
		let form = ProductForm::from_page(&self.page, section)?;
		Ok(self.mount(Surface::ProductForm(form)))
	}

	pub fn mount_variant_picker(&mut self, section: &str) -> Result<SurfaceId, ContractError> {
		let picker = VariantPicker::from_page(&self.page, section)?;
		Ok(self.mount(Surface::VariantPicker(picker)))
	}

	/// Mounts quantity rules and writes the initial bounds.
	pub fn mount_quantity_rules(&mut self, section: &str) -> Result<SurfaceId, ContractError> {
		let rules = QuantityRules::from_page(&self.page, section)?;
		rules.set_boundaries(&mut self.page)?;
		let id = self.mount(Surface::QuantityRules(rules));
		self.publish(BusEvent::QuantityUpdate);
		Ok(id)
	}

	pub fn mount_bundle_picker(&mut self, root_id: &str) -> Result<SurfaceId, ContractError> {
		let bundle = BundlePicker::from_page(&self.page, root_id)?;
		bundle.write_form_ids(&mut self.page)?;
		Ok(self.mount(Surface::BundlePicker(bundle)))
	}

	/// Releases the surface's subscriptions. A mutation still in flight for
	/// it is dropped when it settles.
	pub fn unmount(&mut self, surface: SurfaceId) -> bool {
		self.coordinator.untrack(surface);
		self.registry.unmount(surface).is_some()
	}

	/// The user typed `value` into line `line`'s quantity input. Sent once
	/// input has been quiet for the debounce window.
	pub fn quantity_input(
		&mut self,
		surface: SurfaceId,
		line: usize,
		value: &str,
		now: Instant,
	) -> Result<(), ContractError> {
		let cart = self.registry.get(surface).ok_or(ContractError::UnknownSurface)?;
		let cart = cart.as_cart().ok_or(ContractError::WrongSurfaceKind)?;
		let input_id = cart.anchors().quantity_input(line);
		let input = self
			.page
			.element_by_id(&input_id)
			.ok_or(ContractError::MissingAnchor(input_id))?;
		self.page.set_value(input, value);
		self.page.focus(input);

		let Ok(quantity) = value.trim().parse::<u32>() else {
			debug!(%surface, line, value, "cart.input.unparsable");
			return Ok(());
		};
		let mut intent = Intent::change(line, quantity);
		if let Some(name) = self.page.attr(input, "name") {
			intent = intent.with_focus(name);
		}
		self.coordinator.record_intent(surface, intent, now);
		Ok(())
	}

	/// Removes a line. Sent on the next tick.
	pub fn remove_line(&mut self, surface: SurfaceId, line: usize, now: Instant) -> Result<(), ContractError> {
		self.require_cart(surface)?;
		self.coordinator.submit_now(surface, Intent::change(line, 0), now);
		Ok(())
	}

	pub fn clear_cart(&mut self, surface: SurfaceId, now: Instant) -> Result<(), ContractError> {
		self.require_cart(surface)?;
		self.coordinator.submit_now(surface, Intent::clear(), now);
		Ok(())
	}

	fn require_cart(&self, surface: SurfaceId) -> Result<(), ContractError> {
		match self.registry.get(surface) {
			None => Err(ContractError::UnknownSurface),
			Some(s) if s.as_cart().is_none() => Err(ContractError::WrongSurfaceKind),
			Some(_) => Ok(()),
		}
	}

	/// Submits a product form. Returns `false` when the button is disabled
	/// and nothing was submitted.
	pub fn submit_product_form(&mut self, surface: SurfaceId, now: Instant) -> Result<bool, ContractError> {
		let Some(Surface::ProductForm(form)) = self.registry.get(surface) else {
			return Err(self.kind_error(surface));
		};
		if form.is_disabled(&self.page)? {
			debug!(%surface, "product.submit.disabled");
			return Ok(false);
		}
		let add = form.read_intent(&self.page)?;
		form.begin_submit(&mut self.page)?;
		self.coordinator.submit_now(surface, Intent::add(add), now);
		Ok(true)
	}

	/// A picker option changed. Applies the outcome to the page and the host.
	pub fn select_variant(&mut self, surface: SurfaceId, axis: usize, value: &str) -> Result<PickerOutcome, ContractError> {
		let Some(Surface::VariantPicker(picker)) = self.registry.get_mut(surface) else {
			return Err(self.kind_error(surface));
		};
		let outcome = picker.select(axis, value)?;
		let picker = picker.clone();
		debug!(%surface, axis, value, state = ?outcome.state.variant().map(|v| v.id), "product.variant.select");
		self.apply_picker_effects(&picker, &outcome)?;
		Ok(outcome)
	}

	pub fn toggle_bundle_slot(&mut self, surface: SurfaceId, index: usize, checked: bool) -> Result<(), ContractError> {
		let Some(Surface::BundlePicker(bundle)) = self.registry.get_mut(surface) else {
			return Err(self.kind_error(surface));
		};
		bundle.toggle_slot(&mut self.page, index, checked)
	}

	pub fn select_bundle_variant(
		&mut self,
		surface: SurfaceId,
		index: usize,
		axis: usize,
		value: &str,
	) -> Result<PickerState, ContractError> {
		let Some(Surface::BundlePicker(bundle)) = self.registry.get_mut(surface) else {
			return Err(self.kind_error(surface));
		};
		bundle.select_variant(&mut self.page, index, axis, value)
	}

	fn kind_error(&self, surface: SurfaceId) -> ContractError {
		if self.registry.is_mounted(surface) {
			ContractError::WrongSurfaceKind
		} else {
			ContractError::UnknownSurface
		}
	}

	/// Waits for one spawned backend call to settle. Returns `false` when
	/// nothing is outstanding.
	pub async fn settle(&mut self) -> bool {
		if self.outstanding == 0 {
			return false;
		}
		match self.completion_rx.recv().await {
			Some(completion) => {
				self.outstanding -= 1;
				self.ready.push_back(completion);
				true
			}
			None => false,
		}
	}

	fn next_completion(&mut self) -> Option<Completion> {
		if let Some(completion) = self.ready.pop_front() {
			return Some(completion);
		}
		let completion = self.completion_rx.try_recv().ok()?;
		self.outstanding = self.outstanding.saturating_sub(1);
		Some(completion)
	}

	/// Runs everything that is due at `now`.
	///
	/// A [`ContractError`] aborts the tick after the failing surface's busy
	/// state has been released.
	pub fn tick(&mut self, now: Instant) -> Result<TickReport, ContractError> {
		let mut report = TickReport::default();

		while let Some(completion) = self.next_completion() {
			self.apply_completion(completion, now, &mut report)?;
		}
		while let Ok(command) = self.commands.try_recv() {
			self.run_command(command)?;
		}
		self.fire_timers(now, &mut report);
		self.dispatch_due(now, &mut report)?;

		report.faults.append(&mut self.faults);
		if !report.is_idle() {
			trace!(
				mutations = report.mutations.len(),
				dispatched = report.dispatched,
				refreshed = report.refreshed,
				timers = report.timers_fired,
				"engine.tick"
			);
		}
		Ok(report)
	}

	fn publish(&mut self, event: BusEvent) {
		if let Err(fault) = self.bus.publish(&event) {
			self.faults.push(fault);
		}
	}

	fn spawn<F>(&mut self, task: F)
	where
		F: Future<Output = Completion> + Send + 'static,
	{
		self.outstanding += 1;
		let tx = self.completion_tx.clone();
		tokio::spawn(async move {
			let _ = tx.send(task.await);
		});
	}

	fn fire_timers(&mut self, now: Instant, report: &mut TickReport) {
		let (due, pending): (Vec<_>, Vec<_>) = self.timers.drain(..).partition(|t| t.at <= now);
		self.timers = pending;
		for timer in due {
			if let Some(region) = self.page.element_by_id(timer.region) {
				self.page.set_attr(region, "aria-hidden", "true");
			}
			report.timers_fired += 1;
		}
	}

	/// Sends every due intent. A surface whose intent cannot be sent is put
	/// back to rest; the others are still sent before the first error is
	/// returned.
	fn dispatch_due(&mut self, now: Instant, report: &mut TickReport) -> Result<(), ContractError> {
		let mut first_error = None;
		for (surface, intent) in self.coordinator.take_due(now, self.config.debounce()) {
			if let Err(error) = self.dispatch(surface, &intent) {
				warn!(%surface, %error, "cart.sync.dispatch_failed");
				self.coordinator.mark_complete(surface);
				if let Some(cart) = self.registry.cart(surface) {
					let _ = cart::release_loading(&mut self.page, cart, intent.line());
				}
				first_error.get_or_insert(error);
				continue;
			}
			if self.registry.get(surface).is_some() {
				info!(%surface, kind = ?intent.kind, "cart.sync.dispatch");
				report.dispatched += 1;
			}
		}
		first_error.map_or(Ok(()), Err)
	}

	fn dispatch(&mut self, surface: SurfaceId, intent: &Intent) -> Result<(), ContractError> {
		let Some(mounted) = self.registry.get(surface) else {
			self.coordinator.untrack(surface);
			return Ok(());
		};
		let sections_url = self.config.sections_url.clone();
		let backend = Arc::clone(&self.backend);

		match (&intent.kind, mounted.as_cart()) {
			(MutationKind::Change { line, quantity }, Some(cart)) => {
				cart::enable_loading(&mut self.page, cart, Some(*line))?;
				let request = ChangeRequest {
					line: *line,
					quantity: *quantity,
					sections: section_keys(cart.sections_to_render()),
					sections_url,
				};
				self.spawn(async move {
					Completion::Mutation {
						surface,
						result: backend.change(request).await.map(MutationResponse::Cart),
					}
				});
			}
			(MutationKind::Clear, Some(cart)) => {
				cart::enable_loading(&mut self.page, cart, None)?;
				let request = ClearRequest {
					sections: section_keys(cart.sections_to_render()),
					sections_url,
				};
				self.spawn(async move {
					Completion::Mutation {
						surface,
						result: backend.clear(request).await.map(MutationResponse::Cart),
					}
				});
			}
			(MutationKind::Add(add), None) => {
				let sections = self
					.registry
					.find(SurfaceKind::CartDrawer)
					.and_then(|drawer| self.registry.cart(drawer))
					.map(|drawer| section_keys(drawer.sections_to_render()))
					.unwrap_or_default();
				let request = AddRequest {
					id: add.variant_id,
					quantity: add.quantity,
					properties: add.properties.clone(),
					sections,
					sections_url,
				};
				self.spawn(async move {
					Completion::Mutation {
						surface,
						result: backend.add(request).await.map(MutationResponse::Add),
					}
				});
			}
			_ => return Err(ContractError::WrongSurfaceKind),
		}
		Ok(())
	}

	fn apply_completion(&mut self, completion: Completion, now: Instant, report: &mut TickReport) -> Result<(), ContractError> {
		match completion {
			Completion::Mutation { surface, result } => {
				let Some(intent) = self.coordinator.mark_complete(surface) else {
					debug!(%surface, "cart.sync.stale_completion");
					report.dropped += 1;
					return Ok(());
				};
				match self.registry.get(surface).map(Surface::kind) {
					Some(SurfaceKind::ProductForm) => self.apply_add(surface, intent, result, report),
					Some(_) => self.apply_cart_mutation(surface, intent, result, now, report),
					None => {
						report.dropped += 1;
						Ok(())
					}
				}
			}
			Completion::Refresh { surface, result } => self.apply_refresh(surface, result, report),
			Completion::QuantityRules { surface, result } => self.apply_quantity_rules(surface, result),
			Completion::VariantSection { section, result } => {
				match result {
					Ok(html) => self.publish(BusEvent::VariantChange { section_id: section, html }),
					Err(error) => warn!(%section, %error, "product.variant.fetch_failed"),
				}
				Ok(())
			}
		}
	}

	fn run_command(&mut self, command: SurfaceCommand) -> Result<(), ContractError> {
		match command {
			SurfaceCommand::Refresh { surface } => self.start_refresh(surface),
			SurfaceCommand::RefreshQuantityRules { surface } => self.start_quantity_rules(surface),
			SurfaceCommand::ApplyQuantityRules { surface, html } => self.apply_quantity_rules(surface, Ok(html)),
			SurfaceCommand::ValidateQuantity { surface } => {
				let Some(Surface::QuantityRules(rules)) = self.registry.get(surface) else {
					return Ok(());
				};
				rules.validate_buttons(&mut self.page)
			}
		}
	}
}
