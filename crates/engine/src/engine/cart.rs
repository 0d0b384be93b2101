//! Cart list and drawer: busy state, response application and peer refresh.

use std::sync::Arc;
use std::time::Instant;

use cartsync_bus::{BusEvent, SurfaceId};
use cartsync_dom::Document;
use tracing::{debug, info, warn};

use super::{Completion, Engine, LiveRegionTimer, MutationOutcome, MutationResponse, RefreshResponse, TickReport};
use crate::config::EngineConfig;
use crate::coordinator::{Intent, MutationKind};
use crate::error::{ContractError, ProtocolError, TransportError};
use crate::protocol::{CartResponse, CartSnapshot, UpdateRequest};
use crate::reconcile::{self, section_keys};
use crate::surface::{CartSurface, RefreshPlan};

const LOADING_OVERLAY: &str = ".loading-overlay";
const DISABLED_ITEMS: &str = "cart__items--disabled";

/// Marks the surface busy while a mutation for `line` is in flight.
pub(super) fn enable_loading(page: &mut Document, cart: &dyn CartSurface, line: Option<usize>) -> Result<(), ContractError> {
	let anchors = cart.anchors();
	if let Some(items) = page.element_by_id(anchors.items) {
		page.add_class(items, DISABLED_ITEMS);
	}
	if let Some(line) = line
		&& let Some(item) = page.element_by_id(&anchors.line_item(line))
	{
		for overlay in page.query_all(item, LOADING_OVERLAY)? {
			page.remove_class(overlay, "hidden");
		}
	}
	page.blur();
	if let Some(status) = page.element_by_id(anchors.line_status) {
		page.set_attr(status, "aria-hidden", "false");
	}
	Ok(())
}

pub(super) fn release_loading(page: &mut Document, cart: &dyn CartSurface, line: Option<usize>) -> Result<(), ContractError> {
	let anchors = cart.anchors();
	if let Some(items) = page.element_by_id(anchors.items) {
		page.remove_class(items, DISABLED_ITEMS);
	}
	if let Some(line) = line
		&& let Some(item) = page.element_by_id(&anchors.line_item(line))
	{
		for overlay in page.query_all(item, LOADING_OVERLAY)? {
			page.add_class(overlay, "hidden");
		}
	}
	Ok(())
}

/// Every `is-empty` container of the surface follows `empty`.
pub(super) fn set_empty_state(page: &mut Document, cart: &dyn CartSurface, empty: bool) {
	for id in cart.empty_state_ids() {
		if let Some(node) = page.element_by_id(id) {
			page.toggle_class(node, "is-empty", empty);
		}
	}
}

/// Page state a cart response is applied to.
struct CartView<'a> {
	page: &'a mut Document,
	config: &'a EngineConfig,
	timers: &'a mut Vec<LiveRegionTimer>,
	now: Instant,
}

impl CartView<'_> {
	/// Writes `message` under the line, hides the line status and announces
	/// the cart status region for a while.
	fn update_live_regions(&mut self, cart: &dyn CartSurface, line: Option<usize>, message: &str) -> Result<(), ContractError> {
		let anchors = cart.anchors();
		if let Some(line) = line
			&& let Some(error) = self.page.element_by_id(&anchors.line_error(line))
			&& let Some(text) = self.page.query(error, ".cart-item__error-text")?
		{
			self.page.set_text(text, message);
		}
		if let Some(status) = self.page.element_by_id(anchors.line_status) {
			self.page.set_attr(status, "aria-hidden", "true");
		}
		if let Some(region) = self.page.element_by_id(anchors.live_region) {
			self.page.set_attr(region, "aria-hidden", "false");
			self.timers.push(LiveRegionTimer {
				at: self.now + self.config.live_region_hide(),
				region: anchors.live_region,
			});
		}
		Ok(())
	}

	/// Returns focus to the control the user was editing, or to a sensible
	/// fallback once its line is gone.
	fn restore_focus(&mut self, cart: &dyn CartSurface, intent: &Intent, empty: bool) -> Result<(), ContractError> {
		if let (Some(line), Some(name)) = (intent.line(), intent.focus_name.as_deref())
			&& let Some(item) = self.page.element_by_id(&cart.anchors().line_item(line))
			&& let Some(control) = self
				.page
				.descendants(item)
				.into_iter()
				.find(|&n| self.page.attr(n, "name") == Some(name))
		{
			self.page.focus(control);
			return Ok(());
		}

		let Some(root) = self.page.element_by_id(cart.root_id()) else {
			return Ok(());
		};
		let fallback = if empty {
			self.page.query(self.page.root(), cart.empty_focus())?
		} else {
			self.page.query(root, ".cart-item__name")?
		};
		if let Some(node) = fallback {
			self.page.focus(node);
		}
		Ok(())
	}

	/// Applies a settled change or clear.
	fn apply(&mut self, cart: &dyn CartSurface, intent: &Intent, response: &CartResponse) -> Result<Result<(), ProtocolError>, ContractError> {
		let line = intent.line();

		if let Some(errors) = &response.errors {
			let message = errors
				.message_for(line)
				.unwrap_or(self.config.strings.error.as_str())
				.to_string();
			if let Some(line) = line
				&& let Some(input) = self.page.element_by_id(&cart.anchors().quantity_input(line))
			{
				self.page.reset_value(input);
			}
			self.update_live_regions(cart, line, &message)?;
			return Ok(Err(ProtocolError::Validation { line, message }));
		}

		let rendered_lines = match self.page.element_by_id(cart.root_id()) {
			Some(root) => self.page.query_all(root, ".cart-item")?.len(),
			None => 0,
		};
		let staged = reconcile::stage(self.page, cart.sections_to_render(), &response.sections)?;
		let empty = matches!(intent.kind, MutationKind::Clear) || response.item_count == 0;
		set_empty_state(self.page, cart, empty);
		staged.commit(self.page);

		let mut result = Ok(());
		if let MutationKind::Change { line, quantity } = intent.kind {
			let confirmed = response.line_quantity(line);
			let mut message = String::new();
			// Only meaningful while the line set is unchanged; a removed line
			// shifts every index after it.
			if rendered_lines == response.items.len() && confirmed != Some(quantity) {
				message = match confirmed {
					Some(confirmed) => self.config.strings.quantity_error(confirmed),
					None => self.config.strings.error.clone(),
				};
				result = Err(ProtocolError::IntegrityMismatch {
					line,
					requested: quantity,
					confirmed,
				});
			}
			self.update_live_regions(cart, Some(line), &message)?;
		}

		self.restore_focus(cart, intent, response.item_count == 0)?;
		Ok(result)
	}
}

/// Hides every loading overlay and shows the generic error.
fn show_transport_failure(page: &mut Document, cart: &dyn CartSurface, config: &EngineConfig) -> Result<(), ContractError> {
	if let Some(root) = page.element_by_id(cart.root_id()) {
		for overlay in page.query_all(root, LOADING_OVERLAY)? {
			page.add_class(overlay, "hidden");
		}
	}
	match page.element_by_id(cart.anchors().errors) {
		Some(errors) => page.set_text(errors, &config.strings.error),
		None => warn!(region = cart.anchors().errors, "cart.sync.no_error_region"),
	}
	Ok(())
}

impl Engine {
	pub(super) fn apply_cart_mutation(
		&mut self,
		surface: SurfaceId,
		intent: Intent,
		result: Result<MutationResponse, TransportError>,
		now: Instant,
		report: &mut TickReport,
	) -> Result<(), ContractError> {
		let Some(cart) = self.registry.cart(surface) else {
			report.dropped += 1;
			return Ok(());
		};
		let mut snapshot = None;
		let applied = match result {
			Ok(MutationResponse::Cart(response)) => {
				let mut view = CartView {
					page: &mut self.page,
					config: &self.config,
					timers: &mut self.timers,
					now,
				};
				let applied = view.apply(cart, &intent, &response);
				if matches!(applied, Ok(Ok(()) | Err(ProtocolError::IntegrityMismatch { .. }))) {
					snapshot = Some(response.snapshot());
				}
				applied
			}
			Ok(MutationResponse::Add(_)) => Err(ContractError::WrongSurfaceKind),
			Err(error) => {
				warn!(%surface, %error, "cart.sync.transport_failed");
				show_transport_failure(&mut self.page, cart, &self.config).map(|()| Err(ProtocolError::Transport(error)))
			}
		};
		let released = release_loading(&mut self.page, cart, intent.line());

		if let Some(snapshot) = snapshot {
			self.store_snapshot(snapshot);
			self.publish(BusEvent::CartUpdate { source: surface });
		}
		self.publish(BusEvent::CartRefresh { source: surface });

		let result = applied?;
		released?;
		match &result {
			Ok(()) => info!(%surface, kind = ?intent.kind, "cart.sync.settled"),
			Err(error) => warn!(%surface, %error, "cart.sync.rejected"),
		}
		report.mutations.push(MutationOutcome { surface, intent, result });
		Ok(())
	}

	fn store_snapshot(&mut self, snapshot: CartSnapshot) {
		debug!(items = snapshot.item_count, "cart.snapshot");
		self.snapshot = Some(snapshot);
	}

	/// Starts re-fetching a cart surface after a peer changed the cart.
	pub(super) fn start_refresh(&mut self, surface: SurfaceId) -> Result<(), ContractError> {
		let Some(cart) = self.registry.cart(surface) else {
			debug!(%surface, "cart.refresh.unmounted");
			return Ok(());
		};
		let backend = Arc::clone(&self.backend);
		match cart.refresh_plan(&self.config) {
			RefreshPlan::FetchSection { path, section_id, .. } => {
				self.spawn(async move {
					let result = backend.fetch_section(&path, &section_id, None).await;
					Completion::Refresh {
						surface,
						result: result.map(RefreshResponse::Section),
					}
				});
			}
			RefreshPlan::UpdateCart => {
				let request = UpdateRequest::refresh(section_keys(cart.sections_to_render()), self.config.sections_url.clone());
				self.spawn(async move {
					Completion::Refresh {
						surface,
						result: backend.update(request).await.map(RefreshResponse::Cart),
					}
				});
			}
		}
		debug!(%surface, "cart.refresh.start");
		Ok(())
	}

	pub(super) fn apply_refresh(
		&mut self,
		surface: SurfaceId,
		result: Result<RefreshResponse, TransportError>,
		report: &mut TickReport,
	) -> Result<(), ContractError> {
		let Some(cart) = self.registry.cart(surface) else {
			report.dropped += 1;
			return Ok(());
		};
		match result {
			Ok(RefreshResponse::Section(html)) => {
				let RefreshPlan::FetchSection { section_id, selector, .. } = cart.refresh_plan(&self.config) else {
					return Err(ContractError::WrongSurfaceKind);
				};
				let fresh = Document::parse(&html);
				let source = fresh
					.query(fresh.root(), &selector)?
					.ok_or(ContractError::MissingFragmentNode { section: section_id, selector })?;
				let target = self
					.page
					.element_by_id(cart.root_id())
					.ok_or_else(|| ContractError::MissingAnchor(cart.root_id().to_string()))?;
				let empty = fresh.has_class(source, "is-empty") || fresh.query(source, ".cart-item")?.is_none();
				self.page.replace_children(target, &fresh, source);
				set_empty_state(&mut self.page, cart, empty);
			}
			Ok(RefreshResponse::Cart(response)) => {
				let staged = reconcile::stage(&self.page, cart.sections_to_render(), &response.sections)?;
				set_empty_state(&mut self.page, cart, response.item_count == 0);
				staged.commit(&mut self.page);
				self.store_snapshot(response.snapshot());
			}
			Err(error) => {
				warn!(%surface, %error, "cart.refresh.failed");
				return Ok(());
			}
		}
		debug!(%surface, "cart.refresh.applied");
		report.refreshed += 1;
		Ok(())
	}
}
