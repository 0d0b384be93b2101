//! Product pages: add-to-cart completion, picker effects and quantity rules.

use std::collections::HashMap;
use std::sync::Arc;

use cartsync_bus::{BusEvent, SurfaceId};
use cartsync_dom::{Document, NodeId};
use tracing::{debug, info, warn};

use super::{Completion, Engine, MutationOutcome, MutationResponse, TickReport, cart};
use crate::coordinator::Intent;
use crate::error::{ContractError, ProtocolError, TransportError};
use crate::product::{ProductForm, form_id};
use crate::reconcile;
use crate::surface::{Surface, SurfaceKind};
use crate::variant::{AddLabel, AxisControl, PickerEffect, PickerOutcome, VariantPicker, same_value};

const ADD_BUTTON: &str = r#"[name="add"]"#;

impl Engine {
	pub(super) fn apply_add(
		&mut self,
		surface: SurfaceId,
		intent: Intent,
		result: Result<MutationResponse, TransportError>,
		report: &mut TickReport,
	) -> Result<(), ContractError> {
		let Some(Surface::ProductForm(form)) = self.registry.get(surface) else {
			report.dropped += 1;
			return Ok(());
		};
		let mut form: ProductForm = form.clone();
		let drawer = self.registry.find(SurfaceKind::CartDrawer);

		let applied = match result {
			Ok(MutationResponse::Add(response)) => match response.error_message() {
				Some(message) => {
					form.set_error(true);
					form.show_error(&mut self.page, Some(message))
						.map(|()| Err(ProtocolError::Validation {
							line: None,
							message: message.to_string(),
						}))
				}
				None => {
					form.set_error(false);
					if form.skip_cart() {
						self.host.navigate(&self.config.routes.checkout_url);
						Ok(Ok(()))
					} else if let Some(drawer) = drawer {
						self.publish(BusEvent::CartUpdate { source: surface });
						let sections = response.sections().cloned().unwrap_or_default();
						self.render_drawer(drawer, &sections).map(Ok)
					} else {
						self.host.navigate(&self.config.routes.cart_url);
						Ok(Ok(()))
					}
				}
			},
			Ok(MutationResponse::Cart(_)) => Err(ContractError::WrongSurfaceKind),
			Err(error) => {
				warn!(%surface, %error, "product.add.transport_failed");
				form.show_error(&mut self.page, Some(self.config.strings.error.as_str()))
					.map(|()| Err(ProtocolError::Transport(error)))
			}
		};

		let ended = form.end_submit(&mut self.page);
		if let Some(Surface::ProductForm(mounted)) = self.registry.get_mut(surface) {
			mounted.set_error(form.has_error());
		}

		let result = applied?;
		ended?;
		match &result {
			Ok(()) => info!(%surface, "product.add.settled"),
			Err(error) => warn!(%surface, %error, "product.add.rejected"),
		}
		report.mutations.push(MutationOutcome { surface, intent, result });
		Ok(())
	}

	/// Swaps the drawer's sections in after an add and opens it up.
	fn render_drawer(
		&mut self,
		drawer: SurfaceId,
		sections: &HashMap<String, Option<String>>,
	) -> Result<(), ContractError> {
		let Some(cart) = self.registry.cart(drawer) else {
			return Ok(());
		};
		let staged = reconcile::stage(&self.page, cart.sections_to_render(), sections)?;
		cart::set_empty_state(&mut self.page, cart, false);
		staged.commit(&mut self.page);
		if let Some(inner) = self.page.query(self.page.root(), ".drawer__inner")? {
			self.page.remove_class(inner, "is-empty");
		}
		debug!(surface = %drawer, "cart.drawer.rendered");
		Ok(())
	}

	pub(super) fn apply_picker_effects(&mut self, picker: &VariantPicker, outcome: &PickerOutcome) -> Result<(), ContractError> {
		let section = picker.section();
		for effect in &outcome.effects {
			match effect {
				PickerEffect::SyncInputs { selection } => self.sync_picker_inputs(picker, selection)?,
				PickerEffect::DisableAdd { label } => self.toggle_add_button(section, Some(*label))?,
				PickerEffect::EnableAdd => self.toggle_add_button(section, None)?,
				PickerEffect::SetFormVariant { variant_id } => {
					if let Some(form) = self.page.element_by_id(&form_id(section))
						&& let Some(input) = self.page.query(form, r#"[name="id"]"#)?
					{
						let id = variant_id.to_string();
						self.page.set_attr(input, "value", &id);
						self.page.set_value(input, &id);
					}
				}
				PickerEffect::ReplaceUrl { url } => self.host.replace_url(url),
				PickerEffect::ActiveMedia { media_id } => self.host.set_active_media(section, *media_id),
				PickerEffect::PickupAvailability { variant_id } => self.host.pickup_availability(*variant_id),
				PickerEffect::ShareUrl { url } => self.host.share_url(url),
				PickerEffect::OptionAvailability { axis, available } => {
					self.mark_unavailable_options(picker, *axis, available)?
				}
				PickerEffect::HidePrice | PickerEffect::ShowPrice => {
					if let Some(price) = self.page.element_by_id(&format!("price-{section}")) {
						self.page
							.toggle_class(price, "visibility-hidden", matches!(effect, PickerEffect::HidePrice));
					}
				}
				PickerEffect::FetchQuantityRules { variant_id } => {
					let backend = Arc::clone(&self.backend);
					let path = picker.url().to_string();
					let section = section.to_string();
					let variant = *variant_id;
					self.spawn(async move {
						let result = backend.fetch_section(&path, &section, Some(variant)).await;
						Completion::VariantSection { section, result }
					});
				}
			}
		}
		Ok(())
	}

	fn picker_fieldsets(&self, picker: &VariantPicker) -> Result<Vec<NodeId>, ContractError> {
		let root_id = picker.root_id();
		let root = self
			.page
			.element_by_id(&root_id)
			.ok_or(ContractError::MissingAnchor(root_id))?;
		Ok(self.page.query_all(root, "fieldset")?)
	}

	fn sync_picker_inputs(&mut self, picker: &VariantPicker, selection: &[String]) -> Result<(), ContractError> {
		let fieldsets = self.picker_fieldsets(picker)?;
		for ((fieldset, axis), value) in fieldsets.into_iter().zip(picker.axes()).zip(selection) {
			match axis.control {
				AxisControl::Select => {
					if let Some(select) = self.page.query(fieldset, "select")? {
						self.page.select_option(select, value);
					}
				}
				AxisControl::Radios => {
					let radios = self.page.query_all(fieldset, r#"input[type="radio"]"#)?;
					let target = radios
						.into_iter()
						.find(|&r| self.page.attr(r, "value").is_some_and(|v| same_value(v, value)));
					if let Some(radio) = target {
						self.page.set_checked(radio, true);
					}
				}
			}
		}
		Ok(())
	}

	fn mark_unavailable_options(&mut self, picker: &VariantPicker, axis: usize, available: &[String]) -> Result<(), ContractError> {
		let Some(&fieldset) = self.picker_fieldsets(picker)?.get(axis) else {
			return Ok(());
		};
		for option in self.page.query_all(fieldset, r#"input[type="radio"], option"#)? {
			let Some(value) = self.page.attr(option, "value").map(str::to_string) else {
				continue;
			};
			let missing = !available.iter().any(|a| same_value(a, &value));
			self.page.remove_class(option, "disabled");
			self.page.toggle_class(option, "unavailable", missing);
		}
		Ok(())
	}

	/// `label` disables the add button and shows it; `None` re-enables it
	/// unless the form still has invalid required fields.
	fn toggle_add_button(&mut self, section: &str, label: Option<AddLabel>) -> Result<(), ContractError> {
		let Some(form) = self.page.element_by_id(&form_id(section)) else {
			return Ok(());
		};
		let Some(button) = self.page.query(form, ADD_BUTTON)? else {
			return Ok(());
		};
		let text = self.page.query(button, ".button__text")?;
		let sold_out = self.page.query(form, ".sold-out-message")?;
		let strings = &self.config.strings;

		match label {
			Some(label) => {
				self.page.set_attr(button, "disabled", "disabled");
				self.page.set_attr(button, "aria-disabled", "true");
				let label = match label {
					AddLabel::SoldOut => &strings.sold_out,
					AddLabel::Unavailable => &strings.unavailable,
				};
				if let Some(text) = text {
					self.page.set_text(text, label);
				}
				if let Some(message) = sold_out {
					self.page.remove_class(message, "hidden");
				}
			}
			None => {
				self.page.remove_attr(button, "aria-disabled");
				let required = self.page.attr(form, "data-required-fields");
				if required == self.page.attr(form, "data-valid-fields") {
					self.page.remove_attr(button, "disabled");
				}
				if let Some(text) = text {
					self.page.set_text(text, &strings.add_to_cart);
				}
				if let Some(message) = sold_out {
					self.page.add_class(message, "hidden");
				}
			}
		}
		Ok(())
	}

	/// Fetches rules for the variant currently in the product's form.
	pub(super) fn start_quantity_rules(&mut self, surface: SurfaceId) -> Result<(), ContractError> {
		let Some(Surface::QuantityRules(rules)) = self.registry.get(surface) else {
			return Ok(());
		};
		let Some(variant) = rules.current_variant(&self.page)? else {
			debug!(%surface, "product.quantity.no_variant");
			return Ok(());
		};
		rules.set_loading(&mut self.page, true)?;
		let backend = Arc::clone(&self.backend);
		let path = rules.url().to_string();
		let section = rules.section().to_string();
		self.spawn(async move {
			let result = backend.fetch_section(&path, &section, Some(variant)).await;
			Completion::QuantityRules { surface, result }
		});
		Ok(())
	}

	/// Applies rules rendered for the current variant and recomputes bounds.
	pub(super) fn apply_quantity_rules(&mut self, surface: SurfaceId, result: Result<String, TransportError>) -> Result<(), ContractError> {
		let Some(Surface::QuantityRules(rules)) = self.registry.get(surface) else {
			return Ok(());
		};
		rules.set_loading(&mut self.page, false)?;
		let html = match result {
			Ok(html) => html,
			Err(error) => {
				warn!(%surface, %error, "product.quantity.fetch_failed");
				return Ok(());
			}
		};
		let fresh = Document::parse(&html);
		rules.apply_rules(&mut self.page, &fresh)?;
		let bounds = rules.set_boundaries(&mut self.page)?;
		debug!(%surface, min = bounds.min, max = ?bounds.max, "product.quantity.bounds");
		self.publish(BusEvent::QuantityUpdate);
		Ok(())
	}
}
