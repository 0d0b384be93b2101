//! Variant resolution for product pickers.
//!
//! A picker's variants are embedded in the page as JSON. Resolution is an
//! exact match over every option axis, comparing option values without
//! regard to case. When the selection names no variant (or only a sold-out
//! one) and the picker's skip policy allows it, the picker auto-advances the
//! other axes to the nearest combination that exists.
//!
//! [`VariantPicker::select`] is pure: it returns the new state together with
//! the [`PickerEffect`]s the engine applies to the page and the host.

use cartsync_dom::Document;
use serde::Deserialize;
use tracing::debug;

use crate::error::ContractError;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Media {
	pub id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Image {
	pub src: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Variant {
	pub id: u64,
	pub options: Vec<String>,
	#[serde(default)]
	pub available: bool,
	#[serde(default)]
	pub featured_media: Option<Media>,
	#[serde(default)]
	pub featured_image: Option<Image>,
	/// Price in minor units.
	#[serde(default)]
	pub price: Option<u64>,
	#[serde(default, alias = "comparePrice")]
	pub compare_at_price: Option<u64>,
}

/// Option values are matched without regard to case.
pub fn same_value(a: &str, b: &str) -> bool {
	a.eq_ignore_ascii_case(b) || a.to_lowercase() == b.to_lowercase()
}

impl Variant {
	fn matches(&self, selection: &[String]) -> bool {
		self.options.len() == selection.len() && self.options.iter().zip(selection).all(|(o, s)| same_value(o, s))
	}

	fn agreement(&self, selection: &[String]) -> usize {
		self.options
			.iter()
			.zip(selection)
			.filter(|(o, s)| same_value(o, s))
			.count()
	}
}

/// Static variant list of one product.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariantResolver {
	variants: Vec<Variant>,
}

impl VariantResolver {
	pub fn new(variants: Vec<Variant>) -> Self {
		Self { variants }
	}

	pub fn from_json(src: &str) -> Result<Self, serde_json::Error> {
		Ok(Self::new(serde_json::from_str(src)?))
	}

	pub fn variants(&self) -> &[Variant] {
		&self.variants
	}

	/// Exact match on every axis.
	pub fn resolve(&self, selection: &[String]) -> Option<&Variant> {
		self.variants.iter().find(|v| v.matches(selection))
	}

	/// Among variants keeping `selection[anchor_axis]`, the one agreeing with
	/// `selection` on the most axes. Ties go to the earliest variant.
	pub fn nearest(&self, selection: &[String], anchor_axis: usize, require_available: bool) -> Option<&Variant> {
		let anchor = selection.get(anchor_axis)?;
		let mut best: Option<(&Variant, usize)> = None;
		for variant in &self.variants {
			if require_available && !variant.available {
				continue;
			}
			if !variant.options.get(anchor_axis).is_some_and(|o| same_value(o, anchor)) {
				continue;
			}
			let score = variant.agreement(selection);
			if best.is_none_or(|(_, s)| score > s) {
				best = Some((variant, score));
			}
		}
		best.map(|(v, _)| v)
	}

	pub fn state(&self, selection: &[String]) -> PickerState {
		match self.resolve(selection) {
			None => PickerState::Unresolved,
			Some(v) if v.available => PickerState::Resolved(v.clone()),
			Some(v) => PickerState::Unavailable(v.clone()),
		}
	}

	/// Values of `axis` offered by available variants that agree with
	/// `selection` on every earlier axis, in document order.
	pub fn available_values(&self, selection: &[String], axis: usize) -> Vec<String> {
		let mut values: Vec<String> = Vec::new();
		for variant in self.variants.iter().filter(|v| v.available) {
			let prefix_matches = variant
				.options
				.iter()
				.zip(selection)
				.take(axis)
				.all(|(o, s)| same_value(o, s));
			if !prefix_matches {
				continue;
			}
			if let Some(value) = variant.options.get(axis)
				&& !values.iter().any(|v| same_value(v, value))
			{
				values.push(value.clone());
			}
		}
		values
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickerState {
	Resolved(Variant),
	/// No variant has the selected combination.
	Unresolved,
	/// The combination exists but is sold out.
	Unavailable(Variant),
}

impl PickerState {
	pub fn variant(&self) -> Option<&Variant> {
		match self {
			PickerState::Resolved(v) | PickerState::Unavailable(v) => Some(v),
			PickerState::Unresolved => None,
		}
	}
}

/// Label shown on a disabled add-to-cart button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddLabel {
	SoldOut,
	Unavailable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickerEffect {
	/// Move the picker's controls to `selection` after an auto-advance.
	SyncInputs { selection: Vec<String> },
	DisableAdd { label: AddLabel },
	/// Re-enable add-to-cart, unless custom fields are still invalid.
	EnableAdd,
	/// Point the product form's hidden `id` input at the variant.
	SetFormVariant { variant_id: u64 },
	ReplaceUrl { url: String },
	ActiveMedia { media_id: u64 },
	PickupAvailability { variant_id: Option<u64> },
	ShareUrl { url: String },
	/// Mark the values of `axis` missing from `available` as unavailable.
	OptionAvailability { axis: usize, available: Vec<String> },
	HidePrice,
	ShowPrice,
	FetchQuantityRules { variant_id: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickerOutcome {
	pub state: PickerState,
	pub selection: Vec<String>,
	/// The selection was moved to a different combination than requested.
	pub auto_advanced: bool,
	pub effects: Vec<PickerEffect>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisControl {
	Select,
	Radios,
}

/// One option axis of a picker, in fieldset order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Axis {
	pub name: Option<String>,
	pub control: AxisControl,
}

/// `<variant-selects id="variant-selects-{section}">`.
#[derive(Debug, Clone)]
pub struct VariantPicker {
	section: String,
	url: String,
	update_url: bool,
	skip_non_existent: bool,
	skip_unavailable: bool,
	axes: Vec<Axis>,
	resolver: VariantResolver,
	selection: Vec<String>,
	state: PickerState,
}

pub fn picker_root_id(section: &str) -> String {
	format!("variant-selects-{section}")
}

impl VariantPicker {
	/// Reads axes, policies, the current selection and the embedded variant
	/// list from the picker markup.
	pub fn from_page(page: &Document, section: &str) -> Result<Self, ContractError> {
		let root_id = picker_root_id(section);
		let root = page
			.element_by_id(&root_id)
			.ok_or(ContractError::MissingAnchor(root_id))?;

		let mut axes = Vec::new();
		let mut selection = Vec::new();
		for fieldset in page.query_all(root, "fieldset")? {
			if let Some(select) = page.query(fieldset, "select")? {
				axes.push(Axis {
					name: page.attr(select, "name").map(str::to_string),
					control: AxisControl::Select,
				});
				selection.push(page.value(select).unwrap_or_default());
				continue;
			}
			let radios = page.query_all(fieldset, r#"input[type="radio"]"#)?;
			axes.push(Axis {
				name: radios.first().and_then(|&r| page.attr(r, "name")).map(str::to_string),
				control: AxisControl::Radios,
			});
			let checked = radios.iter().copied().find(|&r| page.checked(r));
			selection.push(checked.and_then(|r| page.value(r)).unwrap_or_default());
		}

		let data = page
			.query(root, r#"script[type="application/json"]"#)?
			.ok_or_else(|| ContractError::EmbeddedData(format!("#{} has no variant data", picker_root_id(section))))?;
		let resolver = VariantResolver::from_json(&page.text_content(data))
			.map_err(|err| ContractError::EmbeddedData(err.to_string()))?;

		let state = resolver.state(&selection);
		Ok(Self {
			section: section.to_string(),
			url: page.attr(root, "data-url").unwrap_or_default().to_string(),
			update_url: page.attr(root, "data-update-url") != Some("false"),
			skip_non_existent: page.attr(root, "data-skip-non-existent") == Some("true"),
			skip_unavailable: page.attr(root, "data-skip-unavailable") == Some("true"),
			axes,
			resolver,
			selection,
			state,
		})
	}

	pub fn section(&self) -> &str {
		&self.section
	}

	pub fn url(&self) -> &str {
		&self.url
	}

	pub fn root_id(&self) -> String {
		picker_root_id(&self.section)
	}

	pub fn axes(&self) -> &[Axis] {
		&self.axes
	}

	pub fn selection(&self) -> &[String] {
		&self.selection
	}

	pub fn state(&self) -> &PickerState {
		&self.state
	}

	pub fn resolver(&self) -> &VariantResolver {
		&self.resolver
	}

	/// Applies an option change and recomputes the resolved variant.
	pub fn select(&mut self, axis: usize, value: &str) -> Result<PickerOutcome, ContractError> {
		let slot = self.selection.get_mut(axis).ok_or(ContractError::UnknownAxis(axis))?;
		*slot = value.to_string();

		let exact = self.resolver.resolve(&self.selection);
		let resolved = match exact {
			None if self.skip_non_existent => self.resolver.nearest(&self.selection, axis, self.skip_unavailable),
			Some(v) if !v.available && self.skip_unavailable => {
				self.resolver.nearest(&self.selection, axis, true).or(Some(v))
			}
			other => other,
		}
		.cloned();

		let auto_advanced = resolved.as_ref().is_some_and(|v| !v.matches(&self.selection));
		if let Some(v) = resolved.as_ref().filter(|_| auto_advanced) {
			debug!(section = %self.section, axis, variant = v.id, "variant.auto_advance");
			self.selection = v.options.clone();
		}

		let mut effects = Vec::new();
		if auto_advanced {
			effects.push(PickerEffect::SyncInputs {
				selection: self.selection.clone(),
			});
		}
		for later in 1..self.axes.len() {
			effects.push(PickerEffect::OptionAvailability {
				axis: later,
				available: self.resolver.available_values(&self.selection, later),
			});
		}

		self.state = match resolved {
			None => {
				effects.extend([
					PickerEffect::PickupAvailability { variant_id: None },
					PickerEffect::DisableAdd {
						label: AddLabel::Unavailable,
					},
					PickerEffect::HidePrice,
				]);
				PickerState::Unresolved
			}
			Some(variant) => {
				let url = format!("{}?variant={}", self.url, variant.id);
				if let Some(media) = &variant.featured_media {
					effects.push(PickerEffect::ActiveMedia { media_id: media.id });
				}
				if self.update_url {
					effects.push(PickerEffect::ReplaceUrl { url: url.clone() });
				}
				effects.extend([
					PickerEffect::SetFormVariant { variant_id: variant.id },
					PickerEffect::ShareUrl { url },
					PickerEffect::PickupAvailability {
						variant_id: variant.available.then_some(variant.id),
					},
					PickerEffect::ShowPrice,
					if variant.available {
						PickerEffect::EnableAdd
					} else {
						PickerEffect::DisableAdd { label: AddLabel::SoldOut }
					},
					PickerEffect::FetchQuantityRules { variant_id: variant.id },
				]);
				if variant.available {
					PickerState::Resolved(variant)
				} else {
					PickerState::Unavailable(variant)
				}
			}
		};

		Ok(PickerOutcome {
			state: self.state.clone(),
			selection: self.selection.clone(),
			auto_advanced,
			effects,
		})
	}
}

#[cfg(test)]
mod tests;
