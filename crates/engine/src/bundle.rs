//! Bundle deals: several products bought together at a discount.
//!
//! Each slot has a checkbox and, for products with variants, a set of option
//! selects backed by the product's embedded variant list. Slot prices carry
//! the slot's own discount (`percentage_left`, `fixed_discount`); the bundle
//! total applies the bundle-wide discount on top.

use cartsync_dom::{Document, NodeId};
use tracing::debug;

use crate::error::ContractError;
use crate::variant::{PickerState, VariantResolver, same_value};

const CHECKBOX: &str = ".bundle-deals__checkbox-js";
const VARIANT_SELECTS: &str = ".bundle-deals__variant-selects-js";
const MEDIA_CONTAINER: &str = ".bundle-deals__media-item-container-js";
const MEDIA_IMG: &str = ".bundle-deals__media-item-img-js";
const PRICE: &str = ".bundle-deals__price-js";
const COMPARE_PRICE: &str = ".bundle-deals__compare-price-js";
const TOTAL: &str = ".bundle-deals__total-price-js";
const TOTAL_COMPARE: &str = ".bundle-deals__total-compare-price-js";
const FORM_ID: &str = "items[][id]";

#[derive(Debug, Clone, PartialEq)]
pub struct BundleSlot {
	pub variant_id: Option<u64>,
	/// Discounted price in minor units.
	pub price: u64,
	pub compare_price: u64,
	pub checked: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Discount {
	percentage_left: f64,
	fixed_discount: f64,
}

impl Discount {
	fn read(page: &Document, node: NodeId) -> Self {
		let num = |name: &str, default: f64| {
			page.attr(node, name)
				.and_then(|v| v.trim().parse::<f64>().ok())
				.unwrap_or(default)
		};
		Self {
			percentage_left: num("data-percentage-left", 1.0),
			fixed_discount: num("data-fixed-discount", 0.0),
		}
	}

	fn apply(self, amount: u64) -> u64 {
		let discounted = amount as f64 * self.percentage_left - self.fixed_discount;
		discounted.max(0.0).round() as u64
	}
}

/// `{symbol}{units}.{cents}`.
pub fn format_money(symbol: &str, cents: u64) -> String {
	format!("{symbol}{}.{:02}", cents / 100, cents % 100)
}

/// `<bundle-deals>` state.
#[derive(Debug, Clone)]
pub struct BundlePicker {
	root_id: String,
	update_prices: bool,
	discount: Discount,
	currency_symbol: String,
	skip_non_existent: bool,
	skip_unavailable: bool,
	slots: Vec<BundleSlot>,
}

fn parse_u64(page: &Document, node: NodeId, name: &str) -> Option<u64> {
	page.attr(node, name).and_then(|v| v.trim().parse().ok())
}

impl BundlePicker {
	/// Every product starts checked, with the variant and prices its
	/// checkbox was rendered with.
	pub fn from_page(page: &Document, root_id: &str) -> Result<Self, ContractError> {
		let root = page
			.element_by_id(root_id)
			.ok_or_else(|| ContractError::MissingAnchor(root_id.to_string()))?;

		let slots = page
			.query_all(root, CHECKBOX)?
			.into_iter()
			.map(|checkbox| {
				let price = parse_u64(page, checkbox, "data-price").unwrap_or(0);
				BundleSlot {
					variant_id: parse_u64(page, checkbox, "data-id"),
					price,
					compare_price: parse_u64(page, checkbox, "data-compare-price").unwrap_or(price),
					checked: true,
				}
			})
			.collect();

		Ok(Self {
			root_id: root_id.to_string(),
			update_prices: page.attr(root, "data-update-prices") == Some("true"),
			discount: Discount::read(page, root),
			currency_symbol: page.attr(root, "data-currency-symbol").unwrap_or("$").to_string(),
			skip_non_existent: page.attr(root, "data-skip-non-existent") == Some("true"),
			skip_unavailable: page.attr(root, "data-skip-unavailable") == Some("true"),
			slots,
		})
	}

	pub fn slots(&self) -> &[BundleSlot] {
		&self.slots
	}

	/// Variant ids submitted with the form: the checked slots, in order.
	pub fn form_variant_ids(&self) -> Vec<u64> {
		self.slots
			.iter()
			.filter(|s| s.checked)
			.filter_map(|s| s.variant_id)
			.collect()
	}

	/// `(total, compare_total)` over the checked slots.
	pub fn totals(&self) -> (u64, u64) {
		let (price, compare) = self
			.slots
			.iter()
			.filter(|s| s.checked)
			.fold((0, 0), |(p, c), s| (p + s.price, c + s.compare_price));
		(self.discount.apply(price), compare)
	}

	/// Rewrites the bundle form's hidden id inputs to [`Self::form_variant_ids`].
	pub fn write_form_ids(&self, page: &mut Document) -> Result<(), ContractError> {
		let root = self.root(page)?;
		let Some(form) = page.query(root, "form")? else {
			debug!(bundle = %self.root_id, "bundle.no_form");
			return Ok(());
		};
		for input in page.query_all(form, &format!(r#"input[name="{FORM_ID}"]"#))? {
			page.remove(input);
		}
		for id in self.form_variant_ids() {
			let value = id.to_string();
			let input = page.create_element("input", &[("type", "hidden"), ("name", FORM_ID), ("value", &value)]);
			page.append_child(form, input);
		}
		Ok(())
	}

	fn root(&self, page: &Document) -> Result<NodeId, ContractError> {
		page.element_by_id(&self.root_id)
			.ok_or_else(|| ContractError::MissingAnchor(self.root_id.clone()))
	}

	fn nth(page: &Document, root: NodeId, selector: &str, index: usize) -> Result<Option<NodeId>, ContractError> {
		Ok(page.query_all(root, selector)?.get(index).copied())
	}

	/// Includes or excludes a product.
	pub fn toggle_slot(&mut self, page: &mut Document, index: usize, checked: bool) -> Result<(), ContractError> {
		let slot = self.slots.get_mut(index).ok_or(ContractError::UnknownAxis(index))?;
		slot.checked = checked;

		let root = self.root(page)?;
		if let Some(media) = Self::nth(page, root, MEDIA_CONTAINER, index)? {
			page.toggle_class(media, "bundle-deals__media-item--disabled", !checked);
		}
		if let Some(container) = Self::nth(page, root, VARIANT_SELECTS, index)? {
			page.toggle_class(container, "bundle-deals__product--deselected", !checked);
			for select in page.query_all(container, "select")? {
				page.toggle_attr(select, "disabled", !checked);
			}
		}

		self.write_form_ids(page)?;
		if self.update_prices {
			self.render_totals(page)?;
		}
		Ok(())
	}

	/// Changes one option of a product and re-resolves its variant.
	pub fn select_variant(
		&mut self,
		page: &mut Document,
		index: usize,
		axis: usize,
		value: &str,
	) -> Result<PickerState, ContractError> {
		if index >= self.slots.len() {
			return Err(ContractError::UnknownAxis(index));
		}
		let root = self.root(page)?;
		let container = Self::nth(page, root, VARIANT_SELECTS, index)?
			.ok_or_else(|| ContractError::MissingAnchor(format!("{} {VARIANT_SELECTS}:{index}", self.root_id)))?;
		let selects = page.query_all(container, "select")?;
		let select = *selects.get(axis).ok_or(ContractError::UnknownAxis(axis))?;
		page.select_option(select, value);

		let data = page
			.query(container, r#"script[type="application/json"]"#)?
			.ok_or_else(|| ContractError::EmbeddedData(format!("bundle product {index} has no variant data")))?;
		let resolver = VariantResolver::from_json(&page.text_content(data))
			.map_err(|err| ContractError::EmbeddedData(err.to_string()))?;

		let mut selection: Vec<String> = selects.iter().map(|&s| page.value(s).unwrap_or_default()).collect();
		if let Some(slot) = selection.get_mut(axis)
			&& !same_value(slot, value)
		{
			*slot = value.to_string();
		}

		let resolved = match resolver.resolve(&selection) {
			None if self.skip_non_existent => resolver.nearest(&selection, axis, self.skip_unavailable),
			None => None,
			Some(v) if !v.available && self.skip_unavailable => resolver.nearest(&selection, axis, true).or(Some(v)),
			Some(v) => Some(v),
		};
		let Some(variant) = resolved.cloned() else {
			debug!(bundle = %self.root_id, index, "bundle.variant_unresolved");
			return Ok(PickerState::Unresolved);
		};

		if variant.options != selection {
			for (&select, option) in selects.iter().zip(&variant.options) {
				page.select_option(select, option);
			}
		}

		let discount = Discount::read(page, container);
		let base = variant.price.unwrap_or(0);
		let price = discount.apply(base);
		let compare_price = variant.compare_at_price.unwrap_or(base);
		let slot = &mut self.slots[index];
		slot.variant_id = Some(variant.id);
		slot.price = price;
		slot.compare_price = compare_price;

		self.write_form_ids(page)?;
		if self.update_prices {
			if let Some(node) = Self::nth(page, root, PRICE, index)? {
				page.set_text(node, &format_money(&self.currency_symbol, price));
			}
			if let Some(node) = Self::nth(page, root, COMPARE_PRICE, index)? {
				let text = if compare_price > price {
					format_money(&self.currency_symbol, compare_price)
				} else {
					String::new()
				};
				page.set_text(node, &text);
			}
			self.render_totals(page)?;
		}

		if let Some(image) = variant.featured_image.as_ref().filter(|i| !i.src.is_empty())
			&& let Some(img) = Self::nth(page, root, MEDIA_IMG, index)?
		{
			page.set_attr(img, "src", &image.src);
		}

		Ok(if variant.available {
			PickerState::Resolved(variant)
		} else {
			PickerState::Unavailable(variant)
		})
	}

	fn render_totals(&self, page: &mut Document) -> Result<(), ContractError> {
		let root = self.root(page)?;
		let (total, compare) = self.totals();
		if let Some(node) = page.query(root, TOTAL)? {
			page.set_text(node, &format_money(&self.currency_symbol, total));
		}
		if let Some(node) = page.query(root, TOTAL_COMPARE)? {
			let text = if compare > total {
				format_money(&self.currency_symbol, compare)
			} else {
				String::new()
			};
			page.set_text(node, &text);
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;

	const PAGE: &str = r#"<bundle-deals id="BundleDeals-main" data-update-prices="true" data-percentage-left="0.9" data-fixed-discount="0" data-currency-symbol="€" data-skip-non-existent="true">
		<div class="bundle-deals__media-item-container-js"><img class="bundle-deals__media-item-img-js" src="/a.png"></div>
		<div class="bundle-deals__media-item-container-js"><img class="bundle-deals__media-item-img-js" src="/b-red.png"></div>
		<input type="checkbox" class="bundle-deals__checkbox-js" data-index="0" data-id-index="id_1" data-id="10" data-price="1000" data-compare-price="1200" checked>
		<input type="checkbox" class="bundle-deals__checkbox-js" data-index="1" data-id-index="id_2" data-id="20" data-price="2000" checked>
		<div class="bundle-deals__variant-selects-js" data-index="0"></div>
		<div class="bundle-deals__variant-selects-js" data-index="1" data-percentage-left="0.5" data-fixed-discount="100">
			<select name="Color"><option value="Red" selected>Red</option><option value="Blue">Blue</option></select>
			<select name="Size"><option value="S" selected>S</option><option value="L">L</option></select>
			<script type="application/json">[
				{"id": 20, "options": ["Red", "S"], "available": true, "price": 2000},
				{"id": 21, "options": ["Blue", "L"], "available": true, "price": 3000, "compare_at_price": 4000, "featured_image": {"src": "/b-blue.png"}}
			]</script>
		</div>
		<span class="bundle-deals__price-js"></span><span class="bundle-deals__compare-price-js"></span>
		<span class="bundle-deals__price-js"></span><span class="bundle-deals__compare-price-js"></span>
		<span class="bundle-deals__total-price-js"></span><span class="bundle-deals__total-compare-price-js"></span>
		<form id="BundleForm-main"><input type="hidden" name="items[][id]" value="10"><button type="submit">Add</button></form>
	</bundle-deals>"#;

	fn submitted_ids(page: &Document) -> Vec<String> {
		page.query_all(page.root(), r#"#BundleForm-main input[name="items[][id]"]"#)
			.unwrap()
			.into_iter()
			.filter_map(|input| page.value(input))
			.collect()
	}

	fn text(page: &Document, selector: &str, index: usize) -> String {
		let node = page.query_all(page.root(), selector).unwrap()[index];
		page.text_content(node)
	}

	#[test]
	fn test_format_money() {
		assert_eq!(format_money("$", 1999), "$19.99");
		assert_eq!(format_money("€", 5), "€0.05");
	}

	#[test]
	fn test_initial_slots_and_totals() {
		let page = Document::parse(PAGE);
		let bundle = BundlePicker::from_page(&page, "BundleDeals-main").unwrap();
		assert_eq!(bundle.form_variant_ids(), vec![10, 20]);
		assert_eq!(bundle.totals(), (2700, 3200));
	}

	#[test]
	fn test_toggle_slot_updates_form_and_totals() {
		let mut page = Document::parse(PAGE);
		let mut bundle = BundlePicker::from_page(&page, "BundleDeals-main").unwrap();

		bundle.write_form_ids(&mut page).unwrap();
		assert_eq!(submitted_ids(&page), vec!["10", "20"]);

		bundle.toggle_slot(&mut page, 1, false).unwrap();
		assert_eq!(bundle.form_variant_ids(), vec![10]);
		assert_eq!(submitted_ids(&page), vec!["10"]);
		assert_eq!(text(&page, TOTAL, 0), "€9.00");
		assert_eq!(text(&page, TOTAL_COMPARE, 0), "€12.00");

		let container = page.query_all(page.root(), VARIANT_SELECTS).unwrap()[1];
		assert!(page.has_class(container, "bundle-deals__product--deselected"));
		let select = page.query(container, "select").unwrap().unwrap();
		assert!(page.has_attr(select, "disabled"));
		let media = page.query_all(page.root(), MEDIA_CONTAINER).unwrap()[1];
		assert!(page.has_class(media, "bundle-deals__media-item--disabled"));

		bundle.toggle_slot(&mut page, 1, true).unwrap();
		assert!(!page.has_attr(select, "disabled"));
		assert_eq!(bundle.form_variant_ids(), vec![10, 20]);
		assert_eq!(submitted_ids(&page), vec!["10", "20"]);
	}

	#[test]
	fn test_select_variant_applies_slot_discount() {
		let mut page = Document::parse(PAGE);
		let mut bundle = BundlePicker::from_page(&page, "BundleDeals-main").unwrap();

		// Blue S does not exist; skip-nonexistent moves Size to L.
		let state = bundle.select_variant(&mut page, 1, 0, "blue").unwrap();
		assert!(matches!(state, PickerState::Resolved(ref v) if v.id == 21));
		assert_eq!(bundle.form_variant_ids(), vec![10, 21]);
		assert_eq!(submitted_ids(&page), vec!["10", "21"]);

		// 3000 * 0.5 - 100
		assert_eq!(bundle.slots()[1].price, 1400);
		assert_eq!(bundle.slots()[1].compare_price, 4000);
		assert_eq!(text(&page, PRICE, 1), "€14.00");
		assert_eq!(text(&page, COMPARE_PRICE, 1), "€40.00");

		let size = page.query_all(page.root(), "select").unwrap()[1];
		assert_eq!(page.value(size).as_deref(), Some("L"));
		let img = page.query_all(page.root(), MEDIA_IMG).unwrap()[1];
		assert_eq!(page.attr(img, "src"), Some("/b-blue.png"));
	}

	#[test]
	fn test_select_variant_errors() {
		let mut page = Document::parse(PAGE);
		let mut bundle = BundlePicker::from_page(&page, "BundleDeals-main").unwrap();
		assert_eq!(bundle.select_variant(&mut page, 1, 5, "x").unwrap_err(), ContractError::UnknownAxis(5));
		assert!(matches!(
			bundle.select_variant(&mut page, 0, 0, "x"),
			Err(ContractError::UnknownAxis(0))
		));
	}
}
