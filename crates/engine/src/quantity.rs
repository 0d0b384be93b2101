//! Per-product quantity rules (`<product-info id="ProductInfo-{section}">`).
//!
//! The quantity input carries the server's rules for the current variant:
//! `data-cart-quantity` (already in cart), `data-min`, `data-max` and `step`.
//! Bounds are recomputed whenever the rules change and broadcast with a
//! `quantity-update` event.

use cartsync_dom::{Document, NodeId};

use crate::error::ContractError;

const INPUT: &str = ".quantity__input";
const RULE_ATTRS: [&str; 4] = ["data-cart-quantity", "data-min", "data-max", "step"];
const RULE_SELECTORS: [&str; 3] = [INPUT, ".quantity__rules", ".quantity__label"];

/// Bounds written to the quantity input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuantityBounds {
	pub min: u32,
	pub max: Option<u32>,
}

impl QuantityBounds {
	/// The remaining allowance is `max - cart_quantity`, and `min` never
	/// exceeds it. Once the cart already holds `min`, a single step suffices.
	pub fn compute(cart_quantity: u32, min: u32, max: Option<u32>, step: u32) -> Self {
		let max = max.map(|m| m.saturating_sub(cart_quantity));
		let mut lower = min;
		if let Some(max) = max {
			lower = lower.min(max);
		}
		if cart_quantity >= min {
			lower = lower.min(step);
		}
		Self { min: lower, max }
	}
}

fn parse_attr(page: &Document, node: NodeId, name: &str) -> Option<u32> {
	page.attr(node, name).and_then(|v| v.trim().parse().ok())
}

pub fn rules_root_id(section: &str) -> String {
	format!("ProductInfo-{section}")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuantityRules {
	section: String,
	original_section: Option<String>,
	url: String,
}

impl QuantityRules {
	pub fn from_page(page: &Document, section: &str) -> Result<Self, ContractError> {
		let root_id = rules_root_id(section);
		let root = page
			.element_by_id(&root_id)
			.ok_or_else(|| ContractError::MissingAnchor(root_id.clone()))?;
		if page.query(root, INPUT)?.is_none() {
			return Err(ContractError::MissingAnchor(format!("{root_id} {INPUT}")));
		}
		Ok(Self {
			section: section.to_string(),
			original_section: page.attr(root, "data-original-section").map(str::to_string),
			url: page.attr(root, "data-url").unwrap_or_default().to_string(),
		})
	}

	pub fn section(&self) -> &str {
		&self.section
	}

	pub fn url(&self) -> &str {
		&self.url
	}

	/// Section id matched against `variant-change` events.
	pub fn variant_section(&self) -> &str {
		self.original_section.as_deref().unwrap_or(&self.section)
	}

	/// Duplicated product blocks (quick add, featured product copies) do
	/// not refetch on cart changes.
	pub fn follows_cart(&self) -> bool {
		self.original_section.is_none()
	}

	fn root(&self, page: &Document) -> Result<NodeId, ContractError> {
		let id = rules_root_id(&self.section);
		page.element_by_id(&id).ok_or(ContractError::MissingAnchor(id))
	}

	fn input(&self, page: &Document) -> Result<NodeId, ContractError> {
		let root = self.root(page)?;
		page.query(root, INPUT)?
			.ok_or_else(|| ContractError::MissingAnchor(format!("{} {INPUT}", rules_root_id(&self.section))))
	}

	/// Variant currently selected in the product's form.
	pub fn current_variant(&self, page: &Document) -> Result<Option<u64>, ContractError> {
		let root = self.root(page)?;
		Ok(page
			.query(root, r#"[name="id"]"#)?
			.and_then(|id| page.value(id))
			.and_then(|v| v.trim().parse().ok()))
	}

	/// Recomputes and writes the input's bounds; the value resets to `min`.
	pub fn set_boundaries(&self, page: &mut Document) -> Result<QuantityBounds, ContractError> {
		let input = self.input(page)?;
		let bounds = QuantityBounds::compute(
			parse_attr(page, input, "data-cart-quantity").unwrap_or(0),
			parse_attr(page, input, "data-min").unwrap_or(1),
			parse_attr(page, input, "data-max"),
			parse_attr(page, input, "step").unwrap_or(1),
		);
		page.set_attr(input, "min", &bounds.min.to_string());
		match bounds.max {
			Some(max) => page.set_attr(input, "max", &max.to_string()),
			None => {
				page.remove_attr(input, "max");
			}
		}
		page.set_value(input, &bounds.min.to_string());
		Ok(bounds)
	}

	/// Copies rules from `fresh` (a section rendered for the new variant):
	/// rule attributes of the input, and the rules and label text.
	pub fn apply_rules(&self, page: &mut Document, fresh: &Document) -> Result<(), ContractError> {
		let form_id = format!("Quantity-Form-{}", self.section);
		let fresh_form = fresh
			.element_by_id(&form_id)
			.ok_or_else(|| ContractError::MissingFragmentNode {
				section: self.section.clone(),
				selector: format!("#{form_id}"),
			})?;
		let live_form = match page.element_by_id(&form_id) {
			Some(form) => form,
			None => self.root(page)?,
		};

		for selector in RULE_SELECTORS {
			let (Some(current), Some(updated)) = (page.query(live_form, selector)?, fresh.query(fresh_form, selector)?)
			else {
				continue;
			};
			if selector == INPUT {
				for attr in RULE_ATTRS {
					if let Some(value) = fresh.attr(updated, attr) {
						page.set_attr(current, attr, value);
					}
				}
			} else {
				page.replace_children(current, fresh, updated);
			}
		}
		Ok(())
	}

	/// Disables the minus button at the lower bound and the plus button at
	/// the upper bound.
	pub fn validate_buttons(&self, page: &mut Document) -> Result<(), ContractError> {
		let root = self.root(page)?;
		let input = self.input(page)?;
		let Some(value) = page.value(input).and_then(|v| v.trim().parse::<u32>().ok()) else {
			return Ok(());
		};
		if let (Some(min), Some(minus)) = (
			parse_attr(page, input, "min"),
			page.query(root, r#".quantity__button[name="minus"]"#)?,
		) {
			page.toggle_class(minus, "disabled", value <= min);
		}
		if let (Some(max), Some(plus)) = (
			parse_attr(page, input, "max"),
			page.query(root, r#".quantity__button[name="plus"]"#)?,
		) {
			page.toggle_class(plus, "disabled", value >= max);
		}
		Ok(())
	}

	/// Shows or hides the rules loading overlay. Missing markup is ignored.
	pub fn set_loading(&self, page: &mut Document, loading: bool) -> Result<(), ContractError> {
		let root = self.root(page)?;
		if let Some(overlay) = page.query(root, ".quantity__rules-cart .loading-overlay")? {
			page.toggle_class(overlay, "hidden", !loading);
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;

	const PAGE: &str = r#"<product-info id="ProductInfo-main" data-section="main" data-url="/products/tee">
		<form id="product-form-main"><input type="hidden" name="id" value="11"></form>
		<div id="Quantity-Form-main">
			<label class="quantity__label">Quantity</label>
			<button class="quantity__button" name="minus">-</button>
			<input class="quantity__input" type="number" name="quantity" value="1" data-cart-quantity="0" data-min="2" data-max="10" step="2">
			<button class="quantity__button" name="plus">+</button>
			<div class="quantity__rules">Min 2</div>
			<div class="quantity__rules-cart"><div class="loading-overlay hidden"></div></div>
		</div>
	</product-info>"#;

	fn input(page: &Document) -> NodeId {
		page.query(page.root(), ".quantity__input").unwrap().unwrap()
	}

	#[test]
	fn test_compute_bounds() {
		assert_eq!(QuantityBounds::compute(0, 2, Some(10), 2), QuantityBounds { min: 2, max: Some(10) });
		assert_eq!(QuantityBounds::compute(9, 2, Some(10), 1), QuantityBounds { min: 1, max: Some(1) });
		assert_eq!(QuantityBounds::compute(4, 3, None, 1), QuantityBounds { min: 1, max: None });
		assert_eq!(QuantityBounds::compute(12, 2, Some(10), 1), QuantityBounds { min: 0, max: Some(0) });
	}

	#[test]
	fn test_set_boundaries_writes_input() {
		let mut page = Document::parse(PAGE);
		let rules = QuantityRules::from_page(&page, "main").unwrap();
		assert!(rules.follows_cart());
		assert_eq!(rules.current_variant(&page).unwrap(), Some(11));

		let bounds = rules.set_boundaries(&mut page).unwrap();
		assert_eq!(bounds, QuantityBounds { min: 2, max: Some(10) });
		let input = input(&page);
		assert_eq!(page.attr(input, "min"), Some("2"));
		assert_eq!(page.attr(input, "max"), Some("10"));
		assert_eq!(page.value(input).as_deref(), Some("2"));
	}

	#[test]
	fn test_apply_rules_from_fresh_section() {
		let mut page = Document::parse(PAGE);
		let rules = QuantityRules::from_page(&page, "main").unwrap();
		let fresh = Document::parse(
			r#"<div id="Quantity-Form-main"><label class="quantity__label">Quantity (3 in cart)</label>
			<input class="quantity__input" data-cart-quantity="3" data-min="1" data-max="5" step="1">
			<div class="quantity__rules">Max 5</div></div>"#,
		);

		rules.apply_rules(&mut page, &fresh).unwrap();
		rules.set_boundaries(&mut page).unwrap();

		let input = input(&page);
		assert_eq!(page.attr(input, "data-cart-quantity"), Some("3"));
		assert_eq!(page.attr(input, "max"), Some("2"));
		assert_eq!(page.attr(input, "min"), Some("1"));
		let label = page.query(page.root(), ".quantity__label").unwrap().unwrap();
		assert_eq!(page.text_content(label), "Quantity (3 in cart)");

		let err = rules.apply_rules(&mut page, &Document::parse("<p></p>")).unwrap_err();
		assert!(matches!(err, ContractError::MissingFragmentNode { .. }));
	}

	#[test]
	fn test_validate_buttons() {
		let mut page = Document::parse(PAGE);
		let rules = QuantityRules::from_page(&page, "main").unwrap();
		rules.set_boundaries(&mut page).unwrap();
		rules.validate_buttons(&mut page).unwrap();

		let minus = page.query(page.root(), r#"[name="minus"]"#).unwrap().unwrap();
		let plus = page.query(page.root(), r#"[name="plus"]"#).unwrap().unwrap();
		assert!(page.has_class(minus, "disabled"));
		assert!(!page.has_class(plus, "disabled"));

		let input = input(&page);
		page.set_value(input, "10");
		rules.validate_buttons(&mut page).unwrap();
		assert!(!page.has_class(minus, "disabled"));
		assert!(page.has_class(plus, "disabled"));
	}

	#[test]
	fn test_original_section_follows_variant_only() {
		let page = Document::parse(
			r#"<product-info id="ProductInfo-copy" data-original-section="main"><input class="quantity__input"></product-info>"#,
		);
		let rules = QuantityRules::from_page(&page, "copy").unwrap();
		assert!(!rules.follows_cart());
		assert_eq!(rules.variant_section(), "main");

		assert!(matches!(
			QuantityRules::from_page(&Document::parse("<div></div>"), "main"),
			Err(ContractError::MissingAnchor(_))
		));
	}
}
