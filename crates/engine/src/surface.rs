//! Surfaces: independently mounted components that take part in cart sync.
//!
//! The two cart surfaces (the cart page list and the drawer) share the
//! [`CartSurface`] interface. They differ only in their element-id scheme,
//! the sections they render and how they re-fetch themselves, so both are
//! plain data behind the trait. Surfaces never hold references into each
//! other or into the live document; every lookup goes through element ids at
//! the time it is needed, so a surface whose markup was replaced is still
//! addressed correctly.

use std::fmt;

use cartsync_bus::{EventName, SurfaceId};
use cartsync_dom::Document;

use crate::config::EngineConfig;
use crate::error::ContractError;
use crate::reconcile::SectionDescriptor;

mod registry;

pub use registry::{Surface, SurfaceRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurfaceKind {
	CartList,
	CartDrawer,
	ProductForm,
	VariantPicker,
	QuantityRules,
	BundlePicker,
}

impl fmt::Display for SurfaceKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			SurfaceKind::CartList => "cart-items",
			SurfaceKind::CartDrawer => "cart-drawer-items",
			SurfaceKind::ProductForm => "product-form",
			SurfaceKind::VariantPicker => "variant-selects",
			SurfaceKind::QuantityRules => "product-info",
			SurfaceKind::BundlePicker => "bundle-deals",
		})
	}
}

/// Work requested by a bus handler, executed by the engine on its next tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceCommand {
	/// Re-fetch a cart surface following its [`RefreshPlan`].
	Refresh { surface: SurfaceId },
	/// Re-fetch quantity rules for the product's current variant.
	RefreshQuantityRules { surface: SurfaceId },
	/// Apply quantity rules from a section rendered for a new variant.
	ApplyQuantityRules { surface: SurfaceId, html: String },
	/// Re-check the +/- buttons against the input bounds.
	ValidateQuantity { surface: SurfaceId },
}

/// How a cart surface re-fetches itself when a peer changed the cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshPlan {
	/// `GET {path}?section_id={section_id}`, then swap the children of the
	/// surface root for those of `selector` in the response.
	FetchSection {
		path: String,
		section_id: String,
		selector: String,
	},
	/// Post an empty cart update asking for the surface's sections, then
	/// reconcile them.
	UpdateCart,
}

/// Element-id scheme of a cart surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartAnchors {
	quantity_prefix: &'static str,
	item_prefix: &'static str,
	line_error_prefix: &'static str,
	/// Generic (not line-scoped) error region.
	pub errors: &'static str,
	/// Cart status region announced after a line message.
	pub live_region: &'static str,
	/// Line item status region shown while a line is loading.
	pub line_status: &'static str,
	/// Container marked `cart__items--disabled` while busy.
	pub items: &'static str,
}

impl CartAnchors {
	pub fn quantity_input(&self, line: usize) -> String {
		format!("{}{line}", self.quantity_prefix)
	}

	pub fn line_item(&self, line: usize) -> String {
		format!("{}{line}", self.item_prefix)
	}

	pub fn line_error(&self, line: usize) -> String {
		format!("{}{line}", self.line_error_prefix)
	}
}

/// Shared interface of the cart list and the cart drawer.
pub trait CartSurface: Send + Sync + fmt::Debug {
	fn kind(&self) -> SurfaceKind;

	/// Id of the element the surface is mounted on.
	fn root_id(&self) -> &str;

	fn anchors(&self) -> &CartAnchors;

	/// Sections requested with every mutation, in reconciliation order.
	fn sections_to_render(&self) -> &[SectionDescriptor];

	fn refresh_plan(&self, config: &EngineConfig) -> RefreshPlan;

	/// Event whose foreign occurrences make this surface refresh itself.
	fn refresh_trigger(&self) -> EventName;

	/// Elements whose `is-empty` class follows the cart's item count.
	fn empty_state_ids(&self) -> &[&'static str];

	/// Control focused when the cart becomes empty.
	fn empty_focus(&self) -> &'static str;
}

/// The cart page's line item list (`<cart-items id="main-cart-items">`).
#[derive(Debug, Clone)]
pub struct CartList {
	anchors: CartAnchors,
	sections: Vec<SectionDescriptor>,
}

const CART_LIST_ROOT: &str = "main-cart-items";
const CART_FOOTER: &str = "main-cart-footer";

impl CartList {
	/// Reads section keys from the mounted markup. The items and footer
	/// sections are keyed by their `data-id`.
	pub fn from_page(page: &Document) -> Result<Self, ContractError> {
		let root = page
			.element_by_id(CART_LIST_ROOT)
			.ok_or_else(|| ContractError::MissingAnchor(CART_LIST_ROOT.to_string()))?;
		let items_key = page.attr(root, "data-id").unwrap_or(CART_LIST_ROOT);

		let mut sections = vec![
			SectionDescriptor::new(CART_LIST_ROOT, items_key).with_selector(".js-contents"),
			SectionDescriptor::new("cart-icon-bubble", "cart-icon-bubble").with_selector(".shopify-section"),
			SectionDescriptor::new("cart-live-region-text", "cart-live-region-text").with_selector(".shopify-section"),
		];
		if let Some(footer) = page.element_by_id(CART_FOOTER) {
			let key = page.attr(footer, "data-id").unwrap_or(CART_FOOTER);
			sections.push(SectionDescriptor::new(CART_FOOTER, key).with_selector(".js-contents"));
		}

		Ok(Self {
			anchors: CartAnchors {
				quantity_prefix: "Quantity-",
				item_prefix: "CartItem-",
				line_error_prefix: "Line-item-error-",
				errors: "cart-errors",
				live_region: "cart-live-region-text",
				line_status: "shopping-cart-line-item-status",
				items: CART_LIST_ROOT,
			},
			sections,
		})
	}
}

impl CartSurface for CartList {
	fn kind(&self) -> SurfaceKind {
		SurfaceKind::CartList
	}

	fn root_id(&self) -> &str {
		CART_LIST_ROOT
	}

	fn anchors(&self) -> &CartAnchors {
		&self.anchors
	}

	fn sections_to_render(&self) -> &[SectionDescriptor] {
		&self.sections
	}

	fn refresh_plan(&self, config: &EngineConfig) -> RefreshPlan {
		RefreshPlan::FetchSection {
			path: config.routes.cart_url.clone(),
			section_id: CART_LIST_ROOT.to_string(),
			selector: "cart-items".to_string(),
		}
	}

	fn refresh_trigger(&self) -> EventName {
		EventName::CartUpdate
	}

	fn empty_state_ids(&self) -> &[&'static str] {
		&[CART_LIST_ROOT, CART_FOOTER]
	}

	fn empty_focus(&self) -> &'static str {
		".cart__warnings a, .drawer__inner-empty a"
	}
}

/// Line items inside the slide-out drawer (`<cart-drawer-items>`).
#[derive(Debug, Clone)]
pub struct CartDrawer {
	anchors: CartAnchors,
	sections: Vec<SectionDescriptor>,
}

const DRAWER_ROOT: &str = "CartDrawer-CartItems";
const DRAWER: &str = "CartDrawer";

impl CartDrawer {
	pub fn from_page(page: &Document) -> Result<Self, ContractError> {
		for id in [DRAWER, DRAWER_ROOT] {
			if page.element_by_id(id).is_none() {
				return Err(ContractError::MissingAnchor(id.to_string()));
			}
		}
		Ok(Self {
			anchors: CartAnchors {
				quantity_prefix: "Drawer-quantity-",
				item_prefix: "CartDrawer-Item-",
				line_error_prefix: "CartDrawer-LineItemError-",
				errors: "CartDrawer-CartErrors",
				live_region: "CartDrawer-LiveRegionText",
				line_status: "CartDrawer-LineItemStatus",
				items: DRAWER_ROOT,
			},
			sections: vec![
				SectionDescriptor::new(DRAWER, "cart-drawer")
					.with_selector(".drawer__inner")
					.preserving_client_state(),
				SectionDescriptor::new("cart-icon-bubble", "cart-icon-bubble").with_selector(".shopify-section"),
			],
		})
	}
}

impl CartSurface for CartDrawer {
	fn kind(&self) -> SurfaceKind {
		SurfaceKind::CartDrawer
	}

	fn root_id(&self) -> &str {
		DRAWER_ROOT
	}

	fn anchors(&self) -> &CartAnchors {
		&self.anchors
	}

	fn sections_to_render(&self) -> &[SectionDescriptor] {
		&self.sections
	}

	fn refresh_plan(&self, _config: &EngineConfig) -> RefreshPlan {
		RefreshPlan::UpdateCart
	}

	fn refresh_trigger(&self) -> EventName {
		EventName::CartRefresh
	}

	fn empty_state_ids(&self) -> &[&'static str] {
		&[DRAWER]
	}

	fn empty_focus(&self) -> &'static str {
		".drawer__inner-empty a"
	}
}

#[cfg(test)]
mod tests;
