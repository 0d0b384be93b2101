use cartsync_bus::{BusEvent, EventBus, EventName, SurfaceId};
use cartsync_dom::Document;
use pretty_assertions::assert_eq;
use tokio::sync::mpsc;

use super::*;
use crate::quantity::QuantityRules;
use crate::reconcile::section_keys;

const CART_PAGE: &str = r#"
	<cart-items id="main-cart-items" data-id="template--main__cart-items"><div class="js-contents"></div></cart-items>
	<div id="main-cart-footer" data-id="template--main__cart-footer"><div class="js-contents"></div></div>
	<div id="cart-icon-bubble"><div class="shopify-section"></div></div>
	<p id="cart-live-region-text"><span class="shopify-section"></span></p>
	<cart-drawer id="CartDrawer"><div class="drawer__inner"><cart-drawer-items id="CartDrawer-CartItems"></cart-drawer-items></div></cart-drawer>
"#;

fn registry() -> (EventBus, SurfaceRegistry, mpsc::UnboundedReceiver<SurfaceCommand>) {
	let bus = EventBus::new();
	let (tx, rx) = mpsc::unbounded_channel();
	(bus.clone(), SurfaceRegistry::new(bus, tx), rx)
}

fn drain(rx: &mut mpsc::UnboundedReceiver<SurfaceCommand>) -> Vec<SurfaceCommand> {
	let mut out = Vec::new();
	while let Ok(command) = rx.try_recv() {
		out.push(command);
	}
	out
}

#[test]
fn test_cart_list_reads_section_keys() {
	let page = Document::parse(CART_PAGE);
	let list = CartList::from_page(&page).unwrap();
	assert_eq!(
		section_keys(list.sections_to_render()),
		vec![
			"template--main__cart-items",
			"cart-icon-bubble",
			"cart-live-region-text",
			"template--main__cart-footer",
		]
	);
	assert_eq!(list.anchors().quantity_input(2), "Quantity-2");
	assert_eq!(list.anchors().line_error(1), "Line-item-error-1");
	assert_eq!(
		list.refresh_plan(&EngineConfig::default()),
		RefreshPlan::FetchSection {
			path: "/cart".into(),
			section_id: "main-cart-items".into(),
			selector: "cart-items".into(),
		}
	);
}

#[test]
fn test_cart_list_without_footer() {
	let page = Document::parse(r#"<cart-items id="main-cart-items"></cart-items>"#);
	let list = CartList::from_page(&page).unwrap();
	assert_eq!(
		section_keys(list.sections_to_render()),
		vec!["main-cart-items", "cart-icon-bubble", "cart-live-region-text"]
	);
}

#[test]
fn test_cart_drawer_requires_both_anchors() {
	let page = Document::parse(CART_PAGE);
	let drawer = CartDrawer::from_page(&page).unwrap();
	assert_eq!(drawer.anchors().line_item(3), "CartDrawer-Item-3");
	assert_eq!(drawer.refresh_plan(&EngineConfig::default()), RefreshPlan::UpdateCart);
	assert!(drawer.sections_to_render()[0].preserve_client_state);

	let page = Document::parse(r#"<cart-drawer id="CartDrawer"></cart-drawer>"#);
	assert_eq!(
		CartDrawer::from_page(&page).unwrap_err(),
		ContractError::MissingAnchor("CartDrawer-CartItems".into())
	);
}

#[test]
fn test_foreign_cart_update_enqueues_refresh() {
	let page = Document::parse(CART_PAGE);
	let (bus, mut registry, mut rx) = registry();
	let list = registry.mount(Surface::CartList(CartList::from_page(&page).unwrap()));
	let other = SurfaceId(99);

	bus.publish(&BusEvent::CartUpdate { source: list }).unwrap();
	assert_eq!(drain(&mut rx), vec![]);

	bus.publish(&BusEvent::CartUpdate { source: other }).unwrap();
	assert_eq!(drain(&mut rx), vec![SurfaceCommand::Refresh { surface: list }]);

	// The list does not listen for drawer refreshes.
	bus.publish(&BusEvent::CartRefresh { source: other }).unwrap();
	assert_eq!(drain(&mut rx), vec![]);
}

#[test]
fn test_drawer_refreshes_on_cart_refresh() {
	let page = Document::parse(CART_PAGE);
	let (bus, mut registry, mut rx) = registry();
	let list = registry.mount(Surface::CartList(CartList::from_page(&page).unwrap()));
	let drawer = registry.mount(Surface::CartDrawer(CartDrawer::from_page(&page).unwrap()));

	bus.publish(&BusEvent::CartRefresh { source: list }).unwrap();
	assert_eq!(drain(&mut rx), vec![SurfaceCommand::Refresh { surface: drawer }]);
	assert_eq!(registry.find(SurfaceKind::CartDrawer), Some(drawer));
	assert_eq!(registry.ids().collect::<Vec<_>>(), vec![list, drawer]);
}

#[test]
fn test_unmount_releases_subscriptions() {
	let page = Document::parse(CART_PAGE);
	let (bus, mut registry, mut rx) = registry();
	let list = registry.mount(Surface::CartList(CartList::from_page(&page).unwrap()));
	assert_eq!(bus.subscriber_count(EventName::CartUpdate), 1);

	let surface = registry.unmount(list).unwrap();
	assert_eq!(surface.kind(), SurfaceKind::CartList);
	assert_eq!(bus.subscriber_count(EventName::CartUpdate), 0);
	assert!(registry.is_empty());
	assert!(registry.unmount(list).is_none());

	bus.publish(&BusEvent::CartUpdate { source: SurfaceId(7) }).unwrap();
	assert_eq!(drain(&mut rx), vec![]);
}

#[test]
fn test_quantity_rules_filter_variant_changes() {
	let page = Document::parse(
		r#"<product-info id="ProductInfo-main"><input class="quantity__input"></product-info>
		<product-info id="ProductInfo-copy" data-original-section="main"><input class="quantity__input"></product-info>"#,
	);
	let (bus, mut registry, mut rx) = registry();
	let main = registry.mount(Surface::QuantityRules(QuantityRules::from_page(&page, "main").unwrap()));
	let copy = registry.mount(Surface::QuantityRules(QuantityRules::from_page(&page, "copy").unwrap()));

	bus.publish(&BusEvent::VariantChange {
		section_id: "other".into(),
		html: String::new(),
	})
	.unwrap();
	assert_eq!(drain(&mut rx), vec![]);

	bus.publish(&BusEvent::VariantChange {
		section_id: "main".into(),
		html: "<div></div>".into(),
	})
	.unwrap();
	assert_eq!(
		drain(&mut rx),
		vec![
			SurfaceCommand::ApplyQuantityRules {
				surface: main,
				html: "<div></div>".into(),
			},
			SurfaceCommand::ApplyQuantityRules {
				surface: copy,
				html: "<div></div>".into(),
			},
		]
	);

	// A copy marked with data-original-section does not follow the cart.
	bus.publish(&BusEvent::CartUpdate { source: SurfaceId(50) }).unwrap();
	assert_eq!(drain(&mut rx), vec![SurfaceCommand::RefreshQuantityRules { surface: main }]);

	bus.publish(&BusEvent::QuantityUpdate).unwrap();
	assert_eq!(
		drain(&mut rx),
		vec![
			SurfaceCommand::ValidateQuantity { surface: main },
			SurfaceCommand::ValidateQuantity { surface: copy },
		]
	);
}

#[test]
fn test_closed_queue_faults_handler() {
	let page = Document::parse(CART_PAGE);
	let (bus, mut registry, rx) = registry();
	registry.mount(Surface::CartList(CartList::from_page(&page).unwrap()));
	drop(rx);

	let fault = bus.publish(&BusEvent::CartUpdate { source: SurfaceId(3) }).unwrap_err();
	assert!(fault.to_string().contains("command queue closed"));
}
