use pretty_assertions::assert_eq;

use super::*;

const CART: &str = r#"<cart-items id="main-cart-items" class="cart"><div class="js-contents"><input id="Quantity-1" name="updates[]" value="1"><span class="price">&lt;5&gt;</span></div></cart-items>"#;

#[test]
fn test_parse_and_serialize_round_trip() {
	let doc = Document::parse(CART);
	assert_eq!(doc.to_html(), CART);
}

#[test]
fn test_element_by_id_and_query() {
	let doc = Document::parse(CART);
	let input = doc.element_by_id("Quantity-1").unwrap();
	assert_eq!(doc.tag(input), Some("input"));

	let contents = doc.query(doc.root(), ".js-contents").unwrap().unwrap();
	assert!(doc.is_descendant_of(input, contents));
	assert_eq!(doc.query_all(doc.root(), "span, input").unwrap().len(), 2);
}

#[test]
fn test_value_property_overlays_attribute() {
	let mut doc = Document::parse(CART);
	let input = doc.element_by_id("Quantity-1").unwrap();

	doc.set_value(input, "3");
	assert_eq!(doc.value(input).as_deref(), Some("3"));
	assert_eq!(doc.attr(input, "value"), Some("1"));

	doc.reset_value(input);
	assert_eq!(doc.value(input).as_deref(), Some("1"));
}

#[test]
fn test_toggle_class_keeps_other_classes() {
	let mut doc = Document::parse(CART);
	let root = doc.element_by_id("main-cart-items").unwrap();

	doc.toggle_class(root, "is-empty", true);
	doc.toggle_class(root, "is-empty", true);
	assert_eq!(doc.attr(root, "class"), Some("cart is-empty"));

	doc.remove_class(root, "cart");
	doc.remove_class(root, "is-empty");
	assert_eq!(doc.attr(root, "class"), None);
}

#[test]
fn test_replace_children_imports_from_other_document() {
	let mut live = Document::parse(CART);
	let fresh = Document::parse(r#"<div class="js-contents"><p>fresh</p></div>"#);

	let target = live.query(live.root(), ".js-contents").unwrap().unwrap();
	let source = fresh.query(fresh.root(), ".js-contents").unwrap().unwrap();
	live.replace_children(target, &fresh, source);

	assert_eq!(live.inner_html(target), "<p>fresh</p>");
	assert!(live.element_by_id("Quantity-1").is_none());
}

#[test]
fn test_focus_cleared_when_node_removed() {
	let mut doc = Document::parse(CART);
	let input = doc.element_by_id("Quantity-1").unwrap();
	doc.focus(input);
	assert_eq!(doc.focused(), Some(input));

	let contents = doc.query(doc.root(), ".js-contents").unwrap().unwrap();
	doc.clear_children(contents);
	assert_eq!(doc.focused(), None);
}

#[test]
fn test_select_option_is_case_insensitive() {
	let mut doc = Document::parse(
		r#"<select name="Size"><option value="S">S</option><option value="XL" selected>XL</option></select>"#,
	);
	let select = doc.query(doc.root(), "select").unwrap().unwrap();
	assert_eq!(doc.value(select).as_deref(), Some("XL"));

	assert!(doc.select_option(select, "s"));
	assert_eq!(doc.value(select).as_deref(), Some("S"));
	assert!(!doc.select_option(select, "M"));
	assert_eq!(doc.option_values(select), vec!["S".to_string(), "XL".to_string()]);
}

#[test]
fn test_checking_radio_unchecks_group() {
	let mut doc = Document::parse(
		r#"<fieldset><input type="radio" name="Color" value="Red" checked><input type="radio" name="Color" value="Blue"></fieldset>"#,
	);
	let radios = doc.query_all(doc.root(), "input").unwrap();
	assert!(doc.checked(radios[0]));

	doc.set_checked(radios[1], true);
	assert!(!doc.checked(radios[0]));
	assert!(doc.checked(radios[1]));
}

#[test]
fn test_script_text_is_not_escaped() {
	let json = r#"<script type="application/json">[{"id":1,"title":"A & B"}]</script>"#;
	let doc = Document::parse(json);
	let script = doc.query(doc.root(), "script").unwrap().unwrap();
	assert_eq!(doc.text_content(script), r#"[{"id":1,"title":"A & B"}]"#);
	assert_eq!(doc.to_html(), json);
}
