use cartsync_dom::Document;
use pretty_assertions::assert_eq;
use proptest::prelude::*;

use super::*;

const VARIANTS: &str = r#"[
	{"id": 1, "options": ["Red", "S"], "available": true, "featured_media": {"id": 501}, "price": 1500},
	{"id": 2, "options": ["Red", "M"], "available": false, "price": 1500},
	{"id": 3, "options": ["Red", "L"], "available": true, "price": 1700},
	{"id": 4, "options": ["Blue", "XL"], "available": true, "price": 1900}
]"#;

fn sel(values: &[&str]) -> Vec<String> {
	values.iter().map(|v| (*v).to_string()).collect()
}

fn resolver() -> VariantResolver {
	VariantResolver::from_json(VARIANTS).unwrap()
}

fn picker_page(skip_non_existent: bool, skip_unavailable: bool) -> Document {
	Document::parse(&format!(
		r#"<variant-selects id="variant-selects-main" data-section="main" data-url="/products/tee"
			data-skip-non-existent="{skip_non_existent}" data-skip-unavailable="{skip_unavailable}">
		<fieldset class="product-form__input">
			<input type="radio" name="Color" value="Red">
			<input type="radio" name="Color" value="Blue" checked>
		</fieldset>
		<fieldset class="product-form__input">
			<select name="Size"><option value="S">S</option><option value="M">M</option><option value="L">L</option><option value="XL" selected>XL</option></select>
		</fieldset>
		<script type="application/json">{VARIANTS}</script>
		</variant-selects>"#
	))
}

#[test]
fn test_resolve_ignores_case() {
	let r = resolver();
	assert_eq!(r.resolve(&sel(&["red", "l"])).map(|v| v.id), Some(3));
	assert_eq!(r.resolve(&sel(&["Red", "XL"])), None);
	assert_eq!(r.resolve(&sel(&["Red"])), None);
}

#[test]
fn test_state_classification() {
	let r = resolver();
	assert!(matches!(r.state(&sel(&["Red", "S"])), PickerState::Resolved(v) if v.id == 1));
	assert!(matches!(r.state(&sel(&["Red", "M"])), PickerState::Unavailable(v) if v.id == 2));
	assert_eq!(r.state(&sel(&["Green", "S"])), PickerState::Unresolved);
}

#[test]
fn test_nearest_prefers_agreement_then_document_order() {
	let r = resolver();
	// Anchored on Red; no Red XL, every Red variant agrees on one axis.
	assert_eq!(r.nearest(&sel(&["Red", "XL"]), 0, false).map(|v| v.id), Some(1));
	assert_eq!(r.nearest(&sel(&["Red", "M"]), 0, true).map(|v| v.id), Some(1));
	assert_eq!(r.nearest(&sel(&["Green", "S"]), 0, false), None);
	assert_eq!(r.nearest(&sel(&["Red", "S"]), 5, false), None);
}

#[test]
fn test_available_values_follow_earlier_axes() {
	let r = resolver();
	assert_eq!(r.available_values(&sel(&["Red", "S"]), 1), sel(&["S", "L"]));
	assert_eq!(r.available_values(&sel(&["Blue", "S"]), 1), sel(&["XL"]));
	assert_eq!(r.available_values(&sel(&["Red", "S"]), 0), sel(&["Red", "Blue"]));
}

#[test]
fn test_from_page_reads_selection_and_policies() {
	let page = picker_page(true, false);
	let picker = VariantPicker::from_page(&page, "main").unwrap();
	assert_eq!(picker.selection(), sel(&["Blue", "XL"]).as_slice());
	assert_eq!(picker.axes().len(), 2);
	assert_eq!(picker.axes()[0].control, AxisControl::Radios);
	assert_eq!(picker.axes()[1].name.as_deref(), Some("Size"));
	assert!(matches!(picker.state(), PickerState::Resolved(v) if v.id == 4));
	assert_eq!(picker.url(), "/products/tee");
}

#[test]
fn test_from_page_errors() {
	let page = Document::parse(r#"<variant-selects id="variant-selects-x"><fieldset><select name="A"><option>1</option></select></fieldset></variant-selects>"#);
	assert!(matches!(VariantPicker::from_page(&page, "x"), Err(ContractError::EmbeddedData(_))));
	assert!(matches!(
		VariantPicker::from_page(&page, "y"),
		Err(ContractError::MissingAnchor(id)) if id == "variant-selects-y"
	));

	let page = Document::parse(r#"<variant-selects id="variant-selects-x"><script type="application/json">{not json</script></variant-selects>"#);
	assert!(matches!(VariantPicker::from_page(&page, "x"), Err(ContractError::EmbeddedData(_))));
}

#[test]
fn test_skip_non_existent_auto_resolves_red() {
	let mut picker = VariantPicker::from_page(&picker_page(true, false), "main").unwrap();

	let outcome = picker.select(0, "Red").unwrap();
	assert!(outcome.auto_advanced);
	assert_eq!(outcome.selection, sel(&["Red", "S"]));
	assert!(matches!(&outcome.state, PickerState::Resolved(v) if v.id == 1));
	assert!(outcome.effects.contains(&PickerEffect::SyncInputs {
		selection: sel(&["Red", "S"]),
	}));
	assert!(outcome.effects.contains(&PickerEffect::EnableAdd));
	assert!(outcome.effects.contains(&PickerEffect::SetFormVariant { variant_id: 1 }));
	assert!(outcome.effects.contains(&PickerEffect::ActiveMedia { media_id: 501 }));
	assert!(outcome.effects.contains(&PickerEffect::ReplaceUrl {
		url: "/products/tee?variant=1".into(),
	}));
	assert!(outcome.effects.contains(&PickerEffect::FetchQuantityRules { variant_id: 1 }));
}

#[test]
fn test_without_policy_enters_unresolved() {
	let mut picker = VariantPicker::from_page(&picker_page(false, false), "main").unwrap();

	let outcome = picker.select(0, "Red").unwrap();
	assert!(!outcome.auto_advanced);
	assert_eq!(outcome.state, PickerState::Unresolved);
	assert_eq!(outcome.selection, sel(&["Red", "XL"]));
	assert!(outcome.effects.contains(&PickerEffect::DisableAdd {
		label: AddLabel::Unavailable,
	}));
	assert!(outcome.effects.contains(&PickerEffect::HidePrice));
	assert!(!outcome.effects.iter().any(|e| matches!(
		e,
		PickerEffect::SetFormVariant { .. } | PickerEffect::ReplaceUrl { .. } | PickerEffect::FetchQuantityRules { .. }
	)));
}

#[test]
fn test_unavailable_without_skip_disables_add() {
	let mut picker = VariantPicker::from_page(&picker_page(true, false), "main").unwrap();
	picker.select(0, "Red").unwrap();

	let outcome = picker.select(1, "M").unwrap();
	assert!(matches!(&outcome.state, PickerState::Unavailable(v) if v.id == 2));
	assert!(outcome.effects.contains(&PickerEffect::DisableAdd { label: AddLabel::SoldOut }));
	assert!(outcome.effects.contains(&PickerEffect::PickupAvailability { variant_id: None }));
	assert!(outcome.effects.contains(&PickerEffect::SetFormVariant { variant_id: 2 }));
}

#[test]
fn test_skip_unavailable_moves_to_available() {
	let mut picker = VariantPicker::from_page(&picker_page(true, true), "main").unwrap();
	picker.select(0, "Red").unwrap();

	// Red M is sold out: stay on M's axis and look for an available M. None
	// exists, so the sold-out variant is kept.
	let outcome = picker.select(1, "M").unwrap();
	assert!(matches!(&outcome.state, PickerState::Unavailable(v) if v.id == 2));

	let outcome = picker.select(0, "red").unwrap();
	assert!(matches!(&outcome.state, PickerState::Resolved(v) if v.id == 1));
	assert!(outcome.auto_advanced);
}

#[test]
fn test_select_unknown_axis() {
	let mut picker = VariantPicker::from_page(&picker_page(true, false), "main").unwrap();
	assert_eq!(picker.select(3, "x").unwrap_err(), ContractError::UnknownAxis(3));
}

proptest! {
	/// Resolution never depends on the case of the selected values.
	#[test]
	fn prop_resolve_case_insensitive(index in 0usize..4, upper in any::<bool>()) {
		let r = resolver();
		let variant = &r.variants()[index];
		let selection: Vec<String> = variant
			.options
			.iter()
			.map(|o| if upper { o.to_uppercase() } else { o.to_lowercase() })
			.collect();
		prop_assert_eq!(r.resolve(&selection).map(|v| v.id), Some(variant.id));
	}

	/// With skip-nonexistent, any choice of an existing color resolves.
	#[test]
	fn prop_skip_non_existent_always_resolves(color in prop::sample::select(vec!["Red", "Blue"])) {
		let mut picker = VariantPicker::from_page(&picker_page(true, false), "main").unwrap();
		let outcome = picker.select(0, color).unwrap();
		prop_assert!(outcome.state.variant().is_some());
		prop_assert!(same_value(&outcome.selection[0], color));
	}
}
