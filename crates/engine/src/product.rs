//! Product add-to-cart forms (`<product-form data-section="...">`).

use std::collections::BTreeMap;

use cartsync_dom::{Document, NodeId};

use crate::coordinator::AddIntent;
use crate::error::ContractError;

const SUBMIT: &str = r#"[type="submit"]"#;
const SPINNER: &str = ".loading-overlay__spinner";
const ERROR_WRAPPER: &str = ".product-form__error-message-wrapper";
const ERROR_MESSAGE: &str = ".product-form__error-message";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductForm {
	section: String,
	skip_cart: bool,
	/// The last add was refused; the button stays `aria-disabled`.
	error: bool,
}

pub fn form_root_selector(section: &str) -> String {
	format!(r#"product-form[data-section="{section}"]"#)
}

/// `id` of the `<form>` hosting the add button and hidden variant input.
pub fn form_id(section: &str) -> String {
	format!("product-form-{section}")
}

impl ProductForm {
	pub fn from_page(page: &Document, section: &str) -> Result<Self, ContractError> {
		let root = page
			.query(page.root(), &form_root_selector(section))?
			.ok_or_else(|| ContractError::MissingAnchor(form_root_selector(section)))?;
		let id_input = page
			.query(root, r#"[name="id"]"#)?
			.ok_or_else(|| ContractError::MissingAnchor(format!("{} [name=\"id\"]", form_root_selector(section))))?;
		if page.query(root, SUBMIT)?.is_none() {
			return Err(ContractError::MissingAnchor(format!("{} {SUBMIT}", form_root_selector(section))));
		}
		Ok(Self {
			section: section.to_string(),
			skip_cart: page.attr(id_input, "data-skip-cart") == Some("true"),
			error: false,
		})
	}

	pub fn section(&self) -> &str {
		&self.section
	}

	pub fn skip_cart(&self) -> bool {
		self.skip_cart
	}

	pub fn has_error(&self) -> bool {
		self.error
	}

	pub(crate) fn set_error(&mut self, error: bool) {
		self.error = error;
	}

	fn root(&self, page: &Document) -> Result<NodeId, ContractError> {
		page.query(page.root(), &form_root_selector(&self.section))?
			.ok_or_else(|| ContractError::MissingAnchor(form_root_selector(&self.section)))
	}

	fn submit_button(&self, page: &Document) -> Result<NodeId, ContractError> {
		let root = self.root(page)?;
		page.query(root, SUBMIT)?
			.ok_or_else(|| ContractError::MissingAnchor(format!("{} {SUBMIT}", form_root_selector(&self.section))))
	}

	pub fn is_disabled(&self, page: &Document) -> Result<bool, ContractError> {
		let button = self.submit_button(page)?;
		Ok(page.attr(button, "aria-disabled") == Some("true"))
	}

	/// Reads the add request from the form fields: the variant `id`,
	/// `quantity` (default 1) and `properties[...]` fields.
	pub fn read_intent(&self, page: &Document) -> Result<AddIntent, ContractError> {
		let root = self.root(page)?;
		let id = page
			.query(root, r#"[name="id"]"#)?
			.and_then(|n| page.value(n))
			.ok_or_else(|| ContractError::MissingAnchor(format!("{} [name=\"id\"]", form_root_selector(&self.section))))?;
		let variant_id = id
			.trim()
			.parse()
			.map_err(|_| ContractError::EmbeddedData(format!("variant id {id:?}")))?;
		let quantity = page
			.query(root, r#"[name="quantity"]"#)?
			.and_then(|n| page.value(n))
			.and_then(|v| v.trim().parse().ok())
			.unwrap_or(1);

		let mut properties = BTreeMap::new();
		for field in page.query_all(root, r#"[name^="properties["]"#)? {
			if page.has_attr(field, "disabled") {
				continue;
			}
			let Some(name) = page.attr(field, "name") else {
				continue;
			};
			let key = name.trim_start_matches("properties[").trim_end_matches(']');
			let checkable = matches!(page.attr(field, "type"), Some("checkbox" | "radio"));
			if checkable && !page.checked(field) {
				continue;
			}
			if let Some(value) = page.value(field) {
				properties.insert(key.to_string(), value);
			}
		}

		Ok(AddIntent {
			variant_id,
			quantity,
			properties,
		})
	}

	/// Marks the form busy and hides any previous error.
	pub fn begin_submit(&self, page: &mut Document) -> Result<(), ContractError> {
		self.show_error(page, None)?;
		let button = self.submit_button(page)?;
		page.set_attr(button, "aria-disabled", "true");
		page.add_class(button, "loading");
		if let Some(spinner) = page.query(button, SPINNER)? {
			page.remove_class(spinner, "hidden");
		}
		Ok(())
	}

	/// Clears the busy state. The button stays disabled after an error.
	pub fn end_submit(&self, page: &mut Document) -> Result<(), ContractError> {
		let button = self.submit_button(page)?;
		page.remove_class(button, "loading");
		if let Some(spinner) = page.query(button, SPINNER)? {
			page.add_class(spinner, "hidden");
		}
		if !self.error {
			page.remove_attr(button, "aria-disabled");
		}
		Ok(())
	}

	/// Shows `message` in the form's error region, or hides the region.
	pub fn show_error(&self, page: &mut Document, message: Option<&str>) -> Result<(), ContractError> {
		let root = self.root(page)?;
		let Some(wrapper) = page.query(root, ERROR_WRAPPER)? else {
			return Ok(());
		};
		page.toggle_attr(wrapper, "hidden", message.is_none());
		if let Some(message) = message
			&& let Some(text) = page.query(wrapper, ERROR_MESSAGE)?
		{
			page.set_text(text, message);
		}
		Ok(())
	}
}
