//! Section reconciliation.
//!
//! A [`SectionDescriptor`] names a live region (`#anchor_id`, narrowed by an
//! optional selector) and the server section that re-renders it. Fresh
//! markup is parsed as a detached document, the matching sub-node is
//! selected, client-only widget state is carried over from the live region,
//! and the live region's children are swapped for the fresh ones.
//!
//! Reconciliation is staged: every requested section is parsed and located
//! before the live document is touched, so a response either applies to all
//! requested sections or to none of them.

use std::collections::HashMap;

use cartsync_dom::{Document, DomError, NodeId, Selector};
use tracing::{debug, trace};

use crate::error::ContractError;

/// Where a section lands on the page and which server section renders it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionDescriptor {
	/// Id of the live element that hosts the section.
	pub anchor_id: String,
	/// Server-side section key requested in `sections`.
	pub section_key: String,
	/// Sub-node selected in both the fresh fragment and the live anchor.
	/// `None` uses the fragment root and the anchor itself.
	pub selector: Option<String>,
	/// Carry timers and upsell selections across the swap.
	pub preserve_client_state: bool,
}

impl SectionDescriptor {
	pub fn new(anchor_id: impl Into<String>, section_key: impl Into<String>) -> Self {
		Self {
			anchor_id: anchor_id.into(),
			section_key: section_key.into(),
			selector: None,
			preserve_client_state: false,
		}
	}

	pub fn with_selector(mut self, selector: impl Into<String>) -> Self {
		self.selector = Some(selector.into());
		self
	}

	pub fn preserving_client_state(mut self) -> Self {
		self.preserve_client_state = true;
		self
	}
}

/// Section keys to request for `descriptors`, in order, without duplicates.
pub fn section_keys(descriptors: &[SectionDescriptor]) -> Vec<String> {
	let mut keys: Vec<String> = Vec::with_capacity(descriptors.len());
	for d in descriptors {
		if !keys.contains(&d.section_key) {
			keys.push(d.section_key.clone());
		}
	}
	keys
}

struct StagedSection {
	anchor_id: String,
	selector: Option<Selector>,
	fresh: Document,
	source: NodeId,
}

/// Fully prepared reconciliation, ready to be committed.
pub struct StagedReconcile {
	sections: Vec<StagedSection>,
}

impl std::fmt::Debug for StagedReconcile {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("StagedReconcile")
			.field("sections", &self.sections.iter().map(|s| &s.anchor_id).collect::<Vec<_>>())
			.finish()
	}
}

fn locate(live: &Document, anchor_id: &str, selector: Option<&Selector>) -> Option<NodeId> {
	let anchor = live.element_by_id(anchor_id)?;
	Some(selector.and_then(|s| live.select_first(anchor, s)).unwrap_or(anchor))
}

/// Parses and locates every section without modifying `live`.
pub fn stage(
	live: &Document,
	descriptors: &[SectionDescriptor],
	sections: &HashMap<String, Option<String>>,
) -> Result<StagedReconcile, ContractError> {
	let mut staged = Vec::with_capacity(descriptors.len());
	for descriptor in descriptors {
		let html = sections
			.get(&descriptor.section_key)
			.and_then(Option::as_deref)
			.ok_or_else(|| ContractError::MissingSection(descriptor.section_key.clone()))?;

		let selector = descriptor.selector.as_deref().map(Selector::parse).transpose()?;
		let mut fresh = Document::parse(html);
		let source = match &selector {
			Some(sel) => fresh.select_first(fresh.root(), sel).ok_or_else(|| {
				ContractError::MissingFragmentNode {
					section: descriptor.section_key.clone(),
					selector: sel.to_string(),
				}
			})?,
			None => fresh.root(),
		};

		let target = locate(live, &descriptor.anchor_id, selector.as_ref())
			.ok_or_else(|| ContractError::MissingAnchor(descriptor.anchor_id.clone()))?;

		if descriptor.preserve_client_state {
			carry_client_state(live, target, &mut fresh, source)?;
		}

		trace!(anchor = %descriptor.anchor_id, section = %descriptor.section_key, "cart.reconcile.staged");
		staged.push(StagedSection {
			anchor_id: descriptor.anchor_id.clone(),
			selector,
			fresh,
			source,
		});
	}
	Ok(StagedReconcile { sections: staged })
}

impl StagedReconcile {
	pub fn len(&self) -> usize {
		self.sections.len()
	}

	pub fn is_empty(&self) -> bool {
		self.sections.is_empty()
	}

	/// Swaps every staged section into `live`. Targets are resolved again at
	/// commit time; a target replaced by an enclosing section earlier in the
	/// same commit is skipped.
	pub fn commit(self, live: &mut Document) -> usize {
		let mut applied = 0;
		for section in self.sections {
			let Some(target) = locate(live, &section.anchor_id, section.selector.as_ref()) else {
				debug!(anchor = %section.anchor_id, "cart.reconcile.superseded");
				continue;
			};
			live.replace_children(target, &section.fresh, section.source);
			applied += 1;
		}
		applied
	}
}

/// Stages and commits in one step.
pub fn reconcile(
	live: &mut Document,
	descriptors: &[SectionDescriptor],
	sections: &HashMap<String, Option<String>>,
) -> Result<usize, ContractError> {
	Ok(stage(live, descriptors, sections)?.commit(live))
}

const TIMER: &str = ".cart-timer";
const UPSELL: &str = "cart-drawer-upsell";
const UPSELL_ID_INPUT: &str = r#"input[name="id"]"#;
const UPSELL_IMAGE: &str = ".upsell__image__img";
const UPSELL_PRICE: &str = ".upsell__price";

/// Stable identity of an upsell widget across renders.
fn widget_key(doc: &Document, widget: NodeId) -> Option<String> {
	doc.attr(widget, "data-handle")
		.or_else(|| doc.attr(widget, "id"))
		.map(str::to_string)
}

/// Copies client-only state from the live region into the fresh subtree.
fn carry_client_state(
	live: &Document,
	live_scope: NodeId,
	fresh: &mut Document,
	fresh_scope: NodeId,
) -> Result<(), DomError> {
	let timer = Selector::parse(TIMER)?;
	if let (Some(old), Some(new)) = (
		live.select_self_or_first(live_scope, &timer),
		fresh.select_first(fresh_scope, &timer),
	) {
		fresh.replace_children(new, live, old);
	}

	let fresh_widgets: Vec<(String, NodeId)> = fresh
		.query_all(fresh_scope, UPSELL)?
		.into_iter()
		.filter_map(|w| widget_key(fresh, w).map(|k| (k, w)))
		.collect();

	for old in live.query_all(live_scope, UPSELL)? {
		let Some(key) = widget_key(live, old) else {
			continue;
		};
		let Some(&(_, new)) = fresh_widgets.iter().find(|(k, _)| *k == key) else {
			continue;
		};
		carry_upsell(live, old, fresh, new)?;
	}
	Ok(())
}

fn carry_upsell(live: &Document, old: NodeId, fresh: &mut Document, new: NodeId) -> Result<(), DomError> {
	for attr in ["data-selected", "data-id"] {
		if let Some(value) = live.attr(old, attr) {
			fresh.set_attr(new, attr, value);
		}
	}

	if let (Some(old_input), Some(new_input)) =
		(live.query(old, UPSELL_ID_INPUT)?, fresh.query(new, UPSELL_ID_INPUT)?)
		&& let Some(value) = live.value(old_input)
	{
		fresh.set_attr(new_input, "value", &value);
	}

	if let (Some(old_img), Some(new_img)) = (live.query(old, UPSELL_IMAGE)?, fresh.query(new, UPSELL_IMAGE)?)
		&& let Some(src) = live.attr(old_img, "src")
	{
		fresh.set_attr(new_img, "src", src);
	}

	let old_selects = live.query_all(old, "select")?;
	for new_select in fresh.query_all(new, "select")? {
		let Some(name) = fresh.attr(new_select, "name") else {
			continue;
		};
		let old_select = old_selects.iter().copied().find(|&s| live.attr(s, "name") == Some(name));
		if let Some(value) = old_select.and_then(|s| live.value(s)) {
			fresh.select_option(new_select, &value);
		}
	}

	if live.attr(old, "data-update-prices") == Some("true")
		&& let (Some(old_price), Some(new_price)) = (live.query(old, UPSELL_PRICE)?, fresh.query(new, UPSELL_PRICE)?)
	{
		fresh.replace_children(new_price, live, old_price);
	}
	Ok(())
}
