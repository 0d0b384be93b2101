//! CSS selectors over [`Document`] nodes.
//!
//! Parsing reuses `scraper`'s selector grammar; matching runs the `selectors`
//! engine against arena nodes through [`NodeRef`]. Matching walks ancestors
//! across the whole document, like `Element.querySelector`.

use std::fmt;

use scraper::selector::{CssLocalName, CssString, NonTSPseudoClass, Parser, PseudoElement, Simple};
use selectors::attr::{AttrSelectorOperation, CaseSensitivity, NamespaceConstraint};
use selectors::bloom::BloomFilter;
use selectors::matching::{
	self, ElementSelectorFlags, MatchingContext, MatchingForInvalidation, MatchingMode, NeedsSelectorFlags,
	QuirksMode, SelectorCaches,
};
use selectors::parser::{ParseRelative, SelectorImpl};
use selectors::{OpaqueElement, SelectorList};

use crate::document::Document;
use crate::error::DomError;
use crate::node::{Element, NodeId};

type Namespace = <Simple as SelectorImpl>::NamespaceUrl;

/// Parsed selector list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
	source: String,
	list: SelectorList<Simple>,
}

impl fmt::Display for Selector {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.source)
	}
}

impl Selector {
	pub fn parse(source: &str) -> Result<Self, DomError> {
		let mut input = cssparser::ParserInput::new(source);
		let mut parser = cssparser::Parser::new(&mut input);
		let list = SelectorList::parse(&Parser, &mut parser, ParseRelative::No).map_err(|err| {
			DomError::InvalidSelector {
				selector: source.to_string(),
				reason: scraper::error::SelectorErrorKind::from(err).to_string(),
			}
		})?;
		Ok(Self {
			source: source.to_string(),
			list,
		})
	}

	pub fn as_str(&self) -> &str {
		&self.source
	}

	/// Whether element `node` of `doc` matches any selector in the list.
	pub fn matches(&self, doc: &Document, node: NodeId) -> bool {
		let Some(element) = NodeRef::new(doc, node) else {
			return false;
		};
		let mut caches = SelectorCaches::default();
		let mut context = MatchingContext::new(
			MatchingMode::Normal,
			None,
			&mut caches,
			QuirksMode::NoQuirks,
			NeedsSelectorFlags::No,
			MatchingForInvalidation::No,
		);
		self.list
			.slice()
			.iter()
			.any(|s| matching::matches_selector(s, 0, None, &element, &mut context))
	}
}

/// An element of a [`Document`], as seen by the selector engine.
#[derive(Clone, Copy)]
pub(crate) struct NodeRef<'a> {
	doc: &'a Document,
	id: NodeId,
	element: &'a Element,
}

impl fmt::Debug for NodeRef<'_> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("NodeRef")
			.field("id", &self.id)
			.field("tag", &self.element.tag())
			.finish()
	}
}

impl<'a> NodeRef<'a> {
	pub(crate) fn new(doc: &'a Document, id: NodeId) -> Option<Self> {
		doc.element(id).map(|element| Self { doc, id, element })
	}

	fn sibling_element(&self, step: isize) -> Option<Self> {
		let parent = self.doc.parent(self.id)?;
		let siblings = self.doc.children(parent);
		let at = siblings.iter().position(|&c| c == self.id)?;
		let mut index = at as isize + step;
		while index >= 0 && (index as usize) < siblings.len() {
			if let Some(found) = Self::new(self.doc, siblings[index as usize]) {
				return Some(found);
			}
			index += step;
		}
		None
	}
}

impl selectors::Element for NodeRef<'_> {
	type Impl = Simple;

	fn opaque(&self) -> OpaqueElement {
		OpaqueElement::new(self.element)
	}

	fn parent_element(&self) -> Option<Self> {
		self.doc.parent(self.id).and_then(|p| Self::new(self.doc, p))
	}

	fn parent_node_is_shadow_root(&self) -> bool {
		false
	}

	fn containing_shadow_host(&self) -> Option<Self> {
		None
	}

	fn is_pseudo_element(&self) -> bool {
		false
	}

	fn prev_sibling_element(&self) -> Option<Self> {
		self.sibling_element(-1)
	}

	fn next_sibling_element(&self) -> Option<Self> {
		self.sibling_element(1)
	}

	fn first_element_child(&self) -> Option<Self> {
		self.doc
			.child_elements(self.id)
			.next()
			.and_then(|c| Self::new(self.doc, c))
	}

	fn is_html_element_in_html_document(&self) -> bool {
		true
	}

	fn has_local_name(&self, name: &CssLocalName) -> bool {
		*name.0 == *self.element.tag()
	}

	fn has_namespace(&self, _namespace: &Namespace) -> bool {
		true
	}

	fn is_same_type(&self, other: &Self) -> bool {
		self.element.tag() == other.element.tag()
	}

	fn attr_matches(
		&self,
		ns: &NamespaceConstraint<&Namespace>,
		local_name: &CssLocalName,
		operation: &AttrSelectorOperation<&CssString>,
	) -> bool {
		if matches!(*ns, NamespaceConstraint::Specific(url) if !url.is_empty()) {
			return false;
		}
		self.element
			.attrs()
			.any(|(key, value)| *local_name.0 == *key && operation.eval_str(value))
	}

	fn match_non_ts_pseudo_class(&self, _pc: &NonTSPseudoClass, _context: &mut MatchingContext<'_, Simple>) -> bool {
		false
	}

	fn match_pseudo_element(&self, _pe: &PseudoElement, _context: &mut MatchingContext<'_, Simple>) -> bool {
		false
	}

	fn apply_selector_flags(&self, _flags: ElementSelectorFlags) {}

	fn is_link(&self) -> bool {
		self.element.tag() == "link"
	}

	fn is_html_slot_element(&self) -> bool {
		false
	}

	fn has_id(&self, id: &CssLocalName, case_sensitivity: CaseSensitivity) -> bool {
		self.element
			.id()
			.is_some_and(|own| case_sensitivity.eq(id.0.as_bytes(), own.as_bytes()))
	}

	fn has_class(&self, name: &CssLocalName, case_sensitivity: CaseSensitivity) -> bool {
		self.element
			.classes()
			.any(|c| case_sensitivity.eq(name.0.as_bytes(), c.as_bytes()))
	}

	fn has_custom_state(&self, _name: &CssLocalName) -> bool {
		false
	}

	fn imported_part(&self, _name: &CssLocalName) -> Option<CssLocalName> {
		None
	}

	fn is_part(&self, _name: &CssLocalName) -> bool {
		false
	}

	fn is_empty(&self) -> bool {
		self.doc
			.children(self.id)
			.iter()
			.all(|&c| self.doc.element(c).is_none() && self.doc.text(c).is_none_or(str::is_empty))
	}

	fn is_root(&self) -> bool {
		self.doc.parent(self.id) == Some(self.doc.root())
	}

	fn add_element_unique_hashes(&self, _filter: &mut BloomFilter) -> bool {
		false
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn doc() -> Document {
		Document::parse(
			r#"<cart-drawer id="d"><div class="drawer__inner is-empty"><ul><li class="cart-item" id="CartDrawer-Item-1"><input name="updates[]" value="2"></li><li class="cart-item" id="CartDrawer-Item-2"><a href="/products/font/x" data-x="y-end"></a></li></ul></div></cart-drawer>"#,
		)
	}

	#[test]
	fn test_compound_and_descendant() {
		let d = doc();
		let sel = Selector::parse("cart-drawer .drawer__inner.is-empty li").unwrap();
		let hit = d.select_first(d.root(), &sel).unwrap();
		assert_eq!(d.attr(hit, "id"), Some("CartDrawer-Item-1"));
	}

	#[test]
	fn test_child_combinator_requires_direct_parent() {
		let d = doc();
		let direct = Selector::parse("cart-drawer > div").unwrap();
		let indirect = Selector::parse("cart-drawer > ul").unwrap();
		assert!(d.select_first(d.root(), &direct).is_some());
		assert!(d.select_first(d.root(), &indirect).is_none());
	}

	#[test]
	fn test_attribute_operators() {
		let d = doc();
		for sel in [
			r#"input[name="updates[]"]"#,
			"[id^=CartDrawer-Item-]",
			"[value]",
			"a[href*='/font/']",
			"[data-x$=end]",
		] {
			let parsed = Selector::parse(sel).unwrap();
			assert!(d.select_first(d.root(), &parsed).is_some(), "{sel:?} should match");
		}
	}

	#[test]
	fn test_sibling_combinators() {
		let d = doc();
		let next = Selector::parse("li + li").unwrap();
		let hit = d.select_first(d.root(), &next).unwrap();
		assert_eq!(d.attr(hit, "id"), Some("CartDrawer-Item-2"));
		let first = Selector::parse("li:first-child").unwrap();
		assert_eq!(d.select_all(d.root(), &first).len(), 1);
	}

	#[test]
	fn test_selector_list() {
		let d = doc();
		let sel = Selector::parse("#missing, #d").unwrap();
		assert_eq!(d.select_all(d.root(), &sel).len(), 1);
	}

	#[test]
	fn test_invalid_selectors_rejected() {
		for bad in ["", "div >", ".", "#", "[", "a,,b", "div!"] {
			let err = Selector::parse(bad).unwrap_err();
			assert!(matches!(err, DomError::InvalidSelector { .. }), "{bad:?} should not parse");
		}
	}
}
