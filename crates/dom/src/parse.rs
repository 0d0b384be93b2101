use scraper::{ElementRef, Html, Node as HtmlNode};

use crate::document::Document;
use crate::node::{Element, NodeId, NodeKind};

/// Parses `html` as a fragment and appends the result under `parent`.
pub(crate) fn parse_into(doc: &mut Document, parent: NodeId, html: &str) {
	let fragment = Html::parse_fragment(html);
	convert_children(doc, parent, fragment.root_element());
}

fn convert_children(doc: &mut Document, parent: NodeId, element: ElementRef<'_>) {
	for child in element.children() {
		match child.value() {
			HtmlNode::Element(el) => {
				let attrs = el
					.attrs()
					.map(|(name, value)| (name.to_string(), value.to_string()))
					.collect();
				let id = doc.insert(NodeKind::Element(Element::new(el.name(), attrs)));
				doc.append_child(parent, id);
				if let Some(child_ref) = ElementRef::wrap(child) {
					convert_children(doc, id, child_ref);
				}
			}
			HtmlNode::Text(text) => {
				doc.append_text(parent, text);
			}
			_ => {}
		}
	}
}
