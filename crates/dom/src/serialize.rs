use crate::document::Document;
use crate::node::{NodeId, NodeKind};

const VOID_ELEMENTS: &[&str] = &[
	"area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
	"wbr",
];

const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

impl Document {
	/// Serializes the children of `id`.
	pub fn inner_html(&self, id: NodeId) -> String {
		let mut out = String::new();
		for &child in self.children(id) {
			self.write_node(&mut out, child);
		}
		out
	}

	/// Serializes `id` together with its children.
	pub fn outer_html(&self, id: NodeId) -> String {
		let mut out = String::new();
		self.write_node(&mut out, id);
		out
	}

	/// Serializes the whole document.
	pub fn to_html(&self) -> String {
		self.inner_html(self.root())
	}

	fn write_node(&self, out: &mut String, id: NodeId) {
		let Some(node) = self.node(id) else {
			return;
		};
		match &node.kind {
			NodeKind::Root => {
				for &child in &node.children {
					self.write_node(out, child);
				}
			}
			NodeKind::Text(text) => {
				let raw = node
					.parent
					.and_then(|p| self.tag(p))
					.is_some_and(|tag| RAW_TEXT_ELEMENTS.contains(&tag));
				if raw {
					out.push_str(text);
				} else {
					out.push_str(&html_escape::encode_text(text));
				}
			}
			NodeKind::Element(el) => {
				out.push('<');
				out.push_str(el.tag());
				for (name, value) in el.attrs() {
					out.push(' ');
					out.push_str(name);
					out.push_str("=\"");
					out.push_str(&html_escape::encode_double_quoted_attribute(value));
					out.push('"');
				}
				out.push('>');
				if VOID_ELEMENTS.contains(&el.tag()) {
					return;
				}
				for &child in &node.children {
					self.write_node(out, child);
				}
				out.push_str("</");
				out.push_str(el.tag());
				out.push('>');
			}
		}
	}
}
