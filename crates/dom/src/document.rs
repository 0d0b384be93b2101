//! Arena-backed document tree.

use slab::Slab;

use crate::error::DomError;
use crate::node::{Element, Node, NodeId, NodeKind};
use crate::selector::Selector;

/// Mutable document tree with a synthetic root.
///
/// Besides structure and attributes, a document tracks the two pieces of
/// state a browser keeps outside markup: form-control properties (`value`,
/// `checked`) and keyboard focus.
#[derive(Debug, Clone)]
pub struct Document {
	nodes: Slab<Node>,
	root: NodeId,
	focused: Option<NodeId>,
}

impl Default for Document {
	fn default() -> Self {
		Self::new()
	}
}

impl Document {
	pub fn new() -> Self {
		let mut nodes = Slab::new();
		let root = NodeId(nodes.insert(Node::new(NodeKind::Root)));
		Self {
			nodes,
			root,
			focused: None,
		}
	}

	/// Parses markup into a detached document.
	///
	/// The markup is parsed in fragment mode, so top-level custom elements
	/// and section wrappers stay direct children of [`Document::root`].
	pub fn parse(html: &str) -> Self {
		let mut doc = Self::new();
		let root = doc.root;
		crate::parse::parse_into(&mut doc, root, html);
		doc
	}

	pub fn root(&self) -> NodeId {
		self.root
	}

	pub fn contains(&self, id: NodeId) -> bool {
		self.nodes.contains(id.0)
	}

	/// Number of live nodes, including the root.
	pub fn len(&self) -> usize {
		self.nodes.len()
	}

	pub fn is_empty(&self) -> bool {
		self.children(self.root).is_empty()
	}

	pub(crate) fn node(&self, id: NodeId) -> Option<&Node> {
		self.nodes.get(id.0)
	}

	pub fn element(&self, id: NodeId) -> Option<&Element> {
		match &self.nodes.get(id.0)?.kind {
			NodeKind::Element(el) => Some(el),
			_ => None,
		}
	}

	fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
		match &mut self.nodes.get_mut(id.0)?.kind {
			NodeKind::Element(el) => Some(el),
			_ => None,
		}
	}

	pub fn tag(&self, id: NodeId) -> Option<&str> {
		self.element(id).map(Element::tag)
	}

	pub fn text(&self, id: NodeId) -> Option<&str> {
		match &self.nodes.get(id.0)?.kind {
			NodeKind::Text(text) => Some(text),
			_ => None,
		}
	}

	pub fn parent(&self, id: NodeId) -> Option<NodeId> {
		self.nodes.get(id.0)?.parent
	}

	pub fn children(&self, id: NodeId) -> &[NodeId] {
		self.nodes.get(id.0).map_or(&[], |n| n.children.as_slice())
	}

	/// Element children only.
	pub fn child_elements(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
		self.children(id)
			.iter()
			.copied()
			.filter(|&c| self.element(c).is_some())
	}

	/// Ancestors from the parent outwards, excluding the synthetic root.
	pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
		std::iter::successors(self.parent(id), |&p| self.parent(p)).filter(|&p| p != self.root)
	}

	/// Descendants of `id` in document (pre-)order, excluding `id` itself.
	pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
		let mut out = Vec::new();
		let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
		while let Some(next) = stack.pop() {
			out.push(next);
			stack.extend(self.children(next).iter().rev().copied());
		}
		out
	}

	pub fn is_descendant_of(&self, id: NodeId, ancestor: NodeId) -> bool {
		std::iter::successors(self.parent(id), |&p| self.parent(p)).any(|p| p == ancestor)
	}

	/// Creates a detached element.
	pub fn create_element(&mut self, tag: &str, attrs: &[(&str, &str)]) -> NodeId {
		let attrs = attrs
			.iter()
			.map(|(k, v)| (k.to_string(), v.to_string()))
			.collect();
		self.insert(NodeKind::Element(Element::new(tag, attrs)))
	}

	pub(crate) fn insert(&mut self, kind: NodeKind) -> NodeId {
		NodeId(self.nodes.insert(Node::new(kind)))
	}

	/// Appends a detached node as the last child of `parent`.
	pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
		if !self.contains(parent) || !self.contains(child) {
			return;
		}
		self.detach(child);
		self.nodes[child.0].parent = Some(parent);
		self.nodes[parent.0].children.push(child);
	}

	pub fn append_text(&mut self, parent: NodeId, text: &str) -> NodeId {
		let id = self.insert(NodeKind::Text(text.to_string()));
		self.append_child(parent, id);
		id
	}

	fn detach(&mut self, id: NodeId) {
		if let Some(parent) = self.nodes[id.0].parent.take()
			&& let Some(p) = self.nodes.get_mut(parent.0)
		{
			p.children.retain(|&c| c != id);
		}
	}

	/// Detaches and frees `id` with its whole subtree.
	pub fn remove(&mut self, id: NodeId) {
		if id == self.root || !self.contains(id) {
			return;
		}
		self.detach(id);
		self.free_subtree(id);
	}

	fn free_subtree(&mut self, id: NodeId) {
		let mut stack = vec![id];
		while let Some(next) = stack.pop() {
			if self.focused == Some(next) {
				self.focused = None;
			}
			let node = self.nodes.remove(next.0);
			stack.extend(node.children);
		}
	}

	/// Removes every child of `id`.
	pub fn clear_children(&mut self, id: NodeId) {
		let Some(node) = self.nodes.get_mut(id.0) else {
			return;
		};
		let children = std::mem::take(&mut node.children);
		for child in children {
			self.free_subtree(child);
		}
	}

	/// Replaces the children of `id` with a single text node.
	pub fn set_text(&mut self, id: NodeId, text: &str) {
		self.clear_children(id);
		if !text.is_empty() {
			self.append_text(id, text);
		}
	}

	/// Replaces the children of `id` by parsing `html` in place.
	pub fn set_inner_html(&mut self, id: NodeId, html: &str) {
		self.clear_children(id);
		crate::parse::parse_into(self, id, html);
	}

	/// Deep-copies the children of `src_node` (in `src`) under `dst`.
	///
	/// Copies carry rendered markup only; live control properties of the
	/// source are not transferred.
	pub fn import_children(&mut self, dst: NodeId, src: &Document, src_node: NodeId) {
		for &child in src.children(src_node) {
			self.import_node(dst, src, child);
		}
	}

	/// Deep-copies `src_node` itself (in `src`) as the last child of `dst`.
	pub fn import_node(&mut self, dst: NodeId, src: &Document, src_node: NodeId) -> Option<NodeId> {
		let kind = match &src.node(src_node)?.kind {
			NodeKind::Root => return None,
			NodeKind::Element(el) => NodeKind::Element(el.rendered_copy()),
			NodeKind::Text(text) => NodeKind::Text(text.clone()),
		};
		let copy = self.insert(kind);
		self.append_child(dst, copy);
		for &child in src.children(src_node) {
			self.import_node(copy, src, child);
		}
		Some(copy)
	}

	/// Swaps the children of `dst` for a copy of the children of `src_node`.
	pub fn replace_children(&mut self, dst: NodeId, src: &Document, src_node: NodeId) {
		self.clear_children(dst);
		self.import_children(dst, src, src_node);
	}

	pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
		self.element(id)?.attr(name)
	}

	pub fn has_attr(&self, id: NodeId, name: &str) -> bool {
		self.attr(id, name).is_some()
	}

	pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) {
		if let Some(el) = self.element_mut(id) {
			el.set_attr(name, value);
		}
	}

	pub fn remove_attr(&mut self, id: NodeId, name: &str) -> bool {
		self.element_mut(id).is_some_and(|el| el.remove_attr(name))
	}

	/// Sets or removes a boolean attribute.
	pub fn toggle_attr(&mut self, id: NodeId, name: &str, on: bool) {
		if on {
			self.set_attr(id, name, "");
		} else {
			self.remove_attr(id, name);
		}
	}

	pub fn has_class(&self, id: NodeId, class: &str) -> bool {
		self.element(id).is_some_and(|el| el.has_class(class))
	}

	pub fn add_class(&mut self, id: NodeId, class: &str) {
		self.toggle_class(id, class, true);
	}

	pub fn remove_class(&mut self, id: NodeId, class: &str) {
		self.toggle_class(id, class, false);
	}

	/// Forces `class` on or off, keeping the other classes in order.
	pub fn toggle_class(&mut self, id: NodeId, class: &str, on: bool) {
		let Some(el) = self.element_mut(id) else {
			return;
		};
		let present = el.has_class(class);
		if present == on {
			return;
		}
		let mut classes: Vec<&str> = el.classes().filter(|c| *c != class).collect();
		if on {
			classes.push(class);
		}
		let joined = classes.join(" ");
		if joined.is_empty() {
			el.remove_attr("class");
		} else {
			el.set_attr("class", &joined);
		}
	}

	/// Current value of a form control.
	///
	/// For `<select>` this is the chosen option's value. For other controls
	/// it is the live property if the user changed it, else the attribute.
	pub fn value(&self, id: NodeId) -> Option<String> {
		let el = self.element(id)?;
		if el.tag == "select" {
			return self.selected_option(id).and_then(|opt| self.option_value(opt));
		}
		el.value.clone().or_else(|| el.attr("value").map(str::to_string))
	}

	/// Sets the live value property, as typing into the control would.
	pub fn set_value(&mut self, id: NodeId, value: &str) {
		if self.tag(id) == Some("select") {
			self.select_option(id, value);
			return;
		}
		if let Some(el) = self.element_mut(id) {
			el.value = Some(value.to_string());
		}
	}

	/// Drops the live value so the control shows its rendered value again.
	pub fn reset_value(&mut self, id: NodeId) {
		if let Some(el) = self.element_mut(id) {
			el.value = None;
		}
	}

	pub fn checked(&self, id: NodeId) -> bool {
		self.element(id)
			.is_some_and(|el| el.checked.unwrap_or_else(|| el.attr("checked").is_some()))
	}

	/// Checks or unchecks a control. Checking a radio unchecks the other
	/// radios sharing its `name`.
	pub fn set_checked(&mut self, id: NodeId, on: bool) {
		let radio_group = match self.element(id) {
			Some(el) if on && el.attr("type") == Some("radio") => el.attr("name").map(str::to_string),
			Some(_) => None,
			None => return,
		};
		if let Some(name) = radio_group {
			let group: Vec<NodeId> = self
				.descendants(self.root)
				.into_iter()
				.filter(|&n| {
					self.element(n).is_some_and(|el| {
						el.attr("type") == Some("radio") && el.attr("name") == Some(name.as_str())
					})
				})
				.collect();
			for other in group {
				if let Some(el) = self.element_mut(other) {
					el.checked = Some(false);
				}
			}
		}
		if let Some(el) = self.element_mut(id) {
			el.checked = Some(on);
		}
	}

	fn option_value(&self, option: NodeId) -> Option<String> {
		self.attr(option, "value")
			.map(str::to_string)
			.or_else(|| Some(self.text_content(option).trim().to_string()))
	}

	fn options(&self, select: NodeId) -> Vec<NodeId> {
		self.descendants(select)
			.into_iter()
			.filter(|&n| self.tag(n) == Some("option"))
			.collect()
	}

	/// The chosen `<option>` of a `<select>`: the last one flagged
	/// `selected`, else the first option.
	pub fn selected_option(&self, select: NodeId) -> Option<NodeId> {
		let options = self.options(select);
		options
			.iter()
			.rev()
			.find(|&&o| self.has_attr(o, "selected"))
			.or_else(|| options.first())
			.copied()
	}

	/// Option values of a `<select>` in document order.
	pub fn option_values(&self, select: NodeId) -> Vec<String> {
		self.options(select)
			.into_iter()
			.filter_map(|o| self.option_value(o))
			.collect()
	}

	/// Marks the option whose value equals `value` (ignoring ASCII case) as
	/// the only selected one. Returns `false` if no option matched.
	pub fn select_option(&mut self, select: NodeId, value: &str) -> bool {
		let options = self.options(select);
		let target = options.iter().copied().find(|&o| {
			self.option_value(o)
				.is_some_and(|v| v.eq_ignore_ascii_case(value))
		});
		let Some(target) = target else {
			return false;
		};
		for option in options {
			self.toggle_attr(option, "selected", option == target);
		}
		true
	}

	/// Concatenated text of all descendant text nodes.
	pub fn text_content(&self, id: NodeId) -> String {
		let mut out = String::new();
		if let Some(text) = self.text(id) {
			out.push_str(text);
		}
		for node in self.descendants(id) {
			if let Some(text) = self.text(node) {
				out.push_str(text);
			}
		}
		out
	}

	pub fn focus(&mut self, id: NodeId) {
		if self.element(id).is_some() {
			self.focused = Some(id);
		}
	}

	pub fn blur(&mut self) {
		self.focused = None;
	}

	pub fn focused(&self) -> Option<NodeId> {
		self.focused.filter(|&f| self.contains(f))
	}

	/// First element in the document whose `id` attribute equals `id`.
	pub fn element_by_id(&self, id: &str) -> Option<NodeId> {
		self.descendants(self.root)
			.into_iter()
			.find(|&n| self.element(n).and_then(Element::id) == Some(id))
	}

	/// First matching element among the descendants of `scope`.
	pub fn select_first(&self, scope: NodeId, selector: &Selector) -> Option<NodeId> {
		self.descendants(scope)
			.into_iter()
			.find(|&n| selector.matches(self, n))
	}

	/// All matching elements among the descendants of `scope`, in document
	/// order.
	pub fn select_all(&self, scope: NodeId, selector: &Selector) -> Vec<NodeId> {
		self.descendants(scope)
			.into_iter()
			.filter(|&n| selector.matches(self, n))
			.collect()
	}

	/// Parses `selector` and returns the first match under `scope`.
	pub fn query(&self, scope: NodeId, selector: &str) -> Result<Option<NodeId>, DomError> {
		Ok(self.select_first(scope, &Selector::parse(selector)?))
	}

	/// Parses `selector` and returns every match under `scope`.
	pub fn query_all(&self, scope: NodeId, selector: &str) -> Result<Vec<NodeId>, DomError> {
		Ok(self.select_all(scope, &Selector::parse(selector)?))
	}

	/// `scope` itself if it matches `selector`, else its first matching descendant.
	pub fn select_self_or_first(&self, scope: NodeId, selector: &Selector) -> Option<NodeId> {
		if selector.matches(self, scope) {
			return Some(scope);
		}
		self.select_first(scope, selector)
	}
}

#[cfg(test)]
mod tests;
