/// Handle to a node inside a [`crate::Document`].
///
/// Handles are only meaningful for the document that issued them and become
/// stale once the node is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
	/// Raw arena index, for logging.
	pub fn index(self) -> usize {
		self.0
	}
}

/// Element payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
	pub(crate) tag: String,
	pub(crate) attrs: Vec<(String, String)>,
	/// Live `value` property. `None` means the control shows its attribute.
	pub(crate) value: Option<String>,
	/// Live `checked` property. `None` means the `checked` attribute decides.
	pub(crate) checked: Option<bool>,
}

impl Element {
	pub fn new(tag: impl Into<String>, attrs: Vec<(String, String)>) -> Self {
		Self {
			tag: tag.into().to_ascii_lowercase(),
			attrs,
			value: None,
			checked: None,
		}
	}

	pub fn tag(&self) -> &str {
		&self.tag
	}

	pub fn attr(&self, name: &str) -> Option<&str> {
		self.attrs
			.iter()
			.find(|(key, _)| key == name)
			.map(|(_, value)| value.as_str())
	}

	pub fn attrs(&self) -> impl Iterator<Item = (&str, &str)> {
		self.attrs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
	}

	pub fn id(&self) -> Option<&str> {
		self.attr("id")
	}

	pub fn classes(&self) -> impl Iterator<Item = &str> {
		self.attr("class").unwrap_or_default().split_ascii_whitespace()
	}

	pub fn has_class(&self, class: &str) -> bool {
		self.classes().any(|c| c == class)
	}

	pub(crate) fn set_attr(&mut self, name: &str, value: &str) {
		match self.attrs.iter_mut().find(|(key, _)| key == name) {
			Some((_, existing)) => {
				existing.clear();
				existing.push_str(value);
			}
			None => self.attrs.push((name.to_string(), value.to_string())),
		}
	}

	pub(crate) fn remove_attr(&mut self, name: &str) -> bool {
		let before = self.attrs.len();
		self.attrs.retain(|(key, _)| key != name);
		before != self.attrs.len()
	}

	/// Deep-copy payload, dropping live properties.
	pub(crate) fn rendered_copy(&self) -> Self {
		Self {
			tag: self.tag.clone(),
			attrs: self.attrs.clone(),
			value: None,
			checked: None,
		}
	}
}

#[derive(Debug, Clone)]
pub(crate) enum NodeKind {
	Root,
	Element(Element),
	Text(String),
}

#[derive(Debug, Clone)]
pub(crate) struct Node {
	pub(crate) parent: Option<NodeId>,
	pub(crate) children: Vec<NodeId>,
	pub(crate) kind: NodeKind,
}

impl Node {
	pub(crate) fn new(kind: NodeKind) -> Self {
		Self {
			parent: None,
			children: Vec::new(),
			kind,
		}
	}
}
