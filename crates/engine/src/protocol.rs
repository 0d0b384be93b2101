//! Wire format of the commerce endpoints.
//!
//! Requests serialize to the JSON bodies the storefront endpoints accept;
//! responses deserialize from what they return. Section markup comes back as
//! a map from section key to HTML, where a section that failed to render is
//! `null`.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

/// Body of a line quantity change (`/cart/change`). Quantity 0 removes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeRequest {
	/// 1-based line index.
	pub line: usize,
	pub quantity: u32,
	pub sections: Vec<String>,
	pub sections_url: String,
}

/// Body of a cart clear (`/cart/clear`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClearRequest {
	pub sections: Vec<String>,
	pub sections_url: String,
}

/// Body of an add-to-cart (`/cart/add`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddRequest {
	/// Variant id.
	pub id: u64,
	pub quantity: u32,
	#[serde(skip_serializing_if = "BTreeMap::is_empty")]
	pub properties: BTreeMap<String, String>,
	#[serde(skip_serializing_if = "Vec::is_empty")]
	pub sections: Vec<String>,
	pub sections_url: String,
}

/// Body of a no-op cart update used to re-render sections (`/cart/update.js`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateRequest {
	pub updates: BTreeMap<String, u32>,
	pub sections: Vec<String>,
	pub sections_url: String,
}

impl UpdateRequest {
	pub fn refresh(sections: Vec<String>, sections_url: impl Into<String>) -> Self {
		Self {
			updates: BTreeMap::new(),
			sections,
			sections_url: sections_url.into(),
		}
	}
}

/// Errors attached to a cart response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum CartErrors {
	Message(String),
	PerLine(BTreeMap<String, String>),
}

impl CartErrors {
	/// Message for `line`, falling back to any message present.
	pub fn message_for(&self, line: Option<usize>) -> Option<&str> {
		match self {
			CartErrors::Message(message) => Some(message.as_str()),
			CartErrors::PerLine(map) => line
				.and_then(|l| map.get(&l.to_string()))
				.or_else(|| map.values().next())
				.map(String::as_str),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct LineItem {
	pub quantity: u32,
	#[serde(default)]
	pub variant_id: Option<u64>,
	#[serde(default)]
	pub key: Option<String>,
	/// Unit price in minor units.
	#[serde(default)]
	pub price: Option<u64>,
	#[serde(default)]
	pub available: Option<bool>,
}

/// Cart state returned by change, clear and update.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct CartResponse {
	#[serde(default)]
	pub errors: Option<CartErrors>,
	#[serde(default)]
	pub item_count: u32,
	#[serde(default)]
	pub items: Vec<LineItem>,
	#[serde(default)]
	pub sections: HashMap<String, Option<String>>,
}

impl CartResponse {
	pub fn from_json(body: &str) -> Result<Self, serde_json::Error> {
		serde_json::from_str(body)
	}

	/// Server-confirmed quantity of a 1-based line.
	pub fn line_quantity(&self, line: usize) -> Option<u32> {
		line.checked_sub(1)
			.and_then(|i| self.items.get(i))
			.map(|item| item.quantity)
	}

	pub fn snapshot(&self) -> CartSnapshot {
		CartSnapshot {
			item_count: self.item_count,
			items: self.items.clone(),
		}
	}
}

/// The engine's copy of the last successfully fetched cart state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CartSnapshot {
	pub item_count: u32,
	pub items: Vec<LineItem>,
}

impl CartSnapshot {
	pub fn is_empty(&self) -> bool {
		self.item_count == 0
	}
}

/// Response of an add-to-cart.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum AddResponse {
	Failed {
		status: serde_json::Value,
		#[serde(default)]
		message: Option<String>,
		#[serde(default)]
		description: Option<String>,
	},
	Added {
		#[serde(default)]
		id: Option<u64>,
		#[serde(default)]
		quantity: Option<u32>,
		#[serde(default)]
		sections: HashMap<String, Option<String>>,
	},
}

impl AddResponse {
	pub fn from_json(body: &str) -> Result<Self, serde_json::Error> {
		serde_json::from_str(body)
	}

	/// User-facing error, if the add was refused.
	pub fn error_message(&self) -> Option<&str> {
		match self {
			AddResponse::Failed {
				message,
				description,
				..
			} => description.as_deref().or(message.as_deref()).or(Some("")),
			AddResponse::Added { .. } => None,
		}
	}

	pub fn sections(&self) -> Option<&HashMap<String, Option<String>>> {
		match self {
			AddResponse::Added { sections, .. } => Some(sections),
			AddResponse::Failed { .. } => None,
		}
	}
}
