//! Engine configuration.
//!
//! Configuration is TOML. Every field has a default, so an empty document
//! yields the stock storefront behavior:
//!
//! ```toml
//! debounce_ms = 300
//! live_region_hide_ms = 1000
//! sections_url = "/cart"
//!
//! [routes]
//! cart_change_url = "/cart/change"
//!
//! [strings]
//! quantity_error = "You can only add [quantity] of this item to your cart."
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("TOML parse error: {0}")]
	Parse(#[from] toml::de::Error),

	#[error("I/O error reading {path}: {error}")]
	Io {
		path: PathBuf,
		error: std::io::Error,
	},
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
	/// Quiescence window for quantity input, in milliseconds.
	pub debounce_ms: u64,
	/// How long the cart status live region stays announced.
	pub live_region_hide_ms: u64,
	/// Page path sent as `sections_url` so sections render for this page.
	pub sections_url: String,
	pub routes: Routes,
	pub strings: Strings,
}

impl Default for EngineConfig {
	fn default() -> Self {
		Self {
			debounce_ms: 300,
			live_region_hide_ms: 1000,
			sections_url: "/".to_string(),
			routes: Routes::default(),
			strings: Strings::default(),
		}
	}
}

impl EngineConfig {
	pub fn from_toml_str(src: &str) -> Result<Self, ConfigError> {
		Ok(toml::from_str(src)?)
	}

	pub fn load(path: &Path) -> Result<Self, ConfigError> {
		let src = std::fs::read_to_string(path).map_err(|error| ConfigError::Io {
			path: path.to_path_buf(),
			error,
		})?;
		Self::from_toml_str(&src)
	}

	pub fn debounce(&self) -> Duration {
		Duration::from_millis(self.debounce_ms)
	}

	pub fn live_region_hide(&self) -> Duration {
		Duration::from_millis(self.live_region_hide_ms)
	}
}

/// Commerce endpoint paths.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Routes {
	pub cart_change_url: String,
	pub cart_clear_url: String,
	pub cart_add_url: String,
	pub cart_update_url: String,
	pub cart_url: String,
	pub checkout_url: String,
}

impl Default for Routes {
	fn default() -> Self {
		Self {
			cart_change_url: "/cart/change".to_string(),
			cart_clear_url: "/cart/clear".to_string(),
			cart_add_url: "/cart/add".to_string(),
			cart_update_url: "/cart/update.js".to_string(),
			cart_url: "/cart".to_string(),
			checkout_url: "/checkout".to_string(),
		}
	}
}

/// User-facing text.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Strings {
	/// Generic failure message.
	pub error: String,
	/// Shown when the server capped a quantity; `[quantity]` is replaced.
	pub quantity_error: String,
	pub add_to_cart: String,
	pub sold_out: String,
	pub unavailable: String,
}

impl Default for Strings {
	fn default() -> Self {
		Self {
			error: "There was an error while updating your cart. Please try again.".to_string(),
			quantity_error: "You can only add [quantity] of this item to your cart.".to_string(),
			add_to_cart: "Add to cart".to_string(),
			sold_out: "Sold out".to_string(),
			unavailable: "Unavailable".to_string(),
		}
	}
}

impl Strings {
	pub fn quantity_error(&self, quantity: u32) -> String {
		self.quantity_error.replace("[quantity]", &quantity.to_string())
	}
}
