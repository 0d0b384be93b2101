//! Commerce endpoint seam.

use async_trait::async_trait;

use crate::error::TransportError;
use crate::protocol::{
	AddRequest, AddResponse, CartResponse, ChangeRequest, ClearRequest, UpdateRequest,
};

/// The storefront's cart endpoints.
///
/// Implementations own transport concerns (HTTP client, headers, JSON
/// decoding). Every call is independent; the engine guarantees at most one
/// in-flight mutation per surface but may have calls from different surfaces
/// outstanding at once.
#[async_trait]
pub trait CommerceBackend: Send + Sync {
	/// Changes the quantity of one line.
	async fn change(&self, request: ChangeRequest) -> Result<CartResponse, TransportError>;

	/// Removes every line.
	async fn clear(&self, request: ClearRequest) -> Result<CartResponse, TransportError>;

	/// Adds a variant.
	async fn add(&self, request: AddRequest) -> Result<AddResponse, TransportError>;

	/// Re-renders sections without changing the cart.
	async fn update(&self, request: UpdateRequest) -> Result<CartResponse, TransportError>;

	/// Fetches page markup: `GET {path}?variant={variant}&section_id={section_id}`.
	async fn fetch_section(
		&self,
		path: &str,
		section_id: &str,
		variant: Option<u64>,
	) -> Result<String, TransportError>;
}

/// Formats the query path used by [`CommerceBackend::fetch_section`].
pub fn section_url(path: &str, section_id: &str, variant: Option<u64>) -> String {
	match variant {
		Some(variant) => format!("{path}?variant={variant}&section_id={section_id}"),
		None => format!("{path}?section_id={section_id}"),
	}
}
