//! Error taxonomy.
//!
//! - [`ProtocolError`]: per-mutation outcomes the engine recovers from
//!   locally (rejected quantities, transport failures, server-side caps).
//! - [`ContractError`]: the page markup does not match what the engine was
//!   configured for. Not recoverable; returned from [`crate::Engine::tick`]
//!   after busy state has been released.

use cartsync_dom::DomError;
use thiserror::Error;

/// Network or decoding failure talking to the commerce backend.
#[derive(Debug, Error)]
pub enum TransportError {
	#[error("network error: {0}")]
	Network(String),
	#[error("unexpected status {0}")]
	Status(u16),
	#[error("malformed response: {0}")]
	Decode(#[from] serde_json::Error),
}

/// Recoverable outcome of a settled mutation.
#[derive(Debug, Error)]
pub enum ProtocolError {
	/// The server rejected the request; the input was reverted.
	#[error("rejected{}: {message}", line.map(|l| format!(" line {l}")).unwrap_or_default())]
	Validation { line: Option<usize>, message: String },

	/// The request never produced a usable response; the page was left as is.
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// The server confirmed a different quantity than requested. The page
	/// shows the server value.
	#[error("line {line}: requested {requested}, server confirmed {confirmed:?}")]
	IntegrityMismatch {
		line: usize,
		requested: u32,
		confirmed: Option<u32>,
	},
}

/// Markup does not match the engine's expectations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContractError {
	#[error("missing DOM anchor #{0}")]
	MissingAnchor(String),
	#[error("response did not include section {0:?}")]
	MissingSection(String),
	#[error("section {section:?} has no node matching {selector:?}")]
	MissingFragmentNode { section: String, selector: String },
	#[error("surface is not mounted")]
	UnknownSurface,
	#[error("surface kind does not support this operation")]
	WrongSurfaceKind,
	#[error("malformed embedded data: {0}")]
	EmbeddedData(String),
	#[error("picker has no option axis {0}")]
	UnknownAxis(usize),
	#[error(transparent)]
	Dom(#[from] DomError),
}
