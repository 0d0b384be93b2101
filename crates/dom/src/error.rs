//! Error types for document queries.

use thiserror::Error;

/// Errors produced by document operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomError {
	/// A selector string could not be parsed.
	#[error("invalid selector {selector:?}: {reason}")]
	InvalidSelector {
		/// The offending selector text.
		selector: String,
		/// What the parser rejected.
		reason: String,
	},
}
