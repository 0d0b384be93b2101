//! Owned, mutable document model for server-rendered page fragments.
//!
//! A [`Document`] is an arena of element and text nodes under a synthetic
//! root. The live page and every freshly fetched section are both documents;
//! reconciliation copies subtrees from one into the other.
//!
//! Markup is parsed with html5ever (through `scraper`) and converted into the
//! arena so it can be queried with [`Selector`] and mutated in place.

/// Arena tree, attribute/class access, form-control state and focus.
pub mod document;
/// Error types.
pub mod error;
/// Node and element payloads.
pub mod node;
/// HTML-to-arena conversion.
mod parse;
/// CSS selector subset used for queries.
pub mod selector;
/// HTML serialization.
mod serialize;

pub use document::Document;
pub use error::DomError;
pub use node::{Element, NodeId};
pub use selector::Selector;
