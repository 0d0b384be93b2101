//! Cart synchronization for storefront pages.
//!
//! Several independently mounted surfaces (the cart page, the cart drawer,
//! product forms, variant pickers, quantity rules and bundle pickers) share
//! one server-side cart. The [`Engine`] keeps them consistent:
//!
//! - quantity edits are debounced and sent at most one at a time per surface,
//! - server-rendered sections are swapped into the live page, carrying
//!   client-only state across the swap,
//! - surfaces learn about each other's changes through a [`cartsync_bus`]
//!   event bus and refresh themselves.
//!
//! Network access goes through [`CommerceBackend`]; browser-side effects
//! outside the page (history, navigation, media galleries) go through
//! [`Host`]. Time is passed in explicitly, so every schedule is
//! deterministic under test.

/// Commerce endpoint trait.
pub mod backend;
/// Bundle picker: several products bought together at a discount.
pub mod bundle;
/// TOML configuration.
pub mod config;
/// Debounced, single-flight mutation scheduling.
pub mod coordinator;
mod engine;
/// Error types.
pub mod error;
/// Host environment hooks.
pub mod host;
/// Product add-to-cart forms.
pub mod product;
/// Request and response bodies.
pub mod protocol;
/// Per-product quantity rules.
pub mod quantity;
/// Section reconciliation.
pub mod reconcile;
/// Surfaces and their registry.
pub mod surface;
/// Variant resolution.
pub mod variant;

pub use backend::CommerceBackend;
pub use config::{ConfigError, EngineConfig};
pub use coordinator::{AddIntent, Intent, MutationCoordinator, MutationKind, SyncPhase};
pub use engine::{Engine, MutationOutcome, TickReport};
pub use error::{ContractError, ProtocolError, TransportError};
pub use host::{Host, NullHost};
pub use protocol::{CartResponse, CartSnapshot};
pub use surface::{CartSurface, Surface, SurfaceKind};
pub use variant::{PickerOutcome, PickerState, VariantResolver};
