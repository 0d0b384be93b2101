//! Browser-side collaborators outside the engine: history, media galleries,
//! pickup availability, share buttons and navigation.

/// Host environment hooks. Every method defaults to doing nothing.
pub trait Host: Send + Sync {
	/// Replaces the current history entry's URL.
	fn replace_url(&self, _url: &str) {}

	/// Activates a media item in a section's gallery.
	fn set_active_media(&self, _section: &str, _media_id: u64) {}

	/// Looks up pickup availability for `variant`, or clears it on `None`.
	fn pickup_availability(&self, _variant: Option<u64>) {}

	/// Updates share buttons.
	fn share_url(&self, _url: &str) {}

	/// Leaves the page.
	fn navigate(&self, _url: &str) {}
}

/// A host that ignores every request.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullHost;

impl Host for NullHost {}
