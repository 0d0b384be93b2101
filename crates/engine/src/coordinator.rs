//! Debounced, single-flight mutation scheduling.
//!
//! [`MutationCoordinator`] owns the pending intent of every tracked surface
//! and decides when it is sent:
//! - Bursts of intents within the quiescence window coalesce to the last one.
//! - A surface has at most one mutation in flight. Intents arriving while it
//!   is busy replace the pending one and re-arm the window; they are sent
//!   after the in-flight mutation completes.
//!
//! Time is passed in explicitly, so the state machine is deterministic and
//! does not own any timers. The engine drives it from its tick.

use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};

use cartsync_bus::SurfaceId;
use tracing::{debug, trace};

/// A variant added from a product form or bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddIntent {
	pub variant_id: u64,
	pub quantity: u32,
	/// Line item properties (`properties[...]` form fields).
	pub properties: BTreeMap<String, String>,
}

impl AddIntent {
	pub fn new(variant_id: u64, quantity: u32) -> Self {
		Self {
			variant_id,
			quantity,
			properties: BTreeMap::new(),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationKind {
	/// Set the quantity of a 1-based line. Zero removes it.
	Change { line: usize, quantity: u32 },
	Clear,
	Add(AddIntent),
}

/// What the user asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Intent {
	pub kind: MutationKind,
	/// `name` of the control to refocus once the mutation lands.
	pub focus_name: Option<String>,
	/// Skip the quiescence window (buttons, not keystrokes).
	pub immediate: bool,
}

impl Intent {
	pub fn change(line: usize, quantity: u32) -> Self {
		Self {
			kind: MutationKind::Change { line, quantity },
			focus_name: None,
			immediate: false,
		}
	}

	pub fn clear() -> Self {
		Self {
			kind: MutationKind::Clear,
			focus_name: None,
			immediate: true,
		}
	}

	pub fn add(add: AddIntent) -> Self {
		Self {
			kind: MutationKind::Add(add),
			focus_name: None,
			immediate: true,
		}
	}

	pub fn with_focus(mut self, name: impl Into<String>) -> Self {
		self.focus_name = Some(name.into());
		self
	}

	pub fn immediate(mut self) -> Self {
		self.immediate = true;
		self
	}

	pub fn line(&self) -> Option<usize> {
		match self.kind {
			MutationKind::Change { line, .. } => Some(line),
			_ => None,
		}
	}

	pub fn quantity(&self) -> Option<u32> {
		match &self.kind {
			MutationKind::Change { quantity, .. } => Some(*quantity),
			MutationKind::Add(add) => Some(add.quantity),
			MutationKind::Clear => None,
		}
	}
}

/// Current phase of a surface's sync state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
	/// Nothing pending.
	Idle,
	/// An intent is waiting for the window to elapse.
	Debouncing,
	/// A mutation was sent and has not completed.
	InFlight,
}

/// Metadata about an in-flight mutation.
#[derive(Debug, Clone)]
pub struct InFlightInfo {
	pub intent: Intent,
	pub started_at: Instant,
}

/// Per-surface sync state.
#[derive(Debug)]
pub struct SurfaceSyncState {
	pub phase: SyncPhase,
	pub pending: Option<Intent>,
	pub last_intent_at: Option<Instant>,
	pub inflight: Option<InFlightInfo>,
}

impl Default for SurfaceSyncState {
	fn default() -> Self {
		Self {
			phase: SyncPhase::Idle,
			pending: None,
			last_intent_at: None,
			inflight: None,
		}
	}
}

impl SurfaceSyncState {
	/// Replaces the pending intent and re-arms the window.
	pub fn record_intent(&mut self, intent: Intent, now: Instant) {
		self.pending = Some(intent);
		self.last_intent_at = Some(now);
		if self.phase == SyncPhase::Idle {
			self.phase = SyncPhase::Debouncing;
		}
	}

	/// Immediate intents bypass the window; nothing is due while in flight.
	pub fn is_due(&self, now: Instant, debounce: Duration) -> bool {
		if self.phase == SyncPhase::InFlight {
			return false;
		}
		let Some(pending) = &self.pending else {
			return false;
		};
		pending.immediate
			|| self
				.last_intent_at
				.is_none_or(|at| now.saturating_duration_since(at) >= debounce)
	}

	/// When the pending intent becomes due, if it is waiting on the window.
	pub fn deadline(&self, debounce: Duration) -> Option<Instant> {
		if self.phase == SyncPhase::InFlight {
			return None;
		}
		let pending = self.pending.as_ref()?;
		if pending.immediate {
			return self.last_intent_at;
		}
		self.last_intent_at.map(|at| at + debounce)
	}

	/// Takes the pending intent and transitions to in-flight.
	pub fn take_for_send(&mut self, now: Instant) -> Option<Intent> {
		let intent = self.pending.take()?;
		self.phase = SyncPhase::InFlight;
		self.inflight = Some(InFlightInfo {
			intent: intent.clone(),
			started_at: now,
		});
		Some(intent)
	}

	pub fn mark_complete(&mut self) {
		self.inflight = None;
		self.phase = if self.pending.is_some() {
			SyncPhase::Debouncing
		} else {
			SyncPhase::Idle
		};
	}
}

/// Sync state of every surface that can mutate the cart.
#[derive(Debug, Default)]
pub struct MutationCoordinator {
	surfaces: HashMap<SurfaceId, SurfaceSyncState>,
}

impl MutationCoordinator {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn track(&mut self, surface: SurfaceId) {
		self.surfaces.entry(surface).or_default();
	}

	/// Forgets a surface. A mutation still in flight completes, but its
	/// completion is no longer recognized.
	pub fn untrack(&mut self, surface: SurfaceId) {
		if let Some(state) = self.surfaces.remove(&surface) {
			debug!(%surface, phase = ?state.phase, "cart.sync.untrack");
		}
	}

	pub fn is_tracked(&self, surface: SurfaceId) -> bool {
		self.surfaces.contains_key(&surface)
	}

	/// Records a debounced intent. Untracked surfaces are silently ignored.
	pub fn record_intent(&mut self, surface: SurfaceId, intent: Intent, now: Instant) -> bool {
		let Some(state) = self.surfaces.get_mut(&surface) else {
			return false;
		};
		trace!(%surface, kind = ?intent.kind, phase = ?state.phase, "cart.sync.intent");
		state.record_intent(intent, now);
		true
	}

	/// Records an intent that is due without waiting for the window.
	pub fn submit_now(&mut self, surface: SurfaceId, intent: Intent, now: Instant) -> bool {
		self.record_intent(surface, intent.immediate(), now)
	}

	/// Takes every due intent, moving its surface to in-flight. Ordered by
	/// surface id.
	pub fn take_due(&mut self, now: Instant, debounce: Duration) -> Vec<(SurfaceId, Intent)> {
		let mut due: Vec<SurfaceId> = self
			.surfaces
			.iter()
			.filter(|(_, state)| state.is_due(now, debounce))
			.map(|(&id, _)| id)
			.collect();
		due.sort_unstable();

		due.into_iter()
			.filter_map(|id| {
				let state = self.surfaces.get_mut(&id)?;
				state.take_for_send(now).map(|intent| (id, intent))
			})
			.collect()
	}

	/// Returns the completed intent, or `None` if the surface was untracked
	/// or had nothing in flight.
	pub fn mark_complete(&mut self, surface: SurfaceId) -> Option<Intent> {
		let state = self.surfaces.get_mut(&surface)?;
		let info = state.inflight.take()?;
		state.mark_complete();
		Some(info.intent)
	}

	pub fn phase(&self, surface: SurfaceId) -> Option<SyncPhase> {
		self.surfaces.get(&surface).map(|s| s.phase)
	}

	pub fn is_busy(&self, surface: SurfaceId) -> bool {
		self.phase(surface) == Some(SyncPhase::InFlight)
	}

	pub fn in_flight_count(&self) -> usize {
		self.surfaces
			.values()
			.filter(|s| s.phase == SyncPhase::InFlight)
			.count()
	}

	pub fn pending_count(&self) -> usize {
		self.surfaces.values().filter(|s| s.pending.is_some()).count()
	}

	/// Earliest instant at which some pending intent becomes due.
	pub fn next_deadline(&self, debounce: Duration) -> Option<Instant> {
		self.surfaces.values().filter_map(|s| s.deadline(debounce)).min()
	}
}

#[cfg(test)]
mod tests;
