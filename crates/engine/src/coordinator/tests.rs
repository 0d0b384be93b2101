use std::time::{Duration, Instant};

use proptest::prelude::*;

use super::*;

const DEBOUNCE: Duration = Duration::from_millis(300);

fn ms(n: u64) -> Duration {
	Duration::from_millis(n)
}

fn coordinator_with(surface: SurfaceId) -> MutationCoordinator {
	let mut coordinator = MutationCoordinator::new();
	coordinator.track(surface);
	coordinator
}

#[test]
fn test_burst_coalesces_to_last_value() {
	let s = SurfaceId(1);
	let mut c = coordinator_with(s);
	let t0 = Instant::now();

	c.record_intent(s, Intent::change(2, 2), t0);
	c.record_intent(s, Intent::change(2, 3), t0 + ms(40));
	c.record_intent(s, Intent::change(2, 3), t0 + ms(90));

	assert!(c.take_due(t0 + ms(300), DEBOUNCE).is_empty());
	let due = c.take_due(t0 + ms(390), DEBOUNCE);
	assert_eq!(due, vec![(s, Intent::change(2, 3))]);
	assert_eq!(c.phase(s), Some(SyncPhase::InFlight));
	assert!(c.take_due(t0 + ms(1000), DEBOUNCE).is_empty());
}

#[test]
fn test_intent_while_in_flight_waits_for_completion() {
	let s = SurfaceId(1);
	let mut c = coordinator_with(s);
	let t0 = Instant::now();

	c.submit_now(s, Intent::change(1, 5), t0);
	assert_eq!(c.take_due(t0, DEBOUNCE).len(), 1);

	c.record_intent(s, Intent::change(1, 6), t0 + ms(10));
	assert_eq!(c.phase(s), Some(SyncPhase::InFlight));
	assert!(c.take_due(t0 + ms(2000), DEBOUNCE).is_empty());
	assert_eq!(c.in_flight_count(), 1);

	assert_eq!(c.mark_complete(s), Some(Intent::change(1, 5).immediate()));
	assert_eq!(c.phase(s), Some(SyncPhase::Debouncing));
	let due = c.take_due(t0 + ms(2000), DEBOUNCE);
	assert_eq!(due, vec![(s, Intent::change(1, 6))]);
}

#[test]
fn test_pending_rearms_window_after_completion() {
	let s = SurfaceId(1);
	let mut c = coordinator_with(s);
	let t0 = Instant::now();

	c.submit_now(s, Intent::clear(), t0);
	c.take_due(t0, DEBOUNCE);
	c.record_intent(s, Intent::change(1, 2), t0 + ms(100));
	c.mark_complete(s);

	assert!(c.take_due(t0 + ms(350), DEBOUNCE).is_empty());
	assert_eq!(c.next_deadline(DEBOUNCE), Some(t0 + ms(400)));
	assert_eq!(c.take_due(t0 + ms(400), DEBOUNCE).len(), 1);
}

#[test]
fn test_complete_without_pending_goes_idle() {
	let s = SurfaceId(7);
	let mut c = coordinator_with(s);
	let t0 = Instant::now();

	c.submit_now(s, Intent::clear(), t0);
	c.take_due(t0, DEBOUNCE);
	assert_eq!(c.mark_complete(s), Some(Intent::clear()));
	assert_eq!(c.phase(s), Some(SyncPhase::Idle));
	assert_eq!(c.mark_complete(s), None);
	assert_eq!(c.next_deadline(DEBOUNCE), None);
}

#[test]
fn test_untracked_surface_ignored() {
	let s = SurfaceId(3);
	let mut c = coordinator_with(s);
	let t0 = Instant::now();

	c.submit_now(s, Intent::clear(), t0);
	c.take_due(t0, DEBOUNCE);
	c.untrack(s);

	assert_eq!(c.mark_complete(s), None);
	assert!(!c.record_intent(s, Intent::clear(), t0));
	assert_eq!(c.in_flight_count(), 0);
}

#[test]
fn test_surfaces_are_independent() {
	let (a, b) = (SurfaceId(1), SurfaceId(2));
	let mut c = MutationCoordinator::new();
	c.track(a);
	c.track(b);
	let t0 = Instant::now();

	c.submit_now(b, Intent::change(1, 1), t0);
	c.submit_now(a, Intent::change(1, 2), t0);
	let due = c.take_due(t0, DEBOUNCE);
	assert_eq!(due.iter().map(|(id, _)| *id).collect::<Vec<_>>(), vec![a, b]);
	assert_eq!(c.in_flight_count(), 2);
	assert_eq!(c.pending_count(), 0);
}

#[test]
fn test_intent_accessors() {
	assert_eq!(Intent::change(2, 4).line(), Some(2));
	assert_eq!(Intent::clear().quantity(), None);
	assert_eq!(Intent::add(AddIntent::new(9, 3)).quantity(), Some(3));
	assert!(Intent::add(AddIntent::new(9, 1)).immediate);
	assert!(!Intent::change(1, 1).immediate);
}

proptest! {
	/// Any burst inside one window sends exactly one request with the last value.
	#[test]
	fn prop_burst_sends_last_value(
		burst in prop::collection::vec((0u64..299, 0u32..50), 1..20),
	) {
		let s = SurfaceId(1);
		let mut c = coordinator_with(s);
		let t0 = Instant::now();

		let mut offsets: Vec<u64> = burst.iter().map(|(offset, _)| *offset).collect();
		offsets.sort_unstable();
		let mut last_at = t0;
		for (offset, (_, quantity)) in offsets.iter().zip(&burst) {
			last_at = t0 + ms(*offset);
			c.record_intent(s, Intent::change(2, *quantity), last_at);
			prop_assert!(c.take_due(last_at, DEBOUNCE).is_empty());
		}

		let mut sent = Vec::new();
		for step in 0..20u64 {
			sent.extend(c.take_due(last_at + ms(step * 50), DEBOUNCE));
		}
		let expected = burst.last().map(|(_, q)| *q).unwrap_or_default();
		prop_assert_eq!(sent, vec![(s, Intent::change(2, expected))]);
	}

	/// Interleaving intents, ticks and completions never puts two requests
	/// in flight for one surface.
	#[test]
	fn prop_single_flight(ops in prop::collection::vec(0u8..3, 1..60)) {
		let s = SurfaceId(1);
		let mut c = coordinator_with(s);
		let t0 = Instant::now();
		let mut in_flight = 0usize;

		for (i, op) in ops.into_iter().enumerate() {
			let now = t0 + ms(i as u64 * 120);
			match op {
				0 => {
					c.record_intent(s, Intent::change(1, i as u32), now);
				}
				1 => {
					in_flight += c.take_due(now, DEBOUNCE).len();
				}
				_ => {
					if c.mark_complete(s).is_some() {
						in_flight -= 1;
					}
				}
			}
			prop_assert!(in_flight <= 1);
			prop_assert_eq!(in_flight, c.in_flight_count());
		}
	}
}
