//! Property tests for the scene graph: determinism, cache coherence,
//! delete completeness and the transform round-trip law.
//!
//! Randomized cases use a seeded `StdRng` so failures reproduce.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::missing_panics_doc,
    clippy::too_many_lines
)]

use canvas_scene::{
    DesignState, TransformCache, apply, check_integrity, compute_uncached, reduce_all,
    screen_delta_to_local,
};
use canvas_types::{
    ContainerRef, ElementId, ElementKind, Event, EventPayload, PageId, Point, Size, Styles,
    Transform,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const TOL: f64 = 1e-6;
const MAX_DEPTH: usize = 256;

fn create(id: ElementId, page: PageId, parent: Option<ElementId>, at: Point, rotation: f64) -> Event {
    Event::new(EventPayload::CreateElement {
        element_id: id,
        kind: ElementKind::Frame,
        page_id: page,
        parent_id: parent,
        position: at,
        size: Size::new(40.0, 30.0),
        rotation,
        name: String::new(),
        content: None,
        styles: Styles::default(),
    })
}

fn random_point(rng: &mut StdRng) -> Point {
    Point::new(rng.random_range(-500.0..500.0), rng.random_range(-500.0..500.0))
}

/// A random edit stream over a growing set of ids on one page.
///
/// References to deleted ids and invalid reparents are kept on purpose: the
/// reducer must no-op them without breaking any invariant.
fn random_events(seed: u64, count: usize) -> Vec<Event> {
    let mut rng = StdRng::seed_from_u64(seed);
    let page = PageId::new();
    let mut ids: Vec<ElementId> = Vec::new();
    let mut events = vec![Event::new(EventPayload::CreatePage {
        page_id: page,
        name: "Page".to_owned(),
    })];

    for _ in 0..count {
        let pick = |rng: &mut StdRng, ids: &[ElementId]| ids[rng.random_range(0..ids.len())];
        let roll = if ids.is_empty() { 0 } else { rng.random_range(0..7) };
        let payload = match roll {
            0 | 1 => {
                let id = ElementId::new();
                let parent = if ids.is_empty() || rng.random_bool(0.3) {
                    None
                } else {
                    Some(pick(&mut rng, &ids))
                };
                let at = random_point(&mut rng);
                ids.push(id);
                create(id, page, parent, at, rng.random_range(-180.0..180.0)).payload
            }
            2 => EventPayload::MoveElement {
                element_id: pick(&mut rng, &ids),
                position: random_point(&mut rng),
            },
            3 => EventPayload::RotateElement {
                element_id: pick(&mut rng, &ids),
                rotation: rng.random_range(-180.0..180.0),
            },
            4 => {
                let target = if rng.random_bool(0.3) {
                    ContainerRef::Page(page)
                } else {
                    ContainerRef::Element(pick(&mut rng, &ids))
                };
                EventPayload::ReorderElement {
                    element_id: pick(&mut rng, &ids),
                    target,
                    index: rng.random_range(0..4),
                    position: Some(random_point(&mut rng)),
                    rotation: None,
                }
            }
            5 => EventPayload::DeleteElement {
                element_id: pick(&mut rng, &ids),
            },
            _ => EventPayload::ResizeElement {
                element_id: pick(&mut rng, &ids),
                size: Size::new(rng.random_range(-10.0..200.0), rng.random_range(0.0..200.0)),
                position: rng.random_bool(0.5).then(|| random_point(&mut rng)),
            },
        };
        events.push(Event::new(payload));
    }
    events
}

#[test]
fn folding_is_deterministic() {
    for seed in 0..8 {
        let events = random_events(seed, 200);
        let first = reduce_all(DesignState::new(), &events);
        let second = reduce_all(DesignState::new(), &events);
        assert_eq!(first, second, "seed {seed}");
    }
}

#[test]
fn every_fold_preserves_structural_invariants() {
    for seed in 0..8 {
        let mut state = DesignState::new();
        for event in random_events(seed, 200) {
            apply(&mut state, &event);
            let violations = check_integrity(&state, MAX_DEPTH);
            assert!(violations.is_empty(), "seed {seed}: {violations:?}");
        }
    }
}

#[test]
fn incrementally_invalidated_cache_matches_fresh_computation() {
    for seed in 0..8 {
        let mut state = DesignState::new();
        let mut cache = TransformCache::new(MAX_DEPTH);
        for event in random_events(seed, 150) {
            let effects = apply(&mut state, &event);
            cache.apply_effects(&state, &effects);

            let ids: Vec<ElementId> = state.elements().map(|e| e.id).collect();
            for id in ids {
                let cached = cache.get(&state, id).unwrap();
                let fresh = compute_uncached(&state, id, MAX_DEPTH).unwrap();
                assert!(cached.approx_eq(fresh, TOL), "seed {seed}: {cached:?} vs {fresh:?}");
            }
        }
    }
}

#[test]
fn deleted_ids_leave_no_trace() {
    for seed in 0..8 {
        let events = random_events(seed, 200);
        let state = reduce_all(DesignState::new(), &events);
        let deleted: Vec<ElementId> = events
            .iter()
            .filter_map(|e| match e.payload {
                EventPayload::DeleteElement { element_id } => Some(element_id),
                _ => None,
            })
            .collect();
        for id in deleted {
            assert!(!state.contains_element(id));
            assert!(state.elements().all(|e| !e.children.contains(&id)));
            assert!(state.pages().all(|p| !p.root_elements.contains(&id)));
        }
    }
}

#[test]
fn absolute_to_relative_round_trips_under_any_parent() {
    let events = random_events(42, 120);
    let state = reduce_all(DesignState::new(), &events);
    let mut cache = TransformCache::new(MAX_DEPTH);
    let ids: Vec<ElementId> = state.elements().map(|e| e.id).collect();

    for id in &ids {
        let target = cache.get(&state, *id).unwrap();
        for parent in ids.iter().take(10) {
            let parent_abs = cache.get(&state, *parent).unwrap();
            let (position, rotation) =
                canvas_scene::absolute_to_relative(&mut cache, &state, target, Some(*parent))
                    .unwrap();
            assert!(parent_abs.compose(position, rotation).approx_eq(target, TOL));
        }
    }
}

#[test]
fn drag_inside_rotated_container_follows_the_pointer() {
    let page = PageId::new();
    let (container, child) = (ElementId::new(), ElementId::new());
    let mut state = reduce_all(
        DesignState::new(),
        &[
            Event::new(EventPayload::CreatePage {
                page_id: page,
                name: "Page".to_owned(),
            }),
            create(container, page, None, Point::new(200.0, 200.0), 45.0),
            create(child, page, Some(container), Point::new(50.0, 50.0), 0.0),
        ],
    );
    let mut cache = TransformCache::new(MAX_DEPTH);
    let before = cache.get(&state, child).unwrap();

    let delta = screen_delta_to_local(&mut cache, &state, child, Point::new(10.0, 0.0)).unwrap();
    let half_sqrt2 = core::f64::consts::FRAC_1_SQRT_2;
    assert!(delta.approx_eq(Point::new(10.0 * half_sqrt2, -10.0 * half_sqrt2), TOL));

    let effects = apply(
        &mut state,
        &Event::new(EventPayload::MoveElement {
            element_id: child,
            position: Point::new(50.0, 50.0) + delta,
        }),
    );
    cache.apply_effects(&state, &effects);
    let after = cache.get(&state, child).unwrap();
    let expected = Transform::new(before.position() + Point::new(10.0, 0.0), before.rotation);
    assert!(after.approx_eq(expected, TOL));
}
