//! Memoized absolute transforms.
//!
//! An element's absolute transform is its local `(position, rotation)`
//! composed onto its parent's absolute transform. [`TransformCache`] stores
//! computed results and is kept coherent by explicit invalidation: whenever
//! an element's own geometry or parent changes, the entry for that element
//! and every descendant is dropped.
//!
//! The cache maintains one structural invariant: a cached element always
//! has all of its ancestors cached too. `get` fills the whole chain at once,
//! and invalidation removes whole subtrees, so an uncached node can never sit
//! above a cached one. That lets `invalidate_subtree` stop descending at the
//! first uncached node.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use canvas_types::{ElementId, Point, Transform};

use crate::reducer::Effects;
use crate::state::DesignState;

/// Counters used to verify amortized cost.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// `get` calls answered straight from the cache.
    pub hits: u64,
    /// `get` calls that had to compute at least one entry.
    pub misses: u64,
    /// Entries computed and stored.
    pub computed: u64,
    /// Entries dropped by invalidation.
    pub invalidated: u64,
    /// Number of invalidation passes (one per fold).
    pub invalidation_passes: u64,
}

/// Memoizing map from element id to absolute transform.
#[derive(Debug, Clone)]
pub struct TransformCache {
    entries: BTreeMap<ElementId, Transform>,
    max_depth: usize,
    stats: CacheStats,
}

impl TransformCache {
    /// Create an empty cache that refuses parent chains deeper than
    /// `max_depth`.
    pub const fn new(max_depth: usize) -> Self {
        Self {
            entries: BTreeMap::new(),
            max_depth,
            stats: CacheStats {
                hits: 0,
                misses: 0,
                computed: 0,
                invalidated: 0,
                invalidation_passes: 0,
            },
        }
    }

    /// Absolute transform of `id`, computing and caching missing ancestors.
    ///
    /// Walks up to the first cached ancestor (or a root), then composes back
    /// down, storing every intermediate result. Returns `None` for unknown
    /// elements and for chains deeper than the limit.
    pub fn get(&mut self, state: &DesignState, id: ElementId) -> Option<Transform> {
        if let Some(cached) = self.entries.get(&id) {
            self.stats.hits = self.stats.hits.saturating_add(1);
            return Some(*cached);
        }
        self.stats.misses = self.stats.misses.saturating_add(1);

        // Uncached chain, nearest first.
        let mut chain = Vec::new();
        let mut base = Transform::IDENTITY;
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            if let Some(cached) = self.entries.get(&current) {
                base = *cached;
                break;
            }
            if chain.len() > self.max_depth {
                debug!(element_id = %id, max_depth = self.max_depth, "parent chain exceeds depth limit");
                return None;
            }
            let element = state.element(current)?;
            chain.push(current);
            cursor = element.parent_id;
        }

        let mut result = base;
        for current in chain.into_iter().rev() {
            let element = state.element(current)?;
            result = result.compose(element.position, element.rotation);
            self.entries.insert(current, result);
            self.stats.computed = self.stats.computed.saturating_add(1);
        }
        Some(result)
    }

    /// Cached transform of `id` without computing.
    pub fn peek(&self, id: ElementId) -> Option<Transform> {
        self.entries.get(&id).copied()
    }

    /// Drop the entry of `id` and of every descendant.
    ///
    /// Walks the live `children` arrays with an explicit worklist; pruned at
    /// uncached nodes since none of their descendants can be cached. Returns
    /// the number of entries dropped.
    pub fn invalidate_subtree(&mut self, state: &DesignState, id: ElementId) -> usize {
        let mut dropped: usize = 0;
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if self.entries.remove(&current).is_none() {
                continue;
            }
            dropped = dropped.saturating_add(1);
            if let Some(element) = state.element(current) {
                stack.extend(element.children.iter().copied());
            }
        }
        self.stats.invalidated = self.stats.invalidated.saturating_add(count(dropped));
        dropped
    }

    /// One invalidation pass for the effects of a fold.
    ///
    /// `state` must be the post-fold state, so that `children` arrays reflect
    /// the new tree.
    pub fn apply_effects(&mut self, state: &DesignState, effects: &Effects) {
        self.stats.invalidation_passes = self.stats.invalidation_passes.saturating_add(1);
        let mut dropped: usize = 0;
        for id in &effects.removed {
            if self.entries.remove(id).is_some() {
                dropped = dropped.saturating_add(1);
            }
        }
        self.stats.invalidated = self.stats.invalidated.saturating_add(count(dropped));
        for id in &effects.moved {
            self.invalidate_subtree(state, *id);
        }
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.stats.invalidated = self
            .stats
            .invalidated
            .saturating_add(count(self.entries.len()));
        self.stats.invalidation_passes = self.stats.invalidation_passes.saturating_add(1);
        self.entries.clear();
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Counters since creation.
    pub const fn stats(&self) -> CacheStats {
        self.stats
    }

    /// The configured depth limit.
    pub const fn max_depth(&self) -> usize {
        self.max_depth
    }
}

impl Default for TransformCache {
    fn default() -> Self {
        Self::new(256)
    }
}

fn count(n: usize) -> u64 {
    u64::try_from(n).unwrap_or(u64::MAX)
}

/// Absolute transform computed from scratch, bypassing any cache.
pub fn compute_uncached(state: &DesignState, id: ElementId, max_depth: usize) -> Option<Transform> {
    let mut chain = vec![id];
    chain.extend(state.ancestors(id, max_depth.saturating_add(1)));
    if chain.len() > max_depth.saturating_add(1) {
        return None;
    }
    let mut result = Transform::IDENTITY;
    for current in chain.into_iter().rev() {
        let element = state.element(current)?;
        result = result.compose(element.position, element.rotation);
    }
    Some(result)
}

/// Local `(position, rotation)` that places an element at `absolute` when
/// parented under `new_parent` (`None` for page roots).
///
/// Returns `None` when the parent is unknown.
pub fn absolute_to_relative(
    cache: &mut TransformCache,
    state: &DesignState,
    absolute: Transform,
    new_parent: Option<ElementId>,
) -> Option<(Point, f64)> {
    let parent_abs = match new_parent {
        Some(parent) => cache.get(state, parent)?,
        None => Transform::IDENTITY,
    };
    Some(parent_abs.relative(absolute))
}

/// Convert a screen-space drag delta into the local frame of `id`'s parent.
///
/// A child of a container rotated by θ moves by `R(-θ)·delta` in local
/// coordinates so that it follows the cursor on screen.
pub fn screen_delta_to_local(
    cache: &mut TransformCache,
    state: &DesignState,
    id: ElementId,
    delta: Point,
) -> Option<Point> {
    let element = state.element(id)?;
    let parent_rotation = match element.parent_id {
        Some(parent) => cache.get(state, parent)?.rotation,
        None => 0.0,
    };
    Some(delta.rotated(-parent_rotation))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reducer::{apply, reduce_all};
    use canvas_types::{ElementKind, Event, EventPayload, PageId, Size, Styles};

    const TOL: f64 = 1e-9;

    fn create(id: ElementId, page: PageId, parent: Option<ElementId>, at: Point, rot: f64) -> Event {
        Event::new(EventPayload::CreateElement {
            element_id: id,
            kind: ElementKind::Frame,
            page_id: page,
            parent_id: parent,
            position: at,
            size: Size::new(100.0, 100.0),
            rotation: rot,
            name: String::new(),
            content: None,
            styles: Styles::default(),
        })
    }

    /// page -> a(10,20, 90°) -> b(5,0, 0°) -> c(1,1, 45°)
    fn nested() -> (DesignState, ElementId, ElementId, ElementId) {
        let page = PageId::new();
        let (a, b, c) = (ElementId::new(), ElementId::new(), ElementId::new());
        let state = reduce_all(
            DesignState::new(),
            &[
                Event::new(EventPayload::CreatePage {
                    page_id: page,
                    name: "Page".to_owned(),
                }),
                create(a, page, None, Point::new(10.0, 20.0), 90.0),
                create(b, page, Some(a), Point::new(5.0, 0.0), 0.0),
                create(c, page, Some(b), Point::new(1.0, 1.0), 45.0),
            ],
        );
        (state, a, b, c)
    }

    #[test]
    fn composes_parent_rotation() {
        let (state, _, b, c) = nested();
        let mut cache = TransformCache::new(64);
        // (5,0) rotated 90° is (0,5).
        let tb = cache.get(&state, b);
        assert!(tb.is_some_and(|t| t.approx_eq(Transform::new(Point::new(10.0, 25.0), 90.0), TOL)));
        // (1,1) rotated 90° is (-1,1).
        let tc = cache.get(&state, c);
        assert!(tc.is_some_and(|t| t.approx_eq(Transform::new(Point::new(9.0, 26.0), 135.0), TOL)));
    }

    #[test]
    fn get_fills_the_whole_chain() {
        let (state, a, b, c) = nested();
        let mut cache = TransformCache::new(64);
        let _ = cache.get(&state, c);
        assert_eq!(cache.len(), 3);
        assert!(cache.peek(a).is_some());
        assert!(cache.peek(b).is_some());
        assert_eq!(cache.stats().misses, 1);
        assert_eq!(cache.stats().computed, 3);

        let _ = cache.get(&state, a);
        assert_eq!(cache.stats().hits, 1);
        assert_eq!(cache.stats().computed, 3);
    }

    #[test]
    fn matches_uncached_computation() {
        let (state, a, b, c) = nested();
        let mut cache = TransformCache::new(64);
        for id in [c, a, b] {
            let cached = cache.get(&state, id);
            let fresh = compute_uncached(&state, id, 64);
            assert!(matches!((cached, fresh), (Some(x), Some(y)) if x.approx_eq(y, TOL)));
        }
    }

    #[test]
    fn invalidate_drops_subtree_only() {
        let (state, a, b, c) = nested();
        let mut cache = TransformCache::new(64);
        let _ = cache.get(&state, c);
        assert_eq!(cache.invalidate_subtree(&state, b), 2);
        assert!(cache.peek(a).is_some());
        assert!(cache.peek(b).is_none());
        assert!(cache.peek(c).is_none());
    }

    #[test]
    fn move_then_effects_keeps_cache_coherent() {
        let (mut state, a, _, c) = nested();
        let mut cache = TransformCache::new(64);
        let _ = cache.get(&state, c);
        let fx = apply(
            &mut state,
            &Event::new(EventPayload::RotateElement {
                element_id: a,
                rotation: 0.0,
            }),
        );
        cache.apply_effects(&state, &fx);
        let tc = cache.get(&state, c);
        let fresh = compute_uncached(&state, c, 64);
        assert!(matches!((tc, fresh), (Some(x), Some(y)) if x.approx_eq(y, TOL)));
        assert!(tc.is_some_and(|t| t.approx_eq(Transform::new(Point::new(16.0, 21.0), 45.0), TOL)));
    }

    #[test]
    fn depth_limit_refuses_long_chains() {
        let (state, _, _, c) = nested();
        let mut cache = TransformCache::new(1);
        assert!(cache.get(&state, c).is_none());
        assert!(compute_uncached(&state, c, 1).is_none());
        assert!(compute_uncached(&state, c, 2).is_some());
    }

    #[test]
    fn unknown_element_has_no_transform() {
        let (state, ..) = nested();
        let mut cache = TransformCache::new(64);
        assert!(cache.get(&state, ElementId::new()).is_none());
    }

    #[test]
    fn absolute_to_relative_round_trips() {
        let (state, a, b, c) = nested();
        let mut cache = TransformCache::new(64);
        let target = cache.get(&state, c).unwrap_or_default();
        for parent in [None, Some(a), Some(b)] {
            let local = absolute_to_relative(&mut cache, &state, target, parent);
            let parent_abs = parent
                .and_then(|p| cache.get(&state, p))
                .unwrap_or(Transform::IDENTITY);
            let back = local.map(|(pos, rot)| parent_abs.compose(pos, rot));
            assert!(back.is_some_and(|t| t.approx_eq(target, TOL)));
        }
    }

    #[test]
    fn screen_delta_is_inverse_rotated_by_parent() {
        let (state, a, b, _) = nested();
        let mut cache = TransformCache::new(64);
        let root = screen_delta_to_local(&mut cache, &state, a, Point::new(10.0, 0.0));
        assert!(root.is_some_and(|d| d.approx_eq(Point::new(10.0, 0.0), TOL)));
        // Parent rotated 90°: a rightward drag is -y locally.
        let nested = screen_delta_to_local(&mut cache, &state, b, Point::new(10.0, 0.0));
        assert!(nested.is_some_and(|d| d.approx_eq(Point::new(0.0, -10.0), TOL)));
    }
}
