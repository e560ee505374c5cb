//! Multi-element gestures over the current selection.
//!
//! A gesture captures its members' starting geometry once, at `begin`.
//! Every pointer frame then produces a complete payload from that capture
//! and the accumulated pointer delta, so frames never compound rounding
//! error and the payloads can be buffered into one transaction.
//!
//! Members whose ancestor is also part of the gesture are dropped: moving a
//! container already carries its children. Locked elements are skipped.

use std::collections::BTreeSet;

use canvas_types::{
    ElementId, EventPayload, Point, PositionUpdate, Rect, RotationUpdate, Size, SizeUpdate,
    Transform, corners,
};

use crate::state::DesignState;
use crate::transform::TransformCache;

/// Ids in `ids` that exist, are unlocked, and have no ancestor in `ids`.
///
/// Order follows `ids`, with duplicates removed.
pub fn top_level_members(state: &DesignState, ids: &[ElementId], max_depth: usize) -> Vec<ElementId> {
    let wanted: BTreeSet<ElementId> = ids.iter().copied().collect();
    let mut seen = BTreeSet::new();
    ids.iter()
        .copied()
        .filter(|id| seen.insert(*id))
        .filter(|id| state.element(*id).is_some_and(|e| !e.locked))
        .filter(|id| {
            !state
                .ancestors(*id, max_depth)
                .iter()
                .any(|a| wanted.contains(a))
        })
        .collect()
}

/// Page-space bounding box of the given elements, using their rotated
/// corners.
pub fn selection_bounds(
    state: &DesignState,
    cache: &mut TransformCache,
    ids: &[ElementId],
) -> Option<Rect> {
    let mut points = Vec::with_capacity(ids.len().saturating_mul(4));
    for id in ids {
        let Some(element) = state.element(*id) else {
            continue;
        };
        let Some(abs) = cache.get(state, *id) else {
            continue;
        };
        points.extend(corners(abs, element.size));
    }
    Rect::from_points(points)
}

/// Centre of the selection bounds; the default pivot for group rotation.
pub fn centroid(state: &DesignState, cache: &mut TransformCache, ids: &[ElementId]) -> Option<Point> {
    selection_bounds(state, cache, ids).map(Rect::center)
}

fn parent_transform(state: &DesignState, cache: &mut TransformCache, id: ElementId) -> Option<Transform> {
    match state.element(id)?.parent_id {
        Some(parent) => cache.get(state, parent),
        None => Some(Transform::IDENTITY),
    }
}

// ---------------------------------------------------------------------------
// Move
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct MoveMember {
    id: ElementId,
    start: Point,
    parent_rotation: f64,
}

/// A drag of several elements by one screen delta.
#[derive(Debug, Clone)]
pub struct GroupMoveGesture {
    members: Vec<MoveMember>,
}

impl GroupMoveGesture {
    /// Capture each member's local start position and parent rotation.
    pub fn begin(state: &DesignState, cache: &mut TransformCache, ids: &[ElementId]) -> Self {
        let members = top_level_members(state, ids, cache.max_depth())
            .into_iter()
            .filter_map(|id| {
                let element = state.element(id)?;
                let parent = parent_transform(state, cache, id)?;
                Some(MoveMember {
                    id,
                    start: element.position,
                    parent_rotation: parent.rotation,
                })
            })
            .collect();
        Self { members }
    }

    /// Payload for the accumulated screen delta since `begin`.
    ///
    /// Each member moves by the delta expressed in its parent's frame, so
    /// children of rotated containers track the pointer on screen.
    pub fn frame(&self, screen_delta: Point) -> Option<EventPayload> {
        if self.members.is_empty() || !screen_delta.is_finite() {
            return None;
        }
        let moves = self
            .members
            .iter()
            .map(|m| PositionUpdate {
                element_id: m.id,
                position: m.start + screen_delta.rotated(-m.parent_rotation),
            })
            .collect();
        Some(EventPayload::GroupMove { moves })
    }

    /// Ids taking part in the gesture.
    pub fn members(&self) -> Vec<ElementId> {
        self.members.iter().map(|m| m.id).collect()
    }

    /// Whether no element takes part.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Rotate
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct RotateMember {
    id: ElementId,
    start_abs: Transform,
    parent_abs: Transform,
}

/// A rotation of several elements about a shared pivot.
#[derive(Debug, Clone)]
pub struct GroupRotateGesture {
    pivot: Point,
    members: Vec<RotateMember>,
}

impl GroupRotateGesture {
    /// Capture each member's absolute start transform about `pivot`.
    pub fn begin(
        state: &DesignState,
        cache: &mut TransformCache,
        ids: &[ElementId],
        pivot: Point,
    ) -> Self {
        let members = top_level_members(state, ids, cache.max_depth())
            .into_iter()
            .filter_map(|id| {
                Some(RotateMember {
                    id,
                    start_abs: cache.get(state, id)?,
                    parent_abs: parent_transform(state, cache, id)?,
                })
            })
            .collect();
        Self { pivot, members }
    }

    /// Payload for the accumulated rotation since `begin`, in degrees.
    ///
    /// Each member's origin revolves about the pivot and its own rotation
    /// grows by the same angle, so the selection turns as one rigid body.
    pub fn frame(&self, delta_degrees: f64) -> Option<EventPayload> {
        if self.members.is_empty() || !delta_degrees.is_finite() {
            return None;
        }
        let rotations = self
            .members
            .iter()
            .map(|m| {
                let origin = m.start_abs.position().rotated_about(self.pivot, delta_degrees);
                let target = Transform::new(origin, m.start_abs.rotation + delta_degrees);
                let (position, rotation) = m.parent_abs.relative(target);
                RotationUpdate {
                    element_id: m.id,
                    rotation,
                    position: Some(position),
                }
            })
            .collect();
        Some(EventPayload::GroupRotate { rotations })
    }

    /// The rotation pivot in page space.
    pub const fn pivot(&self) -> Point {
        self.pivot
    }

    /// Ids taking part in the gesture.
    pub fn members(&self) -> Vec<ElementId> {
        self.members.iter().map(|m| m.id).collect()
    }
}

// ---------------------------------------------------------------------------
// Resize
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct ResizeMember {
    id: ElementId,
    start_abs: Transform,
    parent_abs: Transform,
    size: Size,
}

/// Page-axis scale factors seen along the axes of a box rotated by
/// `degrees`: the stretch of each local unit axis, signed by the matching
/// diagonal term so a mirrored gesture still reports a negative factor.
fn local_scale(scale_x: f64, scale_y: f64, degrees: f64) -> (f64, f64) {
    let (sin, cos) = degrees.to_radians().sin_cos();
    let along = |a: f64, b: f64| {
        let stretch = (scale_x * a).hypot(scale_y * b);
        if (scale_x * a).mul_add(a, scale_y * b * b) < 0.0 {
            -stretch
        } else {
            stretch
        }
    };
    (along(cos, sin), along(sin, cos))
}

/// Vector from a box's origin corner to its centre, in page space.
fn half_extent(size: Size, degrees: f64) -> Point {
    Point::new(size.width / 2.0, size.height / 2.0).rotated(degrees)
}

/// A proportional resize of several elements away from an anchor.
#[derive(Debug, Clone)]
pub struct GroupResizeGesture {
    anchor: Point,
    members: Vec<ResizeMember>,
}

impl GroupResizeGesture {
    /// Capture offsets from `anchor` and starting sizes.
    pub fn begin(
        state: &DesignState,
        cache: &mut TransformCache,
        ids: &[ElementId],
        anchor: Point,
    ) -> Self {
        let members = top_level_members(state, ids, cache.max_depth())
            .into_iter()
            .filter_map(|id| {
                Some(ResizeMember {
                    id,
                    start_abs: cache.get(state, id)?,
                    parent_abs: parent_transform(state, cache, id)?,
                    size: state.element(id)?.size,
                })
            })
            .collect();
        Self { anchor, members }
    }

    /// Payload for scale factors relative to the starting geometry.
    ///
    /// Factors apply along page axes. Each member's centre moves with its
    /// scaled offset from the anchor, and its size follows the factors
    /// projected onto its own rotated axes. Negative factors collapse sizes
    /// to zero in the reducer.
    pub fn frame(&self, scale_x: f64, scale_y: f64) -> Option<EventPayload> {
        if self.members.is_empty() || !scale_x.is_finite() || !scale_y.is_finite() {
            return None;
        }
        let resizes = self
            .members
            .iter()
            .map(|m| {
                let rotation = m.start_abs.rotation;
                let (local_x, local_y) = local_scale(scale_x, scale_y, rotation);
                let size = m.size.scaled(local_x, local_y);
                let centre = m.start_abs.position() + half_extent(m.size, rotation);
                let centre = self.anchor + (centre - self.anchor).scaled(scale_x, scale_y);
                let origin = centre - half_extent(size, rotation);
                let (position, _) = m.parent_abs.relative(Transform::new(origin, rotation));
                SizeUpdate {
                    element_id: m.id,
                    size,
                    position: Some(position),
                }
            })
            .collect();
        Some(EventPayload::GroupResize { resizes })
    }

    /// The fixed anchor in page space.
    pub const fn anchor(&self) -> Point {
        self.anchor
    }

    /// Ids taking part in the gesture.
    pub fn members(&self) -> Vec<ElementId> {
        self.members.iter().map(|m| m.id).collect()
    }
}
