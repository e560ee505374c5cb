//! The reducer: the single writer of [`DesignState`].
//!
//! [`reduce`] is the pure form, `(state, event) -> state`. [`apply`] is the
//! in-place form used for incremental folds; it reports [`Effects`] so the
//! transform cache can be invalidated precisely.
//!
//! Every variant has a total mapping. Events that name missing elements,
//! pages or views are silent no-ops (logged at `debug`), because the log must
//! stay replayable even when a stale client wrote them. Structural guards
//! (cycles, leaf parents, unknown containers) are repeated here so that a
//! log can never produce a corrupt tree, whatever was validated upstream.
//! Geometry is clamped at write time: negative sizes become zero and corner
//! radii never exceed half the shorter side.

use std::collections::BTreeSet;

use tracing::debug;

use canvas_types::{
    AutoLayout, ContainerRef, Element, ElementId, ElementKind, ElementPatch, Event,
    EventPayload, Page, PageId, Point, PositionUpdate, RotationUpdate, Size, SizeUpdate, Styles,
    Typography, View, ViewId, ViewPatch,
};

use crate::state::DesignState;

// ---------------------------------------------------------------------------
// Effects
// ---------------------------------------------------------------------------

/// What a fold changed, as far as derived caches are concerned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Effects {
    /// Elements whose own position, rotation or parent changed. Their whole
    /// subtree needs transform invalidation.
    pub moved: BTreeSet<ElementId>,
    /// Elements that no longer exist.
    pub removed: BTreeSet<ElementId>,
    /// Number of events that changed the state.
    pub applied: usize,
    /// Number of events that were no-ops.
    pub skipped: usize,
}

impl Effects {
    /// Fold another effect set into this one.
    pub fn merge(&mut self, other: Self) {
        self.moved.extend(other.moved);
        self.removed.extend(other.removed);
        self.applied = self.applied.saturating_add(other.applied);
        self.skipped = self.skipped.saturating_add(other.skipped);
    }

    /// Whether anything changed.
    pub const fn is_empty(&self) -> bool {
        self.applied == 0
    }

    fn changed(&mut self) {
        self.applied = self.applied.saturating_add(1);
    }

    fn skip(&mut self, event: &Event, reason: &'static str) {
        self.skipped = self.skipped.saturating_add(1);
        debug!(event_id = %event.id, kind = ?event.kind(), reason, "event reduced to a no-op");
    }
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Pure reducer: fold one event onto a state.
pub fn reduce(mut state: DesignState, event: &Event) -> DesignState {
    apply(&mut state, event);
    state
}

/// Fold a sequence of events onto a state.
pub fn reduce_all<'a, I>(mut state: DesignState, events: I) -> DesignState
where
    I: IntoIterator<Item = &'a Event>,
{
    fold(&mut state, events);
    state
}

/// Fold a sequence of events in place, accumulating their effects.
pub fn fold<'a, I>(state: &mut DesignState, events: I) -> Effects
where
    I: IntoIterator<Item = &'a Event>,
{
    let mut effects = Effects::default();
    for event in events {
        effects.merge(apply(state, event));
    }
    effects
}

/// Apply one event in place.
pub fn apply(state: &mut DesignState, event: &Event) -> Effects {
    let mut fx = Effects::default();

    match &event.payload {
        // --- Element lifecycle ---
        EventPayload::CreateElement {
            element_id,
            kind,
            page_id,
            parent_id,
            position,
            size,
            rotation,
            name,
            content,
            styles,
        } => {
            let new = NewElement {
                id: *element_id,
                kind: *kind,
                page: *page_id,
                parent: *parent_id,
                position: *position,
                size: *size,
                rotation: *rotation,
                name,
                content: content.as_ref(),
                styles,
            };
            match create_element(state, new) {
                Ok(()) => {
                    fx.moved.insert(*element_id);
                    fx.changed();
                }
                Err(reason) => fx.skip(event, reason),
            }
        }
        EventPayload::UpdateElement {
            element_id,
            changes,
        } => match update_element(state, *element_id, changes) {
            Ok(()) => fx.changed(),
            Err(reason) => fx.skip(event, reason),
        },
        EventPayload::DeleteElement { element_id } => {
            let removed = delete_subtrees(state, &[*element_id]);
            record_removal(&mut fx, event, removed);
        }
        EventPayload::DeleteElements { element_ids } => {
            let removed = delete_subtrees(state, element_ids);
            record_removal(&mut fx, event, removed);
        }

        // --- Geometry ---
        EventPayload::MoveElement {
            element_id,
            position,
        } => {
            let moves = [PositionUpdate {
                element_id: *element_id,
                position: *position,
            }];
            apply_moves(state, &mut fx, event, &moves);
        }
        EventPayload::ResizeElement {
            element_id,
            size,
            position,
        } => {
            let resizes = [SizeUpdate {
                element_id: *element_id,
                size: *size,
                position: *position,
            }];
            apply_resizes(state, &mut fx, event, &resizes);
        }
        EventPayload::RotateElement {
            element_id,
            rotation,
        } => {
            let rotations = [RotationUpdate {
                element_id: *element_id,
                rotation: *rotation,
                position: None,
            }];
            apply_rotations(state, &mut fx, event, &rotations);
        }
        EventPayload::GroupMove { moves } => apply_moves(state, &mut fx, event, moves),
        EventPayload::GroupResize { resizes } => apply_resizes(state, &mut fx, event, resizes),
        EventPayload::GroupRotate { rotations } => {
            apply_rotations(state, &mut fx, event, rotations);
        }

        // --- Hierarchy ---
        EventPayload::ReorderElement {
            element_id,
            target,
            index,
            position,
            rotation,
        } => {
            let placement = Placement {
                target: *target,
                index: *index,
                position: *position,
                rotation: *rotation,
            };
            match reorder(state, *element_id, placement) {
                Ok(()) => {
                    fx.moved.insert(*element_id);
                    fx.changed();
                }
                Err(reason) => fx.skip(event, reason),
            }
        }
        EventPayload::ToggleVisibility { element_id } => {
            match state.elements.get_mut(element_id) {
                Some(element) => {
                    element.visible = !element.visible;
                    fx.changed();
                }
                None => fx.skip(event, "element not found"),
            }
        }
        EventPayload::ToggleLock { element_id } => match state.elements.get_mut(element_id) {
            Some(element) => {
                element.locked = !element.locked;
                fx.changed();
            }
            None => fx.skip(event, "element not found"),
        },

        // --- Style ---
        EventPayload::UpdateStyles { element_id, styles } => {
            merge_into(state, &mut fx, event, *element_id, |e| merge_styles(e, styles));
        }
        EventPayload::UpdateTypography {
            element_id,
            typography,
        } => {
            merge_into(state, &mut fx, event, *element_id, |e| {
                merge_typography(e, typography);
            });
        }
        EventPayload::UpdateAutoLayout {
            element_id,
            auto_layout,
        } => {
            merge_into(state, &mut fx, event, *element_id, |e| {
                merge_auto_layout(e, auto_layout);
            });
        }

        // --- Containers ---
        EventPayload::CreatePage { page_id, name } => {
            if state.pages.contains_key(page_id) {
                fx.skip(event, "page already exists");
            } else {
                state.pages.insert(
                    *page_id,
                    Page {
                        id: *page_id,
                        name: name.clone(),
                        root_elements: Vec::new(),
                    },
                );
                state.page_order.push(*page_id);
                if state.current_page_id.is_none() {
                    state.current_page_id = Some(*page_id);
                }
                fx.changed();
            }
        }
        EventPayload::UpdatePage { page_id, name } => match state.pages.get_mut(page_id) {
            Some(page) => {
                page.name.clone_from(name);
                fx.changed();
            }
            None => fx.skip(event, "page not found"),
        },
        EventPayload::DeletePage { page_id } => match delete_page(state, *page_id) {
            Some(removed) => {
                fx.removed.extend(removed);
                fx.changed();
            }
            None => fx.skip(event, "page not found"),
        },
        EventPayload::SetCurrentPage { page_id } => {
            if state.pages.contains_key(page_id) {
                state.current_page_id = Some(*page_id);
                fx.changed();
            } else {
                fx.skip(event, "page not found");
            }
        }
        EventPayload::CreateView {
            view_id,
            page_id,
            name,
            size,
        } => match create_view(state, *view_id, *page_id, name, *size) {
            Ok(()) => fx.changed(),
            Err(reason) => fx.skip(event, reason),
        },
        EventPayload::UpdateView { view_id, changes } => {
            match update_view(state, *view_id, changes) {
                Ok(()) => fx.changed(),
                Err(reason) => fx.skip(event, reason),
            }
        }
        EventPayload::DeleteView { view_id } => {
            if state.views.remove(view_id).is_some() {
                fx.changed();
            } else {
                fx.skip(event, "view not found");
            }
        }
    }

    fx
}

// ---------------------------------------------------------------------------
// Element lifecycle
// ---------------------------------------------------------------------------

struct NewElement<'a> {
    id: ElementId,
    kind: ElementKind,
    page: PageId,
    parent: Option<ElementId>,
    position: Point,
    size: Size,
    rotation: f64,
    name: &'a str,
    content: Option<&'a String>,
    styles: &'a Styles,
}

fn create_element(state: &mut DesignState, new: NewElement<'_>) -> Result<(), &'static str> {
    if state.elements.contains_key(&new.id) {
        return Err("element already exists");
    }
    if !state.pages.contains_key(&new.page) {
        return Err("page not found");
    }
    if !(new.position.is_finite() && new.size.is_finite() && new.rotation.is_finite()) {
        return Err("non-finite geometry");
    }
    if let Some(parent_id) = new.parent {
        let parent = state.elements.get(&parent_id).ok_or("parent not found")?;
        if !parent.kind.accepts_children() {
            return Err("parent cannot hold children");
        }
        if parent.page_id != new.page {
            return Err("parent is on another page");
        }
    }

    let size = new.size.clamped();
    let mut styles = new.styles.clone();
    styles.clamp_to(size);

    let element = Element {
        id: new.id,
        kind: new.kind,
        name: new.name.to_owned(),
        page_id: new.page,
        parent_id: new.parent,
        position: new.position,
        size,
        rotation: new.rotation,
        visible: true,
        locked: false,
        content: new.content.cloned(),
        styles,
        typography: Typography::default(),
        auto_layout: AutoLayout::default(),
        children: Vec::new(),
    };

    let container = new
        .parent
        .map_or(ContainerRef::Page(new.page), ContainerRef::Element);
    // New elements render on top.
    state
        .children_mut(container)
        .ok_or("container not found")?
        .push(new.id);
    state.elements.insert(new.id, element);
    Ok(())
}

fn update_element(
    state: &mut DesignState,
    id: ElementId,
    changes: &ElementPatch,
) -> Result<(), &'static str> {
    let element = state.elements.get_mut(&id).ok_or("element not found")?;
    if let Some(kind) = changes.kind {
        if !kind.accepts_children() && !element.children.is_empty() {
            return Err("leaf kind cannot keep children");
        }
        element.kind = kind;
    }
    if let Some(name) = &changes.name {
        element.name.clone_from(name);
    }
    if let Some(content) = &changes.content {
        element.content = Some(content.clone());
    }
    Ok(())
}

/// Remove every listed element together with its descendants.
///
/// The full subtree set is collected first; only then are ids removed from
/// the element map, from their owning order arrays and from the selection,
/// so no order array is left holding a dangling id. Missing ids are skipped.
fn delete_subtrees(state: &mut DesignState, roots: &[ElementId]) -> BTreeSet<ElementId> {
    let mut doomed = BTreeSet::new();
    for root in roots {
        if doomed.contains(root) {
            continue;
        }
        doomed.extend(state.subtree(*root));
    }

    // Detach from containers that survive the delete. Containers inside the
    // doomed set disappear wholesale.
    for id in &doomed {
        let survives_parent = state
            .elements
            .get(id)
            .and_then(|e| e.parent_id)
            .is_none_or(|parent| !doomed.contains(&parent));
        if survives_parent {
            state.detach(*id);
        }
    }
    for id in &doomed {
        state.elements.remove(id);
        state.selection.remove(id);
    }
    doomed
}

fn record_removal(fx: &mut Effects, event: &Event, removed: BTreeSet<ElementId>) {
    if removed.is_empty() {
        fx.skip(event, "element not found");
    } else {
        fx.removed.extend(removed);
        fx.changed();
    }
}

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

/// Group updates apply atomically: one non-finite entry voids the event.
fn apply_moves(state: &mut DesignState, fx: &mut Effects, event: &Event, moves: &[PositionUpdate]) {
    if moves.iter().any(|m| !m.position.is_finite()) {
        fx.skip(event, "non-finite position");
        return;
    }
    let mut any = false;
    for m in moves {
        if let Some(element) = state.elements.get_mut(&m.element_id) {
            element.position = m.position;
            fx.moved.insert(m.element_id);
            any = true;
        }
    }
    finish_group(fx, event, any);
}

fn apply_resizes(state: &mut DesignState, fx: &mut Effects, event: &Event, resizes: &[SizeUpdate]) {
    let finite = resizes
        .iter()
        .all(|r| r.size.is_finite() && r.position.is_none_or(Point::is_finite));
    if !finite {
        fx.skip(event, "non-finite size or position");
        return;
    }
    let mut any = false;
    for r in resizes {
        if let Some(element) = state.elements.get_mut(&r.element_id) {
            element.size = r.size.clamped();
            element.styles.clamp_to(element.size);
            if let Some(position) = r.position {
                element.position = position;
                fx.moved.insert(r.element_id);
            }
            any = true;
        }
    }
    finish_group(fx, event, any);
}

fn apply_rotations(
    state: &mut DesignState,
    fx: &mut Effects,
    event: &Event,
    rotations: &[RotationUpdate],
) {
    let finite = rotations
        .iter()
        .all(|r| r.rotation.is_finite() && r.position.is_none_or(Point::is_finite));
    if !finite {
        fx.skip(event, "non-finite rotation or position");
        return;
    }
    let mut any = false;
    for r in rotations {
        if let Some(element) = state.elements.get_mut(&r.element_id) {
            element.rotation = r.rotation;
            if let Some(position) = r.position {
                element.position = position;
            }
            fx.moved.insert(r.element_id);
            any = true;
        }
    }
    finish_group(fx, event, any);
}

fn finish_group(fx: &mut Effects, event: &Event, any: bool) {
    if any {
        fx.changed();
    } else {
        fx.skip(event, "element not found");
    }
}

// ---------------------------------------------------------------------------
// Hierarchy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct Placement {
    target: ContainerRef,
    index: usize,
    position: Option<Point>,
    rotation: Option<f64>,
}

/// Move `id` into `placement.target` at `placement.index` as one step.
///
/// All checks run before the first mutation, so the element is never seen
/// in zero or two containers.
fn reorder(state: &mut DesignState, id: ElementId, placement: Placement) -> Result<(), &'static str> {
    if !state.elements.contains_key(&id) {
        return Err("element not found");
    }
    if placement.position.is_some_and(|p| !p.is_finite())
        || placement.rotation.is_some_and(|r| !r.is_finite())
    {
        return Err("non-finite geometry");
    }
    let (new_parent, new_page) = match placement.target {
        ContainerRef::Page(page) => {
            if !state.pages.contains_key(&page) {
                return Err("target page not found");
            }
            (None, page)
        }
        ContainerRef::Element(parent_id) => {
            let parent = state.elements.get(&parent_id).ok_or("target element not found")?;
            if !parent.kind.accepts_children() {
                return Err("target cannot hold children");
            }
            let page = parent.page_id;
            if state.is_ancestor_or_self(id, parent_id) {
                return Err("target is inside the moved subtree");
            }
            (Some(parent_id), page)
        }
    };

    state.detach(id);
    let children = state
        .children_mut(placement.target)
        .ok_or("target container not found")?;
    let index = placement.index.min(children.len());
    children.insert(index, id);

    let page_changed = state.elements.get(&id).is_some_and(|e| e.page_id != new_page);
    if let Some(element) = state.elements.get_mut(&id) {
        element.parent_id = new_parent;
        if let Some(position) = placement.position {
            element.position = position;
        }
        if let Some(rotation) = placement.rotation {
            element.rotation = rotation;
        }
    }
    if page_changed {
        for member in state.subtree(id) {
            if let Some(element) = state.elements.get_mut(&member) {
                element.page_id = new_page;
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Style
// ---------------------------------------------------------------------------

fn merge_into<F>(state: &mut DesignState, fx: &mut Effects, event: &Event, id: ElementId, f: F)
where
    F: FnOnce(&mut Element),
{
    match state.elements.get_mut(&id) {
        Some(element) => {
            f(element);
            fx.changed();
        }
        None => fx.skip(event, "element not found"),
    }
}

fn merge_styles(element: &mut Element, patch: &Styles) {
    element.styles.merge(patch);
    element.styles.clamp_to(element.size);
}

fn merge_typography(element: &mut Element, patch: &Typography) {
    element.typography.merge(patch);
}

fn merge_auto_layout(element: &mut Element, patch: &AutoLayout) {
    element.auto_layout.merge(patch);
}

// ---------------------------------------------------------------------------
// Pages and views
// ---------------------------------------------------------------------------

fn delete_page(state: &mut DesignState, page_id: PageId) -> Option<BTreeSet<ElementId>> {
    let page = state.pages.get(&page_id)?;
    let roots = page.root_elements.clone();
    let removed = delete_subtrees(state, &roots);

    state.pages.remove(&page_id);
    state.page_order.retain(|p| *p != page_id);
    state.views.retain(|_, v| v.page_id != page_id);
    if state.current_page_id == Some(page_id) {
        state.current_page_id = state.page_order.first().copied();
    }
    Some(removed)
}

fn create_view(
    state: &mut DesignState,
    view_id: ViewId,
    page_id: PageId,
    name: &str,
    size: Size,
) -> Result<(), &'static str> {
    if state.views.contains_key(&view_id) {
        return Err("view already exists");
    }
    if !state.pages.contains_key(&page_id) {
        return Err("page not found");
    }
    if !size.is_finite() {
        return Err("non-finite size");
    }
    state.views.insert(
        view_id,
        View {
            id: view_id,
            page_id,
            name: name.to_owned(),
            size: size.clamped(),
        },
    );
    Ok(())
}

fn update_view(
    state: &mut DesignState,
    view_id: ViewId,
    changes: &ViewPatch,
) -> Result<(), &'static str> {
    let view = state.views.get_mut(&view_id).ok_or("view not found")?;
    if let Some(size) = changes.size {
        if !size.is_finite() {
            return Err("non-finite size");
        }
        view.size = size.clamped();
    }
    if let Some(name) = &changes.name {
        view.name.clone_from(name);
    }
    Ok(())
}
