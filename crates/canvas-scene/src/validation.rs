//! Dispatch-time structural validation.
//!
//! Cycles, double parenting and unknown containers are refused here, before
//! an event is stamped into the log. The reducer repeats the same guards so
//! that replaying a log written by an older or buggy client can never corrupt
//! the tree, but a well-behaved writer never relies on that.
//!
//! Events recorded inside an open transaction are validated against the live
//! state *plus* the structural edits already buffered in the same transaction
//! ([`PendingScope`]), because the buffer is not folded until commit.

use std::collections::{BTreeMap, BTreeSet};

use canvas_types::{
    ContainerRef, ElementId, ElementKind, EventPayload, PageId, Point, Size, ViewId,
};

use crate::error::ValidationError;
use crate::state::DesignState;

/// Structural edits buffered in an open transaction but not yet folded.
///
/// Tracks creations, reparents and deletions so that a later record sees
/// the tree as it will look once the earlier records are applied.
#[derive(Debug, Clone, Default)]
pub struct PendingScope {
    elements: BTreeMap<ElementId, PendingElement>,
    /// Effective parent of every element whose parent differs from live state.
    parents: BTreeMap<ElementId, Option<ElementId>>,
    /// Page of every element moved to the root of a page.
    root_pages: BTreeMap<ElementId, PageId>,
    /// Roots of deleted subtrees.
    deleted: BTreeSet<ElementId>,
    pages: BTreeSet<PageId>,
    deleted_pages: BTreeSet<PageId>,
    views: BTreeSet<ViewId>,
}

#[derive(Debug, Clone, Copy)]
struct PendingElement {
    kind: ElementKind,
    page: PageId,
}

impl PendingScope {
    /// Create an empty scope.
    pub const fn new() -> Self {
        Self {
            elements: BTreeMap::new(),
            parents: BTreeMap::new(),
            root_pages: BTreeMap::new(),
            deleted: BTreeSet::new(),
            pages: BTreeSet::new(),
            deleted_pages: BTreeSet::new(),
            views: BTreeSet::new(),
        }
    }

    /// Remember the structural effect of an accepted payload.
    ///
    /// `state` is the live state the payload was validated against.
    pub fn record(&mut self, state: &DesignState, payload: &EventPayload) {
        match payload {
            EventPayload::CreateElement {
                element_id,
                kind,
                page_id,
                parent_id,
                ..
            } => {
                self.elements.insert(
                    *element_id,
                    PendingElement {
                        kind: *kind,
                        page: *page_id,
                    },
                );
                self.parents.insert(*element_id, *parent_id);
            }
            EventPayload::ReorderElement {
                element_id, target, ..
            } => match target {
                ContainerRef::Page(page) => {
                    self.parents.insert(*element_id, None);
                    self.root_pages.insert(*element_id, *page);
                }
                ContainerRef::Element(parent) => {
                    self.parents.insert(*element_id, Some(*parent));
                }
            },
            EventPayload::DeleteElement { element_id } => {
                self.deleted.insert(*element_id);
            }
            EventPayload::DeleteElements { element_ids } => {
                self.deleted.extend(element_ids.iter().copied());
            }
            EventPayload::DeletePage { page_id } => {
                let on_page: Vec<ElementId> = {
                    let lookup = Lookup {
                        state,
                        pending: self,
                        limit: state.element_count().saturating_add(self.elements.len()),
                    };
                    state
                        .elements()
                        .map(|e| e.id)
                        .chain(self.elements.keys().copied())
                        .filter(|id| lookup.page_of(*id) == Some(*page_id))
                        .collect()
                };
                self.deleted.extend(on_page);
                self.pages.remove(page_id);
                self.deleted_pages.insert(*page_id);
            }
            EventPayload::CreatePage { page_id, .. } => {
                self.pages.insert(*page_id);
                self.deleted_pages.remove(page_id);
            }
            EventPayload::CreateView { view_id, .. } => {
                self.views.insert(*view_id);
            }
            _ => {}
        }
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
            && self.parents.is_empty()
            && self.deleted.is_empty()
            && self.pages.is_empty()
            && self.deleted_pages.is_empty()
            && self.views.is_empty()
    }
}

/// Read-only view over live state plus a pending scope.
struct Lookup<'a> {
    state: &'a DesignState,
    pending: &'a PendingScope,
    /// Bound on every parent-chain walk.
    limit: usize,
}

impl Lookup<'_> {
    fn element_exists(&self, id: ElementId) -> bool {
        (self.state.contains_element(id) || self.pending.elements.contains_key(&id))
            && !self.removed(id)
    }

    /// Whether `id` or one of its effective ancestors was deleted.
    fn removed(&self, id: ElementId) -> bool {
        if self.pending.deleted.is_empty() {
            return false;
        }
        self.chain(id).any(|a| self.pending.deleted.contains(&a))
    }

    fn page_exists(&self, id: PageId) -> bool {
        (self.state.page(id).is_some() || self.pending.pages.contains(&id))
            && !self.pending.deleted_pages.contains(&id)
    }

    fn kind(&self, id: ElementId) -> Option<ElementKind> {
        if !self.element_exists(id) {
            return None;
        }
        self.state
            .element(id)
            .map(|e| e.kind)
            .or_else(|| self.pending.elements.get(&id).map(|p| p.kind))
    }

    /// Page of the effective root above `id`.
    fn page_of(&self, id: ElementId) -> Option<PageId> {
        let root = self.chain(id).last()?;
        self.pending
            .root_pages
            .get(&root)
            .copied()
            .or_else(|| self.pending.elements.get(&root).map(|p| p.page))
            .or_else(|| self.state.element(root).map(|e| e.page_id))
    }

    fn parent(&self, id: ElementId) -> Option<ElementId> {
        match self.pending.parents.get(&id) {
            Some(parent) => *parent,
            None => self.state.element(id).and_then(|e| e.parent_id),
        }
    }

    /// `id` followed by its effective ancestors, bounded by the walk limit.
    fn chain(&self, id: ElementId) -> impl Iterator<Item = ElementId> + '_ {
        std::iter::successors(Some(id), |current| self.parent(*current))
            .take(self.limit.saturating_add(2))
    }

    /// Effective children of `id`.
    fn children(&self, id: ElementId) -> Vec<ElementId> {
        let mut out: Vec<ElementId> = self
            .state
            .element(id)
            .map(|e| {
                e.children
                    .iter()
                    .copied()
                    .filter(|c| self.parent(*c) == Some(id))
                    .collect()
            })
            .unwrap_or_default();
        for (child, parent) in &self.pending.parents {
            if *parent == Some(id) && !out.contains(child) {
                out.push(*child);
            }
        }
        out.retain(|c| !self.pending.deleted.contains(c));
        out
    }

    /// Number of ancestors above `id`, capped at `limit + 1`.
    fn depth(&self, id: ElementId) -> usize {
        self.chain(id).skip(1).count()
    }

    /// Levels below `id` in its effective subtree, capped at `limit + 1`.
    fn height(&self, id: ElementId) -> usize {
        let mut level = vec![id];
        let mut height: usize = 0;
        loop {
            let next: Vec<ElementId> = level.iter().flat_map(|n| self.children(*n)).collect();
            if next.is_empty() {
                return height;
            }
            height = height.saturating_add(1);
            if height > self.limit {
                return height;
            }
            level = next;
        }
    }

    /// Whether `ancestor` is `id` or lies on its parent chain.
    fn is_ancestor_or_self(&self, ancestor: ElementId, id: ElementId) -> bool {
        self.chain(id).any(|current| current == ancestor)
    }

    /// Check that `parent` can hold a subtree `height` levels tall.
    fn check_parent(&self, parent: ElementId, height: usize) -> Result<(), ValidationError> {
        let Some(kind) = self.kind(parent) else {
            return Err(ValidationError::UnknownContainer(ContainerRef::Element(
                parent,
            )));
        };
        if !kind.accepts_children() {
            return Err(ValidationError::NotAContainer {
                element: parent,
                kind,
            });
        }
        // The subtree root sits one level below the parent.
        let deepest = self
            .depth(parent)
            .saturating_add(1)
            .saturating_add(height);
        if deepest > self.limit {
            return Err(ValidationError::TooDeep {
                parent,
                max_depth: self.limit,
            });
        }
        Ok(())
    }
}
fn finite_point(element: ElementId, p: Point) -> Result<(), ValidationError> {
    if p.is_finite() {
        Ok(())
    } else {
        Err(ValidationError::NonFinite {
            element,
            field: "position",
        })
    }
}

fn finite_size(element: ElementId, s: Size) -> Result<(), ValidationError> {
    if s.is_finite() {
        Ok(())
    } else {
        Err(ValidationError::NonFinite {
            element,
            field: "size",
        })
    }
}

fn finite_rotation(element: ElementId, r: f64) -> Result<(), ValidationError> {
    if r.is_finite() {
        Ok(())
    } else {
        Err(ValidationError::NonFinite {
            element,
            field: "rotation",
        })
    }
}

/// Validate a payload against live state only.
///
/// # Errors
///
/// Returns the first [`ValidationError`] found.
pub fn validate(
    state: &DesignState,
    payload: &EventPayload,
    max_depth: usize,
) -> Result<(), ValidationError> {
    validate_in_scope(state, &PendingScope::new(), payload, max_depth)
}

/// Validate a payload against live state plus buffered creations.
///
/// # Errors
///
/// Returns the first [`ValidationError`] found.
#[allow(clippy::too_many_lines)]
pub fn validate_in_scope(
    state: &DesignState,
    pending: &PendingScope,
    payload: &EventPayload,
    max_depth: usize,
) -> Result<(), ValidationError> {
    let lookup = Lookup {
        state,
        pending,
        limit: max_depth,
    };

    match payload {
        EventPayload::CreateElement {
            element_id,
            page_id,
            parent_id,
            position,
            size,
            rotation,
            ..
        } => {
            // Ids deleted earlier in the same transaction are not reused.
            if lookup.element_exists(*element_id) || pending.deleted.contains(element_id) {
                return Err(ValidationError::DuplicateElement(*element_id));
            }
            if !lookup.page_exists(*page_id) {
                return Err(ValidationError::UnknownPage(*page_id));
            }
            if let Some(parent) = parent_id {
                lookup.check_parent(*parent, 0)?;
                if lookup.page_of(*parent) != Some(*page_id) {
                    return Err(ValidationError::PageMismatch {
                        parent: *parent,
                        page: *page_id,
                    });
                }
            }
            finite_point(*element_id, *position)?;
            finite_size(*element_id, *size)?;
            finite_rotation(*element_id, *rotation)
        }

        EventPayload::UpdateElement {
            element_id,
            changes,
        } => {
            if let Some(kind) = changes.kind {
                if !kind.accepts_children() && !lookup.children(*element_id).is_empty() {
                    return Err(ValidationError::LeafWithChildren {
                        element: *element_id,
                        kind,
                    });
                }
            }
            Ok(())
        }

        EventPayload::MoveElement {
            element_id,
            position,
        } => finite_point(*element_id, *position),

        EventPayload::ResizeElement {
            element_id,
            size,
            position,
        } => {
            finite_size(*element_id, *size)?;
            position.map_or(Ok(()), |p| finite_point(*element_id, p))
        }

        EventPayload::RotateElement {
            element_id,
            rotation,
        } => finite_rotation(*element_id, *rotation),

        EventPayload::GroupMove { moves } => moves
            .iter()
            .try_for_each(|m| finite_point(m.element_id, m.position)),

        EventPayload::GroupResize { resizes } => resizes.iter().try_for_each(|r| {
            finite_size(r.element_id, r.size)?;
            r.position.map_or(Ok(()), |p| finite_point(r.element_id, p))
        }),

        EventPayload::GroupRotate { rotations } => rotations.iter().try_for_each(|r| {
            finite_rotation(r.element_id, r.rotation)?;
            r.position.map_or(Ok(()), |p| finite_point(r.element_id, p))
        }),

        EventPayload::ReorderElement {
            element_id,
            target,
            position,
            rotation,
            ..
        } => {
            match target {
                ContainerRef::Page(page) => {
                    if !lookup.page_exists(*page) {
                        return Err(ValidationError::UnknownContainer(*target));
                    }
                }
                ContainerRef::Element(parent) => {
                    if !lookup.element_exists(*parent) {
                        return Err(ValidationError::UnknownContainer(*target));
                    }
                    if lookup.is_ancestor_or_self(*element_id, *parent) {
                        return Err(ValidationError::Cycle {
                            element: *element_id,
                            target: *target,
                        });
                    }
                    lookup.check_parent(*parent, lookup.height(*element_id))?;
                }
            }
            if let Some(p) = position {
                finite_point(*element_id, *p)?;
            }
            rotation.map_or(Ok(()), |r| finite_rotation(*element_id, r))
        }

        EventPayload::CreatePage { page_id, .. } => {
            if lookup.page_exists(*page_id) {
                Err(ValidationError::DuplicatePage(*page_id))
            } else {
                Ok(())
            }
        }

        EventPayload::SetCurrentPage { page_id } => {
            if lookup.page_exists(*page_id) {
                Ok(())
            } else {
                Err(ValidationError::UnknownPage(*page_id))
            }
        }

        EventPayload::CreateView {
            view_id, page_id, ..
        } => {
            if state.view(*view_id).is_some() || pending.views.contains(view_id) {
                return Err(ValidationError::DuplicateView(*view_id));
            }
            if lookup.page_exists(*page_id) {
                Ok(())
            } else {
                Err(ValidationError::UnknownPage(*page_id))
            }
        }

        // Referential-only payloads: a missing target is a reducer no-op.
        EventPayload::DeleteElement { .. }
        | EventPayload::DeleteElements { .. }
        | EventPayload::ToggleVisibility { .. }
        | EventPayload::ToggleLock { .. }
        | EventPayload::UpdateStyles { .. }
        | EventPayload::UpdateTypography { .. }
        | EventPayload::UpdateAutoLayout { .. }
        | EventPayload::UpdatePage { .. }
        | EventPayload::DeletePage { .. }
        | EventPayload::UpdateView { .. }
        | EventPayload::DeleteView { .. } => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reducer::reduce_all;
    use canvas_types::Event;

    const DEPTH: usize = 64;

    fn create(id: ElementId, page: PageId, parent: Option<ElementId>, kind: ElementKind) -> EventPayload {
        EventPayload::CreateElement {
            element_id: id,
            kind,
            page_id: page,
            parent_id: parent,
            position: Point::ZERO,
            size: Size::new(10.0, 10.0),
            rotation: 0.0,
            name: String::new(),
            content: None,
            styles: canvas_types::Styles::default(),
        }
    }

    fn seeded() -> (DesignState, PageId, ElementId, ElementId) {
        let page = PageId::new();
        let outer = ElementId::new();
        let inner = ElementId::new();
        let events = vec![
            Event::new(EventPayload::CreatePage {
                page_id: page,
                name: "Home".to_owned(),
            }),
            Event::new(create(outer, page, None, ElementKind::Div)),
            Event::new(create(inner, page, Some(outer), ElementKind::Div)),
        ];
        (reduce_all(DesignState::new(), &events), page, outer, inner)
    }

    #[test]
    fn reparent_into_own_descendant_is_a_cycle() {
        let (state, _, outer, inner) = seeded();
        let payload = EventPayload::ReorderElement {
            element_id: outer,
            target: ContainerRef::Element(inner),
            index: 0,
            position: None,
            rotation: None,
        };
        assert!(matches!(
            validate(&state, &payload, DEPTH),
            Err(ValidationError::Cycle { .. })
        ));
    }

    #[test]
    fn reparent_into_self_is_a_cycle() {
        let (state, _, outer, _) = seeded();
        let payload = EventPayload::ReorderElement {
            element_id: outer,
            target: ContainerRef::Element(outer),
            index: 0,
            position: None,
            rotation: None,
        };
        assert!(validate(&state, &payload, DEPTH).is_err());
    }

    #[test]
    fn create_under_leaf_is_refused() {
        let (state, page, outer, _) = seeded();
        let text = ElementId::new();
        let mut scope = PendingScope::new();
        let make_text = create(text, page, Some(outer), ElementKind::Text);
        assert!(validate_in_scope(&state, &scope, &make_text, DEPTH).is_ok());
        scope.record(&state, &make_text);

        let child = create(ElementId::new(), page, Some(text), ElementKind::Div);
        assert!(matches!(
            validate_in_scope(&state, &scope, &child, DEPTH),
            Err(ValidationError::NotAContainer { .. })
        ));
    }

    #[test]
    fn pending_creations_are_visible_to_later_records() {
        let (state, page, _, _) = seeded();
        let mut scope = PendingScope::new();
        let parent = ElementId::new();
        let make_parent = create(parent, page, None, ElementKind::Frame);
        scope.record(&state, &make_parent);
        let child = create(ElementId::new(), page, Some(parent), ElementKind::Div);
        assert!(validate_in_scope(&state, &scope, &child, DEPTH).is_ok());
        // Without the scope the parent is unknown.
        assert!(validate(&state, &child, DEPTH).is_err());
    }

    #[test]
    fn duplicate_ids_are_refused() {
        let (state, page, outer, _) = seeded();
        assert_eq!(
            validate(&state, &create(outer, page, None, ElementKind::Div), DEPTH),
            Err(ValidationError::DuplicateElement(outer))
        );
        assert_eq!(
            validate(
                &state,
                &EventPayload::CreatePage {
                    page_id: page,
                    name: String::new()
                },
                DEPTH
            ),
            Err(ValidationError::DuplicatePage(page))
        );
    }

    #[test]
    fn cross_page_parent_is_refused() {
        let (state, _, outer, _) = seeded();
        let other_page = PageId::new();
        let mut scope = PendingScope::new();
        scope.record(
            &state,
            &EventPayload::CreatePage {
                page_id: other_page,
                name: "Other".to_owned(),
            },
        );
        let child = create(ElementId::new(), other_page, Some(outer), ElementKind::Div);
        assert!(matches!(
            validate_in_scope(&state, &scope, &child, DEPTH),
            Err(ValidationError::PageMismatch { .. })
        ));
    }

    #[test]
    fn non_finite_geometry_is_refused() {
        let (state, _, outer, _) = seeded();
        let payload = EventPayload::MoveElement {
            element_id: outer,
            position: Point::new(f64::NAN, 0.0),
        };
        assert!(matches!(
            validate(&state, &payload, DEPTH),
            Err(ValidationError::NonFinite { field: "position", .. })
        ));
    }

    #[test]
    fn depth_limit_is_enforced() {
        let (state, page, _, inner) = seeded();
        // `inner` already sits at depth 1; a limit of 1 forbids going deeper.
        let child = create(ElementId::new(), page, Some(inner), ElementKind::Div);
        assert!(matches!(
            validate(&state, &child, 1),
            Err(ValidationError::TooDeep { .. })
        ));
        assert!(validate(&state, &child, DEPTH).is_ok());
    }

    #[test]
    fn missing_targets_are_not_errors() {
        let (state, _, _, _) = seeded();
        let payload = EventPayload::DeleteElement {
            element_id: ElementId::new(),
        };
        assert!(validate(&state, &payload, DEPTH).is_ok());
    }

    #[test]
    fn leaf_kind_change_with_children_is_refused() {
        let (state, _, outer, _) = seeded();
        let payload = EventPayload::UpdateElement {
            element_id: outer,
            changes: canvas_types::ElementPatch {
                kind: Some(ElementKind::Image),
                ..canvas_types::ElementPatch::default()
            },
        };
        assert!(matches!(
            validate(&state, &payload, DEPTH),
            Err(ValidationError::LeafWithChildren { .. })
        ));
    }

    fn reorder(element: ElementId, parent: ElementId) -> EventPayload {
        EventPayload::ReorderElement {
            element_id: element,
            target: ContainerRef::Element(parent),
            index: 0,
            position: None,
            rotation: None,
        }
    }

    #[test]
    fn reparent_counts_the_height_of_the_moved_subtree() {
        // a -> b and x -> y -> z, limit 2.
        let page = PageId::new();
        let [a, b, x, y, z] = [(); 5].map(|()| ElementId::new());
        let mut events = vec![Event::new(EventPayload::CreatePage {
            page_id: page,
            name: "Home".to_owned(),
        })];
        for (id, parent) in [(a, None), (b, Some(a)), (x, None), (y, Some(x)), (z, Some(y))] {
            events.push(Event::new(create(id, page, parent, ElementKind::Frame)));
        }
        let state = reduce_all(DesignState::new(), &events);

        // z would land at depth 4.
        assert_eq!(
            validate(&state, &reorder(x, b), 2),
            Err(ValidationError::TooDeep {
                parent: b,
                max_depth: 2
            })
        );
        // y -> z lands at depth 2 under a.
        assert!(validate(&state, &reorder(y, a), 2).is_ok());
        assert!(validate(&state, &reorder(x, b), 4).is_ok());
    }

    #[test]
    fn pending_reparents_are_visible_to_later_records() {
        let (state, page, outer, _) = seeded();
        let other = ElementId::new();
        let mut scope = PendingScope::new();
        let make_other = create(other, page, None, ElementKind::Frame);
        scope.record(&state, &make_other);

        let first = reorder(outer, other);
        assert!(validate_in_scope(&state, &scope, &first, DEPTH).is_ok());
        scope.record(&state, &first);

        // `other` now holds `outer`, so the reverse edge closes a cycle.
        assert!(matches!(
            validate_in_scope(&state, &scope, &reorder(other, outer), DEPTH),
            Err(ValidationError::Cycle { .. })
        ));
        // The buffered move also adds a level above `inner`.
        let child = create(ElementId::new(), page, Some(outer), ElementKind::Div);
        assert!(validate_in_scope(&state, &scope, &child, 1).is_err());
        assert!(validate(&state, &child, 1).is_ok());
    }

    #[test]
    fn pending_deletes_hide_the_subtree() {
        let (state, page, outer, inner) = seeded();
        let mut scope = PendingScope::new();
        scope.record(&state, &EventPayload::DeleteElement { element_id: outer });

        let child = create(ElementId::new(), page, Some(inner), ElementKind::Div);
        assert_eq!(
            validate_in_scope(&state, &scope, &child, DEPTH),
            Err(ValidationError::UnknownContainer(ContainerRef::Element(inner)))
        );
        // A deleted id is not recreated within the same transaction.
        assert_eq!(
            validate_in_scope(&state, &scope, &create(outer, page, None, ElementKind::Div), DEPTH),
            Err(ValidationError::DuplicateElement(outer))
        );
    }

    #[test]
    fn pending_page_delete_hides_its_elements() {
        let (state, page, outer, _) = seeded();
        let mut scope = PendingScope::new();
        scope.record(&state, &EventPayload::DeletePage { page_id: page });
        assert!(!scope.is_empty());

        let child = create(ElementId::new(), page, Some(outer), ElementKind::Div);
        assert!(validate_in_scope(&state, &scope, &child, DEPTH).is_err());
        assert_eq!(
            validate_in_scope(
                &state,
                &scope,
                &EventPayload::SetCurrentPage { page_id: page },
                DEPTH
            ),
            Err(ValidationError::UnknownPage(page))
        );
    }
}
