//! Structural integrity checks over a [`DesignState`].
//!
//! The reducer preserves these invariants on every fold; this module exists
//! to verify that claim after replaying a persisted log and in property
//! tests. It never repairs anything.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use canvas_types::{ContainerRef, ElementId, PageId};

use crate::state::DesignState;

/// One broken invariant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "violation", rename_all = "snake_case")]
pub enum IntegrityViolation {
    /// An element appears in no container's order array.
    Orphan {
        /// The element.
        element: ElementId,
    },
    /// An element appears in more than one order array, or twice in one.
    MultipleContainers {
        /// The element.
        element: ElementId,
        /// How many times it was listed.
        occurrences: usize,
    },
    /// An element is listed by a container other than its `parent_id`.
    ParentMismatch {
        /// The element.
        element: ElementId,
        /// The container that lists it.
        listed_in: ContainerRef,
    },
    /// An order array names an element that does not exist.
    DanglingReference {
        /// The container holding the stale id.
        container: ContainerRef,
        /// The missing element.
        element: ElementId,
    },
    /// The parent chain loops or exceeds the depth limit.
    CycleOrTooDeep {
        /// The element whose chain is broken.
        element: ElementId,
    },
    /// An element's page differs from its parent's page, or names a page
    /// that does not exist.
    PageMismatch {
        /// The element.
        element: ElementId,
        /// The page the element claims.
        page: PageId,
    },
}

impl fmt::Display for IntegrityViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Orphan { element } => write!(f, "element {element} has no container"),
            Self::MultipleContainers {
                element,
                occurrences,
            } => write!(f, "element {element} is listed {occurrences} times"),
            Self::ParentMismatch { element, listed_in } => {
                write!(f, "element {element} is listed in {listed_in:?} but points elsewhere")
            }
            Self::DanglingReference { container, element } => {
                write!(f, "{container:?} lists missing element {element}")
            }
            Self::CycleOrTooDeep { element } => {
                write!(f, "parent chain of {element} loops or is too deep")
            }
            Self::PageMismatch { element, page } => {
                write!(f, "element {element} has inconsistent page {page}")
            }
        }
    }
}

/// Check every structural invariant of `state`.
///
/// Returns an empty vector for a well-formed state.
pub fn check_integrity(state: &DesignState, max_depth: usize) -> Vec<IntegrityViolation> {
    let mut violations = Vec::new();
    let mut listed: BTreeMap<ElementId, usize> = BTreeMap::new();

    let containers = state
        .pages
        .values()
        .map(|p| (ContainerRef::Page(p.id), &p.root_elements))
        .chain(
            state
                .elements
                .values()
                .map(|e| (ContainerRef::Element(e.id), &e.children)),
        );
    for (container, children) in containers {
        for child in children {
            let Some(element) = state.elements.get(child) else {
                violations.push(IntegrityViolation::DanglingReference {
                    container,
                    element: *child,
                });
                continue;
            };
            let entry = listed.entry(*child).or_insert(0);
            *entry = entry.saturating_add(1);
            if state.container_of(element.id) != Some(container) {
                violations.push(IntegrityViolation::ParentMismatch {
                    element: *child,
                    listed_in: container,
                });
            }
        }
    }

    for element in state.elements.values() {
        match listed.get(&element.id).copied().unwrap_or(0) {
            0 => violations.push(IntegrityViolation::Orphan {
                element: element.id,
            }),
            1 => {}
            occurrences => violations.push(IntegrityViolation::MultipleContainers {
                element: element.id,
                occurrences,
            }),
        }

        let ancestors = state.ancestors(element.id, max_depth.saturating_add(1));
        let looped = ancestors.contains(&element.id);
        if looped || ancestors.len() > max_depth {
            violations.push(IntegrityViolation::CycleOrTooDeep {
                element: element.id,
            });
        }

        let page_ok = state.pages.contains_key(&element.page_id)
            && element
                .parent_id
                .and_then(|p| state.elements.get(&p))
                .is_none_or(|parent| parent.page_id == element.page_id);
        if !page_ok {
            violations.push(IntegrityViolation::PageMismatch {
                element: element.id,
                page: element.page_id,
            });
        }
    }

    violations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reducer::reduce_all;
    use canvas_types::{ElementKind, Event, EventPayload, Point, Size, Styles};

    fn create(id: ElementId, page: PageId, parent: Option<ElementId>) -> Event {
        Event::new(EventPayload::CreateElement {
            element_id: id,
            kind: ElementKind::Div,
            page_id: page,
            parent_id: parent,
            position: Point::ZERO,
            size: Size::new(10.0, 10.0),
            rotation: 0.0,
            name: String::new(),
            content: None,
            styles: Styles::default(),
        })
    }

    fn two_level() -> (DesignState, PageId, ElementId, ElementId) {
        let page = PageId::new();
        let (a, b) = (ElementId::new(), ElementId::new());
        let state = reduce_all(
            DesignState::new(),
            &[
                Event::new(EventPayload::CreatePage {
                    page_id: page,
                    name: "Page".to_owned(),
                }),
                create(a, page, None),
                create(b, page, Some(a)),
            ],
        );
        (state, page, a, b)
    }

    #[test]
    fn reduced_state_is_clean() {
        let (state, ..) = two_level();
        assert!(check_integrity(&state, 8).is_empty());
    }

    #[test]
    fn detects_orphans_and_dangling_ids() {
        let (mut state, page, a, b) = two_level();
        state.detach(b);
        let ghost = ElementId::new();
        if let Some(p) = state.pages.get_mut(&page) {
            p.root_elements.push(ghost);
        }
        let violations = check_integrity(&state, 8);
        assert!(violations.contains(&IntegrityViolation::Orphan { element: b }));
        assert!(violations.contains(&IntegrityViolation::DanglingReference {
            container: ContainerRef::Page(page),
            element: ghost,
        }));
        assert!(!violations.contains(&IntegrityViolation::Orphan { element: a }));
    }

    #[test]
    fn detects_double_listing_and_parent_mismatch() {
        let (mut state, page, _, b) = two_level();
        if let Some(p) = state.pages.get_mut(&page) {
            p.root_elements.push(b);
        }
        let violations = check_integrity(&state, 8);
        assert!(violations.contains(&IntegrityViolation::MultipleContainers {
            element: b,
            occurrences: 2,
        }));
        assert!(violations.contains(&IntegrityViolation::ParentMismatch {
            element: b,
            listed_in: ContainerRef::Page(page),
        }));
    }

    #[test]
    fn detects_cycles() {
        let (mut state, _, a, b) = two_level();
        if let Some(e) = state.elements.get_mut(&a) {
            e.parent_id = Some(b);
        }
        let violations = check_integrity(&state, 8);
        assert!(violations.contains(&IntegrityViolation::CycleOrTooDeep { element: a }));
    }

    #[test]
    fn depth_limit_counts_ancestors() {
        let (state, _, _, b) = two_level();
        assert!(check_integrity(&state, 1).is_empty());
        let violations = check_integrity(&state, 0);
        assert_eq!(violations, vec![IntegrityViolation::CycleOrTooDeep { element: b }]);
    }
}
