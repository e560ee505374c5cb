//! The derived design state: an arena of elements plus their containers.
//!
//! [`DesignState`] is never edited directly by callers. The reducer is the
//! only writer; everyone else reads through the accessors here. Elements
//! live in a flat map keyed by [`ElementId`] and reference each other by id,
//! so tree walks are explicit worklists over the live `children` arrays.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use canvas_types::{ContainerRef, Element, ElementId, Page, PageId, View, ViewId};

/// The scene graph produced by folding the event log.
///
/// Everything except `selection` is reconstructible from the log. Selection
/// is session state: it is skipped when checkpointing and pruned by the
/// reducer whenever selected elements are deleted.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DesignState {
    /// All elements indexed by id.
    pub(crate) elements: BTreeMap<ElementId, Element>,
    /// All pages indexed by id.
    pub(crate) pages: BTreeMap<PageId, Page>,
    /// Page display order.
    pub(crate) page_order: Vec<PageId>,
    /// All views indexed by id.
    pub(crate) views: BTreeMap<ViewId, View>,
    /// The page being edited.
    pub(crate) current_page_id: Option<PageId>,
    /// Selected element ids.
    #[serde(skip)]
    pub(crate) selection: BTreeSet<ElementId>,
}

impl DesignState {
    /// Create an empty state.
    pub const fn new() -> Self {
        Self {
            elements: BTreeMap::new(),
            pages: BTreeMap::new(),
            page_order: Vec::new(),
            views: BTreeMap::new(),
            current_page_id: None,
            selection: BTreeSet::new(),
        }
    }

    // -------------------------------------------------------------------
    // Elements
    // -------------------------------------------------------------------

    /// Look up an element.
    pub fn element(&self, id: ElementId) -> Option<&Element> {
        self.elements.get(&id)
    }

    /// Whether an element exists.
    pub fn contains_element(&self, id: ElementId) -> bool {
        self.elements.contains_key(&id)
    }

    /// Iterate over all elements in id order.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.elements.values()
    }

    /// Number of elements.
    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    /// The container whose order array owns `id`, derived from the
    /// back-pointer.
    pub fn container_of(&self, id: ElementId) -> Option<ContainerRef> {
        let element = self.elements.get(&id)?;
        Some(element.parent_id.map_or(
            ContainerRef::Page(element.page_id),
            ContainerRef::Element,
        ))
    }

    /// The order array of a container.
    pub fn children_of(&self, container: ContainerRef) -> Option<&[ElementId]> {
        match container {
            ContainerRef::Page(page) => self.pages.get(&page).map(|p| p.root_elements.as_slice()),
            ContainerRef::Element(id) => self.elements.get(&id).map(|e| e.children.as_slice()),
        }
    }

    /// Stacking index of `id` inside its container.
    pub fn index_in_container(&self, id: ElementId) -> Option<usize> {
        let container = self.container_of(id)?;
        self.children_of(container)?.iter().position(|c| *c == id)
    }

    /// Ancestors of `id`, nearest first, bounded by `max_depth` steps.
    ///
    /// Stops early at a dangling parent reference.
    pub fn ancestors(&self, id: ElementId, max_depth: usize) -> Vec<ElementId> {
        let mut chain = Vec::new();
        let mut cursor = self.elements.get(&id).and_then(|e| e.parent_id);
        while let Some(parent) = cursor {
            if chain.len() >= max_depth {
                break;
            }
            chain.push(parent);
            cursor = self.elements.get(&parent).and_then(|e| e.parent_id);
        }
        chain
    }

    /// Whether `ancestor` lies on the parent chain of `id` (or is `id`).
    pub fn is_ancestor_or_self(&self, ancestor: ElementId, id: ElementId) -> bool {
        let mut cursor = Some(id);
        let mut steps: usize = 0;
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            // A chain longer than the element count means a cycle.
            if steps > self.elements.len() {
                return false;
            }
            steps = steps.saturating_add(1);
            cursor = self.elements.get(&current).and_then(|e| e.parent_id);
        }
        false
    }

    /// `id` and all of its descendants in pre-order, walking the live
    /// `children` arrays with an explicit stack.
    pub fn subtree(&self, id: ElementId) -> Vec<ElementId> {
        let mut out = Vec::new();
        let mut seen = BTreeSet::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(element) = self.elements.get(&current) else {
                continue;
            };
            if !seen.insert(current) {
                continue;
            }
            out.push(current);
            // Reverse so the bottom-most child is visited first.
            stack.extend(element.children.iter().rev().copied());
        }
        out
    }

    // -------------------------------------------------------------------
    // Pages and views
    // -------------------------------------------------------------------

    /// Look up a page.
    pub fn page(&self, id: PageId) -> Option<&Page> {
        self.pages.get(&id)
    }

    /// Pages in display order.
    pub fn pages(&self) -> impl Iterator<Item = &Page> {
        self.page_order.iter().filter_map(|id| self.pages.get(id))
    }

    /// Number of pages.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// The page being edited.
    pub const fn current_page_id(&self) -> Option<PageId> {
        self.current_page_id
    }

    /// Look up a view.
    pub fn view(&self, id: ViewId) -> Option<&View> {
        self.views.get(&id)
    }

    /// Views of one page.
    pub fn views_of(&self, page: PageId) -> impl Iterator<Item = &View> {
        self.views.values().filter(move |v| v.page_id == page)
    }

    // -------------------------------------------------------------------
    // Selection
    // -------------------------------------------------------------------

    /// The selected element ids.
    pub const fn selection(&self) -> &BTreeSet<ElementId> {
        &self.selection
    }

    /// Replace the selection. Unknown ids are dropped.
    pub fn set_selection<I>(&mut self, ids: I)
    where
        I: IntoIterator<Item = ElementId>,
    {
        self.selection = ids
            .into_iter()
            .filter(|id| self.elements.contains_key(id))
            .collect();
    }

    // -------------------------------------------------------------------
    // Reducer helpers
    // -------------------------------------------------------------------

    /// Mutable order array of a container.
    pub(crate) fn children_mut(&mut self, container: ContainerRef) -> Option<&mut Vec<ElementId>> {
        match container {
            ContainerRef::Page(page) => self.pages.get_mut(&page).map(|p| &mut p.root_elements),
            ContainerRef::Element(id) => self.elements.get_mut(&id).map(|e| &mut e.children),
        }
    }

    /// Remove `id` from the order array its back-pointer names. Returns the
    /// index it occupied.
    pub(crate) fn detach(&mut self, id: ElementId) -> Option<usize> {
        let container = self.container_of(id)?;
        let children = self.children_mut(container)?;
        let index = children.iter().position(|c| *c == id)?;
        children.remove(index);
        Some(index)
    }
}
