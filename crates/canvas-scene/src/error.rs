//! Error types for the `canvas-scene` crate.
//!
//! Only structural problems are errors. Referential misses (an event naming
//! an element that no longer exists) are silent no-ops in the reducer and
//! never surface here.

use canvas_types::{ContainerRef, ElementId, ElementKind, PageId, ViewId};

/// Reasons an edit is refused before it reaches the log.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    /// An element with this id already exists.
    #[error("element already exists: {0}")]
    DuplicateElement(ElementId),

    /// A page with this id already exists.
    #[error("page already exists: {0}")]
    DuplicatePage(PageId),

    /// A view with this id already exists.
    #[error("view already exists: {0}")]
    DuplicateView(ViewId),

    /// The named page does not exist.
    #[error("page not found: {0}")]
    UnknownPage(PageId),

    /// The destination container does not exist.
    #[error("container not found: {0:?}")]
    UnknownContainer(ContainerRef),

    /// The destination element is a leaf kind and cannot hold children.
    #[error("element {element} of kind {kind:?} cannot hold children")]
    NotAContainer {
        /// The would-be parent.
        element: ElementId,
        /// Its kind.
        kind: ElementKind,
    },

    /// The parent lives on a different page than the child claims.
    #[error("parent {parent} is not on page {page}")]
    PageMismatch {
        /// The parent element.
        parent: ElementId,
        /// The page the child names.
        page: PageId,
    },

    /// The move would place an element inside its own subtree.
    #[error("moving {element} into {target:?} would create a cycle")]
    Cycle {
        /// The element being moved.
        element: ElementId,
        /// The destination container.
        target: ContainerRef,
    },

    /// The new parent chain would exceed the configured depth limit.
    #[error("nesting under {parent} exceeds the depth limit of {max_depth}")]
    TooDeep {
        /// The would-be parent.
        parent: ElementId,
        /// The configured limit.
        max_depth: usize,
    },

    /// A geometric field is NaN or infinite.
    #[error("non-finite {field} for element {element}")]
    NonFinite {
        /// The element whose geometry is invalid.
        element: ElementId,
        /// Which field ("position", "size", "rotation").
        field: &'static str,
    },

    /// A kind change would turn an element with children into a leaf.
    #[error("element {element} has children and cannot become {kind:?}")]
    LeafWithChildren {
        /// The element.
        element: ElementId,
        /// The requested leaf kind.
        kind: ElementKind,
    },
}
