//! Event records: the only durable source of truth.
//!
//! An [`Event`] wraps an [`EventPayload`] with an id, a timestamp and an
//! optional author. Payloads are a tagged union serialized as
//! `{ "type": "MOVE_ELEMENT", "data": { ... } }`; the tag names are the
//! interchange contract with persisted logs, so variants may be added but
//! never renamed. New optional fields must carry `#[serde(default)]` so older
//! records keep deserializing.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{ElementKind, EventKind};
use crate::geometry::{Point, Size};
use crate::ids::{ElementId, EventId, PageId, ViewId};
use crate::structs::{AutoLayout, ContainerRef, ElementPatch, Styles, Typography, ViewPatch};

// ---------------------------------------------------------------------------
// Event envelope
// ---------------------------------------------------------------------------

/// An immutable edit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Event {
    /// Unique event identifier.
    pub id: EventId,
    /// Unix timestamp in milliseconds when the event was stamped.
    pub timestamp: i64,
    /// Author of the edit, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// The variant-specific edit.
    pub payload: EventPayload,
}

impl Event {
    /// Stamp a payload with a fresh id and the current time.
    pub fn new(payload: EventPayload) -> Self {
        Self {
            id: EventId::new(),
            timestamp: Utc::now().timestamp_millis(),
            user_id: None,
            payload,
        }
    }

    /// Attach an author.
    #[must_use]
    pub fn with_user(mut self, user_id: Option<String>) -> Self {
        self.user_id = user_id;
        self
    }

    /// The payload discriminant.
    pub const fn kind(&self) -> EventKind {
        self.payload.kind()
    }
}

// ---------------------------------------------------------------------------
// Payload items
// ---------------------------------------------------------------------------

/// One entry of a `GROUP_MOVE` payload.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct PositionUpdate {
    /// Target element.
    pub element_id: ElementId,
    /// New local position.
    pub position: Point,
}

/// One entry of a `GROUP_RESIZE` payload (also the body of
/// `RESIZE_ELEMENT`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SizeUpdate {
    /// Target element.
    pub element_id: ElementId,
    /// New size.
    pub size: Size,
    /// New local position for handles that also shift the origin
    /// (top/left edges), applied in the same step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Point>,
}

/// One entry of a `GROUP_ROTATE` payload.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct RotationUpdate {
    /// Target element.
    pub element_id: ElementId,
    /// New own rotation in degrees.
    pub rotation: f64,
    /// New local position when the element revolves about a shared pivot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Point>,
}

// ---------------------------------------------------------------------------
// Payload
// ---------------------------------------------------------------------------

/// The variant-specific content of an [`Event`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventPayload {
    // --- Element lifecycle ---
    /// Insert an element on top of its container's stack.
    CreateElement {
        /// Id of the new element.
        element_id: ElementId,
        /// Tag-like variant.
        kind: ElementKind,
        /// Page the element lives on.
        page_id: PageId,
        /// Parent element, or `None` for a page root.
        #[serde(default)]
        parent_id: Option<ElementId>,
        /// Local position.
        position: Point,
        /// Box size.
        size: Size,
        /// Own rotation in degrees.
        #[serde(default)]
        rotation: f64,
        /// Display name.
        #[serde(default)]
        name: String,
        /// Kind-specific content.
        #[serde(default)]
        content: Option<String>,
        /// Initial styles.
        #[serde(default)]
        styles: Styles,
    },
    /// Change non-geometric properties.
    UpdateElement {
        /// Target element.
        element_id: ElementId,
        /// Fields to change.
        changes: ElementPatch,
    },
    /// Delete an element and its whole subtree.
    DeleteElement {
        /// Target element.
        element_id: ElementId,
    },
    /// Delete several elements and their subtrees as one step.
    DeleteElements {
        /// Target elements.
        element_ids: Vec<ElementId>,
    },

    // --- Geometry ---
    /// Overwrite an element's local position.
    MoveElement {
        /// Target element.
        element_id: ElementId,
        /// New local position.
        position: Point,
    },
    /// Overwrite an element's size, and optionally its position.
    ResizeElement {
        /// Target element.
        element_id: ElementId,
        /// New size.
        size: Size,
        /// New local position, applied atomically with the size.
        #[serde(default)]
        position: Option<Point>,
    },
    /// Overwrite an element's own rotation.
    RotateElement {
        /// Target element.
        element_id: ElementId,
        /// New rotation in degrees.
        rotation: f64,
    },
    /// Move several elements as one step.
    GroupMove {
        /// Per-element positions.
        moves: Vec<PositionUpdate>,
    },
    /// Resize several elements as one step.
    GroupResize {
        /// Per-element sizes.
        resizes: Vec<SizeUpdate>,
    },
    /// Rotate several elements as one step.
    GroupRotate {
        /// Per-element rotations.
        rotations: Vec<RotationUpdate>,
    },

    // --- Hierarchy ---
    /// Move an element to `index` in `target`, possibly a different
    /// container. Optional geometry replaces the local transform in the same
    /// step so that reparenting need not visually jump.
    ReorderElement {
        /// Element being moved.
        element_id: ElementId,
        /// Destination container.
        target: ContainerRef,
        /// Destination index, clamped to the array length.
        index: usize,
        /// Local position in the destination container.
        #[serde(default)]
        position: Option<Point>,
        /// Own rotation in the destination container.
        #[serde(default)]
        rotation: Option<f64>,
    },
    /// Flip an element's visibility.
    ToggleVisibility {
        /// Target element.
        element_id: ElementId,
    },
    /// Flip an element's lock flag.
    ToggleLock {
        /// Target element.
        element_id: ElementId,
    },

    // --- Style ---
    /// Shallow-merge visual styles.
    UpdateStyles {
        /// Target element.
        element_id: ElementId,
        /// Patch.
        styles: Styles,
    },
    /// Shallow-merge typography.
    UpdateTypography {
        /// Target element.
        element_id: ElementId,
        /// Patch.
        typography: Typography,
    },
    /// Shallow-merge auto-layout settings.
    UpdateAutoLayout {
        /// Target element.
        element_id: ElementId,
        /// Patch.
        auto_layout: AutoLayout,
    },

    // --- Containers ---
    /// Create an empty page.
    CreatePage {
        /// Id of the new page.
        page_id: PageId,
        /// Display name.
        name: String,
    },
    /// Rename a page.
    UpdatePage {
        /// Target page.
        page_id: PageId,
        /// New name.
        name: String,
    },
    /// Delete a page with all its elements and views.
    DeletePage {
        /// Target page.
        page_id: PageId,
    },
    /// Switch the page being edited.
    SetCurrentPage {
        /// Target page.
        page_id: PageId,
    },
    /// Create a view of a page.
    CreateView {
        /// Id of the new view.
        view_id: ViewId,
        /// Page being previewed.
        page_id: PageId,
        /// Display name.
        name: String,
        /// Viewport size.
        size: Size,
    },
    /// Change a view.
    UpdateView {
        /// Target view.
        view_id: ViewId,
        /// Fields to change.
        changes: ViewPatch,
    },
    /// Delete a view.
    DeleteView {
        /// Target view.
        view_id: ViewId,
    },
}

impl EventPayload {
    /// The field-less discriminant of this payload.
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::CreateElement { .. } => EventKind::CreateElement,
            Self::UpdateElement { .. } => EventKind::UpdateElement,
            Self::DeleteElement { .. } => EventKind::DeleteElement,
            Self::DeleteElements { .. } => EventKind::DeleteElements,
            Self::MoveElement { .. } => EventKind::MoveElement,
            Self::ResizeElement { .. } => EventKind::ResizeElement,
            Self::RotateElement { .. } => EventKind::RotateElement,
            Self::GroupMove { .. } => EventKind::GroupMove,
            Self::GroupResize { .. } => EventKind::GroupResize,
            Self::GroupRotate { .. } => EventKind::GroupRotate,
            Self::ReorderElement { .. } => EventKind::ReorderElement,
            Self::ToggleVisibility { .. } => EventKind::ToggleVisibility,
            Self::ToggleLock { .. } => EventKind::ToggleLock,
            Self::UpdateStyles { .. } => EventKind::UpdateStyles,
            Self::UpdateTypography { .. } => EventKind::UpdateTypography,
            Self::UpdateAutoLayout { .. } => EventKind::UpdateAutoLayout,
            Self::CreatePage { .. } => EventKind::CreatePage,
            Self::UpdatePage { .. } => EventKind::UpdatePage,
            Self::DeletePage { .. } => EventKind::DeletePage,
            Self::SetCurrentPage { .. } => EventKind::SetCurrentPage,
            Self::CreateView { .. } => EventKind::CreateView,
            Self::UpdateView { .. } => EventKind::UpdateView,
            Self::DeleteView { .. } => EventKind::DeleteView,
        }
    }

    /// Every element id this payload names directly (not descendants).
    pub fn element_ids(&self) -> Vec<ElementId> {
        match self {
            Self::CreateElement { element_id, .. }
            | Self::UpdateElement { element_id, .. }
            | Self::DeleteElement { element_id }
            | Self::MoveElement { element_id, .. }
            | Self::ResizeElement { element_id, .. }
            | Self::RotateElement { element_id, .. }
            | Self::ReorderElement { element_id, .. }
            | Self::ToggleVisibility { element_id }
            | Self::ToggleLock { element_id }
            | Self::UpdateStyles { element_id, .. }
            | Self::UpdateTypography { element_id, .. }
            | Self::UpdateAutoLayout { element_id, .. } => vec![*element_id],
            Self::DeleteElements { element_ids } => element_ids.clone(),
            Self::GroupMove { moves } => moves.iter().map(|m| m.element_id).collect(),
            Self::GroupResize { resizes } => resizes.iter().map(|r| r.element_id).collect(),
            Self::GroupRotate { rotations } => rotations.iter().map(|r| r.element_id).collect(),
            Self::CreatePage { .. }
            | Self::UpdatePage { .. }
            | Self::DeletePage { .. }
            | Self::SetCurrentPage { .. }
            | Self::CreateView { .. }
            | Self::UpdateView { .. }
            | Self::DeleteView { .. } => Vec::new(),
        }
    }
}
