//! Enumeration types for the canvas scene graph.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Element kinds
// ---------------------------------------------------------------------------

/// The tag-like variant of an element.
///
/// Container kinds may hold children; leaf kinds may not. There is no
/// dedicated "group" kind: any container with at least one child acts as a
/// group for selection and transform purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    /// Generic block container.
    Div,
    /// Clipping frame container.
    Frame,
    /// Semantic section container.
    Section,
    /// Clickable button (may contain a label and an icon).
    Button,
    /// Hyperlink wrapper (may contain children).
    Link,
    /// Inline text run.
    Text,
    /// Heading text.
    Heading,
    /// Raster or vector image.
    Image,
    /// Video embed.
    Video,
    /// Icon glyph.
    Icon,
    /// Form input.
    Input,
    /// Primitive vector shape.
    Shape,
}

impl ElementKind {
    /// Whether elements of this kind may hold children.
    pub const fn accepts_children(self) -> bool {
        matches!(
            self,
            Self::Div | Self::Frame | Self::Section | Self::Button | Self::Link
        )
    }
}

// ---------------------------------------------------------------------------
// Layout and typography enums
// ---------------------------------------------------------------------------

/// Main axis of an auto-layout container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "snake_case")]
pub enum LayoutDirection {
    /// Children flow left to right.
    Row,
    /// Children flow top to bottom.
    Column,
}

/// Alignment of children along an auto-layout axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "snake_case")]
pub enum Alignment {
    /// Pack at the start of the axis.
    Start,
    /// Centre on the axis.
    Center,
    /// Pack at the end of the axis.
    End,
    /// Stretch to fill the axis.
    Stretch,
    /// Distribute free space between children.
    SpaceBetween,
}

/// Horizontal alignment of text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "snake_case")]
pub enum TextAlign {
    /// Flush left.
    Left,
    /// Centred.
    Center,
    /// Flush right.
    Right,
    /// Justified.
    Justify,
}

// ---------------------------------------------------------------------------
// Event kinds
// ---------------------------------------------------------------------------

/// Field-less discriminant of an event payload, used for logging and
/// statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    // --- Element lifecycle ---
    /// An element was created.
    CreateElement,
    /// Non-geometric element properties changed.
    UpdateElement,
    /// One element (and its subtree) was deleted.
    DeleteElement,
    /// Several elements (and their subtrees) were deleted atomically.
    DeleteElements,

    // --- Geometry ---
    /// An element's position changed.
    MoveElement,
    /// An element's size (and optionally position) changed.
    ResizeElement,
    /// An element's rotation changed.
    RotateElement,
    /// Several positions changed atomically.
    GroupMove,
    /// Several sizes changed atomically.
    GroupResize,
    /// Several rotations changed atomically.
    GroupRotate,

    // --- Hierarchy ---
    /// An element moved within or between containers.
    ReorderElement,
    /// An element's visibility flipped.
    ToggleVisibility,
    /// An element's lock flag flipped.
    ToggleLock,

    // --- Style ---
    /// Visual styles were merged.
    UpdateStyles,
    /// Typography was merged.
    UpdateTypography,
    /// Auto-layout settings were merged.
    UpdateAutoLayout,

    // --- Containers ---
    /// A page was created.
    CreatePage,
    /// A page was renamed.
    UpdatePage,
    /// A page and its content were deleted.
    DeletePage,
    /// The current page changed.
    SetCurrentPage,
    /// A view was created.
    CreateView,
    /// A view changed.
    UpdateView,
    /// A view was deleted.
    DeleteView,
}

impl EventKind {
    /// Whether events of this kind may change an element's absolute
    /// transform (and therefore require cache invalidation).
    pub const fn affects_transforms(self) -> bool {
        matches!(
            self,
            Self::MoveElement
                | Self::ResizeElement
                | Self::RotateElement
                | Self::GroupMove
                | Self::GroupResize
                | Self::GroupRotate
                | Self::ReorderElement
                | Self::DeleteElement
                | Self::DeleteElements
                | Self::DeletePage
        )
    }
}
