//! Core entity structs for the canvas scene graph.
//!
//! Covers [`Element`] with its field groups ([`Styles`], [`Typography`],
//! [`AutoLayout`]), the [`Page`] and [`View`] containers, and the
//! [`ContainerRef`] used to address "the array that owns an element".
//!
//! Field groups double as their own patch type: every field is optional and
//! [`Styles::merge`] and friends copy the `Some` fields of a patch over the
//! current values (shallow merge).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{Alignment, ElementKind, LayoutDirection, TextAlign};
use crate::geometry::{Point, Size};
use crate::ids::{ElementId, PageId, ViewId};

/// Copy every `Some` field of `patch` into `target`.
macro_rules! merge_fields {
    ($target:expr, $patch:expr, [$($field:ident),* $(,)?]) => {
        $(
            if let Some(value) = &$patch.$field {
                $target.$field = Some(value.clone());
            }
        )*
    };
}

// ---------------------------------------------------------------------------
// Styles
// ---------------------------------------------------------------------------

/// Visual styles of an element.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Styles {
    /// Background fill (CSS colour or gradient).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill: Option<String>,
    /// Border colour.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke: Option<String>,
    /// Border width in pixels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke_width: Option<f64>,
    /// Opacity in `[0, 1]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
    /// Corner radius in pixels, never above half the shorter side.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corner_radius: Option<f64>,
    /// Box shadow (CSS syntax).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shadow: Option<String>,
    /// Any other style property, keyed by CSS property name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Styles {
    /// Shallow-merge `patch` into `self`. In `extra`, a JSON `null` removes
    /// the key.
    pub fn merge(&mut self, patch: &Self) {
        merge_fields!(self, patch, [fill, stroke, stroke_width, opacity, corner_radius, shadow]);
        for (key, value) in &patch.extra {
            if value.is_null() {
                self.extra.remove(key);
            } else {
                self.extra.insert(key.clone(), value.clone());
            }
        }
    }

    /// Clamp numeric fields into their valid ranges for a box of `size`.
    ///
    /// Non-finite values are dropped, negative widths and radii clamp to 0,
    /// opacity clamps to `[0, 1]`.
    pub fn clamp_to(&mut self, size: Size) {
        self.corner_radius = self
            .corner_radius
            .filter(|r| r.is_finite())
            .map(|r| r.clamp(0.0, size.max_corner_radius()));
        self.stroke_width = self
            .stroke_width
            .filter(|w| w.is_finite())
            .map(|w| w.max(0.0));
        self.opacity = self
            .opacity
            .filter(|o| o.is_finite())
            .map(|o| o.clamp(0.0, 1.0));
    }
}

// ---------------------------------------------------------------------------
// Typography
// ---------------------------------------------------------------------------

/// Text styling of an element.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Typography {
    /// Font family name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
    /// Font size in pixels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
    /// Numeric font weight (100-900).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_weight: Option<u16>,
    /// Line height multiplier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_height: Option<f64>,
    /// Letter spacing in pixels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub letter_spacing: Option<f64>,
    /// Horizontal alignment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_align: Option<TextAlign>,
    /// Text colour.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl Typography {
    /// Shallow-merge `patch` into `self`.
    pub fn merge(&mut self, patch: &Self) {
        merge_fields!(
            self,
            patch,
            [font_family, font_size, font_weight, line_height, letter_spacing, text_align, color]
        );
        self.font_size = self
            .font_size
            .filter(|s| s.is_finite())
            .map(|s| s.max(0.0));
    }
}

// ---------------------------------------------------------------------------
// Auto layout
// ---------------------------------------------------------------------------

/// Flex-like auto-layout settings of a container.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct AutoLayout {
    /// Whether auto layout is active.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    /// Main axis.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<LayoutDirection>,
    /// Gap between children in pixels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gap: Option<f64>,
    /// Uniform inner padding in pixels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub padding: Option<f64>,
    /// Cross-axis alignment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub align: Option<Alignment>,
    /// Main-axis distribution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub justify: Option<Alignment>,
}

impl AutoLayout {
    /// Shallow-merge `patch` into `self`.
    pub fn merge(&mut self, patch: &Self) {
        merge_fields!(self, patch, [enabled, direction, gap, padding, align, justify]);
        self.gap = self.gap.filter(|g| g.is_finite()).map(|g| g.max(0.0));
        self.padding = self.padding.filter(|p| p.is_finite()).map(|p| p.max(0.0));
    }
}

// ---------------------------------------------------------------------------
// Element
// ---------------------------------------------------------------------------

/// A node in the scene graph.
///
/// `position` and `rotation` are local to the parent (or to the page for
/// root elements). `children` is authoritative for membership and stacking
/// order: index 0 is bottom-most. `parent_id` is a back-pointer kept in sync
/// by the reducer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Element {
    /// Unique identifier.
    pub id: ElementId,
    /// Tag-like variant.
    pub kind: ElementKind,
    /// Display name shown in layer panels.
    #[serde(default)]
    pub name: String,
    /// The page this element lives on.
    pub page_id: PageId,
    /// Parent element, or `None` for page roots.
    #[serde(default)]
    pub parent_id: Option<ElementId>,
    /// Origin relative to the parent's local space.
    pub position: Point,
    /// Box size.
    pub size: Size,
    /// Own rotation in degrees, in the parent's space.
    #[serde(default)]
    pub rotation: f64,
    /// Whether the element is rendered.
    #[serde(default = "default_true")]
    pub visible: bool,
    /// Whether the element ignores pointer edits.
    #[serde(default)]
    pub locked: bool,
    /// Text content, image source or other kind-specific payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Visual styles.
    #[serde(default)]
    pub styles: Styles,
    /// Text styling.
    #[serde(default)]
    pub typography: Typography,
    /// Auto-layout settings.
    #[serde(default)]
    pub auto_layout: AutoLayout,
    /// Ordered child ids, bottom-most first.
    #[serde(default)]
    pub children: Vec<ElementId>,
}

const fn default_true() -> bool {
    true
}

/// Non-geometric element fields changed by `UPDATE_ELEMENT`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ElementPatch {
    /// New display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// New content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// New kind. Ignored when it would turn a parent into a leaf kind.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ElementKind>,
}

// ---------------------------------------------------------------------------
// Containers
// ---------------------------------------------------------------------------

/// A page: the top-level container of root elements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Page {
    /// Unique identifier.
    pub id: PageId,
    /// Display name.
    pub name: String,
    /// Root element ids, bottom-most first.
    #[serde(default)]
    pub root_elements: Vec<ElementId>,
}

/// A named viewport (breakpoint) of a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct View {
    /// Unique identifier.
    pub id: ViewId,
    /// The page this view previews.
    pub page_id: PageId,
    /// Display name (e.g. "Desktop", "Mobile").
    pub name: String,
    /// Viewport size.
    pub size: Size,
}

/// Changes applied by `UPDATE_VIEW`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ViewPatch {
    /// New display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// New viewport size.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<Size>,
}

/// The order array that owns an element: a page's root array or an
/// element's children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ContainerRef {
    /// A page's root array.
    Page(PageId),
    /// An element's children.
    Element(ElementId),
}
