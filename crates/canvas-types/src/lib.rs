//! Shared type definitions for the canvas scene graph.
//!
//! This crate is the single source of truth for the types that cross crate
//! boundaries: identifiers, geometry, the element model and the event
//! payloads that form the interchange contract with the persistence layer.
//! Every public type derives `ts-rs` so the UI layer consumes the same shapes
//! as `TypeScript` bindings.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for all entity identifiers
//! - [`geometry`] -- Points, sizes, transforms and the rotation matrix
//! - [`enums`] -- Element kinds, layout enums and event discriminants
//! - [`structs`] -- Elements, field groups, pages and views
//! - [`events`] -- The event envelope and its tagged payload union

pub mod enums;
pub mod events;
pub mod geometry;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{Alignment, ElementKind, EventKind, LayoutDirection, TextAlign};
pub use events::{Event, EventPayload, PositionUpdate, RotationUpdate, SizeUpdate};
pub use geometry::{EPSILON, Point, Rect, Size, Transform, approx_eq, corners};
pub use ids::{ElementId, EventId, PageId, ViewId};
pub use structs::{
    AutoLayout, ContainerRef, Element, ElementPatch, Page, Styles, Typography, View, ViewPatch,
};
