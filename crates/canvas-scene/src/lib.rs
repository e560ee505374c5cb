//! Scene graph, reducer, and transform cache for the canvas.
//!
//! Everything in this crate is synchronous and deterministic: the same
//! sequence of events always folds to the same [`DesignState`].
//!
//! # Modules
//!
//! - [`state`] -- [`DesignState`], the element arena plus pages, views and
//!   the session selection.
//! - [`reducer`] -- The only writer of [`DesignState`]; total over every
//!   event variant, reports [`Effects`] for cache invalidation.
//! - [`validation`] -- Structural checks run before an edit is recorded.
//! - [`transform`] -- [`TransformCache`], memoized absolute transforms with
//!   subtree invalidation, plus the inverse conversions.
//! - [`group`] -- Multi-element move, rotate and resize gestures.
//! - [`integrity`] -- Invariant checks used after replay and in tests.
//! - [`error`] -- [`ValidationError`].

pub mod error;
pub mod group;
pub mod integrity;
pub mod reducer;
pub mod state;
pub mod transform;
pub mod validation;

pub use error::ValidationError;
pub use group::{
    GroupMoveGesture, GroupResizeGesture, GroupRotateGesture, centroid, selection_bounds,
    top_level_members,
};
pub use integrity::{IntegrityViolation, check_integrity};
pub use reducer::{Effects, apply, fold, reduce, reduce_all};
pub use state::DesignState;
pub use transform::{
    CacheStats, TransformCache, absolute_to_relative, compute_uncached, screen_delta_to_local,
};
pub use validation::{PendingScope, validate, validate_in_scope};
