//! Declarative `wings_value` resource for the Wings values service.
//!
//! - [`resource`]: the block-based resource model and its validation.
//! - [`mapper`]: conversion between the resource model and [`wings_types::Value`].
//! - [`lifecycle`]: create/read/update/delete/import against a [`ValueStore`].
//! - [`diagnostics`]: user-facing problem reports.

pub mod diagnostics;
pub mod lifecycle;
pub mod mapper;
pub mod resource;

pub use diagnostics::{Diagnostic, Diagnostics, Severity};
pub use lifecycle::{Plan, PlanAction, ResourceLifecycle, ValueResource, ValueStore, plan};
pub use mapper::{MappingError, canonical_json, from_value, to_value, variant_counts};
pub use resource::{
    BoolBlock, IntBlock, ObjectBlock, StringBlock, TargetingBlock, TestBlock, TransformBlock, ValueResourceModel,
    VariantCollision,
};
