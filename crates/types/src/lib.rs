//! Shared type definitions for Wings values.
//!
//! The [`Value`] model is the normalized form of a feature value: a map of
//! named, typed variants plus the targeting rules and evaluation tests that
//! select among them. The serde representation of every type here is the
//! JSON wire format spoken by the Wings API.

mod value;

pub use value::{
    EvaluationShapeError, EvaluationTest, ObjectValue, Targeting, TargetingRule, Transform, Value, ValueEvaluation,
    VariantKind, Variants,
};
