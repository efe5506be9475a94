//! Declarative resource shape for a Wings value.
//!
//! Variants are split into one homogeneous block list per type (`bool`,
//! `int`, `string`, `object`) because declarative languages prefer
//! statically typed repeated blocks over polymorphic maps. Object values and
//! test variables are carried as JSON object literals in string form.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use wings_types::VariantKind;

use crate::diagnostics::{Diagnostic, Diagnostics};

/// Object literals must look like `{...}`; arrays and scalars are rejected.
static OBJECT_LITERAL_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^\{.*\}$").expect("object literal regex should compile"));

/// State and configuration of one `wings_value` resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ValueResourceModel {
    /// Computed identifier, known once the value has been created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Caller-chosen identifier. Changing it forces replacement.
    pub value_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub enabled: bool,
    pub default_variant: String,
    #[serde(rename = "bool", default, skip_serializing_if = "Vec::is_empty")]
    pub bools: Vec<BoolBlock>,
    #[serde(rename = "int", default, skip_serializing_if = "Vec::is_empty")]
    pub ints: Vec<IntBlock>,
    #[serde(rename = "string", default, skip_serializing_if = "Vec::is_empty")]
    pub strings: Vec<StringBlock>,
    #[serde(rename = "object", default, skip_serializing_if = "Vec::is_empty")]
    pub objects: Vec<ObjectBlock>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub targeting: Vec<TargetingBlock>,
    #[serde(rename = "test", default, skip_serializing_if = "Vec::is_empty")]
    pub tests: Vec<TestBlock>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BoolBlock {
    pub variant: String,
    pub value: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IntBlock {
    pub variant: String,
    pub value: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StringBlock {
    pub variant: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ObjectBlock {
    pub variant: String,
    /// JSON object literal, e.g. `{"items":[]}`.
    pub value: String,
    #[serde(rename = "transform", default, skip_serializing_if = "Vec::is_empty")]
    pub transforms: Vec<TransformBlock>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransformBlock {
    pub expr: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetingBlock {
    pub variant: String,
    pub expr: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestBlock {
    /// JSON object literal holding the evaluation input.
    pub variables: String,
    pub expected: String,
}

/// A variant name declared in more than one block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantCollision {
    pub variant: String,
    pub first: VariantKind,
    pub last: VariantKind,
}

impl ValueResourceModel {
    /// The identifier used against the API: the computed `id` when known,
    /// otherwise `value_id`.
    pub fn remote_id(&self) -> &str {
        self.id
            .as_deref()
            .filter(|id| !id.is_empty())
            .unwrap_or(&self.value_id)
    }

    /// Every declared variant with its block type, in mapping order
    /// (`bool`, `string`, `object`, `int`).
    pub fn declared_variants(&self) -> impl Iterator<Item = (VariantKind, &str)> {
        let bools = self.bools.iter().map(|block| (VariantKind::Bool, block.variant.as_str()));
        let strings = self
            .strings
            .iter()
            .map(|block| (VariantKind::String, block.variant.as_str()));
        let objects = self
            .objects
            .iter()
            .map(|block| (VariantKind::Object, block.variant.as_str()));
        let ints = self.ints.iter().map(|block| (VariantKind::Int, block.variant.as_str()));
        bools.chain(strings).chain(objects).chain(ints)
    }

    /// Variant names declared more than once, across or within block types.
    pub fn variant_collisions(&self) -> Vec<VariantCollision> {
        let mut seen: HashMap<&str, VariantKind> = HashMap::new();
        let mut collisions = Vec::new();
        for (kind, name) in self.declared_variants() {
            if let Some(first) = seen.insert(name, kind) {
                collisions.push(VariantCollision {
                    variant: name.to_string(),
                    first,
                    last: kind,
                });
            }
        }
        collisions
    }

    /// Check required attributes and literal formats.
    ///
    /// All problems are collected. Variant collisions are reported as
    /// warnings since the last declaration silently wins.
    pub fn validate(&self) -> Diagnostics {
        let mut diagnostics = Diagnostics::new();

        if self.value_id.trim().is_empty() {
            diagnostics.push(
                Diagnostic::error("Missing required attribute", "value_id must not be empty")
                    .with_attribute("value_id"),
            );
        }
        if self.default_variant.trim().is_empty() {
            diagnostics.push(
                Diagnostic::error("Missing required attribute", "default_variant must not be empty")
                    .with_attribute("default_variant"),
            );
        }

        let variant_paths = self
            .bools
            .iter()
            .enumerate()
            .map(|(index, block)| (format!("bool[{index}].variant"), block.variant.as_str()))
            .chain(
                self.ints
                    .iter()
                    .enumerate()
                    .map(|(index, block)| (format!("int[{index}].variant"), block.variant.as_str())),
            )
            .chain(
                self.strings
                    .iter()
                    .enumerate()
                    .map(|(index, block)| (format!("string[{index}].variant"), block.variant.as_str())),
            )
            .chain(
                self.objects
                    .iter()
                    .enumerate()
                    .map(|(index, block)| (format!("object[{index}].variant"), block.variant.as_str())),
            )
            .chain(
                self.targeting
                    .iter()
                    .enumerate()
                    .map(|(index, block)| (format!("targeting[{index}].variant"), block.variant.as_str())),
            );
        for (path, variant) in variant_paths {
            if variant.trim().is_empty() {
                diagnostics.push(
                    Diagnostic::error("Missing required attribute", "variant must not be empty").with_attribute(path),
                );
            }
        }

        for (index, block) in self.objects.iter().enumerate() {
            if !OBJECT_LITERAL_REGEX.is_match(block.value.trim()) {
                diagnostics.push(
                    Diagnostic::error("Invalid Attribute Value Match", "Must be map object, not array")
                        .with_attribute(format!("object[{index}].value")),
                );
            }
        }
        for (index, block) in self.tests.iter().enumerate() {
            if !OBJECT_LITERAL_REGEX.is_match(block.variables.trim()) {
                diagnostics.push(
                    Diagnostic::error("Invalid Attribute Value Match", "Must be map object, not array")
                        .with_attribute(format!("test[{index}].variables")),
                );
            }
        }

        for collision in self.variant_collisions() {
            diagnostics.push(Diagnostic::warning(
                "Duplicate variant",
                format!(
                    "variant '{}' is declared as {} and again as {}; the last declaration wins",
                    collision.variant, collision.first, collision.last
                ),
            ));
        }

        diagnostics
    }
}
