//! Conversion between [`ValueResourceModel`] and the [`Value`] domain model.
//!
//! [`to_value`] is the write path (declarative -> domain) and
//! [`from_value`] the read path (domain -> declarative). The two are exact
//! inverses except for JSON formatting: object values and test variables
//! are re-encoded canonically, with keys sorted at every level, so repeated
//! reads never report drift.

use serde_json::{Map, Value as JsonValue};
use thiserror::Error;
use wings_types::{
    EvaluationTest, ObjectValue, Targeting, TargetingRule, Transform, Value, ValueEvaluation, VariantKind, Variants,
};

use crate::resource::{
    BoolBlock, IntBlock, ObjectBlock, StringBlock, TargetingBlock, TestBlock, TransformBlock, ValueResourceModel,
};

#[derive(Debug, Error)]
pub enum MappingError {
    /// An embedded JSON literal did not parse as a JSON object.
    #[error("{field} is not a valid JSON object: {source}")]
    MalformedValue {
        field: String,
        #[source]
        source: serde_json::Error,
    },
}

impl MappingError {
    /// Attribute path of the offending field, e.g. `object[0].value`.
    pub fn field(&self) -> &str {
        match self {
            Self::MalformedValue { field, .. } => field,
        }
    }
}

/// Build the domain value described by a declarative model.
///
/// Variants are inserted in `bool`, `string`, `object`, `int` order. A name
/// declared more than once keeps its first position but takes the last
/// declaration's evaluation. The first malformed JSON literal aborts the
/// conversion.
pub fn to_value(model: &ValueResourceModel) -> Result<Value, MappingError> {
    let mut variants = Variants::new();
    // Collisions are reported by `ValueResourceModel::validate`.
    let mut insert = |name: &str, evaluation: ValueEvaluation| {
        variants.insert(name.to_string(), evaluation);
    };

    for block in &model.bools {
        insert(&block.variant, ValueEvaluation::Bool(block.value));
    }
    for block in &model.strings {
        insert(&block.variant, ValueEvaluation::String(block.value.clone()));
    }
    for (index, block) in model.objects.iter().enumerate() {
        let value = parse_object(|| format!("object[{index}].value"), &block.value)?;
        let transforms = block
            .transforms
            .iter()
            .map(|transform| Transform {
                expr: transform.expr.clone(),
            })
            .collect();
        insert(&block.variant, ValueEvaluation::Object(ObjectValue { value, transforms }));
    }
    for block in &model.ints {
        insert(&block.variant, ValueEvaluation::Int(block.value));
    }

    let rules = model
        .targeting
        .iter()
        .map(|block| TargetingRule {
            variant: block.variant.clone(),
            expr: block.expr.clone(),
        })
        .collect();

    let tests = model
        .tests
        .iter()
        .enumerate()
        .map(|(index, block)| {
            Ok(EvaluationTest {
                variables: parse_object(|| format!("test[{index}].variables"), &block.variables)?,
                expected: block.expected.clone(),
            })
        })
        .collect::<Result<Vec<_>, MappingError>>()?;

    Ok(Value {
        id: model.remote_id().to_string(),
        enabled: model.enabled,
        description: model.description.clone().unwrap_or_default(),
        default_variant: model.default_variant.clone(),
        variants,
        targeting: Targeting { rules },
        tests,
    })
}

/// Build the declarative model describing a domain value.
///
/// Both `id` and `value_id` take the value's id; callers holding a prior
/// state restore their own `value_id`.
pub fn from_value(value: &Value) -> ValueResourceModel {
    let mut model = ValueResourceModel {
        id: Some(value.id.clone()),
        value_id: value.id.clone(),
        description: Some(value.description.clone()).filter(|description| !description.is_empty()),
        enabled: value.enabled,
        default_variant: value.default_variant.clone(),
        ..ValueResourceModel::default()
    };

    for (name, evaluation) in &value.variants {
        let variant = name.clone();
        match evaluation {
            ValueEvaluation::Bool(value) => model.bools.push(BoolBlock { variant, value: *value }),
            ValueEvaluation::Int(value) => model.ints.push(IntBlock { variant, value: *value }),
            ValueEvaluation::String(value) => model.strings.push(StringBlock {
                variant,
                value: value.clone(),
            }),
            ValueEvaluation::Object(object) => model.objects.push(ObjectBlock {
                variant,
                value: canonical_json(&object.value),
                transforms: object
                    .transforms
                    .iter()
                    .map(|transform| TransformBlock {
                        expr: transform.expr.clone(),
                    })
                    .collect(),
            }),
        }
    }

    model.targeting = value
        .targeting
        .rules
        .iter()
        .map(|rule| TargetingBlock {
            variant: rule.variant.clone(),
            expr: rule.expr.clone(),
        })
        .collect();

    model.tests = value
        .tests
        .iter()
        .map(|test| TestBlock {
            variables: canonical_json(&test.variables),
            expected: test.expected.clone(),
        })
        .collect();

    model
}

/// Compact JSON encoding with object keys sorted at every depth.
pub fn canonical_json(object: &Map<String, JsonValue>) -> String {
    sort_object(object).to_string()
}

/// Count of variants per block type, in `bool, int, string, object` order.
pub fn variant_counts(value: &Value) -> [(VariantKind, usize); 4] {
    let mut counts = [
        (VariantKind::Bool, 0),
        (VariantKind::Int, 0),
        (VariantKind::String, 0),
        (VariantKind::Object, 0),
    ];
    for evaluation in value.variants.values() {
        if let Some(entry) = counts.iter_mut().find(|(kind, _)| *kind == evaluation.kind()) {
            entry.1 += 1;
        }
    }
    counts
}

fn sort_object(object: &Map<String, JsonValue>) -> JsonValue {
    let mut entries: Vec<_> = object.iter().collect();
    entries.sort_by(|(left, _), (right, _)| left.cmp(right));
    JsonValue::Object(
        entries
            .into_iter()
            .map(|(key, value)| (key.clone(), sort_json(value)))
            .collect(),
    )
}

fn sort_json(value: &JsonValue) -> JsonValue {
    match value {
        JsonValue::Object(object) => sort_object(object),
        JsonValue::Array(items) => JsonValue::Array(items.iter().map(sort_json).collect()),
        other => other.clone(),
    }
}

fn parse_object(field: impl FnOnce() -> String, raw: &str) -> Result<Map<String, JsonValue>, MappingError> {
    serde_json::from_str(raw).map_err(|source| MappingError::MalformedValue { field: field(), source })
}
