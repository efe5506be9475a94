//! Value domain model and its JSON wire representation.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value as JsonValue};
use thiserror::Error;

/// Variant name to evaluation mapping.
///
/// Insertion order is kept so reads are stable, but equality between two
/// maps ignores ordering.
pub type Variants = IndexMap<String, ValueEvaluation>;

/// A named, typed configuration entity with multiple variants.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Value {
    /// Stable identifier; immutable once the value has been created.
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    /// Variant served when no targeting rule matches. The server validates
    /// that it names a key of [`Value::variants`].
    #[serde(default)]
    pub default_variant: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub variants: Variants,
    #[serde(default, deserialize_with = "null_as_default")]
    pub targeting: Targeting,
    #[serde(default, skip_serializing_if = "Vec::is_empty", deserialize_with = "null_as_default")]
    pub tests: Vec<EvaluationTest>,
}

impl Value {
    /// Look up a variant by name.
    pub fn variant(&self, name: &str) -> Option<&ValueEvaluation> {
        self.variants.get(name)
    }
}

/// Ordered targeting rules. Position is significant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Targeting {
    #[serde(default, deserialize_with = "null_as_default")]
    pub rules: Vec<TargetingRule>,
}

/// Routes evaluations matching `expr` to `variant`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetingRule {
    pub variant: String,
    /// Predicate expression, passed through untouched.
    pub expr: String,
}

/// Server-side fixture checking that `variables` evaluate to `expected`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationTest {
    #[serde(default, deserialize_with = "null_as_default")]
    pub variables: Map<String, JsonValue>,
    pub expected: String,
}

/// A single transform expression applied to an object variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transform {
    pub expr: String,
}

/// Object variant payload.
///
/// `transforms` run in order, each consuming the output of the previous one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectValue {
    #[serde(default, deserialize_with = "null_as_default")]
    pub value: Map<String, JsonValue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty", deserialize_with = "null_as_default")]
    pub transforms: Vec<Transform>,
}

/// The typed evaluation of one variant.
///
/// On the wire this is an object with exactly one of the keys `bool`,
/// `string`, `object` or `int`; any other shape is rejected while decoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WireEvaluation", into = "WireEvaluation")]
pub enum ValueEvaluation {
    Bool(bool),
    Int(i64),
    String(String),
    Object(ObjectValue),
}

impl ValueEvaluation {
    pub fn kind(&self) -> VariantKind {
        match self {
            Self::Bool(_) => VariantKind::Bool,
            Self::Int(_) => VariantKind::Int,
            Self::String(_) => VariantKind::String,
            Self::Object(_) => VariantKind::Object,
        }
    }
}

/// Discriminant of a [`ValueEvaluation`], named as on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariantKind {
    Bool,
    Int,
    String,
    Object,
}

impl VariantKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::String => "string",
            Self::Object => "object",
        }
    }
}

impl fmt::Display for VariantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raised when a wire variant entry does not populate exactly one member.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EvaluationShapeError {
    #[error("variant evaluation is empty; expected one of bool, string, object, int")]
    Empty,
    #[error("variant evaluation populates more than one member: {members}")]
    Ambiguous { members: String },
}

#[derive(Serialize, Deserialize)]
struct Scalar<T> {
    value: T,
}

#[derive(Default, Serialize, Deserialize)]
struct WireEvaluation {
    #[serde(rename = "bool", default, skip_serializing_if = "Option::is_none")]
    bool_member: Option<Scalar<bool>>,
    #[serde(rename = "string", default, skip_serializing_if = "Option::is_none")]
    string_member: Option<Scalar<String>>,
    #[serde(rename = "object", default, skip_serializing_if = "Option::is_none")]
    object_member: Option<ObjectValue>,
    #[serde(rename = "int", default, skip_serializing_if = "Option::is_none")]
    int_member: Option<Scalar<i64>>,
}

impl TryFrom<WireEvaluation> for ValueEvaluation {
    type Error = EvaluationShapeError;

    fn try_from(wire: WireEvaluation) -> Result<Self, Self::Error> {
        let mut populated = Vec::with_capacity(1);
        if let Some(member) = wire.bool_member {
            populated.push((VariantKind::Bool, Self::Bool(member.value)));
        }
        if let Some(member) = wire.string_member {
            populated.push((VariantKind::String, Self::String(member.value)));
        }
        if let Some(member) = wire.object_member {
            populated.push((VariantKind::Object, Self::Object(member)));
        }
        if let Some(member) = wire.int_member {
            populated.push((VariantKind::Int, Self::Int(member.value)));
        }

        if populated.len() > 1 {
            let members = populated
                .iter()
                .map(|(kind, _)| kind.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            return Err(EvaluationShapeError::Ambiguous { members });
        }
        populated
            .pop()
            .map(|(_, evaluation)| evaluation)
            .ok_or(EvaluationShapeError::Empty)
    }
}

impl From<ValueEvaluation> for WireEvaluation {
    fn from(evaluation: ValueEvaluation) -> Self {
        let mut wire = WireEvaluation::default();
        match evaluation {
            ValueEvaluation::Bool(value) => wire.bool_member = Some(Scalar { value }),
            ValueEvaluation::Int(value) => wire.int_member = Some(Scalar { value }),
            ValueEvaluation::String(value) => wire.string_member = Some(Scalar { value }),
            ValueEvaluation::Object(object) => wire.object_member = Some(object),
        }
        wire
    }
}

/// Treat an explicit JSON `null` the same as a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_bool_value_from_wire() {
        let wire = json!({
            "id": "test-bool-value",
            "enabled": true,
            "description": "test bool value",
            "defaultVariant": "off",
            "variants": {
                "on": {"bool": {"value": true}},
                "off": {"bool": {"value": false}}
            },
            "targeting": {"rules": [{"variant": "on", "expr": "env == 'dev'"}]},
            "tests": [{"variables": {"env": "test", "count": 1}, "expected": "on"}]
        });

        let value: Value = serde_json::from_value(wire).expect("decode value");
        assert_eq!(value.id, "test-bool-value");
        assert_eq!(value.default_variant, "off");
        assert_eq!(value.variant("on"), Some(&ValueEvaluation::Bool(true)));
        assert_eq!(value.variant("off"), Some(&ValueEvaluation::Bool(false)));
        assert_eq!(value.targeting.rules.len(), 1);
        assert_eq!(value.tests[0].variables.get("count"), Some(&json!(1)));
    }

    #[test]
    fn encodes_only_the_populated_member() {
        let evaluation = ValueEvaluation::Object(ObjectValue {
            value: json!({"a": 1}).as_object().cloned().unwrap_or_default(),
            transforms: vec![Transform { expr: "a".into() }],
        });
        let encoded = serde_json::to_value(&evaluation).expect("encode");
        assert_eq!(encoded, json!({"object": {"value": {"a": 1}, "transforms": [{"expr": "a"}]}}));

        let encoded = serde_json::to_value(ValueEvaluation::Int(7)).expect("encode");
        assert_eq!(encoded, json!({"int": {"value": 7}}));
    }

    #[test]
    fn rejects_empty_variant_entry() {
        let result = serde_json::from_value::<ValueEvaluation>(json!({}));
        let message = result.expect_err("empty entry must fail").to_string();
        assert!(message.contains("empty"), "unexpected error: {message}");

        // Go-style encoders emit nulls for unset members.
        let result = serde_json::from_value::<ValueEvaluation>(json!({"bool": null, "int": null}));
        assert!(result.is_err());
    }

    #[test]
    fn rejects_ambiguous_variant_entry() {
        let result = serde_json::from_value::<ValueEvaluation>(json!({
            "bool": {"value": true},
            "string": {"value": "on"}
        }));
        let message = result.expect_err("two members must fail").to_string();
        assert!(message.contains("bool, string"), "unexpected error: {message}");
    }

    #[test]
    fn tolerates_null_collections() {
        let value: Value = serde_json::from_value(json!({
            "id": "v",
            "enabled": false,
            "description": null,
            "defaultVariant": "a",
            "variants": null,
            "targeting": {"rules": null},
            "tests": null
        }))
        .expect("decode value");
        assert!(value.variants.is_empty());
        assert!(value.targeting.rules.is_empty());
        assert!(value.tests.is_empty());
        assert!(value.description.is_empty());
    }

    #[test]
    fn omits_empty_tests_and_transforms() {
        let mut value = Value {
            id: "v".into(),
            default_variant: "json".into(),
            ..Value::default()
        };
        value
            .variants
            .insert("json".into(), ValueEvaluation::Object(ObjectValue::default()));

        let encoded = serde_json::to_value(&value).expect("encode");
        assert!(encoded.get("tests").is_none());
        assert_eq!(encoded["variants"]["json"], json!({"object": {"value": {}}}));
        assert_eq!(encoded["targeting"], json!({"rules": []}));
    }

    #[test]
    fn variant_map_equality_ignores_order() {
        let mut left = Value::default();
        left.variants.insert("a".into(), ValueEvaluation::Int(1));
        left.variants.insert("b".into(), ValueEvaluation::Int(2));
        let mut right = Value::default();
        right.variants.insert("b".into(), ValueEvaluation::Int(2));
        right.variants.insert("a".into(), ValueEvaluation::Int(1));
        assert_eq!(left, right);
    }
}
