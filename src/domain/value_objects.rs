//! Value Objects - Immutable domain primitives
//!
//! Bound parameter values, parameter sets and connection roles.
//! They are identified by their value and can be freely cloned.

use crate::domain::errors::RouterError;
use serde::Serialize;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// A single value bound to a positional placeholder or read from a row.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Blob(Vec<u8>),
}

// Floats compare by bit pattern so values can key a map.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Blob(a), Self::Blob(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Self::Null => {}
            Self::Bool(v) => v.hash(state),
            Self::Int(v) => v.hash(state),
            Self::Float(v) => v.to_bits().hash(state),
            Self::Text(v) => v.hash(state),
            Self::Blob(v) => v.hash(state),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Blob(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Self::Null)
    }
}

/// JSON scalars map to their natural variant; arrays and objects are
/// bound as their JSON text.
impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Self::Text(s),
            other => Self::Text(other.to_string()),
        }
    }
}

/// Named parameters for a single statement.
pub type Params = HashMap<String, Value>;

/// Build a [`Params`] map from name/value pairs.
pub fn params<K, V, I>(pairs: I) -> Params
where
    K: Into<String>,
    V: Into<Value>,
    I: IntoIterator<Item = (K, V)>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Parameters supplied to the translator: one map, or one map per row of
/// a batch.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamSet {
    Single(Params),
    Batch(Vec<Params>),
}

impl From<Params> for ParamSet {
    fn from(p: Params) -> Self {
        Self::Single(p)
    }
}

impl From<Vec<Params>> for ParamSet {
    fn from(p: Vec<Params>) -> Self {
        Self::Batch(p)
    }
}

impl TryFrom<serde_json::Value> for ParamSet {
    type Error = RouterError;

    /// Accepts an object or an array of objects. Anything else is
    /// rejected with the JSON type that was actually supplied.
    fn try_from(value: serde_json::Value) -> Result<Self, Self::Error> {
        match value {
            serde_json::Value::Object(map) => Ok(Self::Single(object_to_params(map))),
            serde_json::Value::Array(items) => {
                let mut batch = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        serde_json::Value::Object(map) => batch.push(object_to_params(map)),
                        other => {
                            return Err(RouterError::InvalidParameterShape(format!(
                                "array containing {}",
                                json_type_name(&other)
                            )))
                        }
                    }
                }
                Ok(Self::Batch(batch))
            }
            other => Err(RouterError::InvalidParameterShape(
                json_type_name(&other).to_string(),
            )),
        }
    }
}

fn object_to_params(map: serde_json::Map<String, serde_json::Value>) -> Params {
    map.into_iter().map(|(k, v)| (k, Value::from(v))).collect()
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// Role a connection plays behind the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Role {
    /// The single read-write session of record
    #[default]
    Primary,
    /// A read-only replica session
    Secondary,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Secondary => "secondary",
        }
    }
}

impl FromStr for Role {
    type Err = RouterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "primary" => Ok(Self::Primary),
            "secondary" => Ok(Self::Secondary),
            _ => Err(RouterError::InvalidRole(s.to_string())),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // ===== Role Tests =====

    #[test]
    fn test_role_from_str() {
        let tests = vec![
            ("primary", Role::Primary),
            ("PRIMARY", Role::Primary),
            ("secondary", Role::Secondary),
            (" Secondary ", Role::Secondary),
        ];

        for (input, expected) in tests {
            assert_eq!(input.parse::<Role>().unwrap(), expected, "Failed for input: {}", input);
        }
    }

    #[test]
    fn test_role_from_str_invalid() {
        let err = "INVALID_ROLE".parse::<Role>().unwrap_err();
        assert!(matches!(err, RouterError::InvalidRole(ref r) if r == "INVALID_ROLE"));
        assert_eq!(err.to_string(), "Invalid role: INVALID_ROLE");
    }

    #[test]
    fn test_role_display_roundtrip() {
        for role in [Role::Primary, Role::Secondary] {
            assert_eq!(role.to_string().parse::<Role>().unwrap(), role);
        }
    }

    // ===== Value Tests =====

    #[test]
    fn test_value_conversions() {
        assert_eq!(Value::from(1), Value::Int(1));
        assert_eq!(Value::from("apple"), Value::Text("apple".to_string()));
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some(2.5)), Value::Float(2.5));
    }

    #[test]
    fn test_value_from_json() {
        assert_eq!(Value::from(json!(null)), Value::Null);
        assert_eq!(Value::from(json!(7)), Value::Int(7));
        assert_eq!(Value::from(json!(0.5)), Value::Float(0.5));
        assert_eq!(Value::from(json!("x")), Value::Text("x".to_string()));
        assert_eq!(Value::from(json!([1, 2])), Value::Text("[1,2]".to_string()));
    }

    #[test]
    fn test_value_float_hash_eq() {
        use std::collections::HashSet;

        let mut set = HashSet::new();
        set.insert(Value::Float(1.5));
        assert!(set.contains(&Value::Float(1.5)));
        assert!(!set.contains(&Value::Int(1)));
    }

    #[test]
    fn test_value_serializes_untagged() {
        let json = serde_json::to_string(&vec![Value::Int(1), Value::Null, Value::from("a")]).unwrap();
        assert_eq!(json, r#"[1,null,"a"]"#);
    }

    // ===== ParamSet Tests =====

    #[test]
    fn test_param_set_from_json_object() {
        let set = ParamSet::try_from(json!({"name": "apple", "id": 1})).unwrap();
        assert_eq!(set, ParamSet::Single(params([("name", Value::from("apple")), ("id", Value::from(1))])));
    }

    #[test]
    fn test_param_set_from_json_array() {
        let set = ParamSet::try_from(json!([{"id": 1}, {"id": 2}])).unwrap();
        match set {
            ParamSet::Batch(rows) => {
                assert_eq!(rows.len(), 2);
                assert_eq!(rows[1]["id"], Value::Int(2));
            }
            other => panic!("expected batch, got {:?}", other),
        }
    }

    #[test]
    fn test_param_set_rejects_string() {
        let err = ParamSet::try_from(json!("apple")).unwrap_err();
        assert_eq!(err.to_string(), "params must be a map or a list of maps, not string");
    }

    #[test]
    fn test_param_set_rejects_array_of_scalars() {
        let err = ParamSet::try_from(json!([1, 2])).unwrap_err();
        assert!(matches!(err, RouterError::InvalidParameterShape(ref t) if t == "array containing number"));
    }
}
