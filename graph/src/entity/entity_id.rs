use std::fmt;

use serde_json::Value;

/// Public identifier of a persisted model. Numbers that do not fit an `i64`
/// are kept in their textual form.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityId {
    Int(i64),
    Str(String),
}

impl EntityId {
    /// Reads an id out of a JSON scalar. `null`, booleans, objects and arrays
    /// are not ids.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(number) => Some(match number.as_i64() {
                Some(int) => EntityId::Int(int),
                None => EntityId::Str(number.to_string()),
            }),
            Value::String(string) => Some(EntityId::Str(string.clone())),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            EntityId::Int(int) => Value::from(*int),
            EntityId::Str(string) => Value::from(string.as_str()),
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityId::Int(int) => write!(f, "{}", int),
            EntityId::Str(string) => f.write_str(string),
        }
    }
}

impl From<i64> for EntityId {
    fn from(value: i64) -> Self {
        EntityId::Int(value)
    }
}

impl From<i32> for EntityId {
    fn from(value: i32) -> Self {
        EntityId::Int(value as i64)
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        EntityId::Str(value.to_string())
    }
}

impl From<String> for EntityId {
    fn from(value: String) -> Self {
        EntityId::Str(value)
    }
}
