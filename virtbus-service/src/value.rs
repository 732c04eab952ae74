//! Typed bus values and their signatures.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use virtbus_core::{ObjectPath, SchedulerType};

/// A single typed value carried in a bus message.
///
/// JSON form is externally tagged by type, e.g. `{"u32": 0}` or
/// `{"object_path": "/org/libvirt/Connect"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    Bool(bool),
    U32(u32),
    I32(i32),
    String(String),
    ObjectPath(ObjectPath),
    Struct(Vec<Value>),
    ObjectPaths(Vec<ObjectPath>),
    Dict(IndexMap<String, Value>),
}

impl Value {
    /// Bus type signature of this value.
    #[must_use]
    pub fn signature(&self) -> String {
        match self {
            Self::Bool(_) => "b".to_owned(),
            Self::U32(_) => "u".to_owned(),
            Self::I32(_) => "i".to_owned(),
            Self::String(_) => "s".to_owned(),
            Self::ObjectPath(_) => "o".to_owned(),
            Self::Struct(fields) => {
                let inner: String = fields.iter().map(Value::signature).collect();
                format!("({inner})")
            }
            Self::ObjectPaths(_) => "ao".to_owned(),
            Self::Dict(_) => "a{sv}".to_owned(),
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Self::U32(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Self::U32(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::I32(v)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<ObjectPath> for Value {
    fn from(p: ObjectPath) -> Self {
        Self::ObjectPath(p)
    }
}

impl From<Vec<ObjectPath>> for Value {
    fn from(paths: Vec<ObjectPath>) -> Self {
        Self::ObjectPaths(paths)
    }
}

impl From<SchedulerType> for Value {
    fn from(sched: SchedulerType) -> Self {
        let (name, priority) = sched.into_pair();
        Self::Struct(vec![Self::String(name), Self::I32(priority)])
    }
}

/// Whether `signature` is one of the single complete types [`Value`] can carry,
/// or the variant wildcard `v`.
#[must_use]
pub fn is_known_signature(signature: &str) -> bool {
    matches!(signature, "b" | "u" | "i" | "s" | "o" | "ao" | "a{sv}" | "v")
        || signature
            .strip_prefix('(')
            .and_then(|s| s.strip_suffix(')'))
            .is_some_and(|inner| !inner.is_empty() && inner.chars().all(|c| "buiso".contains(c)))
}

/// Whether `value` may be passed where `signature` is expected.
#[must_use]
pub fn conforms(value: &Value, signature: &str) -> bool {
    signature == "v" || value.signature() == signature
}
