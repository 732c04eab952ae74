use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;

/// Object path of the connection object, which also emits `DomainEvent`.
pub const CONNECT_PATH: &str = "/org/libvirt/Connect";

/// Prefix under which every domain object is exported.
pub const DOMAIN_PATH_PREFIX: &str = "/org/libvirt/domain";

/// Immutable 128-bit identity of a domain.
///
/// Renders in canonical dashed lowercase hexadecimal form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DomainUuid(pub Uuid);

impl DomainUuid {
    /// Creates a new random `DomainUuid`.
    #[must_use]
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parses a UUID in canonical dashed or simple hexadecimal form.
    ///
    /// # Errors
    /// Returns [`CoreError::InvalidUuid`] if `value` is not a UUID.
    pub fn parse(value: &str) -> Result<Self, CoreError> {
        Uuid::parse_str(value)
            .map(Self)
            .map_err(|e| CoreError::InvalidUuid { value: value.to_owned(), reason: e.to_string() })
    }

    /// Returns the inner `Uuid`.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for DomainUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for DomainUuid {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<Uuid> for DomainUuid {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Numeric id of a running domain.
///
/// Inactive domains report [`DomainId::INVALID`], which is `-1` reinterpreted
/// as an unsigned 32-bit value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DomainId(pub u32);

impl DomainId {
    /// Sentinel reported while a domain is not running.
    pub const INVALID: Self = Self(u32::MAX);

    /// Builds an id from an optional running id.
    #[must_use]
    pub fn from_running(id: Option<u32>) -> Self {
        id.map_or(Self::INVALID, Self)
    }

    /// Returns `true` unless this is the inactive sentinel.
    #[must_use]
    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }

    /// Returns the raw value, including the sentinel.
    #[must_use]
    pub fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for DomainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "{}", self.0)
        } else {
            f.write_str("-")
        }
    }
}

/// Bus address of an exported object.
///
/// Elements are non-empty runs of `[A-Za-z0-9_]` separated by `/`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectPath(String);

impl ObjectPath {
    /// Validates and wraps a bus object path.
    ///
    /// # Errors
    /// Returns [`CoreError::InvalidObjectPath`] if `path` violates the bus path grammar.
    pub fn new(path: impl Into<String>) -> Result<Self, CoreError> {
        let path = path.into();
        validate_path(&path).map_err(|reason| CoreError::InvalidObjectPath {
            path: path.clone(),
            reason: reason.to_owned(),
        })?;
        Ok(Self(path))
    }

    /// Path of the connection object.
    #[must_use]
    pub fn connect() -> Self {
        Self(CONNECT_PATH.to_owned())
    }

    /// Derives the stable object path of a domain from its UUID.
    #[must_use]
    pub fn for_domain(uuid: DomainUuid) -> Self {
        Self(format!("{DOMAIN_PATH_PREFIX}/{}", uuid.to_string().replace('-', "_")))
    }

    /// Recovers the domain UUID encoded in a domain object path.
    ///
    /// Returns `None` for paths outside [`DOMAIN_PATH_PREFIX`] and for
    /// non-canonical encodings (upper case, undashed).
    #[must_use]
    pub fn domain_uuid(&self) -> Option<DomainUuid> {
        let tail = self.0.strip_prefix(DOMAIN_PATH_PREFIX)?.strip_prefix('/')?;
        let uuid = DomainUuid::parse(&tail.replace('_', "-")).ok()?;
        (Self::for_domain(uuid) == *self).then_some(uuid)
    }

    /// Returns the path as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn validate_path(path: &str) -> Result<(), &'static str> {
    if path == "/" {
        return Ok(());
    }
    let Some(rest) = path.strip_prefix('/') else {
        return Err("must start with '/'");
    };
    if rest.ends_with('/') {
        return Err("must not end with '/'");
    }
    for element in rest.split('/') {
        if element.is_empty() {
            return Err("empty path element");
        }
        if !element.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_') {
            return Err("elements may only contain [A-Za-z0-9_]");
        }
    }
    Ok(())
}

impl fmt::Display for ObjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ObjectPath {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<ObjectPath> for String {
    fn from(path: ObjectPath) -> Self {
        path.0
    }
}

impl FromStr for ObjectPath {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}
