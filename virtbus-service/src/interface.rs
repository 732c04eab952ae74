//! Static interface table: bus member names mapped to handlers.
//!
//! The tables are plain data. [`validate_all`] runs once at startup and
//! refuses to start a service whose tables disagree with the handlers.

use std::collections::HashSet;

use serde::Serialize;
use virtbus_core::ObjectPath;

use crate::{
    connect::ConnectMethod, dispatcher::DomainMethod, properties::Property, value::is_known_signature,
};

pub const CONNECT_INTERFACE: &str = "org.libvirt.Connect";
pub const DOMAIN_INTERFACE: &str = "org.libvirt.Domain";
pub const PROPERTIES_INTERFACE: &str = "org.freedesktop.DBus.Properties";

/// Members of `org.freedesktop.DBus.Properties`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertiesMethod {
    Get,
    Set,
    GetAll,
}

/// What a method name dispatches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Handler {
    Connect(ConnectMethod),
    Domain(DomainMethod),
    Properties(PropertiesMethod),
}

/// One named, typed argument.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Arg {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub signature: &'static str,
}

const fn arg(name: &'static str, signature: &'static str) -> Arg {
    Arg { name, signature }
}

#[derive(Debug, Serialize)]
pub struct MethodSpec {
    pub name: &'static str,
    #[serde(rename = "in")]
    pub inputs: &'static [Arg],
    #[serde(rename = "out")]
    pub outputs: &'static [Arg],
    #[serde(skip)]
    pub handler: Handler,
}

impl MethodSpec {
    /// Concatenated input signature, e.g. `"ss"`.
    #[must_use]
    pub fn input_signature(&self) -> String {
        self.inputs.iter().map(|a| a.signature).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Access {
    Read,
    ReadWrite,
}

#[derive(Debug, Serialize)]
pub struct PropertySpec {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub signature: &'static str,
    pub access: Access,
    #[serde(skip)]
    pub property: Property,
}

#[derive(Debug, Serialize)]
pub struct SignalSpec {
    pub name: &'static str,
    pub args: &'static [Arg],
}

#[derive(Debug, Serialize)]
pub struct InterfaceSpec {
    pub name: &'static str,
    pub methods: &'static [MethodSpec],
    pub properties: &'static [PropertySpec],
    pub signals: &'static [SignalSpec],
}

impl InterfaceSpec {
    #[must_use]
    pub fn method(&self, name: &str) -> Option<&MethodSpec> {
        self.methods.iter().find(|m| m.name == name)
    }

    #[must_use]
    pub fn property(&self, name: &str) -> Option<&PropertySpec> {
        self.properties.iter().find(|p| p.name == name)
    }
}

const FLAGS: &[Arg] = &[arg("flags", "u")];
const NONE: &[Arg] = &[];

const fn domain_method(
    name: &'static str,
    inputs: &'static [Arg],
    outputs: &'static [Arg],
    method: DomainMethod,
) -> MethodSpec {
    MethodSpec { name, inputs, outputs, handler: Handler::Domain(method) }
}

const fn ro(name: &'static str, signature: &'static str, property: Property) -> PropertySpec {
    PropertySpec { name, signature, access: Access::Read, property }
}

pub static CONNECT: InterfaceSpec = InterfaceSpec {
    name: CONNECT_INTERFACE,
    methods: &[
        MethodSpec {
            name: "ListDomains",
            inputs: FLAGS,
            outputs: &[arg("domains", "ao")],
            handler: Handler::Connect(ConnectMethod::ListDomains),
        },
        MethodSpec {
            name: "DomainLookupByName",
            inputs: &[arg("name", "s")],
            outputs: &[arg("domain", "o")],
            handler: Handler::Connect(ConnectMethod::DomainLookupByName),
        },
        MethodSpec {
            name: "DomainLookupByID",
            inputs: &[arg("id", "u")],
            outputs: &[arg("domain", "o")],
            handler: Handler::Connect(ConnectMethod::DomainLookupById),
        },
        MethodSpec {
            name: "DomainLookupByUUID",
            inputs: &[arg("uuid", "s")],
            outputs: &[arg("domain", "o")],
            handler: Handler::Connect(ConnectMethod::DomainLookupByUuid),
        },
    ],
    properties: &[],
    signals: &[SignalSpec { name: "DomainEvent", args: &[arg("domain", "o"), arg("event", "s")] }],
};

pub static DOMAIN: InterfaceSpec = InterfaceSpec {
    name: DOMAIN_INTERFACE,
    methods: &[
        domain_method("GetXMLDesc", FLAGS, &[arg("xml", "s")], DomainMethod::GetXmlDesc),
        domain_method("GetVcpus", FLAGS, &[arg("vcpus", "u")], DomainMethod::GetVcpus),
        domain_method("Reboot", FLAGS, NONE, DomainMethod::Reboot),
        domain_method("Shutdown", FLAGS, NONE, DomainMethod::Shutdown),
        domain_method("Create", FLAGS, NONE, DomainMethod::Create),
        domain_method("Destroy", FLAGS, NONE, DomainMethod::Destroy),
        domain_method("Reset", FLAGS, NONE, DomainMethod::Reset),
        domain_method("Undefine", FLAGS, NONE, DomainMethod::Undefine),
        domain_method("Suspend", NONE, NONE, DomainMethod::Suspend),
        domain_method("Resume", NONE, NONE, DomainMethod::Resume),
        domain_method("ManagedSave", FLAGS, NONE, DomainMethod::ManagedSave),
        domain_method("ManagedSaveRemove", FLAGS, NONE, DomainMethod::ManagedSaveRemove),
        domain_method(
            "HasManagedSaveImage",
            FLAGS,
            &[arg("managedSaveImage", "b")],
            DomainMethod::HasManagedSaveImage,
        ),
    ],
    properties: &[
        ro("Active", "b", Property::Active),
        PropertySpec { name: "Autostart", signature: "b", access: Access::ReadWrite, property: Property::Autostart },
        ro("Id", "u", Property::Id),
        ro("Name", "s", Property::Name),
        ro("OSType", "s", Property::OsType),
        ro("Persistent", "b", Property::Persistent),
        ro("SchedulerType", "(si)", Property::SchedulerType),
        ro("State", "s", Property::State),
        ro("UUID", "s", Property::Uuid),
    ],
    signals: &[],
};

pub static PROPERTIES: InterfaceSpec = InterfaceSpec {
    name: PROPERTIES_INTERFACE,
    methods: &[
        MethodSpec {
            name: "Get",
            inputs: &[arg("interface", "s"), arg("property", "s")],
            outputs: &[arg("value", "v")],
            handler: Handler::Properties(PropertiesMethod::Get),
        },
        MethodSpec {
            name: "Set",
            inputs: &[arg("interface", "s"), arg("property", "s"), arg("value", "v")],
            outputs: NONE,
            handler: Handler::Properties(PropertiesMethod::Set),
        },
        MethodSpec {
            name: "GetAll",
            inputs: &[arg("interface", "s")],
            outputs: &[arg("properties", "a{sv}")],
            handler: Handler::Properties(PropertiesMethod::GetAll),
        },
    ],
    properties: &[],
    signals: &[],
};

/// Every interface table the service serves.
pub static ALL: [&InterfaceSpec; 3] = [&CONNECT, &DOMAIN, &PROPERTIES];

/// Interfaces served at `path`, assuming an object is exported there.
#[must_use]
pub fn interfaces_at(path: &ObjectPath) -> &'static [&'static InterfaceSpec] {
    static AT_CONNECT: [&InterfaceSpec; 1] = [&CONNECT];
    static AT_DOMAIN: [&InterfaceSpec; 2] = [&DOMAIN, &PROPERTIES];
    if path.as_str() == virtbus_core::CONNECT_PATH {
        &AT_CONNECT
    } else {
        &AT_DOMAIN
    }
}

/// Inconsistencies found by [`validate`].
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum TableError {
    #[error("interface '{0}' is listed twice")]
    DuplicateInterface(&'static str),

    #[error("interface '{interface}' declares member '{member}' twice")]
    DuplicateMember { interface: &'static str, member: &'static str },

    #[error("interface '{interface}' member '{member}' has malformed signature '{signature}'")]
    BadSignature { interface: &'static str, member: &'static str, signature: &'static str },

    #[error("property '{property}' is declared {declared:?} but its handler disagrees")]
    WritabilityMismatch { property: &'static str, declared: Access },

    #[error("property '{property}' is declared as '{declared}' but its handler produces '{actual}'")]
    TypeMismatch { property: &'static str, declared: &'static str, actual: &'static str },

    #[error("property table of '{0}' does not list every domain property exactly once, in order")]
    PropertyCoverage(&'static str),
}

/// Check a set of interface tables for internal consistency.
///
/// # Errors
/// Returns the first [`TableError`] found.
pub fn validate(interfaces: &[&InterfaceSpec]) -> Result<(), TableError> {
    let mut seen = HashSet::new();
    for iface in interfaces {
        if !seen.insert(iface.name) {
            return Err(TableError::DuplicateInterface(iface.name));
        }
        let mut members = HashSet::new();
        let names = iface
            .methods
            .iter()
            .map(|m| m.name)
            .chain(iface.properties.iter().map(|p| p.name))
            .chain(iface.signals.iter().map(|s| s.name));
        for member in names {
            if !members.insert(member) {
                return Err(TableError::DuplicateMember { interface: iface.name, member });
            }
        }
        let args = iface
            .methods
            .iter()
            .flat_map(|m| m.inputs.iter().chain(m.outputs).map(move |a| (m.name, a.signature)))
            .chain(iface.signals.iter().flat_map(|s| s.args.iter().map(move |a| (s.name, a.signature))));
        for (member, signature) in args {
            if !is_known_signature(signature) {
                return Err(TableError::BadSignature { interface: iface.name, member, signature });
            }
        }
        for spec in iface.properties {
            if !is_known_signature(spec.signature) || spec.signature == "v" {
                return Err(TableError::BadSignature {
                    interface: iface.name,
                    member: spec.name,
                    signature: spec.signature,
                });
            }
            if (spec.access == Access::ReadWrite) != spec.property.is_writable() {
                return Err(TableError::WritabilityMismatch { property: spec.name, declared: spec.access });
            }
            if spec.signature != spec.property.signature() {
                return Err(TableError::TypeMismatch {
                    property: spec.name,
                    declared: spec.signature,
                    actual: spec.property.signature(),
                });
            }
        }
    }
    Ok(())
}

/// Validate the tables the service actually serves.
///
/// # Errors
/// Returns the first [`TableError`] found.
pub fn validate_all() -> Result<(), TableError> {
    validate(&ALL)?;
    let declared: Vec<Property> = DOMAIN.properties.iter().map(|p| p.property).collect();
    if declared != Property::ALL {
        return Err(TableError::PropertyCoverage(DOMAIN.name));
    }
    if DOMAIN.properties.iter().any(|p| p.name != p.property.name()) {
        return Err(TableError::PropertyCoverage(DOMAIN.name));
    }
    Ok(())
}
