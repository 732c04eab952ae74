//! Bus service façade over a hypervisor connection.
//!
//! Exposes domain lifecycle control as bus objects: one `org.libvirt.Connect`
//! object for enumeration and lookups, one `org.libvirt.Domain` object per
//! domain, and `DomainEvent` signals for every lifecycle transition. The bus
//! is served in-process by [`bus::Bus`] and over HTTP by [`routes`].

#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]

pub mod bridge;
pub mod bus;
pub mod config;
pub mod connect;
pub mod context;
pub mod directory;
pub mod dispatcher;
pub mod domain;
pub mod error;
pub mod interface;
pub mod properties;
pub mod routes;
pub mod signal;
pub mod value;
