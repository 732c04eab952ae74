//! Hypervisor connection layer for the virtbus service.
//!
//! Defines the [`Hypervisor`] contract, the bundled in-memory test driver,
//! and the [`Connection`] adapter the bus service resolves domains through.

#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]

pub mod config;
pub mod connection;
pub mod error;
pub mod flags;
pub mod handle;
pub mod hypervisor;
pub mod test_driver;

pub use config::DomainDefinition;
pub use connection::Connection;
pub use error::DriverError;
pub use handle::DomainRef;
pub use hypervisor::{CallbackId, DomainLifecycle, Hypervisor, LifecycleStream};
pub use test_driver::{Operation, TestDriver};
