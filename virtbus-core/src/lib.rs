//! Core types for the virtbus domain lifecycle service.
//!
//! Defines the value types shared by the hypervisor driver layer and the bus
//! service: domain identities and object paths, run states, scheduler
//! descriptors, and lifecycle events.

#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]

pub mod domain;
pub mod error;
pub mod event;
pub mod id;

pub use domain::{DomainState, SchedulerType};
pub use error::CoreError;
pub use event::{LifecycleEvent, LifecycleEventKind};
pub use id::{DomainId, DomainUuid, ObjectPath, CONNECT_PATH, DOMAIN_PATH_PREFIX};
