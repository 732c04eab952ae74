//! Lifecycle event kinds and their detail codes.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::id::ObjectPath;

/// Top-level lifecycle event name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum LifecycleEventKind {
    Defined,
    Undefined,
    Started,
    Suspended,
    Resumed,
    Stopped,
    Shutdown,
    PMSuspended,
    Crashed,
}

impl LifecycleEventKind {
    /// Signal argument string for this kind.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Defined => "Defined",
            Self::Undefined => "Undefined",
            Self::Started => "Started",
            Self::Suspended => "Suspended",
            Self::Resumed => "Resumed",
            Self::Stopped => "Stopped",
            Self::Shutdown => "Shutdown",
            Self::PMSuspended => "PMSuspended",
            Self::Crashed => "Crashed",
        }
    }

    /// Symbolic name of a detail code under this kind, if known.
    #[must_use]
    pub fn detail_name(self, detail: i32) -> Option<&'static str> {
        let names: &[&str] = match self {
            Self::Defined => &["Added", "Updated", "Renamed", "FromSnapshot"],
            Self::Undefined => &["Removed", "Renamed"],
            Self::Started => &["Booted", "Migrated", "Restored", "FromSnapshot", "Wakeup"],
            Self::Suspended => &[
                "Paused",
                "Migrated",
                "IOError",
                "Watchdog",
                "Restored",
                "FromSnapshot",
                "APIError",
                "PostCopy",
                "PostCopyFailed",
            ],
            Self::Resumed => &["Unpaused", "Migrated", "FromSnapshot", "PostCopy"],
            Self::Stopped => {
                &["Shutdown", "Destroyed", "Crashed", "Migrated", "Saved", "Failed", "FromSnapshot"]
            }
            Self::Shutdown => &["Finished", "Guest", "Host"],
            Self::PMSuspended => &["Memory", "Disk"],
            Self::Crashed => &["Panicked"],
        };
        usize::try_from(detail).ok().and_then(|i| names.get(i).copied())
    }
}

impl fmt::Display for LifecycleEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Detail codes raised by the hypervisor, grouped by event kind.
pub mod detail {
    pub const DEFINED_ADDED: i32 = 0;
    pub const DEFINED_UPDATED: i32 = 1;

    pub const UNDEFINED_REMOVED: i32 = 0;

    pub const STARTED_BOOTED: i32 = 0;
    pub const STARTED_RESTORED: i32 = 2;

    pub const SUSPENDED_PAUSED: i32 = 0;

    pub const RESUMED_UNPAUSED: i32 = 0;

    pub const STOPPED_SHUTDOWN: i32 = 0;
    pub const STOPPED_DESTROYED: i32 = 1;
    pub const STOPPED_CRASHED: i32 = 2;
    pub const STOPPED_SAVED: i32 = 4;
}

/// A lifecycle transition correlated to the object path of its domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct LifecycleEvent {
    /// Object path of the domain that changed.
    pub path: ObjectPath,
    /// Top-level event name.
    pub kind: LifecycleEventKind,
    /// Raw hypervisor detail code, preserved as delivered.
    pub detail: i32,
}

impl LifecycleEvent {
    /// Creates a lifecycle event.
    #[must_use]
    pub fn new(path: ObjectPath, kind: LifecycleEventKind, detail: i32) -> Self {
        Self { path, kind, detail }
    }

    /// Symbolic detail name, e.g. `"Destroyed"` for a `Stopped` event.
    #[must_use]
    pub fn detail_name(&self) -> Option<&'static str> {
        self.kind.detail_name(self.detail)
    }
}
