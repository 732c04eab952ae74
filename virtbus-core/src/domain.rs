use std::fmt;

use serde::{Deserialize, Serialize};

/// Run state of a domain as reported by the hypervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum DomainState {
    /// No state recorded.
    NoState,
    /// Running on a CPU.
    Running,
    /// Blocked on a resource.
    Blocked,
    /// Paused by the user.
    Paused,
    /// Shutdown in progress.
    ShuttingDown,
    /// Powered off.
    Shutoff,
    /// Crashed.
    Crashed,
    /// Suspended by guest power management.
    PmSuspended,
}

impl DomainState {
    /// Bus rendering, drawn from
    /// `running | shutoff | paused | blocked | crashed | pmsuspended | other`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Shutoff => "shutoff",
            Self::Paused => "paused",
            Self::Blocked => "blocked",
            Self::Crashed => "crashed",
            Self::PmSuspended => "pmsuspended",
            Self::NoState | Self::ShuttingDown => "other",
        }
    }

    /// States in which the domain holds a valid id.
    #[must_use]
    pub fn is_running_family(self) -> bool {
        matches!(
            self,
            Self::Running | Self::Blocked | Self::Paused | Self::ShuttingDown | Self::PmSuspended
        )
    }
}

impl fmt::Display for DomainState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scheduler descriptor: scheduler name and its integer parameter.
///
/// Always produced from a single hypervisor query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct SchedulerType {
    /// Scheduler name (e.g. `"fair"`, `"posix"`).
    pub name: String,
    /// Scheduler priority, as reported alongside the name.
    pub priority: i32,
}

impl SchedulerType {
    /// Creates a scheduler descriptor.
    pub fn new(name: impl Into<String>, priority: i32) -> Self {
        Self { name: name.into(), priority }
    }

    /// Returns the ordered `(name, priority)` pair.
    #[must_use]
    pub fn into_pair(self) -> (String, i32) {
        (self.name, self.priority)
    }
}
