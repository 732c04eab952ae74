//! Flag bits understood by the bundled drivers.
//!
//! The bus layer passes flags through untouched; only drivers interpret them.

/// `GetXMLDesc` flags.
pub mod xml {
    pub const SECURE: u32 = 1 << 0;
    pub const INACTIVE: u32 = 1 << 1;
    pub const UPDATE_CPU: u32 = 1 << 2;
    pub const MIGRATABLE: u32 = 1 << 3;
    pub const ALL: u32 = SECURE | INACTIVE | UPDATE_CPU | MIGRATABLE;
}

/// `GetVcpus` flags.
pub mod vcpu {
    pub const AFFECT_LIVE: u32 = 1 << 0;
    pub const AFFECT_CONFIG: u32 = 1 << 1;
    pub const MAXIMUM: u32 = 1 << 2;
    pub const GUEST: u32 = 1 << 3;
    pub const ALL: u32 = AFFECT_LIVE | AFFECT_CONFIG | MAXIMUM | GUEST;
}

/// `Create` flags.
pub mod create {
    pub const START_PAUSED: u32 = 1 << 0;
    pub const AUTODESTROY: u32 = 1 << 1;
    pub const BYPASS_CACHE: u32 = 1 << 2;
    pub const FORCE_BOOT: u32 = 1 << 3;
    pub const ALL: u32 = START_PAUSED | AUTODESTROY | BYPASS_CACHE | FORCE_BOOT;
}

/// `Shutdown` and `Reboot` mode flags.
pub mod power {
    pub const ACPI_POWER_BTN: u32 = 1 << 0;
    pub const GUEST_AGENT: u32 = 1 << 1;
    pub const INITCTL: u32 = 1 << 2;
    pub const SIGNAL: u32 = 1 << 3;
    pub const PARAVIRT: u32 = 1 << 4;
    pub const ALL: u32 = ACPI_POWER_BTN | GUEST_AGENT | INITCTL | SIGNAL | PARAVIRT;
}

/// `Destroy` flags.
pub mod destroy {
    pub const GRACEFUL: u32 = 1 << 0;
    pub const ALL: u32 = GRACEFUL;
}

/// `Undefine` flags.
pub mod undefine {
    pub const MANAGED_SAVE: u32 = 1 << 0;
    pub const SNAPSHOTS_METADATA: u32 = 1 << 1;
    pub const NVRAM: u32 = 1 << 2;
    pub const KEEP_NVRAM: u32 = 1 << 3;
    pub const ALL: u32 = MANAGED_SAVE | SNAPSHOTS_METADATA | NVRAM | KEEP_NVRAM;
}

/// `ManagedSave` flags.
pub mod save {
    pub const BYPASS_CACHE: u32 = 1 << 0;
    pub const RUNNING: u32 = 1 << 1;
    pub const PAUSED: u32 = 1 << 2;
    pub const ALL: u32 = BYPASS_CACHE | RUNNING | PAUSED;
}

/// `ListDomains` filter flags. Zero lists every domain.
pub mod list {
    pub const ACTIVE: u32 = 1 << 0;
    pub const INACTIVE: u32 = 1 << 1;
    pub const PERSISTENT: u32 = 1 << 2;
    pub const TRANSIENT: u32 = 1 << 3;
    pub const ALL: u32 = ACTIVE | INACTIVE | PERSISTENT | TRANSIENT;
}

/// Reject any bit of `flags` outside `allowed`.
///
/// # Errors
/// Returns [`DriverError::InvalidArg`](crate::DriverError::InvalidArg) naming the
/// offending bits.
pub fn check(flags: u32, allowed: u32) -> Result<(), crate::DriverError> {
    let unknown = flags & !allowed;
    if unknown == 0 {
        Ok(())
    } else {
        Err(crate::DriverError::InvalidArg(format!("unsupported flags (0x{unknown:x})")))
    }
}
