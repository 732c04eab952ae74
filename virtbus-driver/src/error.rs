//! Error types for the driver crate.

/// Hypervisor error codes carried by [`DriverError`].
pub mod code {
    pub const NO_SUPPORT: i32 = 3;
    pub const INVALID_ARG: i32 = 8;
    pub const NO_CONNECT: i32 = 38;
    pub const NO_DOMAIN: i32 = 42;
    pub const OPERATION_INVALID: i32 = 55;
}

/// Errors reported by a hypervisor connection.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum DriverError {
    /// The domain does not exist (or stopped existing after resolution).
    #[error("Domain not found: {0}")]
    NoDomain(String),

    /// The operation is not valid in the domain's current state.
    #[error("Requested operation is not valid: {0}")]
    OperationInvalid(String),

    /// The connection driver does not implement the operation.
    #[error("this function is not supported by the connection driver: {operation}")]
    NoSupport { operation: &'static str },

    /// An argument (typically a flag bit) was rejected.
    #[error("invalid argument: {0}")]
    InvalidArg(String),

    /// The connection URI could not be opened.
    #[error("failed to connect to '{uri}': {reason}")]
    ConnectionFailed { uri: String, reason: String },

    /// A lifecycle callback is already registered on this connection.
    #[error("a lifecycle callback is already registered on this connection")]
    CallbackAlreadyRegistered,

    /// No lifecycle callback is registered on this connection.
    #[error("no lifecycle callback is registered on this connection")]
    CallbackNotRegistered,

    /// Any other hypervisor failure.
    #[error("internal error (code {code}): {message}")]
    Internal { code: i32, message: String },
}

impl DriverError {
    /// Numeric hypervisor error code for diagnostics.
    #[must_use]
    pub fn code(&self) -> i32 {
        match self {
            Self::NoDomain(_) => code::NO_DOMAIN,
            Self::OperationInvalid(_)
            | Self::CallbackAlreadyRegistered
            | Self::CallbackNotRegistered => code::OPERATION_INVALID,
            Self::NoSupport { .. } => code::NO_SUPPORT,
            Self::InvalidArg(_) => code::INVALID_ARG,
            Self::ConnectionFailed { .. } => code::NO_CONNECT,
            Self::Internal { code, .. } => *code,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_support_message_names_connection_driver() {
        let err = DriverError::NoSupport { operation: "virDomainDestroy" };
        let msg = err.to_string();
        assert!(msg.contains("this function is not supported by the connection driver"));
        assert!(msg.contains("virDomainDestroy"));
        assert_eq!(err.code(), code::NO_SUPPORT);
    }

    #[test]
    fn internal_keeps_original_code() {
        let err = DriverError::Internal { code: 99, message: "boom".to_owned() };
        assert_eq!(err.code(), 99);
    }
}
