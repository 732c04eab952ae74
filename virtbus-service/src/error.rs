//! Bus faults and their mapping from driver errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use virtbus_driver::DriverError;

/// Faults surfaced to bus callers.
///
/// Every variant has a stable identifier ([`BusFault::name`]) and a
/// human-readable detail (its `Display`).
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum BusFault {
    /// The domain vanished between resolution and use.
    #[error("{0}")]
    NotFound(String),

    /// The operation is not valid in the domain's current state.
    #[error("{0}")]
    InvalidState(String),

    /// The connection driver does not implement the operation.
    #[error("{0}")]
    Unsupported(String),

    /// Write attempted on a computed property.
    #[error("property '{property}' of interface '{interface}' is read-only")]
    ReadOnlyProperty { interface: String, property: String },

    /// Unexpected hypervisor failure.
    #[error("internal error (code {code}): {message}")]
    Internal { code: i32, message: String },

    /// Arguments do not match the member's signature.
    #[error("invalid arguments: {0}")]
    InvalidArgs(String),

    /// No such member on the interface.
    #[error("unknown method '{member}' on interface '{interface}'")]
    UnknownMethod { interface: String, member: String },

    /// No such property on the interface.
    #[error("unknown property '{property}' on interface '{interface}'")]
    UnknownProperty { interface: String, property: String },

    /// No object is exported at the path.
    #[error("no object at path '{0}'")]
    UnknownObject(String),
}

impl BusFault {
    /// Stable error identifier.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "org.libvirt.Error.NotFound",
            Self::InvalidState(_) => "org.libvirt.Error.InvalidState",
            Self::Unsupported(_) => "org.libvirt.Error.Unsupported",
            Self::Internal { .. } => "org.libvirt.Error.Internal",
            Self::ReadOnlyProperty { .. } => "org.freedesktop.DBus.Error.PropertyReadOnly",
            Self::InvalidArgs(_) => "org.freedesktop.DBus.Error.InvalidArgs",
            Self::UnknownMethod { .. } => "org.freedesktop.DBus.Error.UnknownMethod",
            Self::UnknownProperty { .. } => "org.freedesktop.DBus.Error.UnknownProperty",
            Self::UnknownObject(_) => "org.freedesktop.DBus.Error.UnknownObject",
        }
    }

    /// Whether a well-behaved caller may ignore this fault when probing
    /// driver capabilities.
    #[must_use]
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported(_))
    }
}

impl From<DriverError> for BusFault {
    fn from(err: DriverError) -> Self {
        let message = err.to_string();
        match err {
            DriverError::NoDomain(_) => Self::NotFound(message),
            DriverError::OperationInvalid(_)
            | DriverError::CallbackAlreadyRegistered
            | DriverError::CallbackNotRegistered => Self::InvalidState(message),
            DriverError::NoSupport { .. } => Self::Unsupported(message),
            DriverError::InvalidArg(_) => Self::InvalidArgs(message),
            other => Self::Internal { code: other.code(), message },
        }
    }
}

impl IntoResponse for BusFault {
    fn into_response(self) -> Response {
        let status = match &self {
            BusFault::NotFound(_) | BusFault::UnknownObject(_) => StatusCode::NOT_FOUND,
            BusFault::InvalidState(_) => StatusCode::CONFLICT,
            BusFault::Unsupported(_) => StatusCode::NOT_IMPLEMENTED,
            BusFault::ReadOnlyProperty { .. } => StatusCode::FORBIDDEN,
            BusFault::InvalidArgs(_)
            | BusFault::UnknownMethod { .. }
            | BusFault::UnknownProperty { .. } => StatusCode::BAD_REQUEST,
            BusFault::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({"error": self.name(), "message": self.to_string()}))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;

    #[test]
    fn bus_fault_status_codes_map_correctly() {
        let not_found = BusFault::NotFound("gone".to_owned());
        assert_eq!(not_found.into_response().status(), StatusCode::NOT_FOUND);

        let unsupported = BusFault::Unsupported("nope".to_owned());
        assert_eq!(unsupported.into_response().status(), StatusCode::NOT_IMPLEMENTED);

        let ro = BusFault::ReadOnlyProperty {
            interface: "org.libvirt.Domain".to_owned(),
            property: "Name".to_owned(),
        };
        assert_eq!(ro.into_response().status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn driver_no_support_maps_to_unsupported_with_message() {
        let fault = BusFault::from(DriverError::NoSupport { operation: "virDomainDestroyFlags" });
        assert!(fault.is_unsupported());
        assert_eq!(fault.name(), "org.libvirt.Error.Unsupported");
        assert!(
            fault.to_string().contains("this function is not supported by the connection driver"),
            "detail must keep the driver message"
        );
    }

    #[test]
    fn driver_errors_map_into_taxonomy() {
        assert!(matches!(BusFault::from(DriverError::NoDomain("x".to_owned())), BusFault::NotFound(_)));
        assert!(matches!(
            BusFault::from(DriverError::OperationInvalid("x".to_owned())),
            BusFault::InvalidState(_)
        ));
        assert!(matches!(
            BusFault::from(DriverError::InvalidArg("x".to_owned())),
            BusFault::InvalidArgs(_)
        ));
        match BusFault::from(DriverError::Internal { code: 9, message: "io".to_owned() }) {
            BusFault::Internal { code, .. } => assert_eq!(code, 9),
            other => panic!("expected Internal, got {other:?}"),
        }
    }

    #[test]
    fn bus_fault_display_includes_message() {
        let err = BusFault::InvalidArgs("expected 'u'".to_owned());
        assert!(err.to_string().contains("expected 'u'"));
    }
}
