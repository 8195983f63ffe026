//! DSA error types and errno mapping.
//!
//! Control-surface handlers hand these errors back to their caller as a
//! typed failure. [`DsaError::errno`] gives the negative errno a sysfs
//! handler would have returned for the same condition.

use thiserror::Error;

/// errno values used by the master-port layer.
pub mod errno {
    pub const EPERM: i32 = 1;
    pub const EIO: i32 = 5;
    pub const ENOMEM: i32 = 12;
    pub const EBUSY: i32 = 16;
    pub const EEXIST: i32 = 17;
    pub const EINVAL: i32 = 22;
    pub const ENOPROTOOPT: i32 = 92;
    pub const EOPNOTSUPP: i32 = 95;
}

/// Error type for master-port and switch operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DsaError {
    /// The operation or feature is absent on the device or switch.
    #[error("Operation not supported: {feature}")]
    NotSupported { feature: String },

    /// Malformed input, out-of-range index, or an unused port was targeted.
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    /// A tree-wide exclusive resource is already claimed.
    #[error("Resource busy: {resource}")]
    Busy { resource: String },

    /// Underlying register or device access failed.
    #[error("I/O failure: {message}")]
    Io { message: String },

    /// Read of a write-only control.
    #[error("Permission denied: {attribute}")]
    PermissionDenied { attribute: String },

    /// Allocation failed while building proxy state.
    #[error("Out of memory")]
    NoMemory,

    /// Unknown tagging protocol, or its provider is not loaded.
    #[error("Protocol not available: {name}")]
    ProtocolUnavailable { name: String },

    /// The item is already registered.
    #[error("Already exists: {item}")]
    AlreadyExists { item: String },
}

impl DsaError {
    /// Creates a not supported error with a feature description.
    pub fn not_supported(feature: impl Into<String>) -> Self {
        DsaError::NotSupported {
            feature: feature.into(),
        }
    }

    /// Creates an invalid argument error with a message.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        DsaError::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a busy error naming the contended resource.
    pub fn busy(resource: impl Into<String>) -> Self {
        DsaError::Busy {
            resource: resource.into(),
        }
    }

    /// Creates an I/O failure error.
    pub fn io(message: impl Into<String>) -> Self {
        DsaError::Io {
            message: message.into(),
        }
    }

    /// Creates a permission denied error for an attribute.
    pub fn permission_denied(attribute: impl Into<String>) -> Self {
        DsaError::PermissionDenied {
            attribute: attribute.into(),
        }
    }

    /// Creates a protocol unavailable error.
    pub fn protocol_unavailable(name: impl Into<String>) -> Self {
        DsaError::ProtocolUnavailable { name: name.into() }
    }

    /// Creates an already exists error.
    pub fn already_exists(item: impl Into<String>) -> Self {
        DsaError::AlreadyExists { item: item.into() }
    }

    /// Returns true if this error means "operation absent".
    pub fn is_not_supported(&self) -> bool {
        matches!(self, DsaError::NotSupported { .. })
    }

    /// Returns the negative errno for this error.
    pub fn errno(&self) -> i32 {
        -match self {
            DsaError::NotSupported { .. } => errno::EOPNOTSUPP,
            DsaError::InvalidArgument { .. } => errno::EINVAL,
            DsaError::Busy { .. } => errno::EBUSY,
            DsaError::Io { .. } => errno::EIO,
            DsaError::PermissionDenied { .. } => errno::EPERM,
            DsaError::NoMemory => errno::ENOMEM,
            DsaError::ProtocolUnavailable { .. } => errno::ENOPROTOOPT,
            DsaError::AlreadyExists { .. } => errno::EEXIST,
        }
    }

    /// Creates an error from a negative (or positive) errno value.
    ///
    /// Codes without a dedicated variant become [`DsaError::Io`].
    pub fn from_errno(code: i32) -> Self {
        let what = format!("errno {}", code);
        match code.abs() {
            errno::EOPNOTSUPP => DsaError::not_supported(what),
            errno::EINVAL => DsaError::invalid_argument(what),
            errno::EBUSY => DsaError::busy(what),
            errno::EPERM => DsaError::permission_denied(what),
            errno::ENOMEM => DsaError::NoMemory,
            errno::ENOPROTOOPT => DsaError::protocol_unavailable(what),
            errno::EEXIST => DsaError::already_exists(what),
            _ => DsaError::io(what),
        }
    }
}

/// Result type for master-port and switch operations.
pub type DsaResult<T> = Result<T, DsaError>;

/// Extension trait for optional operations.
pub trait DsaResultExt<T> {
    /// Turns a `NotSupported` failure into `Ok(None)`.
    ///
    /// Every other error is passed through unchanged.
    fn supported(self) -> DsaResult<Option<T>>;
}

impl<T> DsaResultExt<T> for DsaResult<T> {
    fn supported(self) -> DsaResult<Option<T>> {
        match self {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_not_supported() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errno_mapping() {
        assert_eq!(DsaError::not_supported("x").errno(), -95);
        assert_eq!(DsaError::invalid_argument("x").errno(), -22);
        assert_eq!(DsaError::busy("x").errno(), -16);
        assert_eq!(DsaError::io("x").errno(), -5);
        assert_eq!(DsaError::permission_denied("x").errno(), -1);
        assert_eq!(DsaError::NoMemory.errno(), -12);
    }

    #[test]
    fn test_from_errno() {
        assert!(matches!(DsaError::from_errno(-16), DsaError::Busy { .. }));
        assert!(matches!(DsaError::from_errno(95), DsaError::NotSupported { .. }));
        assert!(matches!(DsaError::from_errno(-110), DsaError::Io { .. }));
    }

    #[test]
    fn test_supported_ext() {
        let absent: DsaResult<u32> = Err(DsaError::not_supported("get_regs_len"));
        assert_eq!(absent.supported(), Ok(None));

        let present: DsaResult<u32> = Ok(7);
        assert_eq!(present.supported(), Ok(Some(7)));

        let failed: DsaResult<u32> = Err(DsaError::io("mdio timeout"));
        assert!(failed.supported().is_err());
    }

    #[test]
    fn test_error_display() {
        let err = DsaError::busy("hardware timestamping");
        assert_eq!(err.to_string(), "Resource busy: hardware timestamping");
    }
}
