//! Raw switch register addressing.
//!
//! Registers are addressed by page and offset. Reads are two-step: a
//! selection is latched first, then the value is fetched, because the
//! underlying access may be slow or require a page switch.

use crate::error::{DsaError, DsaResult};
use std::fmt;

/// A page/register/size triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RegisterSelect {
    pub page: u8,
    pub reg: u8,
    /// Register size in bytes.
    pub size: u8,
}

impl RegisterSelect {
    pub const fn new(page: u8, reg: u8, size: u8) -> Self {
        Self { page, reg, size }
    }
}

impl fmt::Display for RegisterSelect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02x}:{:02x}:{:x}", self.page, self.reg, self.size)
    }
}

/// Register widths a value can be reported at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegWidth {
    W8,
    W16,
    W32,
    W48,
    W64,
}

impl RegWidth {
    /// Maps a declared size in bytes to a width.
    ///
    /// # Errors
    ///
    /// Returns [`DsaError::Io`] for sizes other than 1, 2, 4, 6 or 8: such a
    /// value can only come from a confused register access.
    pub fn from_size(size: u8) -> DsaResult<Self> {
        match size {
            1 => Ok(RegWidth::W8),
            2 => Ok(RegWidth::W16),
            4 => Ok(RegWidth::W32),
            6 => Ok(RegWidth::W48),
            8 => Ok(RegWidth::W64),
            other => Err(DsaError::io(format!("unsupported register size {}", other))),
        }
    }

    /// Returns the size in bytes.
    pub const fn bytes(&self) -> u8 {
        match self {
            RegWidth::W8 => 1,
            RegWidth::W16 => 2,
            RegWidth::W32 => 4,
            RegWidth::W48 => 6,
            RegWidth::W64 => 8,
        }
    }

    /// Truncates `value` to what is shown at this width.
    ///
    /// 48-bit registers are shown with the full 64-bit value.
    pub const fn truncate(&self, value: u64) -> u64 {
        match self {
            RegWidth::W8 => value as u8 as u64,
            RegWidth::W16 => value as u16 as u64,
            RegWidth::W32 => value as u32 as u64,
            RegWidth::W48 | RegWidth::W64 => value,
        }
    }
}

/// A value read back from the selected register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegisterValue {
    /// Declared register size in bytes.
    pub size: u8,
    pub value: u64,
}

impl RegisterValue {
    pub const fn new(size: u8, value: u64) -> Self {
        Self { size, value }
    }

    /// Formats the value as lower-case hex at its declared width.
    pub fn to_hex(&self) -> DsaResult<String> {
        let width = RegWidth::from_size(self.size)?;
        Ok(format!("{:x}", width.truncate(self.value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_width_from_size() {
        assert_eq!(RegWidth::from_size(1).unwrap(), RegWidth::W8);
        assert_eq!(RegWidth::from_size(6).unwrap(), RegWidth::W48);
        assert!(matches!(RegWidth::from_size(3), Err(DsaError::Io { .. })));
        assert!(RegWidth::from_size(0).is_err());
    }

    #[test]
    fn test_value_truncated_to_width() {
        assert_eq!(RegisterValue::new(1, 0x1ff).to_hex().unwrap(), "ff");
        assert_eq!(RegisterValue::new(2, 0xdead_beef).to_hex().unwrap(), "beef");
        assert_eq!(RegisterValue::new(4, 0x1_0000_0001).to_hex().unwrap(), "1");
        assert_eq!(
            RegisterValue::new(6, 0x0000_1234_5678_9abc).to_hex().unwrap(),
            "123456789abc"
        );
        assert_eq!(RegisterValue::new(8, u64::MAX).to_hex().unwrap(), "ffffffffffffffff");
    }

    #[test]
    fn test_select_display() {
        assert_eq!(RegisterSelect::new(1, 2, 1).to_string(), "01:02:1");
    }
}
