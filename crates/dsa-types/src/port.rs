//! Port type definitions for DSA switch ports.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Type of switch port.
///
/// Assigned during tree topology discovery and never changed afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortType {
    /// Port not wired to anything; skipped by every tree-wide walk.
    #[default]
    Unused,
    /// CPU port, wired to the master network device.
    Cpu,
    /// Inter-switch link inside a multi-chip tree.
    Dsa,
    /// Front-panel port exposed as its own network interface.
    User,
}

impl PortType {
    /// Returns true if this is the CPU-facing uplink.
    pub const fn is_cpu(&self) -> bool {
        matches!(self, PortType::Cpu)
    }

    /// Returns true if this is a user-facing port.
    pub const fn is_user(&self) -> bool {
        matches!(self, PortType::User)
    }

    /// Returns true if the port is not in use.
    pub const fn is_unused(&self) -> bool {
        matches!(self, PortType::Unused)
    }
}

impl fmt::Display for PortType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PortType::Unused => "unused",
            PortType::Cpu => "cpu",
            PortType::Dsa => "dsa",
            PortType::User => "user",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for PortType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "unused" => Ok(PortType::Unused),
            "cpu" => Ok(PortType::Cpu),
            "dsa" => Ok(PortType::Dsa),
            "user" => Ok(PortType::User),
            _ => Err(ParseError::InvalidPortType(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_type_from_str() {
        assert_eq!("cpu".parse::<PortType>().unwrap(), PortType::Cpu);
        assert_eq!("USER".parse::<PortType>().unwrap(), PortType::User);
        assert_eq!("unused".parse::<PortType>().unwrap(), PortType::Unused);
        assert!("phy".parse::<PortType>().is_err());
    }

    #[test]
    fn test_port_type_predicates() {
        assert!(PortType::Cpu.is_cpu());
        assert!(PortType::User.is_user());
        assert!(PortType::Unused.is_unused());
        assert!(!PortType::Dsa.is_unused());
    }

    #[test]
    fn test_port_type_display_roundtrip() {
        for ty in [PortType::Unused, PortType::Cpu, PortType::Dsa, PortType::User] {
            assert_eq!(ty.to_string().parse::<PortType>().unwrap(), ty);
        }
    }
}
