//! Common types for the DSA master-port layer.
//!
//! This crate provides the small value types shared by the switch
//! abstraction and the master orchestration layer:
//!
//! - [`PortType`]: Switch port classifications (cpu, user, unused, dsa link)
//! - [`TagProtocol`]: Tagging protocol identifiers
//! - [`StringSet`]: ethtool string/statistic set identifiers
//! - [`ethtool`]: Fixed ethtool record sizes and encoders

pub mod ethtool;
mod port;
mod tag;

pub use ethtool::{EthtoolRegs, StringSet, DRVINFO_LEN, ETH_GSTRING_LEN, REGS_HEADER_LEN};
pub use port::PortType;
pub use tag::TagProtocol;

/// Common error type for parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid port type: {0}")]
    InvalidPortType(String),

    #[error("invalid tag protocol: {0}")]
    InvalidTagProtocol(String),

    #[error("invalid string set: {0}")]
    InvalidStringSet(String),
}
