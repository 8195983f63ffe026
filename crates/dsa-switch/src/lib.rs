//! Switch driver interface for the DSA master-port layer.
//!
//! A switch chip driver plugs into the master-port layer by implementing
//! [`DsaSwitchOps`]. Every operation except tag protocol negotiation is
//! optional: the default implementation reports [`DsaError::NotSupported`],
//! and callers treat that as "this switch contributes nothing".
//!
//! # Modules
//!
//! - [`error`]: Error taxonomy and errno mapping
//! - [`ops`]: The switch operation trait
//! - [`regs`]: Raw register addressing and widths
//! - [`hwtstamp`]: Hardware timestamping configuration
//!
//! # Example
//!
//! ```
//! use dsa_switch::{DsaResult, DsaSwitchOps};
//! use dsa_types::TagProtocol;
//!
//! struct Bcm53128;
//!
//! impl DsaSwitchOps for Bcm53128 {
//!     fn get_tag_protocol(&self, _port: usize, _master: TagProtocol) -> TagProtocol {
//!         TagProtocol::Brcm
//!     }
//!
//!     fn port_get_pvlan(&self, _port: usize) -> DsaResult<u16> {
//!         Ok(0x1ff)
//!     }
//! }
//! ```

pub mod error;
pub mod hwtstamp;
pub mod ops;
pub mod regs;

pub use error::{errno, DsaError, DsaResult, DsaResultExt};
pub use hwtstamp::HwTstampConfig;
pub use ops::DsaSwitchOps;
pub use regs::{RegWidth, RegisterSelect, RegisterValue};
