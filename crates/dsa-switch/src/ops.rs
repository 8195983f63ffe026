//! The switch operation table.

use crate::error::{DsaError, DsaResult};
use crate::hwtstamp::HwTstampConfig;
use crate::regs::{RegisterSelect, RegisterValue};
use dsa_types::{EthtoolRegs, StringSet, TagProtocol};

/// Operations a switch driver exposes to the master-port layer.
///
/// `port` is the 0-based index of a port within this switch. Only
/// [`DsaSwitchOps::get_tag_protocol`] is mandatory; every other method
/// defaults to [`DsaError::NotSupported`].
///
/// # Thread Safety
///
/// The network stack calls into the switch from arbitrary threads, so
/// implementations must be `Send + Sync` and do their own locking.
pub trait DsaSwitchOps: Send + Sync {
    /// Returns the tagging protocol the switch uses on `port`.
    ///
    /// `master_proto` is the protocol the master side would prefer;
    /// [`TagProtocol::None`] means "don't care".
    fn get_tag_protocol(&self, port: usize, master_proto: TagProtocol) -> TagProtocol;

    /// Switches `port` to a different tagging protocol.
    fn change_tag_protocol(&self, _port: usize, _proto: TagProtocol) -> DsaResult<()> {
        Err(DsaError::not_supported("change_tag_protocol"))
    }

    /// Length of the register dump for `port`.
    fn get_regs_len(&self, _port: usize) -> DsaResult<usize> {
        Err(DsaError::not_supported("get_regs_len"))
    }

    /// Dumps the registers of `port` into `data` and fills in `regs`.
    ///
    /// `data` is exactly `get_regs_len(port)` bytes long.
    fn get_regs(&self, _port: usize, _regs: &mut EthtoolRegs, _data: &mut [u8]) -> DsaResult<()> {
        Err(DsaError::not_supported("get_regs"))
    }

    /// Number of entries in string set `set` for `port`.
    fn get_sset_count(&self, _port: usize, _set: StringSet) -> DsaResult<usize> {
        Err(DsaError::not_supported("get_sset_count"))
    }

    /// Writes the names of string set `set` as consecutive
    /// `ETH_GSTRING_LEN` slots.
    fn get_strings(&self, _port: usize, _set: StringSet, _data: &mut [u8]) -> DsaResult<()> {
        Err(DsaError::not_supported("get_strings"))
    }

    /// Writes the statistics of `port` in string-set order.
    fn get_ethtool_stats(&self, _port: usize, _data: &mut [u64]) -> DsaResult<()> {
        Err(DsaError::not_supported("get_ethtool_stats"))
    }

    /// Writes the PHY statistics of `port`.
    fn get_ethtool_phy_stats(&self, _port: usize, _data: &mut [u64]) -> DsaResult<()> {
        Err(DsaError::not_supported("get_ethtool_phy_stats"))
    }

    /// Reads the port-based VLAN membership mask of `port`.
    fn port_get_pvlan(&self, _port: usize) -> DsaResult<u16> {
        Err(DsaError::not_supported("port_get_pvlan"))
    }

    /// Sets the port-based VLAN membership mask of `port`.
    fn port_change_pvlan(&self, _port: usize, _members: u16) -> DsaResult<()> {
        Err(DsaError::not_supported("port_change_pvlan"))
    }

    /// Reads the register latched by the last
    /// [`DsaSwitchOps::switch_setup_get_reg`].
    fn switch_get_reg(&self) -> DsaResult<RegisterValue> {
        Err(DsaError::not_supported("switch_get_reg"))
    }

    /// Latches which register the next [`DsaSwitchOps::switch_get_reg`]
    /// reads.
    fn switch_setup_get_reg(&self, _select: RegisterSelect) -> DsaResult<()> {
        Err(DsaError::not_supported("switch_setup_get_reg"))
    }

    /// Writes a register immediately.
    fn switch_set_reg(&self, _select: RegisterSelect, _value: u64) -> DsaResult<()> {
        Err(DsaError::not_supported("switch_set_reg"))
    }

    /// Reads the timestamping configuration of `port`.
    fn port_hwtstamp_get(&self, _port: usize) -> DsaResult<HwTstampConfig> {
        Err(DsaError::not_supported("port_hwtstamp_get"))
    }

    /// Applies a timestamping configuration to `port`.
    fn port_hwtstamp_set(&self, _port: usize, _config: HwTstampConfig) -> DsaResult<HwTstampConfig> {
        Err(DsaError::not_supported("port_hwtstamp_set"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MinimalSwitch;

    impl DsaSwitchOps for MinimalSwitch {
        fn get_tag_protocol(&self, _port: usize, _master: TagProtocol) -> TagProtocol {
            TagProtocol::Edsa
        }
    }

    #[test]
    fn test_optional_ops_default_to_not_supported() {
        let sw = MinimalSwitch;
        assert_eq!(sw.get_tag_protocol(0, TagProtocol::None), TagProtocol::Edsa);
        assert!(sw.get_regs_len(0).unwrap_err().is_not_supported());
        assert!(sw.get_sset_count(0, StringSet::Stats).unwrap_err().is_not_supported());
        assert!(sw.port_get_pvlan(0).unwrap_err().is_not_supported());
        assert!(sw.switch_get_reg().unwrap_err().is_not_supported());
        assert!(sw
            .change_tag_protocol(0, TagProtocol::Dsa)
            .unwrap_err()
            .is_not_supported());
        assert!(sw.port_hwtstamp_get(0).unwrap_err().is_not_supported());
    }
}
