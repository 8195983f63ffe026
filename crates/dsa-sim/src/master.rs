//! Simulated master driver support: ethtool, ioctl and an attached PHY.

use dsa_master::{DrvInfo, EthIoctl, EthtoolOps, IfReq, IoctlCmd, MasterDevice, PhyDevice};
use dsa_switch::{DsaError, DsaResult, HwTstampConfig};
use dsa_types::{EthtoolRegs, StringSet};
use parking_lot::Mutex;

use crate::{counters, write_names, write_values, Counters};

/// ethtool support of a simulated Ethernet MAC.
#[derive(Debug, Default)]
pub struct SimEthtool {
    driver: String,
    regs: Option<(u32, Vec<u8>)>,
    stats: Option<Counters>,
    phy_stats: Option<Counters>,
}

impl SimEthtool {
    pub fn new(driver: impl Into<String>) -> Self {
        Self {
            driver: driver.into(),
            ..Self::default()
        }
    }

    pub fn with_regs(mut self, version: u32, data: Vec<u8>) -> Self {
        self.regs = Some((version, data));
        self
    }

    pub fn with_stats<S: AsRef<str>>(mut self, entries: &[(S, u64)]) -> Self {
        self.stats = Some(counters(entries));
        self
    }

    /// PHY counters reported by the MAC driver itself.
    pub fn with_phy_stats<S: AsRef<str>>(mut self, entries: &[(S, u64)]) -> Self {
        self.phy_stats = Some(counters(entries));
        self
    }

    fn counters_for(&self, set: StringSet) -> Option<&Counters> {
        match set {
            StringSet::Stats => self.stats.as_ref(),
            StringSet::PhyStats => self.phy_stats.as_ref(),
            _ => None,
        }
    }
}

impl EthtoolOps for SimEthtool {
    fn get_drvinfo(&self, _dev: &MasterDevice) -> DsaResult<DrvInfo> {
        Ok(DrvInfo {
            driver: self.driver.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            bus_info: String::new(),
        })
    }

    fn get_link(&self, _dev: &MasterDevice) -> DsaResult<bool> {
        Ok(true)
    }

    fn get_regs_len(&self, _dev: &MasterDevice) -> DsaResult<usize> {
        self.regs
            .as_ref()
            .map(|(_, data)| data.len())
            .ok_or_else(|| DsaError::not_supported("get_regs_len"))
    }

    fn get_regs(&self, _dev: &MasterDevice, regs: &mut EthtoolRegs, data: &mut [u8]) -> DsaResult<()> {
        let (version, dump) = self
            .regs
            .as_ref()
            .ok_or_else(|| DsaError::not_supported("get_regs"))?;
        let n = dump.len().min(data.len());
        data[..n].copy_from_slice(&dump[..n]);
        regs.version = *version;
        Ok(())
    }

    fn get_sset_count(&self, _dev: &MasterDevice, set: StringSet) -> DsaResult<usize> {
        self.counters_for(set)
            .map(Vec::len)
            .ok_or_else(|| DsaError::not_supported(format!("sset {set}")))
    }

    fn get_strings(&self, _dev: &MasterDevice, set: StringSet, data: &mut [u8]) -> DsaResult<()> {
        let entries = self
            .counters_for(set)
            .ok_or_else(|| DsaError::not_supported(format!("strings {set}")))?;
        write_names(entries, data)
    }

    fn get_ethtool_stats(&self, _dev: &MasterDevice, data: &mut [u64]) -> DsaResult<()> {
        let entries = self
            .stats
            .as_ref()
            .ok_or_else(|| DsaError::not_supported("get_ethtool_stats"))?;
        write_values(entries, data)
    }

    fn get_ethtool_phy_stats(&self, _dev: &MasterDevice, data: &mut [u64]) -> DsaResult<()> {
        let entries = self
            .phy_stats
            .as_ref()
            .ok_or_else(|| DsaError::not_supported("get_ethtool_phy_stats"))?;
        write_values(entries, data)
    }

    fn provides_phy_stats(&self) -> bool {
        self.phy_stats.is_some()
    }
}

/// A PHY exposing its own counters.
#[derive(Debug, Default)]
pub struct SimPhy {
    stats: Counters,
}

impl SimPhy {
    pub fn new<S: AsRef<str>>(entries: &[(S, u64)]) -> Self {
        Self {
            stats: counters(entries),
        }
    }
}

impl PhyDevice for SimPhy {
    fn sset_count(&self) -> DsaResult<usize> {
        Ok(self.stats.len())
    }

    fn get_strings(&self, data: &mut [u8]) -> DsaResult<()> {
        write_names(&self.stats, data)
    }

    fn get_stats(&self, data: &mut [u64]) -> DsaResult<()> {
        write_values(&self.stats, data)
    }
}

/// ioctl support of a simulated MAC with its own timestamping unit.
#[derive(Debug, Default)]
pub struct SimIoctl {
    config: Mutex<HwTstampConfig>,
    calls: Mutex<Vec<u32>>,
}

impl SimIoctl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw command codes received so far.
    pub fn calls(&self) -> Vec<u32> {
        self.calls.lock().clone()
    }

    pub fn config(&self) -> HwTstampConfig {
        *self.config.lock()
    }
}

impl EthIoctl for SimIoctl {
    fn eth_ioctl(&self, _dev: &MasterDevice, req: &mut IfReq, cmd: IoctlCmd) -> DsaResult<()> {
        self.calls.lock().push(cmd.raw());
        match cmd {
            IoctlCmd::GetHwTstamp => {
                req.hwtstamp = *self.config.lock();
                Ok(())
            }
            IoctlCmd::SetHwTstamp => {
                *self.config.lock() = req.hwtstamp;
                Ok(())
            }
            IoctlCmd::Other(raw) => Err(DsaError::not_supported(format!("ioctl {raw:#x}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dsa_types::ethtool::gstring_to_str;
    use dsa_types::ETH_GSTRING_LEN;

    #[test]
    fn test_ethtool_counters() {
        let dev = MasterDevice::builder("eth0").build();
        let ops = SimEthtool::new("sim-mac").with_stats(&[("rx_packets", 3), ("tx_packets", 4)]);
        assert_eq!(ops.get_sset_count(&dev, StringSet::Stats).unwrap(), 2);
        assert!(ops.get_sset_count(&dev, StringSet::PhyStats).is_err());
        assert!(!ops.provides_phy_stats());

        let mut names = vec![0u8; 2 * ETH_GSTRING_LEN];
        ops.get_strings(&dev, StringSet::Stats, &mut names).unwrap();
        assert_eq!(gstring_to_str(&names[ETH_GSTRING_LEN..]), "tx_packets");

        let mut values = [0u64; 2];
        ops.get_ethtool_stats(&dev, &mut values).unwrap();
        assert_eq!(values, [3, 4]);
    }

    #[test]
    fn test_ioctl_roundtrips_config() {
        let dev = MasterDevice::builder("eth0").build();
        let ioctl = SimIoctl::new();
        let mut req = IfReq::new("eth0");
        req.hwtstamp.tx_type = HwTstampConfig::TX_ON;
        ioctl.eth_ioctl(&dev, &mut req, IoctlCmd::SetHwTstamp).unwrap();
        assert!(ioctl.config().is_enabled());
        assert_eq!(ioctl.calls(), vec![IoctlCmd::SIOCSHWTSTAMP]);
    }
}
