//! ethtool proxy installed on a DSA master.
//!
//! Register dumps, statistics and string tables reported by the master
//! are extended with the CPU port's view from the switch. Master entries
//! come first, switch entries follow; switch string names get a `pNN_`
//! prefix naming the CPU port.

use std::sync::Arc;

use dsa_switch::{DsaError, DsaResult, DsaResultExt};
use dsa_types::ethtool::encode_drvinfo;
use dsa_types::{EthtoolRegs, StringSet, DRVINFO_LEN, ETH_GSTRING_LEN, REGS_HEADER_LEN};

use crate::netdev::{DrvInfo, EthtoolOps, MasterDevice, PhyDevice};
use crate::tree::DsaPort;

/// Driver name reported in the embedded drvinfo record.
pub const DSA_DRIVER_NAME: &str = "dsa";

/// Length of the per-port string prefix, `pNN_`.
const PORT_PREFIX_LEN: usize = 4;

/// ethtool operations of a DSA master.
pub struct EthtoolProxy {
    orig: Arc<dyn EthtoolOps>,
    cpu_port: Arc<DsaPort>,
}

impl EthtoolProxy {
    pub fn new(orig: Arc<dyn EthtoolOps>, cpu_port: Arc<DsaPort>) -> Self {
        Self { orig, cpu_port }
    }

    /// The operations table this proxy wraps.
    pub fn original(&self) -> &Arc<dyn EthtoolOps> {
        &self.orig
    }

    fn port(&self) -> usize {
        self.cpu_port.index()
    }

    /// Statistics for PHY counters come from the attached PHY when the
    /// master's own table does not provide them.
    fn phy_source(&self, dev: &MasterDevice, set: StringSet) -> Option<Arc<dyn PhyDevice>> {
        if set == StringSet::PhyStats && !self.orig.provides_phy_stats() {
            dev.phydev()
        } else {
            None
        }
    }

    /// Number of entries the master contributes to `set`. Errors count as
    /// zero entries.
    fn master_count(&self, dev: &MasterDevice, set: StringSet) -> usize {
        let count = match self.phy_source(dev, set) {
            Some(phy) => phy.sset_count(),
            None => self.orig.get_sset_count(dev, set),
        };
        count.unwrap_or(0)
    }

    fn switch_count(&self, set: StringSet) -> DsaResult<usize> {
        Ok(self
            .cpu_port
            .switch()
            .ops()
            .get_sset_count(self.port(), set)
            .supported()?
            .unwrap_or(0))
    }

    /// Writes the combined register dump and returns the number of bytes
    /// written, which always equals [`EthtoolOps::get_regs_len`].
    ///
    /// Layout: master dump, drvinfo record, CPU port regs header, CPU port
    /// dump. A region whose length was reported but whose dump operation is
    /// missing is left zeroed.
    pub fn dump_regs(
        &self,
        dev: &MasterDevice,
        regs: &mut EthtoolRegs,
        data: &mut [u8],
    ) -> DsaResult<usize> {
        let mut cursor = 0;

        if let Some(len) = self.orig.get_regs_len(dev).supported()? {
            let region = region_mut(data, cursor, len)?;
            region.fill(0);
            let mut master_regs = EthtoolRegs {
                len: wire_len(len)?,
                ..*regs
            };
            self.orig.get_regs(dev, &mut master_regs, region).supported()?;
            regs.version = master_regs.version;
            cursor += len;
        }

        encode_drvinfo(DSA_DRIVER_NAME, region_mut(data, cursor, DRVINFO_LEN)?);
        cursor += DRVINFO_LEN;

        let header_at = cursor;
        region_mut(data, header_at, REGS_HEADER_LEN)?;
        cursor += REGS_HEADER_LEN;

        let ds = self.cpu_port.switch().ops();
        let mut cpu_regs = EthtoolRegs::default();
        if let Some(len) = ds.get_regs_len(self.port()).supported()? {
            let region = region_mut(data, cursor, len)?;
            region.fill(0);
            cpu_regs.len = wire_len(len)?;
            ds.get_regs(self.port(), &mut cpu_regs, region).supported()?;
            cursor += len;
        }
        cpu_regs.encode(region_mut(data, header_at, REGS_HEADER_LEN)?);

        regs.len = wire_len(cursor)?;
        Ok(cursor)
    }
}

/// Converts a dump length to the 32-bit field of `struct ethtool_regs`.
fn wire_len(len: usize) -> DsaResult<u32> {
    u32::try_from(len).map_err(|_| {
        DsaError::invalid_argument(format!("register dump of {len} bytes exceeds 32 bits"))
    })
}

fn region_mut(data: &mut [u8], at: usize, len: usize) -> DsaResult<&mut [u8]> {
    let end = at.checked_add(len);
    match end {
        Some(end) if end <= data.len() => Ok(&mut data[at..end]),
        _ => Err(DsaError::invalid_argument(format!(
            "buffer of {} bytes too short for {} bytes at {}",
            data.len(),
            len,
            at
        ))),
    }
}

fn split_at_checked<T>(data: &mut [T], mid: usize) -> DsaResult<(&mut [T], &mut [T])> {
    if mid > data.len() {
        return Err(DsaError::invalid_argument(format!(
            "buffer of {} entries too short for {}",
            data.len(),
            mid
        )));
    }
    Ok(data.split_at_mut(mid))
}

/// Returns the `pNN_` prefix for `port`, truncated to three characters
/// before the separator.
pub fn port_prefix(port: usize) -> [u8; PORT_PREFIX_LEN] {
    let text = format!("p{port:02}");
    let b = text.as_bytes();
    [b[0], b[1], b[2], b'_']
}

/// Shifts each of the first `count` string slots right by the prefix
/// length and writes `prefix` in front. Text pushed past the slot end is
/// dropped.
fn prefix_strings(data: &mut [u8], count: usize, prefix: [u8; PORT_PREFIX_LEN]) {
    for slot in data.chunks_exact_mut(ETH_GSTRING_LEN).take(count) {
        slot.copy_within(0..ETH_GSTRING_LEN - PORT_PREFIX_LEN, PORT_PREFIX_LEN);
        slot[..PORT_PREFIX_LEN].copy_from_slice(&prefix);
    }
}

impl EthtoolOps for EthtoolProxy {
    fn get_drvinfo(&self, dev: &MasterDevice) -> DsaResult<DrvInfo> {
        self.orig.get_drvinfo(dev)
    }

    fn get_link(&self, dev: &MasterDevice) -> DsaResult<bool> {
        self.orig.get_link(dev)
    }

    fn get_regs_len(&self, dev: &MasterDevice) -> DsaResult<usize> {
        let mut len = DRVINFO_LEN + REGS_HEADER_LEN;
        if let Some(master) = self.orig.get_regs_len(dev).supported()? {
            len += master;
        }
        if let Some(cpu) = self
            .cpu_port
            .switch()
            .ops()
            .get_regs_len(self.port())
            .supported()?
        {
            len += cpu;
        }
        Ok(len)
    }

    fn get_regs(&self, dev: &MasterDevice, regs: &mut EthtoolRegs, data: &mut [u8]) -> DsaResult<()> {
        self.dump_regs(dev, regs, data).map(|_| ())
    }

    fn get_sset_count(&self, dev: &MasterDevice, set: StringSet) -> DsaResult<usize> {
        Ok(self.master_count(dev, set) + self.switch_count(set)?)
    }

    fn get_strings(&self, dev: &MasterDevice, set: StringSet, data: &mut [u8]) -> DsaResult<()> {
        let count = self.master_count(dev, set);
        let (master, rest) = split_at_checked(data, count * ETH_GSTRING_LEN)?;
        if count > 0 {
            match self.phy_source(dev, set) {
                Some(phy) => phy.get_strings(master)?,
                None => {
                    self.orig.get_strings(dev, set, master).supported()?;
                }
            }
        }

        let ds = self.cpu_port.switch().ops();
        if ds.get_strings(self.port(), set, rest).supported()?.is_none() {
            return Ok(());
        }
        let cpu_count = ds
            .get_sset_count(self.port(), set)
            .supported()?
            .unwrap_or(0);
        prefix_strings(rest, cpu_count, port_prefix(self.port()));
        Ok(())
    }

    fn get_ethtool_stats(&self, dev: &MasterDevice, data: &mut [u64]) -> DsaResult<()> {
        let count = self.master_count(dev, StringSet::Stats);
        let (master, rest) = split_at_checked(data, count)?;
        if count > 0 {
            self.orig.get_ethtool_stats(dev, master).supported()?;
        }
        self.cpu_port
            .switch()
            .ops()
            .get_ethtool_stats(self.port(), rest)
            .supported()?;
        Ok(())
    }

    fn get_ethtool_phy_stats(&self, dev: &MasterDevice, data: &mut [u64]) -> DsaResult<()> {
        let count = self.master_count(dev, StringSet::PhyStats);
        let (master, rest) = split_at_checked(data, count)?;
        if count > 0 {
            match self.phy_source(dev, StringSet::PhyStats) {
                Some(phy) => phy.get_stats(master)?,
                None => {
                    self.orig.get_ethtool_phy_stats(dev, master).supported()?;
                }
            }
        }
        self.cpu_port
            .switch()
            .ops()
            .get_ethtool_phy_stats(self.port(), rest)
            .supported()?;
        Ok(())
    }

    fn provides_phy_stats(&self) -> bool {
        true
    }
}
