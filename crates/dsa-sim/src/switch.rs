//! Simulated switch chip.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use dsa_switch::{
    DsaError, DsaResult, DsaSwitchOps, HwTstampConfig, RegWidth, RegisterSelect, RegisterValue,
};
use dsa_types::{EthtoolRegs, StringSet, TagProtocol};
use parking_lot::Mutex;
use tracing::trace;

use crate::{counters, write_names, write_values, Counters};

#[derive(Debug, Clone)]
struct PortRegs {
    version: u32,
    data: Vec<u8>,
}

#[derive(Debug)]
struct RegisterFile {
    values: HashMap<(u8, u8), u64>,
    select: RegisterSelect,
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self {
            values: HashMap::new(),
            select: RegisterSelect::new(0, 0, 1),
        }
    }
}

#[derive(Debug, Default)]
struct SwitchState {
    port_tags: HashMap<usize, TagProtocol>,
    tag_changes: Vec<(usize, TagProtocol)>,
    pvlan: Option<BTreeMap<usize, u16>>,
    registers: Option<RegisterFile>,
    hwtstamp: HashMap<usize, HwTstampConfig>,
}

/// A switch chip held entirely in memory.
///
/// Optional capabilities are off until enabled with the `with_*`
/// methods; a disabled capability answers `NotSupported`.
#[derive(Debug)]
pub struct SimSwitch {
    preferred: TagProtocol,
    tag_change: bool,
    refused: BTreeSet<TagProtocol>,
    io_faults: BTreeSet<usize>,
    regs: HashMap<usize, PortRegs>,
    stats: HashMap<usize, Counters>,
    phy_stats: HashMap<usize, Counters>,
    state: Mutex<SwitchState>,
}

impl SimSwitch {
    pub fn new(preferred: TagProtocol) -> Self {
        Self {
            preferred,
            tag_change: false,
            refused: BTreeSet::new(),
            io_faults: BTreeSet::new(),
            regs: HashMap::new(),
            stats: HashMap::new(),
            phy_stats: HashMap::new(),
            state: Mutex::new(SwitchState::default()),
        }
    }

    /// Accept tag protocol changes on any port.
    pub fn with_tag_change(mut self) -> Self {
        self.tag_change = true;
        self
    }

    /// Fail changes to `proto` with an I/O error.
    pub fn refuse_tag(mut self, proto: TagProtocol) -> Self {
        self.tag_change = true;
        self.refused.insert(proto);
        self
    }

    /// Fail register dump and counter queries on `port` with an I/O
    /// error.
    pub fn with_io_fault(mut self, port: usize) -> Self {
        self.io_faults.insert(port);
        self
    }

    pub fn with_regs(mut self, port: usize, version: u32, data: Vec<u8>) -> Self {
        self.regs.insert(port, PortRegs { version, data });
        self
    }

    pub fn with_stats<S: AsRef<str>>(mut self, port: usize, entries: &[(S, u64)]) -> Self {
        self.stats.insert(port, counters(entries));
        self
    }

    pub fn with_phy_stats<S: AsRef<str>>(mut self, port: usize, entries: &[(S, u64)]) -> Self {
        self.phy_stats.insert(port, counters(entries));
        self
    }

    /// Enable the PVLAN table with initial membership masks.
    pub fn with_pvlan(self, entries: &[(usize, u16)]) -> Self {
        self.state.lock().pvlan = Some(entries.iter().copied().collect());
        self
    }

    /// Enable raw register access. The selection starts at page 0,
    /// register 0, width 1.
    pub fn with_registers(self) -> Self {
        self.state.lock().registers = Some(RegisterFile::default());
        self
    }

    /// Make `port` answer hardware timestamping requests.
    pub fn with_hwtstamp(self, port: usize) -> Self {
        self.state
            .lock()
            .hwtstamp
            .insert(port, HwTstampConfig::default());
        self
    }

    /// Tag protocol changes accepted so far, as (port, protocol).
    pub fn tag_changes(&self) -> Vec<(usize, TagProtocol)> {
        self.state.lock().tag_changes.clone()
    }

    pub fn pvlan(&self, port: usize) -> Option<u16> {
        self.state
            .lock()
            .pvlan
            .as_ref()
            .and_then(|table| table.get(&port).copied())
    }

    /// Raw register content, if register access is enabled.
    pub fn register(&self, page: u8, reg: u8) -> Option<u64> {
        self.state
            .lock()
            .registers
            .as_ref()
            .map(|file| file.values.get(&(page, reg)).copied().unwrap_or(0))
    }

    pub fn set_register(&self, page: u8, reg: u8, value: u64) {
        if let Some(file) = self.state.lock().registers.as_mut() {
            file.values.insert((page, reg), value);
        }
    }

    fn check_fault(&self, port: usize, op: &str) -> DsaResult<()> {
        if self.io_faults.contains(&port) {
            return Err(DsaError::io(format!("{op} on port {port} timed out")));
        }
        Ok(())
    }

    fn counters_for(&self, port: usize, set: StringSet) -> DsaResult<Option<&Counters>> {
        self.check_fault(port, "counter read")?;
        match set {
            StringSet::Stats => self
                .stats
                .get(&port)
                .map(Some)
                .ok_or_else(|| DsaError::not_supported("stats")),
            StringSet::PhyStats => self
                .phy_stats
                .get(&port)
                .map(Some)
                .ok_or_else(|| DsaError::not_supported("phy stats")),
            _ => Ok(None),
        }
    }
}

impl DsaSwitchOps for SimSwitch {
    fn get_tag_protocol(&self, port: usize, _master_proto: TagProtocol) -> TagProtocol {
        self.state
            .lock()
            .port_tags
            .get(&port)
            .copied()
            .unwrap_or(self.preferred)
    }

    fn change_tag_protocol(&self, port: usize, proto: TagProtocol) -> DsaResult<()> {
        if !self.tag_change {
            return Err(DsaError::not_supported("change_tag_protocol"));
        }
        if self.refused.contains(&proto) {
            return Err(DsaError::io(format!("port {port} cannot speak {proto}")));
        }
        let mut state = self.state.lock();
        state.port_tags.insert(port, proto);
        state.tag_changes.push((port, proto));
        Ok(())
    }

    fn get_regs_len(&self, port: usize) -> DsaResult<usize> {
        self.check_fault(port, "get_regs_len")?;
        self.regs
            .get(&port)
            .map(|r| r.data.len())
            .ok_or_else(|| DsaError::not_supported("get_regs_len"))
    }

    fn get_regs(&self, port: usize, regs: &mut EthtoolRegs, data: &mut [u8]) -> DsaResult<()> {
        self.check_fault(port, "get_regs")?;
        let port_regs = self
            .regs
            .get(&port)
            .ok_or_else(|| DsaError::not_supported("get_regs"))?;
        let n = port_regs.data.len().min(data.len());
        data[..n].copy_from_slice(&port_regs.data[..n]);
        regs.version = port_regs.version;
        Ok(())
    }

    fn get_sset_count(&self, port: usize, set: StringSet) -> DsaResult<usize> {
        Ok(self.counters_for(port, set)?.map_or(0, Vec::len))
    }

    fn get_strings(&self, port: usize, set: StringSet, data: &mut [u8]) -> DsaResult<()> {
        match self.counters_for(port, set)? {
            Some(entries) => write_names(entries, data),
            None => Ok(()),
        }
    }

    fn get_ethtool_stats(&self, port: usize, data: &mut [u64]) -> DsaResult<()> {
        match self.counters_for(port, StringSet::Stats)? {
            Some(entries) => write_values(entries, data),
            None => Ok(()),
        }
    }

    fn get_ethtool_phy_stats(&self, port: usize, data: &mut [u64]) -> DsaResult<()> {
        match self.counters_for(port, StringSet::PhyStats)? {
            Some(entries) => write_values(entries, data),
            None => Ok(()),
        }
    }

    fn port_get_pvlan(&self, port: usize) -> DsaResult<u16> {
        let state = self.state.lock();
        let table = state
            .pvlan
            .as_ref()
            .ok_or_else(|| DsaError::not_supported("port_get_pvlan"))?;
        Ok(table.get(&port).copied().unwrap_or(0))
    }

    fn port_change_pvlan(&self, port: usize, members: u16) -> DsaResult<()> {
        let mut state = self.state.lock();
        let table = state
            .pvlan
            .as_mut()
            .ok_or_else(|| DsaError::not_supported("port_change_pvlan"))?;
        table.insert(port, members);
        Ok(())
    }

    fn switch_get_reg(&self) -> DsaResult<RegisterValue> {
        let state = self.state.lock();
        let file = state
            .registers
            .as_ref()
            .ok_or_else(|| DsaError::not_supported("switch_get_reg"))?;
        let select = file.select;
        let raw = file
            .values
            .get(&(select.page, select.reg))
            .copied()
            .unwrap_or(0);
        Ok(RegisterValue::new(select.size, raw))
    }

    fn switch_setup_get_reg(&self, select: RegisterSelect) -> DsaResult<()> {
        let mut state = self.state.lock();
        let file = state
            .registers
            .as_mut()
            .ok_or_else(|| DsaError::not_supported("switch_setup_get_reg"))?;
        trace!(%select, "Selected register");
        file.select = select;
        Ok(())
    }

    fn switch_set_reg(&self, select: RegisterSelect, value: u64) -> DsaResult<()> {
        let mut state = self.state.lock();
        let file = state
            .registers
            .as_mut()
            .ok_or_else(|| DsaError::not_supported("switch_set_reg"))?;
        let width = RegWidth::from_size(select.size)?;
        trace!(%select, value, "Wrote register");
        file.values
            .insert((select.page, select.reg), width.truncate(value));
        Ok(())
    }

    fn port_hwtstamp_get(&self, port: usize) -> DsaResult<HwTstampConfig> {
        self.state
            .lock()
            .hwtstamp
            .get(&port)
            .copied()
            .ok_or_else(|| DsaError::not_supported("port_hwtstamp_get"))
    }

    fn port_hwtstamp_set(&self, port: usize, config: HwTstampConfig) -> DsaResult<HwTstampConfig> {
        let mut state = self.state.lock();
        let slot = state
            .hwtstamp
            .get_mut(&port)
            .ok_or_else(|| DsaError::not_supported("port_hwtstamp_set"))?;
        *slot = config;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_capabilities_off_by_default() {
        let sw = SimSwitch::new(TagProtocol::Brcm);
        assert_eq!(sw.get_tag_protocol(8, TagProtocol::None), TagProtocol::Brcm);
        assert!(sw.change_tag_protocol(8, TagProtocol::Dsa).unwrap_err().is_not_supported());
        assert!(sw.port_get_pvlan(0).unwrap_err().is_not_supported());
        assert!(sw.switch_get_reg().unwrap_err().is_not_supported());
        assert!(sw.port_hwtstamp_get(0).unwrap_err().is_not_supported());
        assert!(sw.get_sset_count(8, StringSet::Stats).unwrap_err().is_not_supported());
        assert_eq!(sw.get_sset_count(8, StringSet::Features).unwrap(), 0);
    }

    #[test]
    fn test_register_file_selection() {
        let sw = SimSwitch::new(TagProtocol::Brcm).with_registers();
        assert_eq!(sw.switch_get_reg().unwrap(), RegisterValue::new(1, 0));

        let select = RegisterSelect::new(0x10, 0x04, 2);
        sw.switch_set_reg(select, 0x1_beef).unwrap();
        sw.switch_setup_get_reg(select).unwrap();
        assert_eq!(sw.switch_get_reg().unwrap().to_hex().unwrap(), "beef");

        let odd = RegisterSelect::new(0, 0, 3);
        assert!(sw.switch_set_reg(odd, 1).is_err());
    }

    #[test]
    fn test_io_fault_on_one_port() {
        let sw = SimSwitch::new(TagProtocol::Brcm)
            .with_regs(8, 1, vec![0; 4])
            .with_stats(8, &[("rx_octets", 1)])
            .with_stats(0, &[("rx_octets", 2)])
            .with_io_fault(8);
        assert!(matches!(sw.get_regs_len(8), Err(DsaError::Io { .. })));
        assert!(matches!(
            sw.get_sset_count(8, StringSet::Stats),
            Err(DsaError::Io { .. })
        ));
        assert_eq!(sw.get_sset_count(0, StringSet::Stats).unwrap(), 1);
    }

    #[test]
    fn test_tag_changes_recorded() {
        let sw = SimSwitch::new(TagProtocol::Brcm).refuse_tag(TagProtocol::Mtk);
        sw.change_tag_protocol(8, TagProtocol::BrcmPrepend).unwrap();
        assert!(sw.change_tag_protocol(8, TagProtocol::Mtk).is_err());
        assert_eq!(sw.get_tag_protocol(8, TagProtocol::None), TagProtocol::BrcmPrepend);
        assert_eq!(sw.tag_changes(), vec![(8, TagProtocol::BrcmPrepend)]);
    }
}
