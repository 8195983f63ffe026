//! Assembles a simulated DSA system from configuration.

use std::sync::Arc;

use dsa_master::{
    DsaContext, DsaError, DsaPort, DsaResult, MasterConfig, MasterDevice, MasterManager,
    SwitchTree,
};
use dsa_sim::{SimEthtool, SimIoctl, SimPhy, SimSwitch};
use tracing::debug;

use crate::config::{DsactlConfig, SwitchSection};

/// Version reported in simulated per-port register dumps.
const SIM_REGS_VERSION: u32 = 1;

/// A tree, its master and the manager that binds them.
pub struct System {
    pub manager: MasterManager,
    pub tree: Arc<SwitchTree>,
    pub master: Arc<MasterDevice>,
    pub ioctl: Arc<SimIoctl>,
}

fn build_switch(section: &SwitchSection) -> SimSwitch {
    let mut switch = SimSwitch::new(section.tag_protocol);
    if section.tag_change {
        switch = switch.with_tag_change();
    }
    if section.registers {
        switch = switch.with_registers();
    }

    let pvlan: Vec<(usize, u16)> = section
        .ports
        .iter()
        .filter_map(|p| p.pvlan.map(|mask| (p.index, mask)))
        .collect();
    if !pvlan.is_empty() {
        switch = switch.with_pvlan(&pvlan);
    }

    for port in &section.ports {
        if port.hwtstamp {
            switch = switch.with_hwtstamp(port.index);
        }
        if !port.stats.is_empty() {
            let counters: Vec<(&str, u64)> = port.stats.iter().map(|s| (s.as_str(), 0)).collect();
            switch = switch.with_stats(port.index, &counters);
        }
        if port.kind.is_cpu() && section.regs_len > 0 {
            switch = switch.with_regs(port.index, SIM_REGS_VERSION, vec![0; section.regs_len]);
        }
    }
    switch
}

impl System {
    /// Builds the system described by `config`. Nothing is attached yet.
    pub fn build(config: &DsactlConfig) -> DsaResult<Self> {
        let ctx = DsaContext::new();

        let mut builder = SwitchTree::builder(0);
        for section in &config.switches {
            builder = builder.switch(section.name.clone(), Arc::new(build_switch(section)));
        }
        for (sw, section) in config.switches.iter().enumerate() {
            for port in &section.ports {
                debug!(switch = %section.name, port = port.index, kind = %port.kind,
                    name = ?port.name, "Adding port");
                builder = builder.port(sw, port.index, port.kind);
            }
        }
        if let Some(proto) = config.tag_protocol {
            builder = builder.tag_protocol(proto);
        }
        let tree = builder.build(ctx.registry())?;

        let ioctl = Arc::new(SimIoctl::new());
        let ethtool = SimEthtool::new(config.master.driver.clone())
            .with_stats(&[("rx_packets", 0), ("tx_packets", 0)]);
        let mut master = MasterDevice::builder(config.master.name.clone())
            .mtu(config.master.mtu)
            .max_mtu(config.master.max_mtu)
            .ethtool_ops(Arc::new(ethtool))
            .eth_ioctl(ioctl.clone());
        if let Some(parent) = &config.master.parent {
            master = master.parent(parent.clone());
        }
        if config.master.has_phy {
            master = master.phy(Arc::new(SimPhy::new(&[
                ("phy_receive_errors", 0),
                ("phy_idle_errors", 0),
            ])));
        }

        let manager = MasterManager::new(
            ctx,
            MasterConfig {
                imp_port: config.master.imp_port,
            },
        );
        Ok(Self {
            manager,
            tree,
            master: master.build(),
            ioctl,
        })
    }

    /// First CPU port of the tree.
    pub fn cpu_port(&self) -> Option<&Arc<DsaPort>> {
        self.tree.cpu_ports().next()
    }

    /// Binds the master to the first CPU port.
    pub fn attach(&self) -> DsaResult<()> {
        let cpu = self
            .cpu_port()
            .ok_or_else(|| DsaError::invalid_argument("tree has no CPU port"))?;
        self.manager.setup(&self.master, &self.tree, cpu)
    }

    pub fn detach(&self) -> DsaResult<()> {
        self.manager.teardown(&self.master)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dsa_types::TagProtocol;

    #[test]
    fn test_default_system_attaches() {
        let system = System::build(&DsactlConfig::default()).unwrap();
        system.attach().unwrap();
        assert!(system.master.is_dsa_master());
        assert_eq!(system.master.mtu(), 1504);
        assert_eq!(system.cpu_port().unwrap().index(), 8);
        system.detach().unwrap();
    }

    #[test]
    fn test_tag_override_applied() {
        let mut config = DsactlConfig::default();
        config.tag_protocol = Some(TagProtocol::BrcmPrepend);
        let system = System::build(&config).unwrap();
        assert_eq!(
            system.cpu_port().unwrap().tag_protocol(),
            Some(TagProtocol::BrcmPrepend)
        );
    }
}
