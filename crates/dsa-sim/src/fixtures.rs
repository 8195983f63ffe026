//! Ready-wired benches: a tree, a master device and a manager.

use std::sync::Arc;

use dsa_master::{
    DsaContext, DsaPort, DsaResult, MasterConfig, MasterDevice, MasterManager, SwitchTree,
    DSA_GROUP,
};
use dsa_types::{PortType, TagProtocol};

use crate::{SimEthtool, SimIoctl, SimPhy, SimSwitch};

/// Port of the CPU link in the default bench.
pub const CPU_PORT: usize = 8;

/// A switch with user ports 0-4, an unused port 5 and the CPU on port 8,
/// speaking `brcm`, with statistics, registers and a PVLAN table.
pub fn default_switch() -> SimSwitch {
    SimSwitch::new(TagProtocol::Brcm)
        .with_tag_change()
        .with_regs(CPU_PORT, 2, vec![0xa5; 8])
        .with_stats(CPU_PORT, &[("rx_octets", 1000), ("tx_octets", 2000)])
        .with_pvlan(&[(0, 0x1ff), (1, 0x1ff), (2, 0x1ff), (3, 0x1ff), (4, 0x1ff), (8, 0x1ff)])
        .with_registers()
}

/// MAC driver with a 16-byte register dump and two counters.
pub fn default_ethtool() -> SimEthtool {
    SimEthtool::new("sim-gmac")
        .with_regs(1, (0u8..16).collect())
        .with_stats(&[("rx_packets", 10), ("tx_packets", 20)])
}

/// A complete simulated system.
pub struct SimBench {
    pub manager: MasterManager,
    pub tree: Arc<SwitchTree>,
    pub switch: Arc<SimSwitch>,
    pub master: Arc<MasterDevice>,
    pub ioctl: Arc<SimIoctl>,
}

impl SimBench {
    pub fn builder() -> SimBenchBuilder {
        SimBenchBuilder::default()
    }

    /// The default bench, not yet attached.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn context(&self) -> &Arc<DsaContext> {
        self.manager.context()
    }

    pub fn cpu_port(&self) -> &Arc<DsaPort> {
        self.tree
            .cpu_ports()
            .next()
            .unwrap_or_else(|| panic!("bench tree has no CPU port"))
    }

    /// Binds the master to the CPU port.
    pub fn attach(&self) -> DsaResult<()> {
        self.manager.setup(&self.master, &self.tree, self.cpu_port())
    }

    pub fn detach(&self) -> DsaResult<()> {
        self.manager.teardown(&self.master)
    }

    pub fn show(&self, attr: &str) -> DsaResult<String> {
        self.master.attr_show(DSA_GROUP, attr)
    }

    pub fn store(&self, attr: &str, value: &str) -> DsaResult<usize> {
        self.master.attr_store(DSA_GROUP, attr, value)
    }
}

impl Default for SimBench {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for [`SimBench`].
pub struct SimBenchBuilder {
    ctx: Option<Arc<DsaContext>>,
    switch: SimSwitch,
    ethtool: Option<SimEthtool>,
    phy: Option<SimPhy>,
    ports: Vec<(usize, PortType)>,
    max_mtu: u32,
    parent: Option<String>,
    config: MasterConfig,
}

impl Default for SimBenchBuilder {
    fn default() -> Self {
        Self {
            ctx: None,
            switch: default_switch(),
            ethtool: Some(default_ethtool()),
            phy: None,
            ports: (0..5)
                .map(|i| (i, PortType::User))
                .chain([(5, PortType::Unused), (CPU_PORT, PortType::Cpu)])
                .collect(),
            max_mtu: 1536,
            parent: Some("gmac0".to_string()),
            config: MasterConfig::default(),
        }
    }
}

impl SimBenchBuilder {
    pub fn context(mut self, ctx: Arc<DsaContext>) -> Self {
        self.ctx = Some(ctx);
        self
    }

    pub fn switch(mut self, switch: SimSwitch) -> Self {
        self.switch = switch;
        self
    }

    /// Master driver ethtool support; `None` for a driver without any.
    pub fn ethtool(mut self, ethtool: Option<SimEthtool>) -> Self {
        self.ethtool = ethtool;
        self
    }

    pub fn phy(mut self, phy: SimPhy) -> Self {
        self.phy = Some(phy);
        self
    }

    pub fn ports(mut self, ports: &[(usize, PortType)]) -> Self {
        self.ports = ports.to_vec();
        self
    }

    pub fn max_mtu(mut self, max_mtu: u32) -> Self {
        self.max_mtu = max_mtu;
        self
    }

    pub fn parent(mut self, parent: Option<&str>) -> Self {
        self.parent = parent.map(str::to_string);
        self
    }

    pub fn config(mut self, config: MasterConfig) -> Self {
        self.config = config;
        self
    }

    /// # Panics
    ///
    /// Panics if the port list does not form a valid tree.
    pub fn build(self) -> SimBench {
        let ctx = self.ctx.unwrap_or_else(DsaContext::new);
        let switch = Arc::new(self.switch);
        let tree = self
            .ports
            .iter()
            .fold(
                SwitchTree::builder(0).switch("mdio_mux-0.1:00", switch.clone()),
                |b, &(index, kind)| b.port(0, index, kind),
            )
            .build(ctx.registry())
            .unwrap_or_else(|e| panic!("invalid bench tree: {e}"));

        let ioctl = Arc::new(SimIoctl::new());
        let mut master = MasterDevice::builder("eth0")
            .max_mtu(self.max_mtu)
            .eth_ioctl(ioctl.clone());
        if let Some(parent) = self.parent {
            master = master.parent(parent);
        }
        if let Some(ethtool) = self.ethtool {
            master = master.ethtool_ops(Arc::new(ethtool));
        }
        if let Some(phy) = self.phy {
            master = master.phy(Arc::new(phy));
        }

        SimBench {
            manager: MasterManager::new(ctx, self.config),
            tree,
            switch,
            master: master.build(),
            ioctl,
        }
    }
}
