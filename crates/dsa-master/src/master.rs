//! Binding a network device to a switch tree as its DSA master.
//!
//! [`MasterManager::setup`] turns a plain network device into the conduit
//! for a CPU port: it links the switch to the master's hardware, raises
//! the MTU to fit the tag, installs the ethtool proxy and ioctl
//! interceptor and publishes the `dsa` attribute group.
//! [`MasterManager::teardown`] reverses every step.

use std::fmt;
use std::sync::Arc;

use dsa_switch::{DsaError, DsaResult};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info, instrument, warn};

use crate::attrs::{AttributeGroup, DSA_GROUP};
use crate::clock_share::ClockShareLock;
use crate::device_link::{DeviceLink, DeviceLinks};
use crate::ethtool::EthtoolProxy;
use crate::ioctl::MasterIoctl;
use crate::netdev::{EthIoctl, EthtoolOps, MasterDevice, NetConfigLock, ETH_DATA_LEN};
use crate::tagger::TagRegistry;
use crate::tree::{DsaPort, SwitchTree};

/// Management port used by `tagging_imp` unless configured otherwise.
pub const DEFAULT_IMP_PORT: usize = 8;

/// Services shared by every master in the system.
#[derive(Debug)]
pub struct DsaContext {
    registry: Arc<TagRegistry>,
    net: Arc<NetConfigLock>,
    clock_share: Arc<ClockShareLock>,
    links: Arc<DeviceLinks>,
}

impl DsaContext {
    /// Context with every built-in tagger loaded.
    pub fn new() -> Arc<Self> {
        Self::with_parts(
            TagRegistry::with_builtin(),
            Arc::new(NetConfigLock::new()),
            Arc::new(ClockShareLock::new()),
        )
    }

    pub fn with_parts(
        registry: Arc<TagRegistry>,
        net: Arc<NetConfigLock>,
        clock_share: Arc<ClockShareLock>,
    ) -> Arc<Self> {
        Arc::new(Self {
            registry,
            net,
            clock_share,
            links: DeviceLinks::new(),
        })
    }

    pub fn registry(&self) -> &Arc<TagRegistry> {
        &self.registry
    }

    pub fn net(&self) -> &NetConfigLock {
        &self.net
    }

    pub fn clock_share(&self) -> &Arc<ClockShareLock> {
        &self.clock_share
    }

    pub fn links(&self) -> &Arc<DeviceLinks> {
        &self.links
    }
}

/// Per-master settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MasterConfig {
    /// Port addressed by `tagging_imp`.
    pub imp_port: usize,
}

impl Default for MasterConfig {
    fn default() -> Self {
        Self {
            imp_port: DEFAULT_IMP_PORT,
        }
    }
}

/// State a bound master keeps: the CPU port it serves and what setup
/// installed on it.
pub struct MasterBinding {
    cpu_port: Arc<DsaPort>,
    tree: Arc<SwitchTree>,
    ctx: Arc<DsaContext>,
    imp_port: usize,
    orig_ethtool: Mutex<Option<Arc<dyn EthtoolOps>>>,
    ioctl: RwLock<Option<Arc<dyn EthIoctl>>>,
    link: Mutex<Option<DeviceLink>>,
}

impl MasterBinding {
    pub fn cpu_port(&self) -> &Arc<DsaPort> {
        &self.cpu_port
    }

    pub fn tree(&self) -> &Arc<SwitchTree> {
        &self.tree
    }

    pub fn context(&self) -> &Arc<DsaContext> {
        &self.ctx
    }

    pub fn imp_port(&self) -> usize {
        self.imp_port
    }

    pub(crate) fn ioctl_handler(&self) -> Option<Arc<dyn EthIoctl>> {
        self.ioctl.read().clone()
    }

    /// True while the switch holds a link to the master's hardware.
    pub fn is_linked(&self) -> bool {
        self.link.lock().is_some()
    }
}

impl fmt::Debug for MasterBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MasterBinding")
            .field("cpu_port", &self.cpu_port)
            .field("tree", &self.tree.index())
            .field("imp_port", &self.imp_port)
            .finish_non_exhaustive()
    }
}

/// Binds and unbinds DSA masters.
#[derive(Debug, Clone)]
pub struct MasterManager {
    ctx: Arc<DsaContext>,
    config: MasterConfig,
}

impl MasterManager {
    pub fn new(ctx: Arc<DsaContext>, config: MasterConfig) -> Self {
        Self { ctx, config }
    }

    pub fn context(&self) -> &Arc<DsaContext> {
        &self.ctx
    }

    pub fn config(&self) -> &MasterConfig {
        &self.config
    }

    /// Makes `dev` the master of `cpu_port`.
    ///
    /// A failed device link or MTU change is logged and tolerated. Any
    /// later failure undoes the steps already taken and is returned.
    ///
    /// # Errors
    ///
    /// Returns [`DsaError::Busy`] if `dev` is already a master and
    /// [`DsaError::InvalidArgument`] if `cpu_port` is not a CPU port of
    /// `tree` with a tagger bound.
    #[instrument(skip_all, fields(master = dev.name(), port = cpu_port.index()))]
    pub fn setup(
        &self,
        dev: &Arc<MasterDevice>,
        tree: &Arc<SwitchTree>,
        cpu_port: &Arc<DsaPort>,
    ) -> DsaResult<()> {
        if !cpu_port.kind().is_cpu()
            || !tree.ports().iter().any(|dp| Arc::ptr_eq(dp, cpu_port))
        {
            return Err(DsaError::invalid_argument(format!(
                "port {} is not a CPU port of tree {}",
                cpu_port.index(),
                tree.index()
            )));
        }
        let tag = cpu_port.tag_ops().ok_or_else(|| {
            DsaError::invalid_argument(format!("CPU port {} has no tagger", cpu_port.index()))
        })?;

        let binding = Arc::new(MasterBinding {
            cpu_port: Arc::clone(cpu_port),
            tree: Arc::clone(tree),
            ctx: Arc::clone(&self.ctx),
            imp_port: self.config.imp_port,
            orig_ethtool: Mutex::new(None),
            ioctl: RwLock::new(None),
            link: Mutex::new(None),
        });
        dev.claim_dsa_binding(&binding)?;

        let switch_dev = cpu_port.switch().name();
        let link = self.ctx.links.add(switch_dev, dev.parent());
        if link.is_none() {
            error!(switch = switch_dev, supplier = ?dev.parent(),
                "Failed to create a device link to DSA switch");
        }
        *binding.link.lock() = link;

        let prior_mtu = dev.mtu();
        let mtu = ETH_DATA_LEN + tag.overhead() as u32;
        {
            let net = self.ctx.net.lock();
            if let Err(e) = dev.set_mtu(&net, mtu) {
                warn!(mtu, error = %e, "Unable to set MTU to include for DSA overheads");
            }
        }

        cpu_port.bind_master(Some(dev));

        if tag.promisc_on_master() {
            let net = self.ctx.net.lock();
            if let Err(e) = dev.set_promiscuity(&net, 1) {
                drop(net);
                self.unwind(dev, &binding, prior_mtu);
                return Err(e);
            }
        }

        install_ethtool(dev, &binding);
        *binding.ioctl.write() = Some(Arc::new(MasterIoctl::new(Arc::clone(tree))));

        if let Err(e) = dev.create_group(Arc::new(AttributeGroup::dsa())) {
            *binding.ioctl.write() = None;
            restore_ethtool(dev, &binding);
            if tag.promisc_on_master() {
                let net = self.ctx.net.lock();
                if let Err(pe) = dev.set_promiscuity(&net, -1) {
                    debug!(error = %pe, "Unable to drop promiscuity while unwinding");
                }
            }
            self.unwind(dev, &binding, prior_mtu);
            return Err(e);
        }

        info!(tagger = tag.name(), mtu = dev.mtu(), "DSA master ready");
        Ok(())
    }

    /// Returns `dev` to a plain network device.
    ///
    /// # Errors
    ///
    /// Returns [`DsaError::InvalidArgument`] if `dev` is not a master.
    #[instrument(skip_all, fields(master = dev.name()))]
    pub fn teardown(&self, dev: &Arc<MasterDevice>) -> DsaResult<()> {
        let binding = dev.dsa_binding().ok_or_else(|| {
            DsaError::invalid_argument(format!("{} is not a DSA master", dev.name()))
        })?;

        dev.remove_group(DSA_GROUP);
        *binding.ioctl.write() = None;
        restore_ethtool(dev, &binding);

        {
            let net = self.ctx.net.lock();
            if let Err(e) = dev.set_mtu(&net, ETH_DATA_LEN) {
                debug!(error = %e, "Unable to reset MTU to exclude DSA overheads");
            }
            if binding
                .cpu_port
                .tag_ops()
                .is_some_and(|tag| tag.promisc_on_master())
            {
                if let Err(e) = dev.set_promiscuity(&net, -1) {
                    debug!(error = %e, "Unable to drop promiscuity");
                }
            }
        }

        self.unbind(dev, &binding);
        info!("DSA master released");
        Ok(())
    }

    /// Undoes the binding and MTU change of a setup that failed.
    fn unwind(&self, dev: &MasterDevice, binding: &MasterBinding, mtu: u32) {
        self.unbind(dev, binding);
        let net = self.ctx.net.lock();
        if let Err(e) = dev.set_mtu(&net, mtu) {
            debug!(mtu, error = %e, "Unable to restore MTU while unwinding");
        }
    }

    /// Clears the binding and drops the device link.
    fn unbind(&self, dev: &MasterDevice, binding: &MasterBinding) {
        dev.release_dsa_binding(binding);
        binding.cpu_port.bind_master(None);
        binding.link.lock().take();
    }
}

fn install_ethtool(dev: &MasterDevice, binding: &MasterBinding) {
    let orig = dev.ethtool_ops();
    let proxy = EthtoolProxy::new(Arc::clone(&orig), Arc::clone(&binding.cpu_port));
    *binding.orig_ethtool.lock() = Some(orig);
    dev.replace_ethtool_ops(Arc::new(proxy));
}

fn restore_ethtool(dev: &MasterDevice, binding: &MasterBinding) {
    if let Some(orig) = binding.orig_ethtool.lock().take() {
        dev.replace_ethtool_ops(orig);
    }
}
