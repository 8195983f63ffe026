//! Network device model for the CPU-facing master interface.
//!
//! [`MasterDevice`] carries the pieces of a network device the DSA layer
//! touches: MTU and promiscuity counters, a swappable ethtool operations
//! table, the driver's private ioctl handler, an optional PHY, the
//! attribute groups exposed to userspace and the DSA binding.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use dsa_switch::{DsaError, DsaResult, HwTstampConfig};
use dsa_types::{EthtoolRegs, StringSet};
use parking_lot::{Mutex, RwLock, RwLockWriteGuard};

use crate::attrs::AttributeGroup;
use crate::master::MasterBinding;

/// Standard Ethernet payload size.
pub const ETH_DATA_LEN: u32 = 1500;

/// Serialises network configuration changes (MTU, promiscuity, tagging).
///
/// Operations that require the lock take a [`NetConfigGuard`] as proof
/// that it is held.
#[derive(Debug, Default)]
pub struct NetConfigLock {
    inner: RwLock<()>,
}

/// Proof that the [`NetConfigLock`] is held.
pub struct NetConfigGuard<'a> {
    lock: &'a NetConfigLock,
    _guard: RwLockWriteGuard<'a, ()>,
}

impl NetConfigGuard<'_> {
    /// Returns true if this guard was taken on `lock`.
    pub fn belongs_to(&self, lock: &NetConfigLock) -> bool {
        std::ptr::eq(self.lock, lock)
    }
}

impl NetConfigLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock(&self) -> NetConfigGuard<'_> {
        NetConfigGuard {
            lock: self,
            _guard: self.inner.write(),
        }
    }

    pub fn try_lock(&self) -> Option<NetConfigGuard<'_>> {
        self.inner
            .try_write()
            .map(|guard| NetConfigGuard {
                lock: self,
                _guard: guard,
            })
    }

    pub fn is_locked(&self) -> bool {
        self.inner.is_locked()
    }
}

/// Driver identification reported through `ETHTOOL_GDRVINFO`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrvInfo {
    pub driver: String,
    pub version: String,
    pub bus_info: String,
}

/// ethtool operations of a network device.
///
/// All operations are optional; the defaults report
/// [`DsaError::NotSupported`].
pub trait EthtoolOps: Send + Sync {
    fn get_drvinfo(&self, _dev: &MasterDevice) -> DsaResult<DrvInfo> {
        Err(DsaError::not_supported("get_drvinfo"))
    }

    fn get_link(&self, _dev: &MasterDevice) -> DsaResult<bool> {
        Err(DsaError::not_supported("get_link"))
    }

    fn get_regs_len(&self, _dev: &MasterDevice) -> DsaResult<usize> {
        Err(DsaError::not_supported("get_regs_len"))
    }

    fn get_regs(
        &self,
        _dev: &MasterDevice,
        _regs: &mut EthtoolRegs,
        _data: &mut [u8],
    ) -> DsaResult<()> {
        Err(DsaError::not_supported("get_regs"))
    }

    fn get_sset_count(&self, _dev: &MasterDevice, _set: StringSet) -> DsaResult<usize> {
        Err(DsaError::not_supported("get_sset_count"))
    }

    fn get_strings(&self, _dev: &MasterDevice, _set: StringSet, _data: &mut [u8]) -> DsaResult<()> {
        Err(DsaError::not_supported("get_strings"))
    }

    fn get_ethtool_stats(&self, _dev: &MasterDevice, _data: &mut [u64]) -> DsaResult<()> {
        Err(DsaError::not_supported("get_ethtool_stats"))
    }

    fn get_ethtool_phy_stats(&self, _dev: &MasterDevice, _data: &mut [u64]) -> DsaResult<()> {
        Err(DsaError::not_supported("get_ethtool_phy_stats"))
    }

    /// Whether this table implements [`EthtoolOps::get_ethtool_phy_stats`].
    ///
    /// When it does not, PHY statistics come from the attached PHY.
    fn provides_phy_stats(&self) -> bool {
        false
    }
}

/// Operations table of a device whose driver registers no ethtool support.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoEthtoolOps;

impl EthtoolOps for NoEthtoolOps {}

/// Statistics interface of a PHY attached to the master.
pub trait PhyDevice: Send + Sync {
    fn sset_count(&self) -> DsaResult<usize>;
    fn get_strings(&self, data: &mut [u8]) -> DsaResult<()>;
    fn get_stats(&self, data: &mut [u64]) -> DsaResult<()>;
}

/// Socket ioctl commands seen by the master.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoctlCmd {
    /// `SIOCSHWTSTAMP`
    SetHwTstamp,
    /// `SIOCGHWTSTAMP`
    GetHwTstamp,
    Other(u32),
}

impl IoctlCmd {
    pub const SIOCSHWTSTAMP: u32 = 0x89b0;
    pub const SIOCGHWTSTAMP: u32 = 0x89b1;

    pub fn from_raw(raw: u32) -> Self {
        match raw {
            Self::SIOCSHWTSTAMP => IoctlCmd::SetHwTstamp,
            Self::SIOCGHWTSTAMP => IoctlCmd::GetHwTstamp,
            other => IoctlCmd::Other(other),
        }
    }

    pub fn raw(&self) -> u32 {
        match self {
            IoctlCmd::SetHwTstamp => Self::SIOCSHWTSTAMP,
            IoctlCmd::GetHwTstamp => Self::SIOCGHWTSTAMP,
            IoctlCmd::Other(raw) => *raw,
        }
    }

    pub fn is_hwtstamp(&self) -> bool {
        matches!(self, IoctlCmd::SetHwTstamp | IoctlCmd::GetHwTstamp)
    }
}

/// Interface request passed along with an ioctl.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IfReq {
    pub name: String,
    pub hwtstamp: HwTstampConfig,
    pub data: Vec<u8>,
}

impl IfReq {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Device-private ioctl handler.
pub trait EthIoctl: Send + Sync {
    fn eth_ioctl(&self, dev: &MasterDevice, req: &mut IfReq, cmd: IoctlCmd) -> DsaResult<()>;
}

#[derive(Debug)]
struct DeviceState {
    mtu: u32,
    promiscuity: u32,
}

/// A network device acting (or about to act) as a DSA master.
pub struct MasterDevice {
    name: String,
    parent: Option<String>,
    max_mtu: u32,
    state: Mutex<DeviceState>,
    ethtool_ops: RwLock<Arc<dyn EthtoolOps>>,
    eth_ioctl: Option<Arc<dyn EthIoctl>>,
    phydev: RwLock<Option<Arc<dyn PhyDevice>>>,
    dsa_ptr: RwLock<Option<Arc<MasterBinding>>>,
    groups: Mutex<BTreeMap<&'static str, Arc<AttributeGroup>>>,
}

impl MasterDevice {
    pub fn builder(name: impl Into<String>) -> MasterDeviceBuilder {
        MasterDeviceBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the hardware device backing this interface.
    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    pub fn mtu(&self) -> u32 {
        self.state.lock().mtu
    }

    pub fn max_mtu(&self) -> u32 {
        self.max_mtu
    }

    pub fn promiscuity(&self) -> u32 {
        self.state.lock().promiscuity
    }

    /// Changes the MTU.
    ///
    /// # Errors
    ///
    /// Returns [`DsaError::InvalidArgument`] if `mtu` exceeds the device
    /// maximum.
    pub fn set_mtu(&self, net: &NetConfigGuard<'_>, mtu: u32) -> DsaResult<()> {
        self.debug_check_guard(net);
        if mtu > self.max_mtu {
            return Err(DsaError::invalid_argument(format!(
                "{}: MTU {} exceeds maximum {}",
                self.name, mtu, self.max_mtu
            )));
        }
        self.state.lock().mtu = mtu;
        Ok(())
    }

    /// Adjusts the promiscuity counter by `inc`.
    pub fn set_promiscuity(&self, net: &NetConfigGuard<'_>, inc: i32) -> DsaResult<()> {
        self.debug_check_guard(net);
        let mut state = self.state.lock();
        let next = i64::from(state.promiscuity) + i64::from(inc);
        state.promiscuity = u32::try_from(next).map_err(|_| {
            DsaError::invalid_argument(format!(
                "{}: promiscuity {} out of range",
                self.name, next
            ))
        })?;
        Ok(())
    }

    /// A bound master only accepts guards of its own context's lock.
    fn debug_check_guard(&self, net: &NetConfigGuard<'_>) {
        debug_assert!(
            self.dsa_binding()
                .map_or(true, |binding| net.belongs_to(binding.context().net())),
            "{}: network configuration guard taken on a foreign lock",
            self.name
        );
    }

    /// Current ethtool operations table.
    pub fn ethtool_ops(&self) -> Arc<dyn EthtoolOps> {
        Arc::clone(&self.ethtool_ops.read())
    }

    pub(crate) fn replace_ethtool_ops(&self, ops: Arc<dyn EthtoolOps>) -> Arc<dyn EthtoolOps> {
        std::mem::replace(&mut *self.ethtool_ops.write(), ops)
    }

    /// The driver's own ioctl handler.
    pub fn driver_eth_ioctl(&self) -> Option<&Arc<dyn EthIoctl>> {
        self.eth_ioctl.as_ref()
    }

    /// Dispatches a device-private ioctl.
    ///
    /// While bound as a DSA master the request goes through the DSA
    /// interceptor first; otherwise it goes straight to the driver.
    pub fn eth_ioctl(&self, req: &mut IfReq, cmd: IoctlCmd) -> DsaResult<()> {
        let interceptor = self
            .dsa_binding()
            .and_then(|binding| binding.ioctl_handler());
        match interceptor.as_ref().or(self.eth_ioctl.as_ref()) {
            Some(handler) => handler.eth_ioctl(self, req, cmd),
            None => Err(DsaError::not_supported(format!("{}: eth_ioctl", self.name))),
        }
    }

    pub fn phydev(&self) -> Option<Arc<dyn PhyDevice>> {
        self.phydev.read().clone()
    }

    pub fn attach_phy(&self, phy: Option<Arc<dyn PhyDevice>>) {
        *self.phydev.write() = phy;
    }

    /// True while the device is bound to a switch tree.
    pub fn is_dsa_master(&self) -> bool {
        self.dsa_ptr.read().is_some()
    }

    pub fn dsa_binding(&self) -> Option<Arc<MasterBinding>> {
        self.dsa_ptr.read().clone()
    }

    /// Publishes `binding` unless the device is already a master.
    pub(crate) fn claim_dsa_binding(&self, binding: &Arc<MasterBinding>) -> DsaResult<()> {
        let mut slot = self.dsa_ptr.write();
        if slot.is_some() {
            return Err(DsaError::busy(format!("{} is already a DSA master", self.name)));
        }
        *slot = Some(Arc::clone(binding));
        Ok(())
    }

    /// Clears the binding if it is still `binding`.
    pub(crate) fn release_dsa_binding(&self, binding: &MasterBinding) {
        let mut slot = self.dsa_ptr.write();
        if slot
            .as_deref()
            .is_some_and(|current| std::ptr::eq(current, binding))
        {
            *slot = None;
        }
    }

    /// Publishes an attribute group.
    ///
    /// # Errors
    ///
    /// Returns [`DsaError::AlreadyExists`] if a group with the same name is
    /// already published.
    pub fn create_group(&self, group: Arc<AttributeGroup>) -> DsaResult<()> {
        let mut groups = self.groups.lock();
        if groups.contains_key(group.name()) {
            return Err(DsaError::already_exists(format!(
                "{}/{}",
                self.name,
                group.name()
            )));
        }
        groups.insert(group.name(), group);
        Ok(())
    }

    pub fn remove_group(&self, name: &str) -> Option<Arc<AttributeGroup>> {
        self.groups.lock().remove(name)
    }

    pub fn group(&self, name: &str) -> Option<Arc<AttributeGroup>> {
        self.groups.lock().get(name).cloned()
    }

    pub fn group_names(&self) -> Vec<&'static str> {
        self.groups.lock().keys().copied().collect()
    }

    /// Reads attribute `attr` of group `group`.
    pub fn attr_show(&self, group: &str, attr: &str) -> DsaResult<String> {
        self.lookup_group(group)?.show(self, attr)
    }

    /// Writes `buf` to attribute `attr` of group `group`; returns the
    /// number of bytes consumed.
    pub fn attr_store(&self, group: &str, attr: &str, buf: &str) -> DsaResult<usize> {
        self.lookup_group(group)?.store(self, attr, buf)
    }

    fn lookup_group(&self, group: &str) -> DsaResult<Arc<AttributeGroup>> {
        self.group(group).ok_or_else(|| {
            DsaError::invalid_argument(format!("{}: no attribute group {}", self.name, group))
        })
    }
}

impl fmt::Debug for MasterDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MasterDevice")
            .field("name", &self.name)
            .field("parent", &self.parent)
            .field("state", &*self.state.lock())
            .field("dsa_master", &self.is_dsa_master())
            .finish_non_exhaustive()
    }
}

/// Builder for [`MasterDevice`].
pub struct MasterDeviceBuilder {
    name: String,
    parent: Option<String>,
    mtu: u32,
    max_mtu: u32,
    ethtool_ops: Arc<dyn EthtoolOps>,
    eth_ioctl: Option<Arc<dyn EthIoctl>>,
    phydev: Option<Arc<dyn PhyDevice>>,
}

impl MasterDeviceBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            mtu: ETH_DATA_LEN,
            max_mtu: ETH_DATA_LEN,
            ethtool_ops: Arc::new(NoEthtoolOps),
            eth_ioctl: None,
            phydev: None,
        }
    }

    pub fn parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn mtu(mut self, mtu: u32) -> Self {
        self.mtu = mtu;
        self
    }

    pub fn max_mtu(mut self, max_mtu: u32) -> Self {
        self.max_mtu = max_mtu;
        self
    }

    pub fn ethtool_ops(mut self, ops: Arc<dyn EthtoolOps>) -> Self {
        self.ethtool_ops = ops;
        self
    }

    pub fn eth_ioctl(mut self, handler: Arc<dyn EthIoctl>) -> Self {
        self.eth_ioctl = Some(handler);
        self
    }

    pub fn phy(mut self, phy: Arc<dyn PhyDevice>) -> Self {
        self.phydev = Some(phy);
        self
    }

    pub fn build(self) -> Arc<MasterDevice> {
        Arc::new(MasterDevice {
            name: self.name,
            parent: self.parent,
            max_mtu: self.max_mtu.max(self.mtu),
            state: Mutex::new(DeviceState {
                mtu: self.mtu,
                promiscuity: 0,
            }),
            ethtool_ops: RwLock::new(self.ethtool_ops),
            eth_ioctl: self.eth_ioctl,
            phydev: RwLock::new(self.phydev),
            dsa_ptr: RwLock::new(None),
            groups: Mutex::new(BTreeMap::new()),
        })
    }
}
