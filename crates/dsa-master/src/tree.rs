//! Switch tree model and tree-wide tag protocol changes.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use dsa_switch::{DsaError, DsaResult, DsaSwitchOps};
use dsa_types::{PortType, TagProtocol};
use parking_lot::{Mutex, MutexGuard, RwLock};
use tracing::{debug, error, info, instrument, warn};

use crate::netdev::{MasterDevice, NetConfigGuard, NetConfigLock, ETH_DATA_LEN};
use crate::tagger::{TagHandle, TagOps, TagRegistry};

/// One switch chip in a tree.
pub struct DsaSwitch {
    index: usize,
    name: String,
    ops: Arc<dyn DsaSwitchOps>,
}

impl DsaSwitch {
    pub fn index(&self) -> usize {
        self.index
    }

    /// Name of the switch's own device.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ops(&self) -> &dyn DsaSwitchOps {
        self.ops.as_ref()
    }
}

impl fmt::Debug for DsaSwitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DsaSwitch")
            .field("index", &self.index)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// One port of a switch.
pub struct DsaPort {
    index: usize,
    kind: PortType,
    switch: Arc<DsaSwitch>,
    admin_up: AtomicBool,
    tag: Mutex<Option<TagHandle>>,
    master: RwLock<Weak<MasterDevice>>,
}

impl DsaPort {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn kind(&self) -> PortType {
        self.kind
    }

    pub fn switch(&self) -> &Arc<DsaSwitch> {
        &self.switch
    }

    /// Active tagging protocol. Only CPU ports carry one.
    pub fn tag_ops(&self) -> Option<Arc<TagOps>> {
        self.tag.lock().as_ref().map(|handle| Arc::clone(handle.ops()))
    }

    pub fn tag_protocol(&self) -> Option<TagProtocol> {
        self.tag.lock().as_ref().map(|handle| handle.protocol())
    }

    fn swap_tag(&self, handle: TagHandle) -> Option<TagHandle> {
        self.tag.lock().replace(handle)
    }

    /// Administrative state of a user port.
    pub fn is_up(&self) -> bool {
        self.admin_up.load(Ordering::Acquire)
    }

    pub fn set_up(&self, up: bool) {
        self.admin_up.store(up, Ordering::Release);
    }

    /// Master device a CPU port is attached to.
    pub fn master(&self) -> Option<Arc<MasterDevice>> {
        self.master.read().upgrade()
    }

    pub(crate) fn bind_master(&self, master: Option<&Arc<MasterDevice>>) {
        *self.master.write() = master.map_or_else(Weak::new, Arc::downgrade);
    }

    fn is_bound_to(&self, master: &MasterDevice) -> bool {
        self.master
            .read()
            .upgrade()
            .is_some_and(|m| std::ptr::eq(Arc::as_ptr(&m), master))
    }

    /// True if the switch answers hardware timestamping queries on this port.
    pub fn supports_hwtstamp(&self) -> bool {
        !matches!(
            self.switch.ops.port_hwtstamp_get(self.index),
            Err(ref e) if e.is_not_supported()
        )
    }
}

impl fmt::Debug for DsaPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DsaPort")
            .field("switch", &self.switch.index)
            .field("index", &self.index)
            .field("kind", &self.kind)
            .field("tag", &self.tag_protocol())
            .finish_non_exhaustive()
    }
}

/// A set of interconnected switches sharing one port namespace.
pub struct SwitchTree {
    index: u32,
    switches: Vec<Arc<DsaSwitch>>,
    ports: Vec<Arc<DsaPort>>,
    lock: Mutex<()>,
}

impl SwitchTree {
    pub fn builder(index: u32) -> SwitchTreeBuilder {
        SwitchTreeBuilder::new(index)
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn switches(&self) -> &[Arc<DsaSwitch>] {
        &self.switches
    }

    /// All ports of all switches, in switch then port order.
    pub fn ports(&self) -> &[Arc<DsaPort>] {
        &self.ports
    }

    pub fn port(&self, switch: usize, index: usize) -> Option<&Arc<DsaPort>> {
        self.ports
            .iter()
            .find(|dp| dp.switch.index == switch && dp.index == index)
    }

    pub fn cpu_ports(&self) -> impl Iterator<Item = &Arc<DsaPort>> {
        self.ports.iter().filter(|dp| dp.kind.is_cpu())
    }

    pub fn user_ports(&self) -> impl Iterator<Item = &Arc<DsaPort>> {
        self.ports.iter().filter(|dp| dp.kind.is_user())
    }

    /// Takes the tree-wide lock.
    pub fn lock(&self) -> MutexGuard<'_, ()> {
        self.lock.lock()
    }

    /// Switches every CPU port attached to `master` to the protocol held by
    /// `new`.
    ///
    /// Holds the tree lock for the whole operation. The network
    /// configuration lock is taken only around the MTU and promiscuity
    /// update, never across switch driver calls. Refuses with
    /// [`DsaError::Busy`] while any user port is up. If a switch rejects the change, CPU ports already switched are
    /// reverted, `new` is released and the error is returned. On success the
    /// master's MTU and promiscuity follow the new protocol and the replaced
    /// handles are returned so the caller decides when to release them.
    #[instrument(skip_all, fields(tree = self.index, master = master.name(), to = new.name()))]
    pub fn change_tag_protocol(
        &self,
        net: &NetConfigLock,
        master: &MasterDevice,
        new: TagHandle,
    ) -> DsaResult<Vec<TagHandle>> {
        let _tree = self.lock.lock();

        if let Some(dp) = self.user_ports().find(|dp| dp.is_up()) {
            return Err(DsaError::busy(format!(
                "user port {} of switch {} is up",
                dp.index, dp.switch.index
            )));
        }

        let targets: Vec<&Arc<DsaPort>> = self
            .cpu_ports()
            .filter(|dp| dp.is_bound_to(master))
            .collect();
        if targets.is_empty() {
            return Err(DsaError::invalid_argument(format!(
                "{} is not attached to tree {}",
                master.name(),
                self.index
            )));
        }

        for (done, dp) in targets.iter().enumerate() {
            if let Err(e) = dp.switch.ops.change_tag_protocol(dp.index, new.protocol()) {
                warn!(port = dp.index, switch = dp.switch.index, error = %e,
                    "Switch rejected tagging protocol change, rolling back");
                for prev in &targets[..done] {
                    let Some(old) = prev.tag_protocol() else { continue };
                    if let Err(re) = prev.switch.ops.change_tag_protocol(prev.index, old) {
                        error!(port = prev.index, switch = prev.switch.index, error = %re,
                            "Failed to restore tagging protocol");
                    }
                }
                return Err(e);
            }
        }

        let old_ops = targets[0].tag_ops();
        let mut replaced = Vec::with_capacity(targets.len());
        for dp in &targets {
            if let Some(old) = dp.swap_tag(new.clone()) {
                replaced.push(old);
            }
        }

        if let Some(old_ops) = &old_ops {
            let guard = net.lock();
            follow_tag_requirements(&guard, master, old_ops, &new);
        }
        info!(from = ?old_ops.map(|o| o.name()), "Changed tagging protocol");
        Ok(replaced)
    }
}

/// A tagging protocol change that holds its candidate protocol but has not
/// touched the tree yet.
///
/// Resolving the name takes a reference to the new protocol up front, so a
/// change can never commit to a protocol that went away in between.
#[derive(Debug)]
pub struct PendingTagChange {
    new: TagHandle,
}

/// How a [`PendingTagChange`] resolved.
#[derive(Debug)]
pub enum TagChangeOutcome {
    /// The requested protocol was already active; the extra reference was
    /// released.
    Unchanged,
    /// The tree now speaks the new protocol; the old references were
    /// released.
    Committed { from: TagProtocol, to: TagProtocol },
    /// The tree refused the change and still speaks `kept`.
    RolledBack {
        kept: Option<TagProtocol>,
        error: DsaError,
    },
}

impl PendingTagChange {
    /// Resolves `name` through the registry.
    pub fn resolve(registry: &Arc<TagRegistry>, name: &str) -> DsaResult<Self> {
        Ok(Self {
            new: registry.find_by_name(name)?,
        })
    }

    pub fn protocol(&self) -> TagProtocol {
        self.new.protocol()
    }

    /// Applies the change to every CPU port of `tree` attached to `master`.
    pub fn commit(
        self,
        tree: &SwitchTree,
        net: &NetConfigLock,
        master: &MasterDevice,
    ) -> TagChangeOutcome {
        let to = self.new.protocol();
        let current = tree
            .cpu_ports()
            .find(|dp| dp.is_bound_to(master))
            .and_then(|dp| dp.tag_protocol());
        if current == Some(to) {
            return TagChangeOutcome::Unchanged;
        }
        match tree.change_tag_protocol(net, master, self.new) {
            Ok(replaced) => TagChangeOutcome::Committed {
                from: replaced.first().map_or(TagProtocol::None, |h| h.protocol()),
                to,
            },
            Err(error) => TagChangeOutcome::RolledBack {
                kept: current,
                error,
            },
        }
    }
}

/// Adjusts MTU and promiscuity of `master` from `old` to `new` tag needs.
fn follow_tag_requirements(
    guard: &NetConfigGuard<'_>,
    master: &MasterDevice,
    old: &TagOps,
    new: &TagOps,
) {
    if old.overhead() != new.overhead() {
        let mtu = ETH_DATA_LEN + new.overhead() as u32;
        if let Err(e) = master.set_mtu(guard, mtu) {
            warn!(mtu, error = %e, "Unable to adjust master MTU for new tag");
        }
    }
    let delta = i32::from(new.promisc_on_master()) - i32::from(old.promisc_on_master());
    if delta != 0 {
        if let Err(e) = master.set_promiscuity(guard, delta) {
            warn!(delta, error = %e, "Unable to adjust master promiscuity for new tag");
        }
    }
}

impl fmt::Debug for SwitchTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SwitchTree")
            .field("index", &self.index)
            .field("switches", &self.switches)
            .field("ports", &self.ports)
            .finish_non_exhaustive()
    }
}

/// Builder for [`SwitchTree`].
pub struct SwitchTreeBuilder {
    index: u32,
    switches: Vec<Arc<DsaSwitch>>,
    ports: Vec<(usize, usize, PortType)>,
    tag_protocol: Option<TagProtocol>,
}

impl SwitchTreeBuilder {
    fn new(index: u32) -> Self {
        Self {
            index,
            switches: Vec::new(),
            ports: Vec::new(),
            tag_protocol: None,
        }
    }

    pub fn switch(mut self, name: impl Into<String>, ops: Arc<dyn DsaSwitchOps>) -> Self {
        let index = self.switches.len();
        self.switches.push(Arc::new(DsaSwitch {
            index,
            name: name.into(),
            ops,
        }));
        self
    }

    /// Adds port `index` of switch `switch`.
    pub fn port(mut self, switch: usize, index: usize, kind: PortType) -> Self {
        self.ports.push((switch, index, kind));
        self
    }

    /// Overrides the switch's preferred tagging protocol on CPU ports.
    pub fn tag_protocol(mut self, proto: TagProtocol) -> Self {
        self.tag_protocol = Some(proto);
        self
    }

    /// Builds the tree and binds every CPU port to a tagging protocol.
    ///
    /// # Errors
    ///
    /// Fails on a port that names an unknown switch, a duplicate port, an
    /// unavailable protocol or a switch that rejects the requested
    /// protocol.
    pub fn build(self, registry: &Arc<TagRegistry>) -> DsaResult<Arc<SwitchTree>> {
        let mut ports: Vec<Arc<DsaPort>> = Vec::with_capacity(self.ports.len());
        for (sw, index, kind) in self.ports {
            let switch = self.switches.get(sw).ok_or_else(|| {
                DsaError::invalid_argument(format!("port {index} names unknown switch {sw}"))
            })?;
            if ports
                .iter()
                .any(|dp| dp.switch.index == sw && dp.index == index)
            {
                return Err(DsaError::already_exists(format!(
                    "port {index} of switch {sw}"
                )));
            }
            ports.push(Arc::new(DsaPort {
                index,
                kind,
                switch: Arc::clone(switch),
                admin_up: AtomicBool::new(false),
                tag: Mutex::new(None),
                master: RwLock::new(Weak::new()),
            }));
        }
        ports.sort_by_key(|dp| (dp.switch.index, dp.index));

        for dp in ports.iter().filter(|dp| dp.kind.is_cpu()) {
            let preferred = dp.switch.ops.get_tag_protocol(dp.index, TagProtocol::None);
            let proto = match self.tag_protocol {
                Some(wanted) if wanted != preferred => {
                    dp.switch.ops.change_tag_protocol(dp.index, wanted)?;
                    wanted
                }
                _ => preferred,
            };
            let handle = registry.get_by_protocol(proto)?;
            debug!(switch = dp.switch.index, port = dp.index, tagger = proto.as_str(),
                "Bound CPU port to tagging protocol");
            dp.swap_tag(handle);
        }

        Ok(Arc::new(SwitchTree {
            index: self.index,
            switches: self.switches,
            ports,
            lock: Mutex::new(()),
        }))
    }
}
