//! ioctl interception on a DSA master.

use std::sync::Arc;

use dsa_switch::{DsaError, DsaResult};
use tracing::debug;

use crate::netdev::{EthIoctl, IfReq, IoctlCmd, MasterDevice};
use crate::tree::SwitchTree;

/// Device-private ioctl handler installed while a master is bound.
///
/// Hardware timestamping requests are refused while any port of the tree
/// timestamps on its own: a timestamp taken at the master would describe
/// the wrong hop. Everything else goes to the driver.
pub struct MasterIoctl {
    tree: Arc<SwitchTree>,
}

impl MasterIoctl {
    pub fn new(tree: Arc<SwitchTree>) -> Self {
        Self { tree }
    }
}

impl EthIoctl for MasterIoctl {
    fn eth_ioctl(&self, dev: &MasterDevice, req: &mut IfReq, cmd: IoctlCmd) -> DsaResult<()> {
        if cmd.is_hwtstamp() {
            let _tree = self.tree.lock();
            if let Some(dp) = self.tree.ports().iter().find(|dp| dp.supports_hwtstamp()) {
                debug!(master = dev.name(), switch = dp.switch().index(), port = dp.index(),
                    "Refusing master timestamping, switch port timestamps");
                return Err(DsaError::busy(format!(
                    "hardware timestamping on port {} of switch {}",
                    dp.index(),
                    dp.switch().index()
                )));
            }
        }

        match dev.driver_eth_ioctl() {
            Some(driver) => driver.eth_ioctl(dev, req, cmd),
            None => Err(DsaError::not_supported(format!("{}: eth_ioctl", dev.name()))),
        }
    }
}
