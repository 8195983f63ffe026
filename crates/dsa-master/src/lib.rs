//! DSA master-port layer.
//!
//! A DSA (Distributed Switch Architecture) switch reaches the host through
//! a regular network device, the *master*. This crate turns such a device
//! into the conduit for the switch's CPU port:
//!
//! - [`TagRegistry`]: Loaded tagging protocols with counted handles
//! - [`EthtoolProxy`]: Master ethtool data extended with the CPU port's view
//! - [`MasterIoctl`]: Hardware timestamping arbitration between master and switch
//! - [`AttributeGroup`]: The `dsa` control attributes published on the master
//! - [`MasterManager`]: Setup and teardown of the master binding
//!
//! # Example
//!
//! ```ignore
//! use dsa_master::{DsaContext, MasterConfig, MasterDevice, MasterManager, SwitchTree};
//!
//! let ctx = DsaContext::new();
//! let tree = SwitchTree::builder(0)
//!     .switch("mdio_mux-0.1:00", switch_ops)
//!     .port(0, 0, PortType::User)
//!     .port(0, 8, PortType::Cpu)
//!     .build(ctx.registry())?;
//! let eth0 = MasterDevice::builder("eth0").parent("gmac0").max_mtu(1536).build();
//!
//! let manager = MasterManager::new(ctx, MasterConfig::default());
//! manager.setup(&eth0, &tree, tree.port(0, 8).unwrap())?;
//! assert_eq!(eth0.attr_show("dsa", "tagging_cpu")?, "brcm\n");
//! ```

pub mod attrs;
mod clock_share;
mod device_link;
mod ethtool;
mod ioctl;
mod master;
mod netdev;
mod tagger;
mod tree;

pub use attrs::{AttributeGroup, DeviceAttribute, DSA_GROUP};
pub use clock_share::{ClockShareGuard, ClockShareLock, DEFAULT_SETTLE_DELAY};
pub use device_link::{DeviceLink, DeviceLinks};
pub use ethtool::{port_prefix, EthtoolProxy, DSA_DRIVER_NAME};
pub use ioctl::MasterIoctl;
pub use master::{DsaContext, MasterBinding, MasterConfig, MasterManager, DEFAULT_IMP_PORT};
pub use netdev::{
    DrvInfo, EthIoctl, EthtoolOps, IfReq, IoctlCmd, MasterDevice, MasterDeviceBuilder,
    NetConfigGuard, NetConfigLock, NoEthtoolOps, PhyDevice, ETH_DATA_LEN,
};
pub use tagger::{TagHandle, TagOps, TagRegistry};
pub use tree::{
    DsaPort, DsaSwitch, PendingTagChange, SwitchTree, SwitchTreeBuilder, TagChangeOutcome,
};

pub use dsa_switch::{DsaError, DsaResult};
