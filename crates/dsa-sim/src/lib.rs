//! Software stand-ins for DSA hardware.
//!
//! Provides:
//! - [`SimSwitch`]: a switch chip with a register file, PVLAN table,
//!   statistics and timestamping ports
//! - [`SimEthtool`], [`SimIoctl`], [`SimPhy`]: the master driver's own
//!   ethtool and ioctl support and an attached PHY
//! - [`SimBench`]: a ready-wired tree, master and manager

pub mod fixtures;
mod master;
mod switch;

pub use fixtures::{SimBench, SimBenchBuilder};
pub use master::{SimEthtool, SimIoctl, SimPhy};
pub use switch::SimSwitch;

use dsa_switch::{DsaError, DsaResult};
use dsa_types::ethtool::write_gstring;
use dsa_types::ETH_GSTRING_LEN;

/// Named counters as reported through ethtool.
pub type Counters = Vec<(String, u64)>;

pub(crate) fn counters<S: AsRef<str>>(entries: &[(S, u64)]) -> Counters {
    entries
        .iter()
        .map(|(name, value)| (name.as_ref().to_string(), *value))
        .collect()
}

pub(crate) fn write_names(counters: &[(String, u64)], data: &mut [u8]) -> DsaResult<()> {
    let needed = counters.len() * ETH_GSTRING_LEN;
    if data.len() < needed {
        return Err(DsaError::invalid_argument(format!(
            "string buffer of {} bytes, need {}",
            data.len(),
            needed
        )));
    }
    for ((name, _), slot) in counters.iter().zip(data.chunks_exact_mut(ETH_GSTRING_LEN)) {
        write_gstring(slot, name);
    }
    Ok(())
}

pub(crate) fn write_values(counters: &[(String, u64)], data: &mut [u64]) -> DsaResult<()> {
    if data.len() < counters.len() {
        return Err(DsaError::invalid_argument(format!(
            "stats buffer of {} entries, need {}",
            data.len(),
            counters.len()
        )));
    }
    for ((_, value), out) in counters.iter().zip(data.iter_mut()) {
        *out = *value;
    }
    Ok(())
}
