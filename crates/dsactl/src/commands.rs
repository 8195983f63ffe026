//! Commands run against an attached system. Each returns the text to
//! print.

use std::fmt::Write as _;

use dsa_master::{DsaResult, IfReq, IoctlCmd, DSA_GROUP};
use dsa_switch::HwTstampConfig;
use dsa_types::ethtool::gstring_to_str;
use dsa_types::{EthtoolRegs, StringSet, ETH_GSTRING_LEN};

use crate::error::CommandResult;
use crate::system::System;

/// Bytes per line of a register dump.
const DUMP_WIDTH: usize = 16;

/// Reads attribute `attr` of the `dsa` group.
pub fn show(system: &System, attr: &str) -> CommandResult<String> {
    Ok(system.master.attr_show(DSA_GROUP, attr)?)
}

/// Writes `value` to attribute `attr`, newline-terminated like a shell
/// `echo` would.
pub fn store(system: &System, attr: &str, value: &str) -> CommandResult<usize> {
    let mut buf = value.to_string();
    if !buf.ends_with('\n') {
        buf.push('\n');
    }
    Ok(system.master.attr_store(DSA_GROUP, attr, &buf)?)
}

/// Hex dump of the master's register dump.
pub fn ethtool_regs(system: &System) -> CommandResult<String> {
    let ops = system.master.ethtool_ops();
    let len = ops.get_regs_len(&system.master)?;
    let mut regs = EthtoolRegs::default();
    let mut data = vec![0u8; len];
    ops.get_regs(&system.master, &mut regs, &mut data)?;

    let mut out = format!("version {} length {}\n", regs.version, regs.len);
    for (i, line) in data.chunks(DUMP_WIDTH).enumerate() {
        write!(out, "{:04x}:", i * DUMP_WIDTH)?;
        for byte in line {
            write!(out, " {byte:02x}")?;
        }
        out.push('\n');
    }
    Ok(out)
}

fn names(system: &System, set: StringSet) -> DsaResult<Vec<String>> {
    let ops = system.master.ethtool_ops();
    let count = ops.get_sset_count(&system.master, set)?;
    let mut data = vec![0u8; count * ETH_GSTRING_LEN];
    ops.get_strings(&system.master, set, &mut data)?;
    Ok(data
        .chunks(ETH_GSTRING_LEN)
        .map(|slot| gstring_to_str(slot).to_string())
        .collect())
}

/// Names of string set `set`, one per line.
pub fn ethtool_strings(system: &System, set: StringSet) -> CommandResult<String> {
    Ok(names(system, set)?
        .iter()
        .map(|name| format!("{name}\n"))
        .collect())
}

/// Statistics as `name: value` lines.
pub fn ethtool_stats(system: &System, set: StringSet) -> CommandResult<String> {
    let names = names(system, set)?;
    let ops = system.master.ethtool_ops();
    let mut values = vec![0u64; names.len()];
    if set == StringSet::PhyStats {
        ops.get_ethtool_phy_stats(&system.master, &mut values)?;
    } else {
        ops.get_ethtool_stats(&system.master, &mut values)?;
    }

    let mut out = String::new();
    for (name, value) in names.iter().zip(values) {
        writeln!(out, "     {name}: {value}")?;
    }
    Ok(out)
}

/// Reads, or with `enable` set, configures master timestamping.
pub fn hwtstamp(system: &System, enable: Option<bool>) -> CommandResult<String> {
    let mut req = IfReq::new(system.master.name());
    let cmd = match enable {
        Some(on) => {
            req.hwtstamp = if on {
                HwTstampConfig {
                    flags: 0,
                    tx_type: HwTstampConfig::TX_ON,
                    rx_filter: HwTstampConfig::FILTER_ALL,
                }
            } else {
                HwTstampConfig::default()
            };
            IoctlCmd::SetHwTstamp
        }
        None => IoctlCmd::GetHwTstamp,
    };
    system.master.eth_ioctl(&mut req, cmd)?;
    Ok(format!(
        "tx_type {} rx_filter {} flags {:#x}\n",
        req.hwtstamp.tx_type, req.hwtstamp.rx_filter, req.hwtstamp.flags
    ))
}

/// Loaded taggers with overhead and holder count.
pub fn taggers(system: &System) -> CommandResult<String> {
    let registry = system.manager.context().registry();
    let mut out = String::new();
    for proto in registry.protocols() {
        let handle = registry.get_by_protocol(proto)?;
        writeln!(
            out,
            "{:<14} overhead {:>2}{} refs {}",
            handle.name(),
            handle.overhead(),
            if handle.promisc_on_master() { " promisc" } else { "        " },
            registry.refcount(proto) - 1
        )?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DsactlConfig;
    use pretty_assertions::assert_eq;

    fn attached() -> System {
        let system = System::build(&DsactlConfig::default()).unwrap();
        system.attach().unwrap();
        system
    }

    #[test]
    fn test_show_and_store() {
        let system = attached();
        assert_eq!(show(&system, "tagging_cpu").unwrap(), "brcm\n");
        assert_eq!(store(&system, "tagging_cpu", "brcm-prepend").unwrap(), 13);
        assert_eq!(show(&system, "tagging_cpu").unwrap(), "brcm-prepend\n");
    }

    #[test]
    fn test_attribute_errors_keep_errno() {
        let system = attached();
        let err = show(&system, "wrreg").unwrap_err();
        assert_eq!(err.errno(), Some(-1));
        let err = store(&system, "spi_mutex", "2").unwrap_err();
        assert_eq!(err.errno(), Some(-22));
    }

    #[test]
    fn test_stats_listing() {
        let system = attached();
        assert_eq!(
            ethtool_stats(&system, StringSet::Stats).unwrap(),
            "     rx_packets: 0\n     tx_packets: 0\n     p08_rx_octets: 0\n     p08_tx_octets: 0\n"
        );
    }

    #[test]
    fn test_regs_dump_header() {
        let system = attached();
        let dump = ethtool_regs(&system).unwrap();
        assert!(dump.starts_with("version 0 length 208\n"));
        assert!(dump.contains(" 64 73 61 00"));
    }

    #[test]
    fn test_taggers_reports_holders() {
        let system = attached();
        let listing = taggers(&system).unwrap();
        let brcm = listing.lines().find(|l| l.starts_with("brcm ")).unwrap();
        assert!(brcm.ends_with("refs 1"));
        assert_eq!(listing.lines().count(), 10);
    }

    #[test]
    fn test_hwtstamp_roundtrip() {
        let system = attached();
        hwtstamp(&system, Some(true)).unwrap();
        assert_eq!(hwtstamp(&system, None).unwrap(), "tx_type 1 rx_filter 1 flags 0x0\n");
    }
}
