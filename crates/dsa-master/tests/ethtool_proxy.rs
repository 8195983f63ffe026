//! ethtool proxy behaviour on an attached master.

use std::sync::Arc;

use dsa_master::{DsaError, EthtoolOps, DSA_DRIVER_NAME};
use dsa_sim::fixtures::{default_switch, CPU_PORT};
use dsa_sim::{SimBench, SimEthtool, SimPhy, SimSwitch};
use dsa_types::ethtool::{decode_drvinfo_driver, gstring_to_str};
use dsa_types::{EthtoolRegs, StringSet, TagProtocol, DRVINFO_LEN, ETH_GSTRING_LEN, REGS_HEADER_LEN};
use pretty_assertions::assert_eq;

fn strings(ops: &Arc<dyn EthtoolOps>, bench: &SimBench, set: StringSet) -> Vec<String> {
    let count = ops.get_sset_count(&bench.master, set).unwrap();
    let mut data = vec![0u8; count * ETH_GSTRING_LEN];
    ops.get_strings(&bench.master, set, &mut data).unwrap();
    data.chunks(ETH_GSTRING_LEN)
        .map(|slot| gstring_to_str(slot).to_string())
        .collect()
}

#[test]
fn test_regs_layout_and_length_agree() {
    let bench = SimBench::new();
    bench.attach().unwrap();
    let ops = bench.master.ethtool_ops();

    let len = ops.get_regs_len(&bench.master).unwrap();
    assert_eq!(len, 16 + DRVINFO_LEN + REGS_HEADER_LEN + 8);

    let mut regs = EthtoolRegs::default();
    let mut data = vec![0xeeu8; len];
    ops.get_regs(&bench.master, &mut regs, &mut data).unwrap();
    assert_eq!(regs.len as usize, len);
    assert_eq!(regs.version, 1);

    let master: Vec<u8> = (0u8..16).collect();
    assert_eq!(&data[..16], master.as_slice());
    assert_eq!(
        decode_drvinfo_driver(&data[16..16 + DRVINFO_LEN]).as_deref(),
        Some(DSA_DRIVER_NAME)
    );
    let header_at = 16 + DRVINFO_LEN;
    let header = EthtoolRegs::decode(&data[header_at..]).unwrap();
    assert_eq!(header.version, 2);
    assert_eq!(header.len, 8);
    assert_eq!(&data[header_at + REGS_HEADER_LEN..], &[0xa5; 8]);
}

#[test]
fn test_regs_without_master_dump() {
    let bench = SimBench::builder().ethtool(None).build();
    bench.attach().unwrap();
    let ops = bench.master.ethtool_ops();

    let len = ops.get_regs_len(&bench.master).unwrap();
    assert_eq!(len, DRVINFO_LEN + REGS_HEADER_LEN + 8);
    let mut regs = EthtoolRegs::default();
    let mut data = vec![0u8; len];
    ops.get_regs(&bench.master, &mut regs, &mut data).unwrap();
    assert_eq!(regs.len as usize, len);
    assert_eq!(
        decode_drvinfo_driver(&data[..DRVINFO_LEN]).as_deref(),
        Some(DSA_DRIVER_NAME)
    );
}

#[test]
fn test_regs_without_switch_dump() {
    let bench = SimBench::builder()
        .switch(SimSwitch::new(TagProtocol::Brcm))
        .build();
    bench.attach().unwrap();
    let ops = bench.master.ethtool_ops();

    let len = ops.get_regs_len(&bench.master).unwrap();
    assert_eq!(len, 16 + DRVINFO_LEN + REGS_HEADER_LEN);
    let mut regs = EthtoolRegs::default();
    let mut data = vec![0u8; len];
    ops.get_regs(&bench.master, &mut regs, &mut data).unwrap();
    let header = EthtoolRegs::decode(&data[16 + DRVINFO_LEN..]).unwrap();
    assert_eq!(header.len, 0);
}

#[test]
fn test_regs_rejects_short_buffer() {
    let bench = SimBench::new();
    bench.attach().unwrap();
    let ops = bench.master.ethtool_ops();
    let len = ops.get_regs_len(&bench.master).unwrap();
    let mut regs = EthtoolRegs::default();
    let mut data = vec![0u8; len - 1];
    assert!(ops.get_regs(&bench.master, &mut regs, &mut data).is_err());
}

#[test]
fn test_switch_regs_failure_propagates() {
    let bench = SimBench::builder()
        .switch(default_switch().with_io_fault(CPU_PORT))
        .build();
    bench.attach().unwrap();
    let ops = bench.master.ethtool_ops();

    let err = ops.get_regs_len(&bench.master).unwrap_err();
    assert!(matches!(err, DsaError::Io { .. }));

    let mut regs = EthtoolRegs::default();
    let mut data = vec![0u8; 16 + DRVINFO_LEN + REGS_HEADER_LEN + 8];
    let err = ops.get_regs(&bench.master, &mut regs, &mut data).unwrap_err();
    assert!(matches!(err, DsaError::Io { .. }));
    assert_eq!(regs.len, 0);
}

#[test]
fn test_switch_count_failure_propagates() {
    let bench = SimBench::builder()
        .switch(default_switch().with_io_fault(CPU_PORT))
        .build();
    bench.attach().unwrap();
    let ops = bench.master.ethtool_ops();

    let err = ops.get_sset_count(&bench.master, StringSet::Stats).unwrap_err();
    assert!(matches!(err, DsaError::Io { .. }));
    assert_eq!(err.errno(), -5);

    let mut data = vec![0u8; 4 * ETH_GSTRING_LEN];
    let err = ops
        .get_strings(&bench.master, StringSet::Stats, &mut data)
        .unwrap_err();
    assert!(matches!(err, DsaError::Io { .. }));
}

#[test]
fn test_stats_merge_master_then_cpu_port() {
    let bench = SimBench::new();
    bench.attach().unwrap();
    let ops = bench.master.ethtool_ops();

    assert_eq!(
        strings(&ops, &bench, StringSet::Stats),
        vec!["rx_packets", "tx_packets", "p08_rx_octets", "p08_tx_octets"]
    );
    let mut values = vec![0u64; 4];
    ops.get_ethtool_stats(&bench.master, &mut values).unwrap();
    assert_eq!(values, vec![10, 20, 1000, 2000]);
}

#[test]
fn test_unsupported_sets_contribute_nothing() {
    let bench = SimBench::new();
    bench.attach().unwrap();
    let ops = bench.master.ethtool_ops();
    assert_eq!(ops.get_sset_count(&bench.master, StringSet::PrivFlags).unwrap(), 0);
    assert_eq!(ops.get_sset_count(&bench.master, StringSet::PhyStats).unwrap(), 0);
}

#[test]
fn test_phy_stats_from_attached_phy() {
    let bench = SimBench::builder()
        .phy(SimPhy::new(&[("phy_receive_errors", 7)]))
        .switch(default_switch().with_phy_stats(CPU_PORT, &[("phy_idle_errors", 9)]))
        .build();
    bench.attach().unwrap();
    let ops = bench.master.ethtool_ops();

    assert_eq!(
        strings(&ops, &bench, StringSet::PhyStats),
        vec!["phy_receive_errors", "p08_phy_idle_errors"]
    );
    let mut values = vec![0u64; 2];
    ops.get_ethtool_phy_stats(&bench.master, &mut values).unwrap();
    assert_eq!(values, vec![7, 9]);
}

#[test]
fn test_phy_stats_from_driver_when_provided() {
    let bench = SimBench::builder()
        .phy(SimPhy::new(&[("phy_receive_errors", 7)]))
        .ethtool(Some(SimEthtool::new("sim-gmac").with_phy_stats(&[("mac_phy_crc", 3)])))
        .build();
    bench.attach().unwrap();
    let ops = bench.master.ethtool_ops();

    assert_eq!(strings(&ops, &bench, StringSet::PhyStats), vec!["mac_phy_crc"]);
    let mut values = vec![0u64; 1];
    ops.get_ethtool_phy_stats(&bench.master, &mut values).unwrap();
    assert_eq!(values, vec![3]);
}

#[test]
fn test_long_switch_strings_are_truncated() {
    let long = "a_statistic_name_of_31_chars_xx";
    assert_eq!(long.len(), 31);
    let bench = SimBench::builder()
        .ethtool(None)
        .switch(SimSwitch::new(TagProtocol::Brcm).with_stats(CPU_PORT, &[(long, 1)]))
        .build();
    bench.attach().unwrap();
    let ops = bench.master.ethtool_ops();

    let names = strings(&ops, &bench, StringSet::Stats);
    assert_eq!(names, vec![format!("p08_{}", &long[..ETH_GSTRING_LEN - 4])]);
}

#[test]
fn test_unoverridden_ops_forward() {
    let bench = SimBench::new();
    bench.attach().unwrap();
    let ops = bench.master.ethtool_ops();
    assert_eq!(ops.get_drvinfo(&bench.master).unwrap().driver, "sim-gmac");
    assert!(ops.get_link(&bench.master).unwrap());
}
