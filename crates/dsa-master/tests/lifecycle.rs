//! Attaching and detaching a master.

use std::sync::Arc;

use dsa_master::{AttributeGroup, DsaContext, DsaError, ETH_DATA_LEN, DSA_GROUP};
use dsa_sim::fixtures::default_switch;
use dsa_sim::SimBench;
use dsa_types::TagProtocol;

#[test]
fn test_attach_installs_everything() {
    let bench = SimBench::new();
    let orig = bench.master.ethtool_ops();
    assert!(!bench.master.is_dsa_master());

    bench.attach().unwrap();
    assert!(bench.master.is_dsa_master());
    assert_eq!(bench.master.mtu(), ETH_DATA_LEN + 4);
    assert_eq!(bench.master.promiscuity(), 0);
    assert_eq!(bench.master.group_names(), vec![DSA_GROUP]);
    assert!(!Arc::ptr_eq(&bench.master.ethtool_ops(), &orig));
    assert!(bench
        .context()
        .links()
        .contains("mdio_mux-0.1:00", "gmac0"));

    let binding = bench.master.dsa_binding().unwrap();
    assert!(binding.is_linked());
    assert_eq!(binding.imp_port(), 8);
    assert!(Arc::ptr_eq(binding.cpu_port(), bench.cpu_port()));
}

#[test]
fn test_detach_restores_device() {
    let bench = SimBench::new();
    let orig = bench.master.ethtool_ops();
    bench.attach().unwrap();
    bench.detach().unwrap();

    assert!(!bench.master.is_dsa_master());
    assert_eq!(bench.master.mtu(), ETH_DATA_LEN);
    assert!(bench.master.group_names().is_empty());
    assert!(Arc::ptr_eq(&bench.master.ethtool_ops(), &orig));
    assert!(bench.context().links().is_empty());
    assert!(bench.cpu_port().master().is_none());
    assert!(bench.show("tagging_cpu").is_err());
}

#[test]
fn test_reattach_after_detach() {
    let bench = SimBench::new();
    bench.attach().unwrap();
    assert!(matches!(bench.attach(), Err(DsaError::Busy { .. })));
    bench.detach().unwrap();
    bench.attach().unwrap();
    assert!(bench.master.is_dsa_master());
}

#[test]
fn test_promiscuous_tagger_balances_counter() {
    let bench = SimBench::builder()
        .switch(dsa_sim::SimSwitch::new(TagProtocol::BrcmPrepend))
        .build();
    bench.attach().unwrap();
    assert_eq!(bench.master.promiscuity(), 1);
    bench.detach().unwrap();
    assert_eq!(bench.master.promiscuity(), 0);
}

#[test]
fn test_promiscuity_follows_protocol_change() {
    let bench = SimBench::new();
    bench.attach().unwrap();
    bench.store("tagging_cpu", "brcm-prepend\n").unwrap();
    assert_eq!(bench.master.promiscuity(), 1);
    bench.detach().unwrap();
    assert_eq!(bench.master.promiscuity(), 0);
}

#[test]
fn test_mtu_failure_is_tolerated() {
    let bench = SimBench::builder()
        .switch(dsa_sim::SimSwitch::new(TagProtocol::Edsa))
        .max_mtu(ETH_DATA_LEN)
        .build();
    bench.attach().unwrap();
    assert!(bench.master.is_dsa_master());
    assert_eq!(bench.master.mtu(), ETH_DATA_LEN);
}

#[test]
fn test_missing_parent_is_tolerated() {
    let bench = SimBench::builder().parent(None).build();
    bench.attach().unwrap();
    assert!(bench.master.is_dsa_master());
    assert!(!bench.master.dsa_binding().unwrap().is_linked());
}

#[test]
fn test_failed_group_creation_unwinds() {
    let bench = SimBench::builder()
        .switch(dsa_sim::SimSwitch::new(TagProtocol::Ocelot))
        .max_mtu(2000)
        .build();
    let orig = bench.master.ethtool_ops();
    bench
        .master
        .create_group(Arc::new(AttributeGroup::new(DSA_GROUP, Vec::new())))
        .unwrap();

    let err = bench.attach().unwrap_err();
    assert!(matches!(err, DsaError::AlreadyExists { .. }));
    assert!(!bench.master.is_dsa_master());
    assert_eq!(bench.master.promiscuity(), 0);
    assert!(Arc::ptr_eq(&bench.master.ethtool_ops(), &orig));
    assert!(bench.context().links().is_empty());
    assert!(bench.cpu_port().master().is_none());
}

#[test]
fn test_shared_context_across_masters() {
    let ctx = DsaContext::new();
    let a = SimBench::builder().context(Arc::clone(&ctx)).build();
    let b = SimBench::builder()
        .context(Arc::clone(&ctx))
        .switch(default_switch())
        .build();
    a.attach().unwrap();
    b.attach().unwrap();

    a.store("spi_mutex", "1\n").unwrap();
    assert_eq!(b.show("spi_mutex").unwrap(), "1\n");
    assert_eq!(ctx.registry().refcount(TagProtocol::Brcm), 2);
    assert_eq!(ctx.links().len(), 2);
}
