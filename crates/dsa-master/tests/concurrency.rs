//! Concurrent use of the registry, the attribute surface and the clock
//! share lock.

use std::thread;
use std::time::Duration;

use dsa_master::{ClockShareLock, TagRegistry};
use dsa_sim::SimBench;
use dsa_types::TagProtocol;
use pretty_assertions::assert_eq;

const ROUNDS: usize = 500;

#[test]
fn test_handle_clones_across_threads_stay_balanced() {
    let registry = TagRegistry::with_builtin();
    let handle = registry.get_by_protocol(TagProtocol::Dsa).unwrap();

    thread::scope(|s| {
        for _ in 0..8 {
            s.spawn(|| {
                let mut held = Vec::new();
                for i in 0..ROUNDS {
                    held.push(handle.clone());
                    if i % 3 == 0 {
                        held.clear();
                    }
                }
            });
            s.spawn(|| {
                for _ in 0..ROUNDS {
                    let found = registry.find_by_name("dsa\n").unwrap();
                    assert_eq!(found.protocol(), TagProtocol::Dsa);
                }
            });
        }
    });

    assert_eq!(registry.refcount(TagProtocol::Dsa), 1);
    drop(handle);
    assert_eq!(registry.refcount(TagProtocol::Dsa), 0);
}

#[test]
fn test_racing_tagging_cpu_stores_settle_on_one_protocol() {
    for _ in 0..32 {
        let bench = SimBench::new();
        bench.attach().unwrap();
        let registry = bench.context().registry();

        thread::scope(|s| {
            s.spawn(|| bench.store("tagging_cpu", "dsa\n").unwrap());
            s.spawn(|| bench.store("tagging_cpu", "edsa\n").unwrap());
        });

        let active = bench.cpu_port().tag_protocol().unwrap();
        let (other, mtu) = match active {
            TagProtocol::Dsa => (TagProtocol::Edsa, 1504),
            TagProtocol::Edsa => (TagProtocol::Dsa, 1508),
            unexpected => panic!("unexpected protocol {unexpected}"),
        };
        assert_eq!(bench.show("tagging_cpu").unwrap(), format!("{active}\n"));
        assert_eq!(registry.refcount(active), 1);
        assert_eq!(registry.refcount(other), 0);
        assert_eq!(registry.refcount(TagProtocol::Brcm), 0);
        assert_eq!(bench.master.mtu(), mtu);
        assert_eq!(bench.master.promiscuity(), 0);
        assert!(!bench.context().net().is_locked());

        bench.detach().unwrap();
    }
}

#[test]
fn test_flag_never_changes_under_a_held_guard() {
    let lock = ClockShareLock::with_settle_delay(Duration::ZERO);

    thread::scope(|s| {
        s.spawn(|| {
            for i in 0..ROUNDS {
                lock.set_flag_and_release(i % 2 == 0);
            }
            lock.set_flag_and_release(false);
        });
        s.spawn(|| {
            for _ in 0..ROUNDS {
                let guard = lock.lock();
                let before = lock.is_shorted();
                thread::yield_now();
                assert_eq!(lock.is_shorted(), before);
                drop(guard);
            }
        });
    });

    assert!(!lock.is_shorted());
    assert!(!lock.is_locked());
}
