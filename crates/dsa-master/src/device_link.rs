//! Supplier/consumer links between devices.
//!
//! A switch depends on the hardware device behind its master: while a
//! link exists, the master's device must not go away before the switch.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
struct LinkEntry {
    id: u64,
    consumer: String,
    supplier: String,
}

/// Registry of live device links.
#[derive(Debug, Default)]
pub struct DeviceLinks {
    inner: Mutex<LinkTable>,
}

#[derive(Debug, Default)]
struct LinkTable {
    next_id: u64,
    links: Vec<LinkEntry>,
}

impl DeviceLinks {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Links `consumer` to `supplier`. Returns `None` when no link can be
    /// made: the supplier is unknown or names the consumer itself.
    pub fn add(self: &Arc<Self>, consumer: &str, supplier: Option<&str>) -> Option<DeviceLink> {
        let supplier = supplier.filter(|s| !s.is_empty() && *s != consumer)?;
        let mut table = self.inner.lock();
        table.next_id += 1;
        let id = table.next_id;
        table.links.push(LinkEntry {
            id,
            consumer: consumer.to_string(),
            supplier: supplier.to_string(),
        });
        debug!(consumer, supplier, "Added device link");
        Some(DeviceLink {
            id,
            registry: Arc::downgrade(self),
        })
    }

    pub fn contains(&self, consumer: &str, supplier: &str) -> bool {
        self.inner
            .lock()
            .links
            .iter()
            .any(|l| l.consumer == consumer && l.supplier == supplier)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn remove(&self, id: u64) {
        self.inner.lock().links.retain(|l| l.id != id);
    }
}

/// A live device link. Dropping it removes the link.
#[derive(Debug)]
pub struct DeviceLink {
    id: u64,
    registry: Weak<DeviceLinks>,
}

impl Drop for DeviceLink {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
        }
    }
}
