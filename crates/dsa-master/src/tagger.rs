//! Tag protocol registry.
//!
//! Maps protocol names to descriptors and counts how many holders each
//! descriptor has. A holder is a [`TagHandle`]: acquiring one takes a
//! reference, dropping it releases the reference. A CPU port keeps one
//! handle for its active protocol; a protocol change briefly holds a
//! second handle for the candidate protocol.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use dsa_switch::{DsaError, DsaResult};
use dsa_types::TagProtocol;
use parking_lot::Mutex;
use tracing::debug;

/// Descriptor of one tagging protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagOps {
    proto: TagProtocol,
    overhead: usize,
    promisc_on_master: bool,
}

impl TagOps {
    pub const fn new(proto: TagProtocol, overhead: usize, promisc_on_master: bool) -> Self {
        Self {
            proto,
            overhead,
            promisc_on_master,
        }
    }

    /// Returns the built-in descriptor for `proto`.
    pub const fn builtin(proto: TagProtocol) -> Self {
        match proto {
            TagProtocol::None => TagOps::new(proto, 0, false),
            TagProtocol::Brcm => TagOps::new(proto, 4, false),
            TagProtocol::BrcmLegacy => TagOps::new(proto, 6, false),
            TagProtocol::BrcmPrepend => TagOps::new(proto, 4, true),
            TagProtocol::Dsa => TagOps::new(proto, 4, false),
            TagProtocol::Edsa => TagOps::new(proto, 8, false),
            TagProtocol::Qca => TagOps::new(proto, 2, false),
            TagProtocol::Trailer => TagOps::new(proto, 4, false),
            TagProtocol::Mtk => TagOps::new(proto, 4, false),
            TagProtocol::Ocelot => TagOps::new(proto, 16, true),
        }
    }

    pub fn protocol(&self) -> TagProtocol {
        self.proto
    }

    /// Canonical protocol name.
    pub fn name(&self) -> &'static str {
        self.proto.as_str()
    }

    /// Bytes the tag adds to every frame on the wire.
    pub fn overhead(&self) -> usize {
        self.overhead
    }

    /// True if the master must be promiscuous to receive tagged frames.
    pub fn promisc_on_master(&self) -> bool {
        self.promisc_on_master
    }
}

#[derive(Debug)]
struct RegistryEntry {
    ops: Arc<TagOps>,
    refs: usize,
}

/// Registry of loaded tagging protocols.
#[derive(Debug, Default)]
pub struct TagRegistry {
    entries: Mutex<BTreeMap<TagProtocol, RegistryEntry>>,
}

impl TagRegistry {
    /// Creates an empty registry.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Creates a registry with every built-in protocol loaded.
    pub fn with_builtin() -> Arc<Self> {
        let registry = Self::default();
        {
            let mut entries = registry.entries.lock();
            for proto in TagProtocol::ALL {
                entries.insert(
                    proto,
                    RegistryEntry {
                        ops: Arc::new(TagOps::builtin(proto)),
                        refs: 0,
                    },
                );
            }
        }
        Arc::new(registry)
    }

    /// Loads a protocol.
    ///
    /// # Errors
    ///
    /// Returns [`DsaError::AlreadyExists`] if the protocol is already loaded.
    pub fn register(&self, ops: TagOps) -> DsaResult<()> {
        let mut entries = self.entries.lock();
        if entries.contains_key(&ops.protocol()) {
            return Err(DsaError::already_exists(format!("tagger {}", ops.name())));
        }
        debug!(tagger = ops.name(), "Registered tagging protocol");
        entries.insert(
            ops.protocol(),
            RegistryEntry {
                ops: Arc::new(ops),
                refs: 0,
            },
        );
        Ok(())
    }

    /// Unloads a protocol.
    ///
    /// # Errors
    ///
    /// Returns [`DsaError::Busy`] while any handle to it is alive, and
    /// [`DsaError::ProtocolUnavailable`] if it is not loaded.
    pub fn unregister(&self, proto: TagProtocol) -> DsaResult<()> {
        let mut entries = self.entries.lock();
        match entries.get(&proto) {
            None => Err(DsaError::protocol_unavailable(proto.as_str())),
            Some(entry) if entry.refs > 0 => Err(DsaError::busy(format!(
                "tagger {} has {} holders",
                proto, entry.refs
            ))),
            Some(_) => {
                entries.remove(&proto);
                debug!(tagger = proto.as_str(), "Unregistered tagging protocol");
                Ok(())
            }
        }
    }

    /// Looks a protocol up by its canonical name and takes a reference.
    ///
    /// One trailing newline is ignored, so text written to a control
    /// point can be passed straight through. Matching is otherwise exact
    /// and case-sensitive.
    ///
    /// # Errors
    ///
    /// Returns [`DsaError::ProtocolUnavailable`] for an unknown name or a
    /// protocol that is not loaded.
    pub fn find_by_name(self: &Arc<Self>, name: &str) -> DsaResult<TagHandle> {
        let name = name.strip_suffix('\n').unwrap_or(name);
        let proto: TagProtocol = name
            .parse()
            .map_err(|_| DsaError::protocol_unavailable(name))?;
        self.get_by_protocol(proto)
    }

    /// Takes a reference to a loaded protocol by id.
    pub fn get_by_protocol(self: &Arc<Self>, proto: TagProtocol) -> DsaResult<TagHandle> {
        let mut entries = self.entries.lock();
        let entry = entries
            .get_mut(&proto)
            .ok_or_else(|| DsaError::protocol_unavailable(proto.as_str()))?;
        entry.refs += 1;
        Ok(TagHandle {
            ops: Arc::clone(&entry.ops),
            registry: Arc::clone(self),
        })
    }

    /// Current number of live handles for `proto`.
    pub fn refcount(&self, proto: TagProtocol) -> usize {
        self.entries.lock().get(&proto).map_or(0, |e| e.refs)
    }

    /// Loaded protocols, in id order.
    pub fn protocols(&self) -> Vec<TagProtocol> {
        self.entries.lock().keys().copied().collect()
    }

    fn put(&self, proto: TagProtocol) {
        if let Some(entry) = self.entries.lock().get_mut(&proto) {
            entry.refs = entry.refs.saturating_sub(1);
        }
    }
}

/// A counted reference to a loaded tagging protocol.
///
/// Dropping the handle releases the reference. Cloning takes another one.
pub struct TagHandle {
    ops: Arc<TagOps>,
    registry: Arc<TagRegistry>,
}

impl TagHandle {
    /// Returns the descriptor without taking a reference.
    pub fn ops(&self) -> &Arc<TagOps> {
        &self.ops
    }
}

impl Deref for TagHandle {
    type Target = TagOps;

    fn deref(&self) -> &TagOps {
        &self.ops
    }
}

impl Clone for TagHandle {
    fn clone(&self) -> Self {
        if let Some(entry) = self.registry.entries.lock().get_mut(&self.ops.protocol()) {
            entry.refs += 1;
        }
        Self {
            ops: Arc::clone(&self.ops),
            registry: Arc::clone(&self.registry),
        }
    }
}

impl Drop for TagHandle {
    fn drop(&mut self) {
        self.registry.put(self.ops.protocol());
    }
}

impl PartialEq for TagHandle {
    fn eq(&self, other: &Self) -> bool {
        self.ops.protocol() == other.ops.protocol()
    }
}

impl fmt::Debug for TagHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TagHandle").field(&self.ops.name()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_by_name_counts_references() {
        let registry = TagRegistry::with_builtin();
        let handle = registry.find_by_name("brcm").unwrap();
        assert_eq!(handle.protocol(), TagProtocol::Brcm);
        assert_eq!(handle.overhead(), 4);
        assert_eq!(registry.refcount(TagProtocol::Brcm), 1);

        let second = handle.clone();
        assert_eq!(registry.refcount(TagProtocol::Brcm), 2);

        drop(handle);
        drop(second);
        assert_eq!(registry.refcount(TagProtocol::Brcm), 0);
    }

    #[test]
    fn test_find_by_name_accepts_trailing_newline_only() {
        let registry = TagRegistry::with_builtin();
        assert!(registry.find_by_name("edsa\n").is_ok());
        assert!(matches!(
            registry.find_by_name("EDSA"),
            Err(DsaError::ProtocolUnavailable { .. })
        ));
        assert!(registry.find_by_name(" edsa").is_err());
    }

    #[test]
    fn test_unloaded_protocol_is_unavailable() {
        let registry = TagRegistry::new();
        assert!(matches!(
            registry.find_by_name("dsa"),
            Err(DsaError::ProtocolUnavailable { .. })
        ));

        let dsa = TagOps::builtin(TagProtocol::Dsa);
        registry.register(dsa).unwrap();
        assert!(registry.find_by_name("dsa").is_ok());

        let again = registry.register(TagOps::builtin(TagProtocol::Dsa));
        assert!(matches!(again, Err(DsaError::AlreadyExists { .. })));
    }

    #[test]
    fn test_unregister_refused_while_held() {
        let registry = TagRegistry::with_builtin();
        let handle = registry.get_by_protocol(TagProtocol::Qca).unwrap();
        assert!(matches!(
            registry.unregister(TagProtocol::Qca),
            Err(DsaError::Busy { .. })
        ));
        drop(handle);
        assert!(registry.unregister(TagProtocol::Qca).is_ok());
        assert!(!registry.protocols().contains(&TagProtocol::Qca));
    }

    #[test]
    fn test_builtin_descriptors() {
        assert!(TagOps::builtin(TagProtocol::BrcmPrepend).promisc_on_master());
        assert!(!TagOps::builtin(TagProtocol::Brcm).promisc_on_master());
        assert_eq!(TagOps::builtin(TagProtocol::Edsa).overhead(), 8);
        assert_eq!(TagOps::builtin(TagProtocol::None).overhead(), 0);
    }
}
