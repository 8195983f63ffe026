//! ethtool string sets and fixed-size records.
//!
//! The master proxy splices two records between the master's own register
//! dump and the switch's CPU-port dump. Their sizes must match what
//! `get_regs_len` reports, so they are fixed here.

use crate::ParseError;
use byteorder::{ByteOrder, NativeEndian};
use std::fmt;
use std::str::FromStr;

/// Width of one ethtool string slot, in bytes.
pub const ETH_GSTRING_LEN: usize = 32;

/// Size of an encoded `ethtool_drvinfo` record.
pub const DRVINFO_LEN: usize = 196;

/// Size of an encoded `ethtool_regs` header.
pub const REGS_HEADER_LEN: usize = 12;

/// ethtool command code for a driver-info record.
pub const ETHTOOL_GDRVINFO: u32 = 0x0000_0003;

/// ethtool command code for a register dump.
pub const ETHTOOL_GREGS: u32 = 0x0000_0004;

const DRVINFO_FIELD_LEN: usize = 32;

/// Identifier of an ethtool string/statistic set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum StringSet {
    Test = 0,
    Stats = 1,
    PrivFlags = 2,
    NtupleFilters = 3,
    Features = 4,
    RssHashFuncs = 5,
    Tunables = 6,
    PhyStats = 7,
}

impl StringSet {
    /// Creates a string set from its raw ethtool id.
    pub fn from_raw(raw: u32) -> Option<Self> {
        Some(match raw {
            0 => StringSet::Test,
            1 => StringSet::Stats,
            2 => StringSet::PrivFlags,
            3 => StringSet::NtupleFilters,
            4 => StringSet::Features,
            5 => StringSet::RssHashFuncs,
            6 => StringSet::Tunables,
            7 => StringSet::PhyStats,
            _ => return None,
        })
    }
}

impl fmt::Display for StringSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StringSet::Test => "test",
            StringSet::Stats => "stats",
            StringSet::PrivFlags => "priv-flags",
            StringSet::NtupleFilters => "ntuple-filters",
            StringSet::Features => "features",
            StringSet::RssHashFuncs => "rss-hash-funcs",
            StringSet::Tunables => "tunables",
            StringSet::PhyStats => "phy-stats",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for StringSet {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "test" => Ok(StringSet::Test),
            "stats" => Ok(StringSet::Stats),
            "priv-flags" => Ok(StringSet::PrivFlags),
            "ntuple-filters" => Ok(StringSet::NtupleFilters),
            "features" => Ok(StringSet::Features),
            "rss-hash-funcs" => Ok(StringSet::RssHashFuncs),
            "tunables" => Ok(StringSet::Tunables),
            "phy-stats" | "phy_stats" => Ok(StringSet::PhyStats),
            _ => Err(ParseError::InvalidStringSet(s.to_string())),
        }
    }
}

/// `ethtool_regs` header: command, dump version, dump length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EthtoolRegs {
    pub cmd: u32,
    pub version: u32,
    pub len: u32,
}

impl Default for EthtoolRegs {
    fn default() -> Self {
        Self {
            cmd: ETHTOOL_GREGS,
            version: 0,
            len: 0,
        }
    }
}

impl EthtoolRegs {
    /// Encodes the header into the first [`REGS_HEADER_LEN`] bytes of `buf`.
    ///
    /// # Panics
    ///
    /// Panics if `buf` is shorter than [`REGS_HEADER_LEN`].
    pub fn encode(&self, buf: &mut [u8]) {
        NativeEndian::write_u32(&mut buf[0..4], self.cmd);
        NativeEndian::write_u32(&mut buf[4..8], self.version);
        NativeEndian::write_u32(&mut buf[8..12], self.len);
    }

    /// Decodes a header from the first [`REGS_HEADER_LEN`] bytes of `buf`.
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < REGS_HEADER_LEN {
            return None;
        }
        Some(Self {
            cmd: NativeEndian::read_u32(&buf[0..4]),
            version: NativeEndian::read_u32(&buf[4..8]),
            len: NativeEndian::read_u32(&buf[8..12]),
        })
    }
}

/// Encodes an `ethtool_drvinfo` record naming `driver` into the first
/// [`DRVINFO_LEN`] bytes of `buf`. All other fields are zeroed.
///
/// The driver name is truncated to leave room for a terminating NUL.
///
/// # Panics
///
/// Panics if `buf` is shorter than [`DRVINFO_LEN`].
pub fn encode_drvinfo(driver: &str, buf: &mut [u8]) {
    let record = &mut buf[..DRVINFO_LEN];
    record.fill(0);
    NativeEndian::write_u32(&mut record[0..4], ETHTOOL_GDRVINFO);
    let name = driver.as_bytes();
    let n = name.len().min(DRVINFO_FIELD_LEN - 1);
    record[4..4 + n].copy_from_slice(&name[..n]);
}

/// Reads the driver name back out of an encoded `ethtool_drvinfo` record.
pub fn decode_drvinfo_driver(buf: &[u8]) -> Option<String> {
    if buf.len() < DRVINFO_LEN {
        return None;
    }
    Some(gstring_to_str(&buf[4..4 + DRVINFO_FIELD_LEN]).to_string())
}

/// Returns the NUL-terminated prefix of a string slot as text.
pub fn gstring_to_str(slot: &[u8]) -> &str {
    let end = slot.iter().position(|&b| b == 0).unwrap_or(slot.len());
    std::str::from_utf8(&slot[..end]).unwrap_or("")
}

/// Writes `name` into a fixed-width string slot, truncating and
/// NUL-padding as needed.
pub fn write_gstring(slot: &mut [u8], name: &str) {
    slot.fill(0);
    let bytes = name.as_bytes();
    let n = bytes.len().min(slot.len().saturating_sub(1));
    slot[..n].copy_from_slice(&bytes[..n]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_string_set_raw_ids() {
        assert_eq!(StringSet::from_raw(1), Some(StringSet::Stats));
        assert_eq!(StringSet::from_raw(7), Some(StringSet::PhyStats));
        assert_eq!(StringSet::from_raw(42), None);
        assert_eq!(StringSet::PhyStats as u32, 7);
    }

    #[test]
    fn test_regs_header_encode_decode() {
        let regs = EthtoolRegs {
            cmd: ETHTOOL_GREGS,
            version: 3,
            len: 128,
        };
        let mut buf = [0u8; REGS_HEADER_LEN];
        regs.encode(&mut buf);
        assert_eq!(EthtoolRegs::decode(&buf), Some(regs));
        assert_eq!(EthtoolRegs::decode(&buf[..4]), None);
    }

    #[test]
    fn test_drvinfo_carries_driver_name() {
        let mut buf = vec![0xffu8; DRVINFO_LEN];
        encode_drvinfo("dsa", &mut buf);
        assert_eq!(decode_drvinfo_driver(&buf).as_deref(), Some("dsa"));
        assert_eq!(NativeEndian::read_u32(&buf[0..4]), ETHTOOL_GDRVINFO);
        assert!(buf[4 + 3..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_write_gstring_truncates_and_terminates() {
        let mut slot = [0xaau8; ETH_GSTRING_LEN];
        write_gstring(&mut slot, &"x".repeat(40));
        assert_eq!(gstring_to_str(&slot).len(), ETH_GSTRING_LEN - 1);
        assert_eq!(slot[ETH_GSTRING_LEN - 1], 0);
    }
}
