//! Tagging protocol identifiers.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of a switch tagging protocol.
///
/// The string form is the canonical protocol name as shown by the
/// `tagging_cpu` and `tagging_imp` control points. Names are matched
/// case-sensitively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TagProtocol {
    /// Untagged operation.
    None,
    /// Broadcom tag after the source MAC.
    Brcm,
    /// Broadcom legacy (BCM5325/5365) tag.
    BrcmLegacy,
    /// Broadcom tag prepended before the destination MAC.
    BrcmPrepend,
    /// Marvell DSA tag.
    Dsa,
    /// Marvell ethertype DSA tag.
    Edsa,
    /// Qualcomm Atheros header.
    Qca,
    /// Micrel trailer tag.
    Trailer,
    /// MediaTek tag.
    Mtk,
    /// Ocelot injection/extraction header.
    Ocelot,
}

impl TagProtocol {
    /// All known protocol identifiers, in registry order.
    pub const ALL: [TagProtocol; 10] = [
        TagProtocol::None,
        TagProtocol::Brcm,
        TagProtocol::BrcmLegacy,
        TagProtocol::BrcmPrepend,
        TagProtocol::Dsa,
        TagProtocol::Edsa,
        TagProtocol::Qca,
        TagProtocol::Trailer,
        TagProtocol::Mtk,
        TagProtocol::Ocelot,
    ];

    /// Returns the canonical protocol name.
    pub const fn as_str(&self) -> &'static str {
        match self {
            TagProtocol::None => "none",
            TagProtocol::Brcm => "brcm",
            TagProtocol::BrcmLegacy => "brcm-legacy",
            TagProtocol::BrcmPrepend => "brcm-prepend",
            TagProtocol::Dsa => "dsa",
            TagProtocol::Edsa => "edsa",
            TagProtocol::Qca => "qca",
            TagProtocol::Trailer => "trailer",
            TagProtocol::Mtk => "mtk",
            TagProtocol::Ocelot => "ocelot",
        }
    }
}

impl fmt::Display for TagProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TagProtocol {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TagProtocol::ALL
            .iter()
            .copied()
            .find(|proto| proto.as_str() == s)
            .ok_or_else(|| ParseError::InvalidTagProtocol(s.to_string()))
    }
}

impl TryFrom<String> for TagProtocol {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TagProtocol> for String {
    fn from(proto: TagProtocol) -> Self {
        proto.as_str().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_are_case_sensitive() {
        assert_eq!("brcm".parse::<TagProtocol>().unwrap(), TagProtocol::Brcm);
        assert!("BRCM".parse::<TagProtocol>().is_err());
        assert!("brcm\n".parse::<TagProtocol>().is_err());
    }

    #[test]
    fn test_all_names_parse_back() {
        for proto in TagProtocol::ALL {
            assert_eq!(proto.as_str().parse::<TagProtocol>().unwrap(), proto);
        }
    }
}
