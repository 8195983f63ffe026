//! Configuration file support for dsactl
//!
//! Loads and validates the description of a DSA system from TOML.
//! Default location: /etc/dsa/dsactl.toml

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use dsa_master::{DEFAULT_IMP_PORT, ETH_DATA_LEN};
use dsa_types::{PortType, TagProtocol};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ConfigError, Result};

/// Default configuration file location
pub const DEFAULT_CONFIG_PATH: &str = "/etc/dsa/dsactl.toml";

/// Smallest MTU an Ethernet master may be configured with
const MIN_MTU: u32 = 68;

/// Master network device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MasterSection {
    /// Interface name
    #[serde(default = "default_master_name")]
    pub name: String,

    /// Hardware device backing the interface
    #[serde(default = "default_parent")]
    pub parent: Option<String>,

    /// Driver name reported by ethtool
    #[serde(default = "default_driver")]
    pub driver: String,

    /// MTU before the master is attached
    #[serde(default = "default_mtu")]
    pub mtu: u32,

    /// Largest MTU the driver accepts
    #[serde(default = "default_max_mtu")]
    pub max_mtu: u32,

    /// Whether a PHY is attached to the MAC
    #[serde(default)]
    pub has_phy: bool,

    /// Port addressed by `tagging_imp`
    #[serde(default = "default_imp_port")]
    pub imp_port: usize,
}

/// One switch port
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortSection {
    /// Port number within its switch
    pub index: usize,

    /// Port role
    #[serde(rename = "type", default)]
    pub kind: PortType,

    /// User-visible label
    #[serde(default)]
    pub name: Option<String>,

    /// Initial VLAN membership mask
    #[serde(default)]
    pub pvlan: Option<u16>,

    /// Whether the port has its own timestamping unit
    #[serde(default)]
    pub hwtstamp: bool,

    /// ethtool counters the switch reports for this port
    #[serde(default)]
    pub stats: Vec<String>,
}

/// One switch chip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchSection {
    /// Device name of the switch
    pub name: String,

    /// Tagging protocol the switch prefers
    #[serde(default = "default_tag_protocol")]
    pub tag_protocol: TagProtocol,

    /// Whether the switch can change tagging protocols
    #[serde(default = "default_true")]
    pub tag_change: bool,

    /// Whether raw register access is available
    #[serde(default = "default_true")]
    pub registers: bool,

    /// Size of the per-port register dump
    #[serde(default)]
    pub regs_len: usize,

    #[serde(default)]
    pub ports: Vec<PortSection>,
}

/// Complete dsactl configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DsactlConfig {
    /// Protocol to run on CPU ports instead of the switch's preference
    #[serde(default)]
    pub tag_protocol: Option<TagProtocol>,

    #[serde(default)]
    pub master: MasterSection,

    #[serde(default = "default_switches")]
    pub switches: Vec<SwitchSection>,
}

// Default functions
fn default_master_name() -> String {
    "eth0".to_string()
}

fn default_parent() -> Option<String> {
    Some("gmac0".to_string())
}

fn default_driver() -> String {
    "sim-gmac".to_string()
}

fn default_mtu() -> u32 {
    ETH_DATA_LEN
}

fn default_max_mtu() -> u32 {
    1536
}

fn default_imp_port() -> usize {
    DEFAULT_IMP_PORT
}

fn default_tag_protocol() -> TagProtocol {
    TagProtocol::Brcm
}

fn default_true() -> bool {
    true
}

fn default_switches() -> Vec<SwitchSection> {
    vec![SwitchSection::default()]
}

// Default implementations
impl Default for MasterSection {
    fn default() -> Self {
        Self {
            name: default_master_name(),
            parent: default_parent(),
            driver: default_driver(),
            mtu: default_mtu(),
            max_mtu: default_max_mtu(),
            has_phy: false,
            imp_port: default_imp_port(),
        }
    }
}

impl PortSection {
    pub fn new(index: usize, kind: PortType) -> Self {
        Self {
            index,
            kind,
            name: None,
            pvlan: None,
            hwtstamp: false,
            stats: Vec::new(),
        }
    }
}

impl Default for SwitchSection {
    /// A five-port switch with its CPU port on 8.
    fn default() -> Self {
        let mut ports: Vec<PortSection> = (0..5)
            .map(|i| {
                let mut port = PortSection::new(i, PortType::User);
                port.name = Some(format!("lan{}", i + 1));
                port.pvlan = Some(0x1ff);
                port
            })
            .collect();
        let mut cpu = PortSection::new(8, PortType::Cpu);
        cpu.pvlan = Some(0x1ff);
        cpu.stats = vec!["rx_octets".to_string(), "tx_octets".to_string()];
        ports.push(cpu);

        Self {
            name: "mdio_mux-0.1:00".to_string(),
            tag_protocol: default_tag_protocol(),
            tag_change: true,
            registers: true,
            regs_len: 0,
            ports,
        }
    }
}

impl Default for DsactlConfig {
    fn default() -> Self {
        Self {
            tag_protocol: None,
            master: MasterSection::default(),
            switches: default_switches(),
        }
    }
}

impl DsactlConfig {
    /// Load configuration from file, falling back to defaults if file not found
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        match fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| ConfigError::Parse {
                path: path.display().to_string(),
                message: e.to_string(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "Config file not found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(ConfigError::Io(e)),
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.master.name.is_empty() {
            return Err(ConfigError::invalid("master name must not be empty"));
        }
        if self.master.mtu < MIN_MTU {
            return Err(ConfigError::invalid(format!(
                "master mtu must be >= {MIN_MTU}"
            )));
        }
        if self.master.max_mtu < self.master.mtu {
            return Err(ConfigError::invalid("master max_mtu must be >= mtu"));
        }
        if self.switches.is_empty() {
            return Err(ConfigError::invalid("at least one switch is required"));
        }

        let mut cpu_ports = 0;
        for switch in &self.switches {
            if switch.name.is_empty() {
                return Err(ConfigError::invalid("switch name must not be empty"));
            }
            let mut seen = BTreeSet::new();
            for port in &switch.ports {
                if !seen.insert(port.index) {
                    return Err(ConfigError::invalid(format!(
                        "switch {} lists port {} twice",
                        switch.name, port.index
                    )));
                }
                if port.kind.is_cpu() {
                    cpu_ports += 1;
                }
                if port.kind.is_unused() && port.pvlan.is_some() {
                    return Err(ConfigError::invalid(format!(
                        "unused port {} of switch {} cannot carry a pvlan",
                        port.index, switch.name
                    )));
                }
            }
        }
        if cpu_ports == 0 {
            return Err(ConfigError::invalid("no CPU port configured"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = DsactlConfig::default();
        assert_eq!(config.master.name, "eth0");
        assert_eq!(config.master.imp_port, 8);
        assert_eq!(config.master.max_mtu, 1536);
        assert_eq!(config.switches.len(), 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_deserialization() {
        let toml_str = r#"
tag_protocol = "brcm-prepend"

[master]
name = "eth1"
has_phy = true

[[switches]]
name = "sw0"
tag_protocol = "dsa"
ports = [
    { index = 0, type = "user", name = "lan1", pvlan = 0x1ff },
    { index = 5, type = "unused" },
    { index = 6, type = "cpu", stats = ["in_good_octets"] },
]
"#;
        let config: DsactlConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.master.name, "eth1");
        assert!(config.master.has_phy);
        assert_eq!(config.master.parent.as_deref(), Some("gmac0"));
        assert_eq!(config.tag_protocol, Some(TagProtocol::BrcmPrepend));
        assert_eq!(config.switches[0].tag_protocol, TagProtocol::Dsa);
        assert!(config.switches[0].registers);
        assert_eq!(config.switches[0].ports[2].kind, PortType::Cpu);
        assert_eq!(config.switches[0].ports[0].pvlan, Some(0x1ff));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_tag_protocol_rejected() {
        let toml_str = r#"
[[switches]]
name = "sw0"
tag_protocol = "Brcm"
"#;
        assert!(toml::from_str::<DsactlConfig>(toml_str).is_err());
    }

    #[test]
    fn test_validate_requires_cpu_port() {
        let mut config = DsactlConfig::default();
        config.switches[0].ports.retain(|p| !p.kind.is_cpu());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_duplicate_port() {
        let mut config = DsactlConfig::default();
        config.switches[0]
            .ports
            .push(PortSection::new(0, PortType::User));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_mtu_bounds() {
        let mut config = DsactlConfig::default();
        config.master.max_mtu = 1400;
        assert!(config.validate().is_err());
        config.master.max_mtu = 1536;
        config.master.mtu = 10;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_nonexistent_file_defaults() {
        let config = DsactlConfig::load_or_default("/nonexistent/dsactl.toml").unwrap();
        assert_eq!(config, DsactlConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[master]\nname = \"lan0\"\nimp_port = 5").unwrap();
        let config = DsactlConfig::load_or_default(file.path()).unwrap();
        assert_eq!(config.master.name, "lan0");
        assert_eq!(config.master.imp_port, 5);
        assert_eq!(config.master.mtu, ETH_DATA_LEN);
    }

    #[test]
    fn test_load_malformed_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[master\nname = ").unwrap();
        assert!(matches!(
            DsactlConfig::load_or_default(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dsactl.toml");
        let mut config = DsactlConfig::default();
        config.tag_protocol = Some(TagProtocol::BrcmLegacy);
        config.save(&path).unwrap();

        let reloaded = DsactlConfig::load_or_default(&path).unwrap();
        assert_eq!(reloaded, config);
    }

    #[test]
    fn test_shipped_config_is_valid() {
        let config: DsactlConfig = toml::from_str(include_str!("../dsactl.toml")).unwrap();
        config.validate().unwrap();
        assert_eq!(config.tag_protocol, Some(TagProtocol::BrcmPrepend));
        assert!(config.master.has_phy);
        let ports = &config.switches[0].ports;
        assert_eq!(ports.len(), 6);
        assert_eq!(ports[3].pvlan, Some(0x108));
        assert_eq!(ports[4].kind, PortType::Unused);
    }
}
