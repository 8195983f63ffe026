//! Attribute control surface published on a DSA master.
//!
//! The `dsa` group exposes text attributes for reading and changing the
//! tagging protocol, per-port VLAN membership, raw switch register access
//! and the clock-share flag. Reads return newline-terminated text; writes
//! return the number of bytes consumed.

use std::fmt::Write as _;
use std::sync::Arc;

use dsa_switch::{DsaError, DsaResult, RegisterSelect};
use dsa_types::TagProtocol;
use tracing::{debug, info};

use crate::master::MasterBinding;
use crate::netdev::MasterDevice;
use crate::tree::{PendingTagChange, TagChangeOutcome};

/// Name of the group published on every DSA master.
pub const DSA_GROUP: &str = "dsa";

/// One text attribute.
pub trait DeviceAttribute: Send + Sync {
    fn name(&self) -> &'static str;

    fn show(&self, dev: &MasterDevice) -> DsaResult<String>;

    fn store(&self, dev: &MasterDevice, buf: &str) -> DsaResult<usize>;
}

/// A named set of attributes published together.
pub struct AttributeGroup {
    name: &'static str,
    attrs: Vec<Box<dyn DeviceAttribute>>,
}

impl AttributeGroup {
    pub fn new(name: &'static str, attrs: Vec<Box<dyn DeviceAttribute>>) -> Self {
        Self { name, attrs }
    }

    /// The `dsa` group.
    pub fn dsa() -> Self {
        Self::new(
            DSA_GROUP,
            vec![
                Box::new(TaggingCpu),
                Box::new(TaggingImp),
                Box::new(Pvlan),
                Box::new(RdReg),
                Box::new(WrReg),
                Box::new(SpiMutex),
            ],
        )
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn attribute_names(&self) -> Vec<&'static str> {
        self.attrs.iter().map(|a| a.name()).collect()
    }

    fn find(&self, attr: &str) -> DsaResult<&dyn DeviceAttribute> {
        self.attrs
            .iter()
            .find(|a| a.name() == attr)
            .map(|a| a.as_ref())
            .ok_or_else(|| {
                DsaError::invalid_argument(format!("no attribute {}/{}", self.name, attr))
            })
    }

    pub fn show(&self, dev: &MasterDevice, attr: &str) -> DsaResult<String> {
        self.find(attr)?.show(dev)
    }

    pub fn store(&self, dev: &MasterDevice, attr: &str, buf: &str) -> DsaResult<usize> {
        self.find(attr)?.store(dev, buf)
    }
}

impl std::fmt::Debug for AttributeGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttributeGroup")
            .field("name", &self.name)
            .field("attrs", &self.attribute_names())
            .finish()
    }
}

fn binding(dev: &MasterDevice) -> DsaResult<Arc<MasterBinding>> {
    dev.dsa_binding()
        .ok_or_else(|| DsaError::not_supported(format!("{} is not a DSA master", dev.name())))
}

/// Switch failures other than a missing operation surface as I/O errors.
fn as_io(err: DsaError) -> DsaError {
    if err.is_not_supported() {
        err
    } else {
        DsaError::io(err.to_string())
    }
}

/// Splits a written value into exactly `n` colon-separated fields.
/// Surrounding whitespace and a trailing NUL are ignored.
fn fields(buf: &str, n: usize) -> DsaResult<Vec<&str>> {
    let text = buf.trim_end_matches('\0').trim();
    let parts: Vec<&str> = text.split(':').map(str::trim).collect();
    if parts.len() != n || parts.iter().any(|p| p.is_empty()) {
        return Err(DsaError::invalid_argument(format!(
            "expected {n} ':'-separated fields, got {text:?}"
        )));
    }
    Ok(parts)
}

fn hex_digits(field: &str) -> &str {
    field
        .strip_prefix("0x")
        .or_else(|| field.strip_prefix("0X"))
        .unwrap_or(field)
}

fn parse_hex_u8(field: &str) -> DsaResult<u8> {
    u8::from_str_radix(hex_digits(field), 16)
        .map_err(|_| DsaError::invalid_argument(format!("bad 8-bit hex value {field:?}")))
}

fn parse_hex_u16(field: &str) -> DsaResult<u16> {
    u16::from_str_radix(hex_digits(field), 16)
        .map_err(|_| DsaError::invalid_argument(format!("bad 16-bit hex value {field:?}")))
}

fn parse_hex_u64(field: &str) -> DsaResult<u64> {
    u64::from_str_radix(hex_digits(field), 16)
        .map_err(|_| DsaError::invalid_argument(format!("bad 64-bit hex value {field:?}")))
}

/// `tagging_cpu`: the protocol spoken on the CPU port.
pub struct TaggingCpu;

impl DeviceAttribute for TaggingCpu {
    fn name(&self) -> &'static str {
        "tagging_cpu"
    }

    fn show(&self, dev: &MasterDevice) -> DsaResult<String> {
        let binding = binding(dev)?;
        let proto = binding
            .cpu_port()
            .tag_protocol()
            .ok_or_else(|| DsaError::protocol_unavailable("cpu port has no tagger"))?;
        Ok(format!("{proto}\n"))
    }

    fn store(&self, dev: &MasterDevice, buf: &str) -> DsaResult<usize> {
        let binding = binding(dev)?;
        let ctx = binding.context();
        let change = PendingTagChange::resolve(ctx.registry(), buf)?;
        match change.commit(binding.tree(), ctx.net(), dev) {
            TagChangeOutcome::Unchanged => {
                debug!(master = dev.name(), "Tagging protocol unchanged");
            }
            TagChangeOutcome::Committed { from, to } => {
                info!(master = dev.name(), %from, %to, "Changed CPU port tagging protocol");
            }
            TagChangeOutcome::RolledBack { error, .. } => return Err(error),
        }
        Ok(buf.len())
    }
}

/// `tagging_imp`: the protocol spoken on the management port.
pub struct TaggingImp;

impl DeviceAttribute for TaggingImp {
    fn name(&self) -> &'static str {
        "tagging_imp"
    }

    fn show(&self, dev: &MasterDevice) -> DsaResult<String> {
        let binding = binding(dev)?;
        let proto = binding
            .cpu_port()
            .switch()
            .ops()
            .get_tag_protocol(binding.imp_port(), TagProtocol::None);
        let tagger = binding.context().registry().get_by_protocol(proto)?;
        Ok(format!("{}\n", tagger.name()))
    }

    fn store(&self, dev: &MasterDevice, buf: &str) -> DsaResult<usize> {
        let binding = binding(dev)?;
        let new = binding.context().registry().find_by_name(buf)?;
        binding
            .cpu_port()
            .switch()
            .ops()
            .change_tag_protocol(binding.imp_port(), new.protocol())?;
        info!(master = dev.name(), port = binding.imp_port(), tagger = new.name(),
            "Changed management port tagging protocol");
        Ok(buf.len())
    }
}

/// `pvlan`: per-port VLAN membership masks.
pub struct Pvlan;

impl DeviceAttribute for Pvlan {
    fn name(&self) -> &'static str {
        "pvlan"
    }

    fn show(&self, dev: &MasterDevice) -> DsaResult<String> {
        let binding = binding(dev)?;
        let mut out = String::new();
        for dp in binding.tree().ports().iter().filter(|dp| !dp.kind().is_unused()) {
            let members = dp.switch().ops().port_get_pvlan(dp.index())?;
            // Writing into a String cannot fail.
            let _ = write!(out, "{}:{:03x} ", dp.index(), members);
        }
        out.push('\n');
        Ok(out)
    }

    fn store(&self, dev: &MasterDevice, buf: &str) -> DsaResult<usize> {
        let binding = binding(dev)?;
        let parts = fields(buf, 2)?;
        let port: usize = parts[0]
            .parse()
            .map_err(|_| DsaError::invalid_argument(format!("bad port index {:?}", parts[0])))?;
        let members = parse_hex_u16(parts[1])?;

        let tree = binding.tree();
        let dp = tree
            .ports()
            .iter()
            .find(|dp| dp.index() == port && !dp.kind().is_unused())
            .ok_or_else(|| DsaError::invalid_argument(format!("no port {port} in tree")))?;
        dp.switch().ops().port_change_pvlan(port, members)?;
        debug!(master = dev.name(), port, members, "Changed port VLAN membership");
        Ok(buf.len())
    }
}

/// `rdreg`: reads the register selected by the last write.
pub struct RdReg;

impl DeviceAttribute for RdReg {
    fn name(&self) -> &'static str {
        "rdreg"
    }

    fn show(&self, dev: &MasterDevice) -> DsaResult<String> {
        let binding = binding(dev)?;
        let value = binding
            .cpu_port()
            .switch()
            .ops()
            .switch_get_reg()
            .map_err(as_io)?;
        Ok(format!("{}\n", value.to_hex()?))
    }

    fn store(&self, dev: &MasterDevice, buf: &str) -> DsaResult<usize> {
        let binding = binding(dev)?;
        let parts = fields(buf, 3)?;
        let select = RegisterSelect::new(
            parse_hex_u8(parts[0])?,
            parse_hex_u8(parts[1])?,
            parse_hex_u8(parts[2])?,
        );
        binding
            .cpu_port()
            .switch()
            .ops()
            .switch_setup_get_reg(select)
            .map_err(as_io)?;
        Ok(buf.len())
    }
}

/// `wrreg`: writes a switch register. Not readable.
pub struct WrReg;

impl DeviceAttribute for WrReg {
    fn name(&self) -> &'static str {
        "wrreg"
    }

    fn show(&self, _dev: &MasterDevice) -> DsaResult<String> {
        Err(DsaError::permission_denied(self.name()))
    }

    fn store(&self, dev: &MasterDevice, buf: &str) -> DsaResult<usize> {
        let binding = binding(dev)?;
        let parts = fields(buf, 4)?;
        let select = RegisterSelect::new(
            parse_hex_u8(parts[0])?,
            parse_hex_u8(parts[1])?,
            parse_hex_u8(parts[2])?,
        );
        let value = parse_hex_u64(parts[3])?;
        binding
            .cpu_port()
            .switch()
            .ops()
            .switch_set_reg(select, value)
            .map_err(as_io)?;
        debug!(master = dev.name(), %select, value, "Wrote switch register");
        Ok(buf.len())
    }
}

/// `spi_mutex`: whether the switch clock is shared with a sensor.
pub struct SpiMutex;

impl SpiMutex {
    fn parse(buf: &str) -> DsaResult<bool> {
        let token = match buf.len() {
            1 => buf,
            2 => buf
                .strip_suffix('\n')
                .or_else(|| buf.strip_suffix('\0'))
                .ok_or_else(|| DsaError::invalid_argument(format!("bad flag {buf:?}")))?,
            _ => return Err(DsaError::invalid_argument(format!("bad flag {buf:?}"))),
        };
        match token {
            "0" => Ok(false),
            "1" => Ok(true),
            _ => Err(DsaError::invalid_argument(format!("bad flag {buf:?}"))),
        }
    }
}

impl DeviceAttribute for SpiMutex {
    fn name(&self) -> &'static str {
        "spi_mutex"
    }

    fn show(&self, dev: &MasterDevice) -> DsaResult<String> {
        let binding = binding(dev)?;
        let shorted = binding.context().clock_share().is_shorted();
        Ok(format!("{}\n", u8::from(shorted)))
    }

    fn store(&self, dev: &MasterDevice, buf: &str) -> DsaResult<usize> {
        let binding = binding(dev)?;
        let shorted = Self::parse(buf)?;
        binding.context().clock_share().set_flag_and_release(shorted);
        Ok(buf.len())
    }
}
