//! Hardware timestamping configuration (`struct hwtstamp_config`).

/// Timestamping configuration exchanged through `SIOC[GS]HWTSTAMP`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HwTstampConfig {
    pub flags: u32,
    pub tx_type: u32,
    pub rx_filter: u32,
}

impl HwTstampConfig {
    /// `HWTSTAMP_TX_OFF`
    pub const TX_OFF: u32 = 0;
    /// `HWTSTAMP_TX_ON`
    pub const TX_ON: u32 = 1;
    /// `HWTSTAMP_FILTER_NONE`
    pub const FILTER_NONE: u32 = 0;
    /// `HWTSTAMP_FILTER_ALL`
    pub const FILTER_ALL: u32 = 1;

    /// Returns true if either direction is timestamping.
    pub fn is_enabled(&self) -> bool {
        self.tx_type != Self::TX_OFF || self.rx_filter != Self::FILTER_NONE
    }
}
