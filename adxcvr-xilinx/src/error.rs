use adxcvr_io::units::Khz;
use thiserror::Error;

use crate::XcvrType;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("{pll}: no setting for lane rate {lane_rate} with reference clock {refclk}")]
    NoPllSetting {
        pll: &'static str,
        refclk: Khz,
        lane_rate: Khz,
    },

    #[error("invalid {what} divider: {value}")]
    InvalidDivider { what: &'static str, value: u32 },

    #[error("unknown transceiver type code {code} (legacy: {legacy})")]
    UnknownType { code: u8, legacy: bool },

    #[error("unknown {what} field {raw:#06x}")]
    UnknownEncoding { what: &'static str, raw: u16 },

    #[error("{op} is not supported on {ty:?}")]
    Unsupported { op: &'static str, ty: XcvrType },

    #[error("no PRBSSEL encoding for {0}")]
    UnknownPrbs(u32),
}
