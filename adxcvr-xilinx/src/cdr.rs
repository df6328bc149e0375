//! RX clock data recovery and equalizer mode.

use adxcvr_io::{Backend, Controller, DrpPort, Hex, units::Khz};
use eyre::Result;
use tracing::debug;

use crate::{
    Encoding, Error, RefclkPpm, Xcvr, XcvrType,
    drp,
    pll::OutDiv,
};

const RXCDR_CFG0: u16 = 0xa8;
const RXCDR_CFG1: u16 = 0xa9;
const RXCDR_CFG2: u16 = 0xaa;
const RXCDR_CFG3: u16 = 0xab;
const RXCDR_CFG4: u16 = 0xac;
const RXCDR_CFG4_MASK: u16 = 0x00ff;

const RX_DFE_LPM_CFG: u16 = 0x029;
const RX_DFE_LPM_CFG_LPM: u16 = 0x0104;
const RX_DFE_LPM_CFG_DFE: u16 = 0x0954;

/// Above this lane rate at full rate, GTX2 needs the high-rate CFG4 setting.
const GTX2_CDR_FAST_LANE_RATE: Khz = Khz(6_600_000);

/// One row of the GTX2 RXCDR_CFG1 table. `None` matches anything.
struct Cfg1Row {
    out_div: u32,
    encoding: Encoding,
    ppm: Option<RefclkPpm>,
    fast: Option<bool>,
    lpm: Option<bool>,
    cfg1: u16,
}

const fn row(out_div: u32, encoding: Encoding, cfg1: u16) -> Cfg1Row {
    Cfg1Row {
        out_div,
        encoding,
        ppm: None,
        fast: None,
        lpm: None,
        cfg1,
    }
}

// Checked in order, first match wins.
const GTX2_CFG1: &[Cfg1Row] = &[
    row(1, Encoding::Enc8b10b, 0x1040),
    row(2, Encoding::Enc8b10b, 0x1020),
    row(4, Encoding::Enc8b10b, 0x1010),
    row(8, Encoding::Enc8b10b, 0x1008),
    Cfg1Row {
        ppm: Some(RefclkPpm::Pm1250),
        ..row(1, Encoding::Enc64b66b, 0x1020)
    },
    Cfg1Row {
        fast: Some(true),
        ..row(1, Encoding::Enc64b66b, 0x1040)
    },
    Cfg1Row {
        lpm: Some(true),
        ..row(1, Encoding::Enc64b66b, 0x1020)
    },
    Cfg1Row {
        lpm: Some(false),
        ..row(1, Encoding::Enc64b66b, 0x2040)
    },
    row(2, Encoding::Enc64b66b, 0x4020),
    row(4, Encoding::Enc64b66b, 0x4010),
    row(8, Encoding::Enc64b66b, 0x4008),
];

/// The five RXCDR_CFG words for a GTX2 channel.
fn gtx2_cdr_cfg(
    xcvr: &Xcvr,
    lane_rate: Khz,
    out_div: OutDiv,
    lpm: bool,
) -> Result<[u16; 5], Error> {
    let fast = lane_rate > GTX2_CDR_FAST_LANE_RATE;
    let Some(row) = GTX2_CFG1.iter().find(|row| {
        row.out_div == out_div.0
            && row.encoding == xcvr.encoding
            && row.ppm.is_none_or(|ppm| ppm == xcvr.refclk_ppm)
            && row.fast.is_none_or(|f| f == fast)
            && row.lpm.is_none_or(|l| l == lpm)
    }) else {
        return Err(Error::InvalidDivider {
            what: "CDR output",
            value: out_div.0,
        });
    };

    let cfg3 = match xcvr.refclk_ppm {
        RefclkPpm::Pm200 => 0x0000,
        RefclkPpm::Pm700 | RefclkPpm::Pm1250 => 0x8000,
    };
    let cfg4 = if fast && out_div.0 == 1 { 0x0b } else { 0x03 };
    Ok([0x0020, row.cfg1, 0x23ff, cfg3, cfg4])
}

/// Program the GTX2 RX CDR for `lane_rate`. UltraScale parts need nothing.
pub fn configure_cdr(
    cont: &mut Controller<impl Backend>,
    xcvr: &Xcvr,
    port: DrpPort,
    lane_rate: Khz,
    out_div: OutDiv,
    lpm: bool,
) -> Result<()> {
    match xcvr.ty {
        XcvrType::S7Gtx2 => {}
        XcvrType::UsGth3 | XcvrType::UsGth4 | XcvrType::UsGty4 => return Ok(()),
    }

    let [cfg0, cfg1, cfg2, cfg3, cfg4] = gtx2_cdr_cfg(xcvr, lane_rate, out_div, lpm)?;
    debug!(%port, cfg1 = %Hex(cfg1), cfg4, "cdr");
    drp::write(cont, port, RXCDR_CFG0, cfg0)?;
    drp::write(cont, port, RXCDR_CFG1, cfg1)?;
    drp::write(cont, port, RXCDR_CFG2, cfg2)?;
    drp::write(cont, port, RXCDR_CFG3, cfg3)?;
    drp::update(cont, port, RXCDR_CFG4, RXCDR_CFG4_MASK, cfg4)
}

/// Select LPM (`true`) or DFE equalization. UltraScale parts need nothing.
pub fn configure_lpm_dfe_mode(
    cont: &mut Controller<impl Backend>,
    xcvr: &Xcvr,
    port: DrpPort,
    lpm: bool,
) -> Result<()> {
    match xcvr.ty {
        XcvrType::S7Gtx2 => {
            let val = if lpm {
                RX_DFE_LPM_CFG_LPM
            } else {
                RX_DFE_LPM_CFG_DFE
            };
            drp::write(cont, port, RX_DFE_LPM_CFG, val)
        }
        XcvrType::UsGth3 | XcvrType::UsGth4 | XcvrType::UsGty4 => Ok(()),
    }
}
