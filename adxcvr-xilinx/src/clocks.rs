//! Output, clk25, ProgDiv and gearbox settings of a channel.

use adxcvr_io::{Backend, Controller, DrpPort};
use eyre::Result;
use tracing::debug;

use crate::{
    Error, Side, Xcvr, XcvrType,
    drp::{self, Field},
    gth34, gtx2,
    pll::OutDiv,
};

pub fn read_out_div(
    cont: &mut Controller<impl Backend>,
    xcvr: &Xcvr,
    port: DrpPort,
    side: Side,
) -> Result<OutDiv> {
    match xcvr.ty {
        XcvrType::S7Gtx2 => gtx2::read_out_div(cont, port, side),
        XcvrType::UsGth3 | XcvrType::UsGth4 | XcvrType::UsGty4 => {
            gth34::read_out_div(cont, port, side)
        }
    }
}

/// `None` leaves that side untouched.
pub fn write_out_div(
    cont: &mut Controller<impl Backend>,
    xcvr: &Xcvr,
    port: DrpPort,
    rx: Option<OutDiv>,
    tx: Option<OutDiv>,
) -> Result<()> {
    debug!(%port, ?rx, ?tx, "out div");
    match xcvr.ty {
        XcvrType::S7Gtx2 => gtx2::write_out_div(cont, port, rx, tx),
        XcvrType::UsGth3 | XcvrType::UsGth4 | XcvrType::UsGty4 => {
            gth34::write_out_div(cont, port, rx, tx)
        }
    }
}

fn encode_clk25_div(div: u32) -> Result<u16, Error> {
    match div {
        1..=32 => Ok((div - 1) as u16),
        value => Err(Error::InvalidDivider {
            what: "clk25",
            value,
        }),
    }
}

fn write_clk25_div(
    cont: &mut Controller<impl Backend>,
    port: DrpPort,
    field: Field,
    div: u32,
) -> Result<()> {
    let code = encode_clk25_div(div)?;
    drp::update_field(cont, port, field, code)
}

pub fn write_rx_clk25_div(
    cont: &mut Controller<impl Backend>,
    xcvr: &Xcvr,
    port: DrpPort,
    div: u32,
) -> Result<()> {
    let field = match xcvr.ty {
        XcvrType::S7Gtx2 => gtx2::RX_CLK25_DIV,
        XcvrType::UsGth3 | XcvrType::UsGth4 | XcvrType::UsGty4 => gth34::RX_CLK25_DIV,
    };
    write_clk25_div(cont, port, field, div)
}

pub fn write_tx_clk25_div(
    cont: &mut Controller<impl Backend>,
    xcvr: &Xcvr,
    port: DrpPort,
    div: u32,
) -> Result<()> {
    let field = match xcvr.ty {
        XcvrType::S7Gtx2 => gtx2::TX_CLK25_DIV,
        XcvrType::UsGth3 | XcvrType::UsGth4 | XcvrType::UsGty4 => gth34::TX_CLK25_DIV,
    };
    write_clk25_div(cont, port, field, div)
}

/// Largest ProgDiv ratio, `None` where there is no ProgDiv.
pub const fn prog_div_max(ty: XcvrType) -> Option<u32> {
    match ty {
        XcvrType::S7Gtx2 => None,
        XcvrType::UsGth3 => Some(100),
        XcvrType::UsGth4 | XcvrType::UsGty4 => Some(132),
    }
}

/// Whether `ratio` has a ProgDiv encoding on `ty`.
pub fn prog_div_supported(ty: XcvrType, ratio: u32) -> bool {
    match ty {
        XcvrType::S7Gtx2 => false,
        XcvrType::UsGth3 | XcvrType::UsGth4 | XcvrType::UsGty4 => {
            gth34::prog_div_value(ty, ratio).is_some()
        }
    }
}

/// Unknown ratios are written as disabled.
pub fn write_prog_div(
    cont: &mut Controller<impl Backend>,
    xcvr: &Xcvr,
    port: DrpPort,
    rx: Option<u32>,
    tx: Option<u32>,
) -> Result<()> {
    match xcvr.ty {
        XcvrType::S7Gtx2 => Err(Error::Unsupported {
            op: "ProgDiv",
            ty: xcvr.ty,
        }
        .into()),
        XcvrType::UsGth3 | XcvrType::UsGth4 | XcvrType::UsGty4 => {
            debug!(%port, ?rx, ?tx, "prog div");
            gth34::write_prog_div(cont, xcvr.ty, port, rx, tx)
        }
    }
}

pub fn write_prog_div_rate(
    cont: &mut Controller<impl Backend>,
    xcvr: &Xcvr,
    port: DrpPort,
    rx: Option<u32>,
    tx: Option<u32>,
) -> Result<()> {
    match xcvr.ty {
        XcvrType::UsGty4 => gth34::write_prog_div_rate(cont, port, rx, tx),
        XcvrType::S7Gtx2 | XcvrType::UsGth3 | XcvrType::UsGth4 => Err(Error::Unsupported {
            op: "ProgDiv rate",
            ty: xcvr.ty,
        }
        .into()),
    }
}

/// No-op on GTX2.
pub fn write_async_gearbox_en(
    cont: &mut Controller<impl Backend>,
    xcvr: &Xcvr,
    port: DrpPort,
    en: bool,
) -> Result<()> {
    match xcvr.ty {
        XcvrType::S7Gtx2 => Ok(()),
        XcvrType::UsGth3 | XcvrType::UsGth4 | XcvrType::UsGty4 => {
            gth34::write_async_gearbox_en(cont, port, en)
        }
    }
}
