//! 7-series GTX2 DRP layout.

use adxcvr_io::{Backend, Controller, DrpPort};
use eyre::Result;

use crate::{
    Error, Side,
    drp::{self, Field},
    pll::{self, Band, CpllConfig, OutDiv, QpllConfig},
};

const CPLL_REFCLK_DIV_M: u16 = 0x1f00;
const CPLL_FB_DIV_45_N1: u16 = 0x0080;
const CPLL_FB_DIV_N2: u16 = 0x007f;
const CPLL_CFG_ADDR: u16 = 0x5e;

const QPLL_CFG0_ADDR: u16 = 0x32;
const QPLL_CFG0_LOWBAND: u16 = 0x0040;
const QPLL_REFCLK_DIV_M: Field = Field::new(0x33, 0xf800, 11);
const QPLL_FBDIV_N: Field = Field::new(0x36, 0x03ff, 0);
const QPLL_FBDIV_RATIO_ADDR: u16 = 0x37;
const QPLL_FBDIV_RATIO: u16 = 0x0040;

/// (N, FBDIV field)
const QPLL_FBDIV_CODES: &[(u32, u16)] = &[
    (16, 32),
    (20, 48),
    (32, 96),
    (40, 128),
    (64, 224),
    (66, 320),
    (80, 288),
    (100, 368),
];

const OUT_DIV_RX: Field = Field::new(0x88, 0x07, 0);
const OUT_DIV_TX: Field = Field::new(0x88, 0x70, 4);

pub(crate) const RX_CLK25_DIV: Field = Field::new(0x11, 0x07c0, 6);
pub(crate) const TX_CLK25_DIV: Field = Field::new(0x6a, 0x001f, 0);

pub fn read_cpll_config(cont: &mut Controller<impl Backend>, port: DrpPort) -> Result<CpllConfig> {
    let val = drp::read(cont, port, CPLL_CFG_ADDR)?;
    Ok(CpllConfig {
        refclk_div: if val & CPLL_REFCLK_DIV_M != 0 { 1 } else { 2 },
        fb_div_n1: if val & CPLL_FB_DIV_45_N1 != 0 { 5 } else { 4 },
        fb_div_n2: pll::decode_cpll_n2(val & CPLL_FB_DIV_N2),
    })
}

pub fn write_cpll_config(
    cont: &mut Controller<impl Backend>,
    port: DrpPort,
    config: &CpllConfig,
) -> Result<()> {
    let n1 = pll::encode_cpll_n1(config.fb_div_n1)?;
    let n2 = pll::encode_cpll_n2(config.fb_div_n2)?;
    let refclk = match config.refclk_div {
        1 => CPLL_REFCLK_DIV_M,
        2 => 0,
        value => {
            return Err(Error::InvalidDivider {
                what: "CPLL reference",
                value,
            }
            .into());
        }
    };
    let n1 = if n1 { CPLL_FB_DIV_45_N1 } else { 0 };
    let val = refclk | n1 | n2;
    drp::update(
        cont,
        port,
        CPLL_CFG_ADDR,
        CPLL_REFCLK_DIV_M | CPLL_FB_DIV_45_N1 | CPLL_FB_DIV_N2,
        val,
    )
}

pub fn read_qpll_config(cont: &mut Controller<impl Backend>, port: DrpPort) -> Result<QpllConfig> {
    let refclk = drp::read_field(cont, port, QPLL_REFCLK_DIV_M)?;
    let Some(refclk_div) = pll::decode_qpll_refclk_div(refclk) else {
        return Err(Error::UnknownEncoding {
            what: "QPLL reference divider",
            raw: refclk,
        }
        .into());
    };

    let fbdiv = drp::read_field(cont, port, QPLL_FBDIV_N)?;
    let Some(&(fb_div, _)) = QPLL_FBDIV_CODES.iter().find(|(_, code)| *code == fbdiv) else {
        return Err(Error::UnknownEncoding {
            what: "QPLL feedback divider",
            raw: fbdiv,
        }
        .into());
    };

    let cfg0 = drp::read(cont, port, QPLL_CFG0_ADDR)?;
    let band = if cfg0 & QPLL_CFG0_LOWBAND != 0 {
        Band::Low
    } else {
        Band::High
    };

    Ok(QpllConfig {
        refclk_div,
        fb_div,
        band,
        gty4_full_rate: false,
    })
}

pub fn write_qpll_config(
    cont: &mut Controller<impl Backend>,
    port: DrpPort,
    config: &QpllConfig,
) -> Result<()> {
    let refclk = pll::encode_qpll_refclk_div(config.refclk_div)?;
    let Some(&(_, fbdiv)) = QPLL_FBDIV_CODES.iter().find(|(n, _)| *n == config.fb_div) else {
        return Err(Error::InvalidDivider {
            what: "QPLL feedback",
            value: config.fb_div,
        }
        .into());
    };
    let fbdiv_ratio = if config.fb_div == 66 {
        0
    } else {
        QPLL_FBDIV_RATIO
    };
    let cfg0 = match config.band {
        Band::Low => QPLL_CFG0_LOWBAND,
        Band::High => 0,
    };

    drp::update(cont, port, QPLL_CFG0_ADDR, QPLL_CFG0_LOWBAND, cfg0)?;
    drp::update_field(cont, port, QPLL_REFCLK_DIV_M, refclk)?;
    drp::update_field(cont, port, QPLL_FBDIV_N, fbdiv)?;
    drp::update(
        cont,
        port,
        QPLL_FBDIV_RATIO_ADDR,
        QPLL_FBDIV_RATIO,
        fbdiv_ratio,
    )
}

pub fn read_out_div(
    cont: &mut Controller<impl Backend>,
    port: DrpPort,
    side: Side,
) -> Result<OutDiv> {
    let field = match side {
        Side::Rx => OUT_DIV_RX,
        Side::Tx => OUT_DIV_TX,
    };
    Ok(OutDiv::decode(drp::read_field(cont, port, field)?))
}

/// RX and TX share one register, written with a single read-modify-write.
pub fn write_out_div(
    cont: &mut Controller<impl Backend>,
    port: DrpPort,
    rx: Option<OutDiv>,
    tx: Option<OutDiv>,
) -> Result<()> {
    let mut mask = 0;
    let mut val = 0;
    for (field, div) in [(OUT_DIV_RX, rx), (OUT_DIV_TX, tx)] {
        if let Some(div) = div {
            mask |= field.mask;
            val |= field.insert(div.encode());
        }
    }
    if mask == 0 {
        return Ok(());
    }
    drp::update(cont, port, OUT_DIV_RX.reg, mask, val)
}

#[cfg(test)]
mod tests {
    use adxcvr_io::{Timing, fake_backend::FakeBackend, regs::Bank};

    use super::*;

    #[test]
    fn test_cpll_layout() -> Result<()> {
        let mut cont = Controller::with_timing(FakeBackend::new(), Timing::fast());
        let port = DrpPort::channel(2);
        drp::write(&mut cont, port, CPLL_CFG_ADDR, 0xe000)?;
        let config = CpllConfig {
            refclk_div: 1,
            fb_div_n1: 5,
            fb_div_n2: 1,
        };
        write_cpll_config(&mut cont, port, &config)?;
        // bits outside the CPLL fields survive
        assert_eq!(cont.backend().drp_get(Bank::Channel, 2, CPLL_CFG_ADDR), 0xff90);
        Ok(())
    }

    #[test]
    fn test_qpll_layout() -> Result<()> {
        let mut cont = Controller::with_timing(FakeBackend::new(), Timing::fast());
        let port = DrpPort::common(0);
        let config = QpllConfig {
            refclk_div: 1,
            fb_div: 66,
            band: Band::Low,
            gty4_full_rate: false,
        };
        write_qpll_config(&mut cont, port, &config)?;
        let fake = cont.backend();
        assert_eq!(fake.drp_get(Bank::Common, 0, QPLL_CFG0_ADDR), 0x0040);
        assert_eq!(fake.drp_get(Bank::Common, 0, 0x33), 0x8000);
        assert_eq!(fake.drp_get(Bank::Common, 0, 0x36), 320);
        assert_eq!(fake.drp_get(Bank::Common, 0, QPLL_FBDIV_RATIO_ADDR), 0);
        Ok(())
    }

    #[test]
    fn test_out_div_sides() -> Result<()> {
        let mut cont = Controller::with_timing(FakeBackend::new(), Timing::fast());
        let port = DrpPort::channel(0);
        write_out_div(&mut cont, port, Some(OutDiv(4)), Some(OutDiv(2)))?;
        assert_eq!(cont.backend().drp_get(Bank::Channel, 0, 0x88), 0x0012);
        write_out_div(&mut cont, port, None, Some(OutDiv(8)))?;
        assert_eq!(read_out_div(&mut cont, port, Side::Rx)?, OutDiv(4));
        assert_eq!(read_out_div(&mut cont, port, Side::Tx)?, OutDiv(8));
        Ok(())
    }
}
