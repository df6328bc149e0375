//! UltraScale GTH3 and UltraScale+ GTH4/GTY4 DRP layout.

use adxcvr_io::{Backend, Controller, DrpPort};
use eyre::Result;

use crate::{
    Error, Side, XcvrType,
    drp::{self, Field},
    pll::{self, Band, CpllConfig, OutDiv, QpllConfig},
};

const CPLL_FBDIV_ADDR: u16 = 0x28;
const CPLL_FBDIV_N1: u16 = 0x0080;
const CPLL_FBDIV_N2: Field = Field::new(0x28, 0xff00, 8);
const CPLL_REFCLK_DIV: Field = Field::new(0x2a, 0xf800, 11);

/// Registers of QPLL1 sit 0x80 above those of QPLL0.
const QPLL_STRIDE: u16 = 0x80;

const fn qpll_fbdiv(sel: u16) -> Field {
    Field::new(0x14 + sel * QPLL_STRIDE, 0x00ff, 0)
}

const fn qpll_refclk_div(sel: u16) -> Field {
    Field::new(0x18 + sel * QPLL_STRIDE, 0x0f80, 7)
}

const fn gty4_qpll_clkout_rate(sel: u16) -> Field {
    Field::new(0x0e + sel * QPLL_STRIDE, 0x0001, 0)
}

const OUT_DIV_RX: Field = Field::new(0x63, 0x0007, 0);
const OUT_DIV_TX: Field = Field::new(0x7c, 0x0700, 8);

pub(crate) const RX_CLK25_DIV: Field = Field::new(0x6d, 0x00f8, 3);
pub(crate) const TX_CLK25_DIV: Field = Field::new(0x7a, 0xf800, 11);

const TXGEARBOX_EN: u16 = 1 << 13;
const TXBUF_EN: u16 = 1 << 7;
const ASYNC_GEARBOX_ADDR: u16 = 0x7c;

const RX_PROGDIV_ADDR: u16 = 0xc6;
const TX_PROGDIV_ADDR: u16 = 0x3e;
const GTY4_TX_PROGDIV_ADDR: u16 = 0x57;
const GTY4_RX_PROGDIV_RATE: Field = Field::new(0x103, 0x0001, 0);
const GTY4_TX_PROGDIV_RATE: Field = Field::new(0x105, 0x0001, 0);

pub(crate) const PROGDIV_DISABLED: u16 = 32768;

// 17 stands for 16.5
const PROGDIV_GTH3: &[(u32, u16)] = &[
    (0, PROGDIV_DISABLED),
    (4, 57744),
    (5, 49648),
    (8, 57728),
    (10, 57760),
    (16, 57730),
    (17, 49672),
    (20, 57762),
    (32, 57734),
    (33, 49800),
    (40, 57766),
    (64, 57742),
    (66, 50056),
    (80, 57743),
    (100, 57775),
];

const PROGDIV_GTH4: &[(u32, u16)] = &[
    (0, PROGDIV_DISABLED),
    (4, 57432),
    (5, 57464),
    (8, 57408),
    (10, 57440),
    (16, 57410),
    (17, 57880),
    (20, 57442),
    (32, 57414),
    (33, 57856),
    (40, 57415),
    (64, 57422),
    (66, 57858),
    (80, 57423),
    (100, 57455),
    (128, 24654),
    (132, 57862),
];

pub fn read_cpll_config(cont: &mut Controller<impl Backend>, port: DrpPort) -> Result<CpllConfig> {
    let fbdiv = drp::read(cont, port, CPLL_FBDIV_ADDR)?;
    let refclk = drp::read_field(cont, port, CPLL_REFCLK_DIV)?;
    Ok(CpllConfig {
        refclk_div: if refclk != 0 { 1 } else { 2 },
        fb_div_n1: if fbdiv & CPLL_FBDIV_N1 != 0 { 5 } else { 4 },
        fb_div_n2: pll::decode_cpll_n2(CPLL_FBDIV_N2.extract(fbdiv)),
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
        1 => 16,
        2 => 0,
        value => {
            return Err(Error::InvalidDivider {
                what: "CPLL reference",
                value,
            }
            .into());
        }
    };

    let n1 = if n1 { CPLL_FBDIV_N1 } else { 0 };
    drp::update(
        cont,
        port,
        CPLL_FBDIV_ADDR,
        CPLL_FBDIV_N2.mask | CPLL_FBDIV_N1,
        CPLL_FBDIV_N2.insert(n2) | n1,
    )?;
    drp::update_field(cont, port, CPLL_REFCLK_DIV, refclk)
}

/// `sel` picks QPLL0 or QPLL1. The band is not stored in this layout and
/// reads back as [`Band::Low`].
pub fn read_qpll_config(
    cont: &mut Controller<impl Backend>,
    ty: XcvrType,
    sel: u16,
    port: DrpPort,
) -> Result<QpllConfig> {
    let gty4_full_rate = match ty {
        XcvrType::UsGty4 => drp::read_field(cont, port, gty4_qpll_clkout_rate(sel))? != 0,
        _ => false,
    };
    let refclk = drp::read_field(cont, port, qpll_refclk_div(sel))?;
    let fbdiv = drp::read_field(cont, port, qpll_fbdiv(sel))?;
    Ok(QpllConfig {
        refclk_div: pll::decode_qpll_refclk_div(refclk).unwrap_or(5),
        fb_div: u32::from(fbdiv) + 2,
        band: Band::Low,
        gty4_full_rate,
    })
}

pub fn write_qpll_config(
    cont: &mut Controller<impl Backend>,
    ty: XcvrType,
    sel: u16,
    port: DrpPort,
    config: &QpllConfig,
) -> Result<()> {
    let refclk = pll::encode_qpll_refclk_div(config.refclk_div)?;
    let fbdiv = match config.fb_div.checked_sub(2) {
        Some(fbdiv @ 0..=0xff) => fbdiv as u16,
        _ => {
            return Err(Error::InvalidDivider {
                what: "QPLL feedback",
                value: config.fb_div,
            }
            .into());
        }
    };

    drp::update_field(cont, port, qpll_fbdiv(sel), fbdiv)?;
    if ty == XcvrType::UsGty4 {
        let rate = u16::from(config.gty4_full_rate);
        drp::update_field(cont, port, gty4_qpll_clkout_rate(sel), rate)?;
    }
    drp::update_field(cont, port, qpll_refclk_div(sel), refclk)
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

pub fn write_out_div(
    cont: &mut Controller<impl Backend>,
    port: DrpPort,
    rx: Option<OutDiv>,
    tx: Option<OutDiv>,
) -> Result<()> {
    if let Some(div) = rx {
        drp::update_field(cont, port, OUT_DIV_RX, div.encode())?;
    }
    if let Some(div) = tx {
        drp::update_field(cont, port, OUT_DIV_TX, div.encode())?;
    }
    Ok(())
}

fn prog_div_table(ty: XcvrType) -> &'static [(u32, u16)] {
    match ty {
        XcvrType::UsGth3 => PROGDIV_GTH3,
        _ => PROGDIV_GTH4,
    }
}

/// Register value for a ProgDiv ratio. `None` if the ratio has no encoding.
pub fn prog_div_value(ty: XcvrType, ratio: u32) -> Option<u16> {
    prog_div_table(ty)
        .iter()
        .find(|(r, _)| *r == ratio)
        .map(|(_, val)| *val)
}

/// Unknown ratios are written as disabled.
pub fn write_prog_div(
    cont: &mut Controller<impl Backend>,
    ty: XcvrType,
    port: DrpPort,
    rx: Option<u32>,
    tx: Option<u32>,
) -> Result<()> {
    let encode = |ratio| prog_div_value(ty, ratio).unwrap_or(PROGDIV_DISABLED);
    if let Some(ratio) = rx {
        drp::update(cont, port, RX_PROGDIV_ADDR, 0xffff, encode(ratio))?;
    }
    if let Some(ratio) = tx {
        let reg = match ty {
            XcvrType::UsGty4 => GTY4_TX_PROGDIV_ADDR,
            _ => TX_PROGDIV_ADDR,
        };
        drp::update(cont, port, reg, 0xffff, encode(ratio))?;
    }
    Ok(())
}

/// GTY4 ProgDiv pre-divider: 1 is full rate, anything else half rate.
pub fn write_prog_div_rate(
    cont: &mut Controller<impl Backend>,
    port: DrpPort,
    rx: Option<u32>,
    tx: Option<u32>,
) -> Result<()> {
    let encode = |rate| u16::from(rate == 1);
    if let Some(rate) = rx {
        drp::update_field(cont, port, GTY4_RX_PROGDIV_RATE, encode(rate))?;
    }
    if let Some(rate) = tx {
        drp::update_field(cont, port, GTY4_TX_PROGDIV_RATE, encode(rate))?;
    }
    Ok(())
}

pub fn write_async_gearbox_en(
    cont: &mut Controller<impl Backend>,
    port: DrpPort,
    en: bool,
) -> Result<()> {
    let mask = TXGEARBOX_EN | TXBUF_EN;
    drp::update(cont, port, ASYNC_GEARBOX_ADDR, mask, if en { mask } else { 0 })
}

#[cfg(test)]
mod tests {
    use adxcvr_io::{Timing, fake_backend::FakeBackend, regs::Bank};

    use super::*;

    fn cont() -> Controller<FakeBackend> {
        Controller::with_timing(FakeBackend::new(), Timing::fast())
    }

    #[test]
    fn test_cpll_layout() -> Result<()> {
        let mut cont = cont();
        let port = DrpPort::channel(0);
        let config = CpllConfig {
            refclk_div: 1,
            fb_div_n1: 5,
            fb_div_n2: 4,
        };
        write_cpll_config(&mut cont, port, &config)?;
        assert_eq!(cont.backend().drp_get(Bank::Channel, 0, 0x28), 0x0280);
        assert_eq!(cont.backend().drp_get(Bank::Channel, 0, 0x2a), 0x8000);
        Ok(())
    }

    #[test]
    fn test_qpll1_offset() -> Result<()> {
        let mut cont = cont();
        let port = DrpPort::common(4);
        let config = QpllConfig {
            refclk_div: 2,
            fb_div: 80,
            band: Band::Low,
            gty4_full_rate: true,
        };
        write_qpll_config(&mut cont, XcvrType::UsGty4, 1, port, &config)?;
        let fake = cont.backend();
        assert_eq!(fake.drp_get(Bank::Common, 4, 0x94), 78);
        assert_eq!(fake.drp_get(Bank::Common, 4, 0x98), 0);
        assert_eq!(fake.drp_get(Bank::Common, 4, 0x8e), 1);
        assert_eq!(fake.drp_get(Bank::Common, 4, 0x14), 0);
        Ok(())
    }

    #[test]
    fn test_qpll_unknown_refclk_reads_as_5() -> Result<()> {
        let mut cont = cont();
        cont.backend_mut().drp_set(Bank::Common, 0, 0x18, 7 << 7);
        let config = read_qpll_config(&mut cont, XcvrType::UsGth3, 0, DrpPort::common(0))?;
        assert_eq!(config.refclk_div, 5);
        assert_eq!(config.fb_div, 2);
        Ok(())
    }

    #[test]
    fn test_out_div_registers() -> Result<()> {
        let mut cont = cont();
        let port = DrpPort::channel(1);
        write_out_div(&mut cont, port, Some(OutDiv(2)), Some(OutDiv(16)))?;
        assert_eq!(cont.backend().drp_get(Bank::Channel, 1, 0x63), 0x0001);
        assert_eq!(cont.backend().drp_get(Bank::Channel, 1, 0x7c), 0x0400);
        assert_eq!(read_out_div(&mut cont, port, Side::Tx)?, OutDiv(16));
        Ok(())
    }

    #[test]
    fn test_prog_div() -> Result<()> {
        let mut cont = cont();
        let port = DrpPort::channel(0);
        write_prog_div(&mut cont, XcvrType::UsGty4, port, Some(33), Some(132))?;
        assert_eq!(cont.backend().drp_get(Bank::Channel, 0, 0xc6), 57856);
        assert_eq!(cont.backend().drp_get(Bank::Channel, 0, 0x57), 57862);

        write_prog_div(&mut cont, XcvrType::UsGth3, port, Some(132), Some(40))?;
        assert_eq!(cont.backend().drp_get(Bank::Channel, 0, 0xc6), PROGDIV_DISABLED);
        assert_eq!(cont.backend().drp_get(Bank::Channel, 0, 0x3e), 57766);

        write_prog_div_rate(&mut cont, port, Some(1), Some(2))?;
        assert_eq!(cont.backend().drp_get(Bank::Channel, 0, 0x103), 1);
        assert_eq!(cont.backend().drp_get(Bank::Channel, 0, 0x105), 0);
        Ok(())
    }

    #[test]
    fn test_async_gearbox() -> Result<()> {
        let mut cont = cont();
        let port = DrpPort::channel(0);
        drp::write(&mut cont, port, 0x7c, 0x0300)?;
        write_async_gearbox_en(&mut cont, port, true)?;
        assert_eq!(cont.backend().drp_get(Bank::Channel, 0, 0x7c), 0x2380);
        write_async_gearbox_en(&mut cont, port, false)?;
        assert_eq!(cont.backend().drp_get(Bank::Channel, 0, 0x7c), 0x0300);
        Ok(())
    }
}
