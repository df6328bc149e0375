//! PRBS checker helpers.

use adxcvr_io::{Backend, Controller, DrpPort};
use eyre::Result;

use crate::{Error, Xcvr, XcvrType, drp};

/// PRBS polynomial order by PRBSSEL value. 0 disables the generator.
const GTX2_PRBS: &[u32] = &[0, 7, 15, 23, 31];
const US_PRBS: &[u32] = &[0, 7, 9, 15, 23, 31];

const GTX2_RX_PRBS_ERR_CNT: u16 = 0x15c;
const GTH3_RX_PRBS_ERR_CNT: u16 = 0x15e;
const GTH4_RX_PRBS_ERR_CNT: u16 = 0x25e;

const fn prbs_lut(ty: XcvrType) -> &'static [u32] {
    match ty {
        XcvrType::S7Gtx2 => GTX2_PRBS,
        XcvrType::UsGth3 | XcvrType::UsGth4 | XcvrType::UsGty4 => US_PRBS,
    }
}

/// PRBSSEL value selecting the PRBS of the given order.
pub fn prbsel_encode(ty: XcvrType, order: u32) -> Result<u8, Error> {
    prbs_lut(ty)
        .iter()
        .position(|o| *o == order)
        .map(|sel| sel as u8)
        .ok_or(Error::UnknownPrbs(order))
}

/// PRBS order selected by a PRBSSEL value.
pub fn prbsel_decode(ty: XcvrType, sel: u8) -> Result<u32, Error> {
    prbs_lut(ty)
        .get(usize::from(sel))
        .copied()
        .ok_or(Error::UnknownEncoding {
            what: "PRBSSEL",
            raw: u16::from(sel),
        })
}

/// RX PRBS error counter. 16 bits wide on GTX2, 32 bits elsewhere.
pub fn prbs_err_cnt_get(
    cont: &mut Controller<impl Backend>,
    xcvr: &Xcvr,
    port: DrpPort,
) -> Result<u32> {
    let addr = match xcvr.ty {
        XcvrType::S7Gtx2 => GTX2_RX_PRBS_ERR_CNT,
        XcvrType::UsGth3 => GTH3_RX_PRBS_ERR_CNT,
        XcvrType::UsGth4 | XcvrType::UsGty4 => GTH4_RX_PRBS_ERR_CNT,
    };
    let lo = drp::read(cont, port, addr)?;
    let hi = match xcvr.ty {
        XcvrType::S7Gtx2 => 0,
        XcvrType::UsGth3 | XcvrType::UsGth4 | XcvrType::UsGty4 => {
            drp::read(cont, port, addr + 1)?
        }
    };
    Ok((u32::from(hi) << 16) | u32::from(lo))
}

#[cfg(test)]
mod tests {
    use adxcvr_io::{Timing, fake_backend::FakeBackend, regs::Bank};
    use strum::VariantArray;

    use super::*;

    #[test]
    fn test_prbsel() {
        assert_eq!(prbsel_encode(XcvrType::S7Gtx2, 15), Ok(2));
        assert_eq!(prbsel_encode(XcvrType::UsGth4, 15), Ok(3));
        assert_eq!(prbsel_encode(XcvrType::S7Gtx2, 9), Err(Error::UnknownPrbs(9)));
        assert_eq!(prbsel_decode(XcvrType::UsGty4, 5), Ok(31));
        assert!(prbsel_decode(XcvrType::S7Gtx2, 5).is_err());

        for ty in XcvrType::VARIANTS {
            for order in prbs_lut(*ty) {
                let sel = prbsel_encode(*ty, *order).unwrap();
                assert_eq!(prbsel_decode(*ty, sel), Ok(*order));
            }
        }
    }

    #[test]
    fn test_err_cnt_width() -> Result<()> {
        let mut fake = FakeBackend::new();
        fake.drp_set(Bank::Channel, 2, 0x15c, 0x1234);
        fake.drp_set(Bank::Channel, 2, 0x15d, 0xffff);
        fake.drp_set(Bank::Channel, 2, 0x25e, 0x0001);
        fake.drp_set(Bank::Channel, 2, 0x25f, 0x0002);
        let mut cont = Controller::with_timing(fake, Timing::fast());
        let port = DrpPort::channel(2);

        let gtx = Xcvr::new(XcvrType::S7Gtx2);
        assert_eq!(prbs_err_cnt_get(&mut cont, &gtx, port)?, 0x1234);
        let gty = Xcvr::new(XcvrType::UsGty4);
        assert_eq!(prbs_err_cnt_get(&mut cont, &gty, port)?, 0x0002_0001);
        Ok(())
    }
}
