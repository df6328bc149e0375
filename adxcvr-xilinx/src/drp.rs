//! DRP accesses with read-back checking.

use adxcvr_io::{Backend, Controller, DrpPort, Hex};
use eyre::Result;
use tracing::error;

pub fn read(cont: &mut Controller<impl Backend>, port: DrpPort, reg: u16) -> Result<u16> {
    cont.drp_read(port, reg)
        .inspect_err(|e| error!(%port, reg = %Hex(reg), "failed to read: {e}"))
}

/// Write `val` and read it back. A mismatch is logged, not returned.
pub fn write(cont: &mut Controller<impl Backend>, port: DrpPort, reg: u16, val: u16) -> Result<()> {
    cont.drp_write(port, reg, val)
        .inspect_err(|e| error!(%port, reg = %Hex(reg), "failed to write: {e}"))?;
    let read_back = read(cont, port, reg)?;
    if read_back != val {
        error!(
            %port,
            reg = %Hex(reg),
            val = %Hex(read_back),
            expected = %Hex(val),
            "read-write mismatch"
        );
    }
    Ok(())
}

/// Replace the bits of `reg` under `mask` with `val`.
pub fn update(
    cont: &mut Controller<impl Backend>,
    port: DrpPort,
    reg: u16,
    mask: u16,
    val: u16,
) -> Result<()> {
    let old = read(cont, port, reg)?;
    write(cont, port, reg, (old & !mask) | (val & mask))
}

/// A bit field inside a DRP register.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Field {
    pub reg: u16,
    pub mask: u16,
    pub shift: u8,
}

impl Field {
    pub const fn new(reg: u16, mask: u16, shift: u8) -> Self {
        Self { reg, mask, shift }
    }

    pub const fn insert(self, val: u16) -> u16 {
        (val << self.shift) & self.mask
    }

    pub const fn extract(self, raw: u16) -> u16 {
        (raw & self.mask) >> self.shift
    }
}

pub fn read_field(cont: &mut Controller<impl Backend>, port: DrpPort, field: Field) -> Result<u16> {
    Ok(field.extract(read(cont, port, field.reg)?))
}

pub fn update_field(
    cont: &mut Controller<impl Backend>,
    port: DrpPort,
    field: Field,
    val: u16,
) -> Result<()> {
    update(cont, port, field.reg, field.mask, field.insert(val))
}

#[cfg(test)]
mod tests {
    use adxcvr_io::{
        Timing,
        fake_backend::{DrpKey, FakeBackend},
        regs::Bank,
    };

    use super::*;

    #[test]
    fn test_update_keeps_unmasked_bits() -> Result<()> {
        let mut cont = Controller::with_timing(FakeBackend::new(), Timing::fast());
        let port = DrpPort::channel(0);
        write(&mut cont, port, 0x7c, 0xffff)?;
        update(&mut cont, port, 0x7c, 0x0700, 0x0200)?;
        assert_eq!(read(&mut cont, port, 0x7c)?, 0xfaff);
        Ok(())
    }

    #[test]
    fn test_mismatch_not_fatal() -> Result<()> {
        let key = DrpKey {
            bank: Bank::Channel,
            sel: 0,
            addr: 0x29,
        };
        let fake = FakeBackend::new().with_pinned_drp(key, 0x0001);
        let mut cont = Controller::with_timing(fake, Timing::fast());
        write(&mut cont, DrpPort::channel(0), 0x29, 0x0954)?;
        assert_eq!(cont.backend().drp_get(Bank::Channel, 0, 0x29), 0x0001);
        Ok(())
    }
}
