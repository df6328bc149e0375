use std::time::Duration;

use eyre::Result;

/// A 32-bit register window onto one AXI-ADXCVR core.
///
/// `reg` is a byte offset from the core's base address. Reads take `&mut
/// self` because reading a status register can have side effects on the
/// hardware (and on simulated cores).
pub trait Backend {
    fn read(&mut self, reg: u32) -> Result<u32>;

    fn write(&mut self, reg: u32, val: u32) -> Result<()>;

    /// Block for `duration`. Simulated backends may record instead of
    /// sleeping.
    fn delay(&mut self, duration: Duration);
}

impl<B: Backend + ?Sized> Backend for Box<B> {
    fn read(&mut self, reg: u32) -> Result<u32> {
        B::read(&mut *self, reg)
    }

    fn write(&mut self, reg: u32, val: u32) -> Result<()> {
        B::write(&mut *self, reg, val)
    }

    fn delay(&mut self, duration: Duration) {
        B::delay(&mut *self, duration)
    }
}

impl<B: Backend + ?Sized> Backend for &mut B {
    fn read(&mut self, reg: u32) -> Result<u32> {
        B::read(&mut **self, reg)
    }

    fn write(&mut self, reg: u32, val: u32) -> Result<()> {
        B::write(&mut **self, reg, val)
    }

    fn delay(&mut self, duration: Duration) {
        B::delay(&mut **self, duration)
    }
}
