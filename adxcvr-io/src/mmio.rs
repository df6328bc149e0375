use std::{ptr::NonNull, time::Duration};

use eyre::Result;

use crate::{Backend, Error};

/// Volatile access to an AXI-ADXCVR core mapped into this address space.
pub struct Mmio {
    base: NonNull<u8>,
    len: usize,
}

impl Mmio {
    /// # Safety
    ///
    /// `base` must point to `len` bytes of device memory that stay mapped for
    /// the lifetime of the returned value, and nothing else may access the
    /// window while it is held.
    pub unsafe fn new(base: NonNull<u8>, len: usize) -> Self {
        Self { base, len }
    }

    fn check(&self, reg: u32) -> Result<usize> {
        let offset = reg as usize;
        if offset % 4 != 0 {
            return Err(Error::Unaligned { reg }.into());
        }
        if offset.checked_add(4).is_none_or(|end| end > self.len) {
            return Err(Error::OutOfWindow { reg, len: self.len }.into());
        }
        Ok(offset)
    }
}

impl Backend for Mmio {
    fn read(&mut self, reg: u32) -> Result<u32> {
        let offset = self.check(reg)?;
        // SAFETY: offset is aligned and inside the window guaranteed by `new`.
        let val = unsafe { self.base.add(offset).cast::<u32>().read_volatile() };
        Ok(val)
    }

    fn write(&mut self, reg: u32, val: u32) -> Result<()> {
        let offset = self.check(reg)?;
        // SAFETY: offset is aligned and inside the window guaranteed by `new`.
        unsafe { self.base.add(offset).cast::<u32>().write_volatile(val) };
        Ok(())
    }

    fn delay(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_checks() -> Result<()> {
        let mut mem = [0u32; 4];
        let base = NonNull::from(&mut mem).cast::<u8>();
        let mut mmio = unsafe { Mmio::new(base, size_of_val(&mem)) };

        mmio.write(0x4, 0xdead_beef)?;
        assert_eq!(mmio.read(0x4)?, 0xdead_beef);
        assert_eq!(mmio.read(0xc)?, 0);

        let err = mmio.read(0x10).expect_err("past the end");
        assert_eq!(
            err.downcast_ref::<Error>(),
            Some(&Error::OutOfWindow { reg: 0x10, len: 16 })
        );
        let err = mmio.write(0x2, 0).expect_err("unaligned");
        assert_eq!(err.downcast_ref::<Error>(), Some(&Error::Unaligned { reg: 0x2 }));
        Ok(())
    }
}
