use std::time::Duration;

use eyre::Result;
use tracing::{debug, error, instrument, trace};

use crate::{
    Backend, Error, Hex, Timing,
    regs::{self, Bank},
};

/// Logical DRP port.
///
/// Ports below `0x100` address the common bank (QPLLs), ports at or above
/// address the channel bank. The low byte selects the common block or lane.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DrpPort(pub u32);

impl DrpPort {
    const CHANNEL_START: u32 = 0x100;

    pub const fn channel(lane: u32) -> Self {
        Self(Self::CHANNEL_START + lane)
    }

    /// The common block shared by `lane`. Callers pass the first lane of a
    /// QPLL group.
    pub const fn common(lane: u32) -> Self {
        Self(lane)
    }

    pub const fn bank(self) -> Bank {
        if self.0 >= Self::CHANNEL_START {
            Bank::Channel
        } else {
            Bank::Common
        }
    }

    pub const fn sel(self) -> u32 {
        self.0 & 0xff
    }
}

impl std::fmt::Display for DrpPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}[{}]", self.bank(), self.sel())
    }
}

/// Owns a register backend and speaks the DRP request/poll protocol over it.
pub struct Controller<B> {
    backend: B,
    timing: Timing,
}

impl<B: Backend> Controller<B> {
    pub fn new(backend: B) -> Self {
        Self::with_timing(backend, Timing::default())
    }

    pub fn with_timing(backend: B, timing: Timing) -> Self {
        Self { backend, timing }
    }

    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn into_backend(self) -> B {
        self.backend
    }

    pub fn read(&mut self, reg: u32) -> Result<u32> {
        let val = self.backend.read(reg)?;
        trace!(reg = %Hex(reg), val = %Hex(val), "read");
        Ok(val)
    }

    pub fn write(&mut self, reg: u32, val: u32) -> Result<()> {
        trace!(reg = %Hex(reg), val = %Hex(val), "write");
        self.backend.write(reg, val)
    }

    pub fn delay(&mut self, duration: Duration) {
        self.backend.delay(duration)
    }

    pub fn drp_read(&mut self, port: DrpPort, reg: u16) -> Result<u16> {
        let bank = port.bank();
        self.write(regs::drp_sel(bank), port.sel())?;
        self.write(regs::drp_ctrl(bank), regs::drp_ctrl_word(reg, None))?;
        let val = self.drp_wait_idle(bank)?;
        debug!(%port, reg = %Hex(reg), val = %Hex(val), "drp read");
        Ok(val)
    }

    pub fn drp_write(&mut self, port: DrpPort, reg: u16, val: u16) -> Result<()> {
        let bank = port.bank();
        debug!(%port, reg = %Hex(reg), val = %Hex(val), "drp write");
        self.write(regs::drp_sel(bank), port.sel())?;
        self.write(regs::drp_ctrl(bank), regs::drp_ctrl_word(reg, Some(val)))?;
        self.drp_wait_idle(bank)?;
        Ok(())
    }

    /// Poll DRP_STATUS of `bank` until the busy bit clears, returning the data
    /// field.
    ///
    /// Samples at most [`Timing::drp_idle_retries`] times.
    #[instrument(skip_all, fields(%bank))]
    pub fn drp_wait_idle(&mut self, bank: Bank) -> Result<u16> {
        let polls = self.timing.drp_idle_retries;
        for _ in 0..polls {
            let status = self.read(regs::drp_status(bank))?;
            if status & regs::DRP_STATUS_BUSY == 0 {
                return Ok(status as u16);
            }
            self.delay(self.timing.drp_idle_delay);
        }
        error!(polls, "timeout waiting for DRP idle");
        Err(Error::DrpTimeout { bank, polls }.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake_backend::FakeBackend;

    fn controller(fake: FakeBackend) -> Controller<FakeBackend> {
        Controller::with_timing(fake, Timing::fast())
    }

    #[test]
    fn test_port_mapping() {
        assert_eq!(DrpPort::channel(3).bank(), Bank::Channel);
        assert_eq!(DrpPort::channel(3).sel(), 3);
        assert_eq!(DrpPort::common(4).bank(), Bank::Common);
        assert_eq!(DrpPort::common(4).sel(), 4);
        assert_eq!(DrpPort(0xff).bank(), Bank::Common);
        assert_eq!(DrpPort(0x100).bank(), Bank::Channel);
        assert_eq!(DrpPort(0x1ff).sel(), 0xff);
    }

    #[test]
    fn test_drp_write_read() -> Result<()> {
        let mut ctrl = controller(FakeBackend::new());
        ctrl.drp_write(DrpPort::channel(1), 0x5e, 0xbeef)?;
        ctrl.drp_write(DrpPort::channel(2), 0x5e, 0x1234)?;
        ctrl.drp_write(DrpPort::common(0), 0x5e, 0x4321)?;

        assert_eq!(ctrl.drp_read(DrpPort::channel(1), 0x5e)?, 0xbeef);
        assert_eq!(ctrl.drp_read(DrpPort::channel(2), 0x5e)?, 0x1234);
        assert_eq!(ctrl.drp_read(DrpPort::common(0), 0x5e)?, 0x4321);
        assert_eq!(ctrl.drp_read(DrpPort::common(1), 0x5e)?, 0);
        Ok(())
    }

    #[test]
    fn test_wait_idle_masks_data() -> Result<()> {
        let fake = FakeBackend::new().with_drp_busy_polls(5);
        let mut ctrl = controller(fake);
        ctrl.drp_write(DrpPort::channel(0), 0x63, 0xa5a5)?;
        let reads_before = ctrl.backend().drp_status_reads();
        assert_eq!(ctrl.drp_read(DrpPort::channel(0), 0x63)?, 0xa5a5);
        let polls = ctrl.backend().drp_status_reads() - reads_before;
        assert!(polls == 6, "expected 5 busy polls and one idle, got {polls}");
        Ok(())
    }

    #[test]
    fn test_wait_idle_bounded() {
        let fake = FakeBackend::new().with_stuck_drp();
        let mut ctrl = controller(fake);
        let err = ctrl
            .drp_read(DrpPort::channel(0), 0x28)
            .expect_err("stuck DRP must time out");
        assert_eq!(
            err.downcast_ref::<Error>(),
            Some(&Error::DrpTimeout {
                bank: Bank::Channel,
                polls: 20
            })
        );
        assert_eq!(ctrl.backend().drp_status_reads(), 20);
        assert_eq!(ctrl.backend().delays().len(), 20);
    }

    #[test]
    fn test_wait_idle_delays() {
        let timing = Timing {
            drp_idle_retries: 3,
            ..Timing::default()
        };
        let mut ctrl = Controller::with_timing(FakeBackend::new().with_stuck_drp(), timing);
        assert!(ctrl.drp_wait_idle(Bank::Common).is_err());
        assert_eq!(ctrl.backend().drp_status_reads(), 3);
        assert!(
            ctrl.backend()
                .delays()
                .iter()
                .all(|d| *d == Duration::from_millis(1)),
            "delays: {:?}",
            ctrl.backend().delays()
        );
    }
}
