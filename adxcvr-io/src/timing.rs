use std::time::Duration;

/// Poll budgets and delays used while talking to the core.
///
/// Every wait in the driver is a bounded poll: `retries` samples with a fixed
/// delay between them. The defaults are the values the hardware expects;
/// simulations use [`Timing::fast`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Timing {
    /// DRP_STATUS samples before a DRP access is declared timed out.
    pub drp_idle_retries: u32,
    pub drp_idle_delay: Duration,

    /// STATUS samples while waiting for the link-up bit.
    pub link_retries: u32,
    pub link_delay: Duration,

    /// Reset-and-check attempts, including the first one.
    pub reset_attempts: u32,
    /// Time RESETN is held low.
    pub reset_pulse: Duration,

    /// Extra reset cycles spent clearing buffer underflow/overflow.
    pub buffer_retries: u32,
}

impl Timing {
    pub const HARDWARE: Self = Self {
        drp_idle_retries: 20,
        drp_idle_delay: Duration::from_millis(1),
        link_retries: 100,
        link_delay: Duration::from_millis(1),
        reset_attempts: 2,
        reset_pulse: Duration::from_micros(2),
        buffer_retries: 10,
    };

    /// Same poll counts as [`Timing::HARDWARE`], no waiting.
    pub const fn fast() -> Self {
        Self {
            drp_idle_delay: Duration::ZERO,
            link_delay: Duration::ZERO,
            reset_pulse: Duration::ZERO,
            ..Self::HARDWARE
        }
    }
}

impl Default for Timing {
    fn default() -> Self {
        Self::HARDWARE
    }
}
