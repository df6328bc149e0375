use adxcvr_io::{Timing, units::Khz};
use adxcvr_xilinx::{RefclkPpm, SysClkSel, VcoOverrides};
use facet::Facet;

/// Source of the user clock. Values match the CONTROL register field.
#[repr(u8)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Facet)]
pub enum OutClkSel {
    #[default]
    Pcs = 1,
    Pma = 2,
    Refclk = 3,
    RefclkDiv2 = 4,
    ProgDiv = 5,
}

impl OutClkSel {
    pub const fn code(self) -> u8 {
        self as u8
    }
}

/// Per-instance configuration handed to [`crate::Device::init`].
///
/// When both `lane_rate` and `ref_rate` are non-zero the PLLs are programmed
/// during init.
#[derive(Clone, Debug, Default)]
pub struct InitParams {
    pub name: String,
    pub sys_clk_sel: SysClkSel,
    pub out_clk_sel: OutClkSel,
    pub lpm_enable: bool,
    pub lane_rate: Khz,
    pub ref_rate: Khz,
    /// Hand out a [`crate::Clk`] for this device.
    pub export_clk: bool,
    pub refclk_ppm: RefclkPpm,
    pub vco_overrides: VcoOverrides,
    pub timing: Timing,
}
