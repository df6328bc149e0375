use adxcvr_io::regs::{FpgaInfo, Version};
use facet::Facet;

use crate::Error;

/// Transceiver primitive generation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::VariantArray)]
pub enum XcvrType {
    S7Gtx2,
    UsGth3,
    UsGth4,
    UsGty4,
}

impl XcvrType {
    /// Type code as reported by cores with major version above 0x10.
    pub const fn from_code(code: u8) -> Result<Self, Error> {
        match code {
            2 => Ok(Self::S7Gtx2),
            5 => Ok(Self::UsGth3),
            8 => Ok(Self::UsGth4),
            9 => Ok(Self::UsGty4),
            _ => Err(Error::UnknownType {
                code,
                legacy: false,
            }),
        }
    }

    pub const fn from_legacy_code(code: u8) -> Result<Self, Error> {
        match code {
            0 => Ok(Self::S7Gtx2),
            1 => Ok(Self::UsGth3),
            2 => Ok(Self::UsGth4),
            3 => Ok(Self::UsGty4),
            _ => Err(Error::UnknownType { code, legacy: true }),
        }
    }

    pub const fn code(self) -> u8 {
        match self {
            Self::S7Gtx2 => 2,
            Self::UsGth3 => 5,
            Self::UsGth4 => 8,
            Self::UsGty4 => 9,
        }
    }

    pub const fn is_ultrascale(self) -> bool {
        !matches!(self, Self::S7Gtx2)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Encoding {
    #[default]
    Enc8b10b,
    Enc64b66b,
}

impl Encoding {
    /// JESD204 link mode field: 2 is 204C, anything else 204B.
    pub const fn from_link_mode(mode: u8) -> Self {
        match mode {
            2 => Self::Enc64b66b,
            _ => Self::Enc8b10b,
        }
    }
}

/// Reference clock accuracy class.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum RefclkPpm {
    #[default]
    Pm200,
    Pm700,
    Pm1250,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FpgaTechnology {
    #[default]
    Unknown,
    Series7,
    UltraScale,
    UltraScalePlus,
}

impl FpgaTechnology {
    pub const fn from_raw(raw: u8) -> Self {
        match raw {
            1 => Self::Series7,
            2 => Self::UltraScale,
            3 => Self::UltraScalePlus,
            _ => Self::Unknown,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FpgaFamily {
    #[default]
    Unknown,
    Artix,
    Kintex,
    Virtex,
    Zynq,
}

impl FpgaFamily {
    pub const fn from_raw(raw: u8) -> Self {
        match raw {
            1 => Self::Artix,
            2 => Self::Kintex,
            3 => Self::Virtex,
            4 => Self::Zynq,
            _ => Self::Unknown,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum DevPackage {
    #[default]
    Unknown,
    Rf,
    Fl,
    Ff,
    Fb,
    Hc,
    Fh,
    Cs,
    Cp,
    Ft,
    Fg,
    Sb,
    Rb,
    Rs,
    Cl,
    Sf,
    Ba,
    Fa,
}

impl DevPackage {
    pub const fn from_raw(raw: u8) -> Self {
        match raw {
            1 => Self::Rf,
            2 => Self::Fl,
            3 => Self::Ff,
            4 => Self::Fb,
            5 => Self::Hc,
            6 => Self::Fh,
            7 => Self::Cs,
            8 => Self::Cp,
            9 => Self::Ft,
            10 => Self::Fg,
            11 => Self::Sb,
            12 => Self::Rb,
            13 => Self::Rs,
            14 => Self::Cl,
            15 => Self::Sf,
            16 => Self::Ba,
            17 => Self::Fa,
            _ => Self::Unknown,
        }
    }
}

/// Which PLL drives the serial clock. Values match the CONTROL register
/// field.
#[repr(u8)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Facet)]
pub enum SysClkSel {
    #[default]
    Cpll = 0,
    Qpll1 = 2,
    Qpll0 = 3,
}

impl SysClkSel {
    pub const fn is_cpll(self) -> bool {
        matches!(self, Self::Cpll)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Side {
    Rx,
    Tx,
}

/// Board-specific VCO limits in kHz. `Some` replaces the computed bound.
///
/// `vco0` is the CPLL band and the QPLL low band, `vco1` the QPLL high band.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VcoOverrides {
    pub vco0_min: Option<u32>,
    pub vco0_max: Option<u32>,
    pub vco1_min: Option<u32>,
    pub vco1_max: Option<u32>,
}

/// Everything the PLL engine needs to know about one transceiver instance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Xcvr {
    pub ty: XcvrType,
    pub encoding: Encoding,
    pub refclk_ppm: RefclkPpm,
    pub version: Version,
    pub technology: FpgaTechnology,
    pub family: FpgaFamily,
    /// Speed grade times ten, e.g. `21` for `-2LE`.
    pub speed_grade: u8,
    pub package: DevPackage,
    pub voltage_mv: u16,
    pub vco_overrides: VcoOverrides,
}

impl Xcvr {
    pub fn new(ty: XcvrType) -> Self {
        Self {
            ty,
            encoding: Encoding::default(),
            refclk_ppm: RefclkPpm::default(),
            version: Version::default(),
            technology: FpgaTechnology::default(),
            family: FpgaFamily::default(),
            speed_grade: 0,
            package: DevPackage::default(),
            voltage_mv: 0,
            vco_overrides: VcoOverrides::default(),
        }
    }

    pub fn with_fpga_info(mut self, info: FpgaInfo, voltage_mv: u16) -> Self {
        self.technology = FpgaTechnology::from_raw(info.technology);
        self.family = FpgaFamily::from_raw(info.family);
        self.speed_grade = info.speed_grade;
        self.package = DevPackage::from_raw(info.package);
        self.voltage_mv = voltage_mv;
        self
    }

    /// Cores newer than 0x10 report FPGA characteristics used to narrow the
    /// VCO ranges.
    pub fn has_fpga_info(&self) -> bool {
        self.version.major > 0x10
    }

    /// Index of the UltraScale QPLL (0 or 1) selected by `sys_clk_sel`.
    pub fn qpll_sel(&self, sys_clk_sel: SysClkSel) -> u16 {
        match (self.ty.is_ultrascale(), sys_clk_sel) {
            (true, SysClkSel::Qpll1) => 1,
            _ => 0,
        }
    }
}
