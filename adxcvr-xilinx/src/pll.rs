//! CPLL/QPLL divider search, lane rate recomputation and per-generation
//! register access.

use std::fmt::Display;

use adxcvr_io::{
    Backend, Controller, DrpPort,
    units::{Hz, Khz},
};
use eyre::Result;
use facet::Facet;
use tracing::debug;

use crate::{DevPackage, Error, FpgaFamily, SysClkSel, Xcvr, XcvrType, gth34, gtx2};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Facet)]
pub struct CpllConfig {
    pub refclk_div: u32,
    pub fb_div_n1: u32,
    pub fb_div_n2: u32,
}

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Facet)]
pub enum Band {
    Low = 0,
    High = 1,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Facet)]
pub struct QpllConfig {
    pub refclk_div: u32,
    pub fb_div: u32,
    pub band: Band,
    /// GTY4 only: the line rate is twice the VCO rate.
    pub gty4_full_rate: bool,
}

/// Power-of-two post divider between the PLL and the serial clock.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OutDiv(pub u32);

impl OutDiv {
    /// 3-bit register field. Anything outside {1,2,4,8,16} maps to 4.
    pub const fn encode(self) -> u16 {
        match self.0 {
            1 => 0,
            2 => 1,
            4 => 2,
            8 => 3,
            _ => 4,
        }
    }

    pub const fn decode(field: u16) -> Self {
        Self(1 << (field & 7))
    }
}

impl Display for OutDiv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "/{}", self.0)
    }
}

// Divider field codes shared by both DRP layouts.

/// Whether the N1 (4 or 5) bit is set.
pub(crate) fn encode_cpll_n1(n1: u32) -> Result<bool, Error> {
    match n1 {
        4 => Ok(false),
        5 => Ok(true),
        value => Err(Error::InvalidDivider {
            what: "CPLL N1 feedback",
            value,
        }),
    }
}

pub(crate) fn encode_cpll_n2(n2: u32) -> Result<u16, Error> {
    match n2 {
        1 => Ok(0x10),
        2 => Ok(0),
        3 => Ok(1),
        4 => Ok(2),
        5 => Ok(3),
        value => Err(Error::InvalidDivider {
            what: "CPLL N2 feedback",
            value,
        }),
    }
}

pub(crate) fn decode_cpll_n2(code: u16) -> u32 {
    match code {
        3 => 5,
        2 => 4,
        1 => 3,
        0 => 2,
        _ => 1,
    }
}

pub(crate) fn encode_qpll_refclk_div(m: u32) -> Result<u16, Error> {
    match m {
        1 => Ok(16),
        2 => Ok(0),
        3 => Ok(1),
        4 => Ok(2),
        value => Err(Error::InvalidDivider {
            what: "QPLL reference",
            value,
        }),
    }
}

pub(crate) fn decode_qpll_refclk_div(code: u16) -> Option<u32> {
    match code {
        16 => Some(1),
        0 => Some(2),
        1 => Some(3),
        2 => Some(4),
        _ => None,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct VcoRange {
    min: u64,
    max: u64,
}

impl VcoRange {
    const fn new(min: u64, max: u64) -> Self {
        Self { min, max }
    }

    fn contains(self, vco: u64) -> bool {
        (self.min..=self.max).contains(&vco)
    }

    fn apply(&mut self, min: Option<u32>, max: Option<u32>) {
        if let Some(min) = min {
            self.min = u64::from(min);
        }
        if let Some(max) = max {
            self.max = u64::from(max);
        }
    }
}

/// A narrowed upper VCO bound that applies to some FPGAs.
struct VcoCap {
    ty: &'static [XcvrType],
    when: fn(&Xcvr) -> bool,
    band: Band,
    max: u64,
}

const US_GTH: &[XcvrType] = &[XcvrType::UsGth3, XcvrType::UsGth4];

// CPLL caps only use `Band::Low`.
const CPLL_CAPS: &[VcoCap] = &[
    VcoCap {
        ty: US_GTH,
        when: |x| x.voltage_mv < 850,
        band: Band::Low,
        max: 4_250_000,
    },
    VcoCap {
        ty: US_GTH,
        when: |x| x.speed_grade / 10 == 1,
        band: Band::Low,
        max: 4_250_000,
    },
    VcoCap {
        ty: &[XcvrType::UsGty4],
        when: |x| x.speed_grade / 10 == 1,
        band: Band::Low,
        max: 4_250_000,
    },
];

const QPLL_CAPS: &[VcoCap] = &[
    VcoCap {
        ty: &[XcvrType::S7Gtx2],
        when: |x| {
            x.family == FpgaFamily::Kintex
                && matches!(x.package, DevPackage::Fb | DevPackage::Rf | DevPackage::Ff)
        },
        band: Band::Low,
        max: 6_600_000,
    },
    VcoCap {
        ty: &[XcvrType::S7Gtx2],
        when: |x| x.speed_grade / 10 == 2,
        band: Band::High,
        max: 10_312_500,
    },
];

fn caps<'a>(xcvr: &'a Xcvr, caps: &'a [VcoCap]) -> impl Iterator<Item = &'a VcoCap> {
    caps.iter()
        .filter(move |cap| xcvr.has_fpga_info() && cap.ty.contains(&xcvr.ty) && (cap.when)(xcvr))
}

fn cpll_vco_range(xcvr: &Xcvr) -> VcoRange {
    let mut range = match xcvr.ty {
        XcvrType::S7Gtx2 => VcoRange::new(1_600_000, 3_300_000),
        XcvrType::UsGth3 | XcvrType::UsGth4 | XcvrType::UsGty4 => {
            VcoRange::new(2_000_000, 6_250_000)
        }
    };
    for cap in caps(xcvr, CPLL_CAPS) {
        range.max = cap.max;
    }
    let o = &xcvr.vco_overrides;
    range.apply(o.vco0_min, o.vco0_max);
    range
}

/// Low and high band.
fn qpll_vco_ranges(xcvr: &Xcvr, sys_clk_sel: SysClkSel) -> (VcoRange, VcoRange) {
    let (mut low, mut high) = match xcvr.ty {
        XcvrType::S7Gtx2 => (
            VcoRange::new(5_930_000, 8_000_000),
            VcoRange::new(9_800_000, 12_500_000),
        ),
        XcvrType::UsGth3 | XcvrType::UsGth4 | XcvrType::UsGty4 => {
            let range = match xcvr.qpll_sel(sys_clk_sel) {
                1 => VcoRange::new(8_000_000, 13_000_000),
                _ => VcoRange::new(9_800_000, 16_375_000),
            };
            (range, range)
        }
    };
    for cap in caps(xcvr, QPLL_CAPS) {
        match cap.band {
            Band::Low => low.max = cap.max,
            Band::High => high.max = cap.max,
        }
    }
    let o = &xcvr.vco_overrides;
    low.apply(o.vco0_min, o.vco0_max);
    high.apply(o.vco1_min, o.vco1_max);
    (low, high)
}

const QPLL_FB_DIV_GTX2: &[u32] = &[16, 20, 32, 40, 64, 66, 80, 100];
const QPLL_FB_DIV_GTH34: [u32; 145] = {
    let mut n = [0; 145];
    let mut i = 0;
    while i < n.len() {
        n[i] = 16 + i as u32;
        i += 1;
    }
    n
};
const QPLL_FB_DIV_GTY4: &[u32] = &[
    16, 20, 32, 33, 40, 64, 66, 75, 80, 99, 100, 112, 120, 125, 132, 150, 160,
];

/// Feedback divider candidates, in search order.
pub fn qpll_fb_divs(ty: XcvrType) -> &'static [u32] {
    match ty {
        XcvrType::S7Gtx2 => QPLL_FB_DIV_GTX2,
        XcvrType::UsGth3 | XcvrType::UsGth4 => &QPLL_FB_DIV_GTH34,
        XcvrType::UsGty4 => QPLL_FB_DIV_GTY4,
    }
}

/// Find CPLL dividers reproducing `lane_rate` exactly from `refclk`.
///
/// The first hit wins; the search prefers the smallest reference divider, then
/// the smallest output divider, then the largest feedback dividers.
pub fn calc_cpll_config(
    xcvr: &Xcvr,
    refclk: Khz,
    lane_rate: Khz,
) -> Result<(CpllConfig, OutDiv), Error> {
    let vco = cpll_vco_range(xcvr);
    let (refclk_khz, lane_khz) = (u64::from(refclk.0), u64::from(lane_rate.0));

    for m in 1..=2u64 {
        for d in [1, 2, 4, 8u64] {
            for n1 in [5, 4u64] {
                for n2 in [5, 4, 3, 2, 1u64] {
                    if !vco.contains(refclk_khz * n1 * n2 / m) {
                        continue;
                    }
                    if refclk_khz / m / d == lane_khz / (2 * n1 * n2) {
                        let config = CpllConfig {
                            refclk_div: m as u32,
                            fb_div_n1: n1 as u32,
                            fb_div_n2: n2 as u32,
                        };
                        debug!(?config, out_div = d, "cpll");
                        return Ok((config, OutDiv(d as u32)));
                    }
                }
            }
        }
    }

    debug!(%lane_rate, %refclk, "cpll: no setting");
    Err(Error::NoPllSetting {
        pll: "CPLL",
        refclk,
        lane_rate,
    })
}

/// Find QPLL dividers reproducing `lane_rate` exactly from `refclk`.
///
/// A VCO inside both bands is reported as high band.
pub fn calc_qpll_config(
    xcvr: &Xcvr,
    sys_clk_sel: SysClkSel,
    refclk: Khz,
    lane_rate: Khz,
) -> Result<(QpllConfig, OutDiv), Error> {
    let (low, high) = qpll_vco_ranges(xcvr, sys_clk_sel);
    let fb_divs = qpll_fb_divs(xcvr.ty);
    let (refclk_khz, lane_khz) = (u64::from(refclk.0), u64::from(lane_rate.0));

    for m in 1..=4u64 {
        for d in [1, 2, 4, 8, 16u64] {
            for &n in fb_divs {
                let n = u64::from(n);
                let vco = refclk_khz * n / m;
                let band = if high.contains(vco) {
                    Band::High
                } else if low.contains(vco) {
                    Band::Low
                } else {
                    continue;
                };

                let pfd = refclk_khz / m / d;
                let gty4_full_rate = if pfd == lane_khz / n {
                    false
                } else if xcvr.ty == XcvrType::UsGty4 && pfd == lane_khz / 2 / n {
                    true
                } else {
                    continue;
                };

                let config = QpllConfig {
                    refclk_div: m as u32,
                    fb_div: n as u32,
                    band,
                    gty4_full_rate,
                };
                debug!(?config, out_div = d, "qpll");
                return Ok((config, OutDiv(d as u32)));
            }
        }
    }

    debug!(%lane_rate, %refclk, "qpll: no setting");
    Err(Error::NoPllSetting {
        pll: "QPLL",
        refclk,
        lane_rate,
    })
}

fn div_round_closest(num: u64, den: u64) -> u64 {
    (num + den / 2) / den
}

/// Lane rate produced by a CPLL configuration. Zero dividers give zero.
pub fn cpll_calc_lane_rate(refclk: Hz, config: &CpllConfig, out_div: OutDiv) -> Khz {
    if config.refclk_div == 0 || out_div.0 == 0 {
        return Khz(0);
    }
    let num = refclk.0 * u64::from(config.fb_div_n1) * u64::from(config.fb_div_n2) * 2;
    let den = u64::from(config.refclk_div) * u64::from(out_div.0) * 1000;
    Khz(div_round_closest(num, den) as u32)
}

/// Lane rate produced by a QPLL configuration. Zero dividers give zero.
pub fn qpll_calc_lane_rate(refclk: Hz, config: &QpllConfig, out_div: OutDiv) -> Khz {
    if config.refclk_div == 0 || out_div.0 == 0 {
        return Khz(0);
    }
    let refclk = if config.gty4_full_rate {
        refclk.0 * 2
    } else {
        refclk.0
    };
    let num = refclk * u64::from(config.fb_div);
    let den = u64::from(config.refclk_div) * u64::from(out_div.0) * 1000;
    Khz(div_round_closest(num, den) as u32)
}

pub fn read_cpll_config(
    cont: &mut Controller<impl Backend>,
    xcvr: &Xcvr,
    port: DrpPort,
) -> Result<CpllConfig> {
    let config = match xcvr.ty {
        XcvrType::S7Gtx2 => gtx2::read_cpll_config(cont, port)?,
        XcvrType::UsGth3 | XcvrType::UsGth4 | XcvrType::UsGty4 => {
            gth34::read_cpll_config(cont, port)?
        }
    };
    debug!(%port, ?config, "read cpll");
    Ok(config)
}

pub fn write_cpll_config(
    cont: &mut Controller<impl Backend>,
    xcvr: &Xcvr,
    port: DrpPort,
    config: &CpllConfig,
) -> Result<()> {
    match xcvr.ty {
        XcvrType::S7Gtx2 => gtx2::write_cpll_config(cont, port, config),
        XcvrType::UsGth3 | XcvrType::UsGth4 | XcvrType::UsGty4 => {
            gth34::write_cpll_config(cont, port, config)
        }
    }
}

pub fn read_qpll_config(
    cont: &mut Controller<impl Backend>,
    xcvr: &Xcvr,
    sys_clk_sel: SysClkSel,
    port: DrpPort,
) -> Result<QpllConfig> {
    let config = match xcvr.ty {
        XcvrType::S7Gtx2 => gtx2::read_qpll_config(cont, port)?,
        XcvrType::UsGth3 | XcvrType::UsGth4 | XcvrType::UsGty4 => {
            gth34::read_qpll_config(cont, xcvr.ty, xcvr.qpll_sel(sys_clk_sel), port)?
        }
    };
    debug!(%port, ?config, "read qpll");
    Ok(config)
}

pub fn write_qpll_config(
    cont: &mut Controller<impl Backend>,
    xcvr: &Xcvr,
    sys_clk_sel: SysClkSel,
    port: DrpPort,
    config: &QpllConfig,
) -> Result<()> {
    match xcvr.ty {
        XcvrType::S7Gtx2 => gtx2::write_qpll_config(cont, port, config),
        XcvrType::UsGth3 | XcvrType::UsGth4 | XcvrType::UsGty4 => gth34::write_qpll_config(
            cont,
            xcvr.ty,
            xcvr.qpll_sel(sys_clk_sel),
            port,
            config,
        ),
    }
}
