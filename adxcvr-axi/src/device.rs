use adxcvr_io::{
    Backend, Controller, DrpPort, Hex,
    regs::{self, Control, FpgaInfo, Resetn, Status, Synth, Version},
    units::{Hz, Khz},
};
use adxcvr_xilinx::{
    CpllConfig, Encoding, OutDiv, QpllConfig, Side, SysClkSel, Xcvr, XcvrType, pll,
};
use eyre::Result;
use facet::Facet;
use tracing::{debug, error, info, instrument, warn};

use crate::{Clk, ClkOps, Error, InitParams, OutClkSel};

/// First core version that reports elastic buffer under/overflow.
const BUFSTATUS_VERSION: Version = Version::new(17, 5, 'a');

/// Lanes sharing one QPLL common block.
const LANES_PER_QPLL: u32 = 4;

/// clk25 dividers target a 25 MHz internal clock.
const CLK25_KHZ: u32 = 25_000;

/// PLL settings found by the search, or read back from lane 0.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Facet)]
pub enum PllConfig {
    Cpll(CpllConfig),
    Qpll(QpllConfig),
}

/// One AXI-ADXCVR core and the transceivers behind it.
pub struct Device<B> {
    name: String,
    cont: Controller<B>,
    xcvr: Xcvr,
    sys_clk_sel: SysClkSel,
    out_clk_sel: OutClkSel,
    cpll_enable: bool,
    qpll_enable: bool,
    tx_enable: bool,
    lpm_enable: bool,
    num_lanes: u32,
    lane_rate: Khz,
    ref_rate: Khz,
    export_clk: bool,
}

fn div_round_closest(num: u32, den: u32) -> u32 {
    (num + den / 2) / den
}

impl<B: Backend> Device<B> {
    /// Probe the core, write CONTROL and hold the transceivers in reset.
    ///
    /// Call [`Device::clk_enable`] to release reset and wait for the link.
    #[instrument(skip_all, fields(name = %params.name))]
    pub fn init(backend: B, params: InitParams) -> Result<Self> {
        let mut cont = Controller::with_timing(backend, params.timing);

        let version = Version::from_raw(cont.read(regs::VERSION)?);
        let synth = Synth::from_raw(cont.read(regs::SYNTH_CONF)?);
        let ty = if version.major > 0x10 {
            XcvrType::from_code(synth.xcvr_type)?
        } else {
            XcvrType::from_legacy_code(synth.xcvr_type)?
        };

        let mut xcvr = Xcvr {
            encoding: Encoding::from_link_mode(synth.link_mode),
            refclk_ppm: params.refclk_ppm,
            version,
            vco_overrides: params.vco_overrides,
            ..Xcvr::new(ty)
        };
        if xcvr.has_fpga_info() {
            let info = FpgaInfo::from_raw(cont.read(regs::FPGA_INFO)?);
            let voltage = cont.read(regs::FPGA_VOLTAGE)? as u16;
            xcvr = xcvr.with_fpga_info(info, voltage);
        }
        debug!(%version, ?synth, ?xcvr, "probed");

        let mut dev = Self {
            name: params.name,
            cont,
            xcvr,
            sys_clk_sel: params.sys_clk_sel,
            out_clk_sel: params.out_clk_sel,
            cpll_enable: params.sys_clk_sel.is_cpll(),
            qpll_enable: synth.qpll_enable,
            tx_enable: synth.tx_enable,
            lpm_enable: params.lpm_enable,
            num_lanes: u32::from(synth.num_lanes),
            lane_rate: Khz(0),
            ref_rate: params.ref_rate,
            export_clk: params.export_clk,
        };

        dev.cont.write(regs::RESETN, 0)?;
        let control = Control {
            lpm_dfe_n: dev.lpm_enable,
            sys_clk_sel: dev.sys_clk_sel as u8,
            out_clk_sel: dev.out_clk_sel.code(),
        };
        dev.cont.write(regs::CONTROL, control.to_raw())?;

        if !dev.tx_enable {
            for lane in 0..dev.num_lanes {
                let port = DrpPort::channel(lane);
                adxcvr_xilinx::configure_lpm_dfe_mode(
                    &mut dev.cont,
                    &dev.xcvr,
                    port,
                    dev.lpm_enable,
                )?;
            }
        }

        if !params.lane_rate.is_zero() && !params.ref_rate.is_zero() {
            dev.clk_set_rate(params.lane_rate, params.ref_rate)?;
        }

        info!(
            ty = ?dev.xcvr.ty,
            %version,
            lanes = dev.num_lanes,
            tx = dev.tx_enable,
            "initialized"
        );
        Ok(dev)
    }

    fn calc_pll(&self, rate: Khz, parent_rate: Khz) -> Result<(PllConfig, OutDiv)> {
        let (config, out_div) = if self.cpll_enable {
            let (config, out_div) = pll::calc_cpll_config(&self.xcvr, parent_rate, rate)?;
            (PllConfig::Cpll(config), out_div)
        } else {
            let (config, out_div) =
                pll::calc_qpll_config(&self.xcvr, self.sys_clk_sel, parent_rate, rate)?;
            (PllConfig::Qpll(config), out_div)
        };
        Ok((config, out_div))
    }

    /// ProgDiv ratio for `out_div`, or 0 (disabled) if the part cannot divide
    /// by it.
    fn prog_div_ratio(&self, out_div: OutDiv) -> u32 {
        let per_div = match self.xcvr.encoding {
            Encoding::Enc8b10b => 20,
            Encoding::Enc64b66b => 33,
        };
        let ratio = out_div.0 * per_div;
        let max = adxcvr_xilinx::prog_div_max(self.xcvr.ty).unwrap_or(0);
        if ratio > max || !adxcvr_xilinx::prog_div_supported(self.xcvr.ty, ratio) {
            warn!(ratio, max, "no ProgDiv setting, disabling");
            return 0;
        }
        ratio
    }

    /// Search PLL settings for `rate` and program every lane.
    #[instrument(skip_all, fields(%rate, %parent_rate))]
    pub fn clk_set_rate(&mut self, rate: Khz, parent_rate: Khz) -> Result<()> {
        let (config, out_div) = self.calc_pll(rate, parent_rate)?;
        let clk25_div = div_round_closest(parent_rate.0, CLK25_KHZ);
        debug!(?config, %out_div, clk25_div, "programming");

        let prog_div = match (self.out_clk_sel, self.xcvr.ty.is_ultrascale()) {
            (OutClkSel::ProgDiv, true) => Some(self.prog_div_ratio(out_div)),
            _ => None,
        };

        for lane in 0..self.num_lanes {
            let port = DrpPort::channel(lane);
            match &config {
                PllConfig::Cpll(c) => pll::write_cpll_config(&mut self.cont, &self.xcvr, port, c)?,
                PllConfig::Qpll(q) if self.qpll_enable && lane % LANES_PER_QPLL == 0 => {
                    let common = DrpPort::common(lane);
                    pll::write_qpll_config(&mut self.cont, &self.xcvr, self.sys_clk_sel, common, q)?
                }
                PllConfig::Qpll(_) => {}
            }

            let (rx, tx) = if self.tx_enable {
                (None, Some(out_div))
            } else {
                (Some(out_div), None)
            };
            adxcvr_xilinx::write_out_div(&mut self.cont, &self.xcvr, port, rx, tx)?;

            if let Some(ratio) = prog_div {
                let (rx, tx) = if self.tx_enable {
                    (None, Some(ratio))
                } else {
                    (Some(ratio), None)
                };
                adxcvr_xilinx::write_prog_div(&mut self.cont, &self.xcvr, port, rx, tx)?;
            }

            if self.tx_enable {
                adxcvr_xilinx::write_tx_clk25_div(&mut self.cont, &self.xcvr, port, clk25_div)?;
            } else {
                adxcvr_xilinx::configure_cdr(
                    &mut self.cont,
                    &self.xcvr,
                    port,
                    rate,
                    out_div,
                    self.lpm_enable,
                )?;
                adxcvr_xilinx::write_rx_clk25_div(&mut self.cont, &self.xcvr, port, clk25_div)?;
            }
        }

        self.lane_rate = rate;
        self.ref_rate = parent_rate;
        Ok(())
    }

    /// The rate [`Device::clk_set_rate`] would program. Fails the same way.
    pub fn clk_round_rate(&self, rate: Khz, parent_rate: Khz) -> Result<Khz> {
        self.calc_pll(rate, parent_rate)?;
        Ok(rate)
    }

    /// PLL configuration currently programmed for lane 0.
    pub fn read_pll_config(&mut self) -> Result<PllConfig> {
        let config = if self.cpll_enable {
            let port = DrpPort::channel(0);
            PllConfig::Cpll(pll::read_cpll_config(&mut self.cont, &self.xcvr, port)?)
        } else {
            let port = DrpPort::common(0);
            PllConfig::Qpll(pll::read_qpll_config(
                &mut self.cont,
                &self.xcvr,
                self.sys_clk_sel,
                port,
            )?)
        };
        Ok(config)
    }

    /// Lane rate of lane 0 as programmed in hardware.
    pub fn clk_recalc_rate(&mut self, parent_rate: Khz) -> Result<Khz> {
        let side = if self.tx_enable { Side::Tx } else { Side::Rx };
        let out_div =
            adxcvr_xilinx::read_out_div(&mut self.cont, &self.xcvr, DrpPort::channel(0), side)?;
        let refclk = Hz::from(parent_rate);
        let rate = match self.read_pll_config()? {
            PllConfig::Cpll(c) => pll::cpll_calc_lane_rate(refclk, &c, out_div),
            PllConfig::Qpll(q) => pll::qpll_calc_lane_rate(refclk, &q, out_div),
        };
        debug!(%rate, %out_div, "recalc");
        Ok(rate)
    }

    /// Poll STATUS until any bit is set.
    #[instrument(skip_all)]
    pub fn status_error(&mut self) -> Result<()> {
        let timing = *self.cont.timing();
        for _ in 0..timing.link_retries {
            self.cont.delay(timing.link_delay);
            let status = Status::from_bits_retain(self.cont.read(regs::STATUS)?);
            if !status.is_empty() {
                debug!(?status, "link up");
                return Ok(());
            }
        }
        error!(polls = timing.link_retries, "link timeout");
        Err(Error::LinkTimeout {
            polls: timing.link_retries,
        }
        .into())
    }

    /// Pulse RESETN and wait for the link, retrying on link timeouts.
    #[instrument(skip_all)]
    pub fn reset(&mut self) -> Result<()> {
        let timing = *self.cont.timing();
        let mut last = None;
        for attempt in 1..=timing.reset_attempts {
            self.cont.write(regs::RESETN, 0)?;
            self.cont.delay(timing.reset_pulse);
            self.cont.write(regs::RESETN, Resetn::RESETN.bits())?;
            match self.status_error() {
                Ok(()) => return Ok(()),
                Err(e) if e.downcast_ref::<Error>().is_some() => {
                    warn!(attempt, "reset: {e}");
                    last = Some(e);
                }
                Err(e) => return Err(e),
            }
        }
        Err(last.unwrap_or_else(|| Error::LinkTimeout { polls: 0 }.into()))
    }

    /// Release reset and bring the link up. Newer cores also get their
    /// elastic buffer errors cleared.
    #[instrument(skip_all, fields(name = %self.name))]
    pub fn clk_enable(&mut self) -> Result<()> {
        self.reset()?;
        if self.xcvr.version < BUFSTATUS_VERSION {
            return Ok(());
        }

        let retries = self.cont.timing().buffer_retries;
        let mut status = Status::from_bits_retain(self.cont.read(regs::STATUS)?);
        for _ in 0..retries {
            if !status.intersects(Status::BUFFER_ERRORS) {
                break;
            }
            debug!(?status, "clearing buffer status");
            let val = Resetn::RESETN | Resetn::BUFSTATUS_RST;
            self.cont.write(regs::RESETN, val.bits())?;
            self.reset()?;
            status = Status::from_bits_retain(self.cont.read(regs::STATUS)?);
        }

        if status.contains(Status::UNDERFLOW) {
            warn!(status = %Hex(status.bits()), "buffer underflow persists");
        }
        if status.contains(Status::OVERFLOW) {
            warn!(status = %Hex(status.bits()), "buffer overflow persists");
        }
        Ok(())
    }

    #[instrument(skip_all, fields(name = %self.name))]
    pub fn clk_disable(&mut self) -> Result<()> {
        self.cont.write(regs::RESETN, 0)
    }

    /// RX PRBS checker error count of `lane`.
    pub fn prbs_error_count(&mut self, lane: u32) -> Result<u32> {
        adxcvr_xilinx::prbs_err_cnt_get(&mut self.cont, &self.xcvr, DrpPort::channel(lane))
    }

    /// A clock handle, if the device was set up to export one.
    pub fn clk(&mut self) -> Option<Clk<&mut Self>> {
        if !self.export_clk {
            return None;
        }
        let name = self.name.clone();
        Some(Clk::new(name, self))
    }

    /// Tear down and hand back the backend.
    pub fn remove(self) -> B {
        debug!(name = %self.name, "removed");
        self.cont.into_backend()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn xcvr(&self) -> &Xcvr {
        &self.xcvr
    }

    pub fn num_lanes(&self) -> u32 {
        self.num_lanes
    }

    pub fn lane_rate(&self) -> Khz {
        self.lane_rate
    }

    pub fn ref_rate(&self) -> Khz {
        self.ref_rate
    }

    pub fn tx_enable(&self) -> bool {
        self.tx_enable
    }

    pub fn cpll_enable(&self) -> bool {
        self.cpll_enable
    }

    pub fn qpll_enable(&self) -> bool {
        self.qpll_enable
    }

    pub fn sys_clk_sel(&self) -> SysClkSel {
        self.sys_clk_sel
    }

    pub fn out_clk_sel(&self) -> OutClkSel {
        self.out_clk_sel
    }

    pub fn controller(&self) -> &Controller<B> {
        &self.cont
    }

    pub fn controller_mut(&mut self) -> &mut Controller<B> {
        &mut self.cont
    }
}

impl<B: Backend> ClkOps for Device<B> {
    fn enable(&mut self) -> Result<()> {
        self.clk_enable()
    }

    fn disable(&mut self) -> Result<()> {
        self.clk_disable()
    }

    fn recalc_rate(&mut self, parent_rate: Khz) -> Result<Khz> {
        self.clk_recalc_rate(parent_rate)
    }

    fn round_rate(&mut self, rate: Khz, parent_rate: Khz) -> Result<Khz> {
        self.clk_round_rate(rate, parent_rate)
    }

    fn set_rate(&mut self, rate: Khz, parent_rate: Khz) -> Result<()> {
        self.clk_set_rate(rate, parent_rate)
    }
}

#[cfg(test)]
mod tests {
    use adxcvr_io::{Timing, fake_backend::FakeBackend};

    use super::*;

    fn device(ty: XcvrType, encoding_mode: u8) -> Device<FakeBackend> {
        let fake = FakeBackend::new()
            .with_version(Version::new(0x11, 5, 'a'))
            .with_synth(Synth {
                num_lanes: 1,
                link_mode: encoding_mode,
                xcvr_type: ty.code(),
                ..Default::default()
            });
        let params = InitParams {
            out_clk_sel: OutClkSel::ProgDiv,
            timing: Timing::fast(),
            ..Default::default()
        };
        match Device::init(fake, params) {
            Ok(dev) => dev,
            Err(e) => panic!("init failed: {e:?}"),
        }
    }

    #[test]
    fn test_prog_div_ratio() {
        let dev = device(XcvrType::UsGth3, 1);
        assert_eq!(dev.prog_div_ratio(OutDiv(2)), 40);
        // 160 is past the GTH3 limit
        assert_eq!(dev.prog_div_ratio(OutDiv(8)), 0);

        let dev = device(XcvrType::UsGty4, 2);
        assert_eq!(dev.prog_div_ratio(OutDiv(4)), 132);
        assert_eq!(dev.prog_div_ratio(OutDiv(2)), 66);
        assert_eq!(dev.prog_div_ratio(OutDiv(8)), 0);
    }

    #[test]
    fn test_clk25_rounding() {
        assert_eq!(div_round_closest(625_000, CLK25_KHZ), 25);
        assert_eq!(div_round_closest(156_250, CLK25_KHZ), 6);
        assert_eq!(div_round_closest(312_500, CLK25_KHZ), 13);
    }
}
