use adxcvr_axi::{Device, InitParams, OutClkSel};
use adxcvr_io::{
    DrpPort, SpaceHex, Timing,
    fake_backend::FakeBackend,
    regs::{Synth, Version},
    units::Hz,
};
use adxcvr_xilinx::{SysClkSel, Xcvr, XcvrType, drp, pll};
use clap::Parser;
use color_eyre::Result;
use facet_pretty::FacetPretty;
use tracing::info;

use crate::cli_helpers::Rate;

mod cli_helpers;

/// Offline PLL calculator and AXI-ADXCVR bring-up simulator.
#[derive(clap::Parser)]
struct Args {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(clap::Subcommand)]
enum CliCommand {
    /// Search CPLL dividers for a lane rate
    Cpll(Target),
    /// Search QPLL dividers for a lane rate
    Qpll(QpllTarget),
    /// Bring up a simulated core and show what was programmed
    Simulate(Simulate),
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum Type {
    Gtx2,
    Gth3,
    Gth4,
    Gty4,
}

impl From<Type> for XcvrType {
    fn from(value: Type) -> Self {
        match value {
            Type::Gtx2 => XcvrType::S7Gtx2,
            Type::Gth3 => XcvrType::UsGth3,
            Type::Gth4 => XcvrType::UsGth4,
            Type::Gty4 => XcvrType::UsGty4,
        }
    }
}

#[derive(Clone, Copy, Default, clap::ValueEnum)]
enum Pll {
    #[default]
    Cpll,
    Qpll0,
    Qpll1,
}

impl From<Pll> for SysClkSel {
    fn from(value: Pll) -> Self {
        match value {
            Pll::Cpll => SysClkSel::Cpll,
            Pll::Qpll0 => SysClkSel::Qpll0,
            Pll::Qpll1 => SysClkSel::Qpll1,
        }
    }
}

#[derive(Clone, Copy, Default, clap::ValueEnum)]
enum OutClk {
    #[default]
    Pcs,
    Pma,
    Refclk,
    RefclkDiv2,
    Progdiv,
}

impl From<OutClk> for OutClkSel {
    fn from(value: OutClk) -> Self {
        match value {
            OutClk::Pcs => OutClkSel::Pcs,
            OutClk::Pma => OutClkSel::Pma,
            OutClk::Refclk => OutClkSel::Refclk,
            OutClk::RefclkDiv2 => OutClkSel::RefclkDiv2,
            OutClk::Progdiv => OutClkSel::ProgDiv,
        }
    }
}

#[derive(clap::Args)]
struct Target {
    #[arg(long = "type", value_enum)]
    ty: Type,

    /// Reference clock, e.g. 625M
    #[arg(long)]
    refclk: Rate,

    /// Lane rate, e.g. 6.25G
    #[arg(long)]
    lane_rate: Rate,
}

#[derive(clap::Args)]
struct QpllTarget {
    #[command(flatten)]
    target: Target,

    /// Use the second UltraScale QPLL
    #[arg(long)]
    qpll1: bool,
}

#[derive(clap::Args)]
struct Simulate {
    #[command(flatten)]
    target: Target,

    #[arg(long, default_value_t = 4)]
    lanes: u8,

    #[arg(long, value_enum, default_value = "cpll")]
    pll: Pll,

    #[arg(long, value_enum, default_value = "pcs")]
    out_clk: OutClk,

    /// Simulate a TX core
    #[arg(long)]
    tx: bool,

    /// LPM instead of DFE equalization
    #[arg(long)]
    lpm: bool,

    /// 64b66b (JESD204C) link
    #[arg(long)]
    jesd204c: bool,

    /// Print every DRP access
    #[arg(long)]
    log: bool,

    /// Print 16 DRP words per lane starting at this address
    #[arg(long, value_parser = parse_addr)]
    dump: Option<u16>,
}

fn parse_addr(s: &str) -> Result<u16, std::num::ParseIntError> {
    u16::from_str_radix(s.trim_start_matches("0x"), 16)
}

fn main() -> Result<()> {
    init_logging()?;
    let Args { command } = Args::parse();
    match command {
        CliCommand::Cpll(target) => cpll(target),
        CliCommand::Qpll(args) => qpll(args),
        CliCommand::Simulate(args) => simulate(args),
    }
}

fn cpll(Target { ty, refclk, lane_rate }: Target) -> Result<()> {
    let xcvr = Xcvr::new(ty.into());
    let (config, out_div) = pll::calc_cpll_config(&xcvr, refclk.0, lane_rate.0)?;
    println!("{}", config.pretty());
    let rate = pll::cpll_calc_lane_rate(Hz::from(refclk.0), &config, out_div);
    println!("out div {out_div}, lane rate {}", Rate(rate));
    Ok(())
}

fn qpll(QpllTarget { target, qpll1 }: QpllTarget) -> Result<()> {
    let Target { ty, refclk, lane_rate } = target;
    let xcvr = Xcvr::new(ty.into());
    let sel = if qpll1 {
        SysClkSel::Qpll1
    } else {
        SysClkSel::Qpll0
    };
    let (config, out_div) = pll::calc_qpll_config(&xcvr, sel, refclk.0, lane_rate.0)?;
    println!("{}", config.pretty());
    let rate = pll::qpll_calc_lane_rate(Hz::from(refclk.0), &config, out_div);
    println!("out div {out_div}, lane rate {}", Rate(rate));
    Ok(())
}

fn simulate(args: Simulate) -> Result<()> {
    let Target { ty, refclk, lane_rate } = args.target;
    let ty = XcvrType::from(ty);
    let fake = FakeBackend::new()
        .with_version(Version::new(0x11, 5, 'a'))
        .with_synth(Synth {
            num_lanes: args.lanes,
            tx_enable: args.tx,
            link_mode: if args.jesd204c { 2 } else { 1 },
            xcvr_type: ty.code(),
            qpll_enable: true,
        });
    let params = InitParams {
        name: "adxcvr-sim".into(),
        sys_clk_sel: args.pll.into(),
        out_clk_sel: args.out_clk.into(),
        lpm_enable: args.lpm,
        lane_rate: lane_rate.0,
        ref_rate: refclk.0,
        timing: Timing::fast(),
        ..Default::default()
    };

    let mut dev = Device::init(fake, params)?;
    dev.clk_enable()?;
    info!(lanes = dev.num_lanes(), ty = ?dev.xcvr().ty, "simulated core up");
    println!("{}", dev.read_pll_config()?.pretty());
    println!("lane rate {}", Rate(dev.clk_recalc_rate(refclk.0)?));

    if let Some(addr) = args.dump {
        for lane in 0..dev.num_lanes() {
            let port = DrpPort::channel(lane);
            let words = (addr..addr.saturating_add(16))
                .map(|reg| drp::read(dev.controller_mut(), port, reg))
                .collect::<Result<Vec<_>, _>>()?;
            println!("lane {lane} {addr:#05x}: {}", SpaceHex(&words));
        }
    }

    let mut fake = dev.remove();
    if args.log {
        print!("{}", fake.consume_log());
    }
    Ok(())
}

fn init_logging() -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .with(tracing_error::ErrorLayer::default())
        .init();
    color_eyre::install()?;
    Ok(())
}
