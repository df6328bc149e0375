mod cdr;
mod clocks;
pub mod drp;
mod error;
pub mod gth34;
pub mod gtx2;
pub mod pll;
mod prbs;
mod xcvr;

pub use crate::{
    cdr::{configure_cdr, configure_lpm_dfe_mode},
    clocks::{
        prog_div_max, prog_div_supported, read_out_div, write_async_gearbox_en, write_out_div,
        write_prog_div, write_prog_div_rate, write_rx_clk25_div, write_tx_clk25_div,
    },
    error::Error,
    pll::{Band, CpllConfig, OutDiv, QpllConfig},
    prbs::{prbs_err_cnt_get, prbsel_decode, prbsel_encode},
    xcvr::{
        DevPackage, Encoding, FpgaFamily, FpgaTechnology, RefclkPpm, Side, SysClkSel, VcoOverrides,
        Xcvr, XcvrType,
    },
};
