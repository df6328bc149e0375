mod clk;
mod device;
mod error;
mod params;

pub use crate::{
    clk::{Clk, ClkOps},
    device::{Device, PllConfig},
    error::Error,
    params::{InitParams, OutClkSel},
};
