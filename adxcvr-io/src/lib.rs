mod backend;
mod controller;
mod error;
pub mod fake_backend;
pub mod mmio;
pub mod regs;
mod timing;
pub mod units;
mod utils;

pub use crate::{
    backend::Backend,
    controller::{Controller, DrpPort},
    error::Error,
    timing::Timing,
    utils::{Hex, SpaceHex},
};
