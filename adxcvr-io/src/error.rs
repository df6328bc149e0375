use thiserror::Error;

use crate::regs::Bank;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("DRP {bank} bank still busy after {polls} polls")]
    DrpTimeout { bank: Bank, polls: u32 },

    #[error("register {reg:#06x} outside of the {len:#x} byte window")]
    OutOfWindow { reg: u32, len: usize },

    #[error("register {reg:#06x} is not 32-bit aligned")]
    Unaligned { reg: u32 },
}
