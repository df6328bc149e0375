//! AXI-ADXCVR register map.

use std::fmt::Display;

use bitflags::bitflags;

pub const VERSION: u32 = 0x0000;
pub const FPGA_INFO: u32 = 0x001c;
pub const RESETN: u32 = 0x0010;
pub const STATUS: u32 = 0x0014;
pub const CONTROL: u32 = 0x0020;
pub const SYNTH_CONF: u32 = 0x0024;
pub const FPGA_VOLTAGE: u32 = 0x0140;

const DRP_SEL: u32 = 0x0040;
const DRP_CTRL: u32 = 0x0044;
const DRP_STATUS: u32 = 0x0048;

pub const DRP_CTRL_WR: u32 = 1 << 28;
pub const DRP_CTRL_ADDR_MASK: u32 = 0xfff;
pub const DRP_STATUS_BUSY: u32 = 1 << 16;

/// DRP address space inside the transceiver primitive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Bank {
    Common,
    Channel,
}

impl Bank {
    pub const fn offset(self) -> u32 {
        match self {
            Bank::Common => 0x00,
            Bank::Channel => 0x20,
        }
    }

    pub const fn from_offset(offset: u32) -> Option<Self> {
        match offset {
            0x00 => Some(Bank::Common),
            0x20 => Some(Bank::Channel),
            _ => None,
        }
    }
}

impl Display for Bank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Bank::Common => f.write_str("common"),
            Bank::Channel => f.write_str("channel"),
        }
    }
}

pub const fn drp_sel(bank: Bank) -> u32 {
    DRP_SEL + bank.offset()
}

pub const fn drp_ctrl(bank: Bank) -> u32 {
    DRP_CTRL + bank.offset()
}

pub const fn drp_status(bank: Bank) -> u32 {
    DRP_STATUS + bank.offset()
}

/// Value written to DRP_CTRL. `data` is ignored by the core for reads.
pub const fn drp_ctrl_word(addr: u16, write: Option<u16>) -> u32 {
    let addr = (addr as u32 & DRP_CTRL_ADDR_MASK) << 16;
    match write {
        Some(data) => DRP_CTRL_WR | addr | data as u32,
        None => addr,
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Resetn: u32 {
        const RESETN = 1 << 0;
        const BUFSTATUS_RST = 1 << 1;
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Status: u32 {
        const LINK = 1 << 0;
        const UNDERFLOW = 1 << 5;
        const OVERFLOW = 1 << 6;
    }
}

impl Status {
    pub const BUFFER_ERRORS: Self = Self::UNDERFLOW.union(Self::OVERFLOW);
}

/// CONTROL register contents.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Control {
    pub lpm_dfe_n: bool,
    pub sys_clk_sel: u8,
    pub out_clk_sel: u8,
}

impl Control {
    const LPM_DFE_N: u32 = 1 << 12;

    pub const fn to_raw(self) -> u32 {
        let lpm = if self.lpm_dfe_n { Self::LPM_DFE_N } else { 0 };
        lpm | ((self.sys_clk_sel as u32 & 0x3) << 4) | (self.out_clk_sel as u32 & 0x7)
    }

    pub const fn from_raw(raw: u32) -> Self {
        Self {
            lpm_dfe_n: raw & Self::LPM_DFE_N != 0,
            sys_clk_sel: ((raw >> 4) & 0x3) as u8,
            out_clk_sel: (raw & 0x7) as u8,
        }
    }
}

/// SYNTH_CONF register contents. Read-only on hardware.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Synth {
    pub num_lanes: u8,
    pub tx_enable: bool,
    pub link_mode: u8,
    pub xcvr_type: u8,
    pub qpll_enable: bool,
}

impl Synth {
    pub const fn from_raw(raw: u32) -> Self {
        Self {
            num_lanes: (raw & 0xff) as u8,
            tx_enable: raw & (1 << 8) != 0,
            link_mode: ((raw >> 12) & 0x3) as u8,
            xcvr_type: ((raw >> 16) & 0xf) as u8,
            qpll_enable: raw & (1 << 20) != 0,
        }
    }

    pub const fn to_raw(self) -> u32 {
        let tx = if self.tx_enable { 1 << 8 } else { 0 };
        let qpll = if self.qpll_enable { 1 << 20 } else { 0 };
        self.num_lanes as u32
            | tx
            | ((self.link_mode as u32 & 0x3) << 12)
            | ((self.xcvr_type as u32 & 0xf) << 16)
            | qpll
    }
}

/// FPGA_INFO register contents.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FpgaInfo {
    pub technology: u8,
    pub family: u8,
    pub speed_grade: u8,
    pub package: u8,
}

impl FpgaInfo {
    pub const fn from_raw(raw: u32) -> Self {
        Self {
            technology: (raw >> 24) as u8,
            family: (raw >> 16) as u8,
            speed_grade: (raw >> 8) as u8,
            package: raw as u8,
        }
    }

    pub const fn to_raw(self) -> u32 {
        (self.technology as u32) << 24
            | (self.family as u32) << 16
            | (self.speed_grade as u32) << 8
            | self.package as u32
    }
}

/// Core version, ordered so `17.5.a` compares greater than `17.4.z`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub major: u16,
    pub minor: u8,
    pub letter: u8,
}

impl Version {
    pub const fn new(major: u16, minor: u8, letter: char) -> Self {
        Self {
            major,
            minor,
            letter: letter as u8,
        }
    }

    pub const fn from_raw(raw: u32) -> Self {
        Self {
            major: (raw >> 16) as u16,
            minor: (raw >> 8) as u8,
            letter: raw as u8,
        }
    }

    pub const fn to_raw(self) -> u32 {
        (self.major as u32) << 16 | (self.minor as u32) << 8 | self.letter as u32
    }
}

impl Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let letter = self.letter as char;
        if letter.is_ascii_alphabetic() {
            write!(f, "{}.{:02}.{}", self.major, self.minor, letter)
        } else {
            write!(f, "{}.{:02}.{:#04x}", self.major, self.minor, self.letter)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drp_addresses() {
        assert_eq!(drp_sel(Bank::Common), 0x40);
        assert_eq!(drp_ctrl(Bank::Common), 0x44);
        assert_eq!(drp_status(Bank::Common), 0x48);
        assert_eq!(drp_sel(Bank::Channel), 0x60);
        assert_eq!(drp_ctrl(Bank::Channel), 0x64);
        assert_eq!(drp_status(Bank::Channel), 0x68);
    }

    #[test]
    fn test_drp_ctrl_word() {
        assert_eq!(drp_ctrl_word(0x5e, None), 0x005e_0000);
        assert_eq!(drp_ctrl_word(0x5e, Some(0x1234)), 0x105e_1234);
        // address is 12 bits
        assert_eq!(drp_ctrl_word(0xf123, None), 0x0123_0000);
    }

    #[test]
    fn test_version_order() {
        let threshold = Version::new(17, 5, 'a');
        assert!(Version::new(17, 5, 'b') >= threshold);
        assert!(Version::new(18, 0, 'a') >= threshold);
        assert!(Version::new(17, 4, 'z') < threshold);
        assert!(Version::new(16, 9, 'a') < threshold);
        assert_eq!(Version::from_raw(0x0011_0561), threshold);
        assert_eq!(threshold.to_string(), "17.05.a");
    }

    #[test]
    fn test_synth_fields() {
        let synth = Synth::from_raw(0x0019_2104);
        assert_eq!(synth.num_lanes, 4);
        assert!(synth.tx_enable);
        assert_eq!(synth.link_mode, 2);
        assert_eq!(synth.xcvr_type, 9);
        assert!(synth.qpll_enable);
        assert_eq!(synth.to_raw(), 0x0019_2104);
    }

    #[test]
    fn test_control_fields() {
        let control = Control {
            lpm_dfe_n: true,
            sys_clk_sel: 3,
            out_clk_sel: 5,
        };
        assert_eq!(control.to_raw(), 0x1035);
        assert_eq!(Control::from_raw(0x1035), control);
    }
}
