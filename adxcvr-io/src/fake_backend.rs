//! Register-level model of an AXI-ADXCVR core, for tests and dry runs.

use std::{
    collections::{HashMap, HashSet},
    fmt::Write,
    time::Duration,
};

use eyre::Result;

use crate::{
    Backend,
    regs::{self, Bank, FpgaInfo, Resetn, Status, Synth, Version},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DrpKey {
    pub bank: Bank,
    pub sel: u32,
    pub addr: u16,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DrpAccess {
    Read { key: DrpKey, val: u16 },
    Write { key: DrpKey, val: u16 },
}

/// When the link-up bit of STATUS comes up. The link is always down while
/// RESETN is held low.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Link {
    Up,
    Down,
    /// Down for the first `n` STATUS reads after each reset release.
    AfterPolls(u32),
    /// Down until RESETN has been released more than `n` times.
    AfterResets(u32),
}

#[derive(Clone, Copy, Debug, Default)]
struct DrpBank {
    sel: u32,
    busy: u32,
    data: u16,
}

pub struct FakeBackend {
    regs: HashMap<u32, u32>,
    resetn: Resetn,
    drp: HashMap<DrpKey, u16>,
    pinned: HashSet<DrpKey>,
    banks: [DrpBank; 2],
    drp_busy_polls: u32,
    stuck: bool,
    link: Link,
    releases: u32,
    polls_since_release: u32,
    buffer_fault: Status,
    buffer_fault_cycles: u32,
    status_reads: u32,
    drp_status_reads: u32,
    delays: Vec<Duration>,
    log: Vec<DrpAccess>,
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn bank_index(bank: Bank) -> usize {
    match bank {
        Bank::Common => 0,
        Bank::Channel => 1,
    }
}

fn render_log(log: &[DrpAccess]) -> String {
    let mut ret = String::from("┌op─┬bank───┬sel─┬addr──┬data──┐\n");
    for access in log {
        let (op, key, val) = match access {
            DrpAccess::Read { key, val } => ("rd", key, val),
            DrpAccess::Write { key, val } => ("wr", key, val),
        };
        // writing to a String cannot fail
        let _ = writeln!(
            ret,
            "│{op:<3}│{:<7}│{:>4}│{:#06x}│{:#06x}│",
            key.bank.to_string(),
            key.sel,
            key.addr,
            val
        );
    }
    ret.push_str("└───┴───────┴────┴──────┴──────┘\n");
    ret
}

impl FakeBackend {
    /// A core with every register zero, an idle DRP and the link up.
    pub fn new() -> Self {
        Self {
            regs: HashMap::new(),
            resetn: Resetn::empty(),
            drp: HashMap::new(),
            pinned: HashSet::new(),
            banks: [DrpBank::default(); 2],
            drp_busy_polls: 0,
            stuck: false,
            link: Link::Up,
            releases: 0,
            polls_since_release: 0,
            buffer_fault: Status::empty(),
            buffer_fault_cycles: 0,
            status_reads: 0,
            drp_status_reads: 0,
            delays: Vec::new(),
            log: Vec::new(),
        }
    }

    pub fn with_version(mut self, version: Version) -> Self {
        self.regs.insert(regs::VERSION, version.to_raw());
        self
    }

    pub fn with_synth(mut self, synth: Synth) -> Self {
        self.regs.insert(regs::SYNTH_CONF, synth.to_raw());
        self
    }

    pub fn with_fpga_info(mut self, info: FpgaInfo) -> Self {
        self.regs.insert(regs::FPGA_INFO, info.to_raw());
        self
    }

    pub fn with_voltage(mut self, mv: u16) -> Self {
        self.regs.insert(regs::FPGA_VOLTAGE, u32::from(mv));
        self
    }

    pub fn with_link(mut self, link: Link) -> Self {
        self.link = link;
        self
    }

    /// Every DRP access reports busy for `polls` STATUS reads before
    /// completing.
    pub fn with_drp_busy_polls(mut self, polls: u32) -> Self {
        self.drp_busy_polls = polls;
        self
    }

    /// DRP_STATUS never leaves busy.
    pub fn with_stuck_drp(mut self) -> Self {
        self.stuck = true;
        self
    }

    /// STATUS reports `flags` until `cycles` BUFSTATUS_RST pulses were seen.
    pub fn with_buffer_fault(mut self, flags: Status, cycles: u32) -> Self {
        self.buffer_fault = flags & Status::BUFFER_ERRORS;
        self.buffer_fault_cycles = cycles;
        self
    }

    /// A DRP register that holds `val` and ignores writes.
    pub fn with_pinned_drp(mut self, key: DrpKey, val: u16) -> Self {
        self.drp.insert(key, val);
        self.pinned.insert(key);
        self
    }

    pub fn drp_get(&self, bank: Bank, sel: u32, addr: u16) -> u16 {
        let key = DrpKey { bank, sel, addr };
        self.drp.get(&key).copied().unwrap_or(0)
    }

    pub fn drp_set(&mut self, bank: Bank, sel: u32, addr: u16, val: u16) {
        self.drp.insert(DrpKey { bank, sel, addr }, val);
    }

    pub fn reg(&self, reg: u32) -> u32 {
        match reg {
            regs::RESETN => self.resetn.bits(),
            _ => self.regs.get(&reg).copied().unwrap_or(0),
        }
    }

    pub fn resetn(&self) -> Resetn {
        self.resetn
    }

    /// Number of times RESETN went from low to high.
    pub fn reset_releases(&self) -> u32 {
        self.releases
    }

    pub fn status_reads(&self) -> u32 {
        self.status_reads
    }

    pub fn drp_status_reads(&self) -> u32 {
        self.drp_status_reads
    }

    pub fn delays(&self) -> &[Duration] {
        &self.delays
    }

    pub fn drp_log(&self) -> &[DrpAccess] {
        &self.log
    }

    /// Render and clear the DRP access log.
    pub fn consume_log(&mut self) -> String {
        let ret = render_log(&self.log);
        self.log.clear();
        ret
    }

    fn link_up(&self) -> bool {
        if !self.resetn.contains(Resetn::RESETN) {
            return false;
        }
        match self.link {
            Link::Up => true,
            Link::Down => false,
            Link::AfterPolls(n) => self.polls_since_release > n,
            Link::AfterResets(n) => self.releases > n,
        }
    }

    fn status(&mut self) -> u32 {
        self.status_reads += 1;
        self.polls_since_release += 1;
        let mut status = Status::empty();
        if !self.resetn.contains(Resetn::RESETN) {
            return status.bits();
        }
        if self.link_up() {
            status |= Status::LINK;
        }
        if self.buffer_fault_cycles > 0 {
            status |= self.buffer_fault;
        }
        status.bits()
    }

    fn write_resetn(&mut self, val: u32) {
        let new = Resetn::from_bits_truncate(val);
        if !self.resetn.contains(Resetn::RESETN) && new.contains(Resetn::RESETN) {
            self.releases += 1;
            self.polls_since_release = 0;
        }
        if new.contains(Resetn::BUFSTATUS_RST) {
            self.buffer_fault_cycles = self.buffer_fault_cycles.saturating_sub(1);
        }
        self.resetn = new;
    }

    fn drp_ctrl(&mut self, bank: Bank, val: u32) {
        let state = &mut self.banks[bank_index(bank)];
        let key = DrpKey {
            bank,
            sel: state.sel,
            addr: ((val >> 16) & regs::DRP_CTRL_ADDR_MASK) as u16,
        };
        state.busy = self.drp_busy_polls;
        if val & regs::DRP_CTRL_WR != 0 {
            let data = val as u16;
            if !self.pinned.contains(&key) {
                self.drp.insert(key, data);
            }
            state.data = data;
            self.log.push(DrpAccess::Write { key, val: data });
        } else {
            let data = self.drp.get(&key).copied().unwrap_or(0);
            state.data = data;
            self.log.push(DrpAccess::Read { key, val: data });
        }
    }

    fn drp_status(&mut self, bank: Bank) -> u32 {
        self.drp_status_reads += 1;
        let stuck = self.stuck;
        let state = &mut self.banks[bank_index(bank)];
        if stuck {
            return regs::DRP_STATUS_BUSY | u32::from(state.data);
        }
        if state.busy > 0 {
            state.busy -= 1;
            return regs::DRP_STATUS_BUSY;
        }
        u32::from(state.data)
    }
}

fn drp_reg(reg: u32) -> Option<(Bank, u32)> {
    [Bank::Common, Bank::Channel].into_iter().find_map(|bank| {
        [regs::drp_sel(bank), regs::drp_ctrl(bank), regs::drp_status(bank)]
            .contains(&reg)
            .then_some((bank, reg - bank.offset()))
    })
}

impl Backend for FakeBackend {
    fn read(&mut self, reg: u32) -> Result<u32> {
        let val = match (reg, drp_reg(reg)) {
            (regs::STATUS, _) => self.status(),
            (regs::RESETN, _) => self.resetn.bits(),
            (_, Some((bank, base))) if base == regs::drp_status(Bank::Common) => {
                self.drp_status(bank)
            }
            (_, Some((bank, base))) if base == regs::drp_sel(Bank::Common) => {
                self.banks[bank_index(bank)].sel
            }
            _ => self.regs.get(&reg).copied().unwrap_or(0),
        };
        Ok(val)
    }

    fn write(&mut self, reg: u32, val: u32) -> Result<()> {
        match (reg, drp_reg(reg)) {
            (regs::RESETN, _) => self.write_resetn(val),
            (_, Some((bank, base))) if base == regs::drp_sel(Bank::Common) => {
                self.banks[bank_index(bank)].sel = val;
            }
            (_, Some((bank, base))) if base == regs::drp_ctrl(Bank::Common) => {
                self.drp_ctrl(bank, val);
            }
            (_, Some(_)) => {}
            _ => {
                self.regs.insert(reg, val);
            }
        }
        Ok(())
    }

    fn delay(&mut self, duration: Duration) {
        self.delays.push(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drp_write(fake: &mut FakeBackend, bank: Bank, sel: u32, addr: u16, val: u16) {
        fake.write(regs::drp_sel(bank), sel).unwrap();
        fake.write(regs::drp_ctrl(bank), regs::drp_ctrl_word(addr, Some(val)))
            .unwrap();
    }

    #[test]
    fn test_link_held_in_reset() -> Result<()> {
        let mut fake = FakeBackend::new();
        assert_eq!(fake.read(regs::STATUS)?, 0);
        fake.write(regs::RESETN, Resetn::RESETN.bits())?;
        assert_eq!(fake.read(regs::STATUS)?, Status::LINK.bits());
        fake.write(regs::RESETN, 0)?;
        assert_eq!(fake.read(regs::STATUS)?, 0);
        Ok(())
    }

    #[test]
    fn test_link_after_polls() -> Result<()> {
        let mut fake = FakeBackend::new().with_link(Link::AfterPolls(3));
        fake.write(regs::RESETN, Resetn::RESETN.bits())?;
        let polls: Vec<u32> = (0..5).map(|_| fake.read(regs::STATUS).unwrap()).collect();
        assert_eq!(polls, [0, 0, 0, 1, 1]);
        Ok(())
    }

    #[test]
    fn test_link_after_resets() -> Result<()> {
        let mut fake = FakeBackend::new().with_link(Link::AfterResets(1));
        fake.write(regs::RESETN, Resetn::RESETN.bits())?;
        assert_eq!(fake.read(regs::STATUS)?, 0);
        fake.write(regs::RESETN, 0)?;
        fake.write(regs::RESETN, Resetn::RESETN.bits())?;
        assert_eq!(fake.read(regs::STATUS)?, 1);
        assert_eq!(fake.reset_releases(), 2);
        Ok(())
    }

    #[test]
    fn test_buffer_fault_clears() -> Result<()> {
        let mut fake = FakeBackend::new().with_buffer_fault(Status::UNDERFLOW, 2);
        fake.write(regs::RESETN, Resetn::RESETN.bits())?;
        let flags = |fake: &mut FakeBackend| Status::from_bits_truncate(fake.read(regs::STATUS).unwrap());
        assert!(flags(&mut fake).contains(Status::UNDERFLOW));
        let pulse = (Resetn::RESETN | Resetn::BUFSTATUS_RST).bits();
        fake.write(regs::RESETN, pulse)?;
        fake.write(regs::RESETN, Resetn::RESETN.bits())?;
        assert!(flags(&mut fake).contains(Status::UNDERFLOW));
        fake.write(regs::RESETN, pulse)?;
        fake.write(regs::RESETN, Resetn::RESETN.bits())?;
        assert_eq!(flags(&mut fake), Status::LINK);
        Ok(())
    }

    #[test]
    fn test_drp_banks_separate() -> Result<()> {
        let mut fake = FakeBackend::new();
        drp_write(&mut fake, Bank::Channel, 0, 0x28, 0x1111);
        drp_write(&mut fake, Bank::Common, 0, 0x28, 0x2222);
        assert_eq!(fake.drp_get(Bank::Channel, 0, 0x28), 0x1111);
        assert_eq!(fake.drp_get(Bank::Common, 0, 0x28), 0x2222);
        assert_eq!(fake.read(regs::drp_status(Bank::Common))?, 0x2222);
        assert_eq!(fake.read(regs::drp_sel(Bank::Channel))?, 0);
        Ok(())
    }

    #[test]
    fn test_pinned_ignores_writes() {
        let key = DrpKey {
            bank: Bank::Channel,
            sel: 1,
            addr: 0x88,
        };
        let mut fake = FakeBackend::new().with_pinned_drp(key, 0x0033);
        drp_write(&mut fake, Bank::Channel, 1, 0x88, 0x0011);
        assert_eq!(fake.drp_get(Bank::Channel, 1, 0x88), 0x0033);
    }

    #[test]
    fn test_consume_log() {
        let mut fake = FakeBackend::new();
        drp_write(&mut fake, Bank::Channel, 2, 0x5e, 0x1234);
        let log = fake.consume_log();
        assert!(log.contains("│wr │channel│   2│0x005e│0x1234│"), "{log}");
        assert!(fake.drp_log().is_empty());
    }
}
