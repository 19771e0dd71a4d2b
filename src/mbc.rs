//! Memory Bank Controller register-write state machine. Grounded in the
//! teacher's `MbcType::from_header` dispatch shape, generalised to the full
//! set of banking behaviours `peanut_gb.h`'s `__gb_write` implements for
//! `0x0000..=0x7FFF` and the RAM-enable/bank-select side effects visible at
//! `0xA000..=0xBFFF`.

use crate::cartridge::{Cartridge, MbcKind};
use crate::rtc::RtcRegisters;

/// Bank-switching state for whichever MBC the cartridge declares. `None`
/// cartridges still route through here; all their writes are no-ops.
#[derive(Debug, Clone)]
pub struct MbcState {
    kind: MbcKind,
    rom_bank_mask: u16,
    ram_banks: u8,

    ram_enabled: bool,
    rom_bank: u16,
    ram_bank: u8,
    /// MBC1 banking-mode select: 0 = ROM banking mode (default), 1 = RAM
    /// banking mode (the upper two bank bits move to the RAM bank instead).
    mbc1_mode: u8,

    /// MBC3 only: `0x08..=0x0C` selects an RTC register instead of a RAM
    /// bank when written to `0x4000..=0x5FFF` with that range.
    pub rtc: RtcRegisters,
    rtc_latch_pending: bool,
}

impl MbcState {
    pub fn new(cart: &Cartridge) -> Self {
        MbcState {
            kind: cart.mbc,
            rom_bank_mask: cart.rom_bank_mask,
            ram_banks: cart.ram_banks,
            ram_enabled: false,
            rom_bank: 1,
            ram_bank: 0,
            mbc1_mode: 0,
            rtc: RtcRegisters::default(),
            rtc_latch_pending: false,
        }
    }

    pub fn ram_enabled(&self) -> bool {
        self.ram_enabled
    }

    pub fn kind(&self) -> MbcKind {
        self.kind
    }

    /// Current ROM bank mapped at `0x4000..=0x7FFF`, masked to the
    /// cartridge's declared bank count. MBC1's "bank 0 becomes bank 1"
    /// anomaly is folded into `rom_bank` never being set to 0 directly.
    pub fn rom_bank(&self) -> u16 {
        self.rom_bank & self.rom_bank_mask
    }

    /// RAM bank mapped at `0xA000..=0xBFFF`, or `None` while an RTC register
    /// is latched into that window instead (MBC3 only).
    pub fn ram_bank(&self) -> Option<u8> {
        if matches!(self.kind, MbcKind::Mbc3 | MbcKind::Mbc3Extended) && self.ram_bank >= 0x08 {
            return None;
        }
        if self.ram_banks == 0 {
            return Some(0);
        }
        Some(self.ram_bank % self.ram_banks.max(1))
    }

    /// When MBC3's bank-select register holds `0x08..=0x0C`, RAM accesses
    /// are redirected to the latched RTC register instead.
    pub fn rtc_register_selected(&self) -> Option<u8> {
        if matches!(self.kind, MbcKind::Mbc3 | MbcKind::Mbc3Extended) && self.ram_bank >= 0x08 {
            Some(self.ram_bank)
        } else {
            None
        }
    }

    /// Dispatches a write into the ROM address space (`0x0000..=0x7FFF`),
    /// which on every MBC is actually a write to a bank-control register,
    /// not cartridge ROM.
    pub fn write_rom(&mut self, addr: u16, val: u8) {
        match self.kind {
            MbcKind::None => {}
            MbcKind::Mbc1 => self.write_mbc1(addr, val),
            MbcKind::Mbc2 => self.write_mbc2(addr, val),
            MbcKind::Mbc3 | MbcKind::Mbc3Extended => self.write_mbc3(addr, val),
            MbcKind::Mbc5 => self.write_mbc5(addr, val),
        }
    }

    fn write_mbc1(&mut self, addr: u16, val: u8) {
        match addr {
            0x0000..=0x1FFF => self.ram_enabled = val & 0x0F == 0x0A,
            0x2000..=0x3FFF => {
                let low = (val & 0x1F) as u16;
                let low = if low == 0 { 1 } else { low };
                self.rom_bank = (self.rom_bank & 0x60) | low;
            }
            0x4000..=0x5FFF => {
                let bits = (val & 0x03) as u16;
                if self.mbc1_mode == 0 {
                    self.rom_bank = (self.rom_bank & 0x1F) | (bits << 5);
                } else {
                    self.ram_bank = bits as u8;
                }
            }
            0x6000..=0x7FFF => self.mbc1_mode = val & 0x01,
            _ => {}
        }
    }

    fn write_mbc2(&mut self, addr: u16, val: u8) {
        match addr {
            // MBC2 multiplexes enable/bank-select on bit 8 of the address.
            0x0000..=0x3FFF => {
                if addr & 0x0100 == 0 {
                    self.ram_enabled = val & 0x0F == 0x0A;
                } else {
                    let bank = (val & 0x0F) as u16;
                    self.rom_bank = if bank == 0 { 1 } else { bank };
                }
            }
            _ => {}
        }
    }

    fn write_mbc3(&mut self, addr: u16, val: u8) {
        match addr {
            0x0000..=0x1FFF => self.ram_enabled = val & 0x0F == 0x0A,
            0x2000..=0x3FFF => {
                // Mbc3Extended carts declare more than 128 ROM banks, so the
                // bank register can't be masked to 7 bits the way plain MBC3
                // is, or bank 128+ would never be reachable.
                let bank = if self.kind == MbcKind::Mbc3Extended {
                    val as u16
                } else {
                    (val & 0x7F) as u16
                };
                self.rom_bank = if bank == 0 { 1 } else { bank };
            }
            0x4000..=0x5FFF => self.ram_bank = val,
            0x6000..=0x7FFF => {
                // Latch on the 0->1 edge of the write value, matching the
                // reference's `cart_ram_bank == 1 && val == 1` check.
                if val == 1 && self.rtc_latch_pending {
                    self.rtc.latch();
                }
                self.rtc_latch_pending = val == 0;
            }
            _ => {}
        }
    }

    fn write_mbc5(&mut self, addr: u16, val: u8) {
        match addr {
            0x0000..=0x1FFF => self.ram_enabled = val & 0x0F == 0x0A,
            0x2000..=0x2FFF => self.rom_bank = (self.rom_bank & 0x100) | val as u16,
            0x3000..=0x3FFF => self.rom_bank = (self.rom_bank & 0xFF) | (((val & 0x01) as u16) << 8),
            0x4000..=0x5FFF => self.ram_bank = val & 0x0F,
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartridge::MbcKind;

    fn cart(kind: MbcKind, rom_bank_mask: u16, ram_banks: u8) -> Cartridge {
        Cartridge {
            mbc: kind,
            has_ram: ram_banks > 0,
            has_battery: false,
            rom_bank_mask,
            ram_banks,
        }
    }

    #[test]
    fn mbc1_bank_zero_becomes_bank_one() {
        let mut mbc = MbcState::new(&cart(MbcKind::Mbc1, 0x1F, 1));
        mbc.write_rom(0x2000, 0x00);
        assert_eq!(mbc.rom_bank(), 1);
    }

    #[test]
    fn mbc1_ram_enable_requires_0a_low_nibble() {
        let mut mbc = MbcState::new(&cart(MbcKind::Mbc1, 0x1F, 1));
        mbc.write_rom(0x0000, 0x0A);
        assert!(mbc.ram_enabled());
        mbc.write_rom(0x0000, 0x00);
        assert!(!mbc.ram_enabled());
    }

    #[test]
    fn mbc3_rtc_register_select_overrides_ram_bank() {
        let mut mbc = MbcState::new(&cart(MbcKind::Mbc3, 0x7F, 4));
        mbc.write_rom(0x4000, 0x08);
        assert_eq!(mbc.ram_bank(), None);
        assert_eq!(mbc.rtc_register_selected(), Some(0x08));
        mbc.write_rom(0x4000, 0x01);
        assert_eq!(mbc.ram_bank(), Some(1));
        assert_eq!(mbc.rtc_register_selected(), None);
    }

    #[test]
    fn mbc3_latches_rtc_on_zero_then_one() {
        let mut mbc = MbcState::new(&cart(MbcKind::Mbc3, 0x7F, 4));
        mbc.write_rom(0x6000, 0x00);
        mbc.write_rom(0x6000, 0x01);
        // Latch happened; no panic and latched snapshot is readable.
        let _ = mbc.rtc.latched_read(0x08);
    }

    #[test]
    fn mbc3_extended_rom_bank_is_a_full_8_bits() {
        let mut mbc = MbcState::new(&cart(MbcKind::Mbc3Extended, 0xFF, 4));
        mbc.write_rom(0x2000, 0x80);
        assert_eq!(mbc.rom_bank(), 0x80);
    }

    #[test]
    fn mbc5_rom_bank_is_9_bits() {
        let mut mbc = MbcState::new(&cart(MbcKind::Mbc5, 0x1FF, 1));
        mbc.write_rom(0x3000, 0x01);
        mbc.write_rom(0x2000, 0x00);
        assert_eq!(mbc.rom_bank(), 0x100);
    }
}
