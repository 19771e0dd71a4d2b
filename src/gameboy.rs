//! Top-level wiring: owns every subsystem and implements [`Bus`] so `Cpu`
//! can see them all without fighting the borrow checker over one god object.
//! Grounded in the teacher's `app::emulator::Emulator`/`MemoryBus` address
//! decode, generalised from a concrete SDL-facing struct to one driven
//! entirely through [`Host`] callbacks.

use crate::apu::Apu;
use crate::cartridge::{Cartridge, MbcKind};
use crate::cpu::{Bus, Cpu};
use crate::error::{ErrorKind, InitError};
use crate::host::Host;
use crate::interrupts::{Interrupt, InterruptController};
use crate::joypad::Joypad;
use crate::mbc::MbcState;
use crate::memory_map::*;
use crate::mmu::Mmu;
use crate::ppu::Ppu;
use crate::timers::Timers;

/// CPU cycles (T-states) per DMG frame: 154 scanlines * 456 dots.
pub const CYCLES_PER_FRAME: u32 = 154 * 456;

/// The host-mutable sub-structure, mirroring `gb->direct` in `peanut_gb.h`:
/// the only state the host pokes directly rather than through a register
/// write. The core reads `joypad` only while servicing a write to `IO_JOYP`,
/// and reads `interlace`/`frame_skip` only at the Mode-1 (VBlank)
/// transition — never mid-instruction.
#[derive(Debug, Clone, Copy)]
pub struct Direct {
    pub joypad: u8,
    pub interlace: bool,
    pub frame_skip: bool,
}

impl Default for Direct {
    fn default() -> Self {
        Direct {
            joypad: 0xFF,
            interlace: false,
            frame_skip: false,
        }
    }
}

struct SubsystemBus {
    mmu: Mmu,
    ppu: Ppu,
    timers: Timers,
    ic: InterruptController,
    mbc: MbcState,
    joypad: Joypad,
    apu: Apu,
    cart: Cartridge,
    pub direct: Direct,
}

impl SubsystemBus {
    fn cart_ram_addr(&self, addr: u16) -> u32 {
        let bank = self.mbc.ram_bank().unwrap_or(0) as u32;
        bank * EXT_RAM_SIZE as u32 + (addr - EXT_RAM_START) as u32
    }

    fn rom_addr(&self, addr: u16) -> u32 {
        match addr {
            ROM_BANK_0_START..=ROM_BANK_0_END => addr as u32,
            ROM_BANK_N_START..=ROM_BANK_N_END => {
                self.mbc.rom_bank() as u32 * ROM_BANK_N_SIZE as u32
                    + (addr - ROM_BANK_N_START) as u32
            }
            _ => unreachable!("rom_addr called outside ROM space"),
        }
    }

    fn perform_dma(&mut self, source_high_byte: u8, host: &mut dyn Host) {
        let source_start = (source_high_byte as u16) << 8;
        for i in 0..OAM_SIZE as u16 {
            let byte = self.read_byte_no_dma(source_start.wrapping_add(i), host);
            self.mmu.oam[i as usize] = byte;
        }
    }

    /// `read_byte` without DMA-register side effects, used by the DMA copy
    /// itself so it can source from ROM/VRAM/WRAM/HRAM.
    fn read_byte_no_dma(&mut self, addr: u16, host: &mut dyn Host) -> u8 {
        match addr {
            ROM_BANK_0_START..=ROM_BANK_0_END if !self.mmu.boot_rom_disabled && addr <= 0x00FF => {
                host.boot_rom_read(addr)
            }
            ROM_BANK_0_START..=ROM_BANK_N_END => host.rom_read(self.rom_addr(addr)),
            VRAM_START..=VRAM_END => self.mmu.vram[(addr - VRAM_START) as usize],
            EXT_RAM_START..=EXT_RAM_END => self.read_ext_ram(addr, host),
            WRAM_BANK_0_START..=WRAM_BANK_0_END => {
                self.mmu.wram0[(addr - WRAM_BANK_0_START) as usize]
            }
            WRAM_BANK_N_START..=WRAM_BANK_N_END => {
                self.mmu.wram1[(addr - WRAM_BANK_N_START) as usize]
            }
            ECHO_RAM_START..=ECHO_RAM_END => self.read_byte_no_dma(addr - 0x2000, host),
            OAM_START..=OAM_END => self.mmu.oam[(addr - OAM_START) as usize],
            NOT_USABLE_START..=NOT_USABLE_END => 0xFF,
            HRAM_START..=HRAM_END => self.mmu.hram[(addr - HRAM_START) as usize],
            INTERRUPT_ENABLE_REGISTER => self.mmu.ie,
            _ => self.mmu.io_read(addr),
        }
    }

    fn read_ext_ram(&mut self, addr: u16, host: &mut dyn Host) -> u8 {
        if let Some(reg) = self.mbc.rtc_register_selected() {
            return self.mbc.rtc.latched_read(reg);
        }
        if !self.mbc.ram_enabled() {
            return 0xFF;
        }
        if self.mbc.kind() == MbcKind::Mbc2 {
            let flat = (addr & 0x01FF) as u32;
            return host.cart_ram_read(flat) & 0x0F | 0xF0;
        }
        host.cart_ram_read(self.cart_ram_addr(addr))
    }

    fn write_ext_ram(&mut self, addr: u16, val: u8, host: &mut dyn Host) {
        if let Some(reg) = self.mbc.rtc_register_selected() {
            self.mbc.rtc.write(reg, val);
            return;
        }
        if !self.mbc.ram_enabled() {
            return;
        }
        if self.mbc.kind() == MbcKind::Mbc2 {
            let flat = (addr & 0x01FF) as u32;
            host.cart_ram_write(flat, val | 0xF0);
            return;
        }
        let flat = self.cart_ram_addr(addr);
        host.cart_ram_write(flat, val);
    }
}

impl Bus for SubsystemBus {
    fn read_byte(&mut self, addr: u16, host: &mut dyn Host) -> u8 {
        match addr {
            P1_JOYP_ADDR => self.joypad.read_p1(self.direct.joypad),
            STAT_ADDR => self.ppu.stat(),
            LY_ADDR => self.ppu.ly(),
            LCDC_ADDR => self.ppu.lcdc,
            SCY_ADDR => self.ppu.scy,
            SCX_ADDR => self.ppu.scx,
            LYC_ADDR => self.ppu.lyc,
            BGP_ADDR => self.ppu.bgp,
            OBP0_ADDR => self.ppu.obp0,
            OBP1_ADDR => self.ppu.obp1,
            WY_ADDR => self.ppu.wy,
            WX_ADDR => self.ppu.wx,
            DIV_ADDR => self.timers.div,
            TIMA_ADDR => self.timers.tima,
            TMA_ADDR => self.timers.tma,
            TAC_ADDR => self.timers.tac,
            SB_ADDR => self.timers.sb,
            SC_ADDR => self.timers.sc | 0x7E,
            IF_ADDR => self.ic.if_reg | 0xE0,
            NR10_ADDR..=NR52_ADDR | WAVE_PATTERN_RAM_START..=WAVE_PATTERN_RAM_END => {
                self.apu.read(addr)
            }
            EXT_RAM_START..=EXT_RAM_END => self.read_ext_ram(addr, host),
            INTERRUPT_ENABLE_REGISTER => self.mmu.ie,
            _ => self.read_byte_no_dma(addr, host),
        }
    }

    fn write_byte(&mut self, addr: u16, val: u8, host: &mut dyn Host) {
        match addr {
            ROM_BANK_0_START..=ROM_BANK_N_END => self.mbc.write_rom(addr, val),
            EXT_RAM_START..=EXT_RAM_END => self.write_ext_ram(addr, val, host),
            VRAM_START..=VRAM_END => self.mmu.vram[(addr - VRAM_START) as usize] = val,
            WRAM_BANK_0_START..=WRAM_BANK_0_END => {
                self.mmu.wram0[(addr - WRAM_BANK_0_START) as usize] = val
            }
            WRAM_BANK_N_START..=WRAM_BANK_N_END => {
                self.mmu.wram1[(addr - WRAM_BANK_N_START) as usize] = val
            }
            ECHO_RAM_START..=ECHO_RAM_END => self.write_byte(addr - 0x2000, val, host),
            OAM_START..=OAM_END => self.mmu.oam[(addr - OAM_START) as usize] = val,
            NOT_USABLE_START..=NOT_USABLE_END => {}
            P1_JOYP_ADDR => {
                if self.joypad.write_p1(val, self.direct.joypad) {
                    self.ic.request(Interrupt::Joypad);
                }
            }
            DIV_ADDR => self.timers.write_div(),
            TIMA_ADDR => self.timers.tima = val,
            TMA_ADDR => self.timers.tma = val,
            TAC_ADDR => self.timers.tac = val & 0x07,
            SB_ADDR => self.timers.sb = val,
            SC_ADDR => self.timers.write_sc(val),
            IF_ADDR => self.ic.if_reg = val & 0x1F,
            STAT_ADDR => self.ppu.write_stat(val),
            LCDC_ADDR => self.ppu.write_lcdc(val),
            SCY_ADDR => self.ppu.scy = val,
            SCX_ADDR => self.ppu.scx = val,
            LYC_ADDR => self.ppu.lyc = val,
            DMA_ADDR => self.perform_dma(val, host),
            BGP_ADDR => self.ppu.bgp = val,
            OBP0_ADDR => self.ppu.obp0 = val,
            OBP1_ADDR => self.ppu.obp1 = val,
            WY_ADDR => self.ppu.wy = val,
            WX_ADDR => self.ppu.wx = val,
            NR10_ADDR..=NR52_ADDR | WAVE_PATTERN_RAM_START..=WAVE_PATTERN_RAM_END => {
                self.apu.write(addr, val)
            }
            0xFF50 => self.mmu.boot_rom_disabled = true,
            HRAM_START..=HRAM_END => self.mmu.hram[(addr - HRAM_START) as usize] = val,
            INTERRUPT_ENABLE_REGISTER => self.mmu.ie = val & 0x1F,
            IO_REGISTERS_START..=IO_REGISTERS_END => self.mmu.io_write(addr, val),
            _ => {}
        }
    }

    fn interrupts(&mut self) -> &mut InterruptController {
        &mut self.ic
    }

    fn advance(&mut self, cycles: u32, host: &mut dyn Host) {
        self.timers.step(cycles, &mut self.ic, host);
        self.ppu.step(
            cycles,
            &self.mmu.vram,
            &self.mmu.oam,
            &mut self.ic,
            self.direct.frame_skip,
            self.direct.interlace,
        );
        if let Some((line, pixels)) = self.ppu.last_line.take() {
            host.lcd_draw_line(&pixels, line);
        }
        self.mbc.rtc.tick(cycles);
    }
}

/// A complete, runnable DMG core: CPU, memory, and every peripheral wired
/// together behind the [`Host`] boundary.
pub struct GameBoy {
    cpu: Cpu,
    bus: SubsystemBus,
}

impl GameBoy {
    /// Parses the cartridge header through `host` and brings up a fresh
    /// core. `skip_boot_rom` selects between the real boot-ROM entry point
    /// (PC=0, all registers zero) and the documented post-boot register
    /// state.
    pub fn init(host: &mut dyn Host, skip_boot_rom: bool) -> Result<Self, InitError> {
        let cart = Cartridge::parse(host)?;
        let mbc = MbcState::new(&cart);
        let mut mmu = Mmu::new();
        mmu.boot_rom_disabled = skip_boot_rom;

        let mut timers = Timers::default();
        let cpu = if skip_boot_rom {
            let checksum_nonzero = host.rom_read(crate::cartridge::HEADER_CHECKSUM_LOC as u32) != 0;
            // DIV has no software-visible reset value of its own; this is the
            // constant real DMG hardware lands on after its boot ROM finishes,
            // which a "skip the boot ROM" init has to fabricate outright.
            timers.div = 0xAB;
            Cpu::new_post_boot(checksum_nonzero)
        } else {
            Cpu::new_boot_rom_entry()
        };

        Ok(GameBoy {
            cpu,
            bus: SubsystemBus {
                mmu,
                ppu: Ppu::new(),
                timers,
                ic: InterruptController::default(),
                mbc,
                joypad: Joypad::new(),
                apu: Apu::new(),
                cart,
                direct: Direct::default(),
            },
        })
    }

    /// Sets the live button state the joypad register reads from. Active
    /// low: clear a bit to mark that button held down. Bits 0-3 are
    /// Right/Left/Up/Down (action row reuses the same nibble layout via bit
    /// 4), matching `peanut_gb.h`'s `direct.joypad` byte.
    pub fn set_joypad_state(&mut self, direct_joypad: u8) {
        self.bus.direct.joypad = direct_joypad;
    }

    /// Enables or disables interlaced rendering. Read only at the Mode-1
    /// (VBlank) transition, matching `peanut_gb.h`'s `gb->direct.interlace`.
    pub fn set_interlace(&mut self, enabled: bool) {
        self.bus.direct.interlace = enabled;
    }

    /// Enables or disables frame-skip. Read only at the Mode-1 (VBlank)
    /// transition, matching `peanut_gb.h`'s `gb->direct.frame_skip`.
    pub fn set_frame_skip(&mut self, enabled: bool) {
        self.bus.direct.frame_skip = enabled;
    }

    /// Maps or unmaps the boot ROM over `0x0000..=0x00FF`. While mapped,
    /// reads in that range are routed to `Host::boot_rom_read` instead of
    /// cartridge ROM; a game writing any value to `0xFF50` unmaps it
    /// permanently, same as real hardware.
    pub fn set_boot_rom(&mut self, enabled: bool) {
        self.bus.mmu.boot_rom_disabled = !enabled;
    }

    /// Snapshots the MBC3 RTC's five data registers (seconds, minutes,
    /// hours, day-low, day-high) for a host to persist alongside cart RAM.
    /// Latches first so the snapshot reflects the live registers, not
    /// whatever the game last latched for its own reads.
    pub fn rtc_snapshot(&mut self) -> [u8; 5] {
        self.bus.mbc.rtc.latch();
        [
            self.bus.mbc.rtc.latched_read(0x08),
            self.bus.mbc.rtc.latched_read(0x09),
            self.bus.mbc.rtc.latched_read(0x0A),
            self.bus.mbc.rtc.latched_read(0x0B),
            self.bus.mbc.rtc.latched_read(0x0C),
        ]
    }

    /// Restores the MBC3 RTC's five data registers from a prior
    /// [`GameBoy::rtc_snapshot`]. The host is responsible for advancing the
    /// wall-clock delta itself before calling this, if it wants to account
    /// for time elapsed while the core wasn't running.
    pub fn set_rtc(&mut self, regs: [u8; 5]) {
        self.bus.mbc.rtc.write(0x08, regs[0]);
        self.bus.mbc.rtc.write(0x09, regs[1]);
        self.bus.mbc.rtc.write(0x0A, regs[2]);
        self.bus.mbc.rtc.write(0x0B, regs[3]);
        self.bus.mbc.rtc.write(0x0C, regs[4]);
    }

    pub fn frame_buffer(&self) -> &[u8; crate::ppu::SCREEN_WIDTH * crate::ppu::SCREEN_HEIGHT] {
        self.bus.ppu.frame_buffer()
    }

    /// Selects a background colour palette the way `peanut_gb.h`'s
    /// auto-assign table does, hashing the cartridge title.
    pub fn colour_hash(&self, host: &mut dyn Host) -> u8 {
        crate::cartridge::colour_hash(host)
    }

    /// Runs CPU/PPU/timers/RTC until one full frame (`CYCLES_PER_FRAME`
    /// T-states) has elapsed, or a fatal error occurs. Clears any
    /// `frame_ready` left over from the previous call so [`GameBoy::frame_ready`]
    /// reflects only the VBlank entry this call produced, if any.
    pub fn run_frame(&mut self, host: &mut dyn Host) -> Result<(), ErrorKind> {
        self.bus.ppu.frame_ready = false;
        let mut elapsed: u32 = 0;
        while elapsed < CYCLES_PER_FRAME {
            let cycles = self.cpu.step(&mut self.bus, host)?;
            elapsed += cycles as u32;
        }
        Ok(())
    }

    /// Whether the PPU entered VBlank (completed a frame) during the most
    /// recent [`GameBoy::run_frame`] call. A host rendering `frame_buffer`
    /// only on real frames should check this first.
    pub fn frame_ready(&self) -> bool {
        self.bus.ppu.frame_ready
    }

    /// Executes exactly one CPU instruction (or interrupt dispatch) worth
    /// of work, for hosts that want finer-grained control than a whole
    /// frame — e.g. a debugger single-stepping through code.
    pub fn step(&mut self, host: &mut dyn Host) -> Result<u16, ErrorKind> {
        self.cpu.step(&mut self.bus, host)
    }

    /// Reads a byte through the full address-decode path, for debuggers and
    /// disassembly views (grounded in the teacher's `draw_disassembly_debug`,
    /// which reads straight out of `MemoryBus` to render live memory).
    pub fn peek(&mut self, addr: u16, host: &mut dyn Host) -> u8 {
        self.bus.read_byte(addr, host)
    }

    /// Writes a byte through the full address-decode path, including MBC
    /// register and I/O side effects — mainly useful for test harnesses that
    /// need to poke a register directly without executing CPU instructions.
    pub fn poke(&mut self, addr: u16, val: u8, host: &mut dyn Host) {
        self.bus.write_byte(addr, val, host);
    }

    /// The CPU's register file, for debuggers.
    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NoConnection;

    struct FakeHost {
        rom: Vec<u8>,
        ram: Vec<u8>,
    }

    impl Host for FakeHost {
        fn rom_read(&mut self, addr: u32) -> u8 {
            *self.rom.get(addr as usize).unwrap_or(&0xFF)
        }
        fn cart_ram_read(&mut self, addr: u32) -> u8 {
            *self.ram.get(addr as usize).unwrap_or(&0xFF)
        }
        fn cart_ram_write(&mut self, addr: u32, val: u8) {
            if let Some(slot) = self.ram.get_mut(addr as usize) {
                *slot = val;
            }
        }
        fn on_error(&mut self, _kind: ErrorKind, _pc: u16) {}
        fn serial_rx(&mut self) -> Result<u8, NoConnection> {
            Err(NoConnection)
        }
    }

    fn blank_rom() -> Vec<u8> {
        let mut rom = vec![0u8; 0x8000];
        rom[0x0147] = 0x00; // ROM only
        rom[0x0148] = 0x00; // 2 banks
        rom[0x0149] = 0x00; // no RAM
        let mut x: u8 = 0;
        for addr in
            crate::cartridge::HEADER_CHECKSUM_RANGE_START..=crate::cartridge::HEADER_CHECKSUM_RANGE_END
        {
            x = x.wrapping_sub(rom[addr as usize]).wrapping_sub(1);
        }
        rom[crate::cartridge::HEADER_CHECKSUM_LOC as usize] = x;
        // NOP sled followed by an infinite JP to itself at 0x0100.
        rom[0x0100] = 0x00; // NOP
        rom[0x0101] = 0xC3; // JP a16
        rom[0x0102] = 0x01;
        rom[0x0103] = 0x01;
        rom
    }

    #[test]
    fn init_parses_header_and_sets_post_boot_registers() {
        let mut host = FakeHost {
            rom: blank_rom(),
            ram: vec![],
        };
        let gb = GameBoy::init(&mut host, true).unwrap();
        assert_eq!(gb.cpu.af() >> 8, 0x01);
    }

    #[test]
    fn run_frame_executes_without_error_on_infinite_loop() {
        let mut host = FakeHost {
            rom: blank_rom(),
            ram: vec![],
        };
        let mut gb = GameBoy::init(&mut host, true).unwrap();
        gb.run_frame(&mut host).unwrap();
        assert!(gb.bus.ppu.frame_ready || gb.bus.ic.ie_reg == 0);
    }

    #[test]
    fn joypad_select_edge_requests_interrupt() {
        let mut host = FakeHost {
            rom: blank_rom(),
            ram: vec![],
        };
        let mut gb = GameBoy::init(&mut host, true).unwrap();
        gb.bus.ic.ie_reg = 0x1F;
        gb.set_joypad_state(0xFE); // A held
        gb.bus.write_byte(P1_JOYP_ADDR, 0x10, &mut host); // select action row
        assert!(gb.bus.ic.pending());
    }

    #[test]
    fn run_frame_reports_frame_ready_and_clears_it_on_the_next_call() {
        let mut host = FakeHost {
            rom: blank_rom(),
            ram: vec![],
        };
        let mut gb = GameBoy::init(&mut host, true).unwrap();
        gb.set_interlace(true);
        gb.set_frame_skip(true);
        gb.run_frame(&mut host).unwrap();
        assert!(gb.frame_ready());
        assert!(gb.bus.ppu.interlace_phase);
        assert!(gb.bus.ppu.frame_skip_phase);
    }

    #[test]
    fn echo_ram_mirrors_work_ram() {
        let mut host = FakeHost {
            rom: blank_rom(),
            ram: vec![],
        };
        let mut gb = GameBoy::init(&mut host, true).unwrap();
        gb.bus.write_byte(0xC010, 0x42, &mut host);
        assert_eq!(gb.bus.read_byte(0xE010, &mut host), 0x42);
    }
}
