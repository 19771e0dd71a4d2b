//! End-to-end coverage through the public `GameBoy` API, complementing the
//! per-module unit tests with the documented power-on/runtime scenarios.

use dmg_core::error::{ErrorKind, NoConnection};
use dmg_core::host::Host;
use dmg_core::GameBoy;

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

/// Builds a 32KB ROM-only cartridge with a valid header checksum and the
/// given program bytes placed at the entry point, 0x0100.
fn rom_with_program(program: &[u8]) -> Vec<u8> {
    let mut rom = vec![0u8; 0x8000];
    rom[0x0147] = 0x00; // ROM only
    rom[0x0148] = 0x00; // 32KB, 2 banks
    rom[0x0149] = 0x00; // no cart RAM
    rom[0x0100..0x0100 + program.len()].copy_from_slice(program);

    let mut checksum: u8 = 0;
    for addr in dmg_core::cartridge::HEADER_CHECKSUM_RANGE_START..=dmg_core::cartridge::HEADER_CHECKSUM_RANGE_END
    {
        checksum = checksum.wrapping_sub(rom[addr as usize]).wrapping_sub(1);
    }
    rom[dmg_core::cartridge::HEADER_CHECKSUM_LOC as usize] = checksum;
    rom
}

/// NOP sled followed by an infinite jump back to itself, for tests that only
/// care about the state a few steps produce and then want the core to idle.
fn halt_loop_at(addr: u16) -> [u8; 3] {
    let lo = addr as u8;
    let hi = (addr >> 8) as u8;
    [0xC3, lo, hi] // JP a16
}

#[test]
fn s1_skip_boot_rom_lands_on_documented_post_boot_register_state() {
    let mut program = vec![0x00]; // NOP at 0x0100
    program.extend_from_slice(&halt_loop_at(0x0100));
    let mut host = FakeHost {
        rom: rom_with_program(&program),
        ram: vec![],
    };

    let mut gb = GameBoy::init(&mut host, true).unwrap();

    assert_eq!(gb.cpu().af() >> 8, 0x01);
    assert_eq!(gb.cpu().bc(), 0x0013);
    assert_eq!(gb.cpu().de(), 0x00D8);
    assert_eq!(gb.cpu().hl(), 0x014D);
    assert_eq!(gb.cpu().sp, 0xFFFE);
    assert_eq!(gb.cpu().pc, 0x0100);
    assert_eq!(gb.peek(0xFF04, &mut host), 0xAB); // DIV
}

#[test]
fn s4_vblank_interrupt_is_requested_exactly_once_per_frame() {
    let mut program = vec![0x00]; // NOP
    program.extend_from_slice(&halt_loop_at(0x0100));
    let mut host = FakeHost {
        rom: rom_with_program(&program),
        ram: vec![],
    };
    let mut gb = GameBoy::init(&mut host, true).unwrap();

    gb.poke(0xFF0F, 0x00, &mut host); // clear IF before measuring
    gb.run_frame(&mut host).unwrap();

    let if_reg = gb.peek(0xFF0F, &mut host);
    assert_eq!(if_reg & 0x01, 0x01, "VBlank bit should be set after a frame");
}

#[test]
fn s5_daa_corrects_bcd_addition() {
    // LD A, 0x15 ; ADD A, 0x27 ; DAA ; <loop>
    let mut program = vec![0x3E, 0x15, 0xC6, 0x27, 0x27];
    let loop_addr = 0x0100 + program.len() as u16;
    program.extend_from_slice(&halt_loop_at(loop_addr));
    let mut host = FakeHost {
        rom: rom_with_program(&program),
        ram: vec![],
    };
    let mut gb = GameBoy::init(&mut host, true).unwrap();

    gb.step(&mut host).unwrap(); // LD A, 0x15
    gb.step(&mut host).unwrap(); // ADD A, 0x27 -> 0x3C, not decimal-valid
    gb.step(&mut host).unwrap(); // DAA -> corrects to 0x42

    assert_eq!(gb.cpu().af() >> 8, 0x42);
}

#[test]
fn oam_dma_copies_from_rom_through_the_full_read_path() {
    let mut program = vec![
        0x3E, 0xC0, // LD A, 0xC0  (source page 0xC000, within WRAM)
        0xE0, 0x46, // LDH (0xFF46), A  -- start DMA from 0xC000
    ];
    let loop_addr = 0x0100 + program.len() as u16;
    program.extend_from_slice(&halt_loop_at(loop_addr));
    let mut host = FakeHost {
        rom: rom_with_program(&program),
        ram: vec![],
    };
    let mut gb = GameBoy::init(&mut host, true).unwrap();

    gb.poke(0xC000, 0x99, &mut host);
    gb.poke(0xC001, 0x77, &mut host);

    gb.step(&mut host).unwrap(); // LD A, 0xC0
    gb.step(&mut host).unwrap(); // LDH (0xFF46), A

    assert_eq!(gb.peek(0xFE00, &mut host), 0x99);
    assert_eq!(gb.peek(0xFE01, &mut host), 0x77);
}

#[test]
fn joypad_select_edge_requests_a_joypad_interrupt() {
    let mut program = vec![0x00];
    program.extend_from_slice(&halt_loop_at(0x0100));
    let mut host = FakeHost {
        rom: rom_with_program(&program),
        ram: vec![],
    };
    let mut gb = GameBoy::init(&mut host, true).unwrap();

    gb.set_joypad_state(0xFE); // A held
    gb.poke(0xFF00, 0x10, &mut host); // select the action row
    assert_eq!(gb.peek(0xFF0F, &mut host) & 0x10, 0x10);
}
