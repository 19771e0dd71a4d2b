//! A cycle-driven DMG (original Game Boy) core: CPU, PPU, timers, interrupts,
//! and MBC1/MBC2/MBC3(+RTC)/MBC5 cartridge support. The core owns no I/O of
//! its own — everything it needs from the outside world (ROM bytes, cart
//! RAM, the display, the serial port) comes through the [`Host`] trait, so
//! embedding it in a CLI tool, a GUI, or a test harness is just an impl.

pub mod apu;
pub mod cartridge;
pub mod cpu;
pub mod error;
pub mod gameboy;
pub mod host;
pub mod instructions;
pub mod interrupts;
pub mod joypad;
pub mod mbc;
pub mod memory_map;
pub mod mmu;
pub mod ppu;
pub mod rtc;
pub mod timers;

pub use cpu::Cpu;
pub use error::{ErrorKind, InitError, NoConnection};
pub use gameboy::{GameBoy, CYCLES_PER_FRAME};
pub use host::Host;
