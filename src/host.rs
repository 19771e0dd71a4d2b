//! The capability set the host supplies to the core. See `Cartridge`/`Mmu`
//! for the read/write paths that call into it.
//!
//! Modelled as a trait rather than a struct of closures (the teacher's
//! `memory_bus.rs` embedded `sdl2::keyboard::Keycode` directly, which is not
//! an option once the core must stay host-library-agnostic): the host
//! implements `Host` once for whatever owns its ROM/RAM/display, and every
//! core entry point borrows it for the duration of a single call. The core
//! never stores a `Host` reference across calls, so no callback can re-enter
//! `run_frame`.

use crate::error::{ErrorKind, NoConnection};

/// Capabilities the core needs from its embedder.
///
/// The four required methods have no default because the core cannot make
/// progress without them. The rest model genuinely optional hardware
/// (boot ROM, link cable, LCD) and default to "not present."
pub trait Host {
    /// Read a byte from the flat ROM address space. `addr` may exceed 16
    /// bits once bank switching is folded in.
    fn rom_read(&mut self, addr: u32) -> u8;

    /// Read a byte from the flat cart-RAM address space.
    fn cart_ram_read(&mut self, addr: u32) -> u8;

    /// Write a byte to the flat cart-RAM address space.
    fn cart_ram_write(&mut self, addr: u32, val: u8);

    /// A terminal error occurred at `pc`. The core will not call the host
    /// again after this returns.
    fn on_error(&mut self, kind: ErrorKind, pc: u16);

    /// Read a byte of the boot ROM. Only called while a boot ROM is
    /// installed and visible (`IO_BOOT == 0`).
    fn boot_rom_read(&mut self, _addr: u16) -> u8 {
        0xFF
    }

    /// A byte was shifted out over the serial port.
    fn serial_tx(&mut self, _val: u8) {}

    /// A byte is expected from the serial port. Defaults to "nothing
    /// connected," which the timer turns into the documented SB/IF effects.
    fn serial_rx(&mut self) -> Result<u8, NoConnection> {
        Err(NoConnection)
    }

    /// A scanline has been composed. Defaults to a no-op, matching the
    /// reference's `lcd_draw_line == NULL` skip.
    fn lcd_draw_line(&mut self, _pixels: &[u8; 160], _line: u8) {}
}
