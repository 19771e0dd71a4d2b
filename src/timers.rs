//! DIV/TIMA/TMA/TAC and the serial shift clock. Grounded in `peanut_gb.h`'s
//! `TIMER_UPDATE`/`SERIAL_CYCLES` handling inside `__gb_step_cpu`.

use crate::host::Host;
use crate::interrupts::{Interrupt, InterruptController};

const DIV_PERIOD: u32 = 256;
const SERIAL_PERIOD: u32 = 4096;

fn tima_period(tac: u8) -> u32 {
    match tac & 0x03 {
        0b00 => 1024,
        0b01 => 16,
        0b10 => 64,
        0b11 => 256,
        _ => unreachable!(),
    }
}

#[derive(Debug, Clone, Default)]
pub struct Timers {
    pub div: u8,
    pub tima: u8,
    pub tma: u8,
    pub tac: u8,
    pub sb: u8,
    pub sc: u8,

    div_counter: u32,
    tima_counter: u32,
    serial_counter: u32,
}

impl Timers {
    pub fn write_div(&mut self) {
        self.div = 0;
        self.div_counter = 0;
    }

    pub fn write_sc(&mut self, val: u8) {
        self.sc = val & 0x83;
        if self.sc & 0x81 == 0x81 {
            self.serial_counter = 0;
        }
    }

    /// Advances all timers by `cycles` CPU cycles, requesting interrupts on
    /// the controller as they fire.
    pub fn step(&mut self, cycles: u32, ic: &mut InterruptController, host: &mut dyn Host) {
        self.div_counter += cycles;
        while self.div_counter >= DIV_PERIOD {
            self.div_counter -= DIV_PERIOD;
            self.div = self.div.wrapping_add(1);
        }

        if self.tac & 0x04 != 0 {
            let period = tima_period(self.tac);
            self.tima_counter += cycles;
            while self.tima_counter >= period {
                self.tima_counter -= period;
                self.step_tima(ic);
            }
        }

        if self.sc & 0x81 == 0x81 {
            self.serial_counter += cycles;
            if self.serial_counter >= SERIAL_PERIOD {
                self.serial_counter -= SERIAL_PERIOD;
                self.finish_serial_transfer(ic, host);
            }
        }
    }

    fn step_tima(&mut self, ic: &mut InterruptController) {
        let (next, overflowed) = self.tima.overflowing_add(1);
        if overflowed {
            self.tima = self.tma;
            ic.request(Interrupt::Timer);
        } else {
            self.tima = next;
        }
    }

    /// `SC` bit 7 clears differently depending on who answers: an internal
    /// clock transfer always completes (a byte of 0xFF shifts in if nothing
    /// is attached), while an external-clock transfer that finds no
    /// peripheral leaves `SC` bit 7 set and never raises the interrupt, since
    /// real hardware simply never receives a clock pulse to finish the shift.
    fn finish_serial_transfer(&mut self, ic: &mut InterruptController, host: &mut dyn Host) {
        let internal_clock = self.sc & 0x01 != 0;
        host.serial_tx(self.sb);
        match host.serial_rx() {
            Ok(byte) => {
                self.sb = byte;
                self.sc &= !0x80;
                ic.request(Interrupt::Serial);
            }
            Err(_) if internal_clock => {
                self.sb = 0xFF;
                self.sc &= !0x80;
                ic.request(Interrupt::Serial);
            }
            Err(_) => {
                // External clock never arrived: leave bit 7 set, transfer
                // stays pending indefinitely, matching real hardware without
                // a link partner.
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, NoConnection};

    struct FakeHost {
        rx: Option<u8>,
    }
    impl Host for FakeHost {
        fn rom_read(&mut self, _addr: u32) -> u8 {
            0xFF
        }
        fn cart_ram_read(&mut self, _addr: u32) -> u8 {
            0xFF
        }
        fn cart_ram_write(&mut self, _addr: u32, _val: u8) {}
        fn on_error(&mut self, _kind: ErrorKind, _pc: u16) {}
        fn serial_rx(&mut self) -> Result<u8, NoConnection> {
            self.rx.ok_or(NoConnection)
        }
    }

    #[test]
    fn div_increments_every_256_cycles() {
        let mut t = Timers::default();
        let mut ic = InterruptController::default();
        let mut host = FakeHost { rx: None };
        t.step(256, &mut ic, &mut host);
        assert_eq!(t.div, 1);
    }

    #[test]
    fn write_div_resets_to_zero() {
        let mut t = Timers::default();
        let mut ic = InterruptController::default();
        let mut host = FakeHost { rx: None };
        t.step(256, &mut ic, &mut host);
        t.write_div();
        assert_eq!(t.div, 0);
    }

    #[test]
    fn tima_overflow_reloads_tma_and_requests_interrupt() {
        let mut t = Timers::default();
        t.tac = 0b111; // enabled, fastest rate (16 cycles... here 0b11=256)
        t.tima = 0xFF;
        t.tma = 0x42;
        let mut ic = InterruptController::default();
        ic.ie_reg = 0x1F;
        let mut host = FakeHost { rx: None };
        t.step(256, &mut ic, &mut host);
        assert_eq!(t.tima, 0x42);
        assert!(ic.pending());
    }

    #[test]
    fn internal_clock_serial_completes_without_peripheral() {
        let mut t = Timers::default();
        t.write_sc(0x81);
        let mut ic = InterruptController::default();
        ic.ie_reg = 0x1F;
        let mut host = FakeHost { rx: None };
        t.step(SERIAL_PERIOD, &mut ic, &mut host);
        assert_eq!(t.sb, 0xFF);
        assert_eq!(t.sc & 0x80, 0);
        assert!(ic.pending());
    }

    #[test]
    fn external_clock_serial_stalls_without_peripheral() {
        let mut t = Timers::default();
        t.write_sc(0x80);
        let mut ic = InterruptController::default();
        ic.ie_reg = 0x1F;
        let mut host = FakeHost { rx: None };
        t.step(SERIAL_PERIOD, &mut ic, &mut host);
        assert_eq!(t.sc & 0x80, 0x80);
        assert!(!ic.pending());
    }
}
