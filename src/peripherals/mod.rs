//! Peripheral subsystem: PUSART, keyboard scanner, DC011, DC012, and the
//! three-line interrupt network, dispatched by port address per
//! `spec.md` §4.3.
//!
//! ER1400 NVR and the memory map are owned by `Machine` directly rather
//! than folded in here, since port 0x62 (NVR latch) and part of port 0x42
//! (flag register) need both NVR and cadence state; `Machine::port_out`/
//! `port_in` pass what those two ports need as extra arguments.

pub mod dc011;
pub mod dc012;
pub mod interrupt;
pub mod keyboard;
pub mod pusart;

pub use dc011::Dc011;
pub use dc012::Dc012;
pub use interrupt::InterruptLines;
pub use keyboard::Keyboard;
pub use pusart::Pusart;

use crate::config::MachineConfig;

/// Outcome of a port write the driver/machine needs to react to (arming a
/// cadence deadline, logging a transmitted byte, etc.) beyond the
/// peripheral's own internal state change.
#[derive(Debug, Clone, Default)]
pub struct PortEffects {
    pub tx_byte: Option<u8>,
    pub arm_kbdi: bool,
    pub raster_triggered: bool,
}

pub struct Peripherals {
    pub pusart: Pusart,
    pub keyboard: Keyboard,
    pub dc011: Dc011,
    pub dc012: Dc012,
    pub interrupt: InterruptLines,
}

impl Peripherals {
    pub fn new(config: &MachineConfig) -> Self {
        Self {
            pusart: Pusart::new(config.rxgap),
            keyboard: Keyboard::new(config.keygap),
            dc011: Dc011::new(),
            dc012: Dc012::new(),
            interrupt: InterruptLines::new(),
        }
    }

    pub fn reset(&mut self) {
        self.pusart.reset();
        self.keyboard.reset();
        self.dc011.reset();
        self.dc012.reset();
        self.interrupt = InterruptLines::new();
    }

    /// Read ports 0x00, 0x01, 0x22, 0x82. Port 0x42 (flag register) is
    /// composed by `Machine` since it also needs NVR/LBA7 state.
    pub fn port_in(&mut self, port: u8, config: &MachineConfig) -> u8 {
        match port {
            0x00 => {
                let (byte, more) = self.pusart.read_rx();
                self.interrupt.reci = false;
                let _ = more; // deadline re-arming is the driver's job
                byte
            }
            0x01 => self.pusart.read_status(config.bug_pusart),
            0x22 => self.pusart.read_modem_buffer(config.have_loopback),
            0x82 => {
                let (byte, _done) = self.keyboard.read_scan();
                self.interrupt.kbdi = false;
                byte
            }
            _ => 0,
        }
    }

    /// Write ports 0x00, 0x01, 0x02, 0x82. Port 0x62 (NVR latch) and 0xA2/
    /// 0xC2 (DC012/DC011) are handled directly by `Machine`/here via
    /// `write_dc012`/`write_dc011` below for symmetry with `port_in`.
    pub fn port_out(&mut self, port: u8, value: u8) -> PortEffects {
        let mut effects = PortEffects::default();
        match port {
            0x00 => {
                self.pusart.write_tx(value);
                effects.tx_byte = Some(value);
            }
            0x01 => self.pusart.write_latch(value),
            0x02 => {} // baud rate, ignored
            0x82 => {
                self.keyboard.write_leds(value);
                if Keyboard::is_scan_strobe(value) {
                    effects.arm_kbdi = true;
                }
            }
            0xA2 => {
                self.dc012.write(value);
                effects.raster_triggered = self.dc012.raster_triggered;
                if effects.raster_triggered {
                    self.interrupt.vbi = false;
                }
            }
            0xC2 => self.dc011.write(value),
            _ => {}
        }
        effects
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rx_read_clears_reci() {
        let mut p = Peripherals::new(&MachineConfig::default());
        p.pusart.enqueue_rx(&[0x41]);
        p.interrupt.reci = true;
        let byte = p.port_in(0x00, &MachineConfig::default());
        assert_eq!(byte, 0x41);
        assert!(!p.interrupt.reci);
    }

    #[test]
    fn keyboard_read_clears_kbdi() {
        let mut p = Peripherals::new(&MachineConfig::default());
        p.interrupt.kbdi = true;
        p.port_in(0x82, &MachineConfig::default());
        assert!(!p.interrupt.kbdi);
    }

    #[test]
    fn dc012_command_nine_clears_vbi_and_reports_raster() {
        let mut p = Peripherals::new(&MachineConfig::default());
        p.interrupt.vbi = true;
        let effects = p.port_out(0xA2, 0x09);
        assert!(effects.raster_triggered);
        assert!(!p.interrupt.vbi);
    }

    #[test]
    fn keyboard_scan_strobe_requests_kbdi_arm() {
        let mut p = Peripherals::new(&MachineConfig::default());
        let effects = p.port_out(0x82, 0x40);
        assert!(effects.arm_kbdi);
    }

    #[test]
    fn tx_write_is_reported_in_effects() {
        let mut p = Peripherals::new(&MachineConfig::default());
        let effects = p.port_out(0x00, b'A');
        assert_eq!(effects.tx_byte, Some(b'A'));
    }

    #[test]
    fn reset_clears_interrupt_lines_and_dc012_state() {
        let mut p = Peripherals::new(&MachineConfig::default());
        p.interrupt.vbi = true;
        p.dc012.blink_ff = true;
        p.reset();
        assert!(!p.interrupt.pending());
        assert!(!p.dc012.blink_ff);
    }
}
