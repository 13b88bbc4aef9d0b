//! Intel 8251 PUSART: serial status/mode-command latch and RX/TX queues.
//!
//! Port 0x00 carries data, port 0x01 the mode/command latch, port 0x22 the
//! modem buffer (loopback only). Queue draining and gap scheduling are
//! cross-checked against `examples/original_source/awnty/awnty.c`'s
//! `port_in`/`port_out` handling of those three ports.

/// Two-state mode/command latch, per `spec.md` §4.3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LatchState {
    Mode,
    Command,
}

pub struct Pusart {
    state: LatchState,
    /// Last byte written while in the Command state.
    pub command: u8,
    /// Last byte written to the NVR latch port, mirrored here for the
    /// loopback modem-buffer read (spec §4.3 port 0x22).
    pub nvr_latch: u8,
    rx: Vec<u8>,
    rx_pos: usize,
    tx_log: Vec<u8>,
    pub rx_gap: u64,
}

impl Pusart {
    pub fn new(rx_gap: u64) -> Self {
        Self {
            state: LatchState::Mode,
            command: 0,
            nvr_latch: 0,
            rx: Vec::new(),
            rx_pos: 0,
            tx_log: Vec::new(),
            rx_gap,
        }
    }

    pub fn reset(&mut self) {
        self.state = LatchState::Mode;
        self.command = 0;
        self.rx.clear();
        self.rx_pos = 0;
    }

    /// Enqueue bytes to be read back from port 0x00 (the `serial` script
    /// command, or loopback echo of a transmitted byte).
    pub fn enqueue_rx(&mut self, bytes: &[u8]) {
        self.rx.extend_from_slice(bytes);
    }

    pub fn rx_queue_empty(&self) -> bool {
        self.rx_pos >= self.rx.len()
    }

    /// Read port 0x00: next queued receive byte, or 0 if drained. Returns
    /// whether a byte remains after this read (caller uses this to decide
    /// whether to re-arm the RECI deadline).
    pub fn read_rx(&mut self) -> (u8, bool) {
        if self.rx_pos < self.rx.len() {
            let byte = self.rx[self.rx_pos];
            self.rx_pos += 1;
            (byte, self.rx_pos < self.rx.len())
        } else {
            (0, false)
        }
    }

    /// Read port 0x01: PUSART status. Bit 7 mirrors DTR (command bit 1);
    /// `bug_pusart` ORs in framing/parity error bits (0x38).
    pub fn read_status(&self, bug_pusart: bool) -> u8 {
        let mut val = 0u8;
        if self.command & 0x02 != 0 {
            val |= 0x80;
        }
        if bug_pusart {
            val |= 0x38;
        }
        val
    }

    /// Read port 0x22: modem buffer, meaningful only when loopback is
    /// fitted.
    pub fn read_modem_buffer(&self, have_loopback: bool) -> u8 {
        let mut val = 0u8;
        if have_loopback {
            if self.command & 0x20 == 0 {
                val |= 0x90;
            }
            if self.command & 0x02 == 0 {
                val |= 0x20;
            }
            if self.nvr_latch & 0x20 != 0 {
                val |= 0x40;
            }
        }
        val
    }

    /// Write port 0x01: advance the mode/command latch.
    pub fn write_latch(&mut self, value: u8) {
        match self.state {
            LatchState::Mode => {
                self.state = LatchState::Command;
            }
            LatchState::Command => {
                self.command = value;
                if value & 0x40 != 0 {
                    self.state = LatchState::Mode;
                }
            }
        }
    }

    /// Write port 0x00: transmit a byte. Returns the byte for the driver to
    /// log, and (if loopback fitted) it should be re-enqueued as a receive
    /// byte after `rx_gap` cycles by the caller.
    pub fn write_tx(&mut self, value: u8) {
        self.tx_log.push(value);
    }

    pub fn tx_log(&self) -> &[u8] {
        &self.tx_log
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rx_queue_drains_in_order() {
        let mut p = Pusart::new(3000);
        p.enqueue_rx(&[1, 2, 3]);
        assert_eq!(p.read_rx(), (1, true));
        assert_eq!(p.read_rx(), (2, true));
        assert_eq!(p.read_rx(), (3, false));
        assert!(p.rx_queue_empty());
    }

    #[test]
    fn status_mirrors_dtr_bit_from_command() {
        let mut p = Pusart::new(3000);
        p.write_latch(0); // consume mode byte
        p.write_latch(0x02); // command with DTR bit set
        assert_eq!(p.read_status(false) & 0x80, 0x80);
    }

    #[test]
    fn bug_pusart_ors_error_bits() {
        let p = Pusart::new(3000);
        assert_eq!(p.read_status(true) & 0x38, 0x38);
    }

    #[test]
    fn latch_bit_six_returns_to_mode_state_on_next_write() {
        let mut p = Pusart::new(3000);
        p.write_latch(0x00); // mode byte, now in Command state
        p.write_latch(0x40); // command with bit 6 set -> back to Mode
        assert_eq!(p.command, 0x40);
        p.write_latch(0xAA); // consumed as a mode byte, not stored as command
        assert_eq!(p.command, 0x40);
        p.write_latch(0x11); // now back in Command state
        assert_eq!(p.command, 0x11);
    }

    #[test]
    fn tx_log_records_every_written_byte() {
        let mut p = Pusart::new(3000);
        p.write_tx(b'H');
        p.write_tx(b'i');
        assert_eq!(p.tx_log(), &[b'H', b'i']);
    }
}
