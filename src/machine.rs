//! The machine: owns memory, CPU, peripherals, NVR, coverage, and cadence,
//! and wires them together by implementing `Bus` for itself.
//!
//! `spec.md` §9 calls for grouping what the original source keeps as
//! process-wide globals into a single value the driver owns; this struct is
//! that value.

use crate::bus::Bus;
use crate::cadence::Deadlines;
use crate::config::MachineConfig;
use crate::coverage::{self, Coverage, WatchChange, WatchTable};
use crate::cpu::Cpu;
use crate::error::MachineError;
use crate::memory::Memory;
use crate::nvr::Er1400;
use crate::peripherals::{Keyboard, Peripherals};
use crate::raster::{raster_frame, CharRom, RasterSink, RasterState};

/// Outcome of one `Machine::step`, for the driver to act on.
#[derive(Debug, Default)]
pub struct StepOutcome {
    pub cost: u32,
    pub watch_changes: Vec<WatchChange>,
    pub raster_ready: bool,
}

pub struct Machine {
    pub memory: Memory,
    pub cpu: Cpu,
    pub peripherals: Peripherals,
    pub nvr: Er1400,
    pub coverage: Coverage,
    pub watches: WatchTable,
    pub deadlines: Deadlines,
    pub config: MachineConfig,
    char_rom: Option<CharRom>,
    pending_raster: bool,
    /// Set when a queue drains and the driver should pull the next script
    /// command, per `spec.md` §4.3's port 0x00/0x82 read semantics.
    pub want_command: bool,
}

impl Machine {
    pub fn new(rom: &[u8], config: MachineConfig) -> Self {
        let mut memory = Memory::new(crate::config::RAM_BUG_BYTE);
        memory.load_rom(rom);
        memory.avo = config.have_avo;
        memory.ram_bug = config.bug_ram;

        let mut nvr = Er1400::new();
        nvr.faulty = config.bug_nvr;

        let mut deadlines = Deadlines::new();
        deadlines.arm_vbi(0);
        deadlines.arm_lba7(0);

        Self {
            memory,
            cpu: Cpu::new(),
            peripherals: Peripherals::new(&config),
            nvr,
            coverage: Coverage::new(),
            watches: WatchTable::new(),
            deadlines,
            config,
            char_rom: None,
            pending_raster: false,
            want_command: true,
        }
    }

    pub fn load_char_rom(&mut self, data: &[u8]) {
        self.char_rom = Some(CharRom::new(data));
    }

    pub fn load_nvr_image(&mut self, words: &[u16]) {
        self.nvr.load_words(words);
    }

    /// Reset CPU PC and peripheral state; the script's `reset` command.
    /// Memory, coverage, and NVR contents persist for the whole run.
    pub fn reset(&mut self) {
        self.cpu.reset();
        self.peripherals.reset();
        self.deadlines.reset();
        self.deadlines.arm_vbi(self.cpu.cyc);
        self.deadlines.arm_lba7(self.cpu.cyc);
    }

    pub fn set_avo(&mut self, present: bool) {
        self.config.have_avo = present;
        self.memory.avo = present;
    }

    pub fn set_ram_bug(&mut self, active: bool) {
        self.config.bug_ram = active;
        self.memory.ram_bug = active;
    }

    pub fn set_nvr_bug(&mut self, active: bool) {
        self.config.bug_nvr = active;
        self.nvr.faulty = active;
    }

    /// Advance execution by exactly one CPU instruction, then evaluate
    /// cadence deadlines and watches (`spec.md` §4.5, §4.7).
    pub fn step(&mut self) -> Result<StepOutcome, MachineError> {
        // `Cpu::step` needs `&mut dyn Bus`, which `self` implements; moving
        // the CPU out first avoids borrowing `self` mutably twice at once.
        let mut cpu = std::mem::take(&mut self.cpu);
        let result = cpu.step(self);
        self.cpu = cpu;
        let cost = result?;

        let fired = self.deadlines.check(self.cpu.cyc);
        if fired.vbi {
            self.peripherals.interrupt.vbi = true;
        }
        if fired.reci {
            self.peripherals.interrupt.reci = true;
        }
        if fired.kbdi {
            self.peripherals.interrupt.kbdi = true;
        }
        if fired.lba7_toggled {
            self.nvr.clock(self.deadlines.lba7_level);
        }
        self.cpu.interrupt_pending = self.peripherals.interrupt.pending();

        let memory = &self.memory;
        let watch_changes = self.watches.check(|addr| memory.read_raw(addr));

        Ok(StepOutcome {
            cost,
            watch_changes,
            raster_ready: std::mem::take(&mut self.pending_raster),
        })
    }

    fn flag_register(&self) -> u8 {
        let mut byte = 0x81u8;
        if self.deadlines.lba7_level {
            byte |= 0x40;
        }
        if self.nvr.read_output() {
            byte |= 0x20;
        }
        if self.config.have_stp {
            byte |= 0x08;
        }
        if !self.config.have_gpo {
            byte |= 0x04;
        }
        if !self.config.have_avo {
            byte |= 0x02;
        }
        byte
    }

    /// Walk the display list and emit one frame, if a character ROM has
    /// been loaded.
    pub fn raster(&mut self, sink: &mut dyn RasterSink) -> Result<(), MachineError> {
        let char_rom = self.char_rom.take().ok_or_else(|| {
            MachineError::ScriptError("raster requested with no character ROM loaded".into())
        })?;
        let state = RasterState {
            scroll_latch: self.peripherals.dc012.scroll_latch,
            blink_ff: self.peripherals.dc012.blink_ff,
            reverse_field: self.peripherals.dc012.reverse_field,
            basic_attribute_reverse: self.peripherals.dc012.basic_attribute_reverse,
            columns_132: self.peripherals.dc011.columns_132,
        };
        let result = raster_frame(self, &char_rom, &state, sink);
        self.char_rom = Some(char_rom);
        result
    }
}

impl Bus for Machine {
    fn read(&mut self, addr: u16) -> u8 {
        self.coverage.mark(addr, coverage::READ);
        self.memory.read(addr)
    }

    fn fetch(&mut self, addr: u16) -> u8 {
        self.coverage.mark(addr, coverage::EXEC);
        self.memory.read(addr)
    }

    fn write(&mut self, addr: u16, value: u8) {
        self.coverage.mark(addr, coverage::WRITE);
        self.memory.write(addr, value);
    }

    fn port_in(&mut self, port: u8) -> u8 {
        match port {
            0x00 => {
                let (byte, more) = self.peripherals.pusart.read_rx();
                self.peripherals.interrupt.reci = false;
                if more {
                    self.deadlines
                        .arm_reci(self.cpu.cyc, self.peripherals.pusart.rx_gap);
                } else {
                    self.want_command = true;
                }
                byte
            }
            0x42 => self.flag_register(),
            0x82 => {
                let (byte, done) = self.peripherals.keyboard.read_scan();
                self.peripherals.interrupt.kbdi = false;
                if done {
                    self.want_command = true;
                }
                byte
            }
            _ => self.peripherals.port_in(port, &self.config),
        }
    }

    fn port_out(&mut self, port: u8, value: u8) {
        match port {
            0x62 => {
                self.peripherals.pusart.nvr_latch = value;
                let command = (value >> 1) & 0x07;
                let data = value & 0x01;
                self.nvr.write_command(command, data);
            }
            _ => {
                let effects = self.peripherals.port_out(port, value);
                if effects.raster_triggered {
                    self.pending_raster = true;
                }
                if let Some(byte) = effects.tx_byte {
                    if self.config.have_loopback {
                        self.peripherals.pusart.enqueue_rx(&[byte]);
                        self.deadlines
                            .arm_reci(self.cpu.cyc, self.peripherals.pusart.rx_gap);
                    }
                }
                if effects.arm_kbdi {
                    let keygap = self.peripherals.keyboard.keygap;
                    self.deadlines.arm_kbdi(self.cpu.cyc, keygap);
                }
            }
        }
    }

    fn interrupt_acknowledge(&mut self) -> u8 {
        self.peripherals.interrupt.acknowledge_opcode()
    }
}

/// Convenience accessor so the script driver can install a key feed without
/// reaching through three fields.
impl Machine {
    pub fn load_key_feed(&mut self, codes: &[u8], pause: i32) {
        self.peripherals.keyboard.load_feed(codes, pause);
    }

    pub fn keyboard(&self) -> &Keyboard {
        &self.peripherals.keyboard
    }
}

impl crate::raster::DmaSource for Machine {
    fn dma_read(&mut self, addr: u16) -> u8 {
        self.coverage.mark(addr, coverage::DMA);
        self.memory.read(addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_rom() -> Vec<u8> {
        let mut rom = vec![0u8; 0x10000];
        rom[0] = 0x00; // NOP
        rom
    }

    #[test]
    fn step_runs_one_instruction_and_advances_cycles() {
        let mut m = Machine::new(&test_rom(), MachineConfig::default());
        let outcome = m.step().unwrap();
        assert_eq!(outcome.cost, 4);
        assert_eq!(m.cpu.cyc, 4);
    }

    #[test]
    fn vbi_deadline_fires_after_enough_steps() {
        let mut m = Machine::new(&test_rom(), MachineConfig::default());
        let mut steps = 0;
        while !m.peripherals.interrupt.vbi {
            m.step().unwrap();
            steps += 1;
            if steps > 20_000 {
                panic!("VBI never fired");
            }
        }
    }

    #[test]
    fn nvr_latch_write_reaches_er1400() {
        let mut m = Machine::new(&test_rom(), MachineConfig::default());
        // port bits 3:1 carry the raw (still-negated) 3-bit command field.
        m.port_out(0x62, 6 << 1);
        // no direct observable here beyond not panicking; exercised fully
        // in nvr's own tests.
    }

    #[test]
    fn flag_register_reflects_missing_avo() {
        let config = MachineConfig { have_avo: false, ..MachineConfig::default() };
        let mut m = Machine::new(&test_rom(), config);
        let byte = m.port_in(0x42);
        assert_eq!(byte & 0x02, 0x02);
    }

    #[test]
    fn flag_register_clears_avo_bit_when_fitted() {
        let config = MachineConfig { have_avo: true, ..MachineConfig::default() };
        let mut m = Machine::new(&test_rom(), config);
        let byte = m.port_in(0x42);
        assert_eq!(byte & 0x02, 0);
    }

    #[test]
    fn ram_bug_toggle_updates_memory_immediately() {
        let mut m = Machine::new(&test_rom(), MachineConfig::default());
        m.set_ram_bug(true);
        assert_eq!(m.memory.read(0x2222), crate::config::RAM_BUG_BYTE);
    }

    #[test]
    fn dc012_command_nine_schedules_a_raster() {
        let mut m = Machine::new(&test_rom(), MachineConfig::default());
        m.port_out(0xA2, 0x09);
        let outcome_flag = std::mem::take(&mut m.pending_raster);
        assert!(outcome_flag);
    }
}
