//! Command-script driver: consumes a line-oriented script, pumps keyboard
//! and serial input, and runs the simulation loop.
//!
//! Grounded on `examples/original_source/awnty/awnty.c`'s `run_test` main
//! loop and its `parse_*`/`dump_*` helpers — the command grammar in
//! `spec.md` §6 is this same set, minus the SDL presentation calls.

use crate::coverage::{self, WatchWidth};
use crate::error::MachineError;
use crate::machine::Machine;
use crate::raster::RasterSink;
use crate::symbols::{self, SymbolTable};

/// Extra cycles run after the script is exhausted before the loop ends,
/// per `spec.md` §5.
const QUIESCENCE_TAIL: u64 = 5_000_000;

const LOCAL_MODE_ADDR: u16 = 0x21A5;

/// Number of terminator scans returned before real key codes start, absent
/// an explicit `keygap` override. Matches the original source's default.
const DEFAULT_KEY_PAUSE: i32 = 10;

/// Whether a just-executed command should request the next line
/// immediately, or wait for a queue to drain / a pause to elapse.
enum Pace {
    Immediate,
    Wait,
}

pub struct ScriptDriver {
    lines: Vec<String>,
    cursor: usize,
    pause_until: Option<u64>,
    remaining_until: Option<u64>,
    /// Scan-terminator count returned before real key codes, set by
    /// `keygap` (a pass count, not a cycle gap, despite the name — the
    /// original source reuses "gap" loosely for two different units).
    key_pause: i32,
    /// ROM symbols and RAM equates, for the end-of-run uncovered-span
    /// report. Empty unless `load_symbols`/`load_equates` is called.
    symbols: SymbolTable,
}

impl ScriptDriver {
    pub fn new(script: &str) -> Self {
        Self {
            lines: script.lines().map(str::to_string).collect(),
            cursor: 0,
            pause_until: None,
            remaining_until: None,
            key_pause: DEFAULT_KEY_PAUSE,
            symbols: SymbolTable::new(),
        }
    }

    /// Load a ROM symbol table (`<hex> <name>` per line, no address offset).
    pub fn load_symbols(&mut self, text: &str) {
        self.symbols.load(text, 0);
    }

    /// Load a RAM equate table (`<hex> <name>` per line, offset by 0x2000).
    pub fn load_equates(&mut self, text: &str) {
        self.symbols.load(text, 0x2000);
    }

    /// Prime the machine's coverage vector from a `{d|u} HHHH HHHH`
    /// coverage-priming file, before `run` is called.
    pub fn prime_coverage(&self, machine: &mut Machine, text: &str) {
        symbols::apply_priming_file(&mut machine.coverage, text);
    }

    fn next_line(&mut self) -> Option<String> {
        while self.cursor < self.lines.len() {
            let line = self.lines[self.cursor].clone();
            self.cursor += 1;
            let trimmed = line.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
        None
    }

    /// Run the machine to completion: script exhausted plus a quiescence
    /// tail, or an explicit end-marker (`log end`, conventionally).
    pub fn run(&mut self, machine: &mut Machine, sink: Option<&mut dyn RasterSink>) -> Result<(), MachineError> {
        self.symbols.mark_symbol_bits(&mut machine.coverage);
        let mut sink = sink;
        loop {
            if self.remaining_until.is_none() {
                let paused = self.pause_until.map(|until| machine.cpu.cyc < until).unwrap_or(false);
                if machine.want_command && !paused {
                    self.pause_until = None;
                    match self.next_line() {
                        Some(line) => {
                            match self.execute(&line, machine) {
                                Ok(Pace::Immediate) => machine.want_command = true,
                                Ok(Pace::Wait) => machine.want_command = false,
                                Err(e) => {
                                    log::warn!("script error: {e}");
                                    machine.want_command = true;
                                }
                            }
                        }
                        None => {
                            log::info!("script exhausted, running quiescence tail");
                            self.remaining_until = Some(machine.cpu.cyc + QUIESCENCE_TAIL);
                        }
                    }
                }
            }

            let outcome = machine.step()?;
            for change in &outcome.watch_changes {
                log_watch_change(change);
            }
            if outcome.raster_ready {
                if let Some(sink) = sink.as_deref_mut() {
                    machine.raster(sink)?;
                }
            }

            if let Some(until) = self.remaining_until {
                if machine.cpu.cyc > until {
                    self.report_end_of_run(machine);
                    return Ok(());
                }
            }
        }
    }

    /// End-of-run coverage report, per `spec.md` §4.7: uncovered ROM spans
    /// with best-effort symbol attribution, and UNREACH regions that turned
    /// out to have executed.
    fn report_end_of_run(&self, machine: &Machine) {
        let spans = symbols::uncovered_rom_spans(&machine.coverage, &self.symbols);
        if spans.is_empty() {
            log::info!("coverage: no uncovered ROM spans");
        }
        for span in &spans {
            match &span.symbol {
                Some(name) => log::info!("coverage: {:04x}-{:04x} uncovered (near {name})", span.start, span.end),
                None => log::info!("coverage: {:04x}-{:04x} uncovered", span.start, span.end),
            }
        }

        let discrepancies = machine.coverage.unreach_discrepancies();
        for addr in discrepancies {
            log::warn!("coverage: {addr:04x} marked UNREACH but executed");
        }
    }

    fn execute(&mut self, line: &str, machine: &mut Machine) -> Result<Pace, MachineError> {
        log::info!("command: {line}");

        if let Some(rest) = line.strip_prefix("key ") {
            let codes = parse_hex_list(rest)?;
            machine.load_key_feed(&codes, self.key_pause);
            return Ok(Pace::Wait);
        }
        if let Some(rest) = line.strip_prefix("serial ") {
            let bytes = parse_serial_arg(rest)?;
            machine.peripherals.pusart.enqueue_rx(&bytes);
            let gap = machine.peripherals.pusart.rx_gap;
            let now = machine.cpu.cyc;
            machine.deadlines.arm_reci(now, gap);
            return Ok(Pace::Wait);
        }
        if let Some(rest) = line.strip_prefix("pause ") {
            let cycles: u64 = rest
                .trim()
                .parse()
                .map_err(|_| MachineError::ScriptError(line.to_string()))?;
            self.pause_until = Some(machine.cpu.cyc + cycles);
            return Ok(Pace::Wait);
        }
        if line == "reset" {
            machine.reset();
            return Ok(Pace::Immediate);
        }
        if let Some(rest) = line.strip_prefix("keygap ") {
            let gap = parse_u64(rest, line)?;
            machine.config.keygap = gap;
            machine.peripherals.keyboard.keygap = gap;
            self.key_pause = gap as i32;
            return Ok(Pace::Immediate);
        }
        if let Some(rest) = line.strip_prefix("rxgap ") {
            let gap = parse_u64(rest, line)?;
            machine.config.rxgap = gap;
            machine.peripherals.pusart.rx_gap = gap;
            return Ok(Pace::Immediate);
        }
        if line == "local" {
            machine.memory.write(LOCAL_MODE_ADDR, 0x20);
            return Ok(Pace::Immediate);
        }
        if line == "online" {
            machine.memory.write(LOCAL_MODE_ADDR, 0x00);
            return Ok(Pace::Immediate);
        }
        if let Some(rest) = line.strip_prefix("have ") {
            set_option(machine, rest.trim(), true);
            return Ok(Pace::Immediate);
        }
        if let Some(rest) = line.strip_prefix("missing ") {
            set_option(machine, rest.trim(), false);
            return Ok(Pace::Immediate);
        }
        if let Some(rest) = line.strip_prefix("bug ") {
            set_bug(machine, rest.trim(), true);
            return Ok(Pace::Immediate);
        }
        if let Some(rest) = line.strip_prefix("nobug ") {
            set_bug(machine, rest.trim(), false);
            return Ok(Pace::Immediate);
        }
        if let Some(rest) = line.strip_prefix("poke ") {
            let (addr, value) = parse_addr_byte(rest, line)?;
            machine.memory.write(addr, value);
            return Ok(Pace::Immediate);
        }
        if let Some(rest) = line.strip_prefix("dump ") {
            let (addr, len) = parse_addr_byte(rest, line)?;
            dump_memory(machine, addr, len);
            return Ok(Pace::Immediate);
        }
        if let Some(rest) = line.strip_prefix("watch ") {
            let (addr, width) = parse_watch_arg(rest, line)?;
            machine.watches.add(addr, width);
            return Ok(Pace::Immediate);
        }
        if let Some(rest) = line.strip_prefix("covrw ") {
            let (addr, len) = parse_addr16_pair(rest, line)?;
            coverage_report(machine, addr, len);
            return Ok(Pace::Immediate);
        }
        if line == "dumpx" {
            dump_xonxoff(machine);
            return Ok(Pace::Immediate);
        }
        if line == "switches" {
            dump_switches(machine);
            return Ok(Pace::Immediate);
        }
        if line == "stack" {
            dump_stack(machine);
            return Ok(Pace::Immediate);
        }
        if line.starts_with("log ") || line.starts_with('#') {
            return Ok(Pace::Immediate);
        }

        Err(MachineError::ScriptError(line.to_string()))
    }
}

fn log_watch_change(change: &coverage::WatchChange) {
    match change.old {
        Some(old) => log::info!("watch {:04x}: {:04x} -> {:04x}", change.addr, old, change.new),
        None => log::info!("watch {:04x}: initial value {:04x}", change.addr, change.new),
    }
}

fn parse_hex_byte(token: &str) -> Option<u8> {
    u8::from_str_radix(token.trim(), 16).ok()
}

fn parse_hex_list(rest: &str) -> Result<Vec<u8>, MachineError> {
    rest.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| parse_hex_byte(t).ok_or_else(|| MachineError::ScriptError(rest.to_string())))
        .collect()
}

fn parse_serial_arg(rest: &str) -> Result<Vec<u8>, MachineError> {
    let trimmed = rest.trim();
    if let Some(inner) = trimmed.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
        Ok(inner.bytes().map(|b| b & 0x7F).collect())
    } else {
        parse_hex_list(trimmed)
    }
}

fn parse_u64(rest: &str, line: &str) -> Result<u64, MachineError> {
    rest.trim()
        .parse()
        .map_err(|_| MachineError::ScriptError(line.to_string()))
}

fn parse_addr_byte(rest: &str, line: &str) -> Result<(u16, u8), MachineError> {
    let mut parts = rest.splitn(2, ',');
    let addr = parts.next().unwrap_or("").trim();
    let value = parts.next().unwrap_or("").trim();
    let addr = u16::from_str_radix(addr, 16).map_err(|_| MachineError::ScriptError(line.to_string()))?;
    let value = u8::from_str_radix(value, 16).map_err(|_| MachineError::ScriptError(line.to_string()))?;
    Ok((addr, value))
}

fn parse_addr16_pair(rest: &str, line: &str) -> Result<(u16, u16), MachineError> {
    let mut parts = rest.splitn(2, ',');
    let a = parts.next().unwrap_or("").trim();
    let b = parts.next().unwrap_or("").trim();
    let a = u16::from_str_radix(a, 16).map_err(|_| MachineError::ScriptError(line.to_string()))?;
    let b = u16::from_str_radix(b, 16).map_err(|_| MachineError::ScriptError(line.to_string()))?;
    Ok((a, b))
}

fn parse_watch_arg(rest: &str, line: &str) -> Result<(u16, WatchWidth), MachineError> {
    let mut parts = rest.splitn(2, ',');
    let addr = parts.next().unwrap_or("").trim();
    let addr = u16::from_str_radix(addr, 16).map_err(|_| MachineError::ScriptError(line.to_string()))?;
    let width = match parts.next().map(str::trim) {
        Some("1") => WatchWidth::Word,
        _ => WatchWidth::Byte,
    };
    Ok((addr, width))
}

fn set_option(machine: &mut Machine, name: &str, present: bool) {
    match name {
        "avo" => machine.set_avo(present),
        "gpo" => machine.config.have_gpo = present,
        "stp" => machine.config.have_stp = present,
        "loopback" => machine.config.have_loopback = present,
        other => log::warn!("unknown hardware option {other}"),
    }
}

fn set_bug(machine: &mut Machine, name: &str, active: bool) {
    match name {
        "nvr" => machine.set_nvr_bug(active),
        "ram" => machine.set_ram_bug(active),
        "pusart" => machine.config.bug_pusart = active,
        other => log::warn!("unknown bug target {other}"),
    }
}

fn dump_memory(machine: &Machine, start: u16, len: u8) {
    let mut line = String::new();
    let mut ascii = String::new();
    for i in 0..len as u32 {
        let addr = start.wrapping_add(i as u16);
        if i % 16 == 0 {
            if !line.is_empty() {
                log::info!("{line}  {ascii}");
            }
            line = format!("{addr:04x}:");
            ascii.clear();
        }
        let byte = machine.memory.read_raw(addr);
        line.push_str(&format!(" {byte:02x}"));
        ascii.push(if (32..127).contains(&byte) { byte as char } else { '.' });
    }
    if !line.is_empty() {
        log::info!("{line}  {ascii}");
    }
}

fn coverage_report(machine: &Machine, start: u16, len: u16) {
    log::info!("coverage report {:04x}..{:04x}", start, start.wrapping_add(len));
    const TOUCHED_READ: u8 = coverage::READ | coverage::DMA;
    let mut unread_start: Option<u16> = None;
    for i in 0..=len {
        let addr = start.wrapping_add(i);
        let bits = machine.coverage.get(addr);
        let unread = bits & TOUCHED_READ == 0;
        match (unread, unread_start) {
            (true, None) => unread_start = Some(addr),
            (false, Some(s)) => {
                log::info!("unread {:04x}-{:04x}", s, addr.wrapping_sub(1));
                unread_start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = unread_start {
        log::info!("unread {:04x}-{:04x}", s, start.wrapping_add(len));
    }
}

fn dump_xonxoff(machine: &Machine) {
    const BASE: u16 = 0x21BF;
    const NAMES: [&str; 6] = [
        "why_xoff",
        "tx_xo_char",
        "tx_xo_flag",
        "received_xoff",
        "",
        "noscroll",
    ];
    for (i, name) in NAMES.iter().enumerate() {
        let value = machine.memory.read_raw(BASE.wrapping_add(i as u16));
        log::info!("{name:<15} {value:02x}");
    }
}

fn dump_switches(machine: &Machine) {
    let sb1 = machine.memory.read_raw(0x21A6);
    log::info!(
        "SB1: {:04b}  {} scroll, autorepeat {}, {} background, cursor {}",
        sb1 >> 4,
        if sb1 & 0x80 != 0 { "smooth" } else { "jump" },
        if sb1 & 0x40 != 0 { "on" } else { "off" },
        if sb1 & 0x20 != 0 { "light" } else { "dark" },
        if sb1 & 0x10 != 0 { "block" } else { "underline" },
    );
    let sb2 = machine.memory.read_raw(0x21A7);
    log::info!(
        "SB2: {:04b}  margin bell {}, keyclick {}, {} mode, Auto XON/XOFF {}",
        sb2 >> 4,
        if sb2 & 0x80 != 0 { "ON" } else { "OFF" },
        if sb2 & 0x40 != 0 { "ON" } else { "OFF" },
        if sb2 & 0x20 != 0 { "ANSI" } else { "VT52" },
        if sb2 & 0x10 != 0 { "ON" } else { "OFF" },
    );
}

fn dump_stack(machine: &Machine) {
    let sp = machine.cpu.sp;
    for i in 0..8u16 {
        let addr = sp.wrapping_add(i * 2);
        let lo = machine.memory.read_raw(addr);
        let hi = machine.memory.read_raw(addr.wrapping_add(1));
        log::info!("stack+{:02x}: {:02x}{:02x}", i * 2, hi, lo);
    }
}
