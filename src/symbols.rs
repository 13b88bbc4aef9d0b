//! Symbol/equate tables and the coverage-priming file format, per
//! `spec.md` §6's three persisted text formats: `<hex> <name>` per line for
//! both the ROM symbol table and the RAM equate table (the latter offset by
//! 0x2000), and `{d|u} HHHH HHHH` per line for coverage priming. Parsed with
//! a small hand-rolled line parser rather than a serialization crate, per
//! `SPEC_FULL.md` §6.

use crate::coverage::{Coverage, DATA, UNREACH};

/// Boundary between ROM and the RAM the firmware maps its display list and
/// scratch variables into; used to scope the end-of-run ROM coverage report.
pub const ROM_END: u16 = 0x2000;

/// Addresses beyond which a preceding symbol is no longer attributed to a
/// gap, per `spec.md` §4.7 ("nearest preceding symbol within 32 bytes").
const SYMBOL_ATTRIBUTION_RANGE: u16 = 32;

/// Address-to-name table, built from a ROM symbol file and/or a RAM equate
/// file. Kept sorted by address so nearest-preceding lookup is a binary
/// search.
#[derive(Debug, Default, Clone)]
pub struct SymbolTable {
    entries: Vec<(u16, String)>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `<hex> <name>` lines, adding `offset` to every address (0 for
    /// the ROM symbol table, 0x2000 for the RAM equate table).
    pub fn load(&mut self, text: &str, offset: u16) {
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut parts = line.splitn(2, char::is_whitespace);
            let addr = match parts.next().and_then(|h| u16::from_str_radix(h, 16).ok()) {
                Some(a) => a,
                None => continue,
            };
            let name = match parts.next() {
                Some(n) => n.trim(),
                None => continue,
            };
            if name.is_empty() {
                continue;
            }
            self.entries.push((addr.wrapping_add(offset), name.to_string()));
        }
        self.entries.sort_by_key(|(addr, _)| *addr);
    }

    /// Mark every symbol's address with the coverage SYMBOL bit, so the
    /// end-of-run report can tell "never touched" apart from "named but
    /// never touched".
    pub fn mark_symbol_bits(&self, coverage: &mut Coverage) {
        for &(addr, _) in &self.entries {
            coverage.mark(addr, crate::coverage::SYMBOL);
        }
    }

    /// The nearest symbol at or before `addr`, if within
    /// `SYMBOL_ATTRIBUTION_RANGE` bytes.
    pub fn nearest_preceding(&self, addr: u16) -> Option<&str> {
        let idx = self.entries.partition_point(|(a, _)| *a <= addr);
        if idx == 0 {
            return None;
        }
        let (sym_addr, name) = &self.entries[idx - 1];
        if addr.saturating_sub(*sym_addr) <= SYMBOL_ATTRIBUTION_RANGE {
            Some(name.as_str())
        } else {
            None
        }
    }
}

/// Parse a coverage-priming file (`{d|u} HHHH HHHH` per line, inclusive
/// start/end) and OR the corresponding DATA/UNREACH flags into `coverage`.
pub fn apply_priming_file(coverage: &mut Coverage, text: &str) {
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut parts = line.split_whitespace();
        let tag = parts.next();
        let start = parts.next().and_then(|h| u16::from_str_radix(h, 16).ok());
        let end = parts.next().and_then(|h| u16::from_str_radix(h, 16).ok());
        let (Some(tag), Some(start), Some(end)) = (tag, start, end) else {
            continue;
        };
        let flag = match tag {
            "d" => DATA,
            "u" => UNREACH,
            _ => continue,
        };
        coverage.mark_range(start, end, flag);
    }
}

/// One contiguous run of ROM bytes with no EXEC/READ/WRITE/DMA coverage (or
/// only the SYMBOL bit), per `spec.md` §4.7.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UncoveredSpan {
    pub start: u16,
    pub end: u16,
    pub symbol: Option<String>,
}

/// Touched-at-all mask: a byte with none of these bits set (beyond SYMBOL)
/// was never exercised by the run.
const TOUCHED: u8 = crate::coverage::EXEC | crate::coverage::READ | crate::coverage::WRITE | crate::coverage::DMA;

/// Scan ROM addresses (`0..ROM_END`) for contiguous untouched spans, each
/// attributed to its nearest preceding symbol within 32 bytes.
pub fn uncovered_rom_spans(coverage: &Coverage, symbols: &SymbolTable) -> Vec<UncoveredSpan> {
    let mut spans = Vec::new();
    let mut run_start: Option<u16> = None;

    for addr in 0..ROM_END {
        let bits = coverage.get(addr);
        let untouched = bits & TOUCHED == 0;
        match (untouched, run_start) {
            (true, None) => run_start = Some(addr),
            (false, Some(start)) => {
                spans.push(UncoveredSpan {
                    start,
                    end: addr - 1,
                    symbol: symbols.nearest_preceding(start).map(str::to_string),
                });
                run_start = None;
            }
            _ => {}
        }
    }
    if let Some(start) = run_start {
        spans.push(UncoveredSpan {
            start,
            end: ROM_END - 1,
            symbol: symbols.nearest_preceding(start).map(str::to_string),
        });
    }
    spans
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_table_parses_hex_name_lines() {
        let mut table = SymbolTable::new();
        table.load("0100 reset_entry\n0200 main_loop\n", 0);
        assert_eq!(table.nearest_preceding(0x0105), Some("reset_entry"));
        assert_eq!(table.nearest_preceding(0x0200), Some("main_loop"));
    }

    #[test]
    fn equate_table_addresses_are_offset() {
        let mut table = SymbolTable::new();
        table.load("0022 scratch_flag\n", 0x2000);
        assert_eq!(table.nearest_preceding(0x2022), Some("scratch_flag"));
        assert_eq!(table.nearest_preceding(0x0022), None);
    }

    #[test]
    fn nearest_preceding_respects_attribution_range() {
        let mut table = SymbolTable::new();
        table.load("0100 entry\n", 0);
        assert_eq!(table.nearest_preceding(0x0100 + 32), Some("entry"));
        assert_eq!(table.nearest_preceding(0x0100 + 33), None);
    }

    #[test]
    fn priming_file_marks_data_and_unreach_ranges() {
        let mut cov = Coverage::new();
        apply_priming_file(&mut cov, "d 0010 0012\nu 0020 0020\n");
        assert_eq!(cov.get(0x10), DATA);
        assert_eq!(cov.get(0x12), DATA);
        assert_eq!(cov.get(0x13), 0);
        assert_eq!(cov.get(0x20), UNREACH);
    }

    #[test]
    fn uncovered_spans_skip_touched_bytes_and_attribute_symbols() {
        let mut cov = Coverage::new();
        let mut symbols = SymbolTable::new();
        symbols.load("0010 gap_start\n", 0);
        cov.mark(0x0005, crate::coverage::EXEC);
        // 0x0006..=0x0020 left untouched, except one byte marked SYMBOL only.
        cov.mark(0x0010, crate::coverage::SYMBOL);
        cov.mark(0x0021, crate::coverage::EXEC);

        let spans = uncovered_rom_spans(&cov, &symbols);
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].start, 0x0006);
        assert_eq!(spans[0].end, 0x0020);
        assert_eq!(spans[0].symbol.as_deref(), Some("gap_start"));
    }
}
