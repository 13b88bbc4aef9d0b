//! Three level-sensitive interrupt lines and the RST-vector acknowledge.
//!
//! Grounded on `examples/original_source/awnty/awnty.c`'s `int_acknowledge`
//! and the `vbi`/`reci`/`kbdi` globals it composes from. Unlike the
//! teacher's 22-source interrupt controller (latched/inverted banks), the
//! VT100 has exactly three boolean lines OR-reduced for the CPU's
//! interrupt-pending input; each line is cleared by its own device at its
//! specific port access, never by acknowledgement itself.

/// The three interrupt sources, tracked as independent booleans.
#[derive(Debug, Clone, Copy, Default)]
pub struct InterruptLines {
    pub vbi: bool,
    pub reci: bool,
    pub kbdi: bool,
}

impl InterruptLines {
    pub fn new() -> Self {
        Self::default()
    }

    /// Level-sensitive OR of the three lines, recomputed after every step.
    pub fn pending(&self) -> bool {
        self.vbi || self.reci || self.kbdi
    }

    /// Compose the 8080 RST opcode the interrupt-acknowledge callback
    /// returns: base `0xC7` with VBI at bit 5, RECI at bit 4, KBDI at bit 3.
    /// If no line is set the composed byte collapses to 0xC7 with no extra
    /// bits, which isn't a meaningful acknowledge — return 0 instead.
    pub fn acknowledge_opcode(&self) -> u8 {
        if !self.pending() {
            return 0;
        }
        0xC7 | ((self.vbi as u8) << 5) | ((self.reci as u8) << 4) | ((self.kbdi as u8) << 3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_lines_set_acknowledges_as_zero() {
        let lines = InterruptLines::new();
        assert!(!lines.pending());
        assert_eq!(lines.acknowledge_opcode(), 0);
    }

    #[test]
    fn vbi_sets_bit_five() {
        let lines = InterruptLines {
            vbi: true,
            ..Default::default()
        };
        assert_eq!(lines.acknowledge_opcode(), 0xC7 | 0x20);
    }

    #[test]
    fn all_lines_compose_into_one_vector() {
        let lines = InterruptLines {
            vbi: true,
            reci: true,
            kbdi: true,
        };
        assert!(lines.pending());
        assert_eq!(lines.acknowledge_opcode(), 0xC7 | 0x20 | 0x10 | 0x08);
    }
}
