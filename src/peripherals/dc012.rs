//! DC012 video control chip: scroll latch, reverse field, blink flip-flop.
//!
//! Port 0xA2 command decode exactly as `spec.md` §4.3, cross-checked
//! against `examples/original_source/awnty/awnty.c`'s `port_out` handler
//! for that port.

#[derive(Debug, Clone, Copy, Default)]
pub struct Dc012 {
    scroll_latch_low: u8,
    /// Assembled 4-bit scan-count-modulo scroll latch.
    pub scroll_latch: u8,
    pub blink_ff: bool,
    pub reverse_field: bool,
    /// true = basic attribute is "reverse", false = "underline".
    pub basic_attribute_reverse: bool,
    /// Set on command 9 (clear VBI, trigger a raster): the caller is
    /// responsible for clearing VBI and invoking the rasterizer.
    pub raster_triggered: bool,
}

impl Dc012 {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Write port 0xA2; low 4 bits select the command.
    pub fn write(&mut self, value: u8) {
        self.raster_triggered = false;
        match value & 0x0F {
            0..=3 => {
                self.scroll_latch_low = value & 0x03;
            }
            4..=7 => {
                self.scroll_latch = self.scroll_latch_low | ((value & 0x03) << 2);
            }
            8 => {
                self.blink_ff = !self.blink_ff;
            }
            9 => {
                self.raster_triggered = true;
            }
            10 => {
                self.reverse_field = true;
            }
            11 => {
                self.reverse_field = false;
            }
            12 => {
                self.basic_attribute_reverse = false;
                self.blink_ff = false;
            }
            13 => {
                self.basic_attribute_reverse = true;
                self.blink_ff = false;
            }
            _ => {
                self.blink_ff = false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scroll_latch_assembled_from_two_halves() {
        let mut dc = Dc012::new();
        dc.write(0x00); // low half = 00
        dc.write(0x05); // high half bits -> 01, command 5 in 4..=7
        assert_eq!(dc.scroll_latch, 0b0100);
    }

    #[test]
    fn command_nine_triggers_raster_and_is_transient() {
        let mut dc = Dc012::new();
        dc.write(0x09);
        assert!(dc.raster_triggered);
        dc.write(0x0A);
        assert!(!dc.raster_triggered);
    }

    #[test]
    fn reverse_field_toggled_by_ten_and_eleven() {
        let mut dc = Dc012::new();
        dc.write(0x0A);
        assert!(dc.reverse_field);
        dc.write(0x0B);
        assert!(!dc.reverse_field);
    }

    #[test]
    fn basic_attribute_commands_clear_blink_flipflop() {
        let mut dc = Dc012::new();
        dc.write(0x08); // toggle blink on
        assert!(dc.blink_ff);
        dc.write(0x0D); // basic attribute reverse, clears blink
        assert!(dc.basic_attribute_reverse);
        assert!(!dc.blink_ff);
    }

    #[test]
    fn blink_flipflop_toggles() {
        let mut dc = Dc012::new();
        dc.write(0x08);
        assert!(dc.blink_ff);
        dc.write(0x08);
        assert!(!dc.blink_ff);
    }
}
