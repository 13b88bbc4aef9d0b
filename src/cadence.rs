//! VBI/RECI/KBDI/LBA7 deadline scheduling.
//!
//! Grounded on the main loop in `examples/original_source/awnty/awnty.c`:
//! VBI fires every 46080 cycles, LBA7 toggles every 88 cycles (clocking the
//! ER1400 on every toggle), and RECI/KBDI are one-shot deadlines armed by a
//! port write and checked in the fixed order VBI, RECI, KBDI, LBA7 each
//! step per `spec.md` §4.5/§9.

pub const VBI_INTERVAL: u64 = 46_080;
pub const LBA7_INTERVAL: u64 = 88;

/// Pending-deadline tracker. `None` means "not armed".
#[derive(Debug, Clone, Default)]
pub struct Deadlines {
    pub next_vbi: Option<u64>,
    pub next_reci: Option<u64>,
    pub next_kbdi: Option<u64>,
    pub next_lba7: Option<u64>,
    pub lba7_level: bool,
}

/// Which lines fired on this check, in evaluation order.
#[derive(Debug, Clone, Copy, Default)]
pub struct Fired {
    pub vbi: bool,
    pub reci: bool,
    pub kbdi: bool,
    pub lba7_toggled: bool,
}

impl Deadlines {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn arm_vbi(&mut self, now: u64) {
        self.next_vbi = Some(now + VBI_INTERVAL);
    }

    pub fn arm_reci(&mut self, now: u64, gap: u64) {
        self.next_reci = Some(now + gap);
    }

    pub fn arm_kbdi(&mut self, now: u64, gap: u64) {
        self.next_kbdi = Some(now + gap);
    }

    pub fn arm_lba7(&mut self, now: u64) {
        self.next_lba7 = Some(now + LBA7_INTERVAL);
    }

    /// Evaluate all four deadlines against the current cycle count, in
    /// fixed VBI/RECI/KBDI/LBA7 order, rearming any that fired.
    pub fn check(&mut self, now: u64) -> Fired {
        let mut fired = Fired::default();

        if let Some(deadline) = self.next_vbi {
            if now > deadline {
                fired.vbi = true;
                self.arm_vbi(now);
            }
        }
        if let Some(deadline) = self.next_reci {
            if now > deadline {
                fired.reci = true;
                self.next_reci = None;
            }
        }
        if let Some(deadline) = self.next_kbdi {
            if now > deadline {
                fired.kbdi = true;
                self.next_kbdi = None;
            }
        }
        if let Some(deadline) = self.next_lba7 {
            if now > deadline {
                fired.lba7_toggled = true;
                self.lba7_level = !self.lba7_level;
                self.arm_lba7(now);
            }
        }

        fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vbi_fires_after_interval_and_rearms() {
        let mut d = Deadlines::new();
        d.arm_vbi(0);
        let fired = d.check(VBI_INTERVAL);
        assert!(!fired.vbi);
        let fired = d.check(VBI_INTERVAL + 1);
        assert!(fired.vbi);
        assert_eq!(d.next_vbi, Some(VBI_INTERVAL + 1 + VBI_INTERVAL));
    }

    #[test]
    fn reci_is_one_shot() {
        let mut d = Deadlines::new();
        d.arm_reci(0, 4000);
        let fired = d.check(4000);
        assert!(!fired.reci);
        let fired = d.check(4001);
        assert!(fired.reci);
        assert!(d.next_reci.is_none());
        let fired = d.check(8000);
        assert!(!fired.reci);
    }

    #[test]
    fn lba7_toggles_level_each_firing() {
        let mut d = Deadlines::new();
        d.arm_lba7(0);
        assert!(!d.lba7_level);
        d.check(LBA7_INTERVAL + 1);
        assert!(d.lba7_level);
        let next = LBA7_INTERVAL + 1 + LBA7_INTERVAL;
        d.check(next + 1);
        assert!(!d.lba7_level);
    }

    #[test]
    fn unarmed_deadlines_never_fire() {
        let mut d = Deadlines::new();
        let fired = d.check(1_000_000);
        assert!(!fired.vbi && !fired.reci && !fired.kbdi && !fired.lba7_toggled);
    }
}
