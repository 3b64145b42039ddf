//! The Xtensa register file as exposed by microcontroller crash dumps.
//!
//! The RSP image has 113 four-byte slots, almost all of which a post-mortem
//! dump has no value for. The populated slots follow the layout of GDB's
//! Xtensa `target.xml`:
//!
//! | index    | register   |
//! |----------|------------|
//! | 0        | `pc`       |
//! | 36       | `sar`      |
//! | 37       | `litbase`  |
//! | 40       | `sr176`    |
//! | 42       | `ps`       |
//! | 97..=112 | `a0..a15`  |

use bitflags::bitflags;

use crate::arch::Registers;

/// Number of slots in the `g`/`G` register image.
pub const NUM_SLOTS: usize = 113;

const SLOT_PC: usize = 0;
const SLOT_SAR: usize = 36;
const SLOT_LITBASE: usize = 37;
const SLOT_SR176: usize = 40;
const SLOT_PS: usize = 42;
const SLOT_A0: usize = 97;
const SLOT_A15: usize = 112;

/// Xtensa core registers captured by a crash dump.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct XtensaRegs {
    /// Program Counter
    pub pc: u32,
    /// Processor State
    pub ps: u32,
    /// Shift Amount Register
    pub sar: u32,
    /// Literal Base
    pub litbase: u32,
    /// Special register 176 (configuration-specific)
    pub sr176: u32,
    /// Address registers (A0-A15)
    pub a: [u32; 16],
}

impl Registers for XtensaRegs {
    fn gdb_serialize(&self, mut write_byte: impl FnMut(Option<u8>)) {
        for slot in 0..NUM_SLOTS {
            match self.read_register(slot) {
                Some(val) => {
                    for b in val.to_le_bytes() {
                        write_byte(Some(b));
                    }
                }
                None => (0..4).for_each(|_| write_byte(None)),
            }
        }
    }

    fn gdb_deserialize(&mut self, bytes: &[u8]) -> Result<(), ()> {
        if bytes.len() < NUM_SLOTS * 4 {
            return Err(());
        }

        let word = |slot: usize| {
            let b = &bytes[slot * 4..slot * 4 + 4];
            u32::from_le_bytes([b[0], b[1], b[2], b[3]])
        };

        self.pc = word(SLOT_PC);
        self.sar = word(SLOT_SAR);
        self.litbase = word(SLOT_LITBASE);
        self.sr176 = word(SLOT_SR176);
        self.ps = word(SLOT_PS);
        for (i, a) in self.a.iter_mut().enumerate() {
            *a = word(SLOT_A0 + i);
        }

        Ok(())
    }

    fn read_register(&self, reg: usize) -> Option<u32> {
        match reg {
            SLOT_PC => Some(self.pc),
            SLOT_SAR => Some(self.sar),
            SLOT_LITBASE => Some(self.litbase),
            SLOT_SR176 => Some(self.sr176),
            SLOT_PS => Some(self.ps),
            SLOT_A0..=SLOT_A15 => Some(self.a[reg - SLOT_A0]),
            _ => None,
        }
    }

    fn write_register(&mut self, reg: usize, val: u32) {
        match reg {
            SLOT_PC => self.pc = val,
            SLOT_SAR => self.sar = val,
            SLOT_LITBASE => self.litbase = val,
            SLOT_SR176 => self.sr176 = val,
            SLOT_PS => self.ps = val,
            SLOT_A0..=SLOT_A15 => self.a[reg - SLOT_A0] = val,
            _ => {}
        }
    }
}

bitflags! {
    /// Single-bit fields of the PS special register.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PsFlags: u32 {
        /// Exception mode
        const EXCM = 1 << 4;
        /// User vector mode
        const UM = 1 << 5;
        /// Windowed-register overflow detection enable
        const WOE = 1 << 18;
    }
}

impl XtensaRegs {
    /// Interrupt level the core was running at (PS.INTLEVEL).
    pub fn intlevel(&self) -> u32 {
        self.ps & 0xf
    }

    /// The single-bit PS fields. Multi-bit fields (INTLEVEL, RING, OWB,
    /// CALLINC) are not covered here.
    pub fn ps_flags(&self) -> PsFlags {
        PsFlags::from_bits_truncate(self.ps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_is_113_word_slots() {
        let regs = XtensaRegs::default();
        let mut bytes = 0;
        regs.gdb_serialize(|_| bytes += 1);
        assert_eq!(bytes, NUM_SLOTS * 4);
    }

    #[test]
    fn mapped_slots_serialize_le() {
        let regs = XtensaRegs {
            pc: 0x40100abc,
            ..Default::default()
        };
        let mut image = Vec::new();
        regs.gdb_serialize(|b| image.push(b));
        assert_eq!(
            &image[..4],
            &[Some(0xbc), Some(0x0a), Some(0x10), Some(0x40)]
        );
        // slot 1 is unmapped
        assert_eq!(&image[4..8], &[None; 4]);
    }

    #[test]
    fn serialize_deserialize_roundtrip() {
        let mut regs = XtensaRegs {
            pc: 0x4010_569c,
            ps: 0x0000_0030,
            sar: 0x1f,
            litbase: 0x4010_0001,
            sr176: 0xdead_beef,
            ..Default::default()
        };
        for (i, a) in regs.a.iter_mut().enumerate() {
            *a = 0x1000_0000 + i as u32;
        }

        let mut image = Vec::new();
        regs.gdb_serialize(|b| image.push(b.unwrap_or(0)));

        let mut restored = XtensaRegs::default();
        restored.gdb_deserialize(&image).unwrap();
        assert_eq!(restored, regs);
    }

    #[test]
    fn deserialize_rejects_short_image() {
        let mut regs = XtensaRegs::default();
        assert_eq!(regs.gdb_deserialize(&[0; NUM_SLOTS * 4 - 1]), Err(()));
    }

    #[test]
    fn register_index_map() {
        let mut regs = XtensaRegs::default();
        regs.write_register(0, 1);
        regs.write_register(36, 2);
        regs.write_register(37, 3);
        regs.write_register(40, 4);
        regs.write_register(42, 5);
        regs.write_register(97, 6);
        regs.write_register(112, 7);
        // unmapped: silently ignored
        regs.write_register(1, 0xffff_ffff);
        regs.write_register(200, 0xffff_ffff);

        assert_eq!(regs.pc, 1);
        assert_eq!(regs.sar, 2);
        assert_eq!(regs.litbase, 3);
        assert_eq!(regs.sr176, 4);
        assert_eq!(regs.ps, 5);
        assert_eq!(regs.a[0], 6);
        assert_eq!(regs.a[15], 7);
        assert_eq!(regs.read_register(1), None);
        assert_eq!(regs.read_register(113), None);
    }

    #[test]
    fn ps_field_decode() {
        let regs = XtensaRegs {
            ps: 0x30, // EXCM | UM
            ..Default::default()
        };
        assert_eq!(regs.intlevel(), 0);
        assert_eq!(regs.ps_flags(), PsFlags::EXCM | PsFlags::UM);
    }
}
