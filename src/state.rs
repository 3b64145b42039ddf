//! The captured crash state: one register file and an ordered collection of
//! memory images.

use core::fmt;

use crate::arch::xtensa::XtensaRegs;
use crate::target::{NoMapping, Target};

/// A contiguous span of captured target memory.
///
/// The region owns its backing bytes; memory-write commands mutate them in
/// place.
pub struct MemoryRegion {
    base: u32,
    data: Vec<u8>,
}

impl MemoryRegion {
    pub fn base(&self) -> u32 {
        self.base
    }

    pub fn size(&self) -> u32 {
        self.data.len() as u32
    }

    fn offset_of(&self, addr: u32) -> Option<usize> {
        let off = addr.checked_sub(self.base)? as usize;
        if off < self.data.len() {
            Some(off)
        } else {
            None
        }
    }
}

/// Two regions would cover the same address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionOverlap {
    /// Base of the rejected region.
    pub base: u32,
}

impl fmt::Display for RegionOverlap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "memory region at {:#010x} overlaps an existing region",
            self.base
        )
    }
}

impl std::error::Error for RegionOverlap {}

/// Everything a crash dump captured about the target.
///
/// Populated by the loaders before the session starts; owned by one session
/// at a time.
#[derive(Default)]
pub struct DebugState {
    regs: XtensaRegs,
    regions: Vec<MemoryRegion>,
}

impl DebugState {
    pub fn new() -> DebugState {
        DebugState::default()
    }

    pub fn regs(&self) -> &XtensaRegs {
        &self.regs
    }

    pub fn regs_mut(&mut self) -> &mut XtensaRegs {
        &mut self.regs
    }

    pub fn regions(&self) -> &[MemoryRegion] {
        &self.regions
    }

    /// Add a memory image at `base`, keeping insertion order.
    ///
    /// Regions may not overlap; the offending image is handed back in the
    /// error.
    pub fn add_region(&mut self, base: u32, data: Vec<u8>) -> Result<(), RegionOverlap> {
        let new_end = base as u64 + data.len() as u64;
        for region in &self.regions {
            let end = region.base as u64 + region.data.len() as u64;
            if (base as u64) < end && new_end > region.base as u64 {
                return Err(RegionOverlap { base });
            }
        }
        self.regions.push(MemoryRegion { base, data });
        Ok(())
    }

    fn region_for(&self, addr: u32) -> Option<(&MemoryRegion, usize)> {
        // regions are few; a linear scan in insertion order is fine
        self.regions
            .iter()
            .find_map(|r| r.offset_of(addr).map(|off| (r, off)))
    }
}

impl Target for DebugState {
    type Regs = XtensaRegs;

    fn read_byte(&self, addr: u32) -> Result<u8, NoMapping> {
        let (region, off) = self.region_for(addr).ok_or(NoMapping)?;
        Ok(region.data[off])
    }

    fn write_byte(&mut self, addr: u32, val: u8) -> Result<(), NoMapping> {
        let region = self
            .regions
            .iter_mut()
            .find(|r| r.offset_of(addr).is_some())
            .ok_or(NoMapping)?;
        let off = region.offset_of(addr).ok_or(NoMapping)?;
        region.data[off] = val;
        Ok(())
    }

    fn regs(&self) -> &XtensaRegs {
        &self.regs
    }

    fn regs_mut(&mut self) -> &mut XtensaRegs {
        &mut self.regs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_access_within_region() {
        let mut state = DebugState::new();
        state.add_region(0x3ffe_8000, vec![0u8; 0x100]).unwrap();

        state.write_byte(0x3ffe_8010, 0xab).unwrap();
        assert_eq!(state.read_byte(0x3ffe_8010), Ok(0xab));
        assert_eq!(state.read_byte(0x3ffe_80ff), Ok(0));
    }

    #[test]
    fn access_outside_any_region_fails() {
        let mut state = DebugState::new();
        state.add_region(0x3ffe_8000, vec![0u8; 0x100]).unwrap();

        assert_eq!(state.read_byte(0x3ffe_7fff), Err(NoMapping));
        assert_eq!(state.read_byte(0x3ffe_8100), Err(NoMapping));
        assert_eq!(state.write_byte(0x4000_0000, 0), Err(NoMapping));
    }

    #[test]
    fn lookup_scans_regions_in_insertion_order() {
        let mut state = DebugState::new();
        state.add_region(0x4000_0000, vec![0x11; 4]).unwrap();
        state.add_region(0x3ffe_8000, vec![0x22; 4]).unwrap();

        assert_eq!(state.read_byte(0x4000_0003), Ok(0x11));
        assert_eq!(state.read_byte(0x3ffe_8000), Ok(0x22));
        assert_eq!(state.regions()[0].base(), 0x4000_0000);
    }

    #[test]
    fn overlapping_region_is_rejected() {
        let mut state = DebugState::new();
        state.add_region(0x1000, vec![0u8; 0x100]).unwrap();

        assert_eq!(
            state.add_region(0x10ff, vec![0u8; 1]),
            Err(RegionOverlap { base: 0x10ff })
        );
        assert_eq!(state.add_region(0x0fff, vec![0u8; 2]).is_err(), true);
        // adjacent is fine
        state.add_region(0x1100, vec![0u8; 1]).unwrap();
        state.add_region(0x0fff, vec![0u8; 1]).unwrap();
    }

    #[test]
    fn region_at_end_of_address_space() {
        let mut state = DebugState::new();
        state.add_region(0xffff_fffe, vec![0x5a, 0xa5]).unwrap();
        assert_eq!(state.read_byte(0xffff_ffff), Ok(0xa5));
    }
}
