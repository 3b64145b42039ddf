//! Map the loadable segments of an ELF into memory regions.

use core::fmt;
use std::path::Path;

use goblin::elf::program_header::PT_LOAD;
use goblin::elf::Elf;
use log::debug;

use crate::state::{DebugState, RegionOverlap};

#[derive(Debug)]
pub enum ElfError {
    Io(std::io::Error),
    Parse(goblin::error::Error),
    /// A program header points outside the file.
    SegmentOutOfBounds { vaddr: u64 },
    /// A segment's virtual address range does not fit the 32-bit address
    /// space this target has.
    AddressTooWide { vaddr: u64 },
    Overlap(RegionOverlap),
}

impl fmt::Display for ElfError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use self::ElfError::*;
        match self {
            Io(e) => write!(f, "failed to read ELF: {}", e),
            Parse(e) => write!(f, "failed to parse ELF: {}", e),
            SegmentOutOfBounds { vaddr } => {
                write!(f, "segment at {:#x} points outside the file", vaddr)
            }
            AddressTooWide { vaddr } => {
                write!(f, "segment at {:#x} does not fit a 32-bit address space", vaddr)
            }
            Overlap(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ElfError {}

impl From<std::io::Error> for ElfError {
    fn from(e: std::io::Error) -> ElfError {
        ElfError::Io(e)
    }
}

impl From<goblin::error::Error> for ElfError {
    fn from(e: goblin::error::Error) -> ElfError {
        ElfError::Parse(e)
    }
}

impl From<RegionOverlap> for ElfError {
    fn from(e: RegionOverlap) -> ElfError {
        ElfError::Overlap(e)
    }
}

/// Add a region to `state` for every `PT_LOAD` header with a nonzero
/// virtual address: `p_filesz` bytes from the file, zero-padded to
/// `p_memsz`.
pub fn load_into(state: &mut DebugState, path: &Path) -> Result<(), ElfError> {
    let bytes = std::fs::read(path)?;
    load_bytes(state, &bytes)
}

pub fn load_bytes(state: &mut DebugState, bytes: &[u8]) -> Result<(), ElfError> {
    let elf = Elf::parse(bytes)?;

    for ph in &elf.program_headers {
        if ph.p_type != PT_LOAD || ph.p_vaddr == 0 || ph.p_memsz == 0 {
            continue;
        }

        let memsz = ph.p_memsz as usize;
        let vaddr = u32::try_from(ph.p_vaddr)
            .ok()
            .filter(|v| (*v as u64).checked_add(memsz as u64).map_or(false, |end| end <= u64::from(u32::MAX) + 1))
            .ok_or(ElfError::AddressTooWide { vaddr: ph.p_vaddr })?;

        let offset = ph.p_offset as usize;
        let filesz = (ph.p_filesz as usize).min(memsz);
        let file_bytes = bytes
            .get(offset..offset + filesz)
            .ok_or(ElfError::SegmentOutOfBounds { vaddr: ph.p_vaddr })?;

        let mut data = file_bytes.to_vec();
        data.resize(memsz, 0);

        debug!(
            "mapping ELF segment {:#010x}..{:#010x} ({} file bytes)",
            vaddr,
            ph.p_vaddr + memsz as u64,
            filesz
        );
        state.add_region(vaddr, data)?;
    }

    Ok(())
}
