//! The set of operations the command dispatcher needs from a debugged
//! target.

use crate::arch::Registers;

/// Largest number of bytes a single memory command will transfer.
///
/// Requests beyond this get an error packet rather than a truncated reply;
/// GDB splits large transfers on its own.
pub const MAX_MEM_XFER: usize = 64;

/// A memory access landed outside every mapped region (or would straddle
/// two of them).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoMapping;

/// The target cannot perform this operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unsupported;

/// A debugged target: a register file plus byte-addressable memory.
///
/// Memory access is byte-granular; the dispatcher drives bulk transfers one
/// byte at a time, so implementations only ever resolve a single address.
pub trait Target {
    /// The target's register file.
    type Regs: Registers;

    /// Read the byte at `addr`.
    fn read_byte(&self, addr: u32) -> Result<u8, NoMapping>;

    /// Write the byte at `addr`.
    fn write_byte(&mut self, addr: u32, val: u8) -> Result<(), NoMapping>;

    fn regs(&self) -> &Self::Regs;

    fn regs_mut(&mut self) -> &mut Self::Regs;

    /// Resume execution.
    ///
    /// Post-mortem targets have nothing to run; the default returns
    /// [`Unsupported`], and the dispatcher hands control back to the caller
    /// either way.
    fn resume(&mut self) -> Result<(), Unsupported> {
        Err(Unsupported)
    }

    /// Execute a single instruction.
    fn step(&mut self) -> Result<(), Unsupported> {
        Err(Unsupported)
    }
}
