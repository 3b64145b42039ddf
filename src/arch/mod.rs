//! Register-file abstraction: how a structured register file projects onto
//! the flat RSP register-index space.

pub mod xtensa;

/// Methods to read/write a register file through its RSP projection.
///
/// Registers must be de/serialized in the order the debugger expects, i.e.
/// the slot layout of the architecture's `target.xml` in the GDB source
/// tree. Slots the captured state has no value for are "missing": they
/// serialize as `None` bytes (rendered `xx` on the wire) and ignore writes.
pub trait Registers: Default {
    /// Serialize `self` into a GDB register bytestream, least-significant
    /// byte of each register first.
    ///
    /// Missing bytes are serialized by passing `None` to `write_byte`.
    fn gdb_serialize(&self, write_byte: impl FnMut(Option<u8>));

    /// Deserialize a GDB register bytestream into `self`, ignoring missing
    /// slots.
    ///
    /// Fails if `bytes` is shorter than the full register image.
    fn gdb_deserialize(&mut self, bytes: &[u8]) -> Result<(), ()>;

    /// Value of the register at a raw RSP index, or `None` if the index is
    /// not mapped.
    fn read_register(&self, reg: usize) -> Option<u32>;

    /// Write the register at a raw RSP index. Writes to unmapped indices
    /// are silently ignored.
    fn write_register(&mut self, reg: usize, val: u32);
}
