//! Serve a captured processor crash state to a GDB client over the Remote
//! Serial Protocol.
//!
//! `dumpstub` plays the stub role against state that is no longer running:
//! a register file and a set of memory images recovered from a
//! microcontroller crash dump and/or an ELF. To the connected GDB the
//! target looks like a live-but-halted machine; backtraces, memory
//! inspection, and register reads all work, while `continue`/`step` hand
//! control back to the caller.
//!
//! The crate splits along the protocol's natural seams:
//!
//! - [`conn`]: byte-granular blocking transport ([`Connection`]).
//! - [`protocol`]: hex/binary codecs, token parsing, and packet framing.
//! - [`arch`]: how a structured register file projects onto RSP register
//!   indices (concretely: the Xtensa layout crash dumps use).
//! - [`Target`]: the capability the dispatcher consumes; [`DebugState`]
//!   implements it over loader-populated memory regions.
//! - [`GdbStub`]: the per-command dispatcher and session loop.
//! - [`loader`]: crash-log and ELF ingestion producing a [`DebugState`].
//!
//! ```no_run
//! use dumpstub::{DebugState, GdbStub, StdioConnection};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut state = DebugState::new();
//! state.add_region(0x3ffe_8000, vec![0; 0x18000])?;
//! state.regs_mut().pc = 0x4010_569c;
//!
//! let mut pkt_buf = [0u8; 1024];
//! let mut stub = GdbStub::new(StdioConnection::new(), &mut pkt_buf);
//! let reason = stub.run(&mut state)?;
//! println!("session over: {:?}", reason);
//! # Ok(())
//! # }
//! ```

pub mod arch;
pub mod conn;
pub mod loader;
pub mod protocol;

mod error;
mod state;
mod stub;
mod target;

pub use conn::{Connection, StdioConnection};
pub use error::Error;
pub use state::{DebugState, MemoryRegion, RegionOverlap};
pub use stub::{DisconnectReason, GdbStub};
pub use target::{NoMapping, Target, Unsupported, MAX_MEM_XFER};
