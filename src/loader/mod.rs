//! Ingestion: turn crash logs and ELF images into a populated
//! [`DebugState`](crate::DebugState).

pub mod crashlog;
pub mod elf;
