//! The RSP packet engine: hex plumbing, binary escaping, token parsing, and
//! packet framing.
//!
//! Everything in this module operates on byte slices and a
//! [`Connection`](crate::conn::Connection); nothing here knows what a target
//! is.

pub mod bin;
pub mod cursor;
pub mod framer;
pub mod hex;

/// An output buffer was too small for the data it had to hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapacityError;
