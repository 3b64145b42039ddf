//! Parser for the text crash dump produced by the bootloader's exception
//! handler.
//!
//! The dump is line-oriented with two marker lines. One introduces the
//! register values as whitespace-separated hex words, in the order
//!
//! ```text
//! PC PS SAR VPRI A0..A15 LITBASE SR176 SR208
//! ```
//!
//! (VPRI and SR208 are not part of the RSP register image and are skipped).
//! The other introduces a hex dump of the fixed RAM region. Tokens after
//! each marker may span any number of lines.

use core::fmt;
use std::path::Path;

use log::warn;

use crate::protocol::hex::digit_value;
use crate::state::{DebugState, RegionOverlap};

/// Base address of the dumped RAM region.
pub const RAM_BASE: u32 = 0x3ffe_8000;
/// Size of the dumped RAM region.
pub const RAM_SIZE: usize = 0x1_8000;

const REGS_MARKER: &str = "--- begin regs ---";
const MEM_MARKER: &str = "--- begin memory ---";

/// Register tokens following the marker: PC PS SAR VPRI A0..A15 LITBASE
/// SR176 SR208.
const REG_TOKENS: usize = 23;

#[derive(Debug)]
pub enum CrashLogError {
    Io(std::io::Error),
    /// A register or memory token was not valid hex.
    BadHex { token: String },
    /// The memory dump ended before covering the whole RAM region.
    TruncatedMemory { got: usize },
    /// Fewer register values than the format requires.
    TruncatedRegs { got: usize },
    Overlap(RegionOverlap),
}

impl fmt::Display for CrashLogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use self::CrashLogError::*;
        match self {
            Io(e) => write!(f, "failed to read crash log: {}", e),
            BadHex { token } => write!(f, "crash log contains a non-hex token {:?}", token),
            TruncatedMemory { got } => write!(
                f,
                "memory dump ended after {} of {} bytes",
                got, RAM_SIZE
            ),
            TruncatedRegs { got } => write!(
                f,
                "register dump ended after {} of {} values",
                got, REG_TOKENS
            ),
            Overlap(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for CrashLogError {}

impl From<std::io::Error> for CrashLogError {
    fn from(e: std::io::Error) -> CrashLogError {
        CrashLogError::Io(e)
    }
}

impl From<RegionOverlap> for CrashLogError {
    fn from(e: RegionOverlap) -> CrashLogError {
        CrashLogError::Overlap(e)
    }
}

/// Read and parse a crash log into a fresh [`DebugState`].
pub fn load(path: &Path) -> Result<DebugState, CrashLogError> {
    let text = std::fs::read_to_string(path)?;
    parse(&text)
}

/// Parse crash-log text into a fresh [`DebugState`].
///
/// A log without one of the marker lines yields a state missing that half;
/// this is tolerated (with a warning) so an ELF can still fill in memory.
pub fn parse(text: &str) -> Result<DebugState, CrashLogError> {
    let mut state = DebugState::new();

    match text.find(REGS_MARKER) {
        Some(at) => parse_regs(&text[at + REGS_MARKER.len()..], &mut state)?,
        None => warn!("crash log has no {:?} section; registers stay zeroed", REGS_MARKER),
    }

    match text.find(MEM_MARKER) {
        Some(at) => parse_memory(&text[at + MEM_MARKER.len()..], &mut state)?,
        None => warn!("crash log has no {:?} section; RAM region not mapped", MEM_MARKER),
    }

    Ok(state)
}

fn parse_regs(text: &str, state: &mut DebugState) -> Result<(), CrashLogError> {
    let mut values = [0u32; REG_TOKENS];
    let mut tokens = text.split_whitespace();
    for (i, value) in values.iter_mut().enumerate() {
        let token = tokens
            .next()
            .ok_or(CrashLogError::TruncatedRegs { got: i })?;
        *value = u32::from_str_radix(token, 16).map_err(|_| CrashLogError::BadHex {
            token: token.to_owned(),
        })?;
    }

    let regs = state.regs_mut();
    regs.pc = values[0];
    regs.ps = values[1];
    regs.sar = values[2];
    // values[3] is VPRI: not in the RSP image
    for (i, a) in regs.a.iter_mut().enumerate() {
        *a = values[4 + i];
    }
    regs.litbase = values[20];
    regs.sr176 = values[21];
    // values[22] is SR208: not in the RSP image

    Ok(())
}

fn parse_memory(text: &str, state: &mut DebugState) -> Result<(), CrashLogError> {
    let mut data = Vec::with_capacity(RAM_SIZE);

    'tokens: for token in text.split_whitespace() {
        let bytes = token.as_bytes();
        if bytes.len() % 2 != 0 {
            return Err(CrashLogError::BadHex {
                token: token.to_owned(),
            });
        }
        for pair in bytes.chunks_exact(2) {
            let hi = digit_value(pair[0], 16);
            let lo = digit_value(pair[1], 16);
            match (hi, lo) {
                (Some(hi), Some(lo)) => data.push(hi << 4 | lo),
                _ => {
                    return Err(CrashLogError::BadHex {
                        token: token.to_owned(),
                    })
                }
            }
            if data.len() == RAM_SIZE {
                break 'tokens;
            }
        }
    }

    if data.len() < RAM_SIZE {
        return Err(CrashLogError::TruncatedMemory { got: data.len() });
    }

    state.add_region(RAM_BASE, data)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::Target;

    fn sample_log() -> String {
        let mut log = String::from("exception dump follows\n");
        log.push_str(REGS_MARKER);
        log.push('\n');
        // PC PS SAR VPRI
        log.push_str("4010569c 00000030 0000001f deadbeef\n");
        // A0..A15
        for i in 0..16 {
            log.push_str(&format!("1000000{:x} ", i));
        }
        log.push('\n');
        // LITBASE SR176 SR208
        log.push_str("40100001 00000000 cafef00d\n");
        log.push_str(MEM_MARKER);
        log.push('\n');
        for chunk in 0..RAM_SIZE / 16 {
            for i in 0..16 {
                log.push_str(&format!("{:02x} ", (chunk + i) & 0xff));
            }
            log.push('\n');
        }
        log
    }

    #[test]
    fn parses_registers_and_memory() {
        let state = parse(&sample_log()).unwrap();

        let regs = state.regs();
        assert_eq!(regs.pc, 0x4010569c);
        assert_eq!(regs.ps, 0x30);
        assert_eq!(regs.sar, 0x1f);
        assert_eq!(regs.litbase, 0x40100001);
        assert_eq!(regs.sr176, 0);
        assert_eq!(regs.a[0], 0x10000000);
        assert_eq!(regs.a[15], 0x1000000f);

        assert_eq!(state.regions().len(), 1);
        assert_eq!(state.regions()[0].base(), RAM_BASE);
        assert_eq!(state.regions()[0].size() as usize, RAM_SIZE);
        assert_eq!(state.read_byte(RAM_BASE), Ok(0x00));
        assert_eq!(state.read_byte(RAM_BASE + 17), Ok(0x02));
    }

    #[test]
    fn missing_sections_are_tolerated() {
        let state = parse("nothing to see here\n").unwrap();
        assert_eq!(state.regs().pc, 0);
        assert!(state.regions().is_empty());
    }

    #[test]
    fn bad_register_token_is_an_error() {
        let log = format!("{}\nnot-hex\n", REGS_MARKER);
        assert!(matches!(
            parse(&log),
            Err(CrashLogError::BadHex { .. })
        ));
    }

    #[test]
    fn truncated_memory_is_an_error() {
        let log = format!("{}\n00 11 22 33\n", MEM_MARKER);
        assert!(matches!(
            parse(&log),
            Err(CrashLogError::TruncatedMemory { got: 4 })
        ));
    }

    #[test]
    fn multibyte_memory_tokens_split_into_bytes() {
        let mut log = format!("{}\n", MEM_MARKER);
        log.push_str(&"deadbeef ".repeat(RAM_SIZE / 4));
        let state = parse(&log).unwrap();
        assert_eq!(state.read_byte(RAM_BASE), Ok(0xde));
        assert_eq!(state.read_byte(RAM_BASE + 3), Ok(0xef));
    }
}
