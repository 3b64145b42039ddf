use core::fmt::{self, Debug, Display};

/// Errors which terminate a debugging session.
///
/// Recoverable conditions (bad checksums, malformed commands, unmapped
/// memory) never surface here; they are answered on the wire and the session
/// continues.
pub enum Error<C> {
    /// Connection error while initializing the session.
    ConnectionInit(C),
    /// Connection error while reading a request.
    ConnectionRead(C),
    /// Connection error while writing a response.
    ConnectionWrite(C),
    /// The client answered a packet with something other than `+` or `-`.
    UnexpectedAck(u8),
    /// An inbound packet did not fit in the scratch buffer.
    PacketBufferOverflow,
}

impl<C: Debug> Debug for Error<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl<C: Debug> Display for Error<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use self::Error::*;
        match self {
            ConnectionInit(e) => write!(f, "connection error while initializing the session: {:?}", e),
            ConnectionRead(e) => write!(f, "connection error while reading request: {:?}", e),
            ConnectionWrite(e) => write!(f, "connection error while writing response: {:?}", e),
            UnexpectedAck(b) => write!(f, "expected `+` or `-` in the ack slot, got {:#04x}", b),
            PacketBufferOverflow => write!(f, "inbound packet too big for the scratch buffer"),
        }
    }
}

impl<C: Debug> std::error::Error for Error<C> {}
