//! Trait to perform in-order, serial, byte-wise I/O.

mod impls;

pub use impls::StdioConnection;

/// A blocking, byte-granular transport.
///
/// This trait is automatically implemented for
/// [`TcpStream`](std::net::TcpStream) and
/// [`UnixStream`](std::os::unix::net::UnixStream) (on unix systems), and a
/// stdin/stdout pair is available as [`StdioConnection`].
pub trait Connection {
    /// Transport-specific error type.
    type Error;

    /// Read a single byte, blocking until one is available.
    ///
    /// End-of-stream must surface as an `Err`: the protocol offers no
    /// in-band way to resume a half-closed session.
    fn read(&mut self) -> Result<u8, Self::Error>;

    /// Write a single byte.
    fn write(&mut self, byte: u8) -> Result<(), Self::Error>;

    /// Write the entire buffer, blocking until complete.
    ///
    /// The default implementation calls `self.write()` on each byte; override
    /// it when the underlying stream has a bulk write.
    fn write_all(&mut self, buf: &[u8]) -> Result<(), Self::Error> {
        for b in buf {
            self.write(*b)?;
        }
        Ok(())
    }

    /// Flush this connection, ensuring all buffered contents reach their
    /// destination.
    ///
    /// Connections without internal buffering may simply return `Ok(())`.
    fn flush(&mut self) -> Result<(), Self::Error>;

    /// Called once, before any packets are exchanged.
    ///
    /// The default implementation is a no-op.
    fn on_session_start(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}
