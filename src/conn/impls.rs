use std::io;
use std::io::Read;
use std::io::Write;
use std::net::TcpStream;
#[cfg(unix)]
use std::os::unix::net::UnixStream;

use crate::conn::Connection;

impl Connection for TcpStream {
    type Error = io::Error;

    fn read(&mut self) -> Result<u8, Self::Error> {
        let mut buf = [0u8];
        Read::read_exact(self, &mut buf)?;
        Ok(buf[0])
    }

    fn write(&mut self, byte: u8) -> Result<(), Self::Error> {
        Write::write_all(self, &[byte])
    }

    fn write_all(&mut self, buf: &[u8]) -> Result<(), Self::Error> {
        Write::write_all(self, buf)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Write::flush(self)
    }

    fn on_session_start(&mut self) -> Result<(), Self::Error> {
        // the protocol is many small packets; Nagle wrecks the experience
        self.set_nodelay(true)
    }
}

#[cfg(unix)]
impl Connection for UnixStream {
    type Error = io::Error;

    fn read(&mut self) -> Result<u8, Self::Error> {
        let mut buf = [0u8];
        Read::read_exact(self, &mut buf)?;
        Ok(buf[0])
    }

    fn write(&mut self, byte: u8) -> Result<(), Self::Error> {
        Write::write_all(self, &[byte])
    }

    fn write_all(&mut self, buf: &[u8]) -> Result<(), Self::Error> {
        Write::write_all(self, buf)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Write::flush(self)
    }
}

/// A connection over the process's own stdin/stdout, for stubs spawned
/// directly by the debugger (`target remote | dumpstub --log crash.log`).
pub struct StdioConnection {
    stdin: io::Stdin,
    stdout: io::Stdout,
}

impl StdioConnection {
    pub fn new() -> StdioConnection {
        StdioConnection {
            stdin: io::stdin(),
            stdout: io::stdout(),
        }
    }
}

impl Default for StdioConnection {
    fn default() -> StdioConnection {
        StdioConnection::new()
    }
}

impl Connection for StdioConnection {
    type Error = io::Error;

    fn read(&mut self) -> Result<u8, Self::Error> {
        let mut buf = [0u8];
        self.stdin.lock().read_exact(&mut buf)?;
        Ok(buf[0])
    }

    fn write(&mut self, byte: u8) -> Result<(), Self::Error> {
        self.stdout.lock().write_all(&[byte])
    }

    fn write_all(&mut self, buf: &[u8]) -> Result<(), Self::Error> {
        self.stdout.lock().write_all(buf)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        self.stdout.lock().flush()
    }
}
