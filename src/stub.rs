//! The command dispatcher: consumes framed packets, produces framed
//! replies.

use log::{debug, error, info, warn};

use crate::arch::Registers;
use crate::conn::Connection;
use crate::error::Error;
use crate::protocol::bin::decode_bin;
use crate::protocol::cursor::{BadRequest, TokenCursor};
use crate::protocol::framer::{
    recv_packet, send_packet, AckStatus, RecvPacketError, SendPacketError,
};
use crate::protocol::hex::{decode_hex_buf, decode_hex_into, encode_hex, hex_digit};
use crate::target::{Target, MAX_MEM_XFER};

const OK_REPLY: &[u8] = b"OK";
const ERROR_REPLY: &[u8] = b"E00";
const EMPTY_REPLY: &[u8] = b"";
/// Stop reply for `?`: signal 0, "no signal".
const STOP_REPLY: &[u8] = b"S00";

/// Why the session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The client detached cleanly (`D`).
    Detach,
    /// The client asked the target to resume (`c`/`s`). A post-mortem
    /// target has nothing to run, so control returns to the caller.
    Resume,
}

/// Serves a [`Target`] to a GDB client over a [`Connection`].
pub struct GdbStub<'a, C: Connection> {
    conn: C,
    pkt_buf: &'a mut [u8],
    retransmit_on_nack: bool,
}

impl<'a, C: Connection> GdbStub<'a, C> {
    /// Create a stub using `conn` and a caller-provided scratch buffer.
    ///
    /// The buffer bounds the largest packet in either direction. It must
    /// hold the full register image (904 bytes for the Xtensa layout);
    /// 1024 is the customary size.
    pub fn new(conn: C, pkt_buf: &'a mut [u8]) -> GdbStub<'a, C> {
        GdbStub {
            conn,
            pkt_buf,
            retransmit_on_nack: false,
        }
    }

    /// Resend outbound packets the client rejects.
    ///
    /// Off by default: a nack is logged and skipped, relying on GDB to
    /// re-issue the request. Turning this on trades strict RSP conformance
    /// for the possibility of spinning against a hopelessly noisy channel.
    pub fn retransmit_on_nack(mut self, enable: bool) -> GdbStub<'a, C> {
        self.retransmit_on_nack = enable;
        self
    }

    /// Run the session until the client disconnects or the transport dies.
    ///
    /// Requests are handled strictly one at a time: a reply is composed only
    /// after the incoming packet validates, and the next receive starts only
    /// once the reply's ack has been consumed.
    pub fn run<T: Target>(&mut self, target: &mut T) -> Result<DisconnectReason, Error<C::Error>> {
        self.conn.on_session_start().map_err(Error::ConnectionInit)?;

        loop {
            let len = match recv_packet(&mut self.conn, self.pkt_buf) {
                Ok(len) => len,
                Err(RecvPacketError::BadChecksum) => {
                    debug!("bad checksum; waiting for retransmit");
                    continue;
                }
                Err(RecvPacketError::BadRunLength) => {
                    debug!("malformed run-length data; waiting for retransmit");
                    continue;
                }
                Err(RecvPacketError::BufferOverflow) => {
                    error!(
                        "inbound packet overflowed the {}-byte scratch buffer; dropping session",
                        self.pkt_buf.len()
                    );
                    return Err(Error::PacketBufferOverflow);
                }
                Err(RecvPacketError::Connection(e)) => return Err(Error::ConnectionRead(e)),
            };

            if len == 0 {
                continue;
            }

            if let Some(reason) = self.dispatch(target, len)? {
                return Ok(reason);
            }
        }
    }

    fn dispatch<T: Target>(
        &mut self,
        target: &mut T,
        len: usize,
    ) -> Result<Option<DisconnectReason>, Error<C::Error>> {
        match self.pkt_buf[0] {
            b'q' => self.handle_query(len)?,
            b'?' => self.reply(STOP_REPLY)?,
            b'g' => self.handle_read_registers(target)?,
            b'G' => self.handle_write_registers(target, len)?,
            b'p' => self.handle_read_register(target, len)?,
            b'P' => self.handle_write_register(target, len)?,
            b'm' => self.handle_mem_read(target, len)?,
            b'M' => self.handle_mem_write_hex(target, len)?,
            b'X' => self.handle_mem_write_bin(target, len)?,
            b'c' => {
                if target.resume().is_err() {
                    debug!("continue requested; post-mortem target stays halted");
                }
                return Ok(Some(DisconnectReason::Resume));
            }
            b's' => {
                if target.step().is_err() {
                    debug!("step requested; post-mortem target stays halted");
                }
                return Ok(Some(DisconnectReason::Resume));
            }
            b'D' => {
                debug!("client detached");
                self.reply(OK_REPLY)?;
                return Ok(Some(DisconnectReason::Detach));
            }
            other => {
                info!("unsupported command {:?}; replying empty", other as char);
                self.reply(EMPTY_REPLY)?;
            }
        }
        Ok(None)
    }

    fn handle_query(&mut self, len: usize) -> Result<(), Error<C::Error>> {
        let reply: &[u8] = {
            let query = &self.pkt_buf[1..len];
            if query.starts_with(b"Supported") {
                b"swbreak+;hwbreak+;PacketSize=FF"
            } else if query.starts_with(b"Attached") {
                b"1"
            } else {
                EMPTY_REPLY
            }
        };
        self.reply(reply)
    }

    /// `g`: hex-serialize the full register image into the scratch buffer.
    /// Missing slots read as `xx`.
    fn handle_read_registers<T: Target>(&mut self, target: &T) -> Result<(), Error<C::Error>> {
        let buf = &mut *self.pkt_buf;
        let mut n = 0;
        let mut overflow = false;
        target.regs().gdb_serialize(|byte| {
            if n + 2 > buf.len() {
                overflow = true;
                return;
            }
            match byte {
                Some(b) => {
                    buf[n] = hex_digit(b >> 4);
                    buf[n + 1] = hex_digit(b);
                }
                None => {
                    buf[n] = b'x';
                    buf[n + 1] = b'x';
                }
            }
            n += 2;
        });

        if overflow {
            warn!("register image does not fit the scratch buffer");
            return self.reply(ERROR_REPLY);
        }
        transmit(&mut self.conn, &self.pkt_buf[..n], self.retransmit_on_nack)
    }

    /// `G`: decode a full register image and store the mapped slots.
    fn handle_write_registers<T: Target>(
        &mut self,
        target: &mut T,
        len: usize,
    ) -> Result<(), Error<C::Error>> {
        let ok = {
            let image = &mut self.pkt_buf[1..len];
            match decode_hex_buf(image) {
                Ok(decoded) => target.regs_mut().gdb_deserialize(decoded).is_ok(),
                Err(_) => false,
            }
        };
        if ok {
            self.reply(OK_REPLY)
        } else {
            self.reply(ERROR_REPLY)
        }
    }

    /// `p n`: one register, or `xxxxxxxx` for unmapped indices.
    fn handle_read_register<T: Target>(
        &mut self,
        target: &T,
        len: usize,
    ) -> Result<(), Error<C::Error>> {
        let index = match parse_reg_index(&self.pkt_buf[1..len]) {
            Ok(index) => index,
            Err(BadRequest) => return self.reply(ERROR_REPLY),
        };

        let mut reply = *b"xxxxxxxx";
        if let Some(val) = target.regs().read_register(index) {
            if encode_hex(&mut reply, &val.to_le_bytes()).is_err() {
                return self.reply(ERROR_REPLY);
            }
        }
        self.reply(&reply)
    }

    /// `P n=vvvvvvvv`: write one register. Unmapped indices are accepted and
    /// ignored, mirroring how `G` treats their slots.
    fn handle_write_register<T: Target>(
        &mut self,
        target: &mut T,
        len: usize,
    ) -> Result<(), Error<C::Error>> {
        match parse_reg_write(&self.pkt_buf[1..len]) {
            Ok((index, val)) => {
                target.regs_mut().write_register(index, val);
                self.reply(OK_REPLY)
            }
            Err(BadRequest) => self.reply(ERROR_REPLY),
        }
    }

    /// `m addr,len`: up to [`MAX_MEM_XFER`] bytes, hex-encoded.
    fn handle_mem_read<T: Target>(
        &mut self,
        target: &T,
        len: usize,
    ) -> Result<(), Error<C::Error>> {
        let (addr, count) = match parse_addr_len(&self.pkt_buf[1..len]) {
            Ok(args) => args,
            Err(BadRequest) => return self.reply(ERROR_REPLY),
        };
        if count > MAX_MEM_XFER {
            return self.reply(ERROR_REPLY);
        }

        let mut data = [0u8; MAX_MEM_XFER];
        for (i, slot) in data[..count].iter_mut().enumerate() {
            match target.read_byte(addr.wrapping_add(i as u32)) {
                Ok(b) => *slot = b,
                Err(_) => return self.reply(ERROR_REPLY),
            }
        }

        let mut reply = [0u8; MAX_MEM_XFER * 2];
        let n = match encode_hex(&mut reply, &data[..count]) {
            Ok(n) => n,
            Err(_) => return self.reply(ERROR_REPLY),
        };
        self.reply(&reply[..n])
    }

    /// `M addr,len:XX..`: hex-encoded memory write.
    fn handle_mem_write_hex<T: Target>(
        &mut self,
        target: &mut T,
        len: usize,
    ) -> Result<(), Error<C::Error>> {
        let (addr, count, data_off) = match parse_mem_write(&self.pkt_buf[1..len]) {
            Ok(args) => args,
            Err(BadRequest) => return self.reply(ERROR_REPLY),
        };
        if count > MAX_MEM_XFER {
            return self.reply(ERROR_REPLY);
        }

        let mut data = [0u8; MAX_MEM_XFER];
        if decode_hex_into(&self.pkt_buf[1 + data_off..len], &mut data[..count]).is_err() {
            return self.reply(ERROR_REPLY);
        }

        self.write_mem(target, addr, &data[..count])
    }

    /// `X addr,len:bb..`: binary-escaped memory write.
    fn handle_mem_write_bin<T: Target>(
        &mut self,
        target: &mut T,
        len: usize,
    ) -> Result<(), Error<C::Error>> {
        let (addr, count, data_off) = match parse_mem_write(&self.pkt_buf[1..len]) {
            Ok(args) => args,
            Err(BadRequest) => return self.reply(ERROR_REPLY),
        };
        if count > MAX_MEM_XFER {
            return self.reply(ERROR_REPLY);
        }

        let mut data = [0u8; MAX_MEM_XFER];
        let decoded = decode_bin(&self.pkt_buf[1 + data_off..len], &mut data[..count]);
        if decoded != Ok(count) {
            return self.reply(ERROR_REPLY);
        }

        self.write_mem(target, addr, &data[..count])
    }

    fn write_mem<T: Target>(
        &mut self,
        target: &mut T,
        addr: u32,
        data: &[u8],
    ) -> Result<(), Error<C::Error>> {
        for (i, b) in data.iter().enumerate() {
            if target.write_byte(addr.wrapping_add(i as u32), *b).is_err() {
                return self.reply(ERROR_REPLY);
            }
        }
        self.reply(OK_REPLY)
    }

    /// Send an `O` console-output packet carrying `msg` hex-encoded.
    ///
    /// GDB prints these on the user's console; useful for surfacing a crash
    /// summary while a command is being handled.
    pub fn console_output(&mut self, msg: &str) -> Result<(), Error<C::Error>> {
        let n = {
            let buf = &mut *self.pkt_buf;
            if buf.is_empty() {
                return Err(Error::PacketBufferOverflow);
            }
            buf[0] = b'O';
            encode_hex(&mut buf[1..], msg.as_bytes()).map_err(|_| Error::PacketBufferOverflow)?
        };
        transmit(
            &mut self.conn,
            &self.pkt_buf[..1 + n],
            self.retransmit_on_nack,
        )
    }

    fn reply(&mut self, payload: &[u8]) -> Result<(), Error<C::Error>> {
        transmit(&mut self.conn, payload, self.retransmit_on_nack)
    }
}

fn transmit<C: Connection>(
    conn: &mut C,
    payload: &[u8],
    retransmit: bool,
) -> Result<(), Error<C::Error>> {
    loop {
        match send_packet(conn, payload) {
            Ok(AckStatus::Acked) => return Ok(()),
            Ok(AckStatus::Nacked) => {
                if retransmit {
                    debug!("client nacked; retransmitting");
                    continue;
                }
                warn!("client nacked the response; not retransmitting");
                return Ok(());
            }
            Err(SendPacketError::Connection(e)) => return Err(Error::ConnectionWrite(e)),
            Err(SendPacketError::UnexpectedAck(b)) => return Err(Error::UnexpectedAck(b)),
        }
    }
}

fn parse_reg_index(payload: &[u8]) -> Result<usize, BadRequest> {
    let mut cur = TokenCursor::new(payload);
    Ok(cur.expect_hex_int()? as u32 as usize)
}

fn parse_reg_write(payload: &[u8]) -> Result<(usize, u32), BadRequest> {
    let mut cur = TokenCursor::new(payload);
    let index = cur.expect_hex_int()? as u32 as usize;
    cur.expect_sep(b'=')?;
    let mut bytes = [0u8; 4];
    decode_hex_into(cur.rest(), &mut bytes).map_err(|_| BadRequest)?;
    Ok((index, u32::from_le_bytes(bytes)))
}

fn parse_addr_len(payload: &[u8]) -> Result<(u32, usize), BadRequest> {
    let mut cur = TokenCursor::new(payload);
    let addr = cur.expect_hex_int()? as u32;
    cur.expect_sep(b',')?;
    let count = cur.expect_hex_int()? as u32 as usize;
    Ok((addr, count))
}

/// Like [`parse_addr_len`], but also consumes the `:` introducing the data
/// and returns the data's offset within the payload.
fn parse_mem_write(payload: &[u8]) -> Result<(u32, usize, usize), BadRequest> {
    let mut cur = TokenCursor::new(payload);
    let addr = cur.expect_hex_int()? as u32;
    cur.expect_sep(b',')?;
    let count = cur.expect_hex_int()? as u32 as usize;
    cur.expect_sep(b':')?;
    Ok((addr, count, cur.pos()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mem_args() {
        assert_eq!(parse_addr_len(b"3ffe8010,1"), Ok((0x3ffe8010, 1)));
        assert_eq!(parse_addr_len(b"3ffe8010"), Err(BadRequest));
        assert_eq!(parse_addr_len(b",1"), Err(BadRequest));
    }

    #[test]
    fn mem_write_args() {
        assert_eq!(parse_mem_write(b"3ffe8000,2:dead"), Ok((0x3ffe8000, 2, 11)));
        assert_eq!(parse_mem_write(b"3ffe8000,2"), Err(BadRequest));
    }

    #[test]
    fn high_addresses_survive_the_signed_parser() {
        assert_eq!(parse_addr_len(b"fffffffe,2"), Ok((0xffff_fffe, 2)));
    }

    #[test]
    fn reg_write_args() {
        assert_eq!(parse_reg_write(b"0=bc0a1040"), Ok((0, 0x40100abc)));
        assert_eq!(parse_reg_write(b"0=bc0a10"), Err(BadRequest));
        assert_eq!(parse_reg_write(b"0bc0a1040"), Err(BadRequest));
    }

    #[test]
    fn negative_lengths_are_rejected_by_the_transfer_cap() {
        // "-1" parses, wraps to a huge unsigned count, and trips the cap
        let (_, count) = parse_addr_len(b"0,-1").unwrap();
        assert!(count > MAX_MEM_XFER);
    }
}
