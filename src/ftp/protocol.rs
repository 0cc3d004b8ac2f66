//! Control-channel codec (RFC 959 §4).
//!
//! Owns the control socket and serializes request/reply traffic:
//! - commands are written as `CMD\r\n`
//! - replies are framed by the 3-digit code rule: a fourth byte of `-`
//!   opens a multi-line reply that runs until a line starting with the
//!   same three digits followed by a space
//! - every read is guarded by the session idle timeout (0 disables it)
//! - a fatal error (transport, TLS, timeout) marks the channel closed;
//!   closed channels fail every call without touching the wire

use crate::ftp::error::{FtpError, FtpErrorKind, FtpResult};
use crate::ftp::types::Reply;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio_native_tls::TlsStream;

/// Read side of the control socket, plain or TLS.
enum ReadHalf {
    Plain(BufReader<OwnedReadHalf>),
    Tls(BufReader<tokio::io::ReadHalf<TlsStream<TcpStream>>>),
}

/// Write side of the control socket, plain or TLS.
enum WriteHalf {
    Plain(OwnedWriteHalf),
    Tls(tokio::io::WriteHalf<TlsStream<TcpStream>>),
}

/// The control channel: socket halves plus the session's timeout policy
/// and closed flag.
pub struct ControlChannel {
    reader: ReadHalf,
    writer: WriteHalf,
    timeout: Duration,
    closed: bool,
}

impl ControlChannel {
    /// Wrap a plain TCP control connection.
    pub fn from_tcp(stream: TcpStream, timeout: Duration) -> Self {
        let (rd, wr) = stream.into_split();
        Self {
            reader: ReadHalf::Plain(BufReader::new(rd)),
            writer: WriteHalf::Plain(wr),
            timeout,
            closed: false,
        }
    }

    /// Wrap a TLS-upgraded control connection.
    pub fn from_tls(stream: TlsStream<TcpStream>, timeout: Duration) -> Self {
        let (rd, wr) = tokio::io::split(stream);
        Self {
            reader: ReadHalf::Tls(BufReader::new(rd)),
            writer: WriteHalf::Tls(wr),
            timeout,
            closed: false,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Mark the channel closed. Every subsequent call fails with a
    /// `Closed` error and performs no wire I/O.
    pub fn close(&mut self) {
        self.closed = true;
    }

    fn ensure_open(&self) -> FtpResult<()> {
        if self.closed {
            Err(FtpError::closed())
        } else {
            Ok(())
        }
    }

    /// Recover the underlying `TcpStream` for a TLS upgrade. Fails if the
    /// channel is already TLS.
    pub(crate) fn into_tcp(self) -> FtpResult<TcpStream> {
        let rd = match self.reader {
            ReadHalf::Plain(buf) => buf.into_inner(),
            ReadHalf::Tls(_) => {
                return Err(FtpError::tls("control connection is already TLS"))
            }
        };
        let wr = match self.writer {
            WriteHalf::Plain(wr) => wr,
            WriteHalf::Tls(_) => {
                return Err(FtpError::tls("control connection is already TLS"))
            }
        };
        rd.reunite(wr)
            .map_err(|e| FtpError::transport(format!("cannot reunite control socket: {}", e)))
    }

    // ─── Writing ─────────────────────────────────────────────────

    /// Send a raw command (the trailing CRLF is appended here). Used
    /// directly by handlers that must emit follow-ups, e.g. PASS after
    /// the 331 reply to USER.
    pub async fn send(&mut self, cmd: &str) -> FtpResult<()> {
        self.ensure_open()?;
        if cmd.starts_with("PASS ") {
            log::trace!(">>> PASS ###");
        } else {
            log::trace!(">>> {}", cmd);
        }
        let line = format!("{}\r\n", cmd);
        let result = match &mut self.writer {
            WriteHalf::Plain(w) => w.write_all(line.as_bytes()).await,
            WriteHalf::Tls(w) => w.write_all(line.as_bytes()).await,
        };
        if let Err(e) = result {
            self.closed = true;
            return Err(e.into());
        }
        let flushed = match &mut self.writer {
            WriteHalf::Plain(w) => w.flush().await,
            WriteHalf::Tls(w) => w.flush().await,
        };
        if let Err(e) = flushed {
            self.closed = true;
            return Err(e.into());
        }
        Ok(())
    }

    // ─── Reading ─────────────────────────────────────────────────

    /// Read one complete reply, honoring the idle timeout. Timeouts and
    /// transport failures close the channel.
    pub async fn read_reply(&mut self) -> FtpResult<Reply> {
        self.ensure_open()?;
        let result = if self.timeout.is_zero() {
            self.reader.read_reply().await
        } else {
            match tokio::time::timeout(self.timeout, self.reader.read_reply()).await {
                Ok(result) => result,
                Err(_) => {
                    self.closed = true;
                    return Err(FtpError::timeout("control channel idle timeout expired"));
                }
            }
        };
        match result {
            Ok(reply) => {
                log::trace!(
                    "<<< {} {}",
                    reply.code,
                    reply.lines.last().map(String::as_str).unwrap_or("")
                );
                Ok(reply)
            }
            Err(e) => {
                if e.is_fatal() {
                    self.closed = true;
                }
                Err(e)
            }
        }
    }

    // ─── Request primitives ──────────────────────────────────────

    /// Send a command and await its terminal reply. Preliminary (1xx)
    /// replies are skipped; a 2xx reply resolves; everything else rejects
    /// with a protocol error carrying the reply code and text.
    pub async fn request(&mut self, cmd: &str) -> FtpResult<Reply> {
        self.send(cmd).await?;
        loop {
            let reply = self.read_reply().await?;
            if reply.is_positive_preliminary() {
                continue;
            }
            if reply.is_positive_completion() {
                return Ok(reply);
            }
            return Err(FtpError::rejected(reply.code, reply.text()));
        }
    }

    /// Like [`request`](Self::request) but also accepts a 3xx reply, for
    /// the first half of two-step exchanges (RNFR, REST).
    pub async fn request_intermediate(&mut self, cmd: &str) -> FtpResult<Reply> {
        self.send(cmd).await?;
        loop {
            let reply = self.read_reply().await?;
            if reply.is_positive_preliminary() {
                continue;
            }
            if reply.is_positive_completion() || reply.is_positive_intermediate() {
                return Ok(reply);
            }
            return Err(FtpError::rejected(reply.code, reply.text()));
        }
    }

    /// Like [`request`](Self::request) but downgrades protocol errors to
    /// ordinary replies, for informational commands the server may not
    /// support. Transport and timeout errors still propagate.
    pub async fn request_ignoring_error(&mut self, cmd: &str) -> FtpResult<Reply> {
        match self.request(cmd).await {
            Ok(reply) => Ok(reply),
            Err(e) if e.kind == FtpErrorKind::Protocol => Ok(Reply {
                code: e.code.unwrap_or(0),
                lines: e.message.lines().map(str::to_string).collect(),
            }),
            Err(e) => Err(e),
        }
    }
}

// ─── Reply framing ───────────────────────────────────────────────────

impl ReadHalf {
    async fn read_reply(&mut self) -> FtpResult<Reply> {
        match self {
            ReadHalf::Plain(r) => read_reply_from(r).await,
            ReadHalf::Tls(r) => read_reply_from(r).await,
        }
    }
}

/// Read one line from the control stream, tolerating non-UTF-8 bytes by
/// lossy decoding. An EOF mid-session is a transport error.
async fn read_line_lossy<R: AsyncBufRead + Unpin>(reader: &mut R) -> FtpResult<String> {
    let mut buf = Vec::new();
    let n = reader.read_until(b'\n', &mut buf).await?;
    if n == 0 {
        return Err(FtpError::transport("server closed the control connection"));
    }
    let line = String::from_utf8_lossy(&buf);
    Ok(line.trim_end_matches(|c| c == '\r' || c == '\n').to_string())
}

/// Assemble one complete reply from the control stream. Never returns a
/// partial reply: a multi-line reply is accumulated until its terminator
/// line arrives.
pub(crate) async fn read_reply_from<R: AsyncBufRead + Unpin>(reader: &mut R) -> FtpResult<Reply> {
    let first = read_line_lossy(reader).await?;
    let code = parse_code(&first)?;
    let mut lines = vec![first];

    // "NNN-" opens a multi-line reply that runs until "NNN " is seen.
    let is_multi = lines[0].len() >= 4 && lines[0].as_bytes()[3] == b'-';
    if is_multi {
        let terminator = format!("{} ", code);
        loop {
            let next = read_line_lossy(reader).await?;
            let done = next.starts_with(&terminator);
            lines.push(next);
            if done {
                break;
            }
        }
    }

    Ok(Reply { code, lines })
}

/// Parse the 3-digit reply code from the start of a line.
fn parse_code(line: &str) -> FtpResult<u16> {
    let code = line
        .get(..3)
        .and_then(|digits| digits.parse::<u16>().ok())
        .ok_or_else(|| FtpError::parse(format!("malformed reply line: '{}'", line)))?;
    if !(100..600).contains(&code) {
        return Err(FtpError::parse(format!("reply code out of range: '{}'", line)));
    }
    Ok(code)
}
