//! Passive data channels and the transfer byte pumps.
//!
//! Two passive strategies are supported (RFC 2428 EPSV, RFC 959 PASV),
//! probed in that order on the first transfer of a session. A 5xx
//! rejection falls through to the next strategy; the first success is
//! cached on the client so later transfers skip the probe entirely.
//!
//! The data socket mirrors the control channel's TLS state: once
//! `use_tls` has run, every passive socket is wrapped with the same
//! captured options before the transfer starts.

use crate::ftp::client::FtpClient;
use crate::ftp::connection;
use crate::ftp::error::{FtpError, FtpResult};
use crate::ftp::progress::{ProgressSink, TransferInfo};
use crate::ftp::tls;
use lazy_static::lazy_static;
use regex::Regex;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::net::TcpStream;
use tokio_native_tls::TlsStream;

/// Chunk size for streaming transfers, which is also the progress
/// reporting granularity (64 KiB).
pub(crate) const CHUNK_SIZE: usize = 64 * 1024;

/// Passive-mode strategy for opening the data channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassiveMode {
    /// `EPSV` (RFC 2428): the reply carries only a port; the data socket
    /// connects back to the control-connection host.
    ExtendedPassive,
    /// `PASV` (RFC 959): the reply carries an IPv4 endpoint as six
    /// comma-separated numbers.
    Passive,
}

impl PassiveMode {
    fn command(self) -> &'static str {
        match self {
            PassiveMode::ExtendedPassive => "EPSV",
            PassiveMode::Passive => "PASV",
        }
    }
}

/// A connected data socket, plain or TLS. Consumed by exactly one
/// transfer and dropped at transfer end.
pub enum DataStream {
    Plain(TcpStream),
    Tls(TlsStream<TcpStream>),
}

impl AsyncRead for DataStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            DataStream::Plain(s) => Pin::new(s).poll_read(cx, buf),
            DataStream::Tls(s) => Pin::new(s).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for DataStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            DataStream::Plain(s) => Pin::new(s).poll_write(cx, buf),
            DataStream::Tls(s) => Pin::new(s).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            DataStream::Plain(s) => Pin::new(s).poll_flush(cx),
            DataStream::Tls(s) => Pin::new(s).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            DataStream::Plain(s) => Pin::new(s).poll_shutdown(cx),
            DataStream::Tls(s) => Pin::new(s).poll_shutdown(cx),
        }
    }
}

// ─── Passive-mode selection ──────────────────────────────────────────

impl FtpClient {
    /// Open a data socket for the next transfer. The first call probes
    /// EPSV then PASV; the winning strategy is cached for the rest of the
    /// session. A 5xx reply means "try the next strategy"; any other
    /// error aborts the probe.
    pub(crate) async fn prepare_transfer(&mut self) -> FtpResult<DataStream> {
        if let Some(mode) = self.passive_mode {
            return self.open_passive(mode).await;
        }
        let mut last_rejection = None;
        for mode in [PassiveMode::ExtendedPassive, PassiveMode::Passive] {
            match self.open_passive(mode).await {
                Ok(stream) => {
                    self.passive_mode = Some(mode);
                    return Ok(stream);
                }
                Err(e) if e.is_permanent_rejection() => last_rejection = Some(e),
                Err(e) => return Err(e),
            }
        }
        Err(last_rejection
            .unwrap_or_else(|| FtpError::rejected(502, "no passive mode accepted")))
    }

    async fn open_passive(&mut self, mode: PassiveMode) -> FtpResult<DataStream> {
        let control_host = self.host.clone();
        let tls_options = self.tls_options.clone();
        let timeout = self.timeout;

        let reply = self.channel()?.request(mode.command()).await?;
        let (host, port) = match mode {
            PassiveMode::ExtendedPassive => {
                (control_host.clone(), parse_epsv_reply(&reply.text())?)
            }
            PassiveMode::Passive => parse_pasv_reply(&reply.text())?,
        };

        let tcp = connection::connect_stream(&host, port, timeout).await?;
        tcp.set_nodelay(true).ok();

        // Mirror the control channel's TLS state. The certificate is
        // validated against the control host, not the PASV endpoint.
        match tls_options {
            Some(options) => Ok(DataStream::Tls(
                tls::wrap_data(tcp, &control_host, &options).await?,
            )),
            None => Ok(DataStream::Plain(tcp)),
        }
    }
}

// ─── Reply parsing ───────────────────────────────────────────────────

lazy_static! {
    static ref PASV_RE: Regex =
        Regex::new(r"(\d{1,3}),(\d{1,3}),(\d{1,3}),(\d{1,3}),(\d{1,3}),(\d{1,3})").unwrap();
    static ref EPSV_RE: Regex = Regex::new(r"\|\|\|(\d+)\|").unwrap();
}

/// Parse `227 Entering Passive Mode (h1,h2,h3,h4,p1,p2)` into host and
/// port (`p1 * 256 + p2`).
pub(crate) fn parse_pasv_reply(text: &str) -> FtpResult<(String, u16)> {
    let caps = PASV_RE
        .captures(text)
        .ok_or_else(|| FtpError::parse(format!("cannot parse PASV reply: {}", text)))?;
    let mut nums = [0u16; 6];
    for (i, slot) in nums.iter_mut().enumerate() {
        *slot = caps[i + 1]
            .parse::<u8>()
            .map_err(|_| FtpError::parse(format!("PASV number out of range: {}", text)))?
            as u16;
    }
    let host = format!("{}.{}.{}.{}", nums[0], nums[1], nums[2], nums[3]);
    let port = nums[4] * 256 + nums[5];
    Ok((host, port))
}

/// Parse `229 Entering Extended Passive Mode (|||port|)` into the port.
pub(crate) fn parse_epsv_reply(text: &str) -> FtpResult<u16> {
    let caps = EPSV_RE
        .captures(text)
        .ok_or_else(|| FtpError::parse(format!("cannot parse EPSV reply: {}", text)))?;
    caps[1]
        .parse::<u16>()
        .map_err(|_| FtpError::parse(format!("EPSV port out of range: {}", text)))
}

// ─── Byte pumps ──────────────────────────────────────────────────────

/// Stream `source` into the data socket. At end-of-source the write side
/// is shut down so the server observes EOF. Returns bytes moved.
pub(crate) async fn pump_upload<R>(
    source: &mut R,
    data: &mut DataStream,
    sink: &mut dyn ProgressSink,
    info: &TransferInfo,
) -> FtpResult<u64>
where
    R: AsyncRead + Unpin,
{
    sink.start(info);
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut transferred = 0u64;
    let result = loop {
        let n = match source.read(&mut buf).await {
            Ok(0) => break Ok(()),
            Ok(n) => n,
            Err(e) => break Err(e),
        };
        if let Err(e) = data.write_all(&buf[..n]).await {
            break Err(e);
        }
        transferred += n as u64;
        sink.update(transferred);
    };
    let result = match result {
        Ok(()) => match data.flush().await {
            Ok(()) => data.shutdown().await,
            Err(e) => Err(e),
        },
        Err(e) => Err(e),
    };
    sink.stop();
    result?;
    Ok(transferred)
}

/// Stream the data socket into `destination` until the server closes it,
/// then flush. Returns bytes moved.
pub(crate) async fn pump_download<W>(
    data: &mut DataStream,
    destination: &mut W,
    sink: &mut dyn ProgressSink,
    info: &TransferInfo,
) -> FtpResult<u64>
where
    W: AsyncWrite + Unpin,
{
    sink.start(info);
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut transferred = 0u64;
    let result = loop {
        let n = match data.read(&mut buf).await {
            Ok(0) => break Ok(()),
            Ok(n) => n,
            Err(e) => break Err(e),
        };
        if let Err(e) = destination.write_all(&buf[..n]).await {
            break Err(e);
        }
        transferred += n as u64;
        sink.update(transferred);
    };
    let result = match result {
        Ok(()) => destination.flush().await,
        Err(e) => Err(e),
    };
    sink.stop();
    result?;
    Ok(transferred)
}
