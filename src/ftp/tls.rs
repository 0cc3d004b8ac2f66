//! Explicit FTPS (RFC 4217) helpers.
//!
//! One connector builder serves both channels: the control socket is
//! upgraded in place after a positive AUTH TLS reply, and every passive
//! data socket is wrapped with the same captured options before use.

use crate::ftp::error::{FtpError, FtpResult};
use crate::ftp::protocol::ControlChannel;
use crate::ftp::types::TlsOptions;
use tokio::net::TcpStream;
use tokio_native_tls::{TlsConnector, TlsStream};

/// Build a `TlsConnector` from the session's captured options.
pub fn build_connector(options: &TlsOptions) -> FtpResult<TlsConnector> {
    let mut builder = native_tls::TlsConnector::builder();
    if options.accept_invalid_certs {
        builder.danger_accept_invalid_certs(true);
        builder.danger_accept_invalid_hostnames(true);
    }
    let connector = builder.build()?;
    Ok(TlsConnector::from(connector))
}

/// Upgrade a plain control channel to TLS after AUTH TLS. Consumes the
/// channel, performs the handshake, and returns a new channel carrying
/// the same timeout policy.
pub async fn upgrade_control(
    channel: ControlChannel,
    host: &str,
    options: &TlsOptions,
) -> FtpResult<ControlChannel> {
    let timeout = channel.timeout();
    let tcp = channel.into_tcp()?;
    let stream = handshake(tcp, host, options).await?;
    Ok(ControlChannel::from_tls(stream, timeout))
}

/// Wrap a freshly opened passive data socket in TLS (PROT P).
pub async fn wrap_data(
    tcp: TcpStream,
    host: &str,
    options: &TlsOptions,
) -> FtpResult<TlsStream<TcpStream>> {
    handshake(tcp, host, options).await
}

async fn handshake(
    tcp: TcpStream,
    host: &str,
    options: &TlsOptions,
) -> FtpResult<TlsStream<TcpStream>> {
    let domain = options.domain.as_deref().unwrap_or(host);
    let connector = build_connector(options)?;
    connector
        .connect(domain, tcp)
        .await
        .map_err(|e| FtpError::tls(format!("TLS handshake with {}: {}", domain, e)))
}
