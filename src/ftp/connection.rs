//! TCP establishment of the FTP control connection.

use crate::ftp::error::{FtpError, FtpResult};
use crate::ftp::protocol::ControlChannel;
use crate::ftp::types::Reply;
use std::time::Duration;
use tokio::net::TcpStream;

/// Open the control connection and read the server welcome. The welcome
/// reply is returned unvalidated; the facade decides whether the code is
/// acceptable.
pub async fn open(host: &str, port: u16, timeout: Duration) -> FtpResult<(ControlChannel, Reply)> {
    let tcp = connect_stream(host, port, timeout).await?;
    tcp.set_nodelay(true).ok();
    let mut channel = ControlChannel::from_tcp(tcp, timeout);
    let welcome = channel.read_reply().await?;
    Ok((channel, welcome))
}

/// Connect a TCP socket, bounded by the session timeout (0 disables the
/// bound). Shared by the control connection and passive data sockets.
pub(crate) async fn connect_stream(
    host: &str,
    port: u16,
    timeout: Duration,
) -> FtpResult<TcpStream> {
    let connect = TcpStream::connect((host, port));
    let result = if timeout.is_zero() {
        connect.await
    } else {
        tokio::time::timeout(timeout, connect)
            .await
            .map_err(|_| FtpError::timeout(format!("connect to {}:{} timed out", host, port)))?
    };
    result.map_err(|e| FtpError::transport(format!("connect to {}:{} failed: {}", host, port, e)))
}
