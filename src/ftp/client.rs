//! The FTP session facade.
//!
//! Lifecycle: `connect()` → optional `use_tls()` → `login()` →
//! `use_default_settings()`, or all four at once via `access()`. Commands
//! are strictly serialized on the control channel; a fatal transport or
//! timeout error tears the session down and every later call fails with
//! a `Closed` error until `connect()` is called again.

use crate::ftp::connection;
use crate::ftp::error::{FtpError, FtpResult};
use crate::ftp::parser;
use crate::ftp::progress::{NoopProgress, ProgressSink};
use crate::ftp::protocol::ControlChannel;
use crate::ftp::tls;
use crate::ftp::transfer::PassiveMode;
use crate::ftp::types::{AccessOptions, FeatureMap, Reply, TlsOptions};
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Listing commands probed, in order, on the first `list()` call.
const LIST_COMMANDS: [&str; 3] = ["MLSD", "LIST -a", "LIST"];

/// Fact set requested from MLSD-capable servers.
const OPTS_MLST: &str = "OPTS MLST modify;size;type;unique;unix.mode;unix.owner;unix.group;unix.ownername;unix.groupname;";

/// An FTP/FTPS client session.
pub struct FtpClient {
    pub(crate) conn: Option<ControlChannel>,
    pub(crate) host: String,
    pub(crate) timeout: Duration,
    /// TLS options captured by `use_tls`, reused for data sockets.
    pub(crate) tls_options: Option<TlsOptions>,
    /// Passive strategy cached by the first successful probe.
    pub(crate) passive_mode: Option<PassiveMode>,
    /// Listing commands still in the running; collapses to the winner
    /// after the first successful `list()`.
    pub(crate) list_commands: Vec<String>,
    pub(crate) features: Option<FeatureMap>,
    pub(crate) progress: Box<dyn ProgressSink>,
}

impl Default for FtpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl FtpClient {
    /// Create a client with the idle timeout disabled.
    pub fn new() -> Self {
        Self::with_timeout(Duration::ZERO)
    }

    /// Create a client whose control-channel reads are bounded by
    /// `timeout`. Expiry closes the session unconditionally.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            conn: None,
            host: String::new(),
            timeout,
            tls_options: None,
            passive_mode: None,
            list_commands: LIST_COMMANDS.iter().map(|c| c.to_string()).collect(),
            features: None,
            progress: Box::new(NoopProgress),
        }
    }

    /// Install a progress sink for subsequent transfers. Listing
    /// transfers are never reported.
    pub fn track_progress(&mut self, sink: Box<dyn ProgressSink>) {
        self.progress = sink;
    }

    /// Whether the session has been closed, either explicitly or by a
    /// fatal error.
    pub fn is_closed(&self) -> bool {
        self.conn.as_ref().map_or(true, ControlChannel::is_closed)
    }

    /// Close the session. Pending state is dropped and every subsequent
    /// operation fails with a `Closed` error; no further wire I/O occurs.
    pub fn close(&mut self) {
        self.conn = None;
    }

    pub(crate) fn channel(&mut self) -> FtpResult<&mut ControlChannel> {
        match self.conn.as_mut() {
            Some(c) if !c.is_closed() => Ok(c),
            _ => Err(FtpError::closed()),
        }
    }

    /// Mark the session dead after a fatal mid-transfer error.
    pub(crate) fn fail_session(&mut self) {
        if let Some(c) = self.conn.as_mut() {
            c.close();
        }
    }

    // ─── Session lifecycle ───────────────────────────────────────

    /// Open the control connection and await the server welcome (220).
    /// Resets all per-session state: previous socket, captured TLS
    /// options, cached passive mode, listing command, and features.
    pub async fn connect(&mut self, host: &str, port: u16) -> FtpResult<Reply> {
        self.conn = None;
        self.tls_options = None;
        self.passive_mode = None;
        self.list_commands = LIST_COMMANDS.iter().map(|c| c.to_string()).collect();
        self.features = None;
        self.host = host.to_string();

        log::info!("connecting to {}:{}", host, port);
        let (channel, welcome) = connection::open(host, port, self.timeout).await?;
        if !welcome.is_positive_completion() {
            return Err(FtpError::rejected(welcome.code, welcome.text()));
        }
        self.conn = Some(channel);
        Ok(welcome)
    }

    /// Upgrade the control connection to TLS via `AUTH TLS` and capture
    /// the options for data-channel upgrades.
    pub async fn use_tls(&mut self, options: TlsOptions) -> FtpResult<Reply> {
        self.use_tls_with("AUTH TLS", options).await
    }

    /// Like [`use_tls`](Self::use_tls) with a custom upgrade command.
    pub async fn use_tls_with(&mut self, command: &str, options: TlsOptions) -> FtpResult<Reply> {
        let reply = self.channel()?.request(command).await?;
        let channel = self.conn.take().ok_or_else(FtpError::closed)?;
        // A handshake failure leaves the session closed.
        let upgraded = tls::upgrade_control(channel, &self.host, &options).await?;
        self.conn = Some(upgraded);
        self.tls_options = Some(options);
        log::debug!("control connection upgraded to TLS");
        Ok(reply)
    }

    /// Authenticate with USER/PASS. Servers demanding an account (332)
    /// are rejected.
    pub async fn login(&mut self, user: &str, password: &str) -> FtpResult<Reply> {
        let channel = self.channel()?;
        channel.send(&format!("USER {}", user)).await?;
        loop {
            let reply = channel.read_reply().await?;
            if reply.is_positive_preliminary() {
                continue;
            }
            if reply.is_positive_completion() {
                // Logged in without a password.
                return Ok(reply);
            }
            if reply.code == 331 {
                break;
            }
            return Err(FtpError::rejected(reply.code, reply.text()));
        }
        channel.send(&format!("PASS {}", password)).await?;
        loop {
            let reply = channel.read_reply().await?;
            if reply.is_positive_preliminary() {
                continue;
            }
            if reply.is_positive_completion() {
                return Ok(reply);
            }
            return Err(FtpError::rejected(reply.code, reply.text()));
        }
    }

    /// Apply sensible session defaults: binary type, file structure,
    /// UTF-8 paths, an MLSD fact set, and data-channel protection when
    /// the control channel is TLS. Safe to call repeatedly.
    pub async fn use_default_settings(&mut self) -> FtpResult<()> {
        self.send("TYPE I").await?;
        self.send_ignoring_error("STRU F").await?;
        self.send_ignoring_error("OPTS UTF8 ON").await?;
        self.send_ignoring_error(OPTS_MLST).await?;
        if self.tls_options.is_some() {
            self.send("PBSZ 0").await?;
            self.send_ignoring_error("PROT P").await?;
        }
        Ok(())
    }

    /// One-call bootstrap: connect, optionally upgrade to TLS, log in,
    /// and apply default settings. Returns the welcome reply.
    pub async fn access(&mut self, options: AccessOptions) -> FtpResult<Reply> {
        let welcome = self.connect(&options.host, options.port).await?;
        if options.secure {
            self.use_tls(options.secure_options.clone()).await?;
        }
        self.login(&options.user, &options.password).await?;
        self.use_default_settings().await?;
        Ok(welcome)
    }

    // ─── Raw commands ────────────────────────────────────────────

    /// Send a command and await its terminal reply; 2xx resolves,
    /// anything else rejects with a protocol error.
    pub async fn send(&mut self, command: &str) -> FtpResult<Reply> {
        self.channel()?.request(command).await
    }

    /// Send a command, downgrading protocol errors to replies. Transport
    /// and timeout errors still propagate.
    pub async fn send_ignoring_error(&mut self, command: &str) -> FtpResult<Reply> {
        self.channel()?.request_ignoring_error(command).await
    }

    // ─── Path commands ───────────────────────────────────────────

    /// Current working directory, parsed from the quoted PWD reply.
    pub async fn pwd(&mut self) -> FtpResult<String> {
        let reply = self.send("PWD").await?;
        parser::parse_pwd(&reply.text())
    }

    /// Change the working directory.
    pub async fn cd(&mut self, path: &str) -> FtpResult<Reply> {
        let path = self.protect_whitespace(path).await?;
        self.send(&format!("CWD {}", path)).await
    }

    /// Move to the parent directory.
    pub async fn cdup(&mut self) -> FtpResult<Reply> {
        self.send("CDUP").await
    }

    /// Rename (or move) a file or directory.
    pub async fn rename(&mut self, from: &str, to: &str) -> FtpResult<Reply> {
        let from = self.protect_whitespace(from).await?;
        let to = self.protect_whitespace(to).await?;
        self.channel()?
            .request_intermediate(&format!("RNFR {}", from))
            .await?;
        self.send(&format!("RNTO {}", to)).await
    }

    /// Delete a remote file.
    pub async fn remove(&mut self, path: &str) -> FtpResult<Reply> {
        let path = self.protect_whitespace(path).await?;
        self.send(&format!("DELE {}", path)).await
    }

    /// Remove an empty remote directory.
    pub async fn remove_empty_dir(&mut self, path: &str) -> FtpResult<Reply> {
        let path = self.protect_whitespace(path).await?;
        self.send(&format!("RMD {}", path)).await
    }

    /// Size of a remote file in bytes (RFC 3659 SIZE).
    pub async fn size(&mut self, path: &str) -> FtpResult<u64> {
        let path = self.protect_whitespace(path).await?;
        let reply = self.send(&format!("SIZE {}", path)).await?;
        let text = reply.text();
        payload_after_code(&text)?
            .trim()
            .parse::<u64>()
            .map_err(|_| FtpError::parse(format!("cannot parse SIZE reply: {}", text)))
    }

    /// Last modification time of a remote file (RFC 3659 MDTM).
    pub async fn last_mod(&mut self, path: &str) -> FtpResult<DateTime<Utc>> {
        let path = self.protect_whitespace(path).await?;
        let reply = self.send(&format!("MDTM {}", path)).await?;
        let first = reply
            .lines
            .first()
            .ok_or_else(|| FtpError::parse("empty MDTM reply"))?;
        parser::parse_mlsx_date(payload_after_code(first)?.trim())
    }

    // ─── Capability probing ──────────────────────────────────────

    /// Server features advertised by FEAT: command name → parameter
    /// hint. Probed once per session; an unsupported FEAT yields an
    /// empty map.
    pub async fn features(&mut self) -> FtpResult<FeatureMap> {
        if let Some(cached) = &self.features {
            return Ok(cached.clone());
        }
        let reply = self.send_ignoring_error("FEAT").await?;
        let mut map = FeatureMap::new();
        if reply.code == 211 && reply.is_multiline() {
            // Feature lines sit between the opening and closing 211 lines.
            for line in &reply.lines[1..reply.lines.len() - 1] {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match line.split_once(' ') {
                    Some((name, params)) => {
                        map.insert(name.to_uppercase(), params.trim().to_string())
                    }
                    None => map.insert(line.to_uppercase(), String::new()),
                };
            }
        }
        self.features = Some(map.clone());
        Ok(map)
    }

    // ─── Path hygiene ────────────────────────────────────────────

    /// FTP commands are space-delimited, and many servers reject paths
    /// with leading spaces. Such paths are made absolute by prefixing the
    /// current working directory; all others pass through unchanged.
    pub(crate) async fn protect_whitespace(&mut self, path: &str) -> FtpResult<String> {
        if !path.starts_with(' ') {
            return Ok(path.to_string());
        }
        let cwd = self.pwd().await?;
        Ok(join_cwd(&cwd, path))
    }
}

/// Join a leading-space path onto the working directory, inserting a
/// slash only when the directory lacks a trailing one.
fn join_cwd(cwd: &str, path: &str) -> String {
    if cwd.ends_with('/') {
        format!("{}{}", cwd, path)
    } else {
        format!("{}/{}", cwd, path)
    }
}

/// The payload of a single-line reply: everything after "NNN ".
fn payload_after_code(line: &str) -> FtpResult<&str> {
    line.get(4..)
        .ok_or_else(|| FtpError::parse(format!("reply has no payload: {}", line)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_cwd_inserts_slash() {
        assert_eq!(join_cwd("/home/user", " file.txt"), "/home/user/ file.txt");
    }

    #[test]
    fn join_cwd_keeps_existing_slash() {
        assert_eq!(join_cwd("/", " file.txt"), "/ file.txt");
        assert_eq!(join_cwd("/srv/", " a"), "/srv/ a");
    }

    #[test]
    fn payload_extraction() {
        assert_eq!(payload_after_code("213 4096").unwrap(), "4096");
        assert!(payload_after_code("213").is_err());
    }

    #[test]
    fn fresh_client_is_closed() {
        let client = FtpClient::new();
        assert!(client.is_closed());
    }
}
