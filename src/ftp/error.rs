//! FTP-specific error type.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Categorised FTP error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FtpError {
    pub kind: FtpErrorKind,
    pub message: String,
    /// FTP reply code that triggered the error, if any.
    pub code: Option<u16>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum FtpErrorKind {
    /// Server answered a command with a 4xx/5xx reply. The session stays
    /// usable.
    Protocol,
    /// TCP connect, DNS, or mid-session socket failure. Fatal to the
    /// session.
    Transport,
    /// TLS handshake failure on the control or data channel. Fatal to the
    /// session.
    Tls,
    /// The idle timeout expired while waiting on the control channel.
    /// Fatal to the session.
    Timeout,
    /// A reply payload could not be interpreted (e.g. SIZE returned
    /// non-numeric). Only the single operation fails.
    Parse,
    /// Operation attempted after `close()` or after a fatal error tore the
    /// session down.
    Closed,
}

pub type FtpResult<T> = Result<T, FtpError>;

// ── Construction helpers ─────────────────────────────────────────────

impl FtpError {
    pub fn new(kind: FtpErrorKind, msg: impl Into<String>) -> Self {
        Self {
            kind,
            message: msg.into(),
            code: None,
        }
    }

    /// Server rejected a command with the given reply.
    pub fn rejected(code: u16, msg: impl Into<String>) -> Self {
        Self {
            kind: FtpErrorKind::Protocol,
            message: msg.into(),
            code: Some(code),
        }
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::Transport, msg)
    }

    pub fn tls(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::Tls, msg)
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::Timeout, msg)
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::Parse, msg)
    }

    pub fn closed() -> Self {
        Self::new(FtpErrorKind::Closed, "client is closed")
    }

    /// Whether this error tears the session down. Protocol and parse
    /// errors leave the session usable; everything transport-shaped does
    /// not.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind,
            FtpErrorKind::Transport | FtpErrorKind::Tls | FtpErrorKind::Timeout
        )
    }

    /// A 5xx rejection, used by probe sequences to fall through to the
    /// next candidate command.
    pub fn is_permanent_rejection(&self) -> bool {
        self.kind == FtpErrorKind::Protocol && self.code.map_or(false, |c| c >= 500)
    }
}

impl fmt::Display for FtpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(code) = self.code {
            write!(f, "[FTP {:?} {}] {}", self.kind, code, self.message)
        } else {
            write!(f, "[FTP {:?}] {}", self.kind, self.message)
        }
    }
}

impl std::error::Error for FtpError {}

impl From<std::io::Error> for FtpError {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::TimedOut {
            Self::timeout(e.to_string())
        } else {
            Self::transport(e.to_string())
        }
    }
}

impl From<native_tls::Error> for FtpError {
    fn from(e: native_tls::Error) -> Self {
        Self::tls(e.to_string())
    }
}
