//! Shared types: server replies, configuration records, listing entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ─── Server replies ──────────────────────────────────────────────────

/// A complete FTP reply: a 3-digit code and every line of the message,
/// including all continuation lines of a multi-line reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    pub code: u16,
    pub lines: Vec<String>,
}

impl Reply {
    /// Full reply text, lines joined with `\n`.
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    /// 1xx — command accepted, a further reply follows.
    pub fn is_positive_preliminary(&self) -> bool {
        (100..200).contains(&self.code)
    }

    /// 2xx — command completed successfully.
    pub fn is_positive_completion(&self) -> bool {
        (200..300).contains(&self.code)
    }

    /// 3xx — command accepted, more input is required (USER→PASS,
    /// RNFR→RNTO, REST→RETR).
    pub fn is_positive_intermediate(&self) -> bool {
        (300..400).contains(&self.code)
    }

    /// 4xx — transient failure, the command may be retried.
    pub fn is_transient_negative(&self) -> bool {
        (400..500).contains(&self.code)
    }

    /// 5xx — permanent failure.
    pub fn is_permanent_negative(&self) -> bool {
        (500..600).contains(&self.code)
    }

    /// Whether the assembled message spans more than one line.
    pub fn is_multiline(&self) -> bool {
        self.lines.len() > 1
    }
}

// ─── Configuration ───────────────────────────────────────────────────

/// TLS parameters for explicit FTPS. Captured by `use_tls` and reused,
/// unchanged, for every data-socket upgrade in the session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TlsOptions {
    /// Server name presented for certificate validation. Defaults to the
    /// host the control connection was opened to.
    pub domain: Option<String>,
    /// Accept self-signed or otherwise untrusted certificates.
    pub accept_invalid_certs: bool,
}

/// Options for [`crate::FtpClient::access`], the one-call session bootstrap.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessOptions {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_user")]
    pub user: String,
    #[serde(default = "default_password")]
    pub password: String,
    /// Upgrade the session to explicit FTPS (AUTH TLS) before login.
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub secure_options: TlsOptions,
}

fn default_host() -> String {
    "localhost".into()
}
fn default_port() -> u16 {
    21
}
fn default_user() -> String {
    "anonymous".into()
}
fn default_password() -> String {
    "guest".into()
}

impl Default for AccessOptions {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            user: default_user(),
            password: default_password(),
            secure: false,
            secure_options: TlsOptions::default(),
        }
    }
}

/// Byte-range selection for uploads.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadOptions {
    /// First byte of the local source to send.
    pub local_start: Option<u64>,
    /// Last byte (inclusive) of the local source to send.
    pub local_end_inclusive: Option<u64>,
}

/// Placement options for downloads.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadOptions {
    /// Remote byte offset to resume from; issues `REST` before `RETR`.
    pub remote_start: u64,
    /// Local byte offset to start writing at. When 0 the local file is
    /// created (or truncated); otherwise it must already exist.
    pub local_start: u64,
}

/// Parsed FEAT advertisement: command name (uppercase) → parameter hint.
pub type FeatureMap = HashMap<String, String>;

// ─── Directory listing ───────────────────────────────────────────────

/// Type of a remote filesystem entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum FileKind {
    File,
    Directory,
    Symlink,
    Unknown,
}

/// One entry from a directory listing (parsed from LIST or MLSD output).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    pub name: String,
    pub kind: FileKind,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
    pub permissions: Option<String>,
    pub owner: Option<String>,
    pub group: Option<String>,
    pub link_target: Option<String>,
    /// MLSD fact map (e.g. "type" → "file", "size" → "1234").
    #[serde(default)]
    pub facts: HashMap<String, String>,
}

impl FileInfo {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FileKind::Unknown,
            size: 0,
            modified: None,
            permissions: None,
            owner: None,
            group: None,
            link_target: None,
            facts: HashMap::new(),
        }
    }

    pub fn is_directory(&self) -> bool {
        self.kind == FileKind::Directory
    }

    pub fn is_file(&self) -> bool {
        self.kind == FileKind::File
    }

    pub fn is_symlink(&self) -> bool {
        self.kind == FileKind::Symlink
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_classification_boundaries() {
        let reply = |code| Reply { code, lines: vec![] };
        assert!(reply(150).is_positive_preliminary());
        assert!(!reply(200).is_positive_preliminary());
        assert!(reply(200).is_positive_completion());
        assert!(reply(299).is_positive_completion());
        assert!(!reply(300).is_positive_completion());
        assert!(reply(350).is_positive_intermediate());
        assert!(reply(421).is_transient_negative());
        assert!(reply(502).is_permanent_negative());
        assert!(!reply(499).is_permanent_negative());
    }

    #[test]
    fn reply_multiline_and_text() {
        let single = Reply {
            code: 220,
            lines: vec!["220 welcome".into()],
        };
        assert!(!single.is_multiline());

        let multi = Reply {
            code: 211,
            lines: vec!["211-Features:".into(), " MLSD".into(), "211 End".into()],
        };
        assert!(multi.is_multiline());
        assert_eq!(multi.text(), "211-Features:\n MLSD\n211 End");
    }

    #[test]
    fn access_options_defaults() {
        let opts = AccessOptions::default();
        assert_eq!(opts.host, "localhost");
        assert_eq!(opts.port, 21);
        assert_eq!(opts.user, "anonymous");
        assert_eq!(opts.password, "guest");
        assert!(!opts.secure);
    }
}
