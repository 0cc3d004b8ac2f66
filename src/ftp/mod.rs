//! FTP/FTPS client implementation.
//!
//! Protocol coverage: RFC 959 (core), RFC 2389 (FEAT), RFC 2428 (EPSV),
//! RFC 3659 (MLSD, SIZE, MDTM, REST STREAM), RFC 4217 (AUTH TLS /
//! PBSZ / PROT). Passive mode only; active-mode (PORT/EPRT) transfers and
//! implicit FTPS are out of scope.
//!
//! Architecture:
//! - `types` — replies, configuration records, listing entries
//! - `error` — kind-tagged error type
//! - `protocol` — control-channel codec: framing, request/reply, timeouts
//! - `connection` — TCP establishment of the control connection
//! - `tls` — explicit-FTPS upgrade for control and data sockets
//! - `transfer` — passive data channel setup and byte pumping
//! - `client` — the session facade (connect, login, path commands)
//! - `file_ops` — upload, append, download, resume
//! - `directory` — listings and recursive tree operations
//! - `parser` — LIST/MLSD output and MLSx timestamp parsing
//! - `progress` — transfer progress reporting hooks

pub mod client;
pub mod connection;
pub mod directory;
pub mod error;
pub mod file_ops;
pub mod parser;
pub mod progress;
pub mod protocol;
pub mod tls;
pub mod transfer;
pub mod types;

pub use client::FtpClient;
pub use error::{FtpError, FtpErrorKind, FtpResult};
pub use progress::{NoopProgress, ProgressSink, TransferDirection, TransferInfo};
pub use types::{
    AccessOptions, DownloadOptions, FeatureMap, FileInfo, FileKind, Reply, TlsOptions,
    UploadOptions,
};
