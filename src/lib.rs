//! # gangway — async FTP/FTPS client
//!
//! A client library for the File Transfer Protocol (RFC 959) and its
//! explicit-TLS variant (RFC 4217), built on tokio. Supports passive-mode
//! transfers (EPSV with PASV fallback), streaming upload/download with
//! progress accounting, download resume via REST, machine-readable listings
//! (MLSD, RFC 3659) with LIST fallback, and recursive directory mirroring.
//!
//! ```no_run
//! use gangway::{AccessOptions, FtpClient};
//!
//! # async fn run() -> gangway::FtpResult<()> {
//! let mut client = FtpClient::new();
//! client
//!     .access(AccessOptions {
//!         host: "ftp.example.com".into(),
//!         user: "demo".into(),
//!         password: "password".into(),
//!         ..Default::default()
//!     })
//!     .await?;
//! for entry in client.list(None).await? {
//!     println!("{}", entry.name);
//! }
//! client.close();
//! # Ok(())
//! # }
//! ```

pub mod ftp;

pub use ftp::client::FtpClient;
pub use ftp::error::{FtpError, FtpErrorKind, FtpResult};
pub use ftp::progress::{NoopProgress, ProgressSink, TransferDirection, TransferInfo};
pub use ftp::types::{
    AccessOptions, DownloadOptions, FeatureMap, FileInfo, FileKind, Reply, TlsOptions,
    UploadOptions,
};
