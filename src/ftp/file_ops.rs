//! File transfers: upload, append, download, and download resume.
//!
//! Every transfer follows the same wire choreography:
//! 1. open a passive data socket (`prepare_transfer`)
//! 2. send the transfer command and wait for the 150/125 preliminary
//! 3. pump bytes on the data socket, reporting progress per chunk
//! 4. close the data socket, then accept the 226/250 completion
//!
//! The operation resolves only after both the data socket has closed and
//! a positive completion has been received. A completion that arrives
//! before pumping starts is buffered and returned after data teardown.
//! Stream errors during pumping are fatal to the session.

use crate::ftp::client::FtpClient;
use crate::ftp::error::{FtpError, FtpResult};
use crate::ftp::progress::{TransferDirection, TransferInfo};
use crate::ftp::transfer;
use crate::ftp::types::{DownloadOptions, Reply, UploadOptions};
use std::io::SeekFrom;
use std::path::Path;
use tokio::fs;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt, AsyncWrite};

impl FtpClient {
    // ─── Stream transfers ────────────────────────────────────────

    /// Upload everything `source` yields to `remote_path` (STOR).
    pub async fn upload_from<R>(&mut self, source: &mut R, remote_path: &str) -> FtpResult<Reply>
    where
        R: AsyncRead + Unpin,
    {
        self.store_from(source, "STOR", remote_path).await
    }

    /// Append everything `source` yields to `remote_path` (APPE).
    pub async fn append_from<R>(&mut self, source: &mut R, remote_path: &str) -> FtpResult<Reply>
    where
        R: AsyncRead + Unpin,
    {
        self.store_from(source, "APPE", remote_path).await
    }

    /// Download `remote_path` into `destination`, optionally resuming at
    /// `remote_start` via REST (RETR).
    pub async fn download_to<W>(
        &mut self,
        destination: &mut W,
        remote_path: &str,
        remote_start: u64,
    ) -> FtpResult<Reply>
    where
        W: AsyncWrite + Unpin,
    {
        let path = self.protect_whitespace(remote_path).await?;
        let mut data = self.prepare_transfer().await?;

        if remote_start > 0 {
            // REST answers 350 and applies to the RETR that follows.
            if let Err(e) = self
                .channel()?
                .request_intermediate(&format!("REST {}", remote_start))
                .await
            {
                drop(data);
                return Err(e);
            }
        }

        let early = match self.begin_transfer(&format!("RETR {}", path)).await {
            Ok(early) => early,
            Err(e) => {
                drop(data);
                return Err(e);
            }
        };

        let info = TransferInfo {
            name: remote_path.to_string(),
            direction: TransferDirection::Download,
        };
        let pumped =
            transfer::pump_download(&mut data, destination, &mut *self.progress, &info).await;
        drop(data);

        match pumped {
            Ok(bytes) => log::debug!("downloaded {} bytes from {}", bytes, remote_path),
            Err(e) => {
                self.fail_session();
                return Err(e);
            }
        }
        self.finish_transfer(early).await
    }

    async fn store_from<R>(
        &mut self,
        source: &mut R,
        command: &str,
        remote_path: &str,
    ) -> FtpResult<Reply>
    where
        R: AsyncRead + Unpin,
    {
        let path = self.protect_whitespace(remote_path).await?;
        let mut data = self.prepare_transfer().await?;

        let early = match self.begin_transfer(&format!("{} {}", command, path)).await {
            Ok(early) => early,
            Err(e) => {
                drop(data);
                return Err(e);
            }
        };

        let info = TransferInfo {
            name: remote_path.to_string(),
            direction: TransferDirection::Upload,
        };
        let pumped = transfer::pump_upload(source, &mut data, &mut *self.progress, &info).await;
        drop(data);

        match pumped {
            Ok(bytes) => log::debug!("uploaded {} bytes to {}", bytes, remote_path),
            Err(e) => {
                self.fail_session();
                return Err(e);
            }
        }
        self.finish_transfer(early).await
    }

    // ─── Path transfers ──────────────────────────────────────────

    /// Upload a local file to `remote_path`, optionally sending only the
    /// byte range selected in `options`.
    pub async fn upload_file(
        &mut self,
        local: impl AsRef<Path>,
        remote_path: &str,
        options: UploadOptions,
    ) -> FtpResult<Reply> {
        self.store_file(local.as_ref(), "STOR", remote_path, options)
            .await
    }

    /// Append a local file to `remote_path`.
    pub async fn append_file(
        &mut self,
        local: impl AsRef<Path>,
        remote_path: &str,
        options: UploadOptions,
    ) -> FtpResult<Reply> {
        self.store_file(local.as_ref(), "APPE", remote_path, options)
            .await
    }

    async fn store_file(
        &mut self,
        local: &Path,
        command: &str,
        remote_path: &str,
        options: UploadOptions,
    ) -> FtpResult<Reply> {
        let mut file = fs::File::open(local).await?;
        let start = options.local_start.unwrap_or(0);
        if start > 0 {
            file.seek(SeekFrom::Start(start)).await?;
        }
        match options.local_end_inclusive {
            Some(end) => {
                let len = end.checked_sub(start).map_or(0, |span| span + 1);
                let mut ranged = file.take(len);
                self.store_from(&mut ranged, command, remote_path).await
            }
            None => self.store_from(&mut file, command, remote_path).await,
        }
    }

    /// Download `remote_path` to a local file. `remote_start` resumes the
    /// remote read via REST; `local_start` positions the local write (the
    /// file must already exist when it is non-zero).
    pub async fn download_file(
        &mut self,
        local: impl AsRef<Path>,
        remote_path: &str,
        options: DownloadOptions,
    ) -> FtpResult<Reply> {
        let local = local.as_ref();
        let mut file = if options.local_start > 0 {
            let mut file = fs::OpenOptions::new().write(true).open(local).await?;
            file.seek(SeekFrom::Start(options.local_start)).await?;
            file
        } else {
            if let Some(parent) = local.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent).await?;
                }
            }
            fs::File::create(local).await?
        };
        self.download_to(&mut file, remote_path, options.remote_start)
            .await
    }

    // ─── Control-side choreography ───────────────────────────────

    /// Send the transfer command and wait for the server to accept it.
    /// Returns `None` once a preliminary (150/125) arrives, or the
    /// buffered reply if the server skipped straight to completion.
    pub(crate) async fn begin_transfer(&mut self, command: &str) -> FtpResult<Option<Reply>> {
        let channel = self.channel()?;
        channel.send(command).await?;
        let reply = channel.read_reply().await?;
        if reply.is_positive_preliminary() {
            return Ok(None);
        }
        if reply.is_positive_completion() {
            return Ok(Some(reply));
        }
        Err(FtpError::rejected(reply.code, reply.text()))
    }

    /// Accept the completion reply once the data socket has been closed.
    /// `early` is a completion buffered by [`begin_transfer`].
    pub(crate) async fn finish_transfer(&mut self, early: Option<Reply>) -> FtpResult<Reply> {
        if let Some(reply) = early {
            return Ok(reply);
        }
        let channel = self.channel()?;
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
}
