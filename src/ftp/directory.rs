//! Directory listings and recursive tree operations.

use crate::ftp::client::FtpClient;
use crate::ftp::error::{FtpError, FtpResult};
use crate::ftp::parser;
use crate::ftp::progress::{NoopProgress, TransferDirection, TransferInfo};
use crate::ftp::transfer;
use crate::ftp::types::{DownloadOptions, FileInfo, UploadOptions};
use std::path::Path;
use tokio::fs;

impl FtpClient {
    // ─── Listing ─────────────────────────────────────────────────

    /// List a remote directory (the working directory when `path` is
    /// `None`).
    ///
    /// The first call probes `MLSD`, `LIST -a`, and `LIST` in order; a
    /// 5xx rejection falls through to the next candidate, and the first
    /// command the server accepts becomes the only one used for the rest
    /// of the session.
    pub async fn list(&mut self, path: Option<&str>) -> FtpResult<Vec<FileInfo>> {
        let arg = match path {
            Some(p) if !p.is_empty() => Some(self.protect_whitespace(p).await?),
            _ => None,
        };
        let candidates = self.list_commands.clone();
        let mut last_rejection = None;
        for command in &candidates {
            let full = match &arg {
                Some(p) => format!("{} {}", command, p),
                None => command.clone(),
            };
            match self.retrieve_listing(&full).await {
                Ok(text) => {
                    self.list_commands = vec![command.clone()];
                    return Ok(parser::parse(&text));
                }
                Err(e) if e.is_permanent_rejection() => last_rejection = Some(e),
                Err(e) => return Err(e),
            }
        }
        Err(last_rejection
            .unwrap_or_else(|| FtpError::rejected(500, "no listing command accepted")))
    }

    /// Run a listing command over a data connection and collect the raw
    /// body. Listing bytes never reach the progress sink.
    async fn retrieve_listing(&mut self, command: &str) -> FtpResult<String> {
        let mut data = self.prepare_transfer().await?;
        let early = match self.begin_transfer(command).await {
            Ok(early) => early,
            Err(e) => {
                drop(data);
                return Err(e);
            }
        };

        let mut body: Vec<u8> = Vec::new();
        let info = TransferInfo {
            name: command.to_string(),
            direction: TransferDirection::Download,
        };
        let mut sink = NoopProgress;
        let pumped = transfer::pump_download(&mut data, &mut body, &mut sink, &info).await;
        drop(data);

        if let Err(e) = pumped {
            self.fail_session();
            return Err(e);
        }
        self.finish_transfer(early).await?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    // ─── Remote tree operations ──────────────────────────────────

    /// Make sure `path` exists, creating missing components, and change
    /// into it. An absolute path walks from the root.
    pub async fn ensure_dir(&mut self, path: &str) -> FtpResult<()> {
        if path.starts_with('/') {
            self.cd("/").await?;
        }
        for part in path.split('/').filter(|p| !p.is_empty()) {
            // MKD fails harmlessly when the component already exists.
            self.send_ignoring_error(&format!("MKD {}", part)).await?;
            self.cd(part).await?;
        }
        Ok(())
    }

    /// Remove a directory and everything in it.
    pub async fn remove_dir(&mut self, path: &str) -> FtpResult<()> {
        self.cd(path).await?;
        self.clear_working_dir().await?;
        let cwd = self.pwd().await?;
        if cwd != "/" {
            self.cdup().await?;
            self.remove_empty_dir(&cwd).await?;
        }
        Ok(())
    }

    /// Delete every file and directory inside the working directory,
    /// which itself is left in place.
    pub async fn clear_working_dir(&mut self) -> FtpResult<()> {
        for entry in self.list(None).await? {
            if entry.is_directory() {
                self.cd(&entry.name).await?;
                Box::pin(self.clear_working_dir()).await?;
                self.cdup().await?;
                self.remove_empty_dir(&entry.name).await?;
            } else {
                self.remove(&entry.name).await?;
            }
        }
        Ok(())
    }

    // ─── Mirroring ───────────────────────────────────────────────

    /// Upload the contents of a local directory. With a `remote` target
    /// the directory is created as needed and the working directory is
    /// restored afterwards; otherwise the mirror lands in the current
    /// working directory.
    pub async fn upload_dir(
        &mut self,
        local: impl AsRef<Path>,
        remote: Option<&str>,
    ) -> FtpResult<()> {
        match remote {
            Some(remote_dir) => {
                let original = self.pwd().await?;
                self.ensure_dir(remote_dir).await?;
                self.upload_dir_contents(local.as_ref()).await?;
                self.cd(&original).await?;
                Ok(())
            }
            None => self.upload_dir_contents(local.as_ref()).await,
        }
    }

    async fn upload_dir_contents(&mut self, local: &Path) -> FtpResult<()> {
        let mut entries = fs::read_dir(local).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            let file_type = entry.file_type().await?;
            if file_type.is_dir() {
                self.send_ignoring_error(&format!("MKD {}", name)).await?;
                self.cd(&name).await?;
                Box::pin(self.upload_dir_contents(&entry.path())).await?;
                self.cdup().await?;
            } else if file_type.is_file() {
                self.upload_file(entry.path(), &name, UploadOptions::default())
                    .await?;
            }
        }
        Ok(())
    }

    /// Download the remote working directory into a local directory,
    /// created if missing.
    pub async fn download_dir(&mut self, local: impl AsRef<Path>) -> FtpResult<()> {
        let local = local.as_ref();
        fs::create_dir_all(local).await?;
        self.download_dir_contents(local).await
    }

    async fn download_dir_contents(&mut self, local: &Path) -> FtpResult<()> {
        for entry in self.list(None).await? {
            let target = local.join(&entry.name);
            if entry.is_directory() {
                fs::create_dir_all(&target).await?;
                self.cd(&entry.name).await?;
                Box::pin(self.download_dir_contents(&target)).await?;
                self.cdup().await?;
            } else if entry.is_file() {
                self.download_file(&target, &entry.name, DownloadOptions::default())
                    .await?;
            }
        }
        Ok(())
    }
}
