//! Local staging of inbound uploads.
//!
//! Every file created on behalf of a request is owned by a guard that
//! removes it when dropped, so cleanup happens on success, on error and when
//! the request future is cancelled.

use std::io;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tracing::warn;

/// Name prefix of every staged upload; the sweeper only touches files carrying it
pub const STAGING_PREFIX: &str = "clipvault-upload-";

#[derive(Debug, Error)]
pub enum StagingError {
    #[error("failed to create staging file in {dir}: {source}")]
    Create {
        dir: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write upload to staging file: {0}")]
    Write(#[source] io::Error),

    #[error("upload exceeds the {limit} byte limit")]
    TooLarge { limit: u64 },
}

/// The raw uploaded bytes, held in an exclusively owned temporary file
#[derive(Debug)]
pub struct StagedFile {
    file: NamedTempFile,
    len: u64,
}

impl StagedFile {
    /// Copy `body` into a new temp file under `dir`, rejecting bodies larger than `limit`.
    ///
    /// The partially written file is removed before an error is returned.
    pub async fn stage<R>(dir: &Path, body: R, limit: u64) -> Result<Self, StagingError>
    where
        R: AsyncRead + Send,
    {
        let file = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .suffix(".mp4")
            .tempfile_in(dir)
            .map_err(|source| StagingError::Create {
                dir: dir.to_path_buf(),
                source,
            })?;

        let handle = file.as_file().try_clone().map_err(StagingError::Write)?;
        let mut writer = tokio::fs::File::from_std(handle);

        tokio::pin!(body);
        // One byte past the limit is enough to tell an oversized body apart
        let mut limited = body.take(limit.saturating_add(1));
        let len = tokio::io::copy(&mut limited, &mut writer)
            .await
            .map_err(StagingError::Write)?;

        if len > limit {
            return Err(StagingError::TooLarge { limit });
        }

        writer.flush().await.map_err(StagingError::Write)?;
        writer.sync_all().await.map_err(StagingError::Write)?;

        Ok(Self { file, len })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// A derived local file that must not outlive the request that produced it
#[derive(Debug)]
pub struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    /// Take ownership of `path`, which may or may not exist yet
    pub fn claim(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove scratch file {}: {}", self.path.display(), e),
        }
    }
}
