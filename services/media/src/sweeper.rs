use crate::staging::STAGING_PREFIX;
use anyhow::Result;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};

/// Default age after which a leftover staging file is considered abandoned
pub const DEFAULT_STAGING_MAX_AGE: Duration = Duration::from_secs(60 * 60);

/// Removes staging files left behind by a crashed process.
///
/// Only names starting with the staging prefix are considered, so the sweeper
/// is safe to point at a shared temp directory. Request-scoped guards remain
/// the primary cleanup path; this only catches what a hard kill leaves behind.
#[derive(Debug, Clone)]
pub struct StagingSweeper {
    staging_dir: PathBuf,
    max_age: Duration,
}

impl StagingSweeper {
    pub fn new(staging_dir: impl Into<PathBuf>, max_age: Duration) -> Self {
        Self {
            staging_dir: staging_dir.into(),
            max_age,
        }
    }

    /// Delete every stale staging file once and return how many were removed
    pub async fn sweep_once(&self) -> Result<usize> {
        let now = SystemTime::now();
        let mut removed = 0;
        let mut entries = tokio::fs::read_dir(&self.staging_dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            if !entry
                .file_name()
                .to_string_lossy()
                .starts_with(STAGING_PREFIX)
            {
                continue;
            }

            let metadata = match entry.metadata().await {
                Ok(metadata) => metadata,
                Err(e) => {
                    warn!("Failed to stat {}: {}", entry.path().display(), e);
                    continue;
                }
            };
            if !metadata.is_file() {
                continue;
            }

            let age = metadata
                .modified()
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .unwrap_or_default();
            if age < self.max_age {
                continue;
            }

            match tokio::fs::remove_file(entry.path()).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to remove stale staging file {}: {}", entry.path().display(), e),
            }
        }

        if removed > 0 {
            info!(
                staging_dir = %self.staging_dir.display(),
                removed,
                "Removed stale staging files"
            );
        }

        Ok(removed)
    }

    /// Run [`Self::sweep_once`] on a cron `schedule`. The returned scheduler must be kept alive.
    pub async fn start(self, schedule: &str) -> Result<JobScheduler> {
        let sweeper = Arc::new(self);
        let scheduler = JobScheduler::new().await?;

        let job = Job::new_async(schedule, move |_, _| {
            let sweeper = sweeper.clone();
            Box::pin(async move {
                if let Err(e) = sweeper.sweep_once().await {
                    error!("Staging sweep failed: {}", e);
                }
            })
        })?;

        scheduler.add(job).await?;
        scheduler.start().await?;

        info!("Started staging sweeper with schedule: {}", schedule);
        Ok(scheduler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &std::path::Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, b"leftover").unwrap();
        path
    }

    #[tokio::test]
    async fn removes_only_prefixed_files_past_max_age() {
        let dir = tempfile::tempdir().unwrap();
        let staged = touch(dir.path(), "clipvault-upload-abc.mp4");
        let remuxed = touch(dir.path(), "clipvault-upload-abc.mp4.processing");
        let foreign = touch(dir.path(), "someone-elses.tmp");
        std::fs::create_dir(dir.path().join("clipvault-upload-dir")).unwrap();

        let removed = StagingSweeper::new(dir.path(), Duration::ZERO)
            .sweep_once()
            .await
            .unwrap();

        assert_eq!(removed, 2);
        assert!(!staged.exists());
        assert!(!remuxed.exists());
        assert!(foreign.exists());
        assert!(dir.path().join("clipvault-upload-dir").exists());
    }

    #[tokio::test]
    async fn keeps_fresh_files() {
        let dir = tempfile::tempdir().unwrap();
        let staged = touch(dir.path(), "clipvault-upload-fresh.mp4");

        let removed = StagingSweeper::new(dir.path(), DEFAULT_STAGING_MAX_AGE)
            .sweep_once()
            .await
            .unwrap();

        assert_eq!(removed, 0);
        assert!(staged.exists());
    }

    #[tokio::test]
    async fn missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = StagingSweeper::new(dir.path().join("gone"), Duration::ZERO)
            .sweep_once()
            .await;
        assert!(result.is_err());
    }
}
