use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use thiserror::Error;
use tokio::process::Command;
use tracing::{error, info};

/// Suffix appended to the source path to name the remuxed output
pub const PROCESSING_SUFFIX: &str = ".processing";

#[derive(Debug, Error)]
pub enum RemuxError {
    #[error("failed to spawn ffmpeg: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("ffmpeg exited with {status}: {stderr}")]
    Failed { status: ExitStatus, stderr: String },
}

/// Rewrites a container so its index precedes the media data
#[async_trait]
pub trait Remuxer: Send + Sync {
    /// Remux `source` into a new file and return its path. The source is left untouched.
    async fn remux(&self, source: &Path) -> Result<PathBuf, RemuxError>;
}

/// Path of the derived file for a given source: `<source>.processing`
pub fn processing_path(source: &Path) -> PathBuf {
    let mut name = OsString::from(source.as_os_str());
    name.push(PROCESSING_SUFFIX);
    PathBuf::from(name)
}

/// Fast-start remuxer backed by the `ffmpeg` binary
#[derive(Debug, Clone)]
pub struct FfmpegRemuxer {
    binary: PathBuf,
}

impl FfmpegRemuxer {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn arguments(source: &Path, output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["-i".into(), source.into()];
        args.extend(
            ["-c", "copy", "-movflags", "faststart", "-f", "mp4"]
                .into_iter()
                .map(OsString::from),
        );
        args.push(output.into());
        args
    }
}

impl Default for FfmpegRemuxer {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

#[async_trait]
impl Remuxer for FfmpegRemuxer {
    async fn remux(&self, source: &Path) -> Result<PathBuf, RemuxError> {
        let output_path = processing_path(source);
        info!(
            "Remuxing {} for fast start into {}",
            source.display(),
            output_path.display()
        );

        let output = Command::new(&self.binary)
            .args(Self::arguments(source, &output_path))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(RemuxError::Spawn)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            error!("ffmpeg failed with status: {:?}", output.status);
            return Err(RemuxError::Failed {
                status: output.status,
                stderr,
            });
        }

        Ok(output_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn processing_path_appends_suffix() {
        let derived = processing_path(Path::new("/tmp/clipvault-upload-abc.mp4"));
        assert_eq!(
            derived,
            PathBuf::from("/tmp/clipvault-upload-abc.mp4.processing")
        );
    }

    #[test]
    fn arguments_request_stream_copy_and_faststart() {
        let args = FfmpegRemuxer::arguments(Path::new("in.mp4"), Path::new("in.mp4.processing"));
        let args: Vec<String> = args
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();

        assert_eq!(
            args,
            [
                "-i",
                "in.mp4",
                "-c",
                "copy",
                "-movflags",
                "faststart",
                "-f",
                "mp4",
                "in.mp4.processing"
            ]
        );
    }

    #[tokio::test]
    async fn missing_binary_is_a_spawn_error() {
        let remuxer = FfmpegRemuxer::new("/nonexistent/clipvault-ffmpeg");
        let result = remuxer.remux(Path::new("/tmp/whatever.mp4")).await;
        assert!(matches!(result, Err(RemuxError::Spawn(_))));
    }
}
