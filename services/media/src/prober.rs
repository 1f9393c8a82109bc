use crate::models::VideoGeometry;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use thiserror::Error;
use tokio::process::Command;
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("failed to spawn ffprobe: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("ffprobe exited with {status}: {stderr}")]
    Failed { status: ExitStatus, stderr: String },

    #[error("ffprobe output is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("ffprobe reported no streams")]
    NoStreams,
}

/// Reads stream geometry from a local media file
#[async_trait]
pub trait MediaProber: Send + Sync {
    async fn probe(&self, path: &Path) -> Result<VideoGeometry, ProbeError>;
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
}

/// Prober backed by the `ffprobe` binary
#[derive(Debug, Clone)]
pub struct FfprobeProber {
    binary: PathBuf,
}

impl FfprobeProber {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Extract the first stream's geometry from ffprobe's JSON output.
    ///
    /// Streams without dimensions (audio, data) report 0x0, which classifies as "other".
    pub fn parse_output(stdout: &[u8]) -> Result<VideoGeometry, ProbeError> {
        let output: ProbeOutput = serde_json::from_slice(stdout)?;

        let first = output.streams.first().ok_or(ProbeError::NoStreams)?;
        Ok(VideoGeometry {
            width: first.width.unwrap_or_default(),
            height: first.height.unwrap_or_default(),
        })
    }
}

impl Default for FfprobeProber {
    fn default() -> Self {
        Self::new("ffprobe")
    }
}

#[async_trait]
impl MediaProber for FfprobeProber {
    async fn probe(&self, path: &Path) -> Result<VideoGeometry, ProbeError> {
        info!("Probing stream geometry of {}", path.display());

        let output = Command::new(&self.binary)
            .args(["-v", "error", "-print_format", "json", "-show_streams"])
            .arg(path)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(ProbeError::Spawn)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            error!("ffprobe failed with status: {:?}", output.status);
            return Err(ProbeError::Failed {
                status: output.status,
                stderr,
            });
        }

        Self::parse_output(&output.stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AspectClass;

    #[test]
    fn parses_first_stream_geometry() {
        let stdout = br#"{
            "streams": [
                {"index": 0, "codec_type": "video", "width": 1920, "height": 1080},
                {"index": 1, "codec_type": "video", "width": 640, "height": 480}
            ]
        }"#;

        let geometry = FfprobeProber::parse_output(stdout).unwrap();
        assert_eq!(
            geometry,
            VideoGeometry {
                width: 1920,
                height: 1080
            }
        );
    }

    #[test]
    fn empty_stream_list_is_an_error() {
        let result = FfprobeProber::parse_output(br#"{"streams": []}"#);
        assert!(matches!(result, Err(ProbeError::NoStreams)));

        let result = FfprobeProber::parse_output(br#"{}"#);
        assert!(matches!(result, Err(ProbeError::NoStreams)));
    }

    #[test]
    fn garbage_output_is_a_parse_error() {
        let result = FfprobeProber::parse_output(b"not json at all");
        assert!(matches!(result, Err(ProbeError::Parse(_))));
    }

    #[test]
    fn audio_first_stream_classifies_as_other() {
        let stdout = br#"{"streams": [
            {"codec_type": "audio", "sample_rate": "48000"},
            {"codec_type": "video", "width": 1920, "height": 1080}
        ]}"#;
        let geometry = FfprobeProber::parse_output(stdout).unwrap();
        assert_eq!(
            geometry,
            VideoGeometry {
                width: 0,
                height: 0
            }
        );
        assert_eq!(geometry.aspect_class(), AspectClass::Other);

        let stdout = br#"{"streams": [{"width": 0, "height": 1080}]}"#;
        let geometry = FfprobeProber::parse_output(stdout).unwrap();
        assert_eq!(geometry.aspect_class(), AspectClass::Other);
    }

    #[tokio::test]
    async fn missing_binary_is_a_spawn_error() {
        let prober = FfprobeProber::new("/nonexistent/clipvault-ffprobe");
        let result = prober.probe(Path::new("/tmp/whatever.mp4")).await;
        assert!(matches!(result, Err(ProbeError::Spawn(_))));
    }
}
