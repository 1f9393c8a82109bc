//! Service configuration loaded from `CLIPVAULT_*` environment variables

use config::{Config, ConfigError, Environment};
use media::PipelineConfig;
use media::pipeline::DEFAULT_MAX_UPLOAD_BYTES;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

pub const ENV_PREFIX: &str = "CLIPVAULT";

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub port: u16,
    /// Bucket receiving every upload (required)
    pub s3_bucket: String,
    pub s3_region: String,
    /// Endpoint of an S3-compatible provider; unset means AWS
    pub s3_endpoint: Option<String>,
    /// HS256 secret shared with the token issuer (required)
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub max_upload_bytes: u64,
    pub staging_dir: PathBuf,
    pub ffprobe_path: PathBuf,
    pub ffmpeg_path: PathBuf,
    pub tool_timeout_secs: u64,
    pub store_timeout_secs: u64,
    pub playback_url_ttl_secs: u64,
    /// Cron expression (with seconds) for the staging sweeper
    pub sweep_schedule: String,
    pub staging_max_age_secs: u64,
}

impl AppConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(Environment::with_prefix(ENV_PREFIX))
    }

    fn load(environment: Environment) -> Result<Self, ConfigError> {
        let staging_dir = std::env::temp_dir().to_string_lossy().into_owned();

        Config::builder()
            .set_default("port", 3001)?
            .set_default("s3_region", "us-east-1")?
            .set_default("jwt_issuer", "clipvault")?
            .set_default("max_upload_bytes", DEFAULT_MAX_UPLOAD_BYTES)?
            .set_default("staging_dir", staging_dir)?
            .set_default("ffprobe_path", "ffprobe")?
            .set_default("ffmpeg_path", "ffmpeg")?
            .set_default("tool_timeout_secs", 120)?
            .set_default("store_timeout_secs", 600)?
            .set_default("playback_url_ttl_secs", 3600)?
            .set_default("sweep_schedule", "0 */10 * * * *")?
            .set_default("staging_max_age_secs", 3600)?
            .add_source(environment.try_parsing(true))
            .build()?
            .try_deserialize()
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            bucket: self.s3_bucket.clone(),
            staging_dir: self.staging_dir.clone(),
            max_upload_bytes: self.max_upload_bytes,
            tool_timeout: Duration::from_secs(self.tool_timeout_secs),
            store_timeout: Duration::from_secs(self.store_timeout_secs),
        }
    }

    pub fn playback_ttl(&self) -> Duration {
        Duration::from_secs(self.playback_url_ttl_secs)
    }

    pub fn staging_max_age(&self) -> Duration {
        Duration::from_secs(self.staging_max_age_secs)
    }
}
