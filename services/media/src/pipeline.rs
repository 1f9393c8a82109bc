//! Upload orchestration: authorize → stage → probe → remux → upload → record → sign.
//!
//! Each request runs the stages strictly in order. Local files are owned by
//! drop guards declared in [`UploadOrchestrator::upload_video`], so the staged
//! upload and its remuxed sibling are removed on every exit path.

use crate::database::{VideoStore, VideoStoreError};
use crate::models::{StoredObjectRef, VideoRecord};
use crate::object_store::{ObjectStore, SignError, StoreError};
use crate::playback::PlaybackSigner;
use crate::prober::{MediaProber, ProbeError};
use crate::remuxer::{RemuxError, Remuxer, processing_path};
use crate::staging::{ScratchFile, StagedFile, StagingError};
use crate::storage_key::{KeyError, StorageKey, extension_for};
use chrono::Utc;
use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncRead;
use tracing::{info, warn};
use uuid::Uuid;

/// The only media type accepted for upload
pub const ACCEPTED_MEDIA_TYPE: &str = "video/mp4";

/// Default ceiling on an upload body (1 GiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 1 << 30;

/// Step of the pipeline an error was raised in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStage {
    Authorizing,
    Validating,
    Staging,
    Probing,
    Remuxing,
    Uploading,
    Recording,
    Signing,
}

impl fmt::Display for UploadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UploadStage::Authorizing => "authorizing",
            UploadStage::Validating => "validating",
            UploadStage::Staging => "staging",
            UploadStage::Probing => "probing",
            UploadStage::Remuxing => "remuxing",
            UploadStage::Uploading => "uploading",
            UploadStage::Recording => "recording",
            UploadStage::Signing => "signing",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("video {0} not found")]
    VideoNotFound(Uuid),

    #[error("user {user_id} does not own video {video_id}")]
    NotOwner { video_id: Uuid, user_id: Uuid },

    #[error("unsupported media type {0:?}, only video/mp4 is accepted")]
    UnsupportedMediaType(String),

    #[error("failed to look up video: {0}")]
    Lookup(#[source] VideoStoreError),

    #[error(transparent)]
    Staging(#[from] StagingError),

    #[error(transparent)]
    Probe(#[from] ProbeError),

    #[error(transparent)]
    Remux(#[from] RemuxError),

    #[error(transparent)]
    Key(#[from] KeyError),

    #[error("failed to open remuxed file: {0}")]
    OpenRemuxed(#[source] std::io::Error),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to record upload: {0}")]
    Persist(#[source] VideoStoreError),

    #[error(transparent)]
    Sign(#[from] SignError),

    #[error("{0} timed out after {1:?}")]
    Timeout(UploadStage, Duration),
}

impl UploadError {
    pub fn stage(&self) -> UploadStage {
        match self {
            UploadError::VideoNotFound(_)
            | UploadError::NotOwner { .. }
            | UploadError::Lookup(_) => UploadStage::Authorizing,
            UploadError::UnsupportedMediaType(_) => UploadStage::Validating,
            UploadError::Staging(_) => UploadStage::Staging,
            UploadError::Probe(_) => UploadStage::Probing,
            UploadError::Remux(_) | UploadError::Key(_) => UploadStage::Remuxing,
            UploadError::OpenRemuxed(_) | UploadError::Store(_) => UploadStage::Uploading,
            UploadError::Persist(_) => UploadStage::Recording,
            UploadError::Sign(_) => UploadStage::Signing,
            UploadError::Timeout(stage, _) => *stage,
        }
    }
}

/// Immutable settings threaded into the orchestrator at construction
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Bucket every upload is written to
    pub bucket: String,
    /// Directory holding staged uploads and their remuxed siblings
    pub staging_dir: PathBuf,
    /// Largest accepted upload body in bytes
    pub max_upload_bytes: u64,
    /// Deadline for each prober and remuxer invocation
    pub tool_timeout: Duration,
    /// Deadline for each object-store put and metadata-store call
    pub store_timeout: Duration,
}

impl PipelineConfig {
    pub fn new(bucket: impl Into<String>, staging_dir: impl Into<PathBuf>) -> Self {
        Self {
            bucket: bucket.into(),
            staging_dir: staging_dir.into(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            tool_timeout: Duration::from_secs(120),
            store_timeout: Duration::from_secs(600),
        }
    }
}

/// One inbound upload, already authenticated by the caller
pub struct UploadRequest<R> {
    pub video_id: Uuid,
    pub user_id: Uuid,
    pub content_type: String,
    pub body: R,
}

/// Check the declared content type, ignoring parameters such as `codecs=`
pub fn accepted_media_type(content_type: &str) -> Result<&'static str, UploadError> {
    let essence = content_type.split(';').next().unwrap_or_default().trim();
    if essence.eq_ignore_ascii_case(ACCEPTED_MEDIA_TYPE) {
        Ok(ACCEPTED_MEDIA_TYPE)
    } else {
        Err(UploadError::UnsupportedMediaType(content_type.to_string()))
    }
}

async fn bounded<F>(stage: UploadStage, limit: Duration, future: F) -> Result<F::Output, UploadError>
where
    F: Future,
{
    tokio::time::timeout(limit, future)
        .await
        .map_err(|_| UploadError::Timeout(stage, limit))
}

/// Sequences the upload pipeline for a single request
pub struct UploadOrchestrator {
    config: PipelineConfig,
    prober: Arc<dyn MediaProber>,
    remuxer: Arc<dyn Remuxer>,
    store: Arc<dyn ObjectStore>,
    videos: Arc<dyn VideoStore>,
    signer: PlaybackSigner,
}

impl UploadOrchestrator {
    pub fn new(
        config: PipelineConfig,
        prober: Arc<dyn MediaProber>,
        remuxer: Arc<dyn Remuxer>,
        store: Arc<dyn ObjectStore>,
        videos: Arc<dyn VideoStore>,
        signer: PlaybackSigner,
    ) -> Self {
        Self {
            config,
            prober,
            remuxer,
            store,
            videos,
            signer,
        }
    }

    /// Run the full pipeline and return the updated record with a signed playback URL.
    ///
    /// Ownership and content type are checked before anything touches local
    /// storage. The persisted record keeps the unsigned `bucket,key` reference.
    pub async fn upload_video<R>(&self, request: UploadRequest<R>) -> Result<VideoRecord, UploadError>
    where
        R: AsyncRead + Send,
    {
        let UploadRequest {
            video_id,
            user_id,
            content_type,
            body,
        } = request;
        info!(video_id = %video_id, user_id = %user_id, "Uploading video");

        let mut video = self.authorize(video_id, user_id).await?;
        let media_type = accepted_media_type(&content_type)?;
        let extension = extension_for(media_type)?;

        let staged = StagedFile::stage(&self.config.staging_dir, body, self.config.max_upload_bytes)
            .await?;
        info!(video_id = %video_id, bytes = staged.len(), "Upload staged");

        let geometry = bounded(
            UploadStage::Probing,
            self.config.tool_timeout,
            self.prober.probe(staged.path()),
        )
        .await??;
        let aspect = geometry.aspect_class();
        info!(
            video_id = %video_id,
            width = geometry.width,
            height = geometry.height,
            aspect = %aspect,
            "Upload probed"
        );

        // Claimed before the remuxer runs so a partial output is removed too
        let remuxed = ScratchFile::claim(processing_path(staged.path()));
        let remuxed_path = bounded(
            UploadStage::Remuxing,
            self.config.tool_timeout,
            self.remuxer.remux(staged.path()),
        )
        .await??;
        let _relocated = (remuxed_path != remuxed.path()).then(|| ScratchFile::claim(&remuxed_path));
        let key = StorageKey::derive(aspect, &extension)?;

        let file = tokio::fs::File::open(&remuxed_path)
            .await
            .map_err(UploadError::OpenRemuxed)?;
        bounded(
            UploadStage::Uploading,
            self.config.store_timeout,
            self.store
                .put_object(&self.config.bucket, key.as_str(), media_type, file),
        )
        .await??;
        info!(video_id = %video_id, bucket = %self.config.bucket, key = %key, "Upload stored");

        let reference = StoredObjectRef::new(self.config.bucket.clone(), key.into_string());
        video.video_url = Some(reference.to_string());
        video.updated_at = Utc::now();

        let recorded = bounded(
            UploadStage::Recording,
            self.config.store_timeout,
            self.videos.update_video(&video),
        )
        .await
        .and_then(|result| result.map_err(UploadError::Persist));
        if let Err(e) = recorded {
            warn!(
                video_id = %video_id,
                bucket = %reference.bucket,
                key = %reference.key,
                error = %e,
                "Stored object is orphaned: video record was not updated"
            );
            return Err(e);
        }

        let signed = self.signer.sign(video).await?;
        info!(video_id = %video_id, "Video upload complete");
        Ok(signed)
    }

    async fn authorize(&self, video_id: Uuid, user_id: Uuid) -> Result<VideoRecord, UploadError> {
        let video = bounded(
            UploadStage::Authorizing,
            self.config.store_timeout,
            self.videos.get_video(video_id),
        )
        .await?
        .map_err(UploadError::Lookup)?
        .ok_or(UploadError::VideoNotFound(video_id))?;

        if video.user_id != user_id {
            warn!(video_id = %video_id, user_id = %user_id, "Upload rejected: caller is not the owner");
            return Err(UploadError::NotOwner { video_id, user_id });
        }

        Ok(video)
    }
}
