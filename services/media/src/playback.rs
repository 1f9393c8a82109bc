use crate::models::VideoRecord;
use crate::object_store::{ObjectStore, SignError};
use std::sync::Arc;
use std::time::Duration;

/// Default lifetime of a playback URL
pub const DEFAULT_PLAYBACK_TTL: Duration = Duration::from_secs(60 * 60);

/// Presents stored `bucket,key` references as short-lived signed URLs.
///
/// Signing happens on every read; the signed form is never persisted.
#[derive(Clone)]
pub struct PlaybackSigner {
    store: Arc<dyn ObjectStore>,
    ttl: Duration,
}

impl PlaybackSigner {
    pub fn new(store: Arc<dyn ObjectStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Replace the record's stored reference with a presigned URL.
    ///
    /// Records without a `bucket,key` reference are returned unchanged.
    pub async fn sign(&self, mut video: VideoRecord) -> Result<VideoRecord, SignError> {
        let Some(reference) = video.stored_object() else {
            return Ok(video);
        };

        let url = self
            .store
            .presign_get(&reference.bucket, &reference.key, self.ttl)
            .await?;
        video.video_url = Some(url);
        Ok(video)
    }

    pub async fn sign_all(&self, videos: Vec<VideoRecord>) -> Result<Vec<VideoRecord>, SignError> {
        let mut signed = Vec::with_capacity(videos.len());
        for video in videos {
            signed.push(self.sign(video).await?);
        }
        Ok(signed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryObjectStore;
    use uuid::Uuid;

    fn signer(store: Arc<MemoryObjectStore>) -> PlaybackSigner {
        PlaybackSigner::new(store, DEFAULT_PLAYBACK_TTL)
    }

    #[tokio::test]
    async fn signs_stored_reference() {
        let store = Arc::new(MemoryObjectStore::new());
        let mut video = VideoRecord::draft(Uuid::new_v4(), "clip", None);
        video.video_url = Some("clips,portrait/abc.mp4".to_string());

        let signed = signer(store).sign(video.clone()).await.unwrap();
        assert_eq!(
            signed.video_url.as_deref(),
            Some("https://clips.store.test/portrait/abc.mp4?expires=3600")
        );
        assert_eq!(signed.id, video.id);
    }

    #[tokio::test]
    async fn leaves_records_without_reference_untouched() {
        let store = Arc::new(MemoryObjectStore::new());
        let draft = VideoRecord::draft(Uuid::new_v4(), "draft", None);
        let signed = signer(store.clone()).sign(draft.clone()).await.unwrap();
        assert_eq!(signed, draft);

        let mut legacy = VideoRecord::draft(Uuid::new_v4(), "legacy", None);
        legacy.video_url = Some("no-comma-here".to_string());
        let signed = signer(store).sign(legacy.clone()).await.unwrap();
        assert_eq!(signed, legacy);
    }

    #[tokio::test]
    async fn signing_failure_propagates() {
        let store = Arc::new(MemoryObjectStore::new());
        store.fail_presigns();
        let mut video = VideoRecord::draft(Uuid::new_v4(), "clip", None);
        video.video_url = Some("clips,other/x.mp4".to_string());

        let result = signer(store).sign(video).await;
        assert!(matches!(result, Err(SignError::Presign { .. })));
    }
}
