//! In-memory fakes for the pipeline's collaborators.
//!
//! Available to this crate's tests and, through the `test-util` feature, to
//! downstream crates that exercise the upload pipeline without ffmpeg, S3 or
//! PostgreSQL.

use crate::database::{VideoStore, VideoStoreError};
use crate::models::{VideoGeometry, VideoRecord};
use crate::object_store::{ObjectStore, SignError, StoreError};
use crate::prober::{MediaProber, ProbeError};
use crate::remuxer::{RemuxError, Remuxer, processing_path};
use async_trait::async_trait;
use common::error::DatabaseError;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};
use uuid::Uuid;

/// Request body that yields `data` and then fails, like a client dropping mid-upload
pub struct FailingReader {
    data: Vec<u8>,
    pos: usize,
}

impl FailingReader {
    pub fn after(data: Vec<u8>) -> Self {
        Self { data, pos: 0 }
    }
}

impl AsyncRead for FailingReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let remaining = self.data.len() - self.pos;
        if remaining == 0 {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "client went away",
            )));
        }

        let n = remaining.min(buf.remaining());
        let start = self.pos;
        buf.put_slice(&self.data[start..start + n]);
        self.pos += n;
        Poll::Ready(Ok(()))
    }
}

/// Prober returning a fixed geometry, or failing when built with [`FakeProber::failing`]
pub struct FakeProber {
    geometry: Option<VideoGeometry>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl FakeProber {
    pub fn returning(width: u32, height: u32) -> Self {
        Self {
            geometry: Some(VideoGeometry { width, height }),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            geometry: None,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Sleep for `delay` before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaProber for FakeProber {
    async fn probe(&self, path: &Path) -> Result<VideoGeometry, ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if !path.exists() {
            return Err(ProbeError::Spawn(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} does not exist", path.display()),
            )));
        }
        self.geometry.ok_or(ProbeError::NoStreams)
    }
}

/// Remuxer that copies the source to its `.processing` sibling
pub struct CopyRemuxer {
    fail: bool,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl CopyRemuxer {
    pub fn new() -> Self {
        Self {
            fail: false,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Writes a truncated output file and then reports failure
    pub fn failing() -> Self {
        Self {
            fail: true,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Sleep for `delay` after writing the output, before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for CopyRemuxer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Remuxer for CopyRemuxer {
    async fn remux(&self, source: &Path) -> Result<PathBuf, RemuxError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let output = processing_path(source);

        if self.fail {
            tokio::fs::write(&output, b"truncated")
                .await
                .map_err(RemuxError::Spawn)?;
            return Err(RemuxError::Spawn(io::Error::other("remuxer crashed")));
        }

        tokio::fs::copy(source, &output)
            .await
            .map_err(RemuxError::Spawn)?;
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(output)
    }
}

/// An object captured by [`MemoryObjectStore`]
#[derive(Debug, Clone, PartialEq)]
pub struct StoredObject {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Object store keeping uploads in memory.
///
/// Presigned URLs have the shape `https://{bucket}.store.test/{key}?expires={secs}`.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<(String, String), StoredObject>>,
    puts: AtomicUsize,
    put_delay: Mutex<Option<Duration>>,
    fail_puts: AtomicBool,
    fail_presigns: AtomicBool,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_puts(&self) {
        self.fail_puts.store(true, Ordering::SeqCst);
    }

    pub fn fail_presigns(&self) {
        self.fail_presigns.store(true, Ordering::SeqCst);
    }

    /// Make every put sleep for `delay` before storing anything
    pub fn delay_puts(&self, delay: Duration) {
        *self.put_delay.lock().unwrap() = Some(delay);
    }

    /// Number of successful puts
    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        self.objects
            .lock()
            .unwrap()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
        mut body: File,
    ) -> Result<(), StoreError> {
        let delay = *self.put_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(StoreError::Put {
                bucket: bucket.to_string(),
                key: key.to_string(),
                source: Box::new(io::Error::other("injected put failure")),
            });
        }

        let mut bytes = Vec::new();
        body.read_to_end(&mut bytes)
            .await
            .map_err(|e| StoreError::Body {
                key: key.to_string(),
                source: Box::new(e),
            })?;

        self.objects.lock().unwrap().insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                content_type: content_type.to_string(),
                bytes,
            },
        );
        self.puts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn presign_get(
        &self,
        bucket: &str,
        key: &str,
        ttl: Duration,
    ) -> Result<String, SignError> {
        if self.fail_presigns.load(Ordering::SeqCst) {
            return Err(SignError::Presign {
                bucket: bucket.to_string(),
                key: key.to_string(),
                source: Box::new(io::Error::other("injected presign failure")),
            });
        }
        Ok(format!(
            "https://{}.store.test/{}?expires={}",
            bucket,
            key,
            ttl.as_secs()
        ))
    }
}

/// Video records held in a map, with an injectable update failure
#[derive(Default)]
pub struct MemoryVideoStore {
    videos: Mutex<HashMap<Uuid, VideoRecord>>,
    updates: AtomicUsize,
    update_delay: Mutex<Option<Duration>>,
    fail_updates: AtomicBool,
}

impl MemoryVideoStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, video: VideoRecord) {
        self.videos.lock().unwrap().insert(video.id, video);
    }

    pub fn get(&self, id: Uuid) -> Option<VideoRecord> {
        self.videos.lock().unwrap().get(&id).cloned()
    }

    pub fn fail_updates(&self) {
        self.fail_updates.store(true, Ordering::SeqCst);
    }

    /// Make every update sleep for `delay` before touching the map
    pub fn delay_updates(&self, delay: Duration) {
        *self.update_delay.lock().unwrap() = Some(delay);
    }

    /// Number of successful updates
    pub fn update_count(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VideoStore for MemoryVideoStore {
    async fn get_video(&self, id: Uuid) -> Result<Option<VideoRecord>, VideoStoreError> {
        Ok(self.get(id))
    }

    async fn update_video(&self, video: &VideoRecord) -> Result<(), VideoStoreError> {
        let delay = *self.update_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(DatabaseError::Connection(sqlx::Error::PoolTimedOut).into());
        }

        let mut videos = self.videos.lock().unwrap();
        match videos.get_mut(&video.id) {
            Some(existing) => {
                *existing = video.clone();
                self.updates.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            None => Err(VideoStoreError::Missing(video.id)),
        }
    }

    async fn create_video(&self, video: &VideoRecord) -> Result<(), VideoStoreError> {
        self.insert(video.clone());
        Ok(())
    }

    async fn list_videos(&self, user_id: Uuid) -> Result<Vec<VideoRecord>, VideoStoreError> {
        let mut videos: Vec<VideoRecord> = self
            .videos
            .lock()
            .unwrap()
            .values()
            .filter(|video| video.user_id == user_id)
            .cloned()
            .collect();
        videos.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(videos)
    }
}
