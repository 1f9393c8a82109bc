//! Application state shared across handlers

use std::sync::Arc;

use media::{UploadOrchestrator, database::VideoStore, playback::PlaybackSigner};

use crate::middleware::JwtVerifier;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub videos: Arc<dyn VideoStore>,
    pub uploads: Arc<UploadOrchestrator>,
    pub playback: PlaybackSigner,
    pub jwt: JwtVerifier,
}
