#![allow(dead_code)]

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use api::{AppState, create_router, middleware::Claims, middleware::JwtVerifier};
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, Response, header};
use jsonwebtoken::{EncodingKey, Header, encode};
use media::playback::{DEFAULT_PLAYBACK_TTL, PlaybackSigner};
use media::testing::{CopyRemuxer, FakeProber, MemoryObjectStore, MemoryVideoStore};
use media::{PipelineConfig, UploadOrchestrator};
use serde_json::Value;
use tempfile::TempDir;
use uuid::Uuid;

pub const BUCKET: &str = "clips";
pub const SECRET: &str = "integration-secret";
pub const ISSUER: &str = "clipvault";
pub const BOUNDARY: &str = "clipvault-test-boundary";

/// Router wired to in-memory collaborators, plus handles to inspect them
pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryObjectStore>,
    pub videos: Arc<MemoryVideoStore>,
    pub staging: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_limit(media::pipeline::DEFAULT_MAX_UPLOAD_BYTES)
    }

    /// Build the app with a custom upload ceiling
    pub fn with_limit(max_upload_bytes: u64) -> Self {
        let staging = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryObjectStore::new());
        let videos = Arc::new(MemoryVideoStore::new());
        let playback = PlaybackSigner::new(store.clone(), DEFAULT_PLAYBACK_TTL);

        let mut config = PipelineConfig::new(BUCKET, staging.path());
        config.max_upload_bytes = max_upload_bytes;

        let uploads = UploadOrchestrator::new(
            config,
            Arc::new(FakeProber::returning(1920, 1080)),
            Arc::new(CopyRemuxer::new()),
            store.clone(),
            videos.clone(),
            playback.clone(),
        );

        let state = AppState {
            videos: videos.clone(),
            uploads: Arc::new(uploads),
            playback,
            jwt: JwtVerifier::new(SECRET, ISSUER),
        };

        Self {
            router: create_router(state),
            store,
            videos,
            staging,
        }
    }

    pub fn staged_file_count(&self) -> usize {
        std::fs::read_dir(self.staging.path()).unwrap().count()
    }
}

/// Mint a bearer token for `user_id` signed with the test secret
pub fn token_for(user_id: Uuid) -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs();
    let claims = Claims {
        sub: user_id,
        iss: ISSUER.to_string(),
        iat: now,
        exp: now + 600,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

pub fn authorized(builder: axum::http::request::Builder, user_id: Uuid) -> axum::http::request::Builder {
    builder.header(header::AUTHORIZATION, format!("Bearer {}", token_for(user_id)))
}

/// A multipart/form-data request body with a single file part
pub fn multipart_body(field: &str, content_type: &str, bytes: &[u8]) -> Body {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"clip\"\r\n",
            field
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    Body::from(body)
}

pub fn upload_request(video_id: Uuid, user_id: Uuid, body: Body) -> Request<Body> {
    authorized(Request::post(format!("/api/video_upload/{}", video_id)), user_id)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(body)
        .unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
