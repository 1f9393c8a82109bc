use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Video metadata record, owned by the metadata store.
///
/// `video_url` holds a `bucket,key` reference at rest and a presigned URL
/// once the record has passed through [`crate::playback::PlaybackSigner`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub thumbnail_url: Option<String>,
    pub video_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VideoRecord {
    /// Create a draft record with no uploaded media yet
    pub fn draft(user_id: Uuid, title: impl Into<String>, description: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            title: title.into(),
            description,
            thumbnail_url: None,
            video_url: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// The stored object this record points at, if any
    pub fn stored_object(&self) -> Option<StoredObjectRef> {
        self.video_url.as_deref().and_then(StoredObjectRef::parse)
    }
}

/// Coarse layout bucket derived from stream geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AspectClass {
    Landscape,
    Portrait,
    Other,
}

impl AspectClass {
    const TOLERANCE: f64 = 0.01;

    /// Classify a width/height pair against 16:9 and 9:16
    pub fn classify(width: u32, height: u32) -> Self {
        if height == 0 {
            return AspectClass::Other;
        }

        let ratio = f64::from(width) / f64::from(height);
        if (ratio - 16.0 / 9.0).abs() < Self::TOLERANCE {
            AspectClass::Landscape
        } else if (ratio - 9.0 / 16.0).abs() < Self::TOLERANCE {
            AspectClass::Portrait
        } else {
            AspectClass::Other
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AspectClass::Landscape => "landscape",
            AspectClass::Portrait => "portrait",
            AspectClass::Other => "other",
        }
    }
}

impl fmt::Display for AspectClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Width and height of the first stream reported by the prober
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoGeometry {
    pub width: u32,
    pub height: u32,
}

impl VideoGeometry {
    pub fn aspect_class(&self) -> AspectClass {
        AspectClass::classify(self.width, self.height)
    }
}

/// Storage coordinates of an uploaded object.
///
/// Persisted as `"<bucket>,<key>"` with no escaping; parsing splits on the
/// first comma so keys may themselves contain commas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObjectRef {
    pub bucket: String,
    pub key: String,
}

impl StoredObjectRef {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Parse a persisted reference; `None` if the value is not a `bucket,key` pair
    pub fn parse(value: &str) -> Option<Self> {
        let (bucket, key) = value.split_once(',')?;
        if bucket.is_empty() || key.is_empty() {
            return None;
        }
        Some(Self::new(bucket, key))
    }
}

impl fmt::Display for StoredObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.bucket, self.key)
    }
}
