//! Object store gateway: streaming uploads and presigned GET URLs.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_config::meta::region::RegionProviderChain;
use aws_sdk_s3::Client;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use std::time::Duration;
use thiserror::Error;
use tokio::fs::File;
use tracing::{error, info};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to prepare upload body for {key}: {source}")]
    Body {
        key: String,
        #[source]
        source: BoxError,
    },

    #[error("put {bucket}/{key} failed: {source}")]
    Put {
        bucket: String,
        key: String,
        #[source]
        source: BoxError,
    },
}

#[derive(Debug, Error)]
pub enum SignError {
    #[error("invalid presign expiry {ttl:?}: {source}")]
    Expiry {
        ttl: Duration,
        #[source]
        source: BoxError,
    },

    #[error("presigning {bucket}/{key} failed: {source}")]
    Presign {
        bucket: String,
        key: String,
        #[source]
        source: BoxError,
    },
}

/// Durable object storage as seen by the upload pipeline
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Stream `body` to `bucket/key`. The file is read incrementally, never buffered whole.
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
        body: File,
    ) -> Result<(), StoreError>;

    /// Mint a GET URL for `bucket/key` that expires after `ttl`. Performs no I/O against the store.
    async fn presign_get(&self, bucket: &str, key: &str, ttl: Duration)
    -> Result<String, SignError>;
}

/// Connection settings for the S3 client
#[derive(Debug, Clone)]
pub struct S3Config {
    /// AWS region (or region identifier for S3-compatible providers)
    pub region: String,
    /// Custom endpoint for S3-compatible providers, e.g. `http://localhost:9000` for MinIO
    pub endpoint_url: Option<String>,
}

/// S3 implementation of [`ObjectStore`]
#[derive(Clone)]
pub struct S3ObjectStore {
    client: Client,
}

impl S3ObjectStore {
    /// Build a client from the default AWS credential chain
    pub async fn new(config: &S3Config) -> Self {
        let region_provider =
            RegionProviderChain::first_try(aws_sdk_s3::config::Region::new(config.region.clone()));
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(region_provider)
            .load()
            .await;

        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);
        if let Some(endpoint) = &config.endpoint_url {
            // S3-compatible providers generally need path-style addressing
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        info!(
            "S3 client initialized for region {} (endpoint: {})",
            config.region,
            config.endpoint_url.as_deref().unwrap_or("aws")
        );

        Self::from_client(Client::from_conf(builder.build()))
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
        body: File,
    ) -> Result<(), StoreError> {
        info!("Uploading object to S3: {}/{}", bucket, key);
        let start = std::time::Instant::now();

        let byte_stream = ByteStream::read_from()
            .file(body)
            .build()
            .await
            .map_err(|e| StoreError::Body {
                key: key.to_string(),
                source: Box::new(e),
            })?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(byte_stream)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| {
                error!(
                    error = %e,
                    bucket = %bucket,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 upload failed"
                );
                StoreError::Put {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                    source: Box::new(e),
                }
            })?;

        info!(
            bucket = %bucket,
            key = %key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 upload successful"
        );

        Ok(())
    }

    async fn presign_get(
        &self,
        bucket: &str,
        key: &str,
        ttl: Duration,
    ) -> Result<String, SignError> {
        let presigning_config =
            PresigningConfig::expires_in(ttl).map_err(|e| SignError::Expiry {
                ttl,
                source: Box::new(e),
            })?;

        let presigned_request = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .presigned(presigning_config)
            .await
            .map_err(|e| SignError::Presign {
                bucket: bucket.to_string(),
                key: key.to_string(),
                source: Box::new(e),
            })?;

        Ok(presigned_request.uri().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
    use chrono::{NaiveDateTime, Utc};

    fn offline_store() -> S3ObjectStore {
        let config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .credentials_provider(Credentials::new(
                "AKIDEXAMPLE",
                "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY",
                None,
                None,
                "static",
            ))
            .endpoint_url("http://localhost:9000")
            .force_path_style(true)
            .build();
        S3ObjectStore::from_client(Client::from_conf(config))
    }

    fn query_param<'a>(url: &'a str, name: &str) -> Option<&'a str> {
        let (_, query) = url.split_once('?')?;
        query
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v)
    }

    #[tokio::test]
    async fn presigned_url_addresses_object_and_encodes_expiry() {
        let store = offline_store();
        let url = store
            .presign_get(
                "clipvault-videos",
                "landscape/AAAAAAAAAAAAAAAAAAAAAA.mp4",
                Duration::from_secs(3600),
            )
            .await
            .unwrap();

        let (base, _) = url.split_once('?').unwrap();
        assert_eq!(
            base,
            "http://localhost:9000/clipvault-videos/landscape/AAAAAAAAAAAAAAAAAAAAAA.mp4"
        );
        assert_eq!(query_param(&url, "X-Amz-Expires"), Some("3600"));
        assert!(query_param(&url, "X-Amz-Signature").is_some());

        let signed_at = query_param(&url, "X-Amz-Date").unwrap();
        let signed_at = NaiveDateTime::parse_from_str(signed_at, "%Y%m%dT%H%M%SZ")
            .unwrap()
            .and_utc();
        let skew = (Utc::now() - signed_at).num_seconds().abs();
        assert!(skew < 300, "signing time too far from now: {skew}s");
    }

    #[tokio::test]
    async fn presigning_is_repeatable() {
        let store = offline_store();
        let first = store
            .presign_get("b", "other/x.mp4", Duration::from_secs(60))
            .await
            .unwrap();
        let second = store
            .presign_get("b", "other/x.mp4", Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(query_param(&first, "X-Amz-Expires"), Some("60"));
        assert_eq!(
            first.split_once('?').unwrap().0,
            second.split_once('?').unwrap().0
        );
    }

    #[tokio::test]
    async fn expiry_beyond_a_week_is_rejected() {
        let store = offline_store();
        let result = store
            .presign_get("b", "k", Duration::from_secs(8 * 24 * 3600))
            .await;
        assert!(matches!(result, Err(SignError::Expiry { .. })));
    }
}
