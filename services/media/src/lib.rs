//! Video ingestion pipeline for ClipVault.
//!
//! An upload is staged to a temporary file, probed for its geometry, remuxed
//! for fast start, stored under an aspect-bucketed key and finally recorded
//! against its video as an unsigned `bucket,key` reference. Reads turn that
//! reference into a short-lived presigned URL.
//!
//! External collaborators sit behind traits ([`prober::MediaProber`],
//! [`remuxer::Remuxer`], [`object_store::ObjectStore`], [`database::VideoStore`])
//! so the [`pipeline::UploadOrchestrator`] can be driven with fakes in tests.

pub mod database;
pub mod models;
pub mod object_store;
pub mod pipeline;
pub mod playback;
pub mod prober;
pub mod remuxer;
pub mod staging;
pub mod storage_key;
pub mod sweeper;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use pipeline::{PipelineConfig, UploadError, UploadOrchestrator, UploadRequest, UploadStage};
