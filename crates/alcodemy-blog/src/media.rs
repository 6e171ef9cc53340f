// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Images and resource files live in an object store; rows only keep the object key and its
//! public URL.

use std::path::Path as FsPath;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::{ObjectStore, PutPayload};
use tempfile::NamedTempFile;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::{MediaBackend, MediaConfig};
use crate::store::Image;

#[derive(thiserror::Error, Debug)]
pub enum MediaError {
    #[error("Object store request failed: {0}")]
    Store(#[from] object_store::Error),

    #[error("Object store request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Failed to read spooled upload: {0}")]
    Io(#[from] std::io::Error),
}

/// A file received in a multipart body, spooled to disk. The file is removed when this is
/// dropped, whichever way the request ends.
#[derive(Debug)]
pub struct TempUpload {
    pub file: NamedTempFile,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
}

impl TempUpload {
    pub fn path(&self) -> &FsPath {
        self.file.path()
    }

    pub fn is_image(&self) -> bool {
        self.content_type
            .as_deref()
            .and_then(|ct| ct.parse::<mime::Mime>().ok())
            .is_some_and(|m| m.type_() == mime::IMAGE)
    }

    fn extension(&self) -> Option<&str> {
        let name = self.file_name.as_deref()?;
        let (_, ext) = name.rsplit_once('.')?;
        (!ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric())).then_some(ext)
    }
}

#[derive(Clone)]
pub struct Media {
    store: Arc<dyn ObjectStore>,
    public_url: String,
    timeout: Duration,
}

impl Media {
    pub fn new(store: Arc<dyn ObjectStore>, public_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            store,
            public_url: public_url.into().trim_end_matches('/').to_owned(),
            timeout,
        }
    }

    pub fn from_config(config: &MediaConfig, timeout: Duration) -> anyhow::Result<Self> {
        let store: Arc<dyn ObjectStore> = match &config.backend {
            MediaBackend::Memory => {
                warn!("Media is kept in memory and will not survive a restart");
                Arc::new(InMemory::new())
            }
            MediaBackend::Local { root } => {
                std::fs::create_dir_all(root)
                    .with_context(|| format!("cannot create media root {root:?}"))?;
                Arc::new(LocalFileSystem::new_with_prefix(root)?)
            }
            MediaBackend::S3 {
                bucket,
                region,
                endpoint,
            } => {
                let mut builder = AmazonS3Builder::from_env()
                    .with_bucket_name(bucket)
                    .with_region(region);
                if let Some(endpoint) = endpoint {
                    builder = builder.with_endpoint(endpoint);
                }
                Arc::new(builder.build().context("invalid S3 media configuration")?)
            }
        };

        Ok(Self::new(store, &config.public_url, timeout))
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    pub fn url_for(&self, key: &str) -> String {
        format!("{}/{}", self.public_url, key)
    }

    /// Stores the upload under `folder` with a fresh name and returns where it lives.
    pub async fn upload(&self, folder: &str, upload: &TempUpload) -> Result<Image, MediaError> {
        let bytes = tokio::fs::read(upload.path()).await?;
        let key = match upload.extension() {
            Some(ext) => format!("{}/{}.{}", folder.trim_matches('/'), Uuid::new_v4(), ext),
            None => format!("{}/{}", folder.trim_matches('/'), Uuid::new_v4()),
        };

        let location = Path::from(key.as_str());
        tokio::time::timeout(
            self.timeout,
            self.store.put(&location, PutPayload::from(bytes)),
        )
        .await
        .map_err(|_| MediaError::Timeout(self.timeout))??;

        info!(key = %key, "Uploaded media object");
        Ok(Image {
            resource_url: self.url_for(&key),
            resource_id: key,
        })
    }

    /// Deleting an object that is already gone succeeds.
    pub async fn delete(&self, key: &str) -> Result<(), MediaError> {
        let location = Path::from(key);
        match tokio::time::timeout(self.timeout, self.store.delete(&location)).await {
            Err(_) => Err(MediaError::Timeout(self.timeout)),
            Ok(Err(object_store::Error::NotFound { .. })) | Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(e.into()),
        }
    }

    /// Deletes every key, returning the ones that could not be removed.
    pub async fn delete_all(&self, keys: &[String]) -> Vec<String> {
        let mut orphaned = vec![];
        for key in keys {
            if let Err(e) = self.delete(key).await {
                warn!(key = %key, "Failed to delete media object: {e}");
                orphaned.push(key.clone());
            }
        }
        orphaned
    }
}
