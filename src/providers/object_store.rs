//! Object store abstraction used for persisted investigation case files and
//! the freshness-gate's existence checks. Ported from
//! `agent/storage/local_store.py` and `agent/storage/s3_store.py` behind one
//! enum so [`crate::storage`] doesn't need to know which backend is active.
//! An enum rather than a `dyn` trait object: async trait methods aren't
//! object-safe without an extra crate, and there are exactly two backends.

use crate::error::ProviderError;
use aws_sdk_s3::Client as S3Client;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Filesystem-backed store rooted at a local directory.
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    async fn put(&self, key: &str, body: &[u8]) -> Result<(), ProviderError> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| ProviderError::Parse(e.to_string()))?;
        }
        let mut file = tokio::fs::File::create(&path).await.map_err(|e| ProviderError::Parse(e.to_string()))?;
        file.write_all(body).await.map_err(|e| ProviderError::Parse(e.to_string()))?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, ProviderError> {
        let path = self.path_for(key);
        match tokio::fs::File::open(&path).await {
            Ok(mut file) => {
                let mut buf = Vec::new();
                file.read_to_end(&mut buf).await.map_err(|e| ProviderError::Parse(e.to_string()))?;
                Ok(Some(buf))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ProviderError::Parse(e.to_string())),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, ProviderError> {
        Ok(tokio::fs::metadata(self.path_for(key)).await.is_ok())
    }

    async fn last_modified(&self, key: &str) -> Result<Option<DateTime<Utc>>, ProviderError> {
        match tokio::fs::metadata(self.path_for(key)).await {
            Ok(meta) => {
                let modified = meta.modified().map_err(|e| ProviderError::Parse(e.to_string()))?;
                Ok(Some(DateTime::<Utc>::from(modified)))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ProviderError::Parse(e.to_string())),
        }
    }
}

/// S3-backed store. Treats a 403 the same as a 404 for `exists`/`get`,
/// mirroring `s3_store.py`'s handling of buckets where `ListBucket` is
/// denied but `GetObject` on a known key is allowed — a bare 403 on a HEAD
/// request is ambiguous between "doesn't exist" and "no permission", and
/// the freshness gate treats both as "go ahead and recompute".
pub struct S3ObjectStore {
    client: S3Client,
    bucket: String,
    prefix: String,
}

impl S3ObjectStore {
    pub fn new(client: S3Client, bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self { client, bucket: bucket.into(), prefix: prefix.into() }
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    fn is_not_found_or_forbidden<E: std::error::Error>(err: &aws_sdk_s3::error::SdkError<E>) -> bool {
        let msg = err.to_string();
        msg.contains("NotFound") || msg.contains("403") || msg.contains("Forbidden")
    }

    async fn put(&self, key: &str, body: &[u8]) -> Result<(), ProviderError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(self.full_key(key))
            .body(body.to_vec().into())
            .send()
            .await
            .map_err(|e| ProviderError::Upstream { status: 0, message: e.to_string() })?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, ProviderError> {
        match self.client.get_object().bucket(&self.bucket).key(self.full_key(key)).send().await {
            Ok(output) => {
                let bytes = output
                    .body
                    .collect()
                    .await
                    .map_err(|e| ProviderError::Parse(e.to_string()))?
                    .into_bytes()
                    .to_vec();
                Ok(Some(bytes))
            }
            Err(e) if Self::is_not_found_or_forbidden(&e) => Ok(None),
            Err(e) => Err(ProviderError::Upstream { status: 0, message: e.to_string() }),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, ProviderError> {
        match self.client.head_object().bucket(&self.bucket).key(self.full_key(key)).send().await {
            Ok(_) => Ok(true),
            Err(e) if Self::is_not_found_or_forbidden(&e) => Ok(false),
            Err(e) => Err(ProviderError::Upstream { status: 0, message: e.to_string() }),
        }
    }

    async fn last_modified(&self, key: &str) -> Result<Option<DateTime<Utc>>, ProviderError> {
        match self.client.head_object().bucket(&self.bucket).key(self.full_key(key)).send().await {
            Ok(output) => Ok(output.last_modified().and_then(|t| DateTime::from_timestamp(t.secs(), 0))),
            Err(e) if Self::is_not_found_or_forbidden(&e) => Ok(None),
            Err(e) => Err(ProviderError::Upstream { status: 0, message: e.to_string() }),
        }
    }
}

/// Backend-agnostic handle the rest of the agent depends on.
pub enum ObjectStore {
    Local(LocalObjectStore),
    S3(S3ObjectStore),
}

impl ObjectStore {
    pub fn local(root: impl Into<PathBuf>) -> Self {
        Self::Local(LocalObjectStore::new(root))
    }

    pub fn s3(client: S3Client, bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self::S3(S3ObjectStore::new(client, bucket, prefix))
    }

    pub async fn put(&self, key: &str, body: &[u8]) -> Result<(), ProviderError> {
        match self {
            Self::Local(s) => s.put(key, body).await,
            Self::S3(s) => s.put(key, body).await,
        }
    }

    pub async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, ProviderError> {
        match self {
            Self::Local(s) => s.get(key).await,
            Self::S3(s) => s.get(key).await,
        }
    }

    pub async fn exists(&self, key: &str) -> Result<bool, ProviderError> {
        match self {
            Self::Local(s) => s.exists(key).await,
            Self::S3(s) => s.exists(key).await,
        }
    }

    pub async fn last_modified(&self, key: &str) -> Result<Option<DateTime<Utc>>, ProviderError> {
        match self {
            Self::Local(s) => s.last_modified(key).await,
            Self::S3(s) => s.last_modified(key).await,
        }
    }
}

/// Key layout from spec.md §6: `<alertname>/<dedup_key>.json`. `alertname`
/// is sanitized the same way `dedup_key` already is (both end up as path
/// segments in S3/local-filesystem keys).
pub fn case_key(alertname: &str, dedup_key: &str) -> String {
    format!("{}/{dedup_key}.json", sanitize_segment(alertname))
}

/// Report key layout: same prefix, `.md` extension.
pub fn report_key(alertname: &str, dedup_key: &str) -> String {
    format!("{}/{dedup_key}.md", sanitize_segment(alertname))
}

fn sanitize_segment(s: &str) -> String {
    if s.is_empty() {
        return "unknown".to_string();
    }
    s.chars().map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' }).collect()
}

pub fn local_path_hint(root: &Path, key: &str) -> PathBuf {
    root.join(key)
}
