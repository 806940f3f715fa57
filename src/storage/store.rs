//! Remote object storage clients.
//!
//! Storage is consumed through the `ObjectStore` trait. Two backends ship with
//! the crate: an HTTP client for S3-compatible endpoints that serve objects at
//! `<endpoint>/<bucket>/<key>`, and a directory-backed store where each bucket
//! is a subdirectory of a local root. Both are stateless and safe to share
//! across concurrent requests.

use crate::error::SynthesisError;
use crate::storage::path::RemoteDataReference;
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Failure modes of a storage read.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("object not found")]
    NotFound,

    #[error("access denied")]
    AccessDenied,

    #[error("storage request timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("storage transport error: {0}")]
    Transport(String),
}

impl StoreError {
    /// Attach the reference and lift into the synthesis taxonomy.
    pub fn into_synthesis(self, reference: &RemoteDataReference) -> SynthesisError {
        match self {
            StoreError::Timeout(after) => SynthesisError::Timeout(after),
            other => SynthesisError::DataUnavailable {
                path: reference.to_string(),
                reason: other.to_string(),
            },
        }
    }
}

/// Raw object bytes plus the content type reported by the store.
#[derive(Debug, Clone)]
pub struct FetchedObject {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// Read access to the remote object store.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch the full object behind a validated reference.
    async fn fetch(&self, reference: &RemoteDataReference) -> Result<FetchedObject, StoreError>;

    /// Check whether the object exists without downloading it.
    async fn exists(&self, reference: &RemoteDataReference) -> Result<bool, StoreError>;

    /// Returns a stable name for logging.
    fn name(&self) -> &str;
}

/// S3-compatible HTTP endpoint (path-style addressing).
pub struct HttpObjectStore {
    endpoint: String,
    base_url: reqwest::Url,
    timeout: Duration,
    http_client: reqwest::Client,
}

impl HttpObjectStore {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, StoreError> {
        let endpoint = endpoint.trim_end_matches('/');
        let base_url = reqwest::Url::parse(endpoint)
            .map_err(|e| StoreError::Transport(format!("Invalid endpoint '{}': {}", endpoint, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(StoreError::Transport(format!(
                "Endpoint '{}' cannot carry an object path",
                endpoint
            )));
        }

        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            endpoint: endpoint.to_string(),
            base_url,
            timeout,
            http_client,
        })
    }

    /// `<endpoint>/<bucket>/<key>` with every segment percent-encoded.
    fn object_url(&self, reference: &RemoteDataReference) -> reqwest::Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .push(reference.bucket())
                .extend(reference.key().split('/'));
        }
        url
    }

    fn map_transport(&self, e: reqwest::Error) -> StoreError {
        if e.is_timeout() {
            StoreError::Timeout(self.timeout)
        } else if e.is_connect() {
            StoreError::Transport(format!("Cannot connect to {}", self.endpoint))
        } else {
            StoreError::Transport(e.to_string())
        }
    }
}

fn status_error(status: reqwest::StatusCode) -> StoreError {
    match status.as_u16() {
        404 => StoreError::NotFound,
        401 | 403 => StoreError::AccessDenied,
        _ => StoreError::Transport(format!("unexpected status {}", status)),
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn fetch(&self, reference: &RemoteDataReference) -> Result<FetchedObject, StoreError> {
        let url = self.object_url(reference);
        debug!("GET {}", url);

        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| self.map_transport(e))?;

        if !response.status().is_success() {
            return Err(status_error(response.status()));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.map_transport(e))?;

        Ok(FetchedObject {
            bytes: bytes.to_vec(),
            content_type,
        })
    }

    async fn exists(&self, reference: &RemoteDataReference) -> Result<bool, StoreError> {
        let url = self.object_url(reference);
        debug!("HEAD {}", url);

        let response = self
            .http_client
            .head(url)
            .send()
            .await
            .map_err(|e| self.map_transport(e))?;

        match response.status() {
            s if s.is_success() => Ok(true),
            s if s.as_u16() == 404 => Ok(false),
            s => Err(status_error(s)),
        }
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// Serves `<root>/<bucket>/<key>` from the local filesystem.
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn object_path(&self, reference: &RemoteDataReference) -> PathBuf {
        let mut path = self.root.join(reference.bucket());
        for segment in reference.key().split('/') {
            path.push(segment);
        }
        path
    }
}

fn map_io(e: std::io::Error) -> StoreError {
    match e.kind() {
        std::io::ErrorKind::NotFound => StoreError::NotFound,
        std::io::ErrorKind::PermissionDenied => StoreError::AccessDenied,
        _ => StoreError::Transport(e.to_string()),
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn fetch(&self, reference: &RemoteDataReference) -> Result<FetchedObject, StoreError> {
        let path = self.object_path(reference);
        debug!("Reading {}", path.display());

        let metadata = tokio::fs::metadata(&path).await.map_err(map_io)?;
        if !metadata.is_file() {
            return Err(StoreError::NotFound);
        }

        let bytes = tokio::fs::read(&path).await.map_err(map_io)?;
        Ok(FetchedObject {
            bytes,
            content_type: None,
        })
    }

    async fn exists(&self, reference: &RemoteDataReference) -> Result<bool, StoreError> {
        match tokio::fs::metadata(self.object_path(reference)).await {
            Ok(m) => Ok(m.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(map_io(e)),
        }
    }

    fn name(&self) -> &str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::path::PathValidator;
    use tempfile::TempDir;

    fn setup() -> (TempDir, LocalObjectStore, PathValidator) {
        let temp_dir = TempDir::new().unwrap();
        let bucket_dir = temp_dir.path().join("reports").join("input");
        std::fs::create_dir_all(&bucket_dir).unwrap();
        std::fs::write(bucket_dir.join("sales.csv"), "day,sales\n1,10\n").unwrap();

        let store = LocalObjectStore::new(temp_dir.path());
        let validator = PathValidator::new("s3", "reports").unwrap();
        (temp_dir, store, validator)
    }

    #[test]
    fn test_local_fetch() {
        let (_dir, store, validator) = setup();
        let reference = validator.validate("s3://reports/input/sales.csv").unwrap();

        let object = tokio_test::block_on(store.fetch(&reference)).unwrap();
        assert_eq!(object.bytes, b"day,sales\n1,10\n");
        assert!(object.content_type.is_none());
    }

    #[test]
    fn test_local_missing_object() {
        let (_dir, store, validator) = setup();
        let reference = validator.validate("s3://reports/input/missing.csv").unwrap();

        let err = tokio_test::block_on(store.fetch(&reference)).unwrap_err();
        assert!(matches!(err, StoreError::NotFound));

        let synth = err.into_synthesis(&reference);
        assert_eq!(synth.kind(), "data_unavailable");
    }

    #[test]
    fn test_local_exists() {
        let (_dir, store, validator) = setup();
        let present = validator.validate("s3://reports/input/sales.csv").unwrap();
        let absent = validator.validate("s3://reports/input/other.csv").unwrap();
        let directory = validator.validate("s3://reports/input").unwrap();

        assert!(tokio_test::block_on(store.exists(&present)).unwrap());
        assert!(!tokio_test::block_on(store.exists(&absent)).unwrap());
        assert!(!tokio_test::block_on(store.exists(&directory)).unwrap());
    }

    #[test]
    fn test_timeout_maps_to_timeout() {
        let validator = PathValidator::new("s3", "reports").unwrap();
        let reference = validator.validate("s3://reports/a.json").unwrap();
        let err = StoreError::Timeout(Duration::from_secs(5)).into_synthesis(&reference);
        assert_eq!(err.kind(), "timeout");
    }

    #[test]
    fn test_http_object_url() {
        let store = HttpObjectStore::new("http://localhost:9000/", Duration::from_secs(5)).unwrap();
        let validator = PathValidator::new("s3", "reports").unwrap();
        let reference = validator.validate("s3://reports/input/sales.csv").unwrap();
        assert_eq!(
            store.object_url(&reference).as_str(),
            "http://localhost:9000/reports/input/sales.csv"
        );
    }

    #[test]
    fn test_http_object_url_stays_in_bucket() {
        let store = HttpObjectStore::new("https://s3.amazonaws.com", Duration::from_secs(5)).unwrap();
        let validator = PathValidator::new("s3", "reports").unwrap();

        let reference = validator.validate("s3://reports/q1 %2e%2e summary.csv").unwrap();
        let url = store.object_url(&reference);
        assert_eq!(url.host_str(), Some("s3.amazonaws.com"));
        assert_eq!(url.path(), "/reports/q1%20%252e%252e%20summary.csv");

        let reference = validator.validate("s3://reports/a/b.csv").unwrap();
        let url = store.object_url(&reference);
        let segments: Vec<_> = url.path_segments().unwrap().collect();
        assert_eq!(segments, vec!["reports", "a", "b.csv"]);
    }

    #[test]
    fn test_http_rejects_bad_endpoint() {
        assert!(HttpObjectStore::new("not a url", Duration::from_secs(5)).is_err());
        assert!(HttpObjectStore::new("mailto:ops@example.com", Duration::from_secs(5)).is_err());
    }
}
