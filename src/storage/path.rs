//! Allow-list checks for remote data references.
//!
//! A reference is accepted only when it starts with the exact configured root
//! (`<scheme>://<bucket>/`) and names a non-empty object key. The same check
//! runs before any data is read and again before an `S3` value is embedded in
//! a report document.

use crate::error::{SynthesisError, SynthesisResult};
use serde::Serialize;
use std::fmt;

/// A reference that passed the allow-list check. Only `PathValidator` builds these.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RemoteDataReference {
    raw: String,
    bucket: String,
    key: String,
}

impl RemoteDataReference {
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Lowercased file extension of the key, if any.
    pub fn extension(&self) -> Option<String> {
        let file_name = self.key.rsplit('/').next()?;
        let (_, ext) = file_name.rsplit_once('.')?;
        if ext.is_empty() {
            None
        } else {
            Some(ext.to_lowercase())
        }
    }
}

impl fmt::Display for RemoteDataReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Checks references against the single allow-listed storage root.
#[derive(Debug, Clone)]
pub struct PathValidator {
    scheme: String,
    bucket: String,
    root: String,
}

impl PathValidator {
    /// Build a validator for `<scheme>://<bucket>/`.
    pub fn new(scheme: &str, bucket: &str) -> Result<Self, String> {
        if scheme.is_empty() || !scheme.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(format!("Invalid storage scheme: '{}'", scheme));
        }
        if bucket.is_empty()
            || bucket.contains('/')
            || bucket.chars().any(|c| c.is_whitespace() || c.is_control())
        {
            return Err(format!("Invalid allow-listed bucket: '{}'", bucket));
        }

        Ok(Self {
            scheme: scheme.to_string(),
            bucket: bucket.to_string(),
            root: format!("{}://{}/", scheme, bucket),
        })
    }

    /// The allow-listed prefix, including the trailing slash.
    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Validate one reference, returning the parsed form on success.
    pub fn validate(&self, raw: &str) -> SynthesisResult<RemoteDataReference> {
        let reject = |reason: String| SynthesisError::InvalidPath {
            path: raw.to_string(),
            reason,
        };

        let Some(key) = raw.strip_prefix(self.root.as_str()) else {
            return Err(reject(format!("outside allow-listed root {}", self.root)));
        };

        if key.is_empty() {
            return Err(reject("no object key after the bucket".to_string()));
        }

        if key.chars().any(|c| c.is_control()) {
            return Err(reject("control characters in object key".to_string()));
        }

        if let Some(c) = key.chars().find(|c| matches!(c, '\\' | '?' | '#')) {
            return Err(reject(format!("'{}' is not allowed in an object key", c)));
        }

        for segment in key.split('/') {
            if segment.is_empty() {
                return Err(reject("empty path segment in object key".to_string()));
            }
            if is_dot_segment(segment) {
                return Err(reject("relative path segment in object key".to_string()));
            }
        }

        Ok(RemoteDataReference {
            raw: raw.to_string(),
            bucket: self.bucket.clone(),
            key: key.to_string(),
        })
    }

    /// Boolean form of [`validate`](Self::validate).
    pub fn is_valid(&self, raw: &str) -> bool {
        self.validate(raw).is_ok()
    }

    /// Validate every reference; the first invalid one rejects the whole list.
    pub fn validate_all(&self, raws: &[String]) -> SynthesisResult<Vec<RemoteDataReference>> {
        raws.iter().map(|raw| self.validate(raw)).collect()
    }
}

/// `.` or `..`, including their `%2e` encodings.
fn is_dot_segment(segment: &str) -> bool {
    let decoded = segment.to_ascii_lowercase().replace("%2e", ".");
    decoded == "." || decoded == ".."
}
