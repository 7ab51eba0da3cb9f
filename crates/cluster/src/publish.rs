//! Result publication.
//!
//! A completed execution may leave behind a large local artifact. Before
//! its reference is fanned out to the status stores, the artifact is
//! converted into a globally reachable reference by a [`ResultPublisher`];
//! the artifact itself never travels through the stores.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

/// A result value on its way to the status stores.
#[derive(Debug, Clone)]
pub enum ResultValue {
    /// Already-publishable value (URL, inline text, failure reason).
    Inline(String),
    /// Local artifact that must be published before storage.
    File(PathBuf),
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("Artifact not found: {0}")]
    NotFound(PathBuf),

    #[error("Publish failed: {0}")]
    Failed(String),
}

/// Converts a local artifact into an externally reachable reference.
///
/// Publishers are registered as an explicit, priority-ordered list; the
/// first one that succeeds wins.
#[async_trait]
pub trait ResultPublisher: Send + Sync {
    /// Ordering among registered publishers; higher is tried first.
    fn priority(&self) -> i32 {
        0
    }

    /// Publish `artifact` and return its external reference.
    async fn publish(&self, artifact: &Path) -> Result<String, PublishError>;
}

/// Fallback publisher that exposes artifacts as `file://` URLs.
///
/// Only reachable from nodes sharing the filesystem; real deployments
/// register a higher-priority publisher backed by shared storage.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalPathPublisher;

#[async_trait]
impl ResultPublisher for LocalPathPublisher {
    fn priority(&self) -> i32 {
        i32::MIN
    }

    async fn publish(&self, artifact: &Path) -> Result<String, PublishError> {
        if !artifact.exists() {
            return Err(PublishError::NotFound(artifact.to_path_buf()));
        }
        let absolute = artifact
            .canonicalize()
            .map_err(|e| PublishError::Failed(e.to_string()))?;
        Ok(format!("file://{}", absolute.display()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[tokio::test]
    async fn local_publisher_returns_file_url() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("result.tif");
        std::fs::write(&artifact, b"raster").unwrap();

        let reference = LocalPathPublisher.publish(&artifact).await.unwrap();
        assert!(reference.starts_with("file://"));
        assert!(reference.ends_with("result.tif"));
    }

    #[tokio::test]
    async fn local_publisher_rejects_missing_artifact() {
        let err = LocalPathPublisher
            .publish(Path::new("/nonexistent/result.tif"))
            .await
            .unwrap_err();
        assert_matches!(err, PublishError::NotFound(_));
    }

    #[test]
    fn local_publisher_sorts_last() {
        assert_eq!(LocalPathPublisher.priority(), i32::MIN);
    }
}
