//! Bearer token lookup for the workflow API.
//!
//! The token is re-read on every submission so that projected service
//! account tokens are picked up after the kubelet rotates them.

use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use reqwest::header::HeaderValue;
use tracing::debug;

use crate::error::RemediationError;

/// In-cluster service account token location.
pub const DEFAULT_TOKEN_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";

/// A bearer token. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wrap a raw token value.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Raw token value.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Something that can hand out a bearer token on demand.
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Fetch the current token.
    async fn fetch_token(&self) -> Result<Credential, RemediationError>;
}

/// Reads the token from a file on every call.
#[derive(Debug, Clone)]
pub struct FileTokenSource {
    path: PathBuf,
}

impl FileTokenSource {
    /// Create a source for the given file.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path being read.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileTokenSource {
    fn default() -> Self {
        Self::new(DEFAULT_TOKEN_PATH)
    }
}

#[async_trait]
impl TokenSource for FileTokenSource {
    async fn fetch_token(&self) -> Result<Credential, RemediationError> {
        let raw = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            RemediationError::TokenUnavailable(format!("{}: {e}", self.path.display()))
        })?;

        let token = raw.trim();
        if token.is_empty() {
            return Err(RemediationError::TokenUnavailable(format!(
                "{} is empty",
                self.path.display()
            )));
        }

        if HeaderValue::from_str(token).is_err() {
            return Err(RemediationError::TokenUnavailable(format!(
                "{} does not hold a valid header value",
                self.path.display()
            )));
        }

        debug!(path = %self.path.display(), "Loaded workflow API token");
        Ok(Credential::new(token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_reads_and_trims_token() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "  abc.def.ghi  ").unwrap();

        let source = FileTokenSource::new(file.path());
        let credential = source.fetch_token().await.unwrap();
        assert_eq!(credential.expose(), "abc.def.ghi");
    }

    #[tokio::test]
    async fn test_missing_file_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let source = FileTokenSource::new(dir.path().join("token"));

        let err = source.fetch_token().await.unwrap_err();
        assert!(matches!(err, RemediationError::TokenUnavailable(_)));
    }

    #[tokio::test]
    async fn test_whitespace_only_file_is_unavailable() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, " \n\t\n").unwrap();

        let source = FileTokenSource::new(file.path());
        let err = source.fetch_token().await.unwrap_err();
        assert!(matches!(err, RemediationError::TokenUnavailable(_)));
    }

    #[tokio::test]
    async fn test_multiline_token_is_unavailable() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "abc\ndef\n").unwrap();

        let source = FileTokenSource::new(file.path());
        let err = source.fetch_token().await.unwrap_err();
        assert!(matches!(err, RemediationError::TokenUnavailable(_)));
    }

    #[tokio::test]
    async fn test_rotated_token_is_picked_up() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "first").unwrap();

        let source = FileTokenSource::new(file.path());
        assert_eq!(source.fetch_token().await.unwrap().expose(), "first");

        std::fs::write(file.path(), "second").unwrap();
        assert_eq!(source.fetch_token().await.unwrap().expose(), "second");
    }

    #[test]
    fn test_debug_redacts_token() {
        let credential = Credential::new("super-secret");
        assert_eq!(format!("{credential:?}"), "Credential(***)");
    }
}
