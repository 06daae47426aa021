//! Downloaded video content and its local handle

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tempfile::NamedTempFile;
use tokio::task;

static NEXT_ARTIFACT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of a [`VideoArtifact`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactId(u64);

impl ArtifactId {
    fn next() -> Self {
        Self(NEXT_ARTIFACT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl From<u64> for ArtifactId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A downloaded video held on local disk
///
/// The bytes live in a temporary file for as long as the artifact exists;
/// dropping the artifact removes the file.
pub struct VideoArtifact {
    id: ArtifactId,
    data: Bytes,
    mime_type: String,
    source_uri: String,
    file: NamedTempFile,
}

impl VideoArtifact {
    /// Write `data` to a new temp file in `dir` (or the OS temp dir)
    pub async fn store(
        data: Bytes,
        mime_type: impl Into<String>,
        source_uri: impl Into<String>,
        dir: Option<PathBuf>,
    ) -> crate::Result<Self> {
        let contents = data.clone();
        let file = task::spawn_blocking(move || -> std::io::Result<NamedTempFile> {
            let mut builder = tempfile::Builder::new();
            builder.prefix("weathercast-").suffix(".mp4");
            let mut file = match dir {
                Some(dir) => {
                    std::fs::create_dir_all(&dir)?;
                    builder.tempfile_in(dir)?
                }
                None => builder.tempfile()?,
            };
            std::io::Write::write_all(&mut file, &contents)?;
            Ok(file)
        })
        .await
        .map_err(|e| std::io::Error::other(e.to_string()))??;

        let artifact = Self {
            id: ArtifactId::next(),
            data,
            mime_type: mime_type.into(),
            source_uri: source_uri.into(),
            file,
        };
        tracing::debug!(
            id = %artifact.id,
            path = %artifact.path().display(),
            size = artifact.size(),
            "stored video artifact"
        );
        Ok(artifact)
    }

    #[must_use]
    pub fn id(&self) -> ArtifactId {
        self.id
    }

    /// Raw video bytes
    #[must_use]
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    #[must_use]
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Where the provider served the video from
    #[must_use]
    pub fn source_uri(&self) -> &str {
        &self.source_uri
    }

    /// Local file holding the video
    #[must_use]
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Copy the video to a permanent location
    pub async fn save(&self, path: impl AsRef<Path>) -> crate::Result<()> {
        tokio::fs::write(path, &self.data).await?;
        Ok(())
    }
}

impl fmt::Debug for VideoArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VideoArtifact")
            .field("id", &self.id)
            .field("size", &self.data.len())
            .field("mime_type", &self.mime_type)
            .field("source_uri", &self.source_uri)
            .field("path", &self.file.path())
            .finish()
    }
}

impl Drop for VideoArtifact {
    fn drop(&mut self) {
        tracing::debug!(id = %self.id, "releasing video artifact");
    }
}
