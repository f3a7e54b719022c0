//! # Image upload storage
//!
//! Uploaded pictures are written to a local directory under a server-generated
//! `{uuid}.{ext}` name and served back by the router under the configured public
//! prefix. The client's file name is used only to pick the extension, so it can
//! never steer the write outside the upload directory.

use std::path::{Path, PathBuf};

use anyhow::Context;
use uuid::Uuid;

/// Formats accepted by the upload route.
pub const ALLOWED_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "gif", "webp"];

/// Most files accepted in one upload request.
pub const MAX_FILES: usize = 10;

/// Lowercased extension of `file_name` if it is an accepted image format.
pub fn image_extension(file_name: &str) -> Option<&'static str> {
    let (_, ext) = file_name.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    ALLOWED_EXTENSIONS.into_iter().find(|allowed| *allowed == ext)
}

#[derive(Debug, Clone)]
pub struct ImageStore {
    dir: PathBuf,
    url: String,
}

impl ImageStore {
    pub fn new(dir: impl Into<PathBuf>, url: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            url: url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Public URL prefix, without a trailing slash.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Writes `bytes` under a fresh name and returns the public URL of the file.
    pub async fn save(&self, extension: &str, bytes: &[u8]) -> anyhow::Result<String> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create upload directory {}", self.dir.display()))?;

        let name = format!("{}.{extension}", Uuid::new_v4());
        let path = self.dir.join(&name);
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("Failed to write upload {}", path.display()))?;

        tracing::debug!("Stored upload {} ({} bytes)", path.display(), bytes.len());
        Ok(format!("{}/{name}", self.url))
    }

    /// Deletes the file behind a URL returned by [`ImageStore::save`].
    pub async fn remove(&self, url: &str) -> anyhow::Result<()> {
        let name = url
            .strip_prefix(self.url.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
            .filter(|name| !name.is_empty() && !name.contains(['/', '\\']) && *name != "..")
            .with_context(|| format!("{url} is not an upload URL"))?;
        let path = self.dir.join(name);
        tokio::fs::remove_file(&path)
            .await
            .with_context(|| format!("Failed to remove upload {}", path.display()))
    }

    /// Best-effort removal of files from a request that failed part way.
    pub async fn discard(&self, urls: &[String]) {
        for url in urls {
            if let Err(e) = self.remove(url).await {
                tracing::warn!("{e:#}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_extension() {
        assert_eq!(image_extension("holiday.JPG"), Some("jpg"));
        assert_eq!(image_extension("a.b.webp"), Some("webp"));
        assert_eq!(image_extension("notes.pdf"), None);
        assert_eq!(image_extension("png"), None);
    }

    #[tokio::test]
    async fn test_save_writes_under_fresh_name() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::new(dir.path().join("uploads"), "/uploads/");

        let url = store.save("png", b"\x89PNG").await.unwrap();
        assert!(url.starts_with("/uploads/"));
        assert!(url.ends_with(".png"));

        let name = url.trim_start_matches("/uploads/");
        let written = std::fs::read(dir.path().join("uploads").join(name)).unwrap();
        assert_eq!(written, b"\x89PNG");
    }

    #[tokio::test]
    async fn test_discard_removes_saved_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::new(dir.path(), "/uploads");

        let urls = vec![
            store.save("png", b"one").await.unwrap(),
            store.save("jpg", b"two").await.unwrap(),
        ];
        store.discard(&urls).await;
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);

        assert!(store.remove(&urls[0]).await.is_err());
        assert!(store.remove("/uploads/../secret.png").await.is_err());
        assert!(store.remove("/elsewhere/a.png").await.is_err());
    }
}
