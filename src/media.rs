//! Storage for uploaded avatars and cover images.
//!
//! A [`MediaStore`] turns an upload into an opaque reference (a URL) that is
//! saved on the user record. The bundled [`LocalMediaStore`] writes files to
//! a directory that the server exposes under `/media`.

use std::path::{Path, PathBuf};

use rocket::fs::TempFile;
use thiserror::Error;
use uuid::Uuid;

pub type MediaResult<T> = Result<T, MediaError>;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("upload is empty")]
    EmptyUpload,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct MediaConfig {
    pub root: PathBuf,
    pub public_base: String,
}

impl MediaConfig {
    pub fn from_env() -> Self {
        let root = std::env::var("MEDIA_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./media"));
        let public_base =
            std::env::var("MEDIA_PUBLIC_BASE").unwrap_or_else(|_| "/media".to_string());
        Self { root, public_base }
    }
}

#[rocket::async_trait]
pub trait MediaStore: Send + Sync {
    /// Persist the upload and return its reference.
    async fn store(&self, upload: &mut TempFile<'_>) -> MediaResult<String>;

    /// Remove a previously stored file. Unknown references are ignored.
    async fn discard(&self, reference: &str) -> MediaResult<()>;
}

/// Best-effort removal for uploads that are no longer referenced.
pub async fn discard_quietly(store: &dyn MediaStore, reference: &str) {
    if reference.is_empty() {
        return;
    }
    if let Err(err) = store.discard(reference).await {
        log::warn!("failed to discard media {}: {}", reference, err);
    }
}

#[derive(Debug, Clone)]
pub struct LocalMediaStore {
    root: PathBuf,
    public_base: String,
}

impl LocalMediaStore {
    pub fn new(config: MediaConfig) -> Self {
        Self {
            root: config.root,
            public_base: config.public_base.trim_end_matches('/').to_string(),
        }
    }

    fn reference_for(&self, file_name: &str) -> String {
        format!("{}/{}", self.public_base, file_name)
    }

    /// Map a reference back to a path inside `root`. Only the final path
    /// component is used, so a reference can never escape the directory.
    fn path_for(&self, reference: &str) -> Option<PathBuf> {
        let name = reference.strip_prefix(&self.public_base)?;
        let name = Path::new(name.trim_start_matches('/')).file_name()?;
        Some(self.root.join(name))
    }
}

#[rocket::async_trait]
impl MediaStore for LocalMediaStore {
    async fn store(&self, upload: &mut TempFile<'_>) -> MediaResult<String> {
        if upload.len() == 0 {
            return Err(MediaError::EmptyUpload);
        }

        tokio::fs::create_dir_all(&self.root).await?;

        let extension = upload
            .content_type()
            .and_then(|content_type| content_type.extension())
            .map(|ext| ext.as_str().to_ascii_lowercase());
        let file_name = match extension {
            Some(ext) => format!("{}.{}", Uuid::new_v4().simple(), ext),
            None => Uuid::new_v4().simple().to_string(),
        };

        upload.copy_to(self.root.join(&file_name)).await?;
        log::debug!("stored upload as {}", file_name);

        Ok(self.reference_for(&file_name))
    }

    async fn discard(&self, reference: &str) -> MediaResult<()> {
        let Some(path) = self.path_for(reference) else {
            return Ok(());
        };
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(MediaError::Io(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &Path) -> LocalMediaStore {
        LocalMediaStore::new(MediaConfig {
            root: dir.to_path_buf(),
            public_base: "/media/".into(),
        })
    }

    #[test]
    fn references_stay_inside_root() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(dir.path());

        assert_eq!(store.reference_for("abc.png"), "/media/abc.png");
        assert_eq!(
            store.path_for("/media/abc.png"),
            Some(dir.path().join("abc.png"))
        );
        assert_eq!(
            store.path_for("/media/../../etc/passwd"),
            Some(dir.path().join("passwd"))
        );
        assert_eq!(store.path_for("https://cdn.example.com/abc.png"), None);
    }

    #[tokio::test]
    async fn discard_removes_files_and_ignores_missing_ones() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(dir.path());
        let path = dir.path().join("avatar.png");
        std::fs::write(&path, b"png").expect("write");

        store.discard("/media/avatar.png").await.expect("discard");
        assert!(!path.exists());

        store.discard("/media/avatar.png").await.expect("second discard");
        store.discard("").await.expect("empty reference");
    }
}
