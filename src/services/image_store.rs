use axum::body::Bytes;
use chrono::Utc;
use ring::rand::{SecureRandom, SystemRandom};
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tokio::io::AsyncWriteExt;

use crate::error::AppError;

pub const DEFAULT_ALLOWED_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "gif", "webp"];

const SUFFIX_LEN: usize = 8;

#[derive(thiserror::Error, Debug)]
pub enum ImageStoreError {
    #[error("File type .{0} is not allowed")]
    ExtensionNotAllowed(String),

    #[error("File '{0}' has no extension")]
    MissingExtension(String),

    #[error("File '{name}' exceeds the {limit} byte upload limit")]
    TooLarge { name: String, limit: usize },

    #[error("Image path escapes the upload directory")]
    PathEscape,

    #[error("Image not found")]
    NotFound,

    #[error("Failed to generate a file name")]
    Random,

    #[error("Storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ImageStoreError> for AppError {
    fn from(err: ImageStoreError) -> Self {
        match err {
            ImageStoreError::ExtensionNotAllowed(_)
            | ImageStoreError::MissingExtension(_)
            | ImageStoreError::TooLarge { .. } => AppError::Validation(err.to_string()),
            ImageStoreError::PathEscape => AppError::Forbidden(err.to_string()),
            ImageStoreError::NotFound => AppError::NotFound(err.to_string()),
            ImageStoreError::Random => AppError::Internal(anyhow::anyhow!(err.to_string())),
            ImageStoreError::Io(e) => AppError::Storage(e),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ImageStoreConfig {
    /// Directory every stored file lives under
    pub root: PathBuf,
    /// Lowercase extensions without the dot
    pub allowed_extensions: Vec<String>,
    pub max_bytes: usize,
    /// URL prefix prepended to stored file names, e.g. `/uploads`
    pub public_prefix: String,
}

impl Default for ImageStoreConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("uploads"),
            allowed_extensions: DEFAULT_ALLOWED_EXTENSIONS
                .iter()
                .map(|e| e.to_string())
                .collect(),
            max_bytes: 5 * 1024 * 1024,
            public_prefix: "/uploads".to_string(),
        }
    }
}

/// An uploaded file as received from the client
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub bytes: Bytes,
}

pub struct ImageStore {
    config: ImageStoreConfig,
    rng: SystemRandom,
}

impl ImageStore {
    pub fn new(config: ImageStoreConfig) -> Self {
        Self {
            config,
            rng: SystemRandom::new(),
        }
    }

    pub async fn ensure_root(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.config.root).await
    }

    /// Checks every upload against the allow-list and size limit.
    /// Returns the normalized extension of each file, in order.
    pub fn validate(&self, uploads: &[Upload]) -> Result<Vec<String>, ImageStoreError> {
        uploads
            .iter()
            .map(|upload| {
                let extension = Path::new(&upload.file_name)
                    .extension()
                    .and_then(|e| e.to_str())
                    .map(str::to_ascii_lowercase)
                    .ok_or_else(|| ImageStoreError::MissingExtension(upload.file_name.clone()))?;

                if !self.config.allowed_extensions.contains(&extension) {
                    return Err(ImageStoreError::ExtensionNotAllowed(extension));
                }

                if upload.bytes.len() > self.config.max_bytes {
                    return Err(ImageStoreError::TooLarge {
                        name: upload.file_name.clone(),
                        limit: self.config.max_bytes,
                    });
                }

                Ok(extension)
            })
            .collect()
    }

    /// Writes a batch of uploads for a point and returns their references.
    ///
    /// The batch is all-or-nothing: nothing is written if any file fails
    /// validation, and files already written are removed if a later write fails.
    pub async fn store(
        &self,
        point_id: i64,
        uploads: &[Upload],
    ) -> Result<Vec<String>, ImageStoreError> {
        let extensions = self.validate(uploads)?;
        if uploads.is_empty() {
            return Ok(Vec::new());
        }

        self.ensure_root().await?;

        let timestamp = Utc::now().timestamp_millis();
        let mut written: Vec<PathBuf> = Vec::with_capacity(uploads.len());
        let mut references = Vec::with_capacity(uploads.len());

        for (seq, (upload, extension)) in uploads.iter().zip(&extensions).enumerate() {
            let result = async {
                let file_name = format!(
                    "point_{}_{}_{}_{}.{}",
                    point_id,
                    timestamp,
                    seq,
                    self.random_suffix()?,
                    extension
                );
                let path = self.config.root.join(&file_name);
                write_new_file(&path, &upload.bytes).await?;
                Ok::<_, ImageStoreError>((path, file_name))
            }
            .await;

            match result {
                Ok((path, file_name)) => {
                    written.push(path);
                    references.push(self.reference_for(&file_name));
                }
                Err(e) => {
                    tracing::error!(point_id, error = %e, "Image write failed, rolling back batch");
                    for path in &written {
                        if let Err(cleanup) = tokio::fs::remove_file(path).await {
                            tracing::warn!(
                                path = %path.display(),
                                error = %cleanup,
                                "Failed to remove partial upload"
                            );
                        }
                    }
                    return Err(e);
                }
            }
        }

        tracing::info!(point_id, count = references.len(), "Stored images");

        Ok(references)
    }

    pub async fn remove(&self, reference: &str) -> Result<(), ImageStoreError> {
        let path = self.locate(reference).await?;
        tokio::fs::remove_file(&path).await.map_err(not_found_or_io)
    }

    fn reference_for(&self, file_name: &str) -> String {
        format!("{}/{}", self.config.public_prefix.trim_end_matches('/'), file_name)
    }

    fn random_suffix(&self) -> Result<String, ImageStoreError> {
        let mut bytes = [0u8; SUFFIX_LEN];
        self.rng
            .fill(&mut bytes)
            .map_err(|_| ImageStoreError::Random)?;
        Ok(hex::encode(bytes))
    }

    /// Maps a reference to an existing file under the root.
    /// Traversal is rejected lexically first, then again after symlinks are resolved.
    pub async fn locate(&self, reference: &str) -> Result<PathBuf, ImageStoreError> {
        let prefix = format!("{}/", self.config.public_prefix.trim_end_matches('/'));
        let relative = reference.strip_prefix(&prefix).unwrap_or(reference);

        if relative.is_empty() {
            return Err(ImageStoreError::NotFound);
        }

        let relative = Path::new(relative);
        if !relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
        {
            return Err(ImageStoreError::PathEscape);
        }

        let candidate = self.config.root.join(relative);
        let resolved = tokio::fs::canonicalize(&candidate)
            .await
            .map_err(not_found_or_io)?;
        let root = tokio::fs::canonicalize(&self.config.root)
            .await
            .map_err(not_found_or_io)?;

        if !resolved.starts_with(&root) {
            return Err(ImageStoreError::PathEscape);
        }

        if !tokio::fs::metadata(&resolved).await?.is_file() {
            return Err(ImageStoreError::NotFound);
        }

        Ok(resolved)
    }
}

async fn write_new_file(path: &Path, bytes: &[u8]) -> Result<(), ImageStoreError> {
    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await?;
    file.write_all(bytes).await?;
    file.flush().await?;
    Ok(())
}

fn not_found_or_io(err: std::io::Error) -> ImageStoreError {
    if err.kind() == ErrorKind::NotFound {
        ImageStoreError::NotFound
    } else {
        ImageStoreError::Io(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &Path) -> ImageStore {
        ImageStore::new(ImageStoreConfig {
            root: dir.to_path_buf(),
            ..Default::default()
        })
    }

    async fn read(store: &ImageStore, reference: &str) -> Vec<u8> {
        let path = store.locate(reference).await.unwrap();
        tokio::fs::read(path).await.unwrap()
    }

    fn upload(name: &str, bytes: &'static [u8]) -> Upload {
        Upload {
            file_name: name.to_string(),
            bytes: Bytes::from_static(bytes),
        }
    }

    #[test]
    fn test_exe_is_rejected_regardless_of_content() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());

        // PNG magic bytes do not rescue a forbidden extension
        let result = store.validate(&[upload("photo.exe", b"\x89PNG\r\n\x1a\n")]);

        assert!(matches!(result, Err(ImageStoreError::ExtensionNotAllowed(ext)) if ext == "exe"));
    }

    #[test]
    fn test_extension_check_is_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());

        let extensions = store
            .validate(&[upload("A.JPG", b"x"), upload("b.webp", b"y")])
            .unwrap();

        assert_eq!(extensions, ["jpg", "webp"]);
        assert!(matches!(
            store.validate(&[upload("noext", b"x")]),
            Err(ImageStoreError::MissingExtension(_))
        ));
    }

    #[test]
    fn test_allow_list_comes_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::new(ImageStoreConfig {
            root: dir.path().to_path_buf(),
            allowed_extensions: vec!["png".to_string()],
            max_bytes: 4,
            public_prefix: "/uploads".to_string(),
        });

        assert!(store.validate(&[upload("a.jpg", b"x")]).is_err());
        assert!(matches!(
            store.validate(&[upload("a.png", b"too big")]),
            Err(ImageStoreError::TooLarge { limit: 4, .. })
        ));
        assert!(store.validate(&[upload("a.png", b"ok")]).is_ok());
    }

    #[tokio::test]
    async fn test_store_and_locate() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());

        let refs = store
            .store(7, &[upload("one.png", b"first"), upload("two.png", b"second")])
            .await
            .unwrap();

        assert_eq!(refs.len(), 2);
        assert_ne!(refs[0], refs[1]);
        assert!(refs[0].starts_with("/uploads/point_7_"));
        assert!(refs[0].ends_with(".png"));

        let path = store.locate(&refs[1]).await.unwrap();
        assert!(path.starts_with(dir.path().canonicalize().unwrap()));
        assert_eq!(read(&store, &refs[1]).await, b"second");
    }

    #[tokio::test]
    async fn test_repeated_uploads_never_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());

        let first = store.store(1, &[upload("a.gif", b"1")]).await.unwrap();
        let second = store.store(1, &[upload("a.gif", b"2")]).await.unwrap();

        assert_ne!(first, second);
        assert_eq!(read(&store, &first[0]).await, b"1");
        assert_eq!(read(&store, &second[0]).await, b"2");
    }

    #[tokio::test]
    async fn test_invalid_batch_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());

        let result = store
            .store(1, &[upload("ok.png", b"1"), upload("bad.exe", b"2")])
            .await;

        assert!(result.is_err());
        let entries = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(entries, 0);
    }

    #[tokio::test]
    async fn test_traversal_is_forbidden() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("uploads");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(dir.path().join("secret.txt"), b"secret").unwrap();
        let store = store_in(&root);

        for reference in ["../secret.txt", "/uploads/../secret.txt", "/etc/passwd"] {
            assert!(
                matches!(store.locate(reference).await, Err(ImageStoreError::PathEscape)),
                "{} should be rejected",
                reference
            );
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlink_escape_is_forbidden() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("uploads");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(dir.path().join("secret.png"), b"secret").unwrap();
        std::os::unix::fs::symlink(dir.path().join("secret.png"), root.join("link.png")).unwrap();
        let store = store_in(&root);

        assert!(matches!(
            store.locate("link.png").await,
            Err(ImageStoreError::PathEscape)
        ));
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());

        assert!(matches!(
            store.locate("/uploads/nope.png").await,
            Err(ImageStoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        let refs = store.store(3, &[upload("x.jpeg", b"x")]).await.unwrap();

        store.remove(&refs[0]).await.unwrap();

        assert!(matches!(
            store.locate(&refs[0]).await,
            Err(ImageStoreError::NotFound)
        ));
    }
}
