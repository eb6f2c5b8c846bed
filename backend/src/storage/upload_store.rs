use chrono::{DateTime, Utc};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

const MAX_COLLISION_ATTEMPTS: u32 = 100;

#[derive(Clone, Debug)]
pub struct UploadStore {
    root: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid stored filename: {0}")]
    InvalidName(String),
    #[error("Could not find a free filename for {0}")]
    NoFreeName(String),
}

/// Reduces an uploaded filename to ASCII letters, digits, `.`, `-` and `_`.
/// Path components and leading dots are dropped. Falls back to
/// `upload.<ext>` when nothing usable remains.
pub fn sanitize_filename(original: &str, extension: &str) -> String {
    let base = original
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .collect();
    let cleaned = cleaned.trim_start_matches(['.', '_']).to_string();

    match cleaned.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && ext.eq_ignore_ascii_case(extension) => cleaned,
        _ => format!("upload.{}", extension),
    }
}

/// `<YYYYmmddHHMMSS>_<sanitized name>`
pub fn stored_filename(original: &str, extension: &str, at: DateTime<Utc>) -> String {
    format!(
        "{}_{}",
        at.format("%Y%m%d%H%M%S"),
        sanitize_filename(original, extension)
    )
}

fn with_suffix(name: &str, n: u32) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) => format!("{}-{}.{}", stem, n, ext),
        None => format!("{}-{}", name, n),
    }
}

impl UploadStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn ensure_dir(&self) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    /// Resolves a stored name to its path. Only bare names produced by
    /// [`stored_filename`] are accepted.
    pub fn path_for(&self, stored_name: &str) -> Result<PathBuf, StorageError> {
        let valid = !stored_name.is_empty()
            && !stored_name.starts_with('.')
            && stored_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'));
        if !valid {
            return Err(StorageError::InvalidName(stored_name.to_string()));
        }
        Ok(self.root.join(stored_name))
    }

    /// Writes the image and returns the name it was stored under. The file
    /// is fully flushed before this returns.
    pub async fn save(
        &self,
        original_name: &str,
        extension: &str,
        image_data: &[u8],
    ) -> Result<String, StorageError> {
        self.ensure_dir().await?;
        let base = stored_filename(original_name, extension, Utc::now());

        for attempt in 0..MAX_COLLISION_ATTEMPTS {
            let name = if attempt == 0 {
                base.clone()
            } else {
                with_suffix(&base, attempt)
            };
            let path = self.path_for(&name)?;
            let mut file = match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            };
            if let Err(e) = Self::write_all(&mut file, image_data).await {
                drop(file);
                let _ = fs::remove_file(&path).await;
                return Err(e);
            }
            log::debug!("Stored upload as {}", path.display());
            return Ok(name);
        }
        Err(StorageError::NoFreeName(base))
    }

    async fn write_all(file: &mut fs::File, data: &[u8]) -> Result<(), StorageError> {
        file.write_all(data).await?;
        file.sync_all().await?;
        Ok(())
    }

    pub async fn read(&self, stored_name: &str) -> Result<Vec<u8>, StorageError> {
        Ok(fs::read(self.path_for(stored_name)?).await?)
    }

    pub async fn delete(&self, stored_name: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.path_for(stored_name)?).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn sanitizes_like_a_secure_filename() {
        assert_eq!(sanitize_filename("my scan.JPG", "jpg"), "my_scan.JPG");
        assert_eq!(sanitize_filename("../../etc/passwd.png", "png"), "passwd.png");
        assert_eq!(sanitize_filename("C:\\Users\\kid\\tulisan.jpeg", "jpeg"), "tulisan.jpeg");
        assert_eq!(sanitize_filename(".hidden.png", "png"), "hidden.png");
        assert_eq!(sanitize_filename("тетрадь.png", "png"), "upload.png");
    }

    #[test]
    fn stored_name_is_timestamp_prefixed() {
        let at = Utc.with_ymd_and_hms(2026, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(stored_filename("alex.jpg", "jpg", at), "20260309140507_alex.jpg");
    }

    #[test]
    fn rejects_names_that_escape_the_root() {
        let store = UploadStore::new("/tmp/uploads");
        assert!(store.path_for("../x.png").is_err());
        assert!(store.path_for("a/b.png").is_err());
        assert!(store.path_for("").is_err());
        assert!(store.path_for("20260309140507_alex.jpg").is_ok());
    }

    #[actix_web::test]
    async fn save_read_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path().join("uploads"));

        let first = store.save("alex.png", "png", b"one").await.unwrap();
        let second = store.save("alex.png", "png", b"two").await.unwrap();
        assert_ne!(first, second);
        assert!(first.ends_with("_alex.png"));

        assert_eq!(store.read(&first).await.unwrap(), b"one");
        assert_eq!(store.read(&second).await.unwrap(), b"two");

        store.delete(&first).await.unwrap();
        assert!(store.read(&first).await.is_err());
        store.delete(&first).await.unwrap();
    }
}
