//! Uploaded file storage
//!
//! Files live under `<root>/<area>/<epoch-ms>-<random>.<ext>` and are
//! referenced from records by their public path `/files/<area>/<name>`.

use bytes::Bytes;
use chrono::Utc;
use rand::Rng;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::types::{QuireError, Result};

/// Longest extension kept from an uploaded file name
const MAX_EXTENSION_LEN: usize = 10;

/// Directory an upload belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileArea {
    Resources,
    ThesisProgress,
    ProfilePics,
}

impl FileArea {
    pub const ALL: [FileArea; 3] = [FileArea::Resources, FileArea::ThesisProgress, FileArea::ProfilePics];

    pub fn as_str(self) -> &'static str {
        match self {
            FileArea::Resources => "resources",
            FileArea::ThesisProgress => "thesis_progress",
            FileArea::ProfilePics => "profile_pics",
        }
    }
}

impl fmt::Display for FileArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileArea {
    type Err = QuireError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "resources" => Ok(FileArea::Resources),
            "thesis_progress" => Ok(FileArea::ThesisProgress),
            "profile_pics" => Ok(FileArea::ProfilePics),
            other => Err(QuireError::not_found(format!("Unknown file area '{}'", other))),
        }
    }
}

/// A file received in a multipart request
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub data: Bytes,
}

/// A stored file's location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub area: FileArea,
    pub name: String,
}

impl StoredFile {
    /// Path under which the file is served
    pub fn public_path(&self) -> String {
        format!("/files/{}/{}", self.area, self.name)
    }

    /// Parse `/files/<area>/<name>`
    pub fn from_public_path(path: &str) -> Option<Self> {
        let rest = path.strip_prefix("/files/")?;
        let (area, name) = rest.split_once('/')?;
        let area = area.parse().ok()?;
        if !is_safe_name(name) {
            return None;
        }
        Some(Self {
            area,
            name: name.to_string(),
        })
    }
}

/// Local directory store for uploads
#[derive(Debug, Clone)]
pub struct FileStore {
    root_dir: PathBuf,
}

impl FileStore {
    /// Open the store, creating the area directories
    pub async fn new<P: AsRef<Path>>(root_dir: P) -> Result<Self> {
        let root_dir = root_dir.as_ref().to_path_buf();
        for area in FileArea::ALL {
            fs::create_dir_all(root_dir.join(area.as_str())).await?;
        }

        info!(path = %root_dir.display(), "Initialized file store");
        Ok(Self { root_dir })
    }

    pub fn root(&self) -> &Path {
        &self.root_dir
    }

    fn file_path(&self, area: FileArea, name: &str) -> PathBuf {
        self.root_dir.join(area.as_str()).join(name)
    }

    /// Write an upload under a fresh name
    pub async fn save(&self, area: FileArea, original_name: &str, data: &[u8]) -> Result<StoredFile> {
        let name = generate_name(original_name);
        let path = self.file_path(area, &name);

        fs::write(&path, data).await.map_err(|e| {
            QuireError::Storage(format!("failed to write {}: {}", path.display(), e))
        })?;

        debug!(area = %area, name = %name, size = data.len(), "Stored upload");
        Ok(StoredFile { area, name })
    }

    /// Read a stored file by name
    pub async fn read(&self, area: FileArea, name: &str) -> Result<Bytes> {
        if !is_safe_name(name) {
            return Err(QuireError::not_found("File not found"));
        }

        match fs::read(self.file_path(area, name)).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(QuireError::not_found("File not found"))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Remove a file by its public path. Missing files are ignored.
    pub async fn remove(&self, public_path: &str) {
        let Some(stored) = StoredFile::from_public_path(public_path) else {
            warn!("Refusing to remove unrecognised path {}", public_path);
            return;
        };

        match fs::remove_file(self.file_path(stored.area, &stored.name)).await {
            Ok(()) => debug!("Removed {}", public_path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove {}: {}", public_path, e),
        }
    }
}

/// Names are single path components made of safe characters
fn is_safe_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

fn sanitized_extension(original_name: &str) -> Option<String> {
    let ext = Path::new(original_name).extension()?.to_str()?;
    let ext: String = ext
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(MAX_EXTENSION_LEN)
        .collect::<String>()
        .to_ascii_lowercase();
    (!ext.is_empty()).then_some(ext)
}

fn generate_name(original_name: &str) -> String {
    let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000_000);
    let stem = format!("{}-{}", Utc::now().timestamp_millis(), suffix);
    match sanitized_extension(original_name) {
        Some(ext) => format!("{}.{}", stem, ext),
        None => stem,
    }
}

/// Content type for a stored file name
pub fn content_type(name: &str) -> &'static str {
    match sanitized_extension(name).as_deref() {
        Some("pdf") => "application/pdf",
        Some("doc") => "application/msword",
        Some("docx") => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        Some("ppt") => "application/vnd.ms-powerpoint",
        Some("pptx") => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        Some("txt") => "text/plain; charset=utf-8",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("zip") => "application/zip",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_names() {
        let name = generate_name("Final Report.PDF");
        assert!(name.ends_with(".pdf"));
        assert!(is_safe_name(&name));

        let bare = generate_name("README");
        assert!(!bare.contains('.'));

        let odd = generate_name("x.p/d\\f");
        assert!(is_safe_name(&odd));
    }

    #[test]
    fn test_public_path_parsing() {
        let stored = StoredFile {
            area: FileArea::ThesisProgress,
            name: "1700000000000-42.pdf".into(),
        };
        let path = stored.public_path();
        assert_eq!(path, "/files/thesis_progress/1700000000000-42.pdf");
        assert_eq!(StoredFile::from_public_path(&path), Some(stored));

        assert!(StoredFile::from_public_path("/files/resources/../secret").is_none());
        assert!(StoredFile::from_public_path("/files/other/a.pdf").is_none());
        assert!(StoredFile::from_public_path("/tmp/a.pdf").is_none());
    }

    #[tokio::test]
    async fn test_save_read_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).await.unwrap();

        let stored = store
            .save(FileArea::Resources, "slides.pptx", b"deck")
            .await
            .unwrap();
        let data = store.read(FileArea::Resources, &stored.name).await.unwrap();
        assert_eq!(&data[..], b"deck");

        store.remove(&stored.public_path()).await;
        let err = store.read(FileArea::Resources, &stored.name).await.unwrap_err();
        assert!(matches!(err, QuireError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_read_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).await.unwrap();
        let err = store.read(FileArea::Resources, "../Cargo.toml").await.unwrap_err();
        assert!(matches!(err, QuireError::NotFound(_)));
    }

    #[test]
    fn test_content_types() {
        assert_eq!(content_type("a.pdf"), "application/pdf");
        assert_eq!(content_type("a.bin"), "application/octet-stream");
    }
}
