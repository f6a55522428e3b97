//! Archive access.
//!
//! Archives are addressed through ordinary paths: `/books/a.zip/ch1/p1.jpg`
//! is the entry `ch1/p1.jpg` of the archive file `/books/a.zip`. Nested
//! archives continue the same way (`/books/a.zip/inner.zip/p1.jpg`).
//! [`ArchiveHandle::resolve`] splits such a path into the archive chain and
//! the directory inside the innermost archive.

use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek};
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

use async_trait::async_trait;
use zip::ZipArchive;

use crate::error::{CoreError, CoreResult};

/// Largest archive-inside-an-archive read into memory for listing.
const NESTED_ARCHIVE_LIMIT: u64 = 256 * 1024 * 1024;

/// One entry listed from an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// `/`-separated path inside the archive, without a trailing separator.
    pub path: String,
    pub is_directory: bool,
    pub length: u64,
    pub last_write_time: Option<SystemTime>,
}

impl ArchiveEntry {
    pub fn file(path: impl Into<String>, length: u64) -> Self {
        Self {
            path: path.into(),
            is_directory: false,
            length,
            last_write_time: None,
        }
    }

    pub fn directory(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            is_directory: true,
            length: 0,
            last_write_time: None,
        }
    }
}

/// Lists archive contents. Extraction and codecs live behind this seam.
#[async_trait]
pub trait ArchiveProvider: Send + Sync {
    /// Whether `path` names an archive this provider can list.
    fn is_supported(&self, path: &Path) -> bool;

    /// Lists every entry of the archive at `archive`, which may be nested
    /// inside other archives.
    async fn list_entries(&self, archive: &Path) -> CoreResult<Vec<ArchiveEntry>>;
}

/// An opened archive and the chain of archives containing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveHandle {
    archive: PathBuf,
    parent: Option<Box<ArchiveHandle>>,
}

/// Result of splitting a virtual path at its innermost archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveLocation {
    pub handle: ArchiveHandle,
    /// Directory inside the innermost archive; empty for its root.
    pub inner: PathBuf,
}

impl ArchiveHandle {
    /// Splits `path` into the archive chain and the inner directory.
    ///
    /// # Errors
    ///
    /// - [`CoreError::NotFound`]: no ancestor of `path` is an existing file.
    /// - [`CoreError::Unsupported`]: the file found is not a supported archive.
    pub fn resolve(path: &Path, provider: &dyn ArchiveProvider) -> CoreResult<ArchiveLocation> {
        let file = path
            .ancestors()
            .find(|p| p.is_file())
            .ok_or_else(|| CoreError::NotFound(path.to_path_buf()))?;
        if !provider.is_supported(file) {
            return Err(CoreError::Unsupported(format!(
                "not an archive: {}",
                file.display()
            )));
        }

        let mut handle = ArchiveHandle {
            archive: file.to_path_buf(),
            parent: None,
        };
        let mut inner = PathBuf::new();
        let rest = path.strip_prefix(file).unwrap_or(Path::new(""));
        for component in rest.components() {
            let Component::Normal(name) = component else {
                continue;
            };
            inner.push(name);
            if provider.is_supported(Path::new(name)) {
                let archive = handle.archive.join(&inner);
                handle = ArchiveHandle {
                    archive,
                    parent: Some(Box::new(handle)),
                };
                inner = PathBuf::new();
            }
        }

        Ok(ArchiveLocation { handle, inner })
    }

    /// The archive's own path.
    pub fn path(&self) -> &Path {
        &self.archive
    }

    /// The enclosing archive, or `None` when this archive is a real file.
    pub fn parent(&self) -> Option<&ArchiveHandle> {
        self.parent.as_deref()
    }

    /// Where the archive lives: a directory or a folder of the enclosing archive.
    pub fn container(&self) -> PathBuf {
        self.archive
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default()
    }

    /// The archive chain, outermost first.
    pub fn chain(&self) -> Vec<&ArchiveHandle> {
        let mut chain = vec![self];
        let mut current = self;
        while let Some(parent) = current.parent() {
            chain.push(parent);
            current = parent;
        }
        chain.reverse();
        chain
    }
}

/// Lists `.zip` archives, including zips nested inside zips.
#[derive(Debug, Clone, Default)]
pub struct ZipArchiveProvider;

impl ZipArchiveProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ArchiveProvider for ZipArchiveProvider {
    fn is_supported(&self, path: &Path) -> bool {
        path.extension()
            .map(|e| e.eq_ignore_ascii_case("zip"))
            .unwrap_or(false)
    }

    async fn list_entries(&self, archive: &Path) -> CoreResult<Vec<ArchiveEntry>> {
        let archive = archive.to_path_buf();
        let provider = self.clone();
        tokio::task::spawn_blocking(move || provider.read_entries(&archive))
            .await
            .map_err(|e| CoreError::Archive(e.to_string()))?
    }
}

impl ZipArchiveProvider {
    fn read_entries(&self, archive: &Path) -> CoreResult<Vec<ArchiveEntry>> {
        let file_path = archive
            .ancestors()
            .find(|p| p.is_file())
            .ok_or_else(|| CoreError::NotFound(archive.to_path_buf()))?;
        let modified = std::fs::metadata(file_path)
            .and_then(|m| m.modified())
            .ok();
        let file = File::open(file_path).map_err(|e| CoreError::from_io(file_path, e))?;
        let zip = ZipArchive::new(BufReader::new(file))
            .map_err(|e| CoreError::Archive(format!("{}: {e}", file_path.display())))?;
        let rest = archive.strip_prefix(file_path).unwrap_or(Path::new(""));
        self.walk_nested(zip, rest, modified)
    }

    fn walk_nested<R: Read + Seek>(
        &self,
        mut zip: ZipArchive<R>,
        rest: &Path,
        modified: Option<SystemTime>,
    ) -> CoreResult<Vec<ArchiveEntry>> {
        if rest.as_os_str().is_empty() {
            return list_zip(&mut zip, modified);
        }

        let mut entry_path = PathBuf::new();
        let mut remaining = rest.components();
        for component in remaining.by_ref() {
            entry_path.push(component);
            if self.is_supported(&entry_path) {
                break;
            }
        }

        let entry_name = entry_path.to_string_lossy().replace('\\', "/");
        let file = zip
            .by_name(&entry_name)
            .map_err(|e| CoreError::Archive(format!("{entry_name}: {e}")))?;
        let declared = file.size();
        let bytes = read_bounded(file, declared, NESTED_ARCHIVE_LIMIT, &entry_name)?;
        let inner = ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| CoreError::Archive(format!("{entry_name}: {e}")))?;
        self.walk_nested(inner, remaining.as_path(), modified)
    }
}

/// Reads at most `limit` bytes; the declared size is not trusted on its own.
fn read_bounded(reader: impl Read, declared: u64, limit: u64, name: &str) -> CoreResult<Vec<u8>> {
    let too_large = || {
        CoreError::Archive(format!(
            "{name}: nested archive larger than {limit} bytes"
        ))
    };
    if declared > limit {
        return Err(too_large());
    }
    let mut bytes = Vec::with_capacity(declared as usize);
    reader.take(limit + 1).read_to_end(&mut bytes)?;
    if bytes.len() as u64 > limit {
        return Err(too_large());
    }
    Ok(bytes)
}

fn list_zip<R: Read + Seek>(
    zip: &mut ZipArchive<R>,
    modified: Option<SystemTime>,
) -> CoreResult<Vec<ArchiveEntry>> {
    let mut entries = Vec::with_capacity(zip.len());
    for index in 0..zip.len() {
        let file = zip
            .by_index(index)
            .map_err(|e| CoreError::Archive(e.to_string()))?;
        let path = file.name().trim_end_matches('/').to_string();
        if path.is_empty() {
            continue;
        }
        entries.push(ArchiveEntry {
            path,
            is_directory: file.is_dir(),
            length: file.size(),
            last_write_time: modified,
        });
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::FileOptions;

    #[test]
    fn nested_reads_are_bounded() {
        let data = vec![7u8; 10];
        assert_eq!(read_bounded(Cursor::new(&data), 10, 16, "a.zip").unwrap(), data);
        assert!(matches!(
            read_bounded(Cursor::new(&data), 10, 4, "a.zip"),
            Err(CoreError::Archive(_))
        ));
        // A header that under-reports the size is caught while reading.
        assert!(matches!(
            read_bounded(Cursor::new(&data), 2, 4, "a.zip"),
            Err(CoreError::Archive(_))
        ));
    }

    fn write_zip(path: &Path, files: &[(&str, &[u8])]) {
        let file = File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        for (name, data) in files {
            zip.start_file(*name, FileOptions::default()).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap();
    }

    fn zip_bytes(files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data) in files {
            zip.start_file(*name, FileOptions::default()).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    #[test]
    fn resolve_splits_archive_and_inner() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("a.zip");
        write_zip(&archive, &[("ch1/p1.jpg", b"x")]);

        let location = ArchiveHandle::resolve(&archive.join("ch1"), &ZipArchiveProvider).unwrap();
        assert_eq!(location.handle.path(), archive);
        assert_eq!(location.inner, PathBuf::from("ch1"));
        assert!(location.handle.parent().is_none());
        assert_eq!(location.handle.container(), tmp.path());
    }

    #[test]
    fn resolve_tracks_nested_archives() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("a.zip");
        write_zip(&archive, &[("x.jpg", b"x")]);

        let nested = archive.join("sub").join("inner.zip").join("pages");
        let location = ArchiveHandle::resolve(&nested, &ZipArchiveProvider).unwrap();
        assert_eq!(location.handle.path(), archive.join("sub").join("inner.zip"));
        assert_eq!(location.inner, PathBuf::from("pages"));
        assert_eq!(location.handle.parent().unwrap().path(), archive);
        assert_eq!(location.handle.chain().len(), 2);
        assert_eq!(location.handle.container(), archive.join("sub"));
    }

    #[test]
    fn resolve_rejects_plain_files() {
        let tmp = TempDir::new().unwrap();
        let text = tmp.path().join("notes.txt");
        std::fs::write(&text, "hi").unwrap();
        let err = ArchiveHandle::resolve(&text, &ZipArchiveProvider).unwrap_err();
        assert!(matches!(err, CoreError::Unsupported(_)));
    }

    #[test]
    fn resolve_missing_path() {
        let err =
            ArchiveHandle::resolve(Path::new("/definitely/not/here.zip"), &ZipArchiveProvider)
                .unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn zip_provider_lists_entries() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("a.zip");
        write_zip(&archive, &[("p1.jpg", b"12345"), ("ch1/p2.jpg", b"1")]);

        let mut entries = ZipArchiveProvider.list_entries(&archive).await.unwrap();
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].path, "ch1/p2.jpg");
        assert_eq!(entries[1].path, "p1.jpg");
        assert_eq!(entries[1].length, 5);
        assert!(!entries[1].is_directory);
    }

    #[tokio::test]
    async fn zip_provider_lists_nested_zip() {
        let tmp = TempDir::new().unwrap();
        let inner = zip_bytes(&[("deep.jpg", b"d")]);
        let archive = tmp.path().join("outer.zip");
        write_zip(&archive, &[("inner.zip", &inner)]);

        let entries = ZipArchiveProvider
            .list_entries(&archive.join("inner.zip"))
            .await
            .unwrap();
        assert_eq!(entries, vec![ArchiveEntry {
            path: "deep.jpg".to_string(),
            is_directory: false,
            length: 1,
            last_write_time: entries[0].last_write_time,
        }]);
    }

    #[test]
    fn zip_support_is_case_insensitive() {
        assert!(ZipArchiveProvider.is_supported(Path::new("/a/B.ZIP")));
        assert!(!ZipArchiveProvider.is_supported(Path::new("/a/b.rar")));
    }
}
