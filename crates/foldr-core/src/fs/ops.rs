//! Directory reading operations.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{CoreError, CoreResult};
use crate::item::{Attributes, FolderItem, ItemSource};
use crate::query::QueryPath;

/// Builds a [`FolderItem`] for the filesystem entry at `path`.
///
/// Symbolic links become shortcuts whose target is the resolved path; a
/// dangling link is reported as a file shortcut pointing at itself.
///
/// # Errors
///
/// - [`CoreError::NotFound`]: the path does not exist.
/// - [`CoreError::PermissionDenied`]: metadata access is denied.
pub fn item_from_path(place: &QueryPath, path: &Path) -> CoreResult<FolderItem> {
    let link_meta = std::fs::symlink_metadata(path).map_err(|e| CoreError::from_io(path, e))?;
    let name = path
        .file_name()
        .map(|n| crate::nfc_string(&n.to_string_lossy()))
        .unwrap_or_else(|| path.to_string_lossy().into_owned());

    let mut attributes = Attributes::empty();
    if platform_flags(&link_meta).system {
        attributes |= Attributes::SYSTEM;
    }
    let mut target = QueryPath::file(path);
    let metadata = if link_meta.is_symlink() {
        attributes |= Attributes::SHORTCUT;
        match std::fs::metadata(path) {
            Ok(resolved) => {
                if let Ok(real) = std::fs::canonicalize(path) {
                    target = QueryPath::file(real);
                }
                resolved
            }
            Err(_) => link_meta,
        }
    } else {
        link_meta
    };

    if metadata.is_dir() {
        attributes |= Attributes::DIRECTORY;
    }
    if metadata.permissions().readonly() {
        attributes |= Attributes::READ_ONLY;
    }

    Ok(FolderItem::new(name, place.clone(), target, attributes)
        .with_length(if metadata.is_dir() { 0 } else { metadata.len() })
        .with_last_write_time(metadata.modified().ok()))
}

/// Reads the immediate contents of a directory as [`FolderItem`]s placed in `place`.
///
/// The returned items are **unsorted** and unfiltered. Entries whose metadata
/// cannot be read are skipped.
///
/// # Errors
///
/// - [`CoreError::NotFound`]: the path does not exist.
/// - [`CoreError::NotADirectory`]: the path is not a directory.
/// - [`CoreError::PermissionDenied`]: read access is denied.
/// - [`CoreError::Io`]: any other I/O error.
pub fn read_directory(place: &QueryPath, path: &Path) -> CoreResult<Vec<FolderItem>> {
    if !path.exists() {
        return Err(CoreError::NotFound(path.to_path_buf()));
    }
    if !path.is_dir() {
        return Err(CoreError::NotADirectory(path.to_path_buf()));
    }

    let read_dir = std::fs::read_dir(path).map_err(|e| CoreError::from_io(path, e))?;

    let mut items = Vec::new();
    for dir_entry in read_dir {
        let dir_entry = match dir_entry {
            Ok(e) => e,
            Err(_) => continue,
        };
        match item_from_path(place, &dir_entry.path()) {
            Ok(item) => items.push(item),
            Err(e) => tracing::debug!("skipping {}: {e}", dir_entry.path().display()),
        }
    }

    Ok(items)
}

/// Lists the mounted volumes shown at the filesystem root.
#[cfg(windows)]
pub fn list_volumes(place: &QueryPath) -> Vec<FolderItem> {
    (b'A'..=b'Z')
        .map(|letter| format!("{}:\\", letter as char))
        .filter(|drive| Path::new(drive).exists())
        .map(|drive| volume_item(place, PathBuf::from(drive)))
        .collect()
}

/// Lists the mounted volumes shown at the filesystem root.
#[cfg(not(windows))]
pub fn list_volumes(place: &QueryPath) -> Vec<FolderItem> {
    vec![volume_item(place, PathBuf::from("/"))]
}

fn volume_item(place: &QueryPath, root: PathBuf) -> FolderItem {
    let name = root.to_string_lossy().into_owned();
    FolderItem::new(
        name,
        place.clone(),
        QueryPath::file(&root),
        Attributes::DIRECTORY | Attributes::DRIVE,
    )
    .with_source(ItemSource::Volume)
}

/// `true` if the name starts with `.`, or the platform marks the entry
/// hidden or system.
pub fn is_hidden(path: &Path) -> bool {
    let dotted = path
        .file_name()
        .map(|n| n.to_string_lossy().starts_with('.'))
        .unwrap_or(false);
    dotted || has_hidden_flag(path)
}

#[cfg(windows)]
fn has_hidden_flag(path: &Path) -> bool {
    std::fs::symlink_metadata(path)
        .map(|m| {
            let flags = platform_flags(&m);
            flags.hidden || flags.system
        })
        .unwrap_or(false)
}

#[cfg(not(windows))]
fn has_hidden_flag(_path: &Path) -> bool {
    false
}

#[derive(Debug, Default, Clone, Copy)]
struct PlatformFlags {
    #[cfg_attr(not(windows), allow(dead_code))]
    hidden: bool,
    system: bool,
}

#[cfg(windows)]
fn platform_flags(metadata: &std::fs::Metadata) -> PlatformFlags {
    use std::os::windows::fs::MetadataExt;
    const FILE_ATTRIBUTE_HIDDEN: u32 = 0x2;
    const FILE_ATTRIBUTE_SYSTEM: u32 = 0x4;
    let bits = metadata.file_attributes();
    PlatformFlags {
        hidden: bits & FILE_ATTRIBUTE_HIDDEN != 0,
        system: bits & FILE_ATTRIBUTE_SYSTEM != 0,
    }
}

#[cfg(not(windows))]
fn platform_flags(_metadata: &std::fs::Metadata) -> PlatformFlags {
    PlatformFlags::default()
}

fn multi_part_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^(?P<base>.+)\.part(?P<part>\d+)\.rar$").expect("static pattern")
    })
}

/// `false` only for the second and later volumes of a multi-part archive
/// set (`name.partN.rar` with `N > 1`).
pub fn is_first_archive_part(name: &str) -> bool {
    match multi_part_pattern().captures(name) {
        Some(caps) => caps["part"]
            .parse::<u64>()
            .map(|part| part <= 1)
            .unwrap_or(true),
        None => true,
    }
}

/// Runs blocking filesystem work on tokio's blocking pool.
pub(crate) async fn run_blocking<T, F>(work: F) -> CoreResult<T>
where
    F: FnOnce() -> CoreResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| CoreError::Io(std::io::Error::other(e)))?
}

/// Walks up from `path` until an existing directory is found.
pub fn nearest_existing_directory(path: &Path) -> Option<PathBuf> {
    path.ancestors()
        .find(|p| !p.as_os_str().is_empty() && p.is_dir())
        .map(Path::to_path_buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn read_directory_returns_items_with_place() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.txt"), "hello").unwrap();
        fs::create_dir(tmp.path().join("sub")).unwrap();
        let place = QueryPath::file(tmp.path());

        let mut items = read_directory(&place, tmp.path()).unwrap();
        items.sort_by_key(|i| i.name());

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].name(), "a.txt");
        assert_eq!(items[0].length(), 5);
        assert!(!items[0].is_directory());
        assert_eq!(items[0].place(), &place);
        assert_eq!(items[1].name(), "sub");
        assert!(items[1].is_directory());
        assert_eq!(items[1].length(), 0);
    }

    #[test]
    fn read_directory_nonexistent() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("missing");
        let err = read_directory(&QueryPath::file(&missing), &missing).unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }

    #[test]
    fn read_directory_on_file() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("f.txt");
        fs::write(&file, "").unwrap();
        let err = read_directory(&QueryPath::file(&file), &file).unwrap_err();
        assert!(matches!(err, CoreError::NotADirectory(_)));
    }

    #[cfg(unix)]
    #[test]
    fn symlink_to_directory_is_directory_shortcut() {
        let tmp = TempDir::new().unwrap();
        let real = tmp.path().join("real");
        fs::create_dir(&real).unwrap();
        let link = tmp.path().join("link");
        std::os::unix::fs::symlink(&real, &link).unwrap();

        let item = item_from_path(&QueryPath::file(tmp.path()), &link).unwrap();
        assert_eq!(item.item_type(), crate::item::ItemType::DirectoryShortcut);
        assert_eq!(item.name(), "link");
        assert!(item.targets(&fs::canonicalize(&real).unwrap()));
    }

    #[test]
    fn volumes_are_drives() {
        let volumes = list_volumes(&QueryPath::file(""));
        assert!(!volumes.is_empty());
        assert!(volumes
            .iter()
            .all(|v| v.attributes().contains(Attributes::DRIVE) && v.is_directory()));
    }

    #[test]
    fn hidden_detection() {
        assert!(is_hidden(Path::new("/a/.secret")));
        assert!(!is_hidden(Path::new("/a/visible")));
    }

    #[test]
    fn plain_entries_are_not_system() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("plain.txt");
        fs::write(&path, "").unwrap();
        assert!(!is_hidden(&path));
        let item = item_from_path(&QueryPath::file(tmp.path()), &path).unwrap();
        assert!(!item.attributes().contains(Attributes::SYSTEM));
    }

    #[cfg(windows)]
    #[test]
    fn windows_attributes_hide_entries() {
        use std::os::windows::fs::OpenOptionsExt;
        let tmp = TempDir::new().unwrap();
        let hidden = tmp.path().join("hidden.txt");
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .attributes(0x2)
            .open(&hidden)
            .unwrap();
        assert!(is_hidden(&hidden));

        let system = tmp.path().join("system.txt");
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .attributes(0x4)
            .open(&system)
            .unwrap();
        assert!(is_hidden(&system));
        let item = item_from_path(&QueryPath::file(tmp.path()), &system).unwrap();
        assert!(item.attributes().contains(Attributes::SYSTEM));
    }

    #[test]
    fn multi_part_archives_keep_first_part() {
        assert!(is_first_archive_part("book.part1.rar"));
        assert!(is_first_archive_part("book.part01.rar"));
        assert!(!is_first_archive_part("book.part2.rar"));
        assert!(!is_first_archive_part("BOOK.PART10.RAR"));
        assert!(is_first_archive_part("book.rar"));
        assert!(is_first_archive_part("part2.jpg"));
    }

    #[test]
    fn nearest_existing_directory_walks_up() {
        let tmp = TempDir::new().unwrap();
        let deep = tmp.path().join("a.zip").join("inner").join("x.jpg");
        assert_eq!(nearest_existing_directory(&deep).unwrap(), tmp.path());
    }
}
