use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{HealthError, Result};

/// Folder created by the quarantine mover. Never treated as a class.
pub const QUARANTINE_DIR: &str = "_quarantine";

/// A single file inside a class folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileEntry {
    pub path: PathBuf,
    pub size_bytes: u64,
}

impl FileEntry {
    pub fn new(path: impl Into<PathBuf>, size_bytes: u64) -> Self {
        Self {
            path: path.into(),
            size_bytes,
        }
    }

    /// Lowercase extension, if any.
    pub fn extension(&self) -> Option<String> {
        self.path
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
    }
}

/// One immediate subdirectory of the dataset root. Its files share one label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassFolder {
    pub name: String,
    pub path: PathBuf,
    pub files: Vec<FileEntry>,
}

impl ClassFolder {
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn total_bytes(&self) -> u64 {
        self.files.iter().map(|f| f.size_bytes).sum()
    }
}

/// Immutable model of a folder-per-class dataset.
///
/// Classes are in directory-listing order (sorted by name so the order is
/// stable across platforms); files within a class likewise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatasetTree {
    root_path: PathBuf,
    classes: Vec<ClassFolder>,
}

/// Identity of a visited directory, used to break symlink loops.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum DirIdentity {
    #[cfg(unix)]
    Inode { dev: u64, ino: u64 },
    #[cfg_attr(unix, allow(dead_code))]
    Canonical(PathBuf),
}

fn dir_identity(path: &Path, metadata: &fs::Metadata) -> Option<DirIdentity> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        let _ = path;
        Some(DirIdentity::Inode {
            dev: metadata.dev(),
            ino: metadata.ino(),
        })
    }
    #[cfg(not(unix))]
    {
        let _ = metadata;
        fs::canonicalize(path).ok().map(DirIdentity::Canonical)
    }
}

/// Sorted directory listing. Unreadable entries are skipped with a warning.
fn sorted_entries(dir: &Path) -> std::io::Result<Vec<fs::DirEntry>> {
    let mut entries: Vec<fs::DirEntry> = fs::read_dir(dir)?
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Skipping unreadable entry in {:?}: {}", dir, e);
                None
            }
        })
        .collect();
    entries.sort_by_key(|entry| entry.file_name());
    Ok(entries)
}

/// Resolve what an entry points at, honouring the symlink policy.
/// Returns `None` for entries that should be skipped.
fn resolve_metadata(path: &Path, follow_symlinks: bool) -> Option<fs::Metadata> {
    let link_meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(e) => {
            warn!("Cannot stat {:?}: {}", path, e);
            return None;
        }
    };
    if !link_meta.file_type().is_symlink() {
        return Some(link_meta);
    }
    if !follow_symlinks {
        debug!("Skipping symlink {:?}", path);
        return None;
    }
    match fs::metadata(path) {
        Ok(meta) => Some(meta),
        Err(e) => {
            warn!("Skipping broken symlink {:?}: {}", path, e);
            None
        }
    }
}

impl DatasetTree {
    /// Build the tree without following symlinks.
    pub fn build(root_path: &Path) -> Result<Self> {
        Self::build_with_options(root_path, false)
    }

    /// Walk `root_path`: each immediate subdirectory is a class, and every
    /// regular file below it (at any depth) belongs to that class.
    ///
    /// No file contents are read here; hashing and decoding happen lazily
    /// when checks ask for them.
    pub fn build_with_options(root_path: &Path, follow_symlinks: bool) -> Result<Self> {
        if !root_path.is_dir() {
            return Err(HealthError::not_found(root_path));
        }
        info!("Reading dataset from: {:?}", root_path);

        let mut visited = HashSet::new();
        if let Some(id) = fs::metadata(root_path)
            .ok()
            .and_then(|meta| dir_identity(root_path, &meta))
        {
            visited.insert(id);
        }

        let mut classes = Vec::new();
        let mut loose_files = 0usize;
        for entry in sorted_entries(root_path)? {
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().to_string();
            if name == QUARANTINE_DIR {
                debug!("Skipping quarantine folder {:?}", path);
                continue;
            }
            let Some(metadata) = resolve_metadata(&path, follow_symlinks) else {
                continue;
            };
            if !metadata.is_dir() {
                loose_files += 1;
                continue;
            }
            if let Some(id) = dir_identity(&path, &metadata) {
                if !visited.insert(id) {
                    warn!("Skipping {:?}: directory already visited", path);
                    continue;
                }
            }

            let mut files = Vec::new();
            collect_files(&path, follow_symlinks, &mut visited, &mut files);
            debug!("Class {:?}: {} files", name, files.len());
            classes.push(ClassFolder { name, path, files });
        }

        if loose_files > 0 {
            warn!(
                "Ignoring {} files directly under the dataset root (not in a class folder)",
                loose_files
            );
        }
        if classes.is_empty() {
            return Err(HealthError::empty_dataset(root_path));
        }

        let tree = Self {
            root_path: root_path.to_path_buf(),
            classes,
        };
        info!(
            "Found {} classes with {} files in {:?}",
            tree.classes.len(),
            tree.total_files(),
            root_path
        );
        Ok(tree)
    }

    /// Assemble a tree from already-known classes (custom loaders, tests).
    pub fn from_classes(root_path: impl Into<PathBuf>, classes: Vec<ClassFolder>) -> Self {
        Self {
            root_path: root_path.into(),
            classes,
        }
    }

    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    pub fn classes(&self) -> &[ClassFolder] {
        &self.classes
    }

    /// Every file in traversal order: classes in order, files in order within a class.
    pub fn files(&self) -> impl Iterator<Item = &FileEntry> {
        self.classes.iter().flat_map(|class| class.files.iter())
    }

    pub fn total_files(&self) -> usize {
        self.classes.iter().map(ClassFolder::file_count).sum()
    }

    pub fn total_bytes(&self) -> u64 {
        self.classes.iter().map(ClassFolder::total_bytes).sum()
    }

    /// Class a file belongs to, by path prefix.
    pub fn class_of(&self, path: &Path) -> Option<&ClassFolder> {
        self.classes.iter().find(|class| path.starts_with(&class.path))
    }
}

fn collect_files(
    dir: &Path,
    follow_symlinks: bool,
    visited: &mut HashSet<DirIdentity>,
    files: &mut Vec<FileEntry>,
) {
    let entries = match sorted_entries(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Failed to read directory {:?}: {}", dir, e);
            return;
        }
    };

    for entry in entries {
        let path = entry.path();
        let Some(metadata) = resolve_metadata(&path, follow_symlinks) else {
            continue;
        };
        if metadata.is_dir() {
            if let Some(id) = dir_identity(&path, &metadata) {
                if !visited.insert(id) {
                    warn!("Skipping {:?}: symlink loop or repeated directory", path);
                    continue;
                }
            }
            collect_files(&path, follow_symlinks, visited, files);
        } else if metadata.is_file() {
            files.push(FileEntry::new(path, metadata.len()));
        }
    }
}
