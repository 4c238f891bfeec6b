use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// How a discovered file is turned into documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// Plain text or markdown, decoded as UTF-8.
    Text,
    /// PDF, extracted page by page.
    Pdf,
}

impl FileKind {
    /// Classify a path by its (case-insensitive) extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Some(Self::Pdf),
            "txt" | "md" | "markdown" => Some(Self::Text),
            _ => None,
        }
    }
}

/// A discovered document file.
#[derive(Debug, Clone)]
pub struct DiscoveredFile {
    /// Path relative to the data directory.
    pub relative_path: PathBuf,
    /// Fully resolved absolute path.
    pub absolute_path: PathBuf,
    pub kind: FileKind,
}

impl DiscoveredFile {
    /// The file's base name, used in progress output and citations.
    pub fn file_name(&self) -> String {
        self.absolute_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.relative_path.display().to_string())
    }
}

/// Recursively walk a directory and discover eligible document files.
///
/// Hidden files and directories are included like any other entry. Only
/// `.pdf`, `.txt`, `.md` and `.markdown` files are returned, sorted by
/// relative path.
///
/// Fails with [`Error::NotFound`] when `root` is missing and with
/// [`Error::Empty`] when nothing supported was found.
pub fn discover_files(root: &Path) -> Result<Vec<DiscoveredFile>> {
    if !root.is_dir() {
        return Err(Error::NotFound {
            kind: "data directory",
            name: root.display().to_string(),
        });
    }

    let canonical_root = root.canonicalize()?;
    let mut results = Vec::new();
    walk_dir(&canonical_root, &canonical_root, &mut results)?;

    if results.is_empty() {
        return Err(Error::Empty {
            dir: root.to_path_buf(),
        });
    }

    results.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    Ok(results)
}

fn walk_dir(
    root: &Path,
    current: &Path,
    results: &mut Vec<DiscoveredFile>,
) -> Result<()> {
    let entries = std::fs::read_dir(current)?;

    for entry in entries {
        let entry = entry?;
        let file_type = entry.file_type()?;

        if file_type.is_dir() {
            walk_dir(root, &entry.path(), results)?;
        } else if file_type.is_symlink() {
            let resolved = match entry.path().canonicalize() {
                Ok(p) => p,
                Err(_) => continue, // Skip broken symlinks
            };
            // Never follow directory symlinks (cycle prevention).
            if resolved.is_dir() {
                continue;
            }
            if resolved.is_file()
                && let Some(kind) = FileKind::from_path(&entry.path())
            {
                results.push(make_discovered(
                    root,
                    &entry.path(),
                    &resolved,
                    kind,
                ));
            }
        } else if file_type.is_file()
            && let Some(kind) = FileKind::from_path(&entry.path())
        {
            let abs = entry.path().canonicalize()?;
            results.push(make_discovered(root, &entry.path(), &abs, kind));
        }
    }

    Ok(())
}

fn make_discovered(
    root: &Path,
    original_path: &Path,
    absolute_path: &Path,
    kind: FileKind,
) -> DiscoveredFile {
    let relative_path = original_path
        .strip_prefix(root)
        .unwrap_or(original_path)
        .to_path_buf();

    DiscoveredFile {
        relative_path,
        absolute_path: absolute_path.to_path_buf(),
        kind,
    }
}
