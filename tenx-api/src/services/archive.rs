//! Source file extraction from repository archives
//!
//! Works on the in-memory zipball. The archive's top-level folder
//! (`<owner>-<repo>-<sha>/` for GitHub) is dropped so paths are relative to
//! the repository root.

use std::io::{Cursor, Read};
use thiserror::Error;
use zip::ZipArchive;

/// Directories never descended into
pub const IGNORED_DIRS: &[&str] = &[
    "node_modules",
    ".git",
    "dist",
    "build",
    "target",
    "vendor",
    ".next",
    "__pycache__",
    "coverage",
];

const LOCK_FILES: &[&str] = &[
    "package-lock.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    "Cargo.lock",
    "poetry.lock",
    "Pipfile.lock",
    "Gemfile.lock",
    "composer.lock",
    "go.sum",
    "bun.lockb",
];

const BINARY_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "bmp", "ico", "webp", "svg", "tiff", "psd", "pdf", "zip", "gz",
    "tgz", "tar", "rar", "7z", "bz2", "xz", "jar", "war", "class", "exe", "dll", "so", "dylib",
    "a", "o", "obj", "lib", "bin", "wasm", "pyc", "pyo", "mp3", "mp4", "wav", "ogg", "flac", "avi",
    "mov", "webm", "woff", "woff2", "ttf", "otf", "eot", "sqlite", "db", "min.js", "map",
];

/// Archive extraction errors
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Failed to open archive: {0}")]
    OpenFailed(String),

    #[error("Failed to read archive entry: {0}")]
    ReadEntry(String),

    #[error("Archive contains no usable source files")]
    Empty,
}

impl From<zip::result::ZipError> for ArchiveError {
    fn from(e: zip::result::ZipError) -> Self {
        ArchiveError::ReadEntry(e.to_string())
    }
}

/// Extraction limits
#[derive(Debug, Clone, Copy)]
pub struct ExtractLimits {
    pub max_file_bytes: u64,
    pub max_files: usize,
}

/// Source file read from the archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Path relative to the repository root, `/` separated
    pub path: String,
    pub content: String,
}

impl SourceFile {
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// Lowercased extension without the dot
    pub fn extension(&self) -> Option<String> {
        let name = self.file_name();
        name.rsplit_once('.')
            .filter(|(stem, _)| !stem.is_empty())
            .map(|(_, ext)| ext.to_ascii_lowercase())
    }
}

/// Extraction outcome
#[derive(Debug, Default)]
pub struct ExtractedRepo {
    /// Kept files, sorted by path
    pub files: Vec<SourceFile>,
    /// Entries skipped by the filters
    pub skipped: usize,
    /// Files dropped after `max_files` was reached
    pub truncated: usize,
}

/// Extract text source files from zip bytes
pub fn extract_source_files(bytes: &[u8], limits: ExtractLimits) -> Result<ExtractedRepo, ArchiveError> {
    let mut archive =
        ZipArchive::new(Cursor::new(bytes)).map_err(|e| ArchiveError::OpenFailed(e.to_string()))?;

    let names: Vec<String> = archive.file_names().map(str::to_string).collect();
    let prefix = common_root(&names);

    let mut out = ExtractedRepo::default();
    let mut candidates: Vec<(usize, String)> = Vec::new();

    for i in 0..archive.len() {
        let entry = archive.by_index(i)?;
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_string();
        let relative = match &prefix {
            Some(p) => name.strip_prefix(p.as_str()).unwrap_or(&name).to_string(),
            None => name,
        };

        if relative.is_empty() || entry.enclosed_name().is_none() {
            out.skipped += 1;
            continue;
        }
        if !should_keep(&relative) || entry.size() > limits.max_file_bytes {
            out.skipped += 1;
            continue;
        }
        candidates.push((i, relative));
    }

    candidates.sort_by(|a, b| a.1.cmp(&b.1));

    for (index, path) in candidates {
        if out.files.len() >= limits.max_files {
            out.truncated += 1;
            continue;
        }

        let entry = archive.by_index(index)?;
        let mut buf = Vec::new();
        // Declared sizes can lie; never read past the limit
        entry
            .take(limits.max_file_bytes + 1)
            .read_to_end(&mut buf)
            .map_err(|e| ArchiveError::ReadEntry(e.to_string()))?;
        if buf.len() as u64 > limits.max_file_bytes {
            out.skipped += 1;
            continue;
        }

        match String::from_utf8(buf) {
            Ok(content) if !content.contains('\0') => out.files.push(SourceFile { path, content }),
            _ => out.skipped += 1,
        }
    }

    if out.files.is_empty() {
        return Err(ArchiveError::Empty);
    }

    tracing::debug!(
        kept = out.files.len(),
        skipped = out.skipped,
        truncated = out.truncated,
        "Archive extracted"
    );
    Ok(out)
}

/// `root/` when every entry lives under the same top-level folder
fn common_root(names: &[String]) -> Option<String> {
    let first = names.first()?;
    let (root, _) = first.split_once('/')?;
    let prefix = format!("{}/", root);
    names
        .iter()
        .all(|n| n.starts_with(&prefix) || n == root)
        .then_some(prefix)
}

/// Path filter: ignored directories, lock files and binary extensions
pub fn should_keep(path: &str) -> bool {
    let components: Vec<&str> = path.split('/').collect();
    let Some((file_name, dirs)) = components.split_last() else {
        return false;
    };

    if dirs.iter().any(|d| IGNORED_DIRS.contains(d)) {
        return false;
    }
    if file_name.is_empty() || *file_name == ".DS_Store" || LOCK_FILES.contains(file_name) {
        return false;
    }

    let lower = file_name.to_ascii_lowercase();
    !BINARY_EXTENSIONS
        .iter()
        .any(|ext| lower.ends_with(&format!(".{}", ext)))
}
