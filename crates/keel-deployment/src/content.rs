//! Content repositories
//!
//! Deployments refer to their content by hash. The in-memory repository is
//! what tests and embedders use; the directory repository serves an exploded
//! content tree on disk.

use crate::error::ContentError;
use crate::vfs::VirtualFile;
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Directory name suffixes treated as archives
pub const ARCHIVE_SUFFIXES: &[&str] = &[".jar", ".war", ".ear", ".rar", ".sar"];

pub trait ContentRepository: Send + Sync {
    fn get(&self, hash: &str) -> Result<VirtualFile, ContentError>;

    fn contains(&self, hash: &str) -> bool;
}

/// Hex blake3 digest of the canonical JSON form of `content`
pub fn content_hash(content: &VirtualFile) -> Result<String, ContentError> {
    let bytes = serde_json::to_vec(content)?;
    Ok(hex::encode(blake3::hash(&bytes).as_bytes()))
}

#[derive(Debug, Default)]
pub struct InMemoryContentRepository {
    content: DashMap<String, VirtualFile>,
}

impl InMemoryContentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `content`; returns its hash
    pub fn add(&self, content: VirtualFile) -> Result<String, ContentError> {
        let hash = content_hash(&content)?;
        debug!(hash = %hash, "Content added");
        self.content.insert(hash.clone(), content);
        Ok(hash)
    }

    pub fn remove(&self, hash: &str) -> Option<VirtualFile> {
        self.content.remove(hash).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

impl ContentRepository for InMemoryContentRepository {
    fn get(&self, hash: &str) -> Result<VirtualFile, ContentError> {
        self.content
            .get(hash)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ContentError::NotFound(hash.to_string()))
    }

    fn contains(&self, hash: &str) -> bool {
        self.content.contains_key(hash)
    }
}

/// Exploded deployments under one directory
///
/// Each top-level entry of the root is one deployment, named after the entry.
/// Content is re-read from disk on every `get`; the hash recorded at open
/// time identifies which entry to read.
#[derive(Debug)]
pub struct DirectoryContentRepository {
    root: PathBuf,
    by_hash: BTreeMap<String, PathBuf>,
    by_name: BTreeMap<String, String>,
}

impl DirectoryContentRepository {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, ContentError> {
        let root = root.into();
        let mut by_hash = BTreeMap::new();
        let mut by_name = BTreeMap::new();
        for entry in read_dir_sorted(&root)? {
            let Some(name) = entry.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
                continue;
            };
            let hash = content_hash(&load(&entry)?)?;
            by_hash.insert(hash.clone(), entry);
            by_name.insert(name, hash);
        }
        info!(root = %root.display(), deployments = by_name.len(), "Content directory scanned");
        Ok(Self {
            root,
            by_hash,
            by_name,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `(deployment name, content hash)`, sorted by name
    pub fn entries(&self) -> Vec<(String, String)> {
        self.by_name
            .iter()
            .map(|(name, hash)| (name.clone(), hash.clone()))
            .collect()
    }

    pub fn hash_of(&self, name: &str) -> Option<&str> {
        self.by_name.get(name).map(String::as_str)
    }
}

impl ContentRepository for DirectoryContentRepository {
    fn get(&self, hash: &str) -> Result<VirtualFile, ContentError> {
        let path = self
            .by_hash
            .get(hash)
            .ok_or_else(|| ContentError::NotFound(hash.to_string()))?;
        load(path)
    }

    fn contains(&self, hash: &str) -> bool {
        self.by_hash.contains_key(hash)
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> ContentError + '_ {
    move |source| ContentError::Io {
        path: path.display().to_string(),
        source,
    }
}

fn read_dir_sorted(dir: &Path) -> Result<Vec<PathBuf>, ContentError> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_error(dir))? {
        entries.push(entry.map_err(io_error(dir))?.path());
    }
    entries.sort();
    Ok(entries)
}

fn is_archive_name(name: &str) -> bool {
    ARCHIVE_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
}

/// Read a file or directory tree into a [`VirtualFile`]
fn load(path: &Path) -> Result<VirtualFile, ContentError> {
    let metadata = fs::metadata(path).map_err(io_error(path))?;
    if !metadata.is_dir() {
        return fs::read(path).map(VirtualFile::File).map_err(io_error(path));
    }

    let mut entries = BTreeMap::new();
    for child in read_dir_sorted(path)? {
        if let Some(name) = child.file_name().and_then(|n| n.to_str()) {
            entries.insert(name.to_string(), load(&child)?);
        }
    }
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    Ok(if is_archive_name(name) {
        VirtualFile::Archive(entries)
    } else {
        VirtualFile::Directory(entries)
    })
}
