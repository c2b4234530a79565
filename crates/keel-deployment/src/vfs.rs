//! In-memory virtual file model
//!
//! Deployment content is a tree of files, directories and archives. An
//! archive is opaque until it is mounted: traversals treat it as a leaf, and
//! only the mount produces a directory view of its entries.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VirtualFile {
    File(Vec<u8>),
    Directory(BTreeMap<String, VirtualFile>),
    Archive(BTreeMap<String, VirtualFile>),
}

impl VirtualFile {
    pub fn file(content: impl Into<Vec<u8>>) -> Self {
        Self::File(content.into())
    }

    pub fn directory() -> Self {
        Self::Directory(BTreeMap::new())
    }

    pub fn archive() -> Self {
        Self::Archive(BTreeMap::new())
    }

    /// Add an entry to a directory or archive; files are returned unchanged
    pub fn with_entry(mut self, name: impl Into<String>, entry: VirtualFile) -> Self {
        if let Some(entries) = self.entries_mut() {
            entries.insert(name.into(), entry);
        }
        self
    }

    pub fn is_archive(&self) -> bool {
        matches!(self, Self::Archive(_))
    }

    pub fn is_directory(&self) -> bool {
        matches!(self, Self::Directory(_))
    }

    pub fn contents(&self) -> Option<&[u8]> {
        match self {
            Self::File(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Entries of a directory or archive
    pub fn entries(&self) -> Option<&BTreeMap<String, VirtualFile>> {
        match self {
            Self::Directory(entries) | Self::Archive(entries) => Some(entries),
            Self::File(_) => None,
        }
    }

    fn entries_mut(&mut self) -> Option<&mut BTreeMap<String, VirtualFile>> {
        match self {
            Self::Directory(entries) | Self::Archive(entries) => Some(entries),
            Self::File(_) => None,
        }
    }

    /// Resolve a `/`-separated path relative to this node.
    ///
    /// Only directories are traversed; a path reaching through an unmounted
    /// archive resolves to nothing.
    pub fn lookup(&self, path: &str) -> Option<&VirtualFile> {
        let mut current = self;
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            current = match current {
                Self::Directory(entries) => entries.get(segment)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Visit every leaf reachable through directories.
    ///
    /// Files and archives are leaves. Paths are relative to this node and
    /// visited in name order.
    pub fn visit_leaves(&self, visitor: &mut dyn FnMut(&str, &VirtualFile)) {
        if let Self::Directory(entries) | Self::Archive(entries) = self {
            visit(entries, "", visitor);
        }
    }
}

fn visit(
    entries: &BTreeMap<String, VirtualFile>,
    prefix: &str,
    visitor: &mut dyn FnMut(&str, &VirtualFile),
) {
    for (name, entry) in entries {
        let path = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{}/{}", prefix, name)
        };
        match entry {
            VirtualFile::Directory(children) => visit(children, &path, visitor),
            leaf => visitor(&path, leaf),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> VirtualFile {
        VirtualFile::archive()
            .with_entry(
                "META-INF",
                VirtualFile::directory()
                    .with_entry("MANIFEST.MF", VirtualFile::file("Manifest-Version: 1.0")),
            )
            .with_entry(
                "lib",
                VirtualFile::directory().with_entry(
                    "a.jar",
                    VirtualFile::archive().with_entry("b.jar", VirtualFile::archive()),
                ),
            )
    }

    #[test]
    fn test_lookup_traverses_directories_only() {
        let root = sample();
        assert!(root.lookup("META-INF/MANIFEST.MF").is_none());

        let view = VirtualFile::Directory(root.entries().unwrap().clone());
        assert_eq!(
            view.lookup("META-INF/MANIFEST.MF").and_then(VirtualFile::contents),
            Some("Manifest-Version: 1.0".as_bytes())
        );
        assert!(view.lookup("lib/a.jar").unwrap().is_archive());
        assert!(view.lookup("lib/a.jar/b.jar").is_none());
        assert_eq!(view.lookup(""), Some(&view));
    }

    #[test]
    fn test_visit_leaves_stops_at_archives() {
        let mut seen = Vec::new();
        sample().visit_leaves(&mut |path, _| seen.push(path.to_string()));
        assert_eq!(seen, vec!["META-INF/MANIFEST.MF", "lib/a.jar"]);
    }

    #[test]
    fn test_serde_shape() {
        let dir = VirtualFile::directory().with_entry("x", VirtualFile::file("1"));
        let json = serde_json::to_value(dir).unwrap();
        assert_eq!(json, serde_json::json!({"directory": {"x": {"file": [49]}}}));
    }
}
