//! Narrow resource reader contract consulted by generators and the CSS rewriter.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::paths::is_normalized;

/// Directory prefixes never served as raw streams.
const PROTECTED_DIR_PREFIXES: [&str; 2] = ["/WEB-INF/", "/META-INF/"];

/// Read access to the resources behind logical paths.
pub trait ResourceReader: Send + Sync {
  /// Textual content of the resource, `None` when it does not exist.
  fn get_resource(&self, path: &str) -> Option<String>;

  /// Raw byte stream of the resource.
  fn get_resource_as_stream(&self, path: &str) -> Option<Box<dyn Read + Send>>;

  /// Names of the entries directly under `dir_path`; directories end with `/`.
  fn get_resource_names(&self, dir_path: &str) -> BTreeSet<String>;

  /// Returns `true` when `path` designates a non-empty directory.
  fn is_directory(&self, path: &str) -> bool;

  /// Physical location of the resource, if it is backed by a file.
  fn get_file_path(&self, path: &str) -> Option<PathBuf>;
}

/// Reader serving resources from a directory on disk.
#[derive(Debug, Clone)]
pub struct FileSystemReader {
  root: PathBuf,
}

impl FileSystemReader {
  /// Create a reader rooted at `root`.
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  /// Root directory of this reader.
  pub fn root(&self) -> &Path {
    &self.root
  }

  /// Map a logical path onto the filesystem.
  ///
  /// Generator paths (`prefix:rest`) are never backed by files, and paths carrying dot
  /// segments are refused so that a request cannot walk out of the root.
  fn resolve(&self, path: &str) -> Option<PathBuf> {
    if path.contains(':') {
      return None;
    }
    if !is_normalized(path) {
      debug!(path, "refusing non-normalized resource path");
      return None;
    }

    let relative = path.trim_start_matches('/');
    if relative.is_empty() {
      return Some(self.root.clone());
    }
    Some(self.root.join(relative))
  }

  fn is_access_permitted(path: &str) -> bool {
    let absolute = if path.starts_with('/') {
      path.to_string()
    } else {
      format!("/{path}")
    };
    !PROTECTED_DIR_PREFIXES
      .iter()
      .any(|prefix| absolute.starts_with(prefix))
  }
}

impl ResourceReader for FileSystemReader {
  fn get_resource(&self, path: &str) -> Option<String> {
    let file = self.resolve(path)?;
    if !file.is_file() {
      return None;
    }
    fs::read_to_string(&file).ok()
  }

  fn get_resource_as_stream(&self, path: &str) -> Option<Box<dyn Read + Send>> {
    if !Self::is_access_permitted(path) {
      return None;
    }
    let file = self.resolve(path)?;
    if !file.is_file() {
      return None;
    }
    let handle = fs::File::open(&file).ok()?;
    Some(Box::new(handle))
  }

  fn get_resource_names(&self, dir_path: &str) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    let Some(dir) = self.resolve(dir_path) else {
      return names;
    };
    let Ok(entries) = fs::read_dir(&dir) else {
      return names;
    };

    for entry in entries.flatten() {
      let name = entry.file_name().to_string_lossy().to_string();
      if entry.file_type().is_ok_and(|ft| ft.is_dir()) {
        names.insert(format!("{name}/"));
      } else {
        names.insert(name);
      }
    }
    names
  }

  fn is_directory(&self, path: &str) -> bool {
    self
      .resolve(path)
      .and_then(|dir| fs::read_dir(dir).ok())
      .is_some_and(|mut entries| entries.next().is_some())
  }

  fn get_file_path(&self, path: &str) -> Option<PathBuf> {
    self.resolve(path).filter(|file| file.exists())
  }
}

/// Reader over an in-memory map of absolute logical paths to content.
#[derive(Debug, Clone, Default)]
pub struct MemoryReader {
  resources: BTreeMap<String, Vec<u8>>,
}

impl MemoryReader {
  /// Create an empty reader.
  pub fn new() -> Self {
    Self::default()
  }

  /// Add or replace a resource.
  pub fn with(mut self, path: &str, content: impl Into<Vec<u8>>) -> Self {
    self.insert(path, content);
    self
  }

  /// Add or replace a resource.
  pub fn insert(&mut self, path: &str, content: impl Into<Vec<u8>>) {
    self
      .resources
      .insert(crate::paths::as_path(path), content.into());
  }

  fn dir_prefix(dir_path: &str) -> String {
    crate::paths::as_dir_path(dir_path)
  }
}

impl ResourceReader for MemoryReader {
  fn get_resource(&self, path: &str) -> Option<String> {
    let bytes = self.resources.get(&crate::paths::as_path(path))?;
    String::from_utf8(bytes.clone()).ok()
  }

  fn get_resource_as_stream(&self, path: &str) -> Option<Box<dyn Read + Send>> {
    let bytes = self.resources.get(&crate::paths::as_path(path))?;
    Some(Box::new(Cursor::new(bytes.clone())))
  }

  fn get_resource_names(&self, dir_path: &str) -> BTreeSet<String> {
    let prefix = Self::dir_prefix(dir_path);
    self
      .resources
      .keys()
      .filter_map(|key| key.strip_prefix(prefix.as_str()))
      .map(|rest| match rest.find('/') {
        Some(index) => rest[..=index].to_string(),
        None => rest.to_string(),
      })
      .collect()
  }

  fn is_directory(&self, path: &str) -> bool {
    let prefix = Self::dir_prefix(path);
    self.resources.keys().any(|key| key.starts_with(&prefix))
  }

  fn get_file_path(&self, _path: &str) -> Option<PathBuf> {
    None
  }
}
