//! Persistent `logical path -> content hash` mapping owned by one cached generator.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use tracing::{debug, warn};

use crate::hash::ContentHash;

const MAPPING_HEADER: &str = "# generated resource cache mapping: <logical path>=<content hash>";

/// Line-oriented mapping persisted as `path=hash`.
///
/// Paths are escaped on disk (`\\`, `\n`, `\r`, `\t` and a leading `\#`) so any key
/// reads back as written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheMapping {
  entries: BTreeMap<String, ContentHash>,
}

impl CacheMapping {
  /// Load a mapping file.
  ///
  /// A missing file is an empty mapping. An unreadable or corrupt file is logged and also
  /// treated as empty, so every resource is generated again.
  pub fn load(path: &Path) -> Self {
    let content = match fs::read_to_string(path) {
      Ok(content) => content,
      Err(err) if err.kind() == ErrorKind::NotFound => {
        debug!(path = %path.display(), "no cache mapping yet");
        return Self::default();
      }
      Err(err) => {
        warn!(path = %path.display(), error = %err, "unable to read cache mapping, starting empty");
        return Self::default();
      }
    };

    Self::parse(&content).unwrap_or_else(|| {
      warn!(path = %path.display(), "corrupt cache mapping, starting empty");
      Self::default()
    })
  }

  /// Parse mapping text; `None` when any line is malformed.
  pub fn parse(content: &str) -> Option<Self> {
    let mut entries = BTreeMap::new();
    for line in content.lines() {
      if line.trim().is_empty() || line.starts_with('#') {
        continue;
      }
      let (path, hash) = line.rsplit_once('=')?;
      if path.is_empty() {
        return None;
      }
      entries.insert(unescape_key(path)?, ContentHash::from_hex(hash.trim())?);
    }
    Some(Self { entries })
  }

  /// Serialise to the on-disk format.
  pub fn to_file_contents(&self) -> String {
    let mut out = String::from(MAPPING_HEADER);
    out.push('\n');
    for (path, hash) in &self.entries {
      escape_key(path, &mut out);
      out.push('=');
      out.push_str(&hash.to_hex());
      out.push('\n');
    }
    out
  }

  /// Hash recorded for `path`.
  pub fn get(&self, path: &str) -> Option<ContentHash> {
    self.entries.get(path).copied()
  }

  /// Record the hash for `path`, returning the previous one.
  pub fn insert(&mut self, path: &str, hash: ContentHash) -> Option<ContentHash> {
    self.entries.insert(path.to_string(), hash)
  }

  /// Forget `path`.
  pub fn remove(&mut self, path: &str) -> Option<ContentHash> {
    self.entries.remove(path)
  }

  /// Forget every entry.
  pub fn clear(&mut self) {
    self.entries.clear();
  }

  /// Number of entries.
  pub fn len(&self) -> usize {
    self.entries.len()
  }

  /// Returns `true` when nothing is mapped.
  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }
}

fn escape_key(key: &str, out: &mut String) {
  for (index, ch) in key.chars().enumerate() {
    match ch {
      '\\' => out.push_str("\\\\"),
      '\n' => out.push_str("\\n"),
      '\r' => out.push_str("\\r"),
      '\t' => out.push_str("\\t"),
      '#' if index == 0 => out.push_str("\\#"),
      ch => out.push(ch),
    }
  }
}

fn unescape_key(escaped: &str) -> Option<String> {
  let mut key = String::with_capacity(escaped.len());
  let mut chars = escaped.chars();
  while let Some(ch) = chars.next() {
    if ch != '\\' {
      key.push(ch);
      continue;
    }
    key.push(match chars.next()? {
      '\\' => '\\',
      'n' => '\n',
      'r' => '\r',
      't' => '\t',
      '#' => '#',
      _ => return None,
    });
  }
  Some(key)
}
