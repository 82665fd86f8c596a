//! Pluggable producers of content for virtual (generator-backed) resource paths.
//!
//! A generator is consulted through its [`PathMatcher`]: prefix matchers claim paths of
//! the form `prefix:rest`, suffix matchers claim file extensions (`.scss`), and pattern
//! matchers claim whatever their regex accepts. The [`GeneratorRegistry`] tries
//! generators in registration order, and [`CachedGenerator`] makes any generator cheap to
//! call again across process restarts.

mod cached;
mod mapping;
mod registry;

use std::path::Path;

use regex::Regex;

use crate::error::BoxError;
use crate::reader::ResourceReader;

pub use cached::{CacheMode, CachedGenerator, GeneratorCacheConfig};
pub use mapping::CacheMapping;
pub use registry::{DEFAULT_GENERATION_PATH, GenerationScope, GeneratorEntry, GeneratorRegistry};

/// Separator between a generator prefix and the generated resource path.
pub const PREFIX_SEPARATOR: char = ':';

/// Outcome of a generator call: `Ok(None)` means nothing exists for the path.
pub type GenerateResult = std::result::Result<Option<String>, BoxError>;

/// Decides whether a generator applies to a path.
#[derive(Debug, Clone)]
pub enum PathMatcher {
  /// Matches `prefix:rest` paths.
  Prefix(String),
  /// Matches paths ending with the suffix.
  Suffix(String),
  /// Matches paths accepted by the regex.
  Pattern(Regex),
}

impl PathMatcher {
  /// Matcher for `prefix:rest` paths.
  pub fn prefix(prefix: impl Into<String>) -> Self {
    Self::Prefix(prefix.into())
  }

  /// Matcher for paths ending with `suffix`.
  pub fn suffix(suffix: impl Into<String>) -> Self {
    Self::Suffix(suffix.into())
  }

  /// Matcher for paths accepted by `pattern`.
  pub fn pattern(pattern: &str) -> Result<Self, regex::Error> {
    Regex::new(pattern).map(Self::Pattern)
  }

  /// Returns `true` when the generator owning this matcher handles `path`.
  pub fn matches(&self, path: &str) -> bool {
    match self {
      Self::Prefix(prefix) => split_generator_prefix(path).is_some_and(|(p, _)| p == prefix),
      Self::Suffix(suffix) => path.ends_with(suffix.as_str()),
      Self::Pattern(regex) => regex.is_match(path),
    }
  }

  /// The path handed to the generator: prefix matchers strip their `prefix:` marker.
  pub fn resource_path<'a>(&self, path: &'a str) -> &'a str {
    match self {
      Self::Prefix(_) => split_generator_prefix(path).map_or(path, |(_, rest)| rest),
      Self::Suffix(_) | Self::Pattern(_) => path,
    }
  }

  /// The registered prefix, for prefix matchers.
  pub fn generator_prefix(&self) -> Option<&str> {
    match self {
      Self::Prefix(prefix) => Some(prefix),
      Self::Suffix(_) | Self::Pattern(_) => None,
    }
  }
}

/// Split `prefix:rest` into its parts, ignoring a single leading separator.
pub fn split_generator_prefix(path: &str) -> Option<(&str, &str)> {
  let path = path.strip_prefix('/').unwrap_or(path);
  let index = path.find(PREFIX_SEPARATOR)?;
  let prefix = &path[..index];
  if prefix.is_empty() || prefix.contains('/') {
    return None;
  }
  Some((prefix, &path[index + 1..]))
}

/// Everything a generator needs to produce one resource.
#[derive(Clone, Copy)]
pub struct GeneratorContext<'a> {
  /// Path as requested, including any generator prefix.
  pub requested_path: &'a str,
  /// Path after the matcher stripped its marker.
  pub path: &'a str,
  /// Identity of the bundle being assembled.
  pub bundle: &'a str,
  /// Charset the produced text is served with.
  pub charset: &'a str,
  /// Reader for source resources.
  pub reader: &'a dyn ResourceReader,
  /// Whether the application runs in debug mode.
  pub debug_mode: bool,
}

impl std::fmt::Debug for GeneratorContext<'_> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("GeneratorContext")
      .field("requested_path", &self.requested_path)
      .field("path", &self.path)
      .field("bundle", &self.bundle)
      .field("charset", &self.charset)
      .field("debug_mode", &self.debug_mode)
      .finish_non_exhaustive()
  }
}

/// A content producer for virtual resource paths.
pub trait Generator: Send + Sync {
  /// Human readable generator name used in logs.
  fn name(&self) -> &str;

  /// Matcher deciding which paths this generator handles.
  fn matcher(&self) -> &PathMatcher;

  /// Produce the resource, `Ok(None)` when the source does not exist.
  fn generate(&self, context: &GeneratorContext<'_>) -> GenerateResult;

  /// Whether images referenced by generated stylesheets are served through this generator.
  fn handles_css_images(&self) -> bool {
    false
  }

  /// Request path used to serve generated content in debug mode.
  fn debug_path(&self) -> Option<&str> {
    None
  }

  /// Mapping file persisted by this generator, if it caches its output.
  fn cache_mapping_file(&self) -> Option<&Path> {
    None
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn prefix_matchers_claim_marked_paths_only() {
    let matcher = PathMatcher::prefix("jar");
    assert!(matcher.matches("jar:/css/site.css"));
    assert!(matcher.matches("/jar:css/site.css"));
    assert!(!matcher.matches("webjars:/css/site.css"));
    assert!(!matcher.matches("/css/jar:site.css"));
    assert_eq!(matcher.resource_path("jar:/css/site.css"), "/css/site.css");
    assert_eq!(matcher.generator_prefix(), Some("jar"));
  }

  #[test]
  fn suffix_and_pattern_matchers_keep_the_path() {
    let suffix = PathMatcher::suffix(".scss");
    assert!(suffix.matches("/css/theme.scss"));
    assert_eq!(suffix.resource_path("/css/theme.scss"), "/css/theme.scss");
    assert_eq!(suffix.generator_prefix(), None);

    let pattern = PathMatcher::pattern(r"^/i18n/.*\.properties$").unwrap();
    assert!(pattern.matches("/i18n/messages.properties"));
    assert!(!pattern.matches("/js/messages.properties"));
  }

  #[test]
  fn splits_generator_prefixes() {
    assert_eq!(split_generator_prefix("jar:/a.css"), Some(("jar", "/a.css")));
    assert_eq!(split_generator_prefix("/jar:a.css"), Some(("jar", "a.css")));
    assert_eq!(split_generator_prefix("/a.css"), None);
    assert_eq!(split_generator_prefix(":a.css"), None);
  }
}
