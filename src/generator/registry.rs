use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;

use super::{Generator, GeneratorContext, PathMatcher, split_generator_prefix};
use crate::error::{BundleError, Result};
use crate::reader::ResourceReader;

/// Request path used for debug-mode generation when a generator declares none.
pub const DEFAULT_GENERATION_PATH: &str = "/bundlepath_generator";

/// A registered generator.
#[derive(Clone)]
pub struct GeneratorEntry {
  generator: Arc<dyn Generator>,
}

impl GeneratorEntry {
  /// Prefix under which the generator was registered, for prefix matchers.
  pub fn prefix(&self) -> Option<&str> {
    self.generator.matcher().generator_prefix()
  }

  /// Matcher deciding applicability.
  pub fn matcher(&self) -> &PathMatcher {
    self.generator.matcher()
  }

  /// The generator itself.
  pub fn generator(&self) -> &Arc<dyn Generator> {
    &self.generator
  }
}

impl fmt::Debug for GeneratorEntry {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("GeneratorEntry")
      .field("name", &self.generator.name())
      .field("matcher", self.matcher())
      .finish()
  }
}

/// Per-call settings shared by every resource of one bundle build.
#[derive(Clone, Copy)]
pub struct GenerationScope<'a> {
  /// Identity of the bundle being assembled.
  pub bundle: &'a str,
  /// Charset of produced text.
  pub charset: &'a str,
  /// Reader for source resources.
  pub reader: &'a dyn ResourceReader,
  /// Whether the application runs in debug mode.
  pub debug_mode: bool,
}

/// Ordered set of generators for one configuration generation.
///
/// Built once at startup and never mutated afterwards; a reload builds a new registry.
#[derive(Clone, Debug)]
pub struct GeneratorRegistry {
  entries: Vec<GeneratorEntry>,
  prefixes: HashSet<String>,
  mapping_owners: HashMap<PathBuf, String>,
  generation_path: String,
}

impl Default for GeneratorRegistry {
  fn default() -> Self {
    Self::new(DEFAULT_GENERATION_PATH)
  }
}

impl GeneratorRegistry {
  /// Create an empty registry using `generation_path` for debug-mode generation URLs.
  pub fn new(generation_path: impl Into<String>) -> Self {
    Self {
      entries: Vec::new(),
      prefixes: HashSet::new(),
      mapping_owners: HashMap::new(),
      generation_path: generation_path.into(),
    }
  }

  /// Register a generator.
  ///
  /// Fails when the prefix is already taken or when a cached generator would share its
  /// mapping file with one registered earlier.
  pub fn register<G: Generator + 'static>(&mut self, generator: G) -> Result<()> {
    self.register_shared(Arc::new(generator))
  }

  /// Register a generator already behind an `Arc`.
  pub fn register_shared(&mut self, generator: Arc<dyn Generator>) -> Result<()> {
    let prefix = generator.matcher().generator_prefix().map(str::to_string);
    if let Some(prefix) = &prefix {
      if self.prefixes.contains(prefix) {
        return Err(BundleError::DuplicatePrefix(prefix.clone()));
      }
    }

    let mapping_file = generator.cache_mapping_file().map(|file| file.to_path_buf());
    if let Some(file) = &mapping_file {
      if let Some(owner) = self.mapping_owners.get(file) {
        return Err(BundleError::DuplicateCacheMapping {
          path: file.clone(),
          owner: owner.clone(),
        });
      }
    }

    debug!(generator = generator.name(), prefix = ?prefix, "registered generator");
    if let Some(prefix) = prefix {
      self.prefixes.insert(prefix);
    }
    if let Some(file) = mapping_file {
      self.mapping_owners.insert(file, generator.name().to_string());
    }
    self.entries.push(GeneratorEntry { generator });
    Ok(())
  }

  /// Returns `true` when `path` starts with `prefix:` for a registered prefix.
  pub fn is_path_generated(&self, path: &str) -> bool {
    split_generator_prefix(path).is_some_and(|(prefix, _)| self.prefixes.contains(prefix))
  }

  /// First generator, in registration order, whose matcher accepts `path`.
  pub fn resolve(&self, path: &str) -> Option<&GeneratorEntry> {
    self
      .entries
      .iter()
      .find(|entry| entry.matcher().matches(path))
  }

  /// Produce the content for `path` through the generator that handles it.
  #[tracing::instrument(skip_all, fields(path = path))]
  pub fn produce(&self, path: &str, scope: &GenerationScope<'_>) -> Result<String> {
    let entry = self
      .resolve(path)
      .ok_or_else(|| BundleError::ResourceNotFound(path.to_string()))?;

    let context = GeneratorContext {
      requested_path: path,
      path: entry.matcher().resource_path(path),
      bundle: scope.bundle,
      charset: scope.charset,
      reader: scope.reader,
      debug_mode: scope.debug_mode,
    };

    match entry.generator.generate(&context) {
      Ok(Some(content)) => Ok(content),
      Ok(None) => {
        debug!(generator = entry.generator.name(), "generator produced nothing");
        Err(BundleError::ResourceNotFound(path.to_string()))
      }
      Err(source) => Err(BundleError::generation(path, source)),
    }
  }

  /// Returns `true` when images referenced from the generated stylesheet at `path` are
  /// served by its generator.
  pub fn is_handling_css_image(&self, path: &str) -> bool {
    self
      .resolve(path)
      .is_some_and(|entry| entry.generator.handles_css_images())
  }

  /// Returns `true` when the binary resource at `path` is produced by a generator.
  pub fn is_generated_binary_resource(&self, path: &str) -> bool {
    self.is_path_generated(path)
  }

  /// Request path serving generated content for `path` in debug mode.
  pub fn debug_mode_generation_path(&self, path: &str) -> &str {
    self
      .resolve(path)
      .and_then(|entry| entry.generator.debug_path())
      .unwrap_or(&self.generation_path)
  }

  /// Registered prefixes in registration order.
  pub fn prefixes(&self) -> impl Iterator<Item = &str> {
    self.entries.iter().filter_map(GeneratorEntry::prefix)
  }

  /// Registered generators in registration order.
  pub fn entries(&self) -> &[GeneratorEntry] {
    &self.entries
  }

  /// Number of registered generators.
  pub fn len(&self) -> usize {
    self.entries.len()
  }

  /// Returns `true` when no generator is registered.
  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::BoxError;
  use crate::generator::GenerateResult;
  use crate::reader::MemoryReader;

  struct ClasspathGenerator {
    matcher: PathMatcher,
    css_images: bool,
  }

  impl ClasspathGenerator {
    fn new(prefix: &str) -> Self {
      Self {
        matcher: PathMatcher::prefix(prefix),
        css_images: false,
      }
    }
  }

  impl Generator for ClasspathGenerator {
    fn name(&self) -> &str {
      "classpath"
    }

    fn matcher(&self) -> &PathMatcher {
      &self.matcher
    }

    fn generate(&self, context: &GeneratorContext<'_>) -> GenerateResult {
      Ok(context.reader.get_resource(context.path))
    }

    fn handles_css_images(&self) -> bool {
      self.css_images
    }
  }

  struct FailingGenerator(PathMatcher);

  impl Generator for FailingGenerator {
    fn name(&self) -> &str {
      "failing"
    }

    fn matcher(&self) -> &PathMatcher {
      &self.0
    }

    fn generate(&self, _context: &GeneratorContext<'_>) -> GenerateResult {
      Err(BoxError::from("compiler exploded"))
    }

    fn debug_path(&self) -> Option<&str> {
      Some("/sass_generator.css")
    }
  }

  fn scope(reader: &MemoryReader) -> GenerationScope<'_> {
    GenerationScope {
      bundle: "/bundles/site.css",
      charset: "UTF-8",
      reader,
      debug_mode: false,
    }
  }

  #[test]
  fn rejects_duplicate_prefixes() {
    let mut registry = GeneratorRegistry::default();
    registry.register(ClasspathGenerator::new("jar")).unwrap();
    let err = registry.register(ClasspathGenerator::new("jar")).unwrap_err();
    assert!(matches!(err, BundleError::DuplicatePrefix(prefix) if prefix == "jar"));
    assert_eq!(registry.len(), 1);
  }

  #[test]
  fn detects_generated_paths() {
    let mut registry = GeneratorRegistry::default();
    registry.register(ClasspathGenerator::new("jar")).unwrap();

    assert!(registry.is_path_generated("jar:/css/site.css"));
    assert!(registry.is_path_generated("/jar:css/site.css"));
    assert!(!registry.is_path_generated("webjars:/css/site.css"));
    assert!(!registry.is_path_generated("/css/site.css"));
    assert_eq!(registry.prefixes().collect::<Vec<_>>(), vec!["jar"]);
  }

  #[test]
  fn resolves_in_registration_order() {
    let mut registry = GeneratorRegistry::default();
    registry
      .register(FailingGenerator(PathMatcher::suffix(".scss")))
      .unwrap();
    registry
      .register(FailingGenerator(PathMatcher::pattern(r"\.s[ac]ss$").unwrap()))
      .unwrap();

    let entry = registry.resolve("/css/theme.scss").unwrap();
    assert!(matches!(entry.matcher(), PathMatcher::Suffix(_)));
    assert!(registry.resolve("/css/theme.sass").is_some());
    assert!(registry.resolve("/css/theme.css").is_none());
  }

  #[test]
  fn produces_through_the_matching_generator() {
    let reader = MemoryReader::new().with("/css/site.css", "body{}");
    let mut registry = GeneratorRegistry::default();
    registry.register(ClasspathGenerator::new("jar")).unwrap();

    let content = registry.produce("jar:/css/site.css", &scope(&reader)).unwrap();
    assert_eq!(content, "body{}");

    let missing = registry.produce("jar:/css/missing.css", &scope(&reader));
    assert!(matches!(missing, Err(BundleError::ResourceNotFound(_))));

    let unhandled = registry.produce("/css/site.css", &scope(&reader));
    assert!(matches!(unhandled, Err(BundleError::ResourceNotFound(_))));
  }

  #[test]
  fn wraps_plugin_failures() {
    let reader = MemoryReader::new();
    let mut registry = GeneratorRegistry::default();
    registry
      .register(FailingGenerator(PathMatcher::suffix(".scss")))
      .unwrap();

    let err = registry.produce("/css/theme.scss", &scope(&reader)).unwrap_err();
    assert!(matches!(err, BundleError::Generation { ref path, .. } if path == "/css/theme.scss"));
    assert_eq!(
      std::error::Error::source(&err).map(ToString::to_string),
      Some("compiler exploded".to_string())
    );
  }

  #[test]
  fn answers_css_image_and_debug_path_queries() {
    let mut registry = GeneratorRegistry::new("/generator.css");
    registry
      .register(ClasspathGenerator {
        matcher: PathMatcher::prefix("jar"),
        css_images: true,
      })
      .unwrap();
    registry
      .register(FailingGenerator(PathMatcher::suffix(".scss")))
      .unwrap();

    assert!(registry.is_handling_css_image("jar:/css/site.css"));
    assert!(!registry.is_handling_css_image("/css/theme.scss"));
    assert!(registry.is_generated_binary_resource("jar:/img/logo.png"));
    assert_eq!(registry.debug_mode_generation_path("/css/theme.scss"), "/sass_generator.css");
    assert_eq!(registry.debug_mode_generation_path("jar:/css/site.css"), "/generator.css");
  }
}
