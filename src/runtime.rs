//! Live configuration generation swapped atomically on reload.
//!
//! Requests load the current [`RuntimeSnapshot`] once and work against it until they
//! finish, so a reload never exposes a half-updated prefix table or registry.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwap;
use tracing::info;

use crate::codec::{self, RequestPathInfo};
use crate::config::BundlerConfig;
use crate::error::Result;
use crate::generator::{CachedGenerator, GenerationScope, Generator, GeneratorRegistry};
use crate::reader::ResourceReader;

/// Immutable view of one configuration generation.
#[derive(Debug)]
pub struct RuntimeSnapshot {
  generation: u64,
  bundle_prefixes: Vec<String>,
  registry: Arc<GeneratorRegistry>,
  debug_mode: bool,
  charset: String,
}

impl RuntimeSnapshot {
  /// Generation counter, incremented by every reload.
  pub fn generation(&self) -> u64 {
    self.generation
  }

  /// Bundle prefixes in matching order.
  pub fn bundle_prefixes(&self) -> &[String] {
    &self.bundle_prefixes
  }

  /// Generators of this generation.
  pub fn registry(&self) -> &Arc<GeneratorRegistry> {
    &self.registry
  }

  /// Whether this generation runs in debug mode.
  pub fn debug_mode(&self) -> bool {
    self.debug_mode
  }

  /// Decode a request path against this generation's bundle prefixes.
  pub fn decode(&self, request_path: &str) -> Result<RequestPathInfo> {
    codec::decode(request_path, &self.bundle_prefixes)
  }

  /// Produce generated content for `path` within `bundle`.
  pub fn produce(&self, path: &str, bundle: &str, reader: &dyn ResourceReader) -> Result<String> {
    let scope = GenerationScope {
      bundle,
      charset: &self.charset,
      reader,
      debug_mode: self.debug_mode,
    };
    self.registry.produce(path, &scope)
  }
}

/// Holder of the live [`RuntimeSnapshot`].
#[derive(Debug)]
pub struct BundleRuntime {
  current: ArcSwap<RuntimeSnapshot>,
  generations: AtomicU64,
}

impl BundleRuntime {
  /// Start at generation zero.
  pub fn new(config: &BundlerConfig, registry: GeneratorRegistry) -> Self {
    Self {
      current: ArcSwap::from_pointee(snapshot(0, config, registry)),
      generations: AtomicU64::new(0),
    }
  }

  /// Current generation. Hold on to it for the duration of a request.
  #[inline]
  pub fn snapshot(&self) -> Arc<RuntimeSnapshot> {
    self.current.load_full()
  }

  /// Replace the live generation, returning the new generation counter.
  ///
  /// In-flight requests keep the snapshot they loaded.
  pub fn reload(&self, config: &BundlerConfig, registry: GeneratorRegistry) -> u64 {
    let generation = self.generations.fetch_add(1, Ordering::AcqRel) + 1;
    self.current.store(Arc::new(snapshot(generation, config, registry)));
    info!(
      generation,
      prefixes = config.bundle_prefixes.len(),
      "swapped bundler configuration"
    );
    generation
  }

  /// Decode against the live generation.
  pub fn decode(&self, request_path: &str) -> Result<RequestPathInfo> {
    self.snapshot().decode(request_path)
  }
}

fn snapshot(generation: u64, config: &BundlerConfig, registry: GeneratorRegistry) -> RuntimeSnapshot {
  RuntimeSnapshot {
    generation,
    bundle_prefixes: config.bundle_prefixes.clone(),
    registry: Arc::new(registry),
    debug_mode: config.debug_mode,
    charset: config.charset.clone(),
  }
}

/// Build the registry of a configuration generation.
///
/// Generators named in `config.generator_caches` are wrapped in a [`CachedGenerator`]
/// storing its cache below the configured working directory of `base_dir`.
pub fn build_registry<I>(config: &BundlerConfig, base_dir: &Path, generators: I) -> Result<GeneratorRegistry>
where
  I: IntoIterator<Item = Arc<dyn Generator>>,
{
  let working_directory = config.working_directory_path(base_dir);
  let mut registry = GeneratorRegistry::new(config.generation_path.clone());
  for generator in generators {
    match config.cache_config(generator.name()) {
      Some(cache) => registry.register(CachedGenerator::from_shared(
        generator,
        cache.clone(),
        &working_directory,
      ))?,
      None => registry.register_shared(generator)?,
    }
  }
  Ok(registry)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::BundleError;
  use crate::generator::{
    CacheMapping, GenerateResult, GeneratorCacheConfig, GeneratorContext, PathMatcher,
  };
  use crate::reader::MemoryReader;
  use tempfile::tempdir;

  struct Upper(PathMatcher, &'static str);

  impl Generator for Upper {
    fn name(&self) -> &str {
      self.1
    }

    fn matcher(&self) -> &PathMatcher {
      &self.0
    }

    fn generate(&self, context: &GeneratorContext<'_>) -> GenerateResult {
      Ok(context.reader.get_resource(context.path).map(|s| s.to_uppercase()))
    }
  }

  fn config(prefixes: &[&str]) -> BundlerConfig {
    BundlerConfig {
      bundle_prefixes: prefixes.iter().map(|p| p.to_string()).collect(),
      ..BundlerConfig::default()
    }
  }

  #[test]
  fn reload_swaps_the_whole_snapshot() {
    let runtime = BundleRuntime::new(&config(&["/v1"]), GeneratorRegistry::default());
    let before = runtime.snapshot();
    assert_eq!(runtime.decode("/v1/N1/js/a.js").unwrap().path, "/js/a.js");

    let mut registry = GeneratorRegistry::default();
    registry
      .register(Upper(PathMatcher::prefix("up"), "upper"))
      .unwrap();
    assert_eq!(runtime.reload(&config(&["/v2"]), registry), 1);

    let after = runtime.snapshot();
    assert_eq!(after.generation(), 1);
    assert_eq!(after.bundle_prefixes(), ["/v2".to_string()]);
    assert!(after.registry().is_path_generated("up:/a.txt"));

    // The old snapshot is untouched.
    assert_eq!(before.generation(), 0);
    assert!(before.registry().is_empty());
    assert_eq!(before.decode("/v1/N1/js/a.js").unwrap().bundle_prefix.as_deref(), Some("/v1/"));
  }

  #[test]
  fn produces_through_the_snapshot_registry() {
    let reader = MemoryReader::new().with("/a.txt", "abc");
    let mut registry = GeneratorRegistry::default();
    registry
      .register(Upper(PathMatcher::prefix("up"), "upper"))
      .unwrap();
    let runtime = BundleRuntime::new(&config(&[]), registry);

    let snapshot = runtime.snapshot();
    assert_eq!(snapshot.produce("up:/a.txt", "/bundle.txt", &reader).unwrap(), "ABC");
    assert!(matches!(
      snapshot.produce("up:/b.txt", "/bundle.txt", &reader),
      Err(BundleError::ResourceNotFound(_))
    ));
  }

  #[test]
  fn build_registry_wraps_configured_generators() {
    let temp = tempdir().unwrap();
    let mut config = config(&[]);
    config
      .generator_caches
      .push(GeneratorCacheConfig::new("upper", "upperCache", "upper.mapping"));

    let generators: Vec<Arc<dyn Generator>> = vec![
      Arc::new(Upper(PathMatcher::prefix("up"), "upper")),
      Arc::new(Upper(PathMatcher::prefix("raw"), "raw")),
    ];
    let registry = build_registry(&config, temp.path(), generators).unwrap();

    let cached = registry.resolve("up:/a.txt").unwrap();
    assert_eq!(
      cached.generator().cache_mapping_file(),
      Some(temp.path().join(".bundlepath/upperCache/upper.mapping").as_path())
    );
    let raw = registry.resolve("raw:/a.txt").unwrap();
    assert_eq!(raw.generator().cache_mapping_file(), None);
  }

  #[test]
  fn reload_keeps_cache_entries_written_by_the_previous_snapshot() {
    let temp = tempdir().unwrap();
    let reader = MemoryReader::new()
      .with("/a.txt", "a")
      .with("/b.txt", "b")
      .with("/c.txt", "c");
    let mut config = config(&[]);
    config
      .generator_caches
      .push(GeneratorCacheConfig::new("upper", "upperCache", "upper.mapping"));
    let generators = || -> Vec<Arc<dyn Generator>> { vec![Arc::new(Upper(PathMatcher::prefix("up"), "upper"))] };

    let runtime = BundleRuntime::new(&config, build_registry(&config, temp.path(), generators()).unwrap());
    let in_flight = runtime.snapshot();
    in_flight.produce("up:/a.txt", "/bundle.txt", &reader).unwrap();

    runtime.reload(&config, build_registry(&config, temp.path(), generators()).unwrap());
    runtime.snapshot().produce("up:/b.txt", "/bundle.txt", &reader).unwrap();
    in_flight.produce("up:/c.txt", "/bundle.txt", &reader).unwrap();

    let mapping = CacheMapping::load(&temp.path().join(".bundlepath/upperCache/upper.mapping"));
    assert_eq!(mapping.len(), 3);
    assert!(mapping.get("up:/b.txt").is_some());
  }

  #[test]
  fn build_registry_rejects_shared_mapping_files() {
    let temp = tempdir().unwrap();
    let mut config = config(&[]);
    config
      .generator_caches
      .push(GeneratorCacheConfig::new("upper", "cache", "mapping"));
    config
      .generator_caches
      .push(GeneratorCacheConfig::new("shout", "cache", "mapping"));

    let generators: Vec<Arc<dyn Generator>> = vec![
      Arc::new(Upper(PathMatcher::prefix("up"), "upper")),
      Arc::new(Upper(PathMatcher::prefix("loud"), "shout")),
    ];
    let err = build_registry(&config, temp.path(), generators).unwrap_err();
    assert!(matches!(err, BundleError::DuplicateCacheMapping { ref owner, .. } if owner == "upper"));
    assert!(err.is_configuration_error());
  }
}
