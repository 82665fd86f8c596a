//! Persistent caching wrapper around any [`Generator`].
//!
//! Artifacts are stored under `<working dir>/<cache directory>/` named by the blake3 hash
//! of their content, and the `logical path -> hash` mapping is flushed atomically after
//! every mutation. Generation is serialised per logical path so two concurrent requests
//! for the same cold path build it once.
//!
//! The in-memory mapping and the path locks belong to the mapping file, not to one
//! wrapper: generators rebuilt by a configuration reload keep working against the same
//! state as the ones still serving requests from the previous snapshot.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use anyhow::Context;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{CacheMapping, GenerateResult, Generator, GeneratorContext, PathMatcher};
use crate::hash::ContentHash;

/// When a cached generator actually consults its cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CacheMode {
  /// Only while running in debug mode.
  Debug,
  /// Only outside debug mode.
  Prod,
  /// Always.
  #[default]
  All,
}

impl CacheMode {
  /// Returns `true` when caching applies for the given run mode.
  pub fn is_enabled(self, debug_mode: bool) -> bool {
    match self {
      Self::Debug => debug_mode,
      Self::Prod => !debug_mode,
      Self::All => true,
    }
  }
}

/// Cache settings for one generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratorCacheConfig {
  /// Generator name the settings apply to.
  pub name: String,
  /// Cache directory, relative to the working directory.
  pub cache_directory: String,
  /// Mapping file name inside the cache directory.
  pub mapping_file_name: String,
  /// Run modes in which the cache is used.
  #[serde(default)]
  pub mode: CacheMode,
}

impl GeneratorCacheConfig {
  /// Settings caching in every mode.
  pub fn new(
    name: impl Into<String>,
    cache_directory: impl Into<String>,
    mapping_file_name: impl Into<String>,
  ) -> Self {
    Self {
      name: name.into(),
      cache_directory: cache_directory.into(),
      mapping_file_name: mapping_file_name.into(),
      mode: CacheMode::All,
    }
  }

  /// Same settings restricted to `mode`.
  pub fn with_mode(mut self, mode: CacheMode) -> Self {
    self.mode = mode;
    self
  }
}

/// Mapping and per-path locks of one mapping file.
#[derive(Default)]
struct CacheState {
  mapping: Mutex<Option<CacheMapping>>,
  path_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

/// State of `mapping_file`, shared with every live generator caching into it.
fn shared_state(mapping_file: &Path) -> Arc<CacheState> {
  static STATES: OnceLock<Mutex<HashMap<PathBuf, Weak<CacheState>>>> = OnceLock::new();

  let mut states = STATES.get_or_init(Default::default).lock();
  states.retain(|_, state| state.strong_count() > 0);
  if let Some(state) = states.get(mapping_file).and_then(Weak::upgrade) {
    return state;
  }
  let state = Arc::new(CacheState::default());
  states.insert(mapping_file.to_path_buf(), Arc::downgrade(&state));
  state
}

/// Wraps a generator with a persistent, content-addressed cache.
pub struct CachedGenerator {
  inner: Arc<dyn Generator>,
  config: GeneratorCacheConfig,
  cache_dir: PathBuf,
  mapping_file: PathBuf,
  state: Arc<CacheState>,
}

impl std::fmt::Debug for CachedGenerator {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("CachedGenerator")
      .field("generator", &self.inner.name())
      .field("config", &self.config)
      .field("cache_dir", &self.cache_dir)
      .finish_non_exhaustive()
  }
}

impl CachedGenerator {
  /// Wrap `inner`, storing its cache below `working_directory`.
  pub fn new<G: Generator + 'static>(
    inner: G,
    config: GeneratorCacheConfig,
    working_directory: &Path,
  ) -> Self {
    Self::from_shared(Arc::new(inner), config, working_directory)
  }

  /// Wrap a shared generator.
  pub fn from_shared(
    inner: Arc<dyn Generator>,
    config: GeneratorCacheConfig,
    working_directory: &Path,
  ) -> Self {
    let cache_dir = working_directory.join(&config.cache_directory);
    let mapping_file = cache_dir.join(&config.mapping_file_name);
    let state = shared_state(&mapping_file);
    Self {
      inner,
      config,
      cache_dir,
      mapping_file,
      state,
    }
  }

  /// Cache settings.
  pub fn config(&self) -> &GeneratorCacheConfig {
    &self.config
  }

  /// Directory holding artifacts and the mapping file.
  pub fn cache_directory(&self) -> &Path {
    &self.cache_dir
  }

  /// Location of the mapping file.
  pub fn mapping_file(&self) -> &Path {
    &self.mapping_file
  }

  /// Return the cached content for the context path, generating it on a miss.
  pub fn get_or_generate(&self, context: &GeneratorContext<'_>) -> GenerateResult {
    if !self.config.mode.is_enabled(context.debug_mode) {
      return self.inner.generate(context);
    }

    let key = context.requested_path;
    let lock = self.path_lock(key);
    let result = {
      let _guard = lock.lock();
      self.lookup_or_generate(key, context)
    };
    self.release_path_lock(key, lock);
    result
  }

  fn lookup_or_generate(&self, key: &str, context: &GeneratorContext<'_>) -> GenerateResult {
    if let Some(content) = self.lookup(key) {
      debug!(generator = %self.config.name, path = key, "generator cache hit");
      return Ok(Some(content));
    }

    debug!(generator = %self.config.name, path = key, "generator cache miss");
    let Some(content) = self.inner.generate(context)? else {
      return Ok(None);
    };
    self.store(key, &content);
    Ok(Some(content))
  }

  /// Drop the mapping entry for `path` so the next call regenerates it.
  pub fn invalidate(&self, path: &str) -> bool {
    self.with_mapping(|mapping, file| {
      let removed = mapping.remove(path).is_some();
      if removed {
        flush_mapping(mapping, file);
      }
      removed
    })
  }

  /// Drop every mapping entry.
  pub fn clear(&self) {
    self.with_mapping(|mapping, file| {
      mapping.clear();
      flush_mapping(mapping, file);
    });
  }

  /// Number of cached paths, loading the mapping if needed.
  pub fn cached_len(&self) -> usize {
    self.with_mapping(|mapping, _| mapping.len())
  }

  fn with_mapping<R>(&self, f: impl FnOnce(&mut CacheMapping, &Path) -> R) -> R {
    let mut guard = self.state.mapping.lock();
    let mapping = guard.get_or_insert_with(|| CacheMapping::load(&self.mapping_file));
    f(mapping, &self.mapping_file)
  }

  fn lookup(&self, key: &str) -> Option<String> {
    let hash = self.with_mapping(|mapping, _| mapping.get(key))?;
    let artifact = self.artifact_path(key, hash);
    match fs::read_to_string(&artifact) {
      Ok(content) => Some(content),
      Err(err) => {
        debug!(path = key, artifact = %artifact.display(), error = %err, "cache artifact unavailable");
        None
      }
    }
  }

  fn store(&self, key: &str, content: &str) {
    let hash = ContentHash::of(content);
    let artifact = self.artifact_path(key, hash);
    if let Err(err) = write_atomic(&artifact, content.as_bytes()) {
      warn!(generator = %self.config.name, path = key, error = %format!("{err:#}"), "unable to store generated artifact");
      return;
    }

    self.with_mapping(|mapping, file| {
      let previous = mapping.insert(key, hash);
      if !flush_mapping(mapping, file) {
        match previous {
          Some(previous) => mapping.insert(key, previous),
          None => mapping.remove(key),
        };
      }
    });
  }

  fn artifact_path(&self, key: &str, hash: ContentHash) -> PathBuf {
    let mut name = hash.to_hex();
    if let Some(extension) = Path::new(key).extension().and_then(|ext| ext.to_str()) {
      name.push('.');
      name.push_str(extension);
    }
    self.cache_dir.join(name)
  }

  fn path_lock(&self, key: &str) -> Arc<Mutex<()>> {
    self
      .state
      .path_locks
      .lock()
      .entry(key.to_string())
      .or_default()
      .clone()
  }

  fn release_path_lock(&self, key: &str, lock: Arc<Mutex<()>>) {
    let mut locks = self.state.path_locks.lock();
    // Only the map and this caller hold it: nobody is waiting.
    if Arc::strong_count(&lock) <= 2 {
      locks.remove(key);
    }
  }
}

impl Generator for CachedGenerator {
  fn name(&self) -> &str {
    self.inner.name()
  }

  fn matcher(&self) -> &PathMatcher {
    self.inner.matcher()
  }

  fn generate(&self, context: &GeneratorContext<'_>) -> GenerateResult {
    self.get_or_generate(context)
  }

  fn handles_css_images(&self) -> bool {
    self.inner.handles_css_images()
  }

  fn debug_path(&self) -> Option<&str> {
    self.inner.debug_path()
  }

  fn cache_mapping_file(&self) -> Option<&Path> {
    Some(&self.mapping_file)
  }
}

/// Persist the mapping; returns `false` (after logging) when the flush failed.
fn flush_mapping(mapping: &CacheMapping, file: &Path) -> bool {
  match write_atomic(file, mapping.to_file_contents().as_bytes()) {
    Ok(()) => true,
    Err(err) => {
      warn!(path = %file.display(), error = %format!("{err:#}"), "unable to flush cache mapping");
      false
    }
  }
}

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Write `data` next to `path` and rename it into place.
fn write_atomic(path: &Path, data: &[u8]) -> anyhow::Result<()> {
  let parent = path
    .parent()
    .with_context(|| format!("{} has no parent directory", path.display()))?;
  fs::create_dir_all(parent)
    .with_context(|| format!("failed to create cache directory {}", parent.display()))?;

  let file_name = path
    .file_name()
    .and_then(|name| name.to_str())
    .unwrap_or("cache");
  let nonce = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
  let temp_path = parent.join(format!(".{file_name}.{}.{nonce}.tmp", std::process::id()));

  let written = fs::File::create(&temp_path)
    .and_then(|mut file| {
      file.write_all(data)?;
      file.sync_all()
    })
    .with_context(|| format!("failed to write temp file {}", temp_path.display()));
  if let Err(err) = written {
    let _ = fs::remove_file(&temp_path);
    return Err(err);
  }

  if let Err(err) = fs::rename(&temp_path, path) {
    let _ = fs::remove_file(&temp_path);
    return Err(err).with_context(|| format!("failed to move temp file into {}", path.display()));
  }
  Ok(())
}
