use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use tempfile::tempdir;

use bundlepath::generator::{
  CachedGenerator, GenerateResult, GenerationScope, Generator, GeneratorCacheConfig,
  GeneratorContext, GeneratorRegistry, PathMatcher,
};
use bundlepath::reader::MemoryReader;

/// Stand-in for a slow stylesheet compiler.
struct SlowCompiler {
  matcher: PathMatcher,
  output: Mutex<String>,
  calls: AtomicUsize,
}

impl SlowCompiler {
  fn new(output: &str) -> Self {
    Self {
      matcher: PathMatcher::suffix(".scss"),
      output: Mutex::new(output.to_string()),
      calls: AtomicUsize::new(0),
    }
  }

  fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }
}

impl Generator for SlowCompiler {
  fn name(&self) -> &str {
    "sass"
  }

  fn matcher(&self) -> &PathMatcher {
    &self.matcher
  }

  fn generate(&self, _context: &GeneratorContext<'_>) -> GenerateResult {
    self.calls.fetch_add(1, Ordering::SeqCst);
    thread::sleep(Duration::from_millis(50));
    Ok(Some(self.output.lock().clone()))
  }
}

fn sass_cache() -> GeneratorCacheConfig {
  GeneratorCacheConfig::new("sass", "sassCache", "sass.mapping")
}

fn context<'a>(reader: &'a MemoryReader, path: &'a str) -> GeneratorContext<'a> {
  GeneratorContext {
    requested_path: path,
    path,
    bundle: "/bundles/site.css",
    charset: "UTF-8",
    reader,
    debug_mode: false,
  }
}

#[test]
fn concurrent_cold_requests_generate_once() {
  let temp = tempdir().unwrap();
  let reader = MemoryReader::new();
  let compiler = Arc::new(SlowCompiler::new("body{color:red}"));
  let cached = CachedGenerator::from_shared(compiler.clone(), sass_cache(), temp.path());

  let results: Vec<String> = thread::scope(|scope| {
    let handles: Vec<_> = (0..8)
      .map(|_| {
        scope.spawn(|| {
          cached
            .get_or_generate(&context(&reader, "/css/site.scss"))
            .unwrap()
            .unwrap()
        })
      })
      .collect();
    handles.into_iter().map(|h| h.join().unwrap()).collect()
  });

  assert_eq!(compiler.calls(), 1);
  assert!(results.iter().all(|content| content == "body{color:red}"));
  assert_eq!(cached.cached_len(), 1);
}

#[test]
fn different_paths_do_not_share_a_lock() {
  let temp = tempdir().unwrap();
  let reader = MemoryReader::new();
  let compiler = Arc::new(SlowCompiler::new("a{}"));
  let cached = CachedGenerator::from_shared(compiler.clone(), sass_cache(), temp.path());

  thread::scope(|scope| {
    for path in ["/css/a.scss", "/css/b.scss", "/css/c.scss"] {
      let cached = &cached;
      let reader = &reader;
      scope.spawn(move || cached.get_or_generate(&context(reader, path)).unwrap());
    }
  });

  assert_eq!(compiler.calls(), 3);
  assert_eq!(cached.cached_len(), 3);
}

#[test]
fn cached_content_stays_stale_until_invalidated() {
  let temp = tempdir().unwrap();
  let reader = MemoryReader::new();
  let compiler = Arc::new(SlowCompiler::new("v1"));
  let cached = CachedGenerator::from_shared(compiler.clone(), sass_cache(), temp.path());
  let ctx = context(&reader, "/css/site.scss");

  assert_eq!(cached.get_or_generate(&ctx).unwrap().as_deref(), Some("v1"));
  *compiler.output.lock() = "v2".to_string();
  assert_eq!(cached.get_or_generate(&ctx).unwrap().as_deref(), Some("v1"));
  assert_eq!(compiler.calls(), 1);

  assert!(cached.invalidate("/css/site.scss"));
  assert!(!cached.invalidate("/css/site.scss"));
  assert_eq!(cached.get_or_generate(&ctx).unwrap().as_deref(), Some("v2"));
  assert_eq!(compiler.calls(), 2);
}

#[test]
fn cache_survives_restarts() {
  let temp = tempdir().unwrap();
  let reader = MemoryReader::new();

  let first = Arc::new(SlowCompiler::new("v1"));
  CachedGenerator::from_shared(first.clone(), sass_cache(), temp.path())
    .get_or_generate(&context(&reader, "/css/site.scss"))
    .unwrap();

  let second = Arc::new(SlowCompiler::new("v2"));
  let restarted = CachedGenerator::from_shared(second.clone(), sass_cache(), temp.path());
  let content = restarted
    .get_or_generate(&context(&reader, "/css/site.scss"))
    .unwrap();
  assert_eq!(content.as_deref(), Some("v1"));
  assert_eq!(second.calls(), 0);

  restarted.clear();
  let reloaded = CachedGenerator::from_shared(second.clone(), sass_cache(), temp.path());
  assert_eq!(reloaded.cached_len(), 0);
}

#[test]
fn registry_dispatches_through_the_cache() {
  let temp = tempdir().unwrap();
  let reader = MemoryReader::new();
  let compiler = Arc::new(SlowCompiler::new("p{}"));
  let mut registry = GeneratorRegistry::default();
  registry
    .register(CachedGenerator::from_shared(compiler.clone(), sass_cache(), temp.path()))
    .unwrap();

  let scope = GenerationScope {
    bundle: "/bundles/site.css",
    charset: "UTF-8",
    reader: &reader,
    debug_mode: false,
  };
  assert_eq!(registry.produce("/css/site.scss", &scope).unwrap(), "p{}");
  assert_eq!(registry.produce("/css/site.scss", &scope).unwrap(), "p{}");
  assert_eq!(compiler.calls(), 1);

  let duplicate = registry.register(CachedGenerator::from_shared(
    Arc::new(SlowCompiler::new("x")),
    sass_cache(),
    temp.path(),
  ));
  assert!(duplicate.is_err());
}
