//! Binary resources (images, fonts) referenced from stylesheets.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::codec::{self, BinaryResourceInfo};
use crate::error::{BundleError, Result};
use crate::generator::{GenerationScope, GeneratorRegistry};
use crate::hash::ContentHash;
use crate::paths::as_path;
use crate::reader::ResourceReader;

/// File extensions served through the binary resource handler.
pub const BINARY_EXTENSIONS: &[&str] = &[
  "avif", "bmp", "cur", "eot", "gif", "ico", "jpeg", "jpg", "otf", "png", "svg", "swf", "ttf",
  "webp", "woff", "woff2",
];

/// Returns `true` when the extension of `path` marks a binary resource.
///
/// Query strings and fragments are ignored and the comparison is case-insensitive.
pub fn is_binary_resource(path: &str) -> bool {
  let path = path.split(['?', '#']).next().unwrap_or_default();
  Path::new(path)
    .extension()
    .and_then(|ext| ext.to_str())
    .is_some_and(|ext| {
      BINARY_EXTENSIONS
        .iter()
        .any(|known| known.eq_ignore_ascii_case(ext))
    })
}

/// Serves binary resources under a servlet mapping and derives their cache-busted URLs.
pub struct BinaryResourceHandler {
  servlet_mapping: String,
  registry: Arc<GeneratorRegistry>,
  reader: Arc<dyn ResourceReader>,
  cache_urls: RwLock<HashMap<String, String>>,
}

impl std::fmt::Debug for BinaryResourceHandler {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("BinaryResourceHandler")
      .field("servlet_mapping", &self.servlet_mapping)
      .field("cached_urls", &self.cache_urls.read().len())
      .finish_non_exhaustive()
  }
}

impl BinaryResourceHandler {
  /// Create a handler mounted at `servlet_mapping` (empty for the application root).
  pub fn new(
    servlet_mapping: impl Into<String>,
    registry: Arc<GeneratorRegistry>,
    reader: Arc<dyn ResourceReader>,
  ) -> Self {
    Self {
      servlet_mapping: servlet_mapping.into(),
      registry,
      reader,
      cache_urls: RwLock::new(HashMap::new()),
    }
  }

  /// Servlet path prefixed to cache-busted URLs, `None` when mounted at the root.
  pub fn servlet_path(&self) -> Option<String> {
    let path = as_path(&self.servlet_mapping);
    (path != "/").then_some(path)
  }

  /// Registry of binary resource generators.
  pub fn registry(&self) -> &GeneratorRegistry {
    &self.registry
  }

  /// Previously computed cache-busted URL for `url`.
  pub fn cache_url(&self, url: &str) -> Option<String> {
    self.cache_urls.read().get(url).cloned()
  }

  /// Remember the cache-busted URL of `url`.
  pub fn add_mapping(&self, url: &str, cache_busted: &str) {
    self
      .cache_urls
      .write()
      .insert(url.to_string(), cache_busted.to_string());
  }

  /// Cache-busted form of `url`, hashing the resource content on first use.
  ///
  /// Generated resources are produced within `bundle`, the bundle whose stylesheet
  /// references them.
  #[tracing::instrument(skip_all, fields(url = url, bundle = bundle))]
  pub fn cache_busted_url(&self, url: &str, bundle: &str) -> Result<String> {
    if let Some(known) = self.cache_url(url) {
      return Ok(known);
    }

    let generated = self.registry.is_generated_binary_resource(url);
    let hash = if generated {
      let scope = GenerationScope {
        bundle,
        charset: "UTF-8",
        reader: self.reader.as_ref(),
        debug_mode: false,
      };
      ContentHash::of(self.registry.produce(url, &scope)?)
    } else {
      let stream = self
        .reader
        .get_resource_as_stream(url)
        .ok_or_else(|| BundleError::ResourceNotFound(url.to_string()))?;
      ContentHash::of_reader(stream)?
    };

    let busted = codec::cache_busted_url(url, &hash.short(), generated);
    debug!(busted = %busted, "computed cache-busted url");
    self.add_mapping(url, &busted);
    Ok(busted)
  }

  /// Decode a request for a cache-busted resource served by this handler.
  pub fn resolve_request(&self, request_path: &str) -> Option<BinaryResourceInfo> {
    let path = match self.servlet_path() {
      Some(servlet) => request_path.strip_prefix(servlet.as_str())?,
      None => request_path,
    };
    codec::extract_binary_resource_info(path)
  }
}
