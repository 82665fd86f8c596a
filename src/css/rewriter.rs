use std::collections::HashMap;
use std::sync::OnceLock;

use regex::{Captures, Regex};
use tracing::{error, info};

use super::binary::{BinaryResourceHandler, is_binary_resource};
use crate::generator::{GeneratorRegistry, PREFIX_SEPARATOR};
use crate::paths::{as_path, concat_web_path, is_external_reference, parent_path, relative_web_path};

fn css_url_pattern() -> &'static Regex {
  static PATTERN: OnceLock<Regex> = OnceLock::new();
  PATTERN.get_or_init(|| {
    Regex::new(r#"(?i)url\(\s*(?:"([^"]*)"|'([^']*)'|([^)'"]*?))\s*\)"#)
      .expect("invalid css url regex")
  })
}

/// Where a stylesheet came from and where it ends up.
#[derive(Debug, Clone, Copy)]
pub struct CssRewriteContext<'a> {
  /// Path of the stylesheet as authored, possibly generator-prefixed.
  pub original_css_path: &'a str,
  /// Path of the bundle the stylesheet is relocated into.
  pub new_css_path: &'a str,
  /// Identity of the bundle being assembled, handed to generators of referenced images.
  pub bundle: &'a str,
}

/// Recomputes `url(...)` references of stylesheets relocated into a bundle.
///
/// One rewriter serves one bundle build: cache-busted binary URLs computed for earlier
/// stylesheets of the bundle are reused for later ones.
pub struct CssUrlRewriter<'a> {
  registry: &'a GeneratorRegistry,
  binary: Option<&'a BinaryResourceHandler>,
  binary_mapping: HashMap<String, String>,
}

impl<'a> CssUrlRewriter<'a> {
  /// Create a rewriter for stylesheets produced through `registry`.
  ///
  /// Without a binary handler images are relocated but never cache-busted.
  pub fn new(registry: &'a GeneratorRegistry, binary: Option<&'a BinaryResourceHandler>) -> Self {
    Self {
      registry,
      binary,
      binary_mapping: HashMap::new(),
    }
  }

  /// Cache-busted URLs computed so far during this bundle build.
  pub fn binary_mapping(&self) -> &HashMap<String, String> {
    &self.binary_mapping
  }

  /// Rewrite every relative `url(...)` of `css`.
  ///
  /// External references, data URIs and absolute paths are left as they are, and so are
  /// references that would resolve outside of the application root.
  #[tracing::instrument(skip_all, fields(css = context.original_css_path))]
  pub fn rewrite_stylesheet(&mut self, css: &str, context: &CssRewriteContext<'_>) -> String {
    let mut rewritten_urls: HashMap<String, String> = HashMap::new();

    css_url_pattern()
      .replace_all(css, |caps: &Captures<'_>| {
        let (raw, quote) = match (caps.get(1), caps.get(2), caps.get(3)) {
          (Some(url), _, _) => (url.as_str(), "\""),
          (_, Some(url), _) => (url.as_str(), "'"),
          (_, _, Some(url)) => (url.as_str(), ""),
          _ => return caps[0].to_string(),
        };
        let url = raw.trim();
        if !is_relocatable(url) {
          return caps[0].to_string();
        }

        let rewritten = match rewritten_urls.get(url) {
          Some(known) => known.clone(),
          None => {
            let (target, suffix) = split_url_suffix(url);
            let rewritten = match self.rewrite_image_path(context, target) {
              Some(path) => format!("{path}{suffix}"),
              None => url.to_string(),
            };
            rewritten_urls.insert(url.to_string(), rewritten.clone());
            rewritten
          }
        };
        format!("url({quote}{rewritten}{quote})")
      })
      .into_owned()
  }

  /// New location of the image `url` referenced from the original stylesheet.
  ///
  /// Returns `None` when the image resolves outside of the application root. The
  /// condition is logged; callers keep the original reference.
  pub fn rewrite_image_path(&mut self, context: &CssRewriteContext<'_>, url: &str) -> Option<String> {
    let original_css = context.original_css_path;
    let binary_servlet_path = self.binary.and_then(BinaryResourceHandler::servlet_path);
    let generated_image = self
      .binary
      .is_some_and(|handler| handler.registry().is_generated_binary_resource(url));
    let css_generator_handles_images = self.registry.is_handling_css_image(original_css);

    let image_url = if generated_image || css_generator_handles_images {
      let image = if css_generator_handles_images && !generated_image {
        concat_web_path(original_css, url)
      } else {
        Some(url.to_string())
      };
      image.map(|image| self.rewrite_url(&image, binary_servlet_path.as_deref(), context))
    } else {
      let root_path = if self.registry.is_path_generated(original_css) {
        original_css
          .split_once(PREFIX_SEPARATOR)
          .map_or(original_css, |(_, rest)| rest)
      } else {
        original_css
      };
      concat_web_path(root_path, url)
        .map(|image| self.rewrite_url(&image, binary_servlet_path.as_deref(), context))
    };

    if image_url.is_none() {
      error!(
        url,
        css = original_css,
        "css image path is out of the application context, please check the stylesheet"
      );
    }
    image_url
  }

  fn rewrite_url(
    &mut self,
    url: &str,
    binary_servlet_path: Option<&str>,
    context: &CssRewriteContext<'_>,
  ) -> String {
    let mut image_url = url.to_string();
    if is_binary_resource(&image_url) {
      image_url = self.add_cache_buster(url, context.bundle);
      if let Some(servlet_path) = binary_servlet_path {
        image_url = format!("{servlet_path}/{image_url}");
      }
    }

    let image_url = as_path(&image_url);
    relative_web_path(&parent_path(context.new_css_path), &image_url)
  }

  fn add_cache_buster(&mut self, url: &str, bundle: &str) -> String {
    if let Some(known) = self.binary_mapping.get(url) {
      return known.clone();
    }

    let busted = match self.binary {
      Some(handler) => match handler.cache_busted_url(url, bundle) {
        Ok(busted) => busted,
        Err(err) => {
          info!(url, error = %err, "unable to compute the checksum of the resource");
          return url.to_string();
        }
      },
      None => url.to_string(),
    };
    self
      .binary_mapping
      .insert(url.to_string(), busted.clone());
    busted
  }
}

/// Returns `true` for references resolved relative to the stylesheet.
fn is_relocatable(url: &str) -> bool {
  !url.is_empty() && !url.starts_with('/') && !is_external_reference(url)
}

/// Split a trailing query string or fragment (`?#iefix`) off a URL.
fn split_url_suffix(url: &str) -> (&str, &str) {
  match url.find(['?', '#']) {
    Some(index) => url.split_at(index),
    None => (url, ""),
  }
}
