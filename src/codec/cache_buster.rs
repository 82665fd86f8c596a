//! Cache-buster tokens embedded in binary resource URLs.
//!
//! A standard token is `cb<hash>` and replaces nothing: `/img/logo.png` is served as
//! `cb<hash>/img/logo.png`. Generated resources keep their generator prefix inside the
//! token, so `jar:/img/logo.png` becomes `jar_cb<hash>/img/logo.png`.

use serde::Serialize;

/// Literal marking the start of the hash inside a cache-buster token.
pub const CACHE_BUSTER_PREFIX: &str = "cb";

/// Separator between a generator prefix and the cache-buster marker.
pub const GENERATOR_TOKEN_SEPARATOR: char = '_';

/// Result of stripping a cache-buster token from a binary resource path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BinaryResourceInfo {
  /// Path with the token removed and any generator prefix reattached.
  pub path: String,
  /// Hash carried by the token.
  pub hash: String,
  /// Generator prefix carried by the token, for generated resources.
  pub generator_prefix: Option<String>,
}

impl BinaryResourceInfo {
  /// Returns `true` when the token belonged to a generated resource.
  pub fn is_generated(&self) -> bool {
    self.generator_prefix.is_some()
  }
}

/// A parsed `[prefix_]cb<hash>` path segment.
#[derive(Debug, PartialEq, Eq)]
struct CacheBusterToken<'a> {
  generator_prefix: Option<&'a str>,
  hash: &'a str,
}

impl<'a> CacheBusterToken<'a> {
  fn parse(segment: &'a str) -> Option<Self> {
    if let Some(hash) = segment.strip_prefix(CACHE_BUSTER_PREFIX) {
      if is_alphanumeric(hash) {
        return Some(Self {
          generator_prefix: None,
          hash,
        });
      }
    }

    let (prefix, tail) = segment.split_once(GENERATOR_TOKEN_SEPARATOR)?;
    let hash = tail.strip_prefix(CACHE_BUSTER_PREFIX)?;
    (is_alphanumeric(prefix) && is_alphanumeric(hash)).then_some(Self {
      generator_prefix: Some(prefix),
      hash,
    })
  }
}

fn is_alphanumeric(value: &str) -> bool {
  !value.is_empty() && value.bytes().all(|b| b.is_ascii_alphanumeric())
}

/// Strip the first cache-buster segment from `path`.
///
/// Only whole segments that are followed by a `/` qualify. Returns `None` when the path
/// carries no token.
///
/// ```
/// use bundlepath::codec::extract_binary_resource_info;
///
/// let info = extract_binary_resource_info("/cssImg/jar_cb3f2a/img/logo.png").unwrap();
/// assert_eq!(info.path, "/cssImg/jar:/img/logo.png");
/// assert_eq!(info.hash, "3f2a");
/// ```
pub fn extract_binary_resource_info(path: &str) -> Option<BinaryResourceInfo> {
  let mut start = 0;
  while start < path.len() {
    let end = path[start..].find('/').map(|offset| start + offset);
    let Some(end) = end else {
      return None;
    };

    if let Some(token) = CacheBusterToken::parse(&path[start..end]) {
      let preceding = &path[..start];
      let rest = &path[end..];
      let path = match token.generator_prefix {
        Some(prefix) => format!("{preceding}{prefix}:{rest}"),
        None if preceding.ends_with('/') => format!("{preceding}{}", &rest[1..]),
        None => format!("{preceding}{rest}"),
      };
      return Some(BinaryResourceInfo {
        path,
        hash: token.hash.to_string(),
        generator_prefix: token.generator_prefix.map(str::to_string),
      });
    }
    start = end + 1;
  }
  None
}

/// Insert a cache-buster token for `hash` in front of `url`.
///
/// Generated URLs (`prefix:rest`) fold their prefix into the token.
pub fn cache_busted_url(url: &str, hash: &str, generated: bool) -> String {
  if generated {
    if let Some((prefix, rest)) = url.trim_start_matches('/').split_once(':') {
      let rest = rest.strip_prefix('/').unwrap_or(rest);
      return format!("{prefix}{GENERATOR_TOKEN_SEPARATOR}{CACHE_BUSTER_PREFIX}{hash}/{rest}");
    }
  }
  let url = url.strip_prefix('/').unwrap_or(url);
  format!("{CACHE_BUSTER_PREFIX}{hash}/{url}")
}
