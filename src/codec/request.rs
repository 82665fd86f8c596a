use serde::Serialize;
use tracing::debug;

use crate::error::{BundleError, Result};
use crate::paths::{as_dir_path, as_path, is_normalized};

/// Marker placed before the hash segment of gzip-encoded bundle requests.
pub const GZIP_PATH_PREFIX: &str = "gzip_";

/// Separator between the hash and the variant key in the hash segment.
pub const VARIANT_SEPARATOR: char = '.';

/// Decoded identity of a bundle request.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct RequestPathInfo {
  /// Bundle prefix (as a directory path) the request was dispatched under.
  pub bundle_prefix: Option<String>,
  /// Logical path of the requested resource.
  pub path: String,
  /// Locale or condition variant encoded after the hash.
  pub variant_key: Option<String>,
  /// Content hash segment; absent only for unversioned requests.
  pub hash: Option<String>,
  /// Whether the request targets the gzip rendition.
  pub gzip: bool,
}

impl RequestPathInfo {
  /// Rebuild the public request path, including prefix and gzip marker.
  pub fn to_request_path(&self) -> String {
    let mut out = match &self.bundle_prefix {
      Some(prefix) => as_dir_path(prefix),
      None => "/".to_string(),
    };
    if self.gzip {
      out.push_str(GZIP_PATH_PREFIX);
    }
    let generated = self.path.trim_start_matches('/').contains(':');
    let encoded = encode(
      &self.path,
      self.hash.as_deref().unwrap_or_default(),
      self.variant_key.as_deref(),
      generated,
    );
    out.push_str(encoded.trim_start_matches('/'));
    out
  }
}

/// Encode a logical path into `/<hash>[.<variant>]/<path>`.
///
/// Generated paths keep their `prefix:rest` marker as the first segment after the hash.
/// An empty variant omits the separator entirely.
///
/// ```
/// use bundlepath::codec::encode;
///
/// assert_eq!(encode("/js/app.js", "N1234", Some("en_US"), false), "/N1234.en_US/js/app.js");
/// assert_eq!(encode("jar:/css/site.css", "N1234", None, true), "/N1234/jar:/css/site.css");
/// ```
pub fn encode(logical_path: &str, hash: &str, variant: Option<&str>, generated: bool) -> String {
  let mut out = String::with_capacity(logical_path.len() + hash.len() + 8);
  out.push('/');
  out.push_str(hash);
  if let Some(variant) = variant.filter(|v| !v.is_empty()) {
    out.push(VARIANT_SEPARATOR);
    out.push_str(variant);
  }
  out.push('/');
  if generated {
    out.push_str(logical_path.trim_start_matches('/'));
  } else {
    out.push_str(as_path(logical_path).trim_start_matches('/'));
  }
  out
}

/// Decode a public request path.
///
/// Bundle prefixes are tried in the order given and the first literal match wins. The gzip
/// marker is only recognised at the start of the hash segment, so a logical path with a
/// `gzip_` directory keeps decoding to itself.
pub fn decode<S: AsRef<str>>(request_path: &str, bundle_prefixes: &[S]) -> Result<RequestPathInfo> {
  let decoded = parse(request_path, bundle_prefixes);
  if decoded.is_none() {
    debug!(request_path, "request path is not a bundle request");
  }
  decoded.ok_or_else(|| BundleError::Decode(request_path.to_string()))
}

fn parse<S: AsRef<str>>(request_path: &str, bundle_prefixes: &[S]) -> Option<RequestPathInfo> {
  if request_path.is_empty() || !is_normalized(request_path) {
    return None;
  }

  let matched = bundle_prefixes
    .iter()
    .map(|prefix| as_dir_path(prefix.as_ref()))
    .find(|prefix| prefix != "/" && request_path.starts_with(prefix.as_str()));
  let (bundle_prefix, remaining) = match matched {
    Some(prefix) => {
      let remaining = &request_path[prefix.len()..];
      (Some(prefix), remaining)
    }
    None => (None, request_path.strip_prefix('/').unwrap_or(request_path)),
  };
  let (remaining, gzip) = match remaining.strip_prefix(GZIP_PATH_PREFIX) {
    Some(rest) => (rest, true),
    None => (remaining, false),
  };

  let slash = remaining.find('/')?;
  let hash_segment = &remaining[..slash];
  let (hash, variant_key) = match hash_segment.split_once(VARIANT_SEPARATOR) {
    Some((hash, variant)) => (hash, (!variant.is_empty()).then(|| variant.to_string())),
    None => (hash_segment, None),
  };
  if hash.is_empty() {
    return None;
  }

  let mut path = &remaining[slash..];
  if path.contains(':') {
    path = path.strip_prefix('/').unwrap_or(path);
  }
  if path.trim_matches('/').is_empty() {
    return None;
  }

  Some(RequestPathInfo {
    bundle_prefix,
    path: path.to_string(),
    variant_key,
    hash: Some(hash.to_string()),
    gzip,
  })
}

/// Move the variant from the leading hash segment onto the file name.
///
/// `/N1234.en_US/js/msg.js` becomes `/js/msg@en_US.js`; without a variant the hash
/// segment is simply dropped.
pub fn remove_variant_prefix_from_path(path: &str) -> Result<String> {
  let trimmed = path.strip_prefix('/').unwrap_or(path);
  let slash = trimmed.find('/').ok_or_else(|| BundleError::InvalidPath {
    path: path.to_string(),
    reason: "missing hash segment",
  })?;

  let (prefix, rest) = trimmed.split_at(slash);
  let Some((_, variant)) = prefix.split_once(VARIANT_SEPARATOR) else {
    return Ok(rest.to_string());
  };

  let file_start = rest.rfind('/').map_or(0, |index| index + 1);
  match rest[file_start..].rfind('.') {
    Some(dot) => {
      let dot = file_start + dot;
      Ok(format!("{}@{variant}{}", &rest[..dot], &rest[dot..]))
    }
    None => Ok(format!("{rest}@{variant}")),
  }
}
