use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

use crate::generator::GeneratorRegistry;

/// Query parameter carrying the generator path of a debug-mode generation request.
pub const GENERATION_PARAM: &str = "generationConfigParam";

/// Characters left as-is when encoding a generator path into a query parameter.
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
  .remove(b'-')
  .remove(b'_')
  .remove(b'.')
  .remove(b'*');

/// Build the debug-mode request path that asks the generator behind `path` for content.
///
/// The generator path travels percent-encoded in the [`GENERATION_PARAM`] parameter. A
/// `random_param` (for example `d=1234`) is placed first so that browsers never reuse a
/// stale response.
pub fn create_generation_path(
  path: &str,
  registry: &GeneratorRegistry,
  random_param: Option<&str>,
) -> String {
  let mut request_path = registry.debug_mode_generation_path(path).to_string();
  request_path.push('?');
  if let Some(random_param) = random_param {
    request_path.push_str(random_param);
    request_path.push('&');
  }
  request_path.push_str(GENERATION_PARAM);
  request_path.push('=');
  request_path.extend(utf8_percent_encode(path, QUERY_VALUE));
  request_path
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn encodes_the_generator_path() {
    let registry = GeneratorRegistry::new("/generator.js");
    assert_eq!(
      create_generation_path("messages:bundles.msg", &registry, None),
      "/generator.js?generationConfigParam=messages%3Abundles.msg"
    );
    assert_eq!(
      create_generation_path("jar:/js/my lib.js", &registry, Some("d=42")),
      "/generator.js?d=42&generationConfigParam=jar%3A%2Fjs%2Fmy%20lib.js"
    );
  }
}
