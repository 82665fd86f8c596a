//! Bidirectional mapping between public request paths and resource identities.
//!
//! [`encode`] and [`decode`] handle bundle request paths
//! (`[/<prefix>][/gzip_]<hash>[.<variant>]/<path>`), the cache-buster helpers handle
//! binary resources referenced from stylesheets, and [`create_generation_path`] builds
//! debug-mode URLs served straight from a generator.

mod cache_buster;
mod generation;
mod request;

pub use cache_buster::{
  BinaryResourceInfo, CACHE_BUSTER_PREFIX, GENERATOR_TOKEN_SEPARATOR, cache_busted_url,
  extract_binary_resource_info,
};
pub use generation::{GENERATION_PARAM, create_generation_path};
pub use request::{
  GZIP_PATH_PREFIX, RequestPathInfo, VARIANT_SEPARATOR, decode, encode,
  remove_variant_prefix_from_path,
};
