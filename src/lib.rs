#![doc = include_str!("../README.md")]
#![warn(missing_docs)]
#![allow(clippy::module_inception)]

pub mod codec;
pub mod config;
pub mod css;
pub mod error;
pub mod generator;
pub mod hash;
pub mod paths;
pub mod reader;
pub mod runtime;

pub use codec::{RequestPathInfo, decode, encode};
pub use config::{BundlerConfig, ConfigError};
pub use css::{BinaryResourceHandler, CssRewriteContext, CssUrlRewriter};
pub use error::{BundleError, Result};
pub use generator::{CacheMode, CachedGenerator, Generator, GeneratorCacheConfig, GeneratorRegistry, PathMatcher};
pub use hash::ContentHash;
pub use reader::{FileSystemReader, ResourceReader};
pub use runtime::{BundleRuntime, RuntimeSnapshot};
