//! Error taxonomy shared by the path, codec, generator and rewriting layers.
//!
//! Every variant is a recoverable condition handled at the boundary of the
//! component that produced it. None of them should take the serving process down.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Boxed failure raised by a generator plugin.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, BundleError>;

/// Errors raised while resolving, generating or rewriting bundle resources.
#[derive(Debug, Error)]
pub enum BundleError {
  /// The supplied path is malformed; callers fall back to default handling.
  #[error("invalid path '{path}': {reason}")]
  InvalidPath {
    /// Offending path.
    path: String,
    /// Short description of what is wrong with it.
    reason: &'static str,
  },

  /// A generator or reader found nothing for the path.
  #[error("resource not found: {0}")]
  ResourceNotFound(String),

  /// A generator plugin failed while producing content.
  #[error("unable to generate content for resource path '{path}'")]
  Generation {
    /// Path being generated.
    path: String,
    /// Plugin-specific failure.
    #[source]
    source: BoxError,
  },

  /// The request path did not parse as a bundle request.
  #[error("unable to extract bundle info from request path '{0}'")]
  Decode(String),

  /// Resolving the path would escape above the application root.
  #[error("path '{0}' resolves outside of the application root")]
  TraversalRejected(String),

  /// Two generators were registered under one prefix.
  #[error("a generator is already registered for prefix '{0}'")]
  DuplicatePrefix(String),

  /// Two cached generators point at the same mapping file.
  #[error("cache mapping file {} is already owned by generator '{owner}'", .path.display())]
  DuplicateCacheMapping {
    /// Mapping file both generators would write.
    path: PathBuf,
    /// Name of the generator registered first.
    owner: String,
  },

  /// Underlying I/O failure.
  #[error("I/O error: {0}")]
  Io(#[from] io::Error),
}

impl BundleError {
  /// Wrap a plugin failure for `path`.
  pub fn generation(path: impl Into<String>, source: impl Into<BoxError>) -> Self {
    Self::Generation {
      path: path.into(),
      source: source.into(),
    }
  }

  /// Returns `true` for configuration problems that must be reported at startup.
  pub fn is_configuration_error(&self) -> bool {
    matches!(
      self,
      Self::DuplicatePrefix(_) | Self::DuplicateCacheMapping { .. }
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn generation_error_exposes_plugin_source() {
    let err = BundleError::generation("/css/site.scss", "undefined variable $accent");
    assert_eq!(
      err.to_string(),
      "unable to generate content for resource path '/css/site.scss'"
    );
    let source = std::error::Error::source(&err).map(|s| s.to_string());
    assert_eq!(source.as_deref(), Some("undefined variable $accent"));
  }

  #[test]
  fn classifies_configuration_errors() {
    assert!(BundleError::DuplicatePrefix("jar".into()).is_configuration_error());
    assert!(!BundleError::Decode("/x".into()).is_configuration_error());
  }
}
