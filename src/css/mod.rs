//! Stylesheet post-processing: relocating `url(...)` references into bundles and
//! cache-busting the binary resources they point at.

mod binary;
mod rewriter;

pub use binary::{BINARY_EXTENSIONS, BinaryResourceHandler, is_binary_resource};
pub use rewriter::{CssRewriteContext, CssUrlRewriter};
