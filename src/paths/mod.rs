//! Pure string algebra over slash-separated resource paths.
//!
//! The helpers are split into focused submodules so that canonicalisation, dot-segment
//! resolution, relative path computation, and URL classification can be tested
//! independently. Nothing in here touches the filesystem.

mod filters;
mod normalize;
mod relative;
mod traversal;

pub use filters::{is_absolute_url, is_external_reference};
pub use normalize::{
    URL_SEPARATOR, add_get_parameter, as_dir_path, as_path, escape_to_physical_path,
    is_normalized, join_domain_to_path, join_paths, normalize_path, normalize_path_mapping,
    normalize_paths,
};
pub use relative::{
    build_relative_path, relative_file_path, relative_path, relative_web_path,
    root_relative_path, uppercase_drive,
};
pub use traversal::{concat_web_path, parent_path, path_name, resolve_against, resolve_traversal};
