use std::collections::BTreeSet;

use super::filters::is_absolute_url;

/// Separator used by every logical path.
pub const URL_SEPARATOR: char = '/';

/// Remove leading, trailing, and repeated separators from a path.
///
/// Dot segments are kept as-is: resolving them is the job of
/// [`resolve_traversal`](super::resolve_traversal). Normalising never fails.
pub fn normalize_path(path: &str) -> String {
    path.split(URL_SEPARATOR)
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// Normalise every path of a collection into a de-duplicated set.
pub fn normalize_paths<I, S>(paths: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    paths
        .into_iter()
        .map(|path| normalize_path(path.as_ref()))
        .collect()
}

/// Normalise a bundle path mapping, dropping a trailing `/**` wildcard.
pub fn normalize_path_mapping(mapping: &str) -> String {
    let normalized = normalize_path(mapping);
    match normalized.strip_suffix("/**") {
        Some(stripped) => stripped.to_string(),
        None => normalized,
    }
}

/// Normalise a path and prefix it with a separator.
pub fn as_path(path: &str) -> String {
    format!("/{}", normalize_path(path))
}

/// Normalise a path and wrap it in separators. The root maps onto itself.
pub fn as_dir_path(path: &str) -> String {
    let normalized = normalize_path(path);
    if normalized.is_empty() {
        return "/".to_string();
    }
    format!("/{normalized}/")
}

/// Join a prefix and a path.
///
/// Generated prefixes and absolute URLs (`http://`, `https://`, `//`) are joined
/// domain-style so that their scheme or generator marker survives; everything else is
/// normalised on both sides and joined path-style with a leading separator.
pub fn join_paths(prefix: &str, path: &str, generated: bool) -> String {
    if generated || is_absolute_url(prefix) {
        return join_domain_to_path(prefix, path);
    }

    let normalized_prefix = normalize_path(prefix);
    let mut joined = String::from("/");
    if !normalized_prefix.is_empty() {
        joined.push_str(&normalized_prefix);
        joined.push(URL_SEPARATOR);
    }
    joined.push_str(&normalize_path(path));
    joined
}

/// Append a normalised path to a domain or generator prefix.
pub fn join_domain_to_path(domain: &str, path: &str) -> String {
    let domain = domain.strip_suffix(URL_SEPARATOR).unwrap_or(domain);
    format!("{domain}/{}", normalize_path(path))
}

/// Convert a bundle path containing generator markers into a filesystem-safe one.
pub fn escape_to_physical_path(bundle_path: &str) -> String {
    bundle_path.replace(':', "_")
}

/// Append a `key=value` query parameter, choosing `?` or `&` as needed.
pub fn add_get_parameter(path: &str, key: &str, value: &str) -> String {
    let joiner = match path.find('?') {
        Some(index) if index > 0 => '&',
        _ => '?',
    };
    format!("{path}{joiner}{key}={value}")
}

/// Returns `false` when the path contains a `.` or `..` segment.
///
/// Request paths that fail this check are treated as traversal attempts and must not be
/// trusted.
pub fn is_normalized(path: &str) -> bool {
    !path
        .split(URL_SEPARATOR)
        .any(|segment| segment == "." || segment == "..")
}
