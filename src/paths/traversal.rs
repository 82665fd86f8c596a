use crate::error::{BundleError, Result};

/// Resolve `.` and `..` segments the way a filesystem would.
///
/// Repeated separators are collapsed and a trailing separator is kept when the path
/// designates a directory (including a trailing `.` or `..`). Returns `None` when a `..`
/// segment would climb above the top-level root; callers decide how to recover.
pub fn resolve_traversal(path: &str) -> Option<String> {
    if path.is_empty() {
        return Some(String::new());
    }

    let absolute = path.starts_with('/');
    let mut directory = path.ends_with('/');
    let mut stack: Vec<&str> = Vec::new();

    let mut segments = path.split('/').filter(|s| !s.is_empty()).peekable();
    while let Some(segment) = segments.next() {
        let last = segments.peek().is_none();
        match segment {
            "." => directory |= last,
            ".." => {
                stack.pop()?;
                directory |= last;
            }
            name => stack.push(name),
        }
    }

    let mut resolved = String::with_capacity(path.len());
    if absolute {
        resolved.push('/');
    }
    resolved.push_str(&stack.join("/"));
    if directory && !stack.is_empty() {
        resolved.push('/');
    }
    Some(resolved)
}

/// Concatenate a file name to a base web path and resolve dot segments.
///
/// When `base_path` does not end with a separator it designates a file, and its parent
/// directory is used as the base instead.
///
/// ```
/// use bundlepath::paths::concat_web_path;
///
/// assert_eq!(concat_web_path("/css/folder/", "../icons/img.png").as_deref(), Some("/css/icons/img.png"));
/// assert_eq!(concat_web_path("/css/folder/style.css", "icons/img.png").as_deref(), Some("/css/folder/icons/img.png"));
/// assert_eq!(concat_web_path("/css/", "../../img.png"), None);
/// ```
pub fn concat_web_path(base_path: &str, filename: &str) -> Option<String> {
    let base = if base_path.len() > 1 && !base_path.ends_with('/') {
        parent_path(base_path)
    } else {
        base_path.to_string()
    };

    if base.is_empty() {
        return resolve_traversal(filename);
    }

    let full_path = if base.ends_with('/') {
        format!("{base}{filename}")
    } else {
        format!("{base}/{filename}")
    };
    resolve_traversal(&full_path)
}

/// [`concat_web_path`] for callers that must reject escaping paths outright.
pub fn resolve_against(base_path: &str, addition: &str) -> Result<String> {
    concat_web_path(base_path, addition)
        .ok_or_else(|| BundleError::TraversalRejected(format!("{base_path} + {addition}")))
}

/// Parent directory of a file or directory path, always ending with a separator.
pub fn parent_path(path: &str) -> String {
    if path.is_empty() {
        return String::new();
    }

    let trimmed = if path.len() > 1 {
        path.strip_suffix('/').unwrap_or(path)
    } else {
        path
    };

    match trimmed.rfind('/') {
        Some(index) if index > 0 => trimmed[..=index].to_string(),
        _ => "/".to_string(),
    }
}

/// Last segment of a path, ignoring a trailing separator.
pub fn path_name(path: &str) -> String {
    if path.is_empty() || path == "/" {
        return path.to_string();
    }

    let trimmed = path.strip_suffix('/').unwrap_or(path);
    match trimmed.rfind('/') {
        Some(index) => trimmed[index + 1..].to_string(),
        None => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_dot_segments() {
        assert_eq!(resolve_traversal("/a/./b/../c").as_deref(), Some("/a/c"));
        assert_eq!(resolve_traversal("./a//b/").as_deref(), Some("a/b/"));
        assert_eq!(resolve_traversal("/a/b/..").as_deref(), Some("/a/"));
        assert_eq!(resolve_traversal("/a/..").as_deref(), Some("/"));
        assert_eq!(resolve_traversal("/").as_deref(), Some("/"));
    }

    #[test]
    fn refuses_to_escape_the_root() {
        assert_eq!(resolve_traversal("../a"), None);
        assert_eq!(resolve_traversal("/../a"), None);
        assert_eq!(resolve_traversal("/css/../../a.png"), None);
    }

    #[test]
    fn concatenates_relative_to_directories_and_files() {
        assert_eq!(
            concat_web_path("/css/folder/subfolder/", "icons/img.png").as_deref(),
            Some("/css/folder/subfolder/icons/img.png")
        );
        assert_eq!(
            concat_web_path("/css/folder/subfolder/style.css", "icons/img.png").as_deref(),
            Some("/css/folder/subfolder/icons/img.png")
        );
        assert_eq!(
            concat_web_path("/css/folder/", "../icons/img.png").as_deref(),
            Some("/css/icons/img.png")
        );
        assert_eq!(
            concat_web_path("/css/folder/style.css", "../icons/img.png").as_deref(),
            Some("/css/icons/img.png")
        );
        assert_eq!(concat_web_path("", "/a").as_deref(), Some("/a"));
    }

    #[test]
    fn resolve_against_reports_rejected_traversal() {
        let err = resolve_against("/css/", "../../secret.txt").unwrap_err();
        assert!(matches!(err, BundleError::TraversalRejected(_)));
        assert_eq!(resolve_against("/css/", "../a.png").unwrap(), "/a.png");
    }

    #[test]
    fn computes_parent_paths() {
        assert_eq!(parent_path(""), "");
        assert_eq!(parent_path("/"), "/");
        assert_eq!(parent_path("/usr/local/bin/java.sh"), "/usr/local/bin/");
        assert_eq!(parent_path("/usr/local/"), "/usr/");
        assert_eq!(parent_path("/site.css"), "/");
    }

    #[test]
    fn computes_path_names() {
        assert_eq!(path_name(""), "");
        assert_eq!(path_name("/"), "/");
        assert_eq!(path_name("/usr/local/"), "local");
        assert_eq!(path_name("/usr/local/bin/java.sh"), "java.sh");
        assert_eq!(path_name("site.css"), "site.css");
    }
}
