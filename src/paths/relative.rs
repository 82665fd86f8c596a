/// Relative path leading from `basedir` back up to it from `filename`.
///
/// One `..` is emitted per directory level of `filename` below `basedir`. A zero-length
/// string is returned when either argument is empty or `filename` does not live under
/// `basedir`. Both separators are accepted; the dominant one is detected from `filename`.
///
/// ```
/// use bundlepath::paths::relative_path;
///
/// assert_eq!(relative_path("/usr/local/", "/usr/local/java/bin"), "..");
/// assert_eq!(relative_path("/usr/local/", "/usr/local/java/bin/java.sh"), "../..");
/// assert_eq!(relative_path("/usr/local/java/bin/java.sh", "/usr/local/"), "");
/// ```
pub fn relative_path(basedir: &str, filename: &str) -> String {
    let basedir = uppercase_drive(basedir);
    let filename = uppercase_drive(filename);

    if basedir.is_empty() || filename.is_empty() || !filename.starts_with(basedir.as_str()) {
        return String::new();
    }

    let separator = determine_separator(&filename);
    let basedir = chomp_last(&basedir, separator);
    let filename = chomp_last(&filename, separator);

    let relative = filename.get(basedir.len()..).unwrap_or_default();
    parent_hops(relative, separator)
}

/// Relative web path from `old_path` to `new_path`, both using `/`.
///
/// A trailing separator on `new_path` is carried over to the result.
pub fn relative_web_path(old_path: &str, new_path: &str) -> String {
    if old_path.is_empty() || new_path.is_empty() {
        return String::new();
    }

    let mut result = build_relative_path(new_path, old_path, '/');
    if new_path.ends_with('/') && !result.ends_with('/') {
        result.push('/');
    }
    result
}

/// Relative filesystem path from `old_path` to `new_path`.
///
/// Both `/` and `\` are accepted and rewritten to `separator`. Windows drive letters are
/// compared case-insensitively; when the two paths sit on different drives, or only one
/// of them carries a drive, no relative path exists and `None` is returned.
pub fn relative_file_path(old_path: &str, new_path: &str, separator: char) -> Option<String> {
    if old_path.is_empty() || new_path.is_empty() {
        return Some(String::new());
    }

    let from_path = lowercase_drive(&strip_drive_slash(&unify_separators(old_path, separator)));
    let to_path = lowercase_drive(&strip_drive_slash(&unify_separators(new_path, separator)));

    match (drive_letter(&from_path), drive_letter(&to_path)) {
        (Some(from), Some(to)) if from != to => return None,
        (Some(_), None) | (None, Some(_)) => return None,
        _ => {}
    }

    let mut result = build_relative_path(&to_path, &from_path, separator);
    if to_path.ends_with(separator) && !result.ends_with(separator) {
        result.push(separator);
    }
    Some(result)
}

/// Walk both paths token by token past their common prefix.
///
/// Emits one `..` for every remaining segment of `from_path`, followed by the remaining
/// segments of `to_path`. Segment comparison ignores ASCII case when the separator is `\`.
pub fn build_relative_path(to_path: &str, from_path: &str, separator: char) -> String {
    let to: Vec<&str> = to_path.split(separator).filter(|s| !s.is_empty()).collect();
    let from: Vec<&str> = from_path
        .split(separator)
        .filter(|s| !s.is_empty())
        .collect();

    let common = to
        .iter()
        .zip(&from)
        .take_while(|(to_segment, from_segment)| {
            if separator == '\\' {
                to_segment.eq_ignore_ascii_case(from_segment)
            } else {
                to_segment == from_segment
            }
        })
        .count();

    let mut parts: Vec<&str> = vec![".."; from.len() - common];
    parts.extend_from_slice(&to[common..]);
    parts.join(&separator.to_string())
}

/// Relative path of a URL back to the application root.
///
/// `/servlet/css/site.css` yields `../../`; the file name itself does not count.
pub fn root_relative_path(url: &str) -> String {
    let separators = url.matches('/').count();
    "../".repeat(separators.saturating_sub(1))
}

/// Upper-case a leading Windows drive letter (`c:\dir` becomes `C:\dir`).
pub fn uppercase_drive(path: &str) -> String {
    map_drive(path, |letter| letter.to_ascii_uppercase())
}

fn lowercase_drive(path: &str) -> String {
    map_drive(path, |letter| letter.to_ascii_lowercase())
}

fn map_drive(path: &str, map: impl Fn(char) -> char) -> String {
    let mut chars = path.chars();
    match (chars.next(), chars.next()) {
        (Some(letter), Some(':')) => {
            let mut mapped = String::with_capacity(path.len());
            mapped.push(map(letter));
            mapped.push_str(&path[letter.len_utf8()..]);
            mapped
        }
        _ => path.to_string(),
    }
}

fn drive_letter(path: &str) -> Option<char> {
    let mut chars = path.chars();
    match (chars.next(), chars.next()) {
        (Some(letter), Some(':')) => Some(letter),
        _ => None,
    }
}

fn strip_drive_slash(path: &str) -> String {
    let bytes = path.as_bytes();
    if bytes.len() >= 3
        && (bytes[0] == b'/' || bytes[0] == b'\\')
        && bytes[1].is_ascii_alphabetic()
        && bytes[2] == b':'
    {
        return path[1..].to_string();
    }
    path.to_string()
}

fn unify_separators(path: &str, separator: char) -> String {
    path.chars()
        .map(|c| if c == '/' || c == '\\' { separator } else { c })
        .collect()
}

/// The separator that occurs most often; ties favour `/`.
fn determine_separator(filename: &str) -> char {
    let forward = filename.matches('/').count();
    let backward = filename.matches('\\').count();
    if forward >= backward { '/' } else { '\\' }
}

fn chomp_last(value: &str, separator: char) -> &str {
    value.strip_suffix(separator).unwrap_or(value)
}

fn parent_hops(relative: &str, separator: char) -> String {
    if relative.is_empty() {
        return String::new();
    }

    let depth = relative.matches(separator).count().saturating_sub(1);
    if depth == 0 {
        return ".".to_string();
    }
    vec![".."; depth].join("/")
}
