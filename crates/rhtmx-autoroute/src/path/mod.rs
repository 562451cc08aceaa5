//! URL path helpers shared by the scanner and the server binding
//!
//! Route paths are kept in one canonical shape: a leading `/`, `/` as the
//! only separator, no empty segments and no trailing `/` except for the
//! root itself.

use std::borrow::Cow;

/// Prefix marking files and directories excluded from scanning
pub const IGNORE_MARKER: char = '_';

/// Whether `path` is already a canonical route path
///
/// ```
/// use rhtmx_autoroute::path::is_valid_path;
///
/// assert!(is_valid_path("/"));
/// assert!(is_valid_path("/users/list"));
/// assert!(!is_valid_path("users/list"));
/// assert!(!is_valid_path("/users/"));
/// assert!(!is_valid_path("/users//list"));
/// ```
pub fn is_valid_path(path: &str) -> bool {
    let Some(rest) = path.strip_prefix('/') else {
        return false;
    };

    rest.is_empty() || (!rest.contains('\\') && rest.split('/').all(|segment| !segment.is_empty()))
}

/// Brings a path into canonical shape
///
/// Canonical input is returned borrowed. Backslashes count as separators
/// and empty segments are dropped, so `""` and `"//"` both become `/`.
///
/// ```
/// use rhtmx_autoroute::path::normalize_path;
///
/// assert_eq!(normalize_path("users\\list/"), "/users/list");
/// assert_eq!(normalize_path("//"), "/");
/// ```
pub fn normalize_path(path: &str) -> Cow<'_, str> {
    if is_valid_path(path) {
        return Cow::Borrowed(path);
    }

    let mut canonical = String::with_capacity(path.len() + 1);
    for segment in path.split(['/', '\\']).filter(|s| !s.is_empty()) {
        canonical.push('/');
        canonical.push_str(segment);
    }

    if canonical.is_empty() {
        Cow::Borrowed("/")
    } else {
        Cow::Owned(canonical)
    }
}

/// Appends a segment (or a whole sub-path) to a base URL path
///
/// ```
/// use rhtmx_autoroute::path::join_route_path;
///
/// assert_eq!(join_route_path("/", "users"), "/users");
/// assert_eq!(join_route_path("/api", "/users/list"), "/api/users/list");
/// assert_eq!(join_route_path("/api", "/"), "/api");
/// ```
pub fn join_route_path(base: &str, segment: &str) -> String {
    normalize_path(&format!("{}/{}", base, segment)).into_owned()
}

/// Whether a file or directory name is excluded from scanning
pub fn is_ignored_name(name: &str) -> bool {
    name.starts_with(IGNORE_MARKER)
}

/// Inner name of a group directory: `(admin)` → `Some("admin")`
///
/// Group directories organize files without contributing a URL segment.
pub fn group_name(dir_name: &str) -> Option<&str> {
    dir_name
        .strip_prefix('(')
        .and_then(|rest| rest.strip_suffix(')'))
}
