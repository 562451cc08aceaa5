// File: src/source.rs
// Purpose: Filesystem conventions of a routes source tree

use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::path::{group_name, is_ignored_name, join_route_path};

/// Stem of the per-directory middleware declaration
pub const MIDDLEWARE_STEM: &str = "middleware";

/// Stem of the per-directory expectations declaration
pub const EXPECTATIONS_STEM: &str = "expectations";

/// Data formats accepted for expectations besides the source extensions
pub const EXPECTATIONS_DATA_EXTENSIONS: [&str; 2] = ["toml", "json"];

/// Kinds of directory-configuring files
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclarationKind {
    Middleware,
    Expectations,
}

/// URL context of a directory inside the source tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirContext {
    /// URL path that routes directly inside the directory start from
    pub base_path: String,
    /// Inner name of the nearest enclosing `(group)` directory
    pub group: Option<String>,
}

/// The scanned source root and the extensions recognized inside it
#[derive(Debug, Clone)]
pub struct SourceTree {
    root: PathBuf,
    extensions: Vec<String>,
}

impl SourceTree {
    /// Creates a source tree rooted at `root`
    ///
    /// The root is canonicalized when it exists so that paths reported by the
    /// file watcher compare equal to scanned paths.
    pub fn new(root: impl Into<PathBuf>, extensions: Vec<String>) -> Self {
        let root = root.into();
        let root = fs::canonicalize(&root).unwrap_or(root);
        Self { root, extensions }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    fn is_source_extension(&self, ext: &str) -> bool {
        self.extensions.iter().any(|e| e == ext)
    }

    /// Classifies a bare file name as a directory declaration
    ///
    /// ```
    /// use rhtmx_autoroute::source::{DeclarationKind, SourceTree};
    ///
    /// let tree = SourceTree::new("routes", vec!["rs".to_string()]);
    /// assert_eq!(tree.declaration_kind("middleware.rs"), Some(DeclarationKind::Middleware));
    /// assert_eq!(tree.declaration_kind("expectations.toml"), Some(DeclarationKind::Expectations));
    /// assert_eq!(tree.declaration_kind("middleware.toml"), None);
    /// assert_eq!(tree.declaration_kind("list.get.rs"), None);
    /// ```
    pub fn declaration_kind(&self, file_name: &str) -> Option<DeclarationKind> {
        let (stem, ext) = file_name.split_once('.')?;
        if ext.contains('.') {
            return None;
        }

        match stem {
            MIDDLEWARE_STEM if self.is_source_extension(ext) => Some(DeclarationKind::Middleware),
            EXPECTATIONS_STEM
                if self.is_source_extension(ext) || EXPECTATIONS_DATA_EXTENSIONS.contains(&ext) =>
            {
                Some(DeclarationKind::Expectations)
            }
            _ => None,
        }
    }

    /// Finds the declaration file of `kind` directly inside `dir`
    ///
    /// Candidate extensions are tried in a fixed order: source extensions
    /// first, then the data formats.
    pub fn declaration_in(&self, dir: &Path, kind: DeclarationKind) -> Option<PathBuf> {
        let stem = match kind {
            DeclarationKind::Middleware => MIDDLEWARE_STEM,
            DeclarationKind::Expectations => EXPECTATIONS_STEM,
        };

        let data_exts: &[&str] = match kind {
            DeclarationKind::Middleware => &[],
            DeclarationKind::Expectations => &EXPECTATIONS_DATA_EXTENSIONS,
        };

        self.extensions
            .iter()
            .map(String::as_str)
            .chain(data_exts.iter().copied())
            .map(|ext| dir.join(format!("{}.{}", stem, ext)))
            .find(|candidate| candidate.is_file())
    }

    /// Path relative to the root, `None` when outside of it
    pub fn relative<'a>(&self, path: &'a Path) -> Option<&'a Path> {
        path.strip_prefix(&self.root).ok()
    }

    /// Whether any segment below the root carries the ignore marker
    pub fn is_ignored(&self, path: &Path) -> bool {
        match self.relative(path) {
            Some(relative) => relative.components().any(|component| match component {
                Component::Normal(name) => name.to_str().map_or(false, is_ignored_name),
                _ => false,
            }),
            None => false,
        }
    }

    /// Ignore predicate handed to the watch layer
    ///
    /// Drops underscore-prefixed segments and existing regular files whose
    /// extension is not recognized. Paths that no longer exist pass through
    /// so that deletions still reach the reactor.
    pub fn is_watched(&self, path: &Path) -> bool {
        if self.relative(path).is_none() || self.is_ignored(path) {
            return false;
        }

        if !path.is_file() {
            return true;
        }

        let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        if self.declaration_kind(file_name).is_some() {
            return true;
        }

        path.extension()
            .and_then(|ext| ext.to_str())
            .map_or(false, |ext| self.is_source_extension(ext))
    }

    /// Computes the URL base and group of a directory inside the tree
    ///
    /// Returns `None` when the directory lies outside the root or below an
    /// ignored segment.
    pub fn route_base_for(&self, dir: &Path) -> Option<DirContext> {
        let relative = self.relative(dir)?;

        relative
            .components()
            .try_fold(
                DirContext {
                    base_path: "/".to_string(),
                    group: None,
                },
                |mut ctx, component| {
                    let name = match component {
                        Component::Normal(name) => name.to_str()?,
                        _ => return Some(ctx),
                    };

                    if is_ignored_name(name) {
                        return None;
                    }

                    match group_name(name) {
                        Some(group) => ctx.group = Some(group.to_string()),
                        None => ctx.base_path = join_route_path(&ctx.base_path, name),
                    }
                    Some(ctx)
                },
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn tree() -> SourceTree {
        SourceTree::new("/srv/app/routes", vec!["rs".to_string()])
    }

    #[test]
    fn test_route_base_for_root() {
        let ctx = tree().route_base_for(Path::new("/srv/app/routes")).unwrap();
        assert_eq!(ctx.base_path, "/");
        assert_eq!(ctx.group, None);
    }

    #[test]
    fn test_route_base_for_groups() {
        let ctx = tree()
            .route_base_for(Path::new("/srv/app/routes/(admin)/users"))
            .unwrap();
        assert_eq!(ctx.base_path, "/users");
        assert_eq!(ctx.group.as_deref(), Some("admin"));
    }

    #[test]
    fn test_route_base_for_ignored_or_outside() {
        assert!(tree()
            .route_base_for(Path::new("/srv/app/routes/_drafts/users"))
            .is_none());
        assert!(tree().route_base_for(Path::new("/srv/other")).is_none());
    }

    #[test]
    fn test_is_ignored() {
        let tree = tree();
        assert!(tree.is_ignored(Path::new("/srv/app/routes/_lib/helper.get.rs")));
        assert!(tree.is_ignored(Path::new("/srv/app/routes/users/_draft.get.rs")));
        assert!(!tree.is_ignored(Path::new("/srv/app/routes/users/list.get.rs")));
    }

    #[test]
    fn test_declaration_kinds() {
        let tree = tree();
        assert_eq!(
            tree.declaration_kind("expectations.rs"),
            Some(DeclarationKind::Expectations)
        );
        assert_eq!(
            tree.declaration_kind("expectations.json"),
            Some(DeclarationKind::Expectations)
        );
        assert_eq!(tree.declaration_kind("middleware.get.rs"), None);
        assert_eq!(tree.declaration_kind("middleware"), None);
    }
}
