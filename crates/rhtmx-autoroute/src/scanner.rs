// File: src/scanner.rs
// Purpose: Walks the source tree and turns handler files into route definitions

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, trace, warn};
use walkdir::WalkDir;

use crate::expectations::{Expectations, ExpectationsResolver};
use crate::loader::ModuleLoader;
use crate::middleware::MiddlewareResolver;
use crate::path::{group_name, is_ignored_name, join_route_path};
use crate::route::{parse_filename, ParsedFilename};
use crate::source::SourceTree;
use crate::RouteDefinition;

struct DirScope {
    base_path: String,
    group: Option<String>,
    expectations: Option<Expectations>,
}

/// Recursive directory scanner
///
/// Borrows the resolvers owned by the route builder for the duration of one
/// scan. Results are deterministic for a fixed tree: entries are visited in
/// sorted order.
pub struct DirectoryScanner<'a> {
    source: &'a SourceTree,
    middleware: &'a MiddlewareResolver,
    expectations: &'a mut ExpectationsResolver,
    loader: &'a dyn ModuleLoader,
}

impl<'a> DirectoryScanner<'a> {
    pub fn new(
        source: &'a SourceTree,
        middleware: &'a MiddlewareResolver,
        expectations: &'a mut ExpectationsResolver,
        loader: &'a dyn ModuleLoader,
    ) -> Self {
        Self {
            source,
            middleware,
            expectations,
            loader,
        }
    }

    /// Scans `dir` recursively, producing routes rooted at `base_path`
    pub fn scan(&mut self, dir: &Path, base_path: &str) -> Vec<RouteDefinition> {
        self.scan_dir(dir, base_path, None)
    }

    /// Scans a directory of the source tree using its own URL base
    ///
    /// Directories outside the root or below an ignored segment yield nothing.
    pub fn scan_subtree(&mut self, dir: &Path) -> Vec<RouteDefinition> {
        match self.source.route_base_for(dir) {
            Some(ctx) => self.scan_dir(dir, &ctx.base_path, ctx.group.as_deref()),
            None => {
                debug!(dir = %dir.display(), "skipping rescan of ignored directory");
                Vec::new()
            }
        }
    }

    /// Builds the definition of a single handler file
    ///
    /// `None` for ignored paths, declarations and unparseable names.
    pub fn definition_for(&mut self, file: &Path) -> Option<RouteDefinition> {
        let dir = file.parent()?;
        let ctx = self.source.route_base_for(dir)?;
        let name = file.file_name()?.to_str()?;

        if is_ignored_name(name) || self.source.declaration_kind(name).is_some() {
            return None;
        }

        let parsed = parse_filename(name, self.source.extensions())?;
        let expectations = self.expectations.resolve(dir, self.source, self.loader);

        Some(self.definition(
            file,
            parsed,
            &ctx.base_path,
            ctx.group.as_deref(),
            expectations,
        ))
    }

    fn scan_dir(&mut self, dir: &Path, base_path: &str, group: Option<&str>) -> Vec<RouteDefinition> {
        if !dir.is_dir() {
            warn!(dir = %dir.display(), "source directory does not exist");
            return Vec::new();
        }

        // Symlinks are never followed, so a link back up the tree cannot loop
        let walker = WalkDir::new(dir)
            .min_depth(1)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                entry.depth() == 0 || !entry.file_name().to_str().map_or(false, is_ignored_name)
            });

        let mut contexts: HashMap<PathBuf, DirScope> = HashMap::new();
        let mut routes = Vec::new();

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(dir = %dir.display(), error = %e, "failed to read directory entry");
                    continue;
                }
            };
            let path = entry.path();

            if entry.file_type().is_dir() {
                continue;
            }
            if entry.path_is_symlink() && path.is_dir() {
                debug!(path = %path.display(), "skipping symlinked directory");
                continue;
            }

            let Some(name) = entry.file_name().to_str() else {
                debug!(path = %path.display(), "skipping non UTF-8 entry");
                continue;
            };
            if self.source.declaration_kind(name).is_some() {
                continue;
            }
            let Some(parsed) = parse_filename(name, self.source.extensions()) else {
                trace!(path = %path.display(), "not a handler file");
                continue;
            };
            let Some(parent) = path.parent() else {
                continue;
            };

            if !contexts.contains_key(parent) {
                let scope = self.scope_for(dir, parent, base_path, group);
                contexts.insert(parent.to_path_buf(), scope);
            }
            let Some(scope) = contexts.get(parent) else {
                continue;
            };

            routes.push(self.definition(
                path,
                parsed,
                &scope.base_path,
                scope.group.as_deref(),
                scope.expectations.clone(),
            ));
        }

        routes
    }

    /// URL base, group and expectations of `parent`, a directory below `dir`
    fn scope_for(&mut self, dir: &Path, parent: &Path, base_path: &str, group: Option<&str>) -> DirScope {
        let mut scope = DirScope {
            base_path: base_path.to_string(),
            group: group.map(str::to_string),
            expectations: None,
        };

        let relative = parent.strip_prefix(dir).unwrap_or(Path::new(""));
        for component in relative.components() {
            let Component::Normal(segment) = component else {
                continue;
            };
            let segment = segment.to_string_lossy();
            match group_name(&segment) {
                Some(inner) => scope.group = Some(inner.to_string()),
                None => scope.base_path = join_route_path(&scope.base_path, &segment),
            }
        }

        scope.expectations = self.expectations.resolve(parent, self.source, self.loader);
        scope
    }

    fn definition(
        &self,
        file: &Path,
        parsed: ParsedFilename<'_>,
        base_path: &str,
        group: Option<&str>,
        expectations: Option<Expectations>,
    ) -> RouteDefinition {
        let route_path = match parsed.segment() {
            Some(segment) => join_route_path(base_path, segment),
            None => join_route_path(base_path, "/"),
        };

        RouteDefinition {
            route_path,
            method: parsed.method,
            handler_path: file.to_path_buf(),
            middleware: self.middleware.chain(file),
            expectations,
            group: group.map(str::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::ModuleRegistry;
    use crate::HttpMethod;
    use pretty_assertions::assert_eq;
    use std::fs;

    struct Fixture {
        _dir: tempfile::TempDir,
        source: SourceTree,
        registry: ModuleRegistry,
    }

    impl Fixture {
        fn new(files: &[&str]) -> Self {
            let dir = tempfile::tempdir().unwrap();
            for file in files {
                let path = dir.path().join(file);
                fs::create_dir_all(path.parent().unwrap()).unwrap();
                fs::write(&path, "").unwrap();
            }
            let source = SourceTree::new(dir.path(), vec!["rs".to_string()]);
            let registry = ModuleRegistry::new(dir.path());
            Self {
                _dir: dir,
                source,
                registry,
            }
        }

        fn scan(&self) -> Vec<RouteDefinition> {
            let middleware = MiddlewareResolver::new(self.source.clone());
            let mut expectations = ExpectationsResolver::new();
            let mut scanner =
                DirectoryScanner::new(&self.source, &middleware, &mut expectations, &self.registry);
            scanner.scan(self.source.root(), "/")
        }

        fn paths(&self) -> Vec<(String, HttpMethod)> {
            self.scan()
                .into_iter()
                .map(|def| (def.route_path, def.method))
                .collect()
        }
    }

    #[test]
    fn test_single_handler() {
        let fx = Fixture::new(&["users/list.get.rs"]);
        let routes = fx.scan();

        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].route_path, "/users/list");
        assert_eq!(routes[0].method, HttpMethod::Get);
        assert_eq!(routes[0].handler_path, fx.source.root().join("users/list.get.rs"));
    }

    #[test]
    fn test_index_contributes_no_segment() {
        let fx = Fixture::new(&["index.get.rs", "users/index.get.rs", "users/index.post.rs"]);
        assert_eq!(
            fx.paths(),
            vec![
                ("/".to_string(), HttpMethod::Get),
                ("/users".to_string(), HttpMethod::Get),
                ("/users".to_string(), HttpMethod::Post),
            ]
        );
    }

    #[test]
    fn test_index_under_custom_base() {
        let fx = Fixture::new(&["index.get.rs"]);
        let middleware = MiddlewareResolver::new(fx.source.clone());
        let mut expectations = ExpectationsResolver::new();
        let mut scanner =
            DirectoryScanner::new(&fx.source, &middleware, &mut expectations, &fx.registry);

        let routes = scanner.scan(fx.source.root(), "/users");
        assert_eq!(routes[0].route_path, "/users");
    }

    #[test]
    fn test_group_directory_is_elided() {
        let fx = Fixture::new(&["(admin)/users/list.get.rs"]);
        let routes = fx.scan();

        assert_eq!(routes[0].route_path, "/users/list");
        assert_eq!(routes[0].group.as_deref(), Some("admin"));
    }

    #[test]
    fn test_ignored_entries_never_appear() {
        let fx = Fixture::new(&[
            "_drafts/list.get.rs",
            "users/_hidden.get.rs",
            "users/_lib/helper.get.rs",
            "users/list.get.rs",
        ]);
        assert_eq!(fx.paths(), vec![("/users/list".to_string(), HttpMethod::Get)]);
    }

    #[test]
    fn test_declarations_and_unparseable_files_are_skipped() {
        let fx = Fixture::new(&[
            "users/middleware.rs",
            "users/expectations.toml",
            "users/README.md",
            "users/helpers.rs",
            "users/list.GET.rs",
            "users/list.get.rs",
        ]);
        assert_eq!(fx.paths(), vec![("/users/list".to_string(), HttpMethod::Get)]);
    }

    #[test]
    fn test_routes_carry_middleware_and_expectations() {
        let fx = Fixture::new(&["users/middleware.rs", "users/[id]/show.get.rs"]);
        let users = fx.source.root().join("users");
        fs::write(users.join("expectations.toml"), "body_expected = true").unwrap();
        fs::create_dir_all(users.join("[id]")).unwrap();
        fs::write(users.join("create.post.rs"), "").unwrap();

        let routes = fx.scan();
        let create = routes.iter().find(|d| d.route_path == "/users/create").unwrap();
        let show = routes.iter().find(|d| d.route_path == "/users/[id]/show").unwrap();

        assert_eq!(create.middleware, vec![users.join("middleware.rs")]);
        assert!(create.expectations.as_ref().unwrap().body_expected);

        assert_eq!(show.middleware, vec![users.join("middleware.rs")]);
        assert_eq!(show.expectations, None);
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let fx = Fixture::new(&[]);
        let middleware = MiddlewareResolver::new(fx.source.clone());
        let mut expectations = ExpectationsResolver::new();
        let mut scanner =
            DirectoryScanner::new(&fx.source, &middleware, &mut expectations, &fx.registry);

        assert!(scanner.scan(&fx.source.root().join("nope"), "/").is_empty());
    }

    #[test]
    fn test_scan_is_deterministic() {
        let fx = Fixture::new(&["b/x.get.rs", "a/y.post.rs", "(g)/c/z.put.rs", "index.get.rs"]);
        assert_eq!(fx.paths(), fx.paths());
    }

    #[test]
    fn test_definition_for_single_file() {
        let fx = Fixture::new(&["(admin)/users/list.get.rs", "_private/x.get.rs"]);
        let middleware = MiddlewareResolver::new(fx.source.clone());
        let mut expectations = ExpectationsResolver::new();
        let mut scanner =
            DirectoryScanner::new(&fx.source, &middleware, &mut expectations, &fx.registry);

        let def = scanner
            .definition_for(&fx.source.root().join("(admin)/users/list.get.rs"))
            .unwrap();
        assert_eq!(def.route_path, "/users/list");
        assert!(scanner
            .definition_for(&fx.source.root().join("_private/x.get.rs"))
            .is_none());
    }

    #[test]
    fn test_scan_subtree_uses_directory_base() {
        let fx = Fixture::new(&["api/(v1)/users/list.get.rs", "other/x.get.rs"]);
        let middleware = MiddlewareResolver::new(fx.source.clone());
        let mut expectations = ExpectationsResolver::new();
        let mut scanner =
            DirectoryScanner::new(&fx.source, &middleware, &mut expectations, &fx.registry);

        let routes = scanner.scan_subtree(&fx.source.root().join("api/(v1)"));
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].route_path, "/api/users/list");
        assert_eq!(routes[0].group.as_deref(), Some("v1"));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_directories_are_not_followed() {
        let fx = Fixture::new(&["a/list.get.rs", "shared/show.get.rs"]);
        let root = fx.source.root();
        std::os::unix::fs::symlink(root.join("a"), root.join("a/loop")).unwrap();
        std::os::unix::fs::symlink(root.join("shared"), root.join("a/linked")).unwrap();

        assert_eq!(
            fx.paths(),
            vec![
                ("/a/list".to_string(), HttpMethod::Get),
                ("/shared/show".to_string(), HttpMethod::Get),
            ]
        );
    }
}
