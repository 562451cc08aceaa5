// File: src/middleware.rs
// Purpose: Middleware chain resolution and the loaded-middleware cache

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::loader::{Middleware, ModuleLoader};
use crate::source::{DeclarationKind, SourceTree};
use crate::Result;

/// Computes the ordered middleware chain of a handler file
///
/// The chain starts with the handler's own directory declaration and then
/// walks up through the ancestors, nearest first. The walk stops before the
/// source root: a root declaration only applies to files placed directly in
/// the root.
#[derive(Debug, Clone)]
pub struct MiddlewareResolver {
    source: SourceTree,
}

impl MiddlewareResolver {
    pub fn new(source: SourceTree) -> Self {
        Self { source }
    }

    /// Middleware file identities for `handler`, closest scope first
    pub fn chain(&self, handler: &Path) -> Vec<PathBuf> {
        let Some(own_dir) = handler.parent() else {
            return Vec::new();
        };
        let root = self.source.root();

        let own = self.source.declaration_in(own_dir, DeclarationKind::Middleware);
        if own_dir == root || !own_dir.starts_with(root) {
            return own.into_iter().collect();
        }

        let ancestors = own_dir
            .ancestors()
            .skip(1)
            .take_while(|dir| *dir != root && dir.starts_with(root))
            .filter_map(|dir| self.source.declaration_in(dir, DeclarationKind::Middleware));

        own.into_iter().chain(ancestors).collect()
    }
}

/// Loaded middleware keyed by file, tagged with the loader generation
///
/// An entry is reused only while the loader still reports the generation it
/// was loaded at, so a changed middleware file is reloaded on next use.
#[derive(Default)]
pub struct MiddlewareCache {
    entries: HashMap<PathBuf, (u64, Middleware)>,
}

impl MiddlewareCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_load(&mut self, path: &Path, loader: &dyn ModuleLoader) -> Result<Middleware> {
        let generation = loader.generation(path);

        if let Some((cached_generation, middleware)) = self.entries.get(path) {
            if *cached_generation == generation {
                return Ok(middleware.clone());
            }
        }

        let middleware = loader.load_middleware(path)?;
        debug!(path = %path.display(), generation, "loaded middleware");
        self.entries
            .insert(path.to_path_buf(), (generation, middleware.clone()));
        Ok(middleware)
    }

    pub fn evict(&mut self, path: &Path) {
        self.entries.remove(path);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{middleware_fn, ModuleRegistry};
    use pretty_assertions::assert_eq;
    use std::fs;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }

    #[test]
    fn test_chain_nearest_first() {
        let dir = tempfile::tempdir().unwrap();
        let source = SourceTree::new(dir.path(), vec!["rs".to_string()]);
        let root = source.root().to_path_buf();

        touch(&root.join("a/middleware.rs"));
        touch(&root.join("a/b/middleware.rs"));
        touch(&root.join("a/b/c/middleware.rs"));
        touch(&root.join("a/b/c/list.get.rs"));

        let resolver = MiddlewareResolver::new(source);
        assert_eq!(
            resolver.chain(&root.join("a/b/c/list.get.rs")),
            vec![
                root.join("a/b/c/middleware.rs"),
                root.join("a/b/middleware.rs"),
                root.join("a/middleware.rs"),
            ]
        );
    }

    #[test]
    fn test_chain_skips_missing_levels_and_root() {
        let dir = tempfile::tempdir().unwrap();
        let source = SourceTree::new(dir.path(), vec!["rs".to_string()]);
        let root = source.root().to_path_buf();

        touch(&root.join("middleware.rs"));
        touch(&root.join("a/middleware.rs"));
        touch(&root.join("a/b/c/list.get.rs"));

        let resolver = MiddlewareResolver::new(source);
        assert_eq!(
            resolver.chain(&root.join("a/b/c/list.get.rs")),
            vec![root.join("a/middleware.rs")]
        );
    }

    #[test]
    fn test_chain_for_root_file() {
        let dir = tempfile::tempdir().unwrap();
        let source = SourceTree::new(dir.path(), vec!["rs".to_string()]);
        let root = source.root().to_path_buf();

        touch(&root.join("middleware.rs"));
        touch(&root.join("index.get.rs"));

        let resolver = MiddlewareResolver::new(source);
        assert_eq!(
            resolver.chain(&root.join("index.get.rs")),
            vec![root.join("middleware.rs")]
        );
    }

    #[test]
    fn test_cache_reloads_on_new_generation() {
        let registry = ModuleRegistry::new("/srv/routes");
        let file = Path::new("/srv/routes/middleware.rs");
        registry.register_middleware(file, middleware_fn(|req, next: axum::middleware::Next| next.run(req)));

        let mut cache = MiddlewareCache::new();
        let first = cache.get_or_load(file, &registry).unwrap();
        let again = cache.get_or_load(file, &registry).unwrap();
        assert!(std::sync::Arc::ptr_eq(&first, &again));

        registry.register_middleware(file, middleware_fn(|req, next: axum::middleware::Next| next.run(req)));
        registry.invalidate(file);
        let reloaded = cache.get_or_load(file, &registry).unwrap();
        assert!(!std::sync::Arc::ptr_eq(&first, &reloaded));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_cache_load_failure() {
        let registry = ModuleRegistry::new("/srv/routes");
        let mut cache = MiddlewareCache::new();
        assert!(cache
            .get_or_load(Path::new("/srv/routes/middleware.rs"), &registry)
            .is_err());
        assert!(cache.is_empty());
    }
}
