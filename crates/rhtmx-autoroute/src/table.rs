// File: src/table.rs
// Purpose: The authoritative in-memory route table

use std::collections::btree_map::{self, BTreeMap};
use std::path::{Path, PathBuf};

use crate::RouteDefinition;

/// Discovered routes keyed by absolute handler file path
///
/// Iteration order is the sorted order of handler paths, so full rebuilds
/// register routes deterministically. The table never touches the server:
/// mutation and application are separate steps.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: BTreeMap<PathBuf, RouteDefinition>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the definition of one handler file
    pub fn set(&mut self, file: impl Into<PathBuf>, def: RouteDefinition) -> Option<RouteDefinition> {
        self.routes.insert(file.into(), def)
    }

    pub fn remove(&mut self, file: &Path) -> Option<RouteDefinition> {
        self.routes.remove(file)
    }

    /// Removes every route whose handler lies strictly under `dir`
    ///
    /// Matching is by whole path segments: removing `a/b` leaves `a/bc` alone.
    ///
    /// ```
    /// use rhtmx_autoroute::{RouteDefinition, RouteTable, HttpMethod};
    /// use std::path::Path;
    ///
    /// let mut table = RouteTable::new();
    /// table.set("/r/a/b/x.get.rs", RouteDefinition::new("/a/b/x", HttpMethod::Get, "/r/a/b/x.get.rs"));
    /// table.set("/r/a/bc/y.get.rs", RouteDefinition::new("/a/bc/y", HttpMethod::Get, "/r/a/bc/y.get.rs"));
    ///
    /// let removed = table.remove_all_under(Path::new("/r/a/b"));
    /// assert_eq!(removed.len(), 1);
    /// assert_eq!(table.len(), 1);
    /// ```
    pub fn remove_all_under(&mut self, dir: &Path) -> Vec<RouteDefinition> {
        let doomed: Vec<PathBuf> = self
            .routes
            .keys()
            .filter(|file| file.as_path() != dir && file.starts_with(dir))
            .cloned()
            .collect();

        doomed
            .iter()
            .filter_map(|file| self.routes.remove(file))
            .collect()
    }

    pub fn get(&self, file: &Path) -> Option<&RouteDefinition> {
        self.routes.get(file)
    }

    pub fn contains(&self, file: &Path) -> bool {
        self.routes.contains_key(file)
    }

    pub fn values(&self) -> btree_map::Values<'_, PathBuf, RouteDefinition> {
        self.routes.values()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, PathBuf, RouteDefinition> {
        self.routes.iter()
    }

    /// Another handler file already owning `def`'s `(route_path, method)`
    pub fn conflict_for(&self, def: &RouteDefinition) -> Option<&RouteDefinition> {
        self.routes.values().find(|other| {
            other.handler_path != def.handler_path
                && other.route_path == def.route_path
                && other.method == def.method
        })
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl Extend<RouteDefinition> for RouteTable {
    fn extend<I: IntoIterator<Item = RouteDefinition>>(&mut self, defs: I) {
        for def in defs {
            self.routes.insert(def.handler_path.clone(), def);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HttpMethod;

    fn def(route: &str, method: HttpMethod, file: &str) -> RouteDefinition {
        RouteDefinition::new(route, method, file)
    }

    #[test]
    fn test_set_replaces_same_file() {
        let mut table = RouteTable::new();
        assert!(table
            .set("/r/users/list.get.rs", def("/users/list", HttpMethod::Get, "/r/users/list.get.rs"))
            .is_none());
        assert!(table
            .set("/r/users/list.get.rs", def("/users/list", HttpMethod::Get, "/r/users/list.get.rs"))
            .is_some());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_remove_keeps_shared_prefix_sibling() {
        let mut table = RouteTable::new();
        table.extend([
            def("/users/list", HttpMethod::Get, "/r/users/list.get.rs"),
            def("/users/listAll", HttpMethod::Get, "/r/users/listAll.get.rs"),
        ]);

        assert!(table.remove(Path::new("/r/users/list.get.rs")).is_some());
        assert!(table.contains(Path::new("/r/users/listAll.get.rs")));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_remove_all_under_segment_boundary() {
        let mut table = RouteTable::new();
        table.extend([
            def("/a/b/x", HttpMethod::Get, "/r/a/b/x.get.rs"),
            def("/a/b/c/y", HttpMethod::Post, "/r/a/b/c/y.post.rs"),
            def("/a/bcd/z", HttpMethod::Get, "/r/a/bcd/z.get.rs"),
        ]);

        let removed = table.remove_all_under(Path::new("/r/a/b"));
        assert_eq!(removed.len(), 2);
        assert!(table.contains(Path::new("/r/a/bcd/z.get.rs")));
    }

    #[test]
    fn test_conflict_detection() {
        let mut table = RouteTable::new();
        table.extend([def("/users", HttpMethod::Get, "/r/users/index.get.rs")]);

        let clash = def("/users", HttpMethod::Get, "/r/users.get.rs");
        let other_method = def("/users", HttpMethod::Post, "/r/users.post.rs");

        assert!(table.conflict_for(&clash).is_some());
        assert!(table.conflict_for(&other_method).is_none());
    }
}
