// File: src/expectations.rs
// Purpose: Per-directory request expectations and their cache

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::loader::ModuleLoader;
use crate::source::{DeclarationKind, SourceTree};

/// Declared metadata about what requests to a directory's routes carry
///
/// Informational for downstream validation; the engine only attaches it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expectations {
    #[serde(default, rename = "params", alias = "param_names")]
    pub param_names: BTreeSet<String>,

    #[serde(default, rename = "body_expected", alias = "bodyExpected")]
    pub body_expected: bool,
}

impl Expectations {
    pub fn with_params<I, S>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.param_names.extend(params.into_iter().map(Into::into));
        self
    }

    pub fn with_body(mut self) -> Self {
        self.body_expected = true;
        self
    }
}

/// Resolves each directory's expectations declaration, with caching
///
/// Declarations apply only to the directory that holds them. There is no
/// inheritance from parent directories.
#[derive(Debug, Default)]
pub struct ExpectationsResolver {
    cache: HashMap<PathBuf, Expectations>,
}

impl ExpectationsResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expectations for routes directly inside `dir`
    ///
    /// A present declaration is served from the cache or loaded and cached.
    /// Without a declaration (or when loading it fails) the cached value for
    /// the directory is returned, if any.
    pub fn resolve(
        &mut self,
        dir: &Path,
        source: &SourceTree,
        loader: &dyn ModuleLoader,
    ) -> Option<Expectations> {
        let Some(declaration) = source.declaration_in(dir, DeclarationKind::Expectations) else {
            return self.cache.get(dir).cloned();
        };

        if let Some(cached) = self.cache.get(dir) {
            return Some(cached.clone());
        }

        match loader.load_expectations(&declaration) {
            Ok(expectations) => {
                debug!(path = %declaration.display(), "loaded expectations");
                self.cache.insert(dir.to_path_buf(), expectations.clone());
                Some(expectations)
            }
            Err(e) => {
                warn!(path = %declaration.display(), error = %e, "failed to load expectations");
                None
            }
        }
    }

    /// Drops the cached value of one directory
    pub fn invalidate(&mut self, dir: &Path) -> Option<Expectations> {
        self.cache.remove(dir)
    }

    /// Drops the cached values of a directory and everything beneath it
    pub fn invalidate_under(&mut self, dir: &Path) {
        self.cache.retain(|cached, _| !cached.starts_with(dir));
    }

    pub fn cached(&self, dir: &Path) -> Option<&Expectations> {
        self.cache.get(dir)
    }
}
