//! # The provided view graph.
//!
//! Discovery and DSL parsing happen outside this crate; the scheduler takes
//! the graph as an input. [`Catalog`] is that input: one [`View`] per known
//! `url_path`.

use std::collections::HashMap;
use std::sync::Arc;

use crate::views::View;

/// Immutable map of every view the scheduler may be asked about.
///
/// Cloning is cheap (shared storage); the catalog never changes after
/// construction.
#[derive(Clone, Debug)]
pub struct Catalog {
    views: Arc<HashMap<String, View>>,
}

impl Catalog {
    /// Builds a catalog from view definitions.
    ///
    /// Later duplicates of the same `url_path` win; dependency references are
    /// not validated here — a dangling reference surfaces at routing time.
    pub fn new(views: impl IntoIterator<Item = View>) -> Self {
        let views = views
            .into_iter()
            .map(|v| (v.url_path().to_string(), v))
            .collect();
        Self {
            views: Arc::new(views),
        }
    }

    /// Looks up a view by identity.
    pub fn get(&self, url_path: &str) -> Option<&View> {
        self.views.get(url_path)
    }

    /// Iterates over every known `url_path`.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.views.keys().map(String::as_str)
    }

    /// Returns the number of known views.
    pub fn len(&self) -> usize {
        self.views.len()
    }

    /// True when the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_url_path() {
        let catalog = Catalog::new([
            View::new("db/A/p", "v1"),
            View::new("db/B/p", "v1").with_dependencies(vec!["db/A/p".into()]),
        ]);
        assert_eq!(catalog.len(), 2);
        assert_eq!(
            catalog.get("db/B/p").map(|v| v.dependencies().to_vec()),
            Some(vec!["db/A/p".to_string()])
        );
        assert!(catalog.get("db/C/p").is_none());
    }
}
