//! # View identity and shape.
//!
//! A [`View`] names one partitioned derived dataset and carries the facts the
//! scheduler needs about it:
//! - the stable `url_path` identity (e.g. `db/Table/p1/p2`),
//! - the `db/Table` grouping prefix ([`View::table_name`]),
//! - whether the view is **external** (produced outside this system, never
//!   transformed here),
//! - its dependency views (by `url_path`),
//! - the fingerprint of its current transformation code ([`View::version`]).
//!
//! ## Rules
//! - Views with neither dependencies nor transformation logic are **NoOp**
//!   views: materializing them only probes the success marker in storage.
//! - External views have no dependencies and no transformation by definition.

use serde::{Deserialize, Serialize};

/// A named, possibly partitioned, derived dataset with a deterministic
/// transformation.
///
/// Built with [`View::new`] (transformed view) or [`View::external`], then
/// refined builder-style:
///
/// ```rust
/// use viewvisor::View;
///
/// let report = View::new("db/Report/2024", "checksum-a1")
///     .with_dependencies(vec!["db/Clicks/2024".into(), "db/Orders/2024".into()]);
///
/// assert_eq!(report.table_name(), "db/Report");
/// assert!(!report.is_external());
/// assert!(!report.is_no_op());
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct View {
    /// Stable identity, `db/Table/partition...`.
    url_path: String,
    /// True for views produced outside this system.
    is_external: bool,
    /// False for views without transformation logic (NoOp views).
    has_transformation: bool,
    /// Dependency views by `url_path`.
    dependencies: Vec<String>,
    /// Fingerprint of the current transformation code.
    version: String,
}

impl View {
    /// Creates a transformed, non-external view without dependencies.
    pub fn new(url_path: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            url_path: url_path.into(),
            is_external: false,
            has_transformation: true,
            dependencies: Vec::new(),
            version: version.into(),
        }
    }

    /// Creates an external view: state comes from stored metadata, never from
    /// a transformation run here.
    pub fn external(url_path: impl Into<String>) -> Self {
        Self {
            url_path: url_path.into(),
            is_external: true,
            has_transformation: false,
            dependencies: Vec::new(),
            version: String::new(),
        }
    }

    /// Sets the dependency views.
    pub fn with_dependencies(mut self, dependencies: Vec<String>) -> Self {
        self.dependencies = dependencies;
        self
    }

    /// Marks the view as having no transformation logic of its own.
    ///
    /// A dependency-less view without transformation logic is a NoOp view:
    /// materialization reduces to probing the `_SUCCESS` marker.
    pub fn without_transformation(mut self) -> Self {
        self.has_transformation = false;
        self
    }

    /// Returns the stable view identity.
    pub fn url_path(&self) -> &str {
        &self.url_path
    }

    /// Returns the `db/Table` grouping prefix of the identity.
    pub fn table_name(&self) -> &str {
        let mut separators = 0usize;
        for (idx, b) in self.url_path.bytes().enumerate() {
            if b == b'/' {
                separators += 1;
                if separators == 2 {
                    return &self.url_path[..idx];
                }
            }
        }
        &self.url_path
    }

    /// True for views produced outside this system.
    pub fn is_external(&self) -> bool {
        self.is_external
    }

    /// True when the view carries transformation logic.
    pub fn has_transformation(&self) -> bool {
        self.has_transformation
    }

    /// True for non-external views with neither dependencies nor
    /// transformation logic.
    pub fn is_no_op(&self) -> bool {
        !self.is_external && !self.has_transformation && self.dependencies.is_empty()
    }

    /// Returns the dependency views.
    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    /// Returns the fingerprint of the current transformation code.
    pub fn version(&self) -> &str {
        &self.version
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_name_is_the_db_table_prefix() {
        let v = View::new("db/Table/p1/p2", "v1");
        assert_eq!(v.table_name(), "db/Table");

        let flat = View::new("db/Table", "v1");
        assert_eq!(flat.table_name(), "db/Table");
    }

    #[test]
    fn no_op_requires_no_deps_and_no_transformation() {
        let no_op = View::new("db/Raw/p", "v1").without_transformation();
        assert!(no_op.is_no_op());

        let with_deps = View::new("db/Derived/p", "v1")
            .without_transformation()
            .with_dependencies(vec!["db/Raw/p".into()]);
        assert!(!with_deps.is_no_op());

        assert!(!View::external("ext/Feed/p").is_no_op());
    }
}
