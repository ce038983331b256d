//! Paths into the tree.

use std::fmt;

/// A location in the tree, as a list of non-empty key segments.
///
/// The root path has no segments and no key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct NodePath {
    segments: Vec<String>,
}

impl NodePath {
    /// Returns the root path.
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    /// Parses a slash-separated path. Empty segments are dropped, so
    /// `"/a//b/"` and `"a/b"` are the same path.
    pub fn parse(path: &str) -> Self {
        Self {
            segments: split(path).collect(),
        }
    }

    /// Returns the path of a descendant. `key` may itself contain slashes.
    #[must_use]
    pub fn child(&self, key: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.extend(split(key));
        Self { segments }
    }

    /// Returns the parent path, or `None` at the root.
    pub fn parent(&self) -> Option<Self> {
        let (_, init) = self.segments.split_last()?;
        Some(Self {
            segments: init.to_vec(),
        })
    }

    /// Returns the last segment, or `None` at the root.
    pub fn key(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Returns the segments of this path.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Returns true for the root path.
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Returns the number of segments.
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// Returns true if `self` equals `ancestor` or lies beneath it.
    pub fn starts_with(&self, ancestor: &NodePath) -> bool {
        self.segments.starts_with(&ancestor.segments)
    }

    /// Returns true if one of the two paths contains the other.
    pub fn overlaps(&self, other: &NodePath) -> bool {
        self.starts_with(other) || other.starts_with(self)
    }

    /// Returns the segments of `self` below `ancestor`, if it is one.
    pub fn relative_to(&self, ancestor: &NodePath) -> Option<&[String]> {
        self.starts_with(ancestor)
            .then(|| &self.segments[ancestor.segments.len()..])
    }
}

fn split(path: &str) -> impl Iterator<Item = String> + '_ {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("/");
        }
        for segment in &self.segments {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}

impl From<&str> for NodePath {
    fn from(path: &str) -> Self {
        Self::parse(path)
    }
}
