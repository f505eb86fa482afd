//! Workspace-relative resource identity

use std::borrow::Cow;
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Whether resource names compare case-sensitively on this platform.
pub const CASE_SENSITIVE: bool = !cfg!(any(windows, target_os = "macos"));

/// A workspace-relative path identifying one local resource.
///
/// Paths are normalized to forward slashes with `.` and empty segments
/// removed; `..` pops the previous segment but never escapes the workspace
/// root. The empty path is the workspace root itself.
///
/// A `ResourcePath` only identifies a resource. It never carries
/// synchronization data.
#[derive(Debug, Clone)]
pub struct ResourcePath {
    /// Internal representation always uses forward slashes, no leading or
    /// trailing separator
    inner: String,
}

impl ResourcePath {
    /// Create a new ResourcePath from any path-like string.
    pub fn new(path: impl AsRef<str>) -> Self {
        Self {
            inner: clean(path.as_ref()),
        }
    }

    /// The workspace root.
    pub fn root() -> Self {
        Self {
            inner: String::new(),
        }
    }

    /// Get the internal normalized string representation.
    pub fn as_str(&self) -> &str {
        &self.inner
    }

    /// Whether this is the workspace root.
    pub fn is_root(&self) -> bool {
        self.inner.is_empty()
    }

    /// Iterate over the path segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.inner.split('/').filter(|s| !s.is_empty())
    }

    /// Number of segments below the workspace root.
    pub fn depth(&self) -> usize {
        self.segments().count()
    }

    /// Join this path with a relative segment (which may itself contain `/`).
    pub fn join(&self, segment: &str) -> Self {
        if self.inner.is_empty() {
            Self::new(segment)
        } else {
            Self::new(format!("{}/{}", self.inner, segment))
        }
    }

    /// Get the parent resource. The root has no parent; top-level resources
    /// have the root as parent.
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        match self.inner.rfind('/') {
            Some(idx) => Some(Self {
                inner: self.inner[..idx].to_string(),
            }),
            None => Some(Self::root()),
        }
    }

    /// Get the last segment.
    pub fn file_name(&self) -> Option<&str> {
        self.inner.rsplit('/').next().filter(|s| !s.is_empty())
    }

    /// All proper ancestors, nearest first, ending with the root.
    pub fn ancestors(&self) -> Vec<ResourcePath> {
        let mut result = Vec::with_capacity(self.depth());
        let mut current = self.parent();
        while let Some(path) = current {
            current = path.parent();
            result.push(path);
        }
        result
    }

    /// Whether `self` is a proper ancestor of `other`.
    pub fn is_ancestor_of(&self, other: &ResourcePath) -> bool {
        if self.is_root() {
            return !other.is_root();
        }
        let mine = self.key();
        let theirs = other.key();
        theirs.len() > mine.len()
            && theirs.starts_with(mine.as_ref())
            && theirs.as_bytes()[mine.len()] == b'/'
    }

    /// Whether `self` lies strictly under `other`.
    pub fn is_descendant_of(&self, other: &ResourcePath) -> bool {
        other.is_ancestor_of(self)
    }

    /// Whether `self` equals `other` or lies under it.
    pub fn is_within(&self, other: &ResourcePath) -> bool {
        self == other || other.is_ancestor_of(self)
    }

    /// The comparison key used for equality, hashing and ordering.
    fn key(&self) -> Cow<'_, str> {
        if CASE_SENSITIVE {
            Cow::Borrowed(&self.inner)
        } else {
            Cow::Owned(self.inner.to_lowercase())
        }
    }
}

/// Normalize separators and collapse `.`, `..` and empty segments.
fn clean(raw: &str) -> String {
    let unified = raw.replace('\\', "/");
    let mut parts: Vec<&str> = Vec::new();
    for part in unified.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}

impl PartialEq for ResourcePath {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for ResourcePath {}

impl Hash for ResourcePath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl PartialOrd for ResourcePath {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ResourcePath {
    fn cmp(&self, other: &Self) -> Ordering {
        // Segment-wise so that "a/b" sorts before "a-c" and children follow
        // their parent directly.
        let mine = self.key();
        let theirs = other.key();
        mine.split('/').cmp(theirs.split('/'))
    }
}

impl std::fmt::Display for ResourcePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.inner.is_empty() {
            write!(f, "/")
        } else {
            write!(f, "{}", self.inner)
        }
    }
}

impl From<&str> for ResourcePath {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ResourcePath {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl Serialize for ResourcePath {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.inner)
    }
}

impl<'de> Deserialize<'de> for ResourcePath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::new(raw))
    }
}
