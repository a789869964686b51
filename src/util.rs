//! Small shared helpers used across the crate.

use std::hash::{BuildHasher, Hasher};

/// Hasher used by the sharded domain maps and the type registry.
///
/// Uses `ahash` when the `ahash` feature is enabled (the default), falling
/// back to the standard library's `RandomState` otherwise.
#[cfg(feature = "ahash")]
pub(crate) type RandomState = ahash::RandomState;
#[cfg(not(feature = "ahash"))]
pub(crate) type RandomState = std::collections::hash_map::RandomState;

pub(crate) type HashMap<K, V> = std::collections::HashMap<K, V, RandomState>;
pub(crate) type HashSet<T> = std::collections::HashSet<T, RandomState>;

pub(crate) fn hash_one<T: std::hash::Hash>(state: &RandomState, value: &T) -> u64 {
    let mut hasher = state.build_hasher();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Lowercases an ASCII string without allocating when it is already
/// lowercase, mirroring the case-insensitive comparisons `AssetPath`
/// requires.
pub(crate) fn ascii_lower_eq(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

/// Builds a path-like id incrementally, reusing its allocation across
/// pushes so repeated scope concatenation (e.g. walking a source tree)
/// doesn't reallocate per segment.
#[derive(Default)]
pub(crate) struct IdBuilder {
    buf: String,
    marks: Vec<usize>,
}

impl IdBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, segment: &str) {
        self.marks.push(self.buf.len());
        if !self.buf.is_empty() {
            self.buf.push('/');
        }
        self.buf.push_str(segment);
    }

    pub fn pop(&mut self) {
        if let Some(mark) = self.marks.pop() {
            self.buf.truncate(mark);
        }
    }

    pub fn as_str(&self) -> &str {
        &self.buf
    }

    pub fn reset(&mut self) {
        self.buf.clear();
        self.marks.clear();
    }
}
