//! Canonical asset paths: `domain//scope/scope/name.ext`.

use std::fmt;
use std::hash::{Hash, Hasher};

/// A normalised, hashable path identifying one asset.
///
/// The canonical form is `domain//scope…/name.ext`: backslashes are
/// normalised to forward slashes, a single leading slash is stripped, and
/// comparisons/hashing are case-insensitive. `domain`, `scope`,
/// `scoped_name`, `name` and `extension` are cached slice offsets into the
/// normalised string so repeated access doesn't re-scan the path.
#[derive(Clone)]
pub struct AssetPath {
    normalised: String,
    // offset of the first byte after the `//` separator, or `normalised.len()`
    // when there is no separator (the whole path is then the "scope+name").
    scoped_start: usize,
}

impl AssetPath {
    /// Parses and normalises a raw path string.
    ///
    /// Mirrors `AssetPath::SetPath`: backslashes become forward slashes and
    /// a single leading slash is stripped.
    pub fn new(raw: &str) -> Self {
        let mut normalised = String::with_capacity(raw.len());
        for c in raw.chars() {
            normalised.push(if c == '\\' { '/' } else { c });
        }
        if normalised.starts_with('/') {
            normalised.remove(0);
        }

        let scoped_start = match normalised.find("//") {
            Some(idx) => idx + 2,
            None => normalised.len(),
        };

        AssetPath {
            normalised,
            scoped_start,
        }
    }

    /// The full normalised path string.
    pub fn as_str(&self) -> &str {
        &self.normalised
    }

    /// The domain: the substring before the first `//`, or empty if there
    /// is no `//` separator.
    pub fn domain(&self) -> &str {
        if self.scoped_start == self.normalised.len() && !self.normalised.contains("//") {
            ""
        } else {
            &self.normalised[..self.scoped_start - 2]
        }
    }

    /// The scope: the path segments between the domain and the asset name,
    /// excluding both. Empty if there are no scope segments.
    pub fn scope(&self) -> &str {
        let scoped = self.scoped_name();
        match scoped.rfind('/') {
            Some(idx) => &scoped[..idx],
            None => "",
        }
    }

    /// Everything after the `domain//` separator, or the whole path if
    /// there is no separator at all (matching `AssetPath::GetScope`'s
    /// fallback to the last `/` in the whole path).
    pub fn scoped_name(&self) -> &str {
        if self.scoped_start == self.normalised.len() && !self.normalised.contains("//") {
            &self.normalised
        } else {
            &self.normalised[self.scoped_start..]
        }
    }

    /// The final path segment, including its extension.
    pub fn name(&self) -> &str {
        match self.normalised.rfind('/') {
            Some(idx) => &self.normalised[idx + 1..],
            None => &self.normalised,
        }
    }

    /// The extension, i.e. everything after the last `.` in `name()`.
    /// Empty if `name()` has no `.`.
    pub fn extension(&self) -> &str {
        let name = self.name();
        match name.rfind('.') {
            Some(idx) => &name[idx + 1..],
            None => "",
        }
    }

    /// `true` if `self` and `other` are the same path under
    /// case-insensitive comparison.
    pub fn eq_ignore_case(&self, other: &AssetPath) -> bool {
        self.normalised.eq_ignore_ascii_case(&other.normalised)
    }
}

impl fmt::Debug for AssetPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AssetPath").field(&self.normalised).finish()
    }
}

impl fmt::Display for AssetPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.normalised)
    }
}

impl PartialEq for AssetPath {
    fn eq(&self, other: &Self) -> bool {
        self.eq_ignore_case(other)
    }
}
impl Eq for AssetPath {}

impl Hash for AssetPath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for b in self.normalised.bytes() {
            state.write_u8(b.to_ascii_lowercase());
        }
    }
}

impl From<&str> for AssetPath {
    fn from(raw: &str) -> Self {
        AssetPath::new(raw)
    }
}

impl From<String> for AssetPath {
    fn from(raw: String) -> Self {
        AssetPath::new(&raw)
    }
}

#[cfg(test)]
mod tests;
