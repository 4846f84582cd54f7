use std::fmt;
use std::str::FromStr;

use crate::error::RefError;

/// A validated reference name split into its parts.
///
/// `refs/heads/feature/x` has category `heads` and location `feature/x`.
/// `HEAD` is the one name accepted outside `refs/`; its category is empty
/// and its location is `HEAD`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RefName {
    full_name: String,
    // byte offset of the '/' between category and location
    split: usize,
}

/// Bytes forbidden anywhere in a ref name, besides control characters.
const FORBIDDEN_CHARS: &[u8] = b" ~^:?*[\\";

const REFS_PREFIX: &str = "refs/";

impl RefName {
    pub const HEAD_NAME: &'static str = "HEAD";

    /// The symbolic `HEAD` ref.
    pub fn head() -> Self {
        Self {
            full_name: Self::HEAD_NAME.to_owned(),
            split: 0,
        }
    }

    /// Validate and split a full ref name.
    pub fn new(name: impl Into<String>) -> Result<Self, RefError> {
        let full_name = name.into();
        if full_name == Self::HEAD_NAME {
            return Ok(Self::head());
        }
        let split = validate(&full_name)?;
        Ok(Self { full_name, split })
    }

    pub fn from_bytes(name: &[u8]) -> Result<Self, RefError> {
        let name = std::str::from_utf8(name).map_err(|_| RefError::NotUtf8)?;
        Self::new(name)
    }

    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// The namespace after `refs/`, e.g. `heads` or `tags`.
    pub fn category(&self) -> &str {
        if self.is_head() {
            return "";
        }
        &self.full_name[REFS_PREFIX.len()..self.split]
    }

    /// Everything after the category.
    pub fn location(&self) -> &str {
        if self.is_head() {
            return Self::HEAD_NAME;
        }
        &self.full_name[self.split + 1..]
    }

    pub fn is_head(&self) -> bool {
        self.full_name == Self::HEAD_NAME
    }

    pub fn is_branch(&self) -> bool {
        self.category() == "heads"
    }

    pub fn is_tag(&self) -> bool {
        self.category() == "tags"
    }
}

impl fmt::Display for RefName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name)
    }
}

impl FromStr for RefName {
    type Err = RefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for RefName {
    fn as_ref(&self) -> &str {
        &self.full_name
    }
}

/// Check Git's ref syntax and return the category/location split offset.
fn validate(name: &str) -> Result<usize, RefError> {
    let fail = |reason| RefError::InvalidName {
        name: name.to_owned(),
        reason,
    };

    let rest = name
        .strip_prefix(REFS_PREFIX)
        .ok_or_else(|| fail("must start with 'refs/'"))?;
    let slash = rest.find('/').ok_or_else(|| fail("missing location"))?;
    if slash == 0 {
        return Err(fail("empty category"));
    }
    if slash + 1 == rest.len() {
        return Err(fail("empty location"));
    }

    if name.contains("..") {
        return Err(fail("contains '..'"));
    }
    if name.contains("//") {
        return Err(fail("contains '//'"));
    }
    if name.contains("@{") {
        return Err(fail("contains '@{'"));
    }
    if name.ends_with('.') {
        return Err(fail("ends with '.'"));
    }
    for b in name.bytes() {
        if b < 0x20 || b == 0x7f {
            return Err(fail("contains a control character"));
        }
        if FORBIDDEN_CHARS.contains(&b) {
            return Err(fail("contains a forbidden character"));
        }
    }
    for component in name.split('/') {
        if component.is_empty() {
            return Err(fail("empty path component"));
        }
        if component.starts_with('.') {
            return Err(fail("path component starts with '.'"));
        }
        if component.ends_with(".lock") {
            return Err(fail("path component ends with '.lock'"));
        }
    }

    Ok(REFS_PREFIX.len() + slash)
}
