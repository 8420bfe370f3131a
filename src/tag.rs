//! Tag requests and tag sets.
//!
//! Callers may ask for additional attributes by text, e.g. `"0018,1120"`,
//! `"(0020,0032)"`, `"00200032"` or a dictionary keyword such as
//! `"ImagePositionPatient"`. Every request must name exactly one attribute:
//! nested paths (`"0040,A730.0040,A160"`), item selectors (`"[0]"`) and
//! wildcards (`"60xx,3000"`, `"*"`) are rejected before any file is touched.

use crate::error::{Error, Result};

use dicom::core::Tag;
use dicom::core::dictionary::DataDictionary;
use dicom::object::StandardDataDictionary;
use std::fmt;
use std::str::FromStr;

/// A request for a single, explicit (group, element) attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TagPath(Tag);

impl TagPath {
    pub fn tag(&self) -> Tag {
        self.0
    }

    /// Parse a textual tag request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the request does not resolve to
    /// exactly one explicit tag.
    pub fn parse(text: &str) -> Result<Self> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidArgument("empty tag path".to_string()));
        }
        if trimmed.contains('.') || trimmed.contains('[') || trimmed.contains(']') {
            return Err(Error::InvalidArgument(format!(
                "tag path '{trimmed}' addresses more than one element"
            )));
        }
        if trimmed.contains('*') || trimmed.contains('?') {
            return Err(Error::InvalidArgument(format!(
                "tag path '{trimmed}' contains a wildcard"
            )));
        }

        let bare = trimmed
            .strip_prefix('(')
            .and_then(|s| s.strip_suffix(')'))
            .unwrap_or(trimmed);

        if let Some(tag) = parse_numeric(bare)? {
            return Ok(TagPath(tag));
        }

        if !bare.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(Error::InvalidArgument(format!(
                "'{trimmed}' is neither a (group,element) pair nor a keyword"
            )));
        }

        StandardDataDictionary
            .parse_tag(bare)
            .map(TagPath)
            .ok_or_else(|| Error::InvalidArgument(format!("unknown attribute keyword '{bare}'")))
    }
}

impl FromStr for TagPath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        TagPath::parse(s)
    }
}

impl From<Tag> for TagPath {
    fn from(tag: Tag) -> Self {
        TagPath(tag)
    }
}

impl fmt::Display for TagPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// `Ok(None)` means "does not look numeric, try the keyword dictionary"
fn parse_numeric(text: &str) -> Result<Option<Tag>> {
    let (group, element) = match text.split_once(',') {
        Some((g, e)) => (g.trim(), e.trim()),
        None if text.len() == 8 && text.chars().all(|c| c.is_ascii_hexdigit()) => {
            (&text[..4], &text[4..])
        }
        None => return Ok(None),
    };

    let is_wildcard = |part: &str| part.chars().any(|c| c == 'x' || c == 'X');
    if is_wildcard(group) || is_wildcard(element) {
        return Err(Error::InvalidArgument(format!(
            "tag path '{text}' contains a wildcard"
        )));
    }

    let parse_part = |part: &str| {
        if part.len() != 4 {
            return None;
        }
        u16::from_str_radix(part, 16).ok()
    };

    match (parse_part(group), parse_part(element)) {
        (Some(g), Some(e)) => Ok(Some(Tag(g, e))),
        _ => Err(Error::InvalidArgument(format!(
            "'{text}' is not a valid (group,element) pair"
        ))),
    }
}

/// Ordered, duplicate-free set of tags to scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagSet {
    tags: Vec<Tag>,
}

impl TagSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if the tag was already present
    pub fn insert(&mut self, tag: Tag) -> bool {
        if self.tags.contains(&tag) {
            return false;
        }
        self.tags.push(tag);
        true
    }

    pub fn extend(&mut self, tags: impl IntoIterator<Item = Tag>) {
        for tag in tags {
            self.insert(tag);
        }
    }

    pub fn contains(&self, tag: Tag) -> bool {
        self.tags.contains(&tag)
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Tag> + '_ {
        self.tags.iter().copied()
    }

    pub fn as_slice(&self) -> &[Tag] {
        &self.tags
    }
}

impl FromIterator<Tag> for TagSet {
    fn from_iter<I: IntoIterator<Item = Tag>>(iter: I) -> Self {
        let mut set = TagSet::new();
        set.extend(iter);
        set
    }
}
