//! Map identifier codec.
//!
//! A plat map is addressed as `GROUP-INDEX`, where the group is a fixed
//! three digit community code and the index is 1-99, rendered zero-padded
//! (`001-07`). Numbers printed on a map are bare indices; they are expanded
//! against the group of the map they were printed on.

use crate::error::{Result, ScanError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const MIN_INDEX: u32 = 1;
pub const MAX_INDEX: u32 = 99;
pub const GROUP_WIDTH: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MapId {
    group: String,
    index: u8,
}

impl MapId {
    pub fn new(group: &str, index: u32) -> Result<Self> {
        validate_group(group)?;
        if !(MIN_INDEX..=MAX_INDEX).contains(&index) {
            return Err(ScanError::MalformedIdentifier(format!(
                "{}-{}: index outside {}-{}",
                group, index, MIN_INDEX, MAX_INDEX
            )));
        }

        Ok(Self {
            group: group.to_string(),
            index: index as u8,
        })
    }

    /// Parse a fully qualified `GROUP-INDEX` string. The index may be
    /// zero-padded or bare (`001-07` and `001-7` are the same map).
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        let (group, index) = raw.split_once('-').ok_or_else(|| {
            ScanError::MalformedIdentifier(format!("{:?}: expected GROUP-INDEX", raw))
        })?;

        Self::new(group, parse_index(index, raw)?)
    }

    /// Parse either a fully qualified identifier or a bare index that is
    /// relative to `current_group`.
    pub fn parse_in(raw: &str, current_group: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.contains('-') {
            Self::parse(raw)
        } else {
            Self::new(current_group, parse_index(raw, raw)?)
        }
    }

    /// Combine a candidate index found inside a document with the group of
    /// that document. References never cross groups.
    pub fn expand(candidate: u32, current_group: &str) -> Result<Self> {
        Self::new(current_group, candidate)
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn index(&self) -> u8 {
        self.index
    }

    /// Canonical rendering, identical to `Display`.
    pub fn render(&self) -> String {
        self.to_string()
    }

    /// Name of the stored document for this map.
    pub fn file_name(&self) -> String {
        format!("{}.pdf", self)
    }

    /// Recover an identifier from a stored file name such as `001-24.pdf`.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let stem = name.strip_suffix(".pdf")?;
        let id = Self::parse(stem).ok()?;
        // Only canonical names count as stored maps.
        (id.render() == stem).then_some(id)
    }
}

fn validate_group(group: &str) -> Result<()> {
    if group.len() == GROUP_WIDTH && group.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(ScanError::MalformedIdentifier(format!(
            "{:?}: group must be {} digits",
            group, GROUP_WIDTH
        )))
    }
}

fn parse_index(index: &str, raw: &str) -> Result<u32> {
    if index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ScanError::MalformedIdentifier(format!(
            "{:?}: index must be numeric",
            raw
        )));
    }

    index
        .parse::<u32>()
        .map_err(|_| ScanError::MalformedIdentifier(format!("{:?}: index too large", raw)))
}

impl fmt::Display for MapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:02}", self.group, self.index)
    }
}

impl FromStr for MapId {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for MapId {
    type Error = ScanError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<MapId> for String {
    fn from(id: MapId) -> Self {
        id.render()
    }
}
