//! Destination classification
//!
//! An item lands in the subdirectory named after the directory tag it
//! carries. Directory tags are checked in configured order.

use std::collections::BTreeSet;

/// How a destination was chosen
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Exactly one directory tag matched
    Matched(String),
    /// No directory tag matched; the uncategorized tag is used
    Uncategorized(String),
    /// Several directory tags matched; the first in configured order is used
    Ambiguous { chosen: String, matches: Vec<String> },
}

impl Classification {
    /// Destination subdirectory name
    pub fn tag(&self) -> &str {
        match self {
            Self::Matched(tag) | Self::Uncategorized(tag) => tag,
            Self::Ambiguous { chosen, .. } => chosen,
        }
    }
}

/// Intersect an item's tags with the configured directory tags
pub fn classify_destination(
    item_tags: &BTreeSet<String>,
    directory_tags: &[String],
    uncategorized_tag: &str,
) -> Classification {
    let mut matches: Vec<String> = directory_tags
        .iter()
        .filter(|tag| item_tags.contains(*tag))
        .cloned()
        .collect();
    matches.dedup();

    match matches.len() {
        0 => Classification::Uncategorized(uncategorized_tag.to_string()),
        1 => Classification::Matched(matches.remove(0)),
        _ => Classification::Ambiguous {
            chosen: matches[0].clone(),
            matches,
        },
    }
}
