//! # Jump Table Module
//!
//! Jump tables map a literal path segment to the index of the next matcher
//! state. They are the inner loop of request matching, so several
//! implementations exist, chosen by entry count when a tree node is lowered:
//!
//! | entries | implementation |
//! |---------|----------------|
//! | 0       | [`ZeroEntryJumpTable`] |
//! | 1       | [`SingleEntryAsciiJumpTable`] / [`SingleEntryUnicodeJumpTable`] |
//! | small   | [`LinearSearchJumpTable`] |
//! | medium  | [`CompiledTrieJumpTable`] (background-built, dictionary fallback) |
//! | large   | [`DictionaryJumpTable`] |
//!
//! Common contract, regardless of implementation:
//!
//! - a zero-length segment always returns the **exit** destination (this is
//!   what lets a catch-all accept a zero-length remaining path),
//! - a non-matching segment returns the **default** destination (fall
//!   through to the parameter/catch-all branch),
//! - literal comparison is ASCII case-insensitive, with a slower
//!   correctness fallback for non-ASCII text.
//!
//! The exact switch-over thresholds are tuning, not correctness; see
//! [`JumpTableTuning`](crate::config::JumpTableTuning).

mod dictionary;
mod linear;
mod trie;

pub use dictionary::DictionaryJumpTable;
pub use linear::LinearSearchJumpTable;
pub use trie::CompiledTrieJumpTable;

use crate::config::JumpTableTuning;
use crate::error::BuildError;
use crate::segments::PathSegment;
use std::fmt;
use std::sync::Arc;

/// Maps one path segment to the next state index.
pub trait JumpTable: fmt::Debug + Send + Sync {
    /// Destination state for `segment` within `path`.
    fn get_destination(&self, path: &str, segment: PathSegment) -> usize;
}

/// Case-insensitive comparison of a literal entry against segment text.
///
/// ASCII text takes the byte-wise fast path; anything else goes through
/// Unicode lowercasing for correctness.
#[inline]
pub(crate) fn literal_matches(entry: &str, segment: &str) -> bool {
    if entry.is_ascii() && segment.is_ascii() {
        entry.eq_ignore_ascii_case(segment)
    } else {
        entry.to_lowercase() == segment.to_lowercase()
    }
}

/// Jump table for nodes with no literal edges: zero-length segments exit,
/// everything else falls through.
#[derive(Debug)]
pub struct ZeroEntryJumpTable {
    default_destination: usize,
    exit_destination: usize,
}

impl JumpTable for ZeroEntryJumpTable {
    #[inline]
    fn get_destination(&self, _path: &str, segment: PathSegment) -> usize {
        if segment.len == 0 {
            self.exit_destination
        } else {
            self.default_destination
        }
    }
}

/// Single ASCII literal, compared without the general Unicode casing path.
#[derive(Debug)]
pub struct SingleEntryAsciiJumpTable {
    text: String,
    destination: usize,
    default_destination: usize,
    exit_destination: usize,
}

impl JumpTable for SingleEntryAsciiJumpTable {
    #[inline]
    fn get_destination(&self, path: &str, segment: PathSegment) -> usize {
        if segment.len == 0 {
            return self.exit_destination;
        }
        if segment.len == self.text.len() && self.text.eq_ignore_ascii_case(segment.text(path)) {
            return self.destination;
        }
        self.default_destination
    }
}

/// Single non-ASCII literal; correctness fallback through Unicode
/// lowercasing.
#[derive(Debug)]
pub struct SingleEntryUnicodeJumpTable {
    folded_text: String,
    destination: usize,
    default_destination: usize,
    exit_destination: usize,
}

impl JumpTable for SingleEntryUnicodeJumpTable {
    fn get_destination(&self, path: &str, segment: PathSegment) -> usize {
        if segment.len == 0 {
            return self.exit_destination;
        }
        if segment.text(path).to_lowercase() == self.folded_text {
            return self.destination;
        }
        self.default_destination
    }
}

/// Builds the jump table for one lowered tree node, selecting an
/// implementation by entry count.
///
/// Both destinations must be set before [`build`](Self::build); a missing
/// one indicates tree-lowering corruption and fails loudly.
#[derive(Debug, Default)]
pub struct JumpTableBuilder {
    default_destination: Option<usize>,
    exit_destination: Option<usize>,
    entries: Vec<(String, usize)>,
}

impl JumpTableBuilder {
    /// Start building.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Destination for non-matching segments.
    pub fn default_destination(&mut self, destination: usize) -> &mut Self {
        self.default_destination = Some(destination);
        self
    }

    /// Destination for zero-length segments.
    pub fn exit_destination(&mut self, destination: usize) -> &mut Self {
        self.exit_destination = Some(destination);
        self
    }

    /// Add a literal transition.
    pub fn entry(&mut self, text: &str, destination: usize) -> &mut Self {
        self.entries.push((text.to_string(), destination));
        self
    }

    /// Number of literal entries added so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no entries were added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Select and build an implementation.
    pub fn build(self, tuning: &JumpTableTuning) -> Result<Arc<dyn JumpTable>, BuildError> {
        let default_destination = self
            .default_destination
            .ok_or(BuildError::UnsetDefaultDestination)?;
        let exit_destination = self
            .exit_destination
            .ok_or(BuildError::UnsetExitDestination)?;
        let entries = self.entries;

        let table: Arc<dyn JumpTable> = match entries.len() {
            0 => Arc::new(ZeroEntryJumpTable {
                default_destination,
                exit_destination,
            }),
            1 => {
                let (text, destination) = entries.into_iter().next().unwrap_or_default();
                if text.is_ascii() {
                    Arc::new(SingleEntryAsciiJumpTable {
                        text,
                        destination,
                        default_destination,
                        exit_destination,
                    })
                } else {
                    Arc::new(SingleEntryUnicodeJumpTable {
                        folded_text: text.to_lowercase(),
                        destination,
                        default_destination,
                        exit_destination,
                    })
                }
            }
            n if n < tuning.linear_search_threshold => Arc::new(LinearSearchJumpTable::new(
                default_destination,
                exit_destination,
                entries,
            )),
            n if n < tuning.dictionary_threshold => Arc::new(CompiledTrieJumpTable::new(
                default_destination,
                exit_destination,
                entries,
                tuning.background_compilation,
            )),
            _ => Arc::new(DictionaryJumpTable::new(
                default_destination,
                exit_destination,
                entries,
            )),
        };

        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segments::tokenize;

    fn table_for(entries: &[(&str, usize)]) -> Arc<dyn JumpTable> {
        let mut builder = JumpTableBuilder::new();
        builder.default_destination(100).exit_destination(200);
        for (text, destination) in entries {
            builder.entry(text, *destination);
        }
        builder.build(&JumpTableTuning::default()).unwrap()
    }

    fn lookup(table: &dyn JumpTable, path: &str) -> usize {
        let mut buffer = [PathSegment::default(); 8];
        let count = tokenize(path, &mut buffer);
        assert!(count >= 1);
        table.get_destination(path, buffer[0])
    }

    #[test]
    fn test_unset_destinations_fail() {
        let builder = JumpTableBuilder::new();
        assert_eq!(
            builder.build(&JumpTableTuning::default()).unwrap_err(),
            BuildError::UnsetDefaultDestination
        );

        let mut builder = JumpTableBuilder::new();
        builder.default_destination(0);
        assert_eq!(
            builder.build(&JumpTableTuning::default()).unwrap_err(),
            BuildError::UnsetExitDestination
        );
    }

    #[test]
    fn test_zero_entry_table() {
        let table = table_for(&[]);
        assert_eq!(lookup(table.as_ref(), "/anything"), 100);
        assert_eq!(table.get_destination("//", PathSegment::new(1, 0)), 200);
    }

    #[test]
    fn test_single_entry_ascii_case_insensitive() {
        let table = table_for(&[("users", 1)]);
        assert_eq!(lookup(table.as_ref(), "/users"), 1);
        assert_eq!(lookup(table.as_ref(), "/USERS"), 1);
        assert_eq!(lookup(table.as_ref(), "/user"), 100);
        assert_eq!(table.get_destination("//", PathSegment::new(1, 0)), 200);
    }

    #[test]
    fn test_single_entry_unicode() {
        let table = table_for(&[("café", 7)]);
        assert_eq!(lookup(table.as_ref(), "/café"), 7);
        assert_eq!(lookup(table.as_ref(), "/CAFÉ"), 7);
        assert_eq!(lookup(table.as_ref(), "/cafe"), 100);
    }

    #[test]
    fn test_every_size_class_agrees() {
        // The contract must hold regardless of which implementation the
        // entry count selects.
        for size in [2usize, 9, 10, 60, 120] {
            let names: Vec<String> = (0..size).map(|i| format!("entry{i}")).collect();
            let entries: Vec<(&str, usize)> =
                names.iter().enumerate().map(|(i, n)| (n.as_str(), i)).collect();
            let table = table_for(&entries);

            let path = "/ENTRY1";
            assert_eq!(lookup(table.as_ref(), path), 1, "size {size}");
            assert_eq!(lookup(table.as_ref(), "/missing"), 100, "size {size}");
            assert_eq!(
                table.get_destination("//", PathSegment::new(1, 0)),
                200,
                "size {size}"
            );
        }
    }
}
