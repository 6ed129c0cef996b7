//! Hash-map jump table for large entry counts.

use super::JumpTable;
use crate::segments::PathSegment;
use smallvec::SmallVec;
use std::collections::HashMap;

/// Longest segment that is case-folded on the stack during lookup.
const MAX_INLINE_FOLD: usize = 64;

/// Keys the entries by case-folded text; O(1) lookup dominates a trie walk
/// once tables grow past roughly a hundred entries.
#[derive(Debug)]
pub struct DictionaryJumpTable {
    default_destination: usize,
    exit_destination: usize,
    destinations: HashMap<String, usize>,
}

/// Case-fold text the same way for storage and lookup: cheap ASCII
/// lowering when possible, full Unicode lowercasing otherwise.
pub(crate) fn fold(text: &str) -> String {
    if text.is_ascii() {
        text.to_ascii_lowercase()
    } else {
        text.to_lowercase()
    }
}

impl DictionaryJumpTable {
    pub(crate) fn new(
        default_destination: usize,
        exit_destination: usize,
        entries: Vec<(String, usize)>,
    ) -> Self {
        let destinations = entries
            .into_iter()
            .map(|(text, destination)| (fold(&text), destination))
            .collect();
        Self {
            default_destination,
            exit_destination,
            destinations,
        }
    }
}

impl JumpTable for DictionaryJumpTable {
    fn get_destination(&self, path: &str, segment: PathSegment) -> usize {
        if segment.len == 0 {
            return self.exit_destination;
        }
        let text = segment.text(path);

        if text.is_ascii() && text.len() <= MAX_INLINE_FOLD {
            // Fold on the stack; no heap allocation on the hot path.
            let mut folded: SmallVec<[u8; MAX_INLINE_FOLD]> = SmallVec::new();
            folded.extend(text.bytes().map(|b| b.to_ascii_lowercase()));
            if let Ok(folded) = std::str::from_utf8(&folded) {
                return *self
                    .destinations
                    .get(folded)
                    .unwrap_or(&self.default_destination);
            }
        }

        *self
            .destinations
            .get(&fold(text))
            .unwrap_or(&self.default_destination)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dictionary_lookup() {
        let entries = (0..150)
            .map(|i| (format!("seg{i}"), i))
            .collect::<Vec<_>>();
        let table = DictionaryJumpTable::new(998, 999, entries);

        let path = "/SEG42";
        assert_eq!(table.get_destination(path, PathSegment::new(1, 5)), 42);
        assert_eq!(table.get_destination("/none", PathSegment::new(1, 4)), 998);
        assert_eq!(table.get_destination("//", PathSegment::new(1, 0)), 999);
    }
}
