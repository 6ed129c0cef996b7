//! Linear-scan jump table for small entry counts.

use super::{literal_matches, JumpTable};
use crate::segments::PathSegment;

/// Scans entries in order; faster than hashing below roughly ten entries.
#[derive(Debug)]
pub struct LinearSearchJumpTable {
    default_destination: usize,
    exit_destination: usize,
    entries: Vec<(String, usize)>,
}

impl LinearSearchJumpTable {
    pub(crate) fn new(
        default_destination: usize,
        exit_destination: usize,
        entries: Vec<(String, usize)>,
    ) -> Self {
        Self {
            default_destination,
            exit_destination,
            entries,
        }
    }
}

impl JumpTable for LinearSearchJumpTable {
    fn get_destination(&self, path: &str, segment: PathSegment) -> usize {
        if segment.len == 0 {
            return self.exit_destination;
        }
        let text = segment.text(path);
        for (entry, destination) in &self.entries {
            if entry.is_ascii() && text.is_ascii() {
                // Length check first: almost always disagrees, and it skips
                // the character comparison entirely.
                if entry.len() == text.len() && entry.eq_ignore_ascii_case(text) {
                    return *destination;
                }
            } else if literal_matches(entry, text) {
                return *destination;
            }
        }
        self.default_destination
    }
}
