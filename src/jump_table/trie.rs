//! Background-compiled trie jump table.
//!
//! Mid-sized tables walk a byte trie over case-folded segment text instead
//! of hashing. Building the trie is deferred to a background thread so the
//! first requests after a (re)build do not pay the construction cost: until
//! the trie is published, lookups go through an interpreted dictionary
//! fallback. Exactly one build runs no matter how many requests race to
//! trigger it, and readers only ever observe the fully constructed trie.
//!
//! Non-ASCII input detected mid-scan bails out to the fallback table for
//! correctness; the trie itself only folds ASCII.

use super::{DictionaryJumpTable, JumpTable};
use crate::segments::PathSegment;
use once_cell::sync::OnceCell;
use std::sync::{Arc, Once};
use tracing::debug;

#[derive(Debug)]
struct TrieNode {
    /// Sparse transitions on folded bytes; nodes rarely have more than a
    /// handful of children, so a linear probe beats a map here.
    transitions: Vec<(u8, u32)>,
    destination: Option<usize>,
}

#[derive(Debug)]
struct CompiledTrie {
    nodes: Vec<TrieNode>,
    /// Entries containing non-ASCII text cannot live in the trie; a miss
    /// must consult the fallback instead of short-circuiting to default.
    has_non_ascii_entries: bool,
}

impl CompiledTrie {
    fn build(entries: &[(String, usize)]) -> Self {
        let mut nodes = vec![TrieNode {
            transitions: Vec::new(),
            destination: None,
        }];
        let mut has_non_ascii_entries = false;

        for (text, destination) in entries {
            if !text.is_ascii() {
                has_non_ascii_entries = true;
                continue;
            }
            let mut current = 0usize;
            for byte in text.bytes().map(|b| b.to_ascii_lowercase()) {
                let next = nodes[current]
                    .transitions
                    .iter()
                    .find(|(b, _)| *b == byte)
                    .map(|(_, n)| *n as usize);
                current = match next {
                    Some(next) => next,
                    None => {
                        let next = nodes.len();
                        nodes[current].transitions.push((byte, next as u32));
                        nodes.push(TrieNode {
                            transitions: Vec::new(),
                            destination: None,
                        });
                        next
                    }
                };
            }
            // First writer wins, mirroring dictionary insert order.
            if nodes[current].destination.is_none() {
                nodes[current].destination = Some(*destination);
            }
        }

        Self {
            nodes,
            has_non_ascii_entries,
        }
    }

    /// Walk the trie; `None` means "consult the fallback".
    fn lookup(&self, text: &str) -> Option<Option<usize>> {
        let mut current = 0usize;
        for byte in text.bytes() {
            if byte >= 0x80 {
                // Non-ASCII mid-scan: correctness bail-out.
                return None;
            }
            let folded = byte.to_ascii_lowercase();
            let next = self.nodes[current]
                .transitions
                .iter()
                .find(|(b, _)| *b == folded)
                .map(|(_, n)| *n as usize);
            match next {
                Some(next) => current = next,
                None if self.has_non_ascii_entries => return None,
                None => return Some(None),
            }
        }
        match self.nodes[current].destination {
            Some(destination) => Some(Some(destination)),
            None if self.has_non_ascii_entries => None,
            None => Some(None),
        }
    }
}

/// Trie-backed jump table with asynchronous construction.
#[derive(Debug)]
pub struct CompiledTrieJumpTable {
    default_destination: usize,
    exit_destination: usize,
    fallback: DictionaryJumpTable,
    entries: Arc<[(String, usize)]>,
    compiled: Arc<OnceCell<CompiledTrie>>,
    build_once: Once,
    background_compilation: bool,
}

impl CompiledTrieJumpTable {
    pub(crate) fn new(
        default_destination: usize,
        exit_destination: usize,
        entries: Vec<(String, usize)>,
        background_compilation: bool,
    ) -> Self {
        let fallback =
            DictionaryJumpTable::new(default_destination, exit_destination, entries.clone());
        Self {
            default_destination,
            exit_destination,
            fallback,
            entries: entries.into(),
            compiled: Arc::new(OnceCell::new()),
            build_once: Once::new(),
            background_compilation,
        }
    }

    /// Kick off exactly one trie build.
    ///
    /// With background compilation enabled the build runs on its own thread
    /// and this call returns immediately; requests keep using the fallback
    /// until the trie is published through the `OnceCell`.
    fn ensure_compilation(&self) {
        self.build_once.call_once(|| {
            let entries = Arc::clone(&self.entries);
            let cell = Arc::clone(&self.compiled);
            let build = move || {
                let trie = CompiledTrie::build(&entries);
                debug!(
                    entries = entries.len(),
                    nodes = trie.nodes.len(),
                    "compiled trie jump table ready"
                );
                let _ = cell.set(trie);
            };
            if self.background_compilation {
                std::thread::spawn(build);
            } else {
                build();
            }
        });
    }
}

impl JumpTable for CompiledTrieJumpTable {
    fn get_destination(&self, path: &str, segment: PathSegment) -> usize {
        if segment.len == 0 {
            return self.exit_destination;
        }

        if let Some(trie) = self.compiled.get() {
            match trie.lookup(segment.text(path)) {
                Some(Some(destination)) => return destination,
                Some(None) => return self.default_destination,
                None => return self.fallback.get_destination(path, segment),
            }
        }

        self.ensure_compilation();
        self.fallback.get_destination(path, segment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(n: usize) -> Vec<(String, usize)> {
        (0..n).map(|i| (format!("route{i}"), i)).collect()
    }

    fn segment_of(path: &str) -> PathSegment {
        PathSegment::new(1, path.len() - 1)
    }

    #[test]
    fn test_fallback_serves_before_compilation() {
        // Synchronous compilation disabled entirely: first call triggers a
        // foreground build, but the fallback must already be correct.
        let table = CompiledTrieJumpTable::new(50, 60, entries(20), false);
        assert_eq!(table.get_destination("/route7", segment_of("/route7")), 7);
        assert_eq!(table.get_destination("/ROUTE7", segment_of("/ROUTE7")), 7);
        assert_eq!(table.get_destination("/nope", segment_of("/nope")), 50);
    }

    #[test]
    fn test_compiled_trie_agrees_with_fallback() {
        let table = CompiledTrieJumpTable::new(50, 60, entries(20), false);
        // Force the foreground build.
        table.ensure_compilation();
        assert!(table.compiled.get().is_some());

        assert_eq!(table.get_destination("/route3", segment_of("/route3")), 3);
        assert_eq!(table.get_destination("/Route19", segment_of("/Route19")), 19);
        assert_eq!(table.get_destination("/missing", segment_of("/missing")), 50);
        assert_eq!(table.get_destination("//", PathSegment::new(1, 0)), 60);
    }

    #[test]
    fn test_non_ascii_input_bails_to_fallback() {
        let mut mixed = entries(12);
        mixed.push(("café".to_string(), 99));
        let table = CompiledTrieJumpTable::new(50, 60, mixed, false);
        table.ensure_compilation();

        assert_eq!(table.get_destination("/café", segment_of("/café")), 99);
        assert_eq!(table.get_destination("/route2", segment_of("/route2")), 2);
    }

    #[test]
    fn test_background_compilation_single_build() {
        let table = CompiledTrieJumpTable::new(50, 60, entries(30), true);
        // Racing lookups: all must return correct results through the
        // fallback while at most one background build runs.
        for _ in 0..4 {
            assert_eq!(table.get_destination("/route9", segment_of("/route9")), 9);
        }
        // Wait for the background build to publish, then verify the trie
        // path agrees.
        for _ in 0..200 {
            if table.compiled.get().is_some() {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        assert_eq!(table.get_destination("/route9", segment_of("/route9")), 9);
    }
}
