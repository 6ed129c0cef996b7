//! Matcher tuning knobs.

use serde::Deserialize;

/// Switch-over thresholds for jump table implementations.
///
/// These are performance tuning, not correctness: every implementation
/// honors the same contract. The defaults were validated on 64-bit targets;
/// 32-bit deployments may prefer a lower `dictionary_threshold`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct JumpTableTuning {
    /// Entry counts below this use a linear scan (above the single-entry
    /// specializations)
    pub linear_search_threshold: usize,
    /// Entry counts below this use the background-compiled trie; at or
    /// above, the hash-map table
    pub dictionary_threshold: usize,
    /// Build tries on a background thread, serving lookups from the
    /// interpreted fallback until ready
    pub background_compilation: bool,
}

impl Default for JumpTableTuning {
    fn default() -> Self {
        Self {
            linear_search_threshold: 10,
            dictionary_threshold: 100,
            background_compilation: true,
        }
    }
}

/// Top-level matcher configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    /// Jump table selection thresholds
    pub jump_tables: JumpTableTuning,
    /// Attach human-readable labels to tree nodes while building; useful in
    /// diagnostics, costs memory
    pub include_labels: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MatcherConfig::default();
        assert_eq!(config.jump_tables.linear_search_threshold, 10);
        assert_eq!(config.jump_tables.dictionary_threshold, 100);
        assert!(config.jump_tables.background_compilation);
        assert!(!config.include_labels);
    }

    #[test]
    fn test_deserialize_partial() {
        let config: MatcherConfig = serde_json::from_str(
            r#"{ "jump_tables": { "dictionary_threshold": 50 }, "include_labels": true }"#,
        )
        .unwrap();
        assert_eq!(config.jump_tables.dictionary_threshold, 50);
        assert_eq!(config.jump_tables.linear_search_threshold, 10);
        assert!(config.include_labels);
    }
}
