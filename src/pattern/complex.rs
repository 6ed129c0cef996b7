//! Request-time matching of complex (multi-part) segments.
//!
//! Complex segments like `{a}-{b}` or `{name}.{ext?}` cannot be resolved
//! from precomputed captures; they need the segment text and the value map.
//! Matching walks the parts right to left, anchoring the trailing literal
//! at the end of the text and binding each parameter to the span between
//! its neighboring literals. Literal searches take the *last* occurrence,
//! so parameters are greedy toward the left.

use super::{ParameterPart, PatternPart, PatternSegment};
use crate::jump_table::literal_matches;
use crate::values::RouteValues;
use serde_json::Value;
use std::sync::Arc;

/// Match `text` against a complex segment, binding parameter values.
///
/// Returns false when the text cannot satisfy the segment; `values` may be
/// partially updated in that case (the caller invalidates the candidate, so
/// the values are discarded).
pub(crate) fn match_complex_segment(
    segment: &PatternSegment,
    text: &str,
    values: &mut RouteValues,
) -> bool {
    let parts = &segment.parts;
    let mut end = text.len();
    let mut pending: Option<&ParameterPart> = None;

    for (index, part) in parts.iter().enumerate().rev() {
        match part {
            PatternPart::Parameter(parameter) => {
                pending = Some(parameter);
            }
            PatternPart::Literal(literal) => {
                let is_last_part = index == parts.len() - 1;

                let found = if is_last_part {
                    // The trailing literal must sit flush against the end.
                    end.checked_sub(literal.len()).filter(|start| {
                        text.get(*start..end)
                            .is_some_and(|window| literal_matches(literal, window))
                    })
                } else {
                    // Leave at least one character for a pending parameter.
                    let search_end = if pending.is_some() {
                        end.saturating_sub(1)
                    } else {
                        end
                    };
                    find_last_ignore_case(text, literal, search_end)
                };

                let Some(start) = found else {
                    // A trailing `literal{param?}` pair may be absent
                    // entirely, but only if nothing was consumed yet.
                    let optional_tail = pending.is_some_and(ParameterPart::is_optional)
                        && index + 2 == parts.len()
                        && end == text.len();
                    if optional_tail {
                        pending = None;
                        continue;
                    }
                    return false;
                };

                if let Some(parameter) = pending.take() {
                    let value = &text[start + literal.len()..end];
                    if value.is_empty() {
                        return false;
                    }
                    values.set(
                        Arc::clone(&parameter.name),
                        Value::String(value.to_string()),
                    );
                }
                end = start;
            }
        }
    }

    if let Some(parameter) = pending.take() {
        let value = &text[..end];
        if value.is_empty() {
            return false;
        }
        values.set(
            Arc::clone(&parameter.name),
            Value::String(value.to_string()),
        );
    } else if end != 0 {
        return false;
    }

    true
}

fn find_last_ignore_case(haystack: &str, needle: &str, search_end: usize) -> Option<usize> {
    let last_start = search_end.checked_sub(needle.len())?;
    for start in (0..=last_start).rev() {
        if let Some(window) = haystack.get(start..start + needle.len()) {
            if literal_matches(needle, window) {
                return Some(start);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::RoutePattern;

    fn run(template: &str, text: &str) -> Option<RouteValues> {
        let pattern = RoutePattern::parse(template).unwrap();
        let mut values = RouteValues::new();
        match_complex_segment(&pattern.segments()[0], text, &mut values).then_some(values)
    }

    #[test]
    fn test_two_parameters_with_separator() {
        let values = run("{a}-{b}", "x-y").unwrap();
        assert_eq!(values.get_str("a"), Some("x"));
        assert_eq!(values.get_str("b"), Some("y"));
    }

    #[test]
    fn test_separator_binding_is_greedy_left() {
        let values = run("{a}-{b}", "x-y-z").unwrap();
        assert_eq!(values.get_str("a"), Some("x-y"));
        assert_eq!(values.get_str("b"), Some("z"));
    }

    #[test]
    fn test_literal_prefix() {
        let values = run("v{version}", "v42").unwrap();
        assert_eq!(values.get_str("version"), Some("42"));
        assert!(run("v{version}", "x42").is_none());
    }

    #[test]
    fn test_trailing_literal_must_anchor() {
        let values = run("{name}.txt", "notes.txt").unwrap();
        assert_eq!(values.get_str("name"), Some("notes"));
        assert!(run("{name}.txt", "notes.txt.bak").is_none());
    }

    #[test]
    fn test_empty_parameter_value_fails() {
        assert!(run("{a}-{b}", "-y").is_none());
        assert!(run("{a}-{b}", "x-").is_none());
    }

    #[test]
    fn test_optional_extension_present_and_absent() {
        let values = run("{name}.{ext?}", "file.txt").unwrap();
        assert_eq!(values.get_str("name"), Some("file"));
        assert_eq!(values.get_str("ext"), Some("txt"));

        let values = run("{name}.{ext?}", "file").unwrap();
        assert_eq!(values.get_str("name"), Some("file"));
        assert_eq!(values.get_str("ext"), None);
    }

    #[test]
    fn test_case_insensitive_literals() {
        let values = run("{name}.TXT", "readme.txt").unwrap();
        assert_eq!(values.get_str("name"), Some("readme"));
    }
}
