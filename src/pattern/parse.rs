//! Route template parser.

use super::{ParameterKind, ParameterPart, PatternPart, PatternSegment, RoutePattern};
use crate::constraint::{ConstraintResolver, ParameterPolicyRef};
use anyhow::{bail, Context};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

pub(super) fn parse(template: &str, resolver: &ConstraintResolver) -> anyhow::Result<RoutePattern> {
    let trimmed = template.trim_start_matches('/').trim_end_matches('/');

    let mut segments = Vec::new();
    let mut defaults: Vec<(Arc<str>, Value)> = Vec::new();
    let mut policies: Vec<(Arc<str>, Vec<ParameterPolicyRef>)> = Vec::new();
    let mut seen_names: HashSet<Arc<str>> = HashSet::new();

    if !trimmed.is_empty() {
        for segment_text in trimmed.split('/') {
            if segment_text.is_empty() {
                bail!("route template '{template}' contains an empty segment");
            }
            let segment = parse_segment(
                segment_text,
                resolver,
                &mut defaults,
                &mut policies,
                &mut seen_names,
            )
            .with_context(|| format!("invalid route template '{template}'"))?;
            segments.push(segment);
        }
    }

    // A catch-all consumes the rest of the path, so nothing may follow it
    // and it cannot share a segment with other parts.
    for (index, segment) in segments.iter().enumerate() {
        for part in &segment.parts {
            if let Some(parameter) = part.as_parameter() {
                if parameter.is_catch_all()
                    && (index != segments.len() - 1 || !segment.is_simple())
                {
                    bail!(
                        "catch-all parameter '{}' must be the final part of route template '{template}'",
                        parameter.name
                    );
                }
            }
        }
    }

    Ok(RoutePattern::assemble(
        template.to_string(),
        segments,
        defaults,
        policies,
    ))
}

fn parse_segment(
    text: &str,
    resolver: &ConstraintResolver,
    defaults: &mut Vec<(Arc<str>, Value)>,
    policies: &mut Vec<(Arc<str>, Vec<ParameterPolicyRef>)>,
    seen_names: &mut HashSet<Arc<str>>,
) -> anyhow::Result<PatternSegment> {
    let mut parts = Vec::new();
    let mut literal = String::new();
    let mut chars = text.char_indices().peekable();

    while let Some((index, ch)) = chars.next() {
        match ch {
            '{' => {
                if !literal.is_empty() {
                    parts.push(PatternPart::Literal(std::mem::take(&mut literal)));
                }
                // Braces may nest inside policy arguments, e.g. {id:regex(\d{4})}.
                let mut depth = 1;
                let start = index + 1;
                let mut end = None;
                for (inner_index, inner) in chars.by_ref() {
                    match inner {
                        '{' => depth += 1,
                        '}' => {
                            depth -= 1;
                            if depth == 0 {
                                end = Some(inner_index);
                                break;
                            }
                        }
                        _ => {}
                    }
                }
                let Some(end) = end else {
                    bail!("unclosed '{{' in segment '{text}'");
                };
                let (parameter, default) = parse_parameter(&text[start..end], resolver, policies)?;
                if !seen_names.insert(Arc::clone(&parameter.name)) {
                    bail!("parameter '{}' appears more than once", parameter.name);
                }
                if let Some(default) = default {
                    defaults.push((Arc::clone(&parameter.name), default));
                }
                if let Some(PatternPart::Parameter(_)) = parts.last() {
                    bail!("segment '{text}' has two adjacent parameters; separate them with a literal");
                }
                parts.push(PatternPart::Parameter(parameter));
            }
            '}' => bail!("unmatched '}}' in segment '{text}'"),
            _ => literal.push(ch),
        }
    }

    if !literal.is_empty() {
        parts.push(PatternPart::Literal(literal));
    }

    Ok(PatternSegment { parts })
}

fn parse_parameter(
    content: &str,
    resolver: &ConstraintResolver,
    policies: &mut Vec<(Arc<str>, Vec<ParameterPolicyRef>)>,
) -> anyhow::Result<(ParameterPart, Option<Value>)> {
    let mut spec = content;
    let mut kind = ParameterKind::Standard;

    if let Some(stripped) = spec.strip_suffix('?') {
        kind = ParameterKind::Optional;
        spec = stripped;
    }
    if let Some(stripped) = spec.strip_prefix('*') {
        if kind == ParameterKind::Optional {
            bail!("parameter '{{{content}}}' cannot be both catch-all and optional");
        }
        kind = ParameterKind::CatchAll;
        spec = stripped;
    }

    let (spec, default) = match split_top_level(spec, '=') {
        Some((head, default)) => (head, Some(Value::String(default.to_string()))),
        None => (spec, None),
    };
    if default.is_some() && kind == ParameterKind::Optional {
        bail!("parameter '{{{content}}}' cannot combine a default value with '?'");
    }

    let mut pieces = split_policy_chain(spec);
    let name = pieces.remove(0);
    if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
        bail!("invalid parameter name '{name}'");
    }
    let name: Arc<str> = Arc::from(name);

    for piece in pieces {
        let (policy_name, argument) = match piece.split_once('(') {
            Some((policy_name, rest)) => {
                let argument = rest
                    .strip_suffix(')')
                    .with_context(|| format!("unclosed '(' in policy '{piece}'"))?;
                (policy_name, Some(argument))
            }
            None => (piece, None),
        };
        let policy = resolver.resolve(policy_name, argument)?;
        if let Some(entry) = policies.iter_mut().find(|(n, _)| *n == name) {
            entry.1.push(policy);
        } else {
            policies.push((Arc::clone(&name), vec![policy]));
        }
    }

    Ok((ParameterPart { name, kind }, default))
}

/// Split on the first `separator` that is not inside parentheses.
fn split_top_level(text: &str, separator: char) -> Option<(&str, &str)> {
    let mut depth = 0usize;
    for (index, ch) in text.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            c if c == separator && depth == 0 => {
                return Some((&text[..index], &text[index + separator.len_utf8()..]));
            }
            _ => {}
        }
    }
    None
}

/// Split `name:policy1:policy2(arg)` on `:` outside parentheses.
fn split_policy_chain(text: &str) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    for (index, ch) in text.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ':' if depth == 0 => {
                pieces.push(&text[start..index]);
                start = index + 1;
            }
            _ => {}
        }
    }
    pieces.push(&text[start..]);
    pieces
}
