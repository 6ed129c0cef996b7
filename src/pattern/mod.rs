//! # Route Pattern Module
//!
//! Structured representation of a URL path skeleton: an ordered list of
//! segments, each a sequence of literal and parameter parts, plus the maps
//! the matcher consumes (defaults, required values, per-parameter policies)
//! and a precomputed inbound precedence scalar.
//!
//! A segment is *simple* when it holds exactly one part (a literal, or one
//! parameter) and *complex* otherwise (`{a}-{b}`, `v{version}`). Complex
//! segments are matched lazily at request time because they need a fully
//! materialized value map.

mod complex;
mod parse;

pub(crate) use complex::match_complex_segment;

use crate::constraint::{ConstraintResolver, ParameterPolicyRef};
use serde_json::Value;
use std::sync::Arc;

/// How a parameter consumes path content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterKind {
    /// Matches exactly one non-empty path segment
    Standard,
    /// May be omitted entirely (`{id?}`)
    Optional,
    /// Consumes all remaining segments, including none (`{*path}`)
    CatchAll,
}

/// A parameter part within a pattern segment.
#[derive(Debug, Clone)]
pub struct ParameterPart {
    /// Parameter name, unique within a pattern
    pub name: Arc<str>,
    /// Consumption behavior
    pub kind: ParameterKind,
}

impl ParameterPart {
    /// Whether this parameter is a catch-all.
    #[must_use]
    pub fn is_catch_all(&self) -> bool {
        self.kind == ParameterKind::CatchAll
    }

    /// Whether this parameter may be omitted.
    #[must_use]
    pub fn is_optional(&self) -> bool {
        self.kind == ParameterKind::Optional
    }
}

/// One part of a pattern segment.
#[derive(Debug, Clone)]
pub enum PatternPart {
    /// Literal text, matched case-insensitively
    Literal(String),
    /// A named parameter
    Parameter(ParameterPart),
}

impl PatternPart {
    /// The parameter, if this part is one.
    #[must_use]
    pub fn as_parameter(&self) -> Option<&ParameterPart> {
        match self {
            PatternPart::Parameter(part) => Some(part),
            PatternPart::Literal(_) => None,
        }
    }
}

/// One `/`-delimited segment of a route pattern.
#[derive(Debug, Clone)]
pub struct PatternSegment {
    /// Ordered parts; simple segments hold exactly one
    pub parts: Vec<PatternPart>,
}

impl PatternSegment {
    /// Whether this segment holds exactly one part.
    #[must_use]
    pub fn is_simple(&self) -> bool {
        self.parts.len() == 1
    }

    /// The literal text, when this is a simple literal segment.
    #[must_use]
    pub fn as_literal(&self) -> Option<&str> {
        match self.parts.as_slice() {
            [PatternPart::Literal(text)] => Some(text),
            _ => None,
        }
    }

    /// The parameter, when this is a simple parameter segment.
    #[must_use]
    pub fn as_parameter(&self) -> Option<&ParameterPart> {
        match self.parts.as_slice() {
            [PatternPart::Parameter(part)] => Some(part),
            _ => None,
        }
    }

    /// Iterate over the parameters of this segment, in order.
    pub fn parameters(&self) -> impl Iterator<Item = &ParameterPart> {
        self.parts.iter().filter_map(PatternPart::as_parameter)
    }
}

/// A parsed route template.
///
/// Immutable once constructed. Out-of-line defaults, required values, and
/// policies are attached with the builder-style `with_*` methods before the
/// pattern is wrapped in an endpoint.
#[derive(Debug, Clone)]
pub struct RoutePattern {
    raw: String,
    segments: Vec<PatternSegment>,
    /// Ordered name -> default value pairs; out-of-line defaults precede
    /// inline ones, which affects candidate slot layout
    defaults: Vec<(Arc<str>, Value)>,
    required_values: Vec<(Arc<str>, String)>,
    policies: Vec<(Arc<str>, Vec<ParameterPolicyRef>)>,
    precedence: f64,
}

impl RoutePattern {
    /// Parse a route template using the default constraint resolver.
    ///
    /// Supported syntax: literals, `{name}`, `{name?}`, `{*rest}`,
    /// `{name=default}`, `{name:policy}` / `{name:policy(arg)}` chains, and
    /// complex segments such as `{a}-{b}` or `v{version}`.
    pub fn parse(template: &str) -> anyhow::Result<Self> {
        Self::parse_with(template, &ConstraintResolver::default())
    }

    /// Parse a route template, resolving inline policy references through
    /// `resolver`.
    pub fn parse_with(template: &str, resolver: &ConstraintResolver) -> anyhow::Result<Self> {
        parse::parse(template, resolver)
    }

    pub(crate) fn assemble(
        raw: String,
        segments: Vec<PatternSegment>,
        defaults: Vec<(Arc<str>, Value)>,
        policies: Vec<(Arc<str>, Vec<ParameterPolicyRef>)>,
    ) -> Self {
        let precedence = compute_inbound_precedence(&segments, &policies);
        Self {
            raw,
            segments,
            defaults,
            required_values: Vec::new(),
            policies,
            precedence,
        }
    }

    /// Attach out-of-line defaults.
    ///
    /// Out-of-line defaults are ordered before inline ones and win on name
    /// conflicts.
    #[must_use]
    pub fn with_defaults<I, S>(mut self, defaults: I) -> Self
    where
        I: IntoIterator<Item = (S, Value)>,
        S: AsRef<str>,
    {
        let mut merged: Vec<(Arc<str>, Value)> = Vec::new();
        for (name, value) in defaults {
            let name: Arc<str> = Arc::from(name.as_ref());
            if let Some(entry) = merged.iter_mut().find(|(n, _)| *n == name) {
                entry.1 = value;
            } else {
                merged.push((name, value));
            }
        }
        for (name, value) in self.defaults.drain(..) {
            if !merged.iter().any(|(n, _)| *n == name) {
                merged.push((name, value));
            }
        }
        self.defaults = merged;
        self
    }

    /// Attach required literal values for parameters.
    ///
    /// A parameter with a required value collapses into a literal tree edge
    /// during matcher construction.
    #[must_use]
    pub fn with_required_values<I, S, V>(mut self, required: I) -> Self
    where
        I: IntoIterator<Item = (S, V)>,
        S: AsRef<str>,
        V: AsRef<str>,
    {
        for (name, value) in required {
            let name: Arc<str> = Arc::from(name.as_ref());
            let value = value.as_ref().to_string();
            if let Some(entry) = self.required_values.iter_mut().find(|(n, _)| *n == name) {
                entry.1 = value;
            } else {
                self.required_values.push((name, value));
            }
        }
        self.precedence = compute_inbound_precedence(&self.segments, &self.policies);
        self
    }

    /// Attach an out-of-line policy reference to a parameter name.
    ///
    /// The name does not need to correspond to a parameter part; constraints
    /// on literal-only templates still run against defaulted values.
    #[must_use]
    pub fn with_policy(mut self, name: &str, policy: ParameterPolicyRef) -> Self {
        let name: Arc<str> = Arc::from(name);
        if let Some(entry) = self.policies.iter_mut().find(|(n, _)| *n == name) {
            entry.1.push(policy);
        } else {
            self.policies.push((name, vec![policy]));
        }
        self.precedence = compute_inbound_precedence(&self.segments, &self.policies);
        self
    }

    /// The raw template text.
    #[must_use]
    pub fn raw_text(&self) -> &str {
        &self.raw
    }

    /// The parsed segments.
    #[must_use]
    pub fn segments(&self) -> &[PatternSegment] {
        &self.segments
    }

    /// Number of segments.
    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Ordered `(name, default)` pairs.
    #[must_use]
    pub fn defaults(&self) -> &[(Arc<str>, Value)] {
        &self.defaults
    }

    /// Default value for `name`, if any.
    #[must_use]
    pub fn default_for(&self, name: &str) -> Option<&Value> {
        self.defaults
            .iter()
            .find(|(n, _)| n.as_ref() == name)
            .map(|(_, v)| v)
    }

    /// Required literal value for `name`, if any.
    #[must_use]
    pub fn required_value_for(&self, name: &str) -> Option<&str> {
        self.required_values
            .iter()
            .find(|(n, _)| n.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Every `(name, policies)` entry, in attachment order.
    #[must_use]
    pub fn policy_entries(&self) -> &[(Arc<str>, Vec<ParameterPolicyRef>)] {
        &self.policies
    }

    /// Ordered policy references for `name`.
    #[must_use]
    pub fn policies_for(&self, name: &str) -> &[ParameterPolicyRef] {
        self.policies
            .iter()
            .find(|(n, _)| n.as_ref() == name)
            .map(|(_, p)| p.as_slice())
            .unwrap_or(&[])
    }

    /// Inbound precedence: a scalar total order over template specificity,
    /// lower is more specific. The first segment is most significant.
    #[must_use]
    pub fn precedence(&self) -> f64 {
        self.precedence
    }

    /// Whether the final segment is a catch-all parameter.
    #[must_use]
    pub fn has_catch_all(&self) -> bool {
        self.segments
            .last()
            .and_then(PatternSegment::as_parameter)
            .is_some_and(ParameterPart::is_catch_all)
    }
}

/// Precedence digit for one segment: literal < complex/constrained
/// parameter < plain parameter < constrained catch-all < catch-all.
fn raw_precedence_digit(
    segment: &PatternSegment,
    policies: &[(Arc<str>, Vec<ParameterPolicyRef>)],
) -> u8 {
    if segment.as_literal().is_some() {
        return 1;
    }
    if let Some(parameter) = segment.as_parameter() {
        let constrained = policies
            .iter()
            .any(|(n, p)| *n == parameter.name && !p.is_empty());
        return match (parameter.is_catch_all(), constrained) {
            (true, true) => 4,
            (true, false) => 5,
            (false, true) => 2,
            (false, false) => 3,
        };
    }
    // complex segment
    2
}

fn compute_inbound_precedence(
    segments: &[PatternSegment],
    policies: &[(Arc<str>, Vec<ParameterPolicyRef>)],
) -> f64 {
    let mut precedence = 0.0;
    let mut scale = 1.0;
    for segment in segments {
        precedence += f64::from(raw_precedence_digit(segment, policies)) * scale;
        scale /= 10.0;
    }
    precedence
}

/// Precedence digit used to order the tree builder's work list at one
/// depth. Parameters collapsed to literals by a required value sort with
/// literals so their edges exist before generic branches attach to them.
#[must_use]
pub(crate) fn build_precedence_digit(pattern: &RoutePattern, segment: &PatternSegment) -> u8 {
    if let Some(parameter) = segment.as_parameter() {
        if !parameter.is_catch_all() && pattern.required_value_for(&parameter.name).is_some() {
            return 1;
        }
    }
    raw_precedence_digit(segment, &pattern.policies)
}
