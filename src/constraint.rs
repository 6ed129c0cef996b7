//! Parameter constraints and policy references.
//!
//! Constraints are opaque predicates attached to route parameters. The
//! matcher evaluates them against the materialized route values of each
//! candidate; constraints that additionally implement the literal-matching
//! capability are consulted during tree construction to prune literal
//! branches that provably cannot match.

use crate::request::RequestContext;
use crate::values::RouteValues;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Predicate contract for route parameter constraints.
///
/// `matches` runs at request time against a fully materialized value map.
/// `matches_literal` is an optional narrower capability: when a constraint
/// can decide from literal text alone, the tree builder uses it to avoid
/// creating branches a parameter could never take. Returning `None` opts out
/// and the builder keeps the branch.
pub trait RouteConstraint: fmt::Debug + Send + Sync {
    /// Evaluate the constraint for `name` against the route values.
    fn matches(&self, request: &RequestContext, name: &str, values: &RouteValues) -> bool;

    /// Literal-matching capability used during tree construction.
    fn matches_literal(&self, _name: &str, _literal: &str) -> Option<bool> {
        None
    }
}

/// A single policy reference attached to a route parameter.
///
/// Only actual constraints participate in candidate evaluation; other policy
/// kinds (parameter transformers and the like) are carried opaquely and
/// ignored by the matcher.
#[derive(Debug, Clone)]
pub enum ParameterPolicyRef {
    /// A real constraint, collected into the candidate's constraint list
    Constraint(Arc<dyn RouteConstraint>),
    /// Any other policy kind, identified by name only
    Opaque(Arc<str>),
}

impl ParameterPolicyRef {
    /// The constraint, if this reference is one.
    #[must_use]
    pub fn as_constraint(&self) -> Option<&Arc<dyn RouteConstraint>> {
        match self {
            ParameterPolicyRef::Constraint(constraint) => Some(constraint),
            ParameterPolicyRef::Opaque(_) => None,
        }
    }
}

fn value_text(values: &RouteValues, name: &str) -> Option<String> {
    match values.get(name)? {
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Requires the parameter value to parse as a 64-bit integer.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntConstraint;

impl RouteConstraint for IntConstraint {
    fn matches(&self, _request: &RequestContext, name: &str, values: &RouteValues) -> bool {
        match values.get(name) {
            Some(Value::Number(n)) => n.is_i64() || n.is_u64(),
            Some(Value::String(s)) => s.parse::<i64>().is_ok(),
            _ => false,
        }
    }

    fn matches_literal(&self, _name: &str, literal: &str) -> Option<bool> {
        Some(literal.parse::<i64>().is_ok())
    }
}

/// Requires the parameter value to consist of ASCII letters only.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlphaConstraint;

impl RouteConstraint for AlphaConstraint {
    fn matches(&self, _request: &RequestContext, name: &str, values: &RouteValues) -> bool {
        value_text(values, name)
            .is_some_and(|s| !s.is_empty() && s.bytes().all(|b| b.is_ascii_alphabetic()))
    }

    fn matches_literal(&self, _name: &str, literal: &str) -> Option<bool> {
        Some(!literal.is_empty() && literal.bytes().all(|b| b.is_ascii_alphabetic()))
    }
}

/// Bounds the parameter value's length in characters.
#[derive(Debug, Clone, Copy)]
pub struct LengthConstraint {
    /// Minimum length, inclusive
    pub min: usize,
    /// Maximum length, inclusive
    pub max: usize,
}

impl LengthConstraint {
    /// Exact-length constraint.
    #[must_use]
    pub fn exact(len: usize) -> Self {
        Self { min: len, max: len }
    }

    fn check(&self, text: &str) -> bool {
        let len = text.chars().count();
        len >= self.min && len <= self.max
    }
}

impl RouteConstraint for LengthConstraint {
    fn matches(&self, _request: &RequestContext, name: &str, values: &RouteValues) -> bool {
        value_text(values, name).is_some_and(|s| self.check(&s))
    }

    fn matches_literal(&self, _name: &str, literal: &str) -> Option<bool> {
        Some(self.check(literal))
    }
}

/// Requires the parameter value to match an anchored regular expression.
#[derive(Debug, Clone)]
pub struct RegexConstraint {
    regex: Arc<Regex>,
}

impl RegexConstraint {
    /// Compile the pattern, anchoring it at both ends if not already.
    pub fn new(pattern: &str) -> anyhow::Result<Self> {
        let anchored = if pattern.starts_with('^') && pattern.ends_with('$') {
            pattern.to_string()
        } else {
            format!("^(?:{})$", pattern)
        };
        Ok(Self {
            regex: Arc::new(Regex::new(&anchored)?),
        })
    }
}

impl RouteConstraint for RegexConstraint {
    fn matches(&self, _request: &RequestContext, name: &str, values: &RouteValues) -> bool {
        value_text(values, name).is_some_and(|s| self.regex.is_match(&s))
    }

    fn matches_literal(&self, _name: &str, literal: &str) -> Option<bool> {
        Some(self.regex.is_match(literal))
    }
}

type PolicyFactory = Arc<dyn Fn(Option<&str>) -> anyhow::Result<ParameterPolicyRef> + Send + Sync>;

/// Resolves inline policy references (`{id:int}`, `{code:length(3)}`) to
/// concrete [`ParameterPolicyRef`]s during template parsing.
///
/// The default resolver knows the built-in constraints; applications
/// register additional names for their own constraints or transformers.
#[derive(Clone)]
pub struct ConstraintResolver {
    factories: HashMap<String, PolicyFactory>,
}

impl ConstraintResolver {
    /// An empty resolver with no registered names.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register a policy factory under `name`.
    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(Option<&str>) -> anyhow::Result<ParameterPolicyRef> + Send + Sync + 'static,
    {
        self.factories.insert(name.to_string(), Arc::new(factory));
    }

    /// Register a constraint under `name`, ignoring any argument.
    pub fn register_constraint<C>(&mut self, name: &str, constraint: C)
    where
        C: RouteConstraint + Clone + 'static,
    {
        self.register(name, move |_| {
            Ok(ParameterPolicyRef::Constraint(Arc::new(constraint.clone())))
        });
    }

    /// Resolve `name` with an optional argument into a policy reference.
    ///
    /// Unknown names resolve to [`ParameterPolicyRef::Opaque`] so templates
    /// referencing application-side transformers still parse.
    pub fn resolve(&self, name: &str, argument: Option<&str>) -> anyhow::Result<ParameterPolicyRef> {
        match self.factories.get(name) {
            Some(factory) => factory(argument),
            None => Ok(ParameterPolicyRef::Opaque(Arc::from(name))),
        }
    }
}

impl Default for ConstraintResolver {
    fn default() -> Self {
        let mut resolver = Self::empty();
        resolver.register_constraint("int", IntConstraint);
        resolver.register_constraint("alpha", AlphaConstraint);
        resolver.register("length", |argument| {
            let argument = argument.unwrap_or_default();
            let constraint = match argument.split_once(',') {
                Some((min, max)) => LengthConstraint {
                    min: min.trim().parse()?,
                    max: max.trim().parse()?,
                },
                None => LengthConstraint::exact(argument.trim().parse()?),
            };
            Ok(ParameterPolicyRef::Constraint(Arc::new(constraint)))
        });
        resolver.register("regex", |argument| {
            let pattern = argument.unwrap_or_default();
            Ok(ParameterPolicyRef::Constraint(Arc::new(RegexConstraint::new(pattern)?)))
        });
        resolver
    }
}

impl fmt::Debug for ConstraintResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.factories.keys().collect();
        names.sort();
        f.debug_struct("ConstraintResolver").field("names", &names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn values_with(name: &str, value: Value) -> RouteValues {
        let mut values = RouteValues::new();
        values.set(Arc::from(name), value);
        values
    }

    fn request() -> RequestContext {
        RequestContext::get("/")
    }

    #[test]
    fn test_int_constraint() {
        let constraint = IntConstraint;
        assert!(constraint.matches(&request(), "id", &values_with("id", json!("42"))));
        assert!(!constraint.matches(&request(), "id", &values_with("id", json!("4x"))));
        assert_eq!(constraint.matches_literal("id", "17"), Some(true));
        assert_eq!(constraint.matches_literal("id", "abc"), Some(false));
    }

    #[test]
    fn test_length_constraint() {
        let constraint = LengthConstraint { min: 2, max: 3 };
        assert!(constraint.matches(&request(), "code", &values_with("code", json!("ab"))));
        assert!(!constraint.matches(&request(), "code", &values_with("code", json!("abcd"))));
    }

    #[test]
    fn test_regex_constraint_is_anchored() {
        let constraint = RegexConstraint::new("[a-z]+").unwrap();
        assert_eq!(constraint.matches_literal("slug", "abc"), Some(true));
        assert_eq!(constraint.matches_literal("slug", "abc1"), Some(false));
    }

    #[test]
    fn test_resolver_unknown_name_is_opaque() {
        let resolver = ConstraintResolver::default();
        let policy = resolver.resolve("slugify", None).unwrap();
        assert!(matches!(policy, ParameterPolicyRef::Opaque(_)));
    }

    #[test]
    fn test_resolver_length_arguments() {
        let resolver = ConstraintResolver::default();
        let policy = resolver.resolve("length", Some("2,4")).unwrap();
        let constraint = policy.as_constraint().unwrap();
        assert_eq!(constraint.matches_literal("p", "abc"), Some(true));
        assert_eq!(constraint.matches_literal("p", "abcde"), Some(false));
    }
}
