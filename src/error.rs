use std::fmt;

/// Error raised while resolving an endpoint for a request.
///
/// Policy-driven rejections (405/415/406) are *not* errors; they are normal
/// selection outcomes modeled as synthetic endpoints. The only request-time
/// hard failure is an ambiguous match, which cannot be resolved by returning
/// a sensible HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchError {
    /// Two or more endpoints tied in final priority for the same request.
    ///
    /// This indicates a routing-table configuration error. The full list of
    /// tied display names is always reported; the tie is never silently
    /// resolved.
    AmbiguousMatch {
        /// Display names of every valid candidate that tied
        display_names: Vec<String>,
    },
}

impl fmt::Display for MatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchError::AmbiguousMatch { display_names } => {
                write!(
                    f,
                    "The request matched multiple endpoints with the same priority. \
                    Matches: {}",
                    display_names.join(", ")
                )
            }
        }
    }
}

impl std::error::Error for MatchError {}

/// Error raised while building the matcher's decision structures.
///
/// Every variant indicates a bug in the tree builder or in a policy
/// implementation, not bad user input. These fail fast and loudly; they are
/// never swallowed because they indicate topology corruption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    /// A jump table was asked to build without a default destination.
    UnsetDefaultDestination,
    /// A jump table was asked to build without an exit destination.
    UnsetExitDestination,
    /// A required-value parameter evaluated to an empty literal.
    ///
    /// Required values collapse parameters into literal tree edges; an empty
    /// literal would produce an unreachable branch.
    EmptyRequiredValue {
        /// The parameter whose required value was empty
        parameter: String,
    },
    /// `CandidateSet::expand_endpoint` was invoked on a candidate whose
    /// priority is shared with another candidate.
    ///
    /// Expansion relies on the replaced candidate having a unique score so
    /// the expanded endpoints inherit an unambiguous position.
    DuplicateExpansionScore {
        /// Display names of the endpoints sharing the priority
        display_names: Vec<String>,
    },
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildError::UnsetDefaultDestination => {
                write!(f, "A default destination must be set before building a jump table")
            }
            BuildError::UnsetExitDestination => {
                write!(f, "An exit destination must be set before building a jump table")
            }
            BuildError::EmptyRequiredValue { parameter } => {
                write!(
                    f,
                    "The required value for parameter '{}' evaluated to an empty string; \
                    required values must be non-empty literal text",
                    parameter
                )
            }
            BuildError::DuplicateExpansionScore { display_names } => {
                write!(
                    f,
                    "Expanding an endpoint requires that the replaced endpoint have a unique \
                    priority. The following endpoints share the same priority: {}",
                    display_names.join(", ")
                )
            }
        }
    }
}

impl std::error::Error for BuildError {}
