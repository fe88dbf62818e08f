//! Composition and construction errors.
//!
//! Every error is raised synchronously by the call that detects it:
//! composition errors surface when a template is built, construction errors
//! at the specific instantiation call. Nothing is retried or suppressed, and a
//! failed instantiation leaves no partial tree behind.
//!
//! # Error Categories
//!
//! - **Resolution**: [`Error::LookupFailure`]
//! - **Routing**: [`Error::AmbiguousOverride`], [`Error::UnknownArgument`], [`Error::MissingArgument`]
//! - **Declaration**: [`Error::InvalidSpec`]
//! - **Invocation**: [`Error::Forward`]

use thiserror::Error;

/// Crate result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while composing templates, resolving variables or
/// constructing instances.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum Error {
    /// No candidate (name, context) pair resolved and no default exists.
    ///
    /// `candidates` lists every name attempted, in try order.
    #[error("no value was found for {}", format_candidates(.candidates))]
    LookupFailure {
        /// Candidate names tried, in order.
        candidates: Vec<String>,
    },

    /// An explicit override or an unprefixed keyword argument matches more
    /// than one sub-component.
    #[error("argument '{name}' is claimed by several sub-components: {}", claimants.join(", "))]
    AmbiguousOverride {
        /// The ambiguous argument name.
        name: String,
        /// Dotted paths of the claiming sub-components.
        claimants: Vec<String>,
    },

    /// A keyword argument was supplied that no sub-component declares.
    #[error("unknown argument '{argument}' provided for '{component}'")]
    UnknownArgument {
        /// Sub-component (or template) that received the argument.
        component: String,
        /// The offending keyword.
        argument: String,
    },

    /// A required leaf parameter received no value.
    #[error("missing required argument '{argument}' for '{component}'")]
    MissingArgument {
        /// Sub-component being constructed.
        component: String,
        /// The parameter left without a value.
        argument: String,
    },

    /// Inconsistent or malformed declarative specification.
    #[error("invalid specification: {0}")]
    InvalidSpec(String),

    /// A constructed tree could not be invoked on its input.
    #[error("forward failed in '{component}': {message}")]
    Forward {
        /// Node that failed.
        component: String,
        /// Description of the failure.
        message: String,
    },
}

impl Error {
    /// Shorthand for [`Error::InvalidSpec`].
    pub fn invalid(message: impl Into<String>) -> Self {
        Error::InvalidSpec(message.into())
    }

    /// Returns true for [`Error::LookupFailure`].
    pub fn is_lookup_failure(&self) -> bool {
        matches!(self, Error::LookupFailure { .. })
    }
}

fn format_candidates(candidates: &[String]) -> String {
    candidates
        .iter()
        .map(|c| format!("\"{c}\""))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_failure_names_every_candidate() {
        let error = Error::LookupFailure {
            candidates: vec!["conv_width".into(), "width".into()],
        };
        assert_eq!(
            error.to_string(),
            "no value was found for \"conv_width\", \"width\""
        );
        assert!(error.is_lookup_failure());
    }

    #[test]
    fn test_ambiguous_override_lists_claimants() {
        let error = Error::AmbiguousOverride {
            name: "in_channels".into(),
            claimants: vec!["conv1".into(), "conv2".into()],
        };
        assert!(error.to_string().contains("conv1, conv2"));
    }
}
