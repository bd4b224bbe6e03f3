//! Error types for Rabt container operations.
//!
//! Every failure names the contracts involved by type, and resolution
//! failures say where in the graph they happened.

use std::fmt;

use rabt_support::rendering::render_chain;

use crate::key::ContractKey;

/// Boxed error returned by user code (factories, disposers).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Main error type for all Rabt operations.
#[derive(Debug, thiserror::Error)]
pub enum RabtError {
    /// A required contract has no registration.
    #[error("{}", .0)]
    NotRegistered(NotRegisteredError),

    /// A resolution path came back to a contract it was already resolving.
    #[error("{}", .0)]
    CircularDependency(CircularDependencyError),

    /// A descriptor could not be built.
    #[error("{}", .0)]
    InvalidDescriptor(InvalidDescriptorError),

    /// A factory or activator failed, or produced the wrong type.
    #[error("Failed to construct {key}: {source}")]
    ConstructionFailed {
        key: ContractKey,
        #[source]
        source: BoxError,
    },

    /// The resolution chain grew past [`ProviderOptions::max_resolution_depth`](crate::options::ProviderOptions).
    #[error("Resolving {key} exceeded the maximum resolution depth of {limit}")]
    DepthExceeded { key: ContractKey, limit: usize },

    /// The scope or provider was already disposed.
    #[error("Cannot resolve {key}: the {owner} has been disposed")]
    ScopeDisposed {
        key: ContractKey,
        owner: &'static str,
    },

    /// One or more instances failed to release their resources.
    #[error("{}", .0)]
    DisposalFailed(DisposalError),
}

impl RabtError {
    /// Wraps a user error raised while constructing `key`.
    pub fn construction(key: ContractKey, source: impl Into<BoxError>) -> Self {
        RabtError::ConstructionFailed {
            key,
            source: source.into(),
        }
    }

    /// Records `consumer` as the contract that needed a missing dependency.
    ///
    /// Only the innermost consumer is kept.
    pub(crate) fn required_by(self, consumer: ContractKey) -> Self {
        match self {
            RabtError::NotRegistered(mut err) if err.required_by.is_none() => {
                err.required_by = Some(consumer);
                RabtError::NotRegistered(err)
            }
            other => other,
        }
    }
}

/// A required contract was never registered.
#[derive(Debug)]
pub struct NotRegisteredError {
    /// The contract that was requested.
    pub requested: ContractKey,
    /// The contract whose construction asked for it, if any.
    pub required_by: Option<ContractKey>,
    /// Registered contracts with similar names.
    pub suggestions: Vec<ContractKey>,
}

impl fmt::Display for NotRegisteredError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Service not registered: {}", self.requested)?;

        if let Some(consumer) = &self.required_by {
            write!(f, "\n  Required by: {consumer}")?;
        }

        if !self.suggestions.is_empty() {
            write!(f, "\n  Did you mean one of:")?;
            for suggestion in &self.suggestions {
                write!(f, "\n    - {suggestion}")?;
            }
        }

        write!(
            f,
            "\n  Hint: add a descriptor for {} to the collection before building the provider",
            self.requested.short_name()
        )
    }
}

/// A cycle found while resolving.
#[derive(Debug)]
pub struct CircularDependencyError {
    /// The cycle, starting and ending with the same contract.
    /// Example: `[X, Y, X]`
    pub chain: Vec<ContractKey>,
}

impl fmt::Display for CircularDependencyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.chain.iter().map(ContractKey::short_name).collect();
        write!(f, "Circular dependency detected:\n  {}", render_chain(&names))?;
        write!(
            f,
            "\n  Hint: one of these services must stop requiring the next one while it is being constructed"
        )
    }
}

/// Why a descriptor was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidDescriptorReason {
    /// None of implementation type, instance or factory was given.
    MissingStrategy,
    /// More than one strategy was given; lists them in the order supplied.
    ConflictingStrategies(Vec<&'static str>),
    /// The instance's runtime type is not the contract type.
    InstanceTypeMismatch,
}

impl fmt::Display for InvalidDescriptorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidDescriptorReason::MissingStrategy => {
                f.write_str("no implementation type, instance or factory was supplied")
            }
            InvalidDescriptorReason::ConflictingStrategies(kinds) => {
                write!(f, "exactly one strategy is allowed, got {}", kinds.join(" + "))
            }
            InvalidDescriptorReason::InstanceTypeMismatch => {
                f.write_str("the instance is not of the contract type")
            }
        }
    }
}

#[derive(Debug)]
pub struct InvalidDescriptorError {
    pub contract: ContractKey,
    pub reason: InvalidDescriptorReason,
}

impl fmt::Display for InvalidDescriptorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid descriptor for {}: {}", self.contract, self.reason)
    }
}

/// One instance that failed to dispose.
#[derive(Debug)]
pub struct DisposalFailure {
    pub contract: ContractKey,
    pub source: BoxError,
}

/// Every failure collected during a single teardown.
#[derive(Debug)]
pub struct DisposalError {
    pub failures: Vec<DisposalFailure>,
}

impl DisposalError {
    /// `Ok(())` when nothing failed.
    pub(crate) fn check(failures: Vec<DisposalFailure>) -> Result<()> {
        if failures.is_empty() {
            Ok(())
        } else {
            Err(RabtError::DisposalFailed(DisposalError { failures }))
        }
    }
}

impl fmt::Display for DisposalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} instance(s) failed to dispose:", self.failures.len())?;
        for failure in &self.failures {
            write!(f, "\n  - {}: {}", failure.contract, failure.source)?;
        }
        Ok(())
    }
}

/// Convenient Result type for Rabt operations.
pub type Result<T> = std::result::Result<T, RabtError>;
