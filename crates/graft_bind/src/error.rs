use std::borrow::Cow;
use std::time::Duration;

use thiserror::Error;

// -----------------------------------------------------------------------------
// BindError

/// An enumeration of all error outcomes of a read or write operation.
///
/// Read-side failures are recoverable at the sub-read granularity: a
/// malformed element degrades to an error for that element's value and
/// does not abort sibling elements of a batch
/// [`read_all`](crate::ReadOperation::read_all). Write-side failures abort
/// the whole operation.
#[derive(Debug, Clone, Error)]
pub enum BindError {
    /// A node's dynamic type could not be determined, or resolved to a
    /// type that is not assignable to the expected type.
    #[error(
        "node `{node}` resolved to `{resolved}`, which is not assignable to the expected type `{expected}`"
    )]
    TypeResolution {
        /// Name of the offending node.
        node: String,
        /// Rust name of the expected type.
        expected: Cow<'static, str>,
        /// Rust name of the incompatible resolved type.
        resolved: Cow<'static, str>,
    },

    /// The resolved type cannot be instantiated.
    #[error("type `{type_name}` cannot be instantiated: {reason}")]
    Construction {
        /// Rust name of the type.
        type_name: Cow<'static, str>,
        /// Why instantiation is impossible.
        reason: Cow<'static, str>,
    },

    /// The deferred-task fixpoint made a full pass with zero progress
    /// while values were still pending: an unbroken reference cycle or
    /// malformed input.
    #[error("unresolvable dependencies, {} value(s) never constructed: {}", pending.len(), pending.join(", "))]
    IncompleteGraph {
        /// Diagnostic labels of every still-unconstructed builder cell.
        pending: Vec<String>,
    },

    /// A write operation exceeded its cooperative wall-clock budget.
    #[error("write operation exceeded its budget of {budget:?}")]
    WriteTimeout {
        /// The configured budget.
        budget: Duration,
    },

    /// Text content could not be parsed as the target type.
    #[error("cannot parse `{text}` as `{type_name}`: {reason}")]
    Text {
        /// Rust name of the target type.
        type_name: Cow<'static, str>,
        /// The offending text.
        text: String,
        /// Parser message.
        reason: String,
    },

    /// A strategy failed internally, e.g. a collection rejected an item.
    #[error("strategy `{strategy}` failed on `{type_name}`: {reason}")]
    Strategy {
        /// Diagnostic name of the strategy.
        strategy: &'static str,
        /// Rust name of the type being handled.
        type_name: Cow<'static, str>,
        /// What went wrong.
        reason: String,
    },

    /// The type has no recipe registered in this domain.
    #[error("type `{type_name}` is not registered in this domain")]
    Unregistered {
        /// Rust name of the type, when statically known.
        type_name: Cow<'static, str>,
    },

    /// The operation finished without producing a value and without
    /// recording a more specific error.
    #[error("no value was produced for `{label}`")]
    Missing {
        /// Diagnostic label of the missing value.
        label: String,
    },
}

impl BindError {
    /// Shorthand for a [`BindError::Strategy`] value.
    pub fn strategy(
        strategy: &'static str,
        type_name: impl Into<Cow<'static, str>>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Strategy {
            strategy,
            type_name: type_name.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for a [`BindError::Construction`] value.
    pub fn construction(
        type_name: impl Into<Cow<'static, str>>,
        reason: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::Construction {
            type_name: type_name.into(),
            reason: reason.into(),
        }
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use super::BindError;

    #[test]
    fn display_names_every_pending_cell() {
        let err = BindError::IncompleteGraph {
            pending: vec!["a (`A`)".into(), "b (`B`)".into()],
        };
        let text = err.to_string();
        assert!(text.contains("2 value(s)"));
        assert!(text.contains("a (`A`)"));
        assert!(text.contains("b (`B`)"));
    }
}
