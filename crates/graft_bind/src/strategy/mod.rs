//! The pluggable per-type strategies.
//!
//! A [`TypeStrategy`] is one way of handling a type: read and write via a
//! property map, via collection hooks, via reference identity, via raw
//! text. A type's [`TypeInfo`](crate::TypeInfo) owns an ordered list of
//! strategies; dispatch is chain-of-responsibility for the immediate-read
//! and write hooks (first success wins) and all-contribute for the build
//! hook (building an object is the union of several concerns).

use core::any::Any;

use graft_doc::Node;

use crate::builder::ObjectBuilder;
use crate::error::BindError;
use crate::info::{Siblings, TypeInfo};
use crate::op::read::ReadOperation;
use crate::op::write::WriteOperation;
use crate::value::Value;

// -----------------------------------------------------------------------------
// Modules

pub(crate) mod collection;
pub(crate) mod delegate;
pub(crate) mod dispatch;
pub(crate) mod optional;
pub(crate) mod props;
pub(crate) mod shared;
pub(crate) mod text;

// -----------------------------------------------------------------------------
// Exports

pub use collection::{MapStrategy, SequenceStrategy};
pub use delegate::DelegateStrategy;
pub use dispatch::DispatchStrategy;
pub use optional::OptionStrategy;
pub use props::PropsStrategy;
pub use shared::{IdentityReader, SharedStrategy};
pub use text::TextStrategy;

// -----------------------------------------------------------------------------
// StrategyKind

/// Coarse classification of a strategy, used by siblings during late
/// initialization to find and disable each other.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StrategyKind {
    /// Whole-value text codec.
    Text,
    /// Property-mapping (struct field) strategy.
    Props,
    /// Sequence half of the collection codec.
    Sequence,
    /// Map half of the collection codec.
    Map,
    /// Reference-identity strategy for shared handles.
    Shared,
    /// Polymorphic base dispatch.
    Dispatch,
    /// Read-only facade delegating to a mutable counterpart.
    Delegate,
    /// Optional-value strategy.
    Optional,
    /// Anything user-supplied.
    Custom,
}

// -----------------------------------------------------------------------------
// TypeStrategy

/// A polymorphic unit implementing up to four hooks for one type.
///
/// Strategies are owned by exactly one [`TypeInfo`] and stateless across
/// operations: they may hold configuration (an item node name, a facet
/// handle) but never per-call state. Per-call state lives in the operation
/// and in the closures a strategy registers with it.
pub trait TypeStrategy: Send + Sync + 'static {
    /// Diagnostic name, used in task sources and error messages.
    fn name(&self) -> &'static str;

    /// Classification used during late initialization.
    fn kind(&self) -> StrategyKind {
        StrategyKind::Custom
    }

    /// Second initialization phase: the strategy may consult what its
    /// siblings registered and disable itself or them. This is the only
    /// moment the enabled flags may change.
    fn late_init(&self, _siblings: &Siblings<'_>) {}

    /// Attempts to produce a value synchronously from the node alone.
    ///
    /// Returns `Ok(None)` to pass the node on to the next strategy. The
    /// first strategy returning `Ok(Some(..))` wins the chain.
    fn try_read(
        &self,
        _op: &ReadOperation,
        _node: &Node,
        _info: &TypeInfo,
    ) -> Result<Option<Value>, BindError> {
        Ok(None)
    }

    /// Returns `true` if this strategy participates in deferred builds.
    fn wants_build(&self) -> bool {
        false
    }

    /// Contributes to a deferred build of the node's value.
    ///
    /// Unlike the other hooks this is not a chain: every enabled strategy
    /// that wants to build is invoked, because constructing an object is
    /// typically the union of several concerns. Implementations read
    /// nested nodes through `op` and/or register deferred tasks that
    /// eventually assign `cell`.
    fn build(
        &self,
        _op: &ReadOperation,
        _node: &Node,
        _info: &TypeInfo,
        _cell: &ObjectBuilder,
    ) -> Result<(), BindError> {
        Ok(())
    }

    /// Writes a value into the given (freshly created) node.
    ///
    /// Returns `Ok(true)` if the value was handled, stopping the chain.
    fn write(
        &self,
        _op: &WriteOperation,
        _value: &dyn Any,
        _info: &TypeInfo,
        _node: &mut Node,
    ) -> Result<bool, BindError> {
        Ok(false)
    }
}
