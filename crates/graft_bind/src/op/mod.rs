//! The execution engine: per-operation scheduling state for reads and
//! writes.
//!
//! A read is a fixpoint computation. Strategies that cannot produce a
//! value synchronously register deferred tasks; the operation keeps
//! re-running the task queue until every pending value is constructed or a
//! full pass makes no progress. A write is a plain recursive descent with
//! a cooperative wall-clock budget.

use core::any::Any;
use core::cell::RefCell;

use graft_doc::Node;

use crate::error::BindError;
use crate::info::TypeInfo;
use crate::value::Value;

pub(crate) mod read;
pub(crate) mod write;

pub use read::{ReadOperation, SetOutcome, Setter};
pub use write::WriteOperation;

// -----------------------------------------------------------------------------
// Tasks

/// Origin of a deferred task, kept for diagnostics and batch attribution.
pub(crate) struct TaskSource {
    /// Human-readable description of what the task is waiting to do.
    pub(crate) label: String,
    /// Index of the batch root this task works for, if the operation is a
    /// batch read.
    pub(crate) root: Option<usize>,
}

/// One deferred unit of work in a read operation.
///
/// The closure returns `Ok(true)` when the task has completed and must be
/// dropped, `Ok(false)` when it is still blocked and must run again on the
/// next pass. An `Err` removes the task and reports the error.
pub(crate) struct Task {
    pub(crate) run: Box<dyn FnMut() -> Result<bool, BindError>>,
    pub(crate) source: TaskSource,
}

// -----------------------------------------------------------------------------
// ErrorSink

/// How a read operation surfaces errors.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum SinkMode {
    /// Single-value read: the first recorded error fails the operation.
    Raise,
    /// Batch read: errors are attributed to their batch root and returned
    /// per root, sibling roots keep going.
    Collect,
}

/// Error accumulator of one read operation.
///
/// Every failure flows through here exactly once, tagged with the batch
/// root it belongs to (if known) and logged as it arrives.
pub(crate) struct ErrorSink {
    mode: SinkMode,
    errors: RefCell<Vec<(Option<usize>, BindError)>>,
}

impl ErrorSink {
    pub(crate) fn new(mode: SinkMode) -> Self {
        Self {
            mode,
            errors: RefCell::new(Vec::new()),
        }
    }

    /// Records one error against the given batch root.
    pub(crate) fn report(&self, root: Option<usize>, error: BindError) {
        // Collected errors are part of a batch result the caller may
        // tolerate; raised errors surface anyway, so log them quieter.
        match (self.mode, root) {
            (SinkMode::Collect, Some(root)) => log::warn!("read error (root {root}): {error}"),
            (SinkMode::Collect, None) => log::warn!("read error: {error}"),
            (SinkMode::Raise, _) => log::debug!("read error: {error}"),
        }
        self.errors.borrow_mut().push((root, error));
    }

    /// Returns the first recorded error, cloning it out.
    pub(crate) fn first(&self) -> Option<BindError> {
        self.errors.borrow().first().map(|(_, e)| e.clone())
    }

    /// Drains all recorded errors.
    pub(crate) fn take(&self) -> Vec<(Option<usize>, BindError)> {
        core::mem::take(&mut *self.errors.borrow_mut())
    }
}

// -----------------------------------------------------------------------------
// Read components

/// Outcome of offering a node to a cross-cutting read component.
pub enum ComponentRead {
    /// The component does not handle this node.
    NotMine,
    /// The component produced the value immediately.
    Ready(Value),
    /// The component will produce the value later. The poll closure is run
    /// once per fixpoint pass until it yields a value.
    Pending(Box<dyn FnMut() -> Result<Option<Value>, BindError>>),
}

/// A cross-cutting read concern consulted before per-type strategies.
///
/// Components see every sub-read of an operation: they may claim a node
/// outright (reference resolution does this for `ref` nodes) and they are
/// told about every value the operation constructs (reference resolution
/// records values carrying an `id`).
pub trait ReadComponent {
    /// Diagnostic name.
    fn name(&self) -> &'static str;

    /// Offers a node to the component before strategy dispatch.
    fn claim(
        &self,
        op: &ReadOperation,
        node: &Node,
        info: &TypeInfo,
    ) -> Result<ComponentRead, BindError>;

    /// Notifies the component of a constructed value and the node it came
    /// from.
    fn register(&self, op: &ReadOperation, node: &Node, info: &TypeInfo, value: &dyn Any);
}
