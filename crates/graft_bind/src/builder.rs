use core::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::value::Value;

// -----------------------------------------------------------------------------
// ObjectBuilder

/// The lifecycle of a builder cell.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BuilderPhase {
    /// No value has been assigned yet.
    Empty,
    /// The value was assigned and handed to the completion callback.
    Constructed,
    /// The owning operation gave up on this cell (zero-progress fixpoint).
    Failed,
}

/// A single-assignment slot for one in-progress value.
///
/// The engine allocates a cell whenever a strategy cannot produce a value
/// synchronously. Strategies (and the deferred tasks they register)
/// eventually call [`set`](ObjectBuilder::set) exactly once; the completion
/// callback installed by the engine then registers the value with
/// cross-cutting components and delivers it to the pending assignment.
///
/// Cells are cheap `Rc` handles; cloning shares the same slot.
///
/// # Panics
///
/// Assigning a value twice panics. This is deliberate fail-fast behavior:
/// two strategies believing they both own construction of the same value
/// is a programming error, not an input error.
#[derive(Clone)]
pub struct ObjectBuilder {
    inner: Rc<BuilderInner>,
}

struct BuilderInner {
    label: String,
    root: Option<usize>,
    phase: Cell<BuilderPhase>,
    on_constructed: RefCell<Option<Box<dyn FnOnce(Value)>>>,
}

impl ObjectBuilder {
    /// Creates an empty cell with a diagnostic label and a one-shot
    /// completion callback.
    pub(crate) fn new(
        label: String,
        root: Option<usize>,
        on_constructed: Box<dyn FnOnce(Value)>,
    ) -> Self {
        Self {
            inner: Rc::new(BuilderInner {
                label,
                root,
                phase: Cell::new(BuilderPhase::Empty),
                on_constructed: RefCell::new(Some(on_constructed)),
            }),
        }
    }

    /// Returns the current lifecycle phase.
    #[inline]
    pub fn phase(&self) -> BuilderPhase {
        self.inner.phase.get()
    }

    /// Returns `true` once a value has been assigned.
    #[inline]
    pub fn is_constructed(&self) -> bool {
        self.inner.phase.get() == BuilderPhase::Constructed
    }

    /// Returns the diagnostic label of this cell.
    #[inline]
    pub fn label(&self) -> &str {
        &self.inner.label
    }

    /// Returns the batch-root index this cell belongs to, if any.
    #[inline]
    pub(crate) fn root(&self) -> Option<usize> {
        self.inner.root
    }

    /// Assigns the cell's value, firing the completion callback.
    ///
    /// # Panics
    ///
    /// Panics if the cell was already constructed or failed.
    pub fn set(&self, value: Value) {
        match self.inner.phase.get() {
            BuilderPhase::Empty => {}
            phase => panic!(
                "builder cell `{}` assigned twice (phase {phase:?})",
                self.inner.label
            ),
        }
        // Flip the phase before invoking the callback so that reentrant
        // inspection observes a constructed cell.
        self.inner.phase.set(BuilderPhase::Constructed);
        let callback = self
            .inner
            .on_constructed
            .borrow_mut()
            .take()
            .unwrap_or_else(|| panic!("builder cell `{}` lost its callback", self.inner.label));
        callback(value);
    }

    /// Marks an unconstructed cell as permanently failed and drops its
    /// callback, releasing anything it captured.
    pub(crate) fn fail(&self) {
        if self.inner.phase.get() == BuilderPhase::Empty {
            self.inner.phase.set(BuilderPhase::Failed);
            self.inner.on_constructed.borrow_mut().take();
        }
    }
}

impl core::fmt::Debug for ObjectBuilder {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ObjectBuilder")
            .field("label", &self.inner.label)
            .field("phase", &self.inner.phase.get())
            .finish()
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;

    fn cell_with_flag() -> (ObjectBuilder, Rc<Cell<Option<i32>>>) {
        let seen = Rc::new(Cell::new(None));
        let seen2 = seen.clone();
        let cell = ObjectBuilder::new(
            "test".into(),
            None,
            Box::new(move |v| seen2.set(Some(*v.downcast::<i32>().unwrap()))),
        );
        (cell, seen)
    }

    #[test]
    fn callback_fires_exactly_at_assignment() {
        let (cell, seen) = cell_with_flag();
        assert!(!cell.is_constructed());
        assert_eq!(seen.get(), None);

        cell.set(Box::new(7_i32));
        assert!(cell.is_constructed());
        assert_eq!(seen.get(), Some(7));
    }

    #[test]
    #[should_panic(expected = "assigned twice")]
    fn double_assignment_panics() {
        let (cell, _seen) = cell_with_flag();
        cell.set(Box::new(1_i32));
        cell.set(Box::new(2_i32));
    }

    #[test]
    fn failed_cell_drops_callback() {
        let (cell, seen) = cell_with_flag();
        cell.fail();
        assert_eq!(cell.phase(), BuilderPhase::Failed);
        assert_eq!(seen.get(), None);
    }
}
