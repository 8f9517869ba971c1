use core::any::{Any, TypeId};
use core::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::{Duration, Instant};

use graft_doc::Node;

use crate::domain::Domain;
use crate::error::BindError;
use crate::hash::HashMap;
use crate::info::TypeInfo;

// -----------------------------------------------------------------------------
// WriteOperation

/// Identity verdict for a shared value encountered during a write.
pub(crate) enum WriteIdentity {
    /// First encounter: write the body and stamp it with this id.
    New(u64),
    /// Seen before: write a reference to this id instead of the body.
    Existing(u64),
}

/// One objects-to-document operation.
///
/// Writes are a plain recursive descent over the value graph; the only
/// per-operation state is the shared-value identity table and a
/// cooperative wall-clock budget. Strategies call [`guard`] at their
/// recursion points, so a runaway graph fails with
/// [`BindError::WriteTimeout`] instead of hanging the caller.
///
/// [`guard`]: WriteOperation::guard
#[derive(Clone)]
pub struct WriteOperation {
    state: Rc<WriteState>,
}

struct WriteState {
    domain: Domain,
    budget: Option<Duration>,
    deadline: Option<Instant>,
    ids: RefCell<HashMap<usize, u64>>,
    next_id: Cell<u64>,
}

impl WriteOperation {
    pub(crate) fn new(domain: Domain, budget: Option<Duration>) -> Self {
        Self {
            state: Rc::new(WriteState {
                domain,
                budget,
                deadline: budget.map(|b| Instant::now() + b),
                ids: RefCell::new(HashMap::default()),
                next_id: Cell::new(1),
            }),
        }
    }

    /// Returns the domain this operation writes against.
    #[inline]
    pub fn domain(&self) -> &Domain {
        &self.state.domain
    }

    /// Checks the wall-clock budget.
    ///
    /// Strategies call this once per node they emit; between checks the
    /// operation never blocks, so the budget overshoot is bounded by one
    /// node's worth of work.
    pub fn guard(&self) -> Result<(), BindError> {
        if let (Some(deadline), Some(budget)) = (self.state.deadline, self.state.budget) {
            if Instant::now() >= deadline {
                return Err(BindError::WriteTimeout { budget });
            }
        }
        Ok(())
    }

    /// Writes one statically typed value as a node named after its type.
    pub fn write<T: Any>(&self, value: &T) -> Result<Node, BindError> {
        let info = self
            .state
            .domain
            .reflect_id(TypeId::of::<T>(), core::any::type_name::<T>())?;
        let name = info.node_name().to_string();
        self.write_value(value, &info, &name)
    }

    /// Writes a batch of values under one identity table, so handles
    /// shared across roots still come out as one body plus references.
    /// Any failure aborts the whole batch.
    pub fn write_all<T: Any>(&self, values: &[&T]) -> Result<Vec<Node>, BindError> {
        values.iter().map(|value| self.write(*value)).collect()
    }

    /// Writes a runtime-typed value as a node with the given name.
    pub(crate) fn write_slot(
        &self,
        value: &dyn Any,
        ty: TypeId,
        ty_name: &'static str,
        name: &str,
    ) -> Result<Node, BindError> {
        let info = self.state.domain.reflect_id(ty, ty_name)?;
        self.write_value(value, &info, name)
    }

    /// Writes a value into a freshly created node with the given name.
    pub fn write_value(
        &self,
        value: &dyn Any,
        info: &TypeInfo,
        name: &str,
    ) -> Result<Node, BindError> {
        let mut node = Node::new(name);
        self.write_into(value, info, &mut node)?;
        Ok(node)
    }

    /// Writes a value into an existing node, chaining the type's
    /// strategies until one handles it.
    pub fn write_into(
        &self,
        value: &dyn Any,
        info: &TypeInfo,
        node: &mut Node,
    ) -> Result<(), BindError> {
        self.guard()?;
        for strategy in info.strategies() {
            if strategy.write(self, value, info, node)? {
                return Ok(());
            }
        }
        Err(BindError::strategy(
            "write",
            info.rust_name(),
            "no strategy handled this value",
        ))
    }

    /// Looks up or assigns the identity of a shared value by its pointee
    /// address.
    pub(crate) fn identity_for(&self, addr: usize) -> WriteIdentity {
        let mut ids = self.state.ids.borrow_mut();
        match ids.get(&addr) {
            Some(&id) => WriteIdentity::Existing(id),
            None => {
                let id = self.state.next_id.get();
                self.state.next_id.set(id + 1);
                ids.insert(addr, id);
                WriteIdentity::New(id)
            }
        }
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Domain;

    #[test]
    fn zero_budget_trips_the_guard() {
        let op = WriteOperation::new(Domain::new(), Some(Duration::ZERO));
        assert!(matches!(op.guard(), Err(BindError::WriteTimeout { .. })));
    }

    #[test]
    fn no_budget_never_trips() {
        let op = WriteOperation::new(Domain::new(), None);
        assert!(op.guard().is_ok());
    }

    #[test]
    fn identity_table_is_first_encounter_wins() {
        let op = WriteOperation::new(Domain::new(), None);
        let WriteIdentity::New(a) = op.identity_for(0x10) else {
            panic!("first encounter must be new");
        };
        let WriteIdentity::Existing(b) = op.identity_for(0x10) else {
            panic!("second encounter must be existing");
        };
        assert_eq!(a, b);
        let WriteIdentity::New(c) = op.identity_for(0x20) else {
            panic!("fresh address must be new");
        };
        assert_ne!(a, c);
    }
}
