use core::any::Any;
use std::sync::Arc;

use graft_doc::Node;

use crate::builder::ObjectBuilder;
use crate::domain::resolver::TagMeaning;
use crate::error::BindError;
use crate::info::{Siblings, TypeInfo};
use crate::op::read::{ReadOperation, SetOutcome};
use crate::op::write::WriteOperation;
use crate::recipe::DelegateFacet;
use crate::strategy::{StrategyKind, TypeStrategy};

// -----------------------------------------------------------------------------
// DelegateStrategy

/// A read-only facade over a mutable counterpart type.
///
/// The document shape is entirely the counterpart's: reading builds the
/// counterpart in place and converts it into the facade once finished,
/// writing projects the facade back onto an owned counterpart first. The
/// conversion may fail, which is how facades with stronger invariants
/// (rectangular grids) reject malformed input.
pub struct DelegateStrategy {
    facet: Arc<DelegateFacet>,
}

impl DelegateStrategy {
    pub(crate) fn new(facet: Arc<DelegateFacet>) -> Self {
        Self { facet }
    }
}

impl TypeStrategy for DelegateStrategy {
    fn name(&self) -> &'static str {
        "delegate"
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::Delegate
    }

    fn late_init(&self, siblings: &Siblings<'_>) {
        // The counterpart owns the document shape; a field table on the
        // facade recipe would fight over the same children.
        siblings.disable(StrategyKind::Props);
    }

    fn wants_build(&self) -> bool {
        true
    }

    fn build(
        &self,
        op: &ReadOperation,
        node: &Node,
        _info: &TypeInfo,
        cell: &ObjectBuilder,
    ) -> Result<(), BindError> {
        let facet = self.facet.clone();
        let cell = cell.clone();
        let op_handle = op.clone();
        op.read_into(
            node,
            self.facet.inner,
            self.facet.inner_rust_name,
            TagMeaning::Suppressed,
            Box::new(move |value| {
                match (facet.wrap)(value) {
                    Ok(wrapped) => cell.set(wrapped),
                    Err(error) => op_handle.report(error),
                }
                SetOutcome::Done
            }),
        )
    }

    fn write(
        &self,
        op: &WriteOperation,
        value: &dyn Any,
        _info: &TypeInfo,
        node: &mut Node,
    ) -> Result<bool, BindError> {
        op.guard()?;
        let inner = (self.facet.project)(value)?;
        let inner_info = op
            .domain()
            .reflect_id(self.facet.inner, self.facet.inner_rust_name)?;
        op.write_into(inner.as_ref(), &inner_info, node)?;
        Ok(true)
    }
}
