use core::any::Any;
use std::sync::Arc;

use graft_doc::Node;

use crate::error::BindError;
use crate::info::TypeInfo;
use crate::op::write::WriteOperation;
use crate::recipe::BaseFacet;
use crate::strategy::{StrategyKind, TypeStrategy};

// -----------------------------------------------------------------------------
// DispatchStrategy

/// The write half of polymorphic base handling.
///
/// Peeks which registered variant the base value holds and writes the
/// concrete value as a single child named after its type, the wrapped
/// storage form. The read half lives in dynamic resolution: a node read
/// as the base resolves a variant either by its own name or through
/// single-child unwrapping, and the delivered value is converted back
/// into the base representation before assignment.
pub struct DispatchStrategy {
    facet: Arc<BaseFacet>,
}

impl DispatchStrategy {
    pub(crate) fn new(facet: Arc<BaseFacet>) -> Self {
        Self { facet }
    }
}

impl TypeStrategy for DispatchStrategy {
    fn name(&self) -> &'static str {
        "dispatch"
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::Dispatch
    }

    fn write(
        &self,
        op: &WriteOperation,
        value: &dyn Any,
        info: &TypeInfo,
        node: &mut Node,
    ) -> Result<bool, BindError> {
        op.guard()?;
        for variant in &self.facet.variants {
            let Some(concrete) = (variant.peek)(value) else {
                continue;
            };
            let concrete_info = op
                .domain()
                .reflect_id(variant.concrete, variant.concrete_rust_name)?;
            let child = op.write_value(concrete, &concrete_info, concrete_info.node_name())?;
            node.push_child(child);
            return Ok(true);
        }
        Err(BindError::strategy(
            "dispatch",
            info.rust_name().to_string(),
            "value holds no registered variant",
        ))
    }
}
