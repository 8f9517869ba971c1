use core::any::Any;
use std::sync::Arc;

use graft_doc::Node;

use crate::builder::ObjectBuilder;
use crate::domain::resolver::TagMeaning;
use crate::error::BindError;
use crate::info::TypeInfo;
use crate::op::read::{ReadOperation, SetOutcome};
use crate::op::write::WriteOperation;
use crate::recipe::OptionFacet;
use crate::strategy::{StrategyKind, TypeStrategy};
use crate::value::Value;

// -----------------------------------------------------------------------------
// OptionStrategy

/// `Option<T>`-shaped values.
///
/// An absent value is a marker attribute on an otherwise empty node, so
/// it is distinguishable from a present-but-empty inner value. A present
/// value is stored in place, with no extra nesting.
pub struct OptionStrategy {
    facet: Arc<OptionFacet>,
}

impl OptionStrategy {
    pub(crate) fn new(facet: Arc<OptionFacet>) -> Self {
        Self { facet }
    }
}

impl TypeStrategy for OptionStrategy {
    fn name(&self) -> &'static str {
        "option"
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::Optional
    }

    fn try_read(
        &self,
        op: &ReadOperation,
        node: &Node,
        _info: &TypeInfo,
    ) -> Result<Option<Value>, BindError> {
        if node.attr(&op.domain().markers().null).is_some() {
            return Ok(Some((self.facet.none)()));
        }
        Ok(None)
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
                match (facet.some)(value) {
                    Ok(some) => cell.set(some),
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
        match (self.facet.peek)(value) {
            None => {
                node.set_attr(op.domain().markers().null.clone(), "true");
            }
            Some(inner) => {
                let inner_info = op
                    .domain()
                    .reflect_id(self.facet.inner, self.facet.inner_rust_name)?;
                op.write_into(inner, &inner_info, node)?;
            }
        }
        Ok(true)
    }
}
