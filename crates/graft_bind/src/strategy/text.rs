use core::any::Any;
use std::sync::Arc;

use graft_doc::Node;

use crate::error::BindError;
use crate::info::TypeInfo;
use crate::op::read::ReadOperation;
use crate::op::write::WriteOperation;
use crate::recipe::TextFacet;
use crate::strategy::{StrategyKind, TypeStrategy};
use crate::value::Value;

// -----------------------------------------------------------------------------
// TextStrategy

/// Reads and writes a whole value through the node's text payload.
///
/// Always synchronous: a text value never has unresolved dependencies, so
/// the immediate-read hook is the only one implemented.
pub struct TextStrategy {
    facet: Arc<TextFacet>,
}

impl TextStrategy {
    pub(crate) fn new(facet: Arc<TextFacet>) -> Self {
        Self { facet }
    }
}

impl TypeStrategy for TextStrategy {
    fn name(&self) -> &'static str {
        "text"
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::Text
    }

    fn try_read(
        &self,
        _op: &ReadOperation,
        node: &Node,
        _info: &TypeInfo,
    ) -> Result<Option<Value>, BindError> {
        (self.facet.from_text)(node.text()).map(Some)
    }

    fn write(
        &self,
        op: &WriteOperation,
        value: &dyn Any,
        _info: &TypeInfo,
        node: &mut Node,
    ) -> Result<bool, BindError> {
        op.guard()?;
        node.set_text((self.facet.to_text)(value)?);
        Ok(true)
    }
}
