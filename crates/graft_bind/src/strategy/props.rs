use core::any::Any;
use core::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Arc;

use graft_doc::Node;

use crate::builder::ObjectBuilder;
use crate::domain::resolver::TagMeaning;
use crate::error::BindError;
use crate::info::TypeInfo;
use crate::op::read::{ReadOperation, SetOutcome};
use crate::op::write::WriteOperation;
use crate::recipe::StructFacet;
use crate::strategy::{StrategyKind, TypeStrategy};
use crate::value::Value;

// -----------------------------------------------------------------------------
// PropsStrategy

/// Maps child nodes onto bound fields of a struct-like type.
///
/// The build constructs the instance up front, schedules one sub-read per
/// present field and completes the cell from a deferred task once every
/// pending field has been delivered. A field whose sub-read fails keeps
/// its constructor default; the failure is reported, not fatal to the
/// instance.
pub struct PropsStrategy {
    facet: Arc<StructFacet>,
}

impl PropsStrategy {
    pub(crate) fn new(facet: Arc<StructFacet>) -> Self {
        Self { facet }
    }
}

impl TypeStrategy for PropsStrategy {
    fn name(&self) -> &'static str {
        "props"
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::Props
    }

    fn wants_build(&self) -> bool {
        true
    }

    fn build(
        &self,
        op: &ReadOperation,
        node: &Node,
        info: &TypeInfo,
        cell: &ObjectBuilder,
    ) -> Result<(), BindError> {
        let instance: Rc<RefCell<Option<Value>>> =
            Rc::new(RefCell::new(Some((self.facet.ctor)())));
        let pending = Rc::new(Cell::new(0_usize));

        for (index, field) in self.facet.fields.iter().enumerate() {
            let Some(child) = node.child(&field.name) else {
                // Absent field: the constructor default stands.
                continue;
            };
            pending.set(pending.get() + 1);

            let facet = self.facet.clone();
            let instance = instance.clone();
            let pending_done = pending.clone();
            let op_handle = op.clone();
            let setter = Box::new(move |value: Value| {
                let field = &facet.fields[index];
                if let Some(obj) = instance.borrow_mut().as_mut() {
                    if let Err(error) = (field.set)(obj.as_mut(), value) {
                        // The field keeps its default.
                        op_handle.report(error);
                    }
                }
                pending_done.set(pending_done.get() - 1);
                SetOutcome::Done
            });
            if let Err(error) = op.read_into(child, field.ty, field.ty_name, TagMeaning::Suppressed, setter)
            {
                op.report(error);
                pending.set(pending.get() - 1);
            }
        }

        let cell = cell.clone();
        let instance_out = instance;
        let pending_out = pending;
        op.push_task(
            format!("assemble `{}`", info.rust_name()),
            Box::new(move || {
                if pending_out.get() > 0 {
                    return Ok(false);
                }
                let value = instance_out
                    .borrow_mut()
                    .take()
                    .expect("struct instance assembled twice");
                cell.set(value);
                Ok(true)
            }),
        );
        Ok(())
    }

    fn write(
        &self,
        op: &WriteOperation,
        value: &dyn Any,
        _info: &TypeInfo,
        node: &mut Node,
    ) -> Result<bool, BindError> {
        op.guard()?;
        for field in &self.facet.fields {
            let child = op.write_slot((field.get)(value), field.ty, field.ty_name, &field.name)?;
            node.push_child(child);
        }
        Ok(true)
    }
}
