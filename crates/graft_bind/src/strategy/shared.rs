use core::any::Any;
use core::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use graft_doc::Node;

use crate::builder::ObjectBuilder;
use crate::domain::resolver::TagMeaning;
use crate::error::BindError;
use crate::hash::HashMap;
use crate::info::TypeInfo;
use crate::op::read::{ReadOperation, SetOutcome};
use crate::op::write::{WriteIdentity, WriteOperation};
use crate::op::{ComponentRead, ReadComponent};
use crate::recipe::SharedFacet;
use crate::strategy::{StrategyKind, TypeStrategy};
use crate::value::Value;

// -----------------------------------------------------------------------------
// SharedStrategy

/// Reference identity for shared handles such as `Rc<RefCell<T>>`.
///
/// On write, the first encounter of a pointee emits its body stamped with
/// an `id` attribute; every later encounter emits only a `ref` attribute.
/// On read, the body is read in place and the handle is registered under
/// its id the moment it is constructed, so references elsewhere in the
/// document (including ones read earlier) resolve to the same handle.
pub struct SharedStrategy {
    facet: Arc<SharedFacet>,
}

impl SharedStrategy {
    pub(crate) fn new(facet: Arc<SharedFacet>) -> Self {
        Self { facet }
    }
}

impl TypeStrategy for SharedStrategy {
    fn name(&self) -> &'static str {
        "shared"
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::Shared
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
        op.read_into(
            node,
            self.facet.inner,
            self.facet.inner_rust_name,
            TagMeaning::Suppressed,
            Box::new(move |value| {
                cell.set((facet.wrap)(value));
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
        let markers = op.domain().markers();
        match op.identity_for((self.facet.addr)(value)) {
            WriteIdentity::Existing(id) => {
                node.set_attr(markers.reference.clone(), id.to_string());
            }
            WriteIdentity::New(id) => {
                node.set_attr(markers.id.clone(), id.to_string());
                let inner_info = op
                    .domain()
                    .reflect_id(self.facet.inner, self.facet.inner_rust_name)?;
                (self.facet.with_inner)(value, &mut |inner| {
                    op.write_into(inner, &inner_info, node)
                })?;
            }
        }
        Ok(true)
    }
}

// -----------------------------------------------------------------------------
// IdentityReader

struct StoredShared {
    facet: Arc<SharedFacet>,
    handle: Value,
}

/// The cross-cutting component behind reference resolution.
///
/// Claims any node carrying a `ref` attribute when the expected type is a
/// shared handle, answering with a pending poll against the identity
/// table. The table is fed by [`register`](ReadComponent::register):
/// every constructed value whose type has a [`SharedFacet`] and whose node
/// carries an `id` is stored as a cloned handle.
///
/// Forward references therefore resolve on a later fixpoint pass, while a
/// mutual cycle of shared bodies never completes and surfaces as an
/// unresolvable graph.
pub struct IdentityReader {
    table: Rc<RefCell<HashMap<String, StoredShared>>>,
}

impl IdentityReader {
    pub(crate) fn new() -> Self {
        Self {
            table: Rc::new(RefCell::new(HashMap::default())),
        }
    }
}

impl ReadComponent for IdentityReader {
    fn name(&self) -> &'static str {
        "identity"
    }

    fn claim(
        &self,
        op: &ReadOperation,
        node: &Node,
        info: &TypeInfo,
    ) -> Result<ComponentRead, BindError> {
        if info.facet::<SharedFacet>().is_none() {
            return Ok(ComponentRead::NotMine);
        }
        let Some(id) = node.attr(&op.domain().markers().reference) else {
            return Ok(ComponentRead::NotMine);
        };
        let id = id.to_string();
        let table = self.table.clone();
        Ok(ComponentRead::Pending(Box::new(move || {
            let table = table.borrow();
            Ok(table
                .get(&id)
                .map(|stored| (stored.facet.clone_ref)(stored.handle.as_ref())))
        })))
    }

    fn register(&self, op: &ReadOperation, node: &Node, info: &TypeInfo, value: &dyn Any) {
        let Some(facet) = info.facet::<SharedFacet>() else {
            return;
        };
        let Some(id) = node.attr(&op.domain().markers().id) else {
            return;
        };
        let handle = (facet.clone_ref)(value);
        self.table
            .borrow_mut()
            .entry(id.to_string())
            .or_insert(StoredShared { facet, handle });
    }
}
