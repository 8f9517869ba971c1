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
use crate::recipe::{BoundsFacet, MapFacet, SeqFacet};
use crate::strategy::{StrategyKind, TypeStrategy};
use crate::value::Value;

// -----------------------------------------------------------------------------
// Slot

/// The state of one item position while a collection materializes.
///
/// Items are added to the accumulator strictly in document order, so a
/// delivered value parks in its slot until every earlier position is
/// ready. `Pending` is the placeholder that keeps the positions stable.
enum Slot {
    /// The item's sub-read has not delivered yet.
    Pending,
    /// The item's value is parked here, waiting for its turn.
    Ready(Value),
    /// The value was moved into the accumulator, or the item's sub-read
    /// failed and the position is skipped.
    Taken,
}

// -----------------------------------------------------------------------------
// SequenceStrategy

/// The sequence half of the collection codec.
///
/// Builds a container by scheduling one sub-read per item node and one
/// cursor task that advances over the contiguous prefix of ready slots,
/// preserving document order even when later items materialize first.
pub struct SequenceStrategy {
    facet: Arc<SeqFacet>,
}

impl SequenceStrategy {
    pub(crate) fn new(facet: Arc<SeqFacet>) -> Self {
        Self { facet }
    }

    fn item_name(&self, op_markers_item: &str) -> String {
        self.facet
            .item_node
            .clone()
            .unwrap_or_else(|| op_markers_item.to_string())
    }
}

impl TypeStrategy for SequenceStrategy {
    fn name(&self) -> &'static str {
        "sequence"
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::Sequence
    }

    fn late_init(&self, siblings: &crate::info::Siblings<'_>) {
        // A type that is text or a shared handle is not also a node-per-item
        // collection, whatever facets its recipe accumulated.
        if siblings.has_enabled(StrategyKind::Text) || siblings.has_enabled(StrategyKind::Shared) {
            siblings.disable_self();
        }
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
        let item_name = self.item_name(&op.domain().markers().item);
        let items: Vec<&Node> = if self.facet.unwrapped {
            node.children().iter().collect()
        } else {
            node.children_named(&item_name).collect()
        };
        let meaning = if self.facet.unwrapped {
            TagMeaning::Normal
        } else {
            TagMeaning::Suppressed
        };
        let count = items.len();
        let slots: Rc<RefCell<Vec<Slot>>> =
            Rc::new(RefCell::new((0..count).map(|_| Slot::Pending).collect()));

        for (index, item) in items.into_iter().enumerate() {
            let slots_handle = slots.clone();
            let setter = Box::new(move |value: Value| {
                slots_handle.borrow_mut()[index] = Slot::Ready(value);
                SetOutcome::Done
            });
            if let Err(error) =
                op.read_into(item, self.facet.item, self.facet.item_rust_name, meaning, setter)
            {
                // Degrade to skipping this position.
                op.report(error);
                slots.borrow_mut()[index] = Slot::Taken;
            }
        }

        let accumulator: Rc<RefCell<Option<Value>>> =
            Rc::new(RefCell::new(Some((self.facet.new)())));
        if let Some(bounds) = info.facet::<BoundsFacet>() {
            if let Some(raw) = node.attr(&op.domain().markers().lower_bound) {
                match raw.parse::<i64>() {
                    Ok(lower) => {
                        let mut acc = accumulator.borrow_mut();
                        (bounds.set)(acc.as_mut().expect("accumulator taken early").as_mut(), lower);
                    }
                    Err(error) => op.report(BindError::Text {
                        type_name: info.rust_name().into(),
                        text: raw.to_string(),
                        reason: error.to_string(),
                    }),
                }
            }
        }

        let facet = self.facet.clone();
        let cell = cell.clone();
        let cursor = Cell::new(0_usize);
        let op_handle = op.clone();
        op.push_task(
            format!("collect `{}`", info.rust_name()),
            Box::new(move || {
                {
                    let mut slots = slots.borrow_mut();
                    while cursor.get() < count {
                        let index = cursor.get();
                        match core::mem::replace(&mut slots[index], Slot::Taken) {
                            Slot::Pending => {
                                slots[index] = Slot::Pending;
                                return Ok(false);
                            }
                            Slot::Taken => cursor.set(index + 1),
                            Slot::Ready(value) => {
                                let mut acc = accumulator.borrow_mut();
                                let target = acc.as_mut().expect("accumulator taken early");
                                if let Err(error) = (facet.add)(target.as_mut(), value) {
                                    op_handle.report(error);
                                }
                                cursor.set(index + 1);
                            }
                        }
                    }
                }
                // Borrows are released before completion: the cell's
                // callback may re-enter the operation.
                let value = accumulator
                    .borrow_mut()
                    .take()
                    .expect("collection assembled twice");
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
        info: &TypeInfo,
        node: &mut Node,
    ) -> Result<bool, BindError> {
        op.guard()?;
        let markers = op.domain().markers();
        if let Some(bounds) = info.facet::<BoundsFacet>() {
            let lower = (bounds.get)(value);
            if lower != 0 {
                node.set_attr(markers.lower_bound.clone(), lower.to_string());
            }
        }
        let item_name = if self.facet.unwrapped {
            op.domain()
                .reflect_id(self.facet.item, self.facet.item_rust_name)?
                .node_name()
                .to_string()
        } else {
            self.item_name(&markers.item)
        };

        let mut children = Vec::with_capacity((self.facet.len)(value));
        (self.facet.each)(value, &mut |item| {
            op.guard()?;
            children.push(op.write_slot(
                item,
                self.facet.item,
                self.facet.item_rust_name,
                &item_name,
            )?);
            Ok(())
        })?;
        if self.facet.reversed {
            // Natural iteration yields reverse insertion order; flip it so
            // a re-read restores the original order.
            children.reverse();
        }
        for child in children {
            node.push_child(child);
        }
        Ok(true)
    }
}

// -----------------------------------------------------------------------------
// MapStrategy

/// The map half of the collection codec.
///
/// Each entry node carries a key child and a value child; an entry only
/// reaches the accumulator once both halves are ready, and entries are
/// inserted in document order.
pub struct MapStrategy {
    facet: Arc<MapFacet>,
}

impl MapStrategy {
    pub(crate) fn new(facet: Arc<MapFacet>) -> Self {
        Self { facet }
    }
}

impl TypeStrategy for MapStrategy {
    fn name(&self) -> &'static str {
        "map"
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::Map
    }

    fn late_init(&self, siblings: &crate::info::Siblings<'_>) {
        if siblings.has_enabled(StrategyKind::Text) || siblings.has_enabled(StrategyKind::Shared) {
            siblings.disable_self();
        }
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
        let markers = op.domain().markers().clone();
        let entries: Vec<&Node> = node.children_named(&markers.item).collect();
        let count = entries.len();
        let slots: Rc<RefCell<Vec<(Slot, Slot)>>> = Rc::new(RefCell::new(
            (0..count).map(|_| (Slot::Pending, Slot::Pending)).collect(),
        ));

        for (index, entry) in entries.into_iter().enumerate() {
            let mut schedule_half = |half_node: Option<&Node>,
                                     ty,
                                     ty_name,
                                     pick: fn(&mut (Slot, Slot)) -> &mut Slot,
                                     what: &str| {
                let Some(half_node) = half_node else {
                    op.report(BindError::strategy(
                        "map",
                        info.rust_name().to_string(),
                        format!("entry {index} has no {what} child"),
                    ));
                    *pick(&mut slots.borrow_mut()[index]) = Slot::Taken;
                    return;
                };
                let slots_handle = slots.clone();
                let setter = Box::new(move |value: Value| {
                    *pick(&mut slots_handle.borrow_mut()[index]) = Slot::Ready(value);
                    SetOutcome::Done
                });
                if let Err(error) =
                    op.read_into(half_node, ty, ty_name, TagMeaning::Suppressed, setter)
                {
                    op.report(error);
                    *pick(&mut slots.borrow_mut()[index]) = Slot::Taken;
                }
            };
            schedule_half(
                entry.child(&markers.key),
                self.facet.key,
                self.facet.key_rust_name,
                |pair| &mut pair.0,
                "key",
            );
            schedule_half(
                entry.child(&markers.value),
                self.facet.val,
                self.facet.val_rust_name,
                |pair| &mut pair.1,
                "value",
            );
        }

        let accumulator: Rc<RefCell<Option<Value>>> =
            Rc::new(RefCell::new(Some((self.facet.new)())));
        let facet = self.facet.clone();
        let cell = cell.clone();
        let cursor = Cell::new(0_usize);
        let op_handle = op.clone();
        op.push_task(
            format!("collect `{}`", info.rust_name()),
            Box::new(move || {
                {
                    let mut slots = slots.borrow_mut();
                    while cursor.get() < count {
                        let index = cursor.get();
                        let pair = &mut slots[index];
                        if matches!(pair.0, Slot::Pending) || matches!(pair.1, Slot::Pending) {
                            return Ok(false);
                        }
                        let key = core::mem::replace(&mut pair.0, Slot::Taken);
                        let value = core::mem::replace(&mut pair.1, Slot::Taken);
                        if let (Slot::Ready(key), Slot::Ready(value)) = (key, value) {
                            let mut acc = accumulator.borrow_mut();
                            let target = acc.as_mut().expect("accumulator taken early");
                            if let Err(error) = (facet.insert)(target.as_mut(), key, value) {
                                op_handle.report(error);
                            }
                        }
                        // A half that failed was already reported; skip
                        // the entry.
                        cursor.set(index + 1);
                    }
                }
                let value = accumulator
                    .borrow_mut()
                    .take()
                    .expect("map assembled twice");
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
        let markers = op.domain().markers().clone();
        let mut entries = Vec::with_capacity((self.facet.len)(value));
        (self.facet.each)(value, &mut |key, val| {
            op.guard()?;
            let mut entry = Node::new(markers.item.clone());
            entry.push_child(op.write_slot(
                key,
                self.facet.key,
                self.facet.key_rust_name,
                &markers.key,
            )?);
            entry.push_child(op.write_slot(
                val,
                self.facet.val,
                self.facet.val_rust_name,
                &markers.value,
            )?);
            entries.push(entry);
            Ok(())
        })?;
        for entry in entries {
            node.push_child(entry);
        }
        Ok(true)
    }
}
