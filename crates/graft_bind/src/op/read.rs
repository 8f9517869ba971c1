use core::any::{Any, TypeId};
use core::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use graft_doc::Node;

use crate::builder::{BuilderPhase, ObjectBuilder};
use crate::domain::resolver::TagMeaning;
use crate::domain::Domain;
use crate::error::BindError;
use crate::info::TypeInfo;
use crate::op::{ComponentRead, ErrorSink, ReadComponent, SinkMode, Task, TaskSource};
use crate::strategy::shared::IdentityReader;
use crate::value::Value;

// -----------------------------------------------------------------------------
// Setter

/// What a setter did with a delivered value.
pub enum SetOutcome {
    /// The value was consumed.
    Done,
    /// The assignment target does not exist yet; the value is handed back
    /// and delivery is retried on a later fixpoint pass.
    Retry(Value),
}

/// The pending assignment of one sub-read.
///
/// Every sub-read carries exactly one setter; the engine calls it when the
/// value materializes. A setter may refuse delivery with
/// [`SetOutcome::Retry`] when its own target is not constructed yet, which
/// turns the delivery into a deferred task.
pub type Setter = Box<dyn FnMut(Value) -> SetOutcome>;

// -----------------------------------------------------------------------------
// ReadOperation

/// One document-to-objects operation.
///
/// The operation owns the deferred-task queue, the builder cells of every
/// in-progress value, the cross-cutting components and the error channel.
/// Handles are cheap `Rc` clones; strategies capture them in the closures
/// they register.
///
/// Operations are single-threaded by construction. The [`Domain`] they
/// read against is shared and thread-safe; the per-operation state is not.
#[derive(Clone)]
pub struct ReadOperation {
    state: Rc<ReadState>,
}

struct ReadState {
    domain: Domain,
    sink: ErrorSink,
    tasks: RefCell<Vec<Option<Task>>>,
    cells: RefCell<Vec<ObjectBuilder>>,
    components: Vec<Rc<dyn ReadComponent>>,
    current_root: Cell<Option<usize>>,
}

impl ReadOperation {
    pub(crate) fn new(domain: Domain, mode: SinkMode) -> Self {
        let mut components: Vec<Rc<dyn ReadComponent>> = vec![Rc::new(IdentityReader::new())];
        for module in domain.modules() {
            components.extend(module.read_components().into_iter().map(Rc::from));
        }
        Self {
            state: Rc::new(ReadState {
                domain,
                sink: ErrorSink::new(mode),
                tasks: RefCell::new(Vec::new()),
                cells: RefCell::new(Vec::new()),
                components,
                current_root: Cell::new(None),
            }),
        }
    }

    /// Returns the domain this operation reads against.
    #[inline]
    pub fn domain(&self) -> &Domain {
        &self.state.domain
    }

    // -------------------------------------------------------------------------
    // Entry points

    /// Reads one node as a `T`, driving the fixpoint to completion.
    pub fn read<T: Any>(&self, node: &Node) -> Result<T, BindError> {
        let out: Rc<RefCell<Option<Value>>> = Rc::new(RefCell::new(None));
        let slot = out.clone();
        let outcome = self.read_into(
            node,
            TypeId::of::<T>(),
            core::any::type_name::<T>(),
            TagMeaning::Normal,
            Box::new(move |value| {
                *slot.borrow_mut() = Some(value);
                SetOutcome::Done
            }),
        );
        if let Err(error) = outcome {
            self.report(error);
        }
        self.run_to_fixpoint();
        if let Some(error) = self.state.sink.first() {
            return Err(error);
        }
        let value = out.borrow_mut().take().ok_or_else(|| BindError::Missing {
            label: node.name().to_string(),
        })?;
        downcast_result(value, node)
    }

    /// Reads a batch of root nodes as `T`s with per-root degradation: one
    /// malformed root yields an `Err` in its slot without aborting its
    /// siblings, and values may reference each other across roots.
    pub fn read_all<T: Any>(&self, nodes: &[&Node]) -> Vec<Result<T, BindError>> {
        let outs: Vec<Rc<RefCell<Option<Value>>>> = nodes
            .iter()
            .map(|_| Rc::new(RefCell::new(None)))
            .collect();
        for (root, node) in nodes.iter().enumerate() {
            self.state.current_root.set(Some(root));
            let slot = outs[root].clone();
            let outcome = self.read_into(
                node,
                TypeId::of::<T>(),
                core::any::type_name::<T>(),
                TagMeaning::Normal,
                Box::new(move |value| {
                    *slot.borrow_mut() = Some(value);
                    SetOutcome::Done
                }),
            );
            if let Err(error) = outcome {
                self.report(error);
            }
        }
        self.state.current_root.set(None);
        self.run_to_fixpoint();

        let mut failures: Vec<Option<BindError>> = vec![None; nodes.len()];
        for (root, error) in self.state.sink.take() {
            match root {
                Some(root) => {
                    failures[root].get_or_insert(error);
                }
                // Unattributed errors were already logged when reported.
                None => {}
            }
        }
        nodes
            .iter()
            .zip(outs)
            .zip(&mut failures)
            .map(|((node, out), failure)| {
                if let Some(error) = failure.take() {
                    return Err(error);
                }
                let value = out.borrow_mut().take().ok_or_else(|| BindError::Missing {
                    label: node.name().to_string(),
                })?;
                downcast_result(value, node)
            })
            .collect()
    }

    // -------------------------------------------------------------------------
    // Sub-reads

    /// Schedules one sub-read: resolve the node's dynamic type, try the
    /// immediate strategies, fall back to a deferred build.
    ///
    /// The setter receives the value whenever it materializes, possibly
    /// before this call returns. An `Err` means this sub-read can never
    /// produce a value; the caller decides whether that degrades or
    /// aborts.
    pub fn read_into(
        &self,
        node: &Node,
        expected: TypeId,
        expected_name: &'static str,
        meaning: TagMeaning,
        setter: Setter,
    ) -> Result<(), BindError> {
        let expected_info = self.state.domain.reflect_id(expected, expected_name)?;

        // Cross-cutting components get the node before any strategy.
        for component in &self.state.components {
            match component.claim(self, node, &expected_info)? {
                ComponentRead::NotMine => {}
                ComponentRead::Ready(value) => {
                    let label = label_for(node, &expected_info);
                    self.deliver(setter, value, label);
                    return Ok(());
                }
                ComponentRead::Pending(mut poll) => {
                    let op = self.clone();
                    let label = label_for(node, &expected_info);
                    let mut setter = Some(setter);
                    self.push_task(
                        label.clone(),
                        Box::new(move || match poll()? {
                            Some(value) => {
                                let setter =
                                    setter.take().expect("pending component ran after completion");
                                op.deliver(setter, value, label.clone());
                                Ok(true)
                            }
                            None => Ok(false),
                        }),
                    );
                    return Ok(());
                }
            }
        }

        let resolution = self
            .state
            .domain
            .resolve_dynamic(node, &expected_info, meaning)?;
        let info = resolution.info;
        let node = match resolution.descend {
            Some(index) => &node.children()[index],
            None => node,
        };
        let setter = match resolution.wrap {
            Some(wrap) => self.wrap_setter(setter, wrap, label_for(node, &info)),
            None => setter,
        };

        // Immediate chain: the first strategy producing a value wins.
        for strategy in info.strategies() {
            if let Some(value) = strategy.try_read(self, node, &info)? {
                self.register_components(node, &info, value.as_ref());
                self.deliver(setter, value, label_for(node, &info));
                return Ok(());
            }
        }

        if !info.is_instantiable() {
            return Err(BindError::construction(
                info.rust_name(),
                "abstract type, and the node resolved no concrete variant",
            ));
        }
        if !info.strategies().any(|s| s.wants_build()) {
            return Err(BindError::construction(
                info.rust_name(),
                "no strategy can build this type",
            ));
        }

        // Deferred build: allocate a cell, let every building strategy
        // contribute, then give the freshly registered tasks one immediate
        // pass (most complete right away when their inputs were read
        // synchronously).
        let label = label_for(node, &info);
        let cell = {
            let op = self.clone();
            let node = node.clone();
            let info = info.clone();
            let callback_label = label.clone();
            ObjectBuilder::new(
                label.clone(),
                self.state.current_root.get(),
                Box::new(move |value| {
                    op.register_components(&node, &info, value.as_ref());
                    op.deliver(setter, value, callback_label);
                }),
            )
        };
        self.state.cells.borrow_mut().push(cell.clone());

        let before = self.state.tasks.borrow().len();
        for strategy in info.strategies().filter(|s| s.wants_build()) {
            if let Err(error) = strategy.build(self, node, &info, &cell) {
                // One failed contributor does not stop the others.
                self.report(error);
            }
        }
        self.drain_range_once(before);
        Ok(())
    }

    /// Hands a value to a setter, converting a refused delivery into a
    /// retry task.
    pub(crate) fn deliver(&self, mut setter: Setter, value: Value, label: String) {
        match setter(value) {
            SetOutcome::Done => {}
            SetOutcome::Retry(value) => {
                let mut held = Some(value);
                self.push_task(
                    format!("deliver {label}"),
                    Box::new(move || {
                        let value = held.take().expect("retry task ran after completion");
                        match setter(value) {
                            SetOutcome::Done => Ok(true),
                            SetOutcome::Retry(value) => {
                                held = Some(value);
                                Ok(false)
                            }
                        }
                    }),
                );
            }
        }
    }

    fn wrap_setter(
        &self,
        mut inner: Setter,
        wrap: crate::domain::resolver::WrapFn,
        label: String,
    ) -> Setter {
        let op = self.clone();
        // The wrap conversion runs at most once; a retried delivery comes
        // back already wrapped.
        let mut wrapped = false;
        Box::new(move |value| {
            let value = if wrapped {
                value
            } else {
                match wrap(value) {
                    Ok(value) => {
                        wrapped = true;
                        value
                    }
                    Err(error) => {
                        op.report(BindError::strategy(
                            "dispatch",
                            label.clone(),
                            error.to_string(),
                        ));
                        return SetOutcome::Done;
                    }
                }
            };
            inner(value)
        })
    }

    // -------------------------------------------------------------------------
    // Scheduling

    /// Appends a deferred task attributed to the current batch root.
    pub(crate) fn push_task(
        &self,
        label: impl Into<String>,
        run: Box<dyn FnMut() -> Result<bool, BindError>>,
    ) {
        let source = TaskSource {
            label: label.into(),
            root: self.state.current_root.get(),
        };
        log::trace!("task queued: {}", source.label);
        self.state.tasks.borrow_mut().push(Some(Task { run, source }));
    }

    /// Records an error against the current batch root.
    pub(crate) fn report(&self, error: BindError) {
        self.state.sink.report(self.state.current_root.get(), error);
    }

    fn run_task_at(&self, index: usize) -> bool {
        let Some(mut task) = self.state.tasks.borrow_mut()[index].take() else {
            return false;
        };
        let previous = self.state.current_root.replace(task.source.root);
        let outcome = (task.run)();
        self.state.current_root.set(previous);
        match outcome {
            Ok(true) => true,
            Ok(false) => {
                self.state.tasks.borrow_mut()[index] = Some(task);
                false
            }
            Err(error) => {
                // A failed task is finished; the error is its result.
                self.state.sink.report(task.source.root, error);
                true
            }
        }
    }

    /// Runs every task appended at or after `start` once.
    fn drain_range_once(&self, start: usize) {
        let end = self.state.tasks.borrow().len();
        for index in start..end {
            self.run_task_at(index);
        }
    }

    /// Runs the task queue to its fixpoint.
    ///
    /// Each pass covers the tasks present when the pass began; tasks
    /// appended mid-pass run in the next one. A full pass in which no task
    /// completed, failed or was appended means the remaining values can
    /// never be constructed: the operation reports an unresolvable graph
    /// per batch root and fails the pending cells.
    pub(crate) fn run_to_fixpoint(&self) {
        loop {
            let pass_len = self.state.tasks.borrow().len();
            let mut progressed = false;
            for index in 0..pass_len {
                if self.run_task_at(index) {
                    progressed = true;
                }
            }
            let new_len = self.state.tasks.borrow().len();
            let remaining = self
                .state
                .tasks
                .borrow()
                .iter()
                .filter(|t| t.is_some())
                .count();
            if remaining == 0 {
                break;
            }
            log::debug!("fixpoint pass done, {remaining} tasks remaining");
            if !progressed && new_len == pass_len {
                log::warn!("fixpoint stalled with {remaining} tasks pending");
                self.fail_pending();
                break;
            }
        }
        // Dropping the queues breaks the Rc cycles between the operation
        // handle and the closures that captured it.
        self.state.tasks.borrow_mut().clear();
        self.state.cells.borrow_mut().clear();
    }

    /// Zero-progress exit: report one unresolvable-graph error per batch
    /// root still owning unconstructed cells, then fail those cells.
    fn fail_pending(&self) {
        let mut groups: BTreeMap<Option<usize>, Vec<String>> = BTreeMap::new();
        for cell in self.state.cells.borrow().iter() {
            if cell.phase() == BuilderPhase::Empty {
                groups
                    .entry(cell.root())
                    .or_default()
                    .push(cell.label().to_string());
            }
        }
        if groups.is_empty() {
            // Stalled tasks without a cell of their own (blocked
            // deliveries); attribute by task source instead.
            for task in self.state.tasks.borrow().iter().flatten() {
                groups
                    .entry(task.source.root)
                    .or_default()
                    .push(task.source.label.clone());
            }
        }
        for (root, pending) in groups {
            self.state
                .sink
                .report(root, BindError::IncompleteGraph { pending });
        }
        for cell in self.state.cells.borrow().iter() {
            cell.fail();
        }
    }

    /// Notifies every cross-cutting component of a constructed value.
    pub(crate) fn register_components(&self, node: &Node, info: &TypeInfo, value: &dyn Any) {
        for component in &self.state.components {
            component.register(self, node, info, value);
        }
    }
}

fn label_for(node: &Node, info: &TypeInfo) -> String {
    format!("{} (`{}`)", node.name(), info.rust_name())
}

fn downcast_result<T: Any>(value: Value, node: &Node) -> Result<T, BindError> {
    value.downcast::<T>().map(|b| *b).map_err(|_| {
        BindError::TypeResolution {
            node: node.name().to_string(),
            expected: core::any::type_name::<T>().into(),
            resolved: "a value of another type".into(),
        }
    })
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Domain;

    fn op() -> ReadOperation {
        ReadOperation::new(Domain::new(), SinkMode::Raise)
    }

    #[test]
    fn retry_deliveries_complete_on_a_later_pass() {
        let op = op();
        let done = Rc::new(Cell::new(false));

        let gate = Rc::new(Cell::new(false));
        let gate2 = gate.clone();
        let done2 = done.clone();
        op.deliver(
            Box::new(move |value| {
                if gate2.get() {
                    done2.set(true);
                    SetOutcome::Done
                } else {
                    SetOutcome::Retry(value)
                }
            }),
            Box::new(1_i32),
            "gated".into(),
        );
        assert!(!done.get());

        let gate3 = gate.clone();
        op.push_task("open gate", Box::new(move || {
            gate3.set(true);
            Ok(true)
        }));
        op.run_to_fixpoint();
        assert!(done.get());
        assert!(op.state.sink.first().is_none());
    }

    #[test]
    fn stalled_queue_reports_an_unresolvable_graph() {
        let op = op();
        op.push_task("never ready", Box::new(|| Ok(false)));
        op.run_to_fixpoint();

        let error = op.state.sink.first().expect("stall must be reported");
        assert!(matches!(error, BindError::IncompleteGraph { .. }));
        assert!(error.to_string().contains("never ready"));
    }

    #[test]
    fn failing_task_counts_as_progress() {
        let op = op();
        let runs = Rc::new(Cell::new(0_u32));
        let runs2 = runs.clone();
        op.push_task("second", Box::new(move || {
            // Completes only after the failing sibling is gone.
            runs2.set(runs2.get() + 1);
            Ok(runs2.get() >= 2)
        }));
        op.push_task(
            "first",
            Box::new(|| Err(BindError::Missing { label: "x".into() })),
        );
        op.run_to_fixpoint();

        assert_eq!(runs.get(), 2);
        assert!(matches!(
            op.state.sink.first(),
            Some(BindError::Missing { .. })
        ));
    }
}
