//! End-to-end coverage of the binding engine: registration through
//! reading, writing and the deferred-task fixpoint.

use core::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use graft_doc::Node;

use crate::bindings;
use crate::collections::{BoundedArray, Grid};
use crate::error::BindError;
use crate::Domain;

// -----------------------------------------------------------------------------
// Fixtures

#[derive(Default, Debug, PartialEq)]
struct Save {
    tick: u64,
    notes: Vec<String>,
}

fn save_domain() -> Domain {
    let domain = Domain::new();
    domain.register(bindings::list::<String>("Notes"));
    domain.register(
        bindings::strukt::<Save>("Save")
            .field("tick", |s: &Save| &s.tick, |s, v| s.tick = v)
            .field("notes", |s: &Save| &s.notes, |s, v| s.notes = v)
            .finish(),
    );
    domain
}

#[derive(Default, Debug)]
struct Tracker {
    label: String,
}

#[derive(Default)]
struct Roster {
    active: Rc<RefCell<Tracker>>,
    all: Vec<Rc<RefCell<Tracker>>>,
}

fn roster_domain() -> Domain {
    let domain = Domain::new();
    domain.register(
        bindings::strukt::<Tracker>("Tracker")
            .field("label", |t: &Tracker| &t.label, |t, v| t.label = v)
            .finish(),
    );
    domain.register(bindings::shared::<Tracker>("TrackerRef"));
    domain.register(bindings::list::<Rc<RefCell<Tracker>>>("TrackerList"));
    domain.register(
        bindings::strukt::<Roster>("Roster")
            .field("active", |r: &Roster| &r.active, |r, v| r.active = v)
            .field("all", |r: &Roster| &r.all, |r, v| r.all = v)
            .finish(),
    );
    domain
}

// -----------------------------------------------------------------------------
// Structs and primitives

#[test]
fn struct_round_trip() {
    let domain = save_domain();
    let save = Save {
        tick: 42,
        notes: vec!["alpha".into(), "beta".into()],
    };

    let node = domain.write(&save).unwrap();
    assert_eq!(node.name(), "Save");
    assert_eq!(node.child("tick").unwrap().text(), "42");

    assert_eq!(domain.read::<Save>(&node).unwrap(), save);
}

#[test]
fn absent_field_keeps_its_default() {
    let domain = save_domain();
    let mut node = Node::new("Save");
    node.push_child(Node::with_text("tick", "7"));

    let save = domain.read::<Save>(&node).unwrap();
    assert_eq!(save.tick, 7);
    assert!(save.notes.is_empty());
}

#[test]
fn malformed_field_raises_on_single_read() {
    let domain = save_domain();
    let mut node = Node::new("Save");
    node.push_child(Node::with_text("tick", "not a number"));

    assert!(matches!(
        domain.read::<Save>(&node),
        Err(BindError::Text { .. })
    ));
}

#[test]
fn node_named_after_an_incompatible_type_is_rejected() {
    let domain = Domain::new();
    let node = Node::with_text("string", "5");

    assert!(matches!(
        domain.read::<i32>(&node),
        Err(BindError::TypeResolution { .. })
    ));
}

#[test]
fn writing_an_unregistered_type_fails() {
    struct Mystery;
    let domain = Domain::new();

    assert!(matches!(
        domain.write(&Mystery),
        Err(BindError::Unregistered { .. })
    ));
}

// -----------------------------------------------------------------------------
// Collections

#[test]
fn list_preserves_document_order() {
    let domain = Domain::new();
    domain.register(bindings::list::<i32>("Numbers"));

    let mut node = Node::new("Numbers");
    for n in [3, 1, 2] {
        node.push_child(Node::with_text("li", n.to_string()));
    }
    assert_eq!(domain.read::<Vec<i32>>(&node).unwrap(), vec![3, 1, 2]);
}

#[test]
fn map_duplicate_keys_keep_the_last_value() {
    let domain = Domain::new();
    domain.register(bindings::btree_map_of::<String, i32>("Scores"));

    let mut node = Node::new("Scores");
    for (key, value) in [("a", 1), ("b", 2), ("a", 3)] {
        let mut entry = Node::new("li");
        entry.push_child(Node::with_text("Key", key));
        entry.push_child(Node::with_text("Value", value.to_string()));
        node.push_child(entry);
    }

    let map = domain
        .read::<std::collections::BTreeMap<String, i32>>(&node)
        .unwrap();
    assert_eq!(map.len(), 2);
    assert_eq!(map["a"], 3);
    assert_eq!(map["b"], 2);
}

#[test]
fn map_round_trip() {
    let domain = Domain::new();
    domain.register(bindings::btree_map_of::<String, i32>("Scores"));

    let mut map = std::collections::BTreeMap::new();
    map.insert("x".to_string(), 10);
    map.insert("y".to_string(), 20);

    let node = domain.write(&map).unwrap();
    assert_eq!(node.children_named("li").count(), 2);
    assert_eq!(
        domain
            .read::<std::collections::BTreeMap<String, i32>>(&node)
            .unwrap(),
        map
    );
}

#[derive(Default, Debug, PartialEq)]
struct IntStack {
    items: Vec<i32>,
}

#[test]
fn stack_round_trip_restores_insertion_order() {
    let domain = Domain::new();
    domain.register(
        bindings::seq_with::<IntStack, i32>(
            "IntStack",
            IntStack::default,
            |stack, item| {
                stack.items.push(item);
                Ok(())
            },
            // Natural iteration is top-first, reverse insertion order.
            |stack, f| {
                for item in stack.items.iter().rev() {
                    f(item)?;
                }
                Ok(())
            },
            |stack| stack.items.len(),
        )
        .reversed()
        .finish(),
    );

    let stack = IntStack {
        items: vec![1, 2, 3],
    };
    let node = domain.write(&stack).unwrap();
    // Document order is bottom-first, so pushing in document order
    // restores the stack.
    assert_eq!(node.children()[0].text(), "1");
    assert_eq!(domain.read::<IntStack>(&node).unwrap(), stack);
}

#[test]
fn bounded_array_keeps_its_lower_bound() {
    let domain = Domain::new();
    domain.register(bindings::bounded_array::<i32>("Offsets"));

    let mut array = BoundedArray::with_lower_bound(5);
    array.push(10);
    array.push(20);

    let node = domain.write(&array).unwrap();
    assert_eq!(node.attr("lb"), Some("5"));

    let back = domain.read::<BoundedArray<i32>>(&node).unwrap();
    assert_eq!(back, array);
    assert_eq!(back.get(6), Some(&20));
}

#[test]
fn bounded_array_defaults_to_zero_without_the_attribute() {
    let domain = Domain::new();
    domain.register(bindings::bounded_array::<i32>("Offsets"));

    let mut node = Node::new("Offsets");
    node.push_child(Node::with_text("li", "9"));

    let back = domain.read::<BoundedArray<i32>>(&node).unwrap();
    assert_eq!(back.lower_bound(), 0);
    assert_eq!(back.get(0), Some(&9));
}

#[test]
fn grid_round_trip() {
    let domain = Domain::new();
    domain.register(bindings::grid::<i32>("Board"));

    let grid = Grid::from_rows(vec![vec![1, 2, 3], vec![4, 5, 6]]).unwrap();
    let node = domain.write(&grid).unwrap();
    assert_eq!(node.children_named("li").count(), 2);

    assert_eq!(domain.read::<Grid<i32>>(&node).unwrap(), grid);
}

#[test]
fn ragged_grid_fails_construction() {
    let domain = Domain::new();
    domain.register(bindings::grid::<i32>("Board"));

    let mut node = Node::new("Board");
    for row in [vec![1, 2], vec![3]] {
        let mut row_node = Node::new("li");
        for item in row {
            row_node.push_child(Node::with_text("li", item.to_string()));
        }
        node.push_child(row_node);
    }

    assert!(matches!(
        domain.read::<Grid<i32>>(&node),
        Err(BindError::Strategy { .. })
    ));
}

#[test]
fn boxed_slice_round_trip() {
    let domain = Domain::new();
    domain.register(bindings::boxed_slice::<String>("Words"));

    let words: Box<[String]> = vec!["a".to_string(), "b".to_string()].into_boxed_slice();
    let node = domain.write(&words).unwrap();
    assert_eq!(domain.read::<Box<[String]>>(&node).unwrap(), words);
}

// -----------------------------------------------------------------------------
// Shared identity

#[test]
fn shared_handles_write_one_body_and_reference_it() {
    let domain = roster_domain();
    let tracker = Rc::new(RefCell::new(Tracker {
        label: "alpha".into(),
    }));
    let roster = Roster {
        active: tracker.clone(),
        all: vec![tracker],
    };

    let node = domain.write(&roster).unwrap();
    // First encounter carries the body and the id.
    let active = node.child("active").unwrap();
    assert!(active.attr("id").is_some());
    assert_eq!(active.child("label").unwrap().text(), "alpha");
    // Second encounter is a bare reference.
    let item = node.child("all").unwrap().child("li").unwrap();
    assert_eq!(item.attr("ref"), active.attr("id"));
    assert!(item.children().is_empty());

    let back = domain.read::<Roster>(&node).unwrap();
    assert!(Rc::ptr_eq(&back.active, &back.all[0]));
    assert_eq!(back.active.borrow().label, "alpha");
}

#[test]
fn batch_writes_share_one_identity_table() {
    let domain = roster_domain();
    let tracker = Rc::new(RefCell::new(Tracker {
        label: "alpha".into(),
    }));

    let nodes = domain.write_all(&[&tracker.clone(), &tracker]).unwrap();
    assert_eq!(nodes.len(), 2);
    // The body lands in the first root; the second is a cross-root
    // reference to it.
    assert!(nodes[0].attr("id").is_some());
    assert_eq!(nodes[0].child("label").unwrap().text(), "alpha");
    assert_eq!(nodes[1].attr("ref"), nodes[0].attr("id"));
    assert!(nodes[1].children().is_empty());

    let back = domain.read_all::<Rc<RefCell<Tracker>>>(&[&nodes[0], &nodes[1]]);
    let first = back[0].as_ref().unwrap();
    let second = back[1].as_ref().unwrap();
    assert!(Rc::ptr_eq(first, second));
}

#[test]
fn forward_references_resolve_across_the_fixpoint() {
    let domain = roster_domain();

    // The reference appears before the body that defines it.
    let mut node = Node::new("Roster");
    let mut active = Node::new("active");
    active.set_attr("ref", "1");
    node.push_child(active);
    let mut all = Node::new("all");
    let mut item = Node::new("li");
    item.set_attr("id", "1");
    item.push_child(Node::with_text("label", "alpha"));
    all.push_child(item);
    node.push_child(all);

    let roster = domain.read::<Roster>(&node).unwrap();
    assert!(Rc::ptr_eq(&roster.active, &roster.all[0]));
    assert_eq!(roster.active.borrow().label, "alpha");
}

#[test]
fn late_resolving_items_keep_their_list_position() {
    let domain = roster_domain();

    // Index 0 is a reference whose body only appears at index 1, so the
    // first slot can only be filled on a later fixpoint pass.
    let mut node = Node::new("TrackerList");
    let mut first = Node::new("li");
    first.set_attr("ref", "9");
    node.push_child(first);
    let mut second = Node::new("li");
    second.set_attr("id", "9");
    second.push_child(Node::with_text("label", "alpha"));
    node.push_child(second);

    let list = domain.read::<Vec<Rc<RefCell<Tracker>>>>(&node).unwrap();
    assert_eq!(list.len(), 2);
    assert!(Rc::ptr_eq(&list[0], &list[1]));
    assert_eq!(list[0].borrow().label, "alpha");
}

#[derive(Default)]
struct Buddy {
    name: String,
    friend: Option<Rc<RefCell<Buddy>>>,
}

#[test]
fn a_reference_cycle_is_an_unresolvable_graph() {
    let domain = Domain::new();
    domain.register(bindings::shared::<Buddy>("BuddyRef"));
    domain.register(bindings::option::<Rc<RefCell<Buddy>>>("MaybeBuddy"));
    domain.register(
        bindings::strukt::<Buddy>("Buddy")
            .field("name", |b: &Buddy| &b.name, |b, v| b.name = v)
            .field("friend", |b: &Buddy| &b.friend, |b, v| b.friend = v)
            .finish(),
    );

    // The body cannot finish until the reference resolves, and the
    // reference cannot resolve until the body finishes.
    let mut node = Node::new("BuddyRef");
    node.set_attr("id", "1");
    node.push_child(Node::with_text("name", "ouroboros"));
    let mut friend = Node::new("friend");
    friend.set_attr("ref", "1");
    node.push_child(friend);

    assert!(matches!(
        domain.read::<Rc<RefCell<Buddy>>>(&node),
        Err(BindError::IncompleteGraph { .. })
    ));
}

// -----------------------------------------------------------------------------
// Polymorphism

#[derive(Default, Debug, PartialEq, Clone)]
struct Circle {
    radius: f64,
}

#[derive(Default, Debug, PartialEq, Clone)]
struct Rect {
    width: f64,
    height: f64,
}

#[derive(Debug, PartialEq, Clone)]
enum Shape {
    Circle(Circle),
    Rect(Rect),
}

fn shape_domain() -> Domain {
    shape_domain_with(Domain::new())
}

fn shape_domain_with(domain: Domain) -> Domain {
    domain.register(
        bindings::strukt::<Circle>("Circle")
            .field("radius", |c: &Circle| &c.radius, |c, v| c.radius = v)
            .finish(),
    );
    domain.register(
        bindings::strukt::<Rect>("Rect")
            .field("width", |r: &Rect| &r.width, |r, v| r.width = v)
            .field("height", |r: &Rect| &r.height, |r, v| r.height = v)
            .finish(),
    );
    domain.register(
        bindings::base::<Shape>("Shape")
            .variant::<Circle>(Shape::Circle, |shape| match shape {
                Shape::Circle(c) => Some(c),
                _ => None,
            })
            .variant::<Rect>(Shape::Rect, |shape| match shape {
                Shape::Rect(r) => Some(r),
                _ => None,
            })
            .finish(),
    );
    domain.register(
        bindings::StructBinder::with_ctor("Canvas", || Canvas {
            shape: Shape::Circle(Circle::default()),
        })
        .field("shape", |c: &Canvas| &c.shape, |c, v| c.shape = v)
        .finish(),
    );
    domain
}

#[derive(Debug, PartialEq, Clone)]
struct Canvas {
    shape: Shape,
}

#[test]
fn base_values_are_stored_wrapped() {
    let domain = shape_domain();
    let canvas = Canvas {
        shape: Shape::Rect(Rect {
            width: 3.0,
            height: 4.0,
        }),
    };

    let node = domain.write(&canvas).unwrap();
    // The field node wraps a single child named after the concrete type.
    let shape = node.child("shape").unwrap();
    assert_eq!(shape.children().len(), 1);
    assert_eq!(shape.children()[0].name(), "Rect");

    assert_eq!(domain.read::<Canvas>(&node).unwrap(), canvas);
}

#[test]
fn a_top_level_base_round_trips() {
    let domain = shape_domain();
    let shape = Shape::Circle(Circle { radius: 2.0 });

    // The root is the base's own node wrapping the concrete variant.
    let node = domain.write(&shape).unwrap();
    assert_eq!(node.name(), "Shape");
    assert_eq!(node.children().len(), 1);
    assert_eq!(node.children()[0].name(), "Circle");

    assert_eq!(domain.read::<Shape>(&node).unwrap(), shape);

    let batch = domain.read_all::<Shape>(&[&node, &node]);
    assert_eq!(batch[0].as_ref().unwrap(), &shape);
    assert_eq!(batch[1].as_ref().unwrap(), &shape);
}

#[test]
fn a_variant_node_reads_directly_as_the_base() {
    let domain = shape_domain();
    let mut node = Node::new("Circle");
    node.push_child(Node::with_text("radius", "2.5"));

    let shape = domain.read::<Shape>(&node).unwrap();
    assert_eq!(shape, Shape::Circle(Circle { radius: 2.5 }));
}

#[test]
fn single_child_unwrapping_can_be_disabled() {
    let domain = shape_domain_with(Domain::builder().unwrap_single_child(false).finish());
    let canvas = Canvas {
        shape: Shape::Circle(Circle { radius: 1.0 }),
    };

    let node = domain.write(&canvas).unwrap();
    assert!(matches!(
        domain.read::<Canvas>(&node),
        Err(BindError::Construction { .. })
    ));
}

#[test]
fn unwrapped_sequences_name_items_after_their_type() {
    let domain = shape_domain();
    domain.register(
        bindings::seq_with::<Vec<Circle>, Circle>(
            "Circles",
            Vec::new,
            |items, item| {
                items.push(item);
                Ok(())
            },
            |items, f| {
                for item in items {
                    f(item)?;
                }
                Ok(())
            },
            Vec::len,
        )
        .unwrapped()
        .finish(),
    );

    let circles = vec![Circle { radius: 1.0 }, Circle { radius: 2.0 }];
    let node = domain.write(&circles).unwrap();
    assert_eq!(node.children().len(), 2);
    assert!(node.children().iter().all(|c| c.name() == "Circle"));

    assert_eq!(domain.read::<Vec<Circle>>(&node).unwrap(), circles);
}

// -----------------------------------------------------------------------------
// Options

#[derive(Default, Debug, PartialEq)]
struct Memo {
    note: Option<String>,
}

fn memo_domain() -> Domain {
    let domain = Domain::new();
    domain.register(bindings::option::<String>("MaybeNote"));
    domain.register(
        bindings::strukt::<Memo>("Memo")
            .field("note", |m: &Memo| &m.note, |m, v| m.note = v)
            .finish(),
    );
    domain
}

#[test]
fn present_option_round_trips_in_place() {
    let domain = memo_domain();
    let memo = Memo {
        note: Some("remember".into()),
    };

    let node = domain.write(&memo).unwrap();
    assert_eq!(node.child("note").unwrap().text(), "remember");
    assert_eq!(domain.read::<Memo>(&node).unwrap(), memo);
}

#[test]
fn absent_option_round_trips_as_a_marker() {
    let domain = memo_domain();
    let memo = Memo { note: None };

    let node = domain.write(&memo).unwrap();
    assert!(node.child("note").unwrap().attr("null").is_some());
    assert_eq!(domain.read::<Memo>(&node).unwrap(), memo);
}

// -----------------------------------------------------------------------------
// Batch reads and budgets

#[test]
fn batch_reads_degrade_per_root() {
    let domain = Domain::new();
    let bad = Node::with_text("i32", "banana");
    let good = Node::with_text("i32", "7");

    let results = domain.read_all::<i32>(&[&bad, &good]);
    assert!(matches!(results[0], Err(BindError::Text { .. })));
    assert_eq!(*results[1].as_ref().unwrap(), 7);
}

#[test]
fn zero_write_budget_times_out() {
    let domain = Domain::new();
    domain.register(bindings::list::<i32>("Numbers"));

    assert!(matches!(
        domain.write_with_budget(&vec![1, 2, 3], Some(Duration::ZERO)),
        Err(BindError::WriteTimeout { .. })
    ));
}
