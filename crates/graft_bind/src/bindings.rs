//! Recipe constructors: the public vocabulary for describing types to a
//! [`Domain`](crate::Domain).
//!
//! Rust has no runtime field discovery, so each constructor here captures
//! the monomorphized glue (constructors, field accessors, collection
//! hooks) into the type-erased facets the standard strategies run on.
//!
//! # Examples
//!
//! ```
//! use graft_bind::{bindings, Domain};
//!
//! #[derive(Default, PartialEq, Debug)]
//! struct Point {
//!     x: f64,
//!     y: f64,
//! }
//!
//! let domain = Domain::new();
//! domain.register(
//!     bindings::strukt::<Point>("Point")
//!         .field("x", |p: &Point| &p.x, |p, v| p.x = v)
//!         .field("y", |p: &Point| &p.y, |p, v| p.y = v)
//!         .finish(),
//! );
//!
//! let node = domain.write(&Point { x: 1.5, y: -2.0 }).unwrap();
//! assert_eq!(domain.read::<Point>(&node).unwrap(), Point { x: 1.5, y: -2.0 });
//! ```

use core::any::{Any, TypeId};
use core::cell::RefCell;
use core::fmt::Display;
use core::hash::Hash;
use core::marker::PhantomData;
use core::str::FromStr;
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;
use std::sync::Arc;

use crate::collections::{BoundedArray, Grid};
use crate::error::BindError;
use crate::recipe::{
    BaseFacet, BaseVariant, BoundsFacet, DelegateFacet, FieldBinding, MapFacet, OptionFacet,
    SeqFacet, SharedFacet, StructFacet, TextFacet, TypeRecipe,
};
use crate::value::{cast_mut, cast_ref, Value};

fn wrong_value<T>(strategy: &'static str) -> BindError {
    BindError::strategy(
        strategy,
        core::any::type_name::<T>(),
        "received a value of the wrong type",
    )
}

// -----------------------------------------------------------------------------
// Text

/// Binds a type that round-trips through its `Display`/`FromStr` forms.
pub fn text<T>(node_name: impl Into<String>) -> TypeRecipe
where
    T: Any + FromStr + Display,
    <T as FromStr>::Err: Display,
{
    text_with::<T>(
        node_name,
        |value| Ok(value.to_string()),
        |text| {
            text.parse::<T>().map_err(|e| BindError::Text {
                type_name: core::any::type_name::<T>().into(),
                text: text.to_string(),
                reason: e.to_string(),
            })
        },
    )
}

/// Binds a type with an explicit text codec.
pub fn text_with<T: Any>(
    node_name: impl Into<String>,
    to_text: impl Fn(&T) -> Result<String, BindError> + Send + Sync + 'static,
    from_text: impl Fn(&str) -> Result<T, BindError> + Send + Sync + 'static,
) -> TypeRecipe {
    TypeRecipe::new::<T>(node_name).with_facet(TextFacet {
        to_text: Box::new(move |value| to_text(cast_ref::<T>(value))),
        from_text: Box::new(move |text| from_text(text).map(|v| Box::new(v) as Value)),
    })
}

// -----------------------------------------------------------------------------
// Structs

/// Starts binding a struct-like type with a `Default` constructor.
pub fn strukt<T: Any + Default>(node_name: impl Into<String>) -> StructBinder<T> {
    StructBinder::with_ctor(node_name, T::default)
}

/// Field-by-field binder for struct-like types.
pub struct StructBinder<T> {
    node_name: String,
    ctor: Box<dyn Fn() -> Value + Send + Sync>,
    fields: Vec<FieldBinding>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Any> StructBinder<T> {
    /// Starts binding with an explicit constructor. Fields absent from the
    /// document keep whatever the constructor put there.
    pub fn with_ctor(
        node_name: impl Into<String>,
        ctor: impl Fn() -> T + Send + Sync + 'static,
    ) -> Self {
        Self {
            node_name: node_name.into(),
            ctor: Box::new(move || Box::new(ctor()) as Value),
            fields: Vec::new(),
            _marker: PhantomData,
        }
    }

    /// Binds one field under the given child-node name.
    pub fn field<F: Any>(
        mut self,
        name: impl Into<String>,
        get: impl for<'a> Fn(&'a T) -> &'a F + Send + Sync + 'static,
        set: impl Fn(&mut T, F) + Send + Sync + 'static,
    ) -> Self {
        self.fields.push(FieldBinding {
            name: name.into(),
            ty: TypeId::of::<F>(),
            ty_name: core::any::type_name::<F>(),
            get: Box::new(move |obj| get(cast_ref::<T>(obj)) as &dyn Any),
            set: Box::new(move |obj, value| {
                let value = value.downcast::<F>().map_err(|_| wrong_value::<T>("props"))?;
                set(cast_mut::<T>(obj), *value);
                Ok(())
            }),
        });
        self
    }

    /// Finishes into a registrable recipe.
    pub fn finish(self) -> TypeRecipe {
        TypeRecipe::new::<T>(self.node_name).with_facet(StructFacet {
            ctor: self.ctor,
            fields: self.fields,
        })
    }
}

// -----------------------------------------------------------------------------
// Sequences

fn vec_facet<T: Any>() -> SeqFacet {
    SeqFacet {
        item: TypeId::of::<T>(),
        item_rust_name: core::any::type_name::<T>(),
        new: Box::new(|| Box::new(Vec::<T>::new()) as Value),
        add: Box::new(|coll, value| {
            let value = value.downcast::<T>().map_err(|_| wrong_value::<Vec<T>>("sequence"))?;
            cast_mut::<Vec<T>>(coll).push(*value);
            Ok(())
        }),
        each: Box::new(|coll, f| {
            for item in cast_ref::<Vec<T>>(coll) {
                f(item)?;
            }
            Ok(())
        }),
        len: Box::new(|coll| cast_ref::<Vec<T>>(coll).len()),
        reversed: false,
        unwrapped: false,
        item_node: None,
    }
}

/// Binds `Vec<T>` with items in document order.
pub fn list<T: Any>(node_name: impl Into<String>) -> TypeRecipe {
    TypeRecipe::new::<Vec<T>>(node_name).with_facet(vec_facet::<T>())
}

/// Binds `VecDeque<T>` with items in document order.
pub fn deque<T: Any>(node_name: impl Into<String>) -> TypeRecipe {
    TypeRecipe::new::<VecDeque<T>>(node_name).with_facet(SeqFacet {
        item: TypeId::of::<T>(),
        item_rust_name: core::any::type_name::<T>(),
        new: Box::new(|| Box::new(VecDeque::<T>::new()) as Value),
        add: Box::new(|coll, value| {
            let value =
                value.downcast::<T>().map_err(|_| wrong_value::<VecDeque<T>>("sequence"))?;
            cast_mut::<VecDeque<T>>(coll).push_back(*value);
            Ok(())
        }),
        each: Box::new(|coll, f| {
            for item in cast_ref::<VecDeque<T>>(coll) {
                f(item)?;
            }
            Ok(())
        }),
        len: Box::new(|coll| cast_ref::<VecDeque<T>>(coll).len()),
        reversed: false,
        unwrapped: false,
        item_node: None,
    })
}

/// Binds `BTreeSet<T>`. Items are written in key order.
pub fn set_of<T: Any + Ord>(node_name: impl Into<String>) -> TypeRecipe {
    use std::collections::BTreeSet;
    TypeRecipe::new::<BTreeSet<T>>(node_name).with_facet(SeqFacet {
        item: TypeId::of::<T>(),
        item_rust_name: core::any::type_name::<T>(),
        new: Box::new(|| Box::new(BTreeSet::<T>::new()) as Value),
        add: Box::new(|coll, value| {
            let value =
                value.downcast::<T>().map_err(|_| wrong_value::<BTreeSet<T>>("sequence"))?;
            cast_mut::<BTreeSet<T>>(coll).insert(*value);
            Ok(())
        }),
        each: Box::new(|coll, f| {
            for item in cast_ref::<BTreeSet<T>>(coll) {
                f(item)?;
            }
            Ok(())
        }),
        len: Box::new(|coll| cast_ref::<BTreeSet<T>>(coll).len()),
        reversed: false,
        unwrapped: false,
        item_node: None,
    })
}

/// Binder for custom sequence-like containers.
pub struct SeqBinder<C> {
    node_name: String,
    facet: SeqFacet,
    _marker: PhantomData<fn() -> C>,
}

/// Starts binding a custom container from its four collection hooks.
pub fn seq_with<C: Any, T: Any>(
    node_name: impl Into<String>,
    new: impl Fn() -> C + Send + Sync + 'static,
    add: impl Fn(&mut C, T) -> Result<(), BindError> + Send + Sync + 'static,
    each: impl Fn(&C, &mut dyn FnMut(&T) -> Result<(), BindError>) -> Result<(), BindError>
        + Send
        + Sync
        + 'static,
    len: impl Fn(&C) -> usize + Send + Sync + 'static,
) -> SeqBinder<C> {
    SeqBinder {
        node_name: node_name.into(),
        facet: SeqFacet {
            item: TypeId::of::<T>(),
            item_rust_name: core::any::type_name::<T>(),
            new: Box::new(move || Box::new(new()) as Value),
            add: Box::new(move |coll, value| {
                let value = value.downcast::<T>().map_err(|_| wrong_value::<C>("sequence"))?;
                add(cast_mut::<C>(coll), *value)
            }),
            each: Box::new(move |coll, f| {
                each(cast_ref::<C>(coll), &mut |item| f(item as &dyn Any))
            }),
            len: Box::new(move |coll| len(cast_ref::<C>(coll))),
            reversed: false,
            unwrapped: false,
            item_node: None,
        },
        _marker: PhantomData,
    }
}

impl<C: Any> SeqBinder<C> {
    /// Marks the container's natural iteration as reverse insertion order
    /// (stacks). Written output is reversed so a re-read restores the
    /// original order.
    pub fn reversed(mut self) -> Self {
        self.facet.reversed = true;
        self
    }

    /// Writes items as direct children named after their item type instead
    /// of wrapped in the generic item node.
    pub fn unwrapped(mut self) -> Self {
        self.facet.unwrapped = true;
        self
    }

    /// Overrides the per-item wrapper node name for this container.
    pub fn item_node(mut self, name: impl Into<String>) -> Self {
        self.facet.item_node = Some(name.into());
        self
    }

    /// Finishes into a registrable recipe.
    pub fn finish(self) -> TypeRecipe {
        TypeRecipe::new::<C>(self.node_name).with_facet(self.facet)
    }
}

/// Binds [`BoundedArray<T>`], preserving its lower bound as a node
/// attribute.
pub fn bounded_array<T: Any>(node_name: impl Into<String>) -> TypeRecipe {
    TypeRecipe::new::<BoundedArray<T>>(node_name)
        .with_facet(SeqFacet {
            item: TypeId::of::<T>(),
            item_rust_name: core::any::type_name::<T>(),
            new: Box::new(|| Box::new(BoundedArray::<T>::new()) as Value),
            add: Box::new(|coll, value| {
                let value = value
                    .downcast::<T>()
                    .map_err(|_| wrong_value::<BoundedArray<T>>("sequence"))?;
                cast_mut::<BoundedArray<T>>(coll).push(*value);
                Ok(())
            }),
            each: Box::new(|coll, f| {
                for item in cast_ref::<BoundedArray<T>>(coll).iter() {
                    f(item)?;
                }
                Ok(())
            }),
            len: Box::new(|coll| cast_ref::<BoundedArray<T>>(coll).len()),
            reversed: false,
            unwrapped: false,
            item_node: None,
        })
        .with_facet(BoundsFacet {
            get: Box::new(|coll| cast_ref::<BoundedArray<T>>(coll).lower_bound()),
            set: Box::new(|coll, lower| cast_mut::<BoundedArray<T>>(coll).set_lower_bound(lower)),
        })
}

// -----------------------------------------------------------------------------
// Maps

/// Binds `BTreeMap<K, V>`. Duplicate keys in the document follow update
/// semantics: the last occurrence's value wins.
pub fn btree_map_of<K, V>(node_name: impl Into<String>) -> TypeRecipe
where
    K: Any + Ord,
    V: Any,
{
    TypeRecipe::new::<BTreeMap<K, V>>(node_name).with_facet(MapFacet {
        key: TypeId::of::<K>(),
        key_rust_name: core::any::type_name::<K>(),
        val: TypeId::of::<V>(),
        val_rust_name: core::any::type_name::<V>(),
        new: Box::new(|| Box::new(BTreeMap::<K, V>::new()) as Value),
        insert: Box::new(|coll, key, value| {
            let key = key.downcast::<K>().map_err(|_| wrong_value::<BTreeMap<K, V>>("map"))?;
            let value =
                value.downcast::<V>().map_err(|_| wrong_value::<BTreeMap<K, V>>("map"))?;
            cast_mut::<BTreeMap<K, V>>(coll).insert(*key, *value);
            Ok(())
        }),
        each: Box::new(|coll, f| {
            for (k, v) in cast_ref::<BTreeMap<K, V>>(coll) {
                f(k, v)?;
            }
            Ok(())
        }),
        len: Box::new(|coll| cast_ref::<BTreeMap<K, V>>(coll).len()),
    })
}

/// Binds `std::collections::HashMap<K, V>`. Write order is unspecified.
pub fn map_of<K, V>(node_name: impl Into<String>) -> TypeRecipe
where
    K: Any + Eq + Hash,
    V: Any,
{
    use std::collections::HashMap;
    TypeRecipe::new::<HashMap<K, V>>(node_name).with_facet(MapFacet {
        key: TypeId::of::<K>(),
        key_rust_name: core::any::type_name::<K>(),
        val: TypeId::of::<V>(),
        val_rust_name: core::any::type_name::<V>(),
        new: Box::new(|| Box::new(HashMap::<K, V>::new()) as Value),
        insert: Box::new(|coll, key, value| {
            let key = key.downcast::<K>().map_err(|_| wrong_value::<HashMap<K, V>>("map"))?;
            let value = value.downcast::<V>().map_err(|_| wrong_value::<HashMap<K, V>>("map"))?;
            cast_mut::<HashMap<K, V>>(coll).insert(*key, *value);
            Ok(())
        }),
        each: Box::new(|coll, f| {
            for (k, v) in cast_ref::<HashMap<K, V>>(coll) {
                f(k, v)?;
            }
            Ok(())
        }),
        len: Box::new(|coll| cast_ref::<HashMap<K, V>>(coll).len()),
    })
}

// -----------------------------------------------------------------------------
// Facades

/// Binds [`Grid<T>`] as rows of items, delegating to `Vec<Vec<T>>`.
///
/// The row containers are registered as dependency recipes under derived
/// names; a ragged document fails the grid's construction.
pub fn grid<T: Any + Clone>(node_name: impl Into<String>) -> TypeRecipe {
    let node_name = node_name.into();
    let rows_name = format!("{node_name}.rows");
    let row_name = format!("{node_name}.row");
    TypeRecipe::new::<Grid<T>>(node_name)
        .with_facet(DelegateFacet {
            inner: TypeId::of::<Vec<Vec<T>>>(),
            inner_rust_name: core::any::type_name::<Vec<Vec<T>>>(),
            wrap: Box::new(|value| {
                let rows = value
                    .downcast::<Vec<Vec<T>>>()
                    .map_err(|_| wrong_value::<Grid<T>>("delegate"))?;
                Grid::from_rows(*rows).map(|g| Box::new(g) as Value).map_err(|row| {
                    BindError::strategy(
                        "delegate",
                        core::any::type_name::<Grid<T>>(),
                        format!("row {row} has a different length"),
                    )
                })
            }),
            project: Box::new(|value| Ok(Box::new(cast_ref::<Grid<T>>(value).to_rows()) as Value)),
        })
        .with_dep(list::<Vec<T>>(rows_name))
        .with_dep(list::<T>(row_name))
}

/// Binds `Box<[T]>` as a read-only facade over `Vec<T>`.
pub fn boxed_slice<T: Any + Clone>(node_name: impl Into<String>) -> TypeRecipe {
    let node_name = node_name.into();
    let items_name = format!("{node_name}.items");
    TypeRecipe::new::<Box<[T]>>(node_name)
        .with_facet(DelegateFacet {
            inner: TypeId::of::<Vec<T>>(),
            inner_rust_name: core::any::type_name::<Vec<T>>(),
            wrap: Box::new(|value| {
                let items = value
                    .downcast::<Vec<T>>()
                    .map_err(|_| wrong_value::<Box<[T]>>("delegate"))?;
                Ok(Box::new(items.into_boxed_slice()) as Value)
            }),
            project: Box::new(|value| {
                Ok(Box::new(cast_ref::<Box<[T]>>(value).to_vec()) as Value)
            }),
        })
        .with_dep(list::<T>(items_name))
}

// -----------------------------------------------------------------------------
// Shared handles

/// Binds `Rc<RefCell<T>>` with reference identity: the first write of a
/// handle emits the body with an `id`, later writes emit a `ref`, and
/// reads restore the sharing.
pub fn shared<T: Any>(node_name: impl Into<String>) -> TypeRecipe {
    TypeRecipe::new::<Rc<RefCell<T>>>(node_name).with_facet(SharedFacet {
        inner: TypeId::of::<T>(),
        inner_rust_name: core::any::type_name::<T>(),
        clone_ref: Box::new(|value| Box::new(cast_ref::<Rc<RefCell<T>>>(value).clone()) as Value),
        addr: Box::new(|value| Rc::as_ptr(cast_ref::<Rc<RefCell<T>>>(value)) as usize),
        wrap: Box::new(|value| {
            let inner = value.downcast::<T>().unwrap_or_else(|_| {
                panic!(
                    "shared wrap for `{}` received a value of the wrong type",
                    core::any::type_name::<T>()
                )
            });
            Box::new(Rc::new(RefCell::new(*inner))) as Value
        }),
        with_inner: Box::new(|value, f| {
            let inner = cast_ref::<Rc<RefCell<T>>>(value).borrow();
            f(&*inner as &dyn Any)
        }),
    })
}

// -----------------------------------------------------------------------------
// Polymorphic bases

/// Variant-by-variant binder for a polymorphic base type.
pub struct BaseBinder<B> {
    node_name: String,
    facet: BaseFacet,
    _marker: PhantomData<fn() -> B>,
}

/// Starts binding a polymorphic base type `B`.
///
/// The base itself is never constructed; a node read as `B` must resolve
/// one of the registered variants, either by its name or through the
/// single-child unwrapping of wrapped storage.
pub fn base<B: Any>(node_name: impl Into<String>) -> BaseBinder<B> {
    BaseBinder {
        node_name: node_name.into(),
        facet: BaseFacet::default(),
        _marker: PhantomData,
    }
}

impl<B: Any> BaseBinder<B> {
    /// Registers a concrete variant with its conversions in and out of the
    /// base representation.
    pub fn variant<T: Any>(
        mut self,
        wrap: impl Fn(T) -> B + Send + Sync + 'static,
        peek: impl for<'a> Fn(&'a B) -> Option<&'a T> + Send + Sync + 'static,
    ) -> Self {
        self.facet.variants.push(BaseVariant {
            concrete: TypeId::of::<T>(),
            concrete_rust_name: core::any::type_name::<T>(),
            wrap: Arc::new(move |value| {
                let value = value.downcast::<T>().map_err(|_| wrong_value::<B>("dispatch"))?;
                Ok(Box::new(wrap(*value)) as Value)
            }),
            peek: Box::new(move |value| peek(cast_ref::<B>(value)).map(|v| v as &dyn Any)),
        });
        self
    }

    /// Finishes into a registrable recipe.
    pub fn finish(self) -> TypeRecipe {
        TypeRecipe::new::<B>(self.node_name)
            .abstract_only()
            .with_facet(self.facet)
    }
}

// -----------------------------------------------------------------------------
// Options

/// Binds `Option<T>`. `None` is stored as a marker attribute; `Some` is
/// stored as the inner value in place.
pub fn option<T: Any>(node_name: impl Into<String>) -> TypeRecipe {
    TypeRecipe::new::<Option<T>>(node_name).with_facet(OptionFacet {
        inner: TypeId::of::<T>(),
        inner_rust_name: core::any::type_name::<T>(),
        none: Box::new(|| Box::new(None::<T>) as Value),
        some: Box::new(|value| {
            let value = value.downcast::<T>().map_err(|_| wrong_value::<Option<T>>("option"))?;
            Ok(Box::new(Some(*value)) as Value)
        }),
        peek: Box::new(|value| {
            cast_ref::<Option<T>>(value).as_ref().map(|v| v as &dyn Any)
        }),
    })
}
