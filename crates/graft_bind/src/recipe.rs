use core::any::{Any, TypeId};
use std::sync::Arc;

use crate::error::BindError;
use crate::info::FacetMap;
use crate::strategy::TypeStrategy;
use crate::value::Value;

// -----------------------------------------------------------------------------
// TypeRecipe

pub(crate) type StrategyFactory = Arc<dyn Fn() -> Box<dyn TypeStrategy> + Send + Sync>;

/// The explicit registration unit of the binding engine.
///
/// Rust has no runtime field discovery, so recipes carry everything the
/// engine must know about a type: its stable node name, whether it can be
/// constructed, and the capability facets the standard strategies are
/// built from. Recipes are produced by the constructors in
/// [`bindings`](crate::bindings) and handed to
/// [`Domain::register`](crate::Domain::register).
///
/// A recipe is inert data. The per-domain [`TypeInfo`](crate::TypeInfo) is
/// only derived from it, lazily, on first use.
pub struct TypeRecipe {
    pub(crate) id: TypeId,
    pub(crate) rust_name: &'static str,
    pub(crate) node_name: String,
    pub(crate) instantiable: bool,
    pub(crate) facets: FacetMap,
    pub(crate) extra: Vec<StrategyFactory>,
    pub(crate) deps: Vec<TypeRecipe>,
}

impl TypeRecipe {
    /// Creates an empty recipe for `T` with the given stable node name.
    pub fn new<T: Any>(node_name: impl Into<String>) -> Self {
        Self {
            id: TypeId::of::<T>(),
            rust_name: core::any::type_name::<T>(),
            node_name: node_name.into(),
            instantiable: true,
            facets: FacetMap::new(),
            extra: Vec::new(),
            deps: Vec::new(),
        }
    }

    /// Returns the [`TypeId`] this recipe covers.
    #[inline]
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Returns the Rust name of the covered type.
    #[inline]
    pub fn rust_name(&self) -> &'static str {
        self.rust_name
    }

    /// Returns the stable node name.
    #[inline]
    pub fn node_name(&self) -> &str {
        &self.node_name
    }

    /// Adds a capability facet, replacing a previous facet of the same
    /// type.
    pub fn with_facet<F: Any + Send + Sync>(mut self, facet: F) -> Self {
        self.facets.insert(facet);
        self
    }

    /// Marks the recipe as describing a non-instantiable type (a
    /// polymorphic base).
    pub fn abstract_only(mut self) -> Self {
        self.instantiable = false;
        self
    }

    /// Attaches a user-supplied strategy. Extra strategies run after the
    /// standard ones derived from the facets.
    pub fn with_strategy(
        mut self,
        factory: impl Fn() -> Box<dyn TypeStrategy> + Send + Sync + 'static,
    ) -> Self {
        self.extra.push(Arc::new(factory));
        self
    }

    /// Attaches a dependency recipe registered alongside this one
    /// (first registration wins, as everywhere).
    pub fn with_dep(mut self, dep: TypeRecipe) -> Self {
        self.deps.push(dep);
        self
    }
}

impl core::fmt::Debug for TypeRecipe {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TypeRecipe")
            .field("rust_name", &self.rust_name)
            .field("node_name", &self.node_name)
            .finish()
    }
}

// -----------------------------------------------------------------------------
// Facets
//
// Facets are type-erased capability tables. The binding constructors fill
// them with monomorphized glue closures; the standard strategies consume
// them without knowing the concrete types involved.

/// Whole-value text codec: the type round-trips through a node's text.
pub struct TextFacet {
    pub(crate) to_text: Box<dyn Fn(&dyn Any) -> Result<String, BindError> + Send + Sync>,
    pub(crate) from_text: Box<dyn Fn(&str) -> Result<Value, BindError> + Send + Sync>,
}

/// One bound field of a struct-like type.
pub struct FieldBinding {
    pub(crate) name: String,
    pub(crate) ty: TypeId,
    pub(crate) ty_name: &'static str,
    pub(crate) get: Box<dyn for<'a> Fn(&'a dyn Any) -> &'a (dyn Any) + Send + Sync>,
    pub(crate) set: Box<dyn Fn(&mut dyn Any, Value) -> Result<(), BindError> + Send + Sync>,
}

/// Property map of a struct-like type: a constructor plus an ordered
/// field table.
pub struct StructFacet {
    pub(crate) ctor: Box<dyn Fn() -> Value + Send + Sync>,
    pub(crate) fields: Vec<FieldBinding>,
}

/// Collection hooks for sequence-like types.
pub struct SeqFacet {
    pub(crate) item: TypeId,
    pub(crate) item_rust_name: &'static str,
    pub(crate) new: Box<dyn Fn() -> Value + Send + Sync>,
    pub(crate) add: Box<dyn Fn(&mut dyn Any, Value) -> Result<(), BindError> + Send + Sync>,
    pub(crate) each: Box<
        dyn Fn(
                &dyn Any,
                &mut dyn FnMut(&dyn Any) -> Result<(), BindError>,
            ) -> Result<(), BindError>
            + Send
            + Sync,
    >,
    pub(crate) len: Box<dyn Fn(&dyn Any) -> usize + Send + Sync>,
    /// Natural iteration yields reverse insertion order (stacks): write
    /// output is reversed so re-reading reconstructs the original order.
    pub(crate) reversed: bool,
    /// Write items directly as the element's children, without the
    /// per-item wrapper node.
    pub(crate) unwrapped: bool,
    /// Per-type override for the item wrapper name.
    pub(crate) item_node: Option<String>,
}

/// Non-zero lower bound support for numeric-indexed arrays.
pub struct BoundsFacet {
    pub(crate) get: Box<dyn Fn(&dyn Any) -> i64 + Send + Sync>,
    pub(crate) set: Box<dyn Fn(&mut dyn Any, i64) + Send + Sync>,
}

/// Collection hooks for map-like types.
pub struct MapFacet {
    pub(crate) key: TypeId,
    pub(crate) key_rust_name: &'static str,
    pub(crate) val: TypeId,
    pub(crate) val_rust_name: &'static str,
    pub(crate) new: Box<dyn Fn() -> Value + Send + Sync>,
    /// Insert one entry. Duplicate keys follow associative-array update
    /// semantics: the first occurrence's position, the last occurrence's
    /// value.
    pub(crate) insert: Box<dyn Fn(&mut dyn Any, Value, Value) -> Result<(), BindError> + Send + Sync>,
    pub(crate) each: Box<
        dyn Fn(
                &dyn Any,
                &mut dyn FnMut(&dyn Any, &dyn Any) -> Result<(), BindError>,
            ) -> Result<(), BindError>
            + Send
            + Sync,
    >,
    pub(crate) len: Box<dyn Fn(&dyn Any) -> usize + Send + Sync>,
}

/// Reference-identity hooks for shared handles such as `Rc<RefCell<T>>`.
pub struct SharedFacet {
    pub(crate) inner: TypeId,
    pub(crate) inner_rust_name: &'static str,
    /// Clones the handle (not the pointee) into a fresh engine value.
    pub(crate) clone_ref: Box<dyn Fn(&dyn Any) -> Value + Send + Sync>,
    /// Stable address of the pointee, the write-side identity key.
    pub(crate) addr: Box<dyn Fn(&dyn Any) -> usize + Send + Sync>,
    /// Wraps a freshly read inner value into the shared handle.
    pub(crate) wrap: Box<dyn Fn(Value) -> Value + Send + Sync>,
    /// Borrows the pointee for writing.
    pub(crate) with_inner: Box<
        dyn Fn(
                &dyn Any,
                &mut dyn FnMut(&dyn Any) -> Result<(), BindError>,
            ) -> Result<(), BindError>
            + Send
            + Sync,
    >,
}

/// One concrete variant of a polymorphic base.
pub struct BaseVariant {
    pub(crate) concrete: TypeId,
    pub(crate) concrete_rust_name: &'static str,
    /// Converts a concrete value into the base representation.
    pub(crate) wrap: Arc<dyn Fn(Value) -> Result<Value, BindError> + Send + Sync>,
    /// Looks through a base value at the concrete payload, if it holds
    /// this variant.
    pub(crate) peek: Box<dyn for<'a> Fn(&'a dyn Any) -> Option<&'a dyn Any> + Send + Sync>,
}

/// Variant table of a polymorphic base type.
#[derive(Default)]
pub struct BaseFacet {
    pub(crate) variants: Vec<BaseVariant>,
}

impl BaseFacet {
    /// Returns `true` if the concrete type is an accepted variant.
    pub fn accepts(&self, concrete: TypeId) -> bool {
        self.variants.iter().any(|v| v.concrete == concrete)
    }

    pub(crate) fn variant(&self, concrete: TypeId) -> Option<&BaseVariant> {
        self.variants.iter().find(|v| v.concrete == concrete)
    }
}

/// Read-only facade delegating to a mutable counterpart type.
pub struct DelegateFacet {
    pub(crate) inner: TypeId,
    pub(crate) inner_rust_name: &'static str,
    /// Wraps the finished inner value into the facade.
    pub(crate) wrap: Box<dyn Fn(Value) -> Result<Value, BindError> + Send + Sync>,
    /// Projects the facade back onto an owned inner value for writing.
    pub(crate) project: Box<dyn Fn(&dyn Any) -> Result<Value, BindError> + Send + Sync>,
}

/// Optional-value hooks for `Option<T>`-shaped types.
pub struct OptionFacet {
    pub(crate) inner: TypeId,
    pub(crate) inner_rust_name: &'static str,
    pub(crate) none: Box<dyn Fn() -> Value + Send + Sync>,
    pub(crate) some: Box<dyn Fn(Value) -> Result<Value, BindError> + Send + Sync>,
    pub(crate) peek: Box<dyn for<'a> Fn(&'a dyn Any) -> Option<&'a dyn Any> + Send + Sync>,
}
