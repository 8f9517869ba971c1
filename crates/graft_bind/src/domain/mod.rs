//! The domain: shared, thread-safe registration state that read and
//! write operations run against.
//!
//! A domain owns the recipe registry, the node-name index, the lazily
//! built [`TypeInfo`] cache and the configuration every operation
//! inherits. Domains are cheap `Arc` handles; operations are
//! single-threaded but many may run against one domain concurrently.

use core::any::{Any, TypeId};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use graft_doc::Node;

use crate::error::BindError;
use crate::hash::{HashMap, HashSet, TypeIdMap};
use crate::info::TypeInfo;
use crate::markers::Markers;
use crate::op::read::ReadOperation;
use crate::op::write::WriteOperation;
use crate::op::SinkMode;
use crate::recipe::{BaseFacet, TypeRecipe};

pub(crate) mod module;
pub(crate) mod resolver;

pub use module::{DomainModule, StandardModule};
pub use resolver::{NameLookup, NameResolver, RegistryResolver, TagMeaning};

#[cfg(feature = "auto_register")]
pub use module::ModuleRegistration;

use resolver::Resolution;

// -----------------------------------------------------------------------------
// Locks

fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    // A panic while holding the lock leaves valid (if partial) data; keep
    // serving instead of propagating the poison.
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

// -----------------------------------------------------------------------------
// DomainConfig

/// Per-domain behavior switches inherited by every operation.
#[derive(Clone, Debug)]
pub struct DomainConfig {
    /// Reserved node and attribute names.
    pub markers: Markers,
    /// When a polymorphic value is expected and the node carries nothing
    /// but a single child, treat that child as the wrapped concrete value.
    pub unwrap_single_child: bool,
    /// Default wall-clock budget of write operations. `None` disables the
    /// guard.
    pub write_budget: Option<Duration>,
}

impl Default for DomainConfig {
    fn default() -> Self {
        Self {
            markers: Markers::default(),
            unwrap_single_child: true,
            write_budget: Some(Duration::from_secs(30)),
        }
    }
}

// -----------------------------------------------------------------------------
// DomainBuilder

/// Configures and builds a [`Domain`].
pub struct DomainBuilder {
    config: DomainConfig,
    resolver: Box<dyn NameResolver>,
    modules: Vec<Box<dyn DomainModule>>,
}

impl Default for DomainBuilder {
    fn default() -> Self {
        Self {
            config: DomainConfig::default(),
            resolver: Box::new(RegistryResolver),
            modules: vec![Box::new(StandardModule)],
        }
    }
}

impl DomainBuilder {
    /// Replaces the reserved-name table.
    pub fn markers(mut self, markers: Markers) -> Self {
        self.config.markers = markers;
        self
    }

    /// Enables or disables the single-child unwrapping heuristic.
    pub fn unwrap_single_child(mut self, enabled: bool) -> Self {
        self.config.unwrap_single_child = enabled;
        self
    }

    /// Sets the default write budget. `None` disables the guard.
    pub fn write_budget(mut self, budget: Option<Duration>) -> Self {
        self.config.write_budget = budget;
        self
    }

    /// Replaces the node-name resolver.
    pub fn resolver(mut self, resolver: impl NameResolver + 'static) -> Self {
        self.resolver = Box::new(resolver);
        self
    }

    /// Appends a strategy module. Modules contribute in registration
    /// order, after the standard module.
    pub fn module(mut self, module: impl DomainModule + 'static) -> Self {
        self.modules.push(Box::new(module));
        self
    }

    /// Builds the domain, pre-binding the primitive types.
    pub fn finish(mut self) -> Domain {
        #[cfg(feature = "auto_register")]
        for registration in inventory::iter::<ModuleRegistration> {
            self.modules.push((registration.construct)());
        }
        let domain = Domain {
            inner: Arc::new(DomainInner {
                config: self.config,
                resolver: self.resolver,
                modules: self.modules,
                recipes: RwLock::new(TypeIdMap::new()),
                names: RwLock::new(NameIndex::default()),
                cache: RwLock::new(TypeIdMap::new()),
            }),
        };
        domain.register_primitives();
        domain
    }
}

// -----------------------------------------------------------------------------
// Domain

#[derive(Default)]
struct NameIndex {
    map: HashMap<String, TypeId>,
    ambiguous: HashSet<String>,
}

struct DomainInner {
    config: DomainConfig,
    resolver: Box<dyn NameResolver>,
    modules: Vec<Box<dyn DomainModule>>,
    recipes: RwLock<TypeIdMap<Arc<TypeRecipe>>>,
    names: RwLock<NameIndex>,
    cache: RwLock<TypeIdMap<Arc<TypeInfo>>>,
}

/// A registration scope plus the operations that run against it.
///
/// # Examples
///
/// ```
/// use graft_bind::{bindings, Domain};
///
/// let domain = Domain::new();
/// domain.register(bindings::list::<i32>("Numbers"));
///
/// let node = domain.write(&vec![1, 2, 3]).unwrap();
/// let back: Vec<i32> = domain.read(&node).unwrap();
/// assert_eq!(back, vec![1, 2, 3]);
/// ```
#[derive(Clone)]
pub struct Domain {
    inner: Arc<DomainInner>,
}

impl Default for Domain {
    fn default() -> Self {
        Self::new()
    }
}

impl Domain {
    /// Creates a domain with the default configuration.
    pub fn new() -> Self {
        Self::builder().finish()
    }

    /// Starts configuring a domain.
    pub fn builder() -> DomainBuilder {
        DomainBuilder::default()
    }

    /// Returns the domain configuration.
    #[inline]
    pub fn config(&self) -> &DomainConfig {
        &self.inner.config
    }

    /// Returns the reserved-name table.
    #[inline]
    pub fn markers(&self) -> &Markers {
        &self.inner.config.markers
    }

    pub(crate) fn modules(&self) -> &[Box<dyn DomainModule>] {
        &self.inner.modules
    }

    // -------------------------------------------------------------------------
    // Registration

    /// Registers a recipe and its dependency recipes.
    ///
    /// Registration is first-wins per type: a later recipe for an already
    /// registered type is dropped with a debug log, never an error, so
    /// independent modules may both register a common dependency.
    pub fn register(&self, mut recipe: TypeRecipe) {
        let deps = core::mem::take(&mut recipe.deps);
        self.register_one(recipe);
        for dep in deps {
            self.register(dep);
        }
    }

    fn register_one(&self, recipe: TypeRecipe) {
        let id = recipe.id;
        let rust_name = recipe.rust_name;
        let node_name = recipe.node_name.clone();

        let inserted = {
            let mut recipes = write_lock(&self.inner.recipes);
            recipes.try_insert(id, || Arc::new(recipe))
        };
        if !inserted {
            log::debug!("recipe for `{rust_name}` already registered, keeping the first");
            return;
        }

        let mut names = write_lock(&self.inner.names);
        match names.map.get(&node_name) {
            Some(&existing) if existing != id => {
                log::warn!("node name `{node_name}` is claimed by more than one type");
                names.ambiguous.insert(node_name);
            }
            Some(_) => {}
            None => {
                names.map.insert(node_name, id);
            }
        }
    }

    /// Resolves a node name against the name index.
    pub fn lookup_name(&self, name: &str) -> NameLookup {
        let names = read_lock(&self.inner.names);
        if names.ambiguous.contains(name) {
            NameLookup::Ambiguous
        } else if let Some(&id) = names.map.get(name) {
            NameLookup::Found(id)
        } else {
            NameLookup::Unknown
        }
    }

    // -------------------------------------------------------------------------
    // Reflection

    /// Returns the descriptor of `T`, building it on first use.
    pub fn reflect<T: Any>(&self) -> Result<Arc<TypeInfo>, BindError> {
        self.reflect_id(TypeId::of::<T>(), core::any::type_name::<T>())
    }

    pub(crate) fn reflect_id(
        &self,
        id: TypeId,
        name: &'static str,
    ) -> Result<Arc<TypeInfo>, BindError> {
        if let Some(info) = read_lock(&self.inner.cache).get(&id) {
            return Ok(info.clone());
        }
        let recipe = read_lock(&self.inner.recipes)
            .get(&id)
            .cloned()
            .ok_or(BindError::Unregistered {
                type_name: name.into(),
            })?;
        log::trace!("building type info for `{}`", recipe.rust_name);

        // Build outside any lock: module code may reflect other types.
        let mut strategies = Vec::new();
        for module in &self.inner.modules {
            module.contribute(&recipe, &mut strategies);
        }
        for factory in &recipe.extra {
            strategies.push(factory());
        }
        let info = TypeInfo::new(
            recipe.id,
            recipe.rust_name,
            recipe.node_name.clone(),
            recipe.instantiable,
            strategies,
            recipe.facets.clone(),
        );
        info.run_late_init();
        let info = Arc::new(info);

        // A concurrent or reentrant reflect may have won; the first
        // descriptor stays, matching registration semantics.
        let mut cache = write_lock(&self.inner.cache);
        cache.try_insert(id, || info.clone());
        Ok(cache.get(&id).cloned().unwrap_or(info))
    }

    /// Determines what a node should actually be read as, given the
    /// statically expected type.
    pub(crate) fn resolve_dynamic(
        &self,
        node: &Node,
        expected: &Arc<TypeInfo>,
        meaning: TagMeaning,
    ) -> Result<Resolution, BindError> {
        if meaning == TagMeaning::Normal {
            match self.inner.resolver.resolve(self, node.name()) {
                NameLookup::Found(id) if id == expected.id() => {
                    // An abstract base names its own node when written in
                    // wrapped form; keep going so the single-child
                    // heuristic can find the concrete variant.
                    if expected.is_instantiable() {
                        return Ok(Resolution::direct(expected.clone()));
                    }
                }
                NameLookup::Found(id) => {
                    if let Some(base) = expected.facet::<BaseFacet>() {
                        if let Some(variant) = base.variant(id) {
                            let info = self.reflect_id(id, variant.concrete_rust_name)?;
                            return Ok(Resolution {
                                info,
                                wrap: Some(variant.wrap.clone()),
                                descend: None,
                            });
                        }
                    }
                    let resolved = read_lock(&self.inner.recipes)
                        .get(&id)
                        .map_or("an unregistered type", |r| r.rust_name);
                    return Err(BindError::TypeResolution {
                        node: node.name().to_string(),
                        expected: expected.rust_name().into(),
                        resolved: resolved.into(),
                    });
                }
                NameLookup::Ambiguous => {
                    return Err(BindError::TypeResolution {
                        node: node.name().to_string(),
                        expected: expected.rust_name().into(),
                        resolved: "an ambiguous name".into(),
                    });
                }
                NameLookup::Unknown => {}
            }
        }

        // A polymorphic value is often stored wrapped: a nameless holder
        // node whose single child names the concrete type.
        if self.inner.config.unwrap_single_child
            && node.attrs().is_empty()
            && node.text().is_empty()
            && node.children().len() == 1
        {
            if let Some(base) = expected.facet::<BaseFacet>() {
                let child = &node.children()[0];
                if let NameLookup::Found(id) = self.inner.resolver.resolve(self, child.name()) {
                    if let Some(variant) = base.variant(id) {
                        let info = self.reflect_id(id, variant.concrete_rust_name)?;
                        return Ok(Resolution {
                            info,
                            wrap: Some(variant.wrap.clone()),
                            descend: Some(0),
                        });
                    }
                }
            }
        }

        Ok(Resolution::direct(expected.clone()))
    }

    // -------------------------------------------------------------------------
    // Operations

    /// Reads one node as a `T`.
    pub fn read<T: Any>(&self, node: &Node) -> Result<T, BindError> {
        ReadOperation::new(self.clone(), SinkMode::Raise).read(node)
    }

    /// Reads a batch of root nodes with per-root error degradation.
    pub fn read_all<T: Any>(&self, nodes: &[&Node]) -> Vec<Result<T, BindError>> {
        ReadOperation::new(self.clone(), SinkMode::Collect).read_all(nodes)
    }

    /// Writes a value as a node named after its type, under the domain's
    /// default write budget.
    pub fn write<T: Any>(&self, value: &T) -> Result<Node, BindError> {
        WriteOperation::new(self.clone(), self.inner.config.write_budget).write(value)
    }

    /// Writes a batch of values as one operation: one identity table, so
    /// a handle shared across roots is written once and referenced from
    /// the others. Any failure aborts the whole batch.
    pub fn write_all<T: Any>(&self, values: &[&T]) -> Result<Vec<Node>, BindError> {
        WriteOperation::new(self.clone(), self.inner.config.write_budget).write_all(values)
    }

    /// Writes a value under an explicit budget override.
    pub fn write_with_budget<T: Any>(
        &self,
        value: &T,
        budget: Option<Duration>,
    ) -> Result<Node, BindError> {
        WriteOperation::new(self.clone(), budget).write(value)
    }

    // -------------------------------------------------------------------------
    // Primitives

    fn register_primitives(&self) {
        use crate::bindings::{text, text_with};

        macro_rules! primitive {
            ($($ty:ty => $name:literal),* $(,)?) => {
                $(self.register(text::<$ty>($name));)*
            };
        }
        primitive! {
            bool => "bool",
            char => "char",
            u8 => "u8",
            u16 => "u16",
            u32 => "u32",
            u64 => "u64",
            u128 => "u128",
            usize => "usize",
            i8 => "i8",
            i16 => "i16",
            i32 => "i32",
            i64 => "i64",
            i128 => "i128",
            isize => "isize",
            f32 => "f32",
            f64 => "f64",
            String => "string",
        }
        self.register(text_with::<()>(
            "unit",
            |_| Ok(String::new()),
            |_| Ok(()),
        ));
    }
}

impl core::fmt::Debug for Domain {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Domain")
            .field("recipes", &read_lock(&self.inner.recipes).len())
            .finish()
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings;

    #[test]
    fn primitives_are_pre_bound() {
        let domain = Domain::new();
        assert!(domain.reflect::<i32>().is_ok());
        assert!(domain.reflect::<String>().is_ok());
        assert_eq!(domain.lookup_name("f64"), NameLookup::Found(TypeId::of::<f64>()));
    }

    #[test]
    fn unregistered_type_is_an_error() {
        struct Nope;
        let domain = Domain::new();
        assert!(matches!(
            domain.reflect::<Nope>(),
            Err(BindError::Unregistered { .. })
        ));
    }

    #[test]
    fn registration_is_first_wins() {
        #[derive(Default)]
        struct Marked(i8);
        impl core::str::FromStr for Marked {
            type Err = core::convert::Infallible;
            fn from_str(_: &str) -> Result<Self, Self::Err> {
                Ok(Self(0))
            }
        }
        impl core::fmt::Display for Marked {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        let domain = Domain::new();
        domain.register(bindings::text::<Marked>("First"));
        domain.register(bindings::text::<Marked>("Second"));

        let info = domain.reflect::<Marked>().unwrap();
        assert_eq!(info.node_name(), "First");
        assert_eq!(domain.lookup_name("Second"), NameLookup::Unknown);
    }

    #[test]
    fn colliding_node_names_turn_ambiguous() {
        struct A;
        struct B;

        let domain = Domain::new();
        domain.register(bindings::text_with::<A>("Num", |_| Ok(String::new()), |_| Ok(A)));
        assert_eq!(domain.lookup_name("Num"), NameLookup::Found(TypeId::of::<A>()));

        domain.register(bindings::text_with::<B>("Num", |_| Ok(String::new()), |_| Ok(B)));
        assert_eq!(domain.lookup_name("Num"), NameLookup::Ambiguous);
    }

    #[test]
    fn domains_are_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Domain>();
    }
}
