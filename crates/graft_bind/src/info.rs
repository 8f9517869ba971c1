use core::any::{Any, TypeId};
use core::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::hash::TypeIdMap;
use crate::strategy::{StrategyKind, TypeStrategy};

// -----------------------------------------------------------------------------
// FacetMap

/// Type-indexed storage for the capability facets of a type.
///
/// Facets are the raw material strategies are built from: a text codec, a
/// field table, collection hooks, a polymorphic variant table. A recipe
/// carries at most one facet per facet type; the facets end up in the
/// published [`TypeInfo`] so strategies and cross-cutting components can
/// consult them at runtime.
#[derive(Clone, Default)]
pub struct FacetMap(TypeIdMap<Arc<dyn Any + Send + Sync>>);

impl FacetMap {
    /// Creates an empty facet table.
    #[inline]
    pub const fn new() -> Self {
        Self(TypeIdMap::new())
    }

    /// Inserts a facet, replacing any previous facet of the same type.
    pub fn insert<F: Any + Send + Sync>(&mut self, facet: F) {
        self.0.insert_type::<F>(Arc::new(facet));
    }

    /// Returns a shared handle to the facet of type `F`, if present.
    pub fn get<F: Any + Send + Sync>(&self) -> Option<Arc<F>> {
        self.0
            .get_type::<F>()
            .and_then(|facet| facet.clone().downcast::<F>().ok())
    }

    /// Returns `true` if a facet of type `F` is present.
    pub fn contains<F: Any + Send + Sync>(&self) -> bool {
        self.0.contains(&TypeId::of::<F>())
    }
}

// -----------------------------------------------------------------------------
// StrategySlot

/// One strategy attached to a [`TypeInfo`], together with its enabled flag.
///
/// The flag is atomic only so that `TypeInfo` stays shareable across
/// threads; it is flipped exclusively during the late-initialization pass,
/// before the descriptor is published.
pub struct StrategySlot {
    pub(crate) strategy: Box<dyn TypeStrategy>,
    enabled: AtomicBool,
}

impl StrategySlot {
    pub(crate) fn new(strategy: Box<dyn TypeStrategy>) -> Self {
        Self {
            strategy,
            enabled: AtomicBool::new(true),
        }
    }

    /// Returns `true` if the strategy is still enabled.
    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    fn disable(&self) {
        self.enabled.store(false, Ordering::Relaxed);
    }
}

// -----------------------------------------------------------------------------
// Siblings

/// Late-initialization view of the strategies attached to one type.
///
/// Handed to [`TypeStrategy::late_init`] so a strategy can consult what
/// else got registered and disable itself or a sibling. This is the only
/// moment strategy flags may change.
pub struct Siblings<'a> {
    slots: &'a [StrategySlot],
    me: usize,
}

impl Siblings<'_> {
    /// Disables the strategy currently being initialized.
    pub fn disable_self(&self) {
        self.slots[self.me].disable();
    }

    /// Disables every enabled sibling of the given kind.
    pub fn disable(&self, kind: StrategyKind) {
        for (i, slot) in self.slots.iter().enumerate() {
            if i != self.me && slot.strategy.kind() == kind {
                slot.disable();
            }
        }
    }

    /// Returns `true` if another enabled strategy of the given kind exists.
    pub fn has_enabled(&self, kind: StrategyKind) -> bool {
        self.slots
            .iter()
            .enumerate()
            .any(|(i, slot)| i != self.me && slot.is_enabled() && slot.strategy.kind() == kind)
    }
}

// -----------------------------------------------------------------------------
// TypeInfo

/// The per-domain descriptor of one runtime type.
///
/// Holds the type's stable node name, its ordered strategy list (insertion
/// order is priority order) and its facet table. Exactly one `TypeInfo`
/// exists per (domain, type) pair; it is created lazily by
/// [`Domain::reflect`](crate::Domain::reflect), initialized in two phases
/// and never mutated afterwards.
pub struct TypeInfo {
    id: TypeId,
    rust_name: &'static str,
    node_name: String,
    instantiable: bool,
    slots: Vec<StrategySlot>,
    facets: FacetMap,
}

impl TypeInfo {
    pub(crate) fn new(
        id: TypeId,
        rust_name: &'static str,
        node_name: String,
        instantiable: bool,
        strategies: Vec<Box<dyn TypeStrategy>>,
        facets: FacetMap,
    ) -> Self {
        Self {
            id,
            rust_name,
            node_name,
            instantiable,
            slots: strategies.into_iter().map(StrategySlot::new).collect(),
            facets,
        }
    }

    /// Runs the late-initialization pass: every strategy gets to see its
    /// siblings once and may disable itself or others.
    pub(crate) fn run_late_init(&self) {
        for me in 0..self.slots.len() {
            let siblings = Siblings {
                slots: &self.slots,
                me,
            };
            self.slots[me].strategy.late_init(&siblings);
        }
    }

    /// Returns the [`TypeId`] this descriptor covers.
    #[inline]
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Returns the Rust name of the type, for diagnostics.
    #[inline]
    pub fn rust_name(&self) -> &'static str {
        self.rust_name
    }

    /// Returns the stable node name used when a value of this type names
    /// its own node.
    #[inline]
    pub fn node_name(&self) -> &str {
        &self.node_name
    }

    /// Returns `true` if values of this type can be constructed directly.
    ///
    /// Polymorphic base types are descriptors without construction; reads
    /// must resolve a concrete variant first.
    #[inline]
    pub fn is_instantiable(&self) -> bool {
        self.instantiable
    }

    /// Returns a shared handle to the facet of type `F`, if present.
    #[inline]
    pub fn facet<F: Any + Send + Sync>(&self) -> Option<Arc<F>> {
        self.facets.get::<F>()
    }

    /// Iterates the enabled strategies in priority order.
    pub(crate) fn strategies(&self) -> impl Iterator<Item = &dyn TypeStrategy> {
        self.slots
            .iter()
            .filter(|slot| slot.is_enabled())
            .map(|slot| &*slot.strategy)
    }
}

impl core::fmt::Debug for TypeInfo {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TypeInfo")
            .field("rust_name", &self.rust_name)
            .field("node_name", &self.node_name)
            .field("instantiable", &self.instantiable)
            .field("strategies", &self.slots.len())
            .finish()
    }
}
