use crate::op::ReadComponent;
use crate::recipe::{
    BaseFacet, DelegateFacet, MapFacet, OptionFacet, SeqFacet, SharedFacet, StructFacet,
    TextFacet, TypeRecipe,
};
use crate::strategy::{
    DelegateStrategy, DispatchStrategy, MapStrategy, OptionStrategy, PropsStrategy,
    SequenceStrategy, SharedStrategy, TextStrategy, TypeStrategy,
};

// -----------------------------------------------------------------------------
// DomainModule

/// A pluggable source of strategies for a domain.
///
/// When a type is first reflected, every module of the domain gets to
/// contribute strategies to its descriptor, in module registration order.
/// The built-in [`StandardModule`] derives the standard strategies from
/// the recipe's facets; additional modules can attach domain-specific
/// behavior to types they recognize.
pub trait DomainModule: Send + Sync {
    /// Diagnostic name.
    fn name(&self) -> &'static str;

    /// Appends strategies for the given recipe.
    fn contribute(&self, recipe: &TypeRecipe, out: &mut Vec<Box<dyn TypeStrategy>>);

    /// Constructs the cross-cutting read components this module adds to
    /// every read operation. Components are per-operation state; a fresh
    /// set is built each time.
    fn read_components(&self) -> Vec<Box<dyn ReadComponent>> {
        Vec::new()
    }
}

// -----------------------------------------------------------------------------
// StandardModule

/// Materializes the built-in strategies from a recipe's facets.
///
/// The append order below is priority order: identity and polymorphism
/// outrank the value-shaped strategies, text outranks structure. Mutually
/// exclusive pairings are settled later, in the descriptor's
/// late-initialization pass.
#[derive(Default)]
pub struct StandardModule;

impl DomainModule for StandardModule {
    fn name(&self) -> &'static str {
        "standard"
    }

    fn contribute(&self, recipe: &TypeRecipe, out: &mut Vec<Box<dyn TypeStrategy>>) {
        if let Some(facet) = recipe.facets.get::<SharedFacet>() {
            out.push(Box::new(SharedStrategy::new(facet)));
        }
        if let Some(facet) = recipe.facets.get::<BaseFacet>() {
            out.push(Box::new(DispatchStrategy::new(facet)));
        }
        if let Some(facet) = recipe.facets.get::<TextFacet>() {
            out.push(Box::new(TextStrategy::new(facet)));
        }
        if let Some(facet) = recipe.facets.get::<DelegateFacet>() {
            out.push(Box::new(DelegateStrategy::new(facet)));
        }
        if let Some(facet) = recipe.facets.get::<OptionFacet>() {
            out.push(Box::new(OptionStrategy::new(facet)));
        }
        if let Some(facet) = recipe.facets.get::<StructFacet>() {
            out.push(Box::new(PropsStrategy::new(facet)));
        }
        if let Some(facet) = recipe.facets.get::<SeqFacet>() {
            out.push(Box::new(SequenceStrategy::new(facet)));
        }
        if let Some(facet) = recipe.facets.get::<MapFacet>() {
            out.push(Box::new(MapStrategy::new(facet)));
        }
    }
}

// -----------------------------------------------------------------------------
// Auto-registration

/// An auto-registered module constructor, collected at link time.
#[cfg(feature = "auto_register")]
pub struct ModuleRegistration {
    /// Constructs one instance of the module.
    pub construct: fn() -> Box<dyn DomainModule>,
}

#[cfg(feature = "auto_register")]
inventory::collect!(ModuleRegistration);

/// Submits a [`DomainModule`] type for automatic inclusion in every
/// domain built with [`DomainBuilder::finish`](crate::DomainBuilder).
///
/// The type must implement [`Default`].
#[cfg(feature = "auto_register")]
#[macro_export]
macro_rules! submit_module {
    ($ty:ty) => {
        $crate::inventory::submit! {
            $crate::ModuleRegistration {
                construct: || ::std::boxed::Box::new(<$ty as ::core::default::Default>::default()),
            }
        }
    };
}
