use core::any::TypeId;
use std::sync::Arc;

use crate::domain::Domain;
use crate::error::BindError;
use crate::info::TypeInfo;
use crate::value::Value;

// -----------------------------------------------------------------------------
// TagMeaning

/// How a sub-read interprets the name of the node it was handed.
///
/// At a document root the node name carries type information and takes
/// part in dynamic resolution. Inside a structure the name is positional,
/// a field name or a reserved marker, and must not be mistaken for a type
/// name; those sub-reads suppress direct name resolution but still apply
/// the single-child unwrapping heuristic for polymorphic targets.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TagMeaning {
    /// The node name may name a type.
    Normal,
    /// The node name is positional; skip direct name resolution.
    Suppressed,
}

// -----------------------------------------------------------------------------
// Resolution

/// Conversion applied to a resolved variant value before delivery.
pub(crate) type WrapFn = Arc<dyn Fn(Value) -> Result<Value, BindError> + Send + Sync>;

/// The outcome of dynamic type resolution for one node.
pub(crate) struct Resolution {
    /// The descriptor to actually read the node as.
    pub(crate) info: Arc<TypeInfo>,
    /// Conversion into the expected base representation, present when the
    /// node resolved to a concrete variant of a polymorphic expected type.
    pub(crate) wrap: Option<WrapFn>,
    /// Child index to descend into before reading, present when the
    /// single-child unwrapping heuristic fired.
    pub(crate) descend: Option<usize>,
}

impl Resolution {
    pub(crate) fn direct(info: Arc<TypeInfo>) -> Self {
        Self {
            info,
            wrap: None,
            descend: None,
        }
    }
}

// -----------------------------------------------------------------------------
// NameResolver

/// Verdict of a node-name lookup.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NameLookup {
    /// The name names exactly one registered type.
    Found(TypeId),
    /// The name is not a registered type name.
    Unknown,
    /// Two or more registered types share this name; resolving it to
    /// either would be a silent guess.
    Ambiguous,
}

/// Maps node names to registered types.
///
/// The default implementation consults the domain's name index; a custom
/// resolver can layer aliases or legacy names on top of it.
pub trait NameResolver: Send + Sync {
    /// Resolves one node name.
    fn resolve(&self, domain: &Domain, name: &str) -> NameLookup;
}

/// The default resolver: an exact lookup in the domain's name index.
#[derive(Default)]
pub struct RegistryResolver;

impl NameResolver for RegistryResolver {
    fn resolve(&self, domain: &Domain, name: &str) -> NameLookup {
        domain.lookup_name(name)
    }
}
