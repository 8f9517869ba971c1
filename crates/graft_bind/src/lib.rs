//! A generic binding engine between runtime object graphs and
//! tree-structured documents.
//!
//! Types are described to a [`Domain`] through explicit recipes (see
//! [`bindings`]); reading runs a per-operation scheduler that resolves
//! forward references and shared identity through deferred tasks, and
//! writing is a budgeted recursive descent. The document side is the
//! [`Node`] tree from `graft_doc`; no concrete wire format is assumed.
//!
//! # Examples
//!
//! ```
//! use graft_bind::{bindings, Domain};
//!
//! #[derive(Default, PartialEq, Debug)]
//! struct Save {
//!     tick: u64,
//!     notes: Vec<String>,
//! }
//!
//! let domain = Domain::new();
//! domain.register(bindings::list::<String>("Notes"));
//! domain.register(
//!     bindings::strukt::<Save>("Save")
//!         .field("tick", |s: &Save| &s.tick, |s, v| s.tick = v)
//!         .field("notes", |s: &Save| &s.notes, |s, v| s.notes = v)
//!         .finish(),
//! );
//!
//! let save = Save { tick: 42, notes: vec!["hello".into()] };
//! let node = domain.write(&save).unwrap();
//! assert_eq!(domain.read::<Save>(&node).unwrap(), save);
//! ```

pub mod bindings;
mod builder;
pub mod collections;
mod domain;
mod error;
pub mod hash;
mod info;
mod markers;
mod op;
pub mod recipe;
pub mod strategy;
mod value;

#[cfg(test)]
mod tests;

pub use builder::{BuilderPhase, ObjectBuilder};
pub use domain::{
    Domain, DomainBuilder, DomainConfig, DomainModule, NameLookup, NameResolver,
    RegistryResolver, StandardModule, TagMeaning,
};
pub use error::BindError;
pub use graft_doc::{Attr, Node};
pub use info::{FacetMap, Siblings, StrategySlot, TypeInfo};
pub use markers::Markers;
pub use op::{ComponentRead, ReadComponent, ReadOperation, SetOutcome, Setter, WriteOperation};
pub use recipe::TypeRecipe;
pub use strategy::{StrategyKind, TypeStrategy};
pub use value::Value;

#[cfg(feature = "auto_register")]
pub use domain::ModuleRegistration;

/// Re-exported for the [`submit_module!`] macro.
#[cfg(feature = "auto_register")]
pub use inventory;
