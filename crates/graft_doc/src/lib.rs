//! The document tree collaborator of the `graft` workspace.
//!
//! A document is a tree of named [`Node`]s, each carrying an ordered
//! attribute list, an ordered child list and a text payload. The binding
//! engine in `graft_bind` only ever *queries* trees it was handed and only
//! ever *constructs* trees it returns; it never mutates a host tree it did
//! not create.
//!
//! Parsing and emitting a concrete wire encoding is out of scope for this
//! crate. The [`Display`](core::fmt::Display) impl on [`Node`] renders an
//! XML-like layout for debugging and test assertions only.

// -----------------------------------------------------------------------------
// Modules

mod node;

// -----------------------------------------------------------------------------
// Exports

pub use node::{Attr, Node};
