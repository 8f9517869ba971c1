//! Facade crate for the `graft` workspace.
//!
//! `graft` converts in-memory object graphs to a tree-structured document
//! (elements, attributes, text) and back, without requiring the bound types
//! to know about serialization. See [`graft_bind`] for the binding engine
//! and [`graft_doc`] for the document tree.

pub use graft_bind as bind;
pub use graft_doc as doc;
