//! # Definition-Use Chain
//!
//! The chain is the process-wide store of analysis results. Each analyzed file owns
//! one [`TopDuContext`] holding every scope ([`DuContext`]) and [`Declaration`] of
//! that file in flat index vectors.
//!
//! Entities never point at each other directly. A scope names its parent and
//! children by [`ContextId`], a type names its declaration by [`DeclRef`], an
//! imported scope in another file is a [`ContextRef`]. Every lookup through an id
//! is bounds-checked, so a reference into a file that was re-analyzed in the
//! meantime resolves to `None` instead of panicking.
//!
//! ## Concurrency
//!
//! [`DuChain`] keeps the published top contexts behind one reader-writer lock.
//! A job builds its file's top context privately and publishes it by swapping an
//! `Arc` under a single write section; readers clone the `Arc` under the read lock
//! and traverse the snapshot without holding any lock.

mod context;
mod declaration;
mod store;

pub use context::{ContextKind, DuContext, TopDuContext, TopFeatures, Use};
pub use declaration::{ClassType, DeclFlags, Declaration, DeclarationKind};
pub use store::{ChainView, ContextHandle, DeclHandle, DuChain, TopHandle};

index_vec::define_index_type! {
    /// A file registered in the chain, stable for the lifetime of the process.
    pub struct FileId = u32;
}

index_vec::define_index_type! {
    /// A scope within one top context. The file's root scope is always `0`.
    pub struct ContextId = u32;
}

index_vec::define_index_type! {
    /// A declaration within one top context.
    pub struct DeclId = u32;
}

/// A declaration in any file of the chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DeclRef {
    pub file: FileId,
    pub decl: DeclId,
}

impl DeclRef {
    pub const fn new(file: FileId, decl: DeclId) -> Self {
        Self { file, decl }
    }
}

/// A scope in any file of the chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ContextRef {
    pub file: FileId,
    pub ctx: ContextId,
}

impl ContextRef {
    pub const fn new(file: FileId, ctx: ContextId) -> Self {
        Self { file, ctx }
    }
}
