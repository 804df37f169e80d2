#![allow(clippy::option_if_let_else)]

//! # Ziglens Semantic Analysis
//!
//! Semantic core of the analyzer: a definition-use chain built from the parser's
//! syntax tree, with a type system that folds comptime-known values.
//!
//! ## Architecture
//!
//! Analysis of one document is a [`ParseJob`]:
//! 1. **Parse**: the [`ParseSession`] owns the source, its AST and side tables
//! 2. **Prebuild**: declarations and scopes with whatever types are known
//! 3. **Build**: the same walk again, now resolving forward references
//! 4. **Uses**: every reference linked to its declaration, type checks reported
//! 5. **Publish**: the new [`TopDuContext`] replaces the old one in the [`DuChain`]
//!
//! Imports of documents that were not analyzed yet evaluate to a delayed module
//! type and ask the [`DependencyScheduler`] for the target; once the target is
//! published the importer is analyzed again.

pub mod builders;
pub mod completion;
pub mod duchain;
pub mod helpers;
pub mod identifier;
pub mod parse_job;
pub mod session;
pub mod types;
pub mod visitor;

pub use completion::{complete, CompletionItem, CompletionKind};
pub use duchain::{
    ChainView, ClassType, ContextHandle, ContextId, ContextKind, ContextRef, DeclFlags, DeclHandle,
    DeclId, DeclRef, Declaration, DeclarationKind, DuChain, DuContext, FileId, TopDuContext,
    TopFeatures, TopHandle, Use,
};
pub use helpers::{access_attribute, declaration_for_name};
pub use identifier::{Identifier, QualifiedIdentifier};
pub use parse_job::{
    analyze_source, AnalysisError, DependencyScheduler, JobOutcome, NoScheduler, ParseJob,
};
pub use session::ParseSession;
pub use types::{can_type_be_assigned, merge_types, Modifiers, Type, TypeKind};
