//! Builders run by a parse job, in order: two declaration passes, then the use
//! pass. Expression and function visitors are shared by all of them.

pub mod declarations;
pub mod expression;
pub mod fold;
pub mod function;
pub mod uses;
