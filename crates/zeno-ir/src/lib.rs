#![doc = include_str!("../README.md")]

//! The zeno intermediate representation.
//!
//! This crate defines the document IR populated by syntactic front-ends
//! through the [`builder::Builder`] contract: the type algebra, symbols and
//! frames, expressions and statements, the template instantiation engine,
//! and the visitor used to run external passes such as the type checker.

pub mod builder;
pub mod diagnostic;
pub mod document;
pub mod expression;
pub mod instantiation;
pub mod intern;
pub mod position;
#[cfg(any(test, feature = "proptest"))]
pub mod proptest_generators;
pub mod statement;
pub mod symbol;
pub mod types;
pub mod visitor;

pub use builder::{BuildError, Builder, ScopeRef};
pub use diagnostic::{Diagnostic, DiagnosticKind, Severity};
pub use document::Document;
pub use expression::Expression;
pub use position::Position;
pub use types::{Type, TypeKind};
