//! Quill IR - shared value types for the compiler back end.
//!
//! This crate holds the small, immutable vocabulary every other Quill crate
//! speaks:
//! - [`Position`] source coordinates attached to every node and diagnostic
//! - [`EntityRef`] compile-time-known callables and storage locations
//! - [`Constant`] literal runtime values and [`LiteralType`] literal types
//! - [`BinaryOp`] / [`UnaryOp`] operators
//! - [`Instruction`] the instruction set handed to an emitter
//!
//! # Design Philosophy
//!
//! - **Values, not handles**: every type here is a plain value compared by
//!   structural equality. Nothing is interned and nothing is shared-mutable.
//! - **Floats by bits**: `Constant::Real` compares and hashes by its bit
//!   pattern so constants can key hash maps.

mod constant;
mod entity;
mod instruction;
mod operators;
mod position;

pub use constant::{Constant, LiteralType};
pub use entity::{EntityRef, ModuleName, VariableRef};
pub use instruction::{Access, CallKind, Instruction, JumpTarget, ReturnKind};
pub use operators::{BinaryOp, UnaryOp};
pub use position::Position;
