//! Quill Emit - tree optimization and bytecode emission.
//!
//! This crate turns a parsed function body into instructions for a stack
//! machine. It takes the body through three steps:
//! - **Optimization**: constant folding, neutral elements, string
//!   concatenation flattening and short-circuit simplification, each node
//!   rewritten to a fixpoint
//! - **Tail calls**: trailing calls become returns, and self-recursive
//!   returns become parameter overwrites plus a jump to the entry
//! - **Emission**: every node emits in value or effect mode through an
//!   [`Emitter`]; nodes holding placeholders lower to partial applications
//!
//! Names resolve through the `quill_symbols` scope chain. User mistakes go
//! to a [`quill_diagnostic::DiagnosticSink`] and compilation carries on;
//! compiler bugs surface as [`InternalError`].

mod arguments;
pub mod ast;
mod context;
mod driver;
mod emit;
mod error;
mod macros;
mod optimize;
mod options;
mod partial;
mod stack;
mod stmt;
mod tail_call;
mod target;
mod values;

pub use arguments::ArgumentsProxy;
pub use ast::{Block, Expr, ExprKind, ReturnVariant, StackSemantics, Stmt, StmtKind, TypeExpr};
pub use context::{CompileContext, ForeachHint, FunctionInfo};
pub use driver::compile_function;
pub use error::InternalError;
pub use macros::{MacroHost, MacroInvocation, NoMacros};
pub use options::CompilerOptions;
pub use partial::{assign_indices, PartialArg, Slot};
pub use stack::ensure_sufficient_stack;
pub use target::{CodeBuffer, Emitter, LabelGenerator, TryRegion};
pub use values::{DynamicValueModel, ValueModel};
