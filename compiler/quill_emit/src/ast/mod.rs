//! The tree the compiler optimizes and emits.
//!
//! Expressions and statements are closed sum types; every concern
//! (optimization, emission, placeholder detection) is an exhaustive match.
//! Children are owned. Rewrites replace a child slot with a new subtree
//! instead of mutating shared nodes.

mod stmt;

pub use stmt::{Block, ReturnVariant, Stmt, StmtKind};

use quill_ir::{Access, BinaryOp, Constant, EntityRef, LiteralType, ModuleName, Position, UnaryOp};
use quill_symbols::{Symbol, SymbolKind};

use crate::ArgumentsProxy;

/// Whether emitted code must leave a value on the stack.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum StackSemantics {
    /// Leave exactly one value.
    Value,
    /// Leave the stack as it was.
    Effect,
}

/// An expression node.
#[derive(Clone, Debug, PartialEq)]
pub struct Expr {
    pub position: Position,
    pub kind: ExprKind,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ExprKind {
    Constant(Constant),
    /// A missing argument, optionally with an explicit 0-based slot.
    Placeholder { index: Option<u8> },
    /// A name not yet resolved against the scope chain.
    Identifier {
        name: String,
        access: Access,
        arguments: ArgumentsProxy,
    },
    /// Access through a resolved symbol. With `Access::Set` the last
    /// argument is the assigned value.
    Symbol {
        access: Access,
        symbol: Symbol,
        arguments: ArgumentsProxy,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    /// Lazy `and` over two or more operands.
    LogicalAnd(Vec<Expr>),
    /// Lazy `or` over two or more operands.
    LogicalOr(Vec<Expr>),
    /// First operand that is not null.
    Coalescence(Vec<Expr>),
    /// `condition ? then : otherwise`, or the reverse when `negative`.
    Conditional {
        condition: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
        negative: bool,
    },
    StringConcat(Vec<Expr>),
    /// A type used as a value.
    Type(TypeExpr),
    TypeCheck {
        subject: Box<Expr>,
        ty: Box<Expr>,
    },
    TypeCast {
        subject: Box<Expr>,
        ty: Box<Expr>,
    },
    List(Vec<Expr>),
    Hash(Vec<(Expr, Expr)>),
    /// Call whatever `subject` evaluates to.
    IndirectCall {
        subject: Box<Expr>,
        access: Access,
        arguments: ArgumentsProxy,
    },
    MemberCall {
        subject: Box<Expr>,
        member: String,
        access: Access,
        arguments: ArgumentsProxy,
    },
    StaticCall {
        type_name: String,
        member: String,
        access: Access,
        arguments: ArgumentsProxy,
    },
    ObjectCreation {
        type_name: String,
        arguments: ArgumentsProxy,
    },
    CreateClosure {
        id: String,
        module: ModuleName,
    },
    Block(Box<Block>),
    Throw(Box<Expr>),
    /// The exception currently being handled.
    Exception,
}

/// A type expression.
#[derive(Clone, Debug, PartialEq)]
pub enum TypeExpr {
    /// Known at compile time.
    Literal(LiteralType),
    /// Constructed at runtime from a name and argument values.
    Dynamic { name: String, arguments: Vec<Expr> },
}

impl TypeExpr {
    pub fn name(&self) -> String {
        match self {
            TypeExpr::Literal(ty) => ty.to_string(),
            TypeExpr::Dynamic { name, .. } => name.clone(),
        }
    }
}

impl Expr {
    pub fn new(position: Position, kind: ExprKind) -> Self {
        Expr { position, kind }
    }

    pub fn constant(position: Position, value: impl Into<Constant>) -> Self {
        Expr::new(position, ExprKind::Constant(value.into()))
    }

    pub fn null(position: Position) -> Self {
        Expr::new(position, ExprKind::Constant(Constant::Null))
    }

    pub fn placeholder(position: Position, index: Option<u8>) -> Self {
        Expr::new(position, ExprKind::Placeholder { index })
    }

    pub fn identifier(position: Position, name: impl Into<String>) -> Self {
        Expr::identifier_call(position, name, Access::Get, Vec::new())
    }

    pub fn identifier_call(
        position: Position,
        name: impl Into<String>,
        access: Access,
        arguments: Vec<Expr>,
    ) -> Self {
        Expr::new(
            position,
            ExprKind::Identifier {
                name: name.into(),
                access,
                arguments: arguments.into(),
            },
        )
    }

    pub fn symbol(position: Position, access: Access, symbol: Symbol, arguments: Vec<Expr>) -> Self {
        Expr::new(
            position,
            ExprKind::Symbol {
                access,
                symbol,
                arguments: arguments.into(),
            },
        )
    }

    /// Read a variable or call a callable entity.
    pub fn call(position: Position, entity: EntityRef, arguments: Vec<Expr>) -> Self {
        let symbol = Symbol::call(entity, position.clone());
        Expr::symbol(position, Access::Get, symbol, arguments)
    }

    /// Assign `value` through `entity`.
    pub fn assign(position: Position, entity: EntityRef, value: Expr) -> Self {
        let symbol = Symbol::call(entity, position.clone());
        Expr::symbol(position, Access::Set, symbol, vec![value])
    }

    /// A reference to an entity, not its value.
    pub fn reference(position: Position, entity: EntityRef) -> Self {
        let symbol = Symbol::reference(entity, position.clone());
        Expr::symbol(position, Access::Get, symbol, Vec::new())
    }

    pub fn binary(position: Position, op: BinaryOp, left: Expr, right: Expr) -> Self {
        Expr::new(
            position,
            ExprKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
        )
    }

    pub fn unary(position: Position, op: UnaryOp, operand: Expr) -> Self {
        Expr::new(
            position,
            ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
        )
    }

    /// `a and b and ...`; nested `and` chains are flattened.
    pub fn and(position: Position, operands: Vec<Expr>) -> Self {
        let mut flat = Vec::with_capacity(operands.len());
        for operand in operands {
            match operand.kind {
                ExprKind::LogicalAnd(inner) => flat.extend(inner),
                kind => flat.push(Expr::new(operand.position, kind)),
            }
        }
        Expr::new(position, ExprKind::LogicalAnd(flat))
    }

    /// `a or b or ...`; nested `or` chains are flattened.
    pub fn or(position: Position, operands: Vec<Expr>) -> Self {
        let mut flat = Vec::with_capacity(operands.len());
        for operand in operands {
            match operand.kind {
                ExprKind::LogicalOr(inner) => flat.extend(inner),
                kind => flat.push(Expr::new(operand.position, kind)),
            }
        }
        Expr::new(position, ExprKind::LogicalOr(flat))
    }

    pub fn coalescence(position: Position, operands: Vec<Expr>) -> Self {
        Expr::new(position, ExprKind::Coalescence(operands))
    }

    pub fn conditional(position: Position, condition: Expr, then: Expr, otherwise: Expr) -> Self {
        Expr::new(
            position,
            ExprKind::Conditional {
                condition: Box::new(condition),
                then: Box::new(then),
                otherwise: Box::new(otherwise),
                negative: false,
            },
        )
    }

    pub fn concat(position: Position, arguments: Vec<Expr>) -> Self {
        Expr::new(position, ExprKind::StringConcat(arguments))
    }

    pub fn literal_type(position: Position, ty: LiteralType) -> Self {
        Expr::new(position, ExprKind::Type(TypeExpr::Literal(ty)))
    }

    pub fn type_check(position: Position, subject: Expr, ty: Expr) -> Self {
        Expr::new(
            position,
            ExprKind::TypeCheck {
                subject: Box::new(subject),
                ty: Box::new(ty),
            },
        )
    }

    pub fn type_cast(position: Position, subject: Expr, ty: Expr) -> Self {
        Expr::new(
            position,
            ExprKind::TypeCast {
                subject: Box::new(subject),
                ty: Box::new(ty),
            },
        )
    }

    pub fn list(position: Position, elements: Vec<Expr>) -> Self {
        Expr::new(position, ExprKind::List(elements))
    }

    pub fn indirect_call(position: Position, subject: Expr, arguments: Vec<Expr>) -> Self {
        Expr::new(
            position,
            ExprKind::IndirectCall {
                subject: Box::new(subject),
                access: Access::Get,
                arguments: arguments.into(),
            },
        )
    }

    pub fn member_call(
        position: Position,
        subject: Expr,
        member: impl Into<String>,
        access: Access,
        arguments: Vec<Expr>,
    ) -> Self {
        Expr::new(
            position,
            ExprKind::MemberCall {
                subject: Box::new(subject),
                member: member.into(),
                access,
                arguments: arguments.into(),
            },
        )
    }

    pub fn block(block: Block) -> Self {
        Expr::new(block.position.clone(), ExprKind::Block(Box::new(block)))
    }

    pub fn throw(position: Position, exception: Expr) -> Self {
        Expr::new(position, ExprKind::Throw(Box::new(exception)))
    }

    #[inline]
    pub fn is_placeholder(&self) -> bool {
        matches!(self.kind, ExprKind::Placeholder { .. })
    }

    pub fn as_constant(&self) -> Option<&Constant> {
        match &self.kind {
            ExprKind::Constant(c) => Some(c),
            _ => None,
        }
    }

    pub fn is_null_constant(&self) -> bool {
        matches!(self.kind, ExprKind::Constant(Constant::Null))
    }

    /// Check if the value is a string without evaluating anything.
    pub fn has_static_string_type(&self) -> bool {
        match &self.kind {
            ExprKind::Constant(Constant::String(_)) | ExprKind::StringConcat(_) => true,
            ExprKind::TypeCast { ty, .. } => {
                matches!(ty.kind, ExprKind::Type(TypeExpr::Literal(LiteralType::String)))
            }
            _ => false,
        }
    }

    /// Whether this node can become a partial application.
    pub fn is_partially_applicable(&self) -> bool {
        match &self.kind {
            ExprKind::Binary { .. }
            | ExprKind::Unary { .. }
            | ExprKind::StringConcat(_)
            | ExprKind::TypeCheck { .. }
            | ExprKind::TypeCast { .. }
            | ExprKind::List(_)
            | ExprKind::IndirectCall { .. }
            | ExprKind::MemberCall { .. }
            | ExprKind::StaticCall { .. }
            | ExprKind::ObjectCreation { .. } => true,
            ExprKind::Symbol { access, symbol, .. } => {
                *access == Access::Get && is_callable_symbol(symbol)
            }
            _ => false,
        }
    }

    /// Check if an immediate operand is a placeholder.
    ///
    /// Must agree with the operand list partial application lowers.
    pub fn check_for_placeholders(&self) -> bool {
        let any = |exprs: &[Expr]| exprs.iter().any(Expr::is_placeholder);
        match &self.kind {
            ExprKind::Binary { left, right, .. } => left.is_placeholder() || right.is_placeholder(),
            ExprKind::Unary { operand, .. } => operand.is_placeholder(),
            ExprKind::StringConcat(args) | ExprKind::List(args) => any(args),
            ExprKind::TypeCheck { subject, ty } | ExprKind::TypeCast { subject, ty } => {
                subject.is_placeholder() || ty.is_placeholder()
            }
            ExprKind::IndirectCall {
                subject, arguments, ..
            }
            | ExprKind::MemberCall {
                subject, arguments, ..
            } => subject.is_placeholder() || any(arguments.as_slice()),
            ExprKind::StaticCall { arguments, .. }
            | ExprKind::ObjectCreation { arguments, .. }
            | ExprKind::Symbol { arguments, .. } => any(arguments.as_slice()),
            _ => false,
        }
    }

    /// A copy of an assignable node with a different access and no
    /// assigned value. `None` if the node cannot be assigned to.
    pub fn with_access(&self, access: Access) -> Option<Expr> {
        let mut copy = self.clone();
        match &mut copy.kind {
            ExprKind::Identifier { access: a, .. }
            | ExprKind::Symbol { access: a, .. }
            | ExprKind::IndirectCall { access: a, .. }
            | ExprKind::MemberCall { access: a, .. }
            | ExprKind::StaticCall { access: a, .. } => *a = access,
            _ => return None,
        }
        Some(copy)
    }

    /// Append `value` to an assignable node's arguments.
    pub fn push_argument(&mut self, value: Expr) -> bool {
        match &mut self.kind {
            ExprKind::Identifier { arguments, .. }
            | ExprKind::Symbol { arguments, .. }
            | ExprKind::IndirectCall { arguments, .. }
            | ExprKind::MemberCall { arguments, .. }
            | ExprKind::StaticCall { arguments, .. } => {
                arguments.push(value);
                true
            }
            _ => false,
        }
    }

    /// A copy of this node that stores `value` into whatever it reads, or
    /// `None` when the node is not assignable.
    pub fn assigning(&self, value: Expr) -> Option<Expr> {
        let mut assignment = self.with_access(Access::Set)?;
        assignment.push_argument(value).then_some(assignment)
    }
}

/// Check if accessing through `symbol` is a call or read that partial
/// application can capture.
pub(crate) fn is_callable_symbol(symbol: &Symbol) -> bool {
    let (_, symbol) = symbol.split_messages();
    match symbol.kind() {
        SymbolKind::Dereference(inner) => {
            let (_, inner) = inner.split_messages();
            match inner.kind() {
                SymbolKind::Reference(EntityRef::MacroCommand { .. }) => false,
                SymbolKind::Reference(_) | SymbolKind::Dereference(_) => true,
                _ => false,
            }
        }
        _ => false,
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    reason = "tests use unwrap to panic on unexpected state"
)]
