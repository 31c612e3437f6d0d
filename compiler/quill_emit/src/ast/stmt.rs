//! Statements and blocks.

use quill_ir::{JumpTarget, Position};
use quill_symbols::Symbol;

use super::Expr;

/// A statement node.
#[derive(Clone, Debug, PartialEq)]
pub struct Stmt {
    pub position: Position,
    pub kind: StmtKind,
}

#[derive(Clone, Debug, PartialEq)]
pub enum StmtKind {
    /// An expression evaluated for its effect.
    Expr(Expr),
    Block(Block),
    Condition {
        condition: Expr,
        if_block: Block,
        else_block: Block,
        /// Run `if_block` when the condition is false.
        negative: bool,
    },
    While {
        condition: Expr,
        body: Block,
        /// Test before the first iteration.
        is_precondition: bool,
        /// Loop while the condition holds, rather than until it does.
        positive: bool,
    },
    For {
        initialize: Block,
        condition: Expr,
        next_iteration: Block,
        body: Block,
        is_precondition: bool,
        positive: bool,
    },
    /// `foreach element in list`. The parser fills both halves in
    /// separate steps; emitting an unfinished loop is an internal error.
    Foreach {
        element: Option<Expr>,
        list: Option<Expr>,
        body: Block,
    },
    Return {
        variant: ReturnVariant,
        value: Option<Expr>,
    },
    TryCatchFinally {
        try_block: Block,
        catch_block: Block,
        /// Assignable node the caught exception is written to.
        exception_var: Option<Expr>,
        finally_block: Block,
    },
    /// `using target = resource { body }`.
    Using {
        target: Option<Expr>,
        resource: Option<Expr>,
        body: Block,
    },
    Goto(JumpTarget),
    Label(String),
    Break,
    Continue,
}

/// The four ways a function body hands control back.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum ReturnVariant {
    /// Leave the function, optionally with a value.
    Exit,
    /// Set the result without leaving.
    Set,
    /// Yield a value and keep going.
    Continue,
    /// Leave without a value.
    Break,
}

impl Stmt {
    pub fn new(position: Position, kind: StmtKind) -> Self {
        Stmt { position, kind }
    }

    pub fn expr(expr: Expr) -> Self {
        Stmt::new(expr.position.clone(), StmtKind::Expr(expr))
    }

    pub fn block(block: Block) -> Self {
        Stmt::new(block.position.clone(), StmtKind::Block(block))
    }

    pub fn condition(position: Position, condition: Expr, if_block: Block, else_block: Block) -> Self {
        Stmt::new(
            position,
            StmtKind::Condition {
                condition,
                if_block,
                else_block,
                negative: false,
            },
        )
    }

    /// `while condition { body }`.
    pub fn while_loop(position: Position, condition: Expr, body: Block) -> Self {
        Stmt::new(
            position,
            StmtKind::While {
                condition,
                body,
                is_precondition: true,
                positive: true,
            },
        )
    }

    pub fn ret(position: Position, variant: ReturnVariant, value: Option<Expr>) -> Self {
        Stmt::new(position, StmtKind::Return { variant, value })
    }

    pub fn goto(position: Position, label: impl Into<String>) -> Self {
        Stmt::new(position, StmtKind::Goto(JumpTarget::Label(label.into())))
    }

    pub fn label(position: Position, label: impl Into<String>) -> Self {
        Stmt::new(position, StmtKind::Label(label.into()))
    }

    /// Check if this statement is nothing but an unconditional jump.
    pub fn is_jump(&self) -> bool {
        matches!(
            self.kind,
            StmtKind::Goto(_) | StmtKind::Break | StmtKind::Continue
        )
    }
}

/// A sequence of statements with an optional trailing value.
///
/// `declarations` open a scope for the statements of this block.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Block {
    pub position: Position,
    pub statements: Vec<Stmt>,
    pub expression: Option<Box<Expr>>,
    pub declarations: Vec<(String, Symbol)>,
}

impl Block {
    pub fn new(position: Position) -> Self {
        Block {
            position,
            ..Block::default()
        }
    }

    pub fn with_statements(position: Position, statements: Vec<Stmt>) -> Self {
        Block {
            position,
            statements,
            ..Block::default()
        }
    }

    #[must_use]
    pub fn with_expression(mut self, expression: Expr) -> Self {
        self.expression = Some(Box::new(expression));
        self
    }

    /// Declare `name` for the statements of this block.
    pub fn declare(&mut self, name: impl Into<String>, symbol: Symbol) {
        self.declarations.push((name.into(), symbol));
    }

    pub fn push(&mut self, statement: Stmt) {
        self.statements.push(statement);
    }

    /// No statements and no trailing value.
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty() && self.expression.is_none()
    }

    /// The only statement, if this block is a single unconditional jump.
    pub fn single_jump(&self) -> Option<&Stmt> {
        match self.statements.as_slice() {
            [stmt] if self.expression.is_none() && self.declarations.is_empty() && stmt.is_jump() => {
                Some(stmt)
            }
            _ => None,
        }
    }
}
