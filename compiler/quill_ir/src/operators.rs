//! Binary and unary operators.
//!
//! Every operator also has a host command alias (`(+)`, `(not)`, ...). The
//! alias is what a partial application such as `? + 1` closes over.

/// Binary operators.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum BinaryOp {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,

    // Comparison
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,

    // Bitwise
    BitAnd,
    BitOr,
    BitXor,
}

impl BinaryOp {
    /// Returns the source-level symbol for this operator.
    pub const fn as_symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Mod => "mod",
            Self::Pow => "^",
            Self::Eq => "==",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::LtEq => "<=",
            Self::Gt => ">",
            Self::GtEq => ">=",
            Self::BitAnd => "&",
            Self::BitOr => "|",
            Self::BitXor => "xor",
        }
    }

    /// Returns the name of the host command implementing this operator.
    pub const fn command_alias(self) -> &'static str {
        match self {
            Self::Add => "(+)",
            Self::Sub => "(-)",
            Self::Mul => "(*)",
            Self::Div => "(/)",
            Self::Mod => "(mod)",
            Self::Pow => "(^)",
            Self::Eq => "(==)",
            Self::NotEq => "(!=)",
            Self::Lt => "(<)",
            Self::LtEq => "(<=)",
            Self::Gt => "(>)",
            Self::GtEq => "(>=)",
            Self::BitAnd => "(&)",
            Self::BitOr => "(|)",
            Self::BitXor => "(xor)",
        }
    }

    /// Returns `true` for comparison operators, which always yield a bool.
    pub const fn is_comparison(self) -> bool {
        matches!(
            self,
            Self::Eq | Self::NotEq | Self::Lt | Self::LtEq | Self::Gt | Self::GtEq
        )
    }
}

/// Unary operators.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum UnaryOp {
    /// Arithmetic negation `-x`.
    Neg,
    /// Logical not `not x`.
    Not,
    /// Ones complement `~x`.
    Complement,
}

impl UnaryOp {
    pub const fn as_symbol(self) -> &'static str {
        match self {
            Self::Neg => "-",
            Self::Not => "not",
            Self::Complement => "~",
        }
    }

    pub const fn command_alias(self) -> &'static str {
        match self {
            Self::Neg => "(-.)",
            Self::Not => "(not)",
            Self::Complement => "(~)",
        }
    }
}
