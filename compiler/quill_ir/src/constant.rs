//! Literal runtime values and literal types.

use std::fmt;
use std::hash::{Hash, Hasher};

/// A literal value known at compile time.
///
/// `Real` compares and hashes by bit pattern, so `NaN == NaN` here and
/// `0.0 != -0.0`. That is the right notion of identity for a constant
/// pool, not for runtime arithmetic.
#[derive(Clone, Debug)]
pub enum Constant {
    Null,
    Bool(bool),
    Int(i64),
    Real(f64),
    String(String),
}

impl Constant {
    pub fn string(s: impl Into<String>) -> Self {
        Constant::String(s.into())
    }

    /// The literal type of this value.
    pub fn literal_type(&self) -> LiteralType {
        match self {
            Constant::Null => LiteralType::Null,
            Constant::Bool(_) => LiteralType::Bool,
            Constant::Int(_) => LiteralType::Int,
            Constant::Real(_) => LiteralType::Real,
            Constant::String(_) => LiteralType::String,
        }
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Constant::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Constant::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Constant::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Constant::Int(n) => Some(*n),
            _ => None,
        }
    }
}

impl PartialEq for Constant {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Constant::Null, Constant::Null) => true,
            (Constant::Bool(a), Constant::Bool(b)) => a == b,
            (Constant::Int(a), Constant::Int(b)) => a == b,
            (Constant::Real(a), Constant::Real(b)) => a.to_bits() == b.to_bits(),
            (Constant::String(a), Constant::String(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Constant {}

impl Hash for Constant {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Constant::Null => {}
            Constant::Bool(b) => b.hash(state),
            Constant::Int(n) => n.hash(state),
            Constant::Real(r) => r.to_bits().hash(state),
            Constant::String(s) => s.hash(state),
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Null => f.write_str("null"),
            Constant::Bool(b) => write!(f, "{b}"),
            Constant::Int(n) => write!(f, "{n}"),
            Constant::Real(r) => write!(f, "{r:?}"),
            Constant::String(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<bool> for Constant {
    fn from(b: bool) -> Self {
        Constant::Bool(b)
    }
}

impl From<i64> for Constant {
    fn from(n: i64) -> Self {
        Constant::Int(n)
    }
}

impl From<i32> for Constant {
    fn from(n: i32) -> Self {
        Constant::Int(i64::from(n))
    }
}

impl From<f64> for Constant {
    fn from(r: f64) -> Self {
        Constant::Real(r)
    }
}

impl From<&str> for Constant {
    fn from(s: &str) -> Self {
        Constant::String(s.to_owned())
    }
}

/// A type known by name at compile time, used by casts and type checks.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub enum LiteralType {
    Null,
    Bool,
    Int,
    Real,
    String,
    List,
    Hash,
    /// A host object type, identified by its type name.
    Object(String),
}

impl LiteralType {
    /// Check if values of this type can be literal constants.
    pub fn is_constant_type(&self) -> bool {
        matches!(
            self,
            LiteralType::Null
                | LiteralType::Bool
                | LiteralType::Int
                | LiteralType::Real
                | LiteralType::String
        )
    }
}

impl fmt::Display for LiteralType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LiteralType::Null => f.write_str("Null"),
            LiteralType::Bool => f.write_str("Bool"),
            LiteralType::Int => f.write_str("Int"),
            LiteralType::Real => f.write_str("Real"),
            LiteralType::String => f.write_str("String"),
            LiteralType::List => f.write_str("List"),
            LiteralType::Hash => f.write_str("Hash"),
            LiteralType::Object(name) => write!(f, "Object(\"{name}\")"),
        }
    }
}
