//! The runtime value model used for constant folding.
//!
//! Folding has to compute exactly what the virtual machine would compute,
//! so the compiler never evaluates operators itself: it asks a
//! [`ValueModel`]. Every method returns `None` when the model declines,
//! which means "leave the expression for runtime". A declined fold is a
//! missed optimization, never an error.

use quill_ir::{BinaryOp, Constant, LiteralType, UnaryOp};

/// Operator and conversion semantics of the target runtime.
pub trait ValueModel {
    fn binary(&self, op: BinaryOp, left: &Constant, right: &Constant) -> Option<Constant>;

    fn unary(&self, op: UnaryOp, operand: &Constant) -> Option<Constant>;

    /// Convert `value` to `ty`, as a cast would.
    fn convert(&self, value: &Constant, ty: &LiteralType) -> Option<Constant>;

    /// Whether `value` is an instance of `ty`, as a type check would.
    fn is_instance(&self, value: &Constant, ty: &LiteralType) -> Option<bool>;

    /// How a conditional jump reads `value`.
    fn truthiness(&self, value: &Constant) -> Option<bool>;

    /// The string conversion used by string concatenation.
    fn stringify(&self, value: &Constant) -> Option<String>;
}

/// The dynamic value model: null, bool, int, real and string.
///
/// - Int arithmetic is checked. Overflow declines.
/// - Int division truncates. Division or modulo by zero declines.
/// - `+` with a string operand concatenates string conversions.
/// - Mixed int/real arithmetic and comparisons promote to real.
/// - `^` on ints with a non-negative exponent stays int, otherwise real.
#[derive(Copy, Clone, Debug, Default)]
pub struct DynamicValueModel;

impl DynamicValueModel {
    #[expect(clippy::cast_precision_loss, reason = "int to real promotion")]
    fn numeric(value: &Constant) -> Option<f64> {
        match value {
            Constant::Int(n) => Some(*n as f64),
            Constant::Real(r) => Some(*r),
            _ => None,
        }
    }

    fn arithmetic(op: BinaryOp, left: &Constant, right: &Constant) -> Option<Constant> {
        match (op, left, right) {
            (BinaryOp::Add, Constant::Int(a), Constant::Int(b)) => {
                a.checked_add(*b).map(Constant::Int)
            }
            (BinaryOp::Sub, Constant::Int(a), Constant::Int(b)) => {
                a.checked_sub(*b).map(Constant::Int)
            }
            (BinaryOp::Mul, Constant::Int(a), Constant::Int(b)) => {
                a.checked_mul(*b).map(Constant::Int)
            }
            // Division by zero is a runtime error; leave it to runtime.
            (BinaryOp::Div | BinaryOp::Mod, _, Constant::Int(0)) => None,
            (BinaryOp::Div | BinaryOp::Mod, _, Constant::Real(r)) if *r == 0.0 => None,
            (BinaryOp::Div, Constant::Int(a), Constant::Int(b)) => {
                a.checked_div(*b).map(Constant::Int)
            }
            (BinaryOp::Mod, Constant::Int(a), Constant::Int(b)) => {
                a.checked_rem(*b).map(Constant::Int)
            }
            (BinaryOp::Pow, Constant::Int(a), Constant::Int(b)) if *b >= 0 => {
                let exponent = u32::try_from(*b).ok()?;
                a.checked_pow(exponent).map(Constant::Int)
            }
            _ => {
                let a = Self::numeric(left)?;
                let b = Self::numeric(right)?;
                let result = match op {
                    BinaryOp::Add => a + b,
                    BinaryOp::Sub => a - b,
                    BinaryOp::Mul => a * b,
                    BinaryOp::Div => a / b,
                    BinaryOp::Mod => a % b,
                    BinaryOp::Pow => a.powf(b),
                    _ => return None,
                };
                Some(Constant::Real(result))
            }
        }
    }

    fn compare(op: BinaryOp, left: &Constant, right: &Constant) -> Option<Constant> {
        use std::cmp::Ordering;

        let ordering = match (left, right) {
            (Constant::Int(a), Constant::Int(b)) => Some(a.cmp(b)),
            (Constant::String(a), Constant::String(b)) => Some(a.cmp(b)),
            (Constant::Bool(a), Constant::Bool(b)) => Some(a.cmp(b)),
            (Constant::Null, Constant::Null) => Some(Ordering::Equal),
            _ => match (Self::numeric(left), Self::numeric(right)) {
                (Some(a), Some(b)) => a.partial_cmp(&b),
                _ => None,
            },
        };

        let result = match (op, ordering) {
            (BinaryOp::Eq, Some(o)) => o == Ordering::Equal,
            (BinaryOp::NotEq, Some(o)) => o != Ordering::Equal,
            // Values of unrelated types are never equal.
            (BinaryOp::Eq, None) => false,
            (BinaryOp::NotEq, None) => true,
            (BinaryOp::Lt, Some(o)) => o == Ordering::Less,
            (BinaryOp::LtEq, Some(o)) => o != Ordering::Greater,
            (BinaryOp::Gt, Some(o)) => o == Ordering::Greater,
            (BinaryOp::GtEq, Some(o)) => o != Ordering::Less,
            _ => return None,
        };
        // Null and bool only support equality.
        if !matches!(op, BinaryOp::Eq | BinaryOp::NotEq)
            && matches!(left, Constant::Null | Constant::Bool(_))
        {
            return None;
        }
        Some(Constant::Bool(result))
    }
}

impl ValueModel for DynamicValueModel {
    fn binary(&self, op: BinaryOp, left: &Constant, right: &Constant) -> Option<Constant> {
        match op {
            BinaryOp::Add
                if matches!(left, Constant::String(_)) || matches!(right, Constant::String(_)) =>
            {
                let mut s = self.stringify(left)?;
                s.push_str(&self.stringify(right)?);
                Some(Constant::String(s))
            }
            BinaryOp::Add
            | BinaryOp::Sub
            | BinaryOp::Mul
            | BinaryOp::Div
            | BinaryOp::Mod
            | BinaryOp::Pow => Self::arithmetic(op, left, right),
            _ if op.is_comparison() => Self::compare(op, left, right),
            BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor => match (left, right) {
                (Constant::Int(a), Constant::Int(b)) => Some(Constant::Int(match op {
                    BinaryOp::BitAnd => a & b,
                    BinaryOp::BitOr => a | b,
                    _ => a ^ b,
                })),
                (Constant::Bool(a), Constant::Bool(b)) => Some(Constant::Bool(match op {
                    BinaryOp::BitAnd => *a & *b,
                    BinaryOp::BitOr => *a | *b,
                    _ => *a ^ *b,
                })),
                _ => None,
            },
            _ => None,
        }
    }

    fn unary(&self, op: UnaryOp, operand: &Constant) -> Option<Constant> {
        match (op, operand) {
            (UnaryOp::Neg, Constant::Int(n)) => n.checked_neg().map(Constant::Int),
            (UnaryOp::Neg, Constant::Real(r)) => Some(Constant::Real(-r)),
            (UnaryOp::Not, Constant::Bool(b)) => Some(Constant::Bool(!b)),
            (UnaryOp::Not, Constant::Null) => Some(Constant::Bool(true)),
            (UnaryOp::Complement, Constant::Int(n)) => Some(Constant::Int(!n)),
            _ => None,
        }
    }

    fn convert(&self, value: &Constant, ty: &LiteralType) -> Option<Constant> {
        match (ty, value) {
            (LiteralType::Null, Constant::Null) => Some(Constant::Null),
            (LiteralType::Bool, _) => self.truthiness(value).map(Constant::Bool),
            (LiteralType::Int, Constant::Int(n)) => Some(Constant::Int(*n)),
            (LiteralType::Int, Constant::Bool(b)) => Some(Constant::Int(i64::from(*b))),
            (LiteralType::Int, Constant::Real(r)) => {
                let truncated = r.trunc();
                // i64::MAX is not exactly representable; stay strictly inside.
                #[expect(clippy::cast_precision_loss, reason = "range bounds")]
                let in_range = truncated >= i64::MIN as f64 && truncated < i64::MAX as f64;
                #[expect(clippy::cast_possible_truncation, reason = "range checked above")]
                let n = truncated as i64;
                (r.is_finite() && in_range).then_some(Constant::Int(n))
            }
            (LiteralType::Int, Constant::String(s)) => s.trim().parse().ok().map(Constant::Int),
            (LiteralType::Real, Constant::String(s)) => s.trim().parse().ok().map(Constant::Real),
            (LiteralType::Real, _) => Self::numeric(value).map(Constant::Real),
            (LiteralType::String, _) => self.stringify(value).map(Constant::String),
            _ => None,
        }
    }

    fn is_instance(&self, value: &Constant, ty: &LiteralType) -> Option<bool> {
        match ty {
            LiteralType::Object(_) => None,
            LiteralType::List | LiteralType::Hash => Some(false),
            _ => Some(value.literal_type() == *ty),
        }
    }

    fn truthiness(&self, value: &Constant) -> Option<bool> {
        Some(match value {
            Constant::Null => false,
            Constant::Bool(b) => *b,
            Constant::Int(n) => *n != 0,
            Constant::Real(r) => *r != 0.0,
            Constant::String(s) => !s.is_empty(),
        })
    }

    fn stringify(&self, value: &Constant) -> Option<String> {
        Some(match value {
            Constant::Null => String::new(),
            Constant::Bool(b) => b.to_string(),
            Constant::Int(n) => n.to_string(),
            Constant::Real(r) => r.to_string(),
            Constant::String(s) => s.clone(),
        })
    }
}
