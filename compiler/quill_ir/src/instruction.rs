//! Instruction vocabulary for the stack machine.
//!
//! The compiler never encodes bytecode itself; it hands [`Instruction`]
//! values to an emitter. Each instruction knows its stack effect so tests
//! and emitters can check stack discipline without running anything.

use std::fmt;

use crate::{BinaryOp, Constant, EntityRef, LiteralType, ModuleName, UnaryOp};

/// Whether a member or symbol access reads or writes.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub enum Access {
    #[default]
    Get,
    Set,
}

/// Destination of a jump.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub enum JumpTarget {
    /// A symbolic label, resolved by the emitter.
    Label(String),
    /// An absolute instruction address.
    Address(usize),
}

/// What a call instruction invokes.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub enum CallKind {
    Function { id: String, module: ModuleName },
    Command { id: String },
    /// Call the value stored in a local variable.
    IndirectLocal { id: String },
    /// Call the value stored in a global variable.
    IndirectGlobal { id: String, module: ModuleName },
    /// Call the value beneath the arguments on the stack.
    Indirect,
}

/// How a return instruction hands back control or a value.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum ReturnKind {
    /// Return the value on top of the stack.
    Value,
    /// Return without a value.
    Exit,
    /// Set the function's result without leaving.
    Set,
    /// Yield the value on top of the stack and keep going.
    Continue,
    /// Stop a generator without a value.
    Break,
}

/// A single stack machine instruction.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub enum Instruction {
    Nop,
    /// Push a literal.
    Load(Constant),
    /// Push a reference to an entity rather than its value.
    LoadReference(EntityRef),
    LoadLocal(String),
    StoreLocal(String),
    LoadGlobal {
        id: String,
        module: ModuleName,
    },
    StoreGlobal {
        id: String,
        module: ModuleName,
    },
    Call {
        kind: CallKind,
        arguments: usize,
        just_effect: bool,
    },
    /// Instance member access; the subject sits beneath the arguments.
    Member {
        member: String,
        access: Access,
        arguments: usize,
        just_effect: bool,
    },
    /// Static member access on a named type.
    Static {
        type_name: String,
        member: String,
        access: Access,
        arguments: usize,
        just_effect: bool,
    },
    NewObject {
        type_name: String,
        arguments: usize,
    },
    /// Construct a type object from a name and type arguments.
    NewType {
        type_name: String,
        arguments: usize,
    },
    NewClosure {
        id: String,
        module: ModuleName,
    },
    Check(LiteralType),
    /// Type check against a type object on top of the subject.
    CheckDynamic,
    Cast(LiteralType),
    CastDynamic,
    CheckNull,
    Binary(BinaryOp),
    Unary(UnaryOp),
    Jump(JumpTarget),
    JumpIfTrue(JumpTarget),
    JumpIfFalse(JumpTarget),
    /// Leave a protected region, running pending finally blocks.
    Leave(JumpTarget),
    /// Enter a protected region.
    Try,
    /// Push the exception being handled.
    Exception,
    Rethrow,
    Throw,
    Return(ReturnKind),
    Pop(usize),
    /// Duplicate the top of the stack `n` times.
    Duplicate(usize),
    /// Within the top `values` entries, move the topmost entry to the
    /// bottom of that window, `rotations` times.
    Rotate {
        rotations: usize,
        values: usize,
    },
}

impl Instruction {
    /// Number of stack entries consumed and produced.
    pub fn stack_effect(&self) -> (usize, usize) {
        let produced = |just_effect: bool| usize::from(!just_effect);
        match self {
            Instruction::Nop
            | Instruction::Jump(_)
            | Instruction::Leave(_)
            | Instruction::Try
            | Instruction::Rethrow
            | Instruction::Return(ReturnKind::Exit | ReturnKind::Break) => (0, 0),
            Instruction::Load(_)
            | Instruction::LoadReference(_)
            | Instruction::LoadLocal(_)
            | Instruction::LoadGlobal { .. }
            | Instruction::NewClosure { .. }
            | Instruction::Exception => (0, 1),
            Instruction::StoreLocal(_)
            | Instruction::StoreGlobal { .. }
            | Instruction::JumpIfTrue(_)
            | Instruction::JumpIfFalse(_)
            | Instruction::Throw
            | Instruction::Return(ReturnKind::Value | ReturnKind::Set | ReturnKind::Continue) => {
                (1, 0)
            }
            Instruction::Call {
                kind,
                arguments,
                just_effect,
            } => {
                let callee = usize::from(matches!(kind, CallKind::Indirect));
                (arguments + callee, produced(*just_effect))
            }
            Instruction::Member {
                arguments,
                just_effect,
                ..
            } => (arguments + 1, produced(*just_effect)),
            Instruction::Static {
                arguments,
                just_effect,
                ..
            } => (*arguments, produced(*just_effect)),
            Instruction::NewObject { arguments, .. } | Instruction::NewType { arguments, .. } => {
                (*arguments, 1)
            }
            Instruction::Check(_)
            | Instruction::Cast(_)
            | Instruction::CheckNull
            | Instruction::Unary(_) => (1, 1),
            Instruction::CheckDynamic | Instruction::CastDynamic | Instruction::Binary(_) => (2, 1),
            Instruction::Pop(n) => (*n, 0),
            Instruction::Duplicate(n) => (1, n + 1),
            Instruction::Rotate { values, .. } => (*values, *values),
        }
    }

    /// Net change in stack depth.
    #[allow(clippy::cast_possible_wrap)]
    pub fn stack_delta(&self) -> isize {
        let (pops, pushes) = self.stack_effect();
        pushes as isize - pops as isize
    }

    /// Check if control never falls through to the next instruction.
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Instruction::Jump(_)
                | Instruction::Leave(_)
                | Instruction::Throw
                | Instruction::Rethrow
                | Instruction::Return(ReturnKind::Value | ReturnKind::Exit | ReturnKind::Break)
        )
    }

    /// The jump destination, if this instruction transfers control.
    pub fn jump_target(&self) -> Option<&JumpTarget> {
        match self {
            Instruction::Jump(t)
            | Instruction::JumpIfTrue(t)
            | Instruction::JumpIfFalse(t)
            | Instruction::Leave(t) => Some(t),
            _ => None,
        }
    }

    /// Mutable access to the jump destination, used when resolving labels.
    pub fn jump_target_mut(&mut self) -> Option<&mut JumpTarget> {
        match self {
            Instruction::Jump(t)
            | Instruction::JumpIfTrue(t)
            | Instruction::JumpIfFalse(t)
            | Instruction::Leave(t) => Some(t),
            _ => None,
        }
    }
}

impl fmt::Display for JumpTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JumpTarget::Label(label) => f.write_str(label),
            JumpTarget::Address(addr) => write!(f, "{addr}"),
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let at = |just_effect: bool| if just_effect { "@" } else { "" };
        let dir = |access: Access| match access {
            Access::Get => "get",
            Access::Set => "set",
        };
        match self {
            Instruction::Nop => f.write_str("nop"),
            Instruction::Load(Constant::Null) => f.write_str("ldc.null"),
            Instruction::Load(Constant::Bool(b)) => write!(f, "ldc.bool {b}"),
            Instruction::Load(Constant::Int(n)) => write!(f, "ldc.int {n}"),
            Instruction::Load(Constant::Real(r)) => write!(f, "ldc.real {r:?}"),
            Instruction::Load(Constant::String(s)) => write!(f, "ldc.string {s:?}"),
            Instruction::LoadReference(entity) => match entity {
                EntityRef::Function { id, module } => write!(f, "ldr.func {id}/{module}"),
                EntityRef::Command { id } | EntityRef::MacroCommand { id } => {
                    write!(f, "ldr.cmd {id}")
                }
                EntityRef::Variable(crate::VariableRef::Local { id }) => {
                    write!(f, "ldr.loc {id}")
                }
                EntityRef::Variable(crate::VariableRef::Global { id, module }) => {
                    write!(f, "ldr.glob {id}/{module}")
                }
            },
            Instruction::LoadLocal(id) => write!(f, "ldloc {id}"),
            Instruction::StoreLocal(id) => write!(f, "stloc {id}"),
            Instruction::LoadGlobal { id, module } => write!(f, "ldglob {id}/{module}"),
            Instruction::StoreGlobal { id, module } => write!(f, "stglob {id}/{module}"),
            Instruction::Call {
                kind,
                arguments,
                just_effect,
            } => {
                let at = at(*just_effect);
                match kind {
                    CallKind::Function { id, module } => {
                        write!(f, "{at}func.{arguments} {id}/{module}")
                    }
                    CallKind::Command { id } => write!(f, "{at}cmd.{arguments} {id}"),
                    CallKind::IndirectLocal { id } => write!(f, "{at}indloc.{arguments} {id}"),
                    CallKind::IndirectGlobal { id, module } => {
                        write!(f, "{at}indglob.{arguments} {id}/{module}")
                    }
                    CallKind::Indirect => write!(f, "{at}indarg.{arguments}"),
                }
            }
            Instruction::Member {
                member,
                access,
                arguments,
                just_effect,
            } => write!(f, "{}{}.{arguments} {member}", at(*just_effect), dir(*access)),
            Instruction::Static {
                type_name,
                member,
                access,
                arguments,
                just_effect,
            } => write!(
                f,
                "{}s{}.{arguments} {type_name}::{member}",
                at(*just_effect),
                dir(*access)
            ),
            Instruction::NewObject {
                type_name,
                arguments,
            } => write!(f, "newobj.{arguments} {type_name}"),
            Instruction::NewType {
                type_name,
                arguments,
            } => write!(f, "newtype.{arguments} {type_name}"),
            Instruction::NewClosure { id, module } => write!(f, "newclo {id}/{module}"),
            Instruction::Check(ty) => write!(f, "check.const {ty}"),
            Instruction::CheckDynamic => f.write_str("check.arg"),
            Instruction::Cast(ty) => write!(f, "cast.const {ty}"),
            Instruction::CastDynamic => f.write_str("cast.arg"),
            Instruction::CheckNull => f.write_str("check.null"),
            Instruction::Binary(op) => write!(f, "op {}", op.as_symbol()),
            Instruction::Unary(op) => write!(f, "op {}", op.as_symbol()),
            Instruction::Jump(t) => write!(f, "jump {t}"),
            Instruction::JumpIfTrue(t) => write!(f, "jump.t {t}"),
            Instruction::JumpIfFalse(t) => write!(f, "jump.f {t}"),
            Instruction::Leave(t) => write!(f, "leave {t}"),
            Instruction::Try => f.write_str("try"),
            Instruction::Exception => f.write_str("exc"),
            Instruction::Rethrow => f.write_str("rethrow"),
            Instruction::Throw => f.write_str("throw"),
            Instruction::Return(kind) => match kind {
                ReturnKind::Value => f.write_str("ret.value"),
                ReturnKind::Exit => f.write_str("ret.exit"),
                ReturnKind::Set => f.write_str("ret.set"),
                ReturnKind::Continue => f.write_str("ret.continue"),
                ReturnKind::Break => f.write_str("ret.break"),
            },
            Instruction::Pop(n) => write!(f, "pop {n}"),
            Instruction::Duplicate(n) => write!(f, "dup {n}"),
            Instruction::Rotate { rotations, values } => write!(f, "rot.{rotations},{values}"),
        }
    }
}
