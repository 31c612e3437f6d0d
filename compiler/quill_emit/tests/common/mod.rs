//! A small stack machine for running emitted code in tests.
//!
//! Only what the compiler emits for straight-line expressions and simple
//! control flow is modelled. Operators, casts and truthiness go through
//! [`DynamicValueModel`], the same model constant folding consults. Calls,
//! member accesses and object creation consume their operands and produce
//! null.

#![allow(dead_code, reason = "Each test binary uses a different subset")]

use std::rc::Rc;

use quill_diagnostic::Diagnostic;
use quill_emit::{
    compile_function, Block, CodeBuffer, CompileContext, CompilerOptions, DynamicValueModel,
    FunctionInfo, ValueModel,
};
use quill_ir::{CallKind, Constant, Instruction, JumpTarget, ModuleName, Position, ReturnKind};
use quill_symbols::SymbolStore;
use rustc_hash::FxHashMap;

/// Upper bound on executed instructions, so a bad jump cannot hang a test.
const STEP_LIMIT: usize = 10_000;

/// How a run ended.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    /// `ret.value` with this value.
    Returned(Constant),
    /// `ret.exit` or `ret.break`.
    Exited,
    /// Control ran past the last instruction.
    FellOff,
}

/// Why a run stopped early.
#[derive(Clone, Debug, PartialEq)]
pub enum Fault {
    StackUnderflow(usize),
    Unresolved(String),
    /// The value model rejected an operation.
    Rejected(String),
    Thrown,
    StepLimit,
}

#[derive(Debug, Default)]
pub struct Machine {
    pub stack: Vec<Constant>,
    pub locals: FxHashMap<String, Constant>,
}

impl Machine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_local(mut self, name: &str, value: impl Into<Constant>) -> Self {
        self.locals.insert(name.to_owned(), value.into());
        self
    }

    fn pop(&mut self, pc: usize) -> Result<Constant, Fault> {
        self.stack.pop().ok_or(Fault::StackUnderflow(pc))
    }

    fn pop_n(&mut self, n: usize, pc: usize) -> Result<Vec<Constant>, Fault> {
        if self.stack.len() < n {
            return Err(Fault::StackUnderflow(pc));
        }
        Ok(self.stack.split_off(self.stack.len() - n))
    }

    /// Run resolved `code` from address 0.
    pub fn run(&mut self, code: &[Instruction]) -> Result<Outcome, Fault> {
        let values = DynamicValueModel;
        let mut pc = 0;
        for _ in 0..STEP_LIMIT {
            let Some(instruction) = code.get(pc) else {
                return Ok(Outcome::FellOff);
            };
            let mut next = pc + 1;
            match instruction {
                Instruction::Nop | Instruction::Try => {}
                Instruction::Load(value) => self.stack.push(value.clone()),
                Instruction::LoadLocal(id) => {
                    let value = self.locals.get(id).cloned().unwrap_or(Constant::Null);
                    self.stack.push(value);
                }
                Instruction::StoreLocal(id) => {
                    let value = self.pop(pc)?;
                    self.locals.insert(id.clone(), value);
                }
                Instruction::Binary(op) => {
                    let right = self.pop(pc)?;
                    let left = self.pop(pc)?;
                    let result = values
                        .binary(*op, &left, &right)
                        .ok_or_else(|| Fault::Rejected(format!("{left} {} {right}", op.as_symbol())))?;
                    self.stack.push(result);
                }
                Instruction::Unary(op) => {
                    let operand = self.pop(pc)?;
                    let result = values
                        .unary(*op, &operand)
                        .ok_or_else(|| Fault::Rejected(format!("{}{operand}", op.as_symbol())))?;
                    self.stack.push(result);
                }
                Instruction::CheckNull => {
                    let value = self.pop(pc)?;
                    self.stack.push(Constant::Bool(value.is_null()));
                }
                Instruction::Check(ty) => {
                    let value = self.pop(pc)?;
                    let is = values
                        .is_instance(&value, ty)
                        .ok_or_else(|| Fault::Rejected(format!("{value} is {ty}")))?;
                    self.stack.push(Constant::Bool(is));
                }
                Instruction::Cast(ty) => {
                    let value = self.pop(pc)?;
                    let converted = values
                        .convert(&value, ty)
                        .ok_or_else(|| Fault::Rejected(format!("{value} as {ty}")))?;
                    self.stack.push(converted);
                }
                Instruction::Jump(target) | Instruction::Leave(target) => next = address(target)?,
                Instruction::JumpIfTrue(target) | Instruction::JumpIfFalse(target) => {
                    let value = self.pop(pc)?;
                    let truth = values
                        .truthiness(&value)
                        .ok_or_else(|| Fault::Rejected(format!("truth of {value}")))?;
                    if truth == matches!(instruction, Instruction::JumpIfTrue(_)) {
                        next = address(target)?;
                    }
                }
                Instruction::Duplicate(n) => {
                    let top = self.stack.last().cloned().ok_or(Fault::StackUnderflow(pc))?;
                    for _ in 0..*n {
                        self.stack.push(top.clone());
                    }
                }
                Instruction::Pop(n) => {
                    self.pop_n(*n, pc)?;
                }
                Instruction::Rotate {
                    rotations,
                    values: width,
                } => {
                    let mut window = self.pop_n(*width, pc)?;
                    window.rotate_right(*rotations % (*width).max(1));
                    self.stack.extend(window);
                }
                Instruction::Call {
                    kind: CallKind::Command { id },
                    arguments,
                    just_effect,
                } if id == "string_concat" => {
                    let parts = self.pop_n(*arguments, pc)?;
                    let mut text = String::new();
                    for part in &parts {
                        let piece = values
                            .stringify(part)
                            .ok_or_else(|| Fault::Rejected(format!("stringify {part}")))?;
                        text.push_str(&piece);
                    }
                    if !just_effect {
                        self.stack.push(Constant::String(text));
                    }
                }
                Instruction::Return(ReturnKind::Value) => return Ok(Outcome::Returned(self.pop(pc)?)),
                Instruction::Return(ReturnKind::Exit | ReturnKind::Break) => return Ok(Outcome::Exited),
                Instruction::Throw | Instruction::Rethrow => return Err(Fault::Thrown),
                other => {
                    let (pops, pushes) = other.stack_effect();
                    self.pop_n(pops, pc)?;
                    self.stack.extend((0..pushes).map(|_| Constant::Null));
                }
            }
            pc = next;
        }
        Err(Fault::StepLimit)
    }
}

fn address(target: &JumpTarget) -> Result<usize, Fault> {
    match target {
        JumpTarget::Address(address) => Ok(*address),
        JumpTarget::Label(label) => Err(Fault::Unresolved(label.clone())),
    }
}

pub fn pos() -> Position {
    Position::new("machine.qll", 1, 1)
}

pub fn module() -> ModuleName {
    ModuleName::new("m")
}

/// Resolved output of one compiled function.
pub struct Compiled {
    pub code: Vec<Instruction>,
    pub diagnostics: Vec<Diagnostic>,
    pub errors: usize,
}

impl Compiled {
    pub fn rendered(&self) -> Vec<String> {
        self.code.iter().map(ToString::to_string).collect()
    }
}

/// Compile `body` as the body of `function` and resolve its jumps.
pub fn compile(
    mut body: Block,
    function: FunctionInfo,
    scope: Rc<SymbolStore>,
    options: CompilerOptions,
) -> Compiled {
    let mut buffer = CodeBuffer::new();
    let mut diagnostics: Vec<Diagnostic> = Vec::new();
    let errors = {
        let mut cx = CompileContext::new(&mut buffer, &mut diagnostics, function, scope).with_options(options);
        compile_function(&mut body, &mut cx).expect("compilation hit an internal error")
    };
    buffer.resolve().expect("every label is bound");
    Compiled {
        code: buffer.instructions().cloned().collect(),
        diagnostics,
        errors,
    }
}
