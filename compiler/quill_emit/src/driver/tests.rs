use std::rc::Rc;

use pretty_assertions::assert_eq;
use quill_diagnostic::{Diagnostic, ErrorCode};
use quill_ir::{Access, BinaryOp, CallKind, EntityRef, JumpTarget, ModuleName, Position};
use quill_symbols::{Symbol, SymbolStore};

use super::*;
use crate::ast::{Expr, ReturnVariant, Stmt};
use crate::{CodeBuffer, CompilerOptions, FunctionInfo};

fn pos() -> Position {
    Position::new("driver.qll", 1, 1)
}

fn module() -> ModuleName {
    ModuleName::new("m")
}

fn scope() -> Rc<SymbolStore> {
    let mut root = SymbolStore::new();
    root.declare("n", Symbol::call(EntityRef::local("n"), pos()));
    root.declare("acc", Symbol::call(EntityRef::local("acc"), pos()));
    root.declare(
        "fact",
        Symbol::call(EntityRef::function("fact", module()), pos()),
    );
    Rc::new(root)
}

fn ident(name: &str) -> Expr {
    Expr::identifier(pos(), name)
}

fn fact() -> FunctionInfo {
    FunctionInfo::new("fact", module()).with_parameters(["n", "acc"])
}

/// `if n == 0 { return acc } return fact(n - 1, acc * n)`
fn factorial_body() -> Block {
    let base = Stmt::condition(
        pos(),
        Expr::binary(pos(), BinaryOp::Eq, ident("n"), Expr::constant(pos(), 0)),
        Block::with_statements(
            pos(),
            vec![Stmt::ret(pos(), ReturnVariant::Exit, Some(ident("acc")))],
        ),
        Block::new(pos()),
    );
    let recurse = Expr::identifier_call(
        pos(),
        "fact",
        Access::Get,
        vec![
            Expr::binary(pos(), BinaryOp::Sub, ident("n"), Expr::constant(pos(), 1)),
            Expr::binary(pos(), BinaryOp::Mul, ident("acc"), ident("n")),
        ],
    );
    Block::with_statements(
        pos(),
        vec![base, Stmt::ret(pos(), ReturnVariant::Exit, Some(recurse))],
    )
}

fn compile(mut body: Block, function: FunctionInfo, options: CompilerOptions) -> (CodeBuffer, Vec<Diagnostic>, usize) {
    let mut code = CodeBuffer::new();
    let mut diags: Vec<Diagnostic> = Vec::new();
    let errors = {
        let mut cx = CompileContext::new(&mut code, &mut diags, function, scope()).with_options(options);
        compile_function(&mut body, &mut cx).unwrap()
    };
    code.resolve().unwrap();
    (code, diags, errors)
}

fn calls_fact(code: &CodeBuffer) -> bool {
    code.instructions().any(|instruction| {
        matches!(
            instruction,
            Instruction::Call { kind: CallKind::Function { id, .. }, .. } if id == "fact"
        )
    })
}

#[test]
fn empty_body_only_returns() {
    let (code, diags, errors) = compile(Block::new(pos()), fact(), CompilerOptions::default());
    assert_eq!(errors, 0);
    assert!(diags.is_empty());
    let rendered: Vec<String> = code.instructions().map(ToString::to_string).collect();
    assert_eq!(rendered, vec!["ret.exit"]);
}

#[test]
fn self_recursion_becomes_a_loop() {
    let (code, diags, errors) = compile(factorial_body(), fact(), CompilerOptions::default());
    assert_eq!(errors, 0);
    assert!(diags.is_empty());
    assert!(!calls_fact(&code));
    assert!(code
        .instructions()
        .any(|instruction| *instruction == Instruction::Jump(JumpTarget::Address(0))));
}

#[test]
fn without_tail_calls_recursion_stays_a_call() {
    let options = CompilerOptions {
        tail_calls: false,
        ..CompilerOptions::default()
    };
    let (code, _, _) = compile(factorial_body(), fact(), options);
    assert!(calls_fact(&code));
}

#[test]
fn errors_are_counted_per_function() {
    let body = Block::with_statements(pos(), vec![Stmt::expr(ident("missing"))]);
    let (code, diags, errors) = compile(body, fact(), CompilerOptions::unoptimized());
    assert_eq!(errors, 1);
    assert_eq!(diags[0].code, ErrorCode::E2001);
    assert_eq!(
        code.instructions().last(),
        Some(&Instruction::Return(ReturnKind::Exit))
    );
}

#[test]
fn label_at_the_end_of_the_body_has_a_target() {
    let body = Block::with_statements(
        pos(),
        vec![Stmt::goto(pos(), "out"), Stmt::label(pos(), "out")],
    );
    let (code, _, _) = compile(body, fact(), CompilerOptions::unoptimized());
    let rendered: Vec<String> = code.instructions().map(ToString::to_string).collect();
    assert_eq!(rendered, vec!["jump 1", "ret.exit"]);
}
