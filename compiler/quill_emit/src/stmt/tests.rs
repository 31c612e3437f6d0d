use std::rc::Rc;

use pretty_assertions::assert_eq;
use quill_ir::{BinaryOp, Constant, ModuleName, UnaryOp};

use super::*;
use crate::{CodeBuffer, CompilerOptions, FunctionInfo};

fn pos() -> Position {
    Position::new("stmt.qll", 7, 3)
}

fn var(name: &str) -> Expr {
    Expr::call(pos(), EntityRef::local(name), Vec::new())
}

fn int(n: i64) -> Expr {
    Expr::constant(pos(), n)
}

fn set(name: &str, value: Expr) -> Stmt {
    Stmt::expr(Expr::assign(pos(), EntityRef::local(name), value))
}

fn block(statements: Vec<Stmt>) -> Block {
    Block::with_statements(pos(), statements)
}

struct Emitted {
    code: Vec<String>,
    diags: Vec<Diagnostic>,
    regions: Vec<TryRegion>,
    hints: Vec<ForeachHint>,
}

/// Emit `statements` without optimization and resolve every jump.
fn run(statements: Vec<Stmt>) -> Emitted {
    let mut buffer = CodeBuffer::new();
    let mut diags: Vec<Diagnostic> = Vec::new();
    let hints = {
        let function = FunctionInfo::new("main", ModuleName::new("m"));
        let mut cx = CompileContext::new(&mut buffer, &mut diags, function, Rc::default())
            .with_options(CompilerOptions::unoptimized());
        for mut statement in statements {
            statement.emit(&mut cx).unwrap();
        }
        cx.hints().to_vec()
    };
    buffer.resolve().unwrap();
    Emitted {
        code: buffer.instructions().map(ToString::to_string).collect(),
        diags,
        regions: buffer.try_regions().to_vec(),
        hints,
    }
}

#[test]
fn while_loop_tests_at_the_bottom() {
    let out = run(vec![Stmt::while_loop(
        pos(),
        var("x"),
        block(vec![set("y", int(1))]),
    )]);
    assert_eq!(
        out.code,
        vec!["jump 3", "ldc.int 1", "stloc y", "ldloc x", "jump.t 1"]
    );
}

#[test]
fn for_loop_runs_the_initializer_once() {
    let next = Expr::binary(pos(), BinaryOp::Add, var("i"), int(1));
    let stmt = Stmt::new(
        pos(),
        StmtKind::For {
            initialize: block(vec![set("i", int(0))]),
            condition: Expr::binary(pos(), BinaryOp::Lt, var("i"), int(3)),
            next_iteration: block(vec![set("i", next)]),
            body: Block::new(pos()),
            is_precondition: true,
            positive: true,
        },
    );
    assert_eq!(
        run(vec![stmt]).code,
        vec![
            "ldc.int 0",
            "stloc i",
            "jump 3",
            "ldloc i",
            "ldc.int 1",
            "op +",
            "stloc i",
            "ldloc i",
            "ldc.int 3",
            "op <",
            "jump.t 3",
        ]
    );
}

#[test]
fn postcondition_loop_that_never_repeats_runs_once() {
    let stmt = Stmt::new(
        pos(),
        StmtKind::While {
            condition: Expr::constant(pos(), false),
            body: block(vec![set("y", int(1))]),
            is_precondition: false,
            positive: true,
        },
    );
    assert_eq!(run(vec![stmt]).code, vec!["ldc.int 1", "stloc y"]);
}

#[test]
fn dead_precondition_loop_emits_nothing() {
    let stmt = Stmt::while_loop(pos(), Expr::constant(pos(), 0), block(vec![set("y", int(1))]));
    assert!(run(vec![stmt]).code.is_empty());
}

#[test]
fn break_inside_a_protected_region_leaves_it() {
    let try_stmt = Stmt::new(
        pos(),
        StmtKind::TryCatchFinally {
            try_block: block(vec![Stmt::new(pos(), StmtKind::Break)]),
            catch_block: Block::new(pos()),
            exception_var: None,
            finally_block: block(vec![set("y", int(1))]),
        },
    );
    let out = run(vec![Stmt::while_loop(
        pos(),
        Expr::constant(pos(), true),
        block(vec![try_stmt]),
    )]);
    assert_eq!(
        out.code,
        vec!["try", "leave 7", "leave 5", "ldc.int 1", "stloc y", "nop", "jump 0"]
    );
    assert_eq!(
        out.regions,
        vec![TryRegion {
            begin_try: 0,
            begin_finally: Some(3),
            begin_catch: None,
            end: 5,
            uses_exception: false,
        }]
    );
}

#[test]
fn break_outside_a_loop_is_reported() {
    let out = run(vec![Stmt::new(pos(), StmtKind::Continue)]);
    assert!(out.code.is_empty());
    assert_eq!(out.diags.len(), 1);
    assert_eq!(out.diags[0].code, ErrorCode::E4002);
}

#[test]
fn if_else_jumps_over_the_else_arm() {
    let stmt = Stmt::condition(
        pos(),
        var("x"),
        block(vec![set("y", int(1))]),
        block(vec![set("y", int(2))]),
    );
    assert_eq!(
        run(vec![stmt]).code,
        vec!["ldloc x", "jump.f 5", "ldc.int 1", "stloc y", "jump 7", "ldc.int 2", "stloc y"]
    );
}

#[test]
fn negated_condition_flips_the_jump() {
    let condition = Expr::unary(pos(), UnaryOp::Not, var("x"));
    let stmt = Stmt::condition(pos(), condition, block(vec![set("y", int(1))]), Block::new(pos()));
    assert_eq!(
        run(vec![stmt]).code,
        vec!["ldloc x", "jump.t 4", "ldc.int 1", "stloc y"]
    );
}

#[test]
fn constant_condition_keeps_only_the_live_arm() {
    let stmt = Stmt::condition(
        pos(),
        Expr::constant(pos(), Constant::Null),
        block(vec![set("y", int(1))]),
        block(vec![set("y", int(2))]),
    );
    assert_eq!(run(vec![stmt]).code, vec!["ldc.int 2", "stloc y"]);
}

#[test]
fn conditional_goto_becomes_a_single_jump() {
    let out = run(vec![
        Stmt::condition(
            pos(),
            var("x"),
            block(vec![Stmt::goto(pos(), "done")]),
            Block::new(pos()),
        ),
        set("y", int(1)),
        Stmt::label(pos(), "done"),
    ]);
    assert_eq!(out.code, vec!["ldloc x", "jump.t 4", "ldc.int 1", "stloc y"]);
}

#[test]
fn foreach_protects_the_enumerator_and_records_hints() {
    let stmt = Stmt::new(
        pos(),
        StmtKind::Foreach {
            element: Some(var("x")),
            list: Some(var("items")),
            body: Block::new(pos()),
        },
    );
    let out = run(vec![stmt]);
    assert_eq!(
        out.code,
        vec![
            "ldloc items",
            "get.0 GetEnumerator",
            "stloc foreach\\enumerator\\0",
            "try",
            "jump 8",
            "ldloc foreach\\enumerator\\0",
            "get.0 Current",
            "stloc x",
            "ldloc foreach\\enumerator\\0",
            "get.0 MoveNext",
            "jump.t 5",
            "leave 14",
            "ldloc foreach\\enumerator\\0",
            "@get.0 Dispose",
            "nop",
        ]
    );
    assert_eq!(
        out.hints,
        vec![ForeachHint {
            enumerator: "foreach\\enumerator\\0".to_owned(),
            get_enumerator: 1,
            move_next: 9,
            current: 6,
            dispose: 13,
        }]
    );
    assert_eq!(
        out.regions,
        vec![TryRegion {
            begin_try: 3,
            begin_finally: Some(12),
            begin_catch: None,
            end: 14,
            uses_exception: false,
        }]
    );
}

#[test]
fn unfinished_foreach_is_an_internal_error() {
    let mut buffer = CodeBuffer::new();
    let mut diags: Vec<Diagnostic> = Vec::new();
    let function = FunctionInfo::new("main", ModuleName::new("m"));
    let mut cx = CompileContext::new(&mut buffer, &mut diags, function, Rc::default());
    let mut stmt = Stmt::new(
        pos(),
        StmtKind::Foreach {
            element: Some(var("x")),
            list: None,
            body: Block::new(pos()),
        },
    );
    assert!(matches!(
        stmt.emit(&mut cx),
        Err(InternalError::Uninitialized {
            what: "foreach list",
            ..
        })
    ));
}

#[test]
fn catch_stores_the_exception() {
    let stmt = Stmt::new(
        pos(),
        StmtKind::TryCatchFinally {
            try_block: block(vec![set("y", int(1))]),
            catch_block: Block::new(pos()),
            exception_var: Some(var("e")),
            finally_block: Block::new(pos()),
        },
    );
    let out = run(vec![stmt]);
    assert_eq!(
        out.code,
        vec!["try", "ldc.int 1", "stloc y", "leave 7", "exc", "stloc e", "leave 7", "nop"]
    );
    assert_eq!(
        out.regions,
        vec![TryRegion {
            begin_try: 0,
            begin_finally: None,
            begin_catch: Some(4),
            end: 7,
            uses_exception: true,
        }]
    );
}

#[test]
fn bare_try_gets_a_rethrowing_handler() {
    let stmt = Stmt::new(
        pos(),
        StmtKind::TryCatchFinally {
            try_block: block(vec![set("y", int(1))]),
            catch_block: Block::new(pos()),
            exception_var: None,
            finally_block: Block::new(pos()),
        },
    );
    let out = run(vec![stmt]);
    assert_eq!(
        out.code,
        vec!["try", "ldc.int 1", "stloc y", "leave 5", "rethrow", "nop"]
    );
    assert_eq!(out.regions[0].begin_catch, Some(4));
}

#[test]
fn constant_exception_variable_is_rejected() {
    let stmt = Stmt::new(
        pos(),
        StmtKind::TryCatchFinally {
            try_block: block(vec![set("y", int(1))]),
            catch_block: Block::new(pos()),
            exception_var: Some(int(3)),
            finally_block: Block::new(pos()),
        },
    );
    let out = run(vec![stmt]);
    assert_eq!(out.diags.len(), 1);
    assert_eq!(out.diags[0].code, ErrorCode::E2004);
}

#[test]
fn using_disposes_in_a_finally() {
    let stmt = Stmt::new(
        pos(),
        StmtKind::Using {
            target: Some(var("r")),
            resource: Some(var("source")),
            body: block(vec![set("y", int(1))]),
        },
    );
    let out = run(vec![stmt]);
    assert_eq!(
        out.code,
        vec![
            "ldloc source",
            "stloc r",
            "try",
            "ldc.int 1",
            "stloc y",
            "leave 8",
            "ldloc r",
            "@get.0 Dispose",
            "nop",
        ]
    );
    assert_eq!(out.regions[0].begin_finally, Some(6));
    assert_eq!(out.regions[0].begin_catch, None);
}

#[test]
fn yield_inside_try_warns() {
    let stmt = Stmt::new(
        pos(),
        StmtKind::TryCatchFinally {
            try_block: block(vec![Stmt::ret(pos(), ReturnVariant::Continue, Some(int(1)))]),
            catch_block: Block::new(pos()),
            exception_var: None,
            finally_block: block(vec![set("y", int(0))]),
        },
    );
    let out = run(vec![stmt]);
    assert_eq!(out.code[1..3], ["ldc.int 1", "ret.continue"]);
    assert_eq!(out.diags.len(), 1);
    assert!(out.diags[0].is_warning());
    assert_eq!(out.diags[0].code, ErrorCode::E4001);
}

#[test]
fn return_variants() {
    let out = run(vec![
        Stmt::ret(pos(), ReturnVariant::Set, None),
        Stmt::ret(pos(), ReturnVariant::Break, Some(var("x"))),
        Stmt::ret(pos(), ReturnVariant::Exit, Some(int(2))),
        Stmt::ret(pos(), ReturnVariant::Exit, None),
    ]);
    assert!(out.diags.is_empty());
    assert_eq!(
        out.code,
        vec!["ldc.null", "ret.set", "ret.break", "ldc.int 2", "ret.value", "ret.exit"]
    );
}

#[test]
fn empty_try_runs_only_the_finally_body() {
    let stmt = Stmt::new(
        pos(),
        StmtKind::TryCatchFinally {
            try_block: Block::new(pos()),
            catch_block: Block::new(pos()),
            exception_var: None,
            finally_block: block(vec![set("y", int(1))]),
        },
    );
    let out = run(vec![stmt]);
    assert_eq!(out.code, vec!["ldc.int 1", "stloc y"]);
    assert!(out.regions.is_empty());
}

#[test]
fn condition_without_arms_is_evaluated_for_effect() {
    let condition = Expr::assign(pos(), EntityRef::local("x"), int(1));
    let stmt = Stmt::condition(pos(), condition, Block::new(pos()), Block::new(pos()));
    assert_eq!(run(vec![stmt]).code, vec!["ldc.int 1", "stloc x"]);
}

#[test]
fn empty_if_arm_swaps_with_the_else_arm() {
    let stmt = Stmt::condition(pos(), var("x"), Block::new(pos()), block(vec![set("y", int(2))]));
    assert_eq!(
        run(vec![stmt]).code,
        vec!["ldloc x", "jump.t 4", "ldc.int 2", "stloc y"]
    );
}

fn assert_single_protected_warning(out: &Emitted) {
    assert_eq!(out.diags.len(), 1);
    assert!(out.diags[0].is_warning());
    assert_eq!(out.diags[0].code, ErrorCode::E4001);
}

#[test]
fn yield_inside_using_warns() {
    let stmt = Stmt::new(
        pos(),
        StmtKind::Using {
            target: Some(var("r")),
            resource: Some(var("source")),
            body: block(vec![Stmt::ret(pos(), ReturnVariant::Continue, Some(int(1)))]),
        },
    );
    let out = run(vec![stmt]);
    assert_eq!(out.code[3..5], ["ldc.int 1", "ret.continue"]);
    assert_single_protected_warning(&out);
}

#[test]
fn yield_inside_foreach_warns() {
    let stmt = Stmt::new(
        pos(),
        StmtKind::Foreach {
            element: Some(var("x")),
            list: Some(var("items")),
            body: block(vec![Stmt::ret(pos(), ReturnVariant::Continue, Some(var("x")))]),
        },
    );
    let out = run(vec![stmt]);
    assert_eq!(out.code[8..10], ["ldloc x", "ret.continue"]);
    assert_single_protected_warning(&out);
}

#[test]
fn setting_the_result_inside_catch_warns() {
    let stmt = Stmt::new(
        pos(),
        StmtKind::TryCatchFinally {
            try_block: block(vec![set("y", int(1))]),
            catch_block: block(vec![Stmt::ret(pos(), ReturnVariant::Set, None)]),
            exception_var: None,
            finally_block: Block::new(pos()),
        },
    );
    let out = run(vec![stmt]);
    assert_eq!(
        out.code,
        vec!["try", "ldc.int 1", "stloc y", "leave 7", "ldc.null", "ret.set", "leave 7", "nop"]
    );
    assert_single_protected_warning(&out);
}
