//! Property-based tests for optimization and emission.
//!
//! Expression trees are generated per result type (int, bool, string) so
//! that every generated program is well typed for the value model:
//! 1. Folding soundness: a literal tree computes the same value folded
//!    and unfolded.
//! 2. Idempotence: optimizing an optimized tree changes nothing.
//! 3. Stack discipline: value mode leaves one entry, effect mode none.
//! 4. Placeholder slots are a pure function of the operand list.

#![allow(clippy::unwrap_used, clippy::expect_used, reason = "Tests can panic")]
#![allow(
    clippy::needless_pass_by_value,
    reason = "Proptest macros generate code with these patterns"
)]

mod common;

use std::rc::Rc;

use common::{compile, module, pos, Machine, Outcome};
use proptest::prelude::*;
use quill_diagnostic::Diagnostic;
use quill_emit::{
    assign_indices, Block, CodeBuffer, CompileContext, CompilerOptions, Expr, FunctionInfo,
    PartialArg, ReturnVariant, Slot, StackSemantics, Stmt,
};
use quill_ir::{BinaryOp, Constant, EntityRef, UnaryOp};

// -- Strategies --

fn int_literal() -> impl Strategy<Value = Expr> {
    (-20i64..=20).prop_map(|n| Expr::constant(pos(), n))
}

fn local(name: &str) -> Expr {
    Expr::call(pos(), EntityRef::local(name), Vec::new())
}

fn arithmetic_op() -> impl Strategy<Value = BinaryOp> {
    prop_oneof![Just(BinaryOp::Add), Just(BinaryOp::Sub), Just(BinaryOp::Mul)]
}

fn comparison_op() -> impl Strategy<Value = BinaryOp> {
    prop_oneof![
        Just(BinaryOp::Eq),
        Just(BinaryOp::NotEq),
        Just(BinaryOp::Lt),
        Just(BinaryOp::GtEq),
    ]
}

/// A boolean built from comparisons of `ints`, optionally negated or
/// chained with `and`/`or`.
fn condition(ints: BoxedStrategy<Expr>) -> BoxedStrategy<Expr> {
    let atom = prop_oneof![
        any::<bool>().prop_map(|b| Expr::constant(pos(), b)),
        (comparison_op(), ints.clone(), ints).prop_map(|(op, l, r)| Expr::binary(pos(), op, l, r)),
    ]
    .boxed();
    prop_oneof![
        atom.clone(),
        atom.clone().prop_map(|c| Expr::unary(pos(), UnaryOp::Not, c)),
        prop::collection::vec(atom.clone(), 1..4).prop_map(|ops| Expr::and(pos(), ops)),
        prop::collection::vec(atom, 1..4).prop_map(|ops| Expr::or(pos(), ops)),
    ]
    .boxed()
}

/// Int-valued trees. With `locals`, leaves may read `x` and `y` and
/// subtrees may assign literals to `x`.
fn int_expr(locals: bool) -> BoxedStrategy<Expr> {
    let leaf = if locals {
        prop_oneof![
            3 => int_literal(),
            1 => Just(local("x")),
            1 => Just(local("y")),
        ]
        .boxed()
    } else {
        int_literal().boxed()
    };
    leaf.prop_recursive(3, 24, 3, move |inner| {
        let assign = int_literal().prop_map(|value| Expr::assign(pos(), EntityRef::local("x"), value));
        let mut cases = vec![
            (arithmetic_op(), inner.clone(), inner.clone())
                .prop_map(|(op, l, r)| Expr::binary(pos(), op, l, r))
                .boxed(),
            inner
                .clone()
                .prop_map(|e| Expr::unary(pos(), UnaryOp::Neg, e))
                .boxed(),
            (condition(inner.clone()), inner.clone(), inner.clone())
                .prop_map(|(c, t, o)| Expr::conditional(pos(), c, t, o))
                .boxed(),
            (any::<bool>(), inner.clone())
                .prop_map(|(null_first, last)| {
                    let mut operands = Vec::new();
                    if null_first {
                        operands.push(Expr::null(pos()));
                    }
                    operands.push(last);
                    Expr::coalescence(pos(), operands)
                })
                .boxed(),
        ];
        if locals {
            cases.push(assign.boxed());
        }
        proptest::strategy::Union::new(cases)
    })
    .boxed()
}

fn text_literal() -> impl Strategy<Value = Expr> {
    prop::sample::select(vec!["", "a", "bc", "n = "]).prop_map(|s| Expr::constant(pos(), s))
}

/// String-valued trees: literal, `"..." + int`, or a concatenation led by
/// a string literal.
fn text_expr(locals: bool) -> BoxedStrategy<Expr> {
    let ints = int_expr(locals);
    prop_oneof![
        text_literal(),
        (text_literal(), ints.clone()).prop_map(|(s, n)| Expr::binary(pos(), BinaryOp::Add, s, n)),
        (text_literal(), prop::collection::vec(ints, 1..4)).prop_map(|(s, rest)| {
            let mut parts = vec![s];
            parts.extend(rest);
            Expr::concat(pos(), parts)
        }),
    ]
    .boxed()
}

fn any_expr(locals: bool) -> BoxedStrategy<Expr> {
    prop_oneof![
        int_expr(locals),
        condition(int_expr(locals)),
        text_expr(locals),
    ]
    .boxed()
}

fn partial_args() -> impl Strategy<Value = Vec<PartialArg>> {
    let arg = prop_oneof![
        Just(PartialArg::Closed),
        Just(PartialArg::Placeholder(None)),
        (0u8..8).prop_map(|i| PartialArg::Placeholder(Some(i))),
    ];
    prop::collection::vec(arg, 0..10).prop_map(|args| {
        // Explicit indices must be unique; later repeats become implicit.
        let mut seen = Vec::new();
        args.into_iter()
            .map(|arg| match arg {
                PartialArg::Placeholder(Some(i)) if seen.contains(&i) => PartialArg::Placeholder(None),
                PartialArg::Placeholder(Some(i)) => {
                    seen.push(i);
                    arg
                }
                other => other,
            })
            .collect()
    })
}

// -- Helpers --

fn run_returning(value: Expr, options: CompilerOptions) -> (Vec<quill_ir::Instruction>, Result<Outcome, common::Fault>) {
    let body = Block::with_statements(pos(), vec![Stmt::ret(pos(), ReturnVariant::Exit, Some(value))]);
    let function = FunctionInfo::new("main", module());
    let compiled = compile(body, function, Rc::default(), options);
    assert!(compiled.diagnostics.is_empty(), "{:?}", compiled.diagnostics);
    let outcome = Machine::new().run(&compiled.code);
    (compiled.code, outcome)
}

/// Optimize `expr` to a fixpoint the way the compiler does for one slot.
fn optimize(mut expr: Expr) -> Expr {
    let mut buffer = CodeBuffer::new();
    let mut diagnostics: Vec<Diagnostic> = Vec::new();
    let mut cx = CompileContext::new(
        &mut buffer,
        &mut diagnostics,
        FunctionInfo::new("main", module()),
        Rc::default(),
    );
    let passes = cx.options.max_optimization_passes;
    for _ in 0..passes {
        match expr.try_optimize(&mut cx).unwrap() {
            Some(replacement) => expr = replacement,
            None => break,
        }
    }
    assert!(diagnostics.is_empty());
    expr
}

fn emit_and_run(mut expr: Expr, semantics: StackSemantics) -> Machine {
    let mut buffer = CodeBuffer::new();
    let mut diagnostics: Vec<Diagnostic> = Vec::new();
    {
        let mut cx = CompileContext::new(
            &mut buffer,
            &mut diagnostics,
            FunctionInfo::new("main", module()),
            Rc::default(),
        )
        .with_options(CompilerOptions::unoptimized());
        expr.emit(&mut cx, semantics).unwrap();
    }
    buffer.resolve().unwrap();
    assert!(diagnostics.is_empty(), "{diagnostics:?}");
    let code: Vec<_> = buffer.instructions().cloned().collect();
    let mut machine = Machine::new().with_local("x", 3).with_local("y", -2);
    assert_eq!(machine.run(&code), Ok(Outcome::FellOff));
    machine
}

// -- Properties --

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn folding_preserves_the_computed_value(expr in any_expr(false)) {
        let unfolded = CompilerOptions::unoptimized();
        let folded = CompilerOptions { tail_calls: false, ..CompilerOptions::default() };

        let (_, expected) = run_returning(expr.clone(), unfolded);
        let (code, actual) = run_returning(expr, folded);
        prop_assert_eq!(&actual, &expected);
        // A literal tree folds down to a single constant.
        prop_assert_eq!(code.len(), 3);
        let is_load = matches!(code[0], quill_ir::Instruction::Load(_));
        prop_assert!(is_load);
    }

    #[test]
    fn optimization_is_idempotent(expr in any_expr(true)) {
        let once = optimize(expr);
        let twice = optimize(once.clone());
        prop_assert_eq!(twice, once);
    }

    #[test]
    fn value_mode_leaves_exactly_one_entry(expr in any_expr(true)) {
        let machine = emit_and_run(expr, StackSemantics::Value);
        prop_assert_eq!(machine.stack.len(), 1);
    }

    #[test]
    fn effect_mode_leaves_the_stack_alone(expr in any_expr(true)) {
        let machine = emit_and_run(expr, StackSemantics::Effect);
        prop_assert!(machine.stack.is_empty(), "left {:?}", machine.stack);
    }

    #[test]
    fn effect_and_value_modes_agree_on_side_effects(expr in any_expr(true)) {
        let value = emit_and_run(expr.clone(), StackSemantics::Value);
        let effect = emit_and_run(expr, StackSemantics::Effect);
        prop_assert_eq!(value.locals.get("x"), effect.locals.get("x"));
    }

    #[test]
    fn placeholder_slots_are_deterministic(args in partial_args()) {
        let first = assign_indices(&args, &pos()).unwrap();
        let second = assign_indices(&args, &pos()).unwrap();
        prop_assert_eq!(&first, &second);

        let mut open: Vec<usize> = Vec::new();
        let mut closed = 0;
        for (arg, slot) in args.iter().zip(&first) {
            match (arg, slot) {
                (PartialArg::Closed, Slot::Closed(j)) => {
                    prop_assert_eq!(*j, closed);
                    closed += 1;
                }
                (PartialArg::Placeholder(Some(i)), Slot::Open(k)) => {
                    prop_assert_eq!(usize::from(*i), *k);
                    open.push(*k);
                }
                (PartialArg::Placeholder(None), Slot::Open(k)) => open.push(*k),
                (arg, slot) => prop_assert!(false, "{arg:?} got {slot:?}"),
            }
        }
        let distinct = open.len();
        open.sort_unstable();
        open.dedup();
        prop_assert_eq!(open.len(), distinct, "open slots must not collide");
    }
}

#[test]
fn folded_literal_matches_the_interpreter() {
    // (2 + 3) * -4 < 0 ? "neg" + 1 : "pos"
    let product = Expr::binary(
        pos(),
        BinaryOp::Mul,
        Expr::binary(pos(), BinaryOp::Add, Expr::constant(pos(), 2), Expr::constant(pos(), 3)),
        Expr::unary(pos(), UnaryOp::Neg, Expr::constant(pos(), 4)),
    );
    let condition = Expr::binary(pos(), BinaryOp::Lt, product, Expr::constant(pos(), 0));
    let then = Expr::binary(pos(), BinaryOp::Add, Expr::constant(pos(), "neg"), Expr::constant(pos(), 1));
    let expr = Expr::conditional(pos(), condition, then, Expr::constant(pos(), "pos"));

    let (code, outcome) = run_returning(expr, CompilerOptions::default());
    assert_eq!(code[0], quill_ir::Instruction::Load(Constant::string("neg1")));
    assert_eq!(outcome, Ok(Outcome::Returned(Constant::string("neg1"))));
}
