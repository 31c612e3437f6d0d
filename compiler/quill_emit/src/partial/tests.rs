use std::rc::Rc;

use pretty_assertions::assert_eq;
use quill_diagnostic::Diagnostic;
use quill_ir::{BinaryOp, ModuleName};

use super::*;
use crate::{CodeBuffer, CompilerOptions, FunctionInfo};

fn pos() -> Position {
    Position::new("partial.qll", 4, 2)
}

fn open() -> Expr {
    Expr::placeholder(pos(), None)
}

fn at(index: u8) -> Expr {
    Expr::placeholder(pos(), Some(index))
}

fn int(n: i64) -> Expr {
    Expr::constant(pos(), n)
}

fn f(arguments: Vec<Expr>) -> Expr {
    Expr::call(pos(), EntityRef::function("f", ModuleName::new("m")), arguments)
}

/// Emit `expr` in value mode, returning the rendered code and diagnostics.
fn lower(mut expr: Expr) -> (Vec<String>, Vec<Diagnostic>) {
    let mut code = CodeBuffer::new();
    let mut diags: Vec<Diagnostic> = Vec::new();
    {
        let function = FunctionInfo::new("main", ModuleName::new("m"));
        let mut cx = CompileContext::new(&mut code, &mut diags, function, Rc::default())
            .with_options(CompilerOptions::unoptimized());
        expr.emit(&mut cx, StackSemantics::Value).unwrap();
    }
    let rendered = code.instructions().map(ToString::to_string).collect();
    (rendered, diags)
}

#[test]
fn implicit_placeholders_take_the_lowest_free_slots() {
    let args = [
        PartialArg::Closed,
        PartialArg::Placeholder(None),
        PartialArg::Placeholder(Some(0)),
        PartialArg::Closed,
        PartialArg::Placeholder(None),
    ];
    let slots = assign_indices(&args, &pos()).unwrap();
    assert_eq!(
        slots.as_slice(),
        &[
            Slot::Closed(0),
            Slot::Open(1),
            Slot::Open(0),
            Slot::Closed(1),
            Slot::Open(2),
        ]
    );
}

#[test]
fn explicit_indices_must_be_unique_and_in_range() {
    let duplicate = [PartialArg::Placeholder(Some(2)), PartialArg::Placeholder(Some(2))];
    assert_eq!(
        assign_indices(&duplicate, &pos()).unwrap_err().code,
        ErrorCode::E3001
    );

    let too_large = [PartialArg::Placeholder(Some(MAX_PLACEHOLDER_INDEX + 1))];
    assert_eq!(
        assign_indices(&too_large, &pos()).unwrap_err().code,
        ErrorCode::E3002
    );

    let largest = [PartialArg::Placeholder(Some(MAX_PLACEHOLDER_INDEX))];
    assert!(assign_indices(&largest, &pos()).is_ok());
}

#[test]
fn pruning_drops_placeholders_excess_arguments_would_fill() {
    let mut slots: SmallVec<[Slot; 8]> = SmallVec::from_slice(&[Slot::Closed(0), Slot::Open(0)]);
    prune_trailing(&mut slots);
    assert_eq!(slots.as_slice(), &[Slot::Closed(0)]);

    let mut slots: SmallVec<[Slot; 8]> =
        SmallVec::from_slice(&[Slot::Closed(0), Slot::Open(0), Slot::Open(1)]);
    prune_trailing(&mut slots);
    assert_eq!(slots.as_slice(), &[Slot::Closed(0)]);

    let mut slots: SmallVec<[Slot; 8]> =
        SmallVec::from_slice(&[Slot::Open(0), Slot::Closed(0), Slot::Open(1)]);
    prune_trailing(&mut slots);
    assert_eq!(slots.as_slice(), &[Slot::Open(0), Slot::Closed(0)]);
}

#[test]
fn pruning_keeps_reordered_placeholders() {
    let mut slots: SmallVec<[Slot; 8]> =
        SmallVec::from_slice(&[Slot::Closed(0), Slot::Open(1), Slot::Open(0)]);
    prune_trailing(&mut slots);
    assert_eq!(
        slots.as_slice(),
        &[Slot::Closed(0), Slot::Open(1), Slot::Open(0)]
    );
}

#[test]
fn mappings_pack_four_to_an_integer() {
    let constants = encode_mapping(&[Slot::Closed(0), Slot::Open(0)], &pos()).unwrap();
    // -1 is 0xFF and 1 is 0x01, lowest byte first.
    assert_eq!(constants, vec![Constant::Int(2), Constant::Int(0x01FF)]);

    let five = [
        Slot::Open(0),
        Slot::Open(1),
        Slot::Open(2),
        Slot::Open(3),
        Slot::Closed(0),
    ];
    let constants = encode_mapping(&five, &pos()).unwrap();
    assert_eq!(
        constants,
        vec![
            Constant::Int(5),
            Constant::Int(0x0403_0201),
            Constant::Int(0xFF),
        ]
    );
}

#[test]
fn mappings_outside_a_byte_are_rejected() {
    assert!(encode_mapping(&[Slot::Closed(127)], &pos()).is_ok());
    assert_eq!(
        encode_mapping(&[Slot::Closed(128)], &pos()).unwrap_err().code,
        ErrorCode::E3003
    );
    assert_eq!(
        encode_mapping(&[Slot::Open(127)], &pos()).unwrap_err().code,
        ErrorCode::E3003
    );
}

#[test]
fn binary_operator_with_a_leading_placeholder_flips_the_call() {
    let (code, diags) = lower(Expr::binary(pos(), BinaryOp::Sub, open(), int(1)));
    assert!(diags.is_empty());
    assert_eq!(code, vec!["ldr.cmd (-)", "ldc.int 1", "cmd.2 pa.flip.call"]);
}

#[test]
fn trailing_placeholder_becomes_a_plain_closure_call() {
    let (code, _) = lower(Expr::binary(pos(), BinaryOp::Add, int(1), open()));
    assert_eq!(code, vec!["ldr.cmd (+)", "ldc.int 1", "cmd.2 pa.call"]);
}

#[test]
fn function_with_only_trailing_placeholders_is_the_function_itself() {
    let (code, diags) = lower(f(vec![open(), open()]));
    assert!(diags.is_empty());
    assert_eq!(code, vec!["ldr.func f/m"]);
}

#[test]
fn reordered_placeholders_use_the_general_constructor() {
    let (code, _) = lower(f(vec![at(1), at(0)]));
    assert_eq!(
        code,
        vec!["ldr.func f/m", "ldc.int 3", "ldc.int 66303", "cmd.3 pa.ind"]
    );
}

#[test]
fn member_calls_pass_the_member_name_first() {
    let subject = Expr::call(pos(), EntityRef::local("o"), Vec::new());
    let expr = Expr::member_call(pos(), subject, "Foo", Access::Get, vec![open(), int(2)]);
    let (code, diags) = lower(expr);
    assert!(diags.is_empty());
    assert_eq!(
        code,
        vec![
            "ldc.string \"Foo\"",
            "ldc.bool false",
            "ldloc o",
            "ldc.int 2",
            "ldc.int 3",
            "ldc.int 16646655",
            "cmd.6 pa.mem",
        ]
    );
}

#[test]
fn invalid_placeholders_report_and_push_null() {
    let (code, diags) = lower(f(vec![at(1), at(1)]));
    assert_eq!(code, vec!["ldc.null"]);
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].code, ErrorCode::E3001);
}

#[test]
fn partial_application_in_effect_position_emits_nothing() {
    let mut code = CodeBuffer::new();
    let mut diags: Vec<Diagnostic> = Vec::new();
    {
        let function = FunctionInfo::new("main", ModuleName::new("m"));
        let mut cx = CompileContext::new(&mut code, &mut diags, function, Rc::default());
        let mut expr = f(vec![int(1), open()]);
        expr.emit(&mut cx, StackSemantics::Effect).unwrap();
    }
    assert!(code.is_empty());
    assert!(diags.is_empty());
}
