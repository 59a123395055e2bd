//! End-to-end keyboard and command scenarios.

mod common;

use common::*;
use pretty_assertions::assert_eq;
use rpn42_engine::{
    Arg, CalcError, Control, Value,
    keys::{KEY_0, KEY_1, KEY_2, KEY_3, KEY_ADD, KEY_DIV, KEY_ENTER},
};

#[test]
fn two_enter_three_plus_is_five() {
    let mut core = core();
    core.keydown(KEY_2);
    core.keydown(KEY_ENTER);
    core.keydown(KEY_3);
    core.keydown(KEY_ADD);
    assert_eq!(x_real(&core), 5.0);
    // stack lift disabled by ENTER was honored: Y held the 2 that was consumed
    assert_eq!(core.stack().lastx(), &Value::Real(3.0));
}

#[test]
fn divide_by_zero_leaves_x_unchanged() {
    let mut core = core();
    core.keydown(KEY_1);
    core.keydown(KEY_ENTER);
    core.keydown(KEY_0);
    core.keydown(KEY_DIV);
    assert_eq!(x_real(&core), 0.0);
    assert_eq!(level_real(&core, 1), 1.0);
    assert!(core.display_row(0).contains("Divide by 0"));
}

#[test]
fn solve_quadratic_program() {
    let mut core = core();
    core.paste("LBL \"F\"\nRCL \"X\"\nX^2\n4\n-\nRTN").unwrap();
    cmd_arg(&mut core, "PGMSLV", Arg::Str(ident("F"))).unwrap();
    push(&mut core, 3.0);
    sto_var(&mut core, "X");
    let res = cmd_arg(&mut core, "SOLVE", Arg::Str(ident("X"))).unwrap();
    assert_eq!(res, Control::Run);
    core.run_to_completion(10_000).unwrap();

    assert!((x_real(&core) - 2.0).abs() < 1e-9, "root was {}", x_real(&core));
    // Z holds the residual, T the termination class (0 = Root)
    assert!(level_real(&core, 2).abs() < 1e-6);
    assert_eq!(level_real(&core, 3), 0.0);
    // the root landed in the variable too
    assert!(
        matches!(core.vars().recall(&ident("X")), Some(Value::Real(x)) if (x - 2.0).abs() < 1e-9)
    );
}

#[test]
fn integrate_x_squared_over_unit_interval() {
    let mut core = core();
    core.paste("LBL \"G\"\nRCL \"X\"\nX^2\nRTN").unwrap();
    cmd_arg(&mut core, "PGMINT", Arg::Str(ident("G"))).unwrap();
    push(&mut core, 0.0);
    sto_var(&mut core, "LLIM");
    push(&mut core, 1.0);
    sto_var(&mut core, "ULIM");
    push(&mut core, 1e-6);
    sto_var(&mut core, "ACC");

    let res = cmd_arg(&mut core, "INTEG", Arg::Str(ident("X"))).unwrap();
    assert_eq!(res, Control::Run);
    core.run_to_completion(100_000).unwrap();

    let result = x_real(&core);
    let eps = level_real(&core, 1);
    assert!((result - 1.0 / 3.0).abs() < 1e-6, "integral was {result}");
    assert!(eps <= 1e-6 * result.abs() + 1e-12, "achieved eps {eps}");
}

#[test]
fn word_size_eight_wrap_and_range_error() {
    let mut core = core();
    push(&mut core, 8.0);
    cmd(&mut core, "WSIZE").unwrap();
    cmd(&mut core, "BINM").unwrap();

    // without wrap: out of range
    push(&mut core, 127.0);
    push(&mut core, 1.0);
    assert_eq!(cmd(&mut core, "BASE+"), Err(CalcError::OutOfRange));

    // with wrap: 127 + 1 = -128 in 8-bit signed
    cmd(&mut core, "BWRAP").unwrap();
    assert_eq!(cmd(&mut core, "BASE+"), Ok(Control::None));
    assert_eq!(x_real(&core), -128.0);
}

#[test]
fn base_add_carry_tracks_unsigned_carry_out() {
    let mut core = core();
    push(&mut core, 8.0);
    cmd(&mut core, "WSIZE").unwrap();
    cmd(&mut core, "BSIGNED").unwrap(); // unsigned
    cmd(&mut core, "BWRAP").unwrap();
    push(&mut core, 200.0);
    push(&mut core, 100.0);
    cmd(&mut core, "BASE+").unwrap();
    assert_eq!(x_real(&core), 44.0); // 300 mod 256
    assert!(core.modes().carry);

    push(&mut core, 10.0);
    push(&mut core, 20.0);
    cmd(&mut core, "BASE+").unwrap();
    assert_eq!(x_real(&core), 30.0);
    assert!(!core.modes().carry);
}

#[test]
fn complex_entry_and_abs() {
    let mut core = core();
    push(&mut core, 0.0);
    cmd(&mut core, "ENTER").unwrap();
    push(&mut core, 1.0);
    cmd(&mut core, "COMPLEX").unwrap();
    assert_eq!(core.stack().x().unwrap(), &Value::complex(0.0, 1.0));
    cmd(&mut core, "ABS").unwrap();
    assert_eq!(core.stack().x().unwrap(), &Value::Real(1.0));
}

#[test]
fn chs_twice_is_identity() {
    let mut core = core();
    push(&mut core, 2.75);
    cmd(&mut core, "+/-").unwrap();
    assert_eq!(x_real(&core), -2.75);
    cmd(&mut core, "+/-").unwrap();
    assert_eq!(x_real(&core), 2.75);
}

#[test]
fn pol_rec_roundtrip() {
    let mut core = core();
    cmd(&mut core, "RAD").unwrap();
    push(&mut core, 4.0); // y
    push(&mut core, 3.0); // x
    cmd(&mut core, "->POL").unwrap();
    assert!((x_real(&core) - 5.0).abs() < 1e-12);
    cmd(&mut core, "->REC").unwrap();
    assert!((x_real(&core) - 3.0).abs() < 1e-12);
    assert!((level_real(&core, 1) - 4.0).abs() < 1e-12);
}

#[test]
fn predicates_skip_next_program_line() {
    let mut core = core();
    // X<0? skips the "2" line for a positive argument
    core.paste("LBL \"P\"\n1\nX<0?\n2\nRTN").unwrap();
    cmd_arg(&mut core, "XEQ", Arg::Str(ident("P"))).unwrap();
    core.run_to_completion(1000).unwrap();
    assert_eq!(x_real(&core), 1.0);
}

#[test]
fn isg_loop_counts() {
    let mut core = core();
    // counter 0.003: loop body runs for 1, 2, 3
    core.paste("LBL \"L\"\n0.003\nSTO \"I\"\n0\nLBL 01\n1\n+\nISG \"I\"\nGTO 01\nRTN")
        .unwrap();
    cmd_arg(&mut core, "XEQ", Arg::Str(ident("L"))).unwrap();
    core.run_to_completion(10_000).unwrap();
    assert_eq!(x_real(&core), 4.0);
}

#[test]
fn indirect_recall_through_register() {
    let mut core = core();
    push(&mut core, 42.0);
    cmd_arg(&mut core, "STO", Arg::Num(7)).unwrap();
    push(&mut core, 7.0);
    cmd_arg(&mut core, "STO", Arg::Num(3)).unwrap();
    // RCL IND 03 reads register 3 (= 7), then recalls register 7
    cmd_arg(&mut core, "RCL", Arg::IndNum(3)).unwrap();
    assert_eq!(x_real(&core), 42.0);
}

#[test]
fn restricted_flags_survive_write_attempts() {
    let mut core = core();
    for flag in [36u32, 50, 80] {
        let before = core.flags().get(flag as usize);
        assert_eq!(
            cmd_arg(&mut core, "SF", Arg::Num(flag)),
            Err(CalcError::RestrictedOperation)
        );
        assert_eq!(core.flags().get(flag as usize), before);
    }
    assert_eq!(cmd_arg(&mut core, "SF", Arg::Num(100)), Err(CalcError::Nonexistent));
}

#[test]
fn flag_30_gates_stack_lift() {
    let mut core = core();
    push(&mut core, 1.0);
    push(&mut core, 2.0);
    // SF 30 disables lift for the next result only
    cmd_arg(&mut core, "SF", Arg::Num(30)).unwrap();
    push(&mut core, 9.0);
    assert_eq!(x_real(&core), 9.0);
    assert_eq!(level_real(&core, 1), 1.0); // the 2 was overwritten
    push(&mut core, 5.0);
    assert_eq!(level_real(&core, 1), 9.0); // lift is back
}

#[test]
fn big_stack_binary_op_shrinks() {
    let mut core = core();
    cmd(&mut core, "NSTK").unwrap();
    cmd(&mut core, "CLST").unwrap();
    assert_eq!(core.stack().depth(), 0);
    push(&mut core, 1.0);
    push(&mut core, 2.0);
    push(&mut core, 3.0);
    cmd(&mut core, "+").unwrap();
    assert_eq!(core.stack().depth(), 2);
    assert_eq!(x_real(&core), 5.0);
    // underflow is a stack depth error
    cmd(&mut core, "+").unwrap();
    assert_eq!(cmd(&mut core, "+"), Err(CalcError::StackDepthError));
    cmd(&mut core, "4STK").unwrap();
    assert_eq!(core.stack().depth(), 4);
}

#[test]
fn sign_returns_zero_for_strings() {
    let mut core = core();
    core.paste("HELLO").unwrap();
    assert!(matches!(core.stack().x().unwrap(), Value::Str(_)));
    cmd(&mut core, "SIGN").unwrap();
    assert_eq!(x_real(&core), 0.0);
}

#[test]
fn matrix_dim_index_and_element_access() {
    let mut core = core();
    push(&mut core, 2.0);
    push(&mut core, 3.0);
    cmd_arg(&mut core, "DIM", Arg::Str(ident("M"))).unwrap();
    cmd_arg(&mut core, "INDEX", Arg::Str(ident("M"))).unwrap();
    push(&mut core, 2.0);
    push(&mut core, 3.0);
    cmd(&mut core, "STOIJ").unwrap();
    push(&mut core, 6.5);
    cmd(&mut core, "STOEL").unwrap();
    cmd(&mut core, "RCLEL").unwrap();
    assert_eq!(x_real(&core), 6.5);
    // the matrix really holds it at (2,3)
    match core.vars().recall(&ident("M")).unwrap() {
        Value::RealMatrix(m) => {
            assert_eq!(m.cell(1 * 3 + 2).as_num(), Some(6.5));
        },
        other => panic!("expected matrix, got {other:?}"),
    }
}

#[test]
fn prv_matrix_runs_through_worker() {
    let mut core = core();
    cmd_arg(&mut core, "SF", Arg::Num(55)).unwrap(); // printer exists
    push(&mut core, 3.0);
    push(&mut core, 2.0);
    cmd_arg(&mut core, "DIM", Arg::Str(ident("M"))).unwrap();
    let res = cmd_arg(&mut core, "PRV", Arg::Str(ident("M"))).unwrap();
    assert_eq!(res, Control::Interruptible);
    core.run_to_completion(100).unwrap();
    let host = core.cleanup();
    // header plus one line per row
    assert_eq!(host.printed.len(), 4);
    assert!(host.printed[0].starts_with("M="));
}

#[test]
fn prv_without_printer_is_disabled() {
    let mut core = core();
    push(&mut core, 1.0);
    sto_var(&mut core, "V");
    assert_eq!(
        cmd_arg(&mut core, "PRV", Arg::Str(ident("V"))),
        Err(CalcError::PrintingIsDisabled)
    );
}

#[test]
fn alpha_append_and_arcl() {
    let mut core = core();
    push(&mut core, 65.0);
    cmd(&mut core, "XTOA").unwrap();
    push(&mut core, 123.9);
    cmd(&mut core, "AIP").unwrap();
    assert_eq!(core.alpha().as_bytes(), b"A123");
    cmd(&mut core, "CLA").unwrap();
    assert_eq!(core.alpha().len(), 0);
}

#[test]
fn rotxy_and_bit_ops() {
    let mut core = core();
    push(&mut core, 16.0);
    cmd(&mut core, "WSIZE").unwrap();
    cmd(&mut core, "BSIGNED").unwrap(); // unsigned

    push(&mut core, 1.0);
    push(&mut core, 4.0);
    cmd(&mut core, "ROTXY").unwrap();
    // 1 rotated right by 4 in 16 bits = 0x1000
    assert_eq!(x_real(&core), 4096.0);

    push(&mut core, 5.0);
    push(&mut core, 12.0);
    // bit 12 of 5 is clear; BIT? leaves the stack alone
    assert_eq!(cmd(&mut core, "BIT?"), Ok(rpn42_engine::Control::No));
    assert_eq!(x_real(&core), 12.0);

    push(&mut core, 0.0);
    push(&mut core, 0.0);
    cmd(&mut core, "SB").unwrap();
    assert_eq!(x_real(&core), 1.0);
}
