use rpn42_core::{Arg, CmdResult};

use crate::{
    Core,
    flags::{FLAG_STACK_LIFT_DISABLE, FlagOp, Flags},
    host::Host,
};

// FLAG COMMANDS
// ================================================================================================

fn flag_op<H: Host>(core: &mut Core<H>, arg: &Arg, op: FlagOp) -> CmdResult {
    let num = core.arg_to_num(arg)?;
    let num = Flags::check_access(num, op)?;
    if Flags::is_virtual(num) {
        return core.virtual_flag_op(op, num);
    }
    let res = core.flags.apply(num, op)?;
    if num == FLAG_STACK_LIFT_DISABLE && matches!(op, FlagOp::Set) {
        // stack lift is re-enabled after every command unless the command objects, so SF 30
        // must object for the set to have any effect
        core.mode_disable_stack_lift = true;
    }
    Ok(res)
}

pub fn sf<H: Host>(core: &mut Core<H>, arg: &Arg) -> CmdResult {
    flag_op(core, arg, FlagOp::Set)
}

pub fn cf<H: Host>(core: &mut Core<H>, arg: &Arg) -> CmdResult {
    flag_op(core, arg, FlagOp::Clear)
}

pub fn fs_t<H: Host>(core: &mut Core<H>, arg: &Arg) -> CmdResult {
    flag_op(core, arg, FlagOp::IsSet)
}

pub fn fc_t<H: Host>(core: &mut Core<H>, arg: &Arg) -> CmdResult {
    flag_op(core, arg, FlagOp::IsClear)
}

pub fn fsc_t<H: Host>(core: &mut Core<H>, arg: &Arg) -> CmdResult {
    flag_op(core, arg, FlagOp::IsSetClear)
}

pub fn fcc_t<H: Host>(core: &mut Core<H>, arg: &Arg) -> CmdResult {
    flag_op(core, arg, FlagOp::IsClearClear)
}
