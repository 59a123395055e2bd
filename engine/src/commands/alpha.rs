use rpn42_core::{Arg, CalcError, CmdResult, Control, ScalarOps, Value};

use crate::{
    Core, Worker,
    commands::storage,
    flags::{FLAG_PRINTER_EXISTS, FLAG_TRACE_PRINT},
    format,
    host::Host,
};

// VIEWING
// ================================================================================================

pub fn view<H: Host>(core: &mut Core<H>, arg: &Arg) -> CmdResult {
    let name = storage::target_name(core, arg)?;
    let value = storage::read_arg_value(core, arg)?;
    let text = format!("{name}={}", format_value(core, &value));
    core.display.draw(0, &text);
    core.display.flush(&mut core.host);
    if core.flags.get(FLAG_TRACE_PRINT) && core.flags.get(FLAG_PRINTER_EXISTS) {
        core.print_line(&text);
    }
    Ok(Control::None)
}

pub fn aview<H: Host>(core: &mut Core<H>) -> CmdResult {
    let text = core.alpha.to_string();
    core.display.draw(0, &text);
    core.display.flush(&mut core.host);
    if core.flags.get(FLAG_PRINTER_EXISTS) {
        core.print_line(&text);
    }
    Ok(Control::None)
}

fn format_value<H: Host>(core: &Core<H>, v: &Value) -> String {
    format::format_value(v, &core.modes, core.punct())
}

// ALPHA REGISTER
// ================================================================================================

pub fn cla<H: Host>(core: &mut Core<H>) -> CmdResult {
    core.alpha.clear();
    Ok(Control::None)
}

/// ASTO stores the first six alpha characters as a string value.
pub fn asto<H: Host>(core: &mut Core<H>, arg: &Arg) -> CmdResult {
    let bytes = core.alpha.as_bytes();
    let head = &bytes[..bytes.len().min(6)];
    let v = Value::Str(rpn42_core::CalcString::from_bytes(head));
    storage::write_arg_value(core, arg, v)?;
    Ok(Control::None)
}

/// ARCL appends the target's display form to alpha.
pub fn arcl<H: Host>(core: &mut Core<H>, arg: &Arg) -> CmdResult {
    let value = storage::read_arg_value(core, arg)?;
    let text = match &value {
        // strings append raw, without the quotes the display adds
        Value::Str(s) => s.as_bytes().to_vec(),
        other => format_value(core, other).into_bytes(),
    };
    core.alpha.append(&text, false);
    Ok(Control::None)
}

/// AIP appends the integer part of X to alpha; digits are produced in reverse and appended
/// reversed, which nets out left-to-right.
pub fn aip<H: Host>(core: &mut Core<H>) -> CmdResult {
    let x = core.stack.x()?.as_real().ok_or(CalcError::InvalidType)?;
    let digits = format::ip_rev_digits(x);
    core.alpha.append(&digits, true);
    Ok(Control::None)
}

/// XTOA appends the character with X's code, or a whole string in X.
pub fn xtoa<H: Host>(core: &mut Core<H>) -> CmdResult {
    match core.stack.x()? {
        Value::Real(x) => {
            let code = x.abs().to_i32_sat();
            if code > 255 {
                return Err(CalcError::InvalidData);
            }
            core.alpha.append_char(code as u8);
        },
        Value::Str(s) => {
            let bytes = s.as_bytes().to_vec();
            core.alpha.append(&bytes, false);
        },
        _ => return Err(CalcError::InvalidType),
    }
    Ok(Control::None)
}

// PRINTING
// ================================================================================================

/// PRV prints a variable. Matrices print one row per engine cycle through the worker
/// mechanism, so big matrices stay interruptible.
pub fn prv<H: Host>(core: &mut Core<H>, arg: &Arg) -> CmdResult {
    if !core.flags.get(FLAG_PRINTER_EXISTS) {
        return Err(CalcError::PrintingIsDisabled);
    }
    let name = core.arg_to_ident(arg)?;
    let value = core.vars.recall(&name).ok_or(CalcError::Nonexistent)?.clone();
    if value.is_matrix() {
        let header = format!("{name}={}", format_value(core, &value));
        core.print_line(&header);
        core.worker = Some(Worker::PrintVar { name, index: 0 });
        return Ok(Control::Interruptible);
    }
    let line = format!("{name}={}", format_value(core, &value));
    core.print_line(&line);
    Ok(Control::None)
}

impl<H: Host> Core<H> {
    /// Runs one step of the pending worker; clears it when finished.
    pub(crate) fn resume_worker(&mut self) {
        let Some(worker) = self.worker.clone() else {
            return;
        };
        match worker {
            Worker::PrintVar { name, index } => {
                let Some(value) = self.vars.recall(&name).cloned() else {
                    self.worker = None;
                    return;
                };
                let (rows, cols) = match &value {
                    Value::RealMatrix(m) => (m.rows(), m.cols()),
                    Value::ComplexMatrix(m) => (m.rows(), m.cols()),
                    _ => {
                        self.worker = None;
                        return;
                    },
                };
                let row = index as u32;
                if row >= rows {
                    self.worker = None;
                    return;
                }
                let mut line = String::new();
                for j in 0..cols {
                    let idx = (row * cols + j) as usize;
                    let cell = match &value {
                        Value::RealMatrix(m) => match m.cell(idx) {
                            rpn42_core::Cell::Num(x) => Value::Real(*x),
                            rpn42_core::Cell::Str(s) => {
                                Value::Str(rpn42_core::CalcString::from_bytes(s))
                            },
                        },
                        Value::ComplexMatrix(m) => {
                            let (re, im) = m.get(idx);
                            Value::Complex { re, im }
                        },
                        _ => unreachable!("matrix checked above"),
                    };
                    if j > 0 {
                        line.push(' ');
                    }
                    line.push_str(&format::format_value(&cell, &self.modes, self.punct()));
                }
                self.print_line(&format!("{}:{line}", row + 1));
                if row + 1 >= rows {
                    self.worker = None;
                } else {
                    self.worker = Some(Worker::PrintVar { name, index: index + 1 });
                }
            },
        }
    }
}
