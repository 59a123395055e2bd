use rpn42_core::{Arg, ArgKind, Cmd, Control, Instruction, Value};

use crate::{Core, flags::FLAG_STACK_LIFT_DISABLE, format, host::Host, interp::RunOutcome};

// KEY CODES
// ================================================================================================
//
// Physical key codes 1..=37, row by row; 0 means "no key, give a running program time".

pub const KEY_SIGMA: i32 = 1;
pub const KEY_INV: i32 = 2;
pub const KEY_SQRT: i32 = 3;
pub const KEY_LOG: i32 = 4;
pub const KEY_LN: i32 = 5;
pub const KEY_XEQ: i32 = 6;
pub const KEY_STO: i32 = 7;
pub const KEY_RCL: i32 = 8;
pub const KEY_RDN: i32 = 9;
pub const KEY_SIN: i32 = 10;
pub const KEY_COS: i32 = 11;
pub const KEY_TAN: i32 = 12;
pub const KEY_ENTER: i32 = 13;
pub const KEY_SWAP: i32 = 14;
pub const KEY_CHS: i32 = 15;
pub const KEY_E: i32 = 16;
pub const KEY_BSP: i32 = 17;
pub const KEY_UP: i32 = 18;
pub const KEY_7: i32 = 19;
pub const KEY_8: i32 = 20;
pub const KEY_9: i32 = 21;
pub const KEY_DIV: i32 = 22;
pub const KEY_DOWN: i32 = 23;
pub const KEY_4: i32 = 24;
pub const KEY_5: i32 = 25;
pub const KEY_6: i32 = 26;
pub const KEY_MUL: i32 = 27;
pub const KEY_SHIFT: i32 = 28;
pub const KEY_1: i32 = 29;
pub const KEY_2: i32 = 30;
pub const KEY_3: i32 = 31;
pub const KEY_SUB: i32 = 32;
pub const KEY_EXIT: i32 = 33;
pub const KEY_0: i32 = 34;
pub const KEY_DOT: i32 = 35;
pub const KEY_RUN: i32 = 36;
pub const KEY_ADD: i32 = 37;

// ENTRY SUB-MODES
// ================================================================================================

/// The interpreter's input sub-mode.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum EntryState {
    #[default]
    Idle,
    /// Assembling a numeric literal; the buffer is the typed text.
    Number(String),
    /// Assembling the argument of a command that takes one.
    Command { cmd: Cmd, ind: bool, digits: String },
}

/// What one key press asked of the shell.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct KeyResult {
    /// A program (or worker) is running: keep feeding key 0.
    pub running: bool,
    /// The key was consumed immediately; suppress the timeout/keyup callbacks.
    pub enqueued: bool,
    /// 0 = no auto-repeat, 1 = slow repeat, 2 = fast repeat.
    pub repeat: i32,
}

// KEY BINDINGS
// ================================================================================================

enum Binding {
    None,
    Digit(u8),
    Dot,
    Exponent,
    Backspace,
    Enter,
    Shift,
    Exit,
    RunStop,
    Cmd(Cmd),
    Off,
}

fn binding(key: i32, shift: bool) -> Binding {
    use Binding::{Backspace, Digit, Dot, Enter, Exit, Exponent, None, Off, RunStop, Shift};
    if shift {
        return match key {
            KEY_INV => Binding::Cmd(Cmd::Ypowx),
            KEY_SQRT => Binding::Cmd(Cmd::Square),
            KEY_LOG => Binding::Cmd(Cmd::TenPowX),
            KEY_LN => Binding::Cmd(Cmd::Exp),
            KEY_XEQ => Binding::Cmd(Cmd::Gto),
            KEY_STO => Binding::Cmd(Cmd::Complex),
            KEY_RCL => Binding::Cmd(Cmd::Percent),
            KEY_RDN => Binding::Cmd(Cmd::Pi),
            KEY_SIN => Binding::Cmd(Cmd::Asin),
            KEY_COS => Binding::Cmd(Cmd::Acos),
            KEY_TAN => Binding::Cmd(Cmd::Atan),
            KEY_ENTER => None, // alpha mode toggle, handled by the caller
            KEY_SWAP => Binding::Cmd(Cmd::Lastx),
            KEY_EXIT => Off,
            _ => None,
        };
    }
    match key {
        KEY_SIGMA => None,
        KEY_INV => Binding::Cmd(Cmd::Inv),
        KEY_SQRT => Binding::Cmd(Cmd::Sqrt),
        KEY_LOG => Binding::Cmd(Cmd::Log),
        KEY_LN => Binding::Cmd(Cmd::Ln),
        KEY_XEQ => Binding::Cmd(Cmd::Xeq),
        KEY_STO => Binding::Cmd(Cmd::Sto),
        KEY_RCL => Binding::Cmd(Cmd::Rcl),
        KEY_RDN => Binding::Cmd(Cmd::Rdn),
        KEY_SIN => Binding::Cmd(Cmd::Sin),
        KEY_COS => Binding::Cmd(Cmd::Cos),
        KEY_TAN => Binding::Cmd(Cmd::Tan),
        KEY_ENTER => Enter,
        KEY_SWAP => Binding::Cmd(Cmd::Swap),
        KEY_CHS => Binding::Cmd(Cmd::Chs),
        KEY_E => Exponent,
        KEY_BSP => Backspace,
        KEY_7 => Digit(7),
        KEY_8 => Digit(8),
        KEY_9 => Digit(9),
        KEY_DIV => Binding::Cmd(Cmd::Div),
        KEY_4 => Digit(4),
        KEY_5 => Digit(5),
        KEY_6 => Digit(6),
        KEY_MUL => Binding::Cmd(Cmd::Mul),
        KEY_SHIFT => Shift,
        KEY_1 => Digit(1),
        KEY_2 => Digit(2),
        KEY_3 => Digit(3),
        KEY_SUB => Binding::Cmd(Cmd::Sub),
        KEY_EXIT => Exit,
        KEY_0 => Digit(0),
        KEY_DOT => Dot,
        KEY_RUN => RunStop,
        KEY_ADD => Binding::Cmd(Cmd::Add),
        _ => None,
    }
}

/// The alpha keyboard: the top rows map to letters, the digit pad stays numeric.
fn alpha_char(key: i32, shift: bool) -> Option<u8> {
    let base = match key {
        1..=12 => Some(b'A' + (key - 1) as u8),
        KEY_SWAP => Some(b'M'),
        KEY_CHS => Some(b'N'),
        KEY_E => Some(b'O'),
        KEY_7 => Some(b'7'),
        KEY_8 => Some(b'8'),
        KEY_9 => Some(b'9'),
        KEY_DIV => Some(b'P'),
        KEY_4 => Some(b'4'),
        KEY_5 => Some(b'5'),
        KEY_6 => Some(b'6'),
        KEY_MUL => Some(b'Q'),
        KEY_1 => Some(b'1'),
        KEY_2 => Some(b'2'),
        KEY_3 => Some(b'3'),
        KEY_SUB => Some(b'R'),
        KEY_0 => Some(b'0'),
        KEY_DOT => Some(b'.'),
        KEY_ADD => Some(b'S'),
        _ => None,
    };
    base.map(|c| if shift && c.is_ascii_uppercase() { c.to_ascii_lowercase() } else { c })
}

// KEY EVENT ENTRY POINTS
// ================================================================================================

impl<H: Host> Core<H> {
    /// The sole entry point while idle. Key 0 gives a running program or pending worker a
    /// time slice; 1..=37 are physical keys.
    pub fn keydown(&mut self, key: i32) -> KeyResult {
        if key == 0 {
            if self.pause {
                // PSE owns the clock; timeout3 wakes the program back up
                return KeyResult { running: false, enqueued: true, repeat: 0 };
            }
            if self.worker.is_some() {
                self.resume_worker();
                let running = self.worker.is_some() || self.program_running;
                return KeyResult { running, enqueued: true, repeat: 0 };
            }
            if self.program_running {
                let outcome = self.run_slice();
                let running = matches!(outcome, RunOutcome::Running) || self.worker.is_some();
                if !running && !self.pause {
                    self.repaint_display();
                }
                return KeyResult { running, enqueued: true, repeat: 0 };
            }
            return KeyResult::default();
        }

        // a keypress while a program runs stops it at the next boundary
        if self.program_running {
            self.program_running = false;
            self.repaint_display();
            return KeyResult { running: false, enqueued: true, repeat: 0 };
        }

        if key == KEY_SHIFT {
            self.shift = !self.shift;
            self.update_annunciators();
            return KeyResult { enqueued: true, ..KeyResult::default() };
        }
        let shift = core::mem::replace(&mut self.shift, false);
        if shift {
            self.update_annunciators();
        }

        // ALPHA toggle
        if shift && key == KEY_ENTER {
            self.alpha_active = !self.alpha_active;
            return KeyResult { enqueued: true, ..KeyResult::default() };
        }

        if self.alpha_active {
            return self.alpha_key(key, shift);
        }

        if let EntryState::Command { .. } = self.entry {
            return self.command_entry_key(key, shift);
        }

        self.normal_key(key, shift)
    }

    /// Called when the key is released; reports whether a program is (still) running.
    pub fn keyup(&mut self) -> bool {
        self.program_running || self.worker.is_some()
    }

    /// Auto-repeat poll: fast repeat for backspace during number entry, nothing else.
    pub fn repeat(&mut self) -> i32 {
        if self.settings.auto_repeat && matches!(self.entry, EntryState::Number(_)) { 2 } else { 0 }
    }

    /// 0.25 s hold: show the name of the held key's command.
    pub fn keytimeout1(&mut self, key: i32) {
        if let Binding::Cmd(cmd) = binding(key, self.shift) {
            self.display.draw(0, cmd.spec().name);
            self.display.flush(&mut self.host);
        }
    }

    /// 2 s hold: the key is annulled; restore the display.
    pub fn keytimeout2(&mut self) {
        self.repaint_display();
    }

    /// PSE and display-refresh timer. Returns true when the shell should resume feeding
    /// key 0.
    pub fn timeout3(&mut self, repaint: bool) -> bool {
        if self.pause {
            self.pause = false;
            return self.program_running;
        }
        if repaint {
            self.repaint_display();
        }
        false
    }

    /// Power returning: transient input state is dropped; a running program does not survive.
    pub fn powercycle(&mut self) -> bool {
        self.entry = EntryState::Idle;
        self.shift = false;
        self.pause = false;
        self.worker = None;
        self.program_running = false;
        self.repaint_display();
        false
    }

    // NORMAL MODE
    // --------------------------------------------------------------------------------------------

    fn normal_key(&mut self, key: i32, shift: bool) -> KeyResult {
        match binding(key, shift) {
            Binding::Digit(d) => {
                self.number_entry_char(b'0' + d);
                KeyResult { repeat: 0, enqueued: true, ..KeyResult::default() }
            },
            Binding::Dot => {
                self.number_entry_char(b'.');
                KeyResult { enqueued: true, ..KeyResult::default() }
            },
            Binding::Exponent => {
                self.number_entry_char(b'E');
                KeyResult { enqueued: true, ..KeyResult::default() }
            },
            Binding::Backspace => {
                self.backspace();
                KeyResult { enqueued: true, repeat: self.repeat(), ..KeyResult::default() }
            },
            Binding::Enter => {
                self.finish_number_entry();
                let _ = self.execute_checked(&Instruction::plain(Cmd::Enter));
                KeyResult { enqueued: true, ..KeyResult::default() }
            },
            Binding::Cmd(Cmd::Chs) if matches!(self.entry, EntryState::Number(_)) => {
                self.number_entry_char(b'-');
                KeyResult { enqueued: true, ..KeyResult::default() }
            },
            Binding::Cmd(cmd) => {
                self.finish_number_entry();
                if cmd.spec().arg == ArgKind::None {
                    let res = self.execute_checked(&Instruction::plain(cmd));
                    self.after_command(res)
                } else {
                    self.entry = EntryState::Command { cmd, ind: false, digits: String::new() };
                    self.display.draw(1, &format!("{} _", cmd.spec().name));
                    self.display.flush(&mut self.host);
                    KeyResult::default()
                }
            },
            Binding::RunStop => {
                self.finish_number_entry();
                let res = self.execute_checked(&Instruction::plain(Cmd::RunStop));
                self.after_command(res)
            },
            Binding::Exit => {
                self.entry = EntryState::Idle;
                self.repaint_display();
                KeyResult { enqueued: true, ..KeyResult::default() }
            },
            Binding::Off => {
                self.host.powerdown();
                KeyResult { enqueued: true, ..KeyResult::default() }
            },
            Binding::Shift | Binding::None => KeyResult::default(),
        }
    }

    fn after_command(&mut self, res: rpn42_core::CmdResult) -> KeyResult {
        match res {
            Ok(Control::Run) | Ok(Control::Interruptible) => {
                KeyResult { running: true, enqueued: true, repeat: 0 }
            },
            Ok(_) => {
                self.repaint_display();
                KeyResult { enqueued: true, ..KeyResult::default() }
            },
            // the error message is already on the display; leave it there
            Err(_) => KeyResult { enqueued: true, ..KeyResult::default() },
        }
    }

    // NUMBER ENTRY
    // --------------------------------------------------------------------------------------------

    fn number_entry_char(&mut self, c: u8) {
        if !matches!(self.entry, EntryState::Number(_)) {
            // first keystroke lifts (honoring the lift-disable flag) and starts editing X
            let _ = self.recall_result_silently(Value::Real(0.0));
            self.entry = EntryState::Number(String::new());
        }
        let EntryState::Number(buf) = &mut self.entry else {
            unreachable!("entry set to Number above");
        };
        match c {
            b'.' if buf.contains('.') || buf.contains('E') => return,
            b'.' => buf.push('.'),
            b'E' if buf.contains('E') => return,
            b'E' => {
                if buf.is_empty() || buf == "-" {
                    buf.push('1');
                }
                buf.push('E');
            },
            b'-' => {
                // negate the exponent when one is being typed, the mantissa otherwise
                if let Some(epos) = buf.rfind('E') {
                    if buf[epos + 1..].starts_with('-') {
                        buf.remove(epos + 1);
                    } else {
                        buf.insert(epos + 1, '-');
                    }
                } else if let Some(rest) = buf.strip_prefix('-') {
                    *buf = rest.to_string();
                } else {
                    buf.insert(0, '-');
                }
            },
            d => buf.push(d as char),
        }
        self.show_entry();
    }

    fn backspace(&mut self) {
        match &mut self.entry {
            EntryState::Number(buf) => {
                buf.pop();
                if buf.is_empty() {
                    self.entry = EntryState::Idle;
                    self.stack.overwrite_x(Value::Real(0.0));
                    self.flags.set(FLAG_STACK_LIFT_DISABLE, true);
                    self.repaint_display();
                } else {
                    self.show_entry();
                }
            },
            EntryState::Command { digits, .. } => {
                if digits.pop().is_none() {
                    self.entry = EntryState::Idle;
                }
            },
            EntryState::Idle => {
                let _ = self.execute_checked(&Instruction::plain(Cmd::Clx));
                self.repaint_display();
            },
        }
    }

    fn show_entry(&mut self) {
        if let EntryState::Number(buf) = &self.entry {
            let parsed = entry_value(buf);
            self.stack.overwrite_x(Value::Real(parsed));
            let text = format!("x: {buf}_");
            self.display.draw(1, &text);
            self.display.flush(&mut self.host);
        }
    }

    /// Terminates number entry: X keeps the final value and stack lift is re-enabled.
    pub(crate) fn finish_number_entry(&mut self) {
        if let EntryState::Number(buf) = &self.entry {
            let parsed = entry_value(buf);
            self.stack.overwrite_x(Value::Real(parsed));
            self.entry = EntryState::Idle;
            self.flags.set(FLAG_STACK_LIFT_DISABLE, false);
        }
    }

    // COMMAND ARGUMENT ENTRY
    // --------------------------------------------------------------------------------------------

    fn command_entry_key(&mut self, key: i32, shift: bool) -> KeyResult {
        let EntryState::Command { cmd, ind, mut digits } = self.entry.clone() else {
            return KeyResult::default();
        };
        match binding(key, shift) {
            Binding::Digit(d) => {
                digits.push((b'0' + d) as char);
                if digits.len() == 2 {
                    let num: u32 = digits.parse().expect("two digits parse");
                    self.entry = EntryState::Idle;
                    let arg = if ind { Arg::IndNum(num) } else { Arg::Num(num) };
                    let res = self.execute_checked(&Instruction::new(cmd, arg));
                    return self.after_command(res);
                }
                self.entry = EntryState::Command { cmd, ind, digits };
                KeyResult::default()
            },
            Binding::Dot => {
                self.entry = EntryState::Command { cmd, ind: !ind, digits };
                KeyResult::default()
            },
            Binding::Enter => {
                // a lone ENTER completes a one-digit argument
                self.entry = EntryState::Idle;
                if let Ok(num) = digits.parse::<u32>() {
                    let arg = if ind { Arg::IndNum(num) } else { Arg::Num(num) };
                    let res = self.execute_checked(&Instruction::new(cmd, arg));
                    return self.after_command(res);
                }
                KeyResult::default()
            },
            Binding::Backspace => {
                self.backspace();
                KeyResult::default()
            },
            Binding::Exit => {
                self.entry = EntryState::Idle;
                self.repaint_display();
                KeyResult::default()
            },
            _ => KeyResult::default(),
        }
    }

    // ALPHA MODE
    // --------------------------------------------------------------------------------------------

    fn alpha_key(&mut self, key: i32, shift: bool) -> KeyResult {
        match key {
            KEY_EXIT => {
                self.alpha_active = false;
                KeyResult { enqueued: true, ..KeyResult::default() }
            },
            KEY_BSP => {
                let bytes = self.alpha.as_bytes();
                if !bytes.is_empty() {
                    let kept = bytes[..bytes.len() - 1].to_vec();
                    self.alpha.clear();
                    self.alpha.append(&kept, false);
                }
                self.show_alpha();
                KeyResult { enqueued: true, ..KeyResult::default() }
            },
            KEY_ENTER => {
                self.alpha_active = false;
                KeyResult { enqueued: true, ..KeyResult::default() }
            },
            _ => {
                if let Some(c) = alpha_char(key, shift) {
                    self.alpha.append_char(c);
                    self.show_alpha();
                }
                KeyResult { enqueued: true, ..KeyResult::default() }
            },
        }
    }

    fn show_alpha(&mut self) {
        let text = format!("{}_", self.alpha);
        self.display.draw(0, &text);
        self.display.flush(&mut self.host);
    }
}

/// Parses a partially-typed number; a trailing exponent marker counts as E0.
fn entry_value(buf: &str) -> rpn42_core::Scalar {
    let cleaned = if buf.ends_with('E') || buf.ends_with("E-") {
        format!("{buf}0")
    } else {
        buf.to_string()
    };
    format::parse_number(&cleaned).unwrap_or(0.0)
}
