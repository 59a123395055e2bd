//! Versioned persistence of the whole core, plus the raw program channel and the text
//! clipboard.
//!
//! The state stream is `magic "24kF" | file_version | shell_state_size | shell_state |
//! core blocks`. Each core block is `tag | size | body`, so a loader can skip blocks it does
//! not know. The solver and integrator blocks carry their own inner version and are reset
//! individually on mismatch instead of failing the whole load.

use rpn42_core::{
    CalcError, CalcString, Ident, Value,
    serialization::{
        read_i32_be, read_i64_be, read_scalar_be, read_u32_be, write_i32_be, write_i64_be,
        write_scalar_be, write_u32_be,
    },
};
use winter_utils::{
    ByteReader, ByteWriter, Deserializable, DeserializationError, Serializable, SliceReader,
};

use crate::{
    Core,
    flags::Flags,
    format,
    host::Host,
    integ::IntegState,
    modes::DispFormat,
    prgms::Program,
    solver::SolveState,
    vars::VarEntry,
};

const MAGIC: [u8; 4] = *b"24kF";
const FILE_VERSION: i32 = 1;

const SOLVE_VERSION: i32 = 4;
const INTEG_VERSION: i32 = 3;

const BLOCK_MODES: u32 = 1;
const BLOCK_FLAGS: u32 = 2;
const BLOCK_STACK: u32 = 3;
const BLOCK_ALPHA: u32 = 4;
const BLOCK_VARS: u32 = 5;
const BLOCK_PRGMS: u32 = 6;
const BLOCK_SOLVE: u32 = 7;
const BLOCK_INTEG: u32 = 8;

// ERRORS
// ================================================================================================

/// Failures of state save/load and the program channels.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("not a calculator state stream")]
    BadMagic,
    #[error("unsupported state file version {0}")]
    UnsupportedVersion(i32),
    #[error("i/o error")]
    Io(#[from] std::io::Error),
    #[error("corrupt state stream")]
    Corrupt(#[from] DeserializationError),
}

// STATE SAVE / LOAD
// ================================================================================================

impl<H: Host> Core<H> {
    /// Serializes the whole core and hands it to the shell's saved-state channel.
    pub fn save_state(&mut self) -> Result<(), StateError> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&MAGIC);
        write_i32_be(&mut buf, FILE_VERSION);
        // the engine keeps no shell state of its own
        write_i32_be(&mut buf, 0);

        write_block(&mut buf, BLOCK_MODES, |out| self.write_modes(out));
        write_block(&mut buf, BLOCK_FLAGS, |out| out.write_bytes(&self.flags.to_bytes()));
        write_block(&mut buf, BLOCK_STACK, |out| {
            out.write_u8(self.stack.is_big() as u8);
            write_u32_be(out, self.stack.depth() as u32);
            for v in self.stack.levels() {
                v.write_into(out);
            }
            self.stack.lastx().write_into(out);
        });
        write_block(&mut buf, BLOCK_ALPHA, |out| self.alpha.write_into(out));
        write_block(&mut buf, BLOCK_VARS, |out| {
            write_u32_be(out, self.vars.len() as u32);
            for entry in self.vars.entries() {
                entry.name.write_into(out);
                write_i32_be(out, entry.level);
                out.write_u8(entry.hidden as u8);
                entry.value.write_into(out);
            }
        });
        write_block(&mut buf, BLOCK_PRGMS, |out| {
            write_u32_be(out, self.prgms.count() as u32);
            for idx in 0..self.prgms.count() {
                let bytes = self.prgms.prgm(idx).expect("index in range").bytes();
                write_u32_be(out, bytes.len() as u32);
                out.write_bytes(bytes);
            }
            write_u32_be(out, self.prgms.current as u32);
            write_u32_be(out, self.prgms.pc as u32);
        });
        write_block(&mut buf, BLOCK_SOLVE, |out| {
            write_i32_be(out, SOLVE_VERSION);
            let body = write_to_vec(|b| write_solve(b, &self.solve));
            write_i32_be(out, body.len() as i32);
            out.write_bytes(&body);
        });
        write_block(&mut buf, BLOCK_INTEG, |out| {
            write_i32_be(out, INTEG_VERSION);
            let body = write_to_vec(|b| write_integ(b, &self.integ));
            write_i32_be(out, body.len() as i32);
            out.write_bytes(&body);
        });

        self.host.write_saved_state(&buf)?;
        Ok(())
    }

    /// Restores the core from the shell's saved-state channel. On any structural error the
    /// core is left in its previous state.
    pub fn load_state(&mut self) -> Result<(), StateError> {
        let data = read_all_saved_state(&mut self.host)?;
        let mut reader = SliceReader::new(&data);

        let magic: [u8; 4] = reader.read_array().map_err(|_| StateError::BadMagic)?;
        if magic != MAGIC {
            return Err(StateError::BadMagic);
        }
        let version = read_i32_be(&mut reader)?;
        if version != FILE_VERSION {
            return Err(StateError::UnsupportedVersion(version));
        }
        let shell_size = read_i32_be(&mut reader)? as usize;
        let _shell_state = reader.read_vec(shell_size)?;

        while reader.has_more_bytes() {
            let tag = read_u32_be(&mut reader)?;
            let size = read_u32_be(&mut reader)? as usize;
            let body = reader.read_vec(size)?;
            let mut block = SliceReader::new(&body);
            match tag {
                BLOCK_MODES => self.read_modes(&mut block)?,
                BLOCK_FLAGS => {
                    let bytes: [u8; 100] = block.read_array()?;
                    self.flags = Flags::from_bytes(&bytes);
                },
                BLOCK_STACK => {
                    let big = block.read_u8()? != 0;
                    let count = read_u32_be(&mut block)? as usize;
                    let mut vals = Vec::with_capacity(count.min(1024));
                    for _ in 0..count {
                        vals.push(Value::read_from(&mut block)?);
                    }
                    let lastx = Value::read_from(&mut block)?;
                    self.stack.restore(vals, lastx, big);
                    self.modes.big_stack = big;
                },
                BLOCK_ALPHA => self.alpha = CalcString::read_from(&mut block)?,
                BLOCK_VARS => {
                    let count = read_u32_be(&mut block)? as usize;
                    self.vars.clear();
                    for _ in 0..count {
                        let name = Ident::read_from(&mut block)?;
                        let level = read_i32_be(&mut block)?;
                        let hidden = block.read_u8()? != 0;
                        let value = Value::read_from(&mut block)?;
                        self.vars.push_entry(VarEntry { name, level, value, hidden });
                    }
                },
                BLOCK_PRGMS => {
                    let count = read_u32_be(&mut block)? as usize;
                    let mut prgms = Vec::with_capacity(count.min(1024));
                    for _ in 0..count {
                        let size = read_u32_be(&mut block)? as usize;
                        let bytes = block.read_vec(size)?;
                        let prgm = Program::from_bytes(bytes).map_err(|_| {
                            DeserializationError::InvalidValue("bad program stream".into())
                        })?;
                        prgms.push(prgm);
                    }
                    let current = read_u32_be(&mut block)? as usize;
                    let pc = read_u32_be(&mut block)? as usize;
                    self.prgms.restore(prgms, current, pc);
                },
                BLOCK_SOLVE => {
                    let version = read_i32_be(&mut block)?;
                    let size = read_i32_be(&mut block)? as usize;
                    let body = block.read_vec(size)?;
                    if version == SOLVE_VERSION {
                        self.solve = read_solve(&mut SliceReader::new(&body))?;
                    } else {
                        self.solve.reset();
                    }
                },
                BLOCK_INTEG => {
                    let version = read_i32_be(&mut block)?;
                    let size = read_i32_be(&mut block)? as usize;
                    let body = block.read_vec(size)?;
                    if version == INTEG_VERSION {
                        self.integ = read_integ(&mut SliceReader::new(&body))?;
                    } else {
                        self.integ.reset();
                    }
                },
                _ => {
                    // future block: skipped by construction, body already consumed
                },
            }
        }
        Ok(())
    }

    /// Power-up entry: optionally restores saved state, then repaints.
    pub fn init(&mut self, read_state: bool) -> Result<(), StateError> {
        let res = if read_state { self.load_state() } else { Ok(()) };
        self.repaint_display();
        res
    }

    // MODE BLOCK
    // --------------------------------------------------------------------------------------------

    fn write_modes<W: ByteWriter>(&self, out: &mut W) {
        let (disp_kind, disp_digits) = match self.modes.disp {
            DispFormat::Fix(d) => (0u8, d),
            DispFormat::Sci(d) => (1, d),
            DispFormat::Eng(d) => (2, d),
            DispFormat::All => (3, 0),
        };
        out.write_u8(disp_kind);
        out.write_u8(disp_digits);
        out.write_u8(self.modes.angle as u8);
        out.write_u8(self.modes.polar as u8);
        write_u32_be(out, self.modes.base);
        write_u32_be(out, self.modes.wsize);
        out.write_u8(self.modes.base_signed as u8);
        out.write_u8(self.modes.base_wrap as u8);
        out.write_u8(self.modes.carry as u8);
        out.write_u8(self.modes.input_length);
        write_i64_be(out, self.random.0);
        write_i64_be(out, self.random.1);
        match &self.matedit {
            Some((name, i, j)) => {
                out.write_u8(1);
                name.write_into(out);
                write_u32_be(out, *i);
                write_u32_be(out, *j);
            },
            None => out.write_u8(0),
        }
    }

    fn read_modes<R: ByteReader>(&mut self, block: &mut R) -> Result<(), DeserializationError> {
        let disp_kind = block.read_u8()?;
        let disp_digits = block.read_u8()?;
        let modes = &mut self.modes;
        modes.disp = match disp_kind {
            0 => DispFormat::Fix(disp_digits),
            1 => DispFormat::Sci(disp_digits),
            2 => DispFormat::Eng(disp_digits),
            3 => DispFormat::All,
            _ => return Err(DeserializationError::InvalidValue("bad display mode".into())),
        };
        modes.angle = match block.read_u8()? {
            0 => rpn42_core::AngleMode::Degrees,
            1 => rpn42_core::AngleMode::Radians,
            2 => rpn42_core::AngleMode::Gradians,
            _ => return Err(DeserializationError::InvalidValue("bad angle mode".into())),
        };
        modes.polar = block.read_u8()? != 0;
        modes.base = read_u32_be(block)?;
        modes.wsize = read_u32_be(block)?.clamp(1, 64);
        modes.base_signed = block.read_u8()? != 0;
        modes.base_wrap = block.read_u8()? != 0;
        modes.carry = block.read_u8()? != 0;
        modes.input_length = block.read_u8()?;
        self.random = (read_i64_be(block)?, read_i64_be(block)?);
        self.matedit = if block.read_u8()? != 0 {
            let name = Ident::read_from(block)?;
            let i = read_u32_be(block)?;
            let j = read_u32_be(block)?;
            Some((name, i, j))
        } else {
            None
        };
        Ok(())
    }
}

fn write_block(buf: &mut Vec<u8>, tag: u32, f: impl FnOnce(&mut Vec<u8>)) {
    let body = write_to_vec(f);
    write_u32_be(buf, tag);
    write_u32_be(buf, body.len() as u32);
    buf.extend_from_slice(&body);
}

fn write_to_vec(f: impl FnOnce(&mut Vec<u8>)) -> Vec<u8> {
    let mut body = Vec::new();
    f(&mut body);
    body
}

fn read_all_saved_state<H: Host>(host: &mut H) -> Result<Vec<u8>, StateError> {
    let mut data = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = host.read_saved_state(&mut chunk)?;
        if n == 0 {
            break;
        }
        data.extend_from_slice(&chunk[..n]);
    }
    Ok(data)
}

// SOLVER AND INTEGRATOR BODIES
// ================================================================================================

fn write_opt_ident<W: ByteWriter>(out: &mut W, name: &Option<Ident>) {
    match name {
        Some(n) => {
            out.write_u8(1);
            n.write_into(out);
        },
        None => out.write_u8(0),
    }
}

fn read_opt_ident<R: ByteReader>(source: &mut R) -> Result<Option<Ident>, DeserializationError> {
    Ok(if source.read_u8()? != 0 { Some(Ident::read_from(source)?) } else { None })
}

fn write_solve<W: ByteWriter>(out: &mut W, s: &SolveState) {
    write_opt_ident(out, &s.prgm_name);
    write_opt_ident(out, &s.active_prgm);
    write_opt_ident(out, &s.var_name);
    out.write_u8(s.keep_running as u8);
    write_u32_be(out, s.prev_prgm as u32);
    write_u32_be(out, s.prev_pc as u32);
    out.write_u8(s.state);
    out.write_u8(s.which as u8);
    out.write_u8(s.toggle as u8);
    write_i32_be(out, s.retry_counter);
    write_scalar_be(out, s.retry_value);
    for x in [s.x1, s.x2, s.x3, s.fx1, s.fx2, s.prev_x, s.curr_x, s.curr_f, s.xm, s.fxm] {
        write_scalar_be(out, x);
    }
    write_u32_be(out, s.shadows.len() as u32);
    for (name, value) in &s.shadows {
        name.write_into(out);
        write_scalar_be(out, *value);
    }
    write_u32_be(out, s.last_disp_time);
}

fn read_solve<R: ByteReader>(source: &mut R) -> Result<SolveState, DeserializationError> {
    let mut s = SolveState {
        prgm_name: read_opt_ident(source)?,
        active_prgm: read_opt_ident(source)?,
        var_name: read_opt_ident(source)?,
        keep_running: source.read_u8()? != 0,
        prev_prgm: read_u32_be(source)? as usize,
        prev_pc: read_u32_be(source)? as usize,
        state: source.read_u8()?,
        which: source.read_u8()? as i8,
        toggle: source.read_u8()? != 0,
        retry_counter: read_i32_be(source)?,
        retry_value: read_scalar_be(source)?,
        ..SolveState::default()
    };
    let fields = [
        &mut s.x1, &mut s.x2, &mut s.x3, &mut s.fx1, &mut s.fx2, &mut s.prev_x, &mut s.curr_x,
        &mut s.curr_f, &mut s.xm, &mut s.fxm,
    ];
    for field in fields {
        *field = read_scalar_be(source)?;
    }
    let shadow_count = read_u32_be(source)? as usize;
    for _ in 0..shadow_count {
        let name = Ident::read_from(source)?;
        let value = read_scalar_be(source)?;
        s.shadows.push((name, value));
    }
    s.last_disp_time = read_u32_be(source)?;
    Ok(s)
}

fn write_integ<W: ByteWriter>(out: &mut W, s: &IntegState) {
    write_opt_ident(out, &s.prgm_name);
    write_opt_ident(out, &s.active_prgm);
    write_opt_ident(out, &s.var_name);
    out.write_u8(s.keep_running as u8);
    write_u32_be(out, s.prev_prgm as u32);
    write_u32_be(out, s.prev_pc as u32);
    out.write_u8(s.state);
    for x in [s.llim, s.ulim, s.acc, s.a, s.b, s.eps, s.h, s.sum] {
        write_scalar_be(out, x);
    }
    write_u32_be(out, s.n);
    write_u32_be(out, s.i);
    write_u32_be(out, s.k as u32);
    for x in s.c {
        write_scalar_be(out, x);
    }
    for x in s.s {
        write_scalar_be(out, x);
    }
    write_u32_be(out, s.nsteps);
    for x in [s.p, s.t, s.u, s.prev_int, s.prev_res] {
        write_scalar_be(out, x);
    }
}

fn read_integ<R: ByteReader>(source: &mut R) -> Result<IntegState, DeserializationError> {
    let mut s = IntegState {
        prgm_name: read_opt_ident(source)?,
        active_prgm: read_opt_ident(source)?,
        var_name: read_opt_ident(source)?,
        keep_running: source.read_u8()? != 0,
        prev_prgm: read_u32_be(source)? as usize,
        prev_pc: read_u32_be(source)? as usize,
        state: source.read_u8()?,
        ..IntegState::default()
    };
    {
        let fields = [
            &mut s.llim, &mut s.ulim, &mut s.acc, &mut s.a, &mut s.b, &mut s.eps, &mut s.h,
            &mut s.sum,
        ];
        for field in fields {
            *field = read_scalar_be(source)?;
        }
    }
    s.n = read_u32_be(source)?;
    s.i = read_u32_be(source)?;
    s.k = read_u32_be(source)? as usize;
    for i in 0..s.c.len() {
        s.c[i] = read_scalar_be(source)?;
    }
    for i in 0..s.s.len() {
        s.s[i] = read_scalar_be(source)?;
    }
    s.nsteps = read_u32_be(source)?;
    {
        let fields = [&mut s.p, &mut s.t, &mut s.u, &mut s.prev_int, &mut s.prev_res];
        for field in fields {
            *field = read_scalar_be(source)?;
        }
    }
    Ok(s)
}

// PROGRAM CHANNEL
// ================================================================================================

impl<H: Host> Core<H> {
    fn guard_idle(&self) -> Result<(), CalcError> {
        if self.solve.is_active() {
            return Err(CalcError::SolveSolve);
        }
        if self.integ.is_active() {
            return Err(CalcError::IntegInteg);
        }
        if self.program_running {
            return Err(CalcError::RestrictedOperation);
        }
        Ok(())
    }

    /// Global label names, one entry per program, for the shell's program list.
    pub fn list_programs(&self) -> Vec<String> {
        (0..self.prgms.count())
            .map(|idx| {
                self.prgms
                    .prgm(idx)
                    .ok()
                    .and_then(|p| p.first_label())
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| ".END.".to_string())
            })
            .collect()
    }

    pub fn program_size(&self, idx: usize) -> Result<usize, CalcError> {
        self.prgms.prgm(idx).map(|p| p.size())
    }

    /// Writes the raw encoded bytes of the selected programs to the shell's export channel.
    pub fn export_programs(&mut self, indexes: &[usize]) -> Result<(), CalcError> {
        self.guard_idle()?;
        for &idx in indexes {
            let bytes = self.prgms.prgm(idx)?.bytes().to_vec();
            self.host.write(&bytes).map_err(|_| CalcError::InvalidData)?;
        }
        Ok(())
    }

    /// Reads raw program streams from the shell's import channel; each END closes one
    /// program.
    pub fn import_programs(&mut self) -> Result<usize, CalcError> {
        self.guard_idle()?;
        let mut data = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = self.host.read(&mut chunk).map_err(|_| CalcError::InvalidData)?;
            if n == 0 {
                break;
            }
            data.extend_from_slice(&chunk[..n]);
        }
        let mut imported = 0;
        let mut start = 0;
        let mut pc = 0;
        while pc < data.len() {
            let (instr, len) = rpn42_core::Instruction::decode(&data[pc..])?;
            pc += len;
            if instr.cmd == rpn42_core::Cmd::End {
                let prgm = Program::from_bytes(data[start..pc].to_vec())?;
                self.prgms.push_prgm(prgm);
                imported += 1;
                start = pc;
            }
        }
        if start != data.len() {
            return Err(CalcError::InvalidData);
        }
        Ok(imported)
    }

    // CLIPBOARD
    // --------------------------------------------------------------------------------------------

    /// Copy: the current program listing in program mode, the X register otherwise.
    pub fn copy(&mut self) -> Result<String, CalcError> {
        self.guard_idle()?;
        if self.prgm_mode {
            let listing: Vec<String> = self
                .prgms
                .current_prgm()
                .lines()
                .map(|(_, instr)| format::format_instruction(&instr))
                .collect();
            Ok(listing.join("\n"))
        } else {
            let x = self.stack.x()?;
            Ok(format::format_value(x, &self.modes, self.punct()))
        }
    }

    /// Paste: a program listing becomes a new program; a number or bare text lands in X.
    pub fn paste(&mut self, text: &str) -> Result<(), CalcError> {
        self.guard_idle()?;
        let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
        let as_program: Option<Vec<_>> =
            lines.iter().map(|l| format::parse_instruction(l)).collect();
        if let Some(instrs) = as_program {
            if lines.len() > 1 || matches!(instrs.first(), Some(i) if i.cmd == rpn42_core::Cmd::Lbl)
            {
                let mut bytes = Vec::new();
                for instr in &instrs {
                    if instr.cmd != rpn42_core::Cmd::End {
                        instr.encode(&mut bytes);
                    }
                }
                rpn42_core::Instruction::plain(rpn42_core::Cmd::End).encode(&mut bytes);
                let prgm = Program::from_bytes(bytes)?;
                self.prgms.push_prgm(prgm);
                return Ok(());
            }
        }
        let v = match format::parse_number(text) {
            Some(x) => Value::Real(x),
            None => Value::Str(CalcString::from_bytes(text.trim().as_bytes())),
        };
        self.recall_result(v)?;
        Ok(())
    }

    /// Shell preference hook: turning big stack off while it is active forces the classic
    /// discipline.
    pub fn update_allow_big_stack(&mut self) {
        if !self.settings.allow_big_stack && self.stack.is_big() {
            self.stack.make_classic();
            self.modes.big_stack = false;
        }
    }
}
