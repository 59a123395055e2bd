//! Shared test shell: an in-memory host capturing everything the engine emits.
#![allow(dead_code)]

use std::io;

use rpn42_engine::{Arg, Cmd, CmdResult, Core, Instruction, Scalar, Value, host::Host};

#[derive(Default)]
pub struct TestHost {
    pub saved_state: Vec<u8>,
    pub saved_read_pos: usize,
    pub exported: Vec<u8>,
    pub import_src: Vec<u8>,
    pub import_read_pos: usize,
    pub printed: Vec<String>,
    pub millis: u32,
}

impl Host for TestHost {
    fn milliseconds(&mut self) -> u32 {
        self.millis += 1;
        self.millis
    }

    fn random_seed(&mut self) -> u64 {
        12345678901234
    }

    fn read_saved_state(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = &self.saved_state[self.saved_read_pos..];
        let n = remaining.len().min(buf.len());
        buf[..n].copy_from_slice(&remaining[..n]);
        self.saved_read_pos += n;
        Ok(n)
    }

    fn write_saved_state(&mut self, buf: &[u8]) -> io::Result<()> {
        self.saved_state.extend_from_slice(buf);
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = &self.import_src[self.import_read_pos..];
        let n = remaining.len().min(buf.len());
        buf[..n].copy_from_slice(&remaining[..n]);
        self.import_read_pos += n;
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<()> {
        self.exported.extend_from_slice(buf);
        Ok(())
    }

    fn print(&mut self, text: &[u8], _bits: &[u8], _bytes_per_line: usize, _height: usize) {
        self.printed.push(String::from_utf8_lossy(text).into_owned());
    }
}

pub fn core() -> Core<TestHost> {
    Core::new(TestHost::default())
}

/// Pushes a numeric literal exactly the way a program number line does.
pub fn push(core: &mut Core<TestHost>, x: Scalar) {
    core.execute_checked(&Instruction::new(Cmd::Number, Arg::Literal(x)))
        .expect("number entry");
}

/// Executes a command by name with no argument.
pub fn cmd(core: &mut Core<TestHost>, name: &str) -> CmdResult {
    core.keydown_command(name, Arg::None)
}

/// Executes a command by name with an argument.
pub fn cmd_arg(core: &mut Core<TestHost>, name: &str, arg: Arg) -> CmdResult {
    core.keydown_command(name, arg)
}

pub fn ident(name: &str) -> rpn42_engine::Ident {
    rpn42_engine::Ident::try_from(name).unwrap()
}

/// The X register as a real, panicking on anything else.
pub fn x_real(core: &Core<TestHost>) -> Scalar {
    match core.stack().x().expect("stack has X") {
        Value::Real(x) => *x,
        other => panic!("expected Real in X, got {other:?}"),
    }
}

pub fn level_real(core: &Core<TestHost>, depth: usize) -> Scalar {
    match core.stack().peek(depth).expect("stack deep enough") {
        Value::Real(x) => *x,
        other => panic!("expected Real at depth {depth}, got {other:?}"),
    }
}

/// Stores X into the named variable.
pub fn sto_var(core: &mut Core<TestHost>, name: &str) {
    cmd_arg(core, "STO", Arg::Str(ident(name))).expect("STO");
}
