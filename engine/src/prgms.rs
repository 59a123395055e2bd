use rpn42_core::{Arg, CalcError, Cmd, Ident, Instruction};

// PROGRAMS
// ================================================================================================

/// One program: an encoded instruction stream always terminated by an END line.
#[derive(Clone, Debug, PartialEq)]
pub struct Program {
    text: Vec<u8>,
}

impl Program {
    /// An empty program: just the END terminator.
    pub fn empty() -> Self {
        let mut text = Vec::new();
        Instruction::plain(Cmd::End).encode(&mut text);
        Self { text }
    }

    pub fn from_bytes(text: Vec<u8>) -> Result<Self, CalcError> {
        // validate the stream and require the END terminator
        let mut pc = 0;
        let mut ended = false;
        while pc < text.len() {
            let (instr, len) = Instruction::decode(&text[pc..])?;
            pc += len;
            if instr.cmd == Cmd::End {
                ended = pc == text.len();
                break;
            }
        }
        if !ended {
            return Err(CalcError::InvalidData);
        }
        Ok(Self { text })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.text
    }

    pub fn size(&self) -> usize {
        self.text.len()
    }

    /// Decodes the instruction at `pc`, advancing it unless `keep_pc`.
    pub fn next_instruction(&self, pc: &mut usize, keep_pc: bool) -> Result<Instruction, CalcError> {
        let (instr, len) = Instruction::decode(&self.text[*pc..])?;
        if !keep_pc {
            *pc += len;
        }
        Ok(instr)
    }

    /// Encoded length of the line at `pc`.
    pub fn command_length(&self, pc: usize) -> Result<usize, CalcError> {
        Instruction::decode(&self.text[pc..]).map(|(_, len)| len)
    }

    /// Byte offset of the 1-based line number, clamped to the END line.
    pub fn line_to_pc(&self, line: usize) -> usize {
        let mut pc = 0;
        for _ in 1..line {
            match Instruction::decode(&self.text[pc..]) {
                Ok((instr, len)) if instr.cmd != Cmd::End => pc += len,
                _ => break,
            }
        }
        pc
    }

    /// 1-based line number of the instruction at the given byte offset.
    pub fn pc_to_line(&self, pc: usize) -> usize {
        let mut line = 1;
        let mut at = 0;
        while at < pc {
            match Instruction::decode(&self.text[at..]) {
                Ok((_, len)) => {
                    at += len;
                    line += 1;
                },
                Err(_) => break,
            }
        }
        line
    }

    /// Inserts an instruction at the given offset (program entry).
    pub fn insert(&mut self, pc: usize, instr: &Instruction) {
        let mut encoded = Vec::new();
        instr.encode(&mut encoded);
        self.text.splice(pc..pc, encoded);
    }

    /// Deletes the line at the given offset; the END terminator stays.
    pub fn delete(&mut self, pc: usize) -> Result<(), CalcError> {
        let (instr, len) = Instruction::decode(&self.text[pc..])?;
        if instr.cmd == Cmd::End {
            return Ok(());
        }
        self.text.drain(pc..pc + len);
        Ok(())
    }

    /// Instructions with their byte offsets, for listings and label scans.
    pub fn lines(&self) -> impl Iterator<Item = (usize, Instruction)> + '_ {
        let mut pc = 0;
        core::iter::from_fn(move || {
            if pc >= self.text.len() {
                return None;
            }
            let (instr, len) = Instruction::decode(&self.text[pc..]).ok()?;
            let at = pc;
            pc += len;
            Some((at, instr))
        })
    }

    /// Name of the first global label, used as the program's catalog name.
    pub fn first_label(&self) -> Option<Ident> {
        self.lines().find_map(|(_, instr)| match (instr.cmd, instr.arg) {
            (Cmd::Lbl, Arg::Str(name)) => Some(name),
            _ => None,
        })
    }
}

// PROGRAM STORE
// ================================================================================================

/// The ordered program collection plus the execution cursor and the global label index.
///
/// The last program plays the `.END.` role: it is where fresh program entry lands, and it is
/// never removed (clearing it leaves it empty).
#[derive(Clone, Debug, PartialEq)]
pub struct ProgramStore {
    prgms: Vec<Program>,
    labels: Vec<(Ident, usize, usize)>,
    /// Currently addressed program.
    pub current: usize,
    /// Byte offset of the next instruction within the current program.
    pub pc: usize,
}

impl Default for ProgramStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgramStore {
    pub fn new() -> Self {
        Self { prgms: vec![Program::empty()], labels: Vec::new(), current: 0, pc: 0 }
    }

    pub fn count(&self) -> usize {
        self.prgms.len()
    }

    pub fn prgm(&self, idx: usize) -> Result<&Program, CalcError> {
        self.prgms.get(idx).ok_or(CalcError::Nonexistent)
    }

    pub fn current_prgm(&self) -> &Program {
        &self.prgms[self.current]
    }

    pub fn current_prgm_mut(&mut self) -> &mut Program {
        &mut self.prgms[self.current]
    }

    /// Rebuilds the global label index; call after any structural edit.
    pub fn rebuild_labels(&mut self) {
        self.labels.clear();
        for (pi, prgm) in self.prgms.iter().enumerate() {
            for (pc, instr) in prgm.lines() {
                if let (Cmd::Lbl, Arg::Str(name)) = (instr.cmd, &instr.arg) {
                    self.labels.push((name.clone(), pi, pc));
                }
            }
        }
    }

    /// Case-sensitive exact match over the label index.
    pub fn find_global_label(&self, name: &Ident) -> Result<(usize, usize), CalcError> {
        self.labels
            .iter()
            .find(|(n, _, _)| n == name)
            .map(|&(_, prgm, pc)| (prgm, pc))
            .ok_or(CalcError::LabelNotFound)
    }

    /// Numbered local label: forward from the current pc, wrapping once.
    pub fn find_local_label(&self, num: u32) -> Result<usize, CalcError> {
        let prgm = self.current_prgm();
        let matches = |instr: &Instruction| {
            instr.cmd == Cmd::Lbl && instr.arg == Arg::Num(num)
        };
        let mut before = Vec::new();
        for (pc, instr) in prgm.lines() {
            if pc >= self.pc {
                if matches(&instr) {
                    return Ok(pc);
                }
            } else if matches(&instr) {
                before.push(pc);
            }
        }
        before.first().copied().ok_or(CalcError::LabelNotFound)
    }

    /// Global label names in store order, for the catalog and the shell's program list.
    pub fn global_labels(&self) -> impl Iterator<Item = &Ident> + '_ {
        self.labels.iter().map(|(n, _, _)| n)
    }

    /// Index of the program containing the given global label.
    pub fn prgm_of_label(&self, name: &Ident) -> Result<usize, CalcError> {
        self.find_global_label(name).map(|(prgm, _)| prgm)
    }

    /// Moves the cursor past the last program, creating a fresh empty one for entry.
    pub fn goto_dot_dot(&mut self) {
        if self.prgms.last().map(|p| p.size()) != Some(Program::empty().size()) {
            self.prgms.push(Program::empty());
        }
        self.current = self.prgms.len() - 1;
        self.pc = 0;
        self.rebuild_labels();
    }

    /// Deletes the program containing the given global label.
    pub fn clear_prgm(&mut self, name: &Ident) -> Result<(), CalcError> {
        let (idx, _) = self.find_global_label(name)?;
        self.remove_prgm(idx);
        Ok(())
    }

    /// Deletes the currently addressed program.
    pub fn clear_current_prgm(&mut self) {
        self.remove_prgm(self.current);
    }

    fn remove_prgm(&mut self, idx: usize) {
        self.prgms.remove(idx);
        if self.prgms.is_empty() {
            self.prgms.push(Program::empty());
        }
        if self.current >= self.prgms.len() {
            self.current = self.prgms.len() - 1;
        }
        self.pc = 0;
        self.rebuild_labels();
    }

    pub fn clear_all(&mut self) {
        self.prgms = vec![Program::empty()];
        self.current = 0;
        self.pc = 0;
        self.rebuild_labels();
    }

    /// Appends a complete program (import, paste).
    pub fn push_prgm(&mut self, prgm: Program) {
        // keep the entry program last
        let at = self.prgms.len() - 1;
        self.prgms.insert(at, prgm);
        self.rebuild_labels();
    }

    /// Reinstalls persisted programs and the execution cursor.
    pub fn restore(&mut self, prgms: Vec<Program>, current: usize, pc: usize) {
        self.prgms = if prgms.is_empty() { vec![Program::empty()] } else { prgms };
        self.current = current.min(self.prgms.len() - 1);
        self.pc = pc.min(self.prgms[self.current].size());
        self.rebuild_labels();
    }

    /// Menu variables of the program at `prgm`: MVAR lines scanned from just past the label at
    /// `lbl_pc` until the first non-MVAR instruction.
    pub fn menu_vars(&self, prgm: usize, lbl_pc: usize) -> Result<Vec<Ident>, CalcError> {
        let program = self.prgm(prgm)?;
        let mut vars = Vec::new();
        let mut pc = lbl_pc;
        // step over the label line itself
        let first = program.next_instruction(&mut pc, false)?;
        debug_assert_eq!(first.cmd, Cmd::Lbl);
        loop {
            let instr = program.next_instruction(&mut pc, false)?;
            match (instr.cmd, instr.arg) {
                (Cmd::Mvar, Arg::Str(name)) => vars.push(name),
                _ => break,
            }
        }
        Ok(vars)
    }
}

// TESTS
// ================================================================================================

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rpn42_core::Arg;

    use super::*;

    fn name(s: &str) -> Ident {
        Ident::try_from(s).unwrap()
    }

    fn program(instrs: &[Instruction]) -> Program {
        let mut p = Program::empty();
        let mut pc = 0;
        for instr in instrs {
            p.insert(pc, instr);
            pc += instr.encoded_len();
        }
        p
    }

    fn lbl(s: &str) -> Instruction {
        Instruction::new(Cmd::Lbl, Arg::Str(name(s)))
    }

    #[test]
    fn empty_program_is_just_end() {
        let p = Program::empty();
        let mut pc = 0;
        let instr = p.next_instruction(&mut pc, false).unwrap();
        assert_eq!(instr.cmd, Cmd::End);
        assert_eq!(pc, p.size());
    }

    #[test]
    fn global_label_lookup() {
        let mut store = ProgramStore::new();
        store.push_prgm(program(&[lbl("F"), Instruction::plain(Cmd::Rtn)]));
        store.push_prgm(program(&[lbl("G")]));
        store.rebuild_labels();
        let (prgm, pc) = store.find_global_label(&name("F")).unwrap();
        assert_eq!((prgm, pc), (0, 0));
        assert_eq!(store.find_global_label(&name("G")).unwrap().0, 1);
        assert_eq!(store.find_global_label(&name("H")), Err(CalcError::LabelNotFound));
    }

    #[test]
    fn local_label_search_wraps() {
        let mut store = ProgramStore::new();
        let p = program(&[
            Instruction::new(Cmd::Lbl, Arg::Num(1)),
            Instruction::plain(Cmd::Add),
            Instruction::new(Cmd::Lbl, Arg::Num(2)),
        ]);
        store.push_prgm(p);
        store.current = 0;
        // from the start, label 1 is found ahead
        store.pc = 0;
        assert_eq!(store.find_local_label(1).unwrap(), 0);
        // from past label 1, the search wraps around
        store.pc = store.current_prgm().line_to_pc(2);
        assert_eq!(store.find_local_label(1).unwrap(), 0);
        assert!(store.find_local_label(1).unwrap() < store.pc);
        assert_eq!(store.find_local_label(9), Err(CalcError::LabelNotFound));
    }

    #[test]
    fn line_pc_mapping_roundtrips() {
        let p = program(&[lbl("A"), Instruction::plain(Cmd::Sin), Instruction::plain(Cmd::Cos)]);
        for line in 1..=3 {
            let pc = p.line_to_pc(line);
            assert_eq!(p.pc_to_line(pc), line);
        }
    }

    #[test]
    fn clear_prgm_keeps_entry_program() {
        let mut store = ProgramStore::new();
        store.push_prgm(program(&[lbl("F")]));
        store.clear_prgm(&name("F")).unwrap();
        assert_eq!(store.count(), 1);
        assert_eq!(store.find_global_label(&name("F")), Err(CalcError::LabelNotFound));
    }

    #[test]
    fn mvar_scan_stops_at_first_non_mvar() {
        let mut store = ProgramStore::new();
        store.push_prgm(program(&[
            lbl("F"),
            Instruction::new(Cmd::Mvar, Arg::Str(name("A"))),
            Instruction::new(Cmd::Mvar, Arg::Str(name("B"))),
            Instruction::plain(Cmd::Add),
            Instruction::new(Cmd::Mvar, Arg::Str(name("C"))),
        ]));
        let (prgm, pc) = store.find_global_label(&name("F")).unwrap();
        let vars = store.menu_vars(prgm, pc).unwrap();
        assert_eq!(vars, vec![name("A"), name("B")]);
    }

    #[test]
    fn goto_dot_dot_creates_fresh_entry_program() {
        let mut store = ProgramStore::new();
        store.push_prgm(program(&[lbl("F")]));
        store.goto_dot_dot();
        assert_eq!(store.current, store.count() - 1);
        assert_eq!(store.current_prgm().size(), Program::empty().size());
    }
}
