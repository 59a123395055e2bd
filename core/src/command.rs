// COMMAND IDENTIFIERS
// ================================================================================================

/// What kind of argument a command consumes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ArgKind {
    /// No argument; the command executes as soon as it is named.
    None,
    /// A number 0..99 (register or flag), directly or indirectly.
    Num,
    /// A variable: named, stack register, or indirect.
    Var,
    /// A label: local number/letter or global name, or indirect.
    Lbl,
    /// An inline real literal (number-entry lines in programs).
    RealLit,
}

/// Static descriptor of one command: listing name plus argument kind.
#[derive(Copy, Clone, Debug)]
pub struct CommandSpec {
    pub name: &'static str,
    pub arg: ArgKind,
}

macro_rules! commands {
    ($( $variant:ident => ($name:literal, $kind:ident) ),+ $(,)?) => {
        /// Every executable command, keyed by its numeric id (the enum discriminant).
        ///
        /// The discriminant doubles as the opcode in encoded program streams and as the index
        /// into [`Cmd::spec`], so the order here is part of the persisted format: append, never
        /// reorder.
        #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
        #[repr(u16)]
        pub enum Cmd {
            $( $variant ),+
        }

        const SPECS: &[CommandSpec] = &[
            $( CommandSpec { name: $name, arg: ArgKind::$kind } ),+
        ];

        const ALL: &[Cmd] = &[ $( Cmd::$variant ),+ ];
    };
}

commands! {
    // stack and display basics
    Clx     => ("CLX", None),
    Enter   => ("ENTER", None),
    Swap    => ("X<>Y", None),
    Rdn     => ("RDN", None),
    Rup     => ("R^", None),
    Chs     => ("+/-", None),
    Lastx   => ("LASTX", None),
    Clst    => ("CLST", None),
    Pi      => ("PI", None),
    Complex => ("COMPLEX", None),
    ToPol   => ("->POL", None),
    ToRec   => ("->REC", None),
    Abs     => ("ABS", None),
    Sign    => ("SIGN", None),
    Rnd     => ("RND", None),
    Ip      => ("IP", None),
    Fp      => ("FP", None),
    Mod     => ("MOD", None),
    Percent => ("%", None),
    PercentCh => ("%CH", None),

    // arithmetic
    Add     => ("+", None),
    Sub     => ("-", None),
    Mul     => ("*", None),
    Div     => ("/", None),
    Ypowx   => ("Y^X", None),

    // one-argument functions
    Inv     => ("1/X", None),
    Sqrt    => ("SQRT", None),
    Square  => ("X^2", None),
    Ln      => ("LN", None),
    Log     => ("LOG", None),
    TenPowX => ("10^X", None),
    Exp     => ("E^X", None),
    ExpM1   => ("E^X-1", None),
    Ln1P    => ("LN1+X", None),
    Sin     => ("SIN", None),
    Cos     => ("COS", None),
    Tan     => ("TAN", None),
    Asin    => ("ASIN", None),
    Acos    => ("ACOS", None),
    Atan    => ("ATAN", None),
    Sinh    => ("SINH", None),
    Cosh    => ("COSH", None),
    Tanh    => ("TANH", None),
    Asinh   => ("ASINH", None),
    Acosh   => ("ACOSH", None),
    Atanh   => ("ATANH", None),

    // random numbers
    Ran     => ("RAN", None),
    Seed    => ("SEED", None),

    // comparison predicates
    XEq0    => ("X=0?", None),
    XNe0    => ("X#0?", None),
    XLt0    => ("X<0?", None),
    XGt0    => ("X>0?", None),
    XLe0    => ("X<=0?", None),
    XGe0    => ("X>=0?", None),
    XEqY    => ("X=Y?", None),
    XNeY    => ("X#Y?", None),
    XLtY    => ("X<Y?", None),
    XGtY    => ("X>Y?", None),
    XLeY    => ("X<=Y?", None),
    XGeY    => ("X>=Y?", None),

    // flags
    Sf      => ("SF", Num),
    Cf      => ("CF", Num),
    FsT     => ("FS?", Num),
    FcT     => ("FC?", Num),
    FscT    => ("FS?C", Num),
    FccT    => ("FC?C", Num),

    // storage
    Sto     => ("STO", Var),
    Rcl     => ("RCL", Var),
    Clv     => ("CLV", Var),
    Size    => ("SIZE", Num),
    Dim     => ("DIM", Var),
    Index   => ("INDEX", Var),
    Stoij   => ("STOIJ", None),
    Rclij   => ("RCLIJ", None),
    Stoel   => ("STOEL", None),
    Rclel   => ("RCLEL", None),

    // program flow
    Lbl     => ("LBL", Lbl),
    Gto     => ("GTO", Lbl),
    Xeq     => ("XEQ", Lbl),
    Rtn     => ("RTN", None),
    End     => ("END", None),
    RunStop => ("STOP", None),
    Pse     => ("PSE", None),
    Isg     => ("ISG", Var),
    Dse     => ("DSE", Var),
    Mvar    => ("MVAR", Var),
    Varmenu => ("VARMENU", Lbl),
    PgmSlv  => ("PGMSLV", Lbl),
    PgmInt  => ("PGMINT", Lbl),
    Solve   => ("SOLVE", Var),
    Integ   => ("INTEG", Var),
    Number  => ("", RealLit),

    // view and alpha
    View    => ("VIEW", Var),
    Aview   => ("AVIEW", None),
    Cla     => ("CLA", None),
    Asto    => ("ASTO", Var),
    Arcl    => ("ARCL", Var),
    Aip     => ("AIP", None),
    Xtoa    => ("XTOA", None),
    Prv     => ("PRV", Var),

    // modes
    Fix     => ("FIX", Num),
    Sci     => ("SCI", Num),
    Eng     => ("ENG", Num),
    All     => ("ALL", None),
    Deg     => ("DEG", None),
    Rad     => ("RAD", None),
    Grad    => ("GRAD", None),
    Polar   => ("POLAR", None),
    Rect    => ("RECT", None),
    Binm    => ("BINM", None),
    Octm    => ("OCTM", None),
    Decm    => ("DECM", None),
    Hexm    => ("HEXM", None),
    Wsize   => ("WSIZE", None),
    Bsigned => ("BSIGNED", None),
    Bwrap   => ("BWRAP", None),
    FourStk => ("4STK", None),
    NStk    => ("NSTK", None),

    // BASE arithmetic
    And     => ("AND", None),
    Or      => ("OR", None),
    Xor     => ("XOR", None),
    Not     => ("NOT", None),
    BitT    => ("BIT?", None),
    Rotxy   => ("ROTXY", None),
    BaseAdd => ("BASE+", None),
    BaseSub => ("BASE-", None),
    BaseMul => ("BASE*", None),
    BaseDiv => ("BASE/", None),
    BaseChs => ("BASE+/-", None),
    Sl      => ("SL", None),
    Sr      => ("SR", None),
    Asr     => ("ASR", None),
    Rl      => ("RL", None),
    Rlc     => ("RLC", None),
    Rr      => ("RR", None),
    Rrc     => ("RRC", None),
    Rln     => ("RLN", None),
    Rrn     => ("RRN", None),
    Rlcn    => ("RLCN", None),
    Rrcn    => ("RRCN", None),
    Lj      => ("LJ", None),
    Sb      => ("SB", None),
    Cb      => ("CB", None),
    NumB    => ("#B", None),
    Maskl   => ("MASKL", None),
    Maskr   => ("MASKR", None),

    // bit-pattern conversions
    NToBs   => ("N->BS", None),
    NToBd   => ("N->BD", None),
    NToDs   => ("N->DS", None),
    NToDd   => ("N->DD", None),
    NToDq   => ("N->DQ", None),
    BsToN   => ("BS->N", None),
    BdToN   => ("BD->N", None),
    DsToN   => ("DS->N", None),
    DdToN   => ("DD->N", None),
    DqToN   => ("DQ->N", None),

    // misc
    Beep    => ("BEEP", None),
    Clp     => ("CLP", Lbl),
}

impl Cmd {
    /// Numeric command id; the opcode in encoded programs.
    pub fn id(self) -> u16 {
        self as u16
    }

    /// The command with the given id, if any.
    pub fn from_id(id: u16) -> Option<Cmd> {
        ALL.get(id as usize).copied()
    }

    /// Static descriptor for this command.
    pub fn spec(self) -> &'static CommandSpec {
        &SPECS[self as usize]
    }

    /// The command with the given listing name.
    pub fn from_name(name: &str) -> Option<Cmd> {
        if name.is_empty() {
            return None;
        }
        ALL.iter().copied().find(|c| c.spec().name == name)
    }

    /// True for the predicate commands subject to skip-on-false.
    pub fn is_test(self) -> bool {
        use Cmd::*;
        matches!(
            self,
            XEq0 | XNe0
                | XLt0
                | XGt0
                | XLe0
                | XGe0
                | XEqY
                | XNeY
                | XLtY
                | XGtY
                | XLeY
                | XGeY
                | FsT
                | FcT
                | FscT
                | FccT
                | BitT
        )
    }
}

// TESTS
// ================================================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_dense_and_stable() {
        for (i, cmd) in ALL.iter().enumerate() {
            assert_eq!(cmd.id() as usize, i, "{cmd:?} out of order");
            assert_eq!(Cmd::from_id(i as u16), Some(*cmd));
        }
        assert_eq!(Cmd::from_id(ALL.len() as u16), None);
    }

    #[test]
    fn names_are_unique() {
        for a in ALL {
            if a.spec().name.is_empty() {
                continue;
            }
            let count = ALL.iter().filter(|b| b.spec().name == a.spec().name).count();
            assert_eq!(count, 1, "duplicate name {}", a.spec().name);
        }
    }

    #[test]
    fn lookup_by_name() {
        assert_eq!(Cmd::from_name("BASE+"), Some(Cmd::BaseAdd));
        assert_eq!(Cmd::from_name("X=Y?"), Some(Cmd::XEqY));
        assert_eq!(Cmd::from_name(""), None);
        assert_eq!(Cmd::from_name("NOPE"), None);
    }
}
