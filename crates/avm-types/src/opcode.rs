//! The opcode set (`spec.md` §4.E) and the static pop-signature tables used
//! by the interpreter dispatch and by `marshalForProof` (`spec.md` §4.H).
//!
//! The teacher (`crates/vm/evm/src/interpreter/mod.rs`) looks these up via
//! a `lazy_static`-backed `instructions` crate (`InstructionInfo`,
//! `Instruction::info()`); this module keeps that shape with
//! `InstructionStackPops`/`InstructionAuxStackPops` built the same way.

use std::collections::HashMap;

/// One AVM opcode. Values are stable across runs (they appear on the wire)
/// but are internal to this implementation — they are not required to
/// match any particular on-chain deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    Add = 0x01,
    Mul = 0x02,
    Sub = 0x03,
    Div = 0x04,
    Sdiv = 0x05,
    Mod = 0x06,
    Smod = 0x07,
    Addmod = 0x08,
    Mulmod = 0x09,
    Exp = 0x0a,

    Lt = 0x10,
    Gt = 0x11,
    Slt = 0x12,
    Sgt = 0x13,
    Eq = 0x14,
    Iszero = 0x15,
    And = 0x16,
    Or = 0x17,
    Xor = 0x18,
    Not = 0x19,
    Byte = 0x1a,
    Signextend = 0x1b,

    Hash = 0x20,
    Type = 0x21,

    Pop = 0x30,
    Spush = 0x31,
    Rpush = 0x32,
    Rset = 0x33,
    Jump = 0x34,
    Cjump = 0x35,
    Stackempty = 0x36,
    Auxstackempty = 0x37,
    Pcpush = 0x38,
    Auxpush = 0x39,
    Auxpop = 0x3a,
    Noop = 0x3b,
    Errpush = 0x3c,
    Errset = 0x3d,

    Dup0 = 0x40,
    Dup1 = 0x41,
    Dup2 = 0x42,
    Swap1 = 0x43,
    Swap2 = 0x44,

    Tget = 0x50,
    Tset = 0x51,
    Tlen = 0x52,

    Log = 0x60,
    Breakpoint = 0x61,
    Debug = 0x62,

    Send = 0x70,
    Nbsend = 0x71,
    Gettime = 0x72,
    Inbox = 0x73,
    Error = 0x74,
    Halt = 0x75,
}

/// Convenience alias: a literal push is a `Noop` carrying an immediate,
/// since the immediate is auto-pushed before dispatch and `Noop` does
/// nothing further (`spec.md` §4.E, §8 scenario 1 — `PUSH(3)` is shorthand
/// for exactly this).
pub const PUSH_OPCODE: Opcode = Opcode::Noop;

impl Opcode {
    pub fn from_u8(b: u8) -> Option<Opcode> {
        use Opcode::*;
        Some(match b {
            0x01 => Add,
            0x02 => Mul,
            0x03 => Sub,
            0x04 => Div,
            0x05 => Sdiv,
            0x06 => Mod,
            0x07 => Smod,
            0x08 => Addmod,
            0x09 => Mulmod,
            0x0a => Exp,
            0x10 => Lt,
            0x11 => Gt,
            0x12 => Slt,
            0x13 => Sgt,
            0x14 => Eq,
            0x15 => Iszero,
            0x16 => And,
            0x17 => Or,
            0x18 => Xor,
            0x19 => Not,
            0x1a => Byte,
            0x1b => Signextend,
            0x20 => Hash,
            0x21 => Type,
            0x30 => Pop,
            0x31 => Spush,
            0x32 => Rpush,
            0x33 => Rset,
            0x34 => Jump,
            0x35 => Cjump,
            0x36 => Stackempty,
            0x37 => Auxstackempty,
            0x38 => Pcpush,
            0x39 => Auxpush,
            0x3a => Auxpop,
            0x3b => Noop,
            0x3c => Errpush,
            0x3d => Errset,
            0x40 => Dup0,
            0x41 => Dup1,
            0x42 => Dup2,
            0x43 => Swap1,
            0x44 => Swap2,
            0x50 => Tget,
            0x51 => Tset,
            0x52 => Tlen,
            0x60 => Log,
            0x61 => Breakpoint,
            0x62 => Debug,
            0x70 => Send,
            0x71 => Nbsend,
            0x72 => Gettime,
            0x73 => Inbox,
            0x74 => Error,
            0x75 => Halt,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        use Opcode::*;
        match self {
            Add => "ADD",
            Mul => "MUL",
            Sub => "SUB",
            Div => "DIV",
            Sdiv => "SDIV",
            Mod => "MOD",
            Smod => "SMOD",
            Addmod => "ADDMOD",
            Mulmod => "MULMOD",
            Exp => "EXP",
            Lt => "LT",
            Gt => "GT",
            Slt => "SLT",
            Sgt => "SGT",
            Eq => "EQ",
            Iszero => "ISZERO",
            And => "AND",
            Or => "OR",
            Xor => "XOR",
            Not => "NOT",
            Byte => "BYTE",
            Signextend => "SIGNEXTEND",
            Hash => "HASH",
            Type => "TYPE",
            Pop => "POP",
            Spush => "SPUSH",
            Rpush => "RPUSH",
            Rset => "RSET",
            Jump => "JUMP",
            Cjump => "CJUMP",
            Stackempty => "STACKEMPTY",
            Auxstackempty => "AUXSTACKEMPTY",
            Pcpush => "PCPUSH",
            Auxpush => "AUXPUSH",
            Auxpop => "AUXPOP",
            Noop => "NOP",
            Errpush => "ERRPUSH",
            Errset => "ERRSET",
            Dup0 => "DUP0",
            Dup1 => "DUP1",
            Dup2 => "DUP2",
            Swap1 => "SWAP1",
            Swap2 => "SWAP2",
            Tget => "TGET",
            Tset => "TSET",
            Tlen => "TLEN",
            Log => "LOG",
            Breakpoint => "BREAKPOINT",
            Debug => "DEBUG",
            Send => "SEND",
            Nbsend => "NBSEND",
            Gettime => "GETTIME",
            Inbox => "INBOX",
            Error => "ERROR",
            Halt => "HALT",
        }
    }

    /// Number of values this opcode pops from the main stack before it
    /// produces a result, not counting an auto-pushed immediate (that pop
    /// is always accounted for separately, see `spec.md` §4.H step 2).
    pub fn main_stack_pops(self) -> usize {
        use Opcode::*;
        match self {
            // DUPn/SWAPn reveal every slot down to the depth they read, not
            // just the one slot they duplicate/exchange on top
            // (`original_source/.../machine.cpp:804-825`): `DUP1` reads
            // `stack[1]` (2 slots visible), `DUP2` reads `stack[2]` (3),
            // `SWAP2` reads `stack[0]` and `stack[2]` (3).
            Dup2 | Swap2 => 3,
            Addmod | Mulmod | Tset => 3,
            Dup1 | Swap1 => 2,
            Add | Mul | Sub | Div | Sdiv | Mod | Smod | Exp | Lt | Gt | Slt | Sgt | Eq | And
            | Or | Xor | Byte | Signextend | Tget | Cjump => 2,
            Iszero | Not | Hash | Type | Pop | Auxpush | Dup0 | Log | Inbox | Jump | Rset
            | Tlen | Errset | Send | Nbsend => 1,
            Spush | Rpush | Stackempty | Auxstackempty | Pcpush | Auxpop | Noop | Errpush
            | Breakpoint | Debug | Gettime | Error | Halt => 0,
        }
    }

    /// Number of values this opcode pops from the auxiliary stack. Only
    /// `AUXPOP` touches the aux stack on the pop side (`spec.md` §4.E).
    pub fn aux_stack_pops(self) -> usize {
        match self {
            Opcode::Auxpop => 1,
            _ => 0,
        }
    }
}

lazy_static::lazy_static! {
    /// `InstructionStackPops`: per-opcode boolean reveal signature for the
    /// main stack, consulted by `marshalForProof` (`spec.md` §4.H). Every
    /// slot is marked "revealed" — see DESIGN.md for why a production
    /// witness-shrinking split (hash-only for pure rearrangement ops like
    /// `POP`/`SWAPn`/`DUPn`) is left as a documented simplification: the
    /// on-chain verifier that would exploit it is explicitly out of scope
    /// (`spec.md` §1).
    pub static ref INSTRUCTION_STACK_POPS: HashMap<Opcode, Vec<bool>> = {
        let mut m = HashMap::new();
        for op in ALL_OPCODES.iter().copied() {
            m.insert(op, vec![true; op.main_stack_pops()]);
        }
        m
    };

    /// `InstructionAuxStackPops`: the aux-stack counterpart.
    pub static ref INSTRUCTION_AUX_STACK_POPS: HashMap<Opcode, Vec<bool>> = {
        let mut m = HashMap::new();
        for op in ALL_OPCODES.iter().copied() {
            m.insert(op, vec![true; op.aux_stack_pops()]);
        }
        m
    };
}

pub const ALL_OPCODES: &[Opcode] = &[
    Opcode::Add,
    Opcode::Mul,
    Opcode::Sub,
    Opcode::Div,
    Opcode::Sdiv,
    Opcode::Mod,
    Opcode::Smod,
    Opcode::Addmod,
    Opcode::Mulmod,
    Opcode::Exp,
    Opcode::Lt,
    Opcode::Gt,
    Opcode::Slt,
    Opcode::Sgt,
    Opcode::Eq,
    Opcode::Iszero,
    Opcode::And,
    Opcode::Or,
    Opcode::Xor,
    Opcode::Not,
    Opcode::Byte,
    Opcode::Signextend,
    Opcode::Hash,
    Opcode::Type,
    Opcode::Pop,
    Opcode::Spush,
    Opcode::Rpush,
    Opcode::Rset,
    Opcode::Jump,
    Opcode::Cjump,
    Opcode::Stackempty,
    Opcode::Auxstackempty,
    Opcode::Pcpush,
    Opcode::Auxpush,
    Opcode::Auxpop,
    Opcode::Noop,
    Opcode::Errpush,
    Opcode::Errset,
    Opcode::Dup0,
    Opcode::Dup1,
    Opcode::Dup2,
    Opcode::Swap1,
    Opcode::Swap2,
    Opcode::Tget,
    Opcode::Tset,
    Opcode::Tlen,
    Opcode::Log,
    Opcode::Breakpoint,
    Opcode::Debug,
    Opcode::Send,
    Opcode::Nbsend,
    Opcode::Gettime,
    Opcode::Inbox,
    Opcode::Error,
    Opcode::Halt,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_u8() {
        for op in ALL_OPCODES.iter().copied() {
            assert_eq!(Opcode::from_u8(op as u8), Some(op));
        }
    }

    #[test]
    fn unknown_opcode_byte_is_none() {
        assert_eq!(Opcode::from_u8(0xff), None);
    }

    #[test]
    fn pop_signatures_match_pop_counts() {
        assert_eq!(INSTRUCTION_STACK_POPS[&Opcode::Add].len(), 2);
        assert_eq!(INSTRUCTION_STACK_POPS[&Opcode::Addmod].len(), 3);
        assert_eq!(INSTRUCTION_AUX_STACK_POPS[&Opcode::Auxpop].len(), 1);
        assert_eq!(INSTRUCTION_AUX_STACK_POPS[&Opcode::Add].len(), 0);
    }
}
