//! Code points and operations: `spec.md` §4.C.
//!
//! Each code point commits to the opcode at `pc` plus a hash of the entire
//! suffix of the program (`nextHash`), so a verifier holding
//! `hash(code[pc])` implicitly commits to execution from `pc` onward.

use ethereum_types::U256;

use crate::opcode::Opcode;
use crate::tuple::Tuple;
use crate::value::{self, Value, TAG_CODEPT};

/// One instruction: an opcode plus an optional immediate value, auto-pushed
/// onto the stack before dispatch (`spec.md` §4.E).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Operation {
    pub opcode: Opcode,
    pub immediate: Option<Box<Value>>,
}

impl Operation {
    pub fn new(opcode: Opcode) -> Operation {
        Operation {
            opcode,
            immediate: None,
        }
    }

    pub fn with_immediate(opcode: Opcode, immediate: Value) -> Operation {
        Operation {
            opcode,
            immediate: Some(Box::new(immediate)),
        }
    }

    /// `[hasImm: u8] || [opcode] || marshal(immediate?)` (`spec.md` §4.C, §6).
    pub fn marshal(&self, buf: &mut Vec<u8>) {
        match &self.immediate {
            Some(v) => {
                buf.push(1);
                buf.push(self.opcode as u8);
                value::marshal(v, buf);
            }
            None => {
                buf.push(0);
                buf.push(self.opcode as u8);
            }
        }
    }
}

/// `{pc, Operation, nextHash}`, or the distinguished unset sentinel used for
/// `errpc` before an error handler is installed. `spec.md` §9 recommends an
/// explicit tag over a magic `pc` value; `hash(Unset)` must still equal
/// `hash(Tuple())` to preserve the on-chain protocol.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CodePoint {
    Unset,
    Code {
        pc: u64,
        op: Operation,
        next_hash: U256,
    },
}

impl CodePoint {
    pub fn pc(&self) -> Option<u64> {
        match self {
            CodePoint::Code { pc, .. } => Some(*pc),
            CodePoint::Unset => None,
        }
    }

    pub fn op(&self) -> Option<&Operation> {
        match self {
            CodePoint::Code { op, .. } => Some(op),
            CodePoint::Unset => None,
        }
    }

    pub fn next_hash(&self) -> U256 {
        match self {
            CodePoint::Code { next_hash, .. } => *next_hash,
            CodePoint::Unset => Tuple::empty().hash(),
        }
    }

    /// `hash(CodePoint cp) = Keccak([CODEPT] || [opcode] ||
    /// hash(immediate?) || be256(cp.nextHash))`; the unset code point
    /// hashes as `hash(Tuple())` (`spec.md` §3, §9).
    pub fn hash(&self) -> U256 {
        match self {
            CodePoint::Unset => Tuple::empty().hash(),
            CodePoint::Code { op, next_hash, .. } => {
                let mut buf = Vec::with_capacity(1 + 1 + 32 + 32);
                buf.push(TAG_CODEPT);
                buf.push(op.opcode as u8);
                if let Some(imm) = &op.immediate {
                    buf.extend_from_slice(&value::be256(imm.hash()));
                }
                buf.extend_from_slice(&value::be256(*next_hash));
                value::keccak_bytes(&buf)
            }
        }
    }

    /// `[CODEPT] || [opcode] || marshal(immediate?) || be256(nextHash)`
    /// (`spec.md` §6). Used when a `CodePoint` appears as a `Value` on the
    /// wire; unlike `Operation::marshal` there is no `hasImm` flag byte.
    pub fn marshal(&self, buf: &mut Vec<u8>) {
        match self {
            CodePoint::Unset => {
                buf.push(TAG_CODEPT);
                buf.push(0);
            }
            CodePoint::Code { op, next_hash, .. } => {
                buf.push(TAG_CODEPT);
                buf.push(op.opcode as u8);
                if let Some(imm) = &op.immediate {
                    value::marshal(imm, buf);
                }
                buf.extend_from_slice(&value::be256(*next_hash));
            }
        }
    }
}

/// Build `code[0..N]` from an ordered list of operations, filling
/// `nextHash` from the tail so each code point commits to the rest of the
/// program (`spec.md` §4.C).
pub fn link_code_points(ops: Vec<Operation>) -> Vec<CodePoint> {
    let n = ops.len();
    let mut points: Vec<CodePoint> = ops
        .into_iter()
        .enumerate()
        .map(|(pc, op)| CodePoint::Code {
            pc: pc as u64,
            op,
            next_hash: U256::zero(),
        })
        .collect();
    if n == 0 {
        return points;
    }
    for i in (0..n - 1).rev() {
        let next = points[i + 1].hash();
        if let CodePoint::Code { next_hash, .. } = &mut points[i] {
            *next_hash = next;
        }
    }
    points
}
