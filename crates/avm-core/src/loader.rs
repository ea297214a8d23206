//! The bytecode (AO file) loader (`spec.md` §4.I).
//!
//! Grounded on `original_source/` (the C++ loader reads the same
//! version/extension/codeCount/code/static layout byte-for-byte); the
//! version check and extension-record skipping are load-time host
//! failures, never machine-observable ones (`spec.md` §7(b)).

use std::fmt;

use avm_types::code::{link_code_points, Operation};
use avm_types::opcode::Opcode;
use avm_types::tuple::{Tuple, TupleError};
use avm_types::value::Value;

use crate::machine::MachineState;

/// The AO file format version this loader understands (`spec.md` §4.I).
pub const CURRENT_AO_VERSION: u32 = 1;

/// A load-time, host-observable failure: malformed input, not a program
/// bug. Never sets `MachineState::status` — the machine simply never comes
/// into existence (`spec.md` §7(b)).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    UnexpectedEof { context: &'static str },
    VersionMismatch { found: u32 },
    UnknownOpcode { byte: u8 },
    TupleArity(TupleError),
    Utf8,
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::UnexpectedEof { context } => {
                write!(f, "unexpected end of file while reading {context}")
            }
            LoadError::VersionMismatch { found } => write!(
                f,
                "bytecode version {found} does not match CURRENT_AO_VERSION {CURRENT_AO_VERSION}"
            ),
            LoadError::UnknownOpcode { byte } => write!(f, "unknown opcode byte 0x{byte:02x}"),
            LoadError::TupleArity(e) => write!(f, "{e}"),
            LoadError::Utf8 => write!(f, "invalid utf-8 in extension record"),
        }
    }
}

impl std::error::Error for LoadError {}

impl From<TupleError> for LoadError {
    fn from(e: TupleError) -> LoadError {
        LoadError::TupleArity(e)
    }
}

/// A cursor over the AO file bytes. Kept separate from `MachineState` so
/// load failures never leave a partially-populated machine lying around.
struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Reader<'a> {
        Reader { bytes, pos: 0 }
    }

    fn take(&mut self, n: usize, context: &'static str) -> Result<&'a [u8], LoadError> {
        let end = self.pos + n;
        let slice = self
            .bytes
            .get(self.pos..end)
            .ok_or(LoadError::UnexpectedEof { context })?;
        self.pos = end;
        Ok(slice)
    }

    fn u32(&mut self, context: &'static str) -> Result<u32, LoadError> {
        let b = self.take(4, context)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u64(&mut self, context: &'static str) -> Result<u64, LoadError> {
        let b = self.take(8, context)?;
        Ok(u64::from_be_bytes(b.try_into().unwrap()))
    }

    fn u8(&mut self, context: &'static str) -> Result<u8, LoadError> {
        Ok(self.take(1, context)?[0])
    }

    fn u256(&mut self, context: &'static str) -> Result<ethereum_types::U256, LoadError> {
        let b = self.take(32, context)?;
        Ok(ethereum_types::U256::from_big_endian(b))
    }

    fn value(&mut self) -> Result<Value, LoadError> {
        let tag = self.u8("value tag")?;
        match tag {
            avm_types::TAG_NUM => Ok(Value::Num(self.u256("Num payload")?)),
            avm_types::TAG_CODEPT => self.code_point_value(),
            n if n >= avm_types::TAG_TUPLE => {
                let size = (n - avm_types::TAG_TUPLE) as usize;
                let mut elems = Vec::with_capacity(size);
                for _ in 0..size {
                    elems.push(self.value()?);
                }
                Ok(Value::Tuple(Tuple::new(elems)?))
            }
            _ => Err(LoadError::UnexpectedEof {
                context: "unrecognized value tag",
            }),
        }
    }

    fn code_point_value(&mut self) -> Result<Value, LoadError> {
        let opcode_byte = self.u8("code point opcode")?;
        if opcode_byte == 0 {
            return Ok(Value::CodePoint(avm_types::CodePoint::Unset));
        }
        let opcode = Opcode::from_u8(opcode_byte).ok_or(LoadError::UnknownOpcode { byte: opcode_byte })?;
        // Immediates on a `Value`-embedded code point are always present
        // for non-`Unset` points in this wire form, mirroring `marshal`'s
        // own encoding (`spec.md` §6).
        let immediate = Some(Box::new(self.value()?));
        let next_hash = self.u256("code point nextHash")?;
        Ok(Value::CodePoint(avm_types::CodePoint::Code {
            pc: 0,
            op: avm_types::Operation { opcode, immediate },
            next_hash,
        }))
    }

    fn operation(&mut self) -> Result<Operation, LoadError> {
        let has_imm = self.u8("operation hasImm")?;
        let opcode_byte = self.u8("operation opcode")?;
        let opcode = Opcode::from_u8(opcode_byte).ok_or(LoadError::UnknownOpcode { byte: opcode_byte })?;
        if has_imm != 0 {
            Ok(Operation::with_immediate(opcode, self.value()?))
        } else {
            Ok(Operation::new(opcode))
        }
    }
}

/// Parse an AO file into a freshly-populated `MachineState` (`spec.md`
/// §4.I): version check, extension records, the code vector, and the
/// static value, then link `nextHash` tail-to-head and set `pc = 0`.
pub fn load(bytes: &[u8]) -> Result<MachineState, LoadError> {
    let mut r = Reader::new(bytes);

    let version = r.u32("version")?;
    if version != CURRENT_AO_VERSION {
        return Err(LoadError::VersionMismatch { found: version });
    }

    loop {
        let id = r.u32("extension record id")?;
        if id == 0 {
            break;
        }
        // Non-zero ids are reserved and currently carry no payload
        // (spec.md §4.I).
    }

    let code_count = r.u64("codeCount")?;
    let mut ops = Vec::with_capacity(code_count as usize);
    for _ in 0..code_count {
        ops.push(r.operation()?);
    }
    let static_val = r.value()?;

    let mut state = MachineState::empty();
    state.code = link_code_points(ops);
    state.static_val = static_val;
    state.pc = 0;
    Ok(state)
}
