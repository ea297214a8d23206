//! The AVM value model: a closed three-variant sum type with a structural,
//! Keccak-256-backed hash (`spec.md` §3).

use ethereum_types::{BigEndianHash, H256, U256};

use crate::code::CodePoint;
use crate::tuple::Tuple;

/// Type tag byte used in both marshalling and hash prefixes.
pub const TAG_NUM: u8 = 0;
pub const TAG_CODEPT: u8 = 1;
pub const HASH_ONLY: u8 = 2;
pub const TAG_TUPLE: u8 = 3;

/// The AVM's recursive value type: an unsigned 256-bit integer, a code
/// point, or a bounded tuple of values.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    Num(U256),
    CodePoint(CodePoint),
    Tuple(Tuple),
}

impl Value {
    pub fn is_num(&self) -> bool {
        matches!(self, Value::Num(_))
    }

    pub fn as_num(&self) -> Option<U256> {
        match *self {
            Value::Num(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_tuple(&self) -> Option<&Tuple> {
        match self {
            Value::Tuple(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_code_point(&self) -> Option<&CodePoint> {
        match self {
            Value::CodePoint(cp) => Some(cp),
            _ => None,
        }
    }

    /// Type tag as used by `TYPE` and the marshal format: `NUM=0,
    /// CODEPT=1, TUPLE=3` (`spec.md` §4.E).
    pub fn type_tag(&self) -> u8 {
        match self {
            Value::Num(_) => TAG_NUM,
            Value::CodePoint(_) => TAG_CODEPT,
            Value::Tuple(_) => TAG_TUPLE,
        }
    }

    /// Total, pure, structural hash. Memoized transparently for tuples via
    /// `Tuple::hash`; cheap (no allocation) for `Num`/`CodePoint`.
    pub fn hash(&self) -> U256 {
        match self {
            Value::Num(n) => hash_num(*n),
            Value::CodePoint(cp) => cp.hash(),
            Value::Tuple(t) => t.hash(),
        }
    }
}

/// Big-endian 32-byte encoding of a `U256`, as used throughout the hash and
/// marshal contracts.
pub fn be256(x: U256) -> [u8; 32] {
    x.to_big_endian()
}

pub fn u256_from_h256(h: H256) -> U256 {
    h.into_uint()
}

pub fn h256_from_u256(x: U256) -> H256 {
    H256::from_uint(&x)
}

fn keccak(bytes: &[u8]) -> U256 {
    u256_from_h256(keccak_hash::keccak(bytes))
}

/// `hash(Num x) = Keccak([NUM] || be256(x))`.
pub fn hash_num(x: U256) -> U256 {
    let mut buf = Vec::with_capacity(33);
    buf.push(TAG_NUM);
    buf.extend_from_slice(&be256(x));
    keccak(&buf)
}

/// `hash(Tuple t)`: `Keccak([TUPLE+0])` for the empty tuple, else
/// `Keccak([TUPLE+n] || be256(hash(t[0])) || .. || be256(hash(t[n-1])))`.
pub(crate) fn hash_tuple_elements(elems: &[Value]) -> U256 {
    let mut buf = Vec::with_capacity(1 + 32 * elems.len());
    buf.push(TAG_TUPLE + elems.len() as u8);
    for e in elems {
        buf.extend_from_slice(&be256(e.hash()));
    }
    keccak(&buf)
}

/// Keccak over an already-assembled byte buffer, exposed for `CodePoint`'s
/// hash (which needs the opcode byte and an optional immediate hash mixed
/// in before the final `nextHash` word).
pub(crate) fn keccak_bytes(bytes: &[u8]) -> U256 {
    keccak(bytes)
}

/// Canonical wire form (`spec.md` §6):
/// - `Num n`: `[NUM] || be256(n)`.
/// - `CodePoint cp`: delegated to `CodePoint::marshal`.
/// - `Tuple t`: `[TUPLE + size(t)] || marshal(t[0]) || .. || marshal(t[size-1])`.
pub fn marshal(v: &Value, buf: &mut Vec<u8>) {
    match v {
        Value::Num(n) => {
            buf.push(TAG_NUM);
            buf.extend_from_slice(&be256(*n));
        }
        Value::CodePoint(cp) => cp.marshal(buf),
        Value::Tuple(t) => {
            buf.push(TAG_TUPLE + t.size());
            for elem in t.elements() {
                marshal(elem, buf);
            }
        }
    }
}

/// `marshalShallow(v)`: identical to `marshal` for `Num`/`CodePoint`; for a
/// `Tuple`, one level deep only — each child is replaced by
/// `[HASH_ONLY] || be256(hash(child))` (`spec.md` §6).
pub fn marshal_shallow(v: &Value, buf: &mut Vec<u8>) {
    match v {
        Value::Num(_) | Value::CodePoint(_) => marshal(v, buf),
        Value::Tuple(t) => {
            buf.push(TAG_TUPLE + t.size());
            for elem in t.elements() {
                buf.push(HASH_ONLY);
                buf.extend_from_slice(&be256(elem.hash()));
            }
        }
    }
}

/// `[HASH_ONLY] || be256(h)` — stands in for a value the verifier does not
/// need to see (`spec.md` §6).
pub fn marshal_hash_only(h: U256, buf: &mut Vec<u8>) {
    buf.push(HASH_ONLY);
    buf.extend_from_slice(&be256(h));
}
