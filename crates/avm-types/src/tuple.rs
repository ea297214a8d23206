//! Fixed-arity, value-typed tuples with a memoized structural hash.
//!
//! The source machine mutates tuples in place through a pool; the contract
//! it must uphold is value semantics, so `set_element` here returns a new
//! `Tuple` rather than mutating the receiver (`spec.md` §4.B, §9).

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use ethereum_types::U256;

use crate::value::{self, Value};

/// Maximum tuple arity, enforced at construction and `set_element`.
pub const MAX_ARITY: usize = 8;

#[derive(Debug)]
struct TupleData {
    elems: Vec<Value>,
    hash: RefCell<Option<U256>>,
}

/// An ordered, immutable-by-convention sequence of 0..=8 values.
///
/// Cloning a `Tuple` is cheap (reference count bump); the memoized hash is
/// shared along with the data, so sharing a sub-tuple across parents never
/// forces a recompute.
#[derive(Clone)]
pub struct Tuple(Rc<TupleData>);

/// Error returned by `Tuple::new`/`set_element` when arity or index bounds
/// are violated. The interpreter turns this into `MachineError` at the call
/// site; the type itself carries no notion of "machine error" so it stays
/// usable outside the interpreter (e.g. the loader).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TupleError {
    TooManyElements { got: usize },
    IndexOutOfBounds { index: usize, size: usize },
}

impl fmt::Display for TupleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            TupleError::TooManyElements { got } => {
                write!(f, "tuple arity {got} exceeds maximum {MAX_ARITY}")
            }
            TupleError::IndexOutOfBounds { index, size } => {
                write!(f, "tuple index {index} out of bounds for size {size}")
            }
        }
    }
}

impl Tuple {
    /// The empty tuple. Used throughout the machine as the sentinel for
    /// "empty register", "empty static", "empty stack" and unset error-pc.
    pub fn empty() -> Tuple {
        Tuple(Rc::new(TupleData {
            elems: Vec::new(),
            hash: RefCell::new(None),
        }))
    }

    pub fn new(elems: Vec<Value>) -> Result<Tuple, TupleError> {
        if elems.len() > MAX_ARITY {
            return Err(TupleError::TooManyElements { got: elems.len() });
        }
        Ok(Tuple(Rc::new(TupleData {
            elems,
            hash: RefCell::new(None),
        })))
    }

    pub fn size(&self) -> u8 {
        self.0.elems.len() as u8
    }

    pub fn get_element(&self, index: usize) -> Result<&Value, TupleError> {
        self.0.elems.get(index).ok_or(TupleError::IndexOutOfBounds {
            index,
            size: self.0.elems.len(),
        })
    }

    /// Returns a tuple equal to `self` with slot `index` replaced. `self` is
    /// not observably changed.
    pub fn set_element(&self, index: usize, new_val: Value) -> Result<Tuple, TupleError> {
        if index >= self.0.elems.len() {
            return Err(TupleError::IndexOutOfBounds {
                index,
                size: self.0.elems.len(),
            });
        }
        let mut elems = self.0.elems.clone();
        elems[index] = new_val;
        Ok(Tuple(Rc::new(TupleData {
            elems,
            hash: RefCell::new(None),
        })))
    }

    pub fn elements(&self) -> &[Value] {
        &self.0.elems
    }

    /// Structural hash, memoized on first computation.
    pub fn hash(&self) -> U256 {
        if let Some(h) = *self.0.hash.borrow() {
            return h;
        }
        let h = value::hash_tuple_elements(&self.0.elems);
        *self.0.hash.borrow_mut() = Some(h);
        h
    }
}

impl PartialEq for Tuple {
    fn eq(&self, other: &Tuple) -> bool {
        Rc::ptr_eq(&self.0, &other.0) || self.hash() == other.hash()
    }
}
impl Eq for Tuple {}

impl std::hash::Hash for Tuple {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        // Hash by structural content hash, not by `Rc` address, so it stays
        // consistent with `PartialEq`.
        self.hash().hash(state)
    }
}

impl fmt::Debug for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tuple{:?}", self.0.elems)
    }
}

impl Default for Tuple {
    fn default() -> Tuple {
        Tuple::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_tuple_hash_is_stable() {
        assert_eq!(Tuple::empty().hash(), Tuple::empty().hash());
    }

    #[test]
    fn set_element_leaves_original_untouched() {
        let t = Tuple::new(vec![Value::Num(10.into()), Value::Num(20.into())]).unwrap();
        let t2 = t.set_element(1, Value::Num(99.into())).unwrap();
        assert_eq!(*t.get_element(1).unwrap(), Value::Num(20.into()));
        assert_eq!(*t2.get_element(1).unwrap(), Value::Num(99.into()));
        assert_ne!(t.hash(), t2.hash());
    }

    #[test]
    fn arity_over_max_is_rejected() {
        let elems = vec![Value::Num(U256::zero()); MAX_ARITY + 1];
        assert!(matches!(
            Tuple::new(elems),
            Err(TupleError::TooManyElements { got: 9 })
        ));
    }

    #[test]
    fn index_out_of_bounds_is_rejected() {
        let t = Tuple::new(vec![Value::Num(1.into())]).unwrap();
        assert!(t.get_element(1).is_err());
        assert!(t.set_element(1, Value::Num(2.into())).is_err());
    }

    #[test]
    fn two_tuples_with_same_content_hash_equal() {
        let a = Tuple::new(vec![Value::Num(1.into()), Value::Num(2.into())]).unwrap();
        let b = Tuple::new(vec![Value::Num(1.into()), Value::Num(2.into())]).unwrap();
        assert_eq!(a.hash(), b.hash());
        assert_eq!(a, b);
    }
}
