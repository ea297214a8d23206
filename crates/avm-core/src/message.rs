//! `Message`/`Balance` stand-ins.
//!
//! `spec.md` §1 treats these as opaque, externally-specified types with "a
//! specified hash and marshalling" that a real embedder supplies. This
//! crate still needs *something* concrete to compile and exercise
//! `SEND`/`NBSEND` against, so it defines a minimal decode and a minimal
//! balance sheet, grounded on `original_source/machine.cpp`'s
//! `sendOnchainMessage` (`msg.token`, `msg.currency`) — see DESIGN.md for
//! why this is a stand-in, not a port of the real upstream type.

use std::collections::HashMap;

use avm_types::tuple::Tuple;
use avm_types::value::Value;
use avm_types::MachineError;

/// A decoded `SEND` argument: `(token, amount)` as a 2-tuple `Value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub token: Value,
    pub amount: Value,
}

impl Message {
    /// Decode a `Value` popped by `SEND`/`NBSEND`. Must be a 2-tuple;
    /// anything else is `MachineError::SendDecode` (`spec.md` §4.E, §7(a)).
    pub fn decode(v: &Value) -> Result<Message, MachineError> {
        let tuple = v.as_tuple().ok_or(MachineError::SendDecode)?;
        if tuple.size() != 2 {
            return Err(MachineError::SendDecode);
        }
        Ok(Message {
            token: tuple.get_element(0).map_err(|_| MachineError::SendDecode)?.clone(),
            amount: tuple.get_element(1).map_err(|_| MachineError::SendDecode)?.clone(),
        })
    }

    /// Inverse of `decode`: the `(token, amount)` 2-tuple pushed onto the
    /// pending/offchain inbox cons chain (`machine::MachineState`).
    pub fn to_value(&self) -> Value {
        Value::Tuple(
            Tuple::new(vec![self.token.clone(), self.amount.clone()])
                .expect("arity 2 <= MAX_ARITY"),
        )
    }
}

/// A minimal per-token balance sheet. `add` credits a token balance (called
/// when an onchain message arrives with a transfer attached); `spend`
/// debits it, failing (without mutating) when the balance is insufficient
/// — the failure path `SEND` turns into `Status::Blocked` (`spec.md` §4.E).
#[derive(Debug, Clone, Default)]
pub struct TokenTracker {
    balances: HashMap<Value, Value>,
}

impl TokenTracker {
    pub fn new() -> TokenTracker {
        TokenTracker::default()
    }

    pub fn balance_of(&self, token: &Value) -> ethereum_types::U256 {
        self.balances
            .get(token)
            .and_then(Value::as_num)
            .unwrap_or_default()
    }

    pub fn add(&mut self, token: Value, amount: ethereum_types::U256) {
        let current = self.balance_of(&token);
        self.balances.insert(token, Value::Num(current + amount));
    }

    /// Returns `true` and debits on success; returns `false` and leaves the
    /// balance untouched on insufficient funds.
    pub fn spend(&mut self, token: &Value, amount: ethereum_types::U256) -> bool {
        let current = self.balance_of(token);
        if current < amount {
            return false;
        }
        self.balances.insert(token.clone(), Value::Num(current - amount));
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use avm_types::tuple::Tuple;
    use ethereum_types::U256;

    fn token(n: u64) -> Value {
        Value::Num(U256::from(n))
    }

    #[test]
    fn decode_rejects_non_tuple() {
        assert!(Message::decode(&Value::Num(U256::zero())).is_err());
    }

    #[test]
    fn decode_rejects_wrong_arity() {
        let t = Tuple::new(vec![token(1)]).unwrap();
        assert!(Message::decode(&Value::Tuple(t)).is_err());
    }

    #[test]
    fn decode_accepts_two_tuple() {
        let t = Tuple::new(vec![token(1), token(100)]).unwrap();
        let msg = Message::decode(&Value::Tuple(t)).unwrap();
        assert_eq!(msg.token, token(1));
        assert_eq!(msg.amount, token(100));
    }

    #[test]
    fn spend_fails_without_mutating_on_insufficient_balance() {
        let mut tracker = TokenTracker::new();
        tracker.add(token(1), U256::from(10));
        assert!(!tracker.spend(&token(1), U256::from(20)));
        assert_eq!(tracker.balance_of(&token(1)), U256::from(10));
        assert!(tracker.spend(&token(1), U256::from(10)));
        assert_eq!(tracker.balance_of(&token(1)), U256::zero());
    }
}
