//! `MachineState`: registers, PC, dual stacks, error-PC, static, inbox and
//! balance (`spec.md` §3, §4.E). Construction/destruction, message
//! plumbing and the six-word state hash live here; opcode dispatch lives in
//! `crate::interpreter`.

use avm_types::tuple::Tuple;
use avm_types::value::{self, Value};
use avm_types::{AvmConfig, CodePoint};
use ethereum_types::U256;

use crate::message::{Message, TokenTracker};
use crate::stack::DataStack;

/// `spec.md` §3: one of `Extensive` (runnable), `Blocked` (cooperatively
/// paused), `Halted`, `Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Extensive,
    Blocked,
    Halted,
    Error,
}

/// Per-assertion scratch state, reset at the start of every `run`
/// (`spec.md` §4.F step 1).
#[derive(Debug, Clone, Default)]
pub struct Context {
    pub time_bounds: [u64; 2],
    pub logs: Vec<Value>,
    pub out_messages: Vec<Message>,
}

/// The output of a bounded `run` (`spec.md` §6, glossary "Assertion").
#[derive(Debug, Clone, Default)]
pub struct Assertion {
    pub num_steps: u64,
    pub out_messages: Vec<Message>,
    pub logs: Vec<Value>,
}

/// `spec.md` §3 "MachineState".
#[derive(Debug, Clone)]
pub struct MachineState {
    pub code: Vec<CodePoint>,
    pub pc: u64,
    pub stack: DataStack,
    pub auxstack: DataStack,
    pub register_val: Value,
    pub static_val: Value,
    pub errpc: CodePoint,
    pub context: Context,
    pub pending_inbox: Value,
    pub inbox: Value,
    pub balance: TokenTracker,
    pub status: Status,
    pub config: AvmConfig,
}

impl MachineState {
    /// Constructed empty; populated by the loader, advanced by the
    /// interpreter (`spec.md` §3 "Lifecycle").
    pub fn empty() -> MachineState {
        MachineState {
            code: Vec::new(),
            pc: 0,
            stack: DataStack::new(),
            auxstack: DataStack::new(),
            register_val: Value::Tuple(Tuple::empty()),
            static_val: Value::Tuple(Tuple::empty()),
            errpc: CodePoint::Unset,
            context: Context::default(),
            pending_inbox: Value::Tuple(Tuple::empty()),
            inbox: Value::Tuple(Tuple::empty()),
            balance: TokenTracker::new(),
            status: Status::Extensive,
            config: AvmConfig::default(),
        }
    }

    pub fn current_code_point(&self) -> &CodePoint {
        &self.code[self.pc as usize]
    }

    /// `spec.md` §4.G: the six-word commitment, or the short-circuit
    /// sentinels for `Halted`/`Error`.
    pub fn hash(&mut self) -> U256 {
        match self.status {
            Status::Halted => return U256::zero(),
            Status::Error => return U256::one(),
            Status::Extensive | Status::Blocked => {}
        }
        let code_hash = self.current_code_point().hash();
        let stack_hash = self.stack.hash();
        let auxstack_hash = self.auxstack.hash();
        let register_hash = self.register_val.hash();
        let static_hash = self.static_val.hash();
        let errpc_hash = self.errpc.hash();

        let mut buf = Vec::with_capacity(32 * 6);
        for word in [
            code_hash,
            stack_hash,
            auxstack_hash,
            register_hash,
            static_hash,
            errpc_hash,
        ] {
            buf.extend_from_slice(&value::be256(word));
        }
        value::u256_from_h256(keccak_hash::keccak(&buf))
    }

    pub fn has_pending_messages(&self) -> bool {
        self.pending_inbox != Value::Tuple(Tuple::empty())
    }

    /// `original_source/machine.cpp::sendOnchainMessage`: push a
    /// left-leaning cons `(0, prevPending, msg)` and credit the balance
    /// (`spec.md` §6 "Injected boundary").
    pub fn send_onchain_message(&mut self, msg: Message, credit: U256) {
        let token = msg.token.clone();
        let cons = Tuple::new(vec![
            Value::Num(U256::zero()),
            self.pending_inbox.clone(),
            msg.to_value(),
        ])
        .expect("arity 3 <= MAX_ARITY");
        self.pending_inbox = Value::Tuple(cons);
        self.balance.add(token, credit);
    }

    fn deliver_message_stack(&mut self, messages: Value) {
        if messages == Value::Tuple(Tuple::empty()) {
            return;
        }
        let cons = Tuple::new(vec![Value::Num(U256::one()), self.inbox.clone(), messages])
            .expect("arity 3 <= MAX_ARITY");
        self.inbox = Value::Tuple(cons);
    }

    /// Promote `pendingInbox` into `inbox`; a no-op when nothing is
    /// pending (`spec.md` §8 "Idempotence of empty pending").
    pub fn deliver_onchain_messages(&mut self) {
        let pending = std::mem::replace(&mut self.pending_inbox, Value::Tuple(Tuple::empty()));
        self.deliver_message_stack(pending);
    }

    /// Deliver a batch directly, bypassing the pending/onchain distinction
    /// (`spec.md` §6 "Injected boundary").
    pub fn send_offchain_messages(&mut self, messages: &[Message]) {
        let mut stack = Value::Tuple(Tuple::empty());
        for msg in messages {
            let cons = Tuple::new(vec![Value::Num(U256::zero()), stack, msg.to_value()])
                .expect("arity 3 <= MAX_ARITY");
            stack = Value::Tuple(cons);
        }
        self.deliver_message_stack(stack);
    }
}
