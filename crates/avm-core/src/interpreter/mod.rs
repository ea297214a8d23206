//! Opcode dispatch and the bounded `run` loop (`spec.md` §4.E–§4.G).
//!
//! Grounded on `crates/vm/evm/src/interpreter/mod.rs`'s shape — a `step`
//! function wrapped by a bounded outer loop, a single big `match` on the
//! opcode, pop-then-compute-then-push per arm — generalized from
//! gas-metered EVM semantics to the AVM's cooperative
//! Extensive/Blocked/Halted/Error state machine
//! (`original_source/machine.cpp::runOp`). `ADDMOD`/`MULMOD` reuse the
//! teacher's `to_biguint`/`from_biguint` widening helpers verbatim.

use ethereum_types::U256;
use num_bigint::BigUint;

use avm_types::tuple::Tuple;
use avm_types::value::Value;
use avm_types::{CodePoint, MachineError, Opcode};

use crate::informant::Informant;
use crate::machine::{Assertion, Context, MachineState, Status};
use crate::message::Message;

fn to_biguint(x: U256) -> BigUint {
    BigUint::from_bytes_le(&x.to_little_endian())
}

fn from_biguint(x: BigUint) -> U256 {
    let bytes = x.to_bytes_le();
    U256::from_little_endian(&bytes)
}

/// Two's-complement decomposition used by `SDIV`/`SMOD`/`SLT`/`SGT`.
fn decompose(x: U256) -> (bool, U256) {
    if x.bit(255) {
        (true, (!x).overflowing_add(U256::one()).0)
    } else {
        (false, x)
    }
}

fn recompose(neg: bool, magnitude: U256) -> U256 {
    if neg {
        (!magnitude).overflowing_add(U256::one()).0
    } else {
        magnitude
    }
}

/// How `pc` moves after an opcode completes without raising a
/// `MachineError` (`spec.md` §4.E first paragraph).
enum Outcome {
    Advance,
    Stay,
    Jump(u64),
}

/// Drives a `MachineState` through `runOp`/`run` (`spec.md` §4.F).
/// Mirrors the teacher's `Interpreter<Cost>`: a thin wrapper owning the
/// state plus the tracing sidecar, with nothing of its own that affects
/// the hash.
pub struct Interpreter {
    pub state: MachineState,
    informant: Informant,
}

impl Interpreter {
    pub fn new(state: MachineState) -> Interpreter {
        Interpreter {
            state,
            informant: Informant::new(),
        }
    }

    pub fn into_state(self) -> MachineState {
        self.state
    }

    /// `spec.md` §4.F.
    pub fn run(&mut self, step_count: u64, t_start: u64, t_end: u64) -> Assertion {
        self.state.context = Context {
            time_bounds: [t_start, t_end],
            logs: Vec::new(),
            out_messages: Vec::new(),
        };
        if self.state.status == Status::Blocked {
            self.state.status = Status::Extensive;
        }

        let mut steps_done = 0u64;
        for _ in 0..step_count {
            match self.state.status {
                Status::Error | Status::Halted | Status::Blocked => break,
                Status::Extensive => {}
            }
            if self.step() {
                // This step blocked; it is not counted (spec.md §4.F step 4).
                break;
            }
            steps_done += 1;
        }

        // spec.md §4.F step 5 / §8 scenario 2: an installed error handler
        // actually resumes execution at the handler on the next run, which
        // requires clearing Error here. `original_source/machine.cpp`
        // leaves `state` permanently `Error` even once `errpc` is set
        // (`runOne` refuses to execute at all once `Error`); this
        // implementation follows the spec text over that C++ detail — see
        // DESIGN.md.
        if self.state.status == Status::Error {
            if let CodePoint::Code { pc, .. } = &self.state.errpc {
                self.state.pc = *pc;
                self.state.status = Status::Extensive;
            }
        }

        Assertion {
            num_steps: steps_done,
            out_messages: std::mem::take(&mut self.state.context.out_messages),
            logs: std::mem::take(&mut self.state.context.logs),
        }
    }

    /// Execute one instruction. Returns `true` if this step transitioned
    /// the machine to `Blocked` (the caller must not count it).
    fn step(&mut self) -> bool {
        let pc = self.state.pc;
        let code_point = self.state.code[pc as usize].clone();
        self.informant.before_step(pc, &code_point);

        let op = match code_point.op() {
            Some(op) => op.clone(),
            None => panic!("pc points at an unset code point: load-time invariant violated"),
        };
        let immediate_pushed = match &op.immediate {
            Some(imm) => self.push((**imm).clone()),
            None => Ok(()),
        };

        let outcome = match immediate_pushed.and_then(|()| self.run_op(op.opcode)) {
            Ok(outcome) => outcome,
            Err(_err) => {
                self.state.status = Status::Error;
                self.informant.errored(pc);
                Outcome::Stay
            }
        };

        let blocked = self.state.status == Status::Blocked;
        match outcome {
            Outcome::Advance => self.state.pc += 1,
            Outcome::Jump(target) => self.state.pc = target,
            Outcome::Stay => {}
        }
        blocked
    }

    fn pop_num(&mut self, op: Opcode) -> Result<U256, MachineError> {
        let v = self
            .state
            .stack
            .pop()
            .map_err(|_| MachineError::stack_underflow(op))?;
        v.as_num().ok_or_else(|| MachineError::type_mismatch(op, "Num"))
    }

    fn pop_tuple(&mut self, op: Opcode) -> Result<Tuple, MachineError> {
        let v = self
            .state
            .stack
            .pop()
            .map_err(|_| MachineError::stack_underflow(op))?;
        v.as_tuple()
            .cloned()
            .ok_or_else(|| MachineError::type_mismatch(op, "Tuple"))
    }

    fn pop_code_point(&mut self, op: Opcode) -> Result<CodePoint, MachineError> {
        let v = self
            .state
            .stack
            .pop()
            .map_err(|_| MachineError::stack_underflow(op))?;
        v.as_code_point()
            .cloned()
            .ok_or(MachineError::BadJumpDestination {
                instruction: op.name(),
            })
    }

    fn pop_any(&mut self, op: Opcode) -> Result<Value, MachineError> {
        self.state.stack.pop().map_err(|_| MachineError::stack_underflow(op))
    }

    /// `AvmConfig::stack_limit` bounds the main stack the same way the
    /// teacher's `Schedule` bounds EVM stack depth — exceeding it is a
    /// machine error, not a host panic (`spec.md` §7(a)).
    fn push(&mut self, v: Value) -> Result<(), MachineError> {
        if self.state.stack.stacksize() >= self.state.config.stack_limit {
            return Err(MachineError::StackLimitExceeded {
                limit: self.state.config.stack_limit,
            });
        }
        self.state.stack.push(v);
        Ok(())
    }

    fn push_num(&mut self, n: U256) -> Result<(), MachineError> {
        self.push(Value::Num(n))
    }

    fn push_bool(&mut self, b: bool) -> Result<(), MachineError> {
        self.push_num(if b { U256::one() } else { U256::zero() })
    }

    /// `spec.md` §4.E: one opcode's effect. Errors raised here are caught
    /// by `step` and turned into `Status::Error`.
    fn run_op(&mut self, opcode: Opcode) -> Result<Outcome, MachineError> {
        use Opcode::*;
        match opcode {
            Add => {
                let a = self.pop_num(Add)?;
                let b = self.pop_num(Add)?;
                self.push_num(a.overflowing_add(b).0)?;
                Ok(Outcome::Advance)
            }
            Mul => {
                let a = self.pop_num(Mul)?;
                let b = self.pop_num(Mul)?;
                self.push_num(a.overflowing_mul(b).0)?;
                Ok(Outcome::Advance)
            }
            Sub => {
                let a = self.pop_num(Sub)?;
                let b = self.pop_num(Sub)?;
                self.push_num(a.overflowing_sub(b).0)?;
                Ok(Outcome::Advance)
            }
            Div => {
                let a = self.pop_num(Div)?;
                let b = self.pop_num(Div)?;
                if b.is_zero() {
                    return Err(MachineError::DivisionByZero { instruction: "DIV" });
                }
                self.push_num(a / b)?;
                Ok(Outcome::Advance)
            }
            Mod => {
                let a = self.pop_num(Mod)?;
                let b = self.pop_num(Mod)?;
                if b.is_zero() {
                    return Err(MachineError::DivisionByZero { instruction: "MOD" });
                }
                self.push_num(a % b)?;
                Ok(Outcome::Advance)
            }
            Sdiv => {
                let a = self.pop_num(Sdiv)?;
                let b = self.pop_num(Sdiv)?;
                if b.is_zero() {
                    return Err(MachineError::DivisionByZero { instruction: "SDIV" });
                }
                let (a_neg, a_mag) = decompose(a);
                let (b_neg, b_mag) = decompose(b);
                // min_int / -1: a_mag's raw bits already equal min_int's, the
                // sign comes out positive, so this general path yields
                // min_int with no overflow (spec.md §8 scenario 6).
                self.push_num(recompose(a_neg ^ b_neg, a_mag / b_mag))?;
                Ok(Outcome::Advance)
            }
            Smod => {
                let a = self.pop_num(Smod)?;
                let b = self.pop_num(Smod)?;
                if b.is_zero() {
                    return Err(MachineError::DivisionByZero { instruction: "SMOD" });
                }
                let (a_neg, a_mag) = decompose(a);
                let (_, b_mag) = decompose(b);
                self.push_num(recompose(a_neg, a_mag % b_mag))?;
                Ok(Outcome::Advance)
            }
            Addmod => {
                let a = self.pop_num(Addmod)?;
                let b = self.pop_num(Addmod)?;
                let c = self.pop_num(Addmod)?;
                if c.is_zero() {
                    return Err(MachineError::DivisionByZero {
                        instruction: "ADDMOD",
                    });
                }
                let sum = to_biguint(a) + to_biguint(b);
                self.push_num(from_biguint(sum % to_biguint(c)))?;
                Ok(Outcome::Advance)
            }
            Mulmod => {
                let a = self.pop_num(Mulmod)?;
                let b = self.pop_num(Mulmod)?;
                let c = self.pop_num(Mulmod)?;
                if c.is_zero() {
                    return Err(MachineError::DivisionByZero {
                        instruction: "MULMOD",
                    });
                }
                let prod = to_biguint(a) * to_biguint(b);
                self.push_num(from_biguint(prod % to_biguint(c)))?;
                Ok(Outcome::Advance)
            }
            Exp => {
                let a = self.pop_num(Exp)?;
                let b = self.pop_num(Exp)?;
                if b > U256::from(u64::MAX) {
                    return Err(MachineError::ExponentTooLarge);
                }
                self.push_num(a.overflowing_pow(b).0)?;
                Ok(Outcome::Advance)
            }
            Lt => {
                let a = self.pop_num(Lt)?;
                let b = self.pop_num(Lt)?;
                self.push_bool(a < b)?;
                Ok(Outcome::Advance)
            }
            Gt => {
                let a = self.pop_num(Gt)?;
                let b = self.pop_num(Gt)?;
                self.push_bool(a > b)?;
                Ok(Outcome::Advance)
            }
            Slt => {
                let a = self.pop_num(Slt)?;
                let b = self.pop_num(Slt)?;
                let (a_neg, a_mag) = decompose(a);
                let (b_neg, b_mag) = decompose(b);
                let less = match (a_neg, b_neg) {
                    (true, false) => true,
                    (false, true) => false,
                    (true, true) => a_mag > b_mag,
                    (false, false) => a_mag < b_mag,
                };
                self.push_bool(less)?;
                Ok(Outcome::Advance)
            }
            Sgt => {
                let a = self.pop_num(Sgt)?;
                let b = self.pop_num(Sgt)?;
                let (a_neg, a_mag) = decompose(a);
                let (b_neg, b_mag) = decompose(b);
                let greater = match (a_neg, b_neg) {
                    (false, true) => true,
                    (true, false) => false,
                    (true, true) => a_mag < b_mag,
                    (false, false) => a_mag > b_mag,
                };
                self.push_bool(greater)?;
                Ok(Outcome::Advance)
            }
            Eq => {
                let a = self.pop_any(Eq)?;
                let b = self.pop_any(Eq)?;
                self.push_bool(a == b)?;
                Ok(Outcome::Advance)
            }
            Iszero => {
                let a = self.pop_num(Iszero)?;
                self.push_bool(a.is_zero())?;
                Ok(Outcome::Advance)
            }
            And => {
                let a = self.pop_num(And)?;
                let b = self.pop_num(And)?;
                self.push_num(a & b)?;
                Ok(Outcome::Advance)
            }
            Or => {
                let a = self.pop_num(Or)?;
                let b = self.pop_num(Or)?;
                self.push_num(a | b)?;
                Ok(Outcome::Advance)
            }
            Xor => {
                let a = self.pop_num(Xor)?;
                let b = self.pop_num(Xor)?;
                self.push_num(a ^ b)?;
                Ok(Outcome::Advance)
            }
            Not => {
                let a = self.pop_num(Not)?;
                self.push_num(!a)?;
                Ok(Outcome::Advance)
            }
            Byte => {
                // Data on top, index second (`original_source/.../machine.cpp:637-653`).
                let x = self.pop_num(Byte)?;
                let idx = self.pop_num(Byte)?;
                let byte = if idx < U256::from(32) {
                    (x >> (8 * (31 - idx.low_u32() as usize))) & U256::from(0xffu64)
                } else {
                    U256::zero()
                };
                self.push_num(byte)?;
                Ok(Outcome::Advance)
            }
            Signextend => {
                // Data on top, position second (`original_source/.../machine.cpp:655-672`).
                let x = self.pop_num(Signextend)?;
                let pos = self.pop_num(Signextend)?;
                let result = if pos < U256::from(32) {
                    let bit_position = (pos.low_u32() * 8 + 7) as usize;
                    let bit = x.bit(bit_position);
                    let mask = (U256::one() << bit_position) - U256::one();
                    if bit {
                        x | !mask
                    } else {
                        x & mask
                    }
                } else {
                    x
                };
                self.push_num(result)?;
                Ok(Outcome::Advance)
            }
            Hash => {
                let v = self.pop_any(Hash)?;
                self.push_num(v.hash())?;
                Ok(Outcome::Advance)
            }
            Type => {
                let v = self.pop_any(Type)?;
                self.push_num(U256::from(v.type_tag()))?;
                Ok(Outcome::Advance)
            }
            Pop => {
                self.pop_any(Pop)?;
                Ok(Outcome::Advance)
            }
            Spush => {
                self.push(self.state.static_val.clone())?;
                Ok(Outcome::Advance)
            }
            Rpush => {
                self.push(self.state.register_val.clone())?;
                Ok(Outcome::Advance)
            }
            Rset => {
                let v = self.pop_any(Rset)?;
                self.state.register_val = v;
                Ok(Outcome::Advance)
            }
            Jump => {
                let target = self.pop_code_point(Jump)?;
                let pc = target.pc().ok_or(MachineError::BadJumpDestination {
                    instruction: "JUMP",
                })?;
                Ok(Outcome::Jump(pc))
            }
            Cjump => {
                let target = self.pop_code_point(Cjump)?;
                let cond = self.pop_num(Cjump)?;
                if cond.is_zero() {
                    Ok(Outcome::Advance)
                } else {
                    let pc = target.pc().ok_or(MachineError::BadJumpDestination {
                        instruction: "CJUMP",
                    })?;
                    Ok(Outcome::Jump(pc))
                }
            }
            Stackempty => {
                self.push_bool(self.state.stack.is_empty())?;
                Ok(Outcome::Advance)
            }
            Auxstackempty => {
                self.push_bool(self.state.auxstack.is_empty())?;
                Ok(Outcome::Advance)
            }
            Pcpush => {
                self.push(Value::CodePoint(self.state.code[self.state.pc as usize].clone()))?;
                Ok(Outcome::Advance)
            }
            Auxpush => {
                let v = self.pop_any(Auxpush)?;
                self.state.auxstack.push(v);
                Ok(Outcome::Advance)
            }
            Auxpop => {
                let v = self
                    .state
                    .auxstack
                    .pop()
                    .map_err(|_| MachineError::stack_underflow(Auxpop))?;
                self.push(v)?;
                Ok(Outcome::Advance)
            }
            Noop => Ok(Outcome::Advance),
            Errpush => {
                self.push(Value::CodePoint(self.state.errpc.clone()))?;
                Ok(Outcome::Advance)
            }
            Errset => {
                let cp = self.pop_code_point(Errset)?;
                self.state.errpc = cp;
                Ok(Outcome::Advance)
            }
            Dup0 => {
                let v = self
                    .state
                    .stack
                    .peek(0)
                    .map_err(|_| MachineError::stack_underflow(Dup0))?
                    .clone();
                self.push(v)?;
                Ok(Outcome::Advance)
            }
            Dup1 => {
                let v = self
                    .state
                    .stack
                    .peek(1)
                    .map_err(|_| MachineError::stack_underflow(Dup1))?
                    .clone();
                self.push(v)?;
                Ok(Outcome::Advance)
            }
            Dup2 => {
                let v = self
                    .state
                    .stack
                    .peek(2)
                    .map_err(|_| MachineError::stack_underflow(Dup2))?
                    .clone();
                self.push(v)?;
                Ok(Outcome::Advance)
            }
            Swap1 => {
                let top = self
                    .state
                    .stack
                    .peek(0)
                    .map_err(|_| MachineError::stack_underflow(Swap1))?
                    .clone();
                let below = self
                    .state
                    .stack
                    .peek(1)
                    .map_err(|_| MachineError::stack_underflow(Swap1))?
                    .clone();
                self.state.stack.set(0, below).ok();
                self.state.stack.set(1, top).ok();
                Ok(Outcome::Advance)
            }
            Swap2 => {
                let top = self
                    .state
                    .stack
                    .peek(0)
                    .map_err(|_| MachineError::stack_underflow(Swap2))?
                    .clone();
                let deep = self
                    .state
                    .stack
                    .peek(2)
                    .map_err(|_| MachineError::stack_underflow(Swap2))?
                    .clone();
                self.state.stack.set(0, deep).ok();
                self.state.stack.set(2, top).ok();
                Ok(Outcome::Advance)
            }
            Tget => {
                let idx = self.pop_num(Tget)?;
                let tup = self.pop_tuple(Tget)?;
                let idx: usize = idx.try_into().unwrap_or(usize::MAX);
                let v = tup
                    .get_element(idx)
                    .map_err(|_| MachineError::TupleIndexOutOfBounds {
                        index: idx,
                        size: tup.size() as usize,
                    })?
                    .clone();
                self.push(v)?;
                Ok(Outcome::Advance)
            }
            Tset => {
                let idx = self.pop_num(Tset)?;
                let tup = self.pop_tuple(Tset)?;
                let v = self.pop_any(Tset)?;
                let idx: usize = idx.try_into().unwrap_or(usize::MAX);
                let updated = tup
                    .set_element(idx, v)
                    .map_err(|_| MachineError::TupleIndexOutOfBounds {
                        index: idx,
                        size: tup.size() as usize,
                    })?;
                self.push(Value::Tuple(updated))?;
                Ok(Outcome::Advance)
            }
            Tlen => {
                let tup = self.pop_tuple(Tlen)?;
                self.push_num(U256::from(tup.size()))?;
                Ok(Outcome::Advance)
            }
            Log => {
                let v = self.pop_any(Log)?;
                self.state.context.logs.push(v);
                Ok(Outcome::Advance)
            }
            Breakpoint => {
                self.state.status = Status::Blocked;
                Ok(Outcome::Stay)
            }
            Debug => Ok(Outcome::Advance),
            Send => {
                let arg = self.pop_any(Send)?;
                let msg = Message::decode(&arg)?;
                let amount = msg.amount.as_num().ok_or(MachineError::SendDecode)?;
                if !self.state.balance.spend(&msg.token, amount) {
                    self.push(arg)?;
                    self.informant.blocked(Send);
                    self.state.status = Status::Blocked;
                    return Ok(Outcome::Stay);
                }
                self.state.context.out_messages.push(msg);
                Ok(Outcome::Advance)
            }
            Nbsend => {
                let arg = self.pop_any(Nbsend)?;
                let msg = Message::decode(&arg)?;
                let amount = msg.amount.as_num().ok_or(MachineError::SendDecode)?;
                let ok = self.state.balance.spend(&msg.token, amount);
                if ok {
                    self.state.context.out_messages.push(msg);
                }
                self.push_bool(ok)?;
                Ok(Outcome::Advance)
            }
            Gettime => {
                let [lo, hi] = self.state.context.time_bounds;
                let tup = Tuple::new(vec![Value::Num(U256::from(lo)), Value::Num(U256::from(hi))])
                    .expect("arity 2 <= MAX_ARITY");
                self.push(Value::Tuple(tup))?;
                Ok(Outcome::Advance)
            }
            Inbox => {
                let top = self.pop_tuple(Inbox)?;
                if Value::Tuple(top.clone()) == self.state.inbox {
                    self.push(Value::Tuple(top))?;
                    self.informant.blocked(Inbox);
                    self.state.status = Status::Blocked;
                    return Ok(Outcome::Stay);
                }
                self.push(self.state.inbox.clone())?;
                Ok(Outcome::Advance)
            }
            Error => Err(MachineError::ExplicitError),
            Halt => {
                self.state.status = Status::Halted;
                self.informant.halted(self.state.pc);
                Ok(Outcome::Stay)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use avm_types::code::{link_code_points, Operation};
    use ethereum_types::U256;

    fn machine_with(ops: Vec<Operation>) -> Interpreter {
        let mut state = MachineState::empty();
        state.code = link_code_points(ops);
        Interpreter::new(state)
    }

    fn push_imm(n: u64) -> Operation {
        Operation::with_immediate(Opcode::Noop, Value::Num(U256::from(n)))
    }

    #[test]
    fn push_past_stack_limit_enters_error() {
        let mut interp = machine_with(vec![push_imm(0), push_imm(0), Operation::new(Opcode::Halt)]);
        interp.state.config.stack_limit = 1;
        interp.run(1, 0, 0); // first PUSH fits
        assert_eq!(interp.state.status, Status::Extensive);
        interp.run(1, 0, 0); // second PUSH exceeds the limit
        assert_eq!(interp.state.status, Status::Error);
    }

    #[test]
    fn add_program_halts_with_seven_on_top() {
        let mut interp = machine_with(vec![
            push_imm(3),
            push_imm(4),
            Operation::new(Opcode::Add),
            Operation::new(Opcode::Halt),
        ]);
        let assertion = interp.run(4, 0, 0);
        assert_eq!(assertion.num_steps, 4);
        assert_eq!(interp.state.status, Status::Halted);
        assert_eq!(interp.state.hash(), U256::zero());
    }

    #[test]
    fn div_by_zero_enters_error_then_jumps_to_handler() {
        // The handler must live at its own index in the *same* linked code
        // vector as the rest of the program: `errpc`'s `pc` field is an
        // index into `MachineState::code`, not a free-standing value.
        // index: 0=ERRSET 1=PUSH0 2=PUSH5 3=DIV 4=HALT(main) 5=HALT(handler)
        // `next_hash` of the last element is always zero, so a standalone
        // 6-long placeholder vector yields the identical CodePoint at
        // index 5 that the real program below will contain.
        let handler_cp = link_code_points(vec![
            Operation::new(Opcode::Noop),
            Operation::new(Opcode::Noop),
            Operation::new(Opcode::Noop),
            Operation::new(Opcode::Noop),
            Operation::new(Opcode::Noop),
            Operation::new(Opcode::Halt),
        ])[5]
            .clone();
        let mut interp = machine_with(vec![
            Operation::with_immediate(Opcode::Errset, Value::CodePoint(handler_cp)),
            push_imm(0),
            push_imm(5),
            Operation::new(Opcode::Div),
            Operation::new(Opcode::Halt),
            Operation::new(Opcode::Halt),
        ]);
        interp.run(1, 0, 0); // ERRSET
        interp.run(1, 0, 0); // PUSH 0
        interp.run(1, 0, 0); // PUSH 5
        interp.run(1, 0, 0); // DIV -> Error, immediately resumed at handler
        assert_eq!(interp.state.status, Status::Extensive);
        let assertion = interp.run(1, 0, 0); // handler's HALT
        assert_eq!(assertion.num_steps, 1);
        assert_eq!(interp.state.status, Status::Halted);
    }

    #[test]
    fn sdiv_min_int_by_minus_one_does_not_overflow() {
        let min_int = U256::one() << 255;
        let mut interp = machine_with(vec![
            Operation::with_immediate(Opcode::Noop, Value::Num(U256::MAX)),
            Operation::with_immediate(Opcode::Noop, Value::Num(min_int)),
            Operation::new(Opcode::Sdiv),
            Operation::new(Opcode::Halt),
        ]);
        interp.run(3, 0, 0);
        assert_eq!(interp.state.stack.values(), &[Value::Num(min_int)]);
    }

    #[test]
    fn inbox_blocks_on_unchanged_empty_inbox() {
        let mut interp = machine_with(vec![
            Operation::with_immediate(Opcode::Noop, Value::Tuple(Tuple::empty())),
            Operation::new(Opcode::Inbox),
            Operation::new(Opcode::Halt),
        ]);
        interp.run(1, 0, 0); // PUSH Tuple()
        let assertion = interp.run(1, 0, 0); // INBOX -> Blocked
        assert_eq!(assertion.num_steps, 0);
        assert_eq!(interp.state.status, Status::Blocked);

        interp.state.send_onchain_message(
            Message {
                token: Value::Num(U256::from(1)),
                amount: Value::Num(U256::from(1)),
            },
            U256::from(1),
        );
        interp.state.deliver_onchain_messages();
        let assertion = interp.run(1, 0, 0);
        assert_eq!(assertion.num_steps, 1);
        assert_eq!(interp.state.status, Status::Extensive);
    }

    #[test]
    fn tuple_round_trip() {
        let tup = Value::Tuple(
            Tuple::new(vec![
                Value::Num(U256::from(10)),
                Value::Num(U256::from(20)),
                Value::Num(U256::from(30)),
            ])
            .unwrap(),
        );
        let mut interp = machine_with(vec![
            Operation::with_immediate(Opcode::Noop, tup),
            Operation::new(Opcode::Tlen),
            Operation::new(Opcode::Halt),
        ]);
        interp.run(2, 0, 0);
        assert_eq!(interp.state.stack.values(), &[Value::Num(U256::from(3))]);
    }

    #[test]
    fn byte_reads_data_pushed_on_top_of_index() {
        // Stack order: idx pushed first (bottom), x pushed last (top) —
        // BYTE pops x before idx.
        let mut interp = machine_with(vec![
            push_imm(31),
            Operation::with_immediate(Opcode::Noop, Value::Num(U256::from(0x1234u64))),
            Operation::new(Opcode::Byte),
            Operation::new(Opcode::Halt),
        ]);
        interp.run(3, 0, 0);
        assert_eq!(interp.state.stack.values(), &[Value::Num(U256::from(0x34u64))]);
    }

    #[test]
    fn byte_out_of_range_index_yields_zero() {
        let mut interp = machine_with(vec![
            push_imm(32),
            Operation::with_immediate(Opcode::Noop, Value::Num(U256::from(0x1234u64))),
            Operation::new(Opcode::Byte),
            Operation::new(Opcode::Halt),
        ]);
        interp.run(3, 0, 0);
        assert_eq!(interp.state.stack.values(), &[Value::Num(U256::zero())]);
    }

    #[test]
    fn signextend_reads_data_pushed_on_top_of_position() {
        // 0xff at byte position 0 sign-extends to all-ones.
        let mut interp = machine_with(vec![
            push_imm(0),
            Operation::with_immediate(Opcode::Noop, Value::Num(U256::from(0xffu64))),
            Operation::new(Opcode::Signextend),
            Operation::new(Opcode::Halt),
        ]);
        interp.run(3, 0, 0);
        assert_eq!(interp.state.stack.values(), &[Value::Num(U256::MAX)]);
    }

    #[test]
    fn signextend_position_out_of_range_leaves_value_unchanged() {
        let mut interp = machine_with(vec![
            push_imm(32),
            Operation::with_immediate(Opcode::Noop, Value::Num(U256::from(0xffu64))),
            Operation::new(Opcode::Signextend),
            Operation::new(Opcode::Halt),
        ]);
        interp.run(3, 0, 0);
        assert_eq!(interp.state.stack.values(), &[Value::Num(U256::from(0xffu64))]);
    }
}
