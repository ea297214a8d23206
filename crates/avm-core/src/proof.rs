//! `marshalForProof`: the per-step witness consumed by an external verifier
//! (`spec.md` §4.H). Grounded on `original_source/datastack.cpp`'s
//! `marshalForProof`/`Machine::marshalForProof` pairing — the stack halves
//! come from `DataStack::solidity_proof_value`, the six leading words match
//! `MachineState::hash`'s layout.

use avm_types::opcode::{INSTRUCTION_AUX_STACK_POPS, INSTRUCTION_STACK_POPS};
use avm_types::value;

use crate::machine::MachineState;

/// Build the witness for the next step at `state.pc` (`spec.md` §4.H).
/// Does not mutate `state.pc`/`status`; only extends the (already lazy)
/// stack hash caches, which is why this takes `&mut MachineState`.
pub fn marshal_for_proof(state: &mut MachineState) -> Vec<u8> {
    let code_point = state.code[state.pc as usize].clone();
    let op = code_point
        .op()
        .cloned()
        .expect("pc points at an unset code point");

    let mut stack_signature = INSTRUCTION_STACK_POPS[&op.opcode].clone();
    let aux_signature = INSTRUCTION_AUX_STACK_POPS[&op.opcode].clone();
    if op.immediate.is_some() && !stack_signature.is_empty() {
        // The immediate is supplied by the code point's own hash chain, not
        // by the pre-step stack (spec.md §4.H step 2).
        stack_signature.remove(0);
    }

    let mut revealed_stack = Vec::new();
    let mut revealed_aux = Vec::new();
    let base_stack_hash = state
        .stack
        .solidity_proof_value(&stack_signature, &mut revealed_stack)
        .expect("pop signature length was derived from the opcode's own declared pop count");
    let base_aux_hash = state
        .auxstack
        .solidity_proof_value(&aux_signature, &mut revealed_aux)
        .expect("pop signature length was derived from the opcode's own declared pop count");

    let register_hash = state.register_val.hash();
    let static_hash = state.static_val.hash();
    let errpc_hash = state.errpc.hash();

    let mut buf = Vec::new();
    for word in [
        code_point.next_hash(),
        base_stack_hash,
        base_aux_hash,
        register_hash,
        static_hash,
        errpc_hash,
    ] {
        buf.extend_from_slice(&value::be256(word));
    }

    op.marshal(&mut buf);
    for v in &revealed_stack {
        value::marshal(v, &mut buf);
    }
    for v in &revealed_aux {
        value::marshal(v, &mut buf);
    }
    buf
}

/// Reconstruct `code[pc].hash()` from a witness's leading `nextHash` word
/// and the marshalled operation — the half of proof verification that
/// belongs beside the producer (`spec.md` §4.H, last paragraph).
pub fn code_point_hash_from_next(next_hash: ethereum_types::U256, op_hash: ethereum_types::U256) -> ethereum_types::U256 {
    let mut buf = Vec::with_capacity(1 + 32 + 32);
    buf.push(avm_types::TAG_CODEPT);
    buf.extend_from_slice(&value::be256(op_hash));
    buf.extend_from_slice(&value::be256(next_hash));
    value::u256_from_h256(keccak_hash::keccak(&buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use avm_types::code::{link_code_points, Operation};
    use avm_types::{Opcode, Value as V};
    use ethereum_types::U256;

    #[test]
    fn two_step_program_proof_has_no_revealed_values() {
        let ops = vec![
            Operation::with_immediate(Opcode::Noop, V::Num(U256::from(7))),
            Operation::new(Opcode::Halt),
        ];
        let mut state = MachineState::empty();
        state.code = link_code_points(ops);

        let witness = marshal_for_proof(&mut state);
        // 6 words * 32 bytes + 2-byte Operation header (hasImm=1, opcode) +
        // 33-byte Num immediate; zero revealed stack/aux values.
        assert_eq!(witness.len(), 6 * 32 + 2 + 33);
    }

    #[test]
    fn proof_base_hash_plus_revealed_reconstructs_pre_step_stack_hash() {
        let ops = vec![
            Operation::with_immediate(Opcode::Noop, V::Num(U256::from(10))),
            Operation::with_immediate(Opcode::Noop, V::Num(U256::from(20))),
            Operation::new(Opcode::Add),
            Operation::new(Opcode::Halt),
        ];
        let mut state = MachineState::empty();
        state.code = link_code_points(ops);
        state.pc = 2; // ADD, stack = [20, 10] (20 on top)
        state.stack.push(V::Num(U256::from(10)));
        state.stack.push(V::Num(U256::from(20)));
        let pre_hash = state.stack.hash();

        let mut revealed = Vec::new();
        let base = state
            .stack
            .solidity_proof_value(&[true, true], &mut revealed)
            .unwrap();
        let mut h = base;
        for v in revealed.iter().rev() {
            h = crate::stack::cons_hash(v.hash(), h);
        }
        assert_eq!(h, pre_hash);
    }
}
