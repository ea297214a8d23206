//! Step tracing. The teacher wires an `EvmInformant` into its interpreter
//! loop (`crates/vm/evm/src/interpreter/mod.rs`: `mod informant;`,
//! `self.informant.done()`); this is the same idea scaled down to what
//! `spec.md` §9 calls out as debug-only and not part of the contract —
//! `log::trace!`/`log::debug!` calls that never influence `MachineState`.

use avm_types::{CodePoint, Opcode};

pub struct Informant;

impl Informant {
    pub fn new() -> Informant {
        Informant
    }

    pub fn before_step(&self, pc: u64, code_point: &CodePoint) {
        let name = code_point.op().map(|op| op.opcode.name()).unwrap_or("?");
        log::trace!("step pc={pc} op={name}");
    }

    pub fn blocked(&self, opcode: Opcode) {
        log::debug!("blocked on {opcode_name}", opcode_name = opcode.name());
    }

    pub fn errored(&self, pc: u64) {
        log::debug!("entered error state at pc={pc}");
    }

    pub fn halted(&self, pc: u64) {
        log::debug!("halted at pc={pc}");
    }
}

impl Default for Informant {
    fn default() -> Informant {
        Informant::new()
    }
}
