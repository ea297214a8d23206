//! Value model for the AVM: the recursive sum type, its structural hash,
//! code points, and the opcode table shared between the interpreter and the
//! proof marshaller.

pub mod code;
pub mod config;
pub mod error;
pub mod opcode;
pub mod tuple;
pub mod value;

pub use code::{CodePoint, Operation};
pub use config::AvmConfig;
pub use error::MachineError;
pub use opcode::Opcode;
pub use tuple::Tuple;
pub use value::{Value, HASH_ONLY, TAG_CODEPT, TAG_NUM, TAG_TUPLE};
