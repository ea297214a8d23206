//! The AVM engine: the data stack, machine state, opcode dispatch, the
//! bytecode loader, proof marshalling, and the message/balance plumbing
//! that sits at the `run` boundary (`spec.md` §2).

pub mod informant;
pub mod interpreter;
pub mod loader;
pub mod machine;
pub mod message;
pub mod proof;
pub mod stack;

pub use interpreter::Interpreter;
pub use loader::{load, LoadError, CURRENT_AO_VERSION};
pub use machine::{Assertion, Context, MachineState, Status};
pub use message::{Message, TokenTracker};
pub use proof::marshal_for_proof;
pub use stack::DataStack;
