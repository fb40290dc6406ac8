mod buffer;
mod dispatch;
mod error;
mod handle;
mod hints;
mod module;

pub use error::BridgeError;
pub use handle::{FieldArray, WitnessSolver, WitnessVector};
pub use hints::{HintDispatcher, HintHandler};
pub use module::{
    CompiledCircuit, DynamicModule, NativeModule, RawFn, SolvedWitnesses, StaticSymbolTable,
    SymbolSource,
};
