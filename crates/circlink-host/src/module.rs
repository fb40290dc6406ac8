use std::collections::HashMap;
use std::ffi::c_void;
use std::mem;
use std::path::Path;
use std::sync::Arc;

use circlink_abi::{
    AbiVersionFn, FreeObjectFn, ABI_REVISION_V2, ABI_REVISION_V5, SUPPORTED_REVISIONS,
    SYM_ABI_VERSION, SYM_FREE_OBJECT,
};

use crate::dispatch::{Dispatch, DispatchV2, DispatchV5};
use crate::error::BridgeError;
use crate::handle::{FieldArray, Handle, WitnessSolver, WitnessVector};
use crate::hints::HintDispatcher;

pub type RawFn = *const ();

pub trait SymbolSource: Send + Sync {
    fn resolve(&self, name: &str) -> Result<RawFn, BridgeError>;
}

pub struct DynamicModule {
    lib: libloading::Library,
}

impl DynamicModule {
    pub fn open(path: &Path) -> Result<Self, BridgeError> {
        let lib = unsafe { libloading::Library::new(path) }.map_err(|e| {
            BridgeError::LoadFailed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            }
        })?;
        Ok(DynamicModule { lib })
    }
}

impl SymbolSource for DynamicModule {
    fn resolve(&self, name: &str) -> Result<RawFn, BridgeError> {
        let mut symbol = name.as_bytes().to_vec();
        symbol.push(0);
        let f = unsafe { self.lib.get::<unsafe extern "C" fn()>(&symbol) }.map_err(|_| {
            BridgeError::MissingSymbol {
                name: name.to_string(),
            }
        })?;
        Ok(*f as RawFn)
    }
}

// Name to address table for entry points linked into the host process
// itself. Used by the test suite against the mock module.
#[derive(Default)]
pub struct StaticSymbolTable {
    symbols: HashMap<String, RawFn>,
}

// Entry-point addresses are immutable code pointers.
unsafe impl Send for StaticSymbolTable {}
unsafe impl Sync for StaticSymbolTable {}

impl StaticSymbolTable {
    pub fn from_pairs(pairs: &[(&str, RawFn)]) -> Self {
        let mut table = StaticSymbolTable::default();
        for (name, f) in pairs {
            table.insert(name, *f);
        }
        table
    }

    pub fn insert(&mut self, name: &str, f: RawFn) {
        self.symbols.insert(name.to_string(), f);
    }

    pub fn remove(&mut self, name: &str) {
        self.symbols.remove(name);
    }
}

impl SymbolSource for StaticSymbolTable {
    fn resolve(&self, name: &str) -> Result<RawFn, BridgeError> {
        self.symbols
            .get(name)
            .copied()
            .ok_or_else(|| BridgeError::MissingSymbol {
                name: name.to_string(),
            })
    }
}

pub(crate) struct ModuleShared {
    pub(crate) dispatch: Dispatch,
    pub(crate) free_object: FreeObjectFn,
    revision: u64,
    // Keeps the symbol source (and any library behind it) alive for as long
    // as the dispatch table's function pointers can be called.
    _source: Box<dyn SymbolSource>,
}

pub struct NativeModule {
    shared: Arc<ModuleShared>,
}

pub struct CompiledCircuit {
    pub solver: WitnessSolver,
    pub layered: Vec<u8>,
}

pub struct SolvedWitnesses {
    pub witnesses: WitnessVector,
    pub num_inputs_per_witness: u64,
    pub num_public_inputs_per_witness: u64,
}

impl NativeModule {
    pub fn load(path: &Path) -> Result<Self, BridgeError> {
        Self::from_source(DynamicModule::open(path)?)
    }

    // abi_version is resolved and called before anything else; an
    // unsupported revision aborts the load before any other entry point is
    // touched.
    pub fn from_source<S: SymbolSource + 'static>(source: S) -> Result<Self, BridgeError> {
        let abi_version: AbiVersionFn =
            unsafe { mem::transmute::<RawFn, AbiVersionFn>(source.resolve(SYM_ABI_VERSION)?) };
        let revision = abi_version();
        if !SUPPORTED_REVISIONS.contains(&revision) {
            return Err(BridgeError::RevisionMismatch { found: revision });
        }
        let dispatch = match revision {
            ABI_REVISION_V2 => Dispatch::V2(DispatchV2::resolve(&source)?),
            ABI_REVISION_V5 => Dispatch::V5(DispatchV5::resolve(&source)?),
            _ => unreachable!("revision gated above"),
        };
        let free_object: FreeObjectFn =
            unsafe { mem::transmute::<RawFn, FreeObjectFn>(source.resolve(SYM_FREE_OBJECT)?) };
        Ok(NativeModule {
            shared: Arc::new(ModuleShared {
                dispatch,
                free_object,
                revision,
                _source: Box::new(source),
            }),
        })
    }

    pub fn revision(&self) -> u64 {
        self.shared.revision
    }

    fn own(&self, raw: *mut c_void) -> Handle {
        Handle::new(raw, Arc::clone(&self.shared))
    }

    pub fn compile(&self, ir_source: &[u8], config_id: u64) -> Result<CompiledCircuit, BridgeError> {
        let (solver_raw, layered) = match &self.shared.dispatch {
            Dispatch::V5(d) => d.compile(ir_source, config_id)?,
            Dispatch::V2(d) => {
                // Revision 2 returns the solver serialized; reload it so
                // callers see one shape.
                let (solver_bytes, layered) = d.compile(ir_source, config_id)?;
                let raw = self
                    .shared
                    .dispatch
                    .load_witness_solver(&solver_bytes, config_id)?;
                (raw, layered)
            }
        };
        Ok(CompiledCircuit {
            solver: WitnessSolver(self.own(solver_raw)),
            layered,
        })
    }

    pub fn prove_circuit_file(
        &self,
        circuit_filename: &[u8],
        witness: &[u8],
        config_id: u64,
    ) -> Result<Vec<u8>, BridgeError> {
        self.shared
            .dispatch
            .prove_circuit_file(circuit_filename, witness, config_id)
    }

    pub fn verify_circuit_file(
        &self,
        circuit_filename: &[u8],
        witness: &[u8],
        proof: &[u8],
        config_id: u64,
    ) -> Result<bool, BridgeError> {
        self.shared
            .dispatch
            .verify_circuit_file(circuit_filename, witness, proof, config_id)
    }

    pub fn load_field_array(
        &self,
        data: &[u8],
        num_elements: u64,
        config_id: u64,
    ) -> Result<FieldArray, BridgeError> {
        let raw = self
            .shared
            .dispatch
            .load_field_array(data, num_elements, config_id)?;
        Ok(FieldArray(self.own(raw)))
    }

    pub fn dump_field_array(
        &self,
        array: &FieldArray,
        config_id: u64,
    ) -> Result<Vec<u8>, BridgeError> {
        self.shared.dispatch.dump_field_array(array.raw(), config_id)
    }

    pub fn load_witness_solver(
        &self,
        data: &[u8],
        config_id: u64,
    ) -> Result<WitnessSolver, BridgeError> {
        let raw = self.shared.dispatch.load_witness_solver(data, config_id)?;
        Ok(WitnessSolver(self.own(raw)))
    }

    pub fn dump_witness_solver(
        &self,
        solver: &WitnessSolver,
        config_id: u64,
    ) -> Result<Vec<u8>, BridgeError> {
        self.shared
            .dispatch
            .dump_witness_solver(solver.raw(), config_id)
    }

    // The module may re-enter the host through the dispatcher's handler any
    // number of times before this returns; a handler failure surfaces as the
    // call's own error.
    pub fn solve_witnesses(
        &self,
        solver: &WitnessSolver,
        raw_inputs: &FieldArray,
        num_witnesses: u64,
        dispatcher: &HintDispatcher,
        config_id: u64,
    ) -> Result<SolvedWitnesses, BridgeError> {
        if dispatcher.config_id() != config_id {
            return Err(BridgeError::ConfigIdMismatch {
                dispatcher: dispatcher.config_id(),
                call: config_id,
            });
        }
        let (raw, num_inputs_per_witness, num_public_inputs_per_witness) =
            self.shared.dispatch.solve_witnesses(
                solver.raw(),
                raw_inputs.raw(),
                num_witnesses,
                config_id,
            )?;
        Ok(SolvedWitnesses {
            witnesses: WitnessVector(self.own(raw)),
            num_inputs_per_witness,
            num_public_inputs_per_witness,
        })
    }
}
