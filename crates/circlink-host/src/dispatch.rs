use std::ffi::c_void;
use std::mem;

use circlink_abi::{
    cl_bytes, CompileV2Fn, CompileV5Fn, DumpV2Fn, DumpV5Fn, LoadFieldArrayFn,
    LoadWitnessSolverFn, ProveCircuitFileFn, SolveWitnessesFn, VerifyCircuitFileFn,
    SYM_COMPILE, SYM_DUMP_FIELD_ARRAY, SYM_DUMP_WITNESS_SOLVER, SYM_LOAD_FIELD_ARRAY,
    SYM_LOAD_WITNESS_SOLVER, SYM_PROVE_CIRCUIT_FILE, SYM_SOLVE_WITNESSES,
    SYM_VERIFY_CIRCUIT_FILE,
};

use crate::buffer::{take_error, NativeBuf};
use crate::error::BridgeError;
use crate::hints::hint_trampoline;
use crate::module::SymbolSource;

macro_rules! resolve_fn {
    ($source:expr, $name:expr, $ty:ty) => {
        unsafe { mem::transmute::<*const (), $ty>($source.resolve($name)?) }
    };
}

// One table of typed fn pointers per supported protocol revision, resolved
// once at load. Everything above this layer is revision-agnostic.
pub(crate) enum Dispatch {
    V2(DispatchV2),
    V5(DispatchV5),
}

pub(crate) struct DispatchV2 {
    compile: CompileV2Fn,
    prove: ProveCircuitFileFn,
    verify: VerifyCircuitFileFn,
    load_field_array: LoadFieldArrayFn,
    dump_field_array: DumpV2Fn,
    load_witness_solver: LoadWitnessSolverFn,
    dump_witness_solver: DumpV2Fn,
    solve_witnesses: SolveWitnessesFn,
}

pub(crate) struct DispatchV5 {
    compile: CompileV5Fn,
    prove: ProveCircuitFileFn,
    verify: VerifyCircuitFileFn,
    load_field_array: LoadFieldArrayFn,
    dump_field_array: DumpV5Fn,
    load_witness_solver: LoadWitnessSolverFn,
    dump_witness_solver: DumpV5Fn,
    solve_witnesses: SolveWitnessesFn,
}

impl DispatchV2 {
    pub(crate) fn resolve(source: &dyn SymbolSource) -> Result<Self, BridgeError> {
        Ok(DispatchV2 {
            compile: resolve_fn!(source, SYM_COMPILE, CompileV2Fn),
            prove: resolve_fn!(source, SYM_PROVE_CIRCUIT_FILE, ProveCircuitFileFn),
            verify: resolve_fn!(source, SYM_VERIFY_CIRCUIT_FILE, VerifyCircuitFileFn),
            load_field_array: resolve_fn!(source, SYM_LOAD_FIELD_ARRAY, LoadFieldArrayFn),
            dump_field_array: resolve_fn!(source, SYM_DUMP_FIELD_ARRAY, DumpV2Fn),
            load_witness_solver: resolve_fn!(source, SYM_LOAD_WITNESS_SOLVER, LoadWitnessSolverFn),
            dump_witness_solver: resolve_fn!(source, SYM_DUMP_WITNESS_SOLVER, DumpV2Fn),
            solve_witnesses: resolve_fn!(source, SYM_SOLVE_WITNESSES, SolveWitnessesFn),
        })
    }

    // Revision 2 returns the solver serialized rather than as a handle.
    pub(crate) fn compile(
        &self,
        ir_source: &[u8],
        config_id: u64,
    ) -> Result<(Vec<u8>, Vec<u8>), BridgeError> {
        let res = (self.compile)(cl_bytes::borrowed(ir_source), config_id);
        if let Some(msg) = unsafe { take_error(res.error) } {
            return Err(BridgeError::Call(msg));
        }
        let solver = unsafe { NativeBuf::adopt(res.solver) }.to_vec();
        let layered = unsafe { NativeBuf::adopt(res.layered) }.to_vec();
        Ok((solver, layered))
    }

    fn dump(f: DumpV2Fn, handle: *mut c_void, config_id: u64) -> Result<Vec<u8>, BridgeError> {
        let res = f(handle, config_id);
        if let Some(msg) = unsafe { take_error(res.error) } {
            return Err(BridgeError::Call(msg));
        }
        Ok(unsafe { NativeBuf::adopt(res.data) }.to_vec())
    }
}

impl DispatchV5 {
    pub(crate) fn resolve(source: &dyn SymbolSource) -> Result<Self, BridgeError> {
        Ok(DispatchV5 {
            compile: resolve_fn!(source, SYM_COMPILE, CompileV5Fn),
            prove: resolve_fn!(source, SYM_PROVE_CIRCUIT_FILE, ProveCircuitFileFn),
            verify: resolve_fn!(source, SYM_VERIFY_CIRCUIT_FILE, VerifyCircuitFileFn),
            load_field_array: resolve_fn!(source, SYM_LOAD_FIELD_ARRAY, LoadFieldArrayFn),
            dump_field_array: resolve_fn!(source, SYM_DUMP_FIELD_ARRAY, DumpV5Fn),
            load_witness_solver: resolve_fn!(source, SYM_LOAD_WITNESS_SOLVER, LoadWitnessSolverFn),
            dump_witness_solver: resolve_fn!(source, SYM_DUMP_WITNESS_SOLVER, DumpV5Fn),
            solve_witnesses: resolve_fn!(source, SYM_SOLVE_WITNESSES, SolveWitnessesFn),
        })
    }

    pub(crate) fn compile(
        &self,
        ir_source: &[u8],
        config_id: u64,
    ) -> Result<(*mut c_void, Vec<u8>), BridgeError> {
        let res = (self.compile)(cl_bytes::borrowed(ir_source), config_id);
        if let Some(msg) = unsafe { take_error(res.error) } {
            return Err(BridgeError::Call(msg));
        }
        let layered = unsafe { NativeBuf::adopt(res.layered) }.to_vec();
        Ok((res.solver, layered))
    }

    // Revision 5 reports the allocation's size through the out-parameter.
    fn dump(f: DumpV5Fn, handle: *mut c_void, config_id: u64) -> Result<Vec<u8>, BridgeError> {
        let mut len: u64 = 0;
        let res = f(handle, &mut len, config_id);
        if let Some(msg) = unsafe { take_error(res.error) } {
            return Err(BridgeError::Call(msg));
        }
        let data = unsafe {
            NativeBuf::adopt(cl_bytes {
                ptr: res.handle as *mut u8,
                len,
            })
        };
        Ok(data.to_vec())
    }
}

impl Dispatch {
    pub(crate) fn prove_circuit_file(
        &self,
        circuit_filename: &[u8],
        witness: &[u8],
        config_id: u64,
    ) -> Result<Vec<u8>, BridgeError> {
        let f = match self {
            Dispatch::V2(d) => d.prove,
            Dispatch::V5(d) => d.prove,
        };
        let proof = f(
            cl_bytes::borrowed(circuit_filename),
            cl_bytes::borrowed(witness),
            config_id,
        );
        let proof = unsafe { NativeBuf::adopt(proof) }.to_vec();
        if proof.is_empty() {
            // Empty output is the call's failure sentinel; there is no
            // separate error field.
            return Err(BridgeError::Call(
                "prove_circuit_file produced no proof".to_string(),
            ));
        }
        Ok(proof)
    }

    pub(crate) fn verify_circuit_file(
        &self,
        circuit_filename: &[u8],
        witness: &[u8],
        proof: &[u8],
        config_id: u64,
    ) -> Result<bool, BridgeError> {
        let f = match self {
            Dispatch::V2(d) => d.verify,
            Dispatch::V5(d) => d.verify,
        };
        Ok(f(
            cl_bytes::borrowed(circuit_filename),
            cl_bytes::borrowed(witness),
            cl_bytes::borrowed(proof),
            config_id,
        ) != 0)
    }

    pub(crate) fn load_field_array(
        &self,
        data: &[u8],
        num_elements: u64,
        config_id: u64,
    ) -> Result<*mut c_void, BridgeError> {
        let f = match self {
            Dispatch::V2(d) => d.load_field_array,
            Dispatch::V5(d) => d.load_field_array,
        };
        let res = f(cl_bytes::borrowed(data), num_elements, config_id);
        if let Some(msg) = unsafe { take_error(res.error) } {
            return Err(BridgeError::Call(msg));
        }
        Ok(res.handle)
    }

    pub(crate) fn dump_field_array(
        &self,
        handle: *mut c_void,
        config_id: u64,
    ) -> Result<Vec<u8>, BridgeError> {
        match self {
            Dispatch::V2(d) => DispatchV2::dump(d.dump_field_array, handle, config_id),
            Dispatch::V5(d) => DispatchV5::dump(d.dump_field_array, handle, config_id),
        }
    }

    pub(crate) fn load_witness_solver(
        &self,
        data: &[u8],
        config_id: u64,
    ) -> Result<*mut c_void, BridgeError> {
        let f = match self {
            Dispatch::V2(d) => d.load_witness_solver,
            Dispatch::V5(d) => d.load_witness_solver,
        };
        let res = f(cl_bytes::borrowed(data), config_id);
        if let Some(msg) = unsafe { take_error(res.error) } {
            return Err(BridgeError::Call(msg));
        }
        Ok(res.handle)
    }

    pub(crate) fn dump_witness_solver(
        &self,
        handle: *mut c_void,
        config_id: u64,
    ) -> Result<Vec<u8>, BridgeError> {
        match self {
            Dispatch::V2(d) => DispatchV2::dump(d.dump_witness_solver, handle, config_id),
            Dispatch::V5(d) => DispatchV5::dump(d.dump_witness_solver, handle, config_id),
        }
    }

    pub(crate) fn solve_witnesses(
        &self,
        solver: *mut c_void,
        raw_inputs: *mut c_void,
        num_witnesses: u64,
        config_id: u64,
    ) -> Result<(*mut c_void, u64, u64), BridgeError> {
        let f = match self {
            Dispatch::V2(d) => d.solve_witnesses,
            Dispatch::V5(d) => d.solve_witnesses,
        };
        let mut num_inputs_per_witness: u64 = 0;
        let mut num_public_inputs_per_witness: u64 = 0;
        let res = f(
            solver,
            raw_inputs,
            num_witnesses,
            hint_trampoline,
            config_id,
            &mut num_inputs_per_witness,
            &mut num_public_inputs_per_witness,
        );
        if let Some(msg) = unsafe { take_error(res.error) } {
            return Err(BridgeError::Call(msg));
        }
        Ok((
            res.handle,
            num_inputs_per_witness,
            num_public_inputs_per_witness,
        ))
    }
}
