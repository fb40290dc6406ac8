#![allow(non_camel_case_types)]

use std::ffi::{c_char, c_void};
use std::ptr;

pub const ABI_REVISION_V2: u64 = 2;
pub const ABI_REVISION_V5: u64 = 5;

pub const SUPPORTED_REVISIONS: &[u64] = &[ABI_REVISION_V5, ABI_REVISION_V2];

pub const SYM_ABI_VERSION: &str = "abi_version";
pub const SYM_COMPILE: &str = "compile";
pub const SYM_PROVE_CIRCUIT_FILE: &str = "prove_circuit_file";
pub const SYM_VERIFY_CIRCUIT_FILE: &str = "verify_circuit_file";
pub const SYM_FREE_OBJECT: &str = "free_object";
pub const SYM_LOAD_FIELD_ARRAY: &str = "load_field_array";
pub const SYM_DUMP_FIELD_ARRAY: &str = "dump_field_array";
pub const SYM_LOAD_WITNESS_SOLVER: &str = "load_witness_solver";
pub const SYM_DUMP_WITNESS_SOLVER: &str = "dump_witness_solver";
pub const SYM_SOLVE_WITNESSES: &str = "solve_witnesses";

// Flat byte buffer, never NUL-terminated. Buffers passed into an entry point
// are borrowed for the call; buffers returned from one are malloc
// allocations the receiver must free exactly once.
#[repr(C)]
#[derive(Copy, Clone)]
pub struct cl_bytes {
    pub ptr: *mut u8,
    pub len: u64,
}

impl cl_bytes {
    pub fn empty() -> Self {
        cl_bytes {
            ptr: ptr::null_mut(),
            len: 0,
        }
    }

    // The slice must stay valid and unmoved until the call returns.
    pub fn borrowed(data: &[u8]) -> Self {
        cl_bytes {
            ptr: data.as_ptr() as *mut u8,
            len: data.len() as u64,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0 || self.ptr.is_null()
    }
}

// Every envelope: empty error buffer means success. On failure no other
// field may be read or freed.
#[repr(C)]
pub struct cl_handle_result {
    pub handle: *mut c_void,
    pub error: cl_bytes,
}

#[repr(C)]
pub struct cl_buffer_result {
    pub data: cl_bytes,
    pub error: cl_bytes,
}

#[repr(C)]
pub struct cl_compile_result_v2 {
    pub solver: cl_bytes,
    pub layered: cl_bytes,
    pub error: cl_bytes,
}

#[repr(C)]
pub struct cl_compile_result_v5 {
    pub solver: *mut c_void,
    pub layered: cl_bytes,
    pub error: cl_bytes,
}

// (hint_id, inputs, inputs_len, outputs, outputs_len, config_id). Lengths
// count field elements; the element width is implied by config_id. Null
// return is success; non-null is a malloc'd NUL-terminated message the
// native side frees with the C allocator.
pub type HintCallbackFn = extern "C" fn(u64, *mut u8, u64, *mut u8, u64, u64) -> *mut c_char;

pub type AbiVersionFn = extern "C" fn() -> u64;

pub type FreeObjectFn = extern "C" fn(*mut c_void);

pub type CompileV2Fn = extern "C" fn(cl_bytes, u64) -> cl_compile_result_v2;
pub type CompileV5Fn = extern "C" fn(cl_bytes, u64) -> cl_compile_result_v5;

// An empty proof buffer is the failure sentinel; this call has no error
// field.
pub type ProveCircuitFileFn = extern "C" fn(cl_bytes, cl_bytes, u64) -> cl_bytes;

pub type VerifyCircuitFileFn = extern "C" fn(cl_bytes, cl_bytes, cl_bytes, u64) -> u8;

pub type LoadFieldArrayFn = extern "C" fn(cl_bytes, u64, u64) -> cl_handle_result;

pub type LoadWitnessSolverFn = extern "C" fn(cl_bytes, u64) -> cl_handle_result;

pub type DumpV2Fn = extern "C" fn(*mut c_void, u64) -> cl_buffer_result;

// (handle, out_len, config_id). On success the envelope's handle field is a
// malloc allocation of *out_len bytes.
pub type DumpV5Fn = extern "C" fn(*mut c_void, *mut u64, u64) -> cl_handle_result;

// (solver, raw_inputs, num_witnesses, hint_callback, config_id,
// out_num_inputs_per_witness, out_num_public_inputs_per_witness). May
// re-enter the host through hint_callback on the calling stack, always
// tagged with config_id.
pub type SolveWitnessesFn = extern "C" fn(
    *mut c_void,
    *mut c_void,
    u64,
    HintCallbackFn,
    u64,
    *mut u64,
    *mut u64,
) -> cl_handle_result;
