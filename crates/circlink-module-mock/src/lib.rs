use std::ffi::{c_char, c_void, CStr};
use std::panic;
use std::ptr;
use std::slice;
use std::sync::atomic::{AtomicI64, Ordering};

use sha2::{Digest, Sha256};

use circlink_abi::{
    cl_buffer_result, cl_bytes, cl_compile_result_v2, cl_compile_result_v5, cl_handle_result,
    HintCallbackFn, ABI_REVISION_V2, ABI_REVISION_V5,
};

// Toy IR format: "CLIR" magic, num_inputs u32, num_public_inputs u32,
// num_hints u32, (hint_id u64, num_inputs u32, num_outputs u32) per hint,
// num_gates u32, (op u8, lhs u32, rhs u32) per gate. Little-endian, no
// padding, no trailing bytes.
const IR_MAGIC: &[u8; 4] = b"CLIR";
const LAYERED_MAGIC: &[u8; 4] = b"CLLC";
const PROOF_MAGIC: &[u8; 4] = b"CLPF";

static LIVE_OBJECTS: AtomicI64 = AtomicI64::new(0);

// Boundary objects allocated and not yet released. Test accounting only.
pub fn live_objects() -> i64 {
    LIVE_OBJECTS.load(Ordering::SeqCst)
}

fn element_size(config_id: u64) -> Result<usize, String> {
    match config_id {
        1 => Ok(8),
        2 => Ok(4),
        other => Err(format!("unknown config id: {other}")),
    }
}

#[derive(Clone, Debug)]
struct HintRequest {
    hint_id: u64,
    num_inputs: u32,
    num_outputs: u32,
}

#[derive(Clone, Debug)]
struct SolverProgram {
    // Canonical serialization; dump returns it verbatim.
    bytes: Vec<u8>,
    num_inputs: u32,
    num_public_inputs: u32,
    hints: Vec<HintRequest>,
}

struct FieldArrayObj {
    elem: usize,
    data: Vec<u8>,
}

struct WitnessObj {
    data: Vec<u8>,
}

enum Obj {
    FieldArray(FieldArrayObj),
    Solver(SolverProgram),
    Witness(WitnessObj),
}

fn box_obj(obj: Obj) -> *mut c_void {
    LIVE_OBJECTS.fetch_add(1, Ordering::SeqCst);
    Box::into_raw(Box::new(obj)) as *mut c_void
}

unsafe fn obj_ref<'a>(ptr: *mut c_void) -> &'a Obj {
    &*(ptr as *const Obj)
}

struct Reader<'a> {
    buf: &'a [u8],
    off: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Reader { buf, off: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], String> {
        let end = self
            .off
            .checked_add(n)
            .filter(|&e| e <= self.buf.len())
            .ok_or_else(|| "unexpected end of buffer".to_string())?;
        let out = &self.buf[self.off..end];
        self.off = end;
        Ok(out)
    }

    fn u32(&mut self) -> Result<u32, String> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u64(&mut self) -> Result<u64, String> {
        let b = self.take(8)?;
        Ok(u64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    fn done(&self) -> bool {
        self.off == self.buf.len()
    }
}

fn parse_program(bytes: &[u8]) -> Result<SolverProgram, String> {
    let mut r = Reader::new(bytes);
    let magic = r.take(4).map_err(|e| format!("failed to parse the source circuit: {e}"))?;
    if magic != IR_MAGIC {
        return Err("failed to parse the source circuit: bad magic".to_string());
    }
    let inner = (|| {
        let num_inputs = r.u32()?;
        let num_public_inputs = r.u32()?;
        let num_hints = r.u32()?;
        // num_hints is attacker-controlled here; do not preallocate from it.
        let mut hints = Vec::new();
        for _ in 0..num_hints {
            let hint_id = r.u64()?;
            let h_inputs = r.u32()?;
            let h_outputs = r.u32()?;
            if h_inputs > num_inputs {
                return Err(format!(
                    "hint {hint_id} wants {h_inputs} inputs, circuit has {num_inputs}"
                ));
            }
            if h_outputs == 0 {
                return Err(format!("hint {hint_id} declares zero outputs"));
            }
            hints.push(HintRequest {
                hint_id,
                num_inputs: h_inputs,
                num_outputs: h_outputs,
            });
        }
        let num_gates = r.u32()?;
        if num_gates == 0 {
            return Err("circuit has no gates".to_string());
        }
        for _ in 0..num_gates {
            r.take(1)?;
            r.u32()?;
            r.u32()?;
        }
        if !r.done() {
            return Err("buffer has extra data".to_string());
        }
        Ok(SolverProgram {
            bytes: bytes.to_vec(),
            num_inputs,
            num_public_inputs,
            hints,
        })
    })();
    inner.map_err(|e| format!("failed to parse the source circuit: {e}"))
}

fn layered_circuit(program: &SolverProgram) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + 8 + 32);
    out.extend_from_slice(LAYERED_MAGIC);
    out.extend_from_slice(&program.num_inputs.to_le_bytes());
    out.extend_from_slice(&program.num_public_inputs.to_le_bytes());
    out.extend_from_slice(&Sha256::digest(&program.bytes));
    out
}

// ---------------------------------------------------------------------------
// envelope helpers
// ---------------------------------------------------------------------------

fn malloc_bytes(data: &[u8]) -> cl_bytes {
    if data.is_empty() {
        return cl_bytes::empty();
    }
    unsafe {
        let p = libc::malloc(data.len()) as *mut u8;
        if p.is_null() {
            std::process::abort();
        }
        p.copy_from(data.as_ptr(), data.len());
        cl_bytes {
            ptr: p,
            len: data.len() as u64,
        }
    }
}

fn err_bytes(msg: &str) -> cl_bytes {
    malloc_bytes(msg.as_bytes())
}

fn handle_ok(handle: *mut c_void) -> cl_handle_result {
    cl_handle_result {
        handle,
        error: cl_bytes::empty(),
    }
}

fn handle_err(msg: &str) -> cl_handle_result {
    cl_handle_result {
        handle: ptr::null_mut(),
        error: err_bytes(msg),
    }
}

unsafe fn bytes_as_slice<'a>(b: cl_bytes) -> &'a [u8] {
    if b.is_empty() {
        &[]
    } else {
        slice::from_raw_parts(b.ptr, b.len as usize)
    }
}

fn handle_result(res: Result<*mut c_void, String>) -> cl_handle_result {
    match res {
        Ok(handle) => handle_ok(handle),
        Err(msg) => handle_err(&msg),
    }
}

fn buffer_result(res: Result<Vec<u8>, String>) -> cl_buffer_result {
    match res {
        Ok(data) => cl_buffer_result {
            data: malloc_bytes(&data),
            error: cl_bytes::empty(),
        },
        Err(msg) => cl_buffer_result {
            data: cl_bytes::empty(),
            error: err_bytes(&msg),
        },
    }
}

const PANIC_MSG: &str = "internal panic in module";

// ---------------------------------------------------------------------------
// entry points, revision 5 surface
// ---------------------------------------------------------------------------

#[no_mangle]
pub extern "C" fn abi_version() -> u64 {
    ABI_REVISION_V5
}

#[no_mangle]
pub extern "C" fn free_object(handle: *mut c_void) {
    if handle.is_null() {
        return;
    }
    drop(unsafe { Box::from_raw(handle as *mut Obj) });
    LIVE_OBJECTS.fetch_sub(1, Ordering::SeqCst);
}

fn compile_inner(ir_source: &[u8], config_id: u64) -> Result<(SolverProgram, Vec<u8>), String> {
    element_size(config_id)?;
    let program = parse_program(ir_source)?;
    let layered = layered_circuit(&program);
    Ok((program, layered))
}

#[no_mangle]
pub extern "C" fn compile(ir_source: cl_bytes, config_id: u64) -> cl_compile_result_v5 {
    panic::catch_unwind(|| {
        let ir = unsafe { bytes_as_slice(ir_source) };
        match compile_inner(ir, config_id) {
            Ok((program, layered)) => cl_compile_result_v5 {
                solver: box_obj(Obj::Solver(program)),
                layered: malloc_bytes(&layered),
                error: cl_bytes::empty(),
            },
            Err(msg) => cl_compile_result_v5 {
                solver: ptr::null_mut(),
                layered: cl_bytes::empty(),
                error: err_bytes(&msg),
            },
        }
    })
    .unwrap_or_else(|_| cl_compile_result_v5 {
        solver: ptr::null_mut(),
        layered: cl_bytes::empty(),
        error: err_bytes(PANIC_MSG),
    })
}

fn load_field_array_inner(
    data: &[u8],
    num_elements: u64,
    config_id: u64,
) -> Result<*mut c_void, String> {
    let elem = element_size(config_id)?;
    let want = num_elements as usize * elem;
    if data.len() != want {
        return Err(format!(
            "field array length mismatch: got {} bytes, want {want}",
            data.len()
        ));
    }
    Ok(box_obj(Obj::FieldArray(FieldArrayObj {
        elem,
        data: data.to_vec(),
    })))
}

#[no_mangle]
pub extern "C" fn load_field_array(
    data: cl_bytes,
    num_elements: u64,
    config_id: u64,
) -> cl_handle_result {
    panic::catch_unwind(|| {
        let data = unsafe { bytes_as_slice(data) };
        handle_result(load_field_array_inner(data, num_elements, config_id))
    })
    .unwrap_or_else(|_| handle_err(PANIC_MSG))
}

fn dump_field_array_inner(handle: *mut c_void, config_id: u64) -> Result<Vec<u8>, String> {
    element_size(config_id)?;
    match unsafe { obj_ref(handle) } {
        Obj::FieldArray(arr) => Ok(arr.data.clone()),
        _ => Err("object is not a field array".to_string()),
    }
}

#[no_mangle]
pub extern "C" fn dump_field_array(
    handle: *mut c_void,
    out_len: *mut u64,
    config_id: u64,
) -> cl_handle_result {
    panic::catch_unwind(|| match dump_field_array_inner(handle, config_id) {
        Ok(data) => {
            let buf = malloc_bytes(&data);
            if !out_len.is_null() {
                unsafe { out_len.write(buf.len) };
            }
            handle_ok(buf.ptr as *mut c_void)
        }
        Err(msg) => handle_err(&msg),
    })
    .unwrap_or_else(|_| handle_err(PANIC_MSG))
}

fn load_witness_solver_inner(data: &[u8], config_id: u64) -> Result<*mut c_void, String> {
    element_size(config_id)?;
    let program =
        parse_program(data).map_err(|e| format!("failed to load the witness solver: {e}"))?;
    Ok(box_obj(Obj::Solver(program)))
}

#[no_mangle]
pub extern "C" fn load_witness_solver(data: cl_bytes, config_id: u64) -> cl_handle_result {
    panic::catch_unwind(|| {
        let data = unsafe { bytes_as_slice(data) };
        handle_result(load_witness_solver_inner(data, config_id))
    })
    .unwrap_or_else(|_| handle_err(PANIC_MSG))
}

fn dump_witness_solver_inner(handle: *mut c_void, config_id: u64) -> Result<Vec<u8>, String> {
    element_size(config_id)?;
    match unsafe { obj_ref(handle) } {
        Obj::Solver(program) => Ok(program.bytes.clone()),
        _ => Err("object is not a witness solver".to_string()),
    }
}

#[no_mangle]
pub extern "C" fn dump_witness_solver(
    handle: *mut c_void,
    out_len: *mut u64,
    config_id: u64,
) -> cl_handle_result {
    panic::catch_unwind(|| match dump_witness_solver_inner(handle, config_id) {
        Ok(data) => {
            let buf = malloc_bytes(&data);
            if !out_len.is_null() {
                unsafe { out_len.write(buf.len) };
            }
            handle_ok(buf.ptr as *mut c_void)
        }
        Err(msg) => handle_err(&msg),
    })
    .unwrap_or_else(|_| handle_err(PANIC_MSG))
}

fn call_hint(
    callback: HintCallbackFn,
    request: &HintRequest,
    witness_inputs: &[u8],
    elem: usize,
    config_id: u64,
) -> Result<Vec<u8>, String> {
    let mut inputs = witness_inputs[..request.num_inputs as usize * elem].to_vec();
    let mut outputs = vec![0u8; request.num_outputs as usize * elem];
    let err = callback(
        request.hint_id,
        inputs.as_mut_ptr(),
        request.num_inputs as u64,
        outputs.as_mut_ptr(),
        request.num_outputs as u64,
        config_id,
    );
    if !err.is_null() {
        let msg = unsafe { CStr::from_ptr(err) }.to_string_lossy().into_owned();
        unsafe { libc::free(err as *mut c_void) };
        return Err(format!("hint resolution failed: {msg}"));
    }
    Ok(outputs)
}

fn solve_witnesses_inner(
    solver: *mut c_void,
    raw_inputs: *mut c_void,
    num_witnesses: u64,
    callback: HintCallbackFn,
    config_id: u64,
) -> Result<(WitnessObj, u32, u32), String> {
    let elem = element_size(config_id)?;
    let program = match unsafe { obj_ref(solver) } {
        Obj::Solver(program) => program,
        _ => return Err("object is not a witness solver".to_string()),
    };
    let inputs = match unsafe { obj_ref(raw_inputs) } {
        Obj::FieldArray(arr) => arr,
        _ => return Err("object is not a field array".to_string()),
    };
    if inputs.elem != elem {
        return Err("raw inputs were loaded under a different config id".to_string());
    }
    let per_witness = (program.num_inputs + program.num_public_inputs) as usize;
    let want = per_witness * num_witnesses as usize * elem;
    if inputs.data.len() != want {
        return Err("invalid number of raw inputs".to_string());
    }

    let mut values = Vec::new();
    for w in 0..num_witnesses as usize {
        let base = w * per_witness * elem;
        let witness_inputs = &inputs.data[base..base + program.num_inputs as usize * elem];
        let publics = &inputs.data
            [base + program.num_inputs as usize * elem..base + per_witness * elem];
        values.extend_from_slice(witness_inputs);
        values.extend_from_slice(publics);
        for request in &program.hints {
            let outputs = call_hint(callback, request, witness_inputs, elem, config_id)?;
            values.extend_from_slice(&outputs);
        }
    }
    Ok((
        WitnessObj { data: values },
        program.num_inputs,
        program.num_public_inputs,
    ))
}

#[no_mangle]
pub extern "C" fn solve_witnesses(
    solver: *mut c_void,
    raw_inputs: *mut c_void,
    num_witnesses: u64,
    callback: HintCallbackFn,
    config_id: u64,
    out_num_inputs_per_witness: *mut u64,
    out_num_public_inputs_per_witness: *mut u64,
) -> cl_handle_result {
    panic::catch_unwind(|| {
        match solve_witnesses_inner(solver, raw_inputs, num_witnesses, callback, config_id) {
            Ok((witness, num_inputs, num_public_inputs)) => {
                unsafe {
                    if !out_num_inputs_per_witness.is_null() {
                        out_num_inputs_per_witness.write(num_inputs as u64);
                    }
                    if !out_num_public_inputs_per_witness.is_null() {
                        out_num_public_inputs_per_witness.write(num_public_inputs as u64);
                    }
                }
                handle_ok(box_obj(Obj::Witness(witness)))
            }
            Err(msg) => handle_err(&msg),
        }
    })
    .unwrap_or_else(|_| handle_err(PANIC_MSG))
}

fn proof_for(circuit: &[u8], witness: &[u8], config_id: u64) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(circuit);
    hasher.update(witness);
    hasher.update(config_id.to_le_bytes());
    let mut out = Vec::with_capacity(4 + 32);
    out.extend_from_slice(PROOF_MAGIC);
    out.extend_from_slice(&hasher.finalize());
    out
}

fn read_circuit_file(filename: cl_bytes) -> Option<Vec<u8>> {
    let path = std::str::from_utf8(unsafe { bytes_as_slice(filename) }).ok()?;
    std::fs::read(path).ok()
}

#[no_mangle]
pub extern "C" fn prove_circuit_file(
    circuit_filename: cl_bytes,
    witness: cl_bytes,
    config_id: u64,
) -> cl_bytes {
    // Failure is signalled by an empty proof buffer; this call has no
    // separate error field.
    panic::catch_unwind(|| {
        if element_size(config_id).is_err() {
            return cl_bytes::empty();
        }
        let Some(circuit) = read_circuit_file(circuit_filename) else {
            return cl_bytes::empty();
        };
        let witness = unsafe { bytes_as_slice(witness) };
        malloc_bytes(&proof_for(&circuit, witness, config_id))
    })
    .unwrap_or_else(|_| cl_bytes::empty())
}

#[no_mangle]
pub extern "C" fn verify_circuit_file(
    circuit_filename: cl_bytes,
    witness: cl_bytes,
    proof: cl_bytes,
    config_id: u64,
) -> u8 {
    panic::catch_unwind(|| {
        if element_size(config_id).is_err() {
            return 0;
        }
        let Some(circuit) = read_circuit_file(circuit_filename) else {
            return 0;
        };
        let witness = unsafe { bytes_as_slice(witness) };
        let proof = unsafe { bytes_as_slice(proof) };
        u8::from(proof == proof_for(&circuit, witness, config_id).as_slice())
    })
    .unwrap_or(0)
}

// ---------------------------------------------------------------------------
// revision 2 envelope shapes
// ---------------------------------------------------------------------------

extern "C" fn abi_version_v2() -> u64 {
    ABI_REVISION_V2
}

extern "C" fn compile_v2(ir_source: cl_bytes, config_id: u64) -> cl_compile_result_v2 {
    panic::catch_unwind(|| {
        let ir = unsafe { bytes_as_slice(ir_source) };
        match compile_inner(ir, config_id) {
            Ok((program, layered)) => cl_compile_result_v2 {
                solver: malloc_bytes(&program.bytes),
                layered: malloc_bytes(&layered),
                error: cl_bytes::empty(),
            },
            Err(msg) => cl_compile_result_v2 {
                solver: cl_bytes::empty(),
                layered: cl_bytes::empty(),
                error: err_bytes(&msg),
            },
        }
    })
    .unwrap_or_else(|_| cl_compile_result_v2 {
        solver: cl_bytes::empty(),
        layered: cl_bytes::empty(),
        error: err_bytes(PANIC_MSG),
    })
}

extern "C" fn dump_field_array_v2(handle: *mut c_void, config_id: u64) -> cl_buffer_result {
    panic::catch_unwind(|| buffer_result(dump_field_array_inner(handle, config_id)))
        .unwrap_or_else(|_| buffer_result(Err(PANIC_MSG.to_string())))
}

extern "C" fn dump_witness_solver_v2(handle: *mut c_void, config_id: u64) -> cl_buffer_result {
    panic::catch_unwind(|| buffer_result(dump_witness_solver_inner(handle, config_id)))
        .unwrap_or_else(|_| buffer_result(Err(PANIC_MSG.to_string())))
}

// ---------------------------------------------------------------------------
// symbol tables for in-process resolution
// ---------------------------------------------------------------------------

// Canonical entry-point table for the revision-5 surface.
pub fn symbol_table() -> Vec<(&'static str, *const ())> {
    vec![
        ("abi_version", abi_version as *const ()),
        ("compile", compile as *const ()),
        ("prove_circuit_file", prove_circuit_file as *const ()),
        ("verify_circuit_file", verify_circuit_file as *const ()),
        ("free_object", free_object as *const ()),
        ("load_field_array", load_field_array as *const ()),
        ("dump_field_array", dump_field_array as *const ()),
        ("load_witness_solver", load_witness_solver as *const ()),
        ("dump_witness_solver", dump_witness_solver as *const ()),
        ("solve_witnesses", solve_witnesses as *const ()),
    ]
}

// The same module speaking the revision-2 envelope shapes.
pub fn symbol_table_v2() -> Vec<(&'static str, *const ())> {
    vec![
        ("abi_version", abi_version_v2 as *const ()),
        ("compile", compile_v2 as *const ()),
        ("prove_circuit_file", prove_circuit_file as *const ()),
        ("verify_circuit_file", verify_circuit_file as *const ()),
        ("free_object", free_object as *const ()),
        ("load_field_array", load_field_array as *const ()),
        ("dump_field_array", dump_field_array_v2 as *const ()),
        ("load_witness_solver", load_witness_solver as *const ()),
        ("dump_witness_solver", dump_witness_solver_v2 as *const ()),
        ("solve_witnesses", solve_witnesses as *const ()),
    ]
}

// Read back a witness vector's raw values. Test use only; the protocol
// itself treats the vector as opaque.
pub fn witness_values(handle: *mut c_void) -> Option<Vec<u8>> {
    if handle.is_null() {
        return None;
    }
    match unsafe { obj_ref(handle) } {
        Obj::Witness(w) => Some(w.data.clone()),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// IR construction helpers for tests
// ---------------------------------------------------------------------------

// hints is (hint_id, num_inputs, num_outputs) per hint request; one add gate
// is emitted so the circuit is well-formed.
pub fn build_ir(num_inputs: u32, num_public_inputs: u32, hints: &[(u64, u32, u32)]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(IR_MAGIC);
    out.extend_from_slice(&num_inputs.to_le_bytes());
    out.extend_from_slice(&num_public_inputs.to_le_bytes());
    out.extend_from_slice(&(hints.len() as u32).to_le_bytes());
    for (hint_id, h_in, h_out) in hints {
        out.extend_from_slice(&hint_id.to_le_bytes());
        out.extend_from_slice(&h_in.to_le_bytes());
        out.extend_from_slice(&h_out.to_le_bytes());
    }
    out.extend_from_slice(&1u32.to_le_bytes());
    out.push(0); // op: add
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&1u32.to_le_bytes());
    out
}
