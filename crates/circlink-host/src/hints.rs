use std::collections::HashMap;
use std::ffi::c_char;
use std::panic;
use std::ptr;
use std::slice;
use std::sync::{Arc, Mutex, MutexGuard};

use once_cell::sync::OnceCell;

use crate::error::BridgeError;

pub trait HintHandler: Send + Sync {
    // Serialized width of one field element; callback lengths count
    // elements, the wire carries no width metadata.
    fn element_size(&self) -> usize;

    // A returned message aborts the enclosing solve with that text.
    fn resolve_hint(
        &self,
        hint_id: u64,
        inputs: &[u8],
        outputs: &mut [u8],
        num_outputs: u64,
    ) -> Result<(), String>;
}

// config_id is the only session state the callback carries, so handlers live
// in a process-wide map keyed by it.
static REGISTRY: OnceCell<Mutex<HashMap<u64, Arc<dyn HintHandler>>>> = OnceCell::new();

fn handlers() -> MutexGuard<'static, HashMap<u64, Arc<dyn HintHandler>>> {
    REGISTRY
        .get_or_init(|| Mutex::new(HashMap::new()))
        .lock()
        .unwrap_or_else(|e| e.into_inner())
}

// Ties a handler to a config_id for the duration of one solve; deregisters
// on drop, including error paths.
pub struct HintDispatcher {
    config_id: u64,
}

impl HintDispatcher {
    pub fn register(
        config_id: u64,
        handler: Arc<dyn HintHandler>,
    ) -> Result<Self, BridgeError> {
        let mut map = handlers();
        if map.contains_key(&config_id) {
            return Err(BridgeError::ConfigIdBusy(config_id));
        }
        map.insert(config_id, handler);
        Ok(HintDispatcher { config_id })
    }

    pub fn config_id(&self) -> u64 {
        self.config_id
    }
}

impl Drop for HintDispatcher {
    fn drop(&mut self) {
        handlers().remove(&self.config_id);
    }
}

fn malloc_error(msg: &str) -> *mut c_char {
    let bytes = msg.as_bytes();
    unsafe {
        let p = libc::malloc(bytes.len() + 1) as *mut u8;
        if p.is_null() {
            // Returning null here would report success; there is no other
            // failure channel.
            std::process::abort();
        }
        p.copy_from(bytes.as_ptr(), bytes.len());
        *p.add(bytes.len()) = 0;
        p as *mut c_char
    }
}

unsafe fn elems<'a>(ptr: *mut u8, count: u64, elem: usize) -> &'a [u8] {
    let bytes = count as usize * elem;
    if ptr.is_null() || bytes == 0 {
        &[]
    } else {
        slice::from_raw_parts(ptr, bytes)
    }
}

unsafe fn elems_mut<'a>(ptr: *mut u8, count: u64, elem: usize) -> &'a mut [u8] {
    let bytes = count as usize * elem;
    if ptr.is_null() || bytes == 0 {
        &mut []
    } else {
        slice::from_raw_parts_mut(ptr, bytes)
    }
}

// Panics must not unwind across the boundary; they and unknown config ids
// become malloc'd error strings the module frees with the C allocator.
pub(crate) extern "C" fn hint_trampoline(
    hint_id: u64,
    inputs: *mut u8,
    inputs_len: u64,
    outputs: *mut u8,
    outputs_len: u64,
    config_id: u64,
) -> *mut c_char {
    let outcome = panic::catch_unwind(|| {
        let handler = handlers().get(&config_id).cloned();
        let Some(handler) = handler else {
            return Some(format!("no hint handler registered for config id {config_id}"));
        };
        let elem = handler.element_size();
        let in_slice = unsafe { elems(inputs, inputs_len, elem) };
        let out_slice = unsafe { elems_mut(outputs, outputs_len, elem) };
        match handler.resolve_hint(hint_id, in_slice, out_slice, outputs_len) {
            Ok(()) => None,
            Err(msg) => Some(msg),
        }
    });
    match outcome {
        Ok(None) => ptr::null_mut(),
        Ok(Some(msg)) => malloc_error(&msg),
        Err(_) => malloc_error("hint handler panicked"),
    }
}
