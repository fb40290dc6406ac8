use std::ffi::c_void;
use std::sync::Arc;

use crate::module::ModuleShared;

// Owns exactly one native object; Drop is the one free_object call. The raw
// address is never exposed by value, so double-release and use-after-release
// cannot be written against this API. The Arc keeps the library mapped for
// as long as any object it allocated lives.
pub(crate) struct Handle {
    raw: *mut c_void,
    module: Arc<ModuleShared>,
}

// The native side hands out heap objects with no thread affinity.
unsafe impl Send for Handle {}
unsafe impl Sync for Handle {}

impl Handle {
    pub(crate) fn new(raw: *mut c_void, module: Arc<ModuleShared>) -> Self {
        Handle { raw, module }
    }

    pub(crate) fn raw(&self) -> *mut c_void {
        self.raw
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        (self.module.free_object)(self.raw);
    }
}

pub struct FieldArray(pub(crate) Handle);

pub struct WitnessSolver(pub(crate) Handle);

// The vector's encoding carries no shape metadata; interpret it with the
// per-witness counts reported by solve_witnesses.
pub struct WitnessVector(pub(crate) Handle);

impl FieldArray {
    pub(crate) fn raw(&self) -> *mut c_void {
        self.0.raw()
    }
}

impl WitnessSolver {
    pub(crate) fn raw(&self) -> *mut c_void {
        self.0.raw()
    }
}
