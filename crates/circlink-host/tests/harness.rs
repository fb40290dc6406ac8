#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use circlink_host::{HintHandler, NativeModule, StaticSymbolTable};

// Config id 1 maps to eight-byte field elements, config id 2 to four-byte.
pub const CONFIG_WIDE: u64 = 1;
pub const CONFIG_NARROW: u64 = 2;

pub fn element_size(config_id: u64) -> usize {
    match config_id {
        CONFIG_WIDE => 8,
        CONFIG_NARROW => 4,
        other => panic!("no element size fixed for config id {other}"),
    }
}

pub fn load_v5() -> NativeModule {
    let table = StaticSymbolTable::from_pairs(&circlink_module_mock::symbol_table());
    NativeModule::from_source(table).expect("mock module loads")
}

pub fn load_v2() -> NativeModule {
    let table = StaticSymbolTable::from_pairs(&circlink_module_mock::symbol_table_v2());
    NativeModule::from_source(table).expect("mock module loads under revision 2")
}

static REGISTRY_GATE: Mutex<()> = Mutex::new(());

// The handler registry is process-wide and the mock only knows two config
// ids; tests that register a handler hold this gate.
pub fn registry_gate() -> MutexGuard<'static, ()> {
    REGISTRY_GATE.lock().unwrap_or_else(|e| e.into_inner())
}

// Counts invocations and writes base + call_index into every output element.
pub struct CountingHandler {
    elem: usize,
    base: u64,
    pub calls: AtomicU64,
}

impl CountingHandler {
    pub fn new(config_id: u64, base: u64) -> Self {
        CountingHandler {
            elem: element_size(config_id),
            base,
            calls: AtomicU64::new(0),
        }
    }
}

impl HintHandler for CountingHandler {
    fn element_size(&self) -> usize {
        self.elem
    }

    fn resolve_hint(
        &self,
        _hint_id: u64,
        _inputs: &[u8],
        outputs: &mut [u8],
        _num_outputs: u64,
    ) -> Result<(), String> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        let value = (self.base + n).to_le_bytes();
        for slot in outputs.chunks_exact_mut(self.elem) {
            slot.copy_from_slice(&value[..self.elem]);
        }
        Ok(())
    }
}

pub struct FailingHandler {
    elem: usize,
}

impl FailingHandler {
    pub fn new(config_id: u64) -> Self {
        FailingHandler {
            elem: element_size(config_id),
        }
    }
}

impl HintHandler for FailingHandler {
    fn element_size(&self) -> usize {
        self.elem
    }

    fn resolve_hint(
        &self,
        _hint_id: u64,
        _inputs: &[u8],
        _outputs: &mut [u8],
        _num_outputs: u64,
    ) -> Result<(), String> {
        Err("division by zero in hint".to_string())
    }
}

// Input block for num_witnesses witnesses of the given shape: elements
// 1, 2, 3, ... at the config's element width.
pub fn raw_inputs(
    num_witnesses: u64,
    num_inputs: u32,
    num_public_inputs: u32,
    config_id: u64,
) -> Vec<u8> {
    let elem = element_size(config_id);
    let total = (num_inputs + num_public_inputs) as u64 * num_witnesses;
    let mut out = Vec::with_capacity(total as usize * elem);
    for i in 1..=total {
        out.extend_from_slice(&i.to_le_bytes()[..elem]);
    }
    out
}
