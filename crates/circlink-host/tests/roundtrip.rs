use circlink_host::BridgeError;

mod harness;

use harness::{CONFIG_NARROW, CONFIG_WIDE};

#[test]
fn field_array_round_trips() {
    let module = harness::load_v5();
    let data = harness::raw_inputs(1, 3, 0, CONFIG_WIDE);
    let array = module
        .load_field_array(&data, 3, CONFIG_WIDE)
        .expect("load field array");
    let dumped = module
        .dump_field_array(&array, CONFIG_WIDE)
        .expect("dump field array");
    assert_eq!(dumped, data);
}

#[test]
fn field_array_dump_is_repeatable() {
    let module = harness::load_v5();
    let data = harness::raw_inputs(2, 2, 1, CONFIG_NARROW);
    let array = module
        .load_field_array(&data, 6, CONFIG_NARROW)
        .expect("load field array");
    let first = module.dump_field_array(&array, CONFIG_NARROW).expect("first dump");
    let second = module.dump_field_array(&array, CONFIG_NARROW).expect("second dump");
    assert_eq!(first, data);
    assert_eq!(second, data, "dumping must not consume the handle");
}

#[test]
fn witness_solver_round_trips() {
    let module = harness::load_v5();
    let ir = circlink_module_mock::build_ir(2, 1, &[(7, 2, 1)]);
    let solver = module
        .load_witness_solver(&ir, CONFIG_WIDE)
        .expect("load witness solver");
    let dumped = module
        .dump_witness_solver(&solver, CONFIG_WIDE)
        .expect("dump witness solver");
    assert_eq!(dumped, ir);

    // Reloading a dump and dumping again must be the identity.
    let reloaded = module
        .load_witness_solver(&dumped, CONFIG_WIDE)
        .expect("reload dumped solver");
    let dumped_again = module
        .dump_witness_solver(&reloaded, CONFIG_WIDE)
        .expect("dump reloaded solver");
    assert_eq!(dumped_again, dumped);
}

#[test]
fn compile_yields_the_canonical_solver() {
    let module = harness::load_v5();
    let ir = circlink_module_mock::build_ir(3, 2, &[]);
    let compiled = module.compile(&ir, CONFIG_WIDE).expect("compile");
    assert!(!compiled.layered.is_empty(), "layered circuit must be produced");
    let dumped = module
        .dump_witness_solver(&compiled.solver, CONFIG_WIDE)
        .expect("dump compiled solver");
    assert_eq!(dumped, ir);
}

#[test]
fn both_revisions_compile_to_the_same_result() {
    let ir = circlink_module_mock::build_ir(2, 2, &[(4, 1, 2)]);

    let v5 = harness::load_v5();
    let v2 = harness::load_v2();
    let compiled_v5 = v5.compile(&ir, CONFIG_NARROW).expect("compile under revision 5");
    let compiled_v2 = v2.compile(&ir, CONFIG_NARROW).expect("compile under revision 2");

    assert_eq!(compiled_v5.layered, compiled_v2.layered);
    let solver_v5 = v5
        .dump_witness_solver(&compiled_v5.solver, CONFIG_NARROW)
        .expect("dump solver under revision 5");
    let solver_v2 = v2
        .dump_witness_solver(&compiled_v2.solver, CONFIG_NARROW)
        .expect("dump solver under revision 2");
    assert_eq!(solver_v5, solver_v2);
}

#[test]
fn legacy_revision_round_trips_field_arrays() {
    let module = harness::load_v2();
    let data = harness::raw_inputs(1, 4, 1, CONFIG_WIDE);
    let array = module
        .load_field_array(&data, 5, CONFIG_WIDE)
        .expect("load field array");
    let dumped = module
        .dump_field_array(&array, CONFIG_WIDE)
        .expect("dump field array");
    assert_eq!(dumped, data);
}

#[test]
fn load_rejects_a_short_buffer() {
    let module = harness::load_v5();
    let err = module
        .load_field_array(&[0u8; 12], 2, CONFIG_WIDE)
        .err()
        .expect("short buffer must be rejected");
    match err {
        BridgeError::Call(msg) => {
            assert!(msg.contains("length mismatch"), "unexpected message: {msg}")
        }
        other => panic!("expected a call error, got {other:?}"),
    }
}

#[test]
fn compile_surfaces_the_module_error_text() {
    let module = harness::load_v5();
    let err = module
        .compile(b"not a circuit", CONFIG_WIDE)
        .err()
        .expect("garbage input must be rejected");
    match err {
        BridgeError::Call(msg) => assert!(
            msg.contains("failed to parse the source circuit"),
            "unexpected message: {msg}"
        ),
        other => panic!("expected a call error, got {other:?}"),
    }
}

#[test]
fn unknown_config_id_is_a_call_error() {
    let module = harness::load_v5();
    let err = module
        .load_field_array(&[], 0, 99)
        .err()
        .expect("unknown config id must be rejected");
    match err {
        BridgeError::Call(msg) => {
            assert!(msg.contains("unknown config id: 99"), "unexpected message: {msg}")
        }
        other => panic!("expected a call error, got {other:?}"),
    }
}
