use std::io::Write;

use anyhow::Result;
use circlink_host::BridgeError;
use tempfile::NamedTempFile;

mod harness;

use harness::{CONFIG_NARROW, CONFIG_WIDE};

fn circuit_file(contents: &[u8]) -> Result<NamedTempFile> {
    let mut file = NamedTempFile::new()?;
    file.write_all(contents)?;
    file.flush()?;
    Ok(file)
}

fn path_bytes(file: &NamedTempFile) -> Vec<u8> {
    file.path().to_str().expect("temp path is utf-8").as_bytes().to_vec()
}

#[test]
fn proof_round_trips() -> Result<()> {
    let module = harness::load_v5();
    let file = circuit_file(b"layered circuit artifact")?;
    let path = path_bytes(&file);
    let witness = b"witness payload";

    let proof = module.prove_circuit_file(&path, witness, CONFIG_WIDE)?;
    assert!(!proof.is_empty());
    assert!(module.verify_circuit_file(&path, witness, &proof, CONFIG_WIDE)?);
    Ok(())
}

#[test]
fn tampered_proof_fails_verification() -> Result<()> {
    let module = harness::load_v5();
    let file = circuit_file(b"layered circuit artifact")?;
    let path = path_bytes(&file);
    let witness = b"witness payload";

    let mut proof = module.prove_circuit_file(&path, witness, CONFIG_WIDE)?;
    *proof.last_mut().expect("proof is non-empty") ^= 0x01;
    assert!(!module.verify_circuit_file(&path, witness, &proof, CONFIG_WIDE)?);
    Ok(())
}

#[test]
fn wrong_witness_fails_verification() -> Result<()> {
    let module = harness::load_v5();
    let file = circuit_file(b"layered circuit artifact")?;
    let path = path_bytes(&file);

    let proof = module.prove_circuit_file(&path, b"witness payload", CONFIG_WIDE)?;
    assert!(!module.verify_circuit_file(&path, b"other witness", &proof, CONFIG_WIDE)?);
    Ok(())
}

#[test]
fn proof_binds_the_config_id() -> Result<()> {
    let module = harness::load_v5();
    let file = circuit_file(b"layered circuit artifact")?;
    let path = path_bytes(&file);
    let witness = b"witness payload";

    let proof = module.prove_circuit_file(&path, witness, CONFIG_WIDE)?;
    assert!(!module.verify_circuit_file(&path, witness, &proof, CONFIG_NARROW)?);
    Ok(())
}

#[test]
fn missing_circuit_file_is_a_call_error() {
    let module = harness::load_v5();
    let err = module
        .prove_circuit_file(b"/nonexistent/circuit.bin", b"witness", CONFIG_WIDE)
        .err()
        .expect("missing file must fail");
    match err {
        BridgeError::Call(msg) => {
            assert!(msg.contains("no proof"), "unexpected message: {msg}")
        }
        other => panic!("expected a call error, got {other:?}"),
    }
}

#[test]
fn legacy_revision_proves_and_verifies() -> Result<()> {
    let module = harness::load_v2();
    let file = circuit_file(b"layered circuit artifact")?;
    let path = path_bytes(&file);
    let witness = b"witness payload";

    let proof = module.prove_circuit_file(&path, witness, CONFIG_WIDE)?;
    assert!(module.verify_circuit_file(&path, witness, &proof, CONFIG_WIDE)?);
    Ok(())
}
