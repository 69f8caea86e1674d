// eerc/eerc-verifier/src/lib.rs
// Numan Thabit 2025

use ark_bn254::{Bn254, Fr};
use ark_groth16::{prepare_verifying_key, Groth16, Proof, VerifyingKey};
use ark_snark::SNARK;
use eerc_common::{
    decode_proof, CanonicalProofBytes, InputSection, Inputs, PipelineError, PipelineResult,
};

/// Check a native proof against `public_inputs` (verifier order, without the
/// leading constant).
pub fn verify(vk: &VerifyingKey<Bn254>, proof: &Proof<Bn254>, public_inputs: &[Fr]) -> bool {
    if public_inputs.len() + 1 != vk.gamma_abc_g1.len() {
        return false;
    }
    let pvk = prepare_verifying_key(vk);
    Groth16::<Bn254>::verify_with_processed_vk(&pvk, public_inputs, proof).unwrap_or(false)
}

/// Decode the 256-byte on-chain encoding and verify it. Undecodable bytes are
/// an `Encoding` error rather than a rejection.
pub fn verify_canonical(
    vk: &VerifyingKey<Bn254>,
    bytes: &CanonicalProofBytes,
    public_inputs: &[Fr],
) -> PipelineResult<bool> {
    let proof = decode_proof(bytes)?;
    Ok(verify(vk, &proof, public_inputs))
}

/// Verify against the public half of an input document.
pub fn verify_with_inputs(
    vk: &VerifyingKey<Bn254>,
    bytes: &CanonicalProofBytes,
    inputs: &Inputs,
) -> PipelineResult<bool> {
    let expected = vk.gamma_abc_g1.len().saturating_sub(1);
    if inputs.public.len() != expected {
        return Err(PipelineError::InputShapeMismatch {
            section: InputSection::Public,
            expected,
            actual: inputs.public.len(),
        });
    }
    let public = inputs
        .public
        .iter()
        .enumerate()
        .map(|(index, value)| {
            value.to_field().map_err(|err| PipelineError::InputRange {
                section: InputSection::Public,
                index,
                reason: err.to_string(),
            })
        })
        .collect::<PipelineResult<Vec<_>>>()?;
    verify_canonical(vk, bytes, &public)
}
