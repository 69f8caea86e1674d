// eerc/eerc-prover/src/lib.rs
// Numan Thabit 2025

pub mod pipeline;
pub mod store;

use std::time::Instant;

use ark_bn254::{Bn254, Fr};
use ark_ff::UniformRand;
use ark_groth16::{Groth16, Proof};
use ark_relations::r1cs::{
    ConstraintSynthesizer, ConstraintSystem, ConstraintSystemRef, OptimizationGoal,
    SynthesisMode,
};
use ark_snark::SNARK;
use rand::{rngs::OsRng, CryptoRng, RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use zeroize::Zeroize;

use eerc_circuit::CircuitFactory;
use eerc_common::{
    CircuitArtifacts, CircuitDescriptor, CompiledCircuit, KeygenLabel, PipelineError,
    PipelineResult, Witness,
};

pub use pipeline::{
    PipelineFailure, PipelineOutcome, PipelineStage, ProofPipeline, ProverConfig,
};
pub use store::{
    ArtifactBackend, ArtifactStore, CorruptArtifactPolicy, FsArtifactBackend, MemoryOnly,
    PersistOutcome, StorePolicy,
};

/// Source of Groth16 setup randomness.
///
/// Keys from OS entropy can never be regenerated, so a lost or corrupt cache
/// means a new verifying key. A seeded setup reproduces the same keys for the
/// same circuit, at the cost of anyone holding the seed being able to forge
/// proofs; it is meant for tests and local development.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum KeygenEntropy {
    #[default]
    Os,
    Seeded(u64),
}

impl KeygenEntropy {
    pub fn label(&self) -> KeygenLabel {
        match self {
            KeygenEntropy::Os => KeygenLabel::Os,
            KeygenEntropy::Seeded(_) => KeygenLabel::Seeded,
        }
    }
}

/// Synthesize the blank circuit in setup mode and extract its R1CS matrices.
///
/// Uses the same optimization goal and finalization as Groth16 setup, so the
/// matrices line up with the keys derived from the same circuit.
pub fn compile_constraint_system(factory: &CircuitFactory) -> PipelineResult<CompiledCircuit> {
    let cs = ConstraintSystem::<Fr>::new_ref();
    cs.set_optimization_goal(OptimizationGoal::Constraints);
    cs.set_mode(SynthesisMode::Setup);
    factory
        .blank()
        .generate_constraints(cs.clone())
        .map_err(|err| PipelineError::Compilation(format!("{}: {err}", factory.kind())))?;
    cs.finalize();
    let matrices = cs.to_matrices().ok_or_else(|| {
        PipelineError::Compilation(format!("{}: constraint matrices unavailable", factory.kind()))
    })?;
    CompiledCircuit::new(factory.kind(), factory.layout(), matrices)
        .map_err(|err| PipelineError::Compilation(err.to_string()))
}

/// Compile `factory`'s circuit and run Groth16 circuit-specific setup for it.
pub fn compile(
    descriptor: &CircuitDescriptor,
    factory: &CircuitFactory,
    entropy: KeygenEntropy,
) -> PipelineResult<CircuitArtifacts> {
    if descriptor.kind != factory.kind() || descriptor.circuit_version != factory.version() {
        return Err(PipelineError::Compilation(format!(
            "descriptor {} does not describe circuit {} v{}",
            descriptor.cache_slot(),
            factory.kind(),
            factory.version()
        )));
    }
    let started = Instant::now();
    let compiled = compile_constraint_system(factory)?;

    let keys = match entropy {
        KeygenEntropy::Os => {
            Groth16::<Bn254>::circuit_specific_setup(factory.blank(), &mut OsRng)
        }
        KeygenEntropy::Seeded(seed) => Groth16::<Bn254>::circuit_specific_setup(
            factory.blank(),
            &mut ChaCha20Rng::seed_from_u64(seed),
        ),
    };
    let (pk, vk) = keys
        .map_err(|err| PipelineError::Compilation(format!("groth16 setup failed: {err}")))?;

    tracing::info!(
        operation = %factory.kind(),
        constraints = compiled.num_constraints(),
        witness_variables = compiled.num_witness_variables(),
        keygen = ?entropy.label(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "compiled circuit and generated keys"
    );

    CircuitArtifacts::pair(descriptor.clone(), compiled, pk, vk, entropy.label())
        .map_err(|err| PipelineError::Compilation(err.to_string()))
}

/// Prove `witness` against the paired artifact set.
///
/// The assigned circuit is synthesized and checked before any proving work;
/// an unsatisfied witness or one whose shape differs from the compiled system
/// fails with `Proving`.
pub fn prove<R: RngCore + CryptoRng>(
    artifacts: &CircuitArtifacts,
    factory: &CircuitFactory,
    witness: Witness,
    rng: &mut R,
) -> PipelineResult<Proof<Bn254>> {
    let compiled = artifacts.compiled();
    if witness.kind() != compiled.kind() || factory.kind() != compiled.kind() {
        return Err(PipelineError::Proving(format!(
            "witness for {} cannot be proven with {} artifacts",
            witness.kind(),
            compiled.kind()
        )));
    }
    let started = Instant::now();

    let cs = ConstraintSystem::<Fr>::new_ref();
    cs.set_optimization_goal(OptimizationGoal::Constraints);
    factory
        .assigned(witness.public(), witness.private())
        .generate_constraints(cs.clone())
        .map_err(|err| PipelineError::Proving(format!("witness synthesis failed: {err}")))?;

    let satisfied = cs
        .is_satisfied()
        .map_err(|err| PipelineError::Proving(err.to_string()))?;
    if !satisfied {
        let which = cs.which_is_unsatisfied().ok().flatten().unwrap_or_default();
        return Err(PipelineError::Proving(format!(
            "witness does not satisfy the {} circuit (first failing constraint: {which})",
            compiled.kind()
        )));
    }
    cs.finalize();

    let shape = (
        cs.num_instance_variables(),
        cs.num_witness_variables(),
        cs.num_constraints(),
    );
    let expected = (
        compiled.num_instance_variables(),
        compiled.num_witness_variables(),
        compiled.num_constraints(),
    );
    if shape != expected {
        return Err(PipelineError::Proving(format!(
            "assignment shape {shape:?} differs from compiled system {expected:?}"
        )));
    }

    let mut full_assignment = take_full_assignment(&cs)?;
    drop(witness);

    let matrices = compiled.matrices();
    let result = Groth16::<Bn254>::create_proof_with_reduction_and_matrices(
        artifacts.proving_key(),
        Fr::rand(rng),
        Fr::rand(rng),
        matrices,
        matrices.num_instance_variables,
        matrices.num_constraints,
        &full_assignment,
    );
    full_assignment.zeroize();
    let proof = result.map_err(|err| PipelineError::Proving(err.to_string()))?;

    tracing::info!(
        operation = %compiled.kind(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "proof generated"
    );
    Ok(proof)
}

/// Instance then witness values, the layout the compiled matrices index.
/// The witness values left in `cs` are cleared.
fn take_full_assignment(cs: &ConstraintSystemRef<Fr>) -> PipelineResult<Vec<Fr>> {
    let mut cs = cs.borrow_mut().ok_or_else(|| {
        PipelineError::Proving("constraint system is no longer available".into())
    })?;
    let mut full = cs.instance_assignment.clone();
    full.extend_from_slice(&cs.witness_assignment);
    cs.witness_assignment.zeroize();
    Ok(full)
}

#[cfg(test)]
mod tests {
    use super::*;
    use eerc_circuit::{
        transfer::transfer_public_inputs, CircuitRegistry, OperationKind, WithdrawCircuit,
    };
    use eerc_common::{build_witness, Inputs, DEFAULT_PARAMETER_SET};

    fn descriptor(factory: &CircuitFactory) -> CircuitDescriptor {
        CircuitDescriptor::from_factory(factory, DEFAULT_PARAMETER_SET)
    }

    #[test]
    fn assignment_is_taken_out_of_the_constraint_system() {
        let factory = CircuitFactory::new(WithdrawCircuit);
        let (amount, blinding) = (Fr::from(40u64), Fr::from(6u64));
        let public =
            eerc_circuit::withdraw::withdraw_public_inputs(Fr::from(2u64), 40, blinding);
        let cs = ConstraintSystem::<Fr>::new_ref();
        factory
            .assigned(&public, &[amount, blinding])
            .generate_constraints(cs.clone())
            .unwrap();
        let (instances, witnesses) = (cs.num_instance_variables(), cs.num_witness_variables());

        let full = take_full_assignment(&cs).unwrap();
        assert_eq!(full.len(), instances + witnesses);
        assert_eq!(full[0], Fr::from(1u64));
        assert_eq!(&full[1..3], &public[..]);
        assert_eq!(&full[instances..instances + 2], &[amount, blinding]);
        assert!(cs.borrow().unwrap().witness_assignment.is_empty());
    }

    #[test]
    fn compiled_system_matches_layout() {
        let factory = CircuitFactory::new(WithdrawCircuit);
        let compiled = compile_constraint_system(&factory).unwrap();
        assert_eq!(compiled.num_instance_variables(), 3);
        assert!(compiled.num_constraints() > 64);
    }

    #[test]
    fn seeded_setup_is_reproducible() {
        let factory = CircuitFactory::new(WithdrawCircuit);
        let first = compile(&descriptor(&factory), &factory, KeygenEntropy::Seeded(7)).unwrap();
        let second = compile(&descriptor(&factory), &factory, KeygenEntropy::Seeded(7)).unwrap();
        let other = compile(&descriptor(&factory), &factory, KeygenEntropy::Seeded(8)).unwrap();
        assert_eq!(first.verifying_key(), second.verifying_key());
        assert_ne!(first.verifying_key(), other.verifying_key());
        assert_eq!(first.keygen(), KeygenLabel::Seeded);
    }

    #[test]
    fn unsatisfied_witness_is_a_proving_error() {
        let registry = CircuitRegistry::default();
        let factory = registry.resolve(OperationKind::Transfer).unwrap();
        let artifacts =
            compile(&descriptor(&factory), &factory, KeygenEntropy::Seeded(1)).unwrap();

        let (sb, rb) = (Fr::from(3u64), Fr::from(5u64));
        let public = transfer_public_inputs(Fr::from(9u64), 10, 20, sb, rb);
        let inputs = Inputs::new(public, [Fr::from(10u64), Fr::from(20u64), sb, rb]);
        let witness = build_witness(artifacts.compiled(), &inputs).unwrap();

        let err = prove(&artifacts, &factory, witness, &mut OsRng).unwrap_err();
        assert_eq!(err.kind(), eerc_common::FailureKind::Proving);
    }

    #[test]
    fn mismatched_descriptor_is_a_compilation_error() {
        let registry = CircuitRegistry::default();
        let transfer = registry.resolve(OperationKind::Transfer).unwrap();
        let withdraw = registry.resolve(OperationKind::Withdraw).unwrap();
        let err = compile(&descriptor(&transfer), &withdraw, KeygenEntropy::Seeded(1)).unwrap_err();
        assert_eq!(err.kind(), eerc_common::FailureKind::Compilation);
    }
}
