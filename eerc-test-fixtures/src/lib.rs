use std::sync::Arc;

use anyhow::{Context, Result};
use ark_bn254::{Bn254, Fr};
use ark_groth16::Proof;
use once_cell::sync::OnceCell;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

use eerc_circuit::{
    transfer::transfer_public_inputs, withdraw::withdraw_public_inputs, CircuitRegistry,
    OperationKind,
};
use eerc_common::{CanonicalProofBytes, CircuitArtifacts, Inputs, DEFAULT_PARAMETER_SET};
use eerc_prover::{ArtifactStore, KeygenEntropy, MemoryOnly, ProofPipeline};

/// Setup seed for every fixture key pair. Test-only: the seed forges proofs.
pub const FIXTURE_KEYGEN_SEED: u64 = 0x00ee_4c20_2511;
const PROOF_RNG_SEED: u64 = 0x5eed;

// Deterministic values make it easier to reason about fixtures.
const ROOT: u64 = 0x1234_5678_9abc_def0;
const WITHDRAW_AMOUNT: u64 = 250_000;
const WITHDRAW_BLINDING: u64 = 0xb1_1d;
const TRANSFER_BALANCE: u64 = 1_000_000;
const TRANSFER_AMOUNT: u64 = 400_000;
const SENDER_BLINDING: u64 = 0x5e_4d;
const RECEIVER_BLINDING: u64 = 0x4e_c3;

static FIXTURES: OnceCell<TestFixtures> = OnceCell::new();

/// One valid request together with everything proving it produced.
pub struct ProofSample {
    pub kind: OperationKind,
    pub inputs: Inputs,
    pub public_inputs: Vec<Fr>,
    pub artifacts: Arc<CircuitArtifacts>,
    pub proof: Proof<Bn254>,
    pub canonical: CanonicalProofBytes,
}

impl ProofSample {
    /// The request as an input document (`{"PubIns": .., "PrivIns": ..}`).
    pub fn inputs_json(&self) -> String {
        self.inputs.to_json_pretty()
    }
}

/// Seeded artifacts and proofs for both operations, reused across tests.
pub struct TestFixtures {
    pub transfer: ProofSample,
    pub withdraw: ProofSample,
    pipeline: ProofPipeline<MemoryOnly>,
}

impl TestFixtures {
    pub fn samples(&self) -> [&ProofSample; 2] {
        [&self.transfer, &self.withdraw]
    }

    pub fn sample(&self, kind: OperationKind) -> &ProofSample {
        match kind {
            OperationKind::Transfer => &self.transfer,
            OperationKind::Withdraw => &self.withdraw,
        }
    }

    /// In-memory pipeline holding the fixture artifacts; proving through it
    /// never recompiles.
    pub fn pipeline(&self) -> &ProofPipeline<MemoryOnly> {
        &self.pipeline
    }
}

pub fn withdraw_inputs() -> Inputs {
    let (root, blinding) = (Fr::from(ROOT), Fr::from(WITHDRAW_BLINDING));
    Inputs::new(
        withdraw_public_inputs(root, WITHDRAW_AMOUNT, blinding),
        [Fr::from(WITHDRAW_AMOUNT), blinding],
    )
}

pub fn transfer_inputs() -> Inputs {
    let root = Fr::from(ROOT);
    let (sender, receiver) = (Fr::from(SENDER_BLINDING), Fr::from(RECEIVER_BLINDING));
    Inputs::new(
        transfer_public_inputs(root, TRANSFER_BALANCE, TRANSFER_AMOUNT, sender, receiver),
        [
            Fr::from(TRANSFER_BALANCE),
            Fr::from(TRANSFER_AMOUNT),
            sender,
            receiver,
        ],
    )
}

/// Return lazily constructed test fixtures shared across crates.
pub fn fixtures() -> &'static TestFixtures {
    FIXTURES.get_or_init(|| build_fixtures().expect("failed to build eerc test fixtures"))
}

fn build_fixtures() -> Result<TestFixtures> {
    let pipeline = ProofPipeline::new(
        CircuitRegistry::default(),
        Arc::new(ArtifactStore::in_memory(KeygenEntropy::Seeded(
            FIXTURE_KEYGEN_SEED,
        ))),
        DEFAULT_PARAMETER_SET,
    );
    let mut rng = ChaCha20Rng::seed_from_u64(PROOF_RNG_SEED);

    let mut sample = |kind: OperationKind, inputs: Inputs| -> Result<ProofSample> {
        let generated = pipeline
            .prove_inputs(kind, &inputs, &mut rng)
            .with_context(|| format!("prove {kind} fixture"))?;
        Ok(ProofSample {
            kind,
            inputs,
            public_inputs: generated.public_inputs,
            artifacts: generated.artifacts,
            proof: generated.proof,
            canonical: generated.canonical,
        })
    };
    let transfer = sample(OperationKind::Transfer, transfer_inputs())?;
    let withdraw = sample(OperationKind::Withdraw, withdraw_inputs())?;

    Ok(TestFixtures {
        transfer,
        withdraw,
        pipeline,
    })
}
