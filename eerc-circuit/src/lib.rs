// eerc/eerc-circuit/src/lib.rs
// Numan Thabit 2025

pub mod gadgets;
pub mod registry;
pub mod transfer;
pub mod withdraw;

use std::{fmt, str::FromStr, sync::Arc};

use ark_bn254::Fr;
use ark_r1cs_std::{alloc::AllocVar, fields::fp::FpVar};
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystemRef, SynthesisError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::Zeroize;

pub use registry::CircuitRegistry;
pub use transfer::TransferCircuit;
pub use withdraw::WithdrawCircuit;

/// Confidential-token operations that have a proving circuit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationKind {
    Transfer,
    Withdraw,
}

impl OperationKind {
    pub const ALL: [OperationKind; 2] = [OperationKind::Transfer, OperationKind::Withdraw];

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Transfer => "transfer",
            OperationKind::Withdraw => "withdraw",
        }
    }

    /// Upper-cased name used for exported artifact sets (`TRANSFER.pk`, ...).
    pub fn artifact_name(&self) -> &'static str {
        match self {
            OperationKind::Transfer => "TRANSFER",
            OperationKind::Withdraw => "WITHDRAW",
        }
    }

    /// Stable tag folded into descriptor fingerprints and the constraint-system header.
    pub fn tag(&self) -> u8 {
        match self {
            OperationKind::Transfer => 1,
            OperationKind::Withdraw => 2,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.tag() == tag)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = UnknownOperation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownOperation(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown operation '{0}'")]
pub struct UnknownOperation(pub String);

/// Number of public and private input slots a circuit declares.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotLayout {
    pub public: usize,
    pub private: usize,
}

impl SlotLayout {
    pub const fn new(public: usize, private: usize) -> Self {
        Self { public, private }
    }
}

/// The constraints of one operation, written against already-allocated input slots.
pub trait CircuitDefinition: Send + Sync + 'static {
    fn kind(&self) -> OperationKind;

    /// Bumped whenever the constraints change; part of the artifact fingerprint.
    fn version(&self) -> u32;

    fn layout(&self) -> SlotLayout;

    /// `public` and `private` hold exactly `layout()` variables, in declared order.
    fn synthesize(
        &self,
        cs: ConstraintSystemRef<Fr>,
        public: &[FpVar<Fr>],
        private: &[FpVar<Fr>],
    ) -> Result<(), SynthesisError>;
}

/// A circuit instance ready for setup (blank) or proving (assigned).
#[derive(Clone)]
pub struct OperationCircuit {
    definition: Arc<dyn CircuitDefinition>,
    public: Vec<Option<Fr>>,
    private: Vec<Option<Fr>>,
}

impl OperationCircuit {
    pub fn kind(&self) -> OperationKind {
        self.definition.kind()
    }

    pub fn is_assigned(&self) -> bool {
        self.public.iter().chain(self.private.iter()).all(Option::is_some)
    }
}

impl Drop for OperationCircuit {
    fn drop(&mut self) {
        self.private.zeroize();
    }
}

impl fmt::Debug for OperationCircuit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationCircuit")
            .field("kind", &self.definition.kind())
            .field("public_slots", &self.public.len())
            .field("private_slots", &self.private.len())
            .field("assigned", &self.is_assigned())
            .finish()
    }
}

impl ConstraintSynthesizer<Fr> for OperationCircuit {
    fn generate_constraints(self, cs: ConstraintSystemRef<Fr>) -> Result<(), SynthesisError> {
        // Instance variables must be allocated first and in slot order; the
        // verifier feeds public inputs positionally.
        let public = self
            .public
            .iter()
            .map(|value| {
                FpVar::new_input(cs.clone(), || value.ok_or(SynthesisError::AssignmentMissing))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let private = self
            .private
            .iter()
            .map(|value| {
                FpVar::new_witness(cs.clone(), || value.ok_or(SynthesisError::AssignmentMissing))
            })
            .collect::<Result<Vec<_>, _>>()?;

        self.definition.synthesize(cs, &public, &private)
    }
}

/// Produces fresh circuit instances of one operation's shape.
#[derive(Clone)]
pub struct CircuitFactory {
    definition: Arc<dyn CircuitDefinition>,
}

impl CircuitFactory {
    pub fn new(definition: impl CircuitDefinition) -> Self {
        Self {
            definition: Arc::new(definition),
        }
    }

    pub fn kind(&self) -> OperationKind {
        self.definition.kind()
    }

    pub fn version(&self) -> u32 {
        self.definition.version()
    }

    pub fn layout(&self) -> SlotLayout {
        self.definition.layout()
    }

    /// Zero-valued instance used for compilation and key generation.
    pub fn blank(&self) -> OperationCircuit {
        let layout = self.layout();
        OperationCircuit {
            definition: Arc::clone(&self.definition),
            public: vec![None; layout.public],
            private: vec![None; layout.private],
        }
    }

    /// Instance carrying concrete slot values. Slot counts are not checked here;
    /// a miscounted assignment synthesizes a differently shaped system.
    pub fn assigned(&self, public: &[Fr], private: &[Fr]) -> OperationCircuit {
        OperationCircuit {
            definition: Arc::clone(&self.definition),
            public: public.iter().copied().map(Some).collect(),
            private: private.iter().copied().map(Some).collect(),
        }
    }
}

impl fmt::Debug for CircuitFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitFactory")
            .field("kind", &self.kind())
            .field("version", &self.version())
            .field("layout", &self.layout())
            .finish()
    }
}
