// eerc/eerc-circuit/src/withdraw.rs
// Numan Thabit 2025

use ark_bn254::Fr;
use ark_r1cs_std::{eq::EqGadget, fields::fp::FpVar};
use ark_relations::r1cs::{ConstraintSystemRef, SynthesisError};

use crate::{
    gadgets::{bind, bind_native, enforce_nonzero, enforce_u64},
    CircuitDefinition, OperationKind, SlotLayout,
};

pub const WITHDRAW_CIRCUIT_VERSION: u32 = 1;
pub const WITHDRAW_LAYOUT: SlotLayout = SlotLayout::new(2, 2);

/// Public slots: `[root, nullifier]`. Private slots: `[amount, blinding]`.
///
/// Proves knowledge of an amount below `2^64` and a non-zero blinding factor
/// such that `nullifier == blinding * (amount + root)`.
#[derive(Clone, Copy, Debug, Default)]
pub struct WithdrawCircuit;

impl CircuitDefinition for WithdrawCircuit {
    fn kind(&self) -> OperationKind {
        OperationKind::Withdraw
    }

    fn version(&self) -> u32 {
        WITHDRAW_CIRCUIT_VERSION
    }

    fn layout(&self) -> SlotLayout {
        WITHDRAW_LAYOUT
    }

    fn synthesize(
        &self,
        _cs: ConstraintSystemRef<Fr>,
        public: &[FpVar<Fr>],
        private: &[FpVar<Fr>],
    ) -> Result<(), SynthesisError> {
        let [root, nullifier] = public else {
            return Err(SynthesisError::Unsatisfiable);
        };
        let [amount, blinding] = private else {
            return Err(SynthesisError::Unsatisfiable);
        };

        enforce_u64(amount)?;
        enforce_nonzero(blinding)?;
        bind(amount, blinding, root)?.enforce_equal(nullifier)
    }
}

/// Public slot values matching a withdraw of `amount` under `root`.
pub fn withdraw_public_inputs(root: Fr, amount: u64, blinding: Fr) -> [Fr; 2] {
    [root, bind_native(Fr::from(amount), blinding, root)]
}
