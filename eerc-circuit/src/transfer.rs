// eerc/eerc-circuit/src/transfer.rs
// Numan Thabit 2025

use ark_bn254::Fr;
use ark_r1cs_std::{eq::EqGadget, fields::fp::FpVar};
use ark_relations::r1cs::{ConstraintSystemRef, SynthesisError};

use crate::{
    gadgets::{bind, bind_native, enforce_nonzero, enforce_u64},
    CircuitDefinition, OperationKind, SlotLayout,
};

pub const TRANSFER_CIRCUIT_VERSION: u32 = 1;
pub const TRANSFER_LAYOUT: SlotLayout = SlotLayout::new(3, 4);

/// Public slots: `[root, sender_nullifier, receiver_commitment]`.
/// Private slots: `[balance, amount, sender_blinding, receiver_blinding]`.
///
/// The sender spends a balance under `root` and hands `amount` to the
/// receiver. Balance, amount and the remaining balance are all 64-bit, so the
/// sender cannot overdraw.
#[derive(Clone, Copy, Debug, Default)]
pub struct TransferCircuit;

impl CircuitDefinition for TransferCircuit {
    fn kind(&self) -> OperationKind {
        OperationKind::Transfer
    }

    fn version(&self) -> u32 {
        TRANSFER_CIRCUIT_VERSION
    }

    fn layout(&self) -> SlotLayout {
        TRANSFER_LAYOUT
    }

    fn synthesize(
        &self,
        _cs: ConstraintSystemRef<Fr>,
        public: &[FpVar<Fr>],
        private: &[FpVar<Fr>],
    ) -> Result<(), SynthesisError> {
        let [root, sender_nullifier, receiver_commitment] = public else {
            return Err(SynthesisError::Unsatisfiable);
        };
        let [balance, amount, sender_blinding, receiver_blinding] = private else {
            return Err(SynthesisError::Unsatisfiable);
        };

        enforce_u64(balance)?;
        enforce_u64(amount)?;
        enforce_u64(&(balance - amount))?;
        enforce_nonzero(sender_blinding)?;
        enforce_nonzero(receiver_blinding)?;

        bind(balance, sender_blinding, root)?.enforce_equal(sender_nullifier)?;
        bind(amount, receiver_blinding, root)?.enforce_equal(receiver_commitment)
    }
}

/// Public slot values matching a transfer of `amount` out of `balance`.
pub fn transfer_public_inputs(
    root: Fr,
    balance: u64,
    amount: u64,
    sender_blinding: Fr,
    receiver_blinding: Fr,
) -> [Fr; 3] {
    [
        root,
        bind_native(Fr::from(balance), sender_blinding, root),
        bind_native(Fr::from(amount), receiver_blinding, root),
    ]
}
