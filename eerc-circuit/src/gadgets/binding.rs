// eerc/eerc-circuit/src/gadgets/binding.rs
// Numan Thabit 2025

use ark_ff::{Field, PrimeField};
use ark_r1cs_std::{eq::EqGadget, fields::fp::FpVar, fields::FieldVar};
use ark_relations::r1cs::SynthesisError;

/// Blinded binding of `value` to `anchor`: `blinding * (value + anchor)`.
pub fn bind<F: PrimeField>(
    value: &FpVar<F>,
    blinding: &FpVar<F>,
    anchor: &FpVar<F>,
) -> Result<FpVar<F>, SynthesisError> {
    Ok(blinding * &(value + anchor))
}

/// Out-of-circuit counterpart of [`bind`].
pub fn bind_native<F: Field>(value: F, blinding: F, anchor: F) -> F {
    blinding * (value + anchor)
}

pub fn enforce_nonzero<F: PrimeField>(value: &FpVar<F>) -> Result<(), SynthesisError> {
    value.enforce_not_equal(&FpVar::zero())
}
