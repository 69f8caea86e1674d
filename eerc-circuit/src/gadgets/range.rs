// eerc/eerc-circuit/src/gadgets/range.rs
// Numan Thabit 2025

use ark_ff::{BigInteger, PrimeField};
use ark_r1cs_std::{
    alloc::AllocVar, boolean::Boolean, eq::EqGadget, fields::fp::FpVar, R1CSVar,
};
use ark_relations::r1cs::SynthesisError;

/// Token amounts and balances are 64-bit.
pub const AMOUNT_BITS: usize = 64;

/// Enforce `value < 2^64` by decomposing it into 64 witness bits.
pub fn enforce_u64<F: PrimeField>(value: &FpVar<F>) -> Result<(), SynthesisError> {
    let cs = value.cs();
    let bits = (0..AMOUNT_BITS)
        .map(|i| {
            Boolean::new_witness(cs.clone(), || {
                value.value().map(|v| v.into_bigint().get_bit(i))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Boolean::le_bits_to_fp_var(&bits)?.enforce_equal(value)
}
