//! Conversion between integers in their external notations and prime-field
//! elements. Out-of-range values are rejected, never reduced.

use ark_ff::{BigInteger, PrimeField};
use num_bigint::BigUint;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("malformed integer '{0}'")]
    Malformed(String),
    #[error("negative value '{0}' has no field representation")]
    Negative(String),
    #[error("value is not below the field modulus")]
    Overflow,
}

impl FieldError {
    /// Range failures, as opposed to syntax failures.
    pub fn is_range(&self) -> bool {
        matches!(self, FieldError::Negative(_) | FieldError::Overflow)
    }
}

/// Parse a decimal or `0x`-prefixed hexadecimal integer.
pub fn parse_field<F: PrimeField>(text: &str) -> Result<F, FieldError> {
    let trimmed = text.trim();
    if let Some(magnitude) = trimmed.strip_prefix('-') {
        return match parse_unsigned(magnitude) {
            Some(value) if value == BigUint::default() => Ok(F::zero()),
            Some(_) => Err(FieldError::Negative(trimmed.to_string())),
            None => Err(FieldError::Malformed(trimmed.to_string())),
        };
    }
    let value = parse_unsigned(trimmed).ok_or_else(|| FieldError::Malformed(trimmed.to_string()))?;
    biguint_to_field(&value)
}

fn parse_unsigned(text: &str) -> Option<BigUint> {
    let (digits, radix) = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => (hex, 16),
        None => (text, 10),
    };
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return None;
    }
    BigUint::parse_bytes(digits.as_bytes(), radix)
}

pub fn biguint_to_field<F: PrimeField>(value: &BigUint) -> Result<F, FieldError> {
    let modulus: BigUint = F::MODULUS.into();
    if *value >= modulus {
        return Err(FieldError::Overflow);
    }
    Ok(F::from(value.clone()))
}

/// Canonical decimal rendering.
pub fn field_to_decimal<F: PrimeField>(value: &F) -> String {
    let big: BigUint = value.into_bigint().into();
    big.to_str_radix(10)
}

/// 32-byte big-endian encoding of a 256-bit field element.
pub fn field_to_be_bytes<F: PrimeField>(value: &F) -> [u8; 32] {
    let bytes = value.into_bigint().to_bytes_be();
    let mut out = [0u8; 32];
    let offset = out.len().saturating_sub(bytes.len());
    out[offset..].copy_from_slice(&bytes[bytes.len().saturating_sub(32)..]);
    out
}

/// Inverse of [`field_to_be_bytes`]; `None` unless the word is a canonical residue.
pub fn field_from_be_bytes<F: PrimeField>(bytes: &[u8; 32]) -> Option<F> {
    biguint_to_field(&BigUint::from_bytes_be(bytes)).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_bn254::{Fq, Fr};
    use proptest::prelude::*;

    const FR_MODULUS_DEC: &str =
        "21888242871839275222246405745257275088548364400416034343698204186575808495617";

    #[test]
    fn accepts_decimal_and_hex() {
        assert_eq!(parse_field::<Fr>("1234").unwrap(), Fr::from(1234u64));
        assert_eq!(parse_field::<Fr>("0x4d2").unwrap(), Fr::from(1234u64));
        assert_eq!(parse_field::<Fr>(" 0X4D2 ").unwrap(), Fr::from(1234u64));
        assert_eq!(parse_field::<Fr>("-0").unwrap(), Fr::from(0u64));
    }

    #[test]
    fn rejects_modulus_and_above() {
        assert_eq!(parse_field::<Fr>(FR_MODULUS_DEC), Err(FieldError::Overflow));
        let below = parse_field::<Fr>(
            "21888242871839275222246405745257275088548364400416034343698204186575808495616",
        )
        .unwrap();
        assert_eq!(below, -Fr::from(1u64));
        assert_eq!(parse_field::<Fr>(&format!("0x{}", "f".repeat(80))), Err(FieldError::Overflow));
    }

    #[test]
    fn classifies_failures() {
        assert!(parse_field::<Fr>("-5").unwrap_err().is_range());
        assert!(!parse_field::<Fr>("12a").unwrap_err().is_range());
        assert!(!parse_field::<Fr>("").unwrap_err().is_range());
        assert!(!parse_field::<Fr>("0x").unwrap_err().is_range());
        assert!(!parse_field::<Fr>("1e9").unwrap_err().is_range());
    }

    #[test]
    fn base_field_words_must_be_canonical() {
        assert_eq!(field_from_be_bytes::<Fq>(&[0xff; 32]), None);
        let value = -Fq::from(7u64);
        assert_eq!(field_from_be_bytes::<Fq>(&field_to_be_bytes(&value)), Some(value));
    }

    proptest! {
        #[test]
        fn decimal_rendering_parses_back(limbs in any::<[u64; 4]>()) {
            let value = Fr::from_le_bytes_mod_order(
                &limbs.iter().flat_map(|l| l.to_le_bytes()).collect::<Vec<_>>(),
            );
            prop_assert_eq!(parse_field::<Fr>(&field_to_decimal(&value)), Ok(value));
        }

        #[test]
        fn u64_values_match_native_conversion(n in any::<u64>()) {
            prop_assert_eq!(parse_field::<Fr>(&n.to_string()), Ok(Fr::from(n)));
            prop_assert_eq!(parse_field::<Fr>(&format!("{n:#x}")), Ok(Fr::from(n)));
        }
    }
}
