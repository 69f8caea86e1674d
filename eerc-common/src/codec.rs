//! Proof encoding shared with the on-chain Groth16 verifier.
//!
//! The canonical form is eight 32-byte big-endian words,
//! `[A.x, A.y, B.x.c1, B.x.c0, B.y.c1, B.y.c0, C.x, C.y]`, the order in which
//! the Solidity verifier takes `(uint[2] a, uint[2][2] b, uint[2] c)`. The
//! layout is frozen.

use std::{fmt, path::Path, str::FromStr};

use ark_bn254::{Bn254, Fq, Fq2, G1Affine, G2Affine};
use ark_groth16::Proof;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    error::{PipelineError, PipelineResult},
    field::{field_from_be_bytes, field_to_be_bytes, field_to_decimal, parse_field},
    io::write_atomic,
};

pub const WORD_BYTES: usize = 32;
pub const PROOF_WORDS: usize = 8;
pub const PROOF_BYTES: usize = WORD_BYTES * PROOF_WORDS;

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CanonicalProofBytes([u8; PROOF_BYTES]);

impl CanonicalProofBytes {
    pub fn from_bytes(bytes: &[u8]) -> PipelineResult<Self> {
        let array: [u8; PROOF_BYTES] = bytes.try_into().map_err(|_| {
            PipelineError::Encoding(format!(
                "canonical proof must be {PROOF_BYTES} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self(array))
    }

    pub fn as_bytes(&self) -> &[u8; PROOF_BYTES] {
        &self.0
    }

    pub fn words(&self) -> impl Iterator<Item = &[u8; WORD_BYTES]> + '_ {
        self.0.chunks_exact(WORD_BYTES).filter_map(|chunk| chunk.try_into().ok())
    }

    /// Words as decimal strings, the form Hardhat scripts pass to the verifier.
    pub fn decimal_words(&self) -> Vec<String> {
        self.words()
            .map(|word| num_bigint::BigUint::from_bytes_be(word).to_str_radix(10))
            .collect()
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for CanonicalProofBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CanonicalProofBytes({})", self.to_hex())
    }
}

pub fn encode_proof(proof: &Proof<Bn254>) -> PipelineResult<CanonicalProofBytes> {
    if proof.a.infinity || proof.b.infinity || proof.c.infinity {
        return Err(PipelineError::Encoding(
            "proof contains the point at infinity".into(),
        ));
    }
    let words = [
        proof.a.x,
        proof.a.y,
        proof.b.x.c1,
        proof.b.x.c0,
        proof.b.y.c1,
        proof.b.y.c0,
        proof.c.x,
        proof.c.y,
    ];
    let mut out = [0u8; PROOF_BYTES];
    for (chunk, word) in out.chunks_exact_mut(WORD_BYTES).zip(words.iter()) {
        chunk.copy_from_slice(&field_to_be_bytes(word));
    }
    Ok(CanonicalProofBytes(out))
}

/// Inverse of [`encode_proof`]. Rejects non-canonical coordinates and points
/// that are off the curve or outside the prime-order subgroup.
pub fn decode_proof(bytes: &CanonicalProofBytes) -> PipelineResult<Proof<Bn254>> {
    let mut coords = Vec::with_capacity(PROOF_WORDS);
    for (index, word) in bytes.words().enumerate() {
        let value = field_from_be_bytes::<Fq>(word).ok_or_else(|| {
            PipelineError::Encoding(format!("word {index} is not a canonical base field element"))
        })?;
        coords.push(value);
    }
    let [ax, ay, bx1, bx0, by1, by0, cx, cy]: [Fq; PROOF_WORDS] = coords
        .try_into()
        .map_err(|_| PipelineError::Encoding("proof is missing words".into()))?;

    let a = checked_g1(ax, ay, "A")?;
    let b = G2Affine::new_unchecked(Fq2::new(bx0, bx1), Fq2::new(by0, by1));
    if !b.is_on_curve() || !b.is_in_correct_subgroup_assuming_on_curve() {
        return Err(PipelineError::Encoding("B is not a valid G2 point".into()));
    }
    let c = checked_g1(cx, cy, "C")?;
    Ok(Proof { a, b, c })
}

fn checked_g1(x: Fq, y: Fq, label: &str) -> PipelineResult<G1Affine> {
    let point = G1Affine::new_unchecked(x, y);
    if !point.is_on_curve() || !point.is_in_correct_subgroup_assuming_on_curve() {
        return Err(PipelineError::Encoding(format!("{label} is not a valid G1 point")));
    }
    Ok(point)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown proof format '{0}' (expected json, hex or binary)")]
pub struct UnknownProofFormat(pub String);

/// On-disk rendering of the canonical proof.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProofFormat {
    /// `{"proof": ["<a0>", ..., "<c1>"]}` with decimal words.
    #[default]
    Json,
    /// `0x` followed by 512 hex digits.
    Hex,
    /// The raw 256 bytes.
    Binary,
}

impl ProofFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProofFormat::Json => "json",
            ProofFormat::Hex => "hex",
            ProofFormat::Binary => "binary",
        }
    }
}

impl fmt::Display for ProofFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProofFormat {
    type Err = UnknownProofFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(ProofFormat::Json),
            "hex" => Ok(ProofFormat::Hex),
            "binary" | "bin" => Ok(ProofFormat::Binary),
            _ => Err(UnknownProofFormat(s.to_string())),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct ProofJson {
    proof: Vec<String>,
}

pub fn render(bytes: &CanonicalProofBytes, format: ProofFormat) -> PipelineResult<Vec<u8>> {
    match format {
        ProofFormat::Json => {
            let doc = ProofJson {
                proof: bytes.decimal_words(),
            };
            serde_json::to_vec_pretty(&doc)
                .map_err(|err| PipelineError::Encoding(format!("failed to render json: {err}")))
        }
        ProofFormat::Hex => Ok(bytes.to_hex().into_bytes()),
        ProofFormat::Binary => Ok(bytes.as_bytes().to_vec()),
    }
}

/// Parse a rendered proof back into canonical bytes; the words are not
/// checked against the curve here (see [`decode_proof`]).
pub fn parse_rendered(data: &[u8], format: ProofFormat) -> PipelineResult<CanonicalProofBytes> {
    match format {
        ProofFormat::Binary => CanonicalProofBytes::from_bytes(data),
        ProofFormat::Hex => {
            let text = std::str::from_utf8(data)
                .map_err(|_| PipelineError::Encoding("hex proof is not utf-8".into()))?
                .trim();
            let digits = text.strip_prefix("0x").unwrap_or(text);
            let raw = hex::decode(digits)
                .map_err(|err| PipelineError::Encoding(format!("invalid hex proof: {err}")))?;
            CanonicalProofBytes::from_bytes(&raw)
        }
        ProofFormat::Json => {
            let doc: ProofJson = serde_json::from_slice(data)
                .map_err(|err| PipelineError::Encoding(format!("invalid json proof: {err}")))?;
            if doc.proof.len() != PROOF_WORDS {
                return Err(PipelineError::Encoding(format!(
                    "json proof has {} words, expected {PROOF_WORDS}",
                    doc.proof.len()
                )));
            }
            let mut out = [0u8; PROOF_BYTES];
            for (chunk, word) in out.chunks_exact_mut(WORD_BYTES).zip(&doc.proof) {
                let value: Fq = parse_field(word).map_err(|err| {
                    PipelineError::Encoding(format!("invalid proof word '{word}': {err}"))
                })?;
                chunk.copy_from_slice(&field_to_be_bytes(&value));
            }
            Ok(CanonicalProofBytes(out))
        }
    }
}

/// Render and atomically write the proof. Nothing is written if rendering fails.
pub fn write_proof(
    path: impl AsRef<Path>,
    bytes: &CanonicalProofBytes,
    format: ProofFormat,
) -> PipelineResult<()> {
    let path = path.as_ref();
    let rendered = render(bytes, format)?;
    write_atomic(path, &rendered).map_err(|source| PipelineError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Decimal rendering of the public inputs in verifier order.
pub fn public_signals(public: &[ark_bn254::Fr]) -> Vec<String> {
    public.iter().map(field_to_decimal).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;
    use ark_ec::AffineRepr;
    use ark_ff::UniformRand;
    use ark_std::test_rng;
    use proptest::prelude::*;

    fn sample_proof() -> Proof<Bn254> {
        let mut rng = test_rng();
        let scalar = ark_bn254::Fr::rand(&mut rng);
        Proof {
            a: (G1Affine::generator() * scalar).into(),
            b: (G2Affine::generator() * scalar).into(),
            c: (G1Affine::generator() * (scalar + scalar)).into(),
        }
    }

    #[test]
    fn encoding_is_deterministic_and_ordered() {
        let proof = sample_proof();
        let first = encode_proof(&proof).unwrap();
        assert_eq!(first, encode_proof(&proof).unwrap());

        let words: Vec<_> = first.words().collect();
        assert_eq!(words[0], &field_to_be_bytes(&proof.a.x));
        assert_eq!(words[2], &field_to_be_bytes(&proof.b.x.c1));
        assert_eq!(words[3], &field_to_be_bytes(&proof.b.x.c0));
        assert_eq!(words[7], &field_to_be_bytes(&proof.c.y));
        assert_eq!(decode_proof(&first).unwrap(), proof);
    }

    #[test]
    fn infinity_cannot_be_encoded() {
        let mut proof = sample_proof();
        proof.c = G1Affine::zero();
        assert_eq!(encode_proof(&proof).unwrap_err().kind(), FailureKind::Encoding);
    }

    #[test]
    fn every_format_parses_back() {
        let bytes = encode_proof(&sample_proof()).unwrap();
        for format in [ProofFormat::Json, ProofFormat::Hex, ProofFormat::Binary] {
            let rendered = render(&bytes, format).unwrap();
            assert_eq!(parse_rendered(&rendered, format).unwrap(), bytes, "{format}");
        }
        assert_eq!(render(&bytes, ProofFormat::Binary).unwrap().len(), PROOF_BYTES);
        assert_eq!(render(&bytes, ProofFormat::Hex).unwrap().len(), 2 + 2 * PROOF_BYTES);
    }

    #[test]
    fn json_rendering_is_a_proof_array() {
        let bytes = encode_proof(&sample_proof()).unwrap();
        let value: serde_json::Value =
            serde_json::from_slice(&render(&bytes, ProofFormat::Json).unwrap()).unwrap();
        let words = value["proof"].as_array().unwrap();
        assert_eq!(words.len(), PROOF_WORDS);
        assert!(words.iter().all(|w| w.as_str().unwrap().chars().all(|c| c.is_ascii_digit())));
    }

    #[test]
    fn swapped_g2_coordinates_are_rejected() {
        let mut raw = *encode_proof(&sample_proof()).unwrap().as_bytes();
        let (x_c1, x_c0) = raw[64..128].split_at_mut(32);
        x_c1.swap_with_slice(x_c0);
        let bytes = CanonicalProofBytes::from_bytes(&raw).unwrap();
        assert!(decode_proof(&bytes).is_err());
    }

    #[test]
    fn wrong_length_is_rejected() {
        assert!(CanonicalProofBytes::from_bytes(&[0u8; PROOF_BYTES - 1]).is_err());
        let json = br#"{"proof": ["1", "2"]}"#;
        assert!(parse_rendered(json, ProofFormat::Json).is_err());
    }

    #[test]
    fn atomic_write_creates_complete_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("proof.bin");
        let bytes = encode_proof(&sample_proof()).unwrap();
        write_proof(&path, &bytes, ProofFormat::Binary).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), bytes.as_bytes().to_vec());
    }

    proptest! {
        #[test]
        fn random_words_never_decode_to_a_bogus_proof(raw in proptest::collection::vec(any::<u8>(), PROOF_BYTES)) {
            let bytes = CanonicalProofBytes::from_bytes(&raw).unwrap();
            // A uniformly random word pair is almost never a curve point.
            prop_assert!(decode_proof(&bytes).is_err());
        }
    }
}
