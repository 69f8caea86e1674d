//! The paired artifact unit and the binary formats of its parts.

use ark_bn254::{Bn254, Fr};
use ark_groth16::{ProvingKey, VerifyingKey};
use ark_relations::r1cs::ConstraintMatrices;
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize, SerializationError};
use eerc_circuit::{OperationKind, SlotLayout};
use thiserror::Error;

use crate::{descriptor::CircuitDescriptor, manifest::KeygenLabel};

pub const CONSTRAINT_SYSTEM_MAGIC: &[u8; 8] = b"EERCCS01";

const MAX_CONSTRAINTS: u64 = 1 << 24;
const MAX_VARIABLES: u64 = 1 << 24;
// 32-byte compressed scalar followed by a u64 column index.
const ENTRY_BYTES: usize = 40;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PairingError {
    #[error("descriptor is for {descriptor} but the constraint system was compiled for {compiled}")]
    KindMismatch {
        descriptor: OperationKind,
        compiled: OperationKind,
    },
    #[error("descriptor layout {descriptor:?} disagrees with compiled layout {compiled:?}")]
    LayoutMismatch {
        descriptor: SlotLayout,
        compiled: SlotLayout,
    },
    #[error("constraint system has {actual} instance variables, layout implies {expected}")]
    InstanceCount { expected: usize, actual: usize },
    #[error("proving key covers {actual} witness variables, constraint system has {expected}")]
    WitnessCount { expected: usize, actual: usize },
    #[error("verifying key accepts {actual} public inputs, layout declares {expected}")]
    VerifyingKeyInputs { expected: usize, actual: usize },
    #[error("proving key was not generated together with the verifying key")]
    KeyMismatch,
}

#[derive(Debug, Error)]
pub enum ArtifactFormatError {
    #[error("not a constraint system file (bad magic)")]
    BadMagic,
    #[error("constraint system file is truncated")]
    Truncated,
    #[error("malformed constraint system: {0}")]
    Malformed(String),
    #[error(transparent)]
    Serialization(#[from] SerializationError),
    #[error(transparent)]
    Pairing(#[from] PairingError),
}

/// R1CS of one operation as produced by setup-mode synthesis.
#[derive(Clone, Debug)]
pub struct CompiledCircuit {
    kind: OperationKind,
    layout: SlotLayout,
    matrices: ConstraintMatrices<Fr>,
}

impl CompiledCircuit {
    pub fn new(
        kind: OperationKind,
        layout: SlotLayout,
        matrices: ConstraintMatrices<Fr>,
    ) -> Result<Self, PairingError> {
        // Instance variable 0 is the constant one.
        if matrices.num_instance_variables != layout.public + 1 {
            return Err(PairingError::InstanceCount {
                expected: layout.public + 1,
                actual: matrices.num_instance_variables,
            });
        }
        Ok(Self {
            kind,
            layout,
            matrices,
        })
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn layout(&self) -> SlotLayout {
        self.layout
    }

    pub fn matrices(&self) -> &ConstraintMatrices<Fr> {
        &self.matrices
    }

    pub fn num_instance_variables(&self) -> usize {
        self.matrices.num_instance_variables
    }

    pub fn num_witness_variables(&self) -> usize {
        self.matrices.num_witness_variables
    }

    pub fn num_constraints(&self) -> usize {
        self.matrices.num_constraints
    }
}

/// Constraint system and the Groth16 keys derived from it, kept as one unit.
///
/// The only way to build one is [`CircuitArtifacts::pair`], which rejects
/// parts that cannot belong together.
#[derive(Clone, Debug)]
pub struct CircuitArtifacts {
    descriptor: CircuitDescriptor,
    compiled: CompiledCircuit,
    pk: ProvingKey<Bn254>,
    vk: VerifyingKey<Bn254>,
    keygen: KeygenLabel,
}

impl CircuitArtifacts {
    pub fn pair(
        descriptor: CircuitDescriptor,
        compiled: CompiledCircuit,
        pk: ProvingKey<Bn254>,
        vk: VerifyingKey<Bn254>,
        keygen: KeygenLabel,
    ) -> Result<Self, PairingError> {
        if descriptor.kind != compiled.kind {
            return Err(PairingError::KindMismatch {
                descriptor: descriptor.kind,
                compiled: compiled.kind,
            });
        }
        if descriptor.layout != compiled.layout {
            return Err(PairingError::LayoutMismatch {
                descriptor: descriptor.layout,
                compiled: compiled.layout,
            });
        }
        if pk.vk != vk {
            return Err(PairingError::KeyMismatch);
        }
        if vk.gamma_abc_g1.len() != compiled.num_instance_variables() {
            return Err(PairingError::VerifyingKeyInputs {
                expected: compiled.layout.public,
                actual: vk.gamma_abc_g1.len().saturating_sub(1),
            });
        }
        if pk.l_query.len() != compiled.num_witness_variables() {
            return Err(PairingError::WitnessCount {
                expected: compiled.num_witness_variables(),
                actual: pk.l_query.len(),
            });
        }
        Ok(Self {
            descriptor,
            compiled,
            pk,
            vk,
            keygen,
        })
    }

    pub fn descriptor(&self) -> &CircuitDescriptor {
        &self.descriptor
    }

    pub fn compiled(&self) -> &CompiledCircuit {
        &self.compiled
    }

    pub fn proving_key(&self) -> &ProvingKey<Bn254> {
        &self.pk
    }

    pub fn verifying_key(&self) -> &VerifyingKey<Bn254> {
        &self.vk
    }

    pub fn keygen(&self) -> KeygenLabel {
        self.keygen
    }

    pub fn fingerprint(&self) -> String {
        self.descriptor.fingerprint()
    }
}

pub fn serialize_proving_key(pk: &ProvingKey<Bn254>) -> Result<Vec<u8>, SerializationError> {
    let mut buf = Vec::with_capacity(pk.uncompressed_size());
    pk.serialize_uncompressed(&mut buf)?;
    Ok(buf)
}

pub fn deserialize_proving_key(bytes: &[u8]) -> Result<ProvingKey<Bn254>, SerializationError> {
    ProvingKey::deserialize_uncompressed(bytes)
}

pub fn serialize_verifying_key(vk: &VerifyingKey<Bn254>) -> Result<Vec<u8>, SerializationError> {
    let mut buf = Vec::with_capacity(vk.compressed_size());
    vk.serialize_compressed(&mut buf)?;
    Ok(buf)
}

pub fn deserialize_verifying_key(bytes: &[u8]) -> Result<VerifyingKey<Bn254>, SerializationError> {
    VerifyingKey::deserialize_compressed(bytes)
}

/// `EERCCS01 | kind u8 | public u64 | private u64 | instance u64 | witness u64 |
/// constraints u64 | nnz(a,b,c) u64 x3 | rows of a, b, c`. Integers are
/// little-endian; each row is a u64 length followed by `(scalar, column)` entries.
pub fn serialize_constraint_system(
    compiled: &CompiledCircuit,
) -> Result<Vec<u8>, SerializationError> {
    let m = &compiled.matrices;
    let entries = m.a_num_non_zero + m.b_num_non_zero + m.c_num_non_zero;
    let mut out = Vec::with_capacity(96 + 24 * m.num_constraints + ENTRY_BYTES * entries);

    out.extend_from_slice(CONSTRAINT_SYSTEM_MAGIC);
    out.push(compiled.kind.tag());
    for value in [
        compiled.layout.public,
        compiled.layout.private,
        m.num_instance_variables,
        m.num_witness_variables,
        m.num_constraints,
        m.a_num_non_zero,
        m.b_num_non_zero,
        m.c_num_non_zero,
    ] {
        out.extend_from_slice(&(value as u64).to_le_bytes());
    }
    for matrix in [&m.a, &m.b, &m.c] {
        for row in matrix {
            out.extend_from_slice(&(row.len() as u64).to_le_bytes());
            for (coeff, column) in row {
                coeff.serialize_compressed(&mut out)?;
                out.extend_from_slice(&(*column as u64).to_le_bytes());
            }
        }
    }
    Ok(out)
}

pub fn deserialize_constraint_system(bytes: &[u8]) -> Result<CompiledCircuit, ArtifactFormatError> {
    let mut reader = ByteReader { rest: bytes };
    if reader.take(CONSTRAINT_SYSTEM_MAGIC.len())? != CONSTRAINT_SYSTEM_MAGIC {
        return Err(ArtifactFormatError::BadMagic);
    }
    let tag = reader.take(1)?[0];
    let kind = OperationKind::from_tag(tag)
        .ok_or_else(|| ArtifactFormatError::Malformed(format!("unknown operation tag {tag}")))?;
    let layout = SlotLayout::new(reader.bounded(MAX_VARIABLES)?, reader.bounded(MAX_VARIABLES)?);
    let num_instance_variables = reader.bounded(MAX_VARIABLES)?;
    let num_witness_variables = reader.bounded(MAX_VARIABLES)?;
    let num_constraints = reader.bounded(MAX_CONSTRAINTS)?;
    let nnz = [
        reader.bounded(u64::MAX)?,
        reader.bounded(u64::MAX)?,
        reader.bounded(u64::MAX)?,
    ];
    let columns = num_instance_variables + num_witness_variables;

    let mut matrices: Vec<Vec<Vec<(Fr, usize)>>> = Vec::with_capacity(3);
    for (name, expected_nnz) in ["a", "b", "c"].into_iter().zip(nnz) {
        let mut matrix = Vec::with_capacity(num_constraints.min(reader.rest.len() / 8));
        let mut seen = 0usize;
        for _ in 0..num_constraints {
            let len = reader.bounded(columns as u64)?;
            if reader.rest.len() < len * ENTRY_BYTES {
                return Err(ArtifactFormatError::Truncated);
            }
            let mut row = Vec::with_capacity(len);
            for _ in 0..len {
                let coeff = Fr::deserialize_compressed(&mut reader.rest)?;
                let column = reader.bounded(u64::MAX)?;
                if column >= columns {
                    return Err(ArtifactFormatError::Malformed(format!(
                        "matrix {name} references variable {column} of {columns}"
                    )));
                }
                row.push((coeff, column));
            }
            seen += len;
            matrix.push(row);
        }
        if seen != expected_nnz {
            return Err(ArtifactFormatError::Malformed(format!(
                "matrix {name} has {seen} entries, header declares {expected_nnz}"
            )));
        }
        matrices.push(matrix);
    }
    if !reader.rest.is_empty() {
        return Err(ArtifactFormatError::Malformed(format!(
            "{} trailing bytes",
            reader.rest.len()
        )));
    }

    let mut matrices = matrices.into_iter();
    let (Some(a), Some(b), Some(c)) = (matrices.next(), matrices.next(), matrices.next()) else {
        return Err(ArtifactFormatError::Truncated);
    };
    let matrices = ConstraintMatrices {
        num_instance_variables,
        num_witness_variables,
        num_constraints,
        a_num_non_zero: nnz[0],
        b_num_non_zero: nnz[1],
        c_num_non_zero: nnz[2],
        a,
        b,
        c,
    };
    Ok(CompiledCircuit::new(kind, layout, matrices)?)
}

struct ByteReader<'a> {
    rest: &'a [u8],
}

impl<'a> ByteReader<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8], ArtifactFormatError> {
        if self.rest.len() < len {
            return Err(ArtifactFormatError::Truncated);
        }
        let (head, tail) = self.rest.split_at(len);
        self.rest = tail;
        Ok(head)
    }

    fn bounded(&mut self, max: u64) -> Result<usize, ArtifactFormatError> {
        let mut word = [0u8; 8];
        word.copy_from_slice(self.take(8)?);
        let value = u64::from_le_bytes(word);
        if value > max {
            return Err(ArtifactFormatError::Malformed(format!(
                "count {value} exceeds limit {max}"
            )));
        }
        usize::try_from(value)
            .map_err(|_| ArtifactFormatError::Malformed(format!("count {value} overflows usize")))
    }
}
