use ark_bn254::Fr;
use eerc_circuit::{OperationKind, SlotLayout};
use zeroize::Zeroize;

use crate::{
    artifacts::CompiledCircuit,
    error::{InputSection, PipelineError, PipelineResult},
    field::FieldError,
    inputs::{InputValue, Inputs},
};

/// Slot values for one proof request. Cleared from memory when dropped;
/// proving clears the assignment it copies out of this.
pub struct Witness {
    kind: OperationKind,
    public: Vec<Fr>,
    private: Vec<Fr>,
}

impl Witness {
    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn public(&self) -> &[Fr] {
        &self.public
    }

    pub fn private(&self) -> &[Fr] {
        &self.private
    }
}

impl Drop for Witness {
    fn drop(&mut self) {
        self.public.zeroize();
        self.private.zeroize();
    }
}

impl std::fmt::Debug for Witness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Witness")
            .field("kind", &self.kind)
            .field("public", &self.public.len())
            .field("private", &self.private.len())
            .finish()
    }
}

/// Slot-count validation; cheap, and always run before any cryptographic work.
pub fn check_shape(layout: SlotLayout, inputs: &Inputs) -> PipelineResult<()> {
    for (section, expected, actual) in [
        (InputSection::Public, layout.public, inputs.public.len()),
        (InputSection::Private, layout.private, inputs.private.len()),
    ] {
        if expected != actual {
            return Err(PipelineError::InputShapeMismatch {
                section,
                expected,
                actual,
            });
        }
    }
    Ok(())
}

/// Assign `inputs` to the slots of `compiled`, in declared order.
pub fn build_witness(compiled: &CompiledCircuit, inputs: &Inputs) -> PipelineResult<Witness> {
    check_shape(compiled.layout(), inputs)?;
    Ok(Witness {
        kind: compiled.kind(),
        public: convert(InputSection::Public, &inputs.public)?,
        private: convert(InputSection::Private, &inputs.private)?,
    })
}

fn convert(section: InputSection, values: &[InputValue]) -> PipelineResult<Vec<Fr>> {
    let mut out = Vec::with_capacity(values.len());
    for (index, value) in values.iter().enumerate() {
        match value.to_field() {
            Ok(fr) => out.push(fr),
            Err(err) => {
                out.zeroize();
                return Err(field_error(section, index, err));
            }
        }
    }
    Ok(out)
}

fn field_error(section: InputSection, index: usize, err: FieldError) -> PipelineError {
    if err.is_range() {
        PipelineError::InputRange {
            section,
            index,
            reason: err.to_string(),
        }
    } else {
        PipelineError::InputParse(format!(
            "{} #{index}: {err}",
            section.json_key()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;
    use ark_relations::r1cs::ConstraintMatrices;

    fn withdraw_shape() -> CompiledCircuit {
        let matrices = ConstraintMatrices {
            num_instance_variables: 3,
            num_witness_variables: 2,
            num_constraints: 0,
            a_num_non_zero: 0,
            b_num_non_zero: 0,
            c_num_non_zero: 0,
            a: vec![],
            b: vec![],
            c: vec![],
        };
        CompiledCircuit::new(OperationKind::Withdraw, SlotLayout::new(2, 2), matrices).unwrap()
    }

    #[test]
    fn assigns_slots_in_declared_order() {
        let inputs = Inputs::new([5u64, 6], [7u64, 8]);
        let witness = build_witness(&withdraw_shape(), &inputs).unwrap();
        assert_eq!(witness.kind(), OperationKind::Withdraw);
        assert_eq!(witness.public(), &[Fr::from(5u64), Fr::from(6u64)]);
        assert_eq!(witness.private(), &[Fr::from(7u64), Fr::from(8u64)]);
    }

    #[test]
    fn extra_private_value_is_a_shape_mismatch() {
        let inputs = Inputs::new([5u64, 6], [7u64, 8, 9]);
        match build_witness(&withdraw_shape(), &inputs).unwrap_err() {
            PipelineError::InputShapeMismatch {
                section,
                expected,
                actual,
            } => {
                assert_eq!(section, InputSection::Private);
                assert_eq!((expected, actual), (2, 3));
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn missing_public_value_is_a_shape_mismatch() {
        let inputs = Inputs::new([5u64], [7u64, 8]);
        assert_eq!(
            check_shape(SlotLayout::new(2, 2), &inputs).unwrap_err().kind(),
            FailureKind::InputShapeMismatch
        );
    }

    #[test]
    fn oversized_value_is_a_range_error() {
        let modulus =
            "21888242871839275222246405745257275088548364400416034343698204186575808495617";
        let inputs = Inputs::new([InputValue::from(5u64), InputValue::from(modulus)], [7u64, 8]);
        match build_witness(&withdraw_shape(), &inputs).unwrap_err() {
            PipelineError::InputRange { section, index, .. } => {
                assert_eq!(section, InputSection::Public);
                assert_eq!(index, 1);
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn garbage_text_is_a_parse_error() {
        let inputs = Inputs::new([5u64, 6], [InputValue::from("seven"), InputValue::from(8u64)]);
        assert_eq!(
            build_witness(&withdraw_shape(), &inputs).unwrap_err().kind(),
            FailureKind::InputParse
        );
    }
}
