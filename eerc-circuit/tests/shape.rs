use ark_bn254::Fr;
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystem, SynthesisMode};
use ark_std::{test_rng, UniformRand};
use eerc_circuit::{
    transfer::transfer_public_inputs, withdraw::withdraw_public_inputs, CircuitRegistry,
    OperationKind,
};

fn setup_shape(kind: OperationKind) -> (usize, usize, usize) {
    let factory = CircuitRegistry::default().resolve(kind).unwrap();
    let cs = ConstraintSystem::<Fr>::new_ref();
    cs.set_mode(SynthesisMode::Setup);
    factory.blank().generate_constraints(cs.clone()).unwrap();
    cs.finalize();
    (
        cs.num_instance_variables(),
        cs.num_witness_variables(),
        cs.num_constraints(),
    )
}

fn prove_shape(kind: OperationKind, public: &[Fr], private: &[Fr]) -> (usize, usize, usize) {
    let factory = CircuitRegistry::default().resolve(kind).unwrap();
    let cs = ConstraintSystem::<Fr>::new_ref();
    factory.assigned(public, private).generate_constraints(cs.clone()).unwrap();
    assert!(cs.is_satisfied().unwrap());
    cs.finalize();
    (
        cs.num_instance_variables(),
        cs.num_witness_variables(),
        cs.num_constraints(),
    )
}

#[test]
fn withdraw_setup_and_prove_shapes_agree() {
    let mut rng = test_rng();
    let root = Fr::rand(&mut rng);
    let blinding = Fr::rand(&mut rng);
    let public = withdraw_public_inputs(root, 77, blinding);

    let setup = setup_shape(OperationKind::Withdraw);
    assert_eq!(setup.0, 1 + 2);
    assert_eq!(setup, prove_shape(OperationKind::Withdraw, &public, &[Fr::from(77u64), blinding]));
}

#[test]
fn transfer_setup_and_prove_shapes_agree() {
    let mut rng = test_rng();
    let root = Fr::rand(&mut rng);
    let (sb, rb) = (Fr::rand(&mut rng), Fr::rand(&mut rng));
    let public = transfer_public_inputs(root, 1_000, 250, sb, rb);
    let private = [Fr::from(1_000u64), Fr::from(250u64), sb, rb];

    let setup = setup_shape(OperationKind::Transfer);
    assert_eq!(setup.0, 1 + 3);
    assert_eq!(setup, prove_shape(OperationKind::Transfer, &public, &private));
}

#[test]
fn circuits_differ_in_shape() {
    assert_ne!(
        setup_shape(OperationKind::Transfer),
        setup_shape(OperationKind::Withdraw)
    );
}
