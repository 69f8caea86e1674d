// eerc/eerc-circuit/src/gadgets/mod.rs
// Numan Thabit 2025

pub mod binding;
pub mod range;

pub use binding::{bind, bind_native, enforce_nonzero};
pub use range::{enforce_u64, AMOUNT_BITS};
