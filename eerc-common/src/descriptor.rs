use eerc_circuit::{CircuitFactory, OperationKind, SlotLayout};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PARAMETER_SET: &str = "default";

const FINGERPRINT_DOMAIN: &[u8] = b"eerc/circuit-descriptor/v1";
const PROOF_SYSTEM: &[u8] = b"groth16-bn254";
const SLOT_FINGERPRINT_CHARS: usize = 16;

/// Identity of a compiled artifact set. Two descriptors that differ in any
/// field have different fingerprints and never share a cache slot.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CircuitDescriptor {
    pub kind: OperationKind,
    pub circuit_version: u32,
    pub layout: SlotLayout,
    pub parameter_set: String,
}

impl CircuitDescriptor {
    pub fn from_factory(factory: &CircuitFactory, parameter_set: impl Into<String>) -> Self {
        Self {
            kind: factory.kind(),
            circuit_version: factory.version(),
            layout: factory.layout(),
            parameter_set: parameter_set.into(),
        }
    }

    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(FINGERPRINT_DOMAIN);
        hasher.update(&(PROOF_SYSTEM.len() as u64).to_le_bytes());
        hasher.update(PROOF_SYSTEM);
        hasher.update(&[self.kind.tag()]);
        hasher.update(&self.circuit_version.to_le_bytes());
        hasher.update(&(self.layout.public as u64).to_le_bytes());
        hasher.update(&(self.layout.private as u64).to_le_bytes());
        hasher.update(&(self.parameter_set.len() as u64).to_le_bytes());
        hasher.update(self.parameter_set.as_bytes());
        hasher.finalize().to_hex().to_string()
    }

    /// Directory-safe slot name, e.g. `withdraw-v1-3f9a0c...`.
    pub fn cache_slot(&self) -> String {
        let fingerprint = self.fingerprint();
        format!(
            "{}-v{}-{}",
            self.kind,
            self.circuit_version,
            &fingerprint[..SLOT_FINGERPRINT_CHARS]
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eerc_circuit::CircuitRegistry;

    fn withdraw() -> CircuitDescriptor {
        let factory = CircuitRegistry::default()
            .resolve(OperationKind::Withdraw)
            .unwrap();
        CircuitDescriptor::from_factory(&factory, DEFAULT_PARAMETER_SET)
    }

    #[test]
    fn fingerprint_is_stable() {
        assert_eq!(withdraw().fingerprint(), withdraw().fingerprint());
        assert_eq!(withdraw().fingerprint().len(), 64);
    }

    #[test]
    fn every_field_feeds_the_fingerprint() {
        let base = withdraw();
        let variants = [
            CircuitDescriptor {
                kind: OperationKind::Transfer,
                ..base.clone()
            },
            CircuitDescriptor {
                circuit_version: base.circuit_version + 1,
                ..base.clone()
            },
            CircuitDescriptor {
                layout: SlotLayout::new(2, 3),
                ..base.clone()
            },
            CircuitDescriptor {
                parameter_set: "staging".into(),
                ..base.clone()
            },
        ];
        for variant in variants {
            assert_ne!(variant.fingerprint(), base.fingerprint());
            assert_ne!(variant.cache_slot(), base.cache_slot());
        }
    }

    #[test]
    fn cache_slot_names_kind_and_version() {
        let slot = withdraw().cache_slot();
        assert!(slot.starts_with("withdraw-v1-"));
        assert_eq!(slot.len(), "withdraw-v1-".len() + 16);
    }
}
