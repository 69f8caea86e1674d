// eerc/eerc-circuit/src/registry.rs
// Numan Thabit 2025

use std::collections::HashMap;

use crate::{
    CircuitDefinition, CircuitFactory, OperationKind, TransferCircuit, UnknownOperation,
    WithdrawCircuit,
};

/// Maps operation kinds to the factories that build their circuits.
#[derive(Clone, Debug)]
pub struct CircuitRegistry {
    factories: HashMap<OperationKind, CircuitFactory>,
}

impl CircuitRegistry {
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registers `definition`, replacing any earlier circuit for the same kind.
    pub fn register(&mut self, definition: impl CircuitDefinition) -> Option<CircuitFactory> {
        let factory = CircuitFactory::new(definition);
        self.factories.insert(factory.kind(), factory)
    }

    pub fn resolve(&self, kind: OperationKind) -> Result<CircuitFactory, UnknownOperation> {
        self.factories
            .get(&kind)
            .cloned()
            .ok_or_else(|| UnknownOperation(kind.as_str().to_string()))
    }

    pub fn resolve_name(&self, name: &str) -> Result<CircuitFactory, UnknownOperation> {
        self.resolve(name.parse()?)
    }

    pub fn kinds(&self) -> impl Iterator<Item = OperationKind> + '_ {
        self.factories.keys().copied()
    }
}

impl Default for CircuitRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(TransferCircuit);
        registry.register(WithdrawCircuit);
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_resolves_both_operations() {
        let registry = CircuitRegistry::default();
        assert_eq!(
            registry.resolve(OperationKind::Transfer).unwrap().layout(),
            crate::transfer::TRANSFER_LAYOUT
        );
        assert_eq!(
            registry.resolve_name("withdraw").unwrap().kind(),
            OperationKind::Withdraw
        );
        let mut kinds: Vec<_> = registry.kinds().collect();
        kinds.sort();
        assert_eq!(kinds, OperationKind::ALL);
    }

    #[test]
    fn unregistered_operation_is_unknown() {
        let mut registry = CircuitRegistry::empty();
        registry.register(WithdrawCircuit);
        assert_eq!(registry.kinds().collect::<Vec<_>>(), [OperationKind::Withdraw]);
        assert_eq!(
            registry.resolve(OperationKind::Transfer).unwrap_err(),
            UnknownOperation("transfer".into())
        );
        assert!(registry.resolve_name("mint").is_err());
    }
}
