use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::GateError;
use crate::gate::GateId;

/// Action classes the platform itself gates.
pub const ACTION_CLASSES: [&str; 10] = [
    "tenant.create",
    "tenant.scale",
    "tenant.suspend",
    "tenant.resume",
    "tenant.export",
    "tenant.delete",
    "usage.record",
    "consent.record",
    "network.routes",
    "identity.rotate",
];

const EMBEDDED: &str = include_str!("action_classes.toml");

/// Static mapping of action class to its ordered gate list.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionClassTable {
    classes: BTreeMap<String, Vec<GateId>>,
}

impl ActionClassTable {
    /// The table shipped with the platform.
    pub fn embedded() -> Result<Self, GateError> {
        Self::from_toml_str(EMBEDDED)
    }

    pub fn from_toml_str(source: &str) -> Result<Self, GateError> {
        let table: ActionClassTable =
            toml::from_str(source).map_err(|e| GateError::Config(e.to_string()))?;
        table.validate()?;
        Ok(table)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, GateError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| GateError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&source)
    }

    /// Declare or replace an action class.
    pub fn insert(&mut self, action_class: impl Into<String>, gates: Vec<GateId>) -> Result<(), GateError> {
        let action_class = action_class.into();
        validate_class(&action_class, &gates)?;
        self.classes.insert(action_class, gates);
        Ok(())
    }

    pub fn gates_for(&self, action_class: &str) -> Option<&[GateId]> {
        self.classes.get(action_class).map(Vec::as_slice)
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.classes.keys().map(String::as_str)
    }

    /// Every gate id referenced by any class.
    pub fn referenced_gates(&self) -> Vec<GateId> {
        let mut gates: Vec<GateId> = self.classes.values().flatten().cloned().collect();
        gates.sort();
        gates.dedup();
        gates
    }

    fn validate(&self) -> Result<(), GateError> {
        self.classes
            .iter()
            .try_for_each(|(class, gates)| validate_class(class, gates))
    }
}

fn validate_class(action_class: &str, gates: &[GateId]) -> Result<(), GateError> {
    if action_class.trim().is_empty() {
        return Err(GateError::Config("action class name must not be empty".into()));
    }
    if gates.is_empty() {
        return Err(GateError::Config(format!(
            "action class {action_class} requires no gates"
        )));
    }
    for (i, gate) in gates.iter().enumerate() {
        if gates[..i].contains(gate) {
            return Err(GateError::Config(format!(
                "action class {action_class} lists {gate} twice"
            )));
        }
    }
    Ok(())
}
