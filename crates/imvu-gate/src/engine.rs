use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::context::ActionContext;
use crate::error::{ComplianceError, GateError};
use crate::gate::{Evaluation, FnGate, Gate, GateId, GateVerdict};
use crate::gates::standard_gates;
use crate::table::ActionClassTable;

/// Registry of gates plus the action-class table.
pub struct GateEngine {
    gates: HashMap<GateId, Arc<dyn Gate>>,
    table: ActionClassTable,
}

impl GateEngine {
    /// Engine with no gates registered.
    pub fn new(table: ActionClassTable) -> Self {
        Self {
            gates: HashMap::new(),
            table,
        }
    }

    /// Engine with all seventeen standard gates registered.
    pub fn standard(table: ActionClassTable) -> Self {
        let mut engine = Self::new(table);
        for gate in standard_gates() {
            engine.register(gate);
        }
        engine
    }

    /// Register a gate, replacing any gate with the same id.
    pub fn register(&mut self, gate: Arc<dyn Gate>) -> Option<Arc<dyn Gate>> {
        self.gates.insert(gate.id(), gate)
    }

    /// Register a closure as a gate.
    pub fn register_fn<F>(&mut self, id: GateId, check: F) -> Option<Arc<dyn Gate>>
    where
        F: Fn(&ActionContext) -> Result<(), String> + Send + Sync + 'static,
    {
        self.register(Arc::new(FnGate::new(id, check)))
    }

    pub fn is_registered(&self, id: &GateId) -> bool {
        self.gates.contains_key(id)
    }

    pub fn table(&self) -> &ActionClassTable {
        &self.table
    }

    /// Gates the table names that nobody registered.
    pub fn missing_gates(&self) -> Vec<GateId> {
        self.table
            .referenced_gates()
            .into_iter()
            .filter(|g| !self.gates.contains_key(g))
            .collect()
    }

    /// Evaluate every gate required for `action_class`.
    ///
    /// All gates run even after a failure. Returns the passed set on success
    /// and [`GateError::Compliance`] carrying every verdict otherwise.
    pub fn evaluate(
        &self,
        action_class: &str,
        context: &ActionContext,
    ) -> Result<Evaluation, GateError> {
        let required = self
            .table
            .gates_for(action_class)
            .ok_or_else(|| GateError::UnknownActionClass(action_class.to_string()))?;

        let gates = required
            .iter()
            .map(|id| {
                self.gates
                    .get(id)
                    .map(|gate| (id, gate))
                    .ok_or_else(|| GateError::UnregisteredGate {
                        action_class: action_class.to_string(),
                        gate: id.clone(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let verdicts: Vec<GateVerdict> = gates
            .into_iter()
            .map(|(id, gate)| {
                let mut verdict = gate.evaluate(context);
                verdict.gate = id.clone();
                debug!(
                    action_class,
                    gate = %verdict.gate,
                    passed = verdict.passed,
                    reason = verdict.reason.as_deref().unwrap_or(""),
                    "Gate evaluated"
                );
                verdict
            })
            .collect();

        if verdicts.iter().all(|v| v.passed) {
            return Ok(Evaluation {
                action_class: action_class.to_string(),
                verdicts,
            });
        }

        let error = ComplianceError {
            action_class: action_class.to_string(),
            verdicts,
        };
        let failed: Vec<String> = error.failed().map(|v| v.gate.to_string()).collect();
        warn!(action_class, ?failed, "Compliance gates denied action");
        Err(GateError::Compliance(error))
    }
}
