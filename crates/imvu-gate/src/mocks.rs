use std::sync::atomic::{AtomicUsize, Ordering};

use crate::context::ActionContext;
use crate::gate::{Gate, GateId, GateVerdict};

/// Mock gate with a fixed verdict that counts its evaluations.
///
/// Useful for asserting that every gate of a class runs.
pub struct CountingGate {
    id: GateId,
    pass: bool,
    calls: AtomicUsize,
}

impl CountingGate {
    pub fn passing(id: GateId) -> Self {
        Self {
            id,
            pass: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(id: GateId) -> Self {
        Self {
            id,
            pass: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Gate for CountingGate {
    fn id(&self) -> GateId {
        self.id.clone()
    }

    fn evaluate(&self, _context: &ActionContext) -> GateVerdict {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.pass {
            GateVerdict::pass(self.id.clone())
        } else {
            GateVerdict::fail(self.id.clone(), "mock gate configured to fail")
        }
    }
}
