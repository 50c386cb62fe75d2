use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use imvu_ledger::{EventType, LedgerEvent};
use imvu_types::{TenantId, TimeRange};
use serde::{Deserialize, Serialize};

/// Payload value marking an audited gate denial.
pub const GATE_DENIED: &str = "gate-denied";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateTally {
    pub passed: u64,
    pub failed: u64,
}

/// Per-gate outcome of every gated action recorded on a chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceReport {
    pub tenant_id: TenantId,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub actions_passed: u64,
    pub actions_denied: u64,
    /// Keyed by gate id.
    pub gates: BTreeMap<String, GateTally>,
    /// Action classes seen, with how often each was denied.
    pub denials_by_class: BTreeMap<String, u64>,
}

impl ComplianceReport {
    pub fn from_events(tenant_id: TenantId, range: TimeRange, events: &[LedgerEvent]) -> Self {
        let mut report = Self {
            tenant_id,
            start: range.start,
            end: range.end,
            actions_passed: 0,
            actions_denied: 0,
            gates: BTreeMap::new(),
            denials_by_class: BTreeMap::new(),
        };

        for event in events {
            let denied = event.event_type == EventType::AuditAction
                && event.payload_str("action") == Some(GATE_DENIED);
            if denied {
                report.actions_denied += 1;
                if let Some(class) = event.payload_str("action_class") {
                    *report.denials_by_class.entry(class.to_string()).or_default() += 1;
                }
                for gate in gate_list(event, "failed_gates") {
                    report.gates.entry(gate).or_default().failed += 1;
                }
            } else if event.payload.contains_key("passed_gates") {
                report.actions_passed += 1;
            } else {
                continue;
            }
            for gate in gate_list(event, "passed_gates") {
                report.gates.entry(gate).or_default().passed += 1;
            }
        }
        report
    }

    pub fn tally(&self, gate: &str) -> GateTally {
        self.gates.get(gate).copied().unwrap_or_default()
    }
}

fn gate_list(event: &LedgerEvent, key: &str) -> Vec<String> {
    event
        .payload
        .get(key)
        .and_then(|v| v.as_array())
        .map(|gates| {
            gates
                .iter()
                .filter_map(|g| g.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}
