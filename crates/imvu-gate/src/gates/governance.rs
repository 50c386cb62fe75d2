use crate::context::{ActionContext, ContextKey};
use crate::gate::{Gate, GateId, GateVerdict};

use super::require_text;

/// Gate 9: the tenant carries a jurisdiction tag such as `EU` or `US-CA`.
pub struct JurisdictionTaggingGate;

impl Gate for JurisdictionTaggingGate {
    fn id(&self) -> GateId {
        GateId::JurisdictionTagging
    }

    fn evaluate(&self, context: &ActionContext) -> GateVerdict {
        GateVerdict::from_check(self.id(), check_jurisdiction(context))
    }
}

fn check_jurisdiction(context: &ActionContext) -> Result<(), String> {
    let tag = require_text(context, ContextKey::Jurisdiction)?;
    let well_formed = (2..=8).contains(&tag.len())
        && tag
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '-');
    if well_formed {
        Ok(())
    } else {
        Err(format!("malformed jurisdiction tag {tag:?}"))
    }
}

/// Gate 10: the action references a recorded consent.
pub struct ConsentLoggingGate;

impl Gate for ConsentLoggingGate {
    fn id(&self) -> GateId {
        GateId::ConsentLogging
    }

    fn evaluate(&self, context: &ActionContext) -> GateVerdict {
        GateVerdict::from_check(
            self.id(),
            require_text(context, ContextKey::ConsentRef).map(|_| ()),
        )
    }
}

/// Gate 11: the action carries a request id for the audit trail.
pub struct AuditLoggingGate;

impl Gate for AuditLoggingGate {
    fn id(&self) -> GateId {
        GateId::AuditLogging
    }

    fn evaluate(&self, context: &ActionContext) -> GateVerdict {
        GateVerdict::from_check(
            self.id(),
            require_text(context, ContextKey::RequestId).map(|_| ()),
        )
    }
}

/// Gate 12: the action is anchored to an immutable snapshot (a 32-byte hash
/// in hex).
pub struct ImmutableSnapshotsGate;

impl Gate for ImmutableSnapshotsGate {
    fn id(&self) -> GateId {
        GateId::ImmutableSnapshots
    }

    fn evaluate(&self, context: &ActionContext) -> GateVerdict {
        GateVerdict::from_check(self.id(), check_snapshot(context))
    }
}

fn check_snapshot(context: &ActionContext) -> Result<(), String> {
    let snapshot = require_text(context, ContextKey::SnapshotRef)?;
    if snapshot.len() == 64 && snapshot.chars().all(|c| c.is_ascii_hexdigit()) {
        Ok(())
    } else {
        Err(format!("snapshot ref {snapshot:?} is not a 64-digit hex hash"))
    }
}

/// Gate 13: the tenant can leave: there is an export target or a published
/// export bundle.
pub struct ExitPortabilityGate;

impl Gate for ExitPortabilityGate {
    fn id(&self) -> GateId {
        GateId::ExitPortability
    }

    fn evaluate(&self, context: &ActionContext) -> GateVerdict {
        let portable = context.non_empty_text(ContextKey::ExportTarget).is_some()
            || context.non_empty_text(ContextKey::ExportBundle).is_some();
        if portable {
            GateVerdict::pass(self.id())
        } else {
            GateVerdict::fail(self.id(), "no export target or export bundle")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jurisdiction_tags() {
        let gate = JurisdictionTaggingGate;
        for ok in ["EU", "US", "US-CA", "APAC2"] {
            let ctx = ActionContext::new().with(ContextKey::Jurisdiction, ok);
            assert!(gate.evaluate(&ctx).passed, "{ok} should pass");
        }
        for bad in ["E", "eu", "EUROPEANU", "EU_1"] {
            let ctx = ActionContext::new().with(ContextKey::Jurisdiction, bad);
            assert!(!gate.evaluate(&ctx).passed, "{bad} should fail");
        }
        assert!(!gate.evaluate(&ActionContext::new()).passed);
    }

    #[test]
    fn consent_and_audit_refs() {
        let ctx = ActionContext::new()
            .with(ContextKey::ConsentRef, "consent-1")
            .with(ContextKey::RequestId, "req-1");
        assert!(ConsentLoggingGate.evaluate(&ctx).passed);
        assert!(AuditLoggingGate.evaluate(&ctx).passed);
        assert!(!ConsentLoggingGate.evaluate(&ActionContext::new()).passed);
        assert!(!AuditLoggingGate.evaluate(&ActionContext::new()).passed);
    }

    #[test]
    fn snapshot_must_be_a_hash() {
        let gate = ImmutableSnapshotsGate;
        let ok = ActionContext::new().with(ContextKey::SnapshotRef, "ab".repeat(32));
        assert!(gate.evaluate(&ok).passed);
        let short = ActionContext::new().with(ContextKey::SnapshotRef, "abcd");
        assert!(!gate.evaluate(&short).passed);
        let not_hex = ActionContext::new().with(ContextKey::SnapshotRef, "zz".repeat(32));
        assert!(!gate.evaluate(&not_hex).passed);
    }

    #[test]
    fn exit_portability() {
        let gate = ExitPortabilityGate;
        assert!(!gate.evaluate(&ActionContext::new()).passed);
        let target = ActionContext::new().with(ContextKey::ExportTarget, "/exports");
        assert!(gate.evaluate(&target).passed);
        let bundle = ActionContext::new().with(ContextKey::ExportBundle, "/exports/imvu-1-1");
        assert!(gate.evaluate(&bundle).passed);
    }
}
