use serde::{Deserialize, Serialize};

/// Tenant lifecycle status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenantStatus {
    Provisioning,
    Active,
    Scaling,
    Suspended,
    Exported,
    Deleted,
}

/// Lifecycle transitions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    Activate,
    BeginScale,
    CompleteScale,
    Suspend,
    Resume,
    Export,
    Delete,
}

impl TenantStatus {
    /// Status after `transition`, or `None` if the transition is illegal here.
    pub fn next(self, transition: Transition) -> Option<TenantStatus> {
        use TenantStatus::*;
        use Transition::*;
        match (self, transition) {
            (Provisioning, Activate) => Some(Active),
            (Active, BeginScale) => Some(Scaling),
            (Scaling, CompleteScale) => Some(Active),
            (Active, Suspend) => Some(Suspended),
            (Suspended, Resume) => Some(Active),
            (Active | Suspended, Export) => Some(Exported),
            (Exported, Delete) => Some(Deleted),
            _ => None,
        }
    }

    pub fn can(self, transition: Transition) -> bool {
        self.next(transition).is_some()
    }

    /// Usage may be metered and routes changed.
    pub fn is_operational(self) -> bool {
        matches!(self, TenantStatus::Active | TenantStatus::Scaling)
    }

    pub fn is_terminal(self) -> bool {
        self == TenantStatus::Deleted
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TenantStatus::Provisioning => "provisioning",
            TenantStatus::Active => "active",
            TenantStatus::Scaling => "scaling",
            TenantStatus::Suspended => "suspended",
            TenantStatus::Exported => "exported",
            TenantStatus::Deleted => "deleted",
        }
    }
}

impl Transition {
    pub fn as_str(self) -> &'static str {
        match self {
            Transition::Activate => "activate",
            Transition::BeginScale => "begin_scale",
            Transition::CompleteScale => "complete_scale",
            Transition::Suspend => "suspend",
            Transition::Resume => "resume",
            Transition::Export => "export",
            Transition::Delete => "delete",
        }
    }
}

impl std::fmt::Display for TenantStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::fmt::Display for Transition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_STATUSES: [TenantStatus; 6] = [
        TenantStatus::Provisioning,
        TenantStatus::Active,
        TenantStatus::Scaling,
        TenantStatus::Suspended,
        TenantStatus::Exported,
        TenantStatus::Deleted,
    ];

    const ALL_TRANSITIONS: [Transition; 7] = [
        Transition::Activate,
        Transition::BeginScale,
        Transition::CompleteScale,
        Transition::Suspend,
        Transition::Resume,
        Transition::Export,
        Transition::Delete,
    ];

    #[test]
    fn legal_transitions() {
        use TenantStatus::*;
        assert_eq!(Provisioning.next(Transition::Activate), Some(Active));
        assert_eq!(Active.next(Transition::BeginScale), Some(Scaling));
        assert_eq!(Scaling.next(Transition::CompleteScale), Some(Active));
        assert_eq!(Active.next(Transition::Suspend), Some(Suspended));
        assert_eq!(Suspended.next(Transition::Resume), Some(Active));
        assert_eq!(Active.next(Transition::Export), Some(Exported));
        assert_eq!(Suspended.next(Transition::Export), Some(Exported));
        assert_eq!(Exported.next(Transition::Delete), Some(Deleted));
    }

    #[test]
    fn exactly_eight_edges() {
        let edges = ALL_STATUSES
            .iter()
            .flat_map(|s| ALL_TRANSITIONS.iter().map(move |t| (*s, *t)))
            .filter(|(s, t)| s.can(*t))
            .count();
        assert_eq!(edges, 8);
    }

    #[test]
    fn deleted_is_terminal() {
        for transition in ALL_TRANSITIONS {
            assert_eq!(TenantStatus::Deleted.next(transition), None);
        }
        assert!(TenantStatus::Deleted.is_terminal());
        assert!(!TenantStatus::Scaling.can(Transition::Suspend));
        assert!(!TenantStatus::Exported.can(Transition::Resume));
    }

    #[test]
    fn wire_names() {
        assert_eq!(
            serde_json::to_string(&TenantStatus::Provisioning).unwrap(),
            "\"provisioning\""
        );
        assert_eq!(
            serde_json::to_string(&Transition::BeginScale).unwrap(),
            "\"begin_scale\""
        );
        assert_eq!(Transition::CompleteScale.to_string(), "complete_scale");
    }
}
