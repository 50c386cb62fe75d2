use crate::context::{ActionContext, ContextKey};
use crate::gate::{Gate, GateId, GateVerdict};

use super::require_text;

/// Gate 3: the bound domain has a declared owner, and that owner is the
/// acting identity.
pub struct DomainOwnershipClarityGate;

impl Gate for DomainOwnershipClarityGate {
    fn id(&self) -> GateId {
        GateId::DomainOwnershipClarity
    }

    fn evaluate(&self, context: &ActionContext) -> GateVerdict {
        GateVerdict::from_check(self.id(), check_domain_ownership(context))
    }
}

fn check_domain_ownership(context: &ActionContext) -> Result<(), String> {
    let domain = require_text(context, ContextKey::Domain)?;
    let owner = require_text(context, ContextKey::DomainOwner)?;
    let identity = require_text(context, ContextKey::Identity)?;
    if owner != identity {
        return Err(format!("domain {domain} is owned by {owner}, not {identity}"));
    }
    Ok(())
}

/// Gate 4: the domain is a valid DNS name delegated under the tenant's own
/// label, so DNS authority never spans tenants.
pub struct DnsAuthorityScopingGate;

impl Gate for DnsAuthorityScopingGate {
    fn id(&self) -> GateId {
        GateId::DnsAuthorityScoping
    }

    fn evaluate(&self, context: &ActionContext) -> GateVerdict {
        GateVerdict::from_check(self.id(), check_dns_scope(context))
    }
}

fn check_dns_scope(context: &ActionContext) -> Result<(), String> {
    let domain = require_text(context, ContextKey::Domain)?;
    let tenant = require_text(context, ContextKey::ImvuId)?;
    if !is_valid_dns_name(domain) {
        return Err(format!("{domain} is not a valid DNS name"));
    }
    let scoped = domain
        .split('.')
        .any(|label| label.eq_ignore_ascii_case(tenant));
    if !scoped {
        return Err(format!("{domain} is not scoped under tenant label {tenant}"));
    }
    Ok(())
}

/// Gate 5: outgoing mail is attributed to an address on the tenant's own
/// domain and to an identity.
pub struct MailAttributionGate;

impl Gate for MailAttributionGate {
    fn id(&self) -> GateId {
        GateId::MailAttribution
    }

    fn evaluate(&self, context: &ActionContext) -> GateVerdict {
        GateVerdict::from_check(self.id(), check_mail_attribution(context))
    }
}

fn check_mail_attribution(context: &ActionContext) -> Result<(), String> {
    let sender = require_text(context, ContextKey::MailSender)?;
    let domain = require_text(context, ContextKey::Domain)?;
    require_text(context, ContextKey::Identity)?;
    match sender.rsplit_once('@') {
        Some((local, host)) if !local.is_empty() && host.eq_ignore_ascii_case(domain) => Ok(()),
        _ => Err(format!("sender {sender} is not an address on {domain}")),
    }
}

/// RFC 1035 host name: dot-separated labels of ASCII letters, digits and
/// inner hyphens, at most 63 bytes each and 253 in total, two labels minimum.
pub(crate) fn is_valid_dns_name(name: &str) -> bool {
    let name = name.strip_suffix('.').unwrap_or(name);
    if name.is_empty() || name.len() > 253 {
        return false;
    }
    let labels: Vec<&str> = name.split('.').collect();
    labels.len() >= 2
        && labels.iter().all(|label| {
            !label.is_empty()
                && label.len() <= 63
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        })
}
