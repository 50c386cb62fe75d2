use crate::context::{ActionContext, ContextKey, RouteType};
use crate::gate::{Gate, GateId, GateVerdict};

use super::require_text;

/// Gate 8: every network route is declared, belongs to the tenant, and has
/// at least one path; restricted routes are bound to an identity.
pub struct NetworkPathGovernanceGate;

impl Gate for NetworkPathGovernanceGate {
    fn id(&self) -> GateId {
        GateId::NetworkPathGovernance
    }

    fn evaluate(&self, context: &ActionContext) -> GateVerdict {
        GateVerdict::from_check(self.id(), check_routes(context))
    }
}

fn check_routes(context: &ActionContext) -> Result<(), String> {
    let tenant = require_text(context, ContextKey::ImvuId)?;
    let routes = context
        .routes(ContextKey::NetworkRoutes)
        .ok_or_else(|| format!("missing {}", ContextKey::NetworkRoutes))?;
    let has_identity = context.non_empty_text(ContextKey::Identity).is_some();

    for route in routes {
        if route.tenant_id != tenant {
            return Err(format!("route for {} declared by {tenant}", route.tenant_id));
        }
        if route.paths.is_empty() || route.paths.iter().any(|p| p.trim().is_empty()) {
            return Err(format!("{:?} route has no usable path", route.route_type));
        }
        if route.route_type == RouteType::Restricted && !has_identity {
            return Err("restricted route requires an identity".into());
        }
    }
    Ok(())
}

/// Gate 14: every redirect the action installs is disclosed.
pub struct NoSilentRedirectionGate;

impl Gate for NoSilentRedirectionGate {
    fn id(&self) -> GateId {
        GateId::NoSilentRedirection
    }

    fn evaluate(&self, context: &ActionContext) -> GateVerdict {
        GateVerdict::from_check(self.id(), check_redirects(context))
    }
}

fn check_redirects(context: &ActionContext) -> Result<(), String> {
    let disclosed = context
        .list(ContextKey::DisclosedRedirects)
        .unwrap_or_default();
    let silent: Vec<&str> = context
        .list(ContextKey::Redirects)
        .unwrap_or_default()
        .iter()
        .filter(|r| !disclosed.contains(r))
        .map(String::as_str)
        .collect();
    if silent.is_empty() {
        Ok(())
    } else {
        Err(format!("undisclosed redirects: {}", silent.join(", ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::NetworkRoute;

    fn routes_context(routes: Vec<NetworkRoute>) -> ActionContext {
        ActionContext::new()
            .with(ContextKey::ImvuId, "imvu-1")
            .with(ContextKey::Identity, "identity-abc")
            .with(ContextKey::NetworkRoutes, routes)
    }

    #[test]
    fn routes_must_belong_and_have_paths() {
        let gate = NetworkPathGovernanceGate;
        let good = NetworkRoute::new("imvu-1", RouteType::Restricted, vec!["/admin".into()]);
        assert!(gate.evaluate(&routes_context(vec![good.clone()])).passed);
        assert!(gate.evaluate(&routes_context(vec![])).passed);

        let foreign = NetworkRoute::new("imvu-2", RouteType::Public, vec!["/".into()]);
        assert!(!gate.evaluate(&routes_context(vec![foreign])).passed);

        let empty = NetworkRoute::new("imvu-1", RouteType::Private, vec![]);
        assert!(!gate.evaluate(&routes_context(vec![empty])).passed);

        let mut anonymous = routes_context(vec![good]);
        anonymous.remove(ContextKey::Identity);
        assert!(!gate.evaluate(&anonymous).passed);
    }

    #[test]
    fn undeclared_routes_fail() {
        let ctx = ActionContext::new().with(ContextKey::ImvuId, "imvu-1");
        assert!(!NetworkPathGovernanceGate.evaluate(&ctx).passed);
    }

    #[test]
    fn redirects_must_be_disclosed() {
        let gate = NoSilentRedirectionGate;
        assert!(gate.evaluate(&ActionContext::new()).passed);

        let ctx = ActionContext::new().with(
            ContextKey::Redirects,
            vec!["old.world".to_string(), "new.world".to_string()],
        );
        let verdict = gate.evaluate(&ctx);
        assert!(!verdict.passed);

        let partly = ctx
            .clone()
            .with(ContextKey::DisclosedRedirects, vec!["old.world".to_string()]);
        let verdict = gate.evaluate(&partly);
        assert_eq!(verdict.reason.as_deref(), Some("undisclosed redirects: new.world"));

        let all = ctx.with(
            ContextKey::DisclosedRedirects,
            vec!["new.world".to_string(), "old.world".to_string()],
        );
        assert!(gate.evaluate(&all).passed);
    }
}
