//! Final authorization of a tool call.
//!
//! Combines the static policy decision with the tool's dynamic classifier:
//!
//! - An `exclude` policy is final; the classifier is not consulted.
//! - A classifier result of `Disabled` turns the call into `exclude`.
//! - Otherwise the policy's permission stands, even if the classifier would
//!   have asked. A user who allowed a tool is not prompted for merely risky
//!   calls, only for dangerous ones.
//!
//! A classifier that fails yields `ask`, never `allow`.

use crate::policy::{Policy, PolicySet, Resolution, ToolCall};
use crate::tier::{Permission, Tier};
use crate::tools::ToolRegistry;
use serde::Serialize;

/// The full decision for one tool call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Authorization<'a> {
    /// What the caller should do.
    pub permission: Permission,
    pub matched_policy: Option<&'a Policy>,
    /// The permission from policy resolution alone.
    pub static_permission: Permission,
    /// The classifier's tier, if a classifier ran and succeeded.
    pub dynamic_tier: Option<Tier>,
}

impl Authorization<'_> {
    /// Whether the classifier overrode the static permission.
    pub fn escalated(&self) -> bool {
        self.permission != self.static_permission
    }
}

/// Combine a static permission with a classifier tier.
pub fn reconcile(static_permission: Permission, dynamic_tier: Tier) -> Permission {
    match (static_permission, dynamic_tier) {
        (Permission::Exclude, _) | (_, Tier::Disabled) => Permission::Exclude,
        (permission, _) => permission,
    }
}

/// Authorize `call` against `policies`, running the tool's classifier from
/// `registry` when it has one.
pub fn authorize<'a>(
    call: &ToolCall,
    policies: &'a PolicySet,
    registry: &ToolRegistry,
) -> Authorization<'a> {
    let resolution = policies.resolve(call);
    authorize_resolved(call, resolution, registry)
}

/// Reconcile an already resolved call with the tool's classifier.
pub fn authorize_resolved<'a>(
    call: &ToolCall,
    resolution: Resolution<'a>,
    registry: &ToolRegistry,
) -> Authorization<'a> {
    let static_permission = resolution.permission;
    let mut authorization = Authorization {
        permission: static_permission,
        matched_policy: resolution.matched_policy,
        static_permission,
        dynamic_tier: None,
    };

    if static_permission == Permission::Exclude {
        return authorization;
    }

    let kind = registry.kind(&call.name);
    let Some(result) = kind.classify(Tier::from(static_permission), &call.arguments) else {
        return authorization;
    };

    match result {
        Ok(tier) => {
            authorization.dynamic_tier = Some(tier);
            authorization.permission = reconcile(static_permission, tier);
            if authorization.escalated() {
                log::info!(
                    "Excluding '{}' call: classified as {} despite {} policy",
                    call.name,
                    tier,
                    static_permission
                );
            }
        }
        Err(err) => {
            log::warn!(
                "Classifier for '{}' failed, requiring permission: {}",
                call.name,
                err
            );
            authorization.permission = Permission::Ask;
        }
    }

    authorization
}

/// Owns the policies and tools of a session and authorizes calls.
#[derive(Debug, Clone)]
pub struct Authorizer {
    policies: PolicySet,
    registry: ToolRegistry,
}

impl Authorizer {
    pub fn new(policies: PolicySet, registry: ToolRegistry) -> Self {
        Self { policies, registry }
    }

    pub fn authorize(&self, call: &ToolCall) -> Authorization<'_> {
        authorize(call, &self.policies, &self.registry)
    }

    /// Shorthand for the final permission.
    pub fn permission(&self, call: &ToolCall) -> Permission {
        self.authorize(call).permission
    }

    pub fn policies(&self) -> &PolicySet {
        &self.policies
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }
}
