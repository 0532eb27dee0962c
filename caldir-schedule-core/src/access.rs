//! Free/busy access policy.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::backend::PrincipalRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Allow,
    Deny,
}

/// Decides whether `requester` may see the free/busy of `target`.
pub trait Authorizer: Send + Sync {
    fn authorize(&self, requester: &PrincipalRef, target: &PrincipalRef) -> AccessDecision;
}

/// What non-administrators may query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccessPolicy {
    /// Only their own free/busy
    #[default]
    SelfOnly,
    /// Anyone's free/busy
    AllowAll,
}

/// Administrators see everyone; everybody sees themselves; the rest follows `policy`.
#[derive(Debug, Clone, Default)]
pub struct PolicyAuthorizer {
    admins: HashSet<PrincipalRef>,
    policy: AccessPolicy,
}

impl PolicyAuthorizer {
    pub fn new<I, S>(admins: I, policy: AccessPolicy) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        PolicyAuthorizer {
            admins: admins.into_iter().map(PrincipalRef::new).collect(),
            policy,
        }
    }
}

impl Authorizer for PolicyAuthorizer {
    fn authorize(&self, requester: &PrincipalRef, target: &PrincipalRef) -> AccessDecision {
        if self.admins.contains(requester) || requester == target {
            return AccessDecision::Allow;
        }

        match self.policy {
            AccessPolicy::AllowAll => AccessDecision::Allow,
            AccessPolicy::SelfOnly => AccessDecision::Deny,
        }
    }
}
