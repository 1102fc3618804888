use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

pub const ROLE_PUBLIC: &str = "public";
pub const ROLE_CREATE_PROJECTS: &str = "create-projects";

pub type RoleSet = BTreeSet<String>;
pub type ProjectSet = HashSet<String>;

/// The already-authenticated party a query runs on behalf of.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    roles: RoleSet,
    identity: Option<String>,
}

impl Caller {
    pub fn new<I, S>(roles: I, identity: Option<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            roles: roles.into_iter().map(Into::into).collect(),
            identity: identity.filter(|id| !id.trim().is_empty()),
        }
    }

    /// Anonymous visitor of the public site.
    pub fn public() -> Self {
        Self::new([ROLE_PUBLIC], None)
    }

    pub fn roles(&self) -> &RoleSet {
        &self.roles
    }

    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    pub fn has_any_role(&self, roles: &[String]) -> bool {
        roles.iter().any(|r| self.roles.contains(r))
    }

    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }
}
