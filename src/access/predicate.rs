//! Per-node visibility rules.
//!
//! Collections use one of two rules. The current rule reads a flat `read`
//! list (any-of) and scopes non-public access to the caller's granted
//! projects. The legacy rule reads `tags`, a list of role groups, and admits
//! a caller holding every role of at least one group.

use serde_json::{Map, Value};

use super::caller::{ProjectSet, RoleSet, ROLE_CREATE_PROJECTS, ROLE_PUBLIC};
use crate::database::document::{id_string, ID_FIELD, READ_FIELD, TAGS_FIELD};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisibilityRule {
    Read,
    Tags,
}

/// Where a node's owning project id comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectKey {
    /// The node is itself a project
    SelfId,
    /// The node references its project through this field
    Field(String),
    /// The collection has no project affiliation (users)
    Unscoped,
}

impl ProjectKey {
    pub fn field(name: impl Into<String>) -> Self {
        ProjectKey::Field(name.into())
    }

    pub fn path(&self) -> Option<&str> {
        match self {
            ProjectKey::SelfId => Some(ID_FIELD),
            ProjectKey::Field(name) => Some(name),
            ProjectKey::Unscoped => None,
        }
    }
}

/// Outcome for one node of a document tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedactAction {
    /// Keep the node and everything below it unchecked
    Keep,
    /// Keep the node and evaluate its children
    Descend,
    /// Remove the node and everything below it
    Prune,
}

/// An access-control attribute as found on a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Guard<T> {
    /// Field missing or null
    Absent,
    Present(T),
    /// Field holds a value of the wrong shape; never grants access
    Malformed,
}

/// Access-control view of a document node.
pub trait Redactable {
    /// Role strings in `read`.
    fn read_roles(&self) -> Guard<Vec<&str>>;

    /// Role groups in `tags`.
    fn tag_groups(&self) -> Guard<Vec<Vec<&str>>>;

    fn project_id(&self, key: &ProjectKey) -> Option<String>;
}

fn role_list(values: &[Value]) -> Option<Vec<&str>> {
    values.iter().map(Value::as_str).collect()
}

impl Redactable for Map<String, Value> {
    fn read_roles(&self) -> Guard<Vec<&str>> {
        match self.get(READ_FIELD) {
            None | Some(Value::Null) => Guard::Absent,
            Some(Value::String(role)) => Guard::Present(vec![role.as_str()]),
            Some(Value::Array(items)) => role_list(items).map_or(Guard::Malformed, Guard::Present),
            Some(_) => Guard::Malformed,
        }
    }

    fn tag_groups(&self) -> Guard<Vec<Vec<&str>>> {
        let groups = match self.get(TAGS_FIELD) {
            None | Some(Value::Null) => return Guard::Absent,
            Some(Value::Array(groups)) => groups,
            Some(_) => return Guard::Malformed,
        };
        groups
            .iter()
            .map(|group| match group {
                Value::Array(roles) => role_list(roles),
                Value::String(role) => Some(vec![role.as_str()]),
                _ => None,
            })
            .collect::<Option<Vec<_>>>()
            .map_or(Guard::Malformed, Guard::Present)
    }

    fn project_id(&self, key: &ProjectKey) -> Option<String> {
        // A joined project is an embedded document; its _id is the key
        key.path().and_then(|path| self.get(path)).and_then(id_string)
    }
}

/// Current-rule predicate: absent or empty `read` is public; otherwise the
/// caller needs a listed role and must pass the project gate. A malformed
/// `read` hides the node from everyone.
pub fn is_visible<D: Redactable + ?Sized>(
    doc: &D,
    roles: &RoleSet,
    permissions: &ProjectSet,
    project_key: &ProjectKey,
) -> bool {
    let read = match doc.read_roles() {
        Guard::Present(read) if !read.is_empty() => read,
        Guard::Malformed => return false,
        _ => return true,
    };
    let role_match = read.iter().any(|r| roles.contains(*r));
    role_match && project_gate(doc, roles, permissions, project_key)
}

pub fn project_gate<D: Redactable + ?Sized>(
    doc: &D,
    roles: &RoleSet,
    permissions: &ProjectSet,
    project_key: &ProjectKey,
) -> bool {
    roles.contains(ROLE_PUBLIC)
        || *project_key == ProjectKey::Unscoped
        || roles.contains(ROLE_CREATE_PROJECTS)
        || doc
            .project_id(project_key)
            .map(|id| permissions.contains(&id))
            .unwrap_or(false)
}

/// Legacy-rule predicate: visible when the caller holds every role of at
/// least one tag group. Nodes without `tags` are not guarded.
pub fn tags_visible<D: Redactable + ?Sized>(doc: &D, roles: &RoleSet) -> bool {
    match doc.tag_groups() {
        Guard::Absent => true,
        Guard::Malformed => false,
        Guard::Present(groups) => groups.iter().any(|group| group.iter().all(|r| roles.contains(*r))),
    }
}

/// Decides what happens to one node under the collection's rule.
pub fn decide<D: Redactable + ?Sized>(
    node: &D,
    rule: VisibilityRule,
    roles: &RoleSet,
    permissions: &ProjectSet,
    project_key: &ProjectKey,
) -> RedactAction {
    match rule {
        VisibilityRule::Read => match node.read_roles() {
            Guard::Present(read) if !read.is_empty() => {
                if is_visible(node, roles, permissions, project_key) {
                    RedactAction::Keep
                } else {
                    RedactAction::Prune
                }
            }
            Guard::Malformed => RedactAction::Prune,
            _ => RedactAction::Descend,
        },
        VisibilityRule::Tags => {
            if tags_visible(node, roles) {
                RedactAction::Descend
            } else {
                RedactAction::Prune
            }
        }
    }
}
