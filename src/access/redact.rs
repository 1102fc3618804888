use serde_json::Value;

use super::caller::{ProjectSet, RoleSet};
use super::predicate::{decide, ProjectKey, RedactAction, VisibilityRule};
use crate::database::document::Document;

/// Structural redaction of a document tree.
///
/// Every object node, including objects inside arrays, is judged by the
/// collection's rule. Pruned nodes disappear with their subtree; kept nodes
/// are returned untouched; descended nodes have their children judged in
/// turn. The project key resolves against whichever node is being judged.
#[derive(Debug, Clone, PartialEq)]
pub struct Redaction {
    pub rule: VisibilityRule,
    pub roles: RoleSet,
    pub permissions: ProjectSet,
    pub project_key: ProjectKey,
}

impl Redaction {
    pub fn new(rule: VisibilityRule, roles: RoleSet, permissions: ProjectSet, project_key: ProjectKey) -> Self {
        Self { rule, roles, permissions, project_key }
    }

    pub fn decide(&self, node: &Document) -> RedactAction {
        decide(node, self.rule, &self.roles, &self.permissions, &self.project_key)
    }

    /// Redacts a root document; `None` when the root itself is pruned.
    pub fn apply(&self, mut doc: Document) -> Option<Document> {
        match self.decide(&doc) {
            RedactAction::Prune => None,
            RedactAction::Keep => Some(doc),
            RedactAction::Descend => {
                self.descend(&mut doc);
                Some(doc)
            }
        }
    }

    fn descend(&self, node: &mut Document) {
        node.retain(|_, value| self.redact_value(value));
    }

    /// Returns false when the value must be dropped from its parent.
    fn redact_value(&self, value: &mut Value) -> bool {
        match value {
            Value::Object(child) => match self.decide(child) {
                RedactAction::Prune => false,
                RedactAction::Keep => true,
                RedactAction::Descend => {
                    self.descend(child);
                    true
                }
            },
            Value::Array(items) => {
                items.retain_mut(|item| self.redact_value(item));
                true
            }
            _ => true,
        }
    }
}
