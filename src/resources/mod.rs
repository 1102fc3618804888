//! Typed per-resource configuration: which fields a caller may ask for, which
//! fields every query must carry, and how visibility is judged.

mod builtin;

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::access::{Caller, ProjectKey, VisibilityRule};
use crate::database::document::{DELETED_FIELD, ID_FIELD, READ_FIELD, SCHEMA_FIELD, TAGS_FIELD};
use crate::filter::{ElemMatch, Filter, FilterError, FilterExpr, Predicate, SortKey};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldAccess {
    /// Returned to anyone
    Public,
    /// Returned only to authenticated callers
    Protected,
}

#[derive(Debug, Clone)]
pub struct ResourceConfig {
    pub name: String,
    pub visibility: VisibilityRule,
    pub project_key: ProjectKey,
    pub soft_delete: bool,
    pub mandatory_fields: Vec<String>,
    pub fields: BTreeMap<String, FieldAccess>,
}

impl ResourceConfig {
    pub fn new(name: impl Into<String>, visibility: VisibilityRule, project_key: ProjectKey) -> Self {
        Self {
            name: name.into(),
            visibility,
            project_key,
            soft_delete: false,
            mandatory_fields: Vec::new(),
            fields: BTreeMap::new(),
        }
    }

    pub fn soft_delete(mut self) -> Self {
        self.soft_delete = true;
        self
    }

    pub fn mandatory(mut self, fields: &[&str]) -> Self {
        self.mandatory_fields.extend(fields.iter().map(|f| f.to_string()));
        self
    }

    pub fn public(self, fields: &[&str]) -> Self {
        self.with_access(fields, FieldAccess::Public)
    }

    pub fn protected(self, fields: &[&str]) -> Self {
        self.with_access(fields, FieldAccess::Protected)
    }

    fn with_access(mut self, fields: &[&str], access: FieldAccess) -> Self {
        for field in fields {
            self.fields.insert(field.to_string(), access);
        }
        self
    }

    /// Fields every projection carries: identity, the discriminator, both
    /// access-control attributes, the project key and resource extras.
    pub fn mandatory_projection(&self) -> BTreeSet<String> {
        let mut out: BTreeSet<String> = [ID_FIELD, SCHEMA_FIELD, READ_FIELD, TAGS_FIELD]
            .iter()
            .map(|f| f.to_string())
            .collect();
        if let Some(path) = self.project_key.path() {
            out.insert(path.to_string());
        }
        out.extend(self.mandatory_fields.iter().cloned());
        out
    }

    pub fn allows(&self, field: &str, caller: &Caller) -> bool {
        match self.fields.get(field) {
            Some(FieldAccess::Public) => true,
            Some(FieldAccess::Protected) => caller.is_authenticated(),
            None => false,
        }
    }

    /// Intersects requested names with the caller's whitelist, keeping
    /// request order. An empty request selects every allowed field.
    pub fn sanitize_fields(&self, requested: &[String], caller: &Caller) -> Vec<String> {
        if requested.iter().all(|f| f.trim().is_empty()) {
            return self
                .fields
                .keys()
                .filter(|f| self.allows(f, caller))
                .cloned()
                .collect();
        }
        let mut seen = BTreeSet::new();
        requested
            .iter()
            .map(|f| f.trim())
            .filter(|f| self.allows(f, caller) && seen.insert(f.to_string()))
            .map(str::to_string)
            .collect()
    }

    /// Rejects caller filters and sorts that would reach data the caller
    /// cannot read back. Paths must name a top-level field the caller may
    /// request or one every projection carries. Anything that looks inside a
    /// subdocument is refused, since subdocuments carry their own guards.
    pub fn check_query_paths(&self, filter: &Filter, sort: &[SortKey], caller: &Caller) -> Result<(), FilterError> {
        let mandatory = self.mandatory_projection();
        let searchable = |path: &str| -> Result<(), FilterError> {
            if path.contains('.') {
                return Err(FilterError::InvalidField(format!("nested path '{}' is not searchable", path)));
            }
            if mandatory.contains(path) || self.allows(path, caller) {
                Ok(())
            } else {
                Err(FilterError::InvalidField(format!("'{}' is not searchable", path)))
            }
        };

        check_expr(filter.expr(), &searchable)?;
        for key in sort {
            searchable(key.field.as_str())?;
        }
        Ok(())
    }

    pub fn is_user_collection(&self) -> bool {
        self.project_key == ProjectKey::Unscoped
    }
}

/// Folds the schema discriminator and the soft-delete exclusion into a caller
/// filter. Deleted records come back only when a privileged caller asks.
pub fn scoped_filter(
    resource: &ResourceConfig,
    caller: &Caller,
    filter: Filter,
    include_deleted: bool,
    privileged_roles: &[String],
) -> Filter {
    let mut scoped = Filter::eq(SCHEMA_FIELD, resource.name.as_str()).and(filter);
    if resource.soft_delete && !(include_deleted && caller.has_any_role(privileged_roles)) {
        scoped = scoped.and(Filter::condition(DELETED_FIELD, Predicate::Ne(true.into())));
    }
    scoped
}

fn check_expr(expr: &FilterExpr, searchable: &dyn Fn(&str) -> Result<(), FilterError>) -> Result<(), FilterError> {
    match expr {
        FilterExpr::And(parts) | FilterExpr::Or(parts) | FilterExpr::Nor(parts) => {
            parts.iter().try_for_each(|part| check_expr(part, searchable))
        }
        FilterExpr::Condition(condition) => {
            searchable(condition.path.as_str())?;
            check_predicate(&condition.predicate)
        }
    }
}

fn check_predicate(predicate: &Predicate) -> Result<(), FilterError> {
    match predicate {
        Predicate::Eq(v) | Predicate::Ne(v) => check_operand(v),
        Predicate::In(values) | Predicate::NIn(values) | Predicate::All(values) => {
            values.iter().try_for_each(check_operand)
        }
        Predicate::Not(inner) | Predicate::ElemMatch(ElemMatch::Value(inner)) => {
            inner.iter().try_for_each(check_predicate)
        }
        Predicate::ElemMatch(ElemMatch::Document(_)) => Err(FilterError::InvalidOperatorData(
            "$elemMatch over subdocuments is not searchable".to_string(),
        )),
        _ => Ok(()),
    }
}

fn check_operand(value: &Value) -> Result<(), FilterError> {
    match value {
        Value::Object(_) => Err(FilterError::InvalidOperatorData(
            "document operands are not searchable".to_string(),
        )),
        Value::Array(items) => items.iter().try_for_each(check_operand),
        _ => Ok(()),
    }
}

/// All known resources, built once at startup.
#[derive(Debug, Clone, Default)]
pub struct ResourceRegistry {
    resources: HashMap<String, ResourceConfig>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for resource in builtin::resources() {
            registry.register(resource);
        }
        registry
    }

    pub fn register(&mut self, resource: ResourceConfig) {
        self.resources.insert(normalize(&resource.name), resource);
    }

    /// Looks up a resource by name, ignoring case, `-` and `_`, so
    /// `comment-period` finds `CommentPeriod`.
    pub fn resolve(&self, name: &str) -> Option<&ResourceConfig> {
        self.resources.get(&normalize(name))
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.resources.values().map(|r| r.name.as_str()).collect();
        names.sort_unstable();
        names
    }
}

fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '-' && *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::ROLE_PUBLIC;
    use serde_json::json;

    fn staff() -> Caller {
        Caller::new(["staff"], Some("u1".to_string()))
    }

    fn privileged() -> Vec<String> {
        vec!["sysadmin".to_string(), "staff".to_string()]
    }

    #[test]
    fn resolves_loose_names() {
        let registry = ResourceRegistry::builtin();
        assert_eq!(registry.resolve("comment-period").map(|r| r.name.as_str()), Some("CommentPeriod"));
        assert_eq!(registry.resolve("PROJECT").map(|r| r.name.as_str()), Some("Project"));
        assert!(registry.resolve("Nonexistent").is_none());
    }

    #[test]
    fn public_callers_only_get_public_fields() {
        let registry = ResourceRegistry::builtin();
        let user = registry.resolve("User").unwrap();
        let requested = vec!["displayName".to_string(), "email".to_string(), "bogus".to_string()];

        assert_eq!(user.sanitize_fields(&requested, &Caller::public()), vec!["displayName"]);
        assert_eq!(user.sanitize_fields(&requested, &staff()), vec!["displayName", "email"]);
    }

    #[test]
    fn empty_request_selects_whole_whitelist() {
        let registry = ResourceRegistry::builtin();
        let user = registry.resolve("User").unwrap();
        let all = user.sanitize_fields(&[], &Caller::public());
        assert!(all.contains(&"displayName".to_string()));
        assert!(!all.contains(&"email".to_string()));
    }

    #[test]
    fn mandatory_projection_carries_access_fields() {
        let registry = ResourceRegistry::builtin();
        let project = registry.resolve("Project").unwrap();
        let fields = project.mandatory_projection();
        for f in ["_id", "_schemaName", "read", "tags", "code", "proponent"] {
            assert!(fields.contains(f), "missing {}", f);
        }
        let survey = registry.resolve("Survey").unwrap();
        assert!(survey.mandatory_projection().contains("project"));
    }

    #[test]
    fn soft_delete_exclusion_is_folded_in() {
        let registry = ResourceRegistry::builtin();
        let application = registry.resolve("Application").unwrap();
        let filter = scoped_filter(application, &Caller::public(), Filter::all(), true, &privileged());

        let live = json!({"_schemaName": "Application", "name": "x"});
        let deleted = json!({"_schemaName": "Application", "isDeleted": true});
        let collation = Default::default();
        assert!(filter.matches(live.as_object().unwrap(), &collation));
        assert!(!filter.matches(deleted.as_object().unwrap(), &collation));

        let privileged_filter = scoped_filter(application, &staff(), Filter::eq(DELETED_FIELD, true), true, &privileged());
        assert!(privileged_filter.matches(deleted.as_object().unwrap(), &collation));
    }

    #[test]
    fn resources_without_soft_delete_only_scope_schema() {
        let registry = ResourceRegistry::builtin();
        let user = registry.resolve("User").unwrap();
        assert!(user.is_user_collection());
        let filter = scoped_filter(user, &Caller::new([ROLE_PUBLIC], None), Filter::all(), false, &privileged());
        let flagged = json!({"_schemaName": "User", "isDeleted": true});
        assert!(filter.matches(flagged.as_object().unwrap(), &Default::default()));
    }

    #[test]
    fn query_paths_follow_the_caller_whitelist() {
        let registry = ResourceRegistry::builtin();
        let organization = registry.resolve("Organization").unwrap();
        let postal = Filter::parse(&json!({"postal": {"$regex": "^V8W"}})).unwrap();

        assert!(organization.check_query_paths(&postal, &[], &Caller::public()).is_err());
        assert!(organization.check_query_paths(&postal, &[], &staff()).is_ok());
        assert!(organization
            .check_query_paths(&Filter::all(), &[SortKey::desc("postal")], &Caller::public())
            .is_err());

        let mixed = Filter::parse(&json!({"$or": [{"name": "Acme"}, {"address1": "1 Main"}]})).unwrap();
        assert!(organization.check_query_paths(&mixed, &[], &Caller::public()).is_err());

        let mandatory = Filter::parse(&json!({"_id": "o1", "name": "Acme"})).unwrap();
        assert!(organization.check_query_paths(&mandatory, &[SortKey::asc("name")], &Caller::public()).is_ok());
    }

    #[test]
    fn nested_query_paths_are_refused() {
        let registry = ResourceRegistry::builtin();
        let comment = registry.resolve("Comment").unwrap();
        let admin = Caller::new(["sysadmin"], Some("admin".to_string()));

        for filter in [
            json!({"commentAuthor.internal.email": "pat@example.com"}),
            json!({"commentAuthor": {"$elemMatch": {"internal.email": "pat@example.com"}}}),
            json!({"commentAuthor": {"internal": {"email": "pat@example.com"}}}),
            json!({"commentAuthor": {"$in": [{"contactName": "Pat Doe"}]}}),
        ] {
            let parsed = Filter::parse(&filter).unwrap();
            assert!(comment.check_query_paths(&parsed, &[], &admin).is_err(), "accepted {}", filter);
        }
        assert!(comment
            .check_query_paths(&Filter::all(), &[SortKey::asc("commentAuthor.contactName")], &admin)
            .is_err());
    }
}
