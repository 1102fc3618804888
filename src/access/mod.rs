pub mod caller;
pub mod permissions;
pub mod predicate;
pub mod redact;

pub use caller::{Caller, ProjectSet, RoleSet, ROLE_CREATE_PROJECTS, ROLE_PUBLIC};
pub use permissions::{
    resolve_permissions, PermissionCache, ProjectPermissionResolver, StorePermissionResolver,
};
pub use predicate::{is_visible, tags_visible, Guard, ProjectKey, RedactAction, Redactable, VisibilityRule};
pub use redact::Redaction;
