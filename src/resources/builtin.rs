use super::ResourceConfig;
use crate::access::{ProjectKey, VisibilityRule};

pub(super) fn resources() -> Vec<ResourceConfig> {
    vec![
        ResourceConfig::new("Application", VisibilityRule::Tags, ProjectKey::Unscoped)
            .soft_delete()
            .public(&[
                "agency", "areaHectares", "businessUnit", "centroid", "cl_file", "client",
                "description", "legalDescription", "location", "name", "publishDate", "purpose",
                "status", "subpurpose", "subtype", "tantalisID", "tenureStage", "type",
                "statusHistoryEffectiveDate",
            ])
            .protected(&["assignedTo", "createdDate", "isDeleted", "internalID", "reason"]),
        ResourceConfig::new("Comment", VisibilityRule::Tags, ProjectKey::Unscoped)
            .soft_delete()
            .public(&[
                "_addedBy", "_application", "_commentPeriod", "comment", "commentAuthor",
                "commentNumber", "dateAdded", "commentStatus",
            ])
            .protected(&["review", "isDeleted", "internal"]),
        ResourceConfig::new("CommentPeriod", VisibilityRule::Tags, ProjectKey::Unscoped)
            .soft_delete()
            .public(&[
                "_application", "code", "description", "endDate", "startDate", "instructions",
                "commentPeriodStatus",
            ])
            .protected(&["_addedBy", "isDeleted", "internal"]),
        ResourceConfig::new("Decision", VisibilityRule::Tags, ProjectKey::Unscoped)
            .soft_delete()
            .public(&["_application", "code", "name", "description", "publishDate"])
            .protected(&["_addedBy", "isDeleted"]),
        ResourceConfig::new("Document", VisibilityRule::Tags, ProjectKey::Unscoped)
            .soft_delete()
            .public(&[
                "_application", "_comment", "_decision", "displayName", "documentFileName",
                "fileSize", "publishDate",
            ])
            .protected(&["_addedBy", "internalURL", "internalMime", "isDeleted"]),
        ResourceConfig::new("Feature", VisibilityRule::Tags, ProjectKey::Unscoped)
            .soft_delete()
            .public(&["applicationID", "geometry", "properties", "type"])
            .protected(&["isDeleted"]),
        ResourceConfig::new("Organization", VisibilityRule::Tags, ProjectKey::Unscoped)
            .soft_delete()
            .public(&["name", "code", "type", "description", "country", "city", "province"])
            .protected(&["address1", "address2", "postal", "isDeleted"]),
        ResourceConfig::new("Project", VisibilityRule::Read, ProjectKey::SelfId)
            .mandatory(&["code", "proponent"])
            .public(&[
                "name", "type", "sector", "description", "location", "region", "centroid",
                "status", "eacDecision", "currentPhaseName", "projectLead", "projectDirector",
                "dateAdded", "dateUpdated",
            ])
            .protected(&["responsibleEPD", "projectLeadEmail", "projectLeadPhone", "review180Start"]),
        ResourceConfig::new("Survey", VisibilityRule::Read, ProjectKey::field("project"))
            .public(&["name", "commentPeriod", "questions", "dateAdded", "lastSaved"])
            .protected(&["_addedBy"]),
        ResourceConfig::new("User", VisibilityRule::Read, ProjectKey::Unscoped)
            .public(&["displayName", "firstName", "lastName", "org", "orgName", "title"])
            .protected(&["email", "phoneNumber", "sub", "projectPermissions"]),
    ]
}
