mod common;

use anyhow::Result;
use serde_json::json;

use disclosure_api::access::Caller;
use disclosure_api::query::{Joins, QueryError, QueryRequest};

use common::{engine, names, seeded_store, staff};

#[tokio::test]
async fn public_caller_sees_public_surveys_only() -> Result<()> {
    let engine = engine(seeded_store().await);

    let output = engine.run_query(QueryRequest::new("Survey", Caller::public()).with_fields(["name"])).await?;

    assert_eq!(names(output.records()), vec!["A"]);
    Ok(())
}

#[tokio::test]
async fn project_gate_needs_an_explicit_grant() -> Result<()> {
    let engine = engine(seeded_store().await);

    // u1 holds staff but no grants; u2 is granted p1
    let ungranted = engine.run_query(QueryRequest::new("Survey", staff("u1")).with_fields(["name"])).await?;
    assert!(ungranted.records().is_empty(), "unexpected: {:?}", ungranted.records());

    let granted = engine.run_query(QueryRequest::new("Survey", staff("u2")).with_fields(["name"])).await?;
    assert_eq!(names(granted.records()), vec!["C"]);
    Ok(())
}

#[tokio::test]
async fn public_role_bypasses_project_gate() -> Result<()> {
    let engine = engine(seeded_store().await);
    let caller = Caller::new(["public", "staff"], Some("u1".to_string()));

    let output = engine.run_query(QueryRequest::new("Project", caller).with_fields(["name"])).await?;

    let found = names(output.records());
    assert!(found.contains(&"alpha mine".to_string()), "got {:?}", found);
    Ok(())
}

#[tokio::test]
async fn create_projects_role_bypasses_project_gate() -> Result<()> {
    let engine = engine(seeded_store().await);
    let caller = Caller::new(["staff", "create-projects"], Some("u1".to_string()));

    let output = engine.run_query(QueryRequest::new("Project", caller).with_fields(["name"])).await?;

    assert_eq!(names(output.records()), vec!["Site C", "alpha mine", "Brucejack"]);
    Ok(())
}

#[tokio::test]
async fn documents_without_read_are_visible_to_everyone() -> Result<()> {
    let engine = engine(seeded_store().await);
    let nobody = Caller::new(Vec::<String>::new(), None);

    let output = engine.run_query(QueryRequest::new("Project", nobody).with_fields(["name"])).await?;

    assert_eq!(names(output.records()), vec!["Brucejack"]);
    Ok(())
}

#[tokio::test]
async fn user_collection_skips_project_gate() -> Result<()> {
    let engine = engine(seeded_store().await);

    let output = engine.run_query(QueryRequest::new("User", staff("u1")).with_fields(["displayName"])).await?;

    assert_eq!(output.records().len(), 2);
    Ok(())
}

#[tokio::test]
async fn unknown_identity_degrades_to_no_grants() -> Result<()> {
    let engine = engine(seeded_store().await);

    let output = engine.run_query(QueryRequest::new("Project", staff("ghost")).with_fields(["name"])).await?;

    assert_eq!(names(output.records()), vec!["Brucejack"]);
    Ok(())
}

#[tokio::test]
async fn tag_groups_require_a_full_group() -> Result<()> {
    let engine = engine(seeded_store().await);
    let admin = Caller::new(["sysadmin", "staff"], Some("u1".to_string()));
    let hidden = json!({"name": {"$regex": "^Hidden"}});
    let filter = disclosure_api::filter::Filter::parse(&hidden)?;

    let as_admin = engine
        .run_query(QueryRequest::new("Application", admin).with_filter(filter.clone()).with_fields(["name"]))
        .await?;
    assert_eq!(names(as_admin.records()), vec!["Hidden 1", "Hidden 2"]);

    let as_staff = engine
        .run_query(QueryRequest::new("Application", staff("u1")).with_filter(filter).with_fields(["name"]))
        .await?;
    assert!(as_staff.records().is_empty());
    Ok(())
}

#[tokio::test]
async fn nested_tag_guarded_subdocuments_are_pruned() -> Result<()> {
    let engine = engine(seeded_store().await);
    let fields = ["comment", "commentAuthor"];

    let public = engine.run_query(QueryRequest::new("Comment", Caller::public()).with_fields(fields)).await?;
    assert_eq!(public.records().len(), 1);
    let author = &public.records()[0]["commentAuthor"];
    assert_eq!(author["contactName"], json!("Pat Doe"));
    assert!(author.get("internal").is_none());

    let admin = Caller::new(["sysadmin"], Some("u1".to_string()));
    let full = engine.run_query(QueryRequest::new("Comment", admin).with_fields(fields)).await?;
    assert_eq!(full.records().len(), 2);
    assert_eq!(full.records()[0]["commentAuthor"]["internal"]["email"], json!("pat@example.com"));
    Ok(())
}

#[tokio::test]
async fn proponent_join_flattens_the_organization() -> Result<()> {
    let engine = engine(seeded_store().await);

    let output = engine
        .run_query(
            QueryRequest::new("Project", Caller::public())
                .with_fields(["name"])
                .with_joins(Joins { proponent: true, ..Joins::default() }),
        )
        .await?;

    let records = output.records();
    assert_eq!(names(records), vec!["alpha mine", "Brucejack"]);
    assert_eq!(records[0]["proponent"]["name"], json!("Acme Resources"));
    assert!(records[0]["proponent"].get("postal").is_none(), "protected field leaked to public");
    assert_eq!(records[1]["proponent"]["name"], json!("Pretium"));
    Ok(())
}

#[tokio::test]
async fn missing_join_target_leaves_field_absent() -> Result<()> {
    let engine = engine(seeded_store().await);

    let output = engine
        .run_query(
            QueryRequest::new("Project", Caller::public())
                .with_fields(["name"])
                .with_joins(Joins { project_lead: true, ..Joins::default() }),
        )
        .await?;

    assert!(output.records().iter().all(|r| r.get("projectLead").is_none()));
    Ok(())
}

#[tokio::test]
async fn unknown_collection_is_a_caller_error() {
    let engine = engine(seeded_store().await);

    let err = engine
        .run_query(QueryRequest::new("Spaceship", Caller::public()))
        .await
        .unwrap_err();

    assert!(matches!(err, QueryError::UnknownCollection(name) if name == "Spaceship"));
}
