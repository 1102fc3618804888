use anyhow::Context;
use clap::Args;
use serde_json::Value;

use super::{open_store, StoreArgs};
use crate::access::Caller;
use crate::api::AppState;
use crate::cli::utils::output_records;
use crate::cli::OutputFormat;
use crate::config;
use crate::filter::{Filter, FilterOrder};
use crate::query::{Joins, QueryRequest};
use crate::resources::scoped_filter;

#[derive(Args, Debug)]
pub struct QueryArgs {
    #[arg(help = "Resource name, e.g. Project or comment-period")]
    pub resource: String,

    #[arg(long, value_delimiter = ',', default_value = "public", help = "Comma-separated caller roles")]
    pub roles: Vec<String>,

    #[arg(long, help = "Caller identity used for project grants")]
    pub identity: Option<String>,

    #[arg(long, help = "Filter document as JSON")]
    pub filter: Option<String>,

    #[arg(long, value_delimiter = ',', help = "Comma-separated fields")]
    pub fields: Vec<String>,

    #[arg(long, help = "Sort spec, e.g. \"-dateAdded,name\"")]
    pub sort: Option<String>,

    #[arg(long)]
    pub skip: Option<u64>,

    #[arg(long)]
    pub limit: Option<u64>,

    #[arg(long, help = "Return the total alongside one page")]
    pub count: bool,

    #[arg(long, help = "Include soft-deleted records (privileged roles only)")]
    pub include_deleted: bool,

    #[arg(long, help = "Join the proponent organization")]
    pub proponent: bool,

    #[arg(long, help = "Join the project lead user")]
    pub project_lead: bool,

    #[arg(long, help = "Join the project director user")]
    pub project_director: bool,

    #[arg(long, help = "Join the owning project")]
    pub project: bool,

    #[command(flatten)]
    pub store: StoreArgs,
}

pub async fn handle(args: QueryArgs, output_format: OutputFormat) -> anyhow::Result<()> {
    let config = config::config();
    let store = open_store(&args.store, config).await?;
    let state = AppState::new(store, config);

    let caller = Caller::new(args.roles, args.identity);
    let resource = state.engine.resolve(&args.resource)?;

    let filter_json: Value = match &args.filter {
        Some(raw) => serde_json::from_str(raw).context("--filter is not valid JSON")?,
        None => Value::Null,
    };
    let caller_filter = Filter::parse(&filter_json)?;
    let sort = match &args.sort {
        Some(spec) => FilterOrder::validate_and_parse(&Value::String(spec.clone()))?,
        None => Vec::new(),
    };
    resource.check_query_paths(&caller_filter, &sort, &caller)?;
    let filter = scoped_filter(
        resource,
        &caller,
        caller_filter,
        args.include_deleted,
        &config.security.privileged_roles,
    );

    let mut request = QueryRequest::new(resource.name.clone(), caller.clone())
        .with_filter(filter)
        .with_fields(resource.sanitize_fields(&args.fields, &caller))
        .with_sort(sort)
        .with_joins(Joins {
            proponent: args.proponent,
            project_lead: args.project_lead,
            project_director: args.project_director,
            project: args.project,
        })
        .counted(args.count);
    if let Some(skip) = args.skip {
        request = request.with_skip(skip);
    }
    if let Some(limit) = args.limit {
        request = request.with_limit(limit);
    }

    let output = state.engine.run_query(request).await?;
    output_records(&output_format, &output)
}
