use serde::Serialize;
use std::collections::BTreeSet;

use crate::access::Redaction;
use crate::database::document::{Document, ID_FIELD};
use crate::filter::{Collation, Filter, SortKey};

/// Left-outer join against another collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Lookup {
    pub from: String,
    pub local_field: String,
    pub foreign_field: String,
    pub as_field: String,
    /// Extra condition on the joined documents
    pub filter: Option<Filter>,
    /// Fields kept on each joined document; `None` keeps everything
    pub fields: Option<BTreeSet<String>>,
    /// Flatten to the first match instead of an array
    pub single: bool,
}

impl Lookup {
    /// Single-document join on `_id`, replacing the reference in place.
    pub fn by_id(from: impl Into<String>, local_field: impl Into<String>) -> Self {
        let local_field = local_field.into();
        Self {
            from: from.into(),
            as_field: local_field.clone(),
            local_field,
            foreign_field: ID_FIELD.to_string(),
            filter: None,
            fields: None,
            single: true,
        }
    }

    /// Array join collecting every document whose `foreign_field` matches.
    pub fn many(
        from: impl Into<String>,
        local_field: impl Into<String>,
        foreign_field: impl Into<String>,
        as_field: impl Into<String>,
    ) -> Self {
        Self {
            from: from.into(),
            local_field: local_field.into(),
            foreign_field: foreign_field.into(),
            as_field: as_field.into(),
            filter: None,
            fields: None,
            single: false,
        }
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }
}

/// Adds `field` holding a case-folded copy of `source`, so a later sort on
/// it orders strings case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortWarmup {
    pub field: String,
    pub source: String,
}

impl SortWarmup {
    pub fn new(field: impl Into<String>, source: impl Into<String>) -> Self {
        Self { field: field.into(), source: source.into() }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    Match(Filter),
    Project(BTreeSet<String>),
    Lookup(Lookup),
    Redact(Redaction),
    SortWarmup(SortWarmup),
    Sort(Vec<SortKey>),
    Skip(u64),
    Limit(u64),
    /// Total of all matches plus one page of them
    CountPage { skip: u64, limit: u64 },
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Match(_) => "match",
            Stage::Project(_) => "project",
            Stage::Lookup(_) => "lookup",
            Stage::Redact(_) => "redact",
            Stage::SortWarmup(_) => "sortWarmup",
            Stage::Sort(_) => "sort",
            Stage::Skip(_) => "skip",
            Stage::Limit(_) => "limit",
            Stage::CountPage { .. } => "countPage",
        }
    }
}

/// Stages to run against one collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline {
    pub schema: String,
    pub collation: Collation,
    pub stages: Vec<Stage>,
}

impl Pipeline {
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(Stage::name).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountedPage {
    pub total_items: u64,
    pub results: Vec<Document>,
}

/// What a query returns: the records, or a page with the total behind it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QueryOutput {
    Records(Vec<Document>),
    Counted(CountedPage),
}

impl QueryOutput {
    pub fn records(&self) -> &[Document] {
        match self {
            QueryOutput::Records(records) => records,
            QueryOutput::Counted(page) => &page.results,
        }
    }

    pub fn total_items(&self) -> Option<u64> {
        match self {
            QueryOutput::Records(_) => None,
            QueryOutput::Counted(page) => Some(page.total_items),
        }
    }

    pub fn into_records(self) -> Vec<Document> {
        match self {
            QueryOutput::Records(records) => records,
            QueryOutput::Counted(page) => page.results,
        }
    }
}
