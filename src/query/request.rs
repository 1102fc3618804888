use serde::Deserialize;

use super::pipeline::{Lookup, SortWarmup, Stage};
use crate::access::Caller;
use crate::filter::{Filter, SortKey};

/// Relation look-ups a query may ask for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Joins {
    pub proponent: bool,
    pub project_lead: bool,
    pub project_director: bool,
    pub project: bool,
}

impl Joins {
    /// Enabled joins as (target collection, reference field) pairs.
    pub fn targets(&self) -> Vec<(&'static str, &'static str)> {
        let mut out = Vec::new();
        if self.proponent {
            out.push(("Organization", "proponent"));
        }
        if self.project_lead {
            out.push(("User", "projectLead"));
        }
        if self.project_director {
            out.push(("User", "projectDirector"));
        }
        if self.project {
            out.push(("Project", "project"));
        }
        out
    }

    pub fn lookups(&self) -> Vec<Lookup> {
        self.targets()
            .into_iter()
            .map(|(from, field)| Lookup::by_id(from, field))
            .collect()
    }
}

/// Everything one query needs. `fields` is expected to be sanitized already;
/// names the collection does not hold are simply absent from the output.
#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub resource: String,
    pub caller: Caller,
    pub filter: Filter,
    pub fields: Vec<String>,
    pub sort_warmup: Option<SortWarmup>,
    pub sort: Vec<SortKey>,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
    pub count: bool,
    pub pre_stages: Vec<Stage>,
    pub joins: Joins,
    pub post_stages: Vec<Stage>,
}

impl QueryRequest {
    pub fn new(resource: impl Into<String>, caller: Caller) -> Self {
        Self {
            resource: resource.into(),
            caller,
            filter: Filter::all(),
            fields: Vec::new(),
            sort_warmup: None,
            sort: Vec::new(),
            skip: None,
            limit: None,
            count: false,
            pre_stages: Vec::new(),
            joins: Joins::default(),
            post_stages: Vec::new(),
        }
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_sort(mut self, sort: Vec<SortKey>) -> Self {
        self.sort = sort;
        self
    }

    pub fn with_sort_warmup(mut self, warmup: SortWarmup) -> Self {
        self.sort_warmup = Some(warmup);
        self
    }

    pub fn with_skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn counted(mut self, count: bool) -> Self {
        self.count = count;
        self
    }

    pub fn with_joins(mut self, joins: Joins) -> Self {
        self.joins = joins;
        self
    }

    pub fn with_pre_stage(mut self, stage: Stage) -> Self {
        self.pre_stages.push(stage);
        self
    }

    pub fn with_post_stage(mut self, stage: Stage) -> Self {
        self.post_stages.push(stage);
        self
    }
}
