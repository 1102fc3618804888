use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

use super::pipeline::{CountedPage, Lookup, Pipeline, QueryOutput, SortWarmup, Stage};
use crate::database::document::{id_string, project, remove_path, resolve_path, set_path, Document};
use crate::database::{DocumentStore, StoreError};
use crate::filter::{Collation, Filter, SortKey};

static NULL: Value = Value::Null;

/// Runs a pipeline against a store. Leading match stages become the store
/// scan; every later stage runs in process over the materialized match set.
pub struct PipelineExecutor<'s> {
    store: &'s dyn DocumentStore,
}

impl<'s> PipelineExecutor<'s> {
    pub fn new(store: &'s dyn DocumentStore) -> Self {
        Self { store }
    }

    pub async fn execute(&self, pipeline: Pipeline) -> Result<QueryOutput, StoreError> {
        let Pipeline { schema, collation, stages } = pipeline;
        let mut stages = stages.into_iter().peekable();

        let mut scan_filter = Filter::all();
        while let Some(Stage::Match(_)) = stages.peek() {
            if let Some(Stage::Match(filter)) = stages.next() {
                scan_filter = scan_filter.and(filter);
            }
        }
        let mut docs = self.store.scan(&schema, &scan_filter, &collation).await?;

        let mut total = None;
        for stage in stages {
            match stage {
                Stage::Match(filter) => docs.retain(|doc| filter.matches(doc, &collation)),
                Stage::Project(fields) => {
                    docs = docs.iter().map(|doc| project(doc, &fields)).collect();
                }
                Stage::Lookup(lookup) => self.lookup(&mut docs, &lookup).await?,
                Stage::Redact(redaction) => {
                    docs = docs.into_iter().filter_map(|doc| redaction.apply(doc)).collect();
                }
                Stage::SortWarmup(warmup) => {
                    for doc in docs.iter_mut() {
                        warm(doc, &warmup);
                    }
                }
                Stage::Sort(keys) => sort_documents(&mut docs, &keys, &collation),
                Stage::Skip(n) => docs = docs.into_iter().skip(to_usize(n)).collect(),
                Stage::Limit(n) => docs.truncate(to_usize(n)),
                Stage::CountPage { skip, limit } => {
                    total = Some(docs.len() as u64);
                    docs = docs.into_iter().skip(to_usize(skip)).take(to_usize(limit)).collect();
                }
            }
        }

        Ok(match total {
            Some(total_items) => QueryOutput::Counted(CountedPage { total_items, results: docs }),
            None => QueryOutput::Records(docs),
        })
    }

    async fn lookup(&self, docs: &mut [Document], lookup: &Lookup) -> Result<(), StoreError> {
        let keys: BTreeSet<String> = docs
            .iter()
            .flat_map(|doc| reference_ids(doc, &lookup.local_field))
            .collect();

        let joined = if keys.is_empty() {
            Vec::new()
        } else {
            let mut filter = Filter::is_in(
                lookup.foreign_field.as_str(),
                keys.into_iter().map(Value::String).collect(),
            );
            if let Some(extra) = &lookup.filter {
                filter = filter.and(extra.clone());
            }
            self.store
                .scan(&lookup.from, &filter, &Collation::simple())
                .await?
        };

        let mut index: HashMap<String, Vec<usize>> = HashMap::new();
        for (position, doc) in joined.iter().enumerate() {
            for id in reference_ids(doc, &lookup.foreign_field) {
                index.entry(id).or_default().push(position);
            }
        }

        for doc in docs.iter_mut() {
            let positions: BTreeSet<usize> = reference_ids(doc, &lookup.local_field)
                .iter()
                .filter_map(|id| index.get(id))
                .flatten()
                .copied()
                .collect();
            let mut matches = positions.into_iter().map(|p| {
                let found = &joined[p];
                Value::Object(match &lookup.fields {
                    Some(fields) => project(found, fields),
                    None => found.clone(),
                })
            });

            if lookup.single {
                match matches.next() {
                    Some(found) => set_path(doc, &lookup.as_field, found),
                    None => {
                        remove_path(doc, &lookup.as_field);
                    }
                }
            } else {
                set_path(doc, &lookup.as_field, Value::Array(matches.collect()));
            }
        }
        Ok(())
    }
}

/// Id strings referenced at `path`, flattening arrays of references.
fn reference_ids(doc: &Document, path: &str) -> Vec<String> {
    let mut out = Vec::new();
    for value in resolve_path(doc, path) {
        match value {
            Value::Array(items) => out.extend(items.iter().filter_map(id_string)),
            other => out.extend(id_string(other)),
        }
    }
    out
}

fn warm(doc: &mut Document, warmup: &SortWarmup) {
    let value = match resolve_path(doc, &warmup.source).first() {
        Some(Value::String(s)) => Value::String(s.to_lowercase()),
        Some(other) => (*other).clone(),
        None => Value::Null,
    };
    set_path(doc, &warmup.field, value);
}

fn sort_value<'a>(doc: &'a Document, path: &str) -> &'a Value {
    resolve_path(doc, path).into_iter().next().unwrap_or(&NULL)
}

/// Stable multi-key sort; missing values sort as null.
pub fn sort_documents(docs: &mut [Document], keys: &[SortKey], collation: &Collation) {
    if keys.is_empty() {
        return;
    }
    docs.sort_by(|a, b| {
        for key in keys {
            let ordering = key
                .direction
                .apply(collation.compare(sort_value(a, &key.field), sort_value(b, &key.field)));
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}

fn to_usize(n: u64) -> usize {
    usize::try_from(n).unwrap_or(usize::MAX)
}
