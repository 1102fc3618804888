use serde_json::Value;
use std::cmp::Ordering;

use super::collation::Collation;
use super::types::{CenterSphere, ElemMatch, FilterCondition, FilterExpr, Predicate};
use crate::database::document::{resolve_path, Document};

/// Evaluates parsed filters against documents in memory.
///
/// Field semantics follow the document store: a condition on a path holds
/// when any value reachable at that path satisfies it, and array values are
/// also tested element by element.
pub struct FilterMatch<'c> {
    collation: &'c Collation,
}

impl<'c> FilterMatch<'c> {
    pub fn new(collation: &'c Collation) -> Self {
        Self { collation }
    }

    pub fn matches(&self, expr: &FilterExpr, doc: &Document) -> bool {
        match expr {
            FilterExpr::And(parts) => parts.iter().all(|p| self.matches(p, doc)),
            FilterExpr::Or(parts) => parts.iter().any(|p| self.matches(p, doc)),
            FilterExpr::Nor(parts) => !parts.iter().any(|p| self.matches(p, doc)),
            FilterExpr::Condition(condition) => self.matches_condition(condition, doc),
        }
    }

    fn matches_condition(&self, condition: &FilterCondition, doc: &Document) -> bool {
        let values = resolve_path(doc, &condition.path);
        self.matches_predicate(&condition.predicate, &values)
    }

    fn matches_predicate(&self, predicate: &Predicate, values: &[&Value]) -> bool {
        match predicate {
            Predicate::Eq(target) => self.equals_any(values, target),
            Predicate::Ne(target) => !self.equals_any(values, target),
            Predicate::Gt(target) => self.compare_any(values, target, |o| o == Ordering::Greater),
            Predicate::Gte(target) => self.compare_any(values, target, |o| o != Ordering::Less),
            Predicate::Lt(target) => self.compare_any(values, target, |o| o == Ordering::Less),
            Predicate::Lte(target) => self.compare_any(values, target, |o| o != Ordering::Greater),
            Predicate::In(targets) => targets.iter().any(|t| self.equals_any(values, t)),
            Predicate::NIn(targets) => !targets.iter().any(|t| self.equals_any(values, t)),
            Predicate::Exists(expected) => !values.is_empty() == *expected,
            Predicate::Regex(pattern) => candidates(values)
                .any(|v| v.as_str().map(|s| pattern.compiled.is_match(s)).unwrap_or(false)),
            Predicate::All(targets) => {
                !targets.is_empty() && targets.iter().all(|t| self.equals_any(values, t))
            }
            Predicate::Size(size) => values
                .iter()
                .any(|v| v.as_array().map(|a| a.len() == *size).unwrap_or(false)),
            Predicate::ElemMatch(elem) => values.iter().any(|v| match v {
                Value::Array(items) => items.iter().any(|item| self.matches_element(elem, item)),
                _ => false,
            }),
            Predicate::Not(inner) => !inner.iter().all(|p| self.matches_predicate(p, values)),
            Predicate::GeoWithin(sphere) => values.iter().any(|v| within_sphere(v, sphere)),
        }
    }

    fn matches_element(&self, elem: &ElemMatch, item: &Value) -> bool {
        match elem {
            ElemMatch::Document(expr) => item.as_object().map(|doc| self.matches(expr, doc)).unwrap_or(false),
            ElemMatch::Value(predicates) => {
                let single = [item];
                predicates.iter().all(|p| self.matches_predicate(p, &single))
            }
        }
    }

    fn equals_any(&self, values: &[&Value], target: &Value) -> bool {
        // Equality to null also matches a missing field
        if target.is_null() && values.is_empty() {
            return true;
        }
        candidates(values).any(|v| self.collation.equals(v, target))
    }

    fn compare_any(&self, values: &[&Value], target: &Value, accept: impl Fn(Ordering) -> bool) -> bool {
        candidates(values)
            .filter(|v| Collation::comparable(v, target))
            .any(|v| accept(self.collation.compare(v, target)))
    }
}

/// Resolved values plus the elements of any resolved arrays.
fn candidates<'v>(values: &'v [&'v Value]) -> impl Iterator<Item = &'v Value> + 'v {
    values.iter().flat_map(|v| {
        let elements: Box<dyn Iterator<Item = &'v Value>> = match v {
            Value::Array(items) => Box::new(items.iter()),
            _ => Box::new(std::iter::empty()),
        };
        std::iter::once(*v).chain(elements)
    })
}

const GEOJSON_POINT: &str = "Point";

/// Accepts a GeoJSON point or a legacy `[lng, lat]` pair.
fn point_of(value: &Value) -> Option<(f64, f64)> {
    let coords = match value {
        Value::Array(_) => value,
        Value::Object(map) if map.get("type").and_then(Value::as_str) == Some(GEOJSON_POINT) => map.get("coordinates")?,
        _ => return None,
    };
    let pair = coords.as_array()?;
    Some((pair.first()?.as_f64()?, pair.get(1)?.as_f64()?))
}

fn within_sphere(value: &Value, sphere: &CenterSphere) -> bool {
    let Some((lng, lat)) = point_of(value) else {
        return false;
    };
    angular_distance(sphere.lng, sphere.lat, lng, lat) <= sphere.radius
}

/// Great-circle distance in radians between two lng/lat points in degrees.
fn angular_distance(lng1: f64, lat1: f64, lng2: f64, lat2: f64) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lng2 - lng1).to_radians();
    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    2.0 * a.sqrt().min(1.0).asin()
}
