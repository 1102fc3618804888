use regex::RegexBuilder;
use serde_json::{Map, Value};

use super::error::FilterError;
use super::types::{CenterSphere, ElemMatch, FilterCondition, FilterExpr, FilterOp, Pattern, Predicate};

const MAX_NESTED_DEPTH: usize = 32;

/// Parses filter documents in the operator language callers already use for
/// the document store: `{field: value}`, `{field: {$op: value}}` and the
/// logical `$and`/`$or`/`$nor` combinators.
pub struct FilterWhere;

impl FilterWhere {
    pub fn validate(where_data: &Value) -> Result<(), FilterError> {
        match where_data {
            Value::Null | Value::Object(_) => Ok(()),
            _ => Err(FilterError::InvalidWhereClause("WHERE must be an object".to_string())),
        }
    }

    pub fn parse(where_data: &Value) -> Result<FilterExpr, FilterError> {
        Self::validate(where_data)?;
        match where_data {
            Value::Object(obj) => Self::parse_object(obj, 0),
            _ => Ok(FilterExpr::default()),
        }
    }

    fn parse_object(obj: &Map<String, Value>, depth: usize) -> Result<FilterExpr, FilterError> {
        if depth > MAX_NESTED_DEPTH {
            return Err(FilterError::TooDeep(MAX_NESTED_DEPTH));
        }

        let mut conditions = Vec::with_capacity(obj.len());
        for (key, value) in obj {
            if key.starts_with('$') {
                conditions.push(Self::parse_logical_operator(key, value, depth)?);
            } else {
                Self::validate_field(key)?;
                conditions.extend(Self::parse_field_condition(key, value, depth)?);
            }
        }

        // Unwrap a single condition so simple filters stay flat
        if conditions.len() == 1 {
            return Ok(conditions.remove(0));
        }
        Ok(FilterExpr::And(conditions))
    }

    fn parse_logical_operator(op: &str, value: &Value, depth: usize) -> Result<FilterExpr, FilterError> {
        let filter_op = FilterOp::from_key(op)
            .filter(FilterOp::is_logical)
            .ok_or_else(|| FilterError::UnsupportedOperator(op.to_string()))?;

        let arr = value
            .as_array()
            .filter(|arr| !arr.is_empty())
            .ok_or_else(|| FilterError::InvalidOperatorData(format!("{} requires a non-empty array", op)))?;

        let mut branches = Vec::with_capacity(arr.len());
        for v in arr {
            let obj = v
                .as_object()
                .ok_or_else(|| FilterError::InvalidOperatorData(format!("{} entries must be objects", op)))?;
            branches.push(Self::parse_object(obj, depth + 1)?);
        }

        Ok(match filter_op {
            FilterOp::And => FilterExpr::And(branches),
            FilterOp::Or => FilterExpr::Or(branches),
            _ => FilterExpr::Nor(branches),
        })
    }

    fn parse_field_condition(field: &str, value: &Value, depth: usize) -> Result<Vec<FilterExpr>, FilterError> {
        let predicates = match value {
            Value::Object(obj) if Self::is_operator_object(obj) => Self::parse_predicates(obj, depth)?,
            // Implicit equality: { field: value }
            _ => vec![Predicate::Eq(value.clone())],
        };

        Ok(predicates
            .into_iter()
            .map(|predicate| FilterExpr::Condition(FilterCondition { path: field.to_string(), predicate }))
            .collect())
    }

    fn is_operator_object(obj: &Map<String, Value>) -> bool {
        !obj.is_empty() && obj.keys().all(|k| k.starts_with('$'))
    }

    fn parse_predicates(obj: &Map<String, Value>, depth: usize) -> Result<Vec<Predicate>, FilterError> {
        let mut predicates = Vec::with_capacity(obj.len());
        let options = obj.get("$options").and_then(Value::as_str).unwrap_or("");

        for (op_key, op_val) in obj {
            let op = FilterOp::from_key(op_key)
                .ok_or_else(|| FilterError::UnsupportedOperator(op_key.to_string()))?;
            match op {
                // Consumed together with $regex
                FilterOp::Options => {
                    if !obj.contains_key("$regex") {
                        return Err(FilterError::InvalidOperatorData("$options requires $regex".to_string()));
                    }
                }
                _ => predicates.push(Self::map_predicate(op, op_key, op_val, options, depth)?),
            }
        }
        Ok(predicates)
    }

    fn map_predicate(op: FilterOp, key: &str, value: &Value, options: &str, depth: usize) -> Result<Predicate, FilterError> {
        Ok(match op {
            FilterOp::Eq => Predicate::Eq(value.clone()),
            FilterOp::Ne => Predicate::Ne(value.clone()),
            FilterOp::Gt => Predicate::Gt(value.clone()),
            FilterOp::Gte => Predicate::Gte(value.clone()),
            FilterOp::Lt => Predicate::Lt(value.clone()),
            FilterOp::Lte => Predicate::Lte(value.clone()),
            FilterOp::In => Predicate::In(Self::array(key, value)?),
            FilterOp::NIn => Predicate::NIn(Self::array(key, value)?),
            FilterOp::All => Predicate::All(Self::array(key, value)?),
            FilterOp::Exists => Predicate::Exists(Self::truthy(value)),
            FilterOp::Size => {
                let size = value
                    .as_u64()
                    .ok_or_else(|| FilterError::InvalidOperatorData("$size requires a non-negative integer".to_string()))?;
                Predicate::Size(size as usize)
            }
            FilterOp::Regex => {
                let source = value
                    .as_str()
                    .ok_or_else(|| FilterError::InvalidOperatorData("$regex requires a string".to_string()))?;
                Predicate::Regex(Self::compile_pattern(source, options)?)
            }
            FilterOp::ElemMatch => {
                let obj = value
                    .as_object()
                    .ok_or_else(|| FilterError::InvalidOperatorData("$elemMatch requires an object".to_string()))?;
                let is_value_match = Self::is_operator_object(obj)
                    && obj.keys().all(|k| !FilterOp::from_key(k).map(|op| op.is_logical()).unwrap_or(false));
                if is_value_match {
                    Predicate::ElemMatch(ElemMatch::Value(Self::parse_predicates(obj, depth + 1)?))
                } else {
                    Predicate::ElemMatch(ElemMatch::Document(Box::new(Self::parse_object(obj, depth + 1)?)))
                }
            }
            FilterOp::Not => {
                let obj = value
                    .as_object()
                    .filter(|obj| Self::is_operator_object(obj))
                    .ok_or_else(|| FilterError::InvalidOperatorData("$not requires an operator object".to_string()))?;
                Predicate::Not(Self::parse_predicates(obj, depth + 1)?)
            }
            FilterOp::GeoWithin => Predicate::GeoWithin(Self::center_sphere(value)?),
            _ => return Err(FilterError::UnsupportedOperator(key.to_string())),
        })
    }

    fn array(key: &str, value: &Value) -> Result<Vec<Value>, FilterError> {
        value
            .as_array()
            .cloned()
            .ok_or_else(|| FilterError::InvalidOperatorData(format!("{} requires an array", key)))
    }

    fn truthy(value: &Value) -> bool {
        match value {
            Value::Bool(b) => *b,
            Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
            Value::Null => false,
            _ => true,
        }
    }

    fn compile_pattern(source: &str, options: &str) -> Result<Pattern, FilterError> {
        let mut builder = RegexBuilder::new(source);
        for flag in options.chars() {
            match flag {
                'i' => builder.case_insensitive(true),
                'm' => builder.multi_line(true),
                's' => builder.dot_matches_new_line(true),
                'x' => builder.ignore_whitespace(true),
                other => return Err(FilterError::InvalidOperatorData(format!("unknown $options flag '{}'", other))),
            };
        }
        let compiled = builder.build().map_err(|e| FilterError::InvalidRegex(e.to_string()))?;
        Ok(Pattern { source: source.to_string(), options: options.to_string(), compiled })
    }

    fn center_sphere(value: &Value) -> Result<CenterSphere, FilterError> {
        let invalid = || FilterError::InvalidOperatorData("$geoWithin requires {$centerSphere: [[lng, lat], radius]}".to_string());
        let spec = value.get("$centerSphere").and_then(Value::as_array).ok_or_else(invalid)?;
        let center = spec.first().and_then(Value::as_array).ok_or_else(invalid)?;
        let lng = center.first().and_then(Value::as_f64).ok_or_else(invalid)?;
        let lat = center.get(1).and_then(Value::as_f64).ok_or_else(invalid)?;
        let radius = spec.get(1).and_then(Value::as_f64).filter(|r| *r >= 0.0).ok_or_else(invalid)?;
        Ok(CenterSphere { lng, lat, radius })
    }

    fn validate_field(field: &str) -> Result<(), FilterError> {
        if field.is_empty() || field.split('.').any(str::is_empty) {
            return Err(FilterError::InvalidField(format!("'{}'", field)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn condition(path: &str, predicate: Predicate) -> FilterExpr {
        FilterExpr::Condition(FilterCondition { path: path.to_string(), predicate })
    }

    #[test]
    fn implicit_equality_stays_flat() {
        let expr = FilterWhere::parse(&json!({"status": "ACCEPTED"})).unwrap();
        assert_eq!(expr, condition("status", Predicate::Eq(json!("ACCEPTED"))));
    }

    #[test]
    fn range_operators_expand_to_conditions() {
        let expr = FilterWhere::parse(&json!({"dateStarted": {"$gte": "2024-01-01", "$lt": "2025-01-01"}})).unwrap();
        match expr {
            FilterExpr::And(parts) => assert_eq!(parts.len(), 2),
            other => panic!("expected And, got {:?}", other),
        }
    }

    #[test]
    fn logical_operators_nest() {
        let expr = FilterWhere::parse(&json!({
            "$or": [{"cl_file": 7}, {"tantalisID": 7}],
            "isDeleted": {"$ne": true}
        }))
        .unwrap();
        match expr {
            FilterExpr::And(parts) => {
                assert!(matches!(&parts[0], FilterExpr::Or(branches) if branches.len() == 2));
                assert_eq!(parts[1], condition("isDeleted", Predicate::Ne(json!(true))));
            }
            other => panic!("expected And, got {:?}", other),
        }
    }

    #[test]
    fn regex_consumes_options() {
        let expr = FilterWhere::parse(&json!({"name": {"$regex": "^sk", "$options": "i"}})).unwrap();
        match expr {
            FilterExpr::Condition(FilterCondition { predicate: Predicate::Regex(p), .. }) => {
                assert!(p.compiled.is_match("Skeena"));
            }
            other => panic!("expected regex, got {:?}", other),
        }
    }

    #[test]
    fn embedded_document_is_equality_not_operators() {
        let expr = FilterWhere::parse(&json!({"client": {"name": "x"}})).unwrap();
        assert_eq!(expr, condition("client", Predicate::Eq(json!({"name": "x"}))));
    }

    #[test]
    fn center_sphere_parses() {
        let expr = FilterWhere::parse(&json!({
            "centroid": {"$geoWithin": {"$centerSphere": [[-123.3, 48.4], 0.01]}}
        }))
        .unwrap();
        assert_eq!(
            expr,
            condition("centroid", Predicate::GeoWithin(CenterSphere { lng: -123.3, lat: 48.4, radius: 0.01 }))
        );
    }

    #[test]
    fn rejects_unknown_and_malformed_operators() {
        assert!(matches!(
            FilterWhere::parse(&json!({"$where": "sleep(1000)"})),
            Err(FilterError::UnsupportedOperator(_))
        ));
        assert!(matches!(
            FilterWhere::parse(&json!({"a": {"$in": 5}})),
            Err(FilterError::InvalidOperatorData(_))
        ));
        assert!(matches!(
            FilterWhere::parse(&json!({"$or": []})),
            Err(FilterError::InvalidOperatorData(_))
        ));
        assert!(matches!(
            FilterWhere::parse(&json!({"a": {"$regex": "("}})),
            Err(FilterError::InvalidRegex(_))
        ));
        assert!(FilterWhere::parse(&json!([1, 2])).is_err());
        assert!(FilterWhere::parse(&json!({"a..b": 1})).is_err());
    }

    #[test]
    fn null_filter_matches_everything() {
        assert_eq!(FilterWhere::parse(&Value::Null).unwrap(), FilterExpr::And(vec![]));
    }
}
